//! External SMT solver invocation
//!
//! Runs the `z3` binary with a script on stdin. The solver is an external
//! collaborator: this module only frames the exchange and classifies the
//! first line of its output.

use std::io::Write;
use std::process::{Command, Stdio};

use super::{SmtError, SolverResult};

/// Handle to the z3 binary
#[derive(Debug, Clone)]
pub struct SmtSolver {
    path: String,
    timeout_secs: u32,
}

impl SmtSolver {
    pub fn new() -> Self {
        Self {
            path: "z3".to_string(),
            timeout_secs: 10,
        }
    }

    /// Set a custom z3 path
    pub fn with_path(mut self, path: &str) -> Self {
        self.path = path.to_string();
        self
    }

    /// Set the per-query timeout in seconds
    pub fn with_timeout(mut self, seconds: u32) -> Self {
        self.timeout_secs = seconds;
        self
    }

    pub fn timeout_secs(&self) -> u32 {
        self.timeout_secs
    }

    /// Check if the solver binary responds to `--version`
    pub fn is_available(&self) -> bool {
        Command::new(&self.path)
            .arg("--version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map(|s| s.success())
            .unwrap_or(false)
    }

    /// Run a check-sat script and classify the result
    pub fn solve(&self, script: &str) -> Result<SolverResult, SmtError> {
        let mut child = Command::new(&self.path)
            .arg("-smt2")
            .arg("-in")
            .arg(format!("-T:{}", self.timeout_secs))
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => SmtError::SolverNotFound(self.path.clone()),
                _ => SmtError::Io(e),
            })?;

        {
            let stdin = child
                .stdin
                .as_mut()
                .ok_or_else(|| SmtError::Solver("solver stdin unavailable".to_string()))?;
            stdin.write_all(script.as_bytes())?;
        }

        let output = child.wait_with_output()?;
        let stdout = String::from_utf8_lossy(&output.stdout);
        Ok(Self::classify(&stdout))
    }

    fn classify(stdout: &str) -> SolverResult {
        let mut lines = stdout.lines();
        let Some(first) = lines.find(|l| !l.trim().is_empty()) else {
            return SolverResult::Unknown;
        };
        match first.trim() {
            "unsat" => SolverResult::Unsat,
            "sat" => {
                let model: String = lines.collect::<Vec<_>>().join("\n");
                SolverResult::Sat(model)
            }
            "timeout" => SolverResult::Timeout,
            _ => SolverResult::Unknown,
        }
    }
}

impl Default for SmtSolver {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_unsat() {
        assert_eq!(SmtSolver::classify("unsat\n"), SolverResult::Unsat);
    }

    #[test]
    fn test_classify_sat_with_model() {
        let out = "sat\n(model\n  (define-fun x () Int 1)\n)\n";
        match SmtSolver::classify(out) {
            SolverResult::Sat(model) => assert!(model.contains("define-fun x")),
            other => panic!("expected sat, got {other:?}"),
        }
    }

    #[test]
    fn test_classify_timeout_and_unknown() {
        assert_eq!(SmtSolver::classify("timeout\n"), SolverResult::Timeout);
        assert_eq!(SmtSolver::classify("unknown\n"), SolverResult::Unknown);
        assert_eq!(SmtSolver::classify(""), SolverResult::Unknown);
    }

    #[test]
    fn test_solve_trivial_scripts() {
        let solver = SmtSolver::new();
        if !solver.is_available() {
            return;
        }

        let sat = solver
            .solve("(declare-const x Int)\n(assert (= x 1))\n(check-sat)\n(get-model)\n")
            .unwrap();
        assert!(matches!(sat, SolverResult::Sat(_)));

        let unsat = solver
            .solve("(declare-const x Int)\n(assert (and (= x 1) (= x 2)))\n(check-sat)\n")
            .unwrap();
        assert_eq!(unsat, SolverResult::Unsat);
    }
}
