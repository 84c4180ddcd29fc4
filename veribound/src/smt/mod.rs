//! SMT-LIB2 script generation
//!
//! The symbolic-execution engine lowers path facts and proof obligations
//! into an SMT-LIB2 script, which is discharged by the external solver.

mod solver;

pub use solver::SmtSolver;

use std::collections::HashSet;
use std::fmt::Write;

use thiserror::Error;

/// SMT generation / solving errors
#[derive(Debug, Error)]
pub enum SmtError {
    #[error("unsupported expression: {0}")]
    Unsupported(String),

    #[error("unknown variable: {0}")]
    UnknownVariable(String),

    #[error("solver not found at {0:?}")]
    SolverNotFound(String),

    #[error("solver failed: {0}")]
    Solver(String),

    #[error("IO error talking to solver: {0}")]
    Io(#[from] std::io::Error),
}

/// SMT-LIB2 sorts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SmtSort {
    Int,
    Real,
    Bool,
}

impl SmtSort {
    pub fn to_smt(self) -> &'static str {
        match self {
            SmtSort::Int => "Int",
            SmtSort::Real => "Real",
            SmtSort::Bool => "Bool",
        }
    }
}

/// Outcome of a single check-sat query
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SolverResult {
    /// Satisfiable, with the raw model text
    Sat(String),
    Unsat,
    Unknown,
    Timeout,
}

/// Solver-found assignment witnessing a contract violation
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Counterexample {
    pub assignments: Vec<(String, String)>,
}

impl Counterexample {
    /// Parse the `(define-fun name () Sort value)` entries of a model dump.
    pub fn from_model(model: &str) -> Self {
        let mut assignments = Vec::new();
        let mut lines = model.lines().peekable();
        while let Some(line) = lines.next() {
            let trimmed = line.trim();
            let Some(rest) = trimmed.strip_prefix("(define-fun ") else {
                continue;
            };
            let mut parts = rest.split_whitespace();
            let Some(name) = parts.next() else { continue };
            // Value is on the same line after the sort, or on the next line.
            let tail: Vec<&str> = parts.collect();
            let value = if tail.len() >= 3 {
                tail[2..].join(" ").trim_end_matches(')').to_string()
            } else if let Some(next) = lines.peek() {
                next.trim().trim_end_matches(')').to_string()
            } else {
                continue;
            };
            assignments.push((name.to_string(), value));
        }
        Self { assignments }
    }
}

impl std::fmt::Display for Counterexample {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "counterexample:")?;
        for (name, value) in &self.assignments {
            write!(f, " {name} = {value}")?;
        }
        Ok(())
    }
}

/// SMT-LIB2 script under construction
///
/// Cloned freely: each proof obligation is checked on an independent copy
/// of the accumulated declarations and path facts.
#[derive(Debug, Clone, Default)]
pub struct SmtScript {
    declarations: Vec<String>,
    assertions: Vec<String>,
    declared: HashSet<String>,
    logic: Option<String>,
}

impl SmtScript {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the logic; left unset the solver picks one itself.
    pub fn set_logic(&mut self, logic: &str) {
        self.logic = Some(logic.to_string());
    }

    /// Declare a constant once; repeated declarations are ignored.
    pub fn declare_const(&mut self, name: &str, sort: SmtSort) {
        let name = sanitize_name(name);
        if self.declared.insert(name.clone()) {
            self.declarations
                .push(format!("(declare-const {} {})", name, sort.to_smt()));
        }
    }

    pub fn is_declared(&self, name: &str) -> bool {
        self.declared.contains(&sanitize_name(name))
    }

    /// Add an assertion
    pub fn assert(&mut self, term: &str) {
        self.assertions.push(format!("(assert {term})"));
    }

    pub fn assertion_count(&self) -> usize {
        self.assertions.len()
    }

    /// Generate the complete SMT-LIB2 script
    pub fn generate(&self) -> String {
        let mut output = String::new();
        if let Some(logic) = &self.logic {
            writeln!(output, "(set-logic {logic})").unwrap();
        }
        for decl in &self.declarations {
            writeln!(output, "{decl}").unwrap();
        }
        for assertion in &self.assertions {
            writeln!(output, "{assertion}").unwrap();
        }
        writeln!(output, "(check-sat)").unwrap();
        writeln!(output, "(get-model)").unwrap();
        output
    }
}

/// Keep solver symbols to the simple-symbol alphabet
pub fn sanitize_name(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect()
}

/// Conjunction helper; empty input is `true`
pub fn conjunction(terms: &[String]) -> String {
    match terms.len() {
        0 => "true".to_string(),
        1 => terms[0].clone(),
        _ => format!("(and {})", terms.join(" ")),
    }
}
