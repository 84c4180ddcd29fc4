//! Bounded symbolic-execution engine
//!
//! Turns method bodies and contract clauses into solver obligations:
//! branch-sensitive SSA-style state tracking, call inlining with
//! cycle/depth bounding, and per-obligation negation checks. Absence of a
//! counterexample within the configured depth and time budget is not a
//! full correctness proof.

mod alias;
mod calls;

pub use alias::{AliasName, AliasTable};
pub use calls::CallSequence;

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::time::{Duration, Instant};

use log::debug;
use serde::{Deserialize, Serialize};

use crate::model::{
    ClassModel, Expression, ExpressionType, Method, Statement,
};
use crate::smt::{
    conjunction, sanitize_name, Counterexample, SmtError, SmtScript, SmtSolver, SmtSort,
    SolverResult,
};

/// Which contract clause a counterexample violates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ViolationKind {
    Require,
    Ensure,
    Invariant,
}

impl fmt::Display for ViolationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Require => "require",
            Self::Ensure => "ensure",
            Self::Invariant => "invariant",
        };
        write!(f, "{s}")
    }
}

/// One discharged obligation that failed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContractViolation {
    pub kind: ViolationKind,
    /// Rendered text of the violated clause
    pub text: String,
    /// Owning method, if any (class invariants at depth 0 have none)
    pub method: Option<String>,
    pub counterexample: Option<Counterexample>,
}

impl fmt::Display for ContractViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.method {
            Some(method) => write!(f, "{} violated in {}: {}", self.kind, method, self.text)?,
            None => write!(f, "{} violated: {}", self.kind, self.text)?,
        }
        if let Some(ce) = &self.counterexample {
            write!(f, " ({ce})")?;
        }
        Ok(())
    }
}

/// Classified outcome of one verification run.
///
/// Every obligation is checked independently, so a run reports all
/// violations it finds. `Timeout` means the budget elapsed before every
/// obligation was discharged and is never conflated with `Success`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum VerificationResult {
    Success,
    Violations(Vec<ContractViolation>),
    Timeout,
}

impl VerificationResult {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout)
    }

    pub fn violations(&self) -> &[ContractViolation] {
        match self {
            Self::Violations(list) => list,
            _ => &[],
        }
    }
}

impl fmt::Display for VerificationResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Success => write!(f, "✓ verified"),
            Self::Violations(list) => {
                for (i, v) in list.iter().enumerate() {
                    if i > 0 {
                        writeln!(f)?;
                    }
                    write!(f, "✗ {v}")?;
                }
                Ok(())
            }
            Self::Timeout => write!(f, "? timed out before all obligations were discharged"),
        }
    }
}

/// Bounded contract verifier for one class model
pub struct Verifier {
    solver: SmtSolver,
    max_depth: usize,
    max_duration: Duration,
    verbose: bool,
}

impl Verifier {
    pub fn new() -> Self {
        Self {
            solver: SmtSolver::new(),
            max_depth: 4,
            max_duration: Duration::from_secs(30),
            verbose: false,
        }
    }

    /// Bound on branch/loop/call-inlining depth
    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = depth;
        self
    }

    /// Wall-clock budget for the whole run
    pub fn with_max_duration(mut self, duration: Duration) -> Self {
        self.max_duration = duration;
        self
    }

    /// Set a custom z3 path
    pub fn with_z3_path(mut self, path: &str) -> Self {
        self.solver = self.solver.with_path(path);
        self
    }

    /// Per-query solver timeout in seconds
    pub fn with_solver_timeout(mut self, seconds: u32) -> Self {
        self.solver = self.solver.with_timeout(seconds);
        self
    }

    /// Dump generated scripts to stderr
    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Check if the solver is available
    pub fn is_solver_available(&self) -> bool {
        self.solver.is_available()
    }

    /// Verify every contract of the class up to the configured bounds.
    ///
    /// Classification is deterministic across repeated runs on identical
    /// input: obligations are generated and checked in model order.
    pub fn verify(&self, model: &ClassModel) -> Result<VerificationResult, SmtError> {
        let started = Instant::now();
        let mut session = Session {
            model,
            solver: &self.solver,
            max_depth: self.max_depth,
            deadline: started + self.max_duration,
            script: SmtScript::new(),
            types: HashMap::new(),
            violations: Vec::new(),
            budget_exhausted: false,
            scope_counter: 0,
            verbose: self.verbose,
        };

        let mut state = PathState::new();
        session.declare_class_members(&mut state);
        let base_script = session.script.clone();
        let base_state = state.clone();

        // Depth 0: invariants must hold after field initialization alone.
        for invariant in model.invariants() {
            session.check_contract(
                &base_state,
                &invariant.expression,
                ViolationKind::Invariant,
                &invariant.text,
                None,
            )?;
        }

        if self.max_depth > 0 {
            for method in model.methods() {
                if session.budget_exhausted {
                    break;
                }
                session.run_method(&base_script, &base_state, method)?;
            }
        }

        let result = if !session.violations.is_empty() {
            VerificationResult::Violations(session.violations)
        } else if session.budget_exhausted {
            VerificationResult::Timeout
        } else {
            VerificationResult::Success
        };

        if self.verbose {
            eprintln!(
                "verified {} in {}ms: {:?}",
                model.name(),
                started.elapsed().as_millis(),
                result
            );
        }
        Ok(result)
    }
}

impl Default for Verifier {
    fn default() -> Self {
        Self::new()
    }
}

/// One symbolic-execution path
#[derive(Debug, Clone)]
struct PathState {
    aliases: AliasTable,
    /// Conjunction of the branch conditions taken to reach this point
    guards: Vec<String>,
    calls: CallSequence,
    /// Source name -> alias base name for the active frame
    scope: HashMap<String, String>,
    depth: usize,
    returned: bool,
}

impl PathState {
    fn new() -> Self {
        Self {
            aliases: AliasTable::new(),
            guards: Vec::new(),
            calls: CallSequence::new(),
            scope: HashMap::new(),
            depth: 0,
            returned: false,
        }
    }
}

/// State shared across every path of one verification run
struct Session<'a> {
    model: &'a ClassModel,
    solver: &'a SmtSolver,
    max_depth: usize,
    deadline: Instant,
    script: SmtScript,
    /// Alias base name -> model type
    types: HashMap<String, ExpressionType>,
    violations: Vec<ContractViolation>,
    budget_exhausted: bool,
    scope_counter: u32,
    verbose: bool,
}

impl<'a> Session<'a> {
    // ------------------------------------------------------------------
    // Declarations
    // ------------------------------------------------------------------

    /// One solver constant per field/property generation; initializers
    /// constrain generation 0.
    fn declare_class_members(&mut self, state: &mut PathState) {
        let members: Vec<(String, ExpressionType, Option<Expression>)> = self
            .model
            .fields()
            .iter()
            .map(|f| (f.name.clone(), f.ty.clone(), f.initializer.clone()))
            .chain(
                self.model
                    .properties()
                    .iter()
                    .map(|p| (p.name.clone(), p.ty.clone(), p.initializer.clone())),
            )
            .collect();

        for (name, ty, initializer) in members {
            let Some(sort) = sort_of(&ty) else {
                debug!("skipping member {name} with unsupported type {ty}");
                continue;
            };
            state.aliases.add_name(&name);
            self.types.insert(name.clone(), ty.clone());
            let alias = state.aliases.alias_of(&name).expect("just added");
            self.script.declare_const(&alias.alias(), sort);
            if let Some(init) = initializer
                && let Ok((term, init_ty)) = self.lower(state, &init, false)
            {
                let term = coerce(&term, &init_ty, &ty);
                let fact = format!("(= {} {})", sym(&alias), term);
                self.assume(state, &fact);
            }
        }
    }

    fn declare_variable(
        &mut self,
        state: &mut PathState,
        source_name: &str,
        base: &str,
        ty: &ExpressionType,
    ) -> Option<AliasName> {
        let sort = sort_of(ty)?;
        state.aliases.add_name(base);
        self.types.insert(base.to_string(), ty.clone());
        state
            .scope
            .insert(source_name.to_string(), base.to_string());
        let alias = state.aliases.alias_of(base).expect("just added");
        self.script.declare_const(&alias.alias(), sort);
        Some(alias)
    }

    // ------------------------------------------------------------------
    // Facts and obligations
    // ------------------------------------------------------------------

    /// Assert a path fact; facts inside a branch are guarded so one
    /// linear script stays sound across forks.
    fn assume(&mut self, state: &PathState, term: &str) {
        if state.guards.is_empty() {
            self.script.assert(term);
        } else {
            self.script
                .assert(&format!("(=> {} {})", conjunction(&state.guards), term));
        }
    }

    fn budget_left(&mut self) -> bool {
        if self.budget_exhausted {
            return false;
        }
        if Instant::now() >= self.deadline {
            self.budget_exhausted = true;
            return false;
        }
        true
    }

    /// Check one proof obligation: satisfiability of the negation under
    /// the accumulated path facts. Satisfiable means a counterexample.
    fn check_obligation(
        &mut self,
        state: &PathState,
        property: &str,
        kind: ViolationKind,
        text: &str,
        method: Option<&str>,
    ) -> Result<(), SmtError> {
        if !self.budget_left() {
            return Ok(());
        }
        let mut script = self.script.clone();
        let negated = if state.guards.is_empty() {
            format!("(not {property})")
        } else {
            format!("(and {} (not {property}))", conjunction(&state.guards))
        };
        script.assert(&negated);
        let generated = script.generate();
        if self.verbose {
            eprintln!("=== obligation [{kind}] {text} ===\n{generated}");
        }
        let queried = Instant::now();
        let outcome = self.solver.solve(&generated)?;
        if self.verbose {
            eprintln!(
                "obligation [{kind}] {text}: {:?} in {}ms",
                outcome,
                queried.elapsed().as_millis()
            );
        }
        match outcome {
            SolverResult::Unsat => Ok(()),
            SolverResult::Sat(model) => {
                self.violations.push(ContractViolation {
                    kind,
                    text: text.to_string(),
                    method: method.map(str::to_string),
                    counterexample: Some(Counterexample::from_model(&model)),
                });
                Ok(())
            }
            SolverResult::Unknown | SolverResult::Timeout => {
                self.budget_exhausted = true;
                Ok(())
            }
        }
    }

    /// Lower a contract expression and check it as an obligation.
    /// Unsupported clauses are diagnosed, never fatal.
    fn check_contract(
        &mut self,
        state: &PathState,
        expression: &Expression,
        kind: ViolationKind,
        text: &str,
        method: Option<&str>,
    ) -> Result<(), SmtError> {
        let mut probe = state.clone();
        match self.lower(&mut probe, expression, false) {
            Ok((term, _)) => self.check_obligation(state, &term, kind, text, method),
            Err(e) if is_unsupported(&e) => {
                debug!("skipping {kind} clause {text:?}: {e}");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    /// Check whether the accumulated facts are still satisfiable; an
    /// unsatisfiable context means a contradictory precondition set.
    fn facts_satisfiable(&mut self, state: &PathState) -> Result<Option<bool>, SmtError> {
        if !self.budget_left() {
            return Ok(None);
        }
        let mut script = self.script.clone();
        if !state.guards.is_empty() {
            script.assert(&conjunction(&state.guards));
        }
        match self.solver.solve(&script.generate())? {
            SolverResult::Sat(_) => Ok(Some(true)),
            SolverResult::Unsat => Ok(Some(false)),
            SolverResult::Unknown | SolverResult::Timeout => {
                self.budget_exhausted = true;
                Ok(None)
            }
        }
    }

    // ------------------------------------------------------------------
    // Method modeling
    // ------------------------------------------------------------------

    /// Model one method from the initialized state: parameters and locals
    /// become fresh constants, requires are assumed (and their conjunction
    /// checked for contradiction), the body is executed symbolically, and
    /// ensures plus class invariants are discharged afterwards.
    fn run_method(
        &mut self,
        base_script: &SmtScript,
        base_state: &PathState,
        method: &Method,
    ) -> Result<(), SmtError> {
        self.script = base_script.clone();
        let mut state = base_state.clone();

        for param in &method.parameters {
            if self
                .declare_variable(&mut state, &param.name, &param.name, &param.ty)
                .is_none()
            {
                debug!(
                    "parameter {} of {} has unsupported type {}",
                    param.name, method.name, param.ty
                );
            }
        }
        for local in &method.locals {
            let declared = self
                .declare_variable(&mut state, &local.name, &local.name, &local.ty)
                .is_some();
            if !declared {
                debug!(
                    "local {} of {} has unsupported type {}",
                    local.name, method.name, local.ty
                );
                continue;
            }
            if let Some(init) = local.initializer.clone() {
                let alias = state.aliases.alias_of(&local.name).expect("declared");
                if let Ok((term, ty)) = self.lower(&mut state, &init, false) {
                    let term = coerce(&term, &ty, &local.ty);
                    let fact = format!("(= {} {})", sym(&alias), term);
                    self.assume(&state, &fact);
                }
            }
        }
        if method.returns_value() {
            self.declare_variable(&mut state, "Result", "Result", &method.return_type);
        }

        // Requires are the method's own entry assumptions. A conjunction
        // that becomes unsatisfiable is a contract defect in itself and is
        // reported once, for the clause that introduced the contradiction.
        for require in &method.requires {
            match self.lower(&mut state, &require.expression, false) {
                Ok((term, _)) => {
                    self.assume(&state, &term);
                    if self.facts_satisfiable(&state)? == Some(false) {
                        self.violations.push(ContractViolation {
                            kind: ViolationKind::Require,
                            text: require.text.clone(),
                            method: Some(method.name.clone()),
                            counterexample: None,
                        });
                        return Ok(());
                    }
                }
                Err(e) if is_unsupported(&e) => {
                    debug!("skipping require {:?}: {e}", require.text);
                }
                Err(e) => return Err(e),
            }
        }

        self.exec_statements(&mut state, &method.body)?;

        for ensure in &method.ensures {
            self.check_contract(
                &state,
                &ensure.expression,
                ViolationKind::Ensure,
                &ensure.text,
                Some(&method.name),
            )?;
        }

        // Invariants must hold again after every public method.
        if method.is_public() {
            for invariant in self.model.invariants() {
                self.check_contract(
                    &state,
                    &invariant.expression,
                    ViolationKind::Invariant,
                    &invariant.text,
                    Some(&method.name),
                )?;
            }
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Statements
    // ------------------------------------------------------------------

    fn exec_statements(
        &mut self,
        state: &mut PathState,
        statements: &[Statement],
    ) -> Result<(), SmtError> {
        for statement in statements {
            if state.returned || self.budget_exhausted {
                break;
            }
            self.exec_statement(state, statement)?;
        }
        Ok(())
    }

    fn exec_statement(&mut self, state: &mut PathState, statement: &Statement) -> Result<(), SmtError> {
        match statement {
            Statement::Assignment { destination, value } => {
                self.exec_assignment(state, destination, value)
            }
            Statement::Conditional {
                condition,
                then_branch,
                else_branch,
            } => self.exec_conditional(state, condition, then_branch, else_branch),
            Statement::Return { value } => self.exec_return(state, value.as_ref()),
            Statement::ProcedureCall { name, arguments, .. } => {
                match self.inline_call(state, name, arguments, false) {
                    Ok(_) => Ok(()),
                    Err(e) if is_unsupported(&e) => {
                        debug!("skipping call to {name}: {e}");
                        Ok(())
                    }
                    Err(e) => Err(e),
                }
            }
            Statement::Loop { condition, body } => self.exec_loop(state, condition, body),
        }
    }

    fn exec_assignment(
        &mut self,
        state: &mut PathState,
        destination: &str,
        value: &Expression,
    ) -> Result<(), SmtError> {
        let Some(base) = self.resolve_base(state, destination) else {
            debug!("skipping assignment to unknown variable {destination}");
            return Ok(());
        };
        let Some(dest_ty) = self.types.get(&base).cloned() else {
            return Ok(());
        };
        let Some(sort) = sort_of(&dest_ty) else {
            return Ok(());
        };
        let lowered = self.lower(state, value, true);
        match lowered {
            Ok((term, value_ty)) => {
                let term = coerce(&term, &value_ty, &dest_ty);
                let alias = state.aliases.add_or_increment(&base);
                self.script.declare_const(&alias.alias(), sort);
                let fact = format!("(= {} {})", sym(&alias), term);
                self.assume(state, &fact);
                Ok(())
            }
            Err(e) if is_unsupported(&e) => {
                // The destination still changes: havoc it so stale facts
                // about the old generation do not leak forward.
                let alias = state.aliases.add_or_increment(&base);
                self.script.declare_const(&alias.alias(), sort);
                debug!("havocing {destination}: {e}");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    /// Fork the alias table per branch, execute each side under its
    /// guard, then reconcile the join with if-then-else assertions for
    /// every name whose generation diverged.
    fn exec_conditional(
        &mut self,
        state: &mut PathState,
        condition: &Expression,
        then_branch: &[Statement],
        else_branch: &[Statement],
    ) -> Result<(), SmtError> {
        let (cond_term, _) = match self.lower(state, condition, true) {
            Ok(ok) => ok,
            Err(e) if is_unsupported(&e) => {
                debug!("skipping conditional: {e}");
                return Ok(());
            }
            Err(e) => return Err(e),
        };

        if state.depth >= self.max_depth {
            // Beyond the bound: exploration is abandoned, not reported.
            debug!("conditional beyond depth bound {}", self.max_depth);
            return Ok(());
        }

        let mut then_state = state.clone();
        then_state.depth += 1;
        then_state.guards.push(cond_term.clone());
        self.exec_statements(&mut then_state, then_branch)?;

        let mut else_state = state.clone();
        else_state.depth += 1;
        else_state.guards.push(format!("(not {cond_term})"));
        self.exec_statements(&mut else_state, else_branch)?;

        self.join(state, &cond_term, &then_state, &else_state);
        Ok(())
    }

    fn join(
        &mut self,
        state: &mut PathState,
        cond_term: &str,
        then_state: &PathState,
        else_state: &PathState,
    ) {
        if self.verbose {
            let branch_only = then_state.aliases.alias_difference(&state.aliases);
            if !branch_only.is_empty() {
                eprintln!("join reconciles: {}", branch_only.join(", "));
            }
        }
        let mut merged = then_state.aliases.clone();
        let updated = merged.merge(&else_state.aliases);
        for name in updated {
            let (Some(then_gen), Some(else_gen)) = (
                then_state.aliases.generation_of(&name),
                else_state.aliases.generation_of(&name),
            ) else {
                continue;
            };
            let join_alias = merged.alias_of(&name).expect("merged name");
            if let Some(sort) = self.types.get(&name).and_then(sort_of) {
                self.script.declare_const(&join_alias.alias(), sort);
            }
            let fact = format!(
                "(= {} (ite {} {} {}))",
                sym(&join_alias),
                cond_term,
                sym(&AliasName::new(name.clone(), then_gen)),
                sym(&AliasName::new(name.clone(), else_gen)),
            );
            self.assume(state, &fact);
        }
        state.aliases = merged;
        state.returned = then_state.returned && else_state.returned;
    }

    /// Bounded unrolling: each iteration is a guarded conditional whose
    /// else-side is the unchanged pre-iteration state.
    fn exec_loop(
        &mut self,
        state: &mut PathState,
        condition: &Expression,
        body: &[Statement],
    ) -> Result<(), SmtError> {
        while state.depth < self.max_depth && !state.returned && !self.budget_exhausted {
            let (cond_term, _) = match self.lower(state, condition, true) {
                Ok(ok) => ok,
                Err(e) if is_unsupported(&e) => {
                    debug!("skipping loop: {e}");
                    return Ok(());
                }
                Err(e) => return Err(e),
            };

            let before = state.clone();
            let mut iteration = state.clone();
            iteration.depth += 1;
            iteration.guards.push(cond_term.clone());
            self.exec_statements(&mut iteration, body)?;

            state.depth += 1;
            self.join(state, &cond_term, &iteration, &before);

            if state.aliases == before.aliases {
                // Body assigns nothing the solver models; further
                // unrollings cannot change the state.
                break;
            }
        }
        Ok(())
    }

    fn exec_return(
        &mut self,
        state: &mut PathState,
        value: Option<&Expression>,
    ) -> Result<(), SmtError> {
        if let Some(expr) = value {
            if let Some(base) = self.resolve_base(state, "Result") {
                match self.lower(state, expr, true) {
                    Ok((term, ty)) => {
                        let dest_ty = self.types.get(&base).cloned();
                        if let Some(dest_ty) = dest_ty
                            && let Some(sort) = sort_of(&dest_ty)
                        {
                            let term = coerce(&term, &ty, &dest_ty);
                            let alias = state.aliases.add_or_increment(&base);
                            self.script.declare_const(&alias.alias(), sort);
                            let fact = format!("(= {} {})", sym(&alias), term);
                            self.assume(state, &fact);
                        }
                    }
                    Err(e) if is_unsupported(&e) => debug!("skipping return value: {e}"),
                    Err(e) => return Err(e),
                }
            }
        }
        state.returned = true;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Call inlining
    // ------------------------------------------------------------------

    /// Inline a call to another modeled method.
    ///
    /// The callee's requires are discharged at the call site against the
    /// facts established earlier on this path, in call order; its body
    /// runs in a fresh alias scope; its ensures become known facts for
    /// the caller afterwards. A recursive call or one beyond the depth
    /// bound is not inlined: the result is havoced and exploration past
    /// it is abandoned without being reported.
    fn inline_call(
        &mut self,
        state: &mut PathState,
        name: &str,
        arguments: &[Expression],
        want_result: bool,
    ) -> Result<Option<(String, ExpressionType)>, SmtError> {
        let Some(method) = self.model.method(name).cloned() else {
            return Err(SmtError::Unsupported(format!("call to unknown method {name}")));
        };
        if want_result && !method.returns_value() {
            return Err(SmtError::Unsupported(format!(
                "void method {name} used as a value"
            )));
        }
        if arguments.len() != method.parameters.len() {
            return Err(SmtError::Unsupported(format!(
                "call to {name} with {} arguments, expected {}",
                arguments.len(),
                method.parameters.len()
            )));
        }

        if state.calls.contains(name) {
            debug!("recursion is unsupported: {} -> {name}", state.calls);
            return Ok(self.havoc_result(state, name, &method));
        }
        if state.depth >= self.max_depth {
            debug!("call to {name} beyond depth bound {}", self.max_depth);
            return Ok(self.havoc_result(state, name, &method));
        }

        // Bind arguments in the caller's scope before switching frames.
        let mut bindings = Vec::with_capacity(arguments.len());
        for (param, argument) in method.parameters.iter().zip(arguments) {
            let (term, ty) = self.lower(state, argument, true)?;
            bindings.push(coerce(&term, &ty, &param.ty));
        }

        let scope_id = self.scope_counter;
        self.scope_counter += 1;
        let prefix = sanitize_name(&format!("{name}_{scope_id}"));
        let before_aliases = state.aliases.clone();

        let saved_scope = std::mem::take(&mut state.scope);
        let saved_calls = state.calls.clone();
        let saved_returned = state.returned;
        state.calls = saved_calls.with_added_call(name);
        state.returned = false;
        state.depth += 1;

        let outcome = self.inline_frame(state, &prefix, &method, &bindings);

        let result = if outcome.is_ok() && want_result {
            self.resolve_base(state, "Result").and_then(|base| {
                state
                    .aliases
                    .alias_of(&base)
                    .map(|alias| (sym(&alias), method.return_type.clone()))
            })
        } else {
            None
        };

        if self.verbose {
            let introduced = state.aliases.alias_difference(&before_aliases);
            eprintln!("inlined {name} introducing: {}", introduced.join(", "));
        }

        state.scope = saved_scope;
        state.calls = saved_calls;
        state.returned = saved_returned;
        state.depth -= 1;

        outcome.map(|_| result)
    }

    fn inline_frame(
        &mut self,
        state: &mut PathState,
        prefix: &str,
        method: &Method,
        bindings: &[String],
    ) -> Result<(), SmtError> {
        for (param, bound) in method.parameters.iter().zip(bindings) {
            let base = format!("{prefix}_{}", param.name);
            let Some(alias) = self.declare_variable(state, &param.name, &base, &param.ty) else {
                return Err(SmtError::Unsupported(format!(
                    "parameter {} has unsupported type {}",
                    param.name, param.ty
                )));
            };
            let fact = format!("(= {} {})", sym(&alias), bound);
            self.assume(state, &fact);
        }
        for local in &method.locals {
            let base = format!("{prefix}_{}", local.name);
            if self
                .declare_variable(state, &local.name, &base, &local.ty)
                .is_none()
            {
                continue;
            }
            if let Some(init) = local.initializer.clone() {
                let alias = state.aliases.alias_of(&base).expect("declared");
                if let Ok((term, ty)) = self.lower(state, &init, false) {
                    let term = coerce(&term, &ty, &local.ty);
                    let fact = format!("(= {} {})", sym(&alias), term);
                    self.assume(state, &fact);
                }
            }
        }
        if method.returns_value() {
            let base = format!("{prefix}_Result");
            self.declare_variable(state, "Result", &base, &method.return_type);
        }

        // Each require is a proof obligation against the caller's facts,
        // then a known fact for the callee body.
        for require in &method.requires {
            match self.lower(state, &require.expression, false) {
                Ok((term, _)) => {
                    self.check_obligation(
                        state,
                        &term,
                        ViolationKind::Require,
                        &require.text,
                        Some(&method.name),
                    )?;
                    self.assume(state, &term);
                }
                Err(e) if is_unsupported(&e) => {
                    debug!("skipping require {:?}: {e}", require.text);
                }
                Err(e) => return Err(e),
            }
        }

        self.exec_statements(state, &method.body)?;

        for ensure in &method.ensures {
            match self.lower(state, &ensure.expression, false) {
                Ok((term, _)) => self.assume(state, &term),
                Err(e) if is_unsupported(&e) => {
                    debug!("skipping ensure {:?}: {e}", ensure.text);
                }
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }

    /// Fresh unconstrained constant standing in for a call that was not
    /// inlined.
    fn havoc_result(
        &mut self,
        state: &mut PathState,
        name: &str,
        method: &Method,
    ) -> Option<(String, ExpressionType)> {
        if !method.returns_value() {
            return None;
        }
        let sort = sort_of(&method.return_type)?;
        let scope_id = self.scope_counter;
        self.scope_counter += 1;
        let base = sanitize_name(&format!("{name}_{scope_id}_Result"));
        state.aliases.add_name(&base);
        self.types.insert(base.clone(), method.return_type.clone());
        let alias = state.aliases.alias_of(&base).expect("just added");
        self.script.declare_const(&alias.alias(), sort);
        Some((sym(&alias), method.return_type.clone()))
    }

    // ------------------------------------------------------------------
    // Expression lowering
    // ------------------------------------------------------------------

    fn resolve_base(&self, state: &PathState, name: &str) -> Option<String> {
        if let Some(base) = state.scope.get(name) {
            return Some(base.clone());
        }
        // Class members are visible from every frame.
        if self.model.field(name).is_some() || self.model.property(name).is_some() {
            return Some(name.to_string());
        }
        None
    }

    /// Lower an expression to a solver term, returning the term and its
    /// type. `allow_calls` is false inside contract clauses, which must
    /// stay pure.
    fn lower(
        &mut self,
        state: &mut PathState,
        expression: &Expression,
        allow_calls: bool,
    ) -> Result<(String, ExpressionType), SmtError> {
        match expression {
            Expression::BoolLiteral(b) => {
                Ok((b.to_string(), ExpressionType::Boolean))
            }
            Expression::IntLiteral(n) => Ok((int_term(*n), ExpressionType::Integer)),
            Expression::FloatLiteral(x) => {
                Ok((real_term(*x)?, ExpressionType::FloatingPoint))
            }
            Expression::NullLiteral => Ok(("0".to_string(), ExpressionType::Null)),
            Expression::Variable(path) => {
                if !path.is_simple() {
                    return Err(SmtError::Unsupported(format!("path reference {path}")));
                }
                let base = self
                    .resolve_base(state, path.root())
                    .ok_or_else(|| SmtError::UnknownVariable(path.root().to_string()))?;
                let alias = state
                    .aliases
                    .alias_of(&base)
                    .ok_or_else(|| SmtError::UnknownVariable(base.clone()))?;
                let ty = self
                    .types
                    .get(&base)
                    .cloned()
                    .ok_or_else(|| SmtError::UnknownVariable(base.clone()))?;
                Ok((sym(&alias), ty))
            }
            Expression::ResultKeyword => {
                let base = self
                    .resolve_base(state, "Result")
                    .ok_or_else(|| SmtError::UnknownVariable("Result".to_string()))?;
                let alias = state
                    .aliases
                    .alias_of(&base)
                    .ok_or_else(|| SmtError::UnknownVariable(base.clone()))?;
                let ty = self
                    .types
                    .get(&base)
                    .cloned()
                    .ok_or_else(|| SmtError::UnknownVariable(base))?;
                Ok((sym(&alias), ty))
            }
            Expression::UnaryArithmetic { operand } => {
                let (term, ty) = self.lower(state, operand, allow_calls)?;
                if !ty.is_numeric() {
                    return Err(SmtError::Unsupported(expression.to_string()));
                }
                Ok((format!("(- {term})"), ty))
            }
            Expression::BinaryArithmetic { left, op, right } => {
                let lowered_left = self.lower(state, left, allow_calls)?;
                let lowered_right = self.lower(state, right, allow_calls)?;
                lower_arithmetic(&lowered_left, *op, &lowered_right)
                    .ok_or_else(|| SmtError::Unsupported(expression.to_string()))
            }
            Expression::Comparison { left, op, right } => {
                let (lt, lty) = self.lower(state, left, allow_calls)?;
                let (rt, rty) = self.lower(state, right, allow_calls)?;
                if !lty.is_numeric() || !rty.is_numeric() {
                    return Err(SmtError::Unsupported(expression.to_string()));
                }
                let (lt, rt) = promote(&lt, &lty, &rt, &rty);
                let op = match op {
                    crate::model::ComparisonOp::Lt => "<",
                    crate::model::ComparisonOp::Le => "<=",
                    crate::model::ComparisonOp::Gt => ">",
                    crate::model::ComparisonOp::Ge => ">=",
                };
                Ok((format!("({op} {lt} {rt})"), ExpressionType::Boolean))
            }
            Expression::Equality { left, op, right } => {
                let (lt, lty) = self.lower(state, left, allow_calls)?;
                let (rt, rty) = self.lower(state, right, allow_calls)?;
                // Same sort, or a numeric pair that promotion reconciles.
                let compatible = (lty.is_numeric() && rty.is_numeric())
                    || matches!((sort_of(&lty), sort_of(&rty)), (Some(l), Some(r)) if l == r);
                if !compatible {
                    return Err(SmtError::Unsupported(expression.to_string()));
                }
                let (lt, rt) = promote(&lt, &lty, &rt, &rty);
                let eq = format!("(= {lt} {rt})");
                let term = match op {
                    crate::model::EqualityOp::Eq => eq,
                    crate::model::EqualityOp::Ne => format!("(not {eq})"),
                };
                Ok((term, ExpressionType::Boolean))
            }
            Expression::BinaryLogical { left, op, right } => {
                let (lt, lty) = self.lower(state, left, allow_calls)?;
                let (rt, rty) = self.lower(state, right, allow_calls)?;
                if lty != ExpressionType::Boolean || rty != ExpressionType::Boolean {
                    return Err(SmtError::Unsupported(expression.to_string()));
                }
                let op = match op {
                    crate::model::LogicalOp::And => "and",
                    crate::model::LogicalOp::Or => "or",
                };
                Ok((format!("({op} {lt} {rt})"), ExpressionType::Boolean))
            }
            Expression::UnaryLogical { operand } => {
                let (term, ty) = self.lower(state, operand, allow_calls)?;
                if ty != ExpressionType::Boolean {
                    return Err(SmtError::Unsupported(expression.to_string()));
                }
                Ok((format!("(not {term})"), ExpressionType::Boolean))
            }
            Expression::FunctionCall { name, arguments, .. } => {
                if !allow_calls {
                    return Err(SmtError::Unsupported(format!(
                        "call {name}(..) inside a contract clause"
                    )));
                }
                match self.inline_call(state, name, arguments, true)? {
                    Some(result) => Ok(result),
                    None => Err(SmtError::Unsupported(format!(
                        "call to {name} produced no value"
                    ))),
                }
            }
            Expression::ElementAccess { .. }
            | Expression::NewArray { .. }
            | Expression::NewObject { .. } => {
                Err(SmtError::Unsupported(expression.to_string()))
            }
            Expression::Parenthesized(inner) => self.lower(state, inner, allow_calls),
        }
    }
}

// ----------------------------------------------------------------------
// Lowering helpers
// ----------------------------------------------------------------------

fn sym(alias: &AliasName) -> String {
    sanitize_name(&alias.alias())
}

fn is_unsupported(error: &SmtError) -> bool {
    matches!(error, SmtError::Unsupported(_) | SmtError::UnknownVariable(_))
}

fn sort_of(ty: &ExpressionType) -> Option<SmtSort> {
    match ty {
        ExpressionType::Boolean => Some(SmtSort::Bool),
        ExpressionType::Integer => Some(SmtSort::Int),
        ExpressionType::FloatingPoint => Some(SmtSort::Real),
        // Object references are modeled as integers with null at zero.
        ExpressionType::Null => Some(SmtSort::Int),
        ExpressionType::Void | ExpressionType::Other(_) => None,
    }
}

fn int_term(n: i64) -> String {
    if n < 0 {
        format!("(- {})", n.unsigned_abs())
    } else {
        n.to_string()
    }
}

fn real_term(x: f64) -> Result<String, SmtError> {
    if !x.is_finite() {
        return Err(SmtError::Unsupported(format!("non-finite literal {x}")));
    }
    let abs = format!("{:?}", x.abs());
    // Scientific notation is not valid SMT-LIB decimal syntax.
    if abs.contains(['e', 'E']) {
        return Err(SmtError::Unsupported(format!(
            "literal {x} outside plain decimal range"
        )));
    }
    if x < 0.0 {
        Ok(format!("(- {abs})"))
    } else {
        Ok(abs)
    }
}

/// Promote a mixed int/real pair to real
fn promote(
    left: &str,
    left_ty: &ExpressionType,
    right: &str,
    right_ty: &ExpressionType,
) -> (String, String) {
    match (left_ty, right_ty) {
        (ExpressionType::Integer, ExpressionType::FloatingPoint) => {
            (format!("(to_real {left})"), right.to_string())
        }
        (ExpressionType::FloatingPoint, ExpressionType::Integer) => {
            (left.to_string(), format!("(to_real {right})"))
        }
        _ => (left.to_string(), right.to_string()),
    }
}

fn coerce(term: &str, from: &ExpressionType, to: &ExpressionType) -> String {
    if *from == ExpressionType::Integer && *to == ExpressionType::FloatingPoint {
        format!("(to_real {term})")
    } else {
        term.to_string()
    }
}

/// Lower binary arithmetic. Integer division and remainder use truncating
/// semantics, matching the source language rather than SMT-LIB's
/// Euclidean `div`/`mod`.
fn lower_arithmetic(
    left: &(String, ExpressionType),
    op: crate::model::ArithmeticOp,
    right: &(String, ExpressionType),
) -> Option<(String, ExpressionType)> {
    use crate::model::ArithmeticOp::*;
    let (lt, lty) = left;
    let (rt, rty) = right;
    if !lty.is_numeric() || !rty.is_numeric() {
        return None;
    }
    let both_int = *lty == ExpressionType::Integer && *rty == ExpressionType::Integer;
    let (lt, rt) = promote(lt, lty, rt, rty);
    let result_ty = if both_int {
        ExpressionType::Integer
    } else {
        ExpressionType::FloatingPoint
    };
    let term = match (op, both_int) {
        (Add, _) => format!("(+ {lt} {rt})"),
        (Sub, _) => format!("(- {lt} {rt})"),
        (Mul, _) => format!("(* {lt} {rt})"),
        (Div, false) => format!("(/ {lt} {rt})"),
        (Div, true) => truncated_div(&lt, &rt),
        (Rem, true) => truncated_rem(&lt, &rt),
        (Rem, false) => return None,
    };
    Some((term, result_ty))
}

/// SMT-LIB `div` is Euclidean (non-negative remainder). Truncated
/// division agrees for a non-negative dividend and otherwise differs by
/// one step toward zero whenever the remainder is non-zero.
fn truncated_div(a: &str, b: &str) -> String {
    format!(
        "(ite (or (>= {a} 0) (= (mod {a} {b}) 0)) (div {a} {b}) \
         (ite (> {b} 0) (+ (div {a} {b}) 1) (- (div {a} {b}) 1)))"
    )
}

fn truncated_rem(a: &str, b: &str) -> String {
    format!(
        "(ite (and (< {a} 0) (not (= (mod {a} {b}) 0))) \
         (- (mod {a} {b}) (abs {b})) (mod {a} {b}))"
    )
}

/// Names a method body assigns at top level; used by tests and the CLI
/// report to describe what a method touches.
pub fn assigned_names(statements: &[Statement]) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut names = Vec::new();
    collect_assigned(statements, &mut seen, &mut names);
    names
}

fn collect_assigned(statements: &[Statement], seen: &mut HashSet<String>, names: &mut Vec<String>) {
    for statement in statements {
        match statement {
            Statement::Assignment { destination, .. } => {
                if seen.insert(destination.clone()) {
                    names.push(destination.clone());
                }
            }
            Statement::Conditional {
                then_branch,
                else_branch,
                ..
            } => {
                collect_assigned(then_branch, seen, names);
                collect_assigned(else_branch, seen, names);
            }
            Statement::Loop { body, .. } => collect_assigned(body, seen, names),
            Statement::Return { .. } | Statement::ProcedureCall { .. } => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{
        AccessModifier, ArithmeticOp, ClassModelBuilder, ComparisonOp, EqualityOp, Field,
        Invariant, Local, Location, Parameter, Require, VariablePath,
    };

    fn var(name: &str) -> Expression {
        Expression::Variable(VariablePath::simple(name))
    }

    fn int(n: i64) -> Expression {
        Expression::IntLiteral(n)
    }

    fn eq(left: Expression, right: Expression) -> Expression {
        Expression::Equality {
            left: Box::new(left),
            op: EqualityOp::Eq,
            right: Box::new(right),
        }
    }

    fn ne(left: Expression, right: Expression) -> Expression {
        Expression::Equality {
            left: Box::new(left),
            op: EqualityOp::Ne,
            right: Box::new(right),
        }
    }

    fn int_field(name: &str, init: i64) -> Field {
        Field {
            name: name.to_string(),
            ty: ExpressionType::Integer,
            initializer: Some(int(init)),
        }
    }

    fn public_method(name: &str, body: Vec<Statement>) -> Method {
        Method {
            name: name.to_string(),
            access: AccessModifier::Public,
            is_static: false,
            parameters: vec![],
            locals: vec![],
            requires: vec![],
            ensures: vec![],
            return_type: ExpressionType::Void,
            body,
        }
    }

    /// Field `X = init`, invariant `X == expected`, one public method
    /// unconditionally assigning `assigned`.
    fn counter_model(init: i64, expected: i64, assigned: i64) -> ClassModel {
        ClassModelBuilder::new("Counter")
            .unwrap()
            .field(int_field("X", init))
            .invariant(Invariant::new(eq(var("X"), int(expected)), Location::default()))
            .method(public_method(
                "SetX",
                vec![Statement::Assignment {
                    destination: "X".to_string(),
                    value: int(assigned),
                }],
            ))
            .build()
    }

    fn quick_verifier(depth: usize) -> Verifier {
        Verifier::new()
            .with_max_depth(depth)
            .with_max_duration(Duration::from_secs(20))
            .with_solver_timeout(5)
    }

    fn solver_available() -> bool {
        Verifier::new().is_solver_available()
    }

    #[test]
    fn test_no_contracts_is_success_without_solver() {
        let model = ClassModelBuilder::new("Empty")
            .unwrap()
            .field(int_field("X", 0))
            .method(public_method("Noop", vec![]))
            .build();
        let result = quick_verifier(2).verify(&model).unwrap();
        assert_eq!(result, VerificationResult::Success);
    }

    #[test]
    fn test_zero_budget_is_timeout_not_success() {
        let model = counter_model(0, 0, 0);
        let verifier = Verifier::new()
            .with_max_depth(1)
            .with_max_duration(Duration::ZERO);
        let result = verifier.verify(&model).unwrap();
        assert!(result.is_timeout());
        assert!(!result.is_success());
    }

    #[test]
    fn test_depth_zero_checks_initializer_only() {
        if !solver_available() {
            return;
        }
        // Invariant holds after initialization; the violating assignment
        // is beyond depth 0 and must not be reported.
        let model = counter_model(5, 5, 99);
        let result = quick_verifier(0).verify(&model).unwrap();
        assert_eq!(result, VerificationResult::Success);
    }

    #[test]
    fn test_depth_zero_detects_bad_initializer() {
        if !solver_available() {
            return;
        }
        let model = counter_model(3, 5, 5);
        let result = quick_verifier(0).verify(&model).unwrap();
        let violations = result.violations();
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].kind, ViolationKind::Invariant);
        assert_eq!(violations[0].method, None);
    }

    #[test]
    fn test_depth_one_applies_assignment() {
        if !solver_available() {
            return;
        }
        // Matching assignment keeps the invariant.
        let ok = quick_verifier(1).verify(&counter_model(5, 5, 5)).unwrap();
        assert_eq!(ok, VerificationResult::Success);

        // Diverging assignment breaks it, exactly once, in SetX.
        let bad = quick_verifier(1).verify(&counter_model(5, 5, 7)).unwrap();
        let violations = bad.violations();
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].kind, ViolationKind::Invariant);
        assert_eq!(violations[0].method.as_deref(), Some("SetX"));
        assert!(violations[0].counterexample.is_some());
    }

    #[test]
    fn test_contradictory_requires_report_one_violation() {
        if !solver_available() {
            return;
        }
        let mut method = public_method("M", vec![]);
        method.parameters.push(Parameter {
            name: "x".to_string(),
            ty: ExpressionType::Integer,
        });
        method.requires.push(Require::new(
            eq(var("x"), int(0)),
            Location::default(),
            "M",
        ));
        method.requires.push(Require::new(
            ne(var("x"), int(0)),
            Location::default(),
            "M",
        ));
        let model = ClassModelBuilder::new("C").unwrap().method(method).build();

        let result = quick_verifier(2).verify(&model).unwrap();
        let violations = result.violations();
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].kind, ViolationKind::Require);
        assert_eq!(violations[0].method.as_deref(), Some("M"));
    }

    #[test]
    fn test_branch_join_reconciles_generations() {
        if !solver_available() {
            return;
        }
        // if (C) { Y = 1 } else { Y = 2 } — afterwards Y >= 1 holds but
        // Y == 1 does not.
        let branchy = |invariant: Expression| {
            let mut method = public_method(
                "Pick",
                vec![Statement::Conditional {
                    condition: Expression::Comparison {
                        left: Box::new(var("n")),
                        op: ComparisonOp::Gt,
                        right: Box::new(int(0)),
                    },
                    then_branch: vec![Statement::Assignment {
                        destination: "Y".to_string(),
                        value: int(1),
                    }],
                    else_branch: vec![Statement::Assignment {
                        destination: "Y".to_string(),
                        value: int(2),
                    }],
                }],
            );
            method.parameters.push(Parameter {
                name: "n".to_string(),
                ty: ExpressionType::Integer,
            });
            ClassModelBuilder::new("Branchy")
                .unwrap()
                .field(int_field("Y", 1))
                .invariant(Invariant::new(invariant, Location::default()))
                .method(method)
                .build()
        };

        let holds = branchy(Expression::Comparison {
            left: Box::new(var("Y")),
            op: ComparisonOp::Ge,
            right: Box::new(int(1)),
        });
        assert_eq!(
            quick_verifier(2).verify(&holds).unwrap(),
            VerificationResult::Success
        );

        let breaks = branchy(eq(var("Y"), int(1)));
        let result = quick_verifier(2).verify(&breaks).unwrap();
        assert_eq!(result.violations().len(), 1);
        assert_eq!(result.violations()[0].method.as_deref(), Some("Pick"));
    }

    #[test]
    fn test_call_inlining_binds_result() {
        if !solver_available() {
            return;
        }
        let getter = Method {
            name: "GetOne".to_string(),
            access: AccessModifier::Private,
            is_static: false,
            parameters: vec![],
            locals: vec![],
            requires: vec![],
            ensures: vec![],
            return_type: ExpressionType::Integer,
            body: vec![Statement::Return {
                value: Some(int(1)),
            }],
        };
        let model = ClassModelBuilder::new("Caller")
            .unwrap()
            .field(int_field("X", 1))
            .invariant(Invariant::new(eq(var("X"), int(1)), Location::default()))
            .method(getter)
            .method(public_method(
                "Refresh",
                vec![Statement::Assignment {
                    destination: "X".to_string(),
                    value: Expression::FunctionCall {
                        kind: crate::model::CallKind::Private,
                        name: "GetOne".to_string(),
                        arguments: vec![],
                    },
                }],
            ))
            .build();

        let result = quick_verifier(3).verify(&model).unwrap();
        assert_eq!(result, VerificationResult::Success);
    }

    #[test]
    fn test_call_site_require_violation() {
        if !solver_available() {
            return;
        }
        let mut callee = public_method("NeedPositive", vec![]);
        callee.access = AccessModifier::Private;
        callee.parameters.push(Parameter {
            name: "v".to_string(),
            ty: ExpressionType::Integer,
        });
        callee.requires.push(Require::new(
            Expression::Comparison {
                left: Box::new(var("v")),
                op: ComparisonOp::Gt,
                right: Box::new(int(0)),
            },
            Location::default(),
            "NeedPositive",
        ));
        let model = ClassModelBuilder::new("C")
            .unwrap()
            .method(callee)
            .method(public_method(
                "CallWithZero",
                vec![Statement::ProcedureCall {
                    kind: crate::model::CallKind::Private,
                    name: "NeedPositive".to_string(),
                    arguments: vec![int(0)],
                }],
            ))
            .build();

        let result = quick_verifier(3).verify(&model).unwrap();
        let violations = result.violations();
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].kind, ViolationKind::Require);
        assert_eq!(violations[0].method.as_deref(), Some("NeedPositive"));
        assert_eq!(violations[0].text, "v > 0");
    }

    #[test]
    fn test_recursion_is_abandoned_not_fatal() {
        if !solver_available() {
            return;
        }
        let recursive = public_method(
            "Spin",
            vec![Statement::ProcedureCall {
                kind: crate::model::CallKind::Public,
                name: "Spin".to_string(),
                arguments: vec![],
            }],
        );
        let model = ClassModelBuilder::new("C").unwrap().method(recursive).build();
        let result = quick_verifier(3).verify(&model).unwrap();
        assert_eq!(result, VerificationResult::Success);
    }

    #[test]
    fn test_loop_unrolls_within_bound() {
        if !solver_available() {
            return;
        }
        // i starts at 0; loop body runs while i < 1 and sets i = i + 1.
        // After bounded unrolling i <= 1 must hold.
        let mut method = public_method(
            "Count",
            vec![Statement::Loop {
                condition: Expression::Comparison {
                    left: Box::new(var("i")),
                    op: ComparisonOp::Lt,
                    right: Box::new(int(1)),
                },
                body: vec![Statement::Assignment {
                    destination: "i".to_string(),
                    value: Expression::BinaryArithmetic {
                        left: Box::new(var("i")),
                        op: ArithmeticOp::Add,
                        right: Box::new(int(1)),
                    },
                }],
            }],
        );
        method.locals.push(Local {
            name: "i".to_string(),
            ty: ExpressionType::Integer,
            initializer: Some(int(0)),
        });
        method.ensures.push(crate::model::Ensure::new(
            Expression::Comparison {
                left: Box::new(var("i")),
                op: ComparisonOp::Le,
                right: Box::new(int(1)),
            },
            Location::default(),
            "Count",
        ));
        let model = ClassModelBuilder::new("C").unwrap().method(method).build();
        let result = quick_verifier(3).verify(&model).unwrap();
        assert_eq!(result, VerificationResult::Success);
    }

    #[test]
    fn test_unsupported_constructs_do_not_abort() {
        if !solver_available() {
            return;
        }
        // The element access is not modeled; the invariant on X still is.
        let model = ClassModelBuilder::new("C")
            .unwrap()
            .field(int_field("X", 1))
            .invariant(Invariant::new(eq(var("X"), int(1)), Location::default()))
            .method(public_method(
                "Touch",
                vec![Statement::Assignment {
                    destination: "X".to_string(),
                    value: Expression::ElementAccess {
                        variable: VariablePath::simple("Items"),
                        index: Box::new(int(0)),
                    },
                }],
            ))
            .build();
        let result = quick_verifier(2).verify(&model).unwrap();
        // X is havoced by the unsupported assignment, so the invariant
        // can no longer be proven after Touch.
        assert_eq!(result.violations().len(), 1);
        assert_eq!(result.violations()[0].kind, ViolationKind::Invariant);
    }

    #[test]
    fn test_ill_typed_equality_is_skipped_not_timeout() {
        // `X == true` with X: int has no common sort; the clause must be
        // dropped like other unsupported constructs, not handed to the
        // solver as a malformed script.
        let model = ClassModelBuilder::new("Mixed")
            .unwrap()
            .field(int_field("X", 0))
            .invariant(Invariant::new(
                eq(var("X"), Expression::BoolLiteral(true)),
                Location::default(),
            ))
            .build();
        // The sole obligation is skipped, so no solver is needed.
        let result = quick_verifier(0).verify(&model).unwrap();
        assert_eq!(result, VerificationResult::Success);
        assert!(!result.is_timeout());
    }

    #[test]
    fn test_truncated_division_encoding() {
        if !solver_available() {
            return;
        }
        // -7 / 2 truncates toward zero: Result == -3, remainder -1.
        let mut method = public_method("Div", vec![]);
        method.return_type = ExpressionType::Integer;
        method.body = vec![Statement::Return {
            value: Some(Expression::BinaryArithmetic {
                left: Box::new(int(-7)),
                op: ArithmeticOp::Div,
                right: Box::new(int(2)),
            }),
        }];
        method.ensures.push(crate::model::Ensure::new(
            eq(Expression::ResultKeyword, int(-3)),
            Location::default(),
            "Div",
        ));
        let model = ClassModelBuilder::new("C").unwrap().method(method).build();
        assert_eq!(
            quick_verifier(2).verify(&model).unwrap(),
            VerificationResult::Success
        );
    }

    #[test]
    fn test_deterministic_classification() {
        if !solver_available() {
            return;
        }
        let model = counter_model(5, 5, 7);
        let first = quick_verifier(1).verify(&model).unwrap();
        let second = quick_verifier(1).verify(&model).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_assigned_names_collects_nested() {
        let statements = vec![
            Statement::Assignment {
                destination: "a".to_string(),
                value: int(1),
            },
            Statement::Conditional {
                condition: Expression::BoolLiteral(true),
                then_branch: vec![Statement::Assignment {
                    destination: "b".to_string(),
                    value: int(2),
                }],
                else_branch: vec![Statement::Assignment {
                    destination: "a".to_string(),
                    value: int(3),
                }],
            },
        ];
        assert_eq!(assigned_names(&statements), vec!["a", "b"]);
    }
}
