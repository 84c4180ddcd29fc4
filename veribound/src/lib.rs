//! Veribound Library
//!
//! Bounded contract verification for class models. Require/Ensure/Invariant
//! clauses are discharged to an SMT solver by a symbolic-execution engine
//! that runs in an isolated worker process.

pub mod error;
pub mod manager;
pub mod model;
pub mod smt;
pub mod transport;
pub mod verifier;
pub mod worker;

pub use error::{Result, VeriboundError};
pub use manager::{ClassModelManager, ManagerOptions, StartMode, WorkerBackend};
pub use model::{ClassModel, ClassModelBuilder, Expression, ExpressionType};
pub use verifier::{ContractViolation, VerificationResult, Verifier, ViolationKind};
