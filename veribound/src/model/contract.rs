//! Contract clauses lifted from source annotations

use serde::{Deserialize, Serialize};
use std::fmt;

use super::Expression;

/// Byte range of a clause in the analyzed source
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    pub start: usize,
    pub end: usize,
}

impl Location {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..{}", self.start, self.end)
    }
}

/// Precondition clause of a method
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Require {
    /// Rendered source text, used verbatim in diagnostics
    pub text: String,
    pub expression: Expression,
    pub location: Location,
    /// Name of the owning method
    pub method: String,
}

impl Require {
    pub fn new(expression: Expression, location: Location, method: impl Into<String>) -> Self {
        Self {
            text: expression.to_string(),
            expression,
            location,
            method: method.into(),
        }
    }
}

/// Postcondition clause of a method
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ensure {
    pub text: String,
    pub expression: Expression,
    pub location: Location,
    pub method: String,
}

impl Ensure {
    pub fn new(expression: Expression, location: Location, method: impl Into<String>) -> Self {
        Self {
            text: expression.to_string(),
            expression,
            location,
            method: method.into(),
        }
    }
}

/// Class invariant clause; holds no owning method
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Invariant {
    pub text: String,
    pub expression: Expression,
    pub location: Location,
}

impl Invariant {
    pub fn new(expression: Expression, location: Location) -> Self {
        Self {
            text: expression.to_string(),
            expression,
            location,
        }
    }
}

/// Construct the analyzer saw but the verifier does not model.
///
/// Unsupported constructs never abort verification; they are reported and
/// the supported remainder of the class is verified.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnsupportedConstruct {
    pub text: String,
    pub location: Location,
}

impl UnsupportedConstruct {
    pub fn new(text: impl Into<String>, location: Location) -> Self {
        Self {
            text: text.into(),
            location,
        }
    }
}

impl fmt::Display for UnsupportedConstruct {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unsupported construct at {}: {}", self.location, self.text)
    }
}
