//! Call-stack tracking for method inlining
//!
//! A persistent, copy-on-append sequence of the methods currently being
//! inlined. One call site can fork several independent inlining paths from
//! a shared prefix; the membership test is the recursion guard.

use std::fmt;

/// Immutable sequence of method names on the inlining stack
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallSequence {
    methods: Vec<String>,
}

impl CallSequence {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return a new sequence with `method` appended; the receiver is
    /// never mutated.
    pub fn with_added_call(&self, method: &str) -> Self {
        let mut methods = self.methods.clone();
        methods.push(method.to_string());
        Self { methods }
    }

    pub fn is_empty(&self) -> bool {
        self.methods.is_empty()
    }

    pub fn len(&self) -> usize {
        self.methods.len()
    }

    /// True if the method is already being inlined on this path; calling
    /// into it again would be direct or mutual recursion.
    pub fn contains(&self, method: &str) -> bool {
        self.methods.iter().any(|m| m == method)
    }

    /// Methods in call order
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.methods.iter().map(String::as_str)
    }
}

impl fmt::Display for CallSequence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.methods.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_with_added_call_leaves_receiver_unchanged() {
        let empty = CallSequence::new();
        let one = empty.with_added_call("m1");
        assert!(empty.is_empty());
        assert!(!one.is_empty());
        assert_eq!(one.len(), 1);
    }

    #[test]
    fn test_forking_from_shared_prefix() {
        let base = CallSequence::new().with_added_call("outer");
        let left = base.with_added_call("left");
        let right = base.with_added_call("right");
        assert!(left.contains("left") && !left.contains("right"));
        assert!(right.contains("right") && !right.contains("left"));
        assert_eq!(base.len(), 1);
    }

    #[test]
    fn test_contains_detects_recursion() {
        let seq = CallSequence::new().with_added_call("m1").with_added_call("m2");
        assert!(seq.contains("m1"));
        assert!(seq.contains("m2"));
        assert!(!seq.contains("m3"));
    }

    #[test]
    fn test_display_joins_in_call_order() {
        let seq = CallSequence::new().with_added_call("m1").with_added_call("m2");
        assert_eq!(seq.to_string(), "m1, m2");
        assert_eq!(CallSequence::new().to_string(), "");
    }

    #[test]
    fn test_iteration_order() {
        let seq = CallSequence::new().with_added_call("a").with_added_call("b");
        let order: Vec<&str> = seq.iter().collect();
        assert_eq!(order, vec!["a", "b"]);
    }
}
