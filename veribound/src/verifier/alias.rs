//! SSA-style alias tracking
//!
//! Each variable carries a generation counter per symbolic-execution path.
//! The solver sees one constant per generation; assignments bump the
//! generation, branch forks clone the table, and joins reconcile by
//! taking the maximum generation on both sides.

use std::collections::BTreeMap;
use std::fmt;

/// A numbered, immutable version of a variable within one path
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AliasName {
    pub name: String,
    pub generation: u32,
}

impl AliasName {
    pub fn new(name: impl Into<String>, generation: u32) -> Self {
        Self {
            name: name.into(),
            generation,
        }
    }

    /// Symbol name handed to the solver
    pub fn alias(&self) -> String {
        format!("{}_{}", self.name, self.generation)
    }
}

impl fmt::Display for AliasName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.name, self.generation)
    }
}

/// Per-variable generation counters for one symbolic-execution path.
///
/// Every name ever added stays in the table for its lifetime, and a
/// generation only ever increases. BTreeMap keeps iteration, and with it
/// solver output, deterministic across runs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AliasTable {
    entries: BTreeMap<String, u32>,
}

impl AliasTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a name at generation 0. Re-adding an existing name keeps
    /// its current generation.
    pub fn add_name(&mut self, name: &str) {
        self.entries.entry(name.to_string()).or_insert(0);
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn generation_of(&self, name: &str) -> Option<u32> {
        self.entries.get(name).copied()
    }

    /// Current solver symbol for a name
    pub fn alias_of(&self, name: &str) -> Option<AliasName> {
        self.entries
            .get(name)
            .map(|g| AliasName::new(name.to_string(), *g))
    }

    /// Bump the generation after an assignment; the name must exist.
    pub fn increment(&mut self, name: &str) -> Option<AliasName> {
        let generation = self.entries.get_mut(name)?;
        *generation += 1;
        Some(AliasName::new(name.to_string(), *generation))
    }

    /// Bump the generation, registering the name first if needed
    pub fn add_or_increment(&mut self, name: &str) -> AliasName {
        self.add_name(name);
        self.increment(name).expect("name was just added")
    }

    /// Reconcile with the table of the other branch at a join point.
    ///
    /// For every shared name the result generation is the maximum of both
    /// sides; names known only to `other` are adopted as-is. The returned
    /// list holds the shared names whose generations differed, in table
    /// order: those are the ones the caller must reconcile with an
    /// if-then-else assertion. Merging identical tables is a no-op.
    pub fn merge(&mut self, other: &AliasTable) -> Vec<String> {
        let mut updated = Vec::new();
        for (name, other_gen) in &other.entries {
            match self.entries.get_mut(name) {
                Some(self_gen) => {
                    if *self_gen != *other_gen {
                        updated.push(name.clone());
                        *self_gen = (*self_gen).max(*other_gen);
                    }
                }
                None => {
                    self.entries.insert(name.clone(), *other_gen);
                }
            }
        }
        updated
    }

    /// Alias strings present in self but not in other; isolates names (or
    /// generations) scoped more narrowly than the reference table.
    pub fn alias_difference(&self, other: &AliasTable) -> Vec<String> {
        self.entries
            .iter()
            .filter(|(name, generation)| other.entries.get(*name) != Some(generation))
            .map(|(name, generation)| format!("{name}_{generation}"))
            .collect()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_name_starts_at_generation_zero() {
        let mut table = AliasTable::new();
        table.add_name("X");
        assert_eq!(table.alias_of("X").unwrap().alias(), "X_0");
    }

    #[test]
    fn test_re_adding_keeps_generation() {
        let mut table = AliasTable::new();
        table.add_name("X");
        table.increment("X");
        table.add_name("X");
        assert_eq!(table.generation_of("X"), Some(1));
    }

    #[test]
    fn test_increment_bumps_generation() {
        let mut table = AliasTable::new();
        table.add_name("X");
        assert_eq!(table.increment("X").unwrap().alias(), "X_1");
        assert_eq!(table.increment("X").unwrap().alias(), "X_2");
    }

    #[test]
    fn test_increment_unknown_name() {
        let mut table = AliasTable::new();
        assert!(table.increment("X").is_none());
    }

    #[test]
    fn test_add_or_increment_creates_then_bumps() {
        let mut table = AliasTable::new();
        assert_eq!(table.add_or_increment("X").alias(), "X_1");
        assert_eq!(table.add_or_increment("X").alias(), "X_2");
    }

    #[test]
    fn test_clone_forks_independently() {
        let mut table = AliasTable::new();
        table.add_name("X");
        let mut fork = table.clone();
        fork.increment("X");
        assert_eq!(table.generation_of("X"), Some(0));
        assert_eq!(fork.generation_of("X"), Some(1));
    }

    #[test]
    fn test_merge_identical_is_noop() {
        let mut table = AliasTable::new();
        table.add_name("X");
        table.add_name("Y");
        let copy = table.clone();
        let updated = table.merge(&copy);
        assert!(updated.is_empty());
        assert_eq!(table, copy);
    }

    #[test]
    fn test_merge_takes_max_and_reports_updated() {
        let mut left = AliasTable::new();
        left.add_name("X");
        let mut right = left.clone();
        right.increment("X");

        let updated = left.merge(&right);
        assert_eq!(updated, vec!["X".to_string()]);
        assert_eq!(left.generation_of("X"), Some(1));
    }

    #[test]
    fn test_merge_is_symmetric_on_updated_names() {
        let mut a = AliasTable::new();
        a.add_name("X");
        let mut b = a.clone();
        a.increment("X");

        let mut a2 = b.clone();
        let from_b_side = a2.merge(&a);
        let from_a_side = a.merge(&b);
        assert_eq!(from_a_side, from_b_side);
        assert_eq!(a.generation_of("X"), Some(1));
        assert_eq!(a2.generation_of("X"), Some(1));
    }

    #[test]
    fn test_merge_adopts_unknown_names() {
        let mut left = AliasTable::new();
        let mut right = AliasTable::new();
        right.add_name("Y");
        right.increment("Y");

        let updated = left.merge(&right);
        assert!(updated.is_empty());
        assert_eq!(left.generation_of("Y"), Some(1));
    }

    #[test]
    fn test_alias_difference() {
        let mut base = AliasTable::new();
        base.add_name("X");
        let mut extended = base.clone();
        extended.add_name("tmp");
        extended.increment("X");

        let diff = extended.alias_difference(&base);
        assert_eq!(diff, vec!["X_1".to_string(), "tmp_0".to_string()]);
        assert!(base.alias_difference(&base).is_empty());
    }

    #[test]
    fn test_names_iteration_is_sorted() {
        let mut table = AliasTable::new();
        table.add_name("b");
        table.add_name("a");
        let names: Vec<&str> = table.names().collect();
        assert_eq!(names, vec!["a", "b"]);
    }
}
