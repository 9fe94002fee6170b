use std::collections::HashMap;

use log::warn;

/// Ordered column names with a name -> position lookup kept in sync.
///
/// Every mutation goes through this type so `position(names()[i]) == Some(i)`
/// holds for all unique names. A name pushed twice yields a duplicate entry and
/// the lookup resolves to the newest position.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ColumnIndex {
    names: Vec<String>,
    positions: HashMap<String, usize>,
}

impl ColumnIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut index = Self::new();
        index.set(names);
        index
    }

    /// Append `name` at the next free position and return that position.
    pub fn push(&mut self, name: impl Into<String>) -> usize {
        let name = name.into();
        let position = self.names.len();
        if let Some(existing) = self.positions.get(&name) {
            warn!(
                "adding degenerate column '{}' at {} (exists at {})",
                name, position, existing
            );
        }
        self.positions.insert(name.clone(), position);
        self.names.push(name);
        position
    }

    /// Replace every name and rebuild the lookup.
    pub fn set<I, S>(&mut self, names: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.names = names.into_iter().map(Into::into).collect();
        self.positions = self
            .names
            .iter()
            .enumerate()
            .map(|(idx, name)| (name.clone(), idx))
            .collect();
    }

    pub fn swap(&mut self, a: usize, b: usize) {
        self.names.swap(a, b);
        self.positions.insert(self.names[a].clone(), a);
        self.positions.insert(self.names[b].clone(), b);
    }

    pub fn position(&self, name: &str) -> Option<usize> {
        self.positions.get(name).copied()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.positions.contains_key(name)
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_assigns_sequential_positions() {
        let mut index = ColumnIndex::new();
        assert_eq!(index.push("a"), 0);
        assert_eq!(index.push("b"), 1);
        assert_eq!(index.position("b"), Some(1));
        assert_eq!(index.position("c"), None);
    }

    #[test]
    fn duplicate_push_points_to_newest() {
        let mut index = ColumnIndex::new();
        index.push("a");
        index.push("a");
        assert_eq!(index.len(), 2);
        assert_eq!(index.position("a"), Some(1));
    }

    #[test]
    fn swap_keeps_lookup_inverse() {
        let mut index = ColumnIndex::from_names(["x", "y", "z"]);
        index.swap(0, 2);
        assert_eq!(index.names(), &["z", "y", "x"]);
        for (idx, name) in index.names().iter().enumerate() {
            assert_eq!(index.position(name), Some(idx));
        }
    }
}
