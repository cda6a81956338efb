//! Set differences for membership-style attributes.
//!
//! Group members and space access lists are sets on the Lightdash side;
//! updates are applied as "add these, remove those, change these roles"
//! rather than replacing the whole list.

use std::collections::{BTreeMap, BTreeSet};

/// Members to add and remove to get from `current` to `desired`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SetDiff<'a> {
    /// In `desired` but not in `current`, sorted.
    pub to_add: Vec<&'a str>,
    /// In `current` but not in `desired`, sorted.
    pub to_remove: Vec<&'a str>,
}

impl SetDiff<'_> {
    /// Whether the two sets were already equal.
    pub fn is_empty(&self) -> bool {
        self.to_add.is_empty() && self.to_remove.is_empty()
    }
}

/// Compute the additions and removals between two identifier lists.
///
/// Duplicates in either list are ignored.
pub fn diff_sets<'a>(current: &'a [String], desired: &'a [String]) -> SetDiff<'a> {
    let current: BTreeSet<&str> = current.iter().map(String::as_str).collect();
    let desired: BTreeSet<&str> = desired.iter().map(String::as_str).collect();

    SetDiff {
        to_add: desired.difference(&current).copied().collect(),
        to_remove: current.difference(&desired).copied().collect(),
    }
}

/// Changes between two `key -> role` assignments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssignmentDiff<'a, R> {
    /// Keys to grant, with their role.
    pub to_add: Vec<(&'a str, R)>,
    /// Keys whose role changes, with the new role.
    pub to_update: Vec<(&'a str, R)>,
    /// Keys to revoke.
    pub to_remove: Vec<&'a str>,
}

impl<R> AssignmentDiff<'_, R> {
    /// Whether the two assignments were already equal.
    pub fn is_empty(&self) -> bool {
        self.to_add.is_empty() && self.to_update.is_empty() && self.to_remove.is_empty()
    }
}

/// Compute grants, role changes, and revocations between two assignments.
///
/// When a key appears more than once in a list, its last role wins.
pub fn diff_assignments<'a, R>(
    current: &'a [(String, R)],
    desired: &'a [(String, R)],
) -> AssignmentDiff<'a, R>
where
    R: Copy + PartialEq,
{
    let current: BTreeMap<&str, R> = current.iter().map(|(k, r)| (k.as_str(), *r)).collect();
    let desired: BTreeMap<&str, R> = desired.iter().map(|(k, r)| (k.as_str(), *r)).collect();

    let mut to_add = Vec::new();
    let mut to_update = Vec::new();
    for (key, role) in &desired {
        match current.get(key) {
            None => to_add.push((*key, *role)),
            Some(existing) if existing != role => to_update.push((*key, *role)),
            Some(_) => {}
        }
    }
    let to_remove = current
        .keys()
        .filter(|key| !desired.contains_key(*key))
        .copied()
        .collect();

    AssignmentDiff {
        to_add,
        to_update,
        to_remove,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(values: &[&str]) -> Vec<String> {
        values.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_diff_sets() {
        let current = ids(&["u1", "u2", "u3"]);
        let desired = ids(&["u4", "u2", "u1", "u4"]);

        let diff = diff_sets(&current, &desired);
        assert_eq!(diff.to_add, vec!["u4"]);
        assert_eq!(diff.to_remove, vec!["u3"]);
        assert!(!diff.is_empty());
    }

    #[test]
    fn test_diff_sets_equal() {
        let current = ids(&["b", "a"]);
        let desired = ids(&["a", "b"]);
        assert!(diff_sets(&current, &desired).is_empty());
    }

    #[test]
    fn test_diff_assignments() {
        let current = vec![
            ("u1".to_string(), 'v'),
            ("u2".to_string(), 'e'),
            ("u3".to_string(), 'a'),
        ];
        let desired = vec![
            ("u1".to_string(), 'v'),
            ("u2".to_string(), 'a'),
            ("u4".to_string(), 'e'),
        ];

        let diff = diff_assignments(&current, &desired);
        assert_eq!(diff.to_add, vec![("u4", 'e')]);
        assert_eq!(diff.to_update, vec![("u2", 'a')]);
        assert_eq!(diff.to_remove, vec!["u3"]);
    }

    #[test]
    fn test_diff_assignments_empty() {
        let current: Vec<(String, u8)> = vec![];
        let diff = diff_assignments(&current, &current);
        assert!(diff.is_empty());
    }
}
