//! Project member roles and the highest-wins role normalizer.
//!
//! A project member can be declared in several role lists at once (for
//! example once directly and once through a shared module). Lightdash only
//! stores one role per member, so before the lists are applied they are
//! reconciled: every user keeps the most privileged role it was given and is
//! dropped from every lower list.
//!
//! # Example
//!
//! ```
//! use lightdash_provider::members::{normalize_project_members, ProjectMembers};
//!
//! let input = ProjectMembers {
//!     admins: vec!["alice".into()],
//!     editors: vec!["bob".into(), "alice".into()],
//!     viewers: vec!["bob".into(), "carol".into()],
//!     ..Default::default()
//! };
//!
//! let normalized = normalize_project_members(&input);
//! assert_eq!(normalized.admins, vec!["alice"]);
//! assert_eq!(normalized.editors, vec!["bob"]);
//! assert_eq!(normalized.viewers, vec!["carol"]);
//! ```

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ProviderError;

/// Role of a member inside a Lightdash project, ordered by privilege.
///
/// The derived ordering is the precedence used by
/// [`normalize_project_members`]: `Viewer < InteractiveViewer < Editor <
/// Developer < Admin`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProjectMemberRole {
    /// Read-only access to charts and dashboards.
    Viewer,
    /// Viewer that can also explore and filter.
    InteractiveViewer,
    /// Can create and edit content.
    Editor,
    /// Editor that can also manage the dbt connection and SQL runner.
    Developer,
    /// Full control over the project.
    Admin,
}

impl ProjectMemberRole {
    /// All roles from lowest to highest precedence.
    pub const ALL: [ProjectMemberRole; 5] = [
        Self::Viewer,
        Self::InteractiveViewer,
        Self::Editor,
        Self::Developer,
        Self::Admin,
    ];

    /// Wire name of the role as used by the Lightdash API.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Viewer => "viewer",
            Self::InteractiveViewer => "interactive_viewer",
            Self::Editor => "editor",
            Self::Developer => "developer",
            Self::Admin => "admin",
        }
    }

    /// Wire names of every role, lowest first.
    pub fn names() -> Vec<&'static str> {
        Self::ALL.iter().map(Self::as_str).collect()
    }
}

impl fmt::Display for ProjectMemberRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProjectMemberRole {
    type Err = ProviderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|role| role.as_str() == s)
            .ok_or_else(|| {
                ProviderError::Validation(format!(
                    "invalid project role '{}', expected one of: {}",
                    s,
                    Self::names().join(", ")
                ))
            })
    }
}

/// Member identifiers grouped by project role.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectMembers {
    /// Members with the `admin` role.
    #[serde(default)]
    pub admins: Vec<String>,
    /// Members with the `developer` role.
    #[serde(default)]
    pub developers: Vec<String>,
    /// Members with the `editor` role.
    #[serde(default)]
    pub editors: Vec<String>,
    /// Members with the `interactive_viewer` role.
    #[serde(default)]
    pub interactive_viewers: Vec<String>,
    /// Members with the `viewer` role.
    #[serde(default)]
    pub viewers: Vec<String>,
}

impl ProjectMembers {
    /// The member list for a role.
    pub fn bucket(&self, role: ProjectMemberRole) -> &[String] {
        match role {
            ProjectMemberRole::Admin => &self.admins,
            ProjectMemberRole::Developer => &self.developers,
            ProjectMemberRole::Editor => &self.editors,
            ProjectMemberRole::InteractiveViewer => &self.interactive_viewers,
            ProjectMemberRole::Viewer => &self.viewers,
        }
    }

    fn bucket_mut(&mut self, role: ProjectMemberRole) -> &mut Vec<String> {
        match role {
            ProjectMemberRole::Admin => &mut self.admins,
            ProjectMemberRole::Developer => &mut self.developers,
            ProjectMemberRole::Editor => &mut self.editors,
            ProjectMemberRole::InteractiveViewer => &mut self.interactive_viewers,
            ProjectMemberRole::Viewer => &mut self.viewers,
        }
    }

    /// Every `(identifier, role)` pair, in role order then list order.
    pub fn assignments(&self) -> impl Iterator<Item = (&str, ProjectMemberRole)> {
        ProjectMemberRole::ALL.into_iter().flat_map(move |role| {
            self.bucket(role)
                .iter()
                .map(move |identifier| (identifier.as_str(), role))
        })
    }

    /// Shorthand for [`normalize_project_members`].
    pub fn normalize(&self) -> ProjectMembers {
        normalize_project_members(self)
    }
}

/// Reconcile overlapping role lists so each member keeps only its highest role.
///
/// Every identifier in the output appears in exactly one list: the most
/// privileged one it was given in `input`. Duplicates collapse and each list
/// is sorted ascending, so the result is stable across runs.
pub fn normalize_project_members(input: &ProjectMembers) -> ProjectMembers {
    let mut highest: BTreeMap<&str, ProjectMemberRole> = BTreeMap::new();
    for (identifier, role) in input.assignments() {
        highest
            .entry(identifier)
            .and_modify(|current| *current = (*current).max(role))
            .or_insert(role);
    }

    let mut buckets: BTreeMap<ProjectMemberRole, BTreeSet<&str>> = BTreeMap::new();
    for (identifier, role) in highest {
        buckets.entry(role).or_default().insert(identifier);
    }

    let mut output = ProjectMembers::default();
    for (role, identifiers) in buckets {
        *output.bucket_mut(role) = identifiers.into_iter().map(str::to_owned).collect();
    }
    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn strings(values: &[&str]) -> Vec<String> {
        values.iter().map(|s| s.to_string()).collect()
    }

    fn members(
        admins: &[&str],
        developers: &[&str],
        editors: &[&str],
        interactive_viewers: &[&str],
        viewers: &[&str],
    ) -> ProjectMembers {
        ProjectMembers {
            admins: strings(admins),
            developers: strings(developers),
            editors: strings(editors),
            interactive_viewers: strings(interactive_viewers),
            viewers: strings(viewers),
        }
    }

    #[test]
    fn test_role_ordering() {
        assert!(ProjectMemberRole::Viewer < ProjectMemberRole::InteractiveViewer);
        assert!(ProjectMemberRole::InteractiveViewer < ProjectMemberRole::Editor);
        assert!(ProjectMemberRole::Editor < ProjectMemberRole::Developer);
        assert!(ProjectMemberRole::Developer < ProjectMemberRole::Admin);
    }

    #[test]
    fn test_role_parse() {
        assert_eq!(
            "interactive_viewer".parse::<ProjectMemberRole>().unwrap(),
            ProjectMemberRole::InteractiveViewer
        );
        assert_eq!("admin".parse::<ProjectMemberRole>().unwrap(), ProjectMemberRole::Admin);

        let err = "owner".parse::<ProjectMemberRole>().unwrap_err();
        assert!(err.to_string().contains("invalid project role 'owner'"));
    }

    #[test]
    fn test_role_serde_names() {
        let json = serde_json::to_value(ProjectMemberRole::InteractiveViewer).unwrap();
        assert_eq!(json, serde_json::json!("interactive_viewer"));

        for role in ProjectMemberRole::ALL {
            let back: ProjectMemberRole =
                serde_json::from_value(serde_json::json!(role.as_str())).unwrap();
            assert_eq!(back, role);
        }
    }

    #[test]
    fn test_no_overlap_is_unchanged() {
        let input = members(&["admin1"], &["dev1"], &["editor1"], &["iv1"], &["viewer1"]);
        assert_eq!(normalize_project_members(&input), input);
    }

    #[test]
    fn test_overlap_keeps_highest_role() {
        let input = members(
            &["admin1", "admin2"],
            &["dev1", "admin1"],
            &["editor1", "dev1"],
            &["iv1", "editor1"],
            &["viewer1", "iv1"],
        );
        let expected = members(&["admin1", "admin2"], &["dev1"], &["editor1"], &["iv1"], &["viewer1"]);
        assert_eq!(normalize_project_members(&input), expected);
    }

    #[test]
    fn test_all_empty() {
        let output = normalize_project_members(&ProjectMembers::default());
        for role in ProjectMemberRole::ALL {
            assert!(output.bucket(role).is_empty());
        }

        let json = serde_json::to_value(&output).unwrap();
        assert_eq!(json["admins"], serde_json::json!([]));
        assert_eq!(json["viewers"], serde_json::json!([]));
    }

    #[test]
    fn test_sparse_tiers() {
        let input = members(&["admin1"], &[], &["editor1"], &[], &["viewer1"]);
        assert_eq!(normalize_project_members(&input), input);
    }

    #[test]
    fn test_duplicate_in_one_tier() {
        let input = members(&["x", "x"], &[], &[], &[], &[]);
        assert_eq!(normalize_project_members(&input), members(&["x"], &[], &[], &[], &[]));
    }

    #[test]
    fn test_member_in_every_tier_is_admin() {
        let input = members(&["u"], &["u"], &["u"], &["u"], &["u"]);
        assert_eq!(normalize_project_members(&input), members(&["u"], &[], &[], &[], &[]));
    }

    #[test]
    fn test_output_is_sorted() {
        let input = members(&[], &[], &["zed", "amy", "mo"], &[], &["b", "a"]);
        let output = input.normalize();
        assert_eq!(output.editors, strings(&["amy", "mo", "zed"]));
        assert_eq!(output.viewers, strings(&["a", "b"]));
    }

    #[test]
    fn test_assignments_order() {
        let input = members(&["a"], &[], &[], &[], &["v"]);
        let pairs: Vec<_> = input.assignments().collect();
        assert_eq!(
            pairs,
            vec![("v", ProjectMemberRole::Viewer), ("a", ProjectMemberRole::Admin)]
        );
    }

    fn arb_members() -> impl Strategy<Value = ProjectMembers> {
        let ids = || prop::collection::vec("[a-e]{1,2}", 0..8);
        (ids(), ids(), ids(), ids(), ids()).prop_map(
            |(admins, developers, editors, interactive_viewers, viewers)| ProjectMembers {
                admins,
                developers,
                editors,
                interactive_viewers,
                viewers,
            },
        )
    }

    proptest! {
        #[test]
        fn prop_reapplying_is_a_no_op(input in arb_members()) {
            let once = normalize_project_members(&input);
            let twice = normalize_project_members(&once);
            prop_assert_eq!(once, twice);
        }

        #[test]
        fn prop_every_identifier_kept_exactly_once(input in arb_members()) {
            let output = normalize_project_members(&input);

            let distinct_in: BTreeSet<&str> = input.assignments().map(|(id, _)| id).collect();
            let all_out: Vec<&str> = output.assignments().map(|(id, _)| id).collect();
            let distinct_out: BTreeSet<&str> = all_out.iter().copied().collect();

            prop_assert_eq!(all_out.len(), distinct_out.len());
            prop_assert_eq!(distinct_in, distinct_out);
        }

        #[test]
        fn prop_highest_role_wins(input in arb_members()) {
            let output = normalize_project_members(&input);
            for (identifier, role) in input.assignments() {
                let (_, assigned) = output
                    .assignments()
                    .find(|(id, _)| *id == identifier)
                    .expect("identifier must survive normalization");
                prop_assert!(assigned >= role);
            }
        }

        #[test]
        fn prop_buckets_sorted_and_deterministic(input in arb_members()) {
            let first = normalize_project_members(&input);
            let second = normalize_project_members(&input);
            for role in ProjectMemberRole::ALL {
                let bucket = first.bucket(role);
                prop_assert!(bucket.windows(2).all(|pair| pair[0] < pair[1]));
            }
            prop_assert_eq!(
                serde_json::to_vec(&first).unwrap(),
                serde_json::to_vec(&second).unwrap()
            );
        }
    }
}
