//! Plan, import, and metadata types shared by the provider and its resources.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// What happens to one attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    /// Set where it was null.
    Add,
    /// Cleared.
    Remove,
    /// Replaced by a different value.
    Modify,
}

/// One attribute's planned change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributeChange {
    /// Top-level attribute name.
    pub path: String,
    /// Prior value, `None` when the attribute is being set.
    pub before: Option<Value>,
    /// Planned value, `None` when the attribute is being cleared.
    pub after: Option<Value>,
    /// Set when the attribute is `force_new` and the object already exists.
    #[serde(default)]
    pub forces_replacement: bool,
}

impl AttributeChange {
    /// An attribute going from null to `value`.
    pub fn added(path: impl Into<String>, value: Value) -> Self {
        Self {
            path: path.into(),
            before: None,
            after: Some(value),
            forces_replacement: false,
        }
    }

    /// An attribute going from `value` to null.
    pub fn removed(path: impl Into<String>, value: Value) -> Self {
        Self {
            path: path.into(),
            before: Some(value),
            after: None,
            forces_replacement: false,
        }
    }

    /// An attribute going from `before` to `after`.
    pub fn modified(path: impl Into<String>, before: Value, after: Value) -> Self {
        Self {
            path: path.into(),
            before: Some(before),
            after: Some(after),
            forces_replacement: false,
        }
    }

    /// Mark the change as forcing the object to be destroyed and recreated.
    pub fn forcing_replacement(mut self) -> Self {
        self.forces_replacement = true;
        self
    }

    /// Classify the change.
    pub fn kind(&self) -> ChangeKind {
        match (&self.before, &self.after) {
            (None, _) => ChangeKind::Add,
            (Some(_), None) => ChangeKind::Remove,
            (Some(_), Some(_)) => ChangeKind::Modify,
        }
    }
}

/// Output of planning one resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanResult {
    /// State the apply step receives; null for a destroy.
    pub planned_state: Value,
    /// Changed attributes, sorted by path.
    pub changes: Vec<AttributeChange>,
}

impl PlanResult {
    /// Build a plan, sorting `changes` by path.
    pub fn new(planned_state: Value, mut changes: Vec<AttributeChange>) -> Self {
        changes.sort_by(|a, b| a.path.cmp(&b.path));
        Self {
            planned_state,
            changes,
        }
    }

    /// A plan that leaves `state` untouched.
    pub fn unchanged(state: Value) -> Self {
        Self::new(state, Vec::new())
    }

    /// Whether applying the plan would change anything.
    pub fn has_changes(&self) -> bool {
        !self.changes.is_empty()
    }

    /// Whether any change forces replacement.
    pub fn requires_replace(&self) -> bool {
        self.changes.iter().any(|c| c.forces_replacement)
    }

    /// Paths of the changes that force replacement.
    pub fn replaced_paths(&self) -> Vec<&str> {
        self.changes
            .iter()
            .filter(|c| c.forces_replacement)
            .map(|c| c.path.as_str())
            .collect()
    }

    /// Whether the plan destroys the object.
    pub fn is_destroy(&self) -> bool {
        self.planned_state.is_null()
    }
}

/// A resource brought under management by `import`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportedResource {
    /// Resource type name, e.g. `lightdash_space`.
    pub resource_type: String,
    /// State as returned by a read of the imported object.
    pub state: Value,
}

impl ImportedResource {
    /// Pair a resource type with its imported state.
    pub fn new(resource_type: impl Into<String>, state: Value) -> Self {
        Self {
            resource_type: resource_type.into(),
            state,
        }
    }
}

/// Names of everything the provider serves.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ProviderMetadata {
    /// Resource type names, sorted.
    pub resources: Vec<String>,
    /// Data source type names, sorted.
    pub data_sources: Vec<String>,
    /// Provider-defined function names, sorted.
    pub functions: Vec<String>,
}
