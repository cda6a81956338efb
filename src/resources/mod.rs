//! Managed resources.
//!
//! Each resource owns its schema and its CRUD logic against
//! [`LightdashApi`]. State crosses the provider boundary as JSON and is
//! converted to a typed struct inside each handler.

mod ai_agent;
mod group;
mod project_role_group;
mod project_role_member;
mod project_scheduler_settings;
mod space;
mod warehouse_credentials;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::client::LightdashApi;
use crate::error::ProviderError;
use crate::id::IdTemplate;
use crate::schema::{Diagnostic, Schema};
use crate::validation;

pub use ai_agent::AiAgentResource;
pub use group::GroupResource;
pub use project_role_group::ProjectRoleGroupResource;
pub use project_role_member::ProjectRoleMemberResource;
pub use project_scheduler_settings::ProjectSchedulerSettingsResource;
pub use space::SpaceResource;
pub use warehouse_credentials::WarehouseCredentialsResource;

/// A resource type managed by the provider.
#[async_trait]
pub trait Resource: Send + Sync {
    /// Terraform type name, e.g. `lightdash_space`.
    fn type_name(&self) -> &'static str;

    /// Attribute schema.
    fn schema(&self) -> Schema;

    /// Format of the composite `id` attribute, also accepted by import.
    fn id_template(&self) -> IdTemplate;

    /// Validate configuration. The default checks it against [`schema`](Self::schema).
    fn validate(&self, config: &Value) -> Vec<Diagnostic> {
        validation::validate(&self.schema(), config)
    }

    /// Create the remote object and return the new state.
    async fn create(&self, api: &dyn LightdashApi, planned: Value) -> Result<Value, ProviderError>;

    /// Refresh state. `Ok(None)` means the object no longer exists.
    async fn read(
        &self,
        api: &dyn LightdashApi,
        current: Value,
    ) -> Result<Option<Value>, ProviderError>;

    /// Apply in-place changes and return the new state.
    async fn update(
        &self,
        api: &dyn LightdashApi,
        prior: Value,
        planned: Value,
    ) -> Result<Value, ProviderError>;

    /// Delete the remote object. Deleting something already gone succeeds.
    async fn delete(&self, api: &dyn LightdashApi, current: Value) -> Result<(), ProviderError>;

    /// Import by composite ID.
    ///
    /// The default seeds state with `id` and every key of the ID, then reads.
    async fn import(&self, api: &dyn LightdashApi, id: &str) -> Result<Value, ProviderError> {
        let template = self.id_template();
        let parsed = template.parse(id)?;

        let mut seed = Map::new();
        seed.insert("id".to_string(), Value::String(id.to_string()));
        for key in template.keys() {
            seed.insert(key.to_string(), Value::String(parsed.get(key)?.to_string()));
        }

        self.read(api, Value::Object(seed))
            .await?
            .ok_or_else(|| ProviderError::NotFound(format!("{} '{}'", self.type_name(), id)))
    }
}

/// Every resource the provider serves.
pub fn all() -> Vec<Box<dyn Resource>> {
    vec![
        Box::new(ProjectRoleMemberResource),
        Box::new(ProjectRoleGroupResource),
        Box::new(GroupResource),
        Box::new(SpaceResource),
        Box::new(ProjectSchedulerSettingsResource),
        Box::new(WarehouseCredentialsResource),
        Box::new(AiAgentResource),
    ]
}

/// Deserialize JSON state into a typed state struct.
pub(crate) fn from_state<T: DeserializeOwned>(value: Value) -> Result<T, ProviderError> {
    Ok(serde_json::from_value(value)?)
}

/// Serialize a typed state struct back to JSON.
pub(crate) fn to_state<T: Serialize>(state: &T) -> Result<Value, ProviderError> {
    Ok(serde_json::to_value(state)?)
}

/// Check a role-like string attribute, if present.
pub(crate) fn validate_enum<T>(config: &Value, attribute: &str, diagnostics: &mut Vec<Diagnostic>)
where
    T: std::str::FromStr<Err = ProviderError>,
{
    if let Some(value) = config.get(attribute).and_then(Value::as_str) {
        if let Err(err) = value.parse::<T>() {
            diagnostics.push(
                Diagnostic::error(format!("Invalid value for '{}'", attribute))
                    .with_detail(err.message().to_string())
                    .with_attribute(attribute),
            );
        }
    }
}

/// Sorted, deduplicated copy of a list.
pub(crate) fn sorted(mut values: Vec<String>) -> Vec<String> {
    values.sort();
    values.dedup();
    values
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::members::ProjectMemberRole;
    use serde_json::json;
    use std::collections::HashSet;

    #[test]
    fn test_type_names_unique() {
        let resources = all();
        let names: HashSet<_> = resources.iter().map(|r| r.type_name()).collect();
        assert_eq!(names.len(), resources.len());
        assert!(names.iter().all(|n| n.starts_with("lightdash_")));
    }

    #[test]
    fn test_every_schema_has_computed_id_and_template_keys() {
        for resource in all() {
            let schema = resource.schema();
            let id = schema
                .attribute("id")
                .unwrap_or_else(|| panic!("{} has no id", resource.type_name()));
            assert!(!id.is_configurable(), "{}", resource.type_name());

            for key in resource.id_template().keys() {
                assert!(
                    schema.attribute(key).is_some(),
                    "{} is missing ID key {}",
                    resource.type_name(),
                    key
                );
            }
        }
    }

    #[test]
    fn test_validate_enum() {
        let mut diagnostics = Vec::new();
        validate_enum::<ProjectMemberRole>(&json!({"role": "owner"}), "role", &mut diagnostics);
        validate_enum::<ProjectMemberRole>(&json!({"role": "editor"}), "role", &mut diagnostics);
        validate_enum::<ProjectMemberRole>(&json!({}), "role", &mut diagnostics);

        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].attribute.as_deref(), Some("role"));
    }

    #[test]
    fn test_sorted() {
        assert_eq!(
            sorted(vec!["b".into(), "a".into(), "b".into()]),
            vec!["a".to_string(), "b".to_string()]
        );
    }
}
