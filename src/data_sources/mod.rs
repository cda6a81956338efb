//! Read-only data sources.

mod groups;
mod organization;
mod projects;
mod spaces;

use async_trait::async_trait;
use serde_json::Value;

use crate::client::LightdashApi;
use crate::error::ProviderError;
use crate::schema::{AttributeType, Diagnostic, Schema};
use crate::validation;

pub use groups::GroupsDataSource;
pub use organization::{
    OrganizationDataSource, OrganizationMemberDataSource, OrganizationMembersDataSource,
};
pub use projects::{ProjectDataSource, ProjectMembersDataSource, ProjectsDataSource};
pub use spaces::SpacesDataSource;

/// A data source type served by the provider.
#[async_trait]
pub trait DataSource: Send + Sync {
    /// Terraform type name, e.g. `lightdash_projects`.
    fn type_name(&self) -> &'static str;

    /// Attribute schema.
    fn schema(&self) -> Schema;

    /// Validate configuration against [`schema`](Self::schema).
    fn validate(&self, config: &Value) -> Vec<Diagnostic> {
        validation::validate(&self.schema(), config)
    }

    /// Fetch the data and return the full state.
    async fn read(&self, api: &dyn LightdashApi, config: Value) -> Result<Value, ProviderError>;
}

/// Every data source the provider serves.
pub fn all() -> Vec<Box<dyn DataSource>> {
    vec![
        Box::new(OrganizationDataSource),
        Box::new(OrganizationMembersDataSource),
        Box::new(OrganizationMemberDataSource),
        Box::new(ProjectDataSource),
        Box::new(ProjectsDataSource),
        Box::new(ProjectMembersDataSource),
        Box::new(GroupsDataSource),
        Box::new(SpacesDataSource),
    ]
}

/// Object type built from `(name, String)` pairs.
fn string_object(fields: &[&str]) -> AttributeType {
    AttributeType::object(fields.iter().map(|name| (*name, AttributeType::String)))
}

/// A required string input from the data source config.
fn required_str<'a>(config: &'a Value, name: &str) -> Result<&'a str, ProviderError> {
    config
        .get(name)
        .and_then(Value::as_str)
        .ok_or_else(|| ProviderError::Validation(format!("'{}' is required", name)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::HashSet;

    #[test]
    fn test_type_names_unique() {
        let sources = all();
        let names: HashSet<_> = sources.iter().map(|d| d.type_name()).collect();
        assert_eq!(names.len(), 8);
    }

    #[test]
    fn test_required_str() {
        let config = json!({"email": "ann@example.com", "n": 1});
        assert_eq!(required_str(&config, "email").unwrap(), "ann@example.com");
        assert!(required_str(&config, "n").is_err());
        assert!(required_str(&config, "missing").is_err());
    }
}
