use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::debug;

use super::{required_str, string_object, DataSource};
use crate::client::LightdashApi;
use crate::error::ProviderError;
use crate::schema::{Attribute, AttributeType, Schema};

/// `lightdash_project`
#[derive(Debug, Clone, Copy, Default)]
pub struct ProjectDataSource;

#[async_trait]
impl DataSource for ProjectDataSource {
    fn type_name(&self) -> &'static str {
        "lightdash_project"
    }

    fn schema(&self) -> Schema {
        Schema::v0()
            .with_description(include_str!("../../docs/data-sources/project.md"))
            .with_attribute("project_uuid", Attribute::required_string())
            .with_attribute("organization_uuid", Attribute::computed_string())
            .with_attribute("name", Attribute::computed_string())
            .with_attribute("type", Attribute::computed_string())
            .with_attribute("scheduler_timezone", Attribute::computed_string())
    }

    async fn read(&self, api: &dyn LightdashApi, config: Value) -> Result<Value, ProviderError> {
        let project = api.get_project(required_str(&config, "project_uuid")?).await?;
        Ok(json!({
            "project_uuid": project.project_uuid,
            "organization_uuid": project.organization_uuid,
            "name": project.name,
            "type": project.project_type,
            "scheduler_timezone": project.scheduler_timezone,
        }))
    }
}

/// `lightdash_projects`
#[derive(Debug, Clone, Copy, Default)]
pub struct ProjectsDataSource;

#[async_trait]
impl DataSource for ProjectsDataSource {
    fn type_name(&self) -> &'static str {
        "lightdash_projects"
    }

    fn schema(&self) -> Schema {
        Schema::v0()
            .with_description(include_str!("../../docs/data-sources/projects.md"))
            .with_attribute(
                "projects",
                Attribute::computed(AttributeType::list(string_object(&[
                    "project_uuid",
                    "name",
                    "type",
                ]))),
            )
    }

    async fn read(&self, api: &dyn LightdashApi, _config: Value) -> Result<Value, ProviderError> {
        let mut projects = api.list_projects().await?;
        projects.sort_by(|a, b| a.name.cmp(&b.name).then(a.project_uuid.cmp(&b.project_uuid)));
        debug!(count = projects.len(), "Read projects");
        Ok(json!({
            "projects": projects
                .into_iter()
                .map(|p| json!({"project_uuid": p.project_uuid, "name": p.name, "type": p.project_type}))
                .collect::<Vec<_>>(),
        }))
    }
}

/// `lightdash_project_members`: users with a direct role in a project.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProjectMembersDataSource;

#[async_trait]
impl DataSource for ProjectMembersDataSource {
    fn type_name(&self) -> &'static str {
        "lightdash_project_members"
    }

    fn schema(&self) -> Schema {
        Schema::v0()
            .with_description(include_str!("../../docs/data-sources/project_members.md"))
            .with_attribute("project_uuid", Attribute::required_string())
            .with_attribute(
                "members",
                Attribute::computed(AttributeType::list(string_object(&[
                    "user_uuid",
                    "email",
                    "role",
                ]))),
            )
    }

    async fn read(&self, api: &dyn LightdashApi, config: Value) -> Result<Value, ProviderError> {
        let project_uuid = required_str(&config, "project_uuid")?;
        let mut members = api.list_project_members(project_uuid).await?;
        members.sort_by(|a, b| a.email.cmp(&b.email));
        Ok(json!({
            "project_uuid": project_uuid,
            "members": members
                .into_iter()
                .map(|m| json!({"user_uuid": m.user_uuid, "email": m.email, "role": m.role}))
                .collect::<Vec<_>>(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::members::ProjectMemberRole;
    use crate::testing::InMemoryLightdash;

    #[tokio::test]
    async fn test_projects_sorted_by_name() {
        let api = InMemoryLightdash::new()
            .with_project("p2", "Zeta")
            .with_project("p1", "Alpha");
        let state = ProjectsDataSource.read(&api, json!({})).await.unwrap();
        assert_eq!(state["projects"][0]["name"], "Alpha");
        assert_eq!(state["projects"][1]["project_uuid"], "p2");
        assert_eq!(state["projects"][0]["type"], "DEFAULT");
    }

    #[tokio::test]
    async fn test_project() {
        let api = InMemoryLightdash::new().with_project("p1", "Alpha");
        let state = ProjectDataSource
            .read(&api, json!({"project_uuid": "p1"}))
            .await
            .unwrap();
        assert_eq!(state["organization_uuid"], "org-1");
        assert_eq!(state["scheduler_timezone"], "UTC");

        let err = ProjectDataSource
            .read(&api, json!({"project_uuid": "p9"}))
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_project_members() {
        let api = InMemoryLightdash::new()
            .with_organization_member("u1", "ann@example.com")
            .with_project("p1", "Alpha");
        api.grant_project_access("p1", "ann@example.com", ProjectMemberRole::InteractiveViewer)
            .await
            .unwrap();

        let state = ProjectMembersDataSource
            .read(&api, json!({"project_uuid": "p1"}))
            .await
            .unwrap();
        assert_eq!(
            state["members"],
            json!([{"user_uuid": "u1", "email": "ann@example.com", "role": "interactive_viewer"}])
        );
    }
}
