use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;

use super::{from_state, to_state, validate_enum, Resource};
use crate::client::{found, LightdashApi};
use crate::error::ProviderError;
use crate::id::IdTemplate;
use crate::members::ProjectMemberRole;
use crate::schema::{Attribute, Diagnostic, Schema};
use crate::validation;

const ID: IdTemplate = IdTemplate::new("projects/{project_uuid}/group-accesses/{group_uuid}");

/// `lightdash_project_role_group`: a group's role in a project.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProjectRoleGroupResource;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct State {
    #[serde(default)]
    id: Option<String>,
    project_uuid: String,
    group_uuid: String,
    #[serde(default)]
    role: Option<ProjectMemberRole>,
}

impl State {
    fn role(&self) -> Result<ProjectMemberRole, ProviderError> {
        self.role
            .ok_or_else(|| ProviderError::Validation("'role' is required".to_string()))
    }
}

#[async_trait]
impl Resource for ProjectRoleGroupResource {
    fn type_name(&self) -> &'static str {
        "lightdash_project_role_group"
    }

    fn schema(&self) -> Schema {
        Schema::v0()
            .with_description(include_str!("../../docs/resources/project_role_group.md"))
            .with_attribute(
                "id",
                Attribute::computed_string().with_description(format!("`{}`", ID.pattern())),
            )
            .with_attribute(
                "project_uuid",
                Attribute::required_string()
                    .with_force_new()
                    .with_description("Project UUID."),
            )
            .with_attribute(
                "group_uuid",
                Attribute::required_string()
                    .with_force_new()
                    .with_description("Group UUID."),
            )
            .with_attribute(
                "role",
                Attribute::required_string().with_description(format!(
                    "Project role granted to every member of the group, one of: {}.",
                    ProjectMemberRole::names().join(", ")
                )),
            )
    }

    fn id_template(&self) -> IdTemplate {
        ID
    }

    fn validate(&self, config: &Value) -> Vec<Diagnostic> {
        let mut diagnostics = validation::validate(&self.schema(), config);
        validate_enum::<ProjectMemberRole>(config, "role", &mut diagnostics);
        diagnostics
    }

    async fn create(&self, api: &dyn LightdashApi, planned: Value) -> Result<Value, ProviderError> {
        let mut state: State = from_state(planned)?;
        let role = state.role()?;
        api.grant_project_group_access(&state.project_uuid, &state.group_uuid, role)
            .await?;
        info!(
            project_uuid = %state.project_uuid,
            group_uuid = %state.group_uuid,
            role = %role,
            "Granted project role to group"
        );

        state.id = Some(ID.format(&[&state.project_uuid, &state.group_uuid])?);
        to_state(&state)
    }

    async fn read(
        &self,
        api: &dyn LightdashApi,
        current: Value,
    ) -> Result<Option<Value>, ProviderError> {
        let mut state: State = from_state(current)?;
        let accesses = found(api.list_project_group_accesses(&state.project_uuid).await)?;
        let Some(access) = accesses
            .into_iter()
            .flatten()
            .find(|a| a.group_uuid == state.group_uuid)
        else {
            return Ok(None);
        };

        state.id = Some(ID.format(&[&state.project_uuid, &state.group_uuid])?);
        state.role = Some(access.role);
        Ok(Some(to_state(&state)?))
    }

    async fn update(
        &self,
        api: &dyn LightdashApi,
        _prior: Value,
        planned: Value,
    ) -> Result<Value, ProviderError> {
        let state: State = from_state(planned)?;
        let role = state.role()?;
        api.update_project_group_access(&state.project_uuid, &state.group_uuid, role)
            .await?;
        info!(
            project_uuid = %state.project_uuid,
            group_uuid = %state.group_uuid,
            role = %role,
            "Updated group project role"
        );
        to_state(&state)
    }

    async fn delete(&self, api: &dyn LightdashApi, current: Value) -> Result<(), ProviderError> {
        let state: State = from_state(current)?;
        found(
            api.revoke_project_group_access(&state.project_uuid, &state.group_uuid)
                .await,
        )?;
        info!(
            project_uuid = %state.project_uuid,
            group_uuid = %state.group_uuid,
            "Revoked group project role"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::CreateGroup;
    use crate::testing::InMemoryLightdash;
    use serde_json::json;

    async fn setup() -> (InMemoryLightdash, String) {
        let api = InMemoryLightdash::new().with_project("p1", "Analytics");
        let group = api
            .create_group(&CreateGroup {
                name: "Analysts".into(),
                members: vec![],
            })
            .await
            .unwrap();
        (api, group.uuid)
    }

    #[tokio::test]
    async fn test_lifecycle() {
        let (api, group_uuid) = setup().await;
        let resource = ProjectRoleGroupResource;

        let state = resource
            .create(
                &api,
                json!({"project_uuid": "p1", "group_uuid": group_uuid, "role": "viewer"}),
            )
            .await
            .unwrap();
        assert_eq!(
            state["id"],
            format!("projects/p1/group-accesses/{}", group_uuid)
        );

        let planned = json!({
            "id": state["id"].clone(),
            "project_uuid": "p1",
            "group_uuid": group_uuid,
            "role": "developer"
        });
        let updated = resource.update(&api, state, planned).await.unwrap();
        let read = resource.read(&api, updated.clone()).await.unwrap().unwrap();
        assert_eq!(read["role"], "developer");

        resource.delete(&api, updated.clone()).await.unwrap();
        assert!(resource.read(&api, updated).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_import_missing_access() {
        let (api, group_uuid) = setup().await;
        let err = ProjectRoleGroupResource
            .import(&api, &format!("projects/p1/group-accesses/{}", group_uuid))
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::NotFound(_)));
    }
}
