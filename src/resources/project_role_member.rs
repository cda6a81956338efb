use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};

use super::{from_state, to_state, validate_enum, Resource};
use crate::client::{found, LightdashApi, OrganizationMember};
use crate::error::ProviderError;
use crate::id::IdTemplate;
use crate::members::ProjectMemberRole;
use crate::schema::{Attribute, Diagnostic, Schema};
use crate::validation;

const ID: IdTemplate = IdTemplate::new("projects/{project_uuid}/access/{user_uuid}");

/// `lightdash_project_role_member`: one user's direct role in a project.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProjectRoleMemberResource;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct State {
    #[serde(default)]
    id: Option<String>,
    project_uuid: String,
    user_uuid: String,
    #[serde(default)]
    role: Option<ProjectMemberRole>,
    #[serde(default)]
    email: Option<String>,
}

impl State {
    fn role(&self) -> Result<ProjectMemberRole, ProviderError> {
        self.role
            .ok_or_else(|| ProviderError::Validation("'role' is required".to_string()))
    }
}

async fn organization_member(
    api: &dyn LightdashApi,
    user_uuid: &str,
) -> Result<OrganizationMember, ProviderError> {
    api.list_organization_members()
        .await?
        .into_iter()
        .find(|m| m.user_uuid == user_uuid)
        .ok_or_else(|| {
            ProviderError::Validation(format!(
                "user '{}' is not a member of the organization",
                user_uuid
            ))
        })
}

#[async_trait]
impl Resource for ProjectRoleMemberResource {
    fn type_name(&self) -> &'static str {
        "lightdash_project_role_member"
    }

    fn schema(&self) -> Schema {
        Schema::v0()
            .with_description(include_str!("../../docs/resources/project_role_member.md"))
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
                "user_uuid",
                Attribute::required_string()
                    .with_force_new()
                    .with_description("User UUID. The user must belong to the organization."),
            )
            .with_attribute(
                "role",
                Attribute::required_string().with_description(format!(
                    "Project role, one of: {}.",
                    ProjectMemberRole::names().join(", ")
                )),
            )
            .with_attribute(
                "email",
                Attribute::computed_string().with_description("Email of the user."),
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
        let member = organization_member(api, &state.user_uuid).await?;

        let existing = api
            .list_project_members(&state.project_uuid)
            .await?
            .into_iter()
            .find(|m| m.user_uuid == state.user_uuid);
        match existing {
            Some(current) if current.role == role => {
                debug!(
                    project_uuid = %state.project_uuid,
                    user_uuid = %state.user_uuid,
                    "Project role already granted"
                );
            }
            Some(_) => {
                api.update_project_access(&state.project_uuid, &state.user_uuid, role)
                    .await?
            }
            None => {
                api.grant_project_access(&state.project_uuid, &member.email, role)
                    .await?
            }
        }
        info!(
            project_uuid = %state.project_uuid,
            user_uuid = %state.user_uuid,
            role = %role,
            "Granted project role"
        );

        state.id = Some(ID.format(&[&state.project_uuid, &state.user_uuid])?);
        state.email = Some(member.email);
        to_state(&state)
    }

    async fn read(
        &self,
        api: &dyn LightdashApi,
        current: Value,
    ) -> Result<Option<Value>, ProviderError> {
        let mut state: State = from_state(current)?;
        let Some(members) = found(api.list_project_members(&state.project_uuid).await)? else {
            return Ok(None);
        };
        let Some(member) = members.into_iter().find(|m| m.user_uuid == state.user_uuid) else {
            debug!(
                project_uuid = %state.project_uuid,
                user_uuid = %state.user_uuid,
                "Project role no longer present"
            );
            return Ok(None);
        };

        state.id = Some(ID.format(&[&state.project_uuid, &state.user_uuid])?);
        state.role = Some(member.role);
        state.email = Some(member.email);
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
        api.update_project_access(&state.project_uuid, &state.user_uuid, role)
            .await?;
        info!(
            project_uuid = %state.project_uuid,
            user_uuid = %state.user_uuid,
            role = %role,
            "Updated project role"
        );
        to_state(&state)
    }

    async fn delete(&self, api: &dyn LightdashApi, current: Value) -> Result<(), ProviderError> {
        let state: State = from_state(current)?;
        found(
            api.revoke_project_access(&state.project_uuid, &state.user_uuid)
                .await,
        )?;
        info!(
            project_uuid = %state.project_uuid,
            user_uuid = %state.user_uuid,
            "Revoked project role"
        );
        Ok(())
    }
}
