//! Lightdash REST API access.
//!
//! Resources and data sources only talk to Lightdash through the
//! [`LightdashApi`] trait. [`HttpClient`] implements it over HTTPS; tests use
//! the in-memory implementation from [`crate::testing`].

mod http;
pub mod models;

use async_trait::async_trait;

use crate::error::ProviderError;
use crate::members::ProjectMemberRole;

pub use http::HttpClient;
pub use models::*;

/// Operations the provider needs from a Lightdash instance.
///
/// Every call maps one-to-one onto an endpoint under `/api/v1`. Missing
/// objects are reported as [`ProviderError::NotFound`].
#[async_trait]
pub trait LightdashApi: Send + Sync {
    // Organization

    /// The organization the token belongs to.
    async fn get_organization(&self) -> Result<Organization, ProviderError>;

    /// All users in the organization.
    async fn list_organization_members(&self) -> Result<Vec<OrganizationMember>, ProviderError>;

    // Projects

    /// All projects in the organization.
    async fn list_projects(&self) -> Result<Vec<ProjectSummary>, ProviderError>;

    /// A single project.
    async fn get_project(&self, project_uuid: &str) -> Result<Project, ProviderError>;

    /// Set the timezone used by scheduled deliveries.
    async fn update_scheduler_settings(
        &self,
        project_uuid: &str,
        scheduler_timezone: &str,
    ) -> Result<(), ProviderError>;

    // Project access

    /// Users with a direct role in the project.
    async fn list_project_members(
        &self,
        project_uuid: &str,
    ) -> Result<Vec<ProjectMember>, ProviderError>;

    /// Grant a project role to an organization member, identified by email.
    async fn grant_project_access(
        &self,
        project_uuid: &str,
        email: &str,
        role: ProjectMemberRole,
    ) -> Result<(), ProviderError>;

    /// Change a member's project role.
    async fn update_project_access(
        &self,
        project_uuid: &str,
        user_uuid: &str,
        role: ProjectMemberRole,
    ) -> Result<(), ProviderError>;

    /// Remove a member's project role.
    async fn revoke_project_access(
        &self,
        project_uuid: &str,
        user_uuid: &str,
    ) -> Result<(), ProviderError>;

    // Project group access

    /// Groups with a role in the project.
    async fn list_project_group_accesses(
        &self,
        project_uuid: &str,
    ) -> Result<Vec<ProjectGroupAccess>, ProviderError>;

    /// Grant a project role to a group.
    async fn grant_project_group_access(
        &self,
        project_uuid: &str,
        group_uuid: &str,
        role: ProjectMemberRole,
    ) -> Result<(), ProviderError>;

    /// Change a group's project role.
    async fn update_project_group_access(
        &self,
        project_uuid: &str,
        group_uuid: &str,
        role: ProjectMemberRole,
    ) -> Result<(), ProviderError>;

    /// Remove a group's project role.
    async fn revoke_project_group_access(
        &self,
        project_uuid: &str,
        group_uuid: &str,
    ) -> Result<(), ProviderError>;

    // Groups

    /// All groups in the organization, without members.
    async fn list_groups(&self) -> Result<Vec<Group>, ProviderError>;

    /// Create a group.
    async fn create_group(&self, request: &CreateGroup) -> Result<Group, ProviderError>;

    /// A group with its members.
    async fn get_group(&self, group_uuid: &str) -> Result<Group, ProviderError>;

    /// Rename a group.
    async fn update_group(
        &self,
        group_uuid: &str,
        request: &UpdateGroup,
    ) -> Result<Group, ProviderError>;

    /// Delete a group.
    async fn delete_group(&self, group_uuid: &str) -> Result<(), ProviderError>;

    /// Add a user to a group.
    async fn add_group_member(&self, group_uuid: &str, user_uuid: &str)
        -> Result<(), ProviderError>;

    /// Remove a user from a group.
    async fn remove_group_member(
        &self,
        group_uuid: &str,
        user_uuid: &str,
    ) -> Result<(), ProviderError>;

    // Spaces

    /// All spaces in a project.
    async fn list_spaces(&self, project_uuid: &str) -> Result<Vec<SpaceSummary>, ProviderError>;

    /// Create a space.
    async fn create_space(
        &self,
        project_uuid: &str,
        request: &CreateSpace,
    ) -> Result<Space, ProviderError>;

    /// A space with its access lists.
    async fn get_space(&self, project_uuid: &str, space_uuid: &str)
        -> Result<Space, ProviderError>;

    /// Rename a space or change its visibility.
    async fn update_space(
        &self,
        project_uuid: &str,
        space_uuid: &str,
        request: &UpdateSpace,
    ) -> Result<Space, ProviderError>;

    /// Delete a space and its content.
    async fn delete_space(&self, project_uuid: &str, space_uuid: &str)
        -> Result<(), ProviderError>;

    /// Grant or change a user's role in a space.
    async fn share_space_with_user(
        &self,
        project_uuid: &str,
        space_uuid: &str,
        user_uuid: &str,
        role: SpaceRole,
    ) -> Result<(), ProviderError>;

    /// Remove a user's direct access to a space.
    async fn unshare_space_with_user(
        &self,
        project_uuid: &str,
        space_uuid: &str,
        user_uuid: &str,
    ) -> Result<(), ProviderError>;

    /// Grant or change a group's role in a space.
    async fn share_space_with_group(
        &self,
        project_uuid: &str,
        space_uuid: &str,
        group_uuid: &str,
        role: SpaceRole,
    ) -> Result<(), ProviderError>;

    /// Remove a group's access to a space.
    async fn unshare_space_with_group(
        &self,
        project_uuid: &str,
        space_uuid: &str,
        group_uuid: &str,
    ) -> Result<(), ProviderError>;

    // Warehouse credentials

    /// Create organization-level warehouse credentials.
    async fn create_warehouse_credentials(
        &self,
        request: &WarehouseCredentialsRequest,
    ) -> Result<WarehouseCredentials, ProviderError>;

    /// Warehouse credentials, without secrets.
    async fn get_warehouse_credentials(
        &self,
        credentials_uuid: &str,
    ) -> Result<WarehouseCredentials, ProviderError>;

    /// Replace warehouse credentials.
    async fn update_warehouse_credentials(
        &self,
        credentials_uuid: &str,
        request: &WarehouseCredentialsRequest,
    ) -> Result<WarehouseCredentials, ProviderError>;

    /// Delete warehouse credentials.
    async fn delete_warehouse_credentials(
        &self,
        credentials_uuid: &str,
    ) -> Result<(), ProviderError>;

    // AI agents

    /// Create an AI agent.
    async fn create_ai_agent(
        &self,
        project_uuid: &str,
        request: &AiAgentRequest,
    ) -> Result<AiAgent, ProviderError>;

    /// An AI agent.
    async fn get_ai_agent(&self, project_uuid: &str, agent_uuid: &str)
        -> Result<AiAgent, ProviderError>;

    /// Replace an AI agent's settings.
    async fn update_ai_agent(
        &self,
        project_uuid: &str,
        agent_uuid: &str,
        request: &AiAgentRequest,
    ) -> Result<AiAgent, ProviderError>;

    /// Delete an AI agent.
    async fn delete_ai_agent(&self, project_uuid: &str, agent_uuid: &str)
        -> Result<(), ProviderError>;
}

/// Turn a `NotFound` error into `Ok(None)`.
///
/// Used by reads, where a vanished object removes the resource from state
/// instead of failing.
pub fn found<T>(result: Result<T, ProviderError>) -> Result<Option<T>, ProviderError> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(ProviderError::NotFound(_)) => Ok(None),
        Err(err) => Err(err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_found() {
        assert_eq!(found(Ok::<_, ProviderError>(1)).unwrap(), Some(1));
        assert_eq!(
            found::<i32>(Err(ProviderError::NotFound("space".into()))).unwrap(),
            None
        );
        assert!(found::<i32>(Err(ProviderError::Unavailable("down".into()))).is_err());
    }
}
