//! In-memory [`LightdashApi`] for tests.

use std::collections::BTreeMap;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::client::*;
use crate::error::ProviderError;
use crate::members::ProjectMemberRole;

struct Store {
    organization: Organization,
    members: BTreeMap<String, OrganizationMember>,
    projects: BTreeMap<String, Project>,
    /// `(project_uuid, user_uuid)`
    project_access: BTreeMap<(String, String), ProjectMemberRole>,
    /// `(project_uuid, group_uuid)`
    group_access: BTreeMap<(String, String), ProjectMemberRole>,
    groups: BTreeMap<String, Group>,
    spaces: BTreeMap<String, Space>,
    warehouse_credentials: BTreeMap<String, WarehouseCredentials>,
    ai_agents: BTreeMap<String, AiAgent>,
    next_id: u64,
}

impl Store {
    fn next_uuid(&mut self, prefix: &str) -> String {
        self.next_id += 1;
        format!("{}-{}", prefix, self.next_id)
    }

    fn project(&self, project_uuid: &str) -> Result<&Project, ProviderError> {
        self.projects
            .get(project_uuid)
            .ok_or_else(|| not_found("project", project_uuid))
    }

    fn group_mut(&mut self, group_uuid: &str) -> Result<&mut Group, ProviderError> {
        self.groups
            .get_mut(group_uuid)
            .ok_or_else(|| not_found("group", group_uuid))
    }

    fn space_mut(&mut self, project_uuid: &str, space_uuid: &str) -> Result<&mut Space, ProviderError> {
        self.spaces
            .get_mut(space_uuid)
            .filter(|s| s.project_uuid == project_uuid)
            .ok_or_else(|| not_found("space", space_uuid))
    }

    fn agent_mut(&mut self, project_uuid: &str, agent_uuid: &str) -> Result<&mut AiAgent, ProviderError> {
        self.ai_agents
            .get_mut(agent_uuid)
            .filter(|a| a.project_uuid == project_uuid)
            .ok_or_else(|| not_found("AI agent", agent_uuid))
    }

    fn email_of(&self, user_uuid: &str) -> String {
        self.members
            .get(user_uuid)
            .map(|m| m.email.clone())
            .unwrap_or_default()
    }
}

fn not_found(kind: &str, uuid: &str) -> ProviderError {
    ProviderError::NotFound(format!("{} '{}'", kind, uuid))
}

fn key(a: &str, b: &str) -> (String, String) {
    (a.to_string(), b.to_string())
}

/// A single-organization Lightdash held in memory.
///
/// The organization is always `org-1` ("Acme"). Generated UUIDs look like
/// `group-3` or `space-7`. Missing objects produce
/// [`ProviderError::NotFound`] the way the HTTP API answers 404.
pub struct InMemoryLightdash {
    store: Mutex<Store>,
}

impl Default for InMemoryLightdash {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryLightdash {
    /// An organization with no members or projects.
    pub fn new() -> Self {
        Self {
            store: Mutex::new(Store {
                organization: Organization {
                    organization_uuid: "org-1".to_string(),
                    name: "Acme".to_string(),
                },
                members: BTreeMap::new(),
                projects: BTreeMap::new(),
                project_access: BTreeMap::new(),
                group_access: BTreeMap::new(),
                groups: BTreeMap::new(),
                spaces: BTreeMap::new(),
                warehouse_credentials: BTreeMap::new(),
                ai_agents: BTreeMap::new(),
                next_id: 0,
            }),
        }
    }

    /// Add an active organization member.
    pub fn with_organization_member(mut self, user_uuid: &str, email: &str) -> Self {
        let store = self.store.get_mut();
        let organization_uuid = store.organization.organization_uuid.clone();
        store.members.insert(
            user_uuid.to_string(),
            OrganizationMember {
                user_uuid: user_uuid.to_string(),
                email: email.to_string(),
                first_name: String::new(),
                last_name: String::new(),
                organization_uuid,
                role: "member".to_string(),
                is_active: true,
            },
        );
        self
    }

    /// Add a project with the `UTC` scheduler timezone.
    pub fn with_project(mut self, project_uuid: &str, name: &str) -> Self {
        let store = self.store.get_mut();
        let organization_uuid = store.organization.organization_uuid.clone();
        store.projects.insert(
            project_uuid.to_string(),
            Project {
                project_uuid: project_uuid.to_string(),
                organization_uuid,
                name: name.to_string(),
                project_type: "DEFAULT".to_string(),
                scheduler_timezone: Some("UTC".to_string()),
            },
        );
        self
    }

    /// Remove a user from the organization and their project roles.
    ///
    /// Group memberships are left in place.
    pub async fn remove_organization_member(&self, user_uuid: &str) {
        let mut store = self.store.lock().await;
        store.members.remove(user_uuid);
        store.project_access.retain(|(_, user), _| user != user_uuid);
    }
}

#[async_trait]
impl LightdashApi for InMemoryLightdash {
    async fn get_organization(&self) -> Result<Organization, ProviderError> {
        Ok(self.store.lock().await.organization.clone())
    }

    async fn list_organization_members(&self) -> Result<Vec<OrganizationMember>, ProviderError> {
        Ok(self.store.lock().await.members.values().cloned().collect())
    }

    async fn list_projects(&self) -> Result<Vec<ProjectSummary>, ProviderError> {
        let store = self.store.lock().await;
        Ok(store
            .projects
            .values()
            .map(|p| ProjectSummary {
                project_uuid: p.project_uuid.clone(),
                name: p.name.clone(),
                project_type: p.project_type.clone(),
            })
            .collect())
    }

    async fn get_project(&self, project_uuid: &str) -> Result<Project, ProviderError> {
        self.store.lock().await.project(project_uuid).cloned()
    }

    async fn update_scheduler_settings(
        &self,
        project_uuid: &str,
        scheduler_timezone: &str,
    ) -> Result<(), ProviderError> {
        let mut store = self.store.lock().await;
        let project = store
            .projects
            .get_mut(project_uuid)
            .ok_or_else(|| not_found("project", project_uuid))?;
        project.scheduler_timezone = Some(scheduler_timezone.to_string());
        Ok(())
    }

    async fn list_project_members(
        &self,
        project_uuid: &str,
    ) -> Result<Vec<ProjectMember>, ProviderError> {
        let store = self.store.lock().await;
        store.project(project_uuid)?;
        Ok(store
            .project_access
            .iter()
            .filter(|((project, _), _)| project == project_uuid)
            .map(|((project, user), role)| ProjectMember {
                user_uuid: user.clone(),
                project_uuid: project.clone(),
                email: store.email_of(user),
                role: *role,
            })
            .collect())
    }

    async fn grant_project_access(
        &self,
        project_uuid: &str,
        email: &str,
        role: ProjectMemberRole,
    ) -> Result<(), ProviderError> {
        let mut store = self.store.lock().await;
        store.project(project_uuid)?;
        let user_uuid = store
            .members
            .values()
            .find(|m| m.email == email)
            .map(|m| m.user_uuid.clone())
            .ok_or_else(|| not_found("user with email", email))?;

        let access = key(project_uuid, &user_uuid);
        if store.project_access.contains_key(&access) {
            return Err(ProviderError::AlreadyExists(format!(
                "'{}' already has access to project '{}'",
                email, project_uuid
            )));
        }
        store.project_access.insert(access, role);
        Ok(())
    }

    async fn update_project_access(
        &self,
        project_uuid: &str,
        user_uuid: &str,
        role: ProjectMemberRole,
    ) -> Result<(), ProviderError> {
        let mut store = self.store.lock().await;
        let current = store
            .project_access
            .get_mut(&key(project_uuid, user_uuid))
            .ok_or_else(|| not_found("project access", user_uuid))?;
        *current = role;
        Ok(())
    }

    async fn revoke_project_access(
        &self,
        project_uuid: &str,
        user_uuid: &str,
    ) -> Result<(), ProviderError> {
        let mut store = self.store.lock().await;
        store
            .project_access
            .remove(&key(project_uuid, user_uuid))
            .map(drop)
            .ok_or_else(|| not_found("project access", user_uuid))
    }

    async fn list_project_group_accesses(
        &self,
        project_uuid: &str,
    ) -> Result<Vec<ProjectGroupAccess>, ProviderError> {
        let store = self.store.lock().await;
        store.project(project_uuid)?;
        Ok(store
            .group_access
            .iter()
            .filter(|((project, _), _)| project == project_uuid)
            .map(|((project, group), role)| ProjectGroupAccess {
                project_uuid: project.clone(),
                group_uuid: group.clone(),
                role: *role,
            })
            .collect())
    }

    async fn grant_project_group_access(
        &self,
        project_uuid: &str,
        group_uuid: &str,
        role: ProjectMemberRole,
    ) -> Result<(), ProviderError> {
        let mut store = self.store.lock().await;
        store.project(project_uuid)?;
        store.group_mut(group_uuid)?;

        let access = key(project_uuid, group_uuid);
        if store.group_access.contains_key(&access) {
            return Err(ProviderError::AlreadyExists(format!(
                "group '{}' already has access to project '{}'",
                group_uuid, project_uuid
            )));
        }
        store.group_access.insert(access, role);
        Ok(())
    }

    async fn update_project_group_access(
        &self,
        project_uuid: &str,
        group_uuid: &str,
        role: ProjectMemberRole,
    ) -> Result<(), ProviderError> {
        let mut store = self.store.lock().await;
        let current = store
            .group_access
            .get_mut(&key(project_uuid, group_uuid))
            .ok_or_else(|| not_found("group access", group_uuid))?;
        *current = role;
        Ok(())
    }

    async fn revoke_project_group_access(
        &self,
        project_uuid: &str,
        group_uuid: &str,
    ) -> Result<(), ProviderError> {
        let mut store = self.store.lock().await;
        store
            .group_access
            .remove(&key(project_uuid, group_uuid))
            .map(drop)
            .ok_or_else(|| not_found("group access", group_uuid))
    }

    async fn list_groups(&self) -> Result<Vec<Group>, ProviderError> {
        let store = self.store.lock().await;
        Ok(store
            .groups
            .values()
            .map(|g| Group {
                members: Vec::new(),
                ..g.clone()
            })
            .collect())
    }

    async fn create_group(&self, request: &CreateGroup) -> Result<Group, ProviderError> {
        let mut store = self.store.lock().await;
        let uuid = store.next_uuid("group");
        let members = request
            .members
            .iter()
            .map(|m| GroupMember {
                user_uuid: m.user_uuid.clone(),
                email: store.email_of(&m.user_uuid),
            })
            .collect();
        let group = Group {
            uuid: uuid.clone(),
            name: request.name.clone(),
            organization_uuid: store.organization.organization_uuid.clone(),
            members,
        };
        store.groups.insert(uuid, group.clone());
        Ok(group)
    }

    async fn get_group(&self, group_uuid: &str) -> Result<Group, ProviderError> {
        let mut store = self.store.lock().await;
        store.group_mut(group_uuid).map(|g| g.clone())
    }

    async fn update_group(
        &self,
        group_uuid: &str,
        request: &UpdateGroup,
    ) -> Result<Group, ProviderError> {
        let mut store = self.store.lock().await;
        let group = store.group_mut(group_uuid)?;
        group.name = request.name.clone();
        Ok(group.clone())
    }

    async fn delete_group(&self, group_uuid: &str) -> Result<(), ProviderError> {
        let mut store = self.store.lock().await;
        store
            .groups
            .remove(group_uuid)
            .ok_or_else(|| not_found("group", group_uuid))?;
        store.group_access.retain(|(_, group), _| group != group_uuid);
        for space in store.spaces.values_mut() {
            space.groups_access.retain(|a| a.group_uuid != group_uuid);
        }
        Ok(())
    }

    async fn add_group_member(
        &self,
        group_uuid: &str,
        user_uuid: &str,
    ) -> Result<(), ProviderError> {
        let mut store = self.store.lock().await;
        if !store.members.contains_key(user_uuid) {
            return Err(not_found("user", user_uuid));
        }
        let email = store.email_of(user_uuid);
        let group = store.group_mut(group_uuid)?;
        if !group.members.iter().any(|m| m.user_uuid == user_uuid) {
            group.members.push(GroupMember {
                user_uuid: user_uuid.to_string(),
                email,
            });
        }
        Ok(())
    }

    async fn remove_group_member(
        &self,
        group_uuid: &str,
        user_uuid: &str,
    ) -> Result<(), ProviderError> {
        let mut store = self.store.lock().await;
        let group = store.group_mut(group_uuid)?;
        let before = group.members.len();
        group.members.retain(|m| m.user_uuid != user_uuid);
        if group.members.len() == before {
            return Err(not_found("group member", user_uuid));
        }
        Ok(())
    }

    async fn list_spaces(&self, project_uuid: &str) -> Result<Vec<SpaceSummary>, ProviderError> {
        let store = self.store.lock().await;
        store.project(project_uuid)?;
        Ok(store
            .spaces
            .values()
            .filter(|s| s.project_uuid == project_uuid)
            .map(|s| SpaceSummary {
                uuid: s.uuid.clone(),
                project_uuid: s.project_uuid.clone(),
                name: s.name.clone(),
                is_private: s.is_private,
                parent_space_uuid: s.parent_space_uuid.clone(),
            })
            .collect())
    }

    async fn create_space(
        &self,
        project_uuid: &str,
        request: &CreateSpace,
    ) -> Result<Space, ProviderError> {
        let mut store = self.store.lock().await;
        store.project(project_uuid)?;
        if let Some(parent) = &request.parent_space_uuid {
            store.space_mut(project_uuid, parent)?;
        }

        let uuid = store.next_uuid("space");
        let space = Space {
            uuid: uuid.clone(),
            project_uuid: project_uuid.to_string(),
            name: request.name.clone(),
            is_private: request.is_private,
            parent_space_uuid: request.parent_space_uuid.clone(),
            access: Vec::new(),
            groups_access: Vec::new(),
        };
        store.spaces.insert(uuid, space.clone());
        Ok(space)
    }

    async fn get_space(
        &self,
        project_uuid: &str,
        space_uuid: &str,
    ) -> Result<Space, ProviderError> {
        let mut store = self.store.lock().await;
        store.space_mut(project_uuid, space_uuid).map(|s| s.clone())
    }

    async fn update_space(
        &self,
        project_uuid: &str,
        space_uuid: &str,
        request: &UpdateSpace,
    ) -> Result<Space, ProviderError> {
        let mut store = self.store.lock().await;
        let space = store.space_mut(project_uuid, space_uuid)?;
        space.name = request.name.clone();
        space.is_private = request.is_private;
        Ok(space.clone())
    }

    async fn delete_space(
        &self,
        project_uuid: &str,
        space_uuid: &str,
    ) -> Result<(), ProviderError> {
        let mut store = self.store.lock().await;
        store.space_mut(project_uuid, space_uuid)?;
        store.spaces.remove(space_uuid);
        Ok(())
    }

    async fn share_space_with_user(
        &self,
        project_uuid: &str,
        space_uuid: &str,
        user_uuid: &str,
        role: SpaceRole,
    ) -> Result<(), ProviderError> {
        let mut store = self.store.lock().await;
        if !store.members.contains_key(user_uuid) {
            return Err(not_found("user", user_uuid));
        }
        let space = store.space_mut(project_uuid, space_uuid)?;
        space.access.retain(|a| a.user_uuid != user_uuid);
        space.access.push(SpaceUserAccess {
            user_uuid: user_uuid.to_string(),
            role,
            has_direct_access: true,
        });
        Ok(())
    }

    async fn unshare_space_with_user(
        &self,
        project_uuid: &str,
        space_uuid: &str,
        user_uuid: &str,
    ) -> Result<(), ProviderError> {
        let mut store = self.store.lock().await;
        let space = store.space_mut(project_uuid, space_uuid)?;
        let before = space.access.len();
        space
            .access
            .retain(|a| !(a.user_uuid == user_uuid && a.has_direct_access));
        if space.access.len() == before {
            return Err(not_found("space access", user_uuid));
        }
        Ok(())
    }

    async fn share_space_with_group(
        &self,
        project_uuid: &str,
        space_uuid: &str,
        group_uuid: &str,
        role: SpaceRole,
    ) -> Result<(), ProviderError> {
        let mut store = self.store.lock().await;
        store.group_mut(group_uuid)?;
        let space = store.space_mut(project_uuid, space_uuid)?;
        space.groups_access.retain(|a| a.group_uuid != group_uuid);
        space.groups_access.push(SpaceGroupAccess {
            group_uuid: group_uuid.to_string(),
            space_role: role,
        });
        Ok(())
    }

    async fn unshare_space_with_group(
        &self,
        project_uuid: &str,
        space_uuid: &str,
        group_uuid: &str,
    ) -> Result<(), ProviderError> {
        let mut store = self.store.lock().await;
        let space = store.space_mut(project_uuid, space_uuid)?;
        let before = space.groups_access.len();
        space.groups_access.retain(|a| a.group_uuid != group_uuid);
        if space.groups_access.len() == before {
            return Err(not_found("space group access", group_uuid));
        }
        Ok(())
    }

    async fn create_warehouse_credentials(
        &self,
        request: &WarehouseCredentialsRequest,
    ) -> Result<WarehouseCredentials, ProviderError> {
        let warehouse_type = warehouse_type(request)?;
        let mut store = self.store.lock().await;
        let uuid = store.next_uuid("credentials");
        let credentials = WarehouseCredentials {
            uuid: uuid.clone(),
            organization_uuid: store.organization.organization_uuid.clone(),
            name: request.name.clone(),
            description: request.description.clone(),
            credentials: WarehouseCredentialsSummary { warehouse_type },
        };
        store.warehouse_credentials.insert(uuid, credentials.clone());
        Ok(credentials)
    }

    async fn get_warehouse_credentials(
        &self,
        credentials_uuid: &str,
    ) -> Result<WarehouseCredentials, ProviderError> {
        self.store
            .lock()
            .await
            .warehouse_credentials
            .get(credentials_uuid)
            .cloned()
            .ok_or_else(|| not_found("warehouse credentials", credentials_uuid))
    }

    async fn update_warehouse_credentials(
        &self,
        credentials_uuid: &str,
        request: &WarehouseCredentialsRequest,
    ) -> Result<WarehouseCredentials, ProviderError> {
        let warehouse_type = warehouse_type(request)?;
        let mut store = self.store.lock().await;
        let credentials = store
            .warehouse_credentials
            .get_mut(credentials_uuid)
            .ok_or_else(|| not_found("warehouse credentials", credentials_uuid))?;
        credentials.name = request.name.clone();
        credentials.description = request.description.clone();
        credentials.credentials.warehouse_type = warehouse_type;
        Ok(credentials.clone())
    }

    async fn delete_warehouse_credentials(
        &self,
        credentials_uuid: &str,
    ) -> Result<(), ProviderError> {
        self.store
            .lock()
            .await
            .warehouse_credentials
            .remove(credentials_uuid)
            .map(drop)
            .ok_or_else(|| not_found("warehouse credentials", credentials_uuid))
    }

    async fn create_ai_agent(
        &self,
        project_uuid: &str,
        request: &AiAgentRequest,
    ) -> Result<AiAgent, ProviderError> {
        let mut store = self.store.lock().await;
        store.project(project_uuid)?;
        let uuid = store.next_uuid("agent");
        let agent = AiAgent {
            uuid: uuid.clone(),
            project_uuid: project_uuid.to_string(),
            name: request.name.clone(),
            instruction: request.instruction.clone(),
            tags: request.tags.clone(),
            enable_data_access: request.enable_data_access,
            group_access: request.group_access.clone(),
            user_access: request.user_access.clone(),
        };
        store.ai_agents.insert(uuid, agent.clone());
        Ok(agent)
    }

    async fn get_ai_agent(
        &self,
        project_uuid: &str,
        agent_uuid: &str,
    ) -> Result<AiAgent, ProviderError> {
        let mut store = self.store.lock().await;
        store.agent_mut(project_uuid, agent_uuid).map(|a| a.clone())
    }

    async fn update_ai_agent(
        &self,
        project_uuid: &str,
        agent_uuid: &str,
        request: &AiAgentRequest,
    ) -> Result<AiAgent, ProviderError> {
        let mut store = self.store.lock().await;
        let agent = store.agent_mut(project_uuid, agent_uuid)?;
        agent.name = request.name.clone();
        agent.instruction = request.instruction.clone();
        agent.tags = request.tags.clone();
        agent.enable_data_access = request.enable_data_access;
        agent.group_access = request.group_access.clone();
        agent.user_access = request.user_access.clone();
        Ok(agent.clone())
    }

    async fn delete_ai_agent(
        &self,
        project_uuid: &str,
        agent_uuid: &str,
    ) -> Result<(), ProviderError> {
        let mut store = self.store.lock().await;
        store.agent_mut(project_uuid, agent_uuid)?;
        store.ai_agents.remove(agent_uuid);
        Ok(())
    }
}

fn warehouse_type(request: &WarehouseCredentialsRequest) -> Result<String, ProviderError> {
    request
        .credentials
        .get("type")
        .and_then(|t| t.as_str())
        .map(str::to_string)
        .ok_or_else(|| ProviderError::InvalidRequest("credentials.type is required".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_grant_requires_organization_member() {
        let api = InMemoryLightdash::new().with_project("p1", "Analytics");
        let err = api
            .grant_project_access("p1", "ghost@example.com", ProjectMemberRole::Viewer)
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_grant_twice_conflicts() {
        let api = InMemoryLightdash::new()
            .with_organization_member("u1", "ann@example.com")
            .with_project("p1", "Analytics");
        api.grant_project_access("p1", "ann@example.com", ProjectMemberRole::Viewer)
            .await
            .unwrap();
        let err = api
            .grant_project_access("p1", "ann@example.com", ProjectMemberRole::Editor)
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::AlreadyExists(_)));
    }

    #[tokio::test]
    async fn test_remove_organization_member_drops_project_roles() {
        let api = InMemoryLightdash::new()
            .with_organization_member("u1", "ann@example.com")
            .with_project("p1", "Analytics");
        api.grant_project_access("p1", "ann@example.com", ProjectMemberRole::Viewer)
            .await
            .unwrap();

        api.remove_organization_member("u1").await;
        assert!(api.list_project_members("p1").await.unwrap().is_empty());
        assert!(api.list_organization_members().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_space_scoped_to_project() {
        let api = InMemoryLightdash::new()
            .with_project("p1", "Analytics")
            .with_project("p2", "Marketing");
        let space = api
            .create_space(
                "p1",
                &CreateSpace { name: "Sales".into(), is_private: true, parent_space_uuid: None },
            )
            .await
            .unwrap();

        assert!(api.get_space("p1", &space.uuid).await.is_ok());
        assert!(matches!(
            api.get_space("p2", &space.uuid).await,
            Err(ProviderError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_delete_group_cascades() {
        let api = InMemoryLightdash::new().with_project("p1", "Analytics");
        let group = api
            .create_group(&CreateGroup { name: "Analysts".into(), members: vec![] })
            .await
            .unwrap();
        api.grant_project_group_access("p1", &group.uuid, ProjectMemberRole::Editor)
            .await
            .unwrap();

        api.delete_group(&group.uuid).await.unwrap();
        assert!(api.list_project_group_accesses("p1").await.unwrap().is_empty());
    }
}
