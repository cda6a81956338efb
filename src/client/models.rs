//! Request and response bodies of the Lightdash REST API.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ProviderError;
use crate::members::ProjectMemberRole;

/// The organization the API token belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Organization {
    /// Organization UUID.
    pub organization_uuid: String,
    /// Display name.
    pub name: String,
}

/// A user in the organization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrganizationMember {
    /// User UUID.
    pub user_uuid: String,
    /// Login email.
    pub email: String,
    /// First name.
    #[serde(default)]
    pub first_name: String,
    /// Last name.
    #[serde(default)]
    pub last_name: String,
    /// Organization UUID.
    pub organization_uuid: String,
    /// Organization-level role (`member`, `viewer`, `editor`, `admin`, ...).
    pub role: String,
    /// Whether the user has activated their account.
    #[serde(default)]
    pub is_active: bool,
}

/// A project as listed under the organization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectSummary {
    /// Project UUID.
    pub project_uuid: String,
    /// Display name.
    pub name: String,
    /// `DEFAULT` or `PREVIEW`.
    #[serde(rename = "type")]
    pub project_type: String,
}

/// Project details.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    /// Project UUID.
    pub project_uuid: String,
    /// Owning organization.
    pub organization_uuid: String,
    /// Display name.
    pub name: String,
    /// `DEFAULT` or `PREVIEW`.
    #[serde(rename = "type")]
    pub project_type: String,
    /// IANA timezone used by scheduled deliveries.
    #[serde(default)]
    pub scheduler_timezone: Option<String>,
}

/// A user's direct role in a project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectMember {
    /// User UUID.
    pub user_uuid: String,
    /// Project UUID.
    pub project_uuid: String,
    /// Login email.
    pub email: String,
    /// Project role.
    pub role: ProjectMemberRole,
}

/// A group's role in a project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectGroupAccess {
    /// Project UUID.
    pub project_uuid: String,
    /// Group UUID.
    pub group_uuid: String,
    /// Project role granted to every group member.
    pub role: ProjectMemberRole,
}

/// A member entry inside a group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupMember {
    /// User UUID.
    pub user_uuid: String,
    /// Login email.
    #[serde(default)]
    pub email: String,
}

/// A user group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Group {
    /// Group UUID.
    pub uuid: String,
    /// Display name.
    pub name: String,
    /// Owning organization.
    pub organization_uuid: String,
    /// Current members.
    #[serde(default)]
    pub members: Vec<GroupMember>,
}

impl Group {
    /// Member user UUIDs, sorted.
    pub fn member_uuids(&self) -> Vec<String> {
        let mut uuids: Vec<String> = self.members.iter().map(|m| m.user_uuid.clone()).collect();
        uuids.sort();
        uuids.dedup();
        uuids
    }
}

/// Reference to a user by UUID, as sent in group bodies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemberRef {
    /// User UUID.
    pub user_uuid: String,
}

/// Body of `POST /org/groups`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateGroup {
    /// Display name.
    pub name: String,
    /// Initial members.
    pub members: Vec<MemberRef>,
}

/// Body of `PATCH /groups/{group_uuid}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateGroup {
    /// New display name.
    pub name: String,
}

/// Role inside a space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SpaceRole {
    /// Can view content in the space.
    Viewer,
    /// Can edit content in the space.
    Editor,
    /// Can manage the space and its access.
    Admin,
}

impl SpaceRole {
    /// All space roles, lowest first.
    pub const ALL: [SpaceRole; 3] = [Self::Viewer, Self::Editor, Self::Admin];

    /// Wire name of the role.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Viewer => "viewer",
            Self::Editor => "editor",
            Self::Admin => "admin",
        }
    }
}

impl fmt::Display for SpaceRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SpaceRole {
    type Err = ProviderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|role| role.as_str() == s)
            .ok_or_else(|| {
                ProviderError::Validation(format!(
                    "invalid space role '{}', expected one of: viewer, editor, admin",
                    s
                ))
            })
    }
}

/// A user's access to a space.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpaceUserAccess {
    /// User UUID.
    pub user_uuid: String,
    /// Effective role.
    pub role: SpaceRole,
    /// False when access is inherited from the project or organization role.
    #[serde(default)]
    pub has_direct_access: bool,
}

/// A group's access to a space.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpaceGroupAccess {
    /// Group UUID.
    pub group_uuid: String,
    /// Role granted to the group.
    pub space_role: SpaceRole,
}

/// A space with its access lists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Space {
    /// Space UUID.
    pub uuid: String,
    /// Owning project.
    pub project_uuid: String,
    /// Display name.
    pub name: String,
    /// Private spaces are only visible to users with explicit access.
    pub is_private: bool,
    /// Parent space for nested spaces.
    #[serde(default)]
    pub parent_space_uuid: Option<String>,
    /// User access, direct and inherited.
    #[serde(default)]
    pub access: Vec<SpaceUserAccess>,
    /// Group access.
    #[serde(default)]
    pub groups_access: Vec<SpaceGroupAccess>,
}

/// A space as listed under a project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpaceSummary {
    /// Space UUID.
    pub uuid: String,
    /// Owning project.
    pub project_uuid: String,
    /// Display name.
    pub name: String,
    /// Whether the space is private.
    pub is_private: bool,
    /// Parent space for nested spaces.
    #[serde(default)]
    pub parent_space_uuid: Option<String>,
}

/// Body of `POST /projects/{project_uuid}/spaces`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSpace {
    /// Display name.
    pub name: String,
    /// Whether the space is private.
    pub is_private: bool,
    /// Parent space for nested spaces.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_space_uuid: Option<String>,
}

/// Body of `PATCH /projects/{project_uuid}/spaces/{space_uuid}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateSpace {
    /// Display name.
    pub name: String,
    /// Whether the space is private.
    pub is_private: bool,
}

/// Non-secret view of the connection settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WarehouseCredentialsSummary {
    /// Warehouse type, e.g. `snowflake`.
    #[serde(rename = "type")]
    pub warehouse_type: String,
}

/// Organization-level warehouse credentials.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WarehouseCredentials {
    /// Credentials UUID.
    pub uuid: String,
    /// Owning organization.
    pub organization_uuid: String,
    /// Display name.
    pub name: String,
    /// Free-form description.
    #[serde(default)]
    pub description: Option<String>,
    /// Connection settings with secrets stripped.
    pub credentials: WarehouseCredentialsSummary,
}

/// Body of the warehouse credentials create and update calls.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WarehouseCredentialsRequest {
    /// Display name.
    pub name: String,
    /// Free-form description.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Connection settings including the `type` key and secrets.
    pub credentials: serde_json::Map<String, serde_json::Value>,
}

impl fmt::Display for WarehouseCredentialsRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({} setting(s))", self.name, self.credentials.len())
    }
}

/// An AI agent configured on a project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AiAgent {
    /// Agent UUID.
    pub uuid: String,
    /// Owning project.
    pub project_uuid: String,
    /// Display name.
    pub name: String,
    /// System instruction.
    #[serde(default)]
    pub instruction: Option<String>,
    /// Explore tags the agent may query.
    #[serde(default)]
    pub tags: Option<Vec<String>>,
    /// Whether the agent may read query results.
    #[serde(default)]
    pub enable_data_access: bool,
    /// Groups allowed to use the agent.
    #[serde(default)]
    pub group_access: Vec<String>,
    /// Users allowed to use the agent.
    #[serde(default)]
    pub user_access: Vec<String>,
}

/// Body of the AI agent create and update calls.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AiAgentRequest {
    /// Display name.
    pub name: String,
    /// System instruction.
    pub instruction: Option<String>,
    /// Explore tags the agent may query.
    pub tags: Option<Vec<String>>,
    /// Whether the agent may read query results.
    pub enable_data_access: bool,
    /// Groups allowed to use the agent.
    pub group_access: Vec<String>,
    /// Users allowed to use the agent.
    pub user_access: Vec<String>,
}
