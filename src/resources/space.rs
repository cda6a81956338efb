use std::collections::HashSet;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, info};

use super::{from_state, to_state, Resource};
use crate::client::{found, CreateSpace, LightdashApi, Space, SpaceRole, UpdateSpace};
use crate::diff::diff_assignments;
use crate::error::ProviderError;
use crate::id::IdTemplate;
use crate::schema::{Attribute, AttributeType, Diagnostic, Schema};
use crate::validation;

const ID: IdTemplate = IdTemplate::new("projects/{project_uuid}/spaces/{space_uuid}");

/// `lightdash_space`: a space with its user and group access lists.
#[derive(Debug, Clone, Copy, Default)]
pub struct SpaceResource;

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
struct UserAccess {
    user_uuid: String,
    space_role: SpaceRole,
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
struct GroupAccess {
    group_uuid: String,
    space_role: SpaceRole,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct State {
    #[serde(default)]
    id: Option<String>,
    project_uuid: String,
    #[serde(default)]
    space_uuid: Option<String>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    is_private: Option<bool>,
    #[serde(default)]
    parent_space_uuid: Option<String>,
    #[serde(default)]
    deletion_protection: Option<bool>,
    #[serde(default)]
    access: Option<Vec<UserAccess>>,
    #[serde(default)]
    group_access: Option<Vec<GroupAccess>>,
}

impl State {
    fn space_uuid(&self) -> Result<&str, ProviderError> {
        self.space_uuid
            .as_deref()
            .ok_or_else(|| ProviderError::InvalidRequest("space state has no space_uuid".to_string()))
    }

    fn name(&self) -> Result<&str, ProviderError> {
        self.name
            .as_deref()
            .ok_or_else(|| ProviderError::Validation("'name' is required".to_string()))
    }

    fn user_pairs(&self) -> Vec<(String, SpaceRole)> {
        self.access
            .iter()
            .flatten()
            .map(|a| (a.user_uuid.clone(), a.space_role))
            .collect()
    }

    fn group_pairs(&self) -> Vec<(String, SpaceRole)> {
        self.group_access
            .iter()
            .flatten()
            .map(|a| (a.group_uuid.clone(), a.space_role))
            .collect()
    }

    /// Keep one role per user and group, the last listed, as reconciliation does.
    fn sort_access(&mut self) {
        if let Some(access) = &mut self.access {
            one_role_per_key(access, |a| a.user_uuid.as_str());
        }
        if let Some(access) = &mut self.group_access {
            one_role_per_key(access, |a| a.group_uuid.as_str());
        }
    }
}

fn one_role_per_key<T: Ord>(access: &mut Vec<T>, key: impl Fn(&T) -> &str) {
    let mut seen = HashSet::new();
    let mut kept = Vec::with_capacity(access.len());
    for entry in access.drain(..).rev() {
        if seen.insert(key(&entry).to_string()) {
            kept.push(entry);
        }
    }
    kept.sort();
    *access = kept;
}

/// Direct user access of a space; inherited project or organization access
/// is not managed here.
fn direct_user_pairs(space: &Space) -> Vec<(String, SpaceRole)> {
    space
        .access
        .iter()
        .filter(|a| a.has_direct_access)
        .map(|a| (a.user_uuid.clone(), a.role))
        .collect()
}

fn group_pairs(space: &Space) -> Vec<(String, SpaceRole)> {
    space
        .groups_access
        .iter()
        .map(|a| (a.group_uuid.clone(), a.space_role))
        .collect()
}

async fn reconcile_access(
    api: &dyn LightdashApi,
    project_uuid: &str,
    space_uuid: &str,
    current_users: &[(String, SpaceRole)],
    current_groups: &[(String, SpaceRole)],
    desired: &State,
) -> Result<(), ProviderError> {
    let desired_users = desired.user_pairs();
    let users = diff_assignments(current_users, &desired_users);
    for (user_uuid, role) in users.to_add.iter().chain(&users.to_update) {
        api.share_space_with_user(project_uuid, space_uuid, user_uuid, *role)
            .await?;
    }
    for user_uuid in &users.to_remove {
        found(
            api.unshare_space_with_user(project_uuid, space_uuid, user_uuid)
                .await,
        )?;
    }

    let desired_groups = desired.group_pairs();
    let groups = diff_assignments(current_groups, &desired_groups);
    for (group_uuid, role) in groups.to_add.iter().chain(&groups.to_update) {
        api.share_space_with_group(project_uuid, space_uuid, group_uuid, *role)
            .await?;
    }
    for group_uuid in &groups.to_remove {
        found(
            api.unshare_space_with_group(project_uuid, space_uuid, group_uuid)
                .await,
        )?;
    }

    if !users.is_empty() || !groups.is_empty() {
        info!(
            project_uuid = %project_uuid,
            space_uuid = %space_uuid,
            users_granted = users.to_add.len() + users.to_update.len(),
            users_revoked = users.to_remove.len(),
            groups_granted = groups.to_add.len() + groups.to_update.len(),
            groups_revoked = groups.to_remove.len(),
            "Updated space access"
        );
    }
    Ok(())
}

fn access_type(key: &str) -> AttributeType {
    AttributeType::set(AttributeType::object([
        (key, AttributeType::String),
        ("space_role", AttributeType::String),
    ]))
}

#[async_trait]
impl Resource for SpaceResource {
    fn type_name(&self) -> &'static str {
        "lightdash_space"
    }

    fn schema(&self) -> Schema {
        Schema::v0()
            .with_description(include_str!("../../docs/resources/space.md"))
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
                "space_uuid",
                Attribute::computed_string().with_description("Space UUID."),
            )
            .with_attribute(
                "name",
                Attribute::required_string().with_description("Space name."),
            )
            .with_attribute(
                "is_private",
                Attribute::optional_bool()
                    .with_default(json!(true))
                    .with_description("Whether only users with explicit access can see the space."),
            )
            .with_attribute(
                "parent_space_uuid",
                Attribute::optional_string()
                    .with_force_new()
                    .with_description("Parent space for a nested space."),
            )
            .with_attribute(
                "deletion_protection",
                Attribute::optional_bool()
                    .with_default(json!(false))
                    .with_description("Refuse to delete the space while true."),
            )
            .with_attribute(
                "access",
                Attribute::optional(access_type("user_uuid"))
                    .with_default(json!([]))
                    .with_description("Direct user access: `user_uuid` and `space_role` (viewer, editor, admin)."),
            )
            .with_attribute(
                "group_access",
                Attribute::optional(access_type("group_uuid"))
                    .with_default(json!([]))
                    .with_description("Group access: `group_uuid` and `space_role` (viewer, editor, admin)."),
            )
    }

    fn id_template(&self) -> IdTemplate {
        ID
    }

    fn validate(&self, config: &Value) -> Vec<Diagnostic> {
        let mut diagnostics = validation::validate(&self.schema(), config);
        for (list, key) in [("access", "user_uuid"), ("group_access", "group_uuid")] {
            let entries = config.get(list).and_then(Value::as_array).into_iter().flatten();
            let mut seen = HashSet::new();
            for (index, entry) in entries.enumerate() {
                if let Some(uuid) = entry.get(key).and_then(Value::as_str) {
                    if !seen.insert(uuid) {
                        let path = format!("{}.{}.{}", list, index, key);
                        diagnostics.push(
                            Diagnostic::error(format!("Duplicate {} in '{}'", key, list))
                                .with_detail(format!("'{}' is listed more than once; give it a single space_role", uuid))
                                .with_attribute(path),
                        );
                    }
                }
                let Some(role) = entry.get("space_role").and_then(Value::as_str) else {
                    continue;
                };
                if let Err(err) = role.parse::<SpaceRole>() {
                    let path = format!("{}.{}.space_role", list, index);
                    diagnostics.push(
                        Diagnostic::error(format!("Invalid value for '{}'", path))
                            .with_detail(err.message().to_string())
                            .with_attribute(path),
                    );
                }
            }
        }
        diagnostics
    }

    async fn create(&self, api: &dyn LightdashApi, planned: Value) -> Result<Value, ProviderError> {
        let mut state: State = from_state(planned)?;
        let space = api
            .create_space(
                &state.project_uuid,
                &CreateSpace {
                    name: state.name()?.to_string(),
                    is_private: state.is_private.unwrap_or(true),
                    parent_space_uuid: state.parent_space_uuid.clone(),
                },
            )
            .await?;
        info!(project_uuid = %state.project_uuid, space_uuid = %space.uuid, "Created space");

        reconcile_access(
            api,
            &state.project_uuid,
            &space.uuid,
            &direct_user_pairs(&space),
            &group_pairs(&space),
            &state,
        )
        .await?;

        state.id = Some(ID.format(&[&state.project_uuid, &space.uuid])?);
        state.space_uuid = Some(space.uuid);
        state.is_private = Some(space.is_private);
        state.deletion_protection.get_or_insert(false);
        state.access.get_or_insert_with(Vec::new);
        state.group_access.get_or_insert_with(Vec::new);
        state.sort_access();
        to_state(&state)
    }

    async fn read(
        &self,
        api: &dyn LightdashApi,
        current: Value,
    ) -> Result<Option<Value>, ProviderError> {
        let mut state: State = from_state(current)?;
        let Some(space) = found(api.get_space(&state.project_uuid, state.space_uuid()?).await)?
        else {
            debug!(space_uuid = ?state.space_uuid, "Space no longer exists");
            return Ok(None);
        };

        state.access = Some(
            direct_user_pairs(&space)
                .into_iter()
                .map(|(user_uuid, space_role)| UserAccess { user_uuid, space_role })
                .collect(),
        );
        state.group_access = Some(
            group_pairs(&space)
                .into_iter()
                .map(|(group_uuid, space_role)| GroupAccess { group_uuid, space_role })
                .collect(),
        );
        state.sort_access();
        state.id = Some(ID.format(&[&state.project_uuid, &space.uuid])?);
        state.space_uuid = Some(space.uuid);
        state.name = Some(space.name);
        state.is_private = Some(space.is_private);
        state.parent_space_uuid = space.parent_space_uuid;
        state.deletion_protection.get_or_insert(false);
        Ok(Some(to_state(&state)?))
    }

    async fn update(
        &self,
        api: &dyn LightdashApi,
        prior: Value,
        planned: Value,
    ) -> Result<Value, ProviderError> {
        let prior: State = from_state(prior)?;
        let mut state: State = from_state(planned)?;
        let space_uuid = prior.space_uuid()?.to_string();
        let name = state.name()?.to_string();
        let is_private = state.is_private.unwrap_or(true);

        let space = if prior.name.as_deref() != Some(name.as_str()) || prior.is_private != Some(is_private) {
            let space = api
                .update_space(
                    &state.project_uuid,
                    &space_uuid,
                    &UpdateSpace { name, is_private },
                )
                .await?;
            info!(project_uuid = %state.project_uuid, space_uuid = %space_uuid, "Updated space");
            space
        } else {
            api.get_space(&state.project_uuid, &space_uuid).await?
        };

        reconcile_access(
            api,
            &state.project_uuid,
            &space_uuid,
            &direct_user_pairs(&space),
            &group_pairs(&space),
            &state,
        )
        .await?;

        state.id = prior.id.clone();
        state.space_uuid = Some(space_uuid);
        state.access.get_or_insert_with(Vec::new);
        state.group_access.get_or_insert_with(Vec::new);
        state.sort_access();
        to_state(&state)
    }

    async fn delete(&self, api: &dyn LightdashApi, current: Value) -> Result<(), ProviderError> {
        let state: State = from_state(current)?;
        let space_uuid = state.space_uuid()?;
        if state.deletion_protection == Some(true) {
            return Err(ProviderError::FailedPrecondition(format!(
                "space '{}' has deletion_protection enabled; set it to false and apply before destroying",
                space_uuid
            )));
        }

        found(api.delete_space(&state.project_uuid, space_uuid).await)?;
        info!(project_uuid = %state.project_uuid, space_uuid = %space_uuid, "Deleted space");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::CreateGroup;
    use crate::testing::InMemoryLightdash;

    fn api() -> InMemoryLightdash {
        InMemoryLightdash::new()
            .with_organization_member("u1", "ann@example.com")
            .with_organization_member("u2", "bob@example.com")
            .with_project("p1", "Analytics")
    }

    fn planned(access: Value, group_access: Value) -> Value {
        json!({
            "id": null,
            "project_uuid": "p1",
            "space_uuid": null,
            "name": "Finance",
            "is_private": true,
            "parent_space_uuid": null,
            "deletion_protection": false,
            "access": access,
            "group_access": group_access,
        })
    }

    #[tokio::test]
    async fn test_create_with_access() {
        let api = api();
        let group = api
            .create_group(&CreateGroup { name: "Analysts".into(), members: vec![] })
            .await
            .unwrap();

        let state = SpaceResource
            .create(
                &api,
                planned(
                    json!([
                        {"user_uuid": "u2", "space_role": "viewer"},
                        {"user_uuid": "u1", "space_role": "admin"}
                    ]),
                    json!([{"group_uuid": group.uuid, "space_role": "editor"}]),
                ),
            )
            .await
            .unwrap();

        let space_uuid = state["space_uuid"].as_str().unwrap();
        assert_eq!(state["id"], format!("projects/p1/spaces/{}", space_uuid));
        assert_eq!(state["access"][0]["user_uuid"], "u1");

        let read = SpaceResource.read(&api, state.clone()).await.unwrap().unwrap();
        assert_eq!(read["access"], state["access"]);
        assert_eq!(read["group_access"][0]["space_role"], "editor");
    }

    #[tokio::test]
    async fn test_update_reconciles_access() {
        let api = api();
        let resource = SpaceResource;
        let state = resource
            .create(
                &api,
                planned(
                    json!([
                        {"user_uuid": "u1", "space_role": "viewer"},
                        {"user_uuid": "u2", "space_role": "viewer"}
                    ]),
                    json!([]),
                ),
            )
            .await
            .unwrap();

        let mut next = state.clone();
        next["name"] = json!("Finance (restricted)");
        next["access"] = json!([{"user_uuid": "u1", "space_role": "editor"}]);
        let updated = resource.update(&api, state, next).await.unwrap();

        let read = resource.read(&api, updated).await.unwrap().unwrap();
        assert_eq!(read["name"], "Finance (restricted)");
        assert_eq!(read["access"], json!([{"user_uuid": "u1", "space_role": "editor"}]));
    }

    #[tokio::test]
    async fn test_deletion_protection() {
        let api = api();
        let resource = SpaceResource;
        let mut config = planned(json!([]), json!([]));
        config["deletion_protection"] = json!(true);
        let state = resource.create(&api, config).await.unwrap();

        let err = resource.delete(&api, state.clone()).await.unwrap_err();
        assert!(matches!(err, ProviderError::FailedPrecondition(_)));
        assert!(resource.read(&api, state.clone()).await.unwrap().is_some());

        let mut unprotected = state;
        unprotected["deletion_protection"] = json!(false);
        resource.delete(&api, unprotected.clone()).await.unwrap();
        assert!(resource.read(&api, unprotected).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_import_defaults_deletion_protection() {
        let api = api();
        let state = SpaceResource
            .create(&api, planned(json!([]), json!([])))
            .await
            .unwrap();

        let id = state["id"].as_str().unwrap().to_string();
        let imported = SpaceResource.import(&api, &id).await.unwrap();
        assert_eq!(imported["name"], "Finance");
        assert_eq!(imported["deletion_protection"], false);
    }

    #[test]
    fn test_validate_space_role() {
        let diagnostics = SpaceResource.validate(&json!({
            "project_uuid": "p1",
            "name": "Finance",
            "access": [{"user_uuid": "u1", "space_role": "owner"}]
        }));
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].attribute.as_deref(), Some("access.0.space_role"));
    }

    #[test]
    fn test_validate_rejects_repeated_grantee() {
        let diagnostics = SpaceResource.validate(&json!({
            "project_uuid": "p1",
            "name": "Finance",
            "access": [
                {"user_uuid": "u1", "space_role": "viewer"},
                {"user_uuid": "u1", "space_role": "editor"}
            ],
            "group_access": [
                {"group_uuid": "g1", "space_role": "viewer"},
                {"group_uuid": "g2", "space_role": "viewer"},
                {"group_uuid": "g1", "space_role": "admin"}
            ]
        }));
        let paths: Vec<_> = diagnostics.iter().filter_map(|d| d.attribute.as_deref()).collect();
        assert_eq!(paths, vec!["access.1.user_uuid", "group_access.2.group_uuid"]);
    }

    #[tokio::test]
    async fn test_repeated_grantee_state_matches_read() {
        let api = api();
        let state = SpaceResource
            .create(
                &api,
                planned(
                    json!([
                        {"user_uuid": "u1", "space_role": "viewer"},
                        {"user_uuid": "u1", "space_role": "editor"}
                    ]),
                    json!([]),
                ),
            )
            .await
            .unwrap();
        assert_eq!(state["access"], json!([{"user_uuid": "u1", "space_role": "editor"}]));

        let read = SpaceResource.read(&api, state.clone()).await.unwrap().unwrap();
        assert_eq!(read["access"], state["access"]);
    }
}
