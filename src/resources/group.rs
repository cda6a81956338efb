use std::collections::HashSet;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use super::{from_state, sorted, to_state, Resource};
use crate::client::{found, CreateGroup, LightdashApi, MemberRef, UpdateGroup};
use crate::diff::diff_sets;
use crate::error::ProviderError;
use crate::id::IdTemplate;
use crate::schema::{Attribute, AttributeType, Schema};

const ID: IdTemplate = IdTemplate::new("organizations/{organization_uuid}/groups/{group_uuid}");

/// `lightdash_group`: an organization group and its members.
#[derive(Debug, Clone, Copy, Default)]
pub struct GroupResource;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct State {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    organization_uuid: Option<String>,
    #[serde(default)]
    group_uuid: Option<String>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    members: Option<Vec<String>>,
}

impl State {
    fn group_uuid(&self) -> Result<&str, ProviderError> {
        self.group_uuid
            .as_deref()
            .ok_or_else(|| ProviderError::InvalidRequest("group state has no group_uuid".to_string()))
    }

    fn name(&self) -> Result<&str, ProviderError> {
        self.name
            .as_deref()
            .ok_or_else(|| ProviderError::Validation("'name' is required".to_string()))
    }
}

/// Drop requested members that are not (or no longer) in the organization.
async fn organization_members_only(
    api: &dyn LightdashApi,
    group: &str,
    requested: &[String],
) -> Result<Vec<String>, ProviderError> {
    if requested.is_empty() {
        return Ok(Vec::new());
    }
    let known: HashSet<String> = api
        .list_organization_members()
        .await?
        .into_iter()
        .map(|m| m.user_uuid)
        .collect();

    let mut kept = Vec::with_capacity(requested.len());
    for user_uuid in sorted(requested.to_vec()) {
        if known.contains(&user_uuid) {
            kept.push(user_uuid);
        } else {
            warn!(group = %group, user_uuid = %user_uuid, "Skipping group member not in organization");
        }
    }
    Ok(kept)
}

#[async_trait]
impl Resource for GroupResource {
    fn type_name(&self) -> &'static str {
        "lightdash_group"
    }

    fn schema(&self) -> Schema {
        Schema::v0()
            .with_description(include_str!("../../docs/resources/group.md"))
            .with_attribute(
                "id",
                Attribute::computed_string().with_description(format!("`{}`", ID.pattern())),
            )
            .with_attribute(
                "organization_uuid",
                Attribute::computed_string().with_description("Organization UUID."),
            )
            .with_attribute(
                "group_uuid",
                Attribute::computed_string().with_description("Group UUID."),
            )
            .with_attribute(
                "name",
                Attribute::required_string().with_description("Group name."),
            )
            .with_attribute(
                "members",
                Attribute::optional(AttributeType::string_set())
                    .with_default(json!([]))
                    .with_description(
                        "User UUIDs of the members. Users who are not in the organization are skipped with a warning.",
                    ),
            )
    }

    fn id_template(&self) -> IdTemplate {
        ID
    }

    async fn create(&self, api: &dyn LightdashApi, planned: Value) -> Result<Value, ProviderError> {
        let mut state: State = from_state(planned)?;
        let name = state.name()?.to_string();
        let members =
            organization_members_only(api, &name, state.members.as_deref().unwrap_or_default())
                .await?;

        let group = api
            .create_group(&CreateGroup {
                name: name.clone(),
                members: members
                    .iter()
                    .map(|user_uuid| MemberRef {
                        user_uuid: user_uuid.clone(),
                    })
                    .collect(),
            })
            .await?;
        info!(group_uuid = %group.uuid, name = %name, members = members.len(), "Created group");

        state.id = Some(ID.format(&[&group.organization_uuid, &group.uuid])?);
        state.organization_uuid = Some(group.organization_uuid);
        state.group_uuid = Some(group.uuid);
        state.members = Some(members);
        to_state(&state)
    }

    async fn read(
        &self,
        api: &dyn LightdashApi,
        current: Value,
    ) -> Result<Option<Value>, ProviderError> {
        let mut state: State = from_state(current)?;
        let Some(group) = found(api.get_group(state.group_uuid()?).await)? else {
            debug!(group_uuid = ?state.group_uuid, "Group no longer exists");
            return Ok(None);
        };

        state.id = Some(ID.format(&[&group.organization_uuid, &group.uuid])?);
        state.members = Some(group.member_uuids());
        state.name = Some(group.name);
        state.organization_uuid = Some(group.organization_uuid);
        state.group_uuid = Some(group.uuid);
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
        let group_uuid = prior.group_uuid()?.to_string();
        let name = state.name()?.to_string();

        if prior.name.as_deref() != Some(name.as_str()) {
            api.update_group(&group_uuid, &UpdateGroup { name: name.clone() })
                .await?;
            info!(group_uuid = %group_uuid, name = %name, "Renamed group");
        }

        let current = api.get_group(&group_uuid).await?.member_uuids();
        let desired =
            organization_members_only(api, &name, state.members.as_deref().unwrap_or_default())
                .await?;
        let diff = diff_sets(&current, &desired);
        for user_uuid in &diff.to_add {
            api.add_group_member(&group_uuid, user_uuid).await?;
        }
        for user_uuid in &diff.to_remove {
            found(api.remove_group_member(&group_uuid, user_uuid).await)?;
        }
        if !diff.is_empty() {
            info!(
                group_uuid = %group_uuid,
                added = diff.to_add.len(),
                removed = diff.to_remove.len(),
                "Updated group members"
            );
        }

        state.id = prior.id.clone();
        state.organization_uuid = prior.organization_uuid.clone();
        state.group_uuid = Some(group_uuid);
        state.members = Some(desired);
        to_state(&state)
    }

    async fn delete(&self, api: &dyn LightdashApi, current: Value) -> Result<(), ProviderError> {
        let state: State = from_state(current)?;
        let group_uuid = state.group_uuid()?;
        found(api.delete_group(group_uuid).await)?;
        info!(group_uuid = %group_uuid, "Deleted group");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::InMemoryLightdash;

    fn api() -> InMemoryLightdash {
        InMemoryLightdash::new()
            .with_organization_member("u1", "ann@example.com")
            .with_organization_member("u2", "bob@example.com")
            .with_organization_member("u3", "cat@example.com")
    }

    fn planned(name: &str, members: &[&str]) -> Value {
        json!({
            "id": null,
            "organization_uuid": null,
            "group_uuid": null,
            "name": name,
            "members": members,
        })
    }

    #[tokio::test]
    async fn test_create_skips_unknown_members() {
        let api = api();
        let state = GroupResource
            .create(&api, planned("Analysts", &["u2", "ghost", "u1"]))
            .await
            .unwrap();

        assert_eq!(state["members"], json!(["u1", "u2"]));
        let group_uuid = state["group_uuid"].as_str().unwrap();
        assert_eq!(
            state["id"],
            format!("organizations/org-1/groups/{}", group_uuid)
        );
    }

    #[tokio::test]
    async fn test_update_diffs_members_and_renames() {
        let api = api();
        let resource = GroupResource;
        let state = resource
            .create(&api, planned("Analysts", &["u1", "u2"]))
            .await
            .unwrap();

        let mut next = state.clone();
        next["name"] = json!("Data team");
        next["members"] = json!(["u2", "u3"]);
        let updated = resource.update(&api, state, next).await.unwrap();
        assert_eq!(updated["members"], json!(["u2", "u3"]));

        let read = resource.read(&api, updated).await.unwrap().unwrap();
        assert_eq!(read["name"], "Data team");
        assert_eq!(read["members"], json!(["u2", "u3"]));
    }

    #[tokio::test]
    async fn test_update_drops_member_who_left_organization() {
        let api = api();
        let resource = GroupResource;
        let state = resource
            .create(&api, planned("Analysts", &["u1", "u2"]))
            .await
            .unwrap();

        api.remove_organization_member("u2").await;
        let updated = resource.update(&api, state.clone(), state).await.unwrap();
        assert_eq!(updated["members"], json!(["u1"]));
    }

    #[tokio::test]
    async fn test_delete_and_import() {
        let api = api();
        let resource = GroupResource;
        let state = resource
            .create(&api, planned("Analysts", &["u1"]))
            .await
            .unwrap();

        let id = state["id"].as_str().unwrap().to_string();
        let imported = resource.import(&api, &id).await.unwrap();
        assert_eq!(imported["name"], "Analysts");
        assert_eq!(imported["members"], json!(["u1"]));

        resource.delete(&api, state.clone()).await.unwrap();
        assert!(resource.read(&api, state.clone()).await.unwrap().is_none());
        resource.delete(&api, state).await.unwrap();
    }
}
