use async_trait::async_trait;
use serde_json::{json, Value};

use super::{string_object, DataSource};
use crate::client::LightdashApi;
use crate::error::ProviderError;
use crate::schema::{Attribute, AttributeType, Schema};

/// `lightdash_groups`: every group in the organization.
#[derive(Debug, Clone, Copy, Default)]
pub struct GroupsDataSource;

#[async_trait]
impl DataSource for GroupsDataSource {
    fn type_name(&self) -> &'static str {
        "lightdash_groups"
    }

    fn schema(&self) -> Schema {
        Schema::v0()
            .with_description(include_str!("../../docs/data-sources/groups.md"))
            .with_attribute(
                "groups",
                Attribute::computed(AttributeType::list(string_object(&["group_uuid", "name"]))),
            )
    }

    async fn read(&self, api: &dyn LightdashApi, _config: Value) -> Result<Value, ProviderError> {
        let mut groups = api.list_groups().await?;
        groups.sort_by(|a, b| a.name.cmp(&b.name).then(a.uuid.cmp(&b.uuid)));
        Ok(json!({
            "groups": groups
                .into_iter()
                .map(|g| json!({"group_uuid": g.uuid, "name": g.name}))
                .collect::<Vec<_>>(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::CreateGroup;
    use crate::testing::InMemoryLightdash;

    #[tokio::test]
    async fn test_groups_sorted() {
        let api = InMemoryLightdash::new();
        for name in ["Engineering", "Analysts"] {
            api.create_group(&CreateGroup { name: name.into(), members: vec![] })
                .await
                .unwrap();
        }

        let state = GroupsDataSource.read(&api, json!({})).await.unwrap();
        let names: Vec<_> = state["groups"]
            .as_array()
            .unwrap()
            .iter()
            .map(|g| g["name"].as_str().unwrap())
            .collect();
        assert_eq!(names, vec!["Analysts", "Engineering"]);
    }
}
