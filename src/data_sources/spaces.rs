use async_trait::async_trait;
use serde_json::{json, Value};

use super::{required_str, DataSource};
use crate::client::LightdashApi;
use crate::error::ProviderError;
use crate::schema::{Attribute, AttributeType, Schema};

/// `lightdash_spaces`: every space in a project.
#[derive(Debug, Clone, Copy, Default)]
pub struct SpacesDataSource;

#[async_trait]
impl DataSource for SpacesDataSource {
    fn type_name(&self) -> &'static str {
        "lightdash_spaces"
    }

    fn schema(&self) -> Schema {
        Schema::v0()
            .with_description(include_str!("../../docs/data-sources/spaces.md"))
            .with_attribute("project_uuid", Attribute::required_string())
            .with_attribute(
                "spaces",
                Attribute::computed(AttributeType::list(AttributeType::object([
                    ("space_uuid", AttributeType::String),
                    ("name", AttributeType::String),
                    ("is_private", AttributeType::Bool),
                    ("parent_space_uuid", AttributeType::String),
                ]))),
            )
    }

    async fn read(&self, api: &dyn LightdashApi, config: Value) -> Result<Value, ProviderError> {
        let project_uuid = required_str(&config, "project_uuid")?;
        let mut spaces = api.list_spaces(project_uuid).await?;
        spaces.sort_by(|a, b| a.name.cmp(&b.name).then(a.uuid.cmp(&b.uuid)));
        Ok(json!({
            "project_uuid": project_uuid,
            "spaces": spaces
                .into_iter()
                .map(|s| json!({
                    "space_uuid": s.uuid,
                    "name": s.name,
                    "is_private": s.is_private,
                    "parent_space_uuid": s.parent_space_uuid,
                }))
                .collect::<Vec<_>>(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::CreateSpace;
    use crate::testing::InMemoryLightdash;

    #[tokio::test]
    async fn test_spaces() {
        let api = InMemoryLightdash::new().with_project("p1", "Analytics");
        let parent = api
            .create_space(
                "p1",
                &CreateSpace { name: "Sales".into(), is_private: false, parent_space_uuid: None },
            )
            .await
            .unwrap();
        api.create_space(
            "p1",
            &CreateSpace {
                name: "EMEA".into(),
                is_private: true,
                parent_space_uuid: Some(parent.uuid.clone()),
            },
        )
        .await
        .unwrap();

        let state = SpacesDataSource
            .read(&api, json!({"project_uuid": "p1"}))
            .await
            .unwrap();
        assert_eq!(state["spaces"][0]["name"], "EMEA");
        assert_eq!(state["spaces"][0]["parent_space_uuid"], parent.uuid.as_str());
        assert_eq!(state["spaces"][1]["is_private"], false);
        assert!(state["spaces"][1]["parent_space_uuid"].is_null());
    }
}
