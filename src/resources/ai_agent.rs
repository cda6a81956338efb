use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::info;

use super::{from_state, sorted, to_state, Resource};
use crate::client::{found, AiAgent, AiAgentRequest, LightdashApi};
use crate::error::ProviderError;
use crate::id::IdTemplate;
use crate::schema::{Attribute, AttributeType, Schema};

const ID: IdTemplate = IdTemplate::new("projects/{project_uuid}/ai-agents/{agent_uuid}");

/// `lightdash_ai_agent`: an AI agent bound to a project.
#[derive(Debug, Clone, Copy, Default)]
pub struct AiAgentResource;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct State {
    #[serde(default)]
    id: Option<String>,
    project_uuid: String,
    #[serde(default)]
    agent_uuid: Option<String>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    instruction: Option<String>,
    #[serde(default)]
    tags: Option<Vec<String>>,
    #[serde(default)]
    enable_data_access: Option<bool>,
    #[serde(default)]
    group_access: Option<Vec<String>>,
    #[serde(default)]
    user_access: Option<Vec<String>>,
}

impl State {
    fn agent_uuid(&self) -> Result<&str, ProviderError> {
        self.agent_uuid
            .as_deref()
            .ok_or_else(|| ProviderError::InvalidRequest("AI agent state has no agent_uuid".to_string()))
    }

    fn request(&self) -> Result<AiAgentRequest, ProviderError> {
        Ok(AiAgentRequest {
            name: self
                .name
                .clone()
                .ok_or_else(|| ProviderError::Validation("'name' is required".to_string()))?,
            instruction: self.instruction.clone(),
            tags: self.tags.clone().map(sorted),
            enable_data_access: self.enable_data_access.unwrap_or(false),
            group_access: sorted(self.group_access.clone().unwrap_or_default()),
            user_access: sorted(self.user_access.clone().unwrap_or_default()),
        })
    }

    fn apply(&mut self, agent: AiAgent) -> Result<(), ProviderError> {
        self.id = Some(ID.format(&[&agent.project_uuid, &agent.uuid])?);
        self.agent_uuid = Some(agent.uuid);
        self.name = Some(agent.name);
        self.instruction = agent.instruction;
        self.tags = agent.tags.map(sorted);
        self.enable_data_access = Some(agent.enable_data_access);
        self.group_access = Some(sorted(agent.group_access));
        self.user_access = Some(sorted(agent.user_access));
        Ok(())
    }
}

#[async_trait]
impl Resource for AiAgentResource {
    fn type_name(&self) -> &'static str {
        "lightdash_ai_agent"
    }

    fn schema(&self) -> Schema {
        Schema::v0()
            .with_description(include_str!("../../docs/resources/ai_agent.md"))
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
            .with_attribute("agent_uuid", Attribute::computed_string())
            .with_attribute("name", Attribute::required_string())
            .with_attribute(
                "instruction",
                Attribute::optional_string().with_description("System instruction for the agent."),
            )
            .with_attribute(
                "tags",
                Attribute::optional(AttributeType::string_set())
                    .with_description("Only explores with one of these tags are visible to the agent."),
            )
            .with_attribute(
                "enable_data_access",
                Attribute::optional_bool()
                    .with_default(json!(false))
                    .with_description("Allow the agent to read query results."),
            )
            .with_attribute(
                "group_access",
                Attribute::optional(AttributeType::string_set()).with_default(json!([])),
            )
            .with_attribute(
                "user_access",
                Attribute::optional(AttributeType::string_set()).with_default(json!([])),
            )
    }

    fn id_template(&self) -> IdTemplate {
        ID
    }

    async fn create(&self, api: &dyn LightdashApi, planned: Value) -> Result<Value, ProviderError> {
        let mut state: State = from_state(planned)?;
        let agent = api
            .create_ai_agent(&state.project_uuid, &state.request()?)
            .await?;
        info!(project_uuid = %state.project_uuid, agent_uuid = %agent.uuid, "Created AI agent");
        state.apply(agent)?;
        to_state(&state)
    }

    async fn read(
        &self,
        api: &dyn LightdashApi,
        current: Value,
    ) -> Result<Option<Value>, ProviderError> {
        let mut state: State = from_state(current)?;
        let Some(agent) = found(api.get_ai_agent(&state.project_uuid, state.agent_uuid()?).await)?
        else {
            return Ok(None);
        };
        state.apply(agent)?;
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
        let agent = api
            .update_ai_agent(&state.project_uuid, prior.agent_uuid()?, &state.request()?)
            .await?;
        info!(project_uuid = %state.project_uuid, agent_uuid = %agent.uuid, "Updated AI agent");
        state.apply(agent)?;
        to_state(&state)
    }

    async fn delete(&self, api: &dyn LightdashApi, current: Value) -> Result<(), ProviderError> {
        let state: State = from_state(current)?;
        let agent_uuid = state.agent_uuid()?;
        found(api.delete_ai_agent(&state.project_uuid, agent_uuid).await)?;
        info!(project_uuid = %state.project_uuid, agent_uuid = %agent_uuid, "Deleted AI agent");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::InMemoryLightdash;

    #[tokio::test]
    async fn test_lifecycle() {
        let api = InMemoryLightdash::new().with_project("p1", "Analytics");
        let resource = AiAgentResource;

        let state = resource
            .create(
                &api,
                json!({
                    "project_uuid": "p1",
                    "name": "Revenue helper",
                    "instruction": "Answer in EUR.",
                    "tags": ["finance", "ai"],
                    "enable_data_access": null,
                    "group_access": [],
                    "user_access": ["u2", "u1"]
                }),
            )
            .await
            .unwrap();
        assert_eq!(state["enable_data_access"], false);
        assert_eq!(state["tags"], json!(["ai", "finance"]));
        assert_eq!(state["user_access"], json!(["u1", "u2"]));

        let mut next = state.clone();
        next["enable_data_access"] = json!(true);
        next["instruction"] = Value::Null;
        let updated = resource.update(&api, state, next).await.unwrap();
        assert_eq!(updated["enable_data_access"], true);
        assert!(updated["instruction"].is_null());

        let id = updated["id"].as_str().unwrap().to_string();
        let imported = resource.import(&api, &id).await.unwrap();
        assert_eq!(imported["name"], "Revenue helper");

        resource.delete(&api, updated.clone()).await.unwrap();
        assert!(resource.read(&api, updated).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_create_in_missing_project() {
        let api = InMemoryLightdash::new();
        let err = AiAgentResource
            .create(&api, json!({"project_uuid": "nope", "name": "x"}))
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::NotFound(_)));
    }
}
