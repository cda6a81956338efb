use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;

use super::{from_state, to_state, Resource};
use crate::client::{found, LightdashApi};
use crate::error::ProviderError;
use crate::id::IdTemplate;
use crate::schema::{Attribute, Schema};

const ID: IdTemplate = IdTemplate::new("projects/{project_uuid}/scheduler-settings");

/// Timezone restored when the resource is destroyed.
const DEFAULT_TIMEZONE: &str = "UTC";

/// `lightdash_project_scheduler_settings`: the scheduler timezone of a project.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProjectSchedulerSettingsResource;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct State {
    #[serde(default)]
    id: Option<String>,
    project_uuid: String,
    #[serde(default)]
    scheduler_timezone: Option<String>,
}

impl State {
    fn timezone(&self) -> Result<&str, ProviderError> {
        self.scheduler_timezone
            .as_deref()
            .ok_or_else(|| ProviderError::Validation("'scheduler_timezone' is required".to_string()))
    }
}

#[async_trait]
impl Resource for ProjectSchedulerSettingsResource {
    fn type_name(&self) -> &'static str {
        "lightdash_project_scheduler_settings"
    }

    fn schema(&self) -> Schema {
        Schema::v0()
            .with_description(include_str!("../../docs/resources/project_scheduler_settings.md"))
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
                "scheduler_timezone",
                Attribute::required_string()
                    .with_description("IANA timezone for scheduled deliveries, e.g. `Asia/Tokyo`."),
            )
    }

    fn id_template(&self) -> IdTemplate {
        ID
    }

    async fn create(&self, api: &dyn LightdashApi, planned: Value) -> Result<Value, ProviderError> {
        let mut state: State = from_state(planned)?;
        api.update_scheduler_settings(&state.project_uuid, state.timezone()?)
            .await?;
        info!(
            project_uuid = %state.project_uuid,
            scheduler_timezone = ?state.scheduler_timezone,
            "Set project scheduler timezone"
        );
        state.id = Some(ID.format(&[&state.project_uuid])?);
        to_state(&state)
    }

    async fn read(
        &self,
        api: &dyn LightdashApi,
        current: Value,
    ) -> Result<Option<Value>, ProviderError> {
        let mut state: State = from_state(current)?;
        let Some(project) = found(api.get_project(&state.project_uuid).await)? else {
            return Ok(None);
        };
        state.id = Some(ID.format(&[&state.project_uuid])?);
        state.scheduler_timezone = Some(
            project
                .scheduler_timezone
                .unwrap_or_else(|| DEFAULT_TIMEZONE.to_string()),
        );
        Ok(Some(to_state(&state)?))
    }

    async fn update(
        &self,
        api: &dyn LightdashApi,
        _prior: Value,
        planned: Value,
    ) -> Result<Value, ProviderError> {
        self.create(api, planned).await
    }

    async fn delete(&self, api: &dyn LightdashApi, current: Value) -> Result<(), ProviderError> {
        let state: State = from_state(current)?;
        found(
            api.update_scheduler_settings(&state.project_uuid, DEFAULT_TIMEZONE)
                .await,
        )?;
        info!(project_uuid = %state.project_uuid, "Reset project scheduler timezone");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::InMemoryLightdash;
    use serde_json::json;

    #[tokio::test]
    async fn test_lifecycle_resets_to_utc() {
        let api = InMemoryLightdash::new().with_project("p1", "Analytics");
        let resource = ProjectSchedulerSettingsResource;

        let state = resource
            .create(&api, json!({"project_uuid": "p1", "scheduler_timezone": "Asia/Tokyo"}))
            .await
            .unwrap();
        assert_eq!(state["id"], "projects/p1/scheduler-settings");

        let imported = resource
            .import(&api, "projects/p1/scheduler-settings")
            .await
            .unwrap();
        assert_eq!(imported["scheduler_timezone"], "Asia/Tokyo");

        resource.delete(&api, state).await.unwrap();
        let project = api.get_project("p1").await.unwrap();
        assert_eq!(project.scheduler_timezone.as_deref(), Some("UTC"));
    }

    #[tokio::test]
    async fn test_read_missing_project() {
        let api = InMemoryLightdash::new();
        let state = ProjectSchedulerSettingsResource
            .read(&api, json!({"project_uuid": "nope", "scheduler_timezone": "UTC"}))
            .await
            .unwrap();
        assert!(state.is_none());
    }
}
