use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::info;

use super::{from_state, to_state, Resource};
use crate::client::{found, LightdashApi, WarehouseCredentials, WarehouseCredentialsRequest};
use crate::error::ProviderError;
use crate::id::IdTemplate;
use crate::schema::{Attribute, AttributeType, Diagnostic, Schema};
use crate::validation;

const ID: IdTemplate = IdTemplate::new(
    "organizations/{organization_uuid}/warehouse-credentials/{credentials_uuid}",
);

/// Warehouse types accepted by Lightdash.
pub const WAREHOUSE_TYPES: [&str; 7] = [
    "bigquery",
    "clickhouse",
    "databricks",
    "postgres",
    "redshift",
    "snowflake",
    "trino",
];

/// `lightdash_warehouse_credentials`: organization-level warehouse
/// credentials.
///
/// Lightdash never returns secrets, so `credentials` is kept from prior
/// state on read.
#[derive(Debug, Clone, Copy, Default)]
pub struct WarehouseCredentialsResource;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct State {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    organization_uuid: Option<String>,
    #[serde(default)]
    credentials_uuid: Option<String>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    warehouse_type: Option<String>,
    #[serde(default)]
    credentials: Option<Map<String, Value>>,
}

impl State {
    fn credentials_uuid(&self) -> Result<&str, ProviderError> {
        self.credentials_uuid.as_deref().ok_or_else(|| {
            ProviderError::InvalidRequest("warehouse credentials state has no credentials_uuid".to_string())
        })
    }

    fn request(&self) -> Result<WarehouseCredentialsRequest, ProviderError> {
        let name = self
            .name
            .clone()
            .ok_or_else(|| ProviderError::Validation("'name' is required".to_string()))?;
        let warehouse_type = self
            .warehouse_type
            .clone()
            .ok_or_else(|| ProviderError::Validation("'warehouse_type' is required".to_string()))?;

        let mut credentials = self.credentials.clone().unwrap_or_default();
        credentials.insert("type".to_string(), Value::String(warehouse_type));
        Ok(WarehouseCredentialsRequest {
            name,
            description: self.description.clone(),
            credentials,
        })
    }

    fn apply(&mut self, remote: WarehouseCredentials) -> Result<(), ProviderError> {
        self.id = Some(ID.format(&[&remote.organization_uuid, &remote.uuid])?);
        self.organization_uuid = Some(remote.organization_uuid);
        self.credentials_uuid = Some(remote.uuid);
        self.name = Some(remote.name);
        self.description = remote.description;
        self.warehouse_type = Some(remote.credentials.warehouse_type);
        Ok(())
    }
}

#[async_trait]
impl Resource for WarehouseCredentialsResource {
    fn type_name(&self) -> &'static str {
        "lightdash_warehouse_credentials"
    }

    fn schema(&self) -> Schema {
        Schema::v0()
            .with_description(include_str!("../../docs/resources/warehouse_credentials.md"))
            .with_attribute(
                "id",
                Attribute::computed_string().with_description(format!("`{}`", ID.pattern())),
            )
            .with_attribute("organization_uuid", Attribute::computed_string())
            .with_attribute("credentials_uuid", Attribute::computed_string())
            .with_attribute(
                "name",
                Attribute::required_string().with_description("Display name."),
            )
            .with_attribute("description", Attribute::optional_string())
            .with_attribute(
                "warehouse_type",
                Attribute::required_string()
                    .with_force_new()
                    .with_description(format!("One of: {}.", WAREHOUSE_TYPES.join(", "))),
            )
            .with_attribute(
                "credentials",
                Attribute::required(AttributeType::map(AttributeType::Dynamic))
                    .sensitive()
                    .with_description(
                        "Connection settings for the warehouse type, such as account, user, and password.",
                    ),
            )
    }

    fn id_template(&self) -> IdTemplate {
        ID
    }

    fn validate(&self, config: &Value) -> Vec<Diagnostic> {
        let mut diagnostics = validation::validate(&self.schema(), config);
        if let Some(warehouse_type) = config.get("warehouse_type").and_then(Value::as_str) {
            if !WAREHOUSE_TYPES.contains(&warehouse_type) {
                diagnostics.push(
                    Diagnostic::error("Invalid value for 'warehouse_type'")
                        .with_detail(format!(
                            "unsupported warehouse type '{}', expected one of: {}",
                            warehouse_type,
                            WAREHOUSE_TYPES.join(", ")
                        ))
                        .with_attribute("warehouse_type"),
                );
            }
        }
        if config
            .get("credentials")
            .and_then(Value::as_object)
            .is_some_and(|c| c.contains_key("type"))
        {
            diagnostics.push(
                Diagnostic::error("Unexpected 'type' in credentials")
                    .with_detail("Set the warehouse type with `warehouse_type`")
                    .with_attribute("credentials"),
            );
        }
        diagnostics
    }

    async fn create(&self, api: &dyn LightdashApi, planned: Value) -> Result<Value, ProviderError> {
        let mut state: State = from_state(planned)?;
        let request = state.request()?;
        let remote = api.create_warehouse_credentials(&request).await?;
        info!(credentials_uuid = %remote.uuid, request = %request, "Created warehouse credentials");

        state.apply(remote)?;
        to_state(&state)
    }

    async fn read(
        &self,
        api: &dyn LightdashApi,
        current: Value,
    ) -> Result<Option<Value>, ProviderError> {
        let mut state: State = from_state(current)?;
        let Some(remote) = found(api.get_warehouse_credentials(state.credentials_uuid()?).await)?
        else {
            return Ok(None);
        };
        state.apply(remote)?;
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
        let request = state.request()?;
        let remote = api
            .update_warehouse_credentials(prior.credentials_uuid()?, &request)
            .await?;
        info!(credentials_uuid = %remote.uuid, request = %request, "Updated warehouse credentials");

        state.apply(remote)?;
        to_state(&state)
    }

    async fn delete(&self, api: &dyn LightdashApi, current: Value) -> Result<(), ProviderError> {
        let state: State = from_state(current)?;
        let credentials_uuid = state.credentials_uuid()?;
        found(api.delete_warehouse_credentials(credentials_uuid).await)?;
        info!(credentials_uuid = %credentials_uuid, "Deleted warehouse credentials");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::InMemoryLightdash;
    use serde_json::json;

    fn planned() -> Value {
        json!({
            "name": "Snowflake prod",
            "description": null,
            "warehouse_type": "snowflake",
            "credentials": {"account": "acme", "user": "svc", "password": "hunter2"}
        })
    }

    #[tokio::test]
    async fn test_read_keeps_secrets_from_state() {
        let api = InMemoryLightdash::new();
        let resource = WarehouseCredentialsResource;

        let state = resource.create(&api, planned()).await.unwrap();
        assert_eq!(state["warehouse_type"], "snowflake");

        let read = resource.read(&api, state.clone()).await.unwrap().unwrap();
        assert_eq!(read["credentials"]["password"], "hunter2");
        assert_eq!(read["id"], state["id"]);
    }

    #[tokio::test]
    async fn test_update_and_delete() {
        let api = InMemoryLightdash::new();
        let resource = WarehouseCredentialsResource;
        let state = resource.create(&api, planned()).await.unwrap();

        let mut next = state.clone();
        next["description"] = json!("Primary warehouse");
        let updated = resource.update(&api, state, next).await.unwrap();
        assert_eq!(updated["description"], "Primary warehouse");

        resource.delete(&api, updated.clone()).await.unwrap();
        assert!(resource.read(&api, updated).await.unwrap().is_none());
    }

    #[test]
    fn test_validate() {
        let mut config = planned();
        config["warehouse_type"] = json!("oracle");
        config["credentials"]["type"] = json!("snowflake");

        let attributes: Vec<_> = WarehouseCredentialsResource
            .validate(&config)
            .into_iter()
            .filter_map(|d| d.attribute)
            .collect();
        assert_eq!(attributes, vec!["warehouse_type", "credentials"]);
    }

    #[test]
    fn test_request_adds_type() {
        let state: State = from_state(planned()).unwrap();
        let request = state.request().unwrap();
        assert_eq!(request.credentials["type"], "snowflake");
        assert_eq!(request.credentials["password"], "hunter2");
    }
}
