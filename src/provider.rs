//! The provider: the [`ProviderService`] contract and the Lightdash
//! implementation behind it.
//!
//! Errors from resources and data sources are returned as
//! [`ProviderError`]; the host turns them into diagnostics with
//! `Diagnostic::from`.

use std::sync::Arc;

use serde_json::Value;
use tokio::sync::RwLock;
use tracing::{debug, error, info, instrument};

use crate::client::{HttpClient, LightdashApi};
use crate::config::ProviderConfig;
use crate::data_sources::{self, DataSource};
use crate::error::ProviderError;
use crate::functions::{self, check_arguments, Function};
use crate::plan::plan_resource;
use crate::resources::{self, Resource};
use crate::schema::{has_errors, Diagnostic, ProviderSchema};
use crate::types::{ImportedResource, PlanResult, ProviderMetadata};

/// Operations a provider host drives.
///
/// # Example
///
/// ```ignore
/// use lightdash_provider::{LightdashProvider, ProviderService};
/// use serde_json::json;
///
/// let provider = LightdashProvider::new();
/// provider.configure(json!({"host": "https://app.lightdash.cloud"})).await?;
/// let org = provider.read_data_source("lightdash_organization", json!({})).await?;
/// ```
#[async_trait::async_trait]
pub trait ProviderService: Send + Sync + 'static {
    // =========================================================================
    // Schema & Metadata
    // =========================================================================

    /// Return the provider's schema including all resources, data sources,
    /// and functions.
    fn schema(&self) -> ProviderSchema;

    /// Names of everything the provider serves, sorted.
    fn metadata(&self) -> ProviderMetadata {
        let schema = self.schema();
        ProviderMetadata {
            resources: schema.resources.into_keys().collect(),
            data_sources: schema.data_sources.into_keys().collect(),
            functions: schema.functions.into_keys().collect(),
        }
    }

    // =========================================================================
    // Provider Lifecycle
    // =========================================================================

    /// Validate the provider configuration before configuring.
    async fn validate_provider_config(
        &self,
        config: Value,
    ) -> Result<Vec<Diagnostic>, ProviderError> {
        let _ = config;
        Ok(vec![])
    }

    /// Configure the provider with credentials and settings.
    async fn configure(&self, config: Value) -> Result<Vec<Diagnostic>, ProviderError>;

    /// Stop the provider gracefully.
    async fn stop(&self) -> Result<(), ProviderError> {
        Ok(())
    }

    // =========================================================================
    // Resource Operations
    // =========================================================================

    /// Validate a resource's configuration before planning.
    async fn validate_resource_config(
        &self,
        resource_type: &str,
        config: Value,
    ) -> Result<Vec<Diagnostic>, ProviderError>;

    /// Upgrade resource state from an older schema version.
    async fn upgrade_resource_state(
        &self,
        resource_type: &str,
        version: i64,
        state: Value,
    ) -> Result<Value, ProviderError> {
        let _ = (resource_type, version);
        Ok(state)
    }

    /// Plan changes for a resource.
    async fn plan(
        &self,
        resource_type: &str,
        prior_state: Option<Value>,
        proposed_state: Value,
        config: Value,
    ) -> Result<PlanResult, ProviderError>;

    /// Create a new resource.
    async fn create(&self, resource_type: &str, planned_state: Value)
        -> Result<Value, ProviderError>;

    /// Read the current state of a resource. `null` means it no longer exists.
    async fn read(&self, resource_type: &str, current_state: Value)
        -> Result<Value, ProviderError>;

    /// Update an existing resource.
    async fn update(
        &self,
        resource_type: &str,
        prior_state: Value,
        planned_state: Value,
    ) -> Result<Value, ProviderError>;

    /// Delete a resource.
    async fn delete(&self, resource_type: &str, current_state: Value)
        -> Result<(), ProviderError>;

    /// Import existing objects into management.
    async fn import_resource(
        &self,
        resource_type: &str,
        id: &str,
    ) -> Result<Vec<ImportedResource>, ProviderError>;

    // =========================================================================
    // Data Source Operations
    // =========================================================================

    /// Validate a data source's configuration.
    async fn validate_data_source_config(
        &self,
        data_source_type: &str,
        config: Value,
    ) -> Result<Vec<Diagnostic>, ProviderError>;

    /// Read data from a data source.
    async fn read_data_source(
        &self,
        data_source_type: &str,
        config: Value,
    ) -> Result<Value, ProviderError>;

    // =========================================================================
    // Functions
    // =========================================================================

    /// Call a provider-defined function.
    async fn call_function(&self, name: &str, arguments: Vec<Value>)
        -> Result<Value, ProviderError>;
}

/// The Lightdash provider.
pub struct LightdashProvider {
    resources: Vec<Box<dyn Resource>>,
    data_sources: Vec<Box<dyn DataSource>>,
    functions: Vec<Box<dyn Function>>,
    /// Set by `configure`.
    api: RwLock<Option<Arc<dyn LightdashApi>>>,
    /// Used by `configure` instead of building an [`HttpClient`].
    preset_api: Option<Arc<dyn LightdashApi>>,
}

impl Default for LightdashProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl LightdashProvider {
    /// A provider that talks to Lightdash over HTTPS once configured.
    pub fn new() -> Self {
        Self {
            resources: resources::all(),
            data_sources: data_sources::all(),
            functions: functions::all(),
            api: RwLock::new(None),
            preset_api: None,
        }
    }

    /// A provider that uses `api` instead of an HTTP client.
    ///
    /// `configure` still validates the provider block.
    pub fn with_api(api: Arc<dyn LightdashApi>) -> Self {
        Self {
            preset_api: Some(api),
            ..Self::new()
        }
    }

    fn resource(&self, resource_type: &str) -> Result<&dyn Resource, ProviderError> {
        self.resources
            .iter()
            .find(|r| r.type_name() == resource_type)
            .map(Box::as_ref)
            .ok_or_else(|| {
                ProviderError::UnknownType(format!("resource type '{}'", resource_type))
            })
    }

    fn data_source(&self, data_source_type: &str) -> Result<&dyn DataSource, ProviderError> {
        self.data_sources
            .iter()
            .find(|d| d.type_name() == data_source_type)
            .map(Box::as_ref)
            .ok_or_else(|| {
                ProviderError::UnknownType(format!("data source type '{}'", data_source_type))
            })
    }

    fn function(&self, name: &str) -> Result<&dyn Function, ProviderError> {
        self.functions
            .iter()
            .find(|f| f.name() == name)
            .map(Box::as_ref)
            .ok_or_else(|| ProviderError::UnknownType(format!("function '{}'", name)))
    }

    async fn api(&self) -> Result<Arc<dyn LightdashApi>, ProviderError> {
        self.api.read().await.clone().ok_or_else(|| {
            ProviderError::NotConfigured("configure must succeed before calling the Lightdash API".to_string())
        })
    }
}

#[async_trait::async_trait]
impl ProviderService for LightdashProvider {
    fn schema(&self) -> ProviderSchema {
        let mut schema = ProviderSchema::new().with_provider_config(ProviderConfig::schema());
        for resource in &self.resources {
            schema = schema.with_resource(resource.type_name(), resource.schema());
        }
        for data_source in &self.data_sources {
            schema = schema.with_data_source(data_source.type_name(), data_source.schema());
        }
        for function in &self.functions {
            schema = schema.with_function(function.name(), function.schema());
        }
        schema
    }

    async fn validate_provider_config(
        &self,
        config: Value,
    ) -> Result<Vec<Diagnostic>, ProviderError> {
        let mut diagnostics = crate::validation::validate(&ProviderConfig::schema(), &config);
        if has_errors(&diagnostics) {
            return Ok(diagnostics);
        }
        diagnostics.extend(ProviderConfig::from_value(config)?.with_env_fallback().validate());
        Ok(diagnostics)
    }

    #[instrument(skip_all, name = "provider.configure")]
    async fn configure(&self, config: Value) -> Result<Vec<Diagnostic>, ProviderError> {
        let diagnostics = self.validate_provider_config(config.clone()).await?;
        if has_errors(&diagnostics) {
            error!(errors = diagnostics.len(), "Provider configuration is invalid");
            return Ok(diagnostics);
        }

        let settings = ProviderConfig::from_value(config)?
            .with_env_fallback()
            .into_settings()?;
        info!(
            host = %settings.base_url,
            max_concurrent_requests = settings.max_concurrent_requests,
            retries = settings.retries,
            "Configuring Lightdash provider"
        );

        let api: Arc<dyn LightdashApi> = match &self.preset_api {
            Some(api) => Arc::clone(api),
            None => Arc::new(HttpClient::new(settings)?),
        };
        *self.api.write().await = Some(api);
        Ok(diagnostics)
    }

    async fn stop(&self) -> Result<(), ProviderError> {
        self.api.write().await.take();
        info!("Lightdash provider stopped");
        Ok(())
    }

    async fn validate_resource_config(
        &self,
        resource_type: &str,
        config: Value,
    ) -> Result<Vec<Diagnostic>, ProviderError> {
        Ok(self.resource(resource_type)?.validate(&config))
    }

    async fn upgrade_resource_state(
        &self,
        resource_type: &str,
        version: i64,
        state: Value,
    ) -> Result<Value, ProviderError> {
        let schema = self.resource(resource_type)?.schema();
        match u64::try_from(version) {
            Ok(v) if v <= schema.version => Ok(state),
            _ => Err(ProviderError::InvalidRequest(format!(
                "{} state version {} is newer than schema version {}",
                resource_type, version, schema.version
            ))),
        }
    }

    #[instrument(skip(self, prior_state, proposed_state, _config), name = "provider.plan")]
    async fn plan(
        &self,
        resource_type: &str,
        prior_state: Option<Value>,
        proposed_state: Value,
        _config: Value,
    ) -> Result<PlanResult, ProviderError> {
        let resource = self.resource(resource_type)?;
        let result = plan_resource(&resource.schema(), prior_state.as_ref(), &proposed_state)
            .inspect_err(|e| error!(error = %e, "Plan failed"))?;
        debug!(
            changes = result.changes.len(),
            requires_replace = result.requires_replace(),
            "Plan completed"
        );
        Ok(result)
    }

    #[instrument(skip(self, planned_state), name = "provider.create")]
    async fn create(&self, resource_type: &str, planned_state: Value) -> Result<Value, ProviderError> {
        let resource = self.resource(resource_type)?;
        let api = self.api().await?;
        let state = resource
            .create(api.as_ref(), planned_state)
            .await
            .inspect_err(|e| error!(error = %e, "Create failed"))?;
        info!(id = %state["id"], "Create completed");
        Ok(state)
    }

    #[instrument(skip(self, current_state), name = "provider.read")]
    async fn read(&self, resource_type: &str, current_state: Value) -> Result<Value, ProviderError> {
        let resource = self.resource(resource_type)?;
        let api = self.api().await?;
        let state = resource
            .read(api.as_ref(), current_state)
            .await
            .inspect_err(|e| error!(error = %e, "Read failed"))?;
        match state {
            Some(state) => {
                debug!("Read completed");
                Ok(state)
            }
            None => {
                info!("Resource no longer exists; removing from state");
                Ok(Value::Null)
            }
        }
    }

    #[instrument(skip(self, prior_state, planned_state), name = "provider.update")]
    async fn update(
        &self,
        resource_type: &str,
        prior_state: Value,
        planned_state: Value,
    ) -> Result<Value, ProviderError> {
        let resource = self.resource(resource_type)?;
        let api = self.api().await?;
        let state = resource
            .update(api.as_ref(), prior_state, planned_state)
            .await
            .inspect_err(|e| error!(error = %e, "Update failed"))?;
        info!(id = %state["id"], "Update completed");
        Ok(state)
    }

    #[instrument(skip(self, current_state), name = "provider.delete")]
    async fn delete(&self, resource_type: &str, current_state: Value) -> Result<(), ProviderError> {
        let resource = self.resource(resource_type)?;
        let api = self.api().await?;
        resource
            .delete(api.as_ref(), current_state)
            .await
            .inspect_err(|e| error!(error = %e, "Delete failed"))?;
        info!("Delete completed");
        Ok(())
    }

    #[instrument(skip(self), name = "provider.import")]
    async fn import_resource(
        &self,
        resource_type: &str,
        id: &str,
    ) -> Result<Vec<ImportedResource>, ProviderError> {
        let resource = self.resource(resource_type)?;
        let api = self.api().await?;
        let state = resource
            .import(api.as_ref(), id)
            .await
            .inspect_err(|e| error!(error = %e, "Import failed"))?;
        info!("Import completed");
        Ok(vec![ImportedResource::new(resource_type, state)])
    }

    async fn validate_data_source_config(
        &self,
        data_source_type: &str,
        config: Value,
    ) -> Result<Vec<Diagnostic>, ProviderError> {
        Ok(self.data_source(data_source_type)?.validate(&config))
    }

    #[instrument(skip(self, config), name = "provider.read_data_source")]
    async fn read_data_source(
        &self,
        data_source_type: &str,
        config: Value,
    ) -> Result<Value, ProviderError> {
        let data_source = self.data_source(data_source_type)?;
        let diagnostics = data_source.validate(&config);
        if let Some(first) = diagnostics.into_iter().find(Diagnostic::is_error) {
            return Err(ProviderError::Validation(match first.detail {
                Some(detail) => format!("{}: {}", first.summary, detail),
                None => first.summary,
            }));
        }

        let api = self.api().await?;
        let state = data_source
            .read(api.as_ref(), config)
            .await
            .inspect_err(|e| error!(error = %e, "Data source read failed"))?;
        debug!("Data source read completed");
        Ok(state)
    }

    #[instrument(skip(self, arguments), name = "provider.call_function")]
    async fn call_function(&self, name: &str, arguments: Vec<Value>) -> Result<Value, ProviderError> {
        let function = self.function(name)?;
        check_arguments(name, &function.schema(), &arguments)?;
        function.call(arguments)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{
        assert_error_contains, assert_plan_creates, assert_plan_no_changes, assert_plan_replaces,
        InMemoryLightdash, ProviderTester, TestError,
    };
    use serde_json::json;

    const CONFIG: &str = r#"{"host": "https://app.lightdash.cloud", "token": "pat-123"}"#;

    async fn tester() -> (ProviderTester<LightdashProvider>, Arc<InMemoryLightdash>) {
        let api = Arc::new(
            InMemoryLightdash::new()
                .with_organization_member("u1", "ann@example.com")
                .with_organization_member("u2", "bob@example.com")
                .with_project("p1", "Analytics"),
        );
        let tester = ProviderTester::new(LightdashProvider::with_api(api.clone()));
        tester
            .configure(serde_json::from_str(CONFIG).unwrap())
            .await
            .unwrap();
        (tester, api)
    }

    #[test]
    fn test_metadata() {
        let metadata = LightdashProvider::new().metadata();
        assert_eq!(metadata.resources.len(), 7);
        assert_eq!(metadata.data_sources.len(), 8);
        assert_eq!(metadata.functions, vec!["normalize_project_members"]);
        assert_eq!(metadata.resources[0], "lightdash_ai_agent");
    }

    #[tokio::test]
    async fn test_unconfigured_provider() {
        let tester = ProviderTester::new(LightdashProvider::new());
        let err = tester
            .read_data_source("lightdash_organization", json!({}))
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::NotConfigured(_)));
    }

    #[tokio::test]
    async fn test_configure_rejects_bad_config() {
        let tester = ProviderTester::new(LightdashProvider::with_api(Arc::new(
            InMemoryLightdash::new(),
        )));
        let err = tester
            .configure(json!({
                "host": "ftp://lightdash",
                "token": "pat-123",
                "max_concurrent_requests": 0
            }))
            .await
            .unwrap_err();
        match err {
            TestError::Diagnostics(diagnostics) => {
                assert_error_contains(&diagnostics, "Invalid Lightdash host");
                assert_error_contains(&diagnostics, "max_concurrent_requests");
            }
            other => panic!("unexpected error: {}", other),
        }
    }

    #[tokio::test]
    async fn test_configure_rejects_wrong_types() {
        let tester = ProviderTester::new(LightdashProvider::new());
        let result = tester
            .validate_provider_config(json!({"host": 42, "retries": "three"}))
            .await;
        assert!(matches!(result, Err(TestError::Diagnostics(d)) if d.len() == 2));
    }

    #[tokio::test]
    async fn test_space_lifecycle() {
        let (tester, _api) = tester().await;
        let final_state = tester
            .lifecycle_crud(
                "lightdash_space",
                json!({
                    "project_uuid": "p1",
                    "name": "Finance",
                    "access": [{"user_uuid": "u1", "space_role": "viewer"}]
                }),
                json!({
                    "project_uuid": "p1",
                    "name": "Finance",
                    "is_private": false,
                    "access": [{"user_uuid": "u2", "space_role": "editor"}]
                }),
            )
            .await
            .unwrap();

        assert_eq!(final_state["is_private"], false);
        assert_eq!(final_state["access"], json!([{"user_uuid": "u2", "space_role": "editor"}]));

        let gone = tester.read("lightdash_space", final_state).await.unwrap();
        assert!(gone.is_null());
    }

    #[tokio::test]
    async fn test_plan_replaces_on_project_change() {
        let (tester, _api) = tester().await;
        let created = tester
            .lifecycle_create("lightdash_project_role_member", json!({
                "project_uuid": "p1",
                "user_uuid": "u1",
                "role": "viewer"
            }))
            .await
            .unwrap();

        let mut same = created.clone();
        same["id"] = Value::Null;
        same["email"] = Value::Null;
        let plan = tester
            .plan_update("lightdash_project_role_member", created.clone(), same)
            .await
            .unwrap();
        assert_plan_no_changes(&plan);

        let mut moved = created.clone();
        moved["project_uuid"] = json!("p2");
        let plan = tester
            .plan_update("lightdash_project_role_member", created, moved)
            .await
            .unwrap();
        assert_plan_replaces(&plan);
    }

    #[tokio::test]
    async fn test_plan_create_group() {
        let (tester, _api) = tester().await;
        let plan = tester
            .plan_create("lightdash_group", json!({"name": "Analysts"}))
            .await
            .unwrap();
        assert_plan_creates(&plan);
        assert_eq!(plan.planned_state["members"], json!([]));
    }

    #[tokio::test]
    async fn test_import_resource() {
        let (tester, api) = tester().await;
        api.grant_project_access("p1", "bob@example.com", crate::members::ProjectMemberRole::Admin)
            .await
            .unwrap();

        let imported = tester
            .import_resource("lightdash_project_role_member", "projects/p1/access/u2")
            .await
            .unwrap();
        assert_eq!(imported.len(), 1);
        assert_eq!(imported[0].resource_type, "lightdash_project_role_member");
        assert_eq!(imported[0].state["role"], "admin");
    }

    #[tokio::test]
    async fn test_unknown_types() {
        let (tester, _api) = tester().await;
        assert!(matches!(
            tester.create("lightdash_dashboard", json!({})).await,
            Err(ProviderError::UnknownType(_))
        ));
        assert!(matches!(
            tester.read_data_source("lightdash_dashboards", json!({})).await,
            Err(ProviderError::UnknownType(_))
        ));
        assert!(matches!(
            tester.call_function("normalize", vec![]).await,
            Err(ProviderError::UnknownType(_))
        ));
    }

    #[tokio::test]
    async fn test_read_data_source_validates_config() {
        let (tester, _api) = tester().await;
        let err = tester
            .read_data_source("lightdash_organization_member", json!({}))
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::Validation(_)));
    }

    #[tokio::test]
    async fn test_call_function_without_configure() {
        let tester = ProviderTester::new(LightdashProvider::new());
        let result = tester
            .call_function(
                "normalize_project_members",
                vec![json!(["a"]), json!(["a", "b"]), Value::Null, json!([]), json!(["b", "c"])],
            )
            .await
            .unwrap();
        assert_eq!(result["admins"], json!(["a"]));
        assert_eq!(result["developers"], json!(["b"]));
        assert_eq!(result["viewers"], json!(["c"]));
    }

    #[tokio::test]
    async fn test_upgrade_resource_state() {
        let tester = ProviderTester::new(LightdashProvider::new());
        let state = json!({"id": "projects/p1/spaces/s1"});
        assert_eq!(
            tester
                .upgrade_resource_state("lightdash_space", 0, state.clone())
                .await
                .unwrap(),
            state
        );
        assert!(tester
            .upgrade_resource_state("lightdash_space", 3, state)
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_stop_clears_client() {
        let (tester, _api) = tester().await;
        tester.stop().await.unwrap();
        assert!(matches!(
            tester.read_data_source("lightdash_projects", json!({})).await,
            Err(ProviderError::NotConfigured(_))
        ));
    }

    #[test]
    fn test_every_schema_documented() {
        let schema = LightdashProvider::new().schema();
        assert!(schema.provider.description.is_some());
        for (name, resource) in &schema.resources {
            assert!(resource.description.as_deref().is_some_and(|d| !d.is_empty()), "{}", name);
        }
        for (name, data_source) in &schema.data_sources {
            assert!(data_source.description.is_some(), "{}", name);
        }
    }
}
