//! Test harness for the provider.
//!
//! [`ProviderTester`] drives a [`ProviderService`] the way Terraform would,
//! without a plugin host. [`InMemoryLightdash`] stands in for a Lightdash
//! instance so resources can be exercised without network access.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use lightdash_provider::testing::{InMemoryLightdash, ProviderTester};
//! use lightdash_provider::LightdashProvider;
//! use serde_json::json;
//!
//! #[tokio::test]
//! async fn creates_group() {
//!     let api = Arc::new(InMemoryLightdash::new());
//!     let tester = ProviderTester::new(LightdashProvider::with_api(api));
//!     tester.configure(json!({"host": "https://lightdash.example.com", "token": "pat"}))
//!         .await
//!         .unwrap();
//!
//!     let state = tester
//!         .lifecycle_create("lightdash_group", json!({"name": "Analysts"}))
//!         .await
//!         .unwrap();
//!     assert_eq!(state["name"], "Analysts");
//! }
//! ```

mod in_memory;

pub use in_memory::InMemoryLightdash;

use serde_json::Value;
use thiserror::Error;

use crate::error::ProviderError;
use crate::provider::ProviderService;
use crate::schema::{Diagnostic, ProviderSchema};
use crate::types::{ImportedResource, PlanResult};

/// Drives a provider through Terraform's call sequence.
pub struct ProviderTester<P: ProviderService> {
    provider: P,
}

impl<P: ProviderService> ProviderTester<P> {
    /// Wrap a provider.
    pub fn new(provider: P) -> Self {
        Self { provider }
    }

    /// The wrapped provider.
    pub fn provider(&self) -> &P {
        &self.provider
    }

    // =========================================================================
    // Schema & Metadata
    // =========================================================================

    /// Full provider schema.
    pub fn schema(&self) -> ProviderSchema {
        self.provider.schema()
    }

    /// Resource type names, sorted.
    pub fn resource_types(&self) -> Vec<String> {
        self.provider.metadata().resources
    }

    /// Data source type names, sorted.
    pub fn data_source_types(&self) -> Vec<String> {
        self.provider.metadata().data_sources
    }

    /// Function names, sorted.
    pub fn function_names(&self) -> Vec<String> {
        self.provider.metadata().functions
    }

    // =========================================================================
    // Provider Lifecycle
    // =========================================================================

    /// Validate a provider block. Error diagnostics become [`TestError::Diagnostics`].
    pub async fn validate_provider_config(&self, config: Value) -> Result<(), TestError> {
        let diagnostics = self.provider.validate_provider_config(config).await?;
        check_diagnostics(diagnostics)
    }

    /// Configure the provider. Error diagnostics become [`TestError::Diagnostics`].
    pub async fn configure(&self, config: Value) -> Result<(), TestError> {
        let diagnostics = self.provider.configure(config).await?;
        check_diagnostics(diagnostics)
    }

    /// Stop the provider.
    pub async fn stop(&self) -> Result<(), ProviderError> {
        self.provider.stop().await
    }

    // =========================================================================
    // Resource Operations
    // =========================================================================

    /// Validate a resource block.
    pub async fn validate_resource_config(
        &self,
        resource_type: &str,
        config: Value,
    ) -> Result<(), TestError> {
        let diagnostics = self
            .provider
            .validate_resource_config(resource_type, config)
            .await?;
        check_diagnostics(diagnostics)
    }

    /// Plan a create. The configuration doubles as the proposed state.
    pub async fn plan_create(
        &self,
        resource_type: &str,
        config: Value,
    ) -> Result<PlanResult, ProviderError> {
        self.provider
            .plan(resource_type, None, config.clone(), config)
            .await
    }

    /// Plan a change from `prior_state` to `config`.
    pub async fn plan_update(
        &self,
        resource_type: &str,
        prior_state: Value,
        config: Value,
    ) -> Result<PlanResult, ProviderError> {
        self.provider
            .plan(resource_type, Some(prior_state), config.clone(), config)
            .await
    }

    /// Plan a destroy.
    pub async fn plan_delete(
        &self,
        resource_type: &str,
        prior_state: Value,
    ) -> Result<PlanResult, ProviderError> {
        self.provider
            .plan(resource_type, Some(prior_state), Value::Null, Value::Null)
            .await
    }

    /// Create from a planned state.
    pub async fn create(
        &self,
        resource_type: &str,
        planned_state: Value,
    ) -> Result<Value, ProviderError> {
        self.provider.create(resource_type, planned_state).await
    }

    /// Refresh. `null` means the object is gone.
    pub async fn read(
        &self,
        resource_type: &str,
        current_state: Value,
    ) -> Result<Value, ProviderError> {
        self.provider.read(resource_type, current_state).await
    }

    /// Apply a planned update.
    pub async fn update(
        &self,
        resource_type: &str,
        prior_state: Value,
        planned_state: Value,
    ) -> Result<Value, ProviderError> {
        self.provider
            .update(resource_type, prior_state, planned_state)
            .await
    }

    /// Destroy.
    pub async fn delete(
        &self,
        resource_type: &str,
        current_state: Value,
    ) -> Result<(), ProviderError> {
        self.provider.delete(resource_type, current_state).await
    }

    /// Import by composite ID, e.g. `projects/<uuid>/access/<uuid>`.
    pub async fn import_resource(
        &self,
        resource_type: &str,
        id: &str,
    ) -> Result<Vec<ImportedResource>, ProviderError> {
        self.provider.import_resource(resource_type, id).await
    }

    /// Upgrade stored state written by an older schema version.
    pub async fn upgrade_resource_state(
        &self,
        resource_type: &str,
        version: i64,
        state: Value,
    ) -> Result<Value, ProviderError> {
        self.provider
            .upgrade_resource_state(resource_type, version, state)
            .await
    }

    // =========================================================================
    // Data Sources & Functions
    // =========================================================================

    /// Validate a data source block.
    pub async fn validate_data_source_config(
        &self,
        data_source_type: &str,
        config: Value,
    ) -> Result<(), TestError> {
        let diagnostics = self
            .provider
            .validate_data_source_config(data_source_type, config)
            .await?;
        check_diagnostics(diagnostics)
    }

    /// Read a data source.
    pub async fn read_data_source(
        &self,
        data_source_type: &str,
        config: Value,
    ) -> Result<Value, ProviderError> {
        self.provider
            .read_data_source(data_source_type, config)
            .await
    }

    /// Call a provider function with positional arguments.
    pub async fn call_function(
        &self,
        name: &str,
        arguments: Vec<Value>,
    ) -> Result<Value, ProviderError> {
        self.provider.call_function(name, arguments).await
    }

    // =========================================================================
    // Lifecycle Helpers
    // =========================================================================

    /// plan → create → read. Returns the refreshed state.
    pub async fn lifecycle_create(
        &self,
        resource_type: &str,
        config: Value,
    ) -> Result<Value, ProviderError> {
        let plan = self.plan_create(resource_type, config).await?;
        let created = self.create(resource_type, plan.planned_state).await?;
        self.read(resource_type, created).await
    }

    /// plan → update → read. Returns the refreshed state.
    pub async fn lifecycle_update(
        &self,
        resource_type: &str,
        prior_state: Value,
        config: Value,
    ) -> Result<Value, ProviderError> {
        let plan = self
            .plan_update(resource_type, prior_state.clone(), config)
            .await?;
        let updated = self
            .update(resource_type, prior_state, plan.planned_state)
            .await?;
        self.read(resource_type, updated).await
    }

    /// plan → delete.
    pub async fn lifecycle_delete(
        &self,
        resource_type: &str,
        current_state: Value,
    ) -> Result<(), ProviderError> {
        self.plan_delete(resource_type, current_state.clone())
            .await?;
        self.delete(resource_type, current_state).await
    }

    /// Create, update, then delete. Returns the state after the update.
    pub async fn lifecycle_crud(
        &self,
        resource_type: &str,
        initial_config: Value,
        updated_config: Value,
    ) -> Result<Value, ProviderError> {
        let created = self.lifecycle_create(resource_type, initial_config).await?;
        let updated = self
            .lifecycle_update(resource_type, created, updated_config)
            .await?;
        self.lifecycle_delete(resource_type, updated.clone())
            .await?;
        Ok(updated)
    }
}

/// Failure of a tester call that reports diagnostics.
#[derive(Debug, Error)]
pub enum TestError {
    /// Error diagnostics were returned.
    #[error("{}", render_diagnostics(.0))]
    Diagnostics(Vec<Diagnostic>),
    /// The call itself failed.
    #[error("provider error: {0}")]
    Provider(#[from] ProviderError),
}

fn render_diagnostics(diagnostics: &[Diagnostic]) -> String {
    let mut out = format!("{} error diagnostic(s):", diagnostics.len());
    for diagnostic in diagnostics {
        out.push_str(&format!("\n  {}", diagnostic));
    }
    out
}

fn check_diagnostics(diagnostics: Vec<Diagnostic>) -> Result<(), TestError> {
    let errors: Vec<_> = diagnostics.into_iter().filter(Diagnostic::is_error).collect();
    if errors.is_empty() {
        Ok(())
    } else {
        Err(TestError::Diagnostics(errors))
    }
}

fn changed_paths(plan: &PlanResult) -> Vec<&str> {
    plan.changes.iter().map(|c| c.path.as_str()).collect()
}

fn error_summaries(diagnostics: &[Diagnostic]) -> Vec<&str> {
    diagnostics
        .iter()
        .filter(|d| d.is_error())
        .map(|d| d.summary.as_str())
        .collect()
}

// =========================================================================
// Assertion Helpers
// =========================================================================

/// Panics unless the plan creates (changes, no replacement).
pub fn assert_plan_creates(plan: &PlanResult) {
    assert!(plan.has_changes(), "expected a create plan, got no changes");
    assert!(!plan.requires_replace(), "expected a create plan, got a replacement");
}

/// Panics if the plan has any change.
pub fn assert_plan_no_changes(plan: &PlanResult) {
    assert!(
        !plan.has_changes(),
        "expected no changes, got {:?}",
        changed_paths(plan)
    );
}

/// Panics if the plan has no change.
pub fn assert_plan_has_changes(plan: &PlanResult) {
    assert!(plan.has_changes(), "expected changes, got none");
}

/// Panics unless the plan replaces the object.
pub fn assert_plan_replaces(plan: &PlanResult) {
    assert!(
        plan.requires_replace(),
        "expected a replacement, changed {:?}",
        changed_paths(plan)
    );
}

/// Panics if the plan replaces the object.
pub fn assert_plan_updates_in_place(plan: &PlanResult) {
    assert!(
        !plan.requires_replace(),
        "expected an in-place update, replacing {:?}",
        plan.replaced_paths()
    );
}

/// Panics unless `path` is among the planned changes.
pub fn assert_plan_changes_attribute(plan: &PlanResult, path: &str) {
    let paths = changed_paths(plan);
    assert!(
        paths.contains(&path),
        "expected '{}' to change, changed {:?}",
        path,
        paths
    );
}

/// Panics if `path` is among the planned changes.
pub fn assert_plan_does_not_change_attribute(plan: &PlanResult, path: &str) {
    assert!(
        !changed_paths(plan).contains(&path),
        "expected '{}' to stay unchanged",
        path
    );
}

/// Panics on any error diagnostic.
pub fn assert_no_errors(diagnostics: &[Diagnostic]) {
    let errors = error_summaries(diagnostics);
    assert!(errors.is_empty(), "expected no errors, got {:?}", errors);
}

/// Panics unless there is an error diagnostic.
pub fn assert_has_errors(diagnostics: &[Diagnostic]) {
    assert!(
        !error_summaries(diagnostics).is_empty(),
        "expected at least one error, got none"
    );
}

/// Panics unless an error summary contains `substring`.
pub fn assert_error_contains(diagnostics: &[Diagnostic], substring: &str) {
    let errors = error_summaries(diagnostics);
    assert!(
        errors.iter().any(|s| s.contains(substring)),
        "expected an error containing '{}', got {:?}",
        substring,
        errors
    );
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::provider::LightdashProvider;
    use serde_json::json;
    use tokio_test::{assert_err, assert_ok};

    async fn configured() -> ProviderTester<LightdashProvider> {
        let api = InMemoryLightdash::new()
            .with_organization_member("u1", "ann@example.com")
            .with_project("p1", "Analytics");
        let tester = ProviderTester::new(LightdashProvider::with_api(Arc::new(api)));
        assert_ok!(
            tester
                .configure(json!({"host": "https://lightdash.example.com", "token": "pat"}))
                .await
        );
        tester
    }

    #[test]
    fn test_type_listings() {
        let tester = ProviderTester::new(LightdashProvider::new());
        assert!(tester.resource_types().contains(&"lightdash_space".to_string()));
        assert!(tester.data_source_types().contains(&"lightdash_projects".to_string()));
        assert_eq!(tester.function_names(), vec!["normalize_project_members"]);
        assert!(tester.schema().resources.contains_key("lightdash_group"));
    }

    #[tokio::test]
    async fn test_plan_update_renames_group_in_place() {
        let tester = configured().await;
        let state = assert_ok!(
            tester
                .lifecycle_create("lightdash_group", json!({"name": "Analysts"}))
                .await
        );

        let mut renamed = state.clone();
        renamed["name"] = json!("Data Team");
        let plan = assert_ok!(tester.plan_update("lightdash_group", state.clone(), renamed).await);
        assert_plan_has_changes(&plan);
        assert_plan_changes_attribute(&plan, "name");
        assert_plan_does_not_change_attribute(&plan, "members");
        assert_plan_updates_in_place(&plan);
    }

    #[tokio::test]
    async fn test_lifecycle_crud_group() {
        let tester = configured().await;
        let updated = assert_ok!(
            tester
                .lifecycle_crud(
                    "lightdash_group",
                    json!({"name": "Analysts"}),
                    json!({"name": "Analysts", "members": ["u1"]}),
                )
                .await
        );
        assert_eq!(updated["members"], json!(["u1"]));
        assert!(assert_ok!(tester.read("lightdash_group", updated).await).is_null());
    }

    #[tokio::test]
    async fn test_validate_resource_config_reports_diagnostics() {
        let tester = configured().await;
        let err = assert_err!(
            tester
                .validate_resource_config(
                    "lightdash_project_role_member",
                    json!({"project_uuid": "p1", "user_uuid": "u1", "role": "owner"}),
                )
                .await
        );
        match err {
            TestError::Diagnostics(diagnostics) => assert_has_errors(&diagnostics),
            other => panic!("unexpected error: {}", other),
        }
    }

    #[tokio::test]
    async fn test_validate_data_source_config() {
        let tester = configured().await;
        assert_ok!(
            tester
                .validate_data_source_config("lightdash_project", json!({"project_uuid": "p1"}))
                .await
        );
        assert_err!(
            tester
                .validate_data_source_config("lightdash_project", json!({"project_uuid": 1}))
                .await
        );
    }

    #[test]
    fn test_assert_no_errors_ignores_warnings() {
        assert_no_errors(&[Diagnostic::warning("host uses plain http")]);
    }

    #[test]
    #[should_panic(expected = "expected no errors")]
    fn test_assert_no_errors_fails() {
        assert_no_errors(&[Diagnostic::error("token is required")]);
    }

    #[test]
    fn test_assert_error_contains() {
        let diagnostics = vec![Diagnostic::error("Invalid Lightdash host")];
        assert_error_contains(&diagnostics, "Lightdash host");
    }

    #[test]
    fn test_test_error_display() {
        let err = TestError::Diagnostics(vec![
            Diagnostic::error("Invalid role").with_attribute("role"),
            Diagnostic::error("Missing token").with_detail("set LIGHTDASH_API_KEY"),
        ]);

        let display = err.to_string();
        assert!(display.starts_with("2 error diagnostic(s):"));
        assert!(display.contains("Invalid role (at role)"));
        assert!(display.contains("Missing token: set LIGHTDASH_API_KEY"));
    }
}
