//! [`LightdashApi`] over HTTPS.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{ACCEPT, AUTHORIZATION};
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::sync::Semaphore;
use tracing::{debug, warn};
use url::Url;

use super::models::*;
use super::LightdashApi;
use crate::config::ClientSettings;
use crate::error::ProviderError;
use crate::members::ProjectMemberRole;

const USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));
/// Base delay between retries; attempt `n` waits `n` times this.
const RETRY_BACKOFF: Duration = Duration::from_millis(500);

/// Lightdash API client.
///
/// Requests carry `Authorization: ApiKey <token>`. At most
/// `max_concurrent_requests` are in flight at once, and throttled (429),
/// server-side (5xx), and transport failures are retried with linear backoff.
pub struct HttpClient {
    http: reqwest::Client,
    base_url: Url,
    token: String,
    limiter: Semaphore,
    retries: u32,
    retry_backoff: Duration,
}

impl std::fmt::Debug for HttpClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpClient")
            .field("base_url", &self.base_url.as_str())
            .field("retries", &self.retries)
            .finish_non_exhaustive()
    }
}

impl HttpClient {
    /// Build a client from validated settings.
    pub fn new(settings: ClientSettings) -> Result<Self, ProviderError> {
        let http = reqwest::Client::builder()
            .timeout(settings.request_timeout)
            .user_agent(USER_AGENT)
            .build()?;

        Ok(Self {
            http,
            base_url: settings.base_url,
            token: settings.token,
            limiter: Semaphore::new(settings.max_concurrent_requests.max(1)),
            retries: settings.retries,
            retry_backoff: RETRY_BACKOFF,
        })
    }

    /// Override the base retry delay.
    pub fn with_retry_backoff(mut self, backoff: Duration) -> Self {
        self.retry_backoff = backoff;
        self
    }

    /// `{host}/api/v1/{segments...}`, with each segment percent-encoded.
    fn endpoint(&self, segments: &[&str]) -> Result<Url, ProviderError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| {
                ProviderError::Configuration(format!(
                    "'{}' cannot be used as a base URL",
                    self.base_url
                ))
            })?
            .pop_if_empty()
            .extend(["api", "v1"])
            .extend(segments);
        Ok(url)
    }

    async fn call(
        &self,
        method: Method,
        url: Url,
        body: Option<Value>,
    ) -> Result<Value, ProviderError> {
        let mut attempt = 0_u32;
        loop {
            match self.send_once(&method, &url, body.as_ref()).await {
                Err(err) if err.is_retryable() && attempt < self.retries => {
                    attempt += 1;
                    warn!(
                        method = %method,
                        path = url.path(),
                        attempt,
                        error = %err,
                        "Retrying Lightdash API request"
                    );
                    tokio::time::sleep(self.retry_backoff.saturating_mul(attempt)).await;
                }
                result => return result,
            }
        }
    }

    async fn send_once(
        &self,
        method: &Method,
        url: &Url,
        body: Option<&Value>,
    ) -> Result<Value, ProviderError> {
        let _permit = self
            .limiter
            .acquire()
            .await
            .map_err(|_| ProviderError::Unavailable("API client is shutting down".to_string()))?;

        let mut request = self
            .http
            .request(method.clone(), url.clone())
            .header(AUTHORIZATION, format!("ApiKey {}", self.token))
            .header(ACCEPT, "application/json");
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await.map_err(transport_error)?;
        let status = response.status().as_u16();
        let text = response.text().await.map_err(transport_error)?;
        debug!(method = %method, path = url.path(), status, "Lightdash API response");

        parse_response(status, &text)
    }

    async fn get<T: DeserializeOwned>(&self, url: Url) -> Result<T, ProviderError> {
        decode(self.call(Method::GET, url, None).await?)
    }

    async fn send<T: DeserializeOwned>(
        &self,
        method: Method,
        url: Url,
        body: &impl Serialize,
    ) -> Result<T, ProviderError> {
        let body = serde_json::to_value(body)?;
        decode(self.call(method, url, Some(body)).await?)
    }

    async fn send_ignoring_result(
        &self,
        method: Method,
        url: Url,
        body: Option<Value>,
    ) -> Result<(), ProviderError> {
        self.call(method, url, body).await.map(drop)
    }
}

fn transport_error(err: reqwest::Error) -> ProviderError {
    if err.is_timeout() {
        ProviderError::DeadlineExceeded(err.to_string())
    } else {
        ProviderError::Http(err)
    }
}

fn decode<T: DeserializeOwned>(results: Value) -> Result<T, ProviderError> {
    Ok(serde_json::from_value(results)?)
}

#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(default)]
    status: String,
    #[serde(default)]
    results: Value,
    #[serde(default)]
    error: Option<ApiErrorBody>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiErrorBody {
    #[serde(default)]
    status_code: Option<u16>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

impl ApiErrorBody {
    fn describe(self, status: u16) -> String {
        match (self.name, self.message) {
            (Some(name), Some(message)) => format!("{}: {}", name, message),
            (None, Some(message)) => message,
            (Some(name), None) => name,
            (None, None) => format!("HTTP {}", status),
        }
    }
}

/// Unwrap the `{"status": "ok", "results": ...}` envelope, or map an error
/// response onto a [`ProviderError`].
fn parse_response(status: u16, body: &str) -> Result<Value, ProviderError> {
    let success = (200..300).contains(&status);
    if body.trim().is_empty() {
        return if success {
            Ok(Value::Null)
        } else {
            Err(ProviderError::from_status(status, format!("HTTP {}", status)))
        };
    }

    match serde_json::from_str::<Envelope>(body) {
        Ok(envelope) if success && envelope.status != "error" => Ok(envelope.results),
        Ok(envelope) => {
            let error = envelope.error.unwrap_or_default();
            let status = if success {
                error.status_code.unwrap_or(500)
            } else {
                status
            };
            Err(ProviderError::from_status(status, error.describe(status)))
        }
        Err(_) if success => Err(ProviderError::InvalidRequest(format!(
            "unexpected response body from Lightdash (HTTP {})",
            status
        ))),
        Err(_) => {
            let snippet: String = body.chars().take(200).collect();
            Err(ProviderError::from_status(
                status,
                format!("HTTP {}: {}", status, snippet),
            ))
        }
    }
}

#[async_trait]
impl LightdashApi for HttpClient {
    async fn get_organization(&self) -> Result<Organization, ProviderError> {
        self.get(self.endpoint(&["org"])?).await
    }

    async fn list_organization_members(&self) -> Result<Vec<OrganizationMember>, ProviderError> {
        self.get(self.endpoint(&["org", "users"])?).await
    }

    async fn list_projects(&self) -> Result<Vec<ProjectSummary>, ProviderError> {
        self.get(self.endpoint(&["org", "projects"])?).await
    }

    async fn get_project(&self, project_uuid: &str) -> Result<Project, ProviderError> {
        self.get(self.endpoint(&["projects", project_uuid])?).await
    }

    async fn update_scheduler_settings(
        &self,
        project_uuid: &str,
        scheduler_timezone: &str,
    ) -> Result<(), ProviderError> {
        let url = self.endpoint(&["projects", project_uuid, "schedulerSettings"])?;
        self.send_ignoring_result(
            Method::PATCH,
            url,
            Some(json!({ "schedulerTimezone": scheduler_timezone })),
        )
        .await
    }

    async fn list_project_members(
        &self,
        project_uuid: &str,
    ) -> Result<Vec<ProjectMember>, ProviderError> {
        self.get(self.endpoint(&["projects", project_uuid, "access"])?)
            .await
    }

    async fn grant_project_access(
        &self,
        project_uuid: &str,
        email: &str,
        role: ProjectMemberRole,
    ) -> Result<(), ProviderError> {
        let url = self.endpoint(&["projects", project_uuid, "access"])?;
        self.send_ignoring_result(
            Method::POST,
            url,
            Some(json!({ "email": email, "role": role, "sendEmail": false })),
        )
        .await
    }

    async fn update_project_access(
        &self,
        project_uuid: &str,
        user_uuid: &str,
        role: ProjectMemberRole,
    ) -> Result<(), ProviderError> {
        let url = self.endpoint(&["projects", project_uuid, "access", user_uuid])?;
        self.send_ignoring_result(Method::PATCH, url, Some(json!({ "role": role })))
            .await
    }

    async fn revoke_project_access(
        &self,
        project_uuid: &str,
        user_uuid: &str,
    ) -> Result<(), ProviderError> {
        let url = self.endpoint(&["projects", project_uuid, "access", user_uuid])?;
        self.send_ignoring_result(Method::DELETE, url, None).await
    }

    async fn list_project_group_accesses(
        &self,
        project_uuid: &str,
    ) -> Result<Vec<ProjectGroupAccess>, ProviderError> {
        self.get(self.endpoint(&["projects", project_uuid, "groupAccesses"])?)
            .await
    }

    async fn grant_project_group_access(
        &self,
        project_uuid: &str,
        group_uuid: &str,
        role: ProjectMemberRole,
    ) -> Result<(), ProviderError> {
        let url = self.endpoint(&["projects", project_uuid, "groupAccesses", group_uuid])?;
        self.send_ignoring_result(Method::POST, url, Some(json!({ "role": role })))
            .await
    }

    async fn update_project_group_access(
        &self,
        project_uuid: &str,
        group_uuid: &str,
        role: ProjectMemberRole,
    ) -> Result<(), ProviderError> {
        let url = self.endpoint(&["projects", project_uuid, "groupAccesses", group_uuid])?;
        self.send_ignoring_result(Method::PATCH, url, Some(json!({ "role": role })))
            .await
    }

    async fn revoke_project_group_access(
        &self,
        project_uuid: &str,
        group_uuid: &str,
    ) -> Result<(), ProviderError> {
        let url = self.endpoint(&["projects", project_uuid, "groupAccesses", group_uuid])?;
        self.send_ignoring_result(Method::DELETE, url, None).await
    }

    async fn list_groups(&self) -> Result<Vec<Group>, ProviderError> {
        self.get(self.endpoint(&["org", "groups"])?).await
    }

    async fn create_group(&self, request: &CreateGroup) -> Result<Group, ProviderError> {
        self.send(Method::POST, self.endpoint(&["org", "groups"])?, request)
            .await
    }

    async fn get_group(&self, group_uuid: &str) -> Result<Group, ProviderError> {
        let mut url = self.endpoint(&["groups", group_uuid])?;
        url.query_pairs_mut().append_pair("includeMembers", "1000");
        self.get(url).await
    }

    async fn update_group(
        &self,
        group_uuid: &str,
        request: &UpdateGroup,
    ) -> Result<Group, ProviderError> {
        self.send(Method::PATCH, self.endpoint(&["groups", group_uuid])?, request)
            .await
    }

    async fn delete_group(&self, group_uuid: &str) -> Result<(), ProviderError> {
        let url = self.endpoint(&["groups", group_uuid])?;
        self.send_ignoring_result(Method::DELETE, url, None).await
    }

    async fn add_group_member(
        &self,
        group_uuid: &str,
        user_uuid: &str,
    ) -> Result<(), ProviderError> {
        let url = self.endpoint(&["groups", group_uuid, "members", user_uuid])?;
        self.send_ignoring_result(Method::PUT, url, None).await
    }

    async fn remove_group_member(
        &self,
        group_uuid: &str,
        user_uuid: &str,
    ) -> Result<(), ProviderError> {
        let url = self.endpoint(&["groups", group_uuid, "members", user_uuid])?;
        self.send_ignoring_result(Method::DELETE, url, None).await
    }

    async fn list_spaces(&self, project_uuid: &str) -> Result<Vec<SpaceSummary>, ProviderError> {
        self.get(self.endpoint(&["projects", project_uuid, "spaces"])?)
            .await
    }

    async fn create_space(
        &self,
        project_uuid: &str,
        request: &CreateSpace,
    ) -> Result<Space, ProviderError> {
        let url = self.endpoint(&["projects", project_uuid, "spaces"])?;
        self.send(Method::POST, url, request).await
    }

    async fn get_space(
        &self,
        project_uuid: &str,
        space_uuid: &str,
    ) -> Result<Space, ProviderError> {
        self.get(self.endpoint(&["projects", project_uuid, "spaces", space_uuid])?)
            .await
    }

    async fn update_space(
        &self,
        project_uuid: &str,
        space_uuid: &str,
        request: &UpdateSpace,
    ) -> Result<Space, ProviderError> {
        let url = self.endpoint(&["projects", project_uuid, "spaces", space_uuid])?;
        self.send(Method::PATCH, url, request).await
    }

    async fn delete_space(
        &self,
        project_uuid: &str,
        space_uuid: &str,
    ) -> Result<(), ProviderError> {
        let url = self.endpoint(&["projects", project_uuid, "spaces", space_uuid])?;
        self.send_ignoring_result(Method::DELETE, url, None).await
    }

    async fn share_space_with_user(
        &self,
        project_uuid: &str,
        space_uuid: &str,
        user_uuid: &str,
        role: SpaceRole,
    ) -> Result<(), ProviderError> {
        let url = self.endpoint(&["projects", project_uuid, "spaces", space_uuid, "share"])?;
        self.send_ignoring_result(
            Method::POST,
            url,
            Some(json!({ "userUuid": user_uuid, "spaceRole": role })),
        )
        .await
    }

    async fn unshare_space_with_user(
        &self,
        project_uuid: &str,
        space_uuid: &str,
        user_uuid: &str,
    ) -> Result<(), ProviderError> {
        let url = self.endpoint(&[
            "projects",
            project_uuid,
            "spaces",
            space_uuid,
            "share",
            user_uuid,
        ])?;
        self.send_ignoring_result(Method::DELETE, url, None).await
    }

    async fn share_space_with_group(
        &self,
        project_uuid: &str,
        space_uuid: &str,
        group_uuid: &str,
        role: SpaceRole,
    ) -> Result<(), ProviderError> {
        let url = self.endpoint(&[
            "projects",
            project_uuid,
            "spaces",
            space_uuid,
            "group",
            "share",
        ])?;
        self.send_ignoring_result(
            Method::POST,
            url,
            Some(json!({ "groupUuid": group_uuid, "spaceRole": role })),
        )
        .await
    }

    async fn unshare_space_with_group(
        &self,
        project_uuid: &str,
        space_uuid: &str,
        group_uuid: &str,
    ) -> Result<(), ProviderError> {
        let url = self.endpoint(&[
            "projects",
            project_uuid,
            "spaces",
            space_uuid,
            "group",
            "share",
            group_uuid,
        ])?;
        self.send_ignoring_result(Method::DELETE, url, None).await
    }

    async fn create_warehouse_credentials(
        &self,
        request: &WarehouseCredentialsRequest,
    ) -> Result<WarehouseCredentials, ProviderError> {
        let url = self.endpoint(&["org", "warehouse-credentials"])?;
        self.send(Method::POST, url, request).await
    }

    async fn get_warehouse_credentials(
        &self,
        credentials_uuid: &str,
    ) -> Result<WarehouseCredentials, ProviderError> {
        self.get(self.endpoint(&["org", "warehouse-credentials", credentials_uuid])?)
            .await
    }

    async fn update_warehouse_credentials(
        &self,
        credentials_uuid: &str,
        request: &WarehouseCredentialsRequest,
    ) -> Result<WarehouseCredentials, ProviderError> {
        let url = self.endpoint(&["org", "warehouse-credentials", credentials_uuid])?;
        self.send(Method::PATCH, url, request).await
    }

    async fn delete_warehouse_credentials(
        &self,
        credentials_uuid: &str,
    ) -> Result<(), ProviderError> {
        let url = self.endpoint(&["org", "warehouse-credentials", credentials_uuid])?;
        self.send_ignoring_result(Method::DELETE, url, None).await
    }

    async fn create_ai_agent(
        &self,
        project_uuid: &str,
        request: &AiAgentRequest,
    ) -> Result<AiAgent, ProviderError> {
        let url = self.endpoint(&["projects", project_uuid, "aiAgents"])?;
        self.send(Method::POST, url, request).await
    }

    async fn get_ai_agent(
        &self,
        project_uuid: &str,
        agent_uuid: &str,
    ) -> Result<AiAgent, ProviderError> {
        self.get(self.endpoint(&["projects", project_uuid, "aiAgents", agent_uuid])?)
            .await
    }

    async fn update_ai_agent(
        &self,
        project_uuid: &str,
        agent_uuid: &str,
        request: &AiAgentRequest,
    ) -> Result<AiAgent, ProviderError> {
        let url = self.endpoint(&["projects", project_uuid, "aiAgents", agent_uuid])?;
        self.send(Method::PATCH, url, request).await
    }

    async fn delete_ai_agent(
        &self,
        project_uuid: &str,
        agent_uuid: &str,
    ) -> Result<(), ProviderError> {
        let url = self.endpoint(&["projects", project_uuid, "aiAgents", agent_uuid])?;
        self.send_ignoring_result(Method::DELETE, url, None).await
    }
}
