//! reqwest-based implementation of [`DirectoryApi`].

use std::{borrow::Cow, time::Duration};

use async_trait::async_trait;
use http::{
    Method,
    header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE, HeaderMap, LINK, RETRY_AFTER},
};
use reqwest::{Client, Response};
use serde::{Serialize, de::DeserializeOwned};
use tracing::{debug, warn};
use url::Url;

use super::{
    AppQuery, AssignRoleRequest, ChangePasswordRequest, ClientError, ClientResult,
    CreateUserRequest, DirectoryApi, Page, RemoteUser, UserCredentials, UserUpdate,
    retry::{with_max_retries, with_retry},
};
use crate::{
    config::{ClientConfig, RetryConfig},
    models::{Application, Group, Role},
};

/// Retries allowed for requests the server may already have applied.
const NON_IDEMPOTENT_MAX_RETRIES: u32 = 0;

/// Client for the identity management REST API.
#[derive(Debug, Clone)]
pub struct OktaClient {
    base_url: Url,
    authorization: String,
    http_client: Client,
    retry: RetryConfig,
    page_limit: u32,
}

impl OktaClient {
    pub fn new(config: &ClientConfig) -> ClientResult<Self> {
        let base_url = config
            .org_url()
            .map_err(|e| ClientError::InvalidConfig(e.to_string()))?;

        let http_client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .user_agent(config.user_agent.as_str())
            .build()
            .map_err(|e| ClientError::InvalidConfig(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self::with_http_client(
            http_client,
            base_url,
            &config.api_token,
            config.retry.clone(),
            config.page_limit,
        ))
    }

    /// Create a client with a pre-built `reqwest::Client`.
    pub fn with_http_client(
        http_client: Client,
        base_url: Url,
        api_token: &str,
        retry: RetryConfig,
        page_limit: u32,
    ) -> Self {
        Self {
            base_url,
            authorization: format!("SSWS {api_token}"),
            http_client,
            retry,
            page_limit,
        }
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// `{base}/api/v1/{segments...}` with every segment percent-encoded.
    fn endpoint(&self, segments: &[&str]) -> ClientResult<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| {
                ClientError::InvalidConfig(format!("'{}' cannot be a base URL", self.base_url))
            })?
            .pop_if_empty()
            .extend(["api", "v1"])
            .extend(segments);
        Ok(url)
    }

    fn user_endpoint(&self, user_id: &str, rest: &[&str]) -> ClientResult<Url> {
        let mut segments = vec!["users", user_id];
        segments.extend_from_slice(rest);
        self.endpoint(&segments)
    }

    async fn execute(
        &self,
        operation: &str,
        method: Method,
        url: Url,
        body: Option<Vec<u8>>,
        retry: &RetryConfig,
    ) -> ClientResult<Response> {
        debug!(operation = operation, method = %method, url = %url, "Sending request");

        let response = with_retry(retry, operation, || {
            let mut builder = self
                .http_client
                .request(method.clone(), url.clone())
                .header(AUTHORIZATION, &self.authorization)
                .header(ACCEPT, "application/json");
            if let Some(body) = &body {
                builder = builder
                    .header(CONTENT_TYPE, "application/json")
                    .body(body.clone());
            }
            builder.send()
        })
        .await?;

        if response.status().is_success() {
            Ok(response)
        } else {
            Err(error_from_response(operation, response).await)
        }
    }

    async fn send_json<T: DeserializeOwned>(
        &self,
        operation: &str,
        method: Method,
        url: Url,
        body: Option<Vec<u8>>,
        retry: &RetryConfig,
    ) -> ClientResult<T> {
        let response = self.execute(operation, method, url, body, retry).await?;
        let bytes = response.bytes().await?;
        serde_json::from_slice(&bytes)
            .map_err(|e| ClientError::Parse(format!("{operation}: {e}")))
    }

    /// Issue a request whose response body is not needed.
    async fn send_empty(
        &self,
        operation: &str,
        method: Method,
        url: Url,
        body: Option<Vec<u8>>,
    ) -> ClientResult<()> {
        self.execute(operation, method, url, body, &self.retry)
            .await
            .map(|_| ())
    }

    async fn fetch_page<T: DeserializeOwned>(
        &self,
        operation: &str,
        url: Url,
    ) -> ClientResult<Page<T>> {
        let response = self
            .execute(operation, Method::GET, url, None, &self.retry)
            .await?;
        let next = next_link(response.headers());
        let bytes = response.bytes().await?;
        let items = serde_json::from_slice(&bytes)
            .map_err(|e| ClientError::Parse(format!("{operation}: {e}")))?;
        Ok(Page { items, next })
    }

    /// Follow `rel="next"` links until the listing is exhausted.
    async fn list_all<T: DeserializeOwned>(
        &self,
        operation: &str,
        first: Url,
    ) -> ClientResult<Vec<T>> {
        let mut items = Vec::new();
        let mut url = first;
        loop {
            let page: Page<T> = self.fetch_page(operation, url.clone()).await?;
            items.extend(page.items);
            match page.next {
                Some(next) => {
                    let next = parse_link(&next)?;
                    if next == url {
                        warn!(operation = operation, url = %url, "Next link points at the current page");
                        break;
                    }
                    url = next;
                }
                None => break,
            }
        }
        Ok(items)
    }

    fn with_limit(&self, mut url: Url) -> Url {
        url.query_pairs_mut()
            .append_pair("limit", &self.page_limit.to_string());
        url
    }
}

fn encode<B: Serialize>(operation: &str, body: &B) -> ClientResult<Vec<u8>> {
    serde_json::to_vec(body)
        .map_err(|e| ClientError::Parse(format!("{operation}: failed to encode request: {e}")))
}

fn parse_link(link: &str) -> ClientResult<Url> {
    Url::parse(link).map_err(|e| ClientError::Parse(format!("invalid next link '{link}': {e}")))
}

/// Extract the `rel="next"` target from `Link` headers.
fn next_link(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(LINK)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(','))
        .find_map(|link| {
            let mut parts = link.split(';');
            let target = parts
                .next()?
                .trim()
                .strip_prefix('<')?
                .strip_suffix('>')?;
            parts
                .any(|param| matches!(param.trim(), r#"rel="next""# | "rel=next"))
                .then(|| target.to_string())
        })
}

async fn error_from_response(operation: &str, response: Response) -> ClientError {
    let status = response.status().as_u16();
    let retry_after = response
        .headers()
        .get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<u64>().ok());
    let body = response.bytes().await.unwrap_or_default();

    let error = ClientError::from_response(status, retry_after, &body);
    match &error {
        ClientError::NotFound(_) => debug!(operation = operation, "Resource not found"),
        ClientError::RateLimited { retry_after_secs } => warn!(
            operation = operation,
            retry_after_secs = ?retry_after_secs,
            "Rate limited by the identity API"
        ),
        _ => debug!(operation = operation, status = status, error = %error, "Request failed"),
    }
    error
}

#[async_trait]
impl DirectoryApi for OktaClient {
    async fn create_user(
        &self,
        request: &CreateUserRequest,
        activate: bool,
    ) -> ClientResult<RemoteUser> {
        let mut url = self.endpoint(&["users"])?;
        url.query_pairs_mut()
            .append_pair("activate", if activate { "true" } else { "false" });
        let body = encode("create_user", request)?;
        let retry = with_max_retries(&self.retry, NON_IDEMPOTENT_MAX_RETRIES);
        self.send_json("create_user", Method::POST, url, Some(body), &retry)
            .await
    }

    async fn get_user(&self, id_or_login: &str) -> ClientResult<RemoteUser> {
        let url = self.user_endpoint(id_or_login, &[])?;
        self.send_json("get_user", Method::GET, url, None, &self.retry)
            .await
    }

    async fn update_user(&self, user_id: &str, update: &UserUpdate) -> ClientResult<RemoteUser> {
        let url = self.user_endpoint(user_id, &[])?;
        let body = encode("update_user", update)?;
        self.send_json("update_user", Method::PUT, url, Some(body), &self.retry)
            .await
    }

    async fn partial_update_user(
        &self,
        user_id: &str,
        update: &UserUpdate,
    ) -> ClientResult<RemoteUser> {
        let url = self.user_endpoint(user_id, &[])?;
        let body = encode("partial_update_user", update)?;
        // Password history rejects a replayed password change.
        let retry = if update.credentials.is_some() {
            with_max_retries(&self.retry, NON_IDEMPOTENT_MAX_RETRIES)
        } else {
            Cow::Borrowed(&self.retry)
        };
        self.send_json("partial_update_user", Method::POST, url, Some(body), &retry)
            .await
    }

    async fn deactivate_or_delete_user(&self, user_id: &str) -> ClientResult<()> {
        let url = self.user_endpoint(user_id, &[])?;
        // Each call advances the user one lifecycle step.
        let retry = with_max_retries(&self.retry, NON_IDEMPOTENT_MAX_RETRIES);
        self.execute("deactivate_or_delete_user", Method::DELETE, url, None, &retry)
            .await
            .map(|_| ())
    }

    async fn activate_user(&self, user_id: &str, send_email: bool) -> ClientResult<()> {
        let mut url = self.user_endpoint(user_id, &["lifecycle", "activate"])?;
        url.query_pairs_mut()
            .append_pair("sendEmail", if send_email { "true" } else { "false" });
        self.send_empty("activate_user", Method::POST, url, None)
            .await
    }

    async fn deactivate_user(&self, user_id: &str) -> ClientResult<()> {
        let url = self.user_endpoint(user_id, &["lifecycle", "deactivate"])?;
        self.send_empty("deactivate_user", Method::POST, url, None)
            .await
    }

    async fn suspend_user(&self, user_id: &str) -> ClientResult<()> {
        let url = self.user_endpoint(user_id, &["lifecycle", "suspend"])?;
        self.send_empty("suspend_user", Method::POST, url, None)
            .await
    }

    async fn unsuspend_user(&self, user_id: &str) -> ClientResult<()> {
        let url = self.user_endpoint(user_id, &["lifecycle", "unsuspend"])?;
        self.send_empty("unsuspend_user", Method::POST, url, None)
            .await
    }

    async fn expire_password(&self, user_id: &str) -> ClientResult<()> {
        let url = self.user_endpoint(user_id, &["lifecycle", "expire_password"])?;
        self.send_empty("expire_password", Method::POST, url, None)
            .await
    }

    async fn change_password(
        &self,
        user_id: &str,
        request: &ChangePasswordRequest,
    ) -> ClientResult<()> {
        let url = self.user_endpoint(user_id, &["credentials", "change_password"])?;
        let body = encode("change_password", request)?;
        let retry = with_max_retries(&self.retry, NON_IDEMPOTENT_MAX_RETRIES);
        self.execute("change_password", Method::POST, url, Some(body), &retry)
            .await
            .map(|_| ())
    }

    async fn change_recovery_question(
        &self,
        user_id: &str,
        credentials: &UserCredentials,
    ) -> ClientResult<()> {
        let url = self.user_endpoint(user_id, &["credentials", "change_recovery_question"])?;
        let body = encode("change_recovery_question", credentials)?;
        self.send_empty("change_recovery_question", Method::POST, url, Some(body))
            .await
    }

    async fn list_user_roles(&self, user_id: &str) -> ClientResult<Vec<Role>> {
        let url = self.user_endpoint(user_id, &["roles"])?;
        self.send_json("list_user_roles", Method::GET, url, None, &self.retry)
            .await
    }

    async fn assign_role(
        &self,
        user_id: &str,
        request: &AssignRoleRequest,
        disable_notifications: bool,
    ) -> ClientResult<Role> {
        let mut url = self.user_endpoint(user_id, &["roles"])?;
        url.query_pairs_mut().append_pair(
            "disableNotifications",
            if disable_notifications { "true" } else { "false" },
        );
        let body = encode("assign_role", request)?;
        let retry = with_max_retries(&self.retry, NON_IDEMPOTENT_MAX_RETRIES);
        self.send_json("assign_role", Method::POST, url, Some(body), &retry)
            .await
    }

    async fn remove_role(&self, user_id: &str, role_assignment_id: &str) -> ClientResult<()> {
        let url = self.user_endpoint(user_id, &["roles", role_assignment_id])?;
        self.send_empty("remove_role", Method::DELETE, url, None)
            .await
    }

    async fn list_user_groups(&self, user_id: &str) -> ClientResult<Vec<Group>> {
        let url = self.with_limit(self.user_endpoint(user_id, &["groups"])?);
        self.list_all("list_user_groups", url).await
    }

    async fn add_user_to_group(&self, group_id: &str, user_id: &str) -> ClientResult<()> {
        let url = self.endpoint(&["groups", group_id, "users", user_id])?;
        self.send_empty("add_user_to_group", Method::PUT, url, None)
            .await
    }

    async fn remove_user_from_group(&self, group_id: &str, user_id: &str) -> ClientResult<()> {
        let url = self.endpoint(&["groups", group_id, "users", user_id])?;
        self.send_empty("remove_user_from_group", Method::DELETE, url, None)
            .await
    }

    async fn get_application(&self, app_id: &str) -> ClientResult<Application> {
        let url = self.endpoint(&["apps", app_id])?;
        self.send_json("get_application", Method::GET, url, None, &self.retry)
            .await
    }

    async fn list_applications(
        &self,
        query: &AppQuery,
        next: Option<&str>,
    ) -> ClientResult<Page<Application>> {
        let url = match next {
            Some(link) => parse_link(link)?,
            None => {
                let mut url = self.endpoint(&["apps"])?;
                {
                    let mut pairs = url.query_pairs_mut();
                    if let Some(q) = &query.q {
                        pairs.append_pair("q", q);
                    }
                    if let Some(filter) = &query.filter {
                        pairs.append_pair("filter", filter);
                    }
                    pairs.append_pair(
                        "limit",
                        &query.limit.unwrap_or(self.page_limit).to_string(),
                    );
                }
                url
            }
        };
        self.fetch_page("list_applications", url).await
    }
}
