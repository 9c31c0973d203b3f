//! Jira REST (v2) implementation of [`IssueTracker`].

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{ACCEPT, CONTENT_TYPE, HeaderMap, HeaderValue};
use serde::Deserialize;
use serde_json::{Value, json};
use url::Url;

use crate::error::{Result, TrackerError};
use crate::tracker::IssueTracker;
use crate::types::{Issue, IssueUpdate, NewIssue};

/// Default timeout for requests.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Fields requested from search and get.
const ISSUE_FIELDS: &str = "summary,status,assignee,priority,issuetype";

/// Jira API client.
///
/// Cheap to clone; clones share the connection pool.
#[derive(Clone)]
pub struct JiraClient {
    inner: Arc<ClientInner>,
}

struct ClientInner {
    http: reqwest::Client,
    base_url: Url,
    username: String,
    api_token: String,
    timeout: Duration,
}

impl std::fmt::Debug for JiraClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JiraClient")
            .field("base_url", &self.inner.base_url.as_str())
            .field("username", &self.inner.username)
            .finish_non_exhaustive()
    }
}

impl JiraClient {
    /// Create a new client builder.
    pub fn builder() -> JiraClientBuilder {
        JiraClientBuilder::new()
    }

    /// Get the base URL.
    pub fn base_url(&self) -> &Url {
        &self.inner.base_url
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Internal HTTP methods
    // ─────────────────────────────────────────────────────────────────────────

    fn url(&self, path: &str) -> Result<Url> {
        let path = path.trim_start_matches('/');
        Ok(self.inner.base_url.join(&format!("rest/api/2/{}", path))?)
    }

    fn request(&self, method: reqwest::Method, url: Url) -> reqwest::RequestBuilder {
        self.inner
            .http
            .request(method, url)
            .basic_auth(&self.inner.username, Some(&self.inner.api_token))
            .timeout(self.inner.timeout)
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T> {
        let url = self.url(path)?;
        let response = self
            .request(reqwest::Method::GET, url)
            .query(query)
            .send()
            .await?;
        self.handle_response(response).await
    }

    async fn send_json(&self, method: reqwest::Method, path: &str, body: &Value) -> Result<Value> {
        let url = self.url(path)?;
        let response = self.request(method, url).json(body).send().await?;

        if !response.status().is_success() {
            return Err(self.extract_error(response).await);
        }
        // 204 responses carry no body
        let text = response.text().await?;
        if text.trim().is_empty() {
            Ok(Value::Null)
        } else {
            Ok(serde_json::from_str(&text)?)
        }
    }

    async fn handle_response<T: serde::de::DeserializeOwned>(
        &self,
        response: reqwest::Response,
    ) -> Result<T> {
        if response.status().is_success() {
            let text = response.text().await?;
            Ok(serde_json::from_str(&text)?)
        } else {
            Err(self.extract_error(response).await)
        }
    }

    /// Extract an error from a failed response.
    async fn extract_error(&self, response: reqwest::Response) -> TrackerError {
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();

        let message = serde_json::from_str::<JiraErrorResponse>(&body)
            .ok()
            .and_then(|e| e.summary())
            .unwrap_or_else(|| {
                if body.trim().is_empty() {
                    format!("HTTP {}", status)
                } else {
                    body.chars().take(200).collect()
                }
            });

        match status {
            401 | 403 => TrackerError::auth(status, message),
            404 => TrackerError::NotFound(message),
            _ => TrackerError::Api { status, message },
        }
    }

    fn to_issue(&self, raw: JiraIssue) -> Issue {
        let url = self
            .inner
            .base_url
            .join(&format!("browse/{}", raw.key))
            .ok()
            .map(String::from);

        Issue {
            key: raw.key,
            title: raw.fields.summary.unwrap_or_default(),
            status: raw
                .fields
                .status
                .and_then(|s| s.name)
                .unwrap_or_else(|| "Unknown".to_string()),
            assignee: raw.fields.assignee.and_then(|a| a.display_name.or(a.name)),
            priority: raw.fields.priority.and_then(|p| p.name),
            issue_type: raw.fields.issuetype.and_then(|t| t.name),
            url,
        }
    }

    async fn transition(&self, key: &str, target: &str) -> Result<()> {
        let list: JiraTransitions = self
            .get_json(&format!("issue/{}/transitions", key), &[])
            .await?;

        let transition = list
            .transitions
            .into_iter()
            .find(|t| {
                t.name.eq_ignore_ascii_case(target)
                    || t.to
                        .as_ref()
                        .and_then(|to| to.name.as_deref())
                        .is_some_and(|n| n.eq_ignore_ascii_case(target))
            })
            .ok_or_else(|| TrackerError::Api {
                status: 400,
                message: format!("no transition to status '{}' available for {}", target, key),
            })?;

        self.send_json(
            reqwest::Method::POST,
            &format!("issue/{}/transitions", key),
            &json!({ "transition": { "id": transition.id } }),
        )
        .await?;
        Ok(())
    }
}

#[async_trait]
impl IssueTracker for JiraClient {
    async fn search(&self, jql: &str, max_results: usize) -> Result<Vec<Issue>> {
        tracing::debug!(jql = %jql, max_results, "Searching issues");

        let result: JiraSearchResult = self
            .get_json(
                "search",
                &[
                    ("jql", jql.to_string()),
                    ("maxResults", max_results.to_string()),
                    ("fields", ISSUE_FIELDS.to_string()),
                ],
            )
            .await?;

        Ok(result
            .issues
            .into_iter()
            .map(|raw| self.to_issue(raw))
            .collect())
    }

    async fn create(&self, issue: NewIssue) -> Result<Issue> {
        tracing::debug!(project = %issue.project, issue_type = %issue.issue_type, "Creating issue");

        let body = json!({
            "fields": {
                "project": { "key": issue.project },
                "summary": issue.title,
                "description": issue.body,
                "issuetype": { "name": issue.issue_type },
            }
        });
        let created = self.send_json(reqwest::Method::POST, "issue", &body).await?;
        let key = created
            .get("key")
            .and_then(Value::as_str)
            .ok_or_else(|| TrackerError::Serialization("create response missing key".into()))?;

        self.get(key).await
    }

    async fn get(&self, key: &str) -> Result<Issue> {
        let raw: JiraIssue = self
            .get_json(&format!("issue/{}", key), &[("fields", ISSUE_FIELDS.to_string())])
            .await?;
        Ok(self.to_issue(raw))
    }

    async fn update(&self, key: &str, update: IssueUpdate) -> Result<Issue> {
        tracing::debug!(key = %key, "Updating issue");

        let mut fields = serde_json::Map::new();
        if let Some(ref title) = update.title {
            fields.insert("summary".into(), json!(title));
        }
        if let Some(ref assignee) = update.assignee {
            fields.insert("assignee".into(), json!({ "name": assignee }));
        }
        if let Some(ref priority) = update.priority {
            fields.insert("priority".into(), json!({ "name": priority }));
        }

        if !fields.is_empty() {
            self.send_json(
                reqwest::Method::PUT,
                &format!("issue/{}", key),
                &json!({ "fields": fields }),
            )
            .await?;
        }

        // Status is not a plain field in Jira; it moves through a transition
        if let Some(ref status) = update.status {
            self.transition(key, status).await?;
        }

        self.get(key).await
    }

    async fn health_check(&self) -> Result<()> {
        let _: Value = self.get_json("myself", &[]).await?;
        Ok(())
    }

    fn name(&self) -> &str {
        "jira"
    }
}

/// Builder for creating a [`JiraClient`].
#[derive(Debug, Default)]
pub struct JiraClientBuilder {
    base_url: Option<String>,
    username: Option<String>,
    api_token: Option<String>,
    timeout: Option<Duration>,
}

impl JiraClientBuilder {
    /// Create a new builder with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the Jira instance URL.
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Set the account user name (email for Jira Cloud).
    pub fn username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }

    /// Set the API token.
    pub fn api_token(mut self, token: impl Into<String>) -> Self {
        self.api_token = Some(token.into());
        self
    }

    /// Set the request timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Build the client.
    pub fn build(self) -> Result<JiraClient> {
        let base_url = self
            .base_url
            .ok_or_else(|| TrackerError::Config("tracker url is required".to_string()))?;
        let username = self
            .username
            .ok_or_else(|| TrackerError::Config("tracker username is required".to_string()))?;
        let api_token = self
            .api_token
            .ok_or_else(|| TrackerError::Config("tracker api token is required".to_string()))?;

        let mut base_url = Url::parse(&base_url)?;
        if !base_url.path().ends_with('/') {
            base_url.set_path(&format!("{}/", base_url.path()));
        }

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .user_agent(format!("ticketwise/{}", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(JiraClient {
            inner: Arc::new(ClientInner {
                http,
                base_url,
                username,
                api_token,
                timeout: self.timeout.unwrap_or(DEFAULT_TIMEOUT),
            }),
        })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Jira wire types
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct JiraSearchResult {
    #[serde(default)]
    issues: Vec<JiraIssue>,
}

#[derive(Debug, Deserialize)]
struct JiraIssue {
    key: String,
    fields: JiraFields,
}

#[derive(Debug, Deserialize)]
struct JiraFields {
    summary: Option<String>,
    status: Option<JiraNamed>,
    assignee: Option<JiraUser>,
    priority: Option<JiraNamed>,
    issuetype: Option<JiraNamed>,
}

#[derive(Debug, Deserialize)]
struct JiraNamed {
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct JiraUser {
    #[serde(rename = "displayName")]
    display_name: Option<String>,
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct JiraTransitions {
    #[serde(default)]
    transitions: Vec<JiraTransition>,
}

#[derive(Debug, Deserialize)]
struct JiraTransition {
    id: String,
    name: String,
    to: Option<JiraNamed>,
}

#[derive(Debug, Deserialize)]
struct JiraErrorResponse {
    #[serde(default, rename = "errorMessages")]
    error_messages: Vec<String>,
    #[serde(default)]
    errors: serde_json::Map<String, Value>,
}

impl JiraErrorResponse {
    fn summary(&self) -> Option<String> {
        let mut parts: Vec<String> = self.error_messages.clone();
        parts.extend(
            self.errors
                .iter()
                .map(|(field, msg)| format!("{}: {}", field, msg.as_str().unwrap_or_default())),
        );
        if parts.is_empty() {
            None
        } else {
            Some(parts.join("; "))
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
