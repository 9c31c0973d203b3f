//! OpenAI-compatible API backend implementation.
//!
//! This module provides `OpenAiBackend`, which talks to OpenAI's chat
//! completions endpoint or any service that speaks the same protocol.

use async_trait::async_trait;
use reqwest::{Client, Response, header};
use std::time::Duration;

use crate::backend::LlmBackend;
use crate::error::{LlmError, Result};
use crate::types::{CompletionRequest, CompletionResponse, Message, Role, StopReason, Usage};

/// Default OpenAI API base URL.
const DEFAULT_OPENAI_BASE: &str = "https://api.openai.com/v1";

/// Default model for classification and synthesis.
pub const DEFAULT_MODEL: &str = "gpt-4o";

/// Default timeout for requests.
const DEFAULT_TIMEOUT_SECS: u64 = 60;

// ─────────────────────────────────────────────────────────────────────────────
// Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// Configuration for the OpenAI-compatible backend.
#[derive(Clone)]
pub struct OpenAiConfig {
    /// API key for authentication.
    pub api_key: Option<String>,

    /// Base URL for the API.
    pub base_url: String,

    /// Model to use when the request does not name one.
    pub model: String,

    /// Transport-level request timeout.
    pub timeout: Duration,

    /// Name for this backend instance.
    pub name: String,
}

impl std::fmt::Debug for OpenAiConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiConfig")
            .field("api_key", &self.api_key.as_ref().map(|_| "***"))
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("timeout", &self.timeout)
            .field("name", &self.name)
            .finish()
    }
}

impl OpenAiConfig {
    /// Create a new config for OpenAI.
    pub fn openai(api_key: impl Into<String>) -> Self {
        Self {
            api_key: Some(api_key.into()),
            base_url: DEFAULT_OPENAI_BASE.to_string(),
            model: DEFAULT_MODEL.to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            name: "openai".to_string(),
        }
    }

    /// Set a custom base URL.
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    /// Set the default model.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Set the backend name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Set request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// OpenAI Backend
// ─────────────────────────────────────────────────────────────────────────────

/// OpenAI-compatible API backend.
pub struct OpenAiBackend {
    client: Client,
    config: OpenAiConfig,
}

impl OpenAiBackend {
    /// Create a new OpenAI-compatible backend with the given configuration.
    pub fn new(config: OpenAiConfig) -> Result<Self> {
        if config.api_key.as_deref().is_none_or(str::is_empty) {
            return Err(LlmError::Config(
                "OpenAI api key is not configured".to_string(),
            ));
        }

        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| LlmError::Internal(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { client, config })
    }

    /// The configured default model.
    pub fn model(&self) -> &str {
        &self.config.model
    }

    /// Build the chat completions endpoint URL.
    fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.config.base_url)
    }

    /// Add authentication headers to a request.
    fn add_headers(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        let builder = builder.header(header::CONTENT_TYPE, "application/json");

        if let Some(ref api_key) = self.config.api_key {
            builder.header(header::AUTHORIZATION, format!("Bearer {}", api_key))
        } else {
            builder
        }
    }

    /// Convert our CompletionRequest to OpenAI-compatible format.
    fn to_openai_request(&self, request: &CompletionRequest) -> OpenAiChatRequest {
        let mut messages = Vec::with_capacity(request.messages.len() + 1);

        if let Some(ref system) = request.system {
            messages.push(OpenAiMessage {
                role: "system".to_string(),
                content: system.clone(),
            });
        }

        messages.extend(request.messages.iter().map(|m| OpenAiMessage {
            role: match m.role {
                Role::User => "user".to_string(),
                Role::Assistant => "assistant".to_string(),
            },
            content: m.content.clone(),
        }));

        let stop = if request.stop_sequences.is_empty() {
            None
        } else {
            Some(request.stop_sequences.clone())
        };

        let model = if request.model.is_empty() {
            self.config.model.clone()
        } else {
            request.model.clone()
        };

        OpenAiChatRequest {
            model,
            messages,
            max_tokens: Some(request.max_tokens),
            temperature: request.temperature,
            stop,
        }
    }

    /// Handle a response, mapping non-2xx statuses to errors.
    async fn handle_response(response: Response) -> Result<CompletionResponse> {
        if !response.status().is_success() {
            return Err(Self::handle_error_response(response).await);
        }

        let body = response.text().await?;
        let parsed: OpenAiChatResponse =
            serde_json::from_str(&body).map_err(|e| LlmError::Serialization(e.to_string()))?;

        Ok(parsed.into())
    }

    /// Handle an error response.
    async fn handle_error_response(response: Response) -> LlmError {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();

        let message = serde_json::from_str::<OpenAiErrorResponse>(&body)
            .map(|e| e.error.message)
            .unwrap_or_else(|_| body.clone());

        match status.as_u16() {
            401 | 403 => LlmError::Auth(format!("HTTP {}: invalid api key: {}", status, message)),
            429 => LlmError::RateLimit(format!("HTTP {}: {}", status, message)),
            400 => LlmError::InvalidRequest(format!("HTTP {}: {}", status, message)),
            _ => LlmError::Backend(format!("HTTP {}: {}", status, message)),
        }
    }
}

#[async_trait]
impl LlmBackend for OpenAiBackend {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse> {
        let openai_request = self.to_openai_request(&request);

        tracing::debug!(
            backend = %self.config.name,
            model = %openai_request.model,
            messages = %openai_request.messages.len(),
            "Sending OpenAI-compatible request"
        );

        let response = self
            .add_headers(self.client.post(self.completions_url()))
            .json(&openai_request)
            .send()
            .await?;

        let result = Self::handle_response(response).await;
        if let Err(ref e) = result {
            tracing::warn!(backend = %self.config.name, error = %e, "Completion failed");
        }
        result
    }

    fn name(&self) -> &str {
        &self.config.name
    }

    async fn health_check(&self) -> Result<()> {
        let request = CompletionRequest::new(
            self.config.model.clone(),
            vec![Message::user("ping")],
            1,
        );

        match self.complete(request).await {
            Ok(_) => Ok(()),
            // Rate limit still means reachable and authenticated
            Err(LlmError::RateLimit(_)) => Ok(()),
            Err(e) => Err(e),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// OpenAI API Types
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, serde::Serialize)]
struct OpenAiChatRequest {
    model: String,
    messages: Vec<OpenAiMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stop: Option<Vec<String>>,
}

#[derive(Debug, serde::Serialize)]
struct OpenAiMessage {
    role: String,
    content: String,
}

#[derive(Debug, serde::Deserialize)]
struct OpenAiChatResponse {
    id: String,
    choices: Vec<OpenAiChoice>,
    model: String,
    usage: Option<OpenAiUsage>,
}

impl From<OpenAiChatResponse> for CompletionResponse {
    fn from(resp: OpenAiChatResponse) -> Self {
        let (content, stop_reason) = match resp.choices.into_iter().next() {
            Some(choice) => {
                let stop = match choice.finish_reason.as_deref() {
                    Some("length") => StopReason::MaxTokens,
                    Some("stop") | None => StopReason::EndTurn,
                    Some(_) => StopReason::StopSequence,
                };
                (choice.message.content.unwrap_or_default(), stop)
            }
            None => (String::new(), StopReason::EndTurn),
        };

        let usage = resp
            .usage
            .map(|u| Usage::new(u.prompt_tokens, u.completion_tokens))
            .unwrap_or_default();

        CompletionResponse::new(resp.id, resp.model, content, stop_reason, usage)
    }
}

#[derive(Debug, serde::Deserialize)]
struct OpenAiChoice {
    message: OpenAiResponseMessage,
    finish_reason: Option<String>,
}

#[derive(Debug, serde::Deserialize)]
struct OpenAiResponseMessage {
    content: Option<String>,
}

#[derive(Debug, serde::Deserialize)]
struct OpenAiUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
}

#[derive(Debug, serde::Deserialize)]
struct OpenAiErrorResponse {
    error: OpenAiError,
}

#[derive(Debug, serde::Deserialize)]
struct OpenAiError {
    message: String,
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn backend_for(server: &MockServer) -> OpenAiBackend {
        let config = OpenAiConfig::openai("sk-test").with_base_url(server.uri());
        OpenAiBackend::new(config).unwrap()
    }

    #[test]
    fn test_openai_config() {
        let config = OpenAiConfig::openai("test-key");
        assert_eq!(config.api_key, Some("test-key".to_string()));
        assert_eq!(config.base_url, DEFAULT_OPENAI_BASE);
        assert_eq!(config.model, DEFAULT_MODEL);
        assert_eq!(config.name, "openai");
    }

    #[test]
    fn test_config_debug_hides_key() {
        let config = OpenAiConfig::openai("sk-very-secret");
        let debug = format!("{:?}", config);
        assert!(!debug.contains("sk-very-secret"));
    }

    #[test]
    fn test_missing_key_is_config_error() {
        let mut config = OpenAiConfig::openai("");
        assert!(matches!(
            OpenAiBackend::new(config.clone()),
            Err(LlmError::Config(_))
        ));
        config.api_key = None;
        assert!(OpenAiBackend::new(config).is_err());
    }

    #[test]
    fn test_completions_url_trims_slash() {
        let config = OpenAiConfig::openai("key").with_base_url("http://custom.api/v1/");
        let backend = OpenAiBackend::new(config).unwrap();
        assert_eq!(backend.completions_url(), "http://custom.api/v1/chat/completions");
    }

    #[test]
    fn test_to_openai_request() {
        let backend = OpenAiBackend::new(OpenAiConfig::openai("key")).unwrap();

        let request = CompletionRequest::prompt("", "Hello", 100)
            .with_system("be brief")
            .with_temperature(0.1);

        let openai_req = backend.to_openai_request(&request);
        assert_eq!(openai_req.model, DEFAULT_MODEL);
        assert_eq!(openai_req.messages.len(), 2);
        assert_eq!(openai_req.messages[0].role, "system");
        assert_eq!(openai_req.messages[1].role, "user");
        assert_eq!(openai_req.max_tokens, Some(100));
        assert_eq!(openai_req.temperature, Some(0.1));
    }

    #[test]
    fn test_response_conversion() {
        let openai_resp = OpenAiChatResponse {
            id: "chatcmpl-123".to_string(),
            choices: vec![OpenAiChoice {
                message: OpenAiResponseMessage {
                    content: Some("Hello!".to_string()),
                },
                finish_reason: Some("stop".to_string()),
            }],
            model: "gpt-4o".to_string(),
            usage: Some(OpenAiUsage {
                prompt_tokens: 10,
                completion_tokens: 5,
            }),
        };

        let response: CompletionResponse = openai_resp.into();
        assert_eq!(response.id, "chatcmpl-123");
        assert_eq!(response.text(), "Hello!");
        assert_eq!(response.stop_reason, Some(StopReason::EndTurn));
        assert_eq!(response.usage.total(), 15);
    }

    #[tokio::test]
    async fn test_complete_against_server() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(header("authorization", "Bearer sk-test"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": "chatcmpl-1",
                "model": "gpt-4o",
                "choices": [{
                    "message": {"role": "assistant", "content": "{\"task_type\": \"general\"}"},
                    "finish_reason": "stop"
                }],
                "usage": {"prompt_tokens": 12, "completion_tokens": 7}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let backend = backend_for(&server);
        let response = backend
            .complete(CompletionRequest::prompt("gpt-4o", "classify", 50))
            .await
            .unwrap();

        assert!(response.text().contains("general"));
        assert_eq!(response.usage.input_tokens, 12);
    }

    #[tokio::test]
    async fn test_unauthorized_maps_to_auth() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(401).set_body_json(serde_json::json!({
                "error": {"message": "Incorrect API key provided"}
            })))
            .mount(&server)
            .await;

        let err = backend_for(&server)
            .complete(CompletionRequest::prompt("gpt-4o", "hi", 5))
            .await
            .unwrap_err();

        assert!(err.is_auth_error());
        assert!(err.to_string().contains("api key"));
    }

    #[tokio::test]
    async fn test_server_error_maps_to_backend() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503).set_body_string("overloaded"))
            .mount(&server)
            .await;

        let err = backend_for(&server)
            .complete(CompletionRequest::prompt("gpt-4o", "hi", 5))
            .await
            .unwrap_err();

        assert!(matches!(err, LlmError::Backend(_)));
        assert!(err.to_string().contains("overloaded"));
    }

    #[tokio::test]
    async fn test_health_check_tolerates_rate_limit() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429).set_body_json(serde_json::json!({
                "error": {"message": "slow down"}
            })))
            .mount(&server)
            .await;

        assert!(backend_for(&server).health_check().await.is_ok());
    }
}
