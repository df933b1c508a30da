//! Chat-completion boundary for the generative model.
//!
//! Speaks the OpenAI-compatible `POST {base_url}/chat/completions` protocol
//! (Groq by default) with bearer authentication.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::GenerationError;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

/// One stateless completion request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl ChatRequest {
    /// A request carrying exactly one user message and no history.
    pub fn single_user(
        model: impl Into<String>,
        prompt: impl Into<String>,
        temperature: f32,
        max_tokens: u32,
    ) -> Self {
        Self {
            model: model.into(),
            messages: vec![ChatMessage {
                role: "user".to_string(),
                content: prompt.into(),
            }],
            temperature,
            max_tokens,
        }
    }
}

/// A generative text model reachable through a chat-completion call.
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Return the text of the first completion choice.
    async fn complete(&self, request: &ChatRequest) -> Result<String, GenerationError>;
}

#[derive(Deserialize)]
struct CompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

/// HTTP client for an OpenAI-compatible chat-completion endpoint.
pub struct OpenAiCompatClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    timeout: Duration,
}

impl std::fmt::Debug for OpenAiCompatClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiCompatClient")
            .field("base_url", &self.base_url)
            .field("api_key", &"<redacted>")
            .finish()
    }
}

impl OpenAiCompatClient {
    /// Create a client for `base_url` (e.g. `https://api.groq.com/openai/v1`, no trailing slash needed).
    ///
    /// `timeout` bounds each whole request, connect through body.
    pub fn new(
        base_url: &str,
        api_key: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            timeout,
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }

    fn map_transport(&self, err: reqwest::Error) -> GenerationError {
        if err.is_timeout() {
            GenerationError::Timeout(self.timeout)
        } else {
            GenerationError::Http(err)
        }
    }
}

#[async_trait]
impl ChatModel for OpenAiCompatClient {
    async fn complete(&self, request: &ChatRequest) -> Result<String, GenerationError> {
        let url = self.endpoint();
        info!(
            url = %url,
            model = %request.model,
            max_tokens = request.max_tokens,
            "requesting completion"
        );

        let resp = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(request)
            .send()
            .await
            .map_err(|e| self.map_transport(e))?;
        let status = resp.status();
        let body = resp.text().await.map_err(|e| self.map_transport(e))?;
        if !status.is_success() {
            return Err(GenerationError::Server {
                status: status.as_u16(),
                body,
            });
        }

        let text = parse_completion(&body)?;
        debug!(chars = text.len(), "completion received");
        Ok(text)
    }
}

/// Extract `choices[0].message.content` from a completion response body.
pub fn parse_completion(body: &str) -> Result<String, GenerationError> {
    let parsed: CompletionResponse = serde_json::from_str(body)
        .map_err(|e| GenerationError::Malformed(format!("undecodable body: {e}")))?;
    let choice = parsed
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| GenerationError::Malformed("no choices in response".to_string()))?;
    choice
        .message
        .content
        .ok_or_else(|| GenerationError::Malformed("completion has no content".to_string()))
}
