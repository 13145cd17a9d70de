//! The hosted generative-search capability: "given a prompt, return free text
//! plus optional grounding citations".
//!
//! [`GroundedModel`] is the seam the search runtime depends on;
//! [`GeminiClient`] is the production implementation over the Gemini REST
//! API with the `google_search` grounding tool enabled.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use thiserror::Error;
use tracing::{debug, warn};

use hyperscan_config::LlmConfig;

/// Bodies longer than this are cut before they end up in an error message.
const ERROR_BODY_LIMIT: usize = 512;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerateRequest {
    pub model: String,
    pub prompt: String,
    /// Ask the service to ground the answer with live web search.
    pub web_search: bool,
}

/// Raw model output.
///
/// `grounding_chunks` are kept as opaque JSON records; interpreting them is
/// the result extractor's job.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GroundedResponse {
    pub text: String,
    #[serde(default)]
    pub grounding_chunks: Vec<serde_json::Value>,
}

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("model API key missing; set GEMINI_API_KEY or llm.api_key")]
    MissingApiKey,
    #[error("model request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("model service returned {status}: {body}")]
    Status {
        status: reqwest::StatusCode,
        body: String,
    },
    #[error("model response contained no candidates")]
    EmptyResponse,
}

#[async_trait]
pub trait GroundedModel: Send + Sync {
    async fn generate(&self, request: &GenerateRequest) -> Result<GroundedResponse, ModelError>;
}

#[derive(Debug, Clone)]
pub struct GeminiClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl GeminiClient {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
            api_key: api_key.into(),
        }
    }

    pub fn from_config(config: &LlmConfig) -> Result<Self, ModelError> {
        let mut builder = reqwest::Client::builder();
        if config.request_timeout_secs > 0 {
            builder = builder.timeout(Duration::from_secs(config.request_timeout_secs));
        }
        Ok(Self {
            client: builder.build()?,
            base_url: config.base_url.clone(),
            api_key: config.api_key.clone(),
        })
    }

    fn endpoint(&self, model: &str) -> String {
        format!(
            "{}/models/{}:generateContent",
            self.base_url.trim_end_matches('/'),
            model
        )
    }
}

#[async_trait]
impl GroundedModel for GeminiClient {
    async fn generate(&self, request: &GenerateRequest) -> Result<GroundedResponse, ModelError> {
        if self.api_key.trim().is_empty() {
            return Err(ModelError::MissingApiKey);
        }

        let endpoint = self.endpoint(&request.model);
        debug!(
            %endpoint,
            prompt_len = request.prompt.len(),
            web_search = request.web_search,
            "sending generateContent"
        );

        let response = self
            .client
            .post(endpoint)
            .header("x-goog-api-key", &self.api_key)
            .json(&request_body(request))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(%status, "model service rejected request");
            return Err(ModelError::Status {
                status,
                body: truncate_chars(&body, ERROR_BODY_LIMIT),
            });
        }

        let body: serde_json::Value = response.json().await?;
        parse_response(&body)
    }
}

/// Build the `generateContent` payload for a request.
pub fn request_body(request: &GenerateRequest) -> serde_json::Value {
    let mut body = json!({
        "contents": [
            {"role": "user", "parts": [{"text": request.prompt}]}
        ]
    });
    if request.web_search {
        body["tools"] = json!([{"google_search": {}}]);
    }
    body
}

/// Pull the answer text and grounding chunks out of a `generateContent`
/// response.  Text is the concatenation of every text part of the first
/// candidate, which is what the official SDKs expose as `response.text`.
pub fn parse_response(body: &serde_json::Value) -> Result<GroundedResponse, ModelError> {
    let candidate = body
        .get("candidates")
        .and_then(|candidates| candidates.get(0))
        .ok_or(ModelError::EmptyResponse)?;

    let text = candidate
        .get("content")
        .and_then(|content| content.get("parts"))
        .and_then(|parts| parts.as_array())
        .map(|parts| {
            parts
                .iter()
                .filter_map(|part| part.get("text").and_then(|text| text.as_str()))
                .collect::<String>()
        })
        .unwrap_or_default();

    let grounding_chunks = candidate
        .get("groundingMetadata")
        .and_then(|metadata| metadata.get("groundingChunks"))
        .and_then(|chunks| chunks.as_array())
        .cloned()
        .unwrap_or_default();

    Ok(GroundedResponse {
        text,
        grounding_chunks,
    })
}

fn truncate_chars(text: &str, limit: usize) -> String {
    match text.char_indices().nth(limit) {
        Some((cut, _)) => format!("{}…", &text[..cut]),
        None => text.to_string(),
    }
}

// ── Tests ────────────────────────────────────────────────────────────────────
