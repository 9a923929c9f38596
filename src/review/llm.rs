//! Model seam: an opaque `evaluate(prompt, system) -> raw text` call.
//!
//! The pipeline never looks inside the transport; it only needs a bounded,
//! fallible text-in/text-out function. The concrete client speaks an
//! OpenAI-style chat endpoint with an explicit request timeout. Tests plug
//! in scripted stubs through the same trait.
//!
//! No `async-trait` and no `Box<dyn ...>`: plain async fn in trait.

use std::time::Duration;

use reqwest::header;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::errors::ModelError;

/// Opaque model call used by the pipeline.
#[allow(async_fn_in_trait)]
pub trait ModelClient {
    async fn evaluate(&self, prompt: &str, system: &str) -> Result<String, ModelError>;
}

/// Model endpoint configuration.
#[derive(Debug, Clone)]
pub struct ModelConfig {
    /// API base, e.g. "https://api.openai.com".
    pub endpoint: String,
    pub model: String,
    pub api_key: Option<String>,
    /// Bound on a single call; a timeout is a per-file soft failure.
    pub timeout_secs: u64,
    pub max_tokens: Option<u32>,
}

impl ModelConfig {
    pub fn from_env() -> Self {
        Self {
            endpoint: std::env::var("REVIEW_MODEL_URL")
                .unwrap_or_else(|_| "https://api.openai.com".to_string()),
            model: std::env::var("REVIEW_MODEL")
                .unwrap_or_else(|_| "gpt-4o-mini".to_string()),
            api_key: std::env::var("REVIEW_MODEL_API_KEY").ok(),
            timeout_secs: std::env::var("REVIEW_MODEL_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(90),
            max_tokens: None,
        }
    }
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
}

/// Thin chat-completions client with bounded timeout.
#[derive(Debug, Clone)]
pub struct HttpModelClient {
    http: reqwest::Client,
    cfg: ModelConfig,
    url_chat: String,
}

impl HttpModelClient {
    pub fn new(cfg: ModelConfig) -> Result<Self, ModelError> {
        let endpoint = cfg.endpoint.trim();
        if endpoint.is_empty()
            || !(endpoint.starts_with("http://") || endpoint.starts_with("https://"))
        {
            return Err(ModelError::InvalidEndpoint(cfg.endpoint.clone()));
        }

        let mut headers = header::HeaderMap::new();
        headers.insert(
            header::CONTENT_TYPE,
            header::HeaderValue::from_static("application/json"),
        );
        if let Some(key) = &cfg.api_key {
            let value = header::HeaderValue::from_str(&format!("Bearer {key}"))
                .map_err(|e| ModelError::Network(format!("invalid api key header: {e}")))?;
            headers.insert(header::AUTHORIZATION, value);
        }

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(cfg.timeout_secs))
            .default_headers(headers)
            .build()
            .map_err(|e| ModelError::Network(e.to_string()))?;

        let url_chat = format!("{}/v1/chat/completions", endpoint.trim_end_matches('/'));
        Ok(Self {
            http,
            cfg,
            url_chat,
        })
    }
}

impl ModelClient for HttpModelClient {
    async fn evaluate(&self, prompt: &str, system: &str) -> Result<String, ModelError> {
        debug!("llm: evaluate model={} url={}", self.cfg.model, self.url_chat);
        let req = ChatRequest {
            model: &self.cfg.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: system,
                },
                ChatMessage {
                    role: "user",
                    content: prompt,
                },
            ],
            temperature: 0.2,
            max_tokens: self.cfg.max_tokens,
        };

        let resp = self.http.post(&self.url_chat).json(&req).send().await?;
        if !resp.status().is_success() {
            return Err(ModelError::HttpStatus(resp.status().as_u16()));
        }

        let body: ChatResponse = resp.json().await?;
        body.choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|s| !s.trim().is_empty())
            .ok_or(ModelError::EmptyResponse)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_non_http_endpoint() {
        let cfg = ModelConfig {
            endpoint: "ftp://example.com".into(),
            model: "m".into(),
            api_key: None,
            timeout_secs: 90,
            max_tokens: None,
        };
        assert!(matches!(
            HttpModelClient::new(cfg),
            Err(ModelError::InvalidEndpoint(_))
        ));
    }

    #[test]
    fn builds_chat_url_from_endpoint() {
        let cfg = ModelConfig {
            endpoint: "https://api.example.com/".into(),
            model: "m".into(),
            api_key: Some("k".into()),
            timeout_secs: 90,
            max_tokens: None,
        };
        let client = HttpModelClient::new(cfg).unwrap();
        assert_eq!(client.url_chat, "https://api.example.com/v1/chat/completions");
    }
}
