//! Client for llama.cpp's OpenAI-compatible server with vision support.
//!
//! One user turn per request: a text part followed by the document's page
//! images as `data:` URIs, in reading order. JSON mode asks the server for a
//! well-formed object via `response_format`.

use std::collections::VecDeque;
use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::LlamaConfig;

#[derive(Error, Debug)]
pub enum LlamaError {
    #[error("cannot reach llama.cpp server at {0}")]
    Connection(String),

    #[error("request timed out after {0}s")]
    Timeout(u64),

    #[error("llama.cpp returned HTTP {status}: {body}")]
    Api { status: u16, body: String },

    #[error("HTTP client error: {0}")]
    Http(String),

    #[error("failed to parse server response: {0}")]
    ResponseParsing(String),

    #[error("no model configured and none listed by the server")]
    NoModelAvailable,
}

/// Vision-capable chat seam between the pipeline and the model service.
///
/// `images` are embeddable data URIs attached after the prompt, in order.
/// `json_mode` requests a well-formed JSON object response.
pub trait ChatClient {
    fn chat(
        &self,
        prompt: &str,
        images: &[String],
        json_mode: bool,
    ) -> Result<String, LlamaError>;
}

// ──────────────────────────────────────────────
// Wire types (OpenAI-compatible)
// ──────────────────────────────────────────────

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: Vec<ContentPart<'a>>,
}

#[derive(Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentPart<'a> {
    Text { text: &'a str },
    ImageUrl { image_url: ImageUrl<'a> },
}

#[derive(Serialize)]
struct ImageUrl<'a> {
    url: &'a str,
}

#[derive(Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: AssistantMessage,
}

#[derive(Deserialize)]
struct AssistantMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct ModelsResponse {
    data: Vec<ModelEntry>,
}

#[derive(Deserialize)]
struct ModelEntry {
    id: String,
}

// ──────────────────────────────────────────────
// LlamaClient
// ──────────────────────────────────────────────

/// Blocking HTTP client for a llama.cpp server.
pub struct LlamaClient {
    base_url: String,
    model: Option<String>,
    temperature: f32,
    max_tokens: u32,
    timeout_secs: u64,
    client: reqwest::blocking::Client,
}

impl LlamaClient {
    pub fn new(config: LlamaConfig) -> Self {
        let client = reqwest::blocking::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model,
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            timeout_secs: config.timeout_secs,
            client,
        }
    }

    /// Configured model if set, otherwise the first model the server lists.
    fn resolve_model(&self) -> Result<String, LlamaError> {
        if let Some(model) = &self.model {
            return Ok(model.clone());
        }

        let url = format!("{}/models", self.base_url);
        let response = self
            .client
            .get(&url)
            .send()
            .map_err(|e| self.transport_error(e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(LlamaError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: ModelsResponse = response
            .json()
            .map_err(|e| LlamaError::ResponseParsing(e.to_string()))?;

        parsed
            .data
            .into_iter()
            .next()
            .map(|m| m.id)
            .ok_or(LlamaError::NoModelAvailable)
    }

    fn transport_error(&self, e: reqwest::Error) -> LlamaError {
        if e.is_connect() {
            LlamaError::Connection(self.base_url.clone())
        } else if e.is_timeout() {
            LlamaError::Timeout(self.timeout_secs)
        } else {
            LlamaError::Http(e.to_string())
        }
    }
}

impl ChatClient for LlamaClient {
    fn chat(
        &self,
        prompt: &str,
        images: &[String],
        json_mode: bool,
    ) -> Result<String, LlamaError> {
        let model = self.resolve_model()?;

        let mut content = vec![ContentPart::Text { text: prompt }];
        for image in images {
            content.push(ContentPart::ImageUrl {
                image_url: ImageUrl { url: image },
            });
        }

        let body = ChatRequest {
            model: &model,
            messages: vec![ChatMessage {
                role: "user",
                content,
            }],
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            response_format: json_mode.then_some(ResponseFormat {
                kind: "json_object",
            }),
        };

        let start = std::time::Instant::now();
        let url = format!("{}/chat/completions", self.base_url);
        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .map_err(|e| self.transport_error(e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(LlamaError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: ChatResponse = response
            .json()
            .map_err(|e| LlamaError::ResponseParsing(e.to_string()))?;

        let text = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .unwrap_or_default();

        tracing::info!(
            model = %model,
            images = images.len(),
            json_mode,
            elapsed_ms = %start.elapsed().as_millis(),
            response_len = text.len(),
            "Chat completion finished"
        );

        Ok(text)
    }
}

// ──────────────────────────────────────────────
// MockChatClient (testing)
// ──────────────────────────────────────────────

/// One observed `chat` invocation.
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub prompt: String,
    pub image_count: usize,
    pub json_mode: bool,
}

/// Mock chat client for testing: replays scripted responses (the last one
/// repeats once the script runs out) and records every call.
pub struct MockChatClient {
    responses: Mutex<VecDeque<String>>,
    last: String,
    calls: Mutex<Vec<RecordedCall>>,
}

impl MockChatClient {
    pub fn new(response: &str) -> Self {
        Self::with_responses(vec![response.to_string()])
    }

    pub fn with_responses(responses: Vec<String>) -> Self {
        let last = responses.last().cloned().unwrap_or_default();
        Self {
            responses: Mutex::new(responses.into()),
            last,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }
}

impl ChatClient for MockChatClient {
    fn chat(
        &self,
        prompt: &str,
        images: &[String],
        json_mode: bool,
    ) -> Result<String, LlamaError> {
        self.calls.lock().unwrap().push(RecordedCall {
            prompt: prompt.to_string(),
            image_count: images.len(),
            json_mode,
        });
        let next = self.responses.lock().unwrap().pop_front();
        Ok(next.unwrap_or_else(|| self.last.clone()))
    }
}
