//! Anthropic Messages API backend.
//!
//! Speaks the native API: `x-api-key` header authentication, an
//! `anthropic-version` header, the system prompt as a top-level field, and
//! tool use via `tool_use` content blocks. Generation forces the
//! `file_generator` tool so the reply carries a structured file set instead
//! of prose.

use crate::sse::{self, Flow};
use crate::{
    ChatMessage, ChatRole, FILE_TOOL_DESCRIPTION, FILE_TOOL_NAME, check_status,
    file_generator_schema,
};
use promptloom::{Generate, GenerateError, GeneratedFile};
use serde::Deserialize;
use std::time::Duration;

const ANTHROPIC_VERSION: &str = "2023-06-01";
const MAX_TOKENS: u32 = 8192;

pub struct AnthropicBackend {
    base_url: String,
    api_key: String,
    model: String,
    client: reqwest::blocking::Client,
}

impl AnthropicBackend {
    pub fn new(base_url: &str, api_key: &str, model: &str) -> Self {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(300))
            .build()
            .expect("failed to build HTTP client");
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            model: model.to_string(),
            client,
        }
    }

    fn generate_body(&self, system: &str, prompt: &str) -> serde_json::Value {
        serde_json::json!({
            "model": self.model,
            "system": system,
            "messages": [{ "role": "user", "content": prompt }],
            "tools": [{
                "name": FILE_TOOL_NAME,
                "description": FILE_TOOL_DESCRIPTION,
                "input_schema": file_generator_schema(),
            }],
            "tool_choice": { "type": "tool", "name": FILE_TOOL_NAME },
            "max_tokens": MAX_TOKENS,
        })
    }

    fn chat_body(&self, messages: &[ChatMessage]) -> serde_json::Value {
        // System turns become the top-level field; the rest stay in order.
        let system: Vec<&str> = messages
            .iter()
            .filter(|m| m.role == ChatRole::System)
            .map(|m| m.content.as_str())
            .collect();
        let api_messages: Vec<serde_json::Value> = messages
            .iter()
            .filter(|m| m.role != ChatRole::System)
            .map(|m| {
                let role = match m.role {
                    ChatRole::Assistant => "assistant",
                    _ => "user",
                };
                serde_json::json!({ "role": role, "content": m.content })
            })
            .collect();

        let mut body = serde_json::json!({
            "model": self.model,
            "messages": api_messages,
            "max_tokens": MAX_TOKENS,
            "stream": true,
        });
        if !system.is_empty() {
            body["system"] = serde_json::json!(system.join("\n\n"));
        }
        body
    }

    fn post(
        &self,
        body: &serde_json::Value,
        streaming: bool,
    ) -> Result<reqwest::blocking::Response, GenerateError> {
        let url = format!("{}/v1/messages", self.base_url);
        let mut request = self
            .client
            .post(&url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("Content-Type", "application/json");
        if streaming {
            request = request.header("Accept", "text/event-stream");
        }
        let response = request
            .json(body)
            .send()
            .map_err(|e| GenerateError::Network(e.to_string()))?;
        check_status(response, "Anthropic")
    }

    /// Streams a chat completion, handing every text delta to `on_text`.
    pub fn stream_chat(
        &self,
        messages: &[ChatMessage],
        on_text: &mut dyn FnMut(&str),
    ) -> Result<String, GenerateError> {
        log::debug!("streaming from Anthropic (model {})", self.model);
        let response = self.post(&self.chat_body(messages), true)?;

        let mut full = String::new();
        sse::for_each_data(response, |data| match stream_event(data) {
            StreamEvent::Text(text) => {
                on_text(&text);
                full.push_str(&text);
                Flow::Continue
            }
            StreamEvent::Stop => Flow::Break,
            StreamEvent::Ignore => Flow::Continue,
        })
        .map_err(|e| GenerateError::Network(e.to_string()))?;
        Ok(full)
    }
}

impl Generate for AnthropicBackend {
    fn generate(&self, system: &str, prompt: &str) -> Result<Vec<GeneratedFile>, GenerateError> {
        log::debug!("calling Anthropic messages API (model {})", self.model);
        let response = self.post(&self.generate_body(system, prompt), false)?;
        let api: MessagesResponse = response.json().map_err(|e| {
            GenerateError::MalformedResponse(format!("failed to parse Anthropic response: {e}"))
        })?;
        files_from_response(api)
    }
}

// ── Wire types ───────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentBlock {
    Text { text: String },
    ToolUse { name: String, input: serde_json::Value },
    Thinking { thinking: String },
}

fn files_from_response(response: MessagesResponse) -> Result<Vec<GeneratedFile>, GenerateError> {
    for block in response.content {
        match block {
            ContentBlock::ToolUse { name, input } if name == FILE_TOOL_NAME => {
                let files = input.get("files").cloned().ok_or_else(|| {
                    GenerateError::MalformedResponse("tool input has no `files` field".into())
                })?;
                return serde_json::from_value(files).map_err(|e| {
                    GenerateError::MalformedResponse(format!("bad `files` payload: {e}"))
                });
            }
            ContentBlock::ToolUse { name, .. } => {
                log::debug!("ignoring unexpected tool_use block `{name}`");
            }
            ContentBlock::Text { text } => {
                log::debug!("model sent {} chars of prose alongside the tool call", text.len());
            }
            ContentBlock::Thinking { thinking } => {
                log::debug!("model thinking: {} chars", thinking.len());
            }
        }
    }
    Err(GenerateError::MalformedResponse(
        "response contained no file_generator tool use".into(),
    ))
}

enum StreamEvent {
    Text(String),
    Stop,
    Ignore,
}

fn stream_event(data: &str) -> StreamEvent {
    let Ok(event) = serde_json::from_str::<serde_json::Value>(data) else {
        return StreamEvent::Ignore;
    };
    match event["type"].as_str() {
        Some("content_block_delta") => match event["delta"]["text"].as_str() {
            Some(text) => StreamEvent::Text(text.to_string()),
            None => StreamEvent::Ignore,
        },
        Some("message_stop") => StreamEvent::Stop,
        _ => StreamEvent::Ignore,
    }
}
