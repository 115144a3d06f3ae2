//! OpenAI-compatible chat-completions backend.
//!
//! Covers the OpenAI API proper and the many local/proxy servers that speak
//! the same wire format. Generation forces a `file_generator` function tool;
//! the file set comes back as the tool call's JSON-string arguments.

use crate::sse::{self, Flow};
use crate::{
    ChatMessage, ChatRole, FILE_TOOL_DESCRIPTION, FILE_TOOL_NAME, check_status,
    file_generator_schema,
};
use promptloom::{Generate, GenerateError, GeneratedFile};
use serde::Deserialize;
use std::time::Duration;

const MAX_TOKENS: u32 = 8192;

pub struct OpenAiBackend {
    base_url: String,
    api_key: String,
    model: String,
    client: reqwest::blocking::Client,
}

impl OpenAiBackend {
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
            "messages": [
                { "role": "system", "content": system },
                { "role": "user", "content": prompt }
            ],
            "tools": [{
                "type": "function",
                "function": {
                    "name": FILE_TOOL_NAME,
                    "description": FILE_TOOL_DESCRIPTION,
                    "parameters": file_generator_schema(),
                }
            }],
            "tool_choice": { "type": "function", "function": { "name": FILE_TOOL_NAME } },
            "max_tokens": MAX_TOKENS,
        })
    }

    fn chat_body(&self, messages: &[ChatMessage]) -> serde_json::Value {
        let api_messages: Vec<serde_json::Value> = messages
            .iter()
            .map(|m| {
                let role = match m.role {
                    ChatRole::System => "system",
                    ChatRole::User => "user",
                    ChatRole::Assistant => "assistant",
                };
                serde_json::json!({ "role": role, "content": m.content })
            })
            .collect();
        serde_json::json!({
            "model": self.model,
            "messages": api_messages,
            "max_tokens": MAX_TOKENS,
            "stream": true,
        })
    }

    fn post(&self, body: &serde_json::Value) -> Result<reqwest::blocking::Response, GenerateError> {
        let url = format!("{}/chat/completions", self.base_url);
        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(body)
            .send()
            .map_err(|e| GenerateError::Network(e.to_string()))?;
        check_status(response, "OpenAI-compatible")
    }

    /// Streams a chat completion, handing every content delta to `on_text`.
    pub fn stream_chat(
        &self,
        messages: &[ChatMessage],
        on_text: &mut dyn FnMut(&str),
    ) -> Result<String, GenerateError> {
        log::debug!("streaming from OpenAI-compatible API (model {})", self.model);
        let response = self.post(&self.chat_body(messages))?;

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

impl Generate for OpenAiBackend {
    fn generate(&self, system: &str, prompt: &str) -> Result<Vec<GeneratedFile>, GenerateError> {
        log::debug!("calling OpenAI-compatible API (model {})", self.model);
        let response = self.post(&self.generate_body(system, prompt))?;
        let api: ChatResponse = response.json().map_err(|e| {
            GenerateError::MalformedResponse(format!("failed to parse response: {e}"))
        })?;
        files_from_response(api)
    }
}

// ── Wire types ───────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    tool_calls: Vec<ToolCall>,
}

#[derive(Debug, Deserialize)]
struct ToolCall {
    function: FunctionCall,
}

#[derive(Debug, Deserialize)]
struct FunctionCall {
    name: String,
    /// The tool arguments arrive as a JSON-encoded string, not an object.
    arguments: String,
}

fn files_from_response(response: ChatResponse) -> Result<Vec<GeneratedFile>, GenerateError> {
    let choice = response
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| GenerateError::MalformedResponse("response has no choices".into()))?;
    let call = choice
        .message
        .tool_calls
        .into_iter()
        .find(|c| c.function.name == FILE_TOOL_NAME)
        .ok_or_else(|| {
            GenerateError::MalformedResponse("response contained no file_generator call".into())
        })?;
    let arguments: serde_json::Value = serde_json::from_str(&call.function.arguments)
        .map_err(|e| GenerateError::MalformedResponse(format!("bad tool arguments: {e}")))?;
    let files = arguments.get("files").cloned().ok_or_else(|| {
        GenerateError::MalformedResponse("tool arguments have no `files` field".into())
    })?;
    serde_json::from_value(files)
        .map_err(|e| GenerateError::MalformedResponse(format!("bad `files` payload: {e}")))
}

enum StreamEvent {
    Text(String),
    Stop,
    Ignore,
}

fn stream_event(data: &str) -> StreamEvent {
    if data == "[DONE]" {
        return StreamEvent::Stop;
    }
    let Ok(event) = serde_json::from_str::<serde_json::Value>(data) else {
        return StreamEvent::Ignore;
    };
    match event["choices"][0]["delta"]["content"].as_str() {
        Some(text) if !text.is_empty() => StreamEvent::Text(text.to_string()),
        _ => StreamEvent::Ignore,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_body_shape() {
        let backend = OpenAiBackend::new("https://api.openai.com/v1", "sk-test", "gpt-x");
        let body = backend.generate_body("SYS", "PROMPT");
        assert_eq!(body["model"], "gpt-x");
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][0]["content"], "SYS");
        assert_eq!(body["messages"][1]["role"], "user");
        assert_eq!(body["tools"][0]["type"], "function");
        assert_eq!(body["tools"][0]["function"]["name"], FILE_TOOL_NAME);
        assert_eq!(body["tool_choice"]["function"]["name"], FILE_TOOL_NAME);
    }

    #[test]
    fn test_chat_body_keeps_system_in_messages() {
        let backend = OpenAiBackend::new("https://api.openai.com/v1", "k", "m");
        let body = backend.chat_body(&[ChatMessage::system("s"), ChatMessage::user("u")]);
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][1]["role"], "user");
        assert_eq!(body["stream"], true);
    }

    #[test]
    fn test_files_extracted_from_tool_call() {
        let response: ChatResponse = serde_json::from_str(
            r#"{
                "choices": [{
                    "message": {
                        "role": "assistant",
                        "tool_calls": [{
                            "id": "call_1",
                            "type": "function",
                            "function": {
                                "name": "file_generator",
                                "arguments": "{\"files\":[{\"path\":\"a.txt\",\"content\":\"hi\"}]}"
                            }
                        }]
                    }
                }]
            }"#,
        )
        .unwrap();
        let files = files_from_response(response).unwrap();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].path, "a.txt");
        assert_eq!(files[0].content, "hi");
    }

    #[test]
    fn test_no_tool_call_is_malformed() {
        let response: ChatResponse =
            serde_json::from_str(r#"{"choices": [{"message": {"role": "assistant"}}]}"#).unwrap();
        assert!(matches!(
            files_from_response(response),
            Err(GenerateError::MalformedResponse(_))
        ));
    }

    #[test]
    fn test_no_choices_is_malformed() {
        let response: ChatResponse = serde_json::from_str(r#"{"choices": []}"#).unwrap();
        assert!(matches!(
            files_from_response(response),
            Err(GenerateError::MalformedResponse(_))
        ));
    }

    #[test]
    fn test_unparseable_arguments_is_malformed() {
        let response: ChatResponse = serde_json::from_str(
            r#"{
                "choices": [{
                    "message": {
                        "tool_calls": [{
                            "function": { "name": "file_generator", "arguments": "not json" }
                        }]
                    }
                }]
            }"#,
        )
        .unwrap();
        assert!(matches!(
            files_from_response(response),
            Err(GenerateError::MalformedResponse(_))
        ));
    }

    #[test]
    fn test_stream_event_delta_content() {
        let data = r#"{"choices":[{"delta":{"content":"chunk"}}]}"#;
        assert!(matches!(stream_event(data), StreamEvent::Text(t) if t == "chunk"));
    }

    #[test]
    fn test_stream_event_done_marker() {
        assert!(matches!(stream_event("[DONE]"), StreamEvent::Stop));
    }

    #[test]
    fn test_stream_event_empty_delta_ignored() {
        let data = r#"{"choices":[{"delta":{}}]}"#;
        assert!(matches!(stream_event(data), StreamEvent::Ignore));
    }
}
