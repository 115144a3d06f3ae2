#![doc = include_str!("../README.md")]

mod anthropic;
mod openai;
mod sse;

pub use anthropic::AnthropicBackend;
pub use openai::OpenAiBackend;

use promptloom::{Generate, GenerateError, GeneratedFile};

/// The tool both backends force the model to call.
pub(crate) const FILE_TOOL_NAME: &str = "file_generator";
pub(crate) const FILE_TOOL_DESCRIPTION: &str = "Generate files with path and content";

/// JSON Schema for the `file_generator` tool input: a list of
/// `{path, content}` objects.
pub(crate) fn file_generator_schema() -> serde_json::Value {
    serde_json::json!({
        "type": "object",
        "properties": {
            "files": {
                "type": "array",
                "items": {
                    "type": "object",
                    "properties": {
                        "path": { "type": "string" },
                        "content": { "type": "string" }
                    },
                    "required": ["path", "content"]
                }
            }
        },
        "required": ["files"]
    })
}

/// Maps HTTP status codes to provider errors; passes 200 through.
pub(crate) fn check_status(
    response: reqwest::blocking::Response,
    provider: &str,
) -> Result<reqwest::blocking::Response, GenerateError> {
    let status = response.status().as_u16();
    if status == 401 || status == 403 {
        return Err(GenerateError::Auth(format!("{provider} rejected the API key")));
    }
    if status != 200 {
        let message = response.text().unwrap_or_default();
        log::warn!("{provider} API error (status {status}): {message}");
        return Err(GenerateError::Api { status, message });
    }
    Ok(response)
}

// ── Chat ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatRole {
    System,
    User,
    Assistant,
}

/// One turn of the chat REPL's history.
#[derive(Debug, Clone)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Assistant,
            content: content.into(),
        }
    }
}

// ── Backend selection ────────────────────────────────────────────────

/// A configured generation backend.
pub enum Backend {
    Anthropic(AnthropicBackend),
    OpenAi(OpenAiBackend),
}

impl Backend {
    /// Picks the wire format from the API URL: anything mentioning
    /// `anthropic` speaks the Messages API, everything else is treated as
    /// OpenAI-compatible.
    pub fn for_url(api_url: &str, api_key: &str, model: &str) -> Self {
        if api_url.contains("anthropic") {
            Backend::Anthropic(AnthropicBackend::new(api_url, api_key, model))
        } else {
            Backend::OpenAi(OpenAiBackend::new(api_url, api_key, model))
        }
    }

    /// Streams a chat completion, invoking `on_text` for each text delta.
    /// Returns the full concatenated reply.
    pub fn stream_chat(
        &self,
        messages: &[ChatMessage],
        on_text: &mut dyn FnMut(&str),
    ) -> Result<String, GenerateError> {
        match self {
            Backend::Anthropic(backend) => backend.stream_chat(messages, on_text),
            Backend::OpenAi(backend) => backend.stream_chat(messages, on_text),
        }
    }
}

impl Generate for Backend {
    fn generate(&self, system: &str, prompt: &str) -> Result<Vec<GeneratedFile>, GenerateError> {
        match self {
            Backend::Anthropic(backend) => backend.generate(system, prompt),
            Backend::OpenAi(backend) => backend.generate(system, prompt),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_selection_anthropic() {
        let backend = Backend::for_url("https://api.anthropic.com", "key", "model");
        assert!(matches!(backend, Backend::Anthropic(_)));
    }

    #[test]
    fn test_backend_selection_openai_compatible() {
        let backend = Backend::for_url("https://api.openai.com/v1", "key", "model");
        assert!(matches!(backend, Backend::OpenAi(_)));
        let backend = Backend::for_url("http://localhost:11434/v1", "key", "model");
        assert!(matches!(backend, Backend::OpenAi(_)));
    }

    #[test]
    fn test_chat_message_constructors() {
        assert_eq!(ChatMessage::system("s").role, ChatRole::System);
        assert_eq!(ChatMessage::user("u").role, ChatRole::User);
        assert_eq!(ChatMessage::assistant("a").role, ChatRole::Assistant);
        assert_eq!(ChatMessage::user("hello").content, "hello");
    }

    #[test]
    fn test_file_generator_schema_shape() {
        let schema = file_generator_schema();
        assert_eq!(schema["type"], "object");
        assert_eq!(schema["required"][0], "files");
        let item_props = &schema["properties"]["files"]["items"]["properties"];
        assert!(item_props.get("path").is_some());
        assert!(item_props.get("content").is_some());
    }
}
