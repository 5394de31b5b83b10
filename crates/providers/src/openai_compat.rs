//! OpenAI-compatible provider implementation.
//!
//! Works with: OpenAI, OpenRouter, Ollama, vLLM, Together AI, Fireworks AI,
//! and any endpoint exposing the OpenAI `/v1/chat/completions` and
//! `/v1/embeddings` routes.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use threadloom_core::error::ProviderError;
use threadloom_core::message::{ContentPart, InputMessage, MessageContent, Role};
use threadloom_core::provider::{
    EmbeddingRequest, EmbeddingResponse, Provider, ProviderRequest, ProviderResponse, Usage,
};

/// An OpenAI-compatible LLM provider.
///
/// This handles the vast majority of hosted and local LLM endpoints since
/// most expose an OpenAI-compatible API surface.
pub struct OpenAiCompatProvider {
    name: String,
    base_url: String,
    api_key: String,
    client: reqwest::Client,
}

impl OpenAiCompatProvider {
    /// Create a new OpenAI-compatible provider.
    pub fn new(
        name: impl Into<String>,
        base_url: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(120))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            name: name.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            client,
        }
    }

    /// Create an OpenAI provider (convenience constructor).
    pub fn openai(api_key: impl Into<String>) -> Self {
        Self::new("openai", "https://api.openai.com/v1", api_key)
    }

    /// Create an OpenRouter provider (convenience constructor).
    pub fn openrouter(api_key: impl Into<String>) -> Self {
        Self::new("openrouter", "https://openrouter.ai/api/v1", api_key)
    }

    /// Create an Ollama provider (convenience constructor).
    pub fn ollama(base_url: Option<&str>) -> Self {
        Self::new(
            "ollama",
            base_url.unwrap_or("http://localhost:11434/v1"),
            "ollama", // Ollama doesn't need a real key
        )
    }

    /// Convert our message types to the OpenAI wire format.
    ///
    /// Tool calls and tool results travel as content parts in our model but
    /// as dedicated fields on the wire, so the conversion splits them out.
    fn to_api_messages(messages: &[InputMessage]) -> Vec<ApiMessage> {
        messages
            .iter()
            .map(|m| {
                let role = match m.role {
                    Role::User => "user",
                    Role::Assistant => "assistant",
                    Role::System => "system",
                    Role::Tool => "tool",
                };

                let tool_calls: Vec<ApiToolCall> = m
                    .content
                    .parts()
                    .iter()
                    .filter_map(|part| match part {
                        ContentPart::ToolCall {
                            tool_call_id,
                            tool_name,
                            arguments,
                        } => Some(ApiToolCall {
                            id: tool_call_id.clone(),
                            r#type: "function".into(),
                            function: ApiFunction {
                                name: tool_name.clone(),
                                arguments: arguments.to_string(),
                            },
                        }),
                        _ => None,
                    })
                    .collect();

                let tool_result = m.content.parts().iter().find_map(|part| match part {
                    ContentPart::ToolResult {
                        tool_call_id,
                        output,
                        ..
                    } => Some((tool_call_id.clone(), render_output(output))),
                    _ => None,
                });

                let content = match &tool_result {
                    Some((_, output)) => Some(output.clone()),
                    None => m.content.text(),
                };

                ApiMessage {
                    role: role.into(),
                    content,
                    tool_calls: if tool_calls.is_empty() {
                        None
                    } else {
                        Some(tool_calls)
                    },
                    tool_call_id: tool_result.map(|(id, _)| id),
                }
            })
            .collect()
    }

    /// Convert a wire response message back into our content model.
    fn from_api_message(message: ApiMessage) -> InputMessage {
        let content = match message.tool_calls {
            Some(calls) if !calls.is_empty() => {
                let mut parts = Vec::new();
                if let Some(text) = message.content.filter(|c| !c.is_empty()) {
                    parts.push(ContentPart::Text { text });
                }
                for call in calls {
                    let arguments = serde_json::from_str(&call.function.arguments)
                        .unwrap_or_else(|_| serde_json::Value::String(call.function.arguments));
                    parts.push(ContentPart::ToolCall {
                        tool_call_id: call.id,
                        tool_name: call.function.name,
                        arguments,
                    });
                }
                MessageContent::Parts(parts)
            }
            _ => MessageContent::Text(message.content.unwrap_or_default()),
        };

        InputMessage {
            role: Role::Assistant,
            content,
        }
    }
}

/// Render a tool output value as wire content: strings pass through, anything
/// else is serialized.
fn render_output(output: &serde_json::Value) -> String {
    match output {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[async_trait]
impl Provider for OpenAiCompatProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn complete(
        &self,
        request: ProviderRequest,
    ) -> std::result::Result<ProviderResponse, ProviderError> {
        let url = format!("{}/chat/completions", self.base_url);

        let mut body = serde_json::json!({
            "model": request.model,
            "messages": Self::to_api_messages(&request.messages),
            "temperature": request.temperature,
            "stream": false,
        });

        if let Some(max_tokens) = request.max_tokens {
            body["max_tokens"] = serde_json::json!(max_tokens);
        }

        if !request.stop.is_empty() {
            body["stop"] = serde_json::json!(request.stop);
        }

        debug!(provider = %self.name, model = %request.model, "Sending completion request");

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| ProviderError::Network(e.to_string()))?;

        let status = response.status().as_u16();

        if status == 429 {
            return Err(ProviderError::RateLimited {
                retry_after_secs: 5,
            });
        }

        if status == 401 || status == 403 {
            return Err(ProviderError::AuthenticationFailed(
                "Invalid API key or insufficient permissions".into(),
            ));
        }

        if status == 404 {
            return Err(ProviderError::ModelNotFound(request.model));
        }

        if status != 200 {
            let error_body = response.text().await.unwrap_or_default();
            warn!(status, body = %error_body, "Provider returned error");
            return Err(ProviderError::ApiError {
                status_code: status,
                message: error_body,
            });
        }

        let api_response: ApiResponse =
            response.json().await.map_err(|e| ProviderError::ApiError {
                status_code: 200,
                message: format!("Failed to parse response: {e}"),
            })?;

        let choice =
            api_response
                .choices
                .into_iter()
                .next()
                .ok_or_else(|| ProviderError::ApiError {
                    status_code: 200,
                    message: "No choices in response".into(),
                })?;

        let usage = api_response.usage.map(|u| Usage {
            prompt_tokens: u.prompt_tokens,
            completion_tokens: u.completion_tokens,
            total_tokens: u.total_tokens,
        });

        Ok(ProviderResponse {
            message: Self::from_api_message(choice.message),
            usage,
            model: api_response.model,
        })
    }

    async fn embed(
        &self,
        request: EmbeddingRequest,
    ) -> std::result::Result<EmbeddingResponse, ProviderError> {
        let url = format!("{}/embeddings", self.base_url);

        let body = serde_json::json!({
            "model": request.model,
            "input": request.inputs,
            "encoding_format": "float",
        });

        debug!(
            provider = %self.name,
            model = %request.model,
            count = request.inputs.len(),
            "Sending embedding request"
        );

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| ProviderError::Network(e.to_string()))?;

        let status = response.status().as_u16();

        if status == 429 {
            return Err(ProviderError::RateLimited {
                retry_after_secs: 5,
            });
        }
        if status == 401 || status == 403 {
            return Err(ProviderError::AuthenticationFailed(
                "Invalid API key".into(),
            ));
        }
        if status != 200 {
            let error_body = response.text().await.unwrap_or_default();
            return Err(ProviderError::ApiError {
                status_code: status,
                message: error_body,
            });
        }

        let api_resp: EmbeddingApiResponse =
            response.json().await.map_err(|e| ProviderError::ApiError {
                status_code: 200,
                message: format!("Failed to parse embedding response: {e}"),
            })?;

        let embeddings = api_resp.data.into_iter().map(|d| d.embedding).collect();

        let usage = api_resp.usage.map(|u| Usage {
            prompt_tokens: u.prompt_tokens,
            completion_tokens: 0,
            total_tokens: u.total_tokens,
        });

        Ok(EmbeddingResponse {
            embeddings,
            model: api_resp.model,
            usage,
        })
    }

    async fn health_check(&self) -> std::result::Result<bool, ProviderError> {
        let url = format!("{}/models", self.base_url);
        let response = self
            .client
            .get(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .send()
            .await
            .map_err(|e| ProviderError::Network(e.to_string()))?;

        Ok(response.status().is_success())
    }
}

// --- OpenAI API types (internal) ---

#[derive(Debug, Serialize, Deserialize)]
struct ApiMessage {
    role: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_calls: Option<Vec<ApiToolCall>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiToolCall {
    id: String,
    r#type: String,
    function: ApiFunction,
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiFunction {
    name: String,
    arguments: String,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    model: String,
    choices: Vec<ApiChoice>,
    usage: Option<ApiUsage>,
}

#[derive(Debug, Deserialize)]
struct ApiChoice {
    message: ApiMessage,
}

#[derive(Debug, Deserialize)]
struct ApiUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
    total_tokens: u32,
}

// --- Embedding API types ---

#[derive(Debug, Deserialize)]
struct EmbeddingApiResponse {
    data: Vec<EmbeddingData>,
    model: String,
    usage: Option<EmbeddingApiUsage>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingApiUsage {
    prompt_tokens: u32,
    total_tokens: u32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn openrouter_constructor() {
        let provider = OpenAiCompatProvider::openrouter("sk-test");
        assert_eq!(provider.name(), "openrouter");
        assert!(provider.base_url.contains("openrouter.ai"));
    }

    #[test]
    fn ollama_constructor() {
        let provider = OpenAiCompatProvider::ollama(None);
        assert_eq!(provider.name(), "ollama");
        assert!(provider.base_url.contains("localhost:11434"));
    }

    #[test]
    fn trailing_slash_is_stripped_from_base_url() {
        let provider = OpenAiCompatProvider::new("test", "https://example.com/v1/", "key");
        assert_eq!(provider.base_url, "https://example.com/v1");
    }

    #[test]
    fn message_conversion() {
        let messages = vec![
            InputMessage::system("You are helpful"),
            InputMessage::user("Hello"),
        ];
        let api_messages = OpenAiCompatProvider::to_api_messages(&messages);
        assert_eq!(api_messages.len(), 2);
        assert_eq!(api_messages[0].role, "system");
        assert_eq!(api_messages[1].role, "user");
        assert_eq!(api_messages[1].content.as_deref(), Some("Hello"));
    }

    #[test]
    fn tool_call_parts_become_wire_tool_calls() {
        let message = InputMessage {
            role: Role::Assistant,
            content: vec![
                ContentPart::Text {
                    text: "checking".into(),
                },
                ContentPart::ToolCall {
                    tool_call_id: "call_1".into(),
                    tool_name: "shell".into(),
                    arguments: json!({"command": "ls"}),
                },
            ]
            .into(),
        };

        let api_messages = OpenAiCompatProvider::to_api_messages(&[message]);
        let tool_calls = api_messages[0].tool_calls.as_ref().unwrap();
        assert_eq!(tool_calls.len(), 1);
        assert_eq!(tool_calls[0].function.name, "shell");
        assert!(tool_calls[0].function.arguments.contains("\"command\""));
        assert_eq!(api_messages[0].content.as_deref(), Some("checking"));
    }

    #[test]
    fn tool_result_parts_become_tool_role_payloads() {
        let message = InputMessage {
            role: Role::Tool,
            content: vec![ContentPart::ToolResult {
                tool_call_id: "call_1".into(),
                tool_name: "shell".into(),
                output: json!("file_a\nfile_b"),
            }]
            .into(),
        };

        let api_messages = OpenAiCompatProvider::to_api_messages(&[message]);
        assert_eq!(api_messages[0].role, "tool");
        assert_eq!(api_messages[0].tool_call_id.as_deref(), Some("call_1"));
        assert_eq!(api_messages[0].content.as_deref(), Some("file_a\nfile_b"));
    }

    #[test]
    fn structured_tool_output_is_serialized() {
        assert_eq!(render_output(&json!({"answer": 4})), r#"{"answer":4}"#);
        assert_eq!(render_output(&json!("plain")), "plain");
    }

    #[test]
    fn plain_response_becomes_text_content() {
        let api = ApiMessage {
            role: "assistant".into(),
            content: Some("The answer is 4".into()),
            tool_calls: None,
            tool_call_id: None,
        };
        let message = OpenAiCompatProvider::from_api_message(api);
        assert_eq!(message.role, Role::Assistant);
        assert_eq!(message.text().as_deref(), Some("The answer is 4"));
    }

    #[test]
    fn tool_call_response_becomes_parts_content() {
        let api = ApiMessage {
            role: "assistant".into(),
            content: None,
            tool_calls: Some(vec![ApiToolCall {
                id: "call_9".into(),
                r#type: "function".into(),
                function: ApiFunction {
                    name: "search".into(),
                    arguments: r#"{"text": "rust"}"#.into(),
                },
            }]),
            tool_call_id: None,
        };

        let message = OpenAiCompatProvider::from_api_message(api);
        let ids: Vec<_> = message.content.tool_call_ids().collect();
        assert_eq!(ids, ["call_9"]);
        match &message.content.parts()[0] {
            ContentPart::ToolCall { arguments, .. } => {
                assert_eq!(arguments["text"], json!("rust"));
            }
            other => panic!("expected a tool call part, got {other:?}"),
        }
    }

    #[test]
    fn malformed_tool_arguments_survive_as_raw_strings() {
        let api = ApiMessage {
            role: "assistant".into(),
            content: None,
            tool_calls: Some(vec![ApiToolCall {
                id: "call_1".into(),
                r#type: "function".into(),
                function: ApiFunction {
                    name: "search".into(),
                    arguments: "{not json".into(),
                },
            }]),
            tool_call_id: None,
        };

        let message = OpenAiCompatProvider::from_api_message(api);
        match &message.content.parts()[0] {
            ContentPart::ToolCall { arguments, .. } => {
                assert_eq!(arguments, &json!("{not json"));
            }
            other => panic!("expected a tool call part, got {other:?}"),
        }
    }

    #[test]
    fn parse_completion_response() {
        let data = r#"{
            "model": "gpt-4o-mini",
            "choices": [
                {"message": {"role": "assistant", "content": "Hello there"}}
            ],
            "usage": {"prompt_tokens": 12, "completion_tokens": 3, "total_tokens": 15}
        }"#;
        let parsed: ApiResponse = serde_json::from_str(data).unwrap();
        assert_eq!(parsed.model, "gpt-4o-mini");
        assert_eq!(parsed.choices.len(), 1);
        assert_eq!(parsed.usage.unwrap().total_tokens, 15);
    }

    #[test]
    fn parse_embedding_response() {
        let data = r#"{
            "data": [
                {"embedding": [0.1, 0.2, 0.3], "index": 0},
                {"embedding": [0.4, 0.5, 0.6], "index": 1}
            ],
            "model": "text-embedding-3-small",
            "usage": {"prompt_tokens": 8, "total_tokens": 8}
        }"#;
        let parsed: EmbeddingApiResponse = serde_json::from_str(data).unwrap();
        assert_eq!(parsed.data.len(), 2);
        assert_eq!(parsed.data[0].embedding, vec![0.1, 0.2, 0.3]);
        assert_eq!(parsed.model, "text-embedding-3-small");
        assert_eq!(parsed.usage.unwrap().prompt_tokens, 8);
    }
}
