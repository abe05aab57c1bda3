use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

use super::{FinishReason, LLMClient, LLMError, LLMInput, LLMOutput, Usage};
use crate::session::{MessageContent, MessageRole, content_text};

/// OpenAI API response for chat completions.
#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
    #[serde(default)]
    usage: UsageInfo,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: MessageResponse,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MessageResponse {
    content: Option<String>,
    tool_calls: Option<Vec<ToolCall>>,
}

#[derive(Debug, Deserialize)]
struct ToolCall {
    #[serde(default)]
    id: String,
    function: FunctionCall,
}

#[derive(Debug, Deserialize)]
struct FunctionCall {
    #[serde(default)]
    name: String,
    #[serde(default)]
    arguments: String,
}

#[derive(Debug, Default, Deserialize)]
struct UsageInfo {
    #[serde(default)]
    prompt_tokens: u32,
    #[serde(default)]
    completion_tokens: u32,
}

#[derive(Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

/// An LLM client for OpenAI's chat-completions API.
#[derive(Debug, Clone)]
pub struct OpenAIClient {
    client: Client,
    base_url: String,
}

impl OpenAIClient {
    /// Default API root.
    pub const DEFAULT_BASE_URL: &'static str = "https://api.openai.com/v1";

    /// Creates a new OpenAI client.
    pub fn new(
        api_key: String,
        base_url: Option<String>,
        timeout: Option<Duration>,
    ) -> Result<Self, LLMError> {
        let mut headers = reqwest::header::HeaderMap::new();
        let auth = reqwest::header::HeaderValue::from_str(&format!("Bearer {}", api_key))
            .map_err(|_| LLMError::AuthError("API key is not a valid header value".to_string()))?;
        headers.insert(reqwest::header::AUTHORIZATION, auth);
        headers.insert(
            reqwest::header::CONTENT_TYPE,
            reqwest::header::HeaderValue::from_static("application/json"),
        );

        let mut client_builder = reqwest::Client::builder().default_headers(headers);

        if let Some(timeout) = timeout {
            client_builder = client_builder.timeout(timeout);
        }

        let client = client_builder.build()?;

        Ok(Self {
            client,
            base_url: base_url
                .map(|url| url.trim_end_matches('/').to_string())
                .unwrap_or_else(|| Self::DEFAULT_BASE_URL.to_string()),
        })
    }

    /// Creates a request builder for chat completions.
    fn chat_completions_request(&self, input: &LLMInput) -> RequestBuilder {
        let tools: Vec<Value> = input.tools.iter().map(|t| t.to_function_spec()).collect();

        let body = ChatRequest {
            model: input.model.clone(),
            messages: Self::build_messages(input),
            tools: if tools.is_empty() { None } else { Some(tools) },
            max_tokens: input.max_tokens,
            temperature: input.temperature,
        };

        debug!(model = %input.model, tools = input.tools.len(), "Sending request to OpenAI");

        self.client
            .post(format!("{}/chat/completions", self.base_url))
            .json(&body)
    }

    /// Builds messages for the API request.
    fn build_messages(input: &LLMInput) -> Vec<Value> {
        let mut messages = Vec::new();

        for msg in &input.messages {
            match msg.role {
                MessageRole::System => {
                    messages.push(serde_json::json!({
                        "role": "system",
                        "content": content_text(&msg.content)
                    }));
                }
                MessageRole::User => {
                    messages.push(serde_json::json!({
                        "role": "user",
                        "content": content_text(&msg.content)
                    }));
                }
                MessageRole::Assistant => {
                    let tool_calls = msg
                        .content
                        .iter()
                        .filter_map(|c| {
                            if let MessageContent::ToolCall { id, name, arguments } = c {
                                Some(serde_json::json!({
                                    "id": id,
                                    "type": "function",
                                    "function": {
                                        "name": name,
                                        "arguments": arguments.to_string()
                                    }
                                }))
                            } else {
                                None
                            }
                        })
                        .collect::<Vec<_>>();

                    let text = content_text(&msg.content);
                    if !tool_calls.is_empty() {
                        let content = if text.is_empty() { Value::Null } else { Value::String(text) };
                        messages.push(serde_json::json!({
                            "role": "assistant",
                            "content": content,
                            "tool_calls": tool_calls
                        }));
                    } else {
                        messages.push(serde_json::json!({
                            "role": "assistant",
                            "content": text
                        }));
                    }
                }
                MessageRole::Tool => {
                    for content in &msg.content {
                        if let MessageContent::ToolResult {
                            tool_call_id,
                            result,
                            is_error: _,
                        } = content
                        {
                            messages.push(serde_json::json!({
                                "role": "tool",
                                "tool_call_id": tool_call_id,
                                "content": result
                            }));
                        }
                    }
                }
            }
        }

        messages
    }

    /// Converts the first choice of a response body into an [`LLMOutput`].
    fn parse_response(response_text: &str) -> Result<LLMOutput, LLMError> {
        let response: ChatCompletionResponse = serde_json::from_str(response_text)
            .map_err(|e| LLMError::InvalidResponse(format!("{}: {}", e, response_text)))?;

        let choice = response.choices.into_iter().next().ok_or_else(|| {
            LLMError::InvalidResponse(format!("No choices in response. Response: {}", response_text))
        })?;

        let mut content = Vec::new();

        for tool_call in choice.message.tool_calls.unwrap_or_default() {
            // Unparsable arguments are kept verbatim and rejected at binding time.
            let arguments: Value = if tool_call.function.arguments.trim().is_empty() {
                serde_json::json!({})
            } else {
                serde_json::from_str(&tool_call.function.arguments)
                    .unwrap_or(Value::String(tool_call.function.arguments))
            };

            content.push(MessageContent::ToolCall {
                id: tool_call.id,
                name: tool_call.function.name,
                arguments,
            });
        }

        if let Some(text) = choice.message.content {
            if !text.is_empty() {
                content.push(MessageContent::Text { text });
            }
        }

        Ok(LLMOutput {
            content,
            finish_reason: FinishReason::from_api(choice.finish_reason.as_deref()),
            usage: Usage {
                input_tokens: response.usage.prompt_tokens,
                output_tokens: response.usage.completion_tokens,
            },
        })
    }
}

#[async_trait]
impl LLMClient for OpenAIClient {
    async fn complete(&self, input: LLMInput) -> Result<LLMOutput, LLMError> {
        let response = self.chat_completions_request(&input).send().await?;
        let status = response.status();
        let response_text = response
            .text()
            .await
            .map_err(|e| LLMError::InvalidResponse(e.to_string()))?;

        debug!(%status, "LLM response: {}", response_text);

        match status {
            s if s.is_success() => Self::parse_response(&response_text),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(LLMError::AuthError(response_text)),
            StatusCode::TOO_MANY_REQUESTS => Err(LLMError::RateLimitError(response_text)),
            s => Err(LLMError::ApiError(format!("{}: {}", s, response_text))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::Message;
    use crate::tool::ToolDescriptor;
    use serde_json::json;

    #[test]
    fn parses_tool_call_response() {
        let body = json!({
            "choices": [{
                "message": {
                    "role": "assistant",
                    "content": null,
                    "tool_calls": [
                        { "id": "call_1", "type": "function",
                          "function": { "name": "multiplyNumbers", "arguments": "{\"num1\":5,\"num2\":3}" } },
                        { "id": "call_2", "type": "function",
                          "function": { "name": "other", "arguments": "" } }
                    ]
                },
                "finish_reason": "tool_calls"
            }],
            "usage": { "prompt_tokens": 12, "completion_tokens": 7 }
        });

        let output = OpenAIClient::parse_response(&body.to_string()).unwrap();
        assert_eq!(output.finish_reason, FinishReason::ToolCalls);
        assert_eq!(output.usage.input_tokens, 12);
        assert_eq!(
            output.content[0],
            MessageContent::ToolCall {
                id: "call_1".to_string(),
                name: "multiplyNumbers".to_string(),
                arguments: json!({ "num1": 5, "num2": 3 }),
            }
        );
        assert!(matches!(&output.content[1], MessageContent::ToolCall { arguments, .. } if *arguments == json!({})));
    }

    #[test]
    fn keeps_unparsable_arguments_verbatim() {
        let body = json!({
            "choices": [{
                "message": { "tool_calls": [
                    { "id": "c", "function": { "name": "f", "arguments": "{broken" } }
                ] },
                "finish_reason": "tool_calls"
            }]
        });
        let output = OpenAIClient::parse_response(&body.to_string()).unwrap();
        assert!(matches!(&output.content[0], MessageContent::ToolCall { arguments, .. } if *arguments == json!("{broken")));
    }

    #[test]
    fn empty_choices_is_invalid() {
        let err = OpenAIClient::parse_response(r#"{"choices": []}"#).unwrap_err();
        assert!(matches!(err, LLMError::InvalidResponse(_)));
    }

    #[test]
    fn transcript_round_trips_tool_call_ids() {
        let input = LLMInput {
            model: "gpt-4o".to_string(),
            messages: vec![
                Message::new_system("You are a helpful assistant."),
                Message::new_user("What is 5 times 3?"),
                Message::new_assistant(vec![MessageContent::ToolCall {
                    id: "call_1".to_string(),
                    name: "multiplyNumbers".to_string(),
                    arguments: json!({ "num1": 5, "num2": 3 }),
                }]),
                Message::new_tool_result(vec![MessageContent::ToolResult {
                    tool_call_id: "call_1".to_string(),
                    result: r#"{"result":{"result":15}}"#.to_string(),
                    is_error: None,
                }]),
            ],
            tools: Vec::new(),
            max_tokens: None,
            temperature: None,
        };

        let messages = OpenAIClient::build_messages(&input);
        let roles: Vec<_> = messages.iter().map(|m| m["role"].as_str().unwrap()).collect();
        assert_eq!(roles, ["system", "user", "assistant", "tool"]);
        assert_eq!(messages[2]["content"], Value::Null);
        assert_eq!(messages[2]["tool_calls"][0]["id"], "call_1");
        assert_eq!(messages[2]["tool_calls"][0]["function"]["arguments"], r#"{"num1":5,"num2":3}"#);
        assert_eq!(messages[3]["tool_call_id"], "call_1");
    }

    #[test]
    fn catalog_uses_function_format() {
        let descriptor = ToolDescriptor::new(
            "multiplyNumbers",
            "Multiplies two numbers.",
            json!({ "type": "object", "properties": {}, "required": [] }),
        )
        .unwrap();
        let spec = descriptor.to_function_spec();
        assert_eq!(spec["type"], "function");
        assert_eq!(spec["function"]["name"], "multiplyNumbers");
        assert_eq!(spec["function"]["parameters"]["type"], "object");
    }
}
