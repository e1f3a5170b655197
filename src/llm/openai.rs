//! OpenAI chat-completions implementation of the chat model contract.

use super::{ChatModel, ContentBlock, ModelResponse, Role, StopReason, ToolDefinition, Turn};
use crate::error::{PensumError, Result};
use crate::openai::create_client;
use async_openai::types::{
    ChatCompletionMessageToolCall, ChatCompletionRequestAssistantMessageArgs,
    ChatCompletionRequestMessage, ChatCompletionRequestSystemMessageArgs,
    ChatCompletionRequestToolMessageArgs, ChatCompletionRequestUserMessageArgs,
    ChatCompletionTool, ChatCompletionToolChoiceOption, ChatCompletionToolType,
    CreateChatCompletionRequestArgs, FinishReason, FunctionCall, FunctionObject,
};
use async_trait::async_trait;
use tracing::{debug, instrument};

/// Chat model backed by the OpenAI chat completions API.
pub struct OpenAiChatModel {
    client: async_openai::Client<async_openai::config::OpenAIConfig>,
    model: String,
    max_tokens: u32,
    temperature: f32,
}

impl OpenAiChatModel {
    /// Create a chat model with default generation parameters.
    pub fn new(model: &str) -> Self {
        Self::with_config(model, 800, 0.0)
    }

    /// Create a chat model with custom token budget and temperature.
    pub fn with_config(model: &str, max_tokens: u32, temperature: f32) -> Self {
        Self {
            client: create_client(),
            model: model.to_string(),
            max_tokens,
            temperature,
        }
    }

    /// Convert conversation turns into chat-completion messages.
    fn build_messages(
        system: &str,
        turns: &[Turn],
    ) -> Result<Vec<ChatCompletionRequestMessage>> {
        let mut messages: Vec<ChatCompletionRequestMessage> = vec![
            ChatCompletionRequestSystemMessageArgs::default()
                .content(system.to_string())
                .build()
                .map_err(|e| PensumError::Model(e.to_string()))?
                .into(),
        ];

        for turn in turns {
            match turn.role {
                Role::User => {
                    // Tool results map to individual tool-role messages; any
                    // plain text in the turn becomes a user message.
                    let mut texts = Vec::new();
                    for block in &turn.content {
                        match block {
                            ContentBlock::Text { text } => texts.push(text.as_str()),
                            ContentBlock::ToolResult {
                                tool_use_id,
                                content,
                            } => {
                                messages.push(
                                    ChatCompletionRequestToolMessageArgs::default()
                                        .tool_call_id(tool_use_id.clone())
                                        .content(content.clone())
                                        .build()
                                        .map_err(|e| PensumError::Model(e.to_string()))?
                                        .into(),
                                );
                            }
                            ContentBlock::ToolUse { .. } => {}
                        }
                    }
                    if !texts.is_empty() {
                        messages.push(
                            ChatCompletionRequestUserMessageArgs::default()
                                .content(texts.join("\n"))
                                .build()
                                .map_err(|e| PensumError::Model(e.to_string()))?
                                .into(),
                        );
                    }
                }
                Role::Assistant => {
                    let mut texts = Vec::new();
                    let mut tool_calls = Vec::new();
                    for block in &turn.content {
                        match block {
                            ContentBlock::Text { text } => texts.push(text.as_str()),
                            ContentBlock::ToolUse { id, name, input } => {
                                tool_calls.push(ChatCompletionMessageToolCall {
                                    id: id.clone(),
                                    r#type: ChatCompletionToolType::Function,
                                    function: FunctionCall {
                                        name: name.clone(),
                                        arguments: input.to_string(),
                                    },
                                });
                            }
                            ContentBlock::ToolResult { .. } => {}
                        }
                    }

                    let mut builder = ChatCompletionRequestAssistantMessageArgs::default();
                    if !texts.is_empty() {
                        builder.content(texts.join("\n"));
                    }
                    if !tool_calls.is_empty() {
                        builder.tool_calls(tool_calls);
                    }
                    messages.push(
                        builder
                            .build()
                            .map_err(|e| PensumError::Model(e.to_string()))?
                            .into(),
                    );
                }
            }
        }

        Ok(messages)
    }

    fn to_openai_tool(def: &ToolDefinition) -> ChatCompletionTool {
        ChatCompletionTool {
            r#type: ChatCompletionToolType::Function,
            function: FunctionObject {
                name: def.name.clone(),
                description: Some(def.description.clone()),
                parameters: Some(def.input_schema.clone()),
                strict: None,
            },
        }
    }
}

#[async_trait]
impl ChatModel for OpenAiChatModel {
    #[instrument(skip_all, fields(turns = turns.len(), with_tools = tools.is_some()))]
    async fn generate(
        &self,
        system: &str,
        turns: &[Turn],
        tools: Option<&[ToolDefinition]>,
    ) -> Result<ModelResponse> {
        let messages = Self::build_messages(system, turns)?;

        let mut request = CreateChatCompletionRequestArgs::default();
        request
            .model(&self.model)
            .messages(messages)
            .max_tokens(self.max_tokens)
            .temperature(self.temperature);

        if let Some(defs) = tools {
            request.tools(defs.iter().map(Self::to_openai_tool).collect::<Vec<_>>());
            request.tool_choice(ChatCompletionToolChoiceOption::Auto);
        }

        let request = request
            .build()
            .map_err(|e| PensumError::Model(e.to_string()))?;

        let response = self
            .client
            .chat()
            .create(request)
            .await
            .map_err(|e| PensumError::Model(format!("Chat API error: {}", e)))?;

        let choice = response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| PensumError::Model("No response from model".to_string()))?;

        let mut content = Vec::new();
        if let Some(text) = choice.message.content {
            if !text.is_empty() {
                content.push(ContentBlock::Text { text });
            }
        }

        let mut requested_tools = false;
        for call in choice.message.tool_calls.unwrap_or_default() {
            requested_tools = true;
            // Malformed argument JSON degrades to a null input; the tool
            // reports the missing parameters back to the model.
            let input =
                serde_json::from_str(&call.function.arguments).unwrap_or(serde_json::Value::Null);
            content.push(ContentBlock::ToolUse {
                id: call.id,
                name: call.function.name,
                input,
            });
        }

        let stop_reason = if requested_tools
            || choice.finish_reason == Some(FinishReason::ToolCalls)
        {
            StopReason::ToolUse
        } else {
            StopReason::EndTurn
        };

        debug!(?stop_reason, blocks = content.len(), "model response");

        Ok(ModelResponse {
            stop_reason,
            content,
        })
    }
}
