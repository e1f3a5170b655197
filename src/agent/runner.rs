//! Bounded tool-calling loop.
//!
//! One round = the model requesting tools, every requested tool executing
//! in emission order, and the results joining the conversation. The loop is
//! bounded: after the last permitted round the model is called once more
//! without tool definitions, forcing a plain-text answer.

use super::registry::ToolRegistry;
use crate::error::Result;
use crate::llm::{ChatModel, ContentBlock, ModelResponse, StopReason, Turn};
use std::sync::Arc;
use tracing::{debug, info, instrument};

/// Default maximum number of tool-call rounds per query.
pub const DEFAULT_MAX_ROUNDS: usize = 2;

/// System prompt for course question answering.
const SYSTEM_PROMPT: &str = "\
You are an assistant for course materials and educational content, with \
tools for looking up course information.

Tools:
- get_course_outline: course structure queries (syllabus, lesson lists, what \
a course covers). Returns the course title, link, instructor, and the full \
lesson list.
- search_course_content: specific content queries (concepts, definitions, \
details from particular lessons).

Guidelines:
- You may use tools more than once; an earlier result can inform a later, \
more specific lookup (e.g. get the outline first, then search a lesson it \
names).
- Answer general-knowledge questions from your own knowledge, without tools.
- For course-specific questions, use the appropriate tool first, then answer.
- If tools yield no results, state that clearly.
- Do not explain your tool usage; give the direct answer only.

Keep responses brief, accurate, and formatted with markdown where it helps \
readability.";

/// Drives a chat model through a bounded sequence of tool-call rounds.
pub struct Agent {
    model: Arc<dyn ChatModel>,
    system_prompt: String,
    max_rounds: usize,
}

impl Agent {
    /// Create an agent with the default prompt and round budget.
    pub fn new(model: Arc<dyn ChatModel>) -> Self {
        Self {
            model,
            system_prompt: SYSTEM_PROMPT.to_string(),
            max_rounds: DEFAULT_MAX_ROUNDS,
        }
    }

    /// Set a custom system prompt.
    pub fn with_system_prompt(mut self, prompt: &str) -> Self {
        self.system_prompt = prompt.to_string();
        self
    }

    /// Set the maximum number of tool-call rounds.
    pub fn with_max_rounds(mut self, max_rounds: usize) -> Self {
        self.max_rounds = max_rounds;
        self
    }

    /// Answer a query, optionally using the registry's tools.
    ///
    /// A transport failure on the very first model call propagates (no
    /// answer can be synthesized without one response); failures on any
    /// later call are contained as error-text answers.
    #[instrument(skip_all, fields(query = %query))]
    pub async fn run(
        &self,
        query: &str,
        history: Option<&str>,
        registry: Option<&ToolRegistry>,
    ) -> Result<String> {
        let system = match history {
            Some(history) => format!(
                "{}\n\nPrevious conversation:\n{}",
                self.system_prompt, history
            ),
            None => self.system_prompt.clone(),
        };

        let definitions = registry.map(|r| r.definitions());
        let tools = definitions.as_deref().filter(|defs| !defs.is_empty());

        let mut turns = vec![Turn::user(query)];

        let mut response = self.model.generate(&system, &turns, tools).await?;

        let Some(registry) = registry else {
            return Ok(response.text());
        };
        if response.stop_reason != StopReason::ToolUse {
            // Zero-round path: the model answered directly
            return Ok(response.text());
        }

        let mut round = 0;
        while round < self.max_rounds && response.stop_reason == StopReason::ToolUse {
            round += 1;
            debug!("tool round {}", round);

            turns.push(Turn::assistant(response.content.clone()));

            let results = self.execute_round(&response, registry).await;
            if results.is_empty() {
                // Tool-use stop reason but no tool-use blocks
                return Ok("I encountered an issue while using the available tools.".to_string());
            }
            turns.push(Turn::tool_results(results));

            if round >= self.max_rounds {
                break;
            }

            // Tools stay enabled through the penultimate round so an early
            // result can inform a more specific follow-up lookup
            match self.model.generate(&system, &turns, tools).await {
                Ok(next) => {
                    if next.stop_reason != StopReason::ToolUse {
                        return Ok(next.text());
                    }
                    response = next;
                }
                Err(e) => {
                    return Ok(format!(
                        "Error during tool execution round {}: {}",
                        round, e
                    ))
                }
            }
        }

        // Round budget exhausted: force a text-only answer
        info!("round budget exhausted after {} rounds", round);
        match self.model.generate(&system, &turns, None).await {
            Ok(final_response) => Ok(final_response.text()),
            Err(e) => Ok(format!("Error generating final response: {}", e)),
        }
    }

    /// Execute every tool-use block of a response, in emission order.
    ///
    /// Each execution is independently contained: a fault becomes a result
    /// string the model can react to, and the round continues.
    async fn execute_round(
        &self,
        response: &ModelResponse,
        registry: &ToolRegistry,
    ) -> Vec<(String, String)> {
        let mut results = Vec::new();

        for block in &response.content {
            if let ContentBlock::ToolUse { id, name, input } = block {
                debug!(tool = %name, "executing tool call");
                let text = match registry.execute_tool(name, input).await {
                    Ok(text) => text,
                    Err(e) => format!("Tool execution failed: {}", e),
                };
                results.push((id.clone(), text));
            }
        }

        results
    }
}
