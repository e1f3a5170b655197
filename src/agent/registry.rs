//! Name-indexed tool dispatch and per-query source collection.

use super::tools::Tool;
use crate::error::{PensumError, Result};
use crate::llm::ToolDefinition;
use crate::store::Source;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::{debug, warn};

/// Registry of callable tools.
///
/// Sources returned by tool executions accumulate here until drained; the
/// registry must be confined to one in-flight query at a time (one instance
/// per request), read with [`get_last_sources`](Self::get_last_sources) and
/// cleared with [`reset_sources`](Self::reset_sources) once per query.
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
    sources: Mutex<Vec<Source>>,
}

impl ToolRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
            sources: Mutex::new(Vec::new()),
        }
    }

    /// Register a tool under its definition name.
    ///
    /// Duplicate names are a programming error and fail loudly.
    pub fn register(&mut self, tool: Arc<dyn Tool>) -> Result<()> {
        let name = tool.definition().name;
        if self.tools.contains_key(&name) {
            return Err(PensumError::Tool(format!(
                "Tool '{}' is already registered",
                name
            )));
        }
        debug!("Registered tool '{}'", name);
        self.tools.insert(name, tool);
        Ok(())
    }

    /// Definitions of all registered tools.
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools.values().map(|tool| tool.definition()).collect()
    }

    /// Dispatch a tool call by name.
    ///
    /// An unknown name is an expected outcome and yields a "not found" text
    /// result rather than an error; only execution faults return `Err`.
    pub async fn execute_tool(&self, name: &str, args: &Value) -> Result<String> {
        let Some(tool) = self.tools.get(name) else {
            warn!("Model requested unknown tool '{}'", name);
            return Ok(format!("Tool '{}' not found", name));
        };

        let output = tool.execute(args).await?;
        self.sources.lock().unwrap().extend(output.sources);
        Ok(output.text)
    }

    /// Sources collected by all tool executions since the last reset.
    pub fn get_last_sources(&self) -> Vec<Source> {
        self.sources.lock().unwrap().clone()
    }

    /// Clear the collected sources.
    pub fn reset_sources(&self) {
        self.sources.lock().unwrap().clear();
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::tools::ToolOutput;
    use async_trait::async_trait;
    use serde_json::json;

    struct FixedTool {
        name: &'static str,
        output: ToolOutput,
    }

    #[async_trait]
    impl Tool for FixedTool {
        fn definition(&self) -> ToolDefinition {
            ToolDefinition {
                name: self.name.to_string(),
                description: "fixed".to_string(),
                input_schema: json!({"type": "object", "properties": {}}),
            }
        }

        async fn execute(&self, _args: &Value) -> crate::error::Result<ToolOutput> {
            Ok(self.output.clone())
        }
    }

    fn fixed_tool(name: &'static str, text: &str, sources: Vec<Source>) -> Arc<dyn Tool> {
        Arc::new(FixedTool {
            name,
            output: ToolOutput {
                text: text.to_string(),
                sources,
            },
        })
    }

    #[tokio::test]
    async fn test_register_and_dispatch() {
        let mut registry = ToolRegistry::new();
        registry
            .register(fixed_tool("probe", "probe result", Vec::new()))
            .unwrap();

        assert_eq!(registry.definitions().len(), 1);

        let result = registry.execute_tool("probe", &json!({})).await.unwrap();
        assert_eq!(result, "probe result");
    }

    #[tokio::test]
    async fn test_duplicate_registration_fails() {
        let mut registry = ToolRegistry::new();
        registry
            .register(fixed_tool("probe", "a", Vec::new()))
            .unwrap();

        let err = registry
            .register(fixed_tool("probe", "b", Vec::new()))
            .unwrap_err();
        assert!(err.to_string().contains("already registered"));
    }

    #[tokio::test]
    async fn test_unknown_tool_is_text_not_error() {
        let registry = ToolRegistry::new();
        let result = registry
            .execute_tool("nonexistent", &json!({}))
            .await
            .unwrap();
        assert_eq!(result, "Tool 'nonexistent' not found");
    }

    #[tokio::test]
    async fn test_sources_collect_and_drain() {
        let mut registry = ToolRegistry::new();
        registry
            .register(fixed_tool(
                "a",
                "a",
                vec![Source {
                    text: "Source A".to_string(),
                    link: Some("https://a.example".to_string()),
                }],
            ))
            .unwrap();
        registry
            .register(fixed_tool(
                "b",
                "b",
                vec![Source {
                    text: "Source B".to_string(),
                    link: None,
                }],
            ))
            .unwrap();

        registry.execute_tool("a", &json!({})).await.unwrap();
        registry.execute_tool("b", &json!({})).await.unwrap();

        let sources = registry.get_last_sources();
        assert_eq!(sources.len(), 2);
        assert_eq!(sources[0].text, "Source A");
        assert_eq!(sources[1].text, "Source B");

        registry.reset_sources();
        assert!(registry.get_last_sources().is_empty());
    }
}
