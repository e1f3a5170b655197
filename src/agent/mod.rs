//! Tool-using agent for course question answering.
//!
//! The model decides whether to call the retrieval tools; the runner bounds
//! it to a fixed number of tool rounds and the registry dispatches calls by
//! name while collecting display sources per query.

mod registry;
mod runner;
mod tools;

pub use registry::ToolRegistry;
pub use runner::{Agent, DEFAULT_MAX_ROUNDS};
pub use tools::{OutlineTool, SearchTool, Tool, ToolOutput};
