//! Pensum - Course Material Retrieval and Question Answering
//!
//! A vector-backed retrieval store and bounded tool-calling agent for
//! answering questions over course transcripts.
//!
//! The name "Pensum" is the Norwegian word for a course's required reading.
//!
//! # Overview
//!
//! Pensum lets you:
//! - Index course metadata and transcript chunks as two embedded collections
//! - Resolve fuzzy course references by semantic title similarity
//! - Run filtered similarity search over course content
//! - Answer questions through a chat model that decides when to call the
//!   retrieval tools, bounded to a fixed number of tool rounds
//!
//! # Architecture
//!
//! The library is organized into several modules:
//!
//! - `config` - Configuration management
//! - `embedding` - Embedding generation
//! - `llm` - Chat model abstraction and tool-call contract
//! - `store` - Course catalog and content index
//! - `agent` - Retrieval tools, tool registry, and the tool-calling loop
//! - `rag` - Query engine tying the pieces together
//!
//! # Example
//!
//! ```rust,no_run
//! use pensum::config::Settings;
//! use pensum::rag::RagEngine;
//!
//! #[tokio::main]
//! async fn main() -> pensum::Result<()> {
//!     let settings = Settings::load()?;
//!     let engine = RagEngine::from_settings(&settings)?;
//!
//!     let response = engine.query("What does lesson 2 of the MCP course cover?", None).await?;
//!     println!("{}", response.answer);
//!
//!     Ok(())
//! }
//! ```

pub mod agent;
pub mod config;
pub mod embedding;
pub mod error;
pub mod llm;
pub mod openai;
pub mod rag;
pub mod store;

#[cfg(test)]
pub(crate) mod test_support;

pub use error::{PensumError, Result};
