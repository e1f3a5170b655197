//! Shared test fixtures: a deterministic embedder, a scripted chat model,
//! and sample course data.

use crate::embedding::Embedder;
use crate::error::Result;
use crate::llm::{
    ChatModel, ContentBlock, ModelResponse, StopReason, ToolDefinition, Turn,
};
use crate::store::{Course, CourseChunk, CourseStore, Lesson, MemoryIndex};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

/// Deterministic local embedder: a bag-of-bytes histogram.
///
/// Identical texts embed to identical vectors (zero cosine distance), which
/// makes nearest-neighbor assertions exact without network access.
pub struct HashEmbedder;

impl HashEmbedder {
    const DIMENSIONS: usize = 32;

    fn embed_text(text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; Self::DIMENSIONS];
        for byte in text.bytes() {
            vector[byte as usize % Self::DIMENSIONS] += 1.0;
        }
        vector
    }
}

#[async_trait]
impl Embedder for HashEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        Ok(Self::embed_text(text))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| Self::embed_text(t)).collect())
    }

    fn dimensions(&self) -> usize {
        Self::DIMENSIONS
    }
}

/// What the model saw on one `generate` call.
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub system: String,
    pub turns: Vec<Turn>,
    pub tools_attached: bool,
}

/// Chat model that replays scripted responses and records its inputs.
pub struct ScriptedModel {
    responses: Mutex<VecDeque<Result<ModelResponse>>>,
    calls: Mutex<Vec<RecordedCall>>,
}

impl ScriptedModel {
    pub fn new(responses: Vec<Result<ModelResponse>>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Number of `generate` calls made so far.
    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    /// Inputs of every `generate` call, in order.
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChatModel for ScriptedModel {
    async fn generate(
        &self,
        system: &str,
        turns: &[Turn],
        tools: Option<&[ToolDefinition]>,
    ) -> Result<ModelResponse> {
        self.calls.lock().unwrap().push(RecordedCall {
            system: system.to_string(),
            turns: turns.to_vec(),
            tools_attached: tools.is_some(),
        });
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .expect("scripted model ran out of responses")
    }
}

/// A text-only response ending the turn.
pub fn text_response(text: &str) -> ModelResponse {
    ModelResponse {
        stop_reason: StopReason::EndTurn,
        content: vec![ContentBlock::Text {
            text: text.to_string(),
        }],
    }
}

/// A response requesting a single tool call.
pub fn tool_use_response(id: &str, name: &str, input: Value) -> ModelResponse {
    ModelResponse {
        stop_reason: StopReason::ToolUse,
        content: vec![ContentBlock::ToolUse {
            id: id.to_string(),
            name: name.to_string(),
            input,
        }],
    }
}

/// A three-lesson course; lesson 2 deliberately has no link.
pub fn sample_course() -> Course {
    Course {
        title: "Introduction to Rust Programming".to_string(),
        course_link: Some("https://example.com/course".to_string()),
        instructor: Some("Jamie Larsen".to_string()),
        lessons: vec![
            Lesson {
                lesson_number: 0,
                title: "Introduction".to_string(),
                lesson_link: Some("https://example.com/lesson0".to_string()),
            },
            Lesson {
                lesson_number: 1,
                title: "Getting Started".to_string(),
                lesson_link: Some("https://example.com/lesson1".to_string()),
            },
            Lesson {
                lesson_number: 2,
                title: "Ownership and Borrowing".to_string(),
                lesson_link: None,
            },
        ],
    }
}

/// Content chunks for [`sample_course`]. Contents avoid '[' so tests can
/// count result headers by bracket.
pub fn sample_chunks() -> Vec<CourseChunk> {
    let title = sample_course().title;
    vec![
        CourseChunk {
            course_title: title.clone(),
            lesson_number: Some(0),
            chunk_index: 0,
            content: "This lesson introduces the course and its goals.".to_string(),
        },
        CourseChunk {
            course_title: title.clone(),
            lesson_number: Some(1),
            chunk_index: 1,
            content: "Variables in Rust are immutable by default; use mut to change them."
                .to_string(),
        },
        CourseChunk {
            course_title: title,
            lesson_number: Some(2),
            chunk_index: 2,
            content: "Every value has a single owner and is dropped when the owner goes out of scope."
                .to_string(),
        },
    ]
}

/// An in-memory store over the deterministic embedder.
pub fn test_store() -> CourseStore {
    CourseStore::new(Arc::new(MemoryIndex::new()), Arc::new(HashEmbedder))
}
