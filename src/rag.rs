//! Query-answering engine for course materials.
//!
//! Wires the course store, the retrieval tools, and the tool-calling agent
//! together: one `query` call runs the agent and drains the registry's
//! collected sources exactly once. Each engine owns its registry, so one
//! engine instance should serve one query at a time.

use crate::agent::{Agent, OutlineTool, SearchTool, ToolRegistry};
use crate::config::Settings;
use crate::embedding::{Embedder, OpenAIEmbedder};
use crate::error::Result;
use crate::llm::{ChatModel, OpenAiChatModel};
use crate::store::{Course, CourseChunk, CourseIndex, CourseStore, MemoryIndex, Source, SqliteIndex};
use std::sync::Arc;
use tracing::{info, instrument};

/// An answer with the sources the retrieval tools cited.
#[derive(Debug, Clone)]
pub struct RagAnswer {
    pub answer: String,
    pub sources: Vec<Source>,
}

/// Catalog statistics for reporting.
#[derive(Debug, Clone)]
pub struct CourseAnalytics {
    pub total_courses: usize,
    pub course_titles: Vec<String>,
}

/// Course question-answering engine.
pub struct RagEngine {
    store: Arc<CourseStore>,
    registry: ToolRegistry,
    agent: Agent,
}

impl RagEngine {
    /// Create an engine over an existing store and chat model.
    pub fn new(store: Arc<CourseStore>, model: Arc<dyn ChatModel>, max_rounds: usize) -> Result<Self> {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(SearchTool::new(store.clone())))?;
        registry.register(Arc::new(OutlineTool::new(store.clone())))?;

        let agent = Agent::new(model).with_max_rounds(max_rounds);

        Ok(Self {
            store,
            registry,
            agent,
        })
    }

    /// Build an engine from settings: OpenAI embedder and chat model, with
    /// the configured store backend.
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let embedder: Arc<dyn Embedder> = Arc::new(OpenAIEmbedder::with_config(
            &settings.embedding.model,
            settings.embedding.dimensions as usize,
        ));

        let index: Arc<dyn CourseIndex> = match settings.store.provider.as_str() {
            "memory" => Arc::new(MemoryIndex::new()),
            _ => Arc::new(SqliteIndex::new(&settings.sqlite_path())?),
        };

        let store = Arc::new(
            CourseStore::new(index, embedder).with_max_results(settings.store.max_results),
        );

        let model: Arc<dyn ChatModel> = Arc::new(OpenAiChatModel::with_config(
            &settings.agent.model,
            settings.agent.max_tokens,
            settings.agent.temperature,
        ));

        Self::new(store, model, settings.agent.max_rounds)
    }

    /// Answer a question, with optional prior-conversation text.
    ///
    /// Sources cited by the tools during this query are returned alongside
    /// the answer and cleared for the next query.
    #[instrument(skip_all, fields(question = %question))]
    pub async fn query(&self, question: &str, history: Option<&str>) -> Result<RagAnswer> {
        let answer = self
            .agent
            .run(question, history, Some(&self.registry))
            .await?;

        let sources = self.registry.get_last_sources();
        self.registry.reset_sources();

        Ok(RagAnswer { answer, sources })
    }

    /// Index a course's metadata and content chunks.
    ///
    /// A title already present in the catalog is skipped (returns 0) so
    /// re-ingesting a folder of transcripts does not duplicate content.
    #[instrument(skip_all, fields(title = %course.title))]
    pub async fn add_course(&self, course: &Course, chunks: &[CourseChunk]) -> Result<usize> {
        let existing = self.store.get_existing_course_titles().await?;
        if existing.contains(&course.title) {
            info!("Course '{}' already indexed, skipping", course.title);
            return Ok(0);
        }

        self.store.add_course_metadata(course).await?;
        let indexed = self.store.add_course_content(chunks).await?;
        info!("Indexed course '{}' ({} chunks)", course.title, indexed);
        Ok(indexed)
    }

    /// Catalog statistics.
    pub async fn analytics(&self) -> Result<CourseAnalytics> {
        let titles = self.store.get_existing_course_titles().await?;
        let mut course_titles: Vec<String> = titles.into_iter().collect();
        course_titles.sort();

        Ok(CourseAnalytics {
            total_courses: course_titles.len(),
            course_titles,
        })
    }

    /// Remove all indexed data. Not reversible.
    pub async fn clear(&self) -> Result<()> {
        self.store.clear_all_data().await
    }

    /// The underlying course store.
    pub fn store(&self) -> &Arc<CourseStore> {
        &self.store
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{
        sample_chunks, sample_course, test_store, text_response, tool_use_response, ScriptedModel,
    };
    use serde_json::json;

    fn engine_with_responses(
        store: Arc<CourseStore>,
        responses: Vec<crate::error::Result<crate::llm::ModelResponse>>,
    ) -> RagEngine {
        RagEngine::new(store, Arc::new(ScriptedModel::new(responses)), 2).unwrap()
    }

    #[tokio::test]
    async fn test_query_returns_answer_and_drains_sources() {
        let store = Arc::new(test_store());
        let course = sample_course();
        store.add_course_metadata(&course).await.unwrap();
        store.add_course_content(&sample_chunks()).await.unwrap();

        let chunks = sample_chunks();
        let engine = engine_with_responses(
            store,
            vec![
                Ok(tool_use_response(
                    "call_1",
                    "search_course_content",
                    json!({"query": chunks[0].content}),
                )),
                Ok(text_response("here is your answer")),
            ],
        );

        let response = engine.query("what are variables?", None).await.unwrap();

        assert_eq!(response.answer, "here is your answer");
        assert!(!response.sources.is_empty());
        assert!(response.sources[0].text.starts_with(&course.title));

        // Drained exactly once: nothing left for the next query
        assert!(engine.registry.get_last_sources().is_empty());
    }

    #[tokio::test]
    async fn test_query_without_tool_use_has_no_sources() {
        let engine = engine_with_responses(
            Arc::new(test_store()),
            vec![Ok(text_response("general knowledge answer"))],
        );

        let response = engine.query("what is 2 + 2?", None).await.unwrap();

        assert_eq!(response.answer, "general knowledge answer");
        assert!(response.sources.is_empty());
    }

    #[tokio::test]
    async fn test_add_course_skips_existing_title() {
        let engine = engine_with_responses(Arc::new(test_store()), vec![]);
        let course = sample_course();
        let chunks = sample_chunks();

        let first = engine.add_course(&course, &chunks).await.unwrap();
        assert_eq!(first, chunks.len());

        let second = engine.add_course(&course, &chunks).await.unwrap();
        assert_eq!(second, 0);

        let analytics = engine.analytics().await.unwrap();
        assert_eq!(analytics.total_courses, 1);
        assert_eq!(analytics.course_titles, vec![course.title]);
    }

    #[tokio::test]
    async fn test_clear_empties_catalog() {
        let engine = engine_with_responses(Arc::new(test_store()), vec![]);
        engine
            .add_course(&sample_course(), &sample_chunks())
            .await
            .unwrap();

        engine.clear().await.unwrap();

        let analytics = engine.analytics().await.unwrap();
        assert_eq!(analytics.total_courses, 0);
    }
}
