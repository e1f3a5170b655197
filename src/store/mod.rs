//! Course retrieval store.
//!
//! Two logical collections back every query: a course catalog (one record
//! per course, embedded by title, carrying the lesson list as a structured
//! payload) and a content index (one record per transcript chunk, embedded
//! by content). The catalog answers fuzzy course-name resolution and
//! structural lookups; the content index answers filtered similarity search.

mod memory;
mod sqlite;

pub use memory::MemoryIndex;
pub use sqlite::SqliteIndex;

use crate::embedding::Embedder;
use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, instrument};

/// Default number of content results returned by [`CourseStore::search`].
pub const DEFAULT_MAX_RESULTS: usize = 5;

/// A lesson within a course.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Lesson {
    /// Lesson number, unique within its course.
    pub lesson_number: u32,
    /// Lesson title.
    pub title: String,
    /// Link to the lesson page, if any.
    pub lesson_link: Option<String>,
}

/// A course with its ordered lessons.
///
/// The title is the identity key: catalog upserts replace any existing
/// record with the same title.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Course {
    pub title: String,
    pub course_link: Option<String>,
    pub instructor: Option<String>,
    pub lessons: Vec<Lesson>,
}

impl Course {
    /// Create a course with no link, instructor, or lessons.
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            course_link: None,
            instructor: None,
            lessons: Vec::new(),
        }
    }

    /// Find a lesson's link by number.
    pub fn lesson_link(&self, lesson_number: u32) -> Option<&str> {
        self.lessons
            .iter()
            .find(|l| l.lesson_number == lesson_number)
            .and_then(|l| l.lesson_link.as_deref())
    }
}

/// One semantically indexed unit of course text.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CourseChunk {
    /// Title of the owning course.
    pub course_title: String,
    /// Lesson this chunk belongs to, if attributable.
    pub lesson_number: Option<u32>,
    /// Ordering of this chunk within the course.
    pub chunk_index: u32,
    /// Text content.
    pub content: String,
}

/// Metadata attached to each content record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    pub course_title: String,
    pub lesson_number: Option<u32>,
    pub chunk_index: u32,
}

/// Ranked output of a content search.
///
/// `documents`, `metadata`, and `distances` are parallel sequences ordered
/// by ascending distance (best match first). When `error` is set the
/// sequences are empty and the search failed; an empty result with no error
/// means the search succeeded but matched nothing.
#[derive(Debug, Clone, Default)]
pub struct SearchResults {
    pub documents: Vec<String>,
    pub metadata: Vec<ChunkMetadata>,
    pub distances: Vec<f32>,
    pub error: Option<String>,
}

impl SearchResults {
    /// A successful search with no matches.
    pub fn empty() -> Self {
        Self::default()
    }

    /// A failed search carrying an error message.
    pub fn from_error(message: impl Into<String>) -> Self {
        Self {
            error: Some(message.into()),
            ..Self::default()
        }
    }

    /// Whether the result contains no documents.
    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    /// Whether the search failed.
    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }

    /// Number of matched documents.
    pub fn len(&self) -> usize {
        self.documents.len()
    }
}

/// A display-friendly provenance record for one retrieval result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Source {
    /// Human label, e.g. "Course Title - Lesson 3".
    pub text: String,
    /// Link to the cited lesson or course, if known.
    pub link: Option<String>,
}

/// A content record scored against a query.
#[derive(Debug, Clone)]
pub struct ChunkHit {
    pub chunk: CourseChunk,
    /// Cosine distance to the query (lower is more similar).
    pub distance: f32,
}

/// Backend index holding the catalog and content collections.
///
/// Implementations receive pre-computed embeddings; the [`CourseStore`]
/// facade owns the embedder.
#[async_trait]
pub trait CourseIndex: Send + Sync {
    /// Upsert one catalog record keyed by course title.
    async fn upsert_course(&self, course: &Course, embedding: &[f32]) -> Result<()>;

    /// Append content records. `chunks` and `embeddings` are parallel.
    async fn add_chunks(&self, chunks: &[CourseChunk], embeddings: &[Vec<f32>]) -> Result<usize>;

    /// Nearest catalog title by vector distance; `None` if the catalog is empty.
    async fn nearest_course_title(&self, query: &[f32]) -> Result<Option<String>>;

    /// Ranked content search with optional ANDed equality filters.
    async fn search_chunks(
        &self,
        query: &[f32],
        course_title: Option<&str>,
        lesson_number: Option<u32>,
        limit: usize,
    ) -> Result<Vec<ChunkHit>>;

    /// Fetch one catalog record by exact title.
    async fn get_course(&self, title: &str) -> Result<Option<Course>>;

    /// All catalog titles.
    async fn course_titles(&self) -> Result<HashSet<String>>;

    /// Number of catalog records.
    async fn course_count(&self) -> Result<usize>;

    /// Remove all records from both collections.
    async fn clear(&self) -> Result<()>;
}

/// Embedding-backed store over the course catalog and content index.
pub struct CourseStore {
    index: Arc<dyn CourseIndex>,
    embedder: Arc<dyn Embedder>,
    max_results: usize,
}

impl CourseStore {
    /// Create a store over the given backend and embedder.
    pub fn new(index: Arc<dyn CourseIndex>, embedder: Arc<dyn Embedder>) -> Self {
        Self {
            index,
            embedder,
            max_results: DEFAULT_MAX_RESULTS,
        }
    }

    /// Set the default result limit for `search`.
    pub fn with_max_results(mut self, max_results: usize) -> Self {
        self.max_results = max_results;
        self
    }

    /// Upsert one catalog record for the course, embedded by title.
    ///
    /// Lessons ride along as a structured payload; they are not separately
    /// embedded. Adding the same title twice replaces the earlier record.
    #[instrument(skip(self, course), fields(title = %course.title))]
    pub async fn add_course_metadata(&self, course: &Course) -> Result<()> {
        let embedding = self.embedder.embed(&course.title).await?;
        self.index.upsert_course(course, &embedding).await
    }

    /// Append content chunks, embedded by content text.
    #[instrument(skip(self, chunks), fields(count = chunks.len()))]
    pub async fn add_course_content(&self, chunks: &[CourseChunk]) -> Result<usize> {
        if chunks.is_empty() {
            return Ok(0);
        }

        let texts: Vec<String> = chunks.iter().map(|c| c.content.clone()).collect();
        let embeddings = self.embedder.embed_batch(&texts).await?;
        self.index.add_chunks(chunks, &embeddings).await
    }

    /// Resolve a partial or fuzzy course name to a catalog title.
    ///
    /// The nearest catalog title is always accepted; there is no similarity
    /// floor, so an exact miss and a near miss are indistinguishable.
    /// Returns `None` only when the catalog is empty.
    pub async fn resolve_course_name(&self, name: &str) -> Result<Option<String>> {
        let embedding = self.embedder.embed(name).await?;
        self.index.nearest_course_title(&embedding).await
    }

    /// Filtered similarity search over course content.
    ///
    /// A course name that cannot be resolved yields a result state with
    /// `error` set, not an `Err`; infrastructure faults propagate as `Err`.
    #[instrument(skip(self), fields(query = %query))]
    pub async fn search(
        &self,
        query: &str,
        course_name: Option<&str>,
        lesson_number: Option<u32>,
        limit: Option<usize>,
    ) -> Result<SearchResults> {
        let course_title = match course_name {
            Some(name) => match self.resolve_course_name(name).await? {
                Some(title) => Some(title),
                None => {
                    return Ok(SearchResults::from_error(format!(
                        "No course found matching '{}'",
                        name
                    )))
                }
            },
            None => None,
        };

        let embedding = self.embedder.embed(query).await?;
        let hits = self
            .index
            .search_chunks(
                &embedding,
                course_title.as_deref(),
                lesson_number,
                limit.unwrap_or(self.max_results),
            )
            .await?;

        debug!("search matched {} chunks", hits.len());

        let mut results = SearchResults::empty();
        for hit in hits {
            results.documents.push(hit.chunk.content);
            results.metadata.push(ChunkMetadata {
                course_title: hit.chunk.course_title,
                lesson_number: hit.chunk.lesson_number,
                chunk_index: hit.chunk.chunk_index,
            });
            results.distances.push(hit.distance);
        }
        Ok(results)
    }

    /// Link for a specific lesson; `None` on any miss.
    pub async fn get_lesson_link(
        &self,
        course_title: &str,
        lesson_number: u32,
    ) -> Result<Option<String>> {
        Ok(self
            .index
            .get_course(course_title)
            .await?
            .and_then(|c| c.lesson_link(lesson_number).map(String::from)))
    }

    /// Link for a course; `None` on any miss.
    pub async fn get_course_link(&self, course_title: &str) -> Result<Option<String>> {
        Ok(self
            .index
            .get_course(course_title)
            .await?
            .and_then(|c| c.course_link))
    }

    /// Full catalog record by exact title.
    pub async fn get_course(&self, title: &str) -> Result<Option<Course>> {
        self.index.get_course(title).await
    }

    /// Titles of all catalogued courses.
    pub async fn get_existing_course_titles(&self) -> Result<HashSet<String>> {
        self.index.course_titles().await
    }

    /// Number of catalogued courses.
    pub async fn get_course_count(&self) -> Result<usize> {
        self.index.course_count().await
    }

    /// Remove everything from both collections. Not reversible.
    pub async fn clear_all_data(&self) -> Result<()> {
        self.index.clear().await
    }
}

/// Compute cosine similarity between two vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot_product / (norm_a * norm_b)
}

/// Cosine distance (lower is more similar).
pub fn cosine_distance(a: &[f32], b: &[f32]) -> f32 {
    1.0 - cosine_similarity(a, b)
}
