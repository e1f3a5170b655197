//! In-memory course index.
//!
//! Useful for testing and small corpora.

use super::{cosine_distance, ChunkHit, Course, CourseChunk, CourseIndex};
use crate::error::Result;
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::RwLock;

/// In-memory course index backed by a catalog map and a content vec.
pub struct MemoryIndex {
    catalog: RwLock<HashMap<String, (Course, Vec<f32>)>>,
    content: RwLock<Vec<(CourseChunk, Vec<f32>)>>,
}

impl MemoryIndex {
    /// Create an empty index.
    pub fn new() -> Self {
        Self {
            catalog: RwLock::new(HashMap::new()),
            content: RwLock::new(Vec::new()),
        }
    }
}

impl Default for MemoryIndex {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CourseIndex for MemoryIndex {
    async fn upsert_course(&self, course: &Course, embedding: &[f32]) -> Result<()> {
        let mut catalog = self.catalog.write().unwrap();
        catalog.insert(course.title.clone(), (course.clone(), embedding.to_vec()));
        Ok(())
    }

    async fn add_chunks(&self, chunks: &[CourseChunk], embeddings: &[Vec<f32>]) -> Result<usize> {
        let mut content = self.content.write().unwrap();
        for (chunk, embedding) in chunks.iter().zip(embeddings) {
            content.push((chunk.clone(), embedding.clone()));
        }
        Ok(chunks.len())
    }

    async fn nearest_course_title(&self, query: &[f32]) -> Result<Option<String>> {
        let catalog = self.catalog.read().unwrap();

        let nearest = catalog
            .values()
            .map(|(course, embedding)| (course.title.clone(), cosine_distance(query, embedding)))
            .min_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal));

        Ok(nearest.map(|(title, _)| title))
    }

    async fn search_chunks(
        &self,
        query: &[f32],
        course_title: Option<&str>,
        lesson_number: Option<u32>,
        limit: usize,
    ) -> Result<Vec<ChunkHit>> {
        let content = self.content.read().unwrap();

        let mut hits: Vec<ChunkHit> = content
            .iter()
            .filter(|(chunk, _)| {
                course_title.is_none_or(|t| chunk.course_title == t)
                    && lesson_number.is_none_or(|n| chunk.lesson_number == Some(n))
            })
            .map(|(chunk, embedding)| ChunkHit {
                chunk: chunk.clone(),
                distance: cosine_distance(query, embedding),
            })
            .collect();

        hits.sort_by(|a, b| {
            a.distance
                .partial_cmp(&b.distance)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        hits.truncate(limit);

        Ok(hits)
    }

    async fn get_course(&self, title: &str) -> Result<Option<Course>> {
        let catalog = self.catalog.read().unwrap();
        Ok(catalog.get(title).map(|(course, _)| course.clone()))
    }

    async fn course_titles(&self) -> Result<HashSet<String>> {
        let catalog = self.catalog.read().unwrap();
        Ok(catalog.keys().cloned().collect())
    }

    async fn course_count(&self) -> Result<usize> {
        let catalog = self.catalog.read().unwrap();
        Ok(catalog.len())
    }

    async fn clear(&self) -> Result<()> {
        self.catalog.write().unwrap().clear();
        self.content.write().unwrap().clear();
        Ok(())
    }
}
