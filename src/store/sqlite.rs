//! SQLite-backed course index.
//!
//! Uses SQLite with cosine similarity computed in Rust for simplicity.
//! For large corpora consider the sqlite-vec extension or a dedicated
//! vector database.

use super::{cosine_distance, ChunkHit, Course, CourseChunk, CourseIndex, Lesson};
use crate::error::{PensumError, Result};
use async_trait::async_trait;
use chrono::Utc;
use rusqlite::{params, Connection};
use std::collections::HashSet;
use std::path::Path;
use std::sync::Mutex;
use tracing::{debug, info, instrument};

const SCHEMA: &str = r#"
    CREATE TABLE IF NOT EXISTS course_catalog (
        title TEXT PRIMARY KEY,
        course_link TEXT,
        instructor TEXT,
        lessons_json TEXT NOT NULL,
        embedding BLOB NOT NULL,
        added_at TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS course_content (
        id TEXT PRIMARY KEY,
        course_title TEXT NOT NULL,
        lesson_number INTEGER,
        chunk_index INTEGER NOT NULL,
        content TEXT NOT NULL,
        embedding BLOB NOT NULL
    );

    CREATE INDEX IF NOT EXISTS idx_content_course_title ON course_content(course_title);
"#;

/// SQLite-backed course index.
pub struct SqliteIndex {
    conn: Mutex<Connection>,
}

impl SqliteIndex {
    /// Open (or create) an index at the given path.
    #[instrument(skip_all)]
    pub fn new(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;

        // WAL mode for better concurrent read performance
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        conn.execute_batch(SCHEMA)?;

        info!("Initialized SQLite course index at {:?}", path);

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Create an in-memory index (useful for testing).
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA)?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock_conn(&self) -> Result<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| PensumError::Store(format!("Failed to acquire lock: {}", e)))
    }

    /// Serialize embedding to bytes.
    fn embedding_to_bytes(embedding: &[f32]) -> Vec<u8> {
        embedding.iter().flat_map(|f| f.to_le_bytes()).collect()
    }

    /// Deserialize embedding from bytes.
    fn bytes_to_embedding(bytes: &[u8]) -> Vec<f32> {
        bytes
            .chunks_exact(4)
            .map(|chunk| {
                let arr: [u8; 4] = chunk.try_into().unwrap_or_default();
                f32::from_le_bytes(arr)
            })
            .collect()
    }
}

#[async_trait]
impl CourseIndex for SqliteIndex {
    #[instrument(skip(self, course, embedding), fields(title = %course.title))]
    async fn upsert_course(&self, course: &Course, embedding: &[f32]) -> Result<()> {
        let conn = self.lock_conn()?;

        let lessons_json = serde_json::to_string(&course.lessons)?;

        conn.execute(
            r#"
            INSERT OR REPLACE INTO course_catalog
            (title, course_link, instructor, lessons_json, embedding, added_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
            params![
                course.title,
                course.course_link,
                course.instructor,
                lessons_json,
                Self::embedding_to_bytes(embedding),
                Utc::now().to_rfc3339(),
            ],
        )?;

        debug!("Upserted catalog record for '{}'", course.title);
        Ok(())
    }

    #[instrument(skip(self, chunks, embeddings))]
    async fn add_chunks(&self, chunks: &[CourseChunk], embeddings: &[Vec<f32>]) -> Result<usize> {
        let conn = self.lock_conn()?;

        let tx = conn.unchecked_transaction()?;

        for (chunk, embedding) in chunks.iter().zip(embeddings) {
            tx.execute(
                r#"
                INSERT INTO course_content
                (id, course_title, lesson_number, chunk_index, content, embedding)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                "#,
                params![
                    uuid::Uuid::new_v4().to_string(),
                    chunk.course_title,
                    chunk.lesson_number,
                    chunk.chunk_index,
                    chunk.content,
                    Self::embedding_to_bytes(embedding),
                ],
            )?;
        }

        tx.commit()?;
        info!("Indexed {} content chunks", chunks.len());
        Ok(chunks.len())
    }

    #[instrument(skip_all)]
    async fn nearest_course_title(&self, query: &[f32]) -> Result<Option<String>> {
        let conn = self.lock_conn()?;

        let mut stmt = conn.prepare("SELECT title, embedding FROM course_catalog")?;
        let rows = stmt.query_map([], |row| {
            let title: String = row.get(0)?;
            let embedding_bytes: Vec<u8> = row.get(1)?;
            Ok((title, Self::bytes_to_embedding(&embedding_bytes)))
        })?;

        let nearest = rows
            .filter_map(|r| r.ok())
            .map(|(title, embedding)| (title, cosine_distance(query, &embedding)))
            .min_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal));

        Ok(nearest.map(|(title, _)| title))
    }

    #[instrument(skip(self, query))]
    async fn search_chunks(
        &self,
        query: &[f32],
        course_title: Option<&str>,
        lesson_number: Option<u32>,
        limit: usize,
    ) -> Result<Vec<ChunkHit>> {
        let conn = self.lock_conn()?;

        let mut stmt = conn.prepare(
            r#"
            SELECT course_title, lesson_number, chunk_index, content, embedding
            FROM course_content
            "#,
        )?;

        let rows = stmt.query_map([], |row| {
            let embedding_bytes: Vec<u8> = row.get(4)?;
            let chunk = CourseChunk {
                course_title: row.get(0)?,
                lesson_number: row.get::<_, Option<u32>>(1)?,
                chunk_index: row.get(2)?,
                content: row.get(3)?,
            };
            Ok((chunk, Self::bytes_to_embedding(&embedding_bytes)))
        })?;

        let mut hits: Vec<ChunkHit> = rows
            .filter_map(|r| r.ok())
            .filter(|(chunk, _)| {
                course_title.is_none_or(|t| chunk.course_title == t)
                    && lesson_number.is_none_or(|n| chunk.lesson_number == Some(n))
            })
            .map(|(chunk, embedding)| ChunkHit {
                distance: cosine_distance(query, &embedding),
                chunk,
            })
            .collect();

        hits.sort_by(|a, b| {
            a.distance
                .partial_cmp(&b.distance)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        hits.truncate(limit);

        debug!("Found {} matching chunks", hits.len());
        Ok(hits)
    }

    #[instrument(skip(self))]
    async fn get_course(&self, title: &str) -> Result<Option<Course>> {
        let conn = self.lock_conn()?;

        let row = conn.query_row(
            "SELECT course_link, instructor, lessons_json FROM course_catalog WHERE title = ?1",
            params![title],
            |row| {
                let course_link: Option<String> = row.get(0)?;
                let instructor: Option<String> = row.get(1)?;
                let lessons_json: String = row.get(2)?;
                Ok((course_link, instructor, lessons_json))
            },
        );

        match row {
            Ok((course_link, instructor, lessons_json)) => {
                let lessons: Vec<Lesson> = serde_json::from_str(&lessons_json)?;
                Ok(Some(Course {
                    title: title.to_string(),
                    course_link,
                    instructor,
                    lessons,
                }))
            }
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn course_titles(&self) -> Result<HashSet<String>> {
        let conn = self.lock_conn()?;

        let mut stmt = conn.prepare("SELECT title FROM course_catalog")?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;

        Ok(rows.filter_map(|r| r.ok()).collect())
    }

    async fn course_count(&self) -> Result<usize> {
        let conn = self.lock_conn()?;

        let count: i64 = conn.query_row("SELECT COUNT(*) FROM course_catalog", [], |row| {
            row.get(0)
        })?;
        Ok(count as usize)
    }

    #[instrument(skip(self))]
    async fn clear(&self) -> Result<()> {
        let conn = self.lock_conn()?;

        conn.execute("DELETE FROM course_catalog", [])?;
        conn.execute("DELETE FROM course_content", [])?;

        info!("Cleared all catalog and content records");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::CourseStore;
    use crate::test_support::{sample_chunks, sample_course, HashEmbedder};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_sqlite_catalog_roundtrip() {
        let index = SqliteIndex::in_memory().unwrap();
        let course = sample_course();

        index.upsert_course(&course, &[1.0, 0.0, 0.0]).await.unwrap();
        // Same title replaces the record
        index.upsert_course(&course, &[1.0, 0.0, 0.0]).await.unwrap();

        assert_eq!(index.course_count().await.unwrap(), 1);

        let stored = index.get_course(&course.title).await.unwrap().unwrap();
        assert_eq!(stored.title, course.title);
        assert_eq!(stored.instructor, course.instructor);
        assert_eq!(stored.lessons.len(), course.lessons.len());
        assert_eq!(stored.lesson_link(0), Some("https://example.com/lesson0"));

        assert!(index.get_course("No Such Course").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_sqlite_nearest_course() {
        let index = SqliteIndex::in_memory().unwrap();
        assert!(index.nearest_course_title(&[1.0, 0.0]).await.unwrap().is_none());

        let mut a = sample_course();
        a.title = "Course A".to_string();
        let mut b = sample_course();
        b.title = "Course B".to_string();

        index.upsert_course(&a, &[1.0, 0.0]).await.unwrap();
        index.upsert_course(&b, &[0.0, 1.0]).await.unwrap();

        let nearest = index.nearest_course_title(&[0.9, 0.1]).await.unwrap();
        assert_eq!(nearest.as_deref(), Some("Course A"));
    }

    #[tokio::test]
    async fn test_sqlite_search_with_filters() {
        let index = SqliteIndex::in_memory().unwrap();
        let chunks = sample_chunks();
        let embeddings: Vec<Vec<f32>> =
            (0..chunks.len()).map(|i| vec![i as f32 + 1.0, 1.0]).collect();

        index.add_chunks(&chunks, &embeddings).await.unwrap();

        let all = index.search_chunks(&[1.0, 1.0], None, None, 10).await.unwrap();
        assert_eq!(all.len(), chunks.len());
        for pair in all.windows(2) {
            assert!(pair[0].distance <= pair[1].distance);
        }

        let filtered = index
            .search_chunks(&[1.0, 1.0], Some(&chunks[0].course_title), Some(1), 10)
            .await
            .unwrap();
        assert!(!filtered.is_empty());
        for hit in &filtered {
            assert_eq!(hit.chunk.course_title, chunks[0].course_title);
            assert_eq!(hit.chunk.lesson_number, Some(1));
        }
    }

    #[tokio::test]
    async fn test_sqlite_clear() {
        let index = SqliteIndex::in_memory().unwrap();
        index
            .upsert_course(&sample_course(), &[1.0, 0.0])
            .await
            .unwrap();
        index
            .add_chunks(&sample_chunks()[..1], &[vec![1.0, 0.0]])
            .await
            .unwrap();

        index.clear().await.unwrap();

        assert_eq!(index.course_count().await.unwrap(), 0);
        assert!(index
            .search_chunks(&[1.0, 0.0], None, None, 10)
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_sqlite_store_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("courses.db");

        {
            let store = CourseStore::new(
                Arc::new(SqliteIndex::new(&path).unwrap()),
                Arc::new(HashEmbedder),
            );
            store.add_course_metadata(&sample_course()).await.unwrap();
            store.add_course_content(&sample_chunks()).await.unwrap();
        }

        let store = CourseStore::new(
            Arc::new(SqliteIndex::new(&path).unwrap()),
            Arc::new(HashEmbedder),
        );
        assert_eq!(store.get_course_count().await.unwrap(), 1);

        let results = store.search("variables", None, None, None).await.unwrap();
        assert!(!results.is_empty());
    }

    #[test]
    fn test_embedding_blob_roundtrip() {
        let embedding = vec![0.25, -1.5, 3.75];
        let bytes = SqliteIndex::embedding_to_bytes(&embedding);
        assert_eq!(bytes.len(), 12);
        assert_eq!(SqliteIndex::bytes_to_embedding(&bytes), embedding);
    }
}
