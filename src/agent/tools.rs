//! Retrieval tools exposed to the model.

use crate::error::{PensumError, Result};
use crate::llm::ToolDefinition;
use crate::store::{CourseStore, Source};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;

/// Output of one tool execution: text for the model plus display sources.
#[derive(Debug, Clone, Default)]
pub struct ToolOutput {
    pub text: String,
    pub sources: Vec<Source>,
}

impl ToolOutput {
    /// A text-only output with no sources.
    pub fn text_only(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            sources: Vec::new(),
        }
    }
}

/// A callable tool: a definition the model sees, and an executor.
///
/// Expected misses (unknown course, no matches) are `Ok` text results the
/// model can react to; `Err` is reserved for faults, which the runner
/// converts to result strings at the round boundary.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Definition advertised to the model.
    fn definition(&self) -> ToolDefinition;

    /// Execute with the model-supplied arguments.
    async fn execute(&self, args: &Value) -> Result<ToolOutput>;
}

/// Semantic search over course content with optional course/lesson filters.
pub struct SearchTool {
    store: Arc<CourseStore>,
}

impl SearchTool {
    pub fn new(store: Arc<CourseStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Tool for SearchTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "search_course_content".to_string(),
            description: "Search course materials for specific content: concepts, \
                          definitions, or details from particular lessons."
                .to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "query": {
                        "type": "string",
                        "description": "What to search for in the course content"
                    },
                    "course_name": {
                        "type": "string",
                        "description": "Course title (partial names are resolved, e.g. 'MCP')"
                    },
                    "lesson_number": {
                        "type": "integer",
                        "description": "Specific lesson number to search within"
                    }
                },
                "required": ["query"]
            }),
        }
    }

    async fn execute(&self, args: &Value) -> Result<ToolOutput> {
        let query = args
            .get("query")
            .and_then(Value::as_str)
            .ok_or_else(|| {
                PensumError::Tool("search_course_content requires a 'query' argument".to_string())
            })?;
        let course_name = args.get("course_name").and_then(Value::as_str);
        let lesson_number = args
            .get("lesson_number")
            .and_then(Value::as_u64)
            .map(|n| n as u32);

        let results = self
            .store
            .search(query, course_name, lesson_number, None)
            .await?;

        // Resolution miss: the error text goes back to the model verbatim
        if let Some(error) = results.error {
            return Ok(ToolOutput::text_only(error));
        }

        if results.is_empty() {
            let mut note = String::from("No relevant content found");
            if let Some(name) = course_name {
                note.push_str(&format!(" in course '{}'", name));
            }
            if let Some(n) = lesson_number {
                note.push_str(&format!(" in lesson {}", n));
            }
            note.push('.');
            return Ok(ToolOutput::text_only(note));
        }

        let mut sections = Vec::with_capacity(results.len());
        let mut sources = Vec::with_capacity(results.len());

        for (document, meta) in results.documents.iter().zip(&results.metadata) {
            let (label, link) = match meta.lesson_number {
                Some(n) => (
                    format!("{} - Lesson {}", meta.course_title, n),
                    self.store.get_lesson_link(&meta.course_title, n).await?,
                ),
                None => (
                    meta.course_title.clone(),
                    self.store.get_course_link(&meta.course_title).await?,
                ),
            };

            sections.push(format!("[{}]\n{}", label, document));
            sources.push(Source { text: label, link });
        }

        Ok(ToolOutput {
            text: sections.join("\n\n"),
            sources,
        })
    }
}

/// Structural course outline: title, link, instructor, and lesson list.
pub struct OutlineTool {
    store: Arc<CourseStore>,
}

impl OutlineTool {
    pub fn new(store: Arc<CourseStore>) -> Self {
        Self { store }
    }

    fn format_outline(course: &crate::store::Course) -> String {
        let mut out = format!("Course: {}", course.title);
        if let Some(link) = &course.course_link {
            out.push_str(&format!("\nCourse Link: {}", link));
        }
        if let Some(instructor) = &course.instructor {
            out.push_str(&format!("\nInstructor: {}", instructor));
        }
        out.push_str(&format!("\n\nLessons ({}):", course.lessons.len()));
        for lesson in &course.lessons {
            out.push_str(&format!("\nLesson {}: {}", lesson.lesson_number, lesson.title));
        }
        out
    }
}

#[async_trait]
impl Tool for OutlineTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "get_course_outline".to_string(),
            description: "Get a course's structure: title, link, instructor, and the \
                          complete lesson list. Use for syllabus or outline queries."
                .to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "course_title": {
                        "type": "string",
                        "description": "Course title (partial names are resolved)"
                    }
                },
                "required": ["course_title"]
            }),
        }
    }

    async fn execute(&self, args: &Value) -> Result<ToolOutput> {
        let course_title = args
            .get("course_title")
            .and_then(Value::as_str)
            .ok_or_else(|| {
                PensumError::Tool("get_course_outline requires a 'course_title' argument".to_string())
            })?;

        // Lookup faults are reported as text, never propagated
        let resolved = match self.store.resolve_course_name(course_title).await {
            Ok(Some(title)) => title,
            Ok(None) => {
                return Ok(ToolOutput::text_only(format!(
                    "No course found matching '{}'",
                    course_title
                )))
            }
            Err(e) => {
                return Ok(ToolOutput::text_only(format!(
                    "Error retrieving course outline: {}",
                    e
                )))
            }
        };

        match self.store.get_course(&resolved).await {
            Ok(Some(course)) => Ok(ToolOutput {
                text: Self::format_outline(&course),
                sources: vec![Source {
                    text: course.title.clone(),
                    link: course.course_link.clone(),
                }],
            }),
            Ok(None) => Ok(ToolOutput::text_only(format!(
                "No course found matching '{}'",
                course_title
            ))),
            Err(e) => Ok(ToolOutput::text_only(format!(
                "Error retrieving course outline: {}",
                e
            ))),
        }
    }
}
