//! Core data models for the workout knowledge base.
//!
//! These types represent the documents, indexed records, and answers that
//! flow through the crawl → filter → index → answer pipeline.

use serde::{Deserialize, Serialize};

/// One fetched page, produced by the content fetcher.
///
/// Immutable once produced; discarded if it fails the relevance filter.
#[derive(Debug, Clone)]
pub struct RawDocument {
    pub url: String,
    pub title: String,
    /// Cleaned plain text (whitespace-normalized, non-content elements removed).
    pub content: String,
    pub metadata: DocMetadata,
}

/// Best-effort metadata extracted from a fetched page.
#[derive(Debug, Clone, Default)]
pub struct DocMetadata {
    pub description: Option<String>,
    pub author: Option<String>,
    pub publish_date: Option<String>,
    pub tags: Vec<String>,
}

/// The unit stored in the knowledge index: a composite text body for
/// embedding plus a metadata projection. One [`RawDocument`] produces
/// exactly one record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexedRecord {
    pub url: String,
    pub title: String,
    /// Composite embedding body: title, URL, description, content, tags,
    /// author, and publish date concatenated into one labeled block.
    pub text: String,
    pub description: Option<String>,
    pub author: Option<String>,
    pub publish_date: Option<String>,
    pub tags: Vec<String>,
    /// Provenance marker; always `"web"` for crawled content.
    pub origin: String,
}

impl IndexedRecord {
    /// Build the embeddable record for a fetched document.
    pub fn from_document(doc: &RawDocument) -> Self {
        let text = format!(
            "Title: {}\nURL: {}\nDescription: {}\nContent: {}\nTags: {}\nAuthor: {}\nPublished: {}",
            doc.title,
            doc.url,
            doc.metadata.description.as_deref().unwrap_or(""),
            doc.content,
            doc.metadata.tags.join(", "),
            doc.metadata.author.as_deref().unwrap_or(""),
            doc.metadata.publish_date.as_deref().unwrap_or(""),
        )
        .trim()
        .to_string();

        Self {
            url: doc.url.clone(),
            title: doc.title.clone(),
            text,
            description: doc.metadata.description.clone(),
            author: doc.metadata.author.clone(),
            publish_date: doc.metadata.publish_date.clone(),
            tags: doc.metadata.tags.clone(),
            origin: "web".to_string(),
        }
    }
}

/// Transient result of one answered question. Not persisted.
#[derive(Debug, Clone, Serialize)]
pub struct RagResponse {
    pub answer: String,
    /// Retrieved records in descending relevance order.
    pub sources: Vec<SourceRef>,
    /// The exact context text handed to the language model, for debugging.
    pub context: String,
}

/// A pointer back to the page a retrieved passage came from.
#[derive(Debug, Clone, Serialize)]
pub struct SourceRef {
    pub url: String,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub relevance_score: Option<f32>,
}

/// Which specialized retrieval configuration a question is routed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuestionKind {
    #[default]
    General,
    Workout,
    Form,
    Nutrition,
}

impl std::str::FromStr for QuestionKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "general" => Ok(Self::General),
            "workout" => Ok(Self::Workout),
            "form" => Ok(Self::Form),
            "nutrition" => Ok(Self::Nutrition),
            other => Err(format!(
                "unknown question type '{}'; use general, workout, form, or nutrition",
                other
            )),
        }
    }
}

/// Read-only snapshot of the knowledge index.
#[derive(Debug, Clone, Serialize)]
pub struct IndexInfo {
    pub is_loaded: bool,
    pub record_count: usize,
    pub store_dir: String,
}

/// Structured outcome of `initialize()`, so callers can degrade gracefully
/// instead of catching errors.
#[derive(Debug, Clone, Serialize)]
pub struct InitOutcome {
    pub success: bool,
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_doc() -> RawDocument {
        RawDocument {
            url: "https://example.com/squats".to_string(),
            title: "Squat Guide".to_string(),
            content: "How to squat with proper form.".to_string(),
            metadata: DocMetadata {
                description: Some("A squat tutorial".to_string()),
                author: Some("Coach".to_string()),
                publish_date: None,
                tags: vec!["legs".to_string(), "strength".to_string()],
            },
        }
    }

    #[test]
    fn test_record_composite_text() {
        let record = IndexedRecord::from_document(&sample_doc());
        assert!(record.text.starts_with("Title: Squat Guide"));
        assert!(record.text.contains("URL: https://example.com/squats"));
        assert!(record.text.contains("Content: How to squat with proper form."));
        assert!(record.text.contains("Tags: legs, strength"));
        assert_eq!(record.origin, "web");
    }

    #[test]
    fn test_question_kind_parse() {
        assert_eq!("workout".parse::<QuestionKind>(), Ok(QuestionKind::Workout));
        assert_eq!("general".parse::<QuestionKind>(), Ok(QuestionKind::General));
        assert!("cardio".parse::<QuestionKind>().is_err());
    }
}
