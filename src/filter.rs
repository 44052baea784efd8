//! Relevance filter for crawled content.
//!
//! A cheap, explainable, order-independent classifier: lower-case the
//! document text and count how many distinct terms of a fixed fitness
//! vocabulary appear. False positives are cheap (a low-value passage gets
//! indexed); false negatives are acceptable because the source list is
//! curated and small. Deliberately not a learned model.

use crate::config::FilterConfig;
use crate::models::RawDocument;

/// Fixed fitness vocabulary matched against title + content + description.
const FITNESS_VOCABULARY: &[&str] = &[
    "workout",
    "exercise",
    "fitness",
    "training",
    "gym",
    "muscle",
    "strength",
    "cardio",
    "weight",
    "lifting",
    "squat",
    "push-up",
    "pull-up",
    "deadlift",
    "bench press",
    "running",
    "yoga",
    "pilates",
    "crossfit",
    "bodybuilding",
    "reps",
    "sets",
    "form",
    "technique",
    "routine",
    "program",
    "diet",
    "nutrition",
];

/// Decides whether a fetched document belongs in the knowledge base.
#[derive(Debug, Clone)]
pub struct RelevanceFilter {
    min_content_length: usize,
    min_keyword_matches: usize,
}

impl RelevanceFilter {
    pub fn new(config: &FilterConfig) -> Self {
        Self {
            min_content_length: config.min_content_length,
            min_keyword_matches: config.min_keyword_matches,
        }
    }

    /// True when at least `min_keyword_matches` distinct vocabulary terms
    /// occur in the document's title, content, or description.
    pub fn is_relevant(&self, doc: &RawDocument) -> bool {
        let text = format!(
            "{} {} {}",
            doc.title,
            doc.content,
            doc.metadata.description.as_deref().unwrap_or("")
        )
        .to_lowercase();

        let matches = FITNESS_VOCABULARY
            .iter()
            .filter(|term| text.contains(*term))
            .count();

        matches >= self.min_keyword_matches
    }

    /// Full acceptance check: relevance plus the minimum-length threshold.
    /// Only documents passing both become indexed records.
    pub fn is_acceptable(&self, doc: &RawDocument) -> bool {
        self.is_relevant(doc) && doc.content.len() >= self.min_content_length
    }
}
