//! Retrieval-augmented answerer.
//!
//! Pipeline per question: retrieve top-k records from the knowledge index,
//! assemble a bounded context (per-record snippets, truncated to keep the
//! prompt inside a token budget), and ask the chat model for a short,
//! sourced answer. An empty retrieval set is a designed fallback path — the
//! model is never invoked for it.
//!
//! The specialized entry points (`workout_suggestions`, `exercise_form`,
//! `nutrition_advice`) are pure query rewrites over the same pipeline, each
//! with its own default `k`.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;
use tracing::debug;

use crate::config::{LlmConfig, RetrievalConfig};
use crate::error::KbError;
use crate::index::KnowledgeIndex;
use crate::llm::ChatModel;
use crate::models::{IndexedRecord, RagResponse, SourceRef};

/// Returned verbatim when retrieval comes back empty.
pub const FALLBACK_ANSWER: &str = "I don't have enough specific information in my knowledge base to answer your question about workouts. However, I'd be happy to help you with general fitness guidance or connect you with other resources!";

/// Context sentinel for the fallback path, kept distinguishable in logs.
pub const EMPTY_CONTEXT: &str = "No relevant context found";

/// Answers questions against the knowledge index through a chat model.
pub struct RagAnswerer {
    index: Arc<RwLock<KnowledgeIndex>>,
    chat: Arc<dyn ChatModel>,
    retrieval: RetrievalConfig,
    llm_deadline: Duration,
}

impl RagAnswerer {
    pub fn new(
        index: Arc<RwLock<KnowledgeIndex>>,
        chat: Arc<dyn ChatModel>,
        retrieval: RetrievalConfig,
        llm: &LlmConfig,
    ) -> Self {
        Self {
            index,
            chat,
            retrieval,
            llm_deadline: Duration::from_secs(llm.timeout_secs),
        }
    }

    /// Answer a question from the top-`k` retrieved records.
    pub async fn answer(&self, question: &str, k: usize) -> Result<RagResponse, KbError> {
        let retrieved = self.index.read().await.search(question, k).await?;

        if retrieved.is_empty() {
            debug!(%question, "no relevant records retrieved, returning fallback");
            return Ok(RagResponse {
                answer: FALLBACK_ANSWER.to_string(),
                sources: Vec::new(),
                context: EMPTY_CONTEXT.to_string(),
            });
        }

        let context = build_context(&retrieved, self.retrieval.context_snippet_chars);
        let prompt = build_prompt(question, &context);

        // The model call is the highest-latency step in the query path, so
        // the deadline lives here.
        let answer = tokio::time::timeout(self.llm_deadline, self.chat.complete(&prompt))
            .await
            .map_err(|_| KbError::Chat("completion timed out".into()))??;

        let sources = retrieved
            .iter()
            .map(|(record, score)| SourceRef {
                url: record.url.clone(),
                title: record.title.clone(),
                relevance_score: Some(*score),
            })
            .collect();

        Ok(RagResponse {
            answer,
            sources,
            context,
        })
    }

    /// Workout-plan oriented retrieval: widened query, larger `k`.
    pub async fn workout_suggestions(&self, query: &str) -> Result<RagResponse, KbError> {
        let rewritten = format!("workout routine exercise plan {} training program", query);
        self.answer(&rewritten, self.retrieval.workout_k).await
    }

    /// Form and technique retrieval for a named exercise.
    pub async fn exercise_form(&self, exercise_name: &str) -> Result<RagResponse, KbError> {
        let rewritten = format!(
            "{} proper form technique how to do correctly safety tips",
            exercise_name
        );
        self.answer(&rewritten, self.retrieval.form_k).await
    }

    /// Nutrition and diet retrieval in a training context.
    pub async fn nutrition_advice(&self, query: &str) -> Result<RagResponse, KbError> {
        let rewritten = format!("nutrition diet {} workout recovery protein", query);
        self.answer(&rewritten, self.retrieval.nutrition_k).await
    }

    /// General fitness advice: the question is passed through unchanged.
    pub async fn general_advice(&self, query: &str) -> Result<RagResponse, KbError> {
        self.answer(query, self.retrieval.default_k).await
    }

    /// True once the underlying index has been built or loaded.
    pub async fn is_ready(&self) -> bool {
        self.index.read().await.is_loaded()
    }
}

/// Assemble the labeled context blocks handed to the model. Each retrieved
/// record contributes its title, a relevance percentage, and its text
/// truncated to `snippet_chars` characters.
fn build_context(retrieved: &[(IndexedRecord, f32)], snippet_chars: usize) -> String {
    retrieved
        .iter()
        .enumerate()
        .map(|(i, (record, score))| {
            let truncated: String = record.text.chars().take(snippet_chars).collect();
            let ellipsis = if record.text.chars().count() > snippet_chars {
                "..."
            } else {
                ""
            };
            format!(
                "Source {} (Relevance: {:.1}%):\nTitle: {}\nContent: {}{}\n\n---",
                i + 1,
                score * 100.0,
                record.title,
                truncated,
                ellipsis,
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// The fixed instruction template: coach persona, domain, and the
/// behavioral constraints (short, decision-relevant, encouraging,
/// safety-first).
fn build_prompt(question: &str, context: &str) -> String {
    format!(
        r#"You are "Root", a knowledgeable and encouraging AI fitness coach. Answer the user's question concisely and helpfully.

Context from fitness sources:
{context}

User Question: {question}

Instructions:
1. Keep your answer SHORT and to the point (2-3 sentences max)
2. Focus on the most important information from the context
3. Be encouraging and motivational
4. Prioritize safety and proper form when discussing exercises
5. If the context doesn't contain enough information, say so briefly

Answer: "#
    )
}
