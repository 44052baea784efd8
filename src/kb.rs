//! Knowledge base orchestrator: owns the crawl → filter → index lifecycle
//! and routes typed questions to the answerer.
//!
//! This is the only component the rest of the application talks to. It is
//! constructed explicitly by the composition root (CLI or server startup)
//! and shared by reference — there is no process-wide instance.
//!
//! Writers are serialized: a rebuild mutex is held for the whole
//! delete + fetch + filter + build sequence, so two concurrent
//! `initialize()`/`rebuild()` calls can never interleave writes to the
//! paired on-disk artifacts. Readers go through an `RwLock` and never
//! observe a half-built index.

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::{Mutex, RwLock};
use tracing::info;

use crate::answer::RagAnswerer;
use crate::config::Config;
use crate::embedding::{Embedder, OpenAiEmbedder};
use crate::error::KbError;
use crate::fetch::ContentFetcher;
use crate::filter::RelevanceFilter;
use crate::index::KnowledgeIndex;
use crate::llm::{ChatModel, OpenAiChat};
use crate::models::{IndexInfo, IndexedRecord, InitOutcome, QuestionKind, RagResponse, RawDocument};

/// Read-only status snapshot: `status()` has no side effects.
#[derive(Debug, Clone, Serialize)]
pub struct KbStatus {
    pub is_ready: bool,
    pub index_info: IndexInfo,
    pub config: Config,
}

/// The knowledge base: fetcher, filter, index, and answerer behind one
/// lifecycle.
pub struct KnowledgeBase {
    config: Config,
    fetcher: ContentFetcher,
    filter: RelevanceFilter,
    index: Arc<RwLock<KnowledgeIndex>>,
    answerer: RagAnswerer,
    /// Current crawl list: the configured defaults plus any added sources.
    sources: std::sync::RwLock<Vec<String>>,
    /// Serializes initialize/rebuild/add_sources against each other.
    rebuild_lock: Mutex<()>,
}

impl KnowledgeBase {
    /// Construct with the production OpenAI backends.
    pub fn new(config: Config) -> Result<Self, KbError> {
        let embedder: Arc<dyn Embedder> = Arc::new(OpenAiEmbedder::new(&config.embedding)?);
        let chat: Arc<dyn ChatModel> = Arc::new(OpenAiChat::new(&config.llm)?);
        Self::with_backends(config, embedder, chat)
    }

    /// Construct with caller-supplied embedding and chat backends. The
    /// composition root chooses; tests inject deterministic fakes here.
    pub fn with_backends(
        config: Config,
        embedder: Arc<dyn Embedder>,
        chat: Arc<dyn ChatModel>,
    ) -> Result<Self, KbError> {
        let fetcher = ContentFetcher::new(&config.fetcher)?;
        let filter = RelevanceFilter::new(&config.filter);
        let index = Arc::new(RwLock::new(KnowledgeIndex::new(
            config.store.dir.clone(),
            embedder,
            config.embedding.batch_size,
        )));
        let answerer = RagAnswerer::new(index.clone(), chat, config.retrieval.clone(), &config.llm);
        let sources = std::sync::RwLock::new(config.sources.urls.clone());

        Ok(Self {
            config,
            fetcher,
            filter,
            index,
            answerer,
            sources,
            rebuild_lock: Mutex::new(()),
        })
    }

    /// Bring the knowledge base to the ready state: load the persisted
    /// store if both artifacts are present, otherwise crawl the source list
    /// and build fresh. Returns a structured outcome instead of an error so
    /// the caller can degrade gracefully.
    pub async fn initialize(&self) -> InitOutcome {
        let _guard = self.rebuild_lock.lock().await;
        info!("initializing knowledge base");

        match self.index.write().await.load() {
            Ok(true) => {
                return InitOutcome {
                    success: true,
                    message: "knowledge base loaded from existing store".to_string(),
                }
            }
            Ok(false) => {}
            Err(e) => {
                return InitOutcome {
                    success: false,
                    message: format!("failed to load knowledge store: {}", e),
                }
            }
        }

        info!("no existing store found, building a fresh knowledge base");
        let urls = self.current_sources();
        match self.crawl_and_build(&urls).await {
            Ok(accepted) => InitOutcome {
                success: true,
                message: format!("knowledge base built from {} relevant articles", accepted),
            },
            Err(e) => InitOutcome {
                success: false,
                message: format!("failed to build knowledge base: {}", e),
            },
        }
    }

    /// Load the persisted store without ever crawling. Returns whether the
    /// base is ready afterwards.
    pub async fn load_existing(&self) -> Result<bool, KbError> {
        let _guard = self.rebuild_lock.lock().await;
        if self.index.read().await.is_loaded() {
            return Ok(true);
        }
        self.index.write().await.load()
    }

    /// Crawl and filter new URLs; if at least one passes, rebuild the whole
    /// base from the union of the current list and the new URLs.
    ///
    /// Not an incremental update — the rebuild-from-union semantics of the
    /// original design are preserved (see DESIGN.md). When nothing passes
    /// the filter this is a logged no-op, not an error. Returns the number
    /// of newly accepted documents.
    pub async fn add_sources(&self, urls: &[String]) -> Result<usize, KbError> {
        let _guard = self.rebuild_lock.lock().await;

        if !self.index.read().await.is_loaded() {
            let loaded = self.index.write().await.load()?;
            if !loaded {
                return Err(KbError::NotInitialized);
            }
        }

        info!(count = urls.len(), "adding sources to knowledge base");
        let fetched = self.fetcher.fetch_many(urls).await;
        let accepted = fetched
            .iter()
            .filter(|doc| self.filter.is_acceptable(doc))
            .count();

        if accepted == 0 {
            info!("no new relevant fitness content found, leaving knowledge base unchanged");
            return Ok(0);
        }

        let mut union = self.current_sources();
        union.extend(urls.iter().cloned());
        self.crawl_and_build(&union).await?;
        self.sources
            .write()
            .expect("sources lock poisoned")
            .extend(urls.iter().cloned());

        info!(accepted, "knowledge base rebuilt with new sources");
        Ok(accepted)
    }

    /// Delete the current index and build fresh from `custom_urls` or the
    /// current source list.
    pub async fn rebuild(&self, custom_urls: Option<Vec<String>>) -> Result<usize, KbError> {
        let _guard = self.rebuild_lock.lock().await;
        info!("rebuilding knowledge base");

        self.index.write().await.delete()?;
        let urls = custom_urls.unwrap_or_else(|| self.current_sources());
        self.crawl_and_build(&urls).await
    }

    /// Answer a general question. Requires a ready knowledge base.
    pub async fn ask(&self, question: &str) -> Result<RagResponse, KbError> {
        self.ensure_ready().await?;
        self.answerer.general_advice(question).await
    }

    pub async fn workout_suggestions(&self, query: &str) -> Result<RagResponse, KbError> {
        self.ensure_ready().await?;
        self.answerer.workout_suggestions(query).await
    }

    pub async fn exercise_form(&self, exercise_name: &str) -> Result<RagResponse, KbError> {
        self.ensure_ready().await?;
        self.answerer.exercise_form(exercise_name).await
    }

    pub async fn nutrition_advice(&self, query: &str) -> Result<RagResponse, KbError> {
        self.ensure_ready().await?;
        self.answerer.nutrition_advice(query).await
    }

    /// Route a question to the specialized pipeline for its kind.
    pub async fn ask_typed(
        &self,
        kind: QuestionKind,
        message: &str,
    ) -> Result<RagResponse, KbError> {
        match kind {
            QuestionKind::General => self.ask(message).await,
            QuestionKind::Workout => self.workout_suggestions(message).await,
            QuestionKind::Form => self.exercise_form(message).await,
            QuestionKind::Nutrition => self.nutrition_advice(message).await,
        }
    }

    pub async fn is_ready(&self) -> bool {
        self.answerer.is_ready().await
    }

    /// Read-only introspection, no side effects.
    pub async fn status(&self) -> KbStatus {
        KbStatus {
            is_ready: self.is_ready().await,
            index_info: self.index.read().await.info(),
            config: self.config.clone(),
        }
    }

    /// The current crawl list (configured defaults plus added sources).
    pub fn current_sources(&self) -> Vec<String> {
        self.sources.read().expect("sources lock poisoned").clone()
    }

    /// Crawl, filter, and build the index. Callers hold the rebuild lock.
    async fn crawl_and_build(&self, urls: &[String]) -> Result<usize, KbError> {
        info!(urls = urls.len(), "crawling source articles");
        let fetched = self.fetcher.fetch_many(urls).await;
        let fetched_total = fetched.len();

        let accepted: Vec<RawDocument> = fetched
            .into_iter()
            .filter(|doc| self.filter.is_acceptable(doc))
            .collect();
        info!(
            accepted = accepted.len(),
            fetched = fetched_total,
            "filtered crawled documents"
        );

        let records = accepted.iter().map(IndexedRecord::from_document).collect();
        self.index.write().await.build(records).await?;
        Ok(accepted.len())
    }

    async fn ensure_ready(&self) -> Result<(), KbError> {
        if self.is_ready().await {
            Ok(())
        } else {
            Err(KbError::NotInitialized)
        }
    }
}
