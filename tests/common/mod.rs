//! Shared test fixtures: a local article server and deterministic
//! embedding/chat backends.

#![allow(dead_code)]

use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use axum::extract::{Path as AxumPath, State};
use axum::http::StatusCode;
use axum::response::Html;
use axum::routing::get;
use axum::Router;

use workout_kb::config::Config;
use workout_kb::embedding::Embedder;
use workout_kb::error::KbError;
use workout_kb::llm::ChatModel;

// ============ Fixture article server ============

#[derive(Clone)]
struct FixtureState {
    pages: Arc<HashMap<String, String>>,
    hits: Arc<AtomicUsize>,
}

async fn serve_article(
    State(state): State<FixtureState>,
    AxumPath(name): AxumPath<String>,
) -> Result<Html<String>, StatusCode> {
    state.hits.fetch_add(1, Ordering::SeqCst);
    state
        .pages
        .get(&name)
        .cloned()
        .map(Html)
        .ok_or(StatusCode::NOT_FOUND)
}

/// Spawn a local HTTP server that serves `pages` under `/article/{name}`
/// and 404s everything else. Returns the base URL and a request counter
/// (404s count too).
pub async fn spawn_fixture_server(pages: HashMap<String, String>) -> (String, Arc<AtomicUsize>) {
    let hits = Arc::new(AtomicUsize::new(0));
    let state = FixtureState {
        pages: Arc::new(pages),
        hits: hits.clone(),
    };
    let app = Router::new()
        .route("/article/{name}", get(serve_article))
        .with_state(state);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (format!("http://{}", addr), hits)
}

/// A fitness article page: passes the relevance filter (many distinct
/// vocabulary terms) and the length threshold.
pub fn fitness_page(title: &str) -> String {
    let body = "This workout guide covers exercise selection, squat depth, deadlift \
        technique, and a weekly strength training routine. Warm up before every \
        session, control the weight through the full range, and stop a squat set \
        when your technique breaks down. "
        .repeat(4);
    format!(
        "<html><head><title>{title}</title>\
         <meta name=\"description\" content=\"{title}: training notes\"></head>\
         <body><main><h1>{title}</h1><p>{body}</p></main></body></html>"
    )
}

/// An off-topic page: long enough, but with no fitness vocabulary.
pub fn off_topic_page(title: &str) -> String {
    let body = "Vintage stamp collecting rewards patience. Catalog pages list rare \
        issues by color and year, collectors trade duplicates at club evenings, \
        and albums stay ordered by country. Humidity is the enemy of old paper, \
        so keep the shelves cool and dry. "
        .repeat(4);
    format!(
        "<html><head><title>{title}</title></head>\
         <body><main><h1>{title}</h1><p>{body}</p></main></body></html>"
    )
}

// ============ Deterministic backends ============

/// Embedder that hashes whitespace tokens into dimension buckets, so cosine
/// similarity tracks token overlap. Stable across processes.
pub struct FakeEmbedder {
    pub dims: usize,
}

impl FakeEmbedder {
    pub fn new() -> Self {
        Self { dims: 64 }
    }
}

#[async_trait]
impl Embedder for FakeEmbedder {
    fn model_name(&self) -> &str {
        "fake-embedding"
    }

    fn dims(&self) -> usize {
        self.dims
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, KbError> {
        Ok(texts
            .iter()
            .map(|text| {
                let mut v = vec![0.0f32; self.dims];
                for token in text.to_lowercase().split_whitespace() {
                    let mut h: usize = 0;
                    for b in token.bytes() {
                        h = h.wrapping_mul(31).wrapping_add(b as usize);
                    }
                    v[h % self.dims] += 1.0;
                }
                v
            })
            .collect())
    }
}

/// Chat backend that records how often it was called and returns a fixed
/// reply. Lets tests assert the fallback path never reaches the model.
pub struct FakeChat {
    pub calls: Arc<AtomicUsize>,
    pub reply: String,
}

impl FakeChat {
    pub fn new(reply: &str) -> (Self, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        (
            Self {
                calls: calls.clone(),
                reply: reply.to_string(),
            },
            calls,
        )
    }
}

#[async_trait]
impl ChatModel for FakeChat {
    fn model_name(&self) -> &str {
        "fake-chat"
    }

    async fn complete(&self, _prompt: &str) -> Result<String, KbError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.reply.clone())
    }
}

// ============ Config helper ============

/// Config pointed at a temp store and the fixture server, with short
/// fetch timings so tests stay fast.
pub fn test_config(store_dir: &Path, base_url: &str, article_names: &[&str]) -> Config {
    let mut config = Config::default();
    config.store.dir = store_dir.to_path_buf();
    config.fetcher.batch_delay_ms = 50;
    config.fetcher.timeout_secs = 5;
    config.sources.urls = article_names
        .iter()
        .map(|name| format!("{}/article/{}", base_url, name))
        .collect();
    config
}
