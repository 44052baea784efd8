//! End-to-end orchestrator scenarios with the fixture article server and
//! deterministic embedding/chat backends.

mod common;

use std::collections::HashMap;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use tempfile::TempDir;

use common::{fitness_page, off_topic_page, spawn_fixture_server, test_config, FakeChat, FakeEmbedder};
use workout_kb::answer::FALLBACK_ANSWER;
use workout_kb::error::KbError;
use workout_kb::kb::KnowledgeBase;
use workout_kb::models::QuestionKind;

const ARTICLES: &[&str] = &[
    "squat-guide",
    "beginner-plan",
    "stamps", // off-topic, filtered out
    "yoga-start",
    "cooking",     // off-topic, filtered out
    "missing-one", // 404s
    "deadlift-form",
];

fn fixture_pages() -> HashMap<String, String> {
    let mut pages = HashMap::new();
    pages.insert("squat-guide".to_string(), fitness_page("Squat Guide"));
    pages.insert("beginner-plan".to_string(), fitness_page("Beginner Plan"));
    pages.insert("stamps".to_string(), off_topic_page("Stamp Collecting"));
    pages.insert("yoga-start".to_string(), fitness_page("Yoga For Starters"));
    pages.insert("cooking".to_string(), off_topic_page("Sunday Roasts"));
    pages.insert("deadlift-form".to_string(), fitness_page("Deadlift Form"));
    pages
}

fn make_kb(store: &TempDir, base_url: &str) -> (Arc<KnowledgeBase>, Arc<std::sync::atomic::AtomicUsize>) {
    let config = test_config(store.path(), base_url, ARTICLES);
    let (chat, calls) = FakeChat::new("Keep your chest up and push through your heels.");
    let kb = KnowledgeBase::with_backends(config, Arc::new(FakeEmbedder::new()), Arc::new(chat))
        .unwrap();
    (Arc::new(kb), calls)
}

#[tokio::test]
async fn test_initialize_builds_and_answers_with_sources() {
    let store = TempDir::new().unwrap();
    let pages = fixture_pages();
    let (base, _) = spawn_fixture_server(pages).await;
    let (kb, chat_calls) = make_kb(&store, &base);

    let outcome = kb.initialize().await;
    assert!(outcome.success, "init failed: {}", outcome.message);
    // 7 URLs: one 404s, two fail the filter
    assert!(outcome.message.contains("4 relevant articles"));

    let response = kb.ask("How do I do a proper squat?").await.unwrap();
    assert!(!response.answer.is_empty());
    assert_eq!(chat_calls.load(Ordering::SeqCst), 1);

    // sources come only from accepted URLs
    assert!(!response.sources.is_empty());
    let accepted: Vec<String> = ["squat-guide", "beginner-plan", "yoga-start", "deadlift-form"]
        .iter()
        .map(|name| format!("{}/article/{}", base, name))
        .collect();
    for source in &response.sources {
        assert!(
            accepted.contains(&source.url),
            "unexpected source {}",
            source.url
        );
        assert!(source.relevance_score.is_some());
    }
}

#[tokio::test]
async fn test_second_initialize_loads_without_recrawl() {
    let store = TempDir::new().unwrap();
    let (base, hits) = spawn_fixture_server(fixture_pages()).await;

    let (first, _) = make_kb(&store, &base);
    assert!(first.initialize().await.success);
    let crawl_hits = hits.load(Ordering::SeqCst);
    assert!(crawl_hits >= ARTICLES.len());

    // fresh instance over the same store: loads, does not fetch
    let (second, _) = make_kb(&store, &base);
    let outcome = second.initialize().await;
    assert!(outcome.success);
    assert!(outcome.message.contains("loaded"));
    assert_eq!(hits.load(Ordering::SeqCst), crawl_hits);

    // and it answers from the loaded store
    let response = second.ask("squat depth").await.unwrap();
    assert!(!response.sources.is_empty());
}

#[tokio::test]
async fn test_query_before_initialize_fails_typed() {
    let store = TempDir::new().unwrap();
    let (base, _) = spawn_fixture_server(HashMap::new()).await;
    let (kb, chat_calls) = make_kb(&store, &base);

    let err = kb.ask("anything").await.unwrap_err();
    assert!(matches!(err, KbError::NotInitialized));
    // no lazy build, no model call
    assert_eq!(chat_calls.load(Ordering::SeqCst), 0);
    assert!(!kb.is_ready().await);
}

#[tokio::test]
async fn test_initialize_with_no_acceptable_content_fails_gracefully() {
    let store = TempDir::new().unwrap();
    // only off-topic pages are served
    let mut pages = HashMap::new();
    pages.insert("stamps".to_string(), off_topic_page("Stamp Collecting"));
    let (base, _) = spawn_fixture_server(pages).await;

    let config = test_config(store.path(), &base, &["stamps", "gone"]);
    let (chat, _) = FakeChat::new("unused");
    let kb = KnowledgeBase::with_backends(config, Arc::new(FakeEmbedder::new()), Arc::new(chat))
        .unwrap();

    let outcome = kb.initialize().await;
    assert!(!outcome.success);
    assert!(outcome.message.contains("no relevant fitness content"));
    assert!(!kb.is_ready().await);
}

#[tokio::test]
async fn test_empty_retrieval_returns_fallback_without_model_call() {
    let store = TempDir::new().unwrap();
    let (base, _) = spawn_fixture_server(fixture_pages()).await;

    // k = 0 forces an empty retrieval set on the general path
    let mut config = test_config(store.path(), &base, ARTICLES);
    config.retrieval.default_k = 0;
    let (chat, calls) = FakeChat::new("should never be used");
    let kb = KnowledgeBase::with_backends(config, Arc::new(FakeEmbedder::new()), Arc::new(chat))
        .unwrap();
    assert!(kb.initialize().await.success);

    let response = kb.ask("How do I squat?").await.unwrap();
    assert_eq!(response.answer, FALLBACK_ANSWER);
    assert!(response.sources.is_empty());
    assert_eq!(response.context, "No relevant context found");
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_typed_questions_route_and_answer() {
    let store = TempDir::new().unwrap();
    let (base, _) = spawn_fixture_server(fixture_pages()).await;
    let (kb, _) = make_kb(&store, &base);
    assert!(kb.initialize().await.success);

    for kind in [
        QuestionKind::General,
        QuestionKind::Workout,
        QuestionKind::Form,
        QuestionKind::Nutrition,
    ] {
        let response = kb.ask_typed(kind, "squat").await.unwrap();
        assert!(!response.answer.is_empty());
        assert!(!response.sources.is_empty());
    }

    // the workout path retrieves with its wider k
    let workout = kb.workout_suggestions("a beginner split").await.unwrap();
    assert!(workout.sources.len() <= 6);
}

#[tokio::test]
async fn test_add_sources_rejects_irrelevant_and_keeps_base() {
    let store = TempDir::new().unwrap();
    let (base, _) = spawn_fixture_server(fixture_pages()).await;
    let (kb, _) = make_kb(&store, &base);
    assert!(kb.initialize().await.success);
    let before = kb.status().await.index_info.record_count;

    let added = kb
        .add_sources(&[format!("{}/article/cooking", base)])
        .await
        .unwrap();
    assert_eq!(added, 0);
    assert_eq!(kb.status().await.index_info.record_count, before);
}

#[tokio::test]
async fn test_add_sources_rebuilds_with_union() {
    let store = TempDir::new().unwrap();
    let mut pages = fixture_pages();
    pages.insert("mobility".to_string(), fitness_page("Mobility Work"));
    let (base, _) = spawn_fixture_server(pages).await;
    let (kb, _) = make_kb(&store, &base);
    assert!(kb.initialize().await.success);
    assert_eq!(kb.status().await.index_info.record_count, 4);

    let added = kb
        .add_sources(&[format!("{}/article/mobility", base)])
        .await
        .unwrap();
    assert_eq!(added, 1);
    assert_eq!(kb.status().await.index_info.record_count, 5);
    assert_eq!(kb.current_sources().len(), ARTICLES.len() + 1);
}

#[tokio::test]
async fn test_add_sources_requires_existing_base() {
    let store = TempDir::new().unwrap();
    let (base, _) = spawn_fixture_server(fixture_pages()).await;
    let (kb, _) = make_kb(&store, &base);

    let err = kb
        .add_sources(&[format!("{}/article/squat-guide", base)])
        .await
        .unwrap_err();
    assert!(matches!(err, KbError::NotInitialized));
}

#[tokio::test]
async fn test_rebuild_replaces_store() {
    let store = TempDir::new().unwrap();
    let (base, _) = spawn_fixture_server(fixture_pages()).await;
    let (kb, _) = make_kb(&store, &base);
    assert!(kb.initialize().await.success);
    assert_eq!(kb.status().await.index_info.record_count, 4);

    // rebuild from a narrower custom list
    let accepted = kb
        .rebuild(Some(vec![format!("{}/article/squat-guide", base)]))
        .await
        .unwrap();
    assert_eq!(accepted, 1);
    assert_eq!(kb.status().await.index_info.record_count, 1);

    // a fresh instance sees the rebuilt store
    let (reloaded, _) = make_kb(&store, &base);
    assert!(reloaded.load_existing().await.unwrap());
    assert_eq!(reloaded.status().await.index_info.record_count, 1);
}

#[tokio::test]
async fn test_status_is_read_only() {
    let store = TempDir::new().unwrap();
    let (base, hits) = spawn_fixture_server(fixture_pages()).await;
    let (kb, _) = make_kb(&store, &base);

    let status = kb.status().await;
    assert!(!status.is_ready);
    assert_eq!(status.index_info.record_count, 0);
    // no fetches, no build
    assert_eq!(hits.load(Ordering::SeqCst), 0);
    assert!(!store.path().join("index.bin").exists());
}
