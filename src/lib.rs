//! # Workout Knowledge Base
//!
//! A fitness knowledge base with retrieval-augmented question answering.
//!
//! The pipeline crawls a curated list of fitness articles, filters them for
//! relevance, embeds the accepted content into a persisted vector index, and
//! answers natural-language questions by retrieving the closest passages and
//! conditioning a chat model on them.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌──────────┐   ┌─────────────┐
//! │ Fetcher  │──▶│  Filter  │──▶│  Knowledge   │  build path
//! │ HTTP+HTML│   │ keywords │   │  Index       │
//! └──────────┘   └──────────┘   │ vectors+json │
//!                               └──────┬──────┘
//!                                      │ top-k
//!                 ┌──────────┐   ┌─────▼──────┐
//!      question ─▶│Orchestr. │──▶│  Answerer   │──▶ chat model ─▶ answer
//!                 └──────────┘   └────────────┘   query path
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! wkb init                         # crawl sources and build the index
//! wkb ask "How do I squat safely?" # answer a question
//! wkb ask --type workout "a 3-day beginner split"
//! wkb status                       # readiness and index info
//! wkb serve                        # start the question-answering API
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types |
//! | [`fetch`] | Content fetcher (HTTP + HTML extraction) |
//! | [`filter`] | Fitness relevance filter |
//! | [`embedding`] | Embedding boundary and vector math |
//! | [`llm`] | Chat-completion boundary |
//! | [`index`] | Persisted vector similarity index |
//! | [`answer`] | Retrieval-augmented answerer |
//! | [`kb`] | Knowledge base orchestrator |
//! | [`server`] | Question-answering HTTP API |
//! | [`error`] | Typed pipeline errors |

pub mod answer;
pub mod config;
pub mod embedding;
pub mod error;
pub mod fetch;
pub mod filter;
pub mod index;
pub mod kb;
pub mod llm;
pub mod models;
pub mod server;
