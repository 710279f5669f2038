//! knowledge-retriever: keyword-gated knowledge base search
//!
//! This crate stores short key/content knowledge entries in SQLite and answers
//! free-text queries with the best-matching entries. A cheap in-memory keyword
//! gate decides whether a query is worth scanning at all; queries that pass it
//! are scored against every entry with a small set of substring and token
//! overlap heuristics.
//!
//! ## Key Modules
//!
//! - **[`storage`]**: Entry type, the `KnowledgeStore` trait and its SQLite implementation
//! - **[`retrieval`]**: Keyword cache, gate and scored search (`RetrievalIndex`)
//! - **[`status`]**: Diagnostic snapshot of the store and cache
//! - **[`config`]**: Database location, refresh interval and default result count
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use knowledge_retriever::config::RetrieverConfig;
//! use knowledge_retriever::retrieval::keyword_index::RetrievalIndex;
//! use std::path::PathBuf;
//!
//! # async fn example() -> knowledge_retriever::error::Result<()> {
//! let config = RetrieverConfig::new(PathBuf::from("."));
//! let index = RetrievalIndex::open(&config).await?;
//!
//! index.add_entry("python", "python is a language").await?;
//! for hit in index.search("tell me about python").await? {
//!     println!("{:.1} {} {}", hit.score, hit.key_text, hit.content);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! query → keyword gate ──miss──→ []
//!              │ hit
//!              ↓
//!    KnowledgeStore scan → score → stable sort → top-N → record access
//!              ↑
//!    keyword cache ← rebuilt on TTL expiry, insert, or forced refresh
//! ```

pub mod clock;
pub mod config;
pub mod error;
pub mod retrieval;
pub mod status;
pub mod storage;
