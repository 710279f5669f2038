//! Storage abstraction layer for knowledge entries
//!
//! This module defines the record type kept by the retriever and the trait every
//! storage backend implements. Retrieval logic only talks to [`KnowledgeStore`],
//! so the index can be driven by the SQLite backend in production and by
//! wrappers around it in tests.
//!
//! ## Key Components
//!
//! - **KnowledgeEntry**: One key/content record with its access statistics
//! - **KnowledgeStore**: Insert, scan and access-statistics operations
//! - **SqliteStore**: SQLite implementation (see [`sqlite_store`])
//!
//! Entries are append-only. Nothing in this layer edits `key_text` or `content`
//! after insertion, and nothing deletes rows.

use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashSet;

pub mod sqlite_store;

/// Database ID for a knowledge entry.
pub type EntryId = i64;

/// Stored knowledge record.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KnowledgeEntry {
    pub id: EntryId,
    #[serde(rename = "key")]
    pub key_text: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub last_accessed: Option<DateTime<Utc>>,
    pub access_count: i64,
}

/// Durable storage for knowledge entries.
///
/// Implementations must serialize mutations and full-table reads against each
/// other so that a scan never observes a half-written insert.
#[async_trait]
pub trait KnowledgeStore: Send + Sync {
    /// Validate and append a new entry, returning its ID
    async fn insert(&self, key_text: &str, content: &str) -> Result<EntryId>;

    /// Snapshot of every entry, ordered by ID ascending
    async fn all_entries(&self) -> Result<Vec<KnowledgeEntry>>;

    /// Every distinct `key_text` currently stored, as written
    async fn distinct_key_texts(&self) -> Result<HashSet<String>>;

    /// Stamp `last_accessed` and bump `access_count` for the given IDs.
    /// Unknown IDs are skipped.
    async fn record_access(&self, ids: &[EntryId], at: DateTime<Utc>) -> Result<()>;

    /// Get a specific entry by ID
    async fn get_entry(&self, id: EntryId) -> Result<Option<KnowledgeEntry>>;

    /// Number of stored entries
    async fn entry_count(&self) -> Result<usize>;
}

/// Reject empty or whitespace-only fields before anything is written.
pub(crate) fn validate_entry(key_text: &str, content: &str) -> Result<()> {
    if key_text.trim().is_empty() {
        return Err(crate::error::KnowledgeError::empty_field("key_text"));
    }
    if content.trim().is_empty() {
        return Err(crate::error::KnowledgeError::empty_field("content"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_entry() {
        assert!(validate_entry("rust", "rust is fast").is_ok());

        let err = validate_entry("", "content").unwrap_err();
        assert!(err.is_validation());
        assert!(err.to_string().contains("key_text"));

        let err = validate_entry("key", "  \n").unwrap_err();
        assert!(err.is_validation());
        assert!(err.to_string().contains("content"));
    }
}
