use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Knowledge base and keyword cache overview
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexStatus {
    /// Total entries stored
    pub total_entries: usize,
    /// Distinct lowercased keywords in the gate cache
    pub keyword_count: usize,
    /// When the keyword cache was last rebuilt
    pub last_refreshed: DateTime<Utc>,
    /// Keyword cache lifetime in seconds
    pub refresh_interval_seconds: i64,
    /// Would the next gate check rebuild the cache?
    pub cache_stale: bool,
    /// Sum of access counts over all entries
    pub total_accesses: i64,
    /// Entries never returned by a search
    pub never_accessed: usize,
    /// Most frequently returned entries, busiest first
    pub most_accessed: Vec<AccessSummary>,
}

/// Access statistics for a single entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessSummary {
    pub id: i64,
    pub key: String,
    pub access_count: i64,
    pub last_accessed: Option<DateTime<Utc>>,
}

/// Overall health derived from the status snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HealthStatus {
    /// Entries present and the gate cache is current
    Healthy,
    /// The store is empty or the cache is due for a rebuild
    Warning,
}
