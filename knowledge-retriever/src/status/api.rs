use crate::error::Result;
use crate::retrieval::keyword_index::RetrievalIndex;

use super::types::*;

/// Number of entries listed in [`IndexStatus::most_accessed`].
pub const MOST_ACCESSED_LIMIT: usize = 5;

/// Main status API implementation
pub struct StatusApi;

impl StatusApi {
    /// Collect a status snapshot.
    ///
    /// Reads the store and the current keyword cache without refreshing the
    /// cache or touching any entry's access statistics.
    pub async fn collect(index: &RetrievalIndex) -> Result<IndexStatus> {
        let entries = index.store().all_entries().await?;
        let snapshot = index.keyword_snapshot().await;

        let total_accesses = entries.iter().map(|e| e.access_count).sum();
        let never_accessed = entries.iter().filter(|e| e.access_count == 0).count();

        let mut accessed: Vec<_> = entries.iter().filter(|e| e.access_count > 0).collect();
        // Stable: equal counts stay in id order
        accessed.sort_by(|a, b| b.access_count.cmp(&a.access_count));
        let most_accessed = accessed
            .into_iter()
            .take(MOST_ACCESSED_LIMIT)
            .map(|e| AccessSummary {
                id: e.id,
                key: e.key_text.clone(),
                access_count: e.access_count,
                last_accessed: e.last_accessed,
            })
            .collect();

        Ok(IndexStatus {
            total_entries: entries.len(),
            keyword_count: snapshot.count,
            last_refreshed: snapshot.last_refreshed,
            refresh_interval_seconds: index.refresh_interval().num_seconds(),
            cache_stale: index.is_stale().await,
            total_accesses,
            never_accessed,
            most_accessed,
        })
    }

    /// Summarize a snapshot into a single health value.
    pub fn health(status: &IndexStatus) -> HealthStatus {
        if status.total_entries == 0 || status.cache_stale {
            HealthStatus::Warning
        } else {
            HealthStatus::Healthy
        }
    }
}
