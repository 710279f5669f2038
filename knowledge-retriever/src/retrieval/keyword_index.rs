//! Gate-then-rank search over a [`KnowledgeStore`].
//!
//! [`RetrievalIndex`] keeps an in-memory set of lowercased key texts. Every
//! search first checks whether any of those keywords occurs in the query; if
//! none does, the search returns nothing without touching the store. Only
//! queries that pass this gate pay for the linear scan and scoring pass.
//!
//! ## Cache freshness
//!
//! The keyword cache is a best-effort relevance filter. It is rebuilt wholesale:
//!
//! - when the index is constructed,
//! - after every insert made through [`RetrievalIndex::add_entry`],
//! - on the first gate check after the refresh interval has elapsed,
//! - whenever a caller invokes [`RetrievalIndex::ensure_fresh`] with `force`.
//!
//! Entries written to the store directly (bypassing the index) become visible to
//! the gate at the latest one refresh interval later, or immediately after a
//! forced refresh.
//!
//! ## Concurrency
//!
//! Gate checks take a shared read lock on the cache only. Rebuilds are
//! serialized by a separate mutex and read the store after acquiring it, so the
//! last rebuild to publish always saw every insert committed before it started.
//! A gate check running concurrently with a rebuild can still miss a keyword
//! inserted a moment earlier; that window is accepted eventual consistency.

use super::scoring::{QueryTerms, ScoreWeights, score};
use crate::clock::{Clock, SystemClock};
use crate::config::RetrieverConfig;
use crate::error::Result;
use crate::storage::sqlite_store::SqliteStore;
use crate::storage::{EntryId, KnowledgeStore};
use chrono::{DateTime, TimeDelta, Utc};
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info};

/// One ranked search hit.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredEntry {
    pub id: EntryId,
    #[serde(rename = "key")]
    pub key_text: String,
    pub content: String,
    pub score: f64,
}

/// Point-in-time copy of the keyword cache.
#[derive(Debug, Clone, Serialize)]
pub struct KeywordSnapshot {
    pub count: usize,
    /// Lowercased keywords, sorted
    pub keywords: Vec<String>,
    pub last_refreshed: DateTime<Utc>,
}

#[derive(Debug)]
struct KeywordCache {
    keywords: HashSet<String>,
    last_refreshed: DateTime<Utc>,
}

/// Keyword gate plus scored ranking over a knowledge store.
pub struct RetrievalIndex {
    store: Arc<dyn KnowledgeStore>,
    clock: Arc<dyn Clock>,
    weights: ScoreWeights,
    refresh_interval: TimeDelta,
    default_top_n: usize,
    cache: RwLock<KeywordCache>,
    refresh_lock: Mutex<()>,
}

impl RetrievalIndex {
    /// Open the SQLite store described by `config` and build an index over it.
    pub async fn open(config: &RetrieverConfig) -> Result<Self> {
        let store = SqliteStore::open(config).await?;
        Self::new(Arc::new(store), config).await
    }

    /// Build an index over `store` using the system clock.
    pub async fn new(store: Arc<dyn KnowledgeStore>, config: &RetrieverConfig) -> Result<Self> {
        Self::with_clock(store, config, Arc::new(SystemClock)).await
    }

    /// Build an index with an explicit time source. The keyword cache is loaded
    /// before this returns.
    pub async fn with_clock(
        store: Arc<dyn KnowledgeStore>,
        config: &RetrieverConfig,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        let last_refreshed = clock.now();
        let keywords = lowercase_all(store.distinct_key_texts().await?);
        info!("Keyword cache loaded, {} keywords", keywords.len());

        Ok(Self {
            store,
            clock,
            weights: ScoreWeights::DEFAULT,
            refresh_interval: config.refresh_interval(),
            default_top_n: config.default_top_n,
            cache: RwLock::new(KeywordCache {
                keywords,
                last_refreshed,
            }),
            refresh_lock: Mutex::new(()),
        })
    }

    pub fn store(&self) -> &Arc<dyn KnowledgeStore> {
        &self.store
    }

    pub fn refresh_interval(&self) -> TimeDelta {
        self.refresh_interval
    }

    pub fn default_top_n(&self) -> usize {
        self.default_top_n
    }

    pub async fn last_refreshed(&self) -> DateTime<Utc> {
        self.cache.read().await.last_refreshed
    }

    /// Whether the next gate check would rebuild the cache.
    pub async fn is_stale(&self) -> bool {
        let last_refreshed = self.cache.read().await.last_refreshed;
        self.clock.now() - last_refreshed > self.refresh_interval
    }

    /// Rebuild the keyword cache if forced or stale. Returns whether a rebuild happened.
    pub async fn ensure_fresh(&self, force: bool) -> Result<bool> {
        if !force && !self.is_stale().await {
            return Ok(false);
        }

        let _refresh = self.refresh_lock.lock().await;
        // Someone else may have rebuilt while we waited for the lock
        if !force && !self.is_stale().await {
            return Ok(false);
        }

        let now = self.clock.now();
        let keywords = lowercase_all(self.store.distinct_key_texts().await?);

        let mut cache = self.cache.write().await;
        cache.keywords = keywords;
        cache.last_refreshed = now;
        info!(
            force,
            "Keyword cache refreshed, {} keywords",
            cache.keywords.len()
        );
        Ok(true)
    }

    /// True iff some cached keyword occurs in the lowercased query.
    pub async fn contains_keyword(&self, query: &str) -> Result<bool> {
        self.ensure_fresh(false).await?;
        let query = query.to_lowercase();
        let cache = self.cache.read().await;
        Ok(cache
            .keywords
            .iter()
            .any(|keyword| query.contains(keyword.as_str())))
    }

    /// Search with the configured default result count.
    pub async fn search(&self, query: &str) -> Result<Vec<ScoredEntry>> {
        self.search_top(query, self.default_top_n).await
    }

    /// Return up to `top_n` entries ranked by score, best first.
    ///
    /// Queries that fail the keyword gate return an empty list without
    /// scanning the store. Entries returned here have their access statistics
    /// bumped; entries that scored but fell outside `top_n` do not.
    pub async fn search_top(&self, query: &str, top_n: usize) -> Result<Vec<ScoredEntry>> {
        if !self.contains_keyword(query).await? {
            debug!(query, "Query contains no known keyword, skipping scan");
            return Ok(Vec::new());
        }

        let terms = QueryTerms::new(query);
        let entries = self.store.all_entries().await?;

        let mut results: Vec<ScoredEntry> = entries
            .into_iter()
            .filter_map(|entry| {
                let score = score(&terms, &entry.key_text, &entry.content, &self.weights);
                (score > 0.0).then(|| ScoredEntry {
                    id: entry.id,
                    key_text: entry.key_text,
                    content: entry.content,
                    score,
                })
            })
            .collect();
        let matched = results.len();

        // Stable sort keeps id order among equal scores
        results.sort_by(|a, b| b.score.total_cmp(&a.score));
        results.truncate(top_n);

        if !results.is_empty() {
            let ids: Vec<EntryId> = results.iter().map(|r| r.id).collect();
            self.store.record_access(&ids, self.clock.now()).await?;
        }

        info!(
            "Found {} matching entries, returning {}",
            matched,
            results.len()
        );
        Ok(results)
    }

    /// Insert an entry and force a cache rebuild so its keyword gates immediately.
    pub async fn add_entry(&self, key_text: &str, content: &str) -> Result<EntryId> {
        let id = self.store.insert(key_text, content).await?;
        self.ensure_fresh(true).await?;
        Ok(id)
    }

    /// Copy of the current keyword cache. Does not refresh.
    pub async fn keyword_snapshot(&self) -> KeywordSnapshot {
        let cache = self.cache.read().await;
        let mut keywords: Vec<String> = cache.keywords.iter().cloned().collect();
        keywords.sort();
        KeywordSnapshot {
            count: keywords.len(),
            keywords,
            last_refreshed: cache.last_refreshed,
        }
    }
}

fn lowercase_all(keys: HashSet<String>) -> HashSet<String> {
    keys.into_iter().map(|key| key.to_lowercase()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::error::KnowledgeError;
    use crate::storage::KnowledgeEntry;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use tracing_test::traced_test;

    /// Wraps a store and counts the reads the index issues against it. Scans
    /// and access updates can be switched to fail.
    struct CountingStore {
        inner: SqliteStore,
        key_reads: AtomicUsize,
        scans: AtomicUsize,
        fail_scans: AtomicBool,
        fail_access: AtomicBool,
    }

    fn storage_failure() -> KnowledgeError {
        KnowledgeError::from(sqlx::Error::PoolClosed)
    }

    impl CountingStore {
        async fn new() -> Result<Self> {
            Ok(Self {
                inner: SqliteStore::open_memory().await?,
                key_reads: AtomicUsize::new(0),
                scans: AtomicUsize::new(0),
                fail_scans: AtomicBool::new(false),
                fail_access: AtomicBool::new(false),
            })
        }
    }

    #[async_trait]
    impl KnowledgeStore for CountingStore {
        async fn insert(&self, key_text: &str, content: &str) -> Result<EntryId> {
            self.inner.insert(key_text, content).await
        }

        async fn all_entries(&self) -> Result<Vec<KnowledgeEntry>> {
            self.scans.fetch_add(1, Ordering::SeqCst);
            if self.fail_scans.load(Ordering::SeqCst) {
                return Err(storage_failure());
            }
            self.inner.all_entries().await
        }

        async fn distinct_key_texts(&self) -> Result<HashSet<String>> {
            self.key_reads.fetch_add(1, Ordering::SeqCst);
            self.inner.distinct_key_texts().await
        }

        async fn record_access(&self, ids: &[EntryId], at: DateTime<Utc>) -> Result<()> {
            if self.fail_access.load(Ordering::SeqCst) {
                return Err(storage_failure());
            }
            self.inner.record_access(ids, at).await
        }

        async fn get_entry(&self, id: EntryId) -> Result<Option<KnowledgeEntry>> {
            self.inner.get_entry(id).await
        }

        async fn entry_count(&self) -> Result<usize> {
            self.inner.entry_count().await
        }
    }

    async fn fixture() -> anyhow::Result<(Arc<CountingStore>, Arc<ManualClock>, RetrievalIndex)> {
        let store = Arc::new(CountingStore::new().await?);
        let start = DateTime::from_timestamp(1_700_000_000, 0).unwrap();
        let clock = Arc::new(ManualClock::new(start));
        let index =
            RetrievalIndex::with_clock(store.clone(), &RetrieverConfig::default(), clock.clone())
                .await?;
        Ok((store, clock, index))
    }

    #[tokio::test]
    async fn test_gate_does_not_requery_within_interval() -> anyhow::Result<()> {
        let (store, clock, index) = fixture().await?;
        assert_eq!(store.key_reads.load(Ordering::SeqCst), 1);
        let refreshed = index.last_refreshed().await;

        for _ in 0..5 {
            index.contains_keyword("anything at all").await?;
            clock.advance(TimeDelta::minutes(10));
        }

        assert_eq!(store.key_reads.load(Ordering::SeqCst), 1);
        assert_eq!(index.last_refreshed().await, refreshed);
        Ok(())
    }

    #[tokio::test]
    async fn test_search_surfaces_storage_failures() -> anyhow::Result<()> {
        let (store, _clock, index) = fixture().await?;
        let id = index.add_entry("python", "python is a language").await?;

        store.fail_scans.store(true, Ordering::SeqCst);
        let err = index.search_top("tell me about python", 3).await.unwrap_err();
        assert!(err.is_storage());
        store.fail_scans.store(false, Ordering::SeqCst);

        store.fail_access.store(true, Ordering::SeqCst);
        let err = index.search_top("tell me about python", 3).await.unwrap_err();
        assert!(err.is_storage());
        store.fail_access.store(false, Ordering::SeqCst);

        let entry = store.inner.get_entry(id).await?.unwrap();
        assert_eq!(entry.access_count, 0);
        assert!(entry.last_accessed.is_none());

        assert_eq!(index.search_top("tell me about python", 3).await?.len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_stale_cache_rebuilds_only_past_interval() -> anyhow::Result<()> {
        let (store, clock, index) = fixture().await?;
        store.inner.insert("tokio", "async runtime").await?;

        clock.advance(TimeDelta::seconds(3600));
        assert!(!index.is_stale().await);
        assert!(!index.contains_keyword("what is tokio").await?);

        clock.advance(TimeDelta::seconds(1));
        assert!(index.is_stale().await);
        assert!(index.contains_keyword("what is tokio").await?);
        assert_eq!(store.key_reads.load(Ordering::SeqCst), 2);
        assert_eq!(index.last_refreshed().await, clock.now());
        Ok(())
    }

    #[tokio::test]
    async fn test_forced_refresh_sees_direct_insert() -> anyhow::Result<()> {
        let (store, _clock, index) = fixture().await?;
        store.inner.insert("Serde", "serialization framework").await?;
        assert!(!index.contains_keyword("how does serde work").await?);

        assert!(index.ensure_fresh(true).await?);
        assert!(index.contains_keyword("how does serde work").await?);
        Ok(())
    }

    #[tokio::test]
    async fn test_add_entry_gates_immediately() -> anyhow::Result<()> {
        let (_store, _clock, index) = fixture().await?;
        index.add_entry("Borrow Checker", "enforces aliasing rules").await?;

        let snapshot = index.keyword_snapshot().await;
        assert_eq!(snapshot.keywords, vec!["borrow checker".to_string()]);
        assert!(index.contains_keyword("explain the BORROW CHECKER").await?);
        Ok(())
    }

    #[tokio::test]
    async fn test_gate_miss_skips_scan_and_stats() -> anyhow::Result<()> {
        let (store, _clock, index) = fixture().await?;
        let id = index.add_entry("python", "python is a language").await?;

        let results = index.search("what time is it").await?;
        assert!(results.is_empty());
        assert_eq!(store.scans.load(Ordering::SeqCst), 0);
        assert_eq!(store.get_entry(id).await?.unwrap().access_count, 0);
        Ok(())
    }

    #[tokio::test]
    async fn test_ties_keep_id_order_and_top_n_limits_stats() -> anyhow::Result<()> {
        let (store, clock, index) = fixture().await?;
        let a = index.add_entry("alpha", "first").await?;
        let b = index.add_entry("alpha", "second").await?;
        let c = index.add_entry("alpha", "third").await?;

        let results = index.search_top("alpha", 2).await?;
        let ids: Vec<EntryId> = results.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![a, b]);
        assert_eq!(results[0].score, results[1].score);

        let now = clock.now();
        assert_eq!(store.get_entry(a).await?.unwrap().last_accessed, Some(now));
        assert_eq!(store.get_entry(b).await?.unwrap().access_count, 1);
        let skipped = store.get_entry(c).await?.unwrap();
        assert_eq!(skipped.access_count, 0);
        assert!(skipped.last_accessed.is_none());
        Ok(())
    }

    #[tokio::test]
    async fn test_zero_top_n_returns_nothing() -> anyhow::Result<()> {
        let (store, _clock, index) = fixture().await?;
        let id = index.add_entry("alpha", "first").await?;

        assert!(index.search_top("alpha", 0).await?.is_empty());
        assert_eq!(store.get_entry(id).await?.unwrap().access_count, 0);
        Ok(())
    }

    #[traced_test]
    #[tokio::test]
    async fn test_refresh_is_logged() -> anyhow::Result<()> {
        let (_store, _clock, index) = fixture().await?;
        index.add_entry("wal", "write ahead log").await?;
        assert!(logs_contain("Keyword cache refreshed, 1 keywords"));
        Ok(())
    }
}
