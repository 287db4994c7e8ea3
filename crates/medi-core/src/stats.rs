//! Per-user study statistics and their read-through cache.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use moka::future::Cache;
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::error::AppError;

/// Default time-to-live for cached statistics.
pub const DEFAULT_STATS_TTL: Duration = Duration::from_secs(300);
const MAX_CACHED_USERS: u64 = 10_000;

/// Aggregated study statistics for one user.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UserStats {
    pub user_id: Uuid,
    pub total_cards: i64,
    pub due_cards: i64,
    pub mastered_cards: i64,
    pub average_confidence: f64,
    pub session_count: i64,
    pub cards_studied: i64,
    pub total_study_secs: i64,
    pub session_accuracy: f64,
    pub quiz_attempts: i64,
    pub average_quiz_score: f64,
    pub xp: i64,
    pub level: i32,
    pub streak_days: i32,
    pub computed_at: DateTime<Utc>,
}

/// Process-wide cache of [`UserStats`] keyed by user id.
///
/// Entries expire `ttl` after insertion. Writes that change a user's
/// statistics must call [`StatsCache::invalidate`].
///
/// Each user has a generation counter bumped by `invalidate`. A value
/// computed under an older generation is never left in the cache.
#[derive(Clone)]
pub struct StatsCache {
    inner: Cache<Uuid, Arc<UserStats>>,
    generations: Arc<Mutex<HashMap<Uuid, u64>>>,
    ttl: Duration,
}

impl StatsCache {
    pub fn new(ttl: Duration) -> Self {
        let inner = Cache::builder()
            .max_capacity(MAX_CACHED_USERS)
            .time_to_live(ttl)
            .build();
        Self {
            inner,
            generations: Arc::default(),
            ttl,
        }
    }

    fn generation(&self, user_id: Uuid) -> u64 {
        let generations = self.generations.lock().unwrap_or_else(|e| e.into_inner());
        generations.get(&user_id).copied().unwrap_or(0)
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Return the cached stats for `user_id`, or compute, store, and return them.
    pub async fn get_or_compute<F, Fut>(
        &self,
        user_id: Uuid,
        compute: F,
    ) -> Result<Arc<UserStats>, AppError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<UserStats, AppError>>,
    {
        if let Some(stats) = self.inner.get(&user_id).await {
            tracing::debug!(%user_id, "Stats cache hit");
            return Ok(stats);
        }

        tracing::debug!(%user_id, "Stats cache miss");
        let started = self.generation(user_id);
        let stats = Arc::new(compute().await?);
        if self.generation(user_id) != started {
            tracing::debug!(%user_id, "Stats invalidated during compute, not caching");
            return Ok(stats);
        }

        self.inner.insert(user_id, stats.clone()).await;
        // An invalidate that raced the insert bumped the generation first.
        if self.generation(user_id) != started {
            self.inner.invalidate(&user_id).await;
        }
        Ok(stats)
    }

    pub async fn invalidate(&self, user_id: Uuid) {
        {
            let mut generations = self.generations.lock().unwrap_or_else(|e| e.into_inner());
            *generations.entry(user_id).or_insert(0) += 1;
        }
        self.inner.invalidate(&user_id).await;
    }

    /// Evict expired entries now.
    pub async fn sweep(&self) {
        self.inner.run_pending_tasks().await;
    }

    pub fn entry_count(&self) -> u64 {
        self.inner.entry_count()
    }

    /// Run [`sweep`](Self::sweep) every `interval` until `cancel` fires.
    pub fn spawn_sweeper(
        &self,
        interval: Duration,
        cancel: CancellationToken,
    ) -> tokio::task::JoinHandle<()> {
        let cache = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        cache.sweep().await;
                        tracing::debug!(entries = cache.entry_count(), "Stats cache swept");
                    }
                    () = cancel.cancelled() => break,
                }
            }
        })
    }
}

impl Default for StatsCache {
    fn default() -> Self {
        Self::new(DEFAULT_STATS_TTL)
    }
}
