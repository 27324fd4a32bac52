//! Async key → resource cache with request deduplication.
//!
//! Each key has at most one in-flight load, shared by every caller through a
//! [`Shared`] future. A failed load is remembered until the next request for
//! the same key, which starts a fresh attempt.

use super::loader::{LoadError, ResourceFetcher};
use super::source::TileSource;
use crate::core::geo::{TileKey, TileWindow};
use crate::prelude::{Arc, Mutex};
use crate::traits::CacheStats;
use futures::future::{join_all, BoxFuture, FutureExt, Shared};
use lru::LruCache;
use std::num::NonZeroUsize;
use std::sync::{MutexGuard, PoisonError};

/// Output of a load, shared between every awaiter of the same attempt.
pub type LoadResult<R> = Result<Arc<R>, LoadError>;

/// Future returned by [`TileCache::request`].
pub type TileLoad<R> = Shared<BoxFuture<'static, LoadResult<R>>>;

/// Lifecycle of a cache entry.
#[derive(Debug)]
pub enum TileStatus<R> {
    Pending,
    Loaded(Arc<R>),
    Failed(LoadError),
}

impl<R> Clone for TileStatus<R> {
    fn clone(&self) -> Self {
        match self {
            TileStatus::Pending => TileStatus::Pending,
            TileStatus::Loaded(resource) => TileStatus::Loaded(Arc::clone(resource)),
            TileStatus::Failed(err) => TileStatus::Failed(err.clone()),
        }
    }
}

impl<R> TileStatus<R> {
    pub fn is_pending(&self) -> bool {
        matches!(self, TileStatus::Pending)
    }
}

struct CacheEntry<R> {
    status: TileStatus<R>,
    attempt: u64,
    load: TileLoad<R>,
}

struct CacheState<R> {
    entries: LruCache<TileKey, CacheEntry<R>>,
    next_attempt: u64,
    stats: CacheStats,
}

/// Summary of an [`TileCache::ensure_window_loaded`] batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WindowReport {
    pub requested: usize,
    pub loaded: usize,
    pub failed: usize,
}

/// Generic async tile cache, used for raster tiles and JSON marker tiles alike.
pub struct TileCache<R> {
    state: Arc<Mutex<CacheState<R>>>,
    source: Arc<dyn TileSource>,
    fetcher: Arc<dyn ResourceFetcher<Resource = R>>,
    margin: u32,
}

impl<R> Clone for TileCache<R> {
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
            source: Arc::clone(&self.source),
            fetcher: Arc::clone(&self.fetcher),
            margin: self.margin,
        }
    }
}

impl<R: Send + Sync + 'static> TileCache<R> {
    /// Create a cache. `capacity = None` keeps every entry for the session.
    pub fn new(
        source: Arc<dyn TileSource>,
        fetcher: Arc<dyn ResourceFetcher<Resource = R>>,
        capacity: Option<usize>,
        margin: u32,
    ) -> Self {
        let entries = match capacity.and_then(NonZeroUsize::new) {
            Some(cap) => LruCache::new(cap),
            None => LruCache::unbounded(),
        };
        Self {
            state: Arc::new(Mutex::new(CacheState {
                entries,
                next_attempt: 0,
                stats: CacheStats::default(),
            })),
            source,
            fetcher,
            margin,
        }
    }

    /// Request a tile. Concurrent requests for the same key share one fetch;
    /// a previously failed key gets a fresh attempt.
    pub fn request(&self, key: TileKey) -> TileLoad<R> {
        let mut guard = self.lock_state();
        let state = &mut *guard;

        if let Some(entry) = state.entries.get(&key) {
            match &entry.status {
                TileStatus::Pending | TileStatus::Loaded(_) => {
                    let load = entry.load.clone();
                    state.stats.hits += 1;
                    log::debug!("tile {:?} served from cache", key);
                    return load;
                }
                TileStatus::Failed(err) => {
                    log::debug!("retrying tile {:?} after failure: {}", key, err);
                }
            }
        }

        state.stats.misses += 1;
        state.stats.fetches += 1;
        let attempt = state.next_attempt;
        state.next_attempt += 1;

        let load = self.start_load(key, attempt);
        let evicted = state.entries.push(
            key,
            CacheEntry {
                status: TileStatus::Pending,
                attempt,
                load: load.clone(),
            },
        );
        if let Some((evicted_key, _)) = evicted {
            if evicted_key != key {
                state.stats.evictions += 1;
                log::debug!("evicted tile {:?}", evicted_key);
            }
        }
        state.stats.size = state.entries.len();
        drop(guard);
        self.drive(load.clone());
        load
    }

    /// Poll a fresh load on the runtime so it settles into the cache even
    /// when every caller drops its handle.
    #[cfg(feature = "tokio-runtime")]
    fn drive(&self, load: TileLoad<R>) {
        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            handle.spawn(load.map(|_| ()));
        }
    }

    #[cfg(not(feature = "tokio-runtime"))]
    fn drive(&self, _load: TileLoad<R>) {}

    fn lock_state(&self) -> MutexGuard<'_, CacheState<R>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn start_load(&self, key: TileKey, attempt: u64) -> TileLoad<R> {
        let url = self.source.url(key);
        let fetcher = Arc::clone(&self.fetcher);
        let state = Arc::downgrade(&self.state);

        async move {
            let result = fetcher.fetch(&url).await.map(Arc::new);
            match &result {
                Ok(_) => log::debug!("loaded tile {:?} from {}", key, url),
                Err(err) => log::warn!("tile {:?} failed: {}", key, err),
            }
            if let Some(state) = state.upgrade() {
                let mut state = state.lock().unwrap_or_else(PoisonError::into_inner);
                if result.is_err() {
                    state.stats.failures += 1;
                }
                // Only settle the attempt that is still cached under this key.
                if let Some(entry) = state.entries.peek_mut(&key) {
                    if entry.attempt == attempt {
                        entry.status = match &result {
                            Ok(resource) => TileStatus::Loaded(Arc::clone(resource)),
                            Err(err) => TileStatus::Failed(err.clone()),
                        };
                    }
                }
            }
            result
        }
        .boxed()
        .shared()
    }

    /// Request every tile of `window` plus the configured margin and wait for
    /// all of them to settle. Failures are counted, never propagated.
    pub async fn ensure_window_loaded(&self, window: &TileWindow) -> WindowReport {
        let expanded = window.expand(self.margin);
        let mut loads = Vec::with_capacity(expanded.tile_count());
        loads.extend(expanded.keys().map(|key| self.request(key)));
        let mut report = WindowReport {
            requested: loads.len(),
            ..WindowReport::default()
        };
        for result in join_all(loads).await {
            match result {
                Ok(_) => report.loaded += 1,
                Err(_) => report.failed += 1,
            }
        }
        log::debug!(
            "window level {} cols {}..={} rows {}..={}: {:?}",
            expanded.level,
            expanded.col_start,
            expanded.col_end,
            expanded.row_start,
            expanded.row_end,
            report
        );
        report
    }

    /// Non-blocking lookup for the render pass.
    pub fn get_if_loaded(&self, key: TileKey) -> Option<Arc<R>> {
        let mut state = self.lock_state();
        match state.entries.get(&key).map(|e| &e.status) {
            Some(TileStatus::Loaded(resource)) => Some(Arc::clone(resource)),
            _ => None,
        }
    }

    /// Current status of a key without touching its recency.
    pub fn status(&self, key: TileKey) -> Option<TileStatus<R>> {
        let state = self.lock_state();
        state.entries.peek(&key).map(|e| e.status.clone())
    }

    pub fn stats(&self) -> CacheStats {
        self.lock_state().stats.clone()
    }

    pub fn len(&self) -> usize {
        self.lock_state().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn margin(&self) -> u32 {
        self.margin
    }
}
