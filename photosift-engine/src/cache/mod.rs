//! Predictive content cache
//!
//! Keeps a bounded window of full-resolution content resident around the
//! cursor so the interactive path never waits on the media source. The window
//! has two tiers: the current and next item load at immediate priority, the
//! surrounding lookahead range loads as background prefetch. Two async
//! workers drain a shared priority queue; eviction drops content more than a
//! configured distance behind the cursor.
//!
//! Nothing here is persisted. A cold process starts with an empty cache and
//! rebuilds the window from the first `set_window` call.

mod loader;

pub use loader::{LoadPriority, LoadQueue, LoadRequest};

use crate::error::Result;
use crate::source::{DynMediaSource, MediaContent};
use photosift_common::events::{EventBus, SiftEvent};
use photosift_common::model::TriageItem;
use photosift_common::time::now;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, trace, warn};

/// Worker count for the load pool
const LOAD_WORKERS: usize = 2;

/// Residency and in-flight bookkeeping, behind one lock
///
/// Queried from the interactive path and mutated from worker completions;
/// the lock is never held across an await.
#[derive(Default)]
struct CacheState {
    resident: HashMap<String, Arc<MediaContent>>,
    in_flight: HashSet<String>,
}

/// Cache configuration knobs
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Items prefetched ahead of the cursor
    pub lookahead: usize,
    /// Distance behind the cursor past which content is evicted
    pub evict_distance: usize,
    /// Content size hint passed to the source (long edge, pixels)
    pub target_size: u32,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            lookahead: 10,
            evict_distance: 15,
            target_size: 1800,
        }
    }
}

/// Windowed predictive cache keyed by item id
pub struct PredictiveCache {
    state: Mutex<CacheState>,
    queue: Arc<LoadQueue>,
    source: DynMediaSource,
    event_bus: Arc<EventBus>,
    config: CacheConfig,
    workers_running: AtomicBool,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl PredictiveCache {
    pub fn new(source: DynMediaSource, config: CacheConfig, event_bus: Arc<EventBus>) -> Self {
        Self {
            state: Mutex::new(CacheState::default()),
            queue: Arc::new(LoadQueue::new()),
            source,
            event_bus,
            config,
            workers_running: AtomicBool::new(false),
            workers: Mutex::new(Vec::new()),
        }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    // ========================================================================
    // Workers
    // ========================================================================

    /// Spawn the load workers; idempotent
    pub fn start_workers(self: &Arc<Self>) {
        if self.workers_running.swap(true, Ordering::SeqCst) {
            warn!("Cache load workers already running");
            return;
        }

        let mut handles = Vec::with_capacity(LOAD_WORKERS);
        for worker_id in 0..LOAD_WORKERS {
            let cache = Arc::clone(self);
            handles.push(tokio::spawn(async move {
                debug!("Cache load worker {} started", worker_id);
                while let Some(request) = cache.queue.next().await {
                    cache.run_load(request).await;
                }
                debug!("Cache load worker {} exiting", worker_id);
            }));
        }

        if let Ok(mut slot) = self.workers.lock() {
            *slot = handles;
        }
    }

    /// Stop the workers and drop all cached content
    pub async fn shutdown(&self) {
        self.queue.stop();
        self.workers_running.store(false, Ordering::SeqCst);

        let handles = self
            .workers
            .lock()
            .map(|mut slot| std::mem::take(&mut *slot))
            .unwrap_or_default();
        for handle in handles {
            let _ = handle.await;
        }

        self.clear_all();
        debug!("Cache shut down");
    }

    /// Execute one queued load
    ///
    /// A request whose id became resident (or got evicted from the in-flight
    /// set) while queued is a no-op. Failures leave the id unresident; the
    /// next window recompute retries it.
    async fn run_load(&self, request: LoadRequest) {
        {
            let state = match self.state.lock() {
                Ok(state) => state,
                Err(_) => return,
            };
            if state.resident.contains_key(&request.id) || !state.in_flight.contains(&request.id)
            {
                return;
            }
        }

        let loaded = self
            .source
            .load_content(&request.id, self.config.target_size, request.priority)
            .await;

        match loaded {
            Ok(content) => {
                let retained = {
                    let mut state = match self.state.lock() {
                        Ok(state) => state,
                        Err(_) => return,
                    };
                    // An evict/clear while the load was in flight withdraws
                    // the request; drop the bytes instead of resurrecting it
                    if state.in_flight.remove(&request.id) {
                        state.resident.insert(request.id.clone(), Arc::new(content));
                        true
                    } else {
                        false
                    }
                };
                if retained {
                    trace!("Content resident for '{}' ({:?})", request.id, request.priority);
                    self.event_bus.emit_lossy(SiftEvent::ContentReady {
                        id: request.id,
                        timestamp: now(),
                    });
                }
            }
            Err(e) => {
                if let Ok(mut state) = self.state.lock() {
                    state.in_flight.remove(&request.id);
                }
                warn!("Content load failed for '{}': {}", request.id, e);
                self.event_bus.emit_lossy(SiftEvent::ContentLoadFailed {
                    id: request.id,
                    error: e.to_string(),
                    timestamp: now(),
                });
            }
        }
    }

    // ========================================================================
    // Window management
    // ========================================================================

    /// Recompute the desired window around `center` and request what's missing
    ///
    /// Immediate tier: the center item and the one after it. Background tier:
    /// one behind through `lookahead` ahead. Ids already resident or already
    /// in flight are skipped, so repeated recomputes are idempotent.
    pub fn set_window(&self, center: usize, items: &[TriageItem]) {
        if items.is_empty() {
            return;
        }

        let mut wanted: Vec<(usize, LoadPriority)> = Vec::new();
        wanted.push((center, LoadPriority::Immediate));
        wanted.push((center + 1, LoadPriority::Next));

        let low = center.saturating_sub(1);
        let high = center + self.config.lookahead;
        for index in low..=high {
            if index != center && index != center + 1 {
                wanted.push((index, LoadPriority::Prefetch));
            }
        }

        let mut submitted = 0;
        {
            let mut state = match self.state.lock() {
                Ok(state) => state,
                Err(_) => return,
            };
            for (index, priority) in wanted {
                let Some(item) = items.get(index) else { continue };
                if state.resident.contains_key(&item.id) || state.in_flight.contains(&item.id) {
                    continue;
                }
                state.in_flight.insert(item.id.clone());
                self.queue.submit(item.id.clone(), priority);
                submitted += 1;
            }
        }

        if submitted > 0 {
            trace!("Window recompute at {} queued {} loads", center, submitted);
        }
    }

    /// Drop content more than `evict_distance` behind the cursor
    ///
    /// In-flight requests for evicted indices are withdrawn too, so a slow
    /// load cannot re-populate an index the cursor left behind.
    pub fn evict_behind(&self, cursor: usize, items: &[TriageItem]) {
        let Some(cutoff) = cursor.checked_sub(self.config.evict_distance) else {
            return;
        };

        let mut dropped = 0;
        if let Ok(mut state) = self.state.lock() {
            for item in items.iter().take(cutoff) {
                if state.resident.remove(&item.id).is_some() {
                    dropped += 1;
                }
                state.in_flight.remove(&item.id);
            }
        }
        if dropped > 0 {
            debug!("Evicted {} cached items behind index {}", dropped, cutoff);
        }
    }

    /// Release every cached entry and withdraw pending loads
    pub fn clear_all(&self) {
        self.queue.clear();
        if let Ok(mut state) = self.state.lock() {
            let had = state.resident.len();
            state.resident.clear();
            state.in_flight.clear();
            if had > 0 {
                debug!("Cleared {} cached items", had);
            }
        }
    }

    // ========================================================================
    // Queries
    // ========================================================================

    /// Whether content for an id is ready to show instantly
    pub fn is_resident(&self, id: &str) -> bool {
        self.state
            .lock()
            .map(|state| state.resident.contains_key(id))
            .unwrap_or(false)
    }

    /// Resident content for an id, if any
    pub fn content(&self, id: &str) -> Option<Arc<MediaContent>> {
        self.state
            .lock()
            .ok()
            .and_then(|state| state.resident.get(id).cloned())
    }

    /// Resident content for an id, loading it directly when absent
    ///
    /// The direct load runs at immediate priority and the result is kept
    /// resident, so a cache miss on the visible item self-heals.
    pub async fn fetch(&self, id: &str) -> Result<Arc<MediaContent>> {
        if let Some(content) = self.content(id) {
            return Ok(content);
        }

        let content = Arc::new(
            self.source
                .load_content(id, self.config.target_size, LoadPriority::Immediate)
                .await?,
        );
        if let Ok(mut state) = self.state.lock() {
            state.in_flight.remove(id);
            state.resident.insert(id.to_string(), Arc::clone(&content));
        }
        Ok(content)
    }

    pub fn resident_count(&self) -> usize {
        self.state.lock().map(|state| state.resident.len()).unwrap_or(0)
    }

    pub fn in_flight_count(&self) -> usize {
        self.state.lock().map(|state| state.in_flight.len()).unwrap_or(0)
    }

    /// Pending loads not yet picked up by a worker
    pub fn queued_count(&self) -> usize {
        self.queue.len()
    }
}
