//! Test helpers for photosift-engine integration tests
//!
//! Provides a scriptable in-memory media source and a builder that wires a
//! complete engine (store + cache + controller + pacer) over a temp data
//! directory, so tests exercise the same assembly the binary uses.

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, TimeZone, Utc};
use photosift_common::events::EventBus;
use photosift_common::model::Decision;
use photosift_engine::cache::CacheConfig;
use photosift_engine::source::{DynMediaSource, MediaContent, MediaSource, NullLibraryOps, SourceItem};
use photosift_engine::{ContinuousPacer, LoadPriority, PredictiveCache, Result, TriageController, TriageStore};
use std::collections::HashSet;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Scriptable media source: fixed listing, optional per-load delay and
/// per-id failures, with a load counter
pub struct StubMediaSource {
    ids: Mutex<Vec<String>>,
    fail_ids: Mutex<HashSet<String>>,
    load_delay: Duration,
    loads: AtomicUsize,
}

impl StubMediaSource {
    pub fn new(ids: &[&str]) -> Self {
        Self {
            ids: Mutex::new(ids.iter().map(|s| s.to_string()).collect()),
            fail_ids: Mutex::new(HashSet::new()),
            load_delay: Duration::ZERO,
            loads: AtomicUsize::new(0),
        }
    }

    pub fn with_delay(ids: &[&str], delay: Duration) -> Self {
        Self {
            load_delay: delay,
            ..Self::new(ids)
        }
    }

    /// Replace the listing, simulating items vanishing at the source
    pub fn set_ids(&self, ids: &[&str]) {
        *self.ids.lock().unwrap() = ids.iter().map(|s| s.to_string()).collect();
    }

    /// Make loads for one id fail
    pub fn fail_id(&self, id: &str) {
        self.fail_ids.lock().unwrap().insert(id.to_string());
    }

    /// Total load_content calls so far
    pub fn load_count(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MediaSource for StubMediaSource {
    async fn list_items(&self) -> Result<Vec<SourceItem>> {
        // Fixed base time keeps listing order deterministic across calls
        let base = Utc.with_ymd_and_hms(2025, 5, 1, 12, 0, 0).unwrap();
        let ids = self.ids.lock().unwrap().clone();
        Ok(ids
            .iter()
            .enumerate()
            .map(|(i, id)| SourceItem {
                id: id.clone(),
                created_at: base - ChronoDuration::seconds(i as i64),
            })
            .collect())
    }

    async fn load_content(
        &self,
        id: &str,
        _target_size: u32,
        _priority: LoadPriority,
    ) -> Result<MediaContent> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        if !self.load_delay.is_zero() {
            tokio::time::sleep(self.load_delay).await;
        }
        if self.fail_ids.lock().unwrap().contains(id) {
            return Err(photosift_engine::Error::Source(format!(
                "stub has no content for '{}'",
                id
            )));
        }
        Ok(MediaContent {
            id: id.to_string(),
            bytes: id.as_bytes().to_vec(),
        })
    }
}

/// A fully wired engine over a temp (or caller-provided) data directory
pub struct TestEngine {
    pub controller: Arc<TriageController>,
    pub store: Arc<TriageStore>,
    pub cache: Arc<PredictiveCache>,
    pub pacer: ContinuousPacer,
    pub bus: Arc<EventBus>,
    pub source: Arc<StubMediaSource>,
}

impl TestEngine {
    /// Decide the current item `times` times with the same decision
    pub async fn decide_n(&self, decision: Decision, times: usize) {
        for _ in 0..times {
            self.controller.decide(decision).await;
        }
    }

    /// Stop workers and flush state, as the binary does on shutdown
    pub async fn shutdown(&self) {
        self.pacer.stop().await;
        self.cache.shutdown().await;
        self.store.shutdown().await;
    }
}

/// Wire an engine over an existing data directory (restart simulation)
pub fn build_engine_in(data_dir: &Path, source: Arc<StubMediaSource>) -> TestEngine {
    let bus = Arc::new(EventBus::new(64));
    let dyn_source: DynMediaSource = Arc::clone(&source) as DynMediaSource;

    let store = Arc::new(TriageStore::new(
        data_dir,
        // Long autosave: tests drive writes explicitly via save_now/shutdown
        Duration::from_secs(300),
        Arc::clone(&bus),
    ));
    let cache = Arc::new(PredictiveCache::new(
        Arc::clone(&dyn_source),
        CacheConfig::default(),
        Arc::clone(&bus),
    ));
    let controller = Arc::new(TriageController::new(
        Arc::clone(&store),
        Arc::clone(&cache),
        dyn_source,
        Arc::new(NullLibraryOps),
        Arc::clone(&bus),
    ));
    let pacer = ContinuousPacer::new(
        Arc::clone(&controller),
        Duration::from_millis(300),
        Arc::clone(&bus),
    );

    TestEngine {
        controller,
        store,
        cache,
        pacer,
        bus,
        source,
    }
}

/// Fresh engine over a new temp directory
pub fn build_engine(data_dir: &Path, ids: &[&str]) -> TestEngine {
    build_engine_in(data_dir, Arc::new(StubMediaSource::new(ids)))
}

/// Wait until the cache has no queued or in-flight loads
pub async fn drain_cache(cache: &PredictiveCache) {
    for _ in 0..200 {
        if cache.queued_count() == 0 && cache.in_flight_count() == 0 {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!(
        "cache did not drain: {} queued, {} in flight",
        cache.queued_count(),
        cache.in_flight_count()
    );
}
