//! Continuous-action pacer
//!
//! Maps a sustained "continuous mode" intent onto a throttled stream of
//! identical decisions: one immediately on start, then one per interval until
//! a stop intent arrives or the collection runs out. The burst runs on its
//! own task, decoupled from whatever frame rate a front-end renders at.

use crate::triage::TriageController;
use photosift_common::events::{EventBus, SiftEvent};
use photosift_common::model::Decision;
use photosift_common::time::now;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// Timer-driven throttle repeating one decision against the controller
pub struct ContinuousPacer {
    controller: Arc<TriageController>,
    event_bus: Arc<EventBus>,
    interval: Duration,
    /// Decisions performed in the current burst; reset on every start
    actions: Arc<AtomicU32>,
    active: Arc<AtomicBool>,
    /// Running burst task plus its private stop signal
    ///
    /// Each burst gets a fresh Notify so a stale stop permit from an earlier
    /// burst can never cancel a new one.
    burst: Mutex<Option<(JoinHandle<()>, Arc<Notify>)>>,
}

impl ContinuousPacer {
    pub fn new(
        controller: Arc<TriageController>,
        interval: Duration,
        event_bus: Arc<EventBus>,
    ) -> Self {
        Self {
            controller,
            event_bus,
            interval,
            actions: Arc::new(AtomicU32::new(0)),
            active: Arc::new(AtomicBool::new(false)),
            burst: Mutex::new(None),
        }
    }

    /// Begin a burst of repeated decisions
    ///
    /// Any burst already running is stopped first; the action count restarts
    /// at 0. The first decision fires immediately, the rest on the interval.
    pub async fn start(&self, decision: Decision) {
        self.stop().await;

        self.actions.store(0, Ordering::SeqCst);
        self.active.store(true, Ordering::SeqCst);
        self.event_bus.emit_lossy(SiftEvent::ContinuousStarted {
            decision,
            timestamp: now(),
        });
        debug!("Continuous mode started ({} every {:?})", decision, self.interval);

        let controller = Arc::clone(&self.controller);
        let event_bus = Arc::clone(&self.event_bus);
        let actions = Arc::clone(&self.actions);
        let active = Arc::clone(&self.active);
        let stop_signal = Arc::new(Notify::new());
        let task_signal = Arc::clone(&stop_signal);
        let interval = self.interval;

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

            // The interval's first tick resolves immediately, which is the
            // burst's initial decision
            loop {
                tokio::select! {
                    _ = task_signal.notified() => break,
                    _ = ticker.tick() => {}
                }
                if !active.load(Ordering::SeqCst) {
                    break;
                }

                if controller.decide(decision).await {
                    actions.fetch_add(1, Ordering::SeqCst);
                } else {
                    // Collection exhausted: the burst ends itself
                    active.store(false, Ordering::SeqCst);
                    let performed = actions.load(Ordering::SeqCst);
                    info!("Continuous mode exhausted collection after {} actions", performed);
                    event_bus.emit_lossy(SiftEvent::ContinuousStopped {
                        actions: performed,
                        exhausted: true,
                        timestamp: now(),
                    });
                    break;
                }
            }
        });

        if let Ok(mut slot) = self.burst.lock() {
            *slot = Some((handle, stop_signal));
        }
    }

    /// End the current burst
    ///
    /// Idempotent: stopping an idle pacer (or stopping twice) does nothing.
    /// The burst task is awaited out, so no timer keeps firing decisions
    /// after this returns.
    pub async fn stop(&self) {
        let was_active = self.active.swap(false, Ordering::SeqCst);

        let burst = self.burst.lock().ok().and_then(|mut slot| slot.take());
        if let Some((handle, stop_signal)) = burst {
            // notify_one leaves a permit, so a task mid-decision still sees
            // the stop on its next select
            stop_signal.notify_one();
            let _ = handle.await;
        }

        if was_active {
            let performed = self.actions.load(Ordering::SeqCst);
            debug!("Continuous mode stopped after {} actions", performed);
            self.event_bus.emit_lossy(SiftEvent::ContinuousStopped {
                actions: performed,
                exhausted: false,
                timestamp: now(),
            });
        }
    }

    /// Decisions performed in the current (or last) burst
    pub fn actions(&self) -> u32 {
        self.actions.load(Ordering::SeqCst)
    }

    /// Whether a burst is currently running
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }
}
