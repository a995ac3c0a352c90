//! Prefetch load queue
//!
//! Priority queue feeding the cache's two async load workers. Immediate-tier
//! requests always pop before background prefetch, and requests within one
//! tier pop in submission order.

use std::collections::BinaryHeap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Mutex;
use tokio::sync::Notify;

/// Content load priority (lower value = higher priority)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LoadPriority {
    /// The item under the cursor; must never wait behind prefetch
    Immediate = 0,
    /// The next item the cursor will land on
    Next = 1,
    /// Speculative lookahead
    Prefetch = 2,
}

/// One queued content load
#[derive(Debug, Clone)]
pub struct LoadRequest {
    /// Item to load
    pub id: String,
    /// Why the load was requested
    pub priority: LoadPriority,
    /// Submission sequence number, for FIFO within a tier
    seq: u64,
}

/// Heap ordering: lower priority value first, then earlier submission
impl Ord for LoadRequest {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        // BinaryHeap is a max-heap, so reverse both keys
        other
            .priority
            .cmp(&self.priority)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for LoadRequest {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for LoadRequest {
    fn eq(&self, other: &Self) -> bool {
        self.priority == other.priority && self.seq == other.seq
    }
}

impl Eq for LoadRequest {}

/// Shared queue between the cache and its load workers
pub struct LoadQueue {
    queue: Mutex<BinaryHeap<LoadRequest>>,
    notify: Notify,
    stop: AtomicBool,
    seq: AtomicU64,
}

impl LoadQueue {
    pub fn new() -> Self {
        Self {
            queue: Mutex::new(BinaryHeap::new()),
            notify: Notify::new(),
            stop: AtomicBool::new(false),
            seq: AtomicU64::new(0),
        }
    }

    /// Submit a load request and wake one idle worker
    pub fn submit(&self, id: String, priority: LoadPriority) {
        let request = LoadRequest {
            id,
            priority,
            seq: self.seq.fetch_add(1, Ordering::Relaxed),
        };
        if let Ok(mut queue) = self.queue.lock() {
            queue.push(request);
        }
        self.notify.notify_one();
    }

    /// Take the highest-priority pending request
    pub fn pop(&self) -> Option<LoadRequest> {
        self.queue.lock().ok().and_then(|mut queue| queue.pop())
    }

    /// Await the next request; returns None once the queue is stopped
    ///
    /// Workers poll on a short idle timeout as well as the notify, so a stop
    /// flag raised between the flag check and the wait cannot strand them.
    pub async fn next(&self) -> Option<LoadRequest> {
        loop {
            if self.stop.load(Ordering::SeqCst) {
                return None;
            }
            if let Some(request) = self.pop() {
                return Some(request);
            }
            let _ = tokio::time::timeout(
                std::time::Duration::from_millis(100),
                self.notify.notified(),
            )
            .await;
        }
    }

    /// Drop every pending request
    pub fn clear(&self) {
        if let Ok(mut queue) = self.queue.lock() {
            queue.clear();
        }
    }

    /// Pending request count
    pub fn len(&self) -> usize {
        self.queue.lock().map(|queue| queue.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Stop the queue; workers drain out of `next` with None
    pub fn stop(&self) {
        self.stop.store(true, Ordering::SeqCst);
        self.notify.notify_waiters();
    }

    pub fn is_stopped(&self) -> bool {
        self.stop.load(Ordering::SeqCst)
    }
}

impl Default for LoadQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_priority_values_order_tiers() {
        assert!(LoadPriority::Immediate < LoadPriority::Next);
        assert!(LoadPriority::Next < LoadPriority::Prefetch);
    }

    #[test]
    fn test_pop_returns_immediate_before_prefetch() {
        let queue = LoadQueue::new();
        queue.submit("ahead-a.jpg".to_string(), LoadPriority::Prefetch);
        queue.submit("ahead-b.jpg".to_string(), LoadPriority::Prefetch);
        queue.submit("current.jpg".to_string(), LoadPriority::Immediate);
        queue.submit("next.jpg".to_string(), LoadPriority::Next);

        assert_eq!(queue.pop().unwrap().id, "current.jpg");
        assert_eq!(queue.pop().unwrap().id, "next.jpg");
        assert_eq!(queue.pop().unwrap().id, "ahead-a.jpg");
    }

    #[test]
    fn test_pop_is_fifo_within_one_tier() {
        let queue = LoadQueue::new();
        for name in ["first", "second", "third"] {
            queue.submit(name.to_string(), LoadPriority::Prefetch);
        }
        assert_eq!(queue.pop().unwrap().id, "first");
        assert_eq!(queue.pop().unwrap().id, "second");
        assert_eq!(queue.pop().unwrap().id, "third");
    }

    #[test]
    fn test_clear_empties_queue() {
        let queue = LoadQueue::new();
        queue.submit("a".to_string(), LoadPriority::Prefetch);
        queue.submit("b".to_string(), LoadPriority::Immediate);
        assert_eq!(queue.len(), 2);

        queue.clear();
        assert!(queue.is_empty());
        assert!(queue.pop().is_none());
    }

    #[tokio::test]
    async fn test_next_returns_none_after_stop() {
        let queue = LoadQueue::new();
        queue.stop();
        assert!(queue.next().await.is_none());
    }

    #[tokio::test]
    async fn test_next_drains_pending_before_waiting() {
        let queue = LoadQueue::new();
        queue.submit("ready".to_string(), LoadPriority::Next);
        let request = queue.next().await.unwrap();
        assert_eq!(request.id, "ready");
    }

    #[tokio::test]
    async fn test_stop_wakes_waiting_worker() {
        let queue = std::sync::Arc::new(LoadQueue::new());
        let waiter = {
            let queue = std::sync::Arc::clone(&queue);
            tokio::spawn(async move { queue.next().await })
        };

        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        queue.stop();

        let result = tokio::time::timeout(std::time::Duration::from_secs(1), waiter)
            .await
            .expect("worker should drain promptly after stop")
            .unwrap();
        assert!(result.is_none());
    }
}
