//! Backend connection pool keyed by viewer fingerprint (spec §3, §4.3, §4.4).

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, MutexGuard};

use crate::backend::BackendBridge;
use crate::error::BridgeError;

/// One pooled backend connection. The `state` mutex doubles as the
/// single-flight `in_use` gate from spec §3: holding the guard for the
/// duration of a proxied request both serializes access and protects the
/// `bridge` swap used for the streaming-response detach (§4.3).
struct PoolEntry {
    state: Mutex<PooledState>,
    last_use_ticks: AtomicU32,
    connected: AtomicBool,
}

struct PooledState {
    bridge: Option<BackendBridge>,
}

impl PoolEntry {
    fn empty() -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(PooledState { bridge: None }),
            last_use_ticks: AtomicU32::new(0),
            connected: AtomicBool::new(false),
        })
    }
}

/// A held pool entry, scoped to a single proxied request.
pub struct PoolLease<'a> {
    entry: &'a Arc<PoolEntry>,
    guard: MutexGuard<'a, PooledState>,
}

impl<'a> PoolLease<'a> {
    /// Connect (if not already connected) and return a mutable handle to
    /// the backend bridge for this request.
    pub async fn ensure_connected(&mut self, backend_path: &std::path::Path) -> Result<&mut BackendBridge, BridgeError> {
        if self.guard.bridge.is_none() {
            let bridge = BackendBridge::connect(backend_path).await?;
            self.guard.bridge = Some(bridge);
            self.entry.connected.store(true, Ordering::Relaxed);
        }
        self.entry.last_use_ticks.store(0, Ordering::Relaxed);
        Ok(self.guard.bridge.as_mut().expect("just ensured present"))
    }

    pub fn is_connected(&self) -> bool {
        self.guard.bridge.is_some()
    }

    /// Detach the backend socket for open-ended streaming (spec §4.3): the
    /// caller takes ownership of the socket and the pool entry is left
    /// looking closed, so the next sweep reaps it.
    pub fn detach(mut self) -> Option<BackendBridge> {
        self.entry.connected.store(false, Ordering::Relaxed);
        self.guard.bridge.take()
    }
}

/// Maps viewer fingerprints to pooled backend connections.
pub struct BackendPool {
    entries: Mutex<HashMap<String, Arc<PoolEntry>>>,
    idle_evict_after: Duration,
    sweep_interval: Duration,
    sweep_running: AtomicBool,
}

impl BackendPool {
    pub fn new(idle_evict_after: Duration, sweep_interval: Duration) -> Arc<Self> {
        Arc::new(Self {
            entries: Mutex::new(HashMap::new()),
            idle_evict_after,
            sweep_interval,
            sweep_running: AtomicBool::new(false),
        })
    }

    /// Acquire the single-flight gate for `fingerprint`, creating a fresh
    /// (not-yet-connected) entry on first use. Ensures the eviction sweep
    /// is running.
    pub async fn lease(self: &Arc<Self>, fingerprint: &str) -> PoolLeaseHandle {
        let entry = {
            let mut entries = self.entries.lock().await;
            entries
                .entry(fingerprint.to_string())
                .or_insert_with(PoolEntry::empty)
                .clone()
        };
        self.spawn_sweep_if_needed();
        PoolLeaseHandle { entry }
    }

    fn spawn_sweep_if_needed(self: &Arc<Self>) {
        if self.sweep_running.swap(true, Ordering::SeqCst) {
            return;
        }
        let pool = Arc::clone(self);
        tokio::spawn(async move {
            pool.run_sweep().await;
        });
    }

    async fn run_sweep(self: Arc<Self>) {
        let threshold_ticks = self.idle_evict_after.as_secs().max(1) as u32;
        loop {
            tokio::time::sleep(self.sweep_interval).await;

            let mut entries = self.entries.lock().await;
            if entries.is_empty() {
                self.sweep_running.store(false, Ordering::SeqCst);
                return;
            }

            let mut candidates = Vec::new();
            for (key, entry) in entries.iter() {
                let ticks = entry.last_use_ticks.fetch_add(1, Ordering::Relaxed) + 1;
                if !entry.connected.load(Ordering::Relaxed) || ticks > threshold_ticks {
                    candidates.push(key.clone());
                }
            }

            for key in candidates {
                let Some(entry) = entries.get(&key) else {
                    continue;
                };
                if entry.state.try_lock().is_ok() {
                    entries.remove(&key);
                    tracing::debug!(fingerprint = %key, "evicted idle backend pool entry");
                }
            }
        }
    }
}

/// Owns the `Arc<PoolEntry>` for the duration of a lease; call
/// [`acquire`](Self::acquire) to get the actual guard once ready to do I/O.
pub struct PoolLeaseHandle {
    entry: Arc<PoolEntry>,
}

impl PoolLeaseHandle {
    pub async fn acquire(&self) -> PoolLease<'_> {
        let guard = self.entry.state.lock().await;
        PoolLease {
            entry: &self.entry,
            guard,
        }
    }
}

pub fn backend_path(backend_root: &std::path::Path, tag: &str) -> PathBuf {
    BackendBridge::http_backend_path(backend_root, tag)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn lease_creates_one_entry_per_fingerprint() {
        let pool = BackendPool::new(Duration::from_secs(15), Duration::from_secs(3600));
        let a1 = pool.lease("fp-a").await;
        let a2 = pool.lease("fp-a").await;
        let b = pool.lease("fp-b").await;

        assert!(Arc::ptr_eq(&a1.entry, &a2.entry));
        assert!(!Arc::ptr_eq(&a1.entry, &b.entry));
    }

    #[tokio::test(start_paused = true)]
    async fn disconnected_entries_are_evicted_by_the_sweep() {
        let pool = BackendPool::new(Duration::from_secs(15), Duration::from_millis(10));
        let handle = pool.lease("fp-a").await;
        drop(handle.acquire().await); // never connects; entry stays "disconnected"

        tokio::time::advance(Duration::from_millis(20)).await;
        tokio::task::yield_now().await;
        tokio::time::advance(Duration::from_millis(20)).await;
        tokio::task::yield_now().await;

        let entries = pool.entries.lock().await;
        assert!(!entries.contains_key("fp-a"));
    }
}
