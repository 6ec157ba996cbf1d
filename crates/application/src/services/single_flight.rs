//! Per-key request coalescing
//!
//! Concurrent requests for the same cache key queue behind the first one.
//! Once the leader releases its guard, the next waiter re-checks the cache
//! and usually finds the result the leader just stored.

use std::{collections::HashMap, sync::Arc};

use parking_lot::Mutex;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// Keyed async locks with automatic cleanup
#[derive(Debug, Default)]
pub struct SingleFlight {
    inflight: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

/// Held while a request owns a key; releases and cleans up on drop
#[derive(Debug)]
pub struct FlightGuard<'a> {
    owner: &'a SingleFlight,
    key: String,
    waited: bool,
    guard: Option<OwnedMutexGuard<()>>,
}

impl FlightGuard<'_> {
    /// Whether another request held the key when this one arrived
    #[must_use]
    pub const fn waited(&self) -> bool {
        self.waited
    }
}

impl Drop for FlightGuard<'_> {
    fn drop(&mut self) {
        let mut inflight = self.owner.inflight.lock();
        // Our guard and the map hold one reference each; anything beyond
        // that is a waiter that still needs the entry.
        if inflight
            .get(&self.key)
            .is_some_and(|lock| Arc::strong_count(lock) <= 2)
        {
            inflight.remove(&self.key);
        }
        drop(inflight);
        self.guard.take();
    }
}

impl SingleFlight {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait until no other request holds `key`, then hold it
    pub async fn acquire(&self, key: &str) -> FlightGuard<'_> {
        let (lock, waited) = {
            let mut inflight = self.inflight.lock();
            match inflight.get(key) {
                Some(lock) => (Arc::clone(lock), true),
                None => {
                    let lock = Arc::new(AsyncMutex::new(()));
                    inflight.insert(key.to_string(), Arc::clone(&lock));
                    (lock, false)
                },
            }
        };
        let guard = lock.lock_owned().await;
        FlightGuard {
            owner: self,
            key: key.to_string(),
            waited,
            guard: Some(guard),
        }
    }
}
