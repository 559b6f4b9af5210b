//! Per-profile authentication locks.
//!
//! A [`ProfileMutex`] is a one-permit semaphore whose permit is *forgotten*
//! on acquire, so the lock is not tied to a guard's lifetime: one task can
//! take it before prompting and another path can give it back. Waiters are
//! served in FIFO order.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use parking_lot::Mutex;
use tokio::sync::Semaphore;

/// Exclusive lock guarding re-authentication for one profile.
pub struct ProfileMutex {
    semaphore: Semaphore,
    release: Mutex<()>,
    releases: AtomicU64,
}

impl Default for ProfileMutex {
    fn default() -> Self {
        Self::new()
    }
}

impl ProfileMutex {
    pub fn new() -> Self {
        Self {
            semaphore: Semaphore::new(1),
            release: Mutex::new(()),
            releases: AtomicU64::new(0),
        }
    }

    /// Wait for the lock and take it.
    ///
    /// Returns false only if the lock has been closed.
    pub async fn acquire(&self) -> bool {
        match self.semaphore.acquire().await {
            Ok(permit) => {
                permit.forget();
                true
            }
            Err(_) => false,
        }
    }

    /// Take the lock if it is free right now.
    pub fn try_acquire(&self) -> bool {
        match self.semaphore.try_acquire() {
            Ok(permit) => {
                permit.forget();
                true
            }
            Err(_) => false,
        }
    }

    /// Give the lock back. A no-op (returning false) if it is not held.
    pub fn release(&self) -> bool {
        let _serial = self.release.lock();
        if self.semaphore.available_permits() > 0 {
            return false;
        }
        self.semaphore.add_permits(1);
        self.releases.fetch_add(1, Ordering::Relaxed);
        true
    }

    /// True while some holder has the lock (including a waiter it was just
    /// handed to).
    pub fn is_locked(&self) -> bool {
        self.semaphore.available_permits() == 0
    }

    /// How many times the lock has actually been released.
    pub fn release_count(&self) -> u64 {
        self.releases.load(Ordering::Relaxed)
    }

    /// Wake all waiters with a failed acquire. Used on shutdown.
    pub fn close(&self) {
        self.semaphore.close();
    }
}

/// One [`ProfileMutex`] per profile name, created on first use.
#[derive(Default)]
pub struct MutexRegistry {
    mutexes: DashMap<String, Arc<ProfileMutex>>,
}

impl MutexRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The mutex for a profile, if one was ever created.
    pub fn get(&self, profile_name: &str) -> Option<Arc<ProfileMutex>> {
        self.mutexes.get(profile_name).map(|m| Arc::clone(m.value()))
    }

    /// The mutex for a profile, creating it on first use.
    ///
    /// Every call for the same name returns the same instance.
    pub fn get_or_create(&self, profile_name: &str) -> Arc<ProfileMutex> {
        if let Some(existing) = self.get(profile_name) {
            return existing;
        }
        let entry = self
            .mutexes
            .entry(profile_name.to_string())
            .or_insert_with(|| {
                tracing::trace!(profile = profile_name, "created profile lock");
                Arc::new(ProfileMutex::new())
            });
        Arc::clone(entry.value())
    }

    /// Profile names that have a lock.
    pub fn profile_names(&self) -> Vec<String> {
        self.mutexes.iter().map(|e| e.key().clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.mutexes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mutexes.is_empty()
    }
}
