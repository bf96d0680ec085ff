// Validation Lock
// Process-wide single slot: at most one validation run at a time

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::debug;

/// Ownership token handed out on acquisition (never 0)
pub type LockToken = u64;

const UNLOCKED: LockToken = 0;

/// Mutual-exclusion flag for validation jobs
///
/// Holds the token of its current owner. Acquisition is a single
/// compare-and-swap, release only succeeds for the matching token so a stale
/// release can never free a lock taken by a newer run.
#[derive(Debug)]
pub struct ValidationLock {
    owner: AtomicU64,
    next_token: AtomicU64,
}

impl Default for ValidationLock {
    fn default() -> Self {
        Self {
            owner: AtomicU64::new(UNLOCKED),
            next_token: AtomicU64::new(1),
        }
    }
}

impl ValidationLock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Atomically take the lock, returning a permit that releases on drop
    pub fn try_acquire(self: &Arc<Self>) -> Option<ValidationPermit> {
        let token = self.next_token.fetch_add(1, Ordering::Relaxed);
        match self
            .owner
            .compare_exchange(UNLOCKED, token, Ordering::AcqRel, Ordering::Acquire)
        {
            Ok(_) => {
                debug!(token = token, "Validation lock acquired");
                Some(ValidationPermit {
                    lock: Arc::clone(self),
                    token,
                })
            }
            Err(_) => None,
        }
    }

    /// Release the lock if `token` still owns it (idempotent)
    ///
    /// Returns true if this call freed the lock.
    pub fn release(&self, token: LockToken) -> bool {
        let released = self
            .owner
            .compare_exchange(token, UNLOCKED, Ordering::AcqRel, Ordering::Acquire)
            .is_ok();
        if released {
            debug!(token = token, "Validation lock released");
        }
        released
    }

    pub fn is_locked(&self) -> bool {
        self.owner.load(Ordering::Acquire) != UNLOCKED
    }
}

/// Proof of lock ownership for one validation run
#[derive(Debug)]
pub struct ValidationPermit {
    lock: Arc<ValidationLock>,
    token: LockToken,
}

impl ValidationPermit {
    pub fn token(&self) -> LockToken {
        self.token
    }
}

impl Drop for ValidationPermit {
    fn drop(&mut self) {
        self.lock.release(self.token);
    }
}
