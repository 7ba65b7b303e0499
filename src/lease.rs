//! Advisory, self-expiring per-key leases (component D).
//!
//! Grounded on the teacher's `DistributedLock` (`src/scheduling/scheduler.rs`):
//! the same SET-NX-EX acquire / compare-and-delete release protocol, but
//! expressed against the `CacheStore` trait instead of a raw `redis`
//! connection so the in-memory test double gets the identical semantics.

use std::time::Duration;

use uuid::Uuid;

use crate::error::CacheError;
use crate::key::lease_key;
use crate::store::CacheStore;

/// Default lease lifetime: 10 seconds, matching the original's
/// `LOCK_TIMEOUT`.
pub const DEFAULT_LEASE_TTL: Duration = Duration::from_secs(10);

/// A held lease. Dropping it without calling `release` leaves the lease
/// to expire on its own TTL — by design, leases are advisory and never
/// block forward progress (see spec.md §7: "lease contention is never
/// surfaced as an error").
pub struct Lease {
    key: String,
    holder: String,
}

impl Lease {
    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn holder(&self) -> &str {
        &self.holder
    }
}

/// Thin wrapper over a `CacheStore` handle issuing and releasing leases
/// keyed by `lease_key(resource)`.
pub struct LeaseManager<'a, C: CacheStore> {
    store: &'a C,
    ttl: Duration,
}

impl<'a, C: CacheStore> LeaseManager<'a, C> {
    pub fn new(store: &'a C) -> Self {
        Self { store, ttl: DEFAULT_LEASE_TTL }
    }

    pub fn with_ttl(store: &'a C, ttl: Duration) -> Self {
        Self { store, ttl }
    }

    /// A fresh, unique holder identifier for this attempt.
    pub fn announce(&self) -> String {
        Uuid::new_v4().to_string()
    }

    /// Attempts to acquire the lease on `resource`. Returns `Ok(None)` on
    /// contention — this is an expected, non-error outcome, never
    /// surfaced as a `CacheError`.
    pub async fn try_acquire(&self, resource: &str) -> Result<Option<Lease>, CacheError> {
        let key = lease_key(resource);
        let holder = self.announce();
        let acquired = self.store.set_if_absent(&key, &holder, self.ttl).await?;
        if acquired {
            Ok(Some(Lease { key, holder }))
        } else {
            Ok(None)
        }
    }

    /// Releases `lease` iff it is still the current holder of its key
    /// (compare-and-delete). Returns `false` if the lease already expired
    /// or was never held — this, too, is not an error.
    pub async fn try_release(&self, lease: &Lease) -> Result<bool, CacheError> {
        self.store
            .try_compare_and_delete(&lease.key, &lease.holder, &[])
            .await
    }
}
