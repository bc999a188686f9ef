//! Backend availability probing with a short-lived cache
//!
//! The dispatcher checks availability before every drain and the coordinator
//! before every cycle. Probing on each check would hammer the backend, so
//! results are cached for a configurable TTL.

use crate::backend::SyncBackend;
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tracing::debug;

/// Resolved backend availability.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Availability {
    Available,
    Unavailable { reason: String },
}

impl Availability {
    pub fn is_available(&self) -> bool {
        matches!(self, Availability::Available)
    }
}

/// Caches the result of [`SyncBackend::check_connection`] for a TTL.
pub struct AvailabilityChecker {
    ttl: Duration,
    cached: Mutex<Option<(Instant, Availability)>>,
}

impl AvailabilityChecker {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            cached: Mutex::new(None),
        }
    }

    /// Return the cached availability, probing the backend when the cache
    /// is cold or expired.
    pub async fn check(&self, backend: &dyn SyncBackend) -> Availability {
        if let Some(cached) = self.fresh_cached() {
            return cached;
        }

        let availability = match backend.check_connection().await {
            Ok(()) => Availability::Available,
            Err(e) => Availability::Unavailable {
                reason: e.to_string(),
            },
        };

        debug!(provider = %backend.kind(), result = ?availability, "Availability probe");

        let mut guard = self.cached.lock().unwrap_or_else(|e| e.into_inner());
        *guard = Some((Instant::now(), availability.clone()));
        availability
    }

    /// Drop the cached result so the next check re-probes.
    pub fn invalidate(&self) {
        let mut guard = self.cached.lock().unwrap_or_else(|e| e.into_inner());
        *guard = None;
    }

    fn fresh_cached(&self) -> Option<Availability> {
        let guard = self.cached.lock().unwrap_or_else(|e| e.into_inner());
        guard
            .as_ref()
            .filter(|(probed_at, _)| probed_at.elapsed() < self.ttl)
            .map(|(_, availability)| availability.clone())
    }
}
