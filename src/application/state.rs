//! Process-wide screening state.
//!
//! Holds the last known good result plus a few counters for status queries.
//! The orchestrator is the only writer; any number of readers may query it
//! from other threads.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use crate::domain::ScreeningResult;

#[derive(Debug, Default)]
struct Inner {
    latest: RwLock<Option<Arc<ScreeningResult>>>,
    screening: AtomicBool,
    completed: AtomicU64,
    aborted: AtomicU64,
}

/// Shared handle to the device state.
///
/// The last result is an immutable snapshot behind an `Arc`. Publishing swaps
/// the whole snapshot under a write lock, so a reader sees either the previous
/// result or the new one, never a mix. The slot starts empty and is only
/// replaced by a completed cycle; nothing clears it.
#[derive(Debug, Clone, Default)]
pub struct DeviceState {
    inner: Arc<Inner>,
}

impl DeviceState {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Last successfully completed screening, `None` before the first one.
    #[must_use]
    pub fn latest(&self) -> Option<Arc<ScreeningResult>> {
        // The slot only ever holds a complete snapshot, so a poisoned lock
        // still guards consistent data.
        self.inner
            .latest
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Whether a cycle is currently running.
    #[must_use]
    pub fn is_screening(&self) -> bool {
        self.inner.screening.load(Ordering::Acquire)
    }

    #[must_use]
    pub fn cycles_completed(&self) -> u64 {
        self.inner.completed.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn cycles_aborted(&self) -> u64 {
        self.inner.aborted.load(Ordering::Relaxed)
    }

    pub(crate) fn publish(&self, result: ScreeningResult) -> Arc<ScreeningResult> {
        let snapshot = Arc::new(result);
        *self
            .inner
            .latest
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(Arc::clone(&snapshot));
        self.inner.completed.fetch_add(1, Ordering::Relaxed);
        snapshot
    }

    pub(crate) fn record_abort(&self) {
        self.inner.aborted.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn set_screening(&self, active: bool) {
        self.inner.screening.store(active, Ordering::Release);
    }
}
