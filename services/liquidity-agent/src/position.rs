//! Position state and market activity clock
//!
//! The executor is the only writer of [`PositionState`]. Everyone else reads a
//! snapshot through [`SharedPosition`], under the same lock the executor
//! writes with.

use rand::Rng;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use tokio::time::Instant;

/// An open position: when it was entered and how long to hold it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PositionEntry {
    pub entry_time: Instant,
    pub hold_target: Duration,
}

/// `entry` is `Some` exactly when a position is active, so the
/// active/entry-time pair cannot disagree.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PositionState {
    entry: Option<PositionEntry>,
}

impl PositionState {
    pub fn is_active(&self) -> bool {
        self.entry.is_some()
    }

    pub fn entry_time(&self) -> Option<Instant> {
        self.entry.map(|e| e.entry_time)
    }

    pub fn hold_target(&self) -> Option<Duration> {
        self.entry.map(|e| e.hold_target)
    }

    pub fn entry(&self) -> Option<PositionEntry> {
        self.entry
    }

    /// True once an active position has been held for its target
    pub fn hold_elapsed(&self, now: Instant) -> bool {
        match self.entry {
            Some(e) => now.saturating_duration_since(e.entry_time) >= e.hold_target,
            None => false,
        }
    }

    pub(crate) fn open(&mut self, entry_time: Instant, hold_target: Duration) {
        self.entry = Some(PositionEntry {
            entry_time,
            hold_target,
        });
    }

    pub(crate) fn close(&mut self) {
        self.entry = None;
    }
}

/// Whole-second hold target, uniform in `[min, max]`
pub fn random_hold_target(min: Duration, max: Duration) -> Duration {
    let (lo, hi) = (min.as_secs(), max.as_secs().max(min.as_secs()));
    Duration::from_secs(rand::thread_rng().gen_range(lo..=hi))
}

/// Read handle shared with the heartbeat; write access stays in the crate
#[derive(Debug, Clone, Default)]
pub struct SharedPosition {
    inner: Arc<RwLock<PositionState>>,
}

impl SharedPosition {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn snapshot(&self) -> PositionState {
        *self.inner.read().await
    }

    pub(crate) async fn open(&self, entry_time: Instant, hold_target: Duration) {
        self.inner.write().await.open(entry_time, hold_target);
    }

    /// Returns whether a position was actually closed
    pub(crate) async fn close(&self) -> bool {
        let mut state = self.inner.write().await;
        let was_active = state.is_active();
        state.close();
        was_active
    }
}

/// Time of the last observed market event
#[derive(Debug, Clone)]
pub struct MarketActivity {
    last_event: Arc<Mutex<Instant>>,
}

impl MarketActivity {
    /// Startup counts as activity so the silence clock starts at launch
    pub fn new() -> Self {
        Self {
            last_event: Arc::new(Mutex::new(Instant::now())),
        }
    }

    pub async fn touch(&self) {
        *self.last_event.lock().await = Instant::now();
    }

    pub async fn last_event(&self) -> Instant {
        *self.last_event.lock().await
    }

    pub async fn silence(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.last_event().await)
    }
}

impl Default for MarketActivity {
    fn default() -> Self {
        Self::new()
    }
}
