use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Snapshot handed to the progress callback
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProgressUpdate {
    pub files_completed: usize,
    pub files_total: usize,
    pub currently_processing_name: Option<String>,
}

/// Callback invoked with throttled progress updates
pub type ProgressCallback = Arc<dyn Fn(&ProgressUpdate) + Send + Sync>;

/// Decides whether a pending update should reach the callback
///
/// Throttles drop intermediate snapshots only; workers never wait on them.
pub trait ProgressThrottle: Send {
    fn ready(&mut self, now: Instant) -> bool;
}

/// Emit at most once per interval; the first update always passes
#[derive(Debug, Clone)]
pub struct IntervalThrottle {
    interval: Duration,
    last_emit: Option<Instant>,
}

impl IntervalThrottle {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_emit: None,
        }
    }

    pub fn from_millis(ms: u32) -> Self {
        Self::new(Duration::from_millis(u64::from(ms)))
    }
}

impl ProgressThrottle for IntervalThrottle {
    fn ready(&mut self, now: Instant) -> bool {
        match self.last_emit {
            Some(last) if now.duration_since(last) < self.interval => false,
            _ => {
                self.last_emit = Some(now);
                true
            }
        }
    }
}

/// No throttling
#[derive(Debug, Clone, Copy, Default)]
pub struct EveryUpdate;

impl ProgressThrottle for EveryUpdate {
    fn ready(&mut self, _now: Instant) -> bool {
        true
    }
}
