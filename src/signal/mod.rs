//! Cooperative stop control for the save pipeline
//!
//! The embedding executor owns real OS signal handling and the overall
//! step timeout. The pipeline only needs a cheap flag it can poll between
//! artifacts and inside archive entry loops. `StopSignal` combines an
//! externally settable stop flag with an optional deadline.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Shared stop flag plus optional deadline
///
/// Clones share the flag, so the executor keeps one handle and hands
/// another to the saver. The deadline is fixed at the moment it is set.
#[derive(Debug, Clone)]
pub struct StopSignal {
    stopped: Arc<AtomicBool>,
    deadline: Option<Instant>,
}

impl StopSignal {
    /// Create a signal that only fires when explicitly requested
    pub fn new() -> Self {
        Self {
            stopped: Arc::new(AtomicBool::new(false)),
            deadline: None,
        }
    }

    /// Fire automatically once `budget` has elapsed from now
    pub fn with_deadline(mut self, budget: Duration) -> Self {
        self.deadline = Some(Instant::now() + budget);
        self
    }

    /// Request a stop
    pub fn request_stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
    }

    /// True once a stop was requested or the deadline passed
    pub fn is_stopped(&self) -> bool {
        if self.stopped.load(Ordering::SeqCst) {
            return true;
        }
        match self.deadline {
            Some(deadline) => Instant::now() >= deadline,
            None => false,
        }
    }
}

impl Default for StopSignal {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_signal_is_not_stopped() {
        let signal = StopSignal::new();
        assert!(!signal.is_stopped());
    }

    #[test]
    fn test_request_stop() {
        let signal = StopSignal::new();
        signal.request_stop();
        assert!(signal.is_stopped());
    }

    #[test]
    fn test_clones_share_the_flag() {
        let signal = StopSignal::new();
        let handle = signal.clone();

        handle.request_stop();

        assert!(signal.is_stopped());
        assert!(handle.is_stopped());
    }

    #[test]
    fn test_elapsed_deadline_stops() {
        let signal = StopSignal::new().with_deadline(Duration::ZERO);
        assert!(signal.is_stopped());
    }

    #[test]
    fn test_future_deadline_does_not_stop() {
        let signal = StopSignal::new().with_deadline(Duration::from_secs(3600));
        assert!(!signal.is_stopped());
    }
}
