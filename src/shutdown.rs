//! Cooperative stop flag shared by the orchestrator, every worker and the
//! signal handler.
//!
//! Notes:
//! - One-way: once set it stays set for the rest of the run.
//! - The first reason recorded wins, so a Ctrl-C after the target is reached
//!   still reports the run as having reached its target.
//! - `request()` is safe to call from a signal handler (a single atomic CAS).

use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// Live usage dropped to or below the target.
    TargetReached,
    /// External request (SIGINT/SIGTERM).
    Shutdown,
}

impl StopReason {
    fn as_u8(self) -> u8 {
        match self {
            StopReason::TargetReached => 1,
            StopReason::Shutdown => 2,
        }
    }

    fn from_u8(v: u8) -> Option<Self> {
        match v {
            1 => Some(StopReason::TargetReached),
            2 => Some(StopReason::Shutdown),
            _ => None,
        }
    }
}

/// Cloneable handle; all clones observe the same flag.
#[derive(Debug, Clone, Default)]
pub struct StopFlag(Arc<AtomicU8>);

impl StopFlag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request a stop (idempotent; the first reason is kept).
    #[inline]
    pub fn request(&self, reason: StopReason) {
        let _ = self
            .0
            .compare_exchange(0, reason.as_u8(), Ordering::AcqRel, Ordering::Acquire);
    }

    #[inline]
    pub fn is_requested(&self) -> bool {
        self.0.load(Ordering::Acquire) != 0
    }

    #[inline]
    pub fn reason(&self) -> Option<StopReason> {
        StopReason::from_u8(self.0.load(Ordering::Acquire))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_clear() {
        let f = StopFlag::new();
        assert!(!f.is_requested());
        assert_eq!(f.reason(), None);
    }

    #[test]
    fn first_reason_wins_across_clones() {
        let f = StopFlag::new();
        let g = f.clone();
        g.request(StopReason::TargetReached);
        f.request(StopReason::Shutdown);
        assert!(f.is_requested());
        assert_eq!(f.reason(), Some(StopReason::TargetReached));
        assert_eq!(g.reason(), Some(StopReason::TargetReached));
    }
}
