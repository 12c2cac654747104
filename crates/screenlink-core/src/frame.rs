//! The consumer side of the frame path.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::errors::SinkError;
use crate::types::ScreenInfo;

/// Receives raw frames (RGBA, tightly packed by the producer) for encoding
/// and delivery to remote peers.
///
/// `push_frame` is called synchronously on the producer's thread. The slice
/// is only valid for the duration of the call: it may be remapped or
/// invalidated by the next notification.
pub trait FrameSink: Send + Sync {
    fn push_frame(&self, frame: &[u8]) -> Result<(), SinkError>;

    /// Applied capture geometry changed; the consumer should renegotiate.
    fn refresh_screen(&self, _screen: ScreenInfo) {}

    /// Raw frame delivery switched on or off.
    fn set_capturing(&self, _capturing: bool) {}
}

// ── FrameStats ────────────────────────────────────────────────────────────────

/// Relayed / dropped frame counters shared between producers and the status
/// reporter.
#[derive(Debug, Clone, Default)]
pub struct FrameStats {
    relayed: Arc<AtomicU64>,
    dropped: Arc<AtomicU64>,
}

impl FrameStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_relayed(&self) {
        self.relayed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_dropped(&self) {
        self.dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn relayed(&self) -> u64 {
        self.relayed.load(Ordering::Relaxed)
    }

    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}
