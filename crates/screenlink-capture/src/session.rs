//! One capture run and the resources it owns.

use std::sync::Arc;

use screenlink_core::{CaptureGate, FrameSink, FrameStats, ScreenInfo, SinkError};
use tracing::debug;

use crate::platform::{BufferTarget, ImageBufferPool, Surface, VideoEncoder};
use crate::reusable::Reusable;

// ── GatedSink ─────────────────────────────────────────────────────────────────

/// Frame sink handed to local buffer targets: drops frames while the gate is
/// closed and counts what goes through.
pub struct GatedSink {
    gate:  CaptureGate,
    sink:  Arc<dyn FrameSink>,
    stats: FrameStats,
}

impl GatedSink {
    pub fn new(gate: CaptureGate, sink: Arc<dyn FrameSink>, stats: FrameStats) -> Self {
        Self { gate, sink, stats }
    }
}

impl FrameSink for GatedSink {
    fn push_frame(&self, frame: &[u8]) -> Result<(), SinkError> {
        if !self.gate.is_open() {
            self.stats.record_dropped();
            return Ok(());
        }
        match self.sink.push_frame(frame) {
            Ok(()) => {
                self.stats.record_relayed();
                Ok(())
            }
            Err(e) => {
                self.stats.record_dropped();
                Err(e)
            }
        }
    }
}

// ── CaptureSession ────────────────────────────────────────────────────────────

enum Resources {
    Local {
        pool:    Box<dyn ImageBufferPool>,
        surface: Box<dyn Surface>,
        encoder: Option<Box<dyn VideoEncoder>>,
    },
    /// Frames arrive through the provider relay; nothing held locally.
    Provider,
}

/// An active capture run. At most one exists per controller.
pub struct CaptureSession {
    screen:    ScreenInfo,
    resources: Resources,
}

impl CaptureSession {
    pub fn local(screen: ScreenInfo, target: BufferTarget) -> Self {
        let BufferTarget { pool, surface, encoder } = target;
        Self { screen, resources: Resources::Local { pool, surface, encoder } }
    }

    pub fn provider(screen: ScreenInfo) -> Self {
        Self { screen, resources: Resources::Provider }
    }

    pub fn screen(&self) -> ScreenInfo {
        self.screen
    }

    pub fn is_local(&self) -> bool {
        matches!(self.resources, Resources::Local { .. })
    }

    /// Release local resources. The order is fixed: the display lets go of
    /// the surface, the pool is closed, the encoder stops, and only then is
    /// the surface released (the pool still reads from it until closed).
    pub fn release(self, display: &mut Reusable) {
        let Resources::Local { pool, surface, encoder } = self.resources else {
            return;
        };
        display.detach();
        pool.close();
        if let Some(encoder) = encoder {
            encoder.shutdown();
        }
        surface.release();
        debug!("Released capture resources for {}", self.screen);
    }
}

/// Tear down a buffer target that never got attached to a display.
pub(crate) fn discard_target(target: BufferTarget) {
    let BufferTarget { pool, surface, encoder } = target;
    pool.close();
    if let Some(encoder) = encoder {
        encoder.shutdown();
    }
    surface.release();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::CapturePlatform;
    use crate::testing::{CallLog, RecordingPlatform};
    use screenlink_provider::testing::RecordingSink;

    #[test]
    fn gated_sink_counts_and_drops() {
        let sink = Arc::new(RecordingSink::new());
        let gate = CaptureGate::new();
        let stats = FrameStats::new();
        let gated = GatedSink::new(gate.clone(), sink.clone(), stats.clone());

        gated.push_frame(&[1, 2]).unwrap();
        gate.open();
        gated.push_frame(&[3, 4]).unwrap();
        sink.set_rejecting(true);
        assert!(gated.push_frame(&[5]).is_err());

        assert_eq!(sink.frames(), 2);
        assert_eq!(stats.relayed(), 1);
        assert_eq!(stats.dropped(), 2);
    }

    #[test]
    fn release_order_with_encoder() {
        let log = CallLog::new();
        let platform = RecordingPlatform::new(log.clone());
        platform.set_with_encoder(true);
        let screen = ScreenInfo::new(800, 600, 160, 1);
        let target = platform.create_buffer_target(screen, Arc::new(RecordingSink::new())).unwrap();
        log.clear();

        let mut display: Reusable = Reusable::new(true);
        CaptureSession::local(screen, target).release(&mut display);

        assert_eq!(log.entries(), vec!["pool.close", "encoder.shutdown", "surface.release"]);
    }

    #[test]
    fn provider_session_holds_nothing() {
        let mut display: Reusable = Reusable::new(false);
        let session = CaptureSession::provider(ScreenInfo::new(1080, 2340, 240, 1));
        assert!(!session.is_local());
        session.release(&mut display);
    }
}
