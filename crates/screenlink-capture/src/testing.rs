//! Recording doubles for the local capture platform. Every handle writes to
//! one shared [`CallLog`] so tests can assert release ordering.
//!
//! Enabled for this crate's tests and for dependents through the
//! `test-util` feature.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use screenlink_core::{FrameSink, PlatformError, ScreenInfo};

use crate::platform::{
    BufferTarget, CaptureConsent, CapturePlatform, ImageBufferPool, Surface, VideoEncoder, VirtualDisplay,
};

// ── CallLog ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default)]
pub struct CallLog(Arc<Mutex<Vec<String>>>);

impl CallLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, entry: impl Into<String>) {
        self.0.lock().unwrap().push(entry.into());
    }

    pub fn entries(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }

    pub fn clear(&self) {
        self.0.lock().unwrap().clear();
    }

    pub fn count(&self, prefix: &str) -> usize {
        self.0.lock().unwrap().iter().filter(|e| e.starts_with(prefix)).count()
    }

    /// Index of the first entry starting with `prefix`.
    pub fn position(&self, prefix: &str) -> Option<usize> {
        self.0.lock().unwrap().iter().position(|e| e.starts_with(prefix))
    }
}

// ── Handles ───────────────────────────────────────────────────────────────────

pub struct RecordingSurface {
    log: CallLog,
}

impl RecordingSurface {
    pub fn new(log: CallLog) -> Self {
        Self { log }
    }
}

impl Surface for RecordingSurface {
    fn release(self: Box<Self>) {
        self.log.push("surface.release");
    }
}

struct RecordingPool {
    log: CallLog,
}

impl ImageBufferPool for RecordingPool {
    fn close(self: Box<Self>) {
        self.log.push("pool.close");
    }
}

struct RecordingEncoder {
    log: CallLog,
}

impl VideoEncoder for RecordingEncoder {
    fn shutdown(self: Box<Self>) {
        self.log.push("encoder.shutdown");
    }
}

struct RecordingDisplay {
    log: CallLog,
}

impl VirtualDisplay for RecordingDisplay {
    fn resize(&mut self, screen: ScreenInfo) -> Result<(), PlatformError> {
        self.log.push(format!("display.resize {}x{}", screen.width, screen.height));
        Ok(())
    }

    fn set_surface(&mut self, surface: Option<&dyn Surface>) -> Result<(), PlatformError> {
        self.log.push(if surface.is_some() { "display.attach" } else { "display.detach" });
        Ok(())
    }

    fn release(self: Box<Self>) {
        self.log.push("display.release");
    }
}

// ── RecordingConsent ──────────────────────────────────────────────────────────

pub struct RecordingConsent {
    log:    CallLog,
    denied: AtomicBool,
}

impl RecordingConsent {
    pub fn new(log: CallLog) -> Self {
        Self { log, denied: AtomicBool::new(false) }
    }

    /// Make display creation fail with `PermissionDenied`.
    pub fn set_denied(&self, denied: bool) {
        self.denied.store(denied, Ordering::SeqCst);
    }
}

impl CaptureConsent for RecordingConsent {
    fn create_virtual_display(
        &self,
        name: &str,
        screen: ScreenInfo,
        _surface: &dyn Surface,
    ) -> Result<Box<dyn VirtualDisplay>, PlatformError> {
        if self.denied.load(Ordering::SeqCst) {
            self.log.push("display.denied");
            return Err(PlatformError::PermissionDenied { reason: "projection revoked".into() });
        }
        self.log.push(format!("display.create {name} {}x{}", screen.width, screen.height));
        Ok(Box::new(RecordingDisplay { log: self.log.clone() }))
    }
}

// ── RecordingPlatform ─────────────────────────────────────────────────────────

pub struct RecordingPlatform {
    log:          CallLog,
    with_encoder: AtomicBool,
    fail_target:  AtomicBool,
    sink:         Mutex<Option<Arc<dyn FrameSink>>>,
}

impl RecordingPlatform {
    pub fn new(log: CallLog) -> Self {
        Self {
            log,
            with_encoder: AtomicBool::new(false),
            fail_target: AtomicBool::new(false),
            sink: Mutex::new(None),
        }
    }

    pub fn log(&self) -> &CallLog {
        &self.log
    }

    pub fn set_with_encoder(&self, with_encoder: bool) {
        self.with_encoder.store(with_encoder, Ordering::SeqCst);
    }

    pub fn set_fail_target(&self, fail: bool) {
        self.fail_target.store(fail, Ordering::SeqCst);
    }

    /// Sink handed to the most recent buffer target.
    pub fn sink(&self) -> Option<Arc<dyn FrameSink>> {
        self.sink.lock().unwrap().clone()
    }
}

impl CapturePlatform for RecordingPlatform {
    fn create_buffer_target(
        &self,
        screen: ScreenInfo,
        sink: Arc<dyn FrameSink>,
    ) -> Result<BufferTarget, PlatformError> {
        if self.fail_target.load(Ordering::SeqCst) {
            return Err(PlatformError::Failed { reason: "no buffers".into() });
        }
        self.log.push(format!("target.create {}x{}", screen.width, screen.height));
        *self.sink.lock().unwrap() = Some(sink);
        let encoder: Option<Box<dyn VideoEncoder>> = if self.with_encoder.load(Ordering::SeqCst) {
            Some(Box::new(RecordingEncoder { log: self.log.clone() }))
        } else {
            None
        };
        Ok(BufferTarget {
            pool: Box::new(RecordingPool { log: self.log.clone() }),
            surface: Box::new(RecordingSurface::new(self.log.clone())),
            encoder,
        })
    }

    fn request_consent(&self) {
        self.log.push("consent.request");
    }
}
