//! Local capture platform seams.
//!
//! The host supplies these: a consent handle that can create virtual
//! displays, and a platform that creates buffer targets (image buffer pool
//! plus the surface it renders into, optionally with an encoder).
//!
//! Every handle is consumed by its release method, so the type system
//! guarantees a resource is released at most once.

use std::sync::Arc;

use screenlink_core::{FrameSink, PlatformError, ScreenInfo};

// ── Resource handles ──────────────────────────────────────────────────────────

/// Rendering target a virtual display mirrors into.
pub trait Surface: Send {
    fn release(self: Box<Self>);
}

/// Image buffer pool reading frames back from a [`Surface`].
pub trait ImageBufferPool: Send {
    fn close(self: Box<Self>);
}

/// Optional hardware encoder fed by the surface.
pub trait VideoEncoder: Send {
    /// Signal end of input, stop and release.
    fn shutdown(self: Box<Self>);
}

/// Off-screen display mirrored from the real one.
pub trait VirtualDisplay: Send {
    fn resize(&mut self, screen: ScreenInfo) -> Result<(), PlatformError>;

    /// Attach a surface, or pause projection with `None`.
    fn set_surface(&mut self, surface: Option<&dyn Surface>) -> Result<(), PlatformError>;

    fn release(self: Box<Self>);
}

/// Everything a local capture run reads frames through.
pub struct BufferTarget {
    pub pool:    Box<dyn ImageBufferPool>,
    pub surface: Box<dyn Surface>,
    pub encoder: Option<Box<dyn VideoEncoder>>,
}

// ── Providers ─────────────────────────────────────────────────────────────────

/// Platform capture authorization.
pub trait CaptureConsent: Send + Sync {
    /// May fail with [`PlatformError::PermissionDenied`] when the
    /// authorization has been revoked.
    fn create_virtual_display(
        &self,
        name: &str,
        screen: ScreenInfo,
        surface: &dyn Surface,
    ) -> Result<Box<dyn VirtualDisplay>, PlatformError>;
}

pub trait CapturePlatform: Send + Sync {
    /// Create the image buffer pool and surface for one capture run. Frames
    /// read back from the pool go to `sink`.
    fn create_buffer_target(
        &self,
        screen: ScreenInfo,
        sink: Arc<dyn FrameSink>,
    ) -> Result<BufferTarget, PlatformError>;

    /// Ask the user for capture consent again. The answer arrives later
    /// through the controller's `grant_consent`.
    fn request_consent(&self);
}
