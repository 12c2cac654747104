//! screenlink-capture — capture session management.
//!
//! # Backends
//!
//! | Backend | Frames from | Geometry from |
//! |---------|-------------|---------------|
//! | Local | virtual display → image buffer pool | host display metrics |
//! | Provider | out-of-process provider via shared memory | provider dimensions |
//!
//! # Architecture
//!
//! ```text
//! host metrics ──► ScreenGeometryResolver ──► CaptureSessionController
//!                                                 │ start / stop / restart
//!                          ┌──────────────────────┴───────────────┐
//!                          ▼                                      ▼
//!         Reusable<VirtualDisplay> + BufferTarget        ProviderCapturer
//!                          │                                      │
//!                      GatedSink ─────────► FrameSink ◄────── FrameRelay
//! ```

pub mod controller;
pub mod platform;
pub mod reusable;
pub mod session;

#[cfg(any(test, feature = "test-util"))]
pub mod testing;

pub use controller::{CaptureBackend, CaptureSessionController, SessionState, StartOutcome};
pub use platform::{
    BufferTarget, CaptureConsent, CapturePlatform, ImageBufferPool, Surface, VideoEncoder, VirtualDisplay,
};
pub use reusable::{Attached, Reusable};
pub use session::{CaptureSession, GatedSink};
