//! screenlink-provider — out-of-process capture provider support.
//!
//! A capture provider is a separate process that owns the platform capture
//! primitive, publishes frames through shared memory and accepts input
//! injection calls.
//!
//! # Architecture
//!
//! ```text
//! ProviderEndpoint (platform binding)
//!        │ connect / on_connected / on_binding_died
//!        ▼
//! ProviderBinding ── state machine, bounded bind wait, automatic rebind
//!        │ provider()
//!        ▼
//! ProviderCapturer ── init / inject / release
//!        │ register_frame_callback(relay)
//!        ▼
//! FrameRelay ── map shm once per handle ──► FrameSink::push_frame
//! ```

pub mod binding;
pub mod capturer;
pub mod endpoint;
pub mod relay;

#[cfg(any(test, feature = "test-util"))]
pub mod testing;

pub use binding::{BindingState, ProviderBinding, DEFAULT_BIND_TIMEOUT};
pub use capturer::ProviderCapturer;
pub use endpoint::{
    CaptureProvider, ConnectionEvents, FrameCallback, MappedRegion, ProviderEndpoint, SharedMemory,
};
pub use relay::FrameRelay;
