//! Seams to the platform: the service-binding primitive, the provider's RPC
//! surface, and shared-memory frame handles.
//!
//! Implementations live with the host platform glue; this crate only drives
//! them.

use std::sync::Arc;

use screenlink_core::{BindError, MappingError, RemoteError};

// ── Binding primitive ─────────────────────────────────────────────────────────

/// Connects to the well-known capture-provider service.
pub trait ProviderEndpoint: Send + Sync {
    /// Whether the provider is installed on this host. Probed before binding.
    fn is_available(&self) -> bool;

    /// Issue a connection request. Completion is reported asynchronously
    /// through `events`; an immediate rejection is returned as
    /// [`BindError::Unavailable`].
    fn connect(&self, events: Arc<dyn ConnectionEvents>) -> Result<(), BindError>;

    /// Drop the connection request (and the connection, if established).
    fn disconnect(&self);
}

/// Connection lifecycle callbacks, invoked from the platform's thread.
pub trait ConnectionEvents: Send + Sync {
    fn on_connected(&self, provider: Arc<dyn CaptureProvider>);

    /// The provider process went away. The platform keeps the connection
    /// request alive and reports `on_connected` again when it returns.
    fn on_disconnected(&self);

    /// The connection can never be re-established by the platform on its own.
    fn on_binding_died(&self);

    /// The provider answered the connection with no interface.
    fn on_null_binding(&self);
}

// ── Provider RPC surface ──────────────────────────────────────────────────────

/// Remote capture provider. Every call crosses a process boundary and may fail.
pub trait CaptureProvider: Send + Sync {
    fn init_capture(&self) -> Result<(), RemoteError>;
    fn screen_width(&self) -> Result<i32, RemoteError>;
    fn screen_height(&self) -> Result<i32, RemoteError>;
    fn register_frame_callback(&self, callback: Arc<dyn FrameCallback>) -> Result<(), RemoteError>;
    fn unregister_frame_callback(&self) -> Result<(), RemoteError>;
    fn inject_pointer(&self, kind: i32, mask: i32, x: i32, y: i32, wake: bool) -> Result<(), RemoteError>;
    fn inject_key_event(&self, key_code: i32, modifiers: i32, down: bool, up: bool) -> Result<(), RemoteError>;
}

/// Callback the provider invokes for every produced frame.
pub trait FrameCallback: Send + Sync {
    fn on_frame_available(&self, memory: &dyn SharedMemory);
    fn on_capture_error(&self, error: &str);
}

// ── Shared memory ─────────────────────────────────────────────────────────────

/// A transient cross-process reference to a frame region.
pub trait SharedMemory: Send + Sync {
    /// Identity of the underlying region. Two handles with the same id refer
    /// to the same mapping-worthy memory, whatever their contents.
    fn id(&self) -> u64;

    fn map_read_only(&self) -> Result<Box<dyn MappedRegion>, MappingError>;
}

/// A live read-only mapping. Consumed by [`MappedRegion::unmap`], so it can
/// only be unmapped once.
pub trait MappedRegion: Send {
    fn bytes(&self) -> &[u8];

    fn unmap(self: Box<Self>) -> Result<(), MappingError>;
}
