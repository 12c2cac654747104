//! screenlink-core — shared types for the ScreenLink capture service.
//!
//! Everything the provider binding, the capture controller and the service
//! loop agree on lives here: geometry, the error taxonomy, configuration, the
//! frame sink seam and the input model.

pub mod config;
pub mod errors;
pub mod frame;
pub mod geometry;
pub mod input;
pub mod types;

pub use config::ServiceConfig;
pub use errors::{
    BindError, CaptureError, ConfigError, InitError, InjectionFailure, MappingError,
    PlatformError, RemoteError, SinkError,
};
pub use frame::{FrameSink, FrameStats};
pub use geometry::ScreenGeometryResolver;
pub use input::{KeyInput, PointerInput, PointerKind};
pub use types::*;
