use thiserror::Error;

use crate::types::ScreenInfo;

// ── Provider binding ──────────────────────────────────────────────────────────

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BindError {
    #[error("Capture provider did not connect within {ms}ms")]
    Timeout { ms: u64 },

    #[error("Capture provider unavailable: {reason}")]
    Unavailable { reason: String },

    #[error("Capture provider bind cancelled by unbind")]
    Cancelled,
}

/// Failure of a single call across the process boundary.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RemoteError {
    #[error("Remote provider is dead")]
    DeadObject,

    #[error("Remote call failed: {0}")]
    Remote(String),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InitError {
    #[error("Capture provider is not bound")]
    NotBound,

    #[error("Invalid provider screen dimensions: {width}x{height}")]
    InvalidDimensions { width: i32, height: i32 },

    #[error("Provider init failed: {0}")]
    RemoteFailure(#[from] RemoteError),
}

/// Best-effort input injection failed. Always logged where it is produced and
/// never fatal to the capture session.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InjectionFailure {
    #[error("Capture provider is not bound")]
    NotBound,

    #[error("Injection call failed: {0}")]
    Remote(#[from] RemoteError),
}

// ── Frame path ────────────────────────────────────────────────────────────────

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MappingError {
    #[error("Failed to map shared memory: {reason}")]
    Failed { reason: String },

    #[error("Failed to unmap shared memory: {reason}")]
    UnmapFailed { reason: String },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SinkError {
    #[error("Frame rejected by sink: {reason}")]
    Rejected { reason: String },
}

// ── Local capture platform ────────────────────────────────────────────────────

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PlatformError {
    #[error("Permission denied: {reason}")]
    PermissionDenied { reason: String },

    #[error("Platform resource unavailable: {reason}")]
    Unavailable { reason: String },

    #[error("Platform call failed: {reason}")]
    Failed { reason: String },
}

impl PlatformError {
    pub fn is_permission_denied(&self) -> bool {
        matches!(self, Self::PermissionDenied { .. })
    }
}

// ── Session ───────────────────────────────────────────────────────────────────

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CaptureError {
    #[error("No capture consent handle available")]
    ConsentMissing,

    #[error("Refusing to capture with degenerate geometry {0}")]
    InvalidGeometry(ScreenInfo),

    #[error("Capture session has been destroyed")]
    Destroyed,

    #[error("Provider binding failed: {0}")]
    Provider(#[from] BindError),

    #[error("Provider init failed: {0}")]
    ProviderInit(#[from] InitError),

    #[error("Platform error: {0}")]
    Platform(#[from] PlatformError),
}

// ── Configuration ─────────────────────────────────────────────────────────────

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid configuration JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Configuration invalid: {reason}")]
    Invalid { reason: String },
}
