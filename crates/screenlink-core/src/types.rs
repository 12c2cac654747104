use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// Longest edge (in pixels) above which the half-scale policy kicks in.
pub const MAX_SCREEN_SIZE: u32 = 1200;

/// Density assumed for provider-reported geometry when none is known yet.
pub const DEFAULT_PROVIDER_DPI: u32 = 240;

// MARK: - ScreenInfo

/// Effective capture geometry.
///
/// When `scale == 2` the pixel dimensions and `dpi` have already been divided
/// by two; consumers never rescale them again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ScreenInfo {
    pub width: u32,
    pub height: u32,
    pub dpi: u32,
    pub scale: u32,
}

impl ScreenInfo {
    /// The degenerate value produced for zero-sized input.
    pub const EMPTY: Self = Self { width: 0, height: 0, dpi: 0, scale: 1 };

    pub fn new(width: u32, height: u32, dpi: u32, scale: u32) -> Self {
        Self { width, height, dpi, scale }
    }

    /// `true` when either pixel dimension is zero. Such a value must never be
    /// applied to capture resources.
    pub fn is_degenerate(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Density of the physical display before half-scaling.
    pub fn unscaled_dpi(&self) -> u32 {
        self.dpi * self.scale.max(1)
    }
}

impl Default for ScreenInfo {
    fn default() -> Self {
        Self::EMPTY
    }
}

impl std::fmt::Display for ScreenInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}×{} @{}dpi x{}", self.width, self.height, self.dpi, self.scale)
    }
}

// MARK: - Orientation

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Orientation {
    #[default]
    Portrait,
    Landscape,
}

// MARK: - DisplayMetrics

/// Raw display metrics as reported by the host, before orientation
/// normalisation or scaling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DisplayMetrics {
    pub width: u32,
    pub height: u32,
    pub dpi: u32,
}

impl DisplayMetrics {
    pub fn new(width: u32, height: u32, dpi: u32) -> Self {
        Self { width, height, dpi }
    }
}

// MARK: - CaptureGate

/// Shared "capture is logically running" flag.
///
/// The session controller owns the writer side; frame producers only ever
/// call [`CaptureGate::is_open`]. Cloning shares the same flag.
#[derive(Debug, Clone, Default)]
pub struct CaptureGate(Arc<AtomicBool>);

impl CaptureGate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_open(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    pub fn open(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn close(&self) {
        self.0.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_screen_info_is_degenerate_with_unit_scale() {
        let info = ScreenInfo::default();
        assert!(info.is_degenerate());
        assert_eq!(info.scale, 1);
    }

    #[test]
    fn unscaled_dpi_undoes_half_scale() {
        assert_eq!(ScreenInfo::new(720, 1280, 160, 2).unscaled_dpi(), 320);
        assert_eq!(ScreenInfo::new(720, 1280, 160, 1).unscaled_dpi(), 160);
    }

    #[test]
    fn gate_clones_share_state() {
        let gate = CaptureGate::new();
        let reader = gate.clone();
        assert!(!reader.is_open());
        gate.open();
        assert!(reader.is_open());
        gate.close();
        assert!(!reader.is_open());
    }

    #[test]
    fn orientation_serialises_lowercase() {
        let json = serde_json::to_string(&Orientation::Landscape).unwrap();
        assert_eq!(json, "\"landscape\"");
    }
}
