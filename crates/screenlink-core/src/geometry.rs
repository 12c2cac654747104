//! Effective capture geometry from raw display metrics.
//!
//! ```text
//! DisplayMetrics + Orientation + half_scale
//!        │
//!        ▼   swap so the long edge follows orientation (never rescale)
//!        ▼   halve w/h/dpi when half_scale && long edge > max_screen_size
//! ScreenInfo { width, height, dpi, scale }
//! ```

use crate::types::{DisplayMetrics, Orientation, ScreenInfo, MAX_SCREEN_SIZE};

/// Pure geometry computation. Holds only the half-scale threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScreenGeometryResolver {
    max_screen_size: u32,
}

impl Default for ScreenGeometryResolver {
    fn default() -> Self {
        Self { max_screen_size: MAX_SCREEN_SIZE }
    }
}

impl ScreenGeometryResolver {
    pub fn new(max_screen_size: u32) -> Self {
        Self { max_screen_size }
    }

    pub fn max_screen_size(&self) -> u32 {
        self.max_screen_size
    }

    /// Resolve the capture geometry.
    ///
    /// Returns [`ScreenInfo::EMPTY`] when either raw dimension is zero; the
    /// caller must not apply that value.
    pub fn resolve(
        &self,
        metrics: DisplayMetrics,
        orientation: Orientation,
        half_scale: bool,
    ) -> ScreenInfo {
        if metrics.width == 0 || metrics.height == 0 {
            return ScreenInfo::EMPTY;
        }

        let long = metrics.width.max(metrics.height);
        let short = metrics.width.min(metrics.height);
        let (mut width, mut height) = match orientation {
            Orientation::Landscape => (long, short),
            Orientation::Portrait => (short, long),
        };
        let mut dpi = metrics.dpi;
        let mut scale = 1;

        if half_scale && long > self.max_screen_size {
            scale = 2;
            width /= scale;
            height /= scale;
            dpi /= scale;
        }

        ScreenInfo { width, height, dpi, scale }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SIZES: &[(u32, u32)] = &[
        (1080, 2400),
        (2400, 1080),
        (800, 600),
        (600, 800),
        (1200, 1200),
        (1201, 700),
        (1, 5000),
    ];

    #[test]
    fn long_edge_follows_orientation() {
        let resolver = ScreenGeometryResolver::default();
        for &(w, h) in SIZES {
            for half in [false, true] {
                let m = DisplayMetrics::new(w, h, 320);
                let land = resolver.resolve(m, Orientation::Landscape, half);
                assert!(land.width >= land.height, "landscape {w}x{h} half={half} → {land}");
                let port = resolver.resolve(m, Orientation::Portrait, half);
                assert!(port.height >= port.width, "portrait {w}x{h} half={half} → {port}");
            }
        }
    }

    #[test]
    fn orientation_change_swaps_without_scaling() {
        let resolver = ScreenGeometryResolver::default();
        let m = DisplayMetrics::new(1080, 2400, 420);
        let port = resolver.resolve(m, Orientation::Portrait, false);
        let land = resolver.resolve(m, Orientation::Landscape, false);
        assert_eq!((port.width, port.height), (1080, 2400));
        assert_eq!((land.width, land.height), (2400, 1080));
        assert_eq!(port.dpi, land.dpi);
    }

    #[test]
    fn half_scale_halves_above_threshold() {
        let resolver = ScreenGeometryResolver::default();
        for &(w, h) in SIZES {
            let m = DisplayMetrics::new(w, h, 321);
            let full = resolver.resolve(m, Orientation::Portrait, false);
            let half = resolver.resolve(m, Orientation::Portrait, true);
            assert_eq!(full.scale, 1);
            if w.max(h) > MAX_SCREEN_SIZE {
                assert_eq!(half.scale, 2);
                assert_eq!(half.width, full.width / 2);
                assert_eq!(half.height, full.height / 2);
                assert_eq!(half.dpi, 160);
            } else {
                assert_eq!(half, full, "{w}x{h} must not be scaled");
            }
        }
    }

    #[test]
    fn threshold_is_strict() {
        let resolver = ScreenGeometryResolver::default();
        let at = resolver.resolve(DisplayMetrics::new(1200, 900, 200), Orientation::Landscape, true);
        assert_eq!(at, ScreenInfo::new(1200, 900, 200, 1));
    }

    #[test]
    fn custom_threshold() {
        let resolver = ScreenGeometryResolver::new(800);
        let info = resolver.resolve(DisplayMetrics::new(900, 600, 160), Orientation::Landscape, true);
        assert_eq!(info, ScreenInfo::new(450, 300, 80, 2));
    }

    #[test]
    fn zero_dimension_is_degenerate() {
        let resolver = ScreenGeometryResolver::default();
        for m in [DisplayMetrics::new(0, 1080, 160), DisplayMetrics::new(1920, 0, 160)] {
            let info = resolver.resolve(m, Orientation::Landscape, true);
            assert_eq!(info, ScreenInfo::EMPTY);
            assert!(info.is_degenerate());
        }
    }
}
