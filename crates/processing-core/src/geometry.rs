//! Vertical framing geometry.
//!
//! Converts an arbitrary-aspect source into the fixed target frame by
//! scaling until the target is covered, then centre-cropping the overscan.
//! Frame rate conversion duplicates or drops frames; it never interpolates.

use reelcut_common::error::{ReelcutError, ReelcutResult};
use reelcut_project_model::media::FrameSize;

/// Largest upscale accepted before quality loss is considered unacceptable.
pub const MAX_UPSCALE: f64 = 2.0;

/// Scale + crop + resample parameters for one source.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeometryTransform {
    /// Size after scaling (covers the target in both dimensions).
    pub scaled: FrameSize,

    /// Crop rectangle origin inside the scaled frame.
    pub crop_x: u32,
    pub crop_y: u32,

    /// Crop size (always the target size).
    pub target: FrameSize,

    /// Output frame rate.
    pub fps: u32,

    /// Uniform scale factor applied to the source.
    pub scale_factor: f64,
}

impl GeometryTransform {
    /// Plan the transform from `source` to `target` at `fps`.
    pub fn compute(source: FrameSize, target: FrameSize, fps: u32) -> ReelcutResult<Self> {
        if source.is_empty() {
            return Err(ReelcutError::unsupported_geometry(format!(
                "source has degenerate frame size {source}"
            )));
        }
        if target.is_empty() || fps == 0 {
            return Err(ReelcutError::unsupported_geometry(format!(
                "invalid target {target} @ {fps} fps"
            )));
        }

        let sx = target.width as f64 / source.width as f64;
        let sy = target.height as f64 / source.height as f64;
        let scale_factor = sx.max(sy);

        if scale_factor > MAX_UPSCALE {
            return Err(ReelcutError::unsupported_geometry(format!(
                "source {source} needs a {scale_factor:.2}x upscale to cover {target} (limit {MAX_UPSCALE:.1}x)"
            )));
        }

        let scaled = FrameSize::new(
            cover_dimension(source.width, scale_factor, target.width),
            cover_dimension(source.height, scale_factor, target.height),
        );

        Ok(Self {
            scaled,
            crop_x: (scaled.width - target.width) / 2,
            crop_y: (scaled.height - target.height) / 2,
            target,
            fps,
            scale_factor,
        })
    }

    /// Whether the source already matches the target exactly.
    pub fn is_identity(&self) -> bool {
        self.scaled == self.target && self.crop_x == 0 && self.crop_y == 0
    }

    /// Fraction of the scaled frame discarded by the crop.
    pub fn overscan_ratio(&self) -> f64 {
        let scaled_area = self.scaled.width as f64 * self.scaled.height as f64;
        let target_area = self.target.width as f64 * self.target.height as f64;
        1.0 - target_area / scaled_area
    }
}

/// Scaled length rounded to an even number and never below `min`.
fn cover_dimension(len: u32, factor: f64, min: u32) -> u32 {
    let scaled = (len as f64 * factor).round() as u32;
    let even = scaled + (scaled % 2);
    even.max(min)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_landscape_full_hd_to_vertical() {
        let t = GeometryTransform::compute(FrameSize::new(1920, 1080), FrameSize::VERTICAL_HD, 30)
            .unwrap();
        // 1920/1080 * 1920 = 3413.3 -> 3414 wide, 1920 high
        assert_eq!(t.scaled, FrameSize::new(3414, 1920));
        assert_eq!(t.crop_x, (3414 - 1080) / 2);
        assert_eq!(t.crop_y, 0);
        assert!((t.scale_factor - 1920.0 / 1080.0).abs() < 1e-9);
    }

    #[test]
    fn test_identity_source() {
        let t = GeometryTransform::compute(FrameSize::VERTICAL_HD, FrameSize::VERTICAL_HD, 30)
            .unwrap();
        assert!(t.is_identity());
        assert_eq!(t.overscan_ratio(), 0.0);
    }

    #[test]
    fn test_downscale_tall_source() {
        let t = GeometryTransform::compute(FrameSize::new(1440, 3200), FrameSize::VERTICAL_HD, 30)
            .unwrap();
        assert_eq!(t.scaled.width, 1080);
        assert_eq!(t.scaled.height, 2400);
        assert_eq!(t.crop_y, 240);
    }

    #[test]
    fn test_small_source_rejected() {
        let err = GeometryTransform::compute(FrameSize::new(320, 180), FrameSize::VERTICAL_HD, 30)
            .unwrap_err();
        assert!(matches!(err, ReelcutError::UnsupportedGeometry { .. }));
    }

    #[test]
    fn test_modest_upscale_accepted() {
        // Smaller than target in both dimensions but within 2x.
        let t = GeometryTransform::compute(FrameSize::new(720, 1280), FrameSize::VERTICAL_HD, 30)
            .unwrap();
        assert!((t.scale_factor - 1.5).abs() < 1e-9);
        assert_eq!(t.scaled, FrameSize::VERTICAL_HD);
    }

    #[test]
    fn test_degenerate_source_rejected() {
        assert!(GeometryTransform::compute(FrameSize::new(0, 0), FrameSize::VERTICAL_HD, 30).is_err());
    }

    #[test]
    fn test_odd_source_rounds_to_even() {
        let t = GeometryTransform::compute(FrameSize::new(1279, 1081), FrameSize::VERTICAL_HD, 30)
            .unwrap();
        assert!(t.scaled.is_even());
        assert!(t.scaled.width >= 1080 && t.scaled.height >= 1920);
    }
}
