//! Frame geometry and probed input media.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Frame dimensions in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FrameSize {
    pub width: u32,
    pub height: u32,
}

impl FrameSize {
    /// Portrait 9:16 full HD, the default publishing target.
    pub const VERTICAL_HD: FrameSize = FrameSize {
        width: 1080,
        height: 1920,
    };

    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }


    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// H.264 with yuv420p needs even dimensions.
    pub fn is_even(&self) -> bool {
        self.width % 2 == 0 && self.height % 2 == 0
    }
}

impl Default for FrameSize {
    fn default() -> Self {
        Self::VERTICAL_HD
    }
}

impl fmt::Display for FrameSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// An axis-aligned rectangle in output pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width: width.max(0.0),
            height: height.max(0.0),
        }
    }

    pub fn right(&self) -> f64 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f64 {
        self.y + self.height
    }

    /// Whether `other` lies entirely inside this rectangle.
    pub fn contains_rect(&self, other: &Rect) -> bool {
        const EPS: f64 = 1e-6;
        other.x >= self.x - EPS
            && other.y >= self.y - EPS
            && other.right() <= self.right() + EPS
            && other.bottom() <= self.bottom() + EPS
    }
}

/// A raw input video segment with its probed properties.
///
/// Segments are owned by the caller; the engine only reads them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    /// Source file.
    pub path: PathBuf,

    /// Probed duration.
    pub duration_secs: f64,

    /// Probed frame size of the first video stream.
    pub frame_size: FrameSize,

    /// Probed frame rate of the first video stream.
    pub fps: f64,
}

impl Segment {
    pub fn new(path: impl Into<PathBuf>, duration_secs: f64, frame_size: FrameSize, fps: f64) -> Self {
        Self {
            path: path.into(),
            duration_secs,
            frame_size,
            fps,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_frame_is_vertical_hd() {
        let frame = FrameSize::default();
        assert_eq!(frame, FrameSize::new(1080, 1920));
        assert_eq!(frame.to_string(), "1080x1920");
    }

    #[test]
    fn test_degenerate_frame() {
        assert!(FrameSize::new(0, 1080).is_empty());
        assert!(!FrameSize::new(1081, 1920).is_even());
    }

    #[test]
    fn test_rect_containment() {
        let outer = Rect::new(0.0, 0.0, 100.0, 100.0);
        assert!(outer.contains_rect(&Rect::new(10.0, 10.0, 90.0, 90.0)));
        assert!(!outer.contains_rect(&Rect::new(10.0, 10.0, 91.0, 10.0)));
        assert_eq!(Rect::new(0.0, 0.0, -5.0, 3.0).width, 0.0);
    }
}
