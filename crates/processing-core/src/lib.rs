//! Reelcut Processing Core
//!
//! Plans every pixel- and sample-touching operation before any tool runs:
//! - **Geometry:** Cover-scale and centre-crop any source to the target frame
//! - **Subtitle Layout:** Wrap and place cue text inside the safe zone
//! - **Voice Activity:** Find speech windows in a voice track by RMS energy
//! - **Ducking:** Turn speech windows into a tapered music gain envelope
//! - **Timeline:** Transition clamping, clip offsets, and drift checks
//!
//! This crate is pure computation: no I/O, no subprocesses.
//! All inputs are data; all outputs are data.

pub mod ducking;
pub mod geometry;
pub mod subtitle_layout;
pub mod timeline;
pub mod voice_activity;

pub use ducking::DuckingEnvelope;
pub use geometry::GeometryTransform;
pub use subtitle_layout::SubtitleLayout;
pub use timeline::TimelinePlan;
pub use voice_activity::{TimeRange, VoiceActivityDetector};
