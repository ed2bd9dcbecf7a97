//! Reelcut Render Engine
//!
//! Runs a post-production job as a strict sequence of stages, each one
//! consuming the previous stage's artifact and handing a new one on.
//! Every pixel and sample operation goes through a [`MediaExecutor`];
//! [`FfmpegExecutor`] drives `ffmpeg`/`ffprobe`.
//!
//! # Pipeline Architecture
//!
//! ```text
//! segments ────── Geometry (scale + centre crop, per clip)
//!                        │
//! subtitles.srt ─────────├── Subtitles (burn-in per clip, or soft track)
//!                        │
//! voice + music ─────────├── Audio Mix (VAD → ducking envelope → mix.wav)
//!                        │
//!                        ├── Concatenate (concat / xfade, drift check)
//!                        │
//!                        ▼
//!                 Encode (H.264 + AAC, probe, verify)
//!                        │
//!                        ▼
//!                    output.mp4
//! ```

pub mod audio;
pub mod concat;
pub mod encode;
pub mod executor;
pub mod ffmpeg;
pub mod graph;
pub mod pipeline;
pub mod subtitles;
pub mod workspace;

pub use executor::{MediaExecutor, MediaInfo};
pub use ffmpeg::FfmpegExecutor;
pub use pipeline::{
    JobError, JobProgress, PipelineState, PostProductionOrchestrator, ProgressCallback, Stage,
};
pub use workspace::JobWorkspace;

use reelcut_common::error::ReelcutError;
use reelcut_project_model::ModelError;

/// Map job-data errors onto the engine's error type.
pub(crate) fn model_error(err: ModelError) -> ReelcutError {
    match err {
        ModelError::IoError { source, .. } => ReelcutError::Io(source),
        ModelError::ParseError { source, .. } => ReelcutError::Json(source),
        ModelError::ValidationError { message } => ReelcutError::InvalidConfig { message },
    }
}
