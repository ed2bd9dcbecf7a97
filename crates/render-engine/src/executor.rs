//! Media operation executor.
//!
//! Everything that touches pixels or samples goes through this trait, one
//! method per operation kind with typed parameters. The engine's stages
//! never build command lines; `FfmpegExecutor` does, and tests substitute
//! an in-memory implementation.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use reelcut_common::error::ReelcutResult;
use reelcut_processing_core::geometry::GeometryTransform;
use reelcut_processing_core::timeline::TimelinePlan;
use reelcut_project_model::media::{FrameSize, Segment};

use crate::graph::DrawText;

/// Receives the completed fraction `[0, 1]` of the running operation.
pub type ToolProgress<'a> = &'a (dyn Fn(f64) + Send + Sync);

/// Progress sink that ignores updates.
pub fn no_progress(_: f64) {}

/// Video stream properties.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoStreamInfo {
    pub frame_size: FrameSize,
    pub fps: f64,
    pub codec: Option<String>,
}

/// Audio stream properties.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioStreamInfo {
    pub sample_rate: u32,
    pub channels: u32,
    pub codec: Option<String>,
}

/// What a probe reports about a media file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaInfo {
    pub path: PathBuf,
    pub duration_secs: f64,
    pub container: Option<String>,
    pub size_bytes: Option<u64>,
    pub video: Option<VideoStreamInfo>,
    pub audio: Option<AudioStreamInfo>,
    pub subtitle_streams: usize,
}

impl MediaInfo {
    /// View a probed video file as a segment.
    pub fn as_segment(&self) -> Option<Segment> {
        let video = self.video.as_ref()?;
        Some(Segment::new(
            self.path.clone(),
            self.duration_secs,
            video.frame_size,
            video.fps,
        ))
    }
}

/// Apply a geometry transform to one segment (video only).
#[derive(Debug, Clone)]
pub struct ScaleCropRequest {
    pub input: PathBuf,
    pub output: PathBuf,
    pub transform: GeometryTransform,
    pub crf: u8,
    pub duration_secs: f64,
}

/// Draw text lines onto one normalized clip.
#[derive(Debug, Clone)]
pub struct BurnTextRequest {
    pub input: PathBuf,
    pub output: PathBuf,
    pub texts: Vec<DrawText>,
    pub crf: u8,
    pub duration_secs: f64,
}

/// Music input of a mix.
#[derive(Debug, Clone)]
pub struct MusicInput {
    pub path: PathBuf,
    /// `volume` expression evaluated per frame.
    pub volume_expr: String,
}

/// Produce the job's audio track.
#[derive(Debug, Clone)]
pub struct MixAudioRequest {
    pub voice: PathBuf,
    pub music: Option<MusicInput>,
    pub output: PathBuf,
    pub duration_secs: f64,
    pub sample_rate: u32,
}

/// Join normalized clips into one timeline.
#[derive(Debug, Clone)]
pub struct ConcatRequest {
    pub inputs: Vec<PathBuf>,
    pub output: PathBuf,
    pub plan: TimelinePlan,
    pub crf: u8,
}

/// Final delivery encode.
#[derive(Debug, Clone)]
pub struct EncodeRequest {
    pub video: PathBuf,
    pub audio: PathBuf,
    pub soft_subtitles: Option<PathBuf>,
    pub output: PathBuf,
    pub frame_size: FrameSize,
    pub fps: u32,
    pub duration_secs: f64,
    pub video_bitrate_kbps: u32,
    pub crf: u8,
    pub preset: String,
    pub audio_bitrate_kbps: u32,
    pub audio_sample_rate: u32,
}

/// Media tool abstraction.
#[async_trait]
pub trait MediaExecutor: Send + Sync {
    /// Executor name for logs.
    fn name(&self) -> &str;

    /// Container, duration and stream properties of a file.
    async fn probe(&self, path: &Path) -> ReelcutResult<MediaInfo>;

    /// Decode the first audio stream to mono `f32` samples.
    async fn decode_mono_pcm(&self, path: &Path, sample_rate: u32) -> ReelcutResult<Vec<f32>>;

    async fn scale_crop(
        &self,
        request: &ScaleCropRequest,
        progress: ToolProgress<'_>,
    ) -> ReelcutResult<()>;

    async fn burn_text(
        &self,
        request: &BurnTextRequest,
        progress: ToolProgress<'_>,
    ) -> ReelcutResult<()>;

    async fn mix_audio(
        &self,
        request: &MixAudioRequest,
        progress: ToolProgress<'_>,
    ) -> ReelcutResult<()>;

    async fn concatenate(
        &self,
        request: &ConcatRequest,
        progress: ToolProgress<'_>,
    ) -> ReelcutResult<()>;

    async fn encode(&self, request: &EncodeRequest, progress: ToolProgress<'_>)
        -> ReelcutResult<()>;
}
