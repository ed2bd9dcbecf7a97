//! The finished artifact of a post-production job.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::media::FrameSize;

/// A publish-ready video. Only ever constructed after a successful encode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinalVideo {
    /// The exact output path from the job config.
    pub path: PathBuf,

    /// Probed duration of the written file.
    pub duration_secs: f64,

    /// Probed resolution.
    pub frame_size: FrameSize,

    /// Probed frame rate.
    pub fps: f64,

    /// Container format name as reported by the prober (e.g. "mov,mp4,m4a,3gp,3g2,mj2").
    pub container: String,

    /// Video codec (e.g. "h264").
    pub video_codec: String,

    /// Audio codec (e.g. "aac").
    pub audio_codec: String,

    /// Whether a soft subtitle stream was muxed.
    pub has_soft_subtitles: bool,

    /// Size of the written file.
    pub file_size_bytes: u64,

    /// When the file was committed to its final path.
    pub produced_at: DateTime<Utc>,
}
