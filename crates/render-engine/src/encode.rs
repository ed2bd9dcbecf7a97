//! Final delivery encode.
//!
//! The encoder writes next to the destination under a hidden temporary
//! name, probes what it wrote, and only then renames it onto the output
//! path. Any failure before the rename drops the temporary file, so the
//! destination never holds a partial or unverified video.

use std::path::Path;

use chrono::Utc;

use reelcut_common::config::EncodingDefaults;
use reelcut_common::error::{ReelcutError, ReelcutResult};
use reelcut_common::timing::FrameClock;
use reelcut_processing_core::timeline::check_drift;
use reelcut_project_model::output::FinalVideo;
use reelcut_project_model::request::PostProductionConfig;

use crate::executor::{EncodeRequest, MediaExecutor, MediaInfo, ToolProgress};

/// Frame-rate difference tolerated when comparing probed rates.
const FPS_EPSILON: f64 = 1e-3;

/// Artifacts the final encode consumes.
#[derive(Debug, Clone, Copy)]
pub struct EncodeInputs<'a> {
    pub video: &'a Path,
    pub audio: &'a Path,
    pub soft_subtitles: Option<&'a Path>,
    pub expected_duration_secs: f64,
}

pub struct FinalEncoder {
    encoding: EncodingDefaults,
}

impl FinalEncoder {
    pub fn new(encoding: EncodingDefaults) -> Self {
        Self { encoding }
    }

    /// Encode the inputs to `job.output_path`.
    pub async fn encode(
        &self,
        job: &PostProductionConfig,
        inputs: EncodeInputs<'_>,
        executor: &dyn MediaExecutor,
        progress: ToolProgress<'_>,
    ) -> ReelcutResult<FinalVideo> {
        let EncodeInputs {
            video,
            audio,
            soft_subtitles,
            expected_duration_secs,
        } = inputs;
        let dir = match job.output_path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => std::env::current_dir()?,
        };
        std::fs::create_dir_all(&dir)?;

        let staged = tempfile::Builder::new()
            .prefix(".reelcut-")
            .suffix(".mp4.part")
            .tempfile_in(&dir)?;

        let request = EncodeRequest {
            video: video.to_path_buf(),
            audio: audio.to_path_buf(),
            soft_subtitles: soft_subtitles.map(Path::to_path_buf),
            output: staged.path().to_path_buf(),
            frame_size: job.frame_size,
            fps: job.fps,
            duration_secs: expected_duration_secs,
            video_bitrate_kbps: job.video_bitrate_kbps,
            crf: self.encoding.crf,
            preset: self.encoding.preset.clone(),
            audio_bitrate_kbps: self.encoding.audio_bitrate_kbps,
            audio_sample_rate: self.encoding.audio_sample_rate,
        };
        tracing::info!(
            output = %job.output_path.display(),
            bitrate_kbps = job.video_bitrate_kbps,
            soft_subtitles = soft_subtitles.is_some(),
            "Encoding final video"
        );
        executor.encode(&request, progress).await?;

        let info = executor.probe(staged.path()).await?;
        verify_output(&info, job, expected_duration_secs)?;

        // Staged files are created owner-only; publish with the usual mode.
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(staged.path(), std::fs::Permissions::from_mode(0o644))?;
        }
        staged
            .persist(&job.output_path)
            .map_err(|e| ReelcutError::Io(e.error))?;
        let file_size_bytes = std::fs::metadata(&job.output_path)?.len();

        let video_stream = info.video.as_ref();
        Ok(FinalVideo {
            path: job.output_path.clone(),
            duration_secs: info.duration_secs,
            frame_size: job.frame_size,
            fps: video_stream.map_or(job.fps as f64, |v| v.fps),
            container: info.container.clone().unwrap_or_else(|| "mp4".to_string()),
            video_codec: video_stream
                .and_then(|v| v.codec.clone())
                .unwrap_or_else(|| "h264".to_string()),
            audio_codec: info
                .audio
                .as_ref()
                .and_then(|a| a.codec.clone())
                .unwrap_or_else(|| "aac".to_string()),
            has_soft_subtitles: info.subtitle_streams > 0,
            file_size_bytes,
            produced_at: Utc::now(),
        })
    }
}

/// Check a probed encode against the job's target geometry, rate and duration.
pub fn verify_output(
    info: &MediaInfo,
    job: &PostProductionConfig,
    expected_duration_secs: f64,
) -> ReelcutResult<()> {
    let video = info.video.as_ref().ok_or_else(|| {
        ReelcutError::encode("verification", "no video stream", info.path.display().to_string())
    })?;
    if video.frame_size != job.frame_size {
        return Err(ReelcutError::encode(
            "verification",
            "wrong frame size",
            format!("expected {}, probed {}", job.frame_size, video.frame_size),
        ));
    }
    if (video.fps - job.fps as f64).abs() > FPS_EPSILON {
        return Err(ReelcutError::encode(
            "verification",
            "wrong frame rate",
            format!("expected {} fps, probed {:.3} fps", job.fps, video.fps),
        ));
    }
    if info.audio.is_none() {
        return Err(ReelcutError::encode(
            "verification",
            "no audio stream",
            info.path.display().to_string(),
        ));
    }
    check_drift(
        expected_duration_secs,
        info.duration_secs,
        FrameClock::new(job.fps),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::{AudioStreamInfo, VideoStreamInfo};
    use reelcut_project_model::media::FrameSize;
    use reelcut_project_model::request::AudioMixSpec;
    use std::path::PathBuf;

    fn job() -> PostProductionConfig {
        PostProductionConfig::new(
            vec![PathBuf::from("a.mp4")],
            "final.mp4",
            AudioMixSpec::voice_only("voice.wav"),
        )
    }

    fn info(frame_size: FrameSize, fps: f64, duration_secs: f64) -> MediaInfo {
        MediaInfo {
            path: PathBuf::from("staged.mp4"),
            duration_secs,
            container: Some("mov,mp4,m4a,3gp,3g2,mj2".into()),
            size_bytes: None,
            video: Some(VideoStreamInfo {
                frame_size,
                fps,
                codec: Some("h264".into()),
            }),
            audio: Some(AudioStreamInfo {
                sample_rate: 48_000,
                channels: 2,
                codec: Some("aac".into()),
            }),
            subtitle_streams: 0,
        }
    }

    #[test]
    fn test_verify_accepts_target() {
        assert!(verify_output(&info(FrameSize::VERTICAL_HD, 30.0, 15.02), &job(), 15.0).is_ok());
    }

    #[test]
    fn test_verify_rejects_geometry_and_rate() {
        assert!(matches!(
            verify_output(&info(FrameSize::new(1920, 1080), 30.0, 15.0), &job(), 15.0),
            Err(ReelcutError::Encode { .. })
        ));
        assert!(matches!(
            verify_output(&info(FrameSize::VERTICAL_HD, 29.97, 15.0), &job(), 15.0),
            Err(ReelcutError::Encode { .. })
        ));
    }

    #[test]
    fn test_verify_rejects_duration_drift() {
        assert!(matches!(
            verify_output(&info(FrameSize::VERTICAL_HD, 30.0, 16.0), &job(), 15.0),
            Err(ReelcutError::TimelineDrift { .. })
        ));
    }
}
