//! The post-production job request.
//!
//! A `PostProductionConfig` is created once per job (usually from a JSON job
//! file written by the upstream pipeline) and never mutated while the job
//! runs.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::media::{FrameSize, Rect};
use crate::ModelError;

/// Fractions of the frame kept free of subtitle text on each side.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SafeTextMargins {
    pub top: f64,
    pub bottom: f64,
    pub left: f64,
    pub right: f64,
}

impl Default for SafeTextMargins {
    fn default() -> Self {
        Self {
            top: 0.10,
            bottom: 0.20,
            left: 0.08,
            right: 0.08,
        }
    }
}

impl SafeTextMargins {
    /// The pixel rectangle text may occupy in a frame of `size`.
    pub fn safe_rect(&self, size: FrameSize) -> Rect {
        let w = size.width as f64;
        let h = size.height as f64;
        let left = w * self.left;
        let top = h * self.top;
        let right = w * (1.0 - self.right);
        let bottom = h * (1.0 - self.bottom);
        Rect::new(left, top, right - left, bottom - top)
    }

    pub fn validate(&self) -> Result<(), ModelError> {
        for (name, value) in [
            ("top", self.top),
            ("bottom", self.bottom),
            ("left", self.left),
            ("right", self.right),
        ] {
            if !(0.0..1.0).contains(&value) {
                return Err(ModelError::validation(format!(
                    "margin {name} must be within [0, 1), got {value}"
                )));
            }
        }
        if self.top + self.bottom >= 1.0 || self.left + self.right >= 1.0 {
            return Err(ModelError::validation(
                "opposite margins leave no room for text",
            ));
        }
        Ok(())
    }
}

/// Voice and optional background music.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioMixSpec {
    /// Voiceover track (required).
    pub voice_path: PathBuf,

    /// Background music, looped or trimmed to the timeline.
    #[serde(default)]
    pub music_path: Option<PathBuf>,

    /// Linear gain applied to the music.
    #[serde(default = "default_music_volume")]
    pub music_volume: f64,

    /// Lower the music further while the voice is speaking.
    #[serde(default = "default_true")]
    pub ducking: bool,
}

impl AudioMixSpec {
    pub fn voice_only(voice_path: impl Into<PathBuf>) -> Self {
        Self {
            voice_path: voice_path.into(),
            music_path: None,
            music_volume: default_music_volume(),
            ducking: false,
        }
    }

    /// Ducking only means something when there is music to duck.
    pub fn ducking_active(&self) -> bool {
        self.ducking && self.music_path.is_some()
    }
}

/// How adjacent segments are joined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TransitionKind {
    #[default]
    None,
    Fade,
    Crossfade,
}

/// Transition kind and nominal duration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct TransitionSpec {
    #[serde(default)]
    pub kind: TransitionKind,

    #[serde(default)]
    pub duration_secs: f64,
}

impl TransitionSpec {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn fade(duration_secs: f64) -> Self {
        Self {
            kind: TransitionKind::Fade,
            duration_secs,
        }
    }

    pub fn crossfade(duration_secs: f64) -> Self {
        Self {
            kind: TransitionKind::Crossfade,
            duration_secs,
        }
    }

    /// Effective duration between two neighbours of the given lengths.
    ///
    /// Never more than half of the shorter neighbour; zero for `none`.
    pub fn clamped_between(&self, left_secs: f64, right_secs: f64) -> f64 {
        if self.kind == TransitionKind::None {
            return 0.0;
        }
        let limit = left_secs.min(right_secs).max(0.0) / 2.0;
        self.duration_secs.clamp(0.0, limit)
    }
}

/// Everything one post-production job needs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostProductionConfig {
    /// Raw segments in timeline order.
    pub segments: Vec<PathBuf>,

    /// Exact destination of the final video.
    pub output_path: PathBuf,

    /// Subtitle source (SRT or WebVTT).
    #[serde(default)]
    pub subtitles: Option<PathBuf>,

    /// Burn subtitles into pixels instead of muxing a soft stream.
    #[serde(default = "default_true")]
    pub burn_in_subtitles: bool,

    #[serde(default)]
    pub margins: SafeTextMargins,

    pub audio: AudioMixSpec,

    #[serde(default)]
    pub transition: TransitionSpec,

    #[serde(default = "default_fps")]
    pub fps: u32,

    #[serde(default)]
    pub frame_size: FrameSize,

    /// Bitrate ceiling of the final H.264 stream.
    #[serde(default = "default_video_bitrate_kbps")]
    pub video_bitrate_kbps: u32,
}

impl PostProductionConfig {
    /// A config with defaults for everything but the inputs and output.
    pub fn new(
        segments: Vec<PathBuf>,
        output_path: impl Into<PathBuf>,
        audio: AudioMixSpec,
    ) -> Self {
        Self {
            segments,
            output_path: output_path.into(),
            subtitles: None,
            burn_in_subtitles: true,
            margins: SafeTextMargins::default(),
            audio,
            transition: TransitionSpec::none(),
            fps: default_fps(),
            frame_size: FrameSize::default(),
            video_bitrate_kbps: default_video_bitrate_kbps(),
        }
    }

    /// Load a JSON job file. Relative paths are resolved against the file's directory.
    pub fn load(path: &Path) -> Result<Self, ModelError> {
        let content = std::fs::read_to_string(path).map_err(|e| ModelError::IoError {
            path: path.to_path_buf(),
            source: e,
        })?;
        let mut config: Self =
            serde_json::from_str(&content).map_err(|e| ModelError::ParseError {
                path: path.to_path_buf(),
                source: e,
            })?;
        if let Some(base) = path.parent() {
            config.resolve_relative_to(base);
        }
        Ok(config)
    }

    /// Save as pretty JSON.
    pub fn save(&self, path: &Path) -> Result<(), ModelError> {
        let json = serde_json::to_string_pretty(self).map_err(|e| ModelError::ParseError {
            path: path.to_path_buf(),
            source: e,
        })?;
        std::fs::write(path, json).map_err(|e| ModelError::IoError {
            path: path.to_path_buf(),
            source: e,
        })
    }

    fn resolve_relative_to(&mut self, base: &Path) {
        let resolve = |p: &mut PathBuf| {
            if p.is_relative() {
                *p = base.join(&*p);
            }
        };
        self.segments.iter_mut().for_each(resolve);
        resolve(&mut self.output_path);
        if let Some(subs) = self.subtitles.as_mut() {
            resolve(subs);
        }
        resolve(&mut self.audio.voice_path);
        if let Some(music) = self.audio.music_path.as_mut() {
            resolve(music);
        }
    }

    /// Structural validation. File existence is checked by the engine.
    pub fn validate(&self) -> Result<(), ModelError> {
        if self.segments.is_empty() {
            return Err(ModelError::validation("at least one segment is required"));
        }
        if self.fps == 0 {
            return Err(ModelError::validation("fps must be positive"));
        }
        if self.frame_size.is_empty() || !self.frame_size.is_even() {
            return Err(ModelError::validation(format!(
                "frame size must be non-zero and even, got {}",
                self.frame_size
            )));
        }
        if self.video_bitrate_kbps == 0 {
            return Err(ModelError::validation("video bitrate must be positive"));
        }
        if !(0.0..=1.0).contains(&self.audio.music_volume) {
            return Err(ModelError::validation(format!(
                "music volume must be within [0, 1], got {}",
                self.audio.music_volume
            )));
        }
        if !self.transition.duration_secs.is_finite() || self.transition.duration_secs < 0.0 {
            return Err(ModelError::validation(
                "transition duration must be a non-negative number",
            ));
        }
        if self.output_path.file_name().is_none() {
            return Err(ModelError::validation("output path must name a file"));
        }
        self.margins.validate()
    }
}

fn default_true() -> bool {
    true
}

fn default_fps() -> u32 {
    30
}

fn default_music_volume() -> f64 {
    0.5
}

fn default_video_bitrate_kbps() -> u32 {
    8000
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> PostProductionConfig {
        PostProductionConfig::new(
            vec![PathBuf::from("a.mp4"), PathBuf::from("b.mp4")],
            "out/final.mp4",
            AudioMixSpec::voice_only("voice.wav"),
        )
    }

    #[test]
    fn test_defaults() {
        let config = sample();
        assert_eq!(config.fps, 30);
        assert_eq!(config.frame_size, FrameSize::new(1080, 1920));
        assert_eq!(config.video_bitrate_kbps, 8000);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_minimal_json_deserialization() {
        let json = r#"{
            "segments": ["clip1.mp4"],
            "output_path": "final.mp4",
            "audio": { "voice_path": "voice.wav", "music_path": "music.mp3" },
            "transition": { "kind": "crossfade", "duration_secs": 0.5 }
        }"#;
        let config: PostProductionConfig = serde_json::from_str(json).unwrap();
        assert!(config.burn_in_subtitles);
        assert!(config.audio.ducking_active());
        assert!((config.audio.music_volume - 0.5).abs() < 1e-9);
        assert_eq!(config.transition.kind, TransitionKind::Crossfade);
        assert_eq!(config.margins, SafeTextMargins::default());
    }

    #[test]
    fn test_ducking_requires_music() {
        let mut spec = AudioMixSpec::voice_only("voice.wav");
        spec.ducking = true;
        assert!(!spec.ducking_active());
    }

    #[test]
    fn test_validation_failures() {
        let mut config = sample();
        config.segments.clear();
        assert!(config.validate().is_err());

        let mut config = sample();
        config.frame_size = FrameSize::new(1081, 1920);
        assert!(config.validate().is_err());

        let mut config = sample();
        config.audio.music_volume = 1.2;
        assert!(config.validate().is_err());

        let mut config = sample();
        config.margins = SafeTextMargins {
            top: 0.6,
            bottom: 0.5,
            left: 0.1,
            right: 0.1,
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_transition_clamping() {
        let fade = TransitionSpec::fade(3.0);
        assert!((fade.clamped_between(5.0, 4.0) - 2.0).abs() < 1e-9);
        assert!((fade.clamped_between(10.0, 10.0) - 3.0).abs() < 1e-9);
        assert_eq!(TransitionSpec::none().clamped_between(5.0, 5.0), 0.0);
    }

    #[test]
    fn test_safe_rect_pixels() {
        let margins = SafeTextMargins {
            top: 0.1,
            bottom: 0.2,
            left: 0.05,
            right: 0.05,
        };
        let rect = margins.safe_rect(FrameSize::VERTICAL_HD);
        assert!((rect.x - 54.0).abs() < 1e-9);
        assert!((rect.y - 192.0).abs() < 1e-9);
        assert!((rect.right() - 1026.0).abs() < 1e-9);
        assert!((rect.bottom() - 1536.0).abs() < 1e-9);
    }

    #[test]
    fn test_load_resolves_relative_paths() {
        let dir = tempfile::tempdir().unwrap();
        let job = dir.path().join("job.json");
        sample().save(&job).unwrap();

        let loaded = PostProductionConfig::load(&job).unwrap();
        assert_eq!(loaded.segments[0], dir.path().join("a.mp4"));
        assert_eq!(loaded.output_path, dir.path().join("out/final.mp4"));
        assert_eq!(loaded.audio.voice_path, dir.path().join("voice.wav"));
    }
}
