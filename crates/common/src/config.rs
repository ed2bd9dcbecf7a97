//! Engine configuration.
//!
//! Everything here is policy the engine applies to every job: where the
//! media tools live, how long a stage may run, encoder quality knobs,
//! subtitle styling, and the ducking curve. Per-job inputs live in
//! `PostProductionConfig` in the project model.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{ReelcutError, ReelcutResult};

/// Global engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// External media tool locations.
    pub tools: ToolPaths,

    /// Parent directory for job workspaces (system temp dir when unset).
    pub workspace_root: Option<PathBuf>,

    /// Timeout applied independently to every stage.
    pub stage_timeout_secs: u64,

    /// Encoder settings.
    pub encoding: EncodingDefaults,

    /// Burned-in subtitle styling.
    pub subtitles: SubtitleStyle,

    /// Music ducking curve.
    pub ducking: DuckingConfig,

    /// Logging configuration.
    pub logging: LoggingConfig,
}

/// Paths (or bare names resolved through `PATH`) of the media tools.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolPaths {
    pub ffmpeg: PathBuf,
    pub ffprobe: PathBuf,
}

/// Encoder parameters shared by intermediate and final encodes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EncodingDefaults {
    /// x264 preset for the final encode.
    pub preset: String,

    /// Quality target for the final encode; the bitrate acts as a ceiling on top.
    pub crf: u8,

    /// Quality for intermediate clips (near-lossless).
    pub intermediate_crf: u8,

    /// AAC bitrate in kbps.
    pub audio_bitrate_kbps: u32,

    /// Sample rate of the mixed audio track.
    pub audio_sample_rate: u32,
}

/// Styling for burned-in subtitles.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SubtitleStyle {
    /// Font file handed to `drawtext`; fontconfig default when unset.
    pub font_file: Option<PathBuf>,

    /// Font size as a fraction of the frame height.
    pub font_size_ratio: f64,

    /// Text colour (ffmpeg colour syntax).
    pub font_color: String,

    /// Outline colour.
    pub border_color: String,

    /// Outline width in pixels.
    pub border_width: u32,
}

/// Parameters of the voice-activity detector and ducking envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DuckingConfig {
    /// Extra gain applied to the music while the voice is active.
    pub duck_factor: f64,

    /// Length of the attack/release ramps.
    pub taper_secs: f64,

    /// RMS level (dBFS) below which the voice counts as silent.
    pub silence_threshold_db: f64,

    /// Silences shorter than this do not split a voice window.
    pub min_silence_secs: f64,

    /// Voice bursts shorter than this are ignored.
    pub min_speech_secs: f64,

    /// Sample rate the voice is decoded at for analysis.
    pub analysis_sample_rate: u32,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "debug", "reelcut=debug,warn").
    pub level: String,

    /// Whether to output structured JSON logs.
    pub json: bool,

    /// Optional log file path.
    pub file: Option<PathBuf>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            tools: ToolPaths::default(),
            workspace_root: None,
            stage_timeout_secs: 900,
            encoding: EncodingDefaults::default(),
            subtitles: SubtitleStyle::default(),
            ducking: DuckingConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for ToolPaths {
    fn default() -> Self {
        Self {
            ffmpeg: PathBuf::from("ffmpeg"),
            ffprobe: PathBuf::from("ffprobe"),
        }
    }
}

impl Default for EncodingDefaults {
    fn default() -> Self {
        Self {
            preset: "medium".to_string(),
            crf: 20,
            intermediate_crf: 16,
            audio_bitrate_kbps: 192,
            audio_sample_rate: 48_000,
        }
    }
}

impl Default for SubtitleStyle {
    fn default() -> Self {
        Self {
            font_file: None,
            font_size_ratio: 0.032,
            font_color: "white".to_string(),
            border_color: "black".to_string(),
            border_width: 4,
        }
    }
}

impl Default for DuckingConfig {
    fn default() -> Self {
        Self {
            duck_factor: 0.3,
            taper_secs: 0.3,
            silence_threshold_db: -40.0,
            min_silence_secs: 0.25,
            min_speech_secs: 0.1,
            analysis_sample_rate: 16_000,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
            file: None,
        }
    }
}

impl EngineConfig {
    /// Load config from the standard location, falling back to defaults.
    pub fn load() -> Self {
        let config_path = config_file_path();
        if config_path.exists() {
            match Self::load_from(&config_path) {
                Ok(config) => return config,
                Err(e) => {
                    tracing::warn!("Failed to load config at {:?}: {}", config_path, e);
                }
            }
        }
        Self::default()
    }

    /// Load and validate config from an explicit path.
    pub fn load_from(path: &Path) -> ReelcutResult<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Save config to the standard location.
    pub fn save(&self) -> Result<(), std::io::Error> {
        let config_path = config_file_path();
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self).map_err(std::io::Error::other)?;
        std::fs::write(config_path, json)
    }

    /// Reject values the engine cannot work with.
    pub fn validate(&self) -> ReelcutResult<()> {
        if self.stage_timeout_secs == 0 {
            return Err(ReelcutError::invalid_config(
                "stage_timeout_secs must be positive",
            ));
        }
        if !(0.0..=1.0).contains(&self.ducking.duck_factor) {
            return Err(ReelcutError::invalid_config(format!(
                "ducking.duck_factor must be within [0, 1], got {}",
                self.ducking.duck_factor
            )));
        }
        if self.ducking.taper_secs < 0.0 {
            return Err(ReelcutError::invalid_config(
                "ducking.taper_secs must not be negative",
            ));
        }
        if self.ducking.analysis_sample_rate == 0 || self.encoding.audio_sample_rate == 0 {
            return Err(ReelcutError::invalid_config("sample rates must be positive"));
        }
        if self.subtitles.font_size_ratio <= 0.0 || self.subtitles.font_size_ratio >= 0.5 {
            return Err(ReelcutError::invalid_config(
                "subtitles.font_size_ratio must be within (0, 0.5)",
            ));
        }
        Ok(())
    }

    /// Directory new job workspaces are created in.
    pub fn workspace_root(&self) -> PathBuf {
        self.workspace_root
            .clone()
            .unwrap_or_else(std::env::temp_dir)
    }
}

/// Standard config file location.
fn config_file_path() -> PathBuf {
    let base = std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
            PathBuf::from(home).join(".config")
        });
    base.join("reelcut").join("config.json")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = EngineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.stage_timeout_secs, 900);
        assert!((config.ducking.duck_factor - 0.3).abs() < 1e-9);
        assert!((config.ducking.taper_secs - 0.3).abs() < 1e-9);
    }

    #[test]
    fn test_partial_json_fills_defaults() {
        let config: EngineConfig =
            serde_json::from_str(r#"{ "stage_timeout_secs": 60, "ducking": { "duck_factor": 0.5 } }"#)
                .unwrap();
        assert_eq!(config.stage_timeout_secs, 60);
        assert!((config.ducking.duck_factor - 0.5).abs() < 1e-9);
        assert!((config.ducking.taper_secs - 0.3).abs() < 1e-9);
        assert_eq!(config.tools.ffmpeg, PathBuf::from("ffmpeg"));
    }

    #[test]
    fn test_load_from_rejects_invalid_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{ "ducking": { "duck_factor": 1.5 } }"#).unwrap();
        let err = EngineConfig::load_from(&path).unwrap_err();
        assert!(matches!(err, ReelcutError::InvalidConfig { .. }));
    }
}
