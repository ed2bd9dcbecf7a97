//! Error types shared across Reelcut crates.

use std::path::PathBuf;

/// Top-level error type for post-production operations.
#[derive(Debug, thiserror::Error)]
pub enum ReelcutError {
    #[error("Unsupported geometry: {message}")]
    UnsupportedGeometry { message: String },

    #[error("Subtitle source not found: {path}")]
    SubtitleSourceNotFound { path: PathBuf },

    #[error("Audio source not found: {path}")]
    AudioSourceNotFound { path: PathBuf },

    #[error("Segment not found: {path}")]
    SegmentNotFound { path: PathBuf },

    #[error(
        "Timeline drift: expected {expected_secs:.3}s, got {actual_secs:.3}s (tolerance {tolerance_secs:.4}s)"
    )]
    TimelineDrift {
        expected_secs: f64,
        actual_secs: f64,
        tolerance_secs: f64,
    },

    #[error("{tool} failed ({status}): {diagnostics}")]
    Encode {
        tool: String,
        status: String,
        diagnostics: String,
    },

    #[error("Probe error: {message}")]
    Probe { message: String },

    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },

    #[error("Job cancelled")]
    Cancelled,

    #[error("Timed out after {after_secs}s")]
    Timeout { after_secs: u64 },

    #[error("Illegal pipeline transition: {from} -> {to}")]
    IllegalTransition { from: String, to: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

/// Result type alias using ReelcutError.
pub type ReelcutResult<T> = Result<T, ReelcutError>;

impl ReelcutError {
    pub fn unsupported_geometry(msg: impl Into<String>) -> Self {
        Self::UnsupportedGeometry {
            message: msg.into(),
        }
    }

    pub fn probe(msg: impl Into<String>) -> Self {
        Self::Probe {
            message: msg.into(),
        }
    }

    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Self::InvalidConfig {
            message: msg.into(),
        }
    }

    /// Failure of an external tool. `diagnostics` is the tool's stderr.
    pub fn encode(
        tool: impl Into<String>,
        status: impl Into<String>,
        diagnostics: impl Into<String>,
    ) -> Self {
        Self::Encode {
            tool: tool.into(),
            status: status.into(),
            diagnostics: diagnostics.into(),
        }
    }

    /// Short machine-friendly name of the error kind.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::UnsupportedGeometry { .. } => "unsupported_geometry",
            Self::SubtitleSourceNotFound { .. } => "subtitle_source_not_found",
            Self::AudioSourceNotFound { .. } => "audio_source_not_found",
            Self::SegmentNotFound { .. } => "segment_not_found",
            Self::TimelineDrift { .. } => "timeline_drift",
            Self::Encode { .. } => "encode",
            Self::Probe { .. } => "probe",
            Self::InvalidConfig { .. } => "invalid_config",
            Self::Cancelled => "cancelled",
            Self::Timeout { .. } => "timeout",
            Self::IllegalTransition { .. } => "illegal_transition",
            Self::Io(_) => "io",
            Self::Json(_) => "json",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_error_carries_diagnostics() {
        let err = ReelcutError::encode("ffmpeg", "exit status: 1", "Unknown encoder 'libx264'");
        let msg = err.to_string();
        assert!(msg.contains("ffmpeg failed"));
        assert!(msg.contains("Unknown encoder"));
        assert_eq!(err.kind(), "encode");
    }

    #[test]
    fn test_drift_message_reports_values() {
        let err = ReelcutError::TimelineDrift {
            expected_secs: 9.0,
            actual_secs: 9.5,
            tolerance_secs: 1.0 / 30.0,
        };
        assert_eq!(
            err.to_string(),
            "Timeline drift: expected 9.000s, got 9.500s (tolerance 0.0333s)"
        );
    }
}
