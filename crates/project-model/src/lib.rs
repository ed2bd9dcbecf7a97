//! Reelcut Project Model
//!
//! Defines the data contracts of a post-production job:
//! - **Media:** Frame sizes and probed input segments
//! - **Subtitles:** Timed cues with SRT/WebVTT reading and SRT writing
//! - **Request:** The immutable `PostProductionConfig` describing one job
//! - **Output:** The `FinalVideo` produced on success
//!
//! All times are in seconds (`f64`) on the final output timeline unless a
//! type says otherwise.

pub mod media;
pub mod output;
pub mod request;
pub mod subtitle;

pub use media::*;
pub use output::*;
pub use request::*;
pub use subtitle::*;

/// Errors that can occur when loading or validating job data.
#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    #[error("I/O error at {path}: {source}")]
    IoError {
        path: std::path::PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse {path}: {source}")]
    ParseError {
        path: std::path::PathBuf,
        source: serde_json::Error,
    },

    #[error("Validation error: {message}")]
    ValidationError { message: String },
}

impl ModelError {
    pub(crate) fn validation(msg: impl Into<String>) -> Self {
        Self::ValidationError {
            message: msg.into(),
        }
    }
}
