//! Crate-level error types

use crate::audio::{CaptureError, SourceError};
use thiserror::Error;

/// Errors raised while configuring or starting the detector
#[derive(Error, Debug)]
pub enum DetectorError {
    #[error("Unknown fingerprint: {0}")]
    UnknownFingerprint(String),

    #[error("Unknown timing option: {0}")]
    UnknownTimingOption(String),

    #[error("Invalid fingerprint '{name}': {reason}")]
    InvalidFingerprint { name: String, reason: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    ConfigParse(#[from] serde_json::Error),

    #[error("Audio capture failed: {0}")]
    Capture(#[from] CaptureError),

    #[error("Audio sources unavailable: {0}")]
    Sources(#[from] SourceError),
}
