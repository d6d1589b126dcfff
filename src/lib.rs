//! Cue Timer Library
//!
//! Listens to a microphone held near a handheld console, recognises the
//! square-wave beeps the game plays by their harmonic peaks, and times the
//! player's response against a scheduled target.
//!
//! The per-frame pipeline lives in [`detector::Detector`]; it takes one byte
//! spectrum and the audio clock and returns a [`detector::FrameReport`].

pub mod audio;
pub mod config;
pub mod cue;
pub mod detect;
pub mod detector;
pub mod error;
pub mod state;

pub use config::DetectorConfig;
pub use detector::{CaptureLog, Detector, FrameReport, FrameSink};
pub use error::DetectorError;
pub use state::AppState;
