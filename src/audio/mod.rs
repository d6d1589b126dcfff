//! Audio capture, spectrum analysis and beep playback

mod analyser;
mod beep;
mod capture;
mod sources;

pub use analyser::SpectrumAnalyser;
pub use beep::{BeepError, BeepPlayer, SquareBeep};
pub use capture::{AudioBuffer, AudioCaptureHandle, CaptureError, SpectrumFrame};
pub use sources::{list_sources, AudioSource, SourceError};

use serde::{Deserialize, Serialize};

/// Spectrum analyser configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    /// Sample rate in Hz
    pub sample_rate: u32,

    /// FFT window size; snapshots carry half as many bins
    pub fft_size: usize,

    /// Weight of the previous frame when smoothing magnitudes (0-1)
    pub smoothing: f32,

    /// Level mapped to byte 0
    pub min_decibels: f32,

    /// Level mapped to byte 255
    pub max_decibels: f32,
}

impl AudioConfig {
    pub fn bin_count(&self) -> usize {
        self.fft_size / 2
    }
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            sample_rate: 48000,
            fft_size: 2048,
            smoothing: 0.8,
            min_decibels: -100.0,
            max_decibels: -30.0,
        }
    }
}
