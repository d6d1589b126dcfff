//! Detector configuration
//!
//! Everything has a default; a JSON file only needs the fields it changes.

use crate::audio::AudioConfig;
use crate::cue::{default_timing_option, get_timing_option, SessionConfig, TimeoutPolicy, TimingOption};
use crate::detect::{Fingerprint, MatchTolerance, SpectrumGeometry, GAME_START};
use crate::error::DetectorError;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    /// Sample rate in Hz, used until capture reports the device's own
    pub sample_rate: u32,

    /// FFT window size; snapshots carry `fft_size / 2` bins
    pub fft_size: usize,

    /// Ignore spectrum peaks quieter than this
    pub peak_threshold: Option<u8>,

    pub bpm: f64,
    pub tone_duration: f64,
    pub response_timeout: f64,
    pub settle_time: f64,
    pub frame_time: f64,
    pub timeout_policy: TimeoutPolicy,

    pub ratio_tolerance: f64,
    pub interloper_slack: u8,

    /// Name of the selected timing option
    pub selected_timing: Option<String>,

    /// Fingerprint that forces a return to event timing; `None` disables it
    pub reset_fingerprint: Option<String>,

    /// Extra fingerprints, overriding built-ins of the same name
    pub fingerprints: Vec<Fingerprint>,

    pub smoothing: f32,
    pub min_decibels: f32,
    pub max_decibels: f32,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        let session = SessionConfig::default();
        let tolerance = MatchTolerance::default();
        let audio = AudioConfig::default();

        Self {
            sample_rate: audio.sample_rate,
            fft_size: audio.fft_size,
            peak_threshold: None,
            bpm: session.bpm,
            tone_duration: session.tone_duration,
            response_timeout: session.response_timeout,
            settle_time: session.settle_time,
            frame_time: session.frame_time,
            timeout_policy: session.timeout_policy,
            ratio_tolerance: tolerance.ratio,
            interloper_slack: tolerance.interloper_slack,
            selected_timing: None,
            reset_fingerprint: Some(GAME_START.to_string()),
            fingerprints: Vec::new(),
            smoothing: audio.smoothing,
            min_decibels: audio.min_decibels,
            max_decibels: audio.max_decibels,
        }
    }
}

impl DetectorConfig {
    /// Load from a JSON file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, DetectorError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&text)?;
        log::info!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Write as pretty JSON
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), DetectorError> {
        let text = serde_json::to_string_pretty(self)?;
        std::fs::write(path, text)?;
        Ok(())
    }

    pub fn session(&self) -> SessionConfig {
        SessionConfig {
            bpm: self.bpm,
            tone_duration: self.tone_duration,
            response_timeout: self.response_timeout,
            settle_time: self.settle_time,
            frame_time: self.frame_time,
            timeout_policy: self.timeout_policy,
        }
    }

    pub fn tolerance(&self) -> MatchTolerance {
        MatchTolerance {
            ratio: self.ratio_tolerance,
            interloper_slack: self.interloper_slack,
        }
    }

    pub fn audio(&self) -> AudioConfig {
        AudioConfig {
            sample_rate: self.sample_rate,
            fft_size: self.fft_size,
            smoothing: self.smoothing,
            min_decibels: self.min_decibels,
            max_decibels: self.max_decibels,
        }
    }

    pub fn geometry(&self) -> SpectrumGeometry {
        SpectrumGeometry::from_fft_size(self.sample_rate, self.fft_size)
    }

    /// Resolve the selected timing option, defaulting to the first one
    pub fn timing_option(&self) -> Result<TimingOption, DetectorError> {
        match &self.selected_timing {
            Some(name) => get_timing_option(name)
                .ok_or_else(|| DetectorError::UnknownTimingOption(name.clone())),
            None => Ok(default_timing_option()),
        }
    }
}
