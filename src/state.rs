//! Application state management

use crate::audio::{AudioCaptureHandle, AudioConfig, SpectrumFrame};
use crate::config::DetectorConfig;
use crate::cue::CueEvent;
use crate::detect::SpectrumGeometry;
use crate::detector::{Detector, FrameReport};
use crate::error::DetectorError;

/// Application state
pub struct AppState {
    /// Fingerprint detector and cue session
    pub detector: Detector,

    /// Audio capture handle, while listening
    pub audio_capture: Option<AudioCaptureHandle>,

    /// Selected audio source ID
    pub audio_source_id: Option<String>,

    /// Analyser settings handed to capture
    pub audio_config: AudioConfig,

    /// Audio clock of the last processed snapshot
    last_frame_time: Option<f64>,
}

impl AppState {
    pub fn new(config: &DetectorConfig) -> Result<Self, DetectorError> {
        Ok(Self {
            detector: Detector::new(config)?,
            audio_capture: None,
            audio_source_id: None,
            audio_config: config.audio(),
            last_frame_time: None,
        })
    }

    pub fn is_running(&self) -> bool {
        self.audio_capture.is_some() && self.detector.is_running()
    }

    /// Open the selected microphone and resume detection
    pub fn start(&mut self) -> Result<(), DetectorError> {
        if self.audio_capture.is_none() {
            let capture =
                AudioCaptureHandle::new(self.audio_source_id.clone(), self.audio_config.clone())?;
            self.audio_capture = Some(capture);
        }
        self.last_frame_time = None;
        self.detector.start();
        Ok(())
    }

    /// Stop capture and reset the session
    pub fn stop(&mut self) {
        if let Some(mut capture) = self.audio_capture.take() {
            capture.stop();
        }
        self.last_frame_time = None;
        self.detector.stop();
    }

    /// Process the newest snapshot from capture, if there is one
    pub fn tick(&mut self) -> Option<FrameReport> {
        let frame = self.audio_capture.as_ref()?.latest_frame();
        self.process(&frame)
    }

    /// Process `frame` unless it is empty or already seen
    pub fn process(&mut self, frame: &SpectrumFrame) -> Option<FrameReport> {
        if frame.bins.is_empty() || self.last_frame_time.is_some_and(|t| frame.time <= t) {
            return None;
        }
        self.last_frame_time = Some(frame.time);

        if frame.sample_rate > 0 {
            self.detector.set_geometry(SpectrumGeometry::new(
                frame.sample_rate as f64,
                frame.bins.len(),
            ));
        }
        self.detector.process_frame(&frame.bins, frame.time)
    }

    /// Mark the current audio time as a heard tone
    pub fn manual_cue(&mut self) -> Vec<CueEvent> {
        match self.last_frame_time {
            Some(now) => self.detector.manual_cue(now),
            None => Vec::new(),
        }
    }
}
