//! Per-frame detection pipeline
//!
//! Each frame: spectrum snapshot -> peaks -> reset check -> relevant
//! fingerprint match -> session transition -> report.

use crate::config::DetectorConfig;
use crate::cue::{CueEvent, CueMode, CueSession, CueState, TimingOption};
use crate::detect::{
    builtin_fingerprints, find_peaks, Fingerprint, MatchTolerance, Peak, SpectrumGeometry,
};
use crate::error::DetectorError;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

/// Receives every processed snapshot, for offline calibration
pub trait FrameSink: Send {
    fn on_frame(&mut self, spectrum: &[u8], peaks: &[Peak], time: f64);
}

impl<T: FrameSink> FrameSink for Arc<Mutex<T>> {
    fn on_frame(&mut self, spectrum: &[u8], peaks: &[Peak], time: f64) {
        self.lock().on_frame(spectrum, peaks, time);
    }
}

/// One snapshot as seen by the detector
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CapturedFrame {
    pub time: f64,
    pub spectrum: Vec<u8>,
    pub peaks: Vec<Peak>,
}

/// Frame sink that keeps everything in memory
#[derive(Debug, Default)]
pub struct CaptureLog {
    frames: Vec<CapturedFrame>,
}

impl CaptureLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn frames(&self) -> &[CapturedFrame] {
        &self.frames
    }

    pub fn clear(&mut self) {
        self.frames.clear();
    }

    pub fn to_json(&self) -> Result<String, DetectorError> {
        Ok(serde_json::to_string(&self.frames)?)
    }
}

impl FrameSink for CaptureLog {
    fn on_frame(&mut self, spectrum: &[u8], peaks: &[Peak], time: f64) {
        self.frames.push(CapturedFrame {
            time,
            spectrum: spectrum.to_vec(),
            peaks: peaks.to_vec(),
        });
    }
}

/// Observable outcome of one frame
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FrameReport {
    pub time: f64,
    pub state: CueState,
    pub mode: CueMode,

    /// Elapsed fraction of the scheduled duration, while a response is due
    pub progress: Option<f64>,

    pub events: Vec<CueEvent>,
}

/// Fingerprint detector driving a cue session
pub struct Detector {
    geometry: SpectrumGeometry,
    fingerprints: HashMap<String, Fingerprint>,
    tolerance: MatchTolerance,
    threshold: Option<u8>,
    reset_fingerprint: Option<String>,
    session: CueSession,
    sink: Option<Box<dyn FrameSink>>,
    last_lead_up: Option<u8>,
    running: bool,
}

impl Detector {
    /// Build a detector, failing on unknown fingerprint or timing names
    pub fn new(config: &DetectorConfig) -> Result<Self, DetectorError> {
        let mut fingerprints: HashMap<String, Fingerprint> = builtin_fingerprints()
            .into_iter()
            .map(|f| (f.name().to_lowercase(), f))
            .collect();
        for custom in &config.fingerprints {
            log::debug!("Using custom fingerprint '{}'", custom.name());
            fingerprints.insert(custom.name().to_lowercase(), custom.clone());
        }

        let reset_fingerprint = match &config.reset_fingerprint {
            Some(name) => {
                let key = name.to_lowercase();
                if !fingerprints.contains_key(&key) {
                    return Err(DetectorError::UnknownFingerprint(name.clone()));
                }
                Some(key)
            }
            None => None,
        };

        let session = CueSession::new(config.session(), config.timing_option()?);

        log::info!(
            "Detector ready: {} fingerprints, timing '{}'",
            fingerprints.len(),
            session.option().name
        );

        Ok(Self {
            geometry: config.geometry(),
            fingerprints,
            tolerance: config.tolerance(),
            threshold: config.peak_threshold,
            reset_fingerprint,
            session,
            sink: None,
            last_lead_up: None,
            running: true,
        })
    }

    /// Attach a sink that sees every processed snapshot
    pub fn with_sink(mut self, sink: impl FrameSink + 'static) -> Self {
        self.set_sink(sink);
        self
    }

    pub fn set_sink(&mut self, sink: impl FrameSink + 'static) {
        self.sink = Some(Box::new(sink));
    }

    pub fn session(&self) -> &CueSession {
        &self.session
    }

    pub fn geometry(&self) -> &SpectrumGeometry {
        &self.geometry
    }

    /// Follow the analyser when the device runs at a different rate than configured
    pub fn set_geometry(&mut self, geometry: SpectrumGeometry) {
        if geometry != self.geometry {
            log::info!(
                "Spectrum geometry now {} Hz / {} bins",
                geometry.sample_rate,
                geometry.bin_count
            );
            self.geometry = geometry;
        }
    }

    pub fn fingerprint(&self, name: &str) -> Option<&Fingerprint> {
        self.fingerprints.get(&name.to_lowercase())
    }

    pub fn select_option(&mut self, option: TimingOption) {
        self.session.select_option(option);
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Resume processing after `stop`
    pub fn start(&mut self) {
        self.running = true;
    }

    /// Stop processing frames and drop all session progress
    pub fn stop(&mut self) {
        log::info!("Detector stopped");
        self.running = false;
        self.session.reset();
        self.last_lead_up = None;
    }

    /// Treat `now` as if the relevant tone had been heard
    pub fn manual_cue(&mut self, now: f64) -> Vec<CueEvent> {
        if !self.running {
            return Vec::new();
        }
        self.session.tone_heard(now)
    }

    /// Run the pipeline on one snapshot taken at `now`.
    ///
    /// Returns `None` while stopped.
    pub fn process_frame(&mut self, spectrum: &[u8], now: f64) -> Option<FrameReport> {
        if !self.running {
            return None;
        }

        let peaks = find_peaks(spectrum, &self.geometry, self.threshold);
        if let Some(sink) = self.sink.as_mut() {
            sink.on_frame(spectrum, &peaks, now);
        }

        let reset_heard = self
            .reset_fingerprint
            .as_ref()
            .and_then(|name| self.fingerprints.get(name))
            .is_some_and(|f| f.matches(&peaks, &self.geometry, &self.tolerance));

        let mut events = Vec::new();
        if reset_heard {
            events.extend(self.session.reset_cue(now));
        }

        // A frame that just reset the session is not also a cue
        let heard = events.is_empty()
            && self
                .fingerprints
                .get(self.session.relevant_fingerprint())
                .is_some_and(|f| f.matches(&peaks, &self.geometry, &self.tolerance));
        events.extend(self.session.tick(now, heard));

        let lead_up = self.session.lead_up_beat(now);
        if let Some(beats_remaining) = lead_up {
            if self.last_lead_up != lead_up {
                events.push(CueEvent::LeadUpBeat { beats_remaining });
            }
        }
        self.last_lead_up = lead_up;

        Some(FrameReport {
            time: now,
            state: self.session.state(),
            mode: self.session.mode(),
            progress: self.session.progress(now),
            events,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cue::get_timing_option;
    use crate::detect::{FingerprintPeak, FOUND_ITEM, GAME_START};

    const BIN_COUNT: usize = 1024;

    fn spectrum(peaks: &[(usize, u8)]) -> Vec<u8> {
        let mut bins = vec![0u8; BIN_COUNT];
        for &(index, amplitude) in peaks {
            bins[index] = amplitude;
        }
        bins
    }

    fn found_item() -> Vec<u8> {
        spectrum(&[(210, 161), (256, 128), (303, 88)])
    }

    fn close_menu() -> Vec<u8> {
        spectrum(&[(226, 156), (241, 150), (256, 135)])
    }

    fn game_start() -> Vec<u8> {
        spectrum(&[(150, 150), (300, 104)])
    }

    fn silence() -> Vec<u8> {
        vec![0u8; BIN_COUNT]
    }

    fn detector() -> Detector {
        Detector::new(&DetectorConfig::default()).unwrap()
    }

    fn assert_approx(actual: f64, expected: f64, tolerance: f64) {
        assert!(
            (actual - expected).abs() <= tolerance,
            "expected {expected} +/- {tolerance}, got {actual}"
        );
    }

    #[test]
    fn unknown_reset_fingerprint_fails() {
        let config = DetectorConfig {
            reset_fingerprint: Some("power_off".to_string()),
            ..Default::default()
        };

        assert!(matches!(
            Detector::new(&config),
            Err(DetectorError::UnknownFingerprint(name)) if name == "power_off"
        ));
    }

    #[test]
    fn unknown_timing_option_fails() {
        let config = DetectorConfig {
            selected_timing: Some("Nope".to_string()),
            ..Default::default()
        };

        assert!(matches!(
            Detector::new(&config),
            Err(DetectorError::UnknownTimingOption(_))
        ));
    }

    #[test]
    fn custom_fingerprint_replaces_builtin() {
        let custom = Fingerprint::new(
            FOUND_ITEM,
            vec![FingerprintPeak { frequency: 1500.0, amplitude: 200 }],
        )
        .unwrap();
        let config = DetectorConfig {
            fingerprints: vec![custom.clone()],
            ..Default::default()
        };

        let detector = Detector::new(&config).unwrap();

        assert_eq!(detector.fingerprint("FOUND_ITEM"), Some(&custom));
        assert!(detector.fingerprint(GAME_START).is_some());
    }

    #[test]
    fn silence_keeps_waiting() {
        let mut detector = detector();

        let report = detector.process_frame(&silence(), 1.0).unwrap();

        assert_eq!(report.state, CueState::AwaitingFirstTone);
        assert_eq!(report.mode, CueMode::Event);
        assert!(report.progress.is_none());
        assert!(report.events.is_empty());
    }

    #[test]
    fn full_event_then_item_cycle() {
        let mut detector = detector();

        // Found item jingle opens the event cycle
        let report = detector.process_frame(&found_item(), 1.0).unwrap();
        assert_eq!(report.state, CueState::CueingSecondTone);
        assert!(matches!(
            report.events[0],
            CueEvent::FirstToneHeard { mode: CueMode::Event, duration, .. } if duration == 1.3
        ));
        assert_approx(detector.session().pending_at().unwrap(), 2.3, 1e-12);

        let report = detector.process_frame(&silence(), 1.65).unwrap();
        assert_approx(report.progress.unwrap(), 0.5, 1e-12);

        // The same jingle again is not what closes the event
        let report = detector.process_frame(&found_item(), 2.0).unwrap();
        assert_eq!(report.state, CueState::CueingSecondTone);

        let report = detector.process_frame(&close_menu(), 2.35).unwrap();
        assert_eq!(report.state, CueState::HeardSecondTone);
        match &report.events[0] {
            CueEvent::SecondToneHeard { mode, difference, .. } => {
                assert_eq!(*mode, CueMode::Event);
                assert_approx(*difference, 0.05, 1e-9);
            }
            other => panic!("unexpected event {other:?}"),
        }

        let report = detector.process_frame(&silence(), 3.4).unwrap();
        assert_eq!(report.state, CueState::AwaitingFirstTone);
        assert_eq!(report.mode, CueMode::Item);
        assert!(report.events.contains(&CueEvent::ModeChanged { mode: CueMode::Item }));

        // Item cycle carries the event error
        detector.process_frame(&found_item(), 5.0).unwrap();
        assert_approx(detector.session().pending_at().unwrap(), 5.0 + 3.43 - 0.05, 1e-9);

        let report = detector.process_frame(&found_item(), 8.4).unwrap();
        assert_eq!(report.state, CueState::HeardSecondTone);
        assert_eq!(detector.session().carried_delta(), 0.0);
    }

    #[test]
    fn missed_response_times_out() {
        let mut detector = detector();
        detector.process_frame(&found_item(), 1.0);

        let report = detector.process_frame(&silence(), 3.31).unwrap();

        assert_eq!(report.state, CueState::AwaitingFirstTone);
        assert_eq!(report.events[0], CueEvent::TimedOut { mode: CueMode::Event });
    }

    #[test]
    fn game_start_resets_mid_cycle() {
        let mut detector = detector();
        detector.process_frame(&found_item(), 1.0);

        let report = detector.process_frame(&game_start(), 1.5).unwrap();

        assert_eq!(report.events, vec![CueEvent::Reset]);
        assert_eq!(report.state, CueState::AwaitingFirstTone);
        assert_eq!(report.mode, CueMode::Event);

        // Still sounding on the next frame: debounced
        let report = detector.process_frame(&game_start(), 1.52).unwrap();
        assert!(report.events.is_empty());
    }

    #[test]
    fn reset_can_be_disabled() {
        let config = DetectorConfig {
            reset_fingerprint: None,
            ..Default::default()
        };
        let mut detector = Detector::new(&config).unwrap();
        detector.process_frame(&found_item(), 1.0);

        let report = detector.process_frame(&game_start(), 1.5).unwrap();

        assert!(report.events.is_empty());
        assert_eq!(report.state, CueState::CueingSecondTone);
    }

    #[test]
    fn trade_ship_option_listens_for_trade_ship() {
        let config = DetectorConfig {
            selected_timing: Some("Trade 3B->1A".to_string()),
            ..Default::default()
        };
        let mut detector = Detector::new(&config).unwrap();

        let report = detector
            .process_frame(&spectrum(&[(208, 126), (259, 112)]), 1.0)
            .unwrap();

        assert_eq!(report.state, CueState::CueingSecondTone);
        assert_approx(detector.session().pending_at().unwrap(), 3.1, 1e-12);
    }

    #[test]
    fn lead_up_beat_fires_once_per_beat() {
        let mut detector = detector();
        detector.process_frame(&found_item(), 1.0);
        let pending = detector.session().pending_at().unwrap();
        let beat = detector.session().config().beat_time();

        let report = detector.process_frame(&silence(), pending - beat).unwrap();
        assert!(report.events.contains(&CueEvent::LeadUpBeat { beats_remaining: 1 }));

        let report = detector.process_frame(&silence(), pending - beat + 0.005).unwrap();
        assert!(report.events.is_empty());

        let report = detector.process_frame(&silence(), pending).unwrap();
        assert_eq!(report.events, vec![CueEvent::LeadUpBeat { beats_remaining: 0 }]);
    }

    #[test]
    fn manual_cue_stands_in_for_tones() {
        let mut detector = detector();

        assert!(matches!(
            detector.manual_cue(1.0).as_slice(),
            [CueEvent::FirstToneHeard { .. }]
        ));
        assert!(detector.manual_cue(1.1).is_empty());
        assert!(matches!(
            detector.manual_cue(2.3).as_slice(),
            [CueEvent::SecondToneHeard { .. }]
        ));
        assert_eq!(detector.session().state(), CueState::HeardSecondTone);
    }

    #[test]
    fn stop_resets_and_ignores_frames() {
        let mut detector = detector();
        detector.process_frame(&found_item(), 1.0);

        detector.stop();

        assert!(!detector.is_running());
        assert!(detector.process_frame(&found_item(), 1.1).is_none());
        assert!(detector.manual_cue(1.2).is_empty());
        assert_eq!(detector.session().state(), CueState::AwaitingFirstTone);

        detector.start();
        let report = detector.process_frame(&found_item(), 5.0).unwrap();
        assert_eq!(report.state, CueState::CueingSecondTone);
    }

    #[test]
    fn selecting_option_changes_next_target() {
        let mut detector = detector();
        detector.select_option(get_timing_option("Moonberry").unwrap());
        detector.process_frame(&found_item(), 1.0);
        detector.process_frame(&close_menu(), 2.3);
        detector.process_frame(&silence(), 3.4);

        detector.process_frame(&found_item(), 5.0);

        assert_approx(detector.session().pending_at().unwrap(), 9.47, 1e-9);
    }

    #[test]
    fn sink_sees_every_running_frame() {
        let log = Arc::new(Mutex::new(CaptureLog::new()));
        let mut detector = detector().with_sink(log.clone());

        detector.process_frame(&found_item(), 1.0);
        detector.process_frame(&silence(), 1.1);
        detector.stop();
        detector.process_frame(&silence(), 1.2);

        let log = log.lock();
        assert_eq!(log.frames().len(), 2);
        assert_eq!(log.frames()[0].time, 1.0);
        assert_eq!(log.frames()[0].peaks.len(), 3);
        assert!(log.frames()[1].peaks.is_empty());

        let json = log.to_json().unwrap();
        let parsed: Vec<CapturedFrame> = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, log.frames());
    }

    #[test]
    fn report_serializes_with_tagged_events() {
        let mut detector = detector();
        let report = detector.process_frame(&found_item(), 1.0).unwrap();

        let json = serde_json::to_value(&report).unwrap();

        assert_eq!(json["state"], "CueingSecondTone");
        assert_eq!(json["events"][0]["type"], "first_tone_heard");
    }
}
