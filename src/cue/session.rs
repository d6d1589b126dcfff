//! Cue timing state machine
//!
//! A session waits for the first tone of a cue, schedules when the response
//! tone should land, then measures how far off the heard response was.
//! Cycles alternate between event mode and item mode; the error measured in
//! event mode shifts the item-mode target so a late event does not doom the
//! item.

use super::{
    event_timing_seconds, format_timing_error, select_fingerprint, CueMode, CueState,
    TimingOption,
};
use serde::{Deserialize, Serialize};

/// What to do with the mode when a response never arrives
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeoutPolicy {
    /// Move on to the other mode, as a completed cycle would
    #[default]
    AlternateMode,

    /// Stay on the same cue so the player can retry it
    KeepMode,
}

/// Timing constants for a session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Tempo of the in-game music
    pub bpm: f64,

    /// A tone cannot be heard "again" until this long after it started
    pub tone_duration: f64,

    /// Give up on a response this long after it was due
    pub response_timeout: f64,

    /// Hold the measured result this long after the target before resetting
    pub settle_time: f64,

    /// Duration of one rendered frame
    pub frame_time: f64,

    pub timeout_policy: TimeoutPolicy,
}

impl SessionConfig {
    pub fn beat_time(&self) -> f64 {
        60.0 / self.bpm
    }

    pub fn measure_time(&self) -> f64 {
        self.beat_time() * 4.0
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            bpm: 138.0,
            tone_duration: 0.35,
            response_timeout: 1.0,
            settle_time: 1.0,
            frame_time: 1.0 / 60.0,
            timeout_policy: TimeoutPolicy::AlternateMode,
        }
    }
}

/// Observable outcome of a transition
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CueEvent {
    FirstToneHeard {
        mode: CueMode,
        pending_at: f64,
        duration: f64,
    },
    SecondToneHeard {
        mode: CueMode,
        difference: f64,
        display: String,
    },
    TimedOut {
        mode: CueMode,
    },
    CueComplete {
        mode: CueMode,
    },
    ModeChanged {
        mode: CueMode,
    },
    Reset,
    LeadUpBeat {
        beats_remaining: u8,
    },
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct CueTiming {
    start_at: f64,
    pending_at: f64,
    duration: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Phase {
    AwaitingFirstTone,
    CueingSecondTone(CueTiming),
    HeardSecondTone { timing: CueTiming, difference: f64 },
}

/// State of one detection/response loop
#[derive(Debug, Clone)]
pub struct CueSession {
    config: SessionConfig,
    option: TimingOption,
    mode: CueMode,
    phase: Phase,
    carried_delta: f64,
    last_reset_at: Option<f64>,
}

impl CueSession {
    pub fn new(config: SessionConfig, option: TimingOption) -> Self {
        Self {
            config,
            option,
            mode: CueMode::Event,
            phase: Phase::AwaitingFirstTone,
            carried_delta: 0.0,
            last_reset_at: None,
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn option(&self) -> &TimingOption {
        &self.option
    }

    /// Switch manips; an in-flight cycle keeps the target it was scheduled with
    pub fn select_option(&mut self, option: TimingOption) {
        log::info!("Selected timing '{}'", option.name);
        self.option = option;
    }

    pub fn mode(&self) -> CueMode {
        self.mode
    }

    pub fn state(&self) -> CueState {
        match self.phase {
            Phase::AwaitingFirstTone => CueState::AwaitingFirstTone,
            Phase::CueingSecondTone(_) => CueState::CueingSecondTone,
            Phase::HeardSecondTone { .. } => CueState::HeardSecondTone,
        }
    }

    pub fn carried_delta(&self) -> f64 {
        self.carried_delta
    }

    pub fn timing_start_at(&self) -> Option<f64> {
        self.timing().map(|t| t.start_at)
    }

    pub fn pending_at(&self) -> Option<f64> {
        self.timing().map(|t| t.pending_at)
    }

    /// Signed error of the last heard response, while it is on display
    pub fn difference(&self) -> Option<f64> {
        match self.phase {
            Phase::HeardSecondTone { difference, .. } => Some(difference),
            _ => None,
        }
    }

    fn timing(&self) -> Option<CueTiming> {
        match self.phase {
            Phase::AwaitingFirstTone => None,
            Phase::CueingSecondTone(timing) | Phase::HeardSecondTone { timing, .. } => Some(timing),
        }
    }

    /// Target duration for the current mode and option
    pub fn current_duration(&self) -> f64 {
        match self.mode {
            CueMode::Event => event_timing_seconds(self.option.event),
            CueMode::Item => self.option.timing_seconds,
        }
    }

    /// Fingerprint that should be listened for right now
    pub fn relevant_fingerprint(&self) -> &'static str {
        select_fingerprint(self.state(), self.mode, self.option.event)
    }

    /// Fraction of the scheduled duration elapsed, while waiting for the response
    pub fn progress(&self, now: f64) -> Option<f64> {
        match self.phase {
            Phase::CueingSecondTone(timing) => Some((now - timing.start_at) / timing.duration),
            _ => None,
        }
    }

    /// Beats left before the target when `now` lands on a lead-up beat
    pub fn lead_up_beat(&self, now: f64) -> Option<u8> {
        let timing = self.timing()?;
        let beat = self.config.beat_time();
        let position = (timing.pending_at - now) % self.config.measure_time();

        (0..=3u8)
            .rev()
            .find(|&k| (position - k as f64 * beat).abs() <= self.config.frame_time)
    }

    /// Advance one frame. `heard` is whether the relevant fingerprint matched.
    pub fn tick(&mut self, now: f64, heard: bool) -> Vec<CueEvent> {
        if heard {
            let events = self.tone_heard(now);
            if !events.is_empty() {
                return events;
            }
        }
        self.expire(now)
    }

    /// React to the relevant tone at `now`
    pub fn tone_heard(&mut self, now: f64) -> Vec<CueEvent> {
        match self.phase {
            Phase::AwaitingFirstTone => {
                let duration = self.current_duration();
                let timing = CueTiming {
                    start_at: now,
                    pending_at: now + duration - self.carried_delta,
                    duration,
                };
                self.phase = Phase::CueingSecondTone(timing);
                log::info!("Heard first tone. Scheduling cue sound for {}s", duration);
                vec![CueEvent::FirstToneHeard {
                    mode: self.mode,
                    pending_at: timing.pending_at,
                    duration,
                }]
            }
            Phase::CueingSecondTone(timing) if now > timing.start_at + self.config.tone_duration => {
                let difference = now - timing.pending_at;
                self.carried_delta = match self.mode {
                    CueMode::Event => difference,
                    CueMode::Item => 0.0,
                };
                self.phase = Phase::HeardSecondTone { timing, difference };

                let display = format_timing_error(difference);
                log::info!("Heard second tone ({:?}): {}", self.mode, display);
                vec![CueEvent::SecondToneHeard {
                    mode: self.mode,
                    difference,
                    display,
                }]
            }
            _ => Vec::new(),
        }
    }

    fn expire(&mut self, now: f64) -> Vec<CueEvent> {
        let mut events = Vec::new();
        match self.phase {
            Phase::CueingSecondTone(timing) if now > timing.pending_at + self.config.response_timeout => {
                log::info!("Did not hear response in time. Resetting to pending state.");
                events.push(CueEvent::TimedOut { mode: self.mode });
                self.carried_delta = 0.0;
                let alternate = self.config.timeout_policy == TimeoutPolicy::AlternateMode;
                self.finish_cycle(alternate, &mut events);
            }
            Phase::HeardSecondTone { timing, .. } if now > timing.pending_at + self.config.settle_time => {
                log::info!("Cue complete. Ready to hear new tone.");
                events.push(CueEvent::CueComplete { mode: self.mode });
                self.finish_cycle(true, &mut events);
            }
            _ => {}
        }
        events
    }

    fn finish_cycle(&mut self, alternate: bool, events: &mut Vec<CueEvent>) {
        self.phase = Phase::AwaitingFirstTone;
        if alternate {
            self.mode = self.mode.alternate();
            events.push(CueEvent::ModeChanged { mode: self.mode });
        }
    }

    /// Force the session back to awaiting an event cue.
    ///
    /// Repeats within one measure of the last accepted reset are ignored so a
    /// jingle spanning many frames only resets once.
    pub fn reset_cue(&mut self, now: f64) -> Vec<CueEvent> {
        let measure = self.config.measure_time();
        if self.last_reset_at.is_some_and(|last| now - last < measure) {
            return Vec::new();
        }

        log::info!("Heard reset cue. Returning to event timing.");
        self.last_reset_at = Some(now);
        self.phase = Phase::AwaitingFirstTone;
        self.mode = CueMode::Event;
        self.carried_delta = 0.0;
        vec![CueEvent::Reset]
    }

    /// Drop all progress, as when detection stops
    pub fn reset(&mut self) {
        self.phase = Phase::AwaitingFirstTone;
        self.mode = CueMode::Event;
        self.carried_delta = 0.0;
        self.last_reset_at = None;
    }
}
