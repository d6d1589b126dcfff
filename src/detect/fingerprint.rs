//! Tone fingerprints and the peak-list matcher
//!
//! A fingerprint lists the harmonic peaks a known beep produces, ordered by
//! frequency. A live peak list matches when every known peak has a nearby
//! live peak, neighbouring known peaks keep roughly the same loudness ratio,
//! and nothing between (or beyond) them is louder than the quieter of the
//! pair that bounds it.

use super::{Peak, SpectrumGeometry};
use crate::error::DetectorError;
use serde::{Deserialize, Serialize};

pub const CLOSE_MENU: &str = "close_menu";
pub const FOUND_ITEM: &str = "found_item";
pub const TRADE_SHIP: &str = "trade_ship";
pub const GAME_START: &str = "game_start";

const CLOSE_MENU_PEAKS: [(f64, u8); 3] = [(5296.875, 156), (5648.4375, 150), (6000.0, 135)];
const FOUND_ITEM_PEAKS: [(f64, u8); 3] = [(4921.875, 161), (6000.0, 128), (7101.5625, 88)];
const TRADE_SHIP_PEAKS: [(f64, u8); 2] = [(4875.0, 126), (6070.3125, 112)];
// Placeholder until calibrated against a recorded power-on jingle.
const GAME_START_PEAKS: [(f64, u8); 2] = [(3515.625, 150), (7031.25, 104)];

/// Expected frequency and amplitude of one harmonic
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FingerprintPeak {
    pub frequency: f64,
    pub amplitude: u8,
}

/// Matcher thresholds
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MatchTolerance {
    /// Largest accepted `|expected_ratio - actual_ratio|` between neighbouring peaks
    pub ratio: f64,

    /// Amplitude a stray peak may exceed the ceiling by before rejecting
    pub interloper_slack: u8,
}

impl Default for MatchTolerance {
    fn default() -> Self {
        Self {
            ratio: 0.25,
            interloper_slack: 0,
        }
    }
}

/// A named harmonic signature, sorted ascending by frequency
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawFingerprint")]
pub struct Fingerprint {
    name: String,
    peaks: Vec<FingerprintPeak>,
}

#[derive(Deserialize)]
struct RawFingerprint {
    name: String,
    peaks: Vec<FingerprintPeak>,
}

impl TryFrom<RawFingerprint> for Fingerprint {
    type Error = DetectorError;

    fn try_from(raw: RawFingerprint) -> Result<Self, Self::Error> {
        Fingerprint::new(raw.name, raw.peaks)
    }
}

impl Fingerprint {
    /// Build a fingerprint, rejecting empty, unsorted or silent entries
    pub fn new(name: impl Into<String>, peaks: Vec<FingerprintPeak>) -> Result<Self, DetectorError> {
        let name = name.into();
        let invalid = |reason: &str| DetectorError::InvalidFingerprint {
            name: name.clone(),
            reason: reason.to_string(),
        };

        if peaks.is_empty() {
            return Err(invalid("no peaks"));
        }
        if peaks.iter().any(|p| p.amplitude == 0) {
            return Err(invalid("zero amplitude"));
        }
        if peaks.windows(2).any(|w| w[0].frequency >= w[1].frequency) {
            return Err(invalid("frequencies must be strictly increasing"));
        }

        Ok(Self { name, peaks })
    }

    fn from_table(name: &str, table: &[(f64, u8)]) -> Self {
        Self {
            name: name.to_string(),
            peaks: table
                .iter()
                .map(|&(frequency, amplitude)| FingerprintPeak {
                    frequency,
                    amplitude,
                })
                .collect(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn peaks(&self) -> &[FingerprintPeak] {
        &self.peaks
    }

    /// Decide whether `peaks` (one snapshot, ordered by bin) carries this tone.
    ///
    /// Windows run from "below the first known peak" to "above the last
    /// one". Each window is bounded by up to two matched live peaks; the
    /// quieter bound is the ceiling no other live peak inside may exceed.
    pub fn matches(
        &self,
        peaks: &[Peak],
        geometry: &SpectrumGeometry,
        tolerance: &MatchTolerance,
    ) -> bool {
        let search = geometry.frequency_tolerance();

        for i in 0..=self.peaks.len() {
            let previous_known = i.checked_sub(1).and_then(|p| self.peaks.get(p));
            let current_known = self.peaks.get(i);

            let mut bounds: [Option<Bound>; 2] = [None, None];
            for (slot, known) in bounds.iter_mut().zip([previous_known, current_known]) {
                if let Some(known) = known {
                    let Some(live) = find_closest(peaks, known.frequency, search) else {
                        return false;
                    };
                    *slot = Some(Bound { known, live });
                }
            }
            let [previous, current] = bounds;

            let ceiling = match (&previous, &current) {
                (Some(previous), Some(current)) => {
                    let expected =
                        previous.known.amplitude as f64 / current.known.amplitude as f64;
                    let actual = previous.live.amplitude as f64 / current.live.amplitude as f64;
                    if (expected - actual).abs() > tolerance.ratio {
                        return false;
                    }
                    previous.live.amplitude.min(current.live.amplitude)
                }
                (Some(only), None) | (None, Some(only)) => only.live.amplitude,
                (None, None) => unreachable!("fingerprint window without any known peak"),
            };

            let lower = previous.as_ref().map(|b| b.live.index);
            let upper = current.as_ref().map_or(geometry.bin_count, |b| b.live.index);
            let limit = ceiling as u16 + tolerance.interloper_slack as u16;

            let interloper = peaks
                .iter()
                .filter(|p| lower.map_or(true, |l| p.index > l) && p.index < upper)
                .any(|p| p.amplitude as u16 > limit);
            if interloper {
                return false;
            }
        }

        true
    }
}

/// A known fingerprint peak and the live peak standing in for it
struct Bound<'a> {
    known: &'a FingerprintPeak,
    live: &'a Peak,
}

/// Closest live peak to `frequency`, if strictly within `tolerance`
fn find_closest(peaks: &[Peak], frequency: f64, tolerance: f64) -> Option<&Peak> {
    peaks
        .iter()
        .min_by(|a, b| {
            (a.frequency - frequency)
                .abs()
                .total_cmp(&(b.frequency - frequency).abs())
        })
        .filter(|p| (p.frequency - frequency).abs() < tolerance)
}

/// Return all built-in fingerprints
pub fn builtin_fingerprints() -> Vec<Fingerprint> {
    vec![
        Fingerprint::from_table(CLOSE_MENU, &CLOSE_MENU_PEAKS),
        Fingerprint::from_table(FOUND_ITEM, &FOUND_ITEM_PEAKS),
        Fingerprint::from_table(TRADE_SHIP, &TRADE_SHIP_PEAKS),
        Fingerprint::from_table(GAME_START, &GAME_START_PEAKS),
    ]
}

/// Look up a built-in fingerprint by name (case-insensitive)
pub fn get_fingerprint(name: &str) -> Option<Fingerprint> {
    let lower = name.to_lowercase();
    builtin_fingerprints().into_iter().find(|f| f.name == lower)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn geometry() -> SpectrumGeometry {
        SpectrumGeometry::new(48000.0, 1024)
    }

    fn peak(frequency: f64, amplitude: u8) -> Peak {
        Peak {
            frequency,
            index: geometry().index(frequency).round() as usize,
            amplitude,
        }
    }

    fn two_tone() -> Fingerprint {
        Fingerprint::new(
            "two_tone",
            vec![
                FingerprintPeak { frequency: 3000.0, amplitude: 100 },
                FingerprintPeak { frequency: 4500.0, amplitude: 50 },
            ],
        )
        .unwrap()
    }

    fn matches(fingerprint: &Fingerprint, peaks: &[Peak]) -> bool {
        fingerprint.matches(peaks, &geometry(), &MatchTolerance::default())
    }

    #[test]
    fn builtins_pass_validation() {
        for fingerprint in builtin_fingerprints() {
            let rebuilt = Fingerprint::new(fingerprint.name(), fingerprint.peaks().to_vec());
            assert!(rebuilt.is_ok(), "{} failed validation", fingerprint.name());
        }
    }

    #[test]
    fn get_fingerprint_is_case_insensitive() {
        assert!(get_fingerprint("FOUND_ITEM").is_some());
        assert!(get_fingerprint("Close_Menu").is_some());
        assert!(get_fingerprint("nonexistent").is_none());
    }

    #[test]
    fn new_rejects_bad_tables() {
        assert!(Fingerprint::new("empty", vec![]).is_err());
        let unsorted = vec![
            FingerprintPeak { frequency: 5000.0, amplitude: 10 },
            FingerprintPeak { frequency: 4000.0, amplitude: 10 },
        ];
        assert!(Fingerprint::new("unsorted", unsorted).is_err());
        let silent = vec![FingerprintPeak { frequency: 5000.0, amplitude: 0 }];
        assert!(Fingerprint::new("silent", silent).is_err());
    }

    #[test]
    fn deserialize_validates() {
        let ok: Result<Fingerprint, _> = serde_json::from_str(
            r#"{"name":"chirp","peaks":[{"frequency":1000.0,"amplitude":90}]}"#,
        );
        assert!(ok.is_ok());

        let bad: Result<Fingerprint, _> =
            serde_json::from_str(r#"{"name":"chirp","peaks":[]}"#);
        assert!(bad.is_err());
    }

    #[test]
    fn empty_peak_list_never_matches() {
        for fingerprint in builtin_fingerprints() {
            assert!(!matches(&fingerprint, &[]));
        }
    }

    #[test]
    fn found_item_scenario_matches() {
        let fingerprint = get_fingerprint(FOUND_ITEM).unwrap();
        let peaks = [peak(4980.0, 150), peak(6050.0, 120), peak(7100.0, 82)];

        assert_eq!(geometry().frequency_tolerance(), 93.75);
        assert!(matches(&fingerprint, &peaks));
    }

    #[test]
    fn missing_harmonic_rejects() {
        let fingerprint = get_fingerprint(FOUND_ITEM).unwrap();
        let peaks = [peak(4980.0, 150), peak(6050.0, 120)];

        assert!(!matches(&fingerprint, &peaks));
    }

    #[test]
    fn frequency_outside_tolerance_rejects() {
        let fingerprint = two_tone();
        let peaks = [peak(3000.0, 100), peak(4600.0, 50)];

        assert!(!matches(&fingerprint, &peaks));
    }

    #[test]
    fn ratio_beyond_tolerance_rejects() {
        let peaks = [peak(3000.0, 100), peak(4500.0, 67)];
        assert!(!matches(&two_tone(), &peaks));
    }

    #[test]
    fn ratio_at_tolerance_boundary_matches() {
        let peaks = [peak(3000.0, 100), peak(4500.0, 57)];
        assert!(matches(&two_tone(), &peaks));
    }

    #[test]
    fn louder_peak_between_known_peaks_rejects() {
        let peaks = [peak(3000.0, 100), peak(3750.0, 60), peak(4500.0, 50)];
        assert!(!matches(&two_tone(), &peaks));
    }

    #[test]
    fn quieter_peak_between_known_peaks_is_allowed() {
        let peaks = [peak(3000.0, 100), peak(3750.0, 40), peak(4500.0, 50)];
        assert!(matches(&two_tone(), &peaks));
    }

    #[test]
    fn louder_peak_outside_the_comb_rejects() {
        let below = [peak(1000.0, 120), peak(3000.0, 100), peak(4500.0, 50)];
        assert!(!matches(&two_tone(), &below));

        let above = [peak(3000.0, 100), peak(4500.0, 50), peak(9000.0, 51)];
        assert!(!matches(&two_tone(), &above));
    }

    #[test]
    fn slack_lets_slightly_louder_strays_through() {
        let peaks = [peak(3000.0, 100), peak(3750.0, 58), peak(4500.0, 50)];
        let tolerance = MatchTolerance {
            interloper_slack: 10,
            ..Default::default()
        };

        assert!(two_tone().matches(&peaks, &geometry(), &tolerance));
    }

    #[test]
    fn closest_peak_wins_within_tolerance() {
        let peaks = [peak(2950.0, 20), peak(3010.0, 100), peak(4500.0, 50)];
        assert!(find_closest(&peaks, 3000.0, 93.75).is_some_and(|p| p.amplitude == 100));
        assert!(find_closest(&peaks, 8000.0, 93.75).is_none());
    }
}
