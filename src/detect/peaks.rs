//! Local-maximum extraction from a byte spectrum

use super::SpectrumGeometry;
use serde::{Deserialize, Serialize};

/// Accepted peaks closer than this many bins are merged, keeping the louder one
pub const MIN_PEAK_SEPARATION: usize = 2;

/// One local maximum in a spectrum snapshot
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Peak {
    pub frequency: f64,
    pub index: usize,
    pub amplitude: u8,
}

/// Find local maxima in `spectrum`, ordered by bin index.
///
/// Bins `1..len-1` are candidates when strictly louder than both neighbours
/// and, if `threshold` is given, at least `threshold`. Candidates within
/// [`MIN_PEAK_SEPARATION`] bins of the previous accepted peak are merged by
/// keeping the larger amplitude (ties keep the later bin).
pub fn find_peaks(spectrum: &[u8], geometry: &SpectrumGeometry, threshold: Option<u8>) -> Vec<Peak> {
    let mut peaks: Vec<Peak> = Vec::new();
    if spectrum.len() < 3 {
        return peaks;
    }

    for (offset, window) in spectrum.windows(3).enumerate() {
        let index = offset + 1;
        let (previous, current, next) = (window[0], window[1], window[2]);

        if current <= previous || current <= next {
            continue;
        }
        if threshold.is_some_and(|t| current < t) {
            continue;
        }

        if let Some(last) = peaks.last() {
            if index - last.index < MIN_PEAK_SEPARATION {
                if last.amplitude > current {
                    continue;
                }
                peaks.pop();
            }
        }

        peaks.push(Peak {
            frequency: geometry.frequency(index),
            index,
            amplitude: current,
        });
    }

    peaks
}
