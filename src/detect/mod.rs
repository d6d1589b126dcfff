//! Spectral peak extraction and fingerprint matching

mod fingerprint;
mod peaks;

pub use fingerprint::{
    builtin_fingerprints, get_fingerprint, Fingerprint, FingerprintPeak, MatchTolerance,
    CLOSE_MENU, FOUND_ITEM, GAME_START, TRADE_SHIP,
};
pub use peaks::{find_peaks, Peak, MIN_PEAK_SEPARATION};

/// Maps between spectrum bin indices and frequencies for one analyser setup
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpectrumGeometry {
    /// Sample rate in Hz
    pub sample_rate: f64,

    /// Number of bins in a snapshot (FFT size / 2)
    pub bin_count: usize,
}

impl SpectrumGeometry {
    pub fn new(sample_rate: f64, bin_count: usize) -> Self {
        Self {
            sample_rate,
            bin_count,
        }
    }

    /// Geometry for an FFT of `fft_size` samples
    pub fn from_fft_size(sample_rate: u32, fft_size: usize) -> Self {
        Self::new(sample_rate as f64, fft_size / 2)
    }

    /// Frequency at the centre of bin `index`
    pub fn frequency(&self, index: usize) -> f64 {
        index as f64 * (self.sample_rate / 2.0) / self.bin_count as f64
    }

    /// Fractional bin position of `frequency`
    pub fn index(&self, frequency: f64) -> f64 {
        frequency * self.bin_count as f64 * 2.0 / self.sample_rate
    }

    /// Nearest-peak search radius: two bins' worth of frequency resolution
    pub fn frequency_tolerance(&self) -> f64 {
        2.0 * self.sample_rate / self.bin_count as f64
    }

    pub fn nyquist(&self) -> f64 {
        self.sample_rate / 2.0
    }
}

impl Default for SpectrumGeometry {
    fn default() -> Self {
        Self::new(48000.0, 1024)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tolerance_is_two_bins_of_resolution() {
        let geometry = SpectrumGeometry::new(48000.0, 1024);
        assert_eq!(geometry.frequency_tolerance(), 93.75);
    }

    #[test]
    fn frequency_and_index_are_inverse() {
        let geometry = SpectrumGeometry::from_fft_size(48000, 2048);
        assert_eq!(geometry.bin_count, 1024);
        assert_eq!(geometry.frequency(210), 4921.875);
        assert_eq!(geometry.index(4921.875), 210.0);
        assert_eq!(geometry.nyquist(), 24000.0);
    }
}
