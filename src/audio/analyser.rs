//! Byte-spectrum analysis of captured samples

use super::AudioConfig;
use rustfft::{num_complex::Complex, FftPlanner};

/// Turns time-domain samples into one byte per frequency bin.
///
/// Blackman-windowed FFT, magnitudes scaled by `1/N`, smoothed against the
/// previous frame, converted to decibels and mapped linearly from
/// `[min_decibels, max_decibels]` onto `0..=255`.
pub struct SpectrumAnalyser {
    config: AudioConfig,
    planner: FftPlanner<f32>,
    window: Vec<f32>,
    smoothed: Vec<f32>,
}

impl SpectrumAnalyser {
    pub fn new(config: AudioConfig) -> Self {
        let fft_size = config.fft_size;

        // Blackman window (alpha = 0.16)
        let window: Vec<f32> = (0..fft_size)
            .map(|i| {
                let x = 2.0 * std::f32::consts::PI * i as f32 / fft_size as f32;
                0.42 - 0.5 * x.cos() + 0.08 * (2.0 * x).cos()
            })
            .collect();

        Self {
            smoothed: vec![0.0; config.bin_count()],
            config,
            planner: FftPlanner::new(),
            window,
        }
    }

    pub fn config(&self) -> &AudioConfig {
        &self.config
    }

    pub fn fft_size(&self) -> usize {
        self.config.fft_size
    }

    pub fn bin_count(&self) -> usize {
        self.config.bin_count()
    }

    /// Analyse the most recent `fft_size` samples into `out` (one byte per bin).
    ///
    /// Returns `false` and leaves `out` untouched when fewer samples are given.
    pub fn byte_frequency_data(&mut self, samples: &[f32], out: &mut [u8]) -> bool {
        let fft_size = self.config.fft_size;
        if samples.len() < fft_size {
            return false;
        }

        let recent = &samples[samples.len() - fft_size..];
        let mut buffer: Vec<Complex<f32>> = recent
            .iter()
            .zip(self.window.iter())
            .map(|(&s, &w)| Complex::new(s * w, 0.0))
            .collect();

        let fft = self.planner.plan_fft_forward(fft_size);
        fft.process(&mut buffer);

        let smoothing = self.config.smoothing;
        let scale = 1.0 / fft_size as f32;
        for (smoothed, bin) in self.smoothed.iter_mut().zip(buffer.iter()) {
            let magnitude = bin.norm() * scale;
            *smoothed = smoothing * *smoothed + (1.0 - smoothing) * magnitude;
        }

        let range = self.config.max_decibels - self.config.min_decibels;
        for (byte, &magnitude) in out.iter_mut().zip(self.smoothed.iter()) {
            let db = 20.0 * magnitude.log10();
            let scaled = 255.0 / range * (db - self.config.min_decibels);
            *byte = if scaled.is_nan() {
                0
            } else {
                scaled.floor().clamp(0.0, 255.0) as u8
            };
        }

        true
    }

    /// Forget smoothing history
    pub fn reset(&mut self) {
        self.smoothed.iter_mut().for_each(|v| *v = 0.0);
    }
}
