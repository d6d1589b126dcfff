//! Square-wave beeps, like the handheld's own

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, SampleFormat, StreamConfig};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BeepError {
    #[error("No output device found")]
    NoOutputDevice,

    #[error("Failed to get device config: {0}")]
    ConfigError(String),

    #[error("Failed to build audio stream: {0}")]
    StreamError(String),

    #[error("Failed to start stream: {0}")]
    PlayError(String),
}

/// A short square-wave tone
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SquareBeep {
    /// Tone frequency in Hz
    pub frequency: f32,

    /// Length in seconds
    pub duration: f32,

    /// Output level (0-1)
    pub gain: f32,
}

impl SquareBeep {
    pub fn new(frequency: f32) -> Self {
        Self {
            frequency,
            ..Default::default()
        }
    }

    /// Render the tone as mono samples at `sample_rate`
    pub fn render(&self, sample_rate: u32) -> Vec<f32> {
        let len = (self.duration * sample_rate as f32).round() as usize;
        (0..len)
            .map(|i| {
                let phase = (self.frequency * i as f32 / sample_rate as f32).fract();
                if phase < 0.5 {
                    self.gain
                } else {
                    -self.gain
                }
            })
            .collect()
    }
}

impl Default for SquareBeep {
    fn default() -> Self {
        Self {
            frequency: 210.0,
            duration: 0.01,
            gain: 0.5,
        }
    }
}

/// Plays beeps on the default output device.
///
/// The output stream runs for the player's lifetime, draining a queue of
/// pending samples and emitting silence when it is empty.
pub struct BeepPlayer {
    queue: Arc<Mutex<VecDeque<f32>>>,
    sample_rate: u32,
    _stream: cpal::Stream,
}

impl BeepPlayer {
    pub fn new() -> Result<Self, BeepError> {
        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or(BeepError::NoOutputDevice)?;
        let config = device
            .default_output_config()
            .map_err(|e| BeepError::ConfigError(e.to_string()))?;

        let sample_rate = config.sample_rate().0;
        let channels = config.channels() as usize;
        let queue = Arc::new(Mutex::new(VecDeque::new()));

        let stream = match config.sample_format() {
            SampleFormat::F32 => build_stream::<f32>(&device, &config.into(), queue.clone(), channels),
            SampleFormat::I16 => build_stream::<i16>(&device, &config.into(), queue.clone(), channels),
            SampleFormat::U16 => build_stream::<u16>(&device, &config.into(), queue.clone(), channels),
            _ => {
                return Err(BeepError::ConfigError(
                    "Unsupported sample format".to_string(),
                ))
            }
        }
        .map_err(|e| BeepError::StreamError(e.to_string()))?;

        stream
            .play()
            .map_err(|e| BeepError::PlayError(e.to_string()))?;

        log::info!("Beep output: {} Hz, {} channels", sample_rate, channels);

        Ok(Self {
            queue,
            sample_rate,
            _stream: stream,
        })
    }

    /// Queue `beep` to play as soon as the output callback runs
    pub fn play(&self, beep: &SquareBeep) {
        log::debug!("Beep {} Hz for {}s", beep.frequency, beep.duration);
        self.queue.lock().extend(beep.render(self.sample_rate));
    }
}

fn build_stream<T: cpal::SizedSample + cpal::FromSample<f32>>(
    device: &Device,
    config: &StreamConfig,
    queue: Arc<Mutex<VecDeque<f32>>>,
    channels: usize,
) -> Result<cpal::Stream, cpal::BuildStreamError> {
    device.build_output_stream(
        config,
        move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
            let mut queue = queue.lock();
            for frame in data.chunks_mut(channels) {
                let sample = T::from_sample(queue.pop_front().unwrap_or(0.0));
                frame.iter_mut().for_each(|s| *s = sample);
            }
        },
        |err| {
            log::error!("Beep stream error: {}", err);
        },
        None,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_beep_is_short_and_loud() {
        let beep = SquareBeep::default();
        assert_eq!(beep.duration, 0.01);
        assert_eq!(beep.gain, 0.5);
    }

    #[test]
    fn render_length_follows_duration() {
        let beep = SquareBeep::new(1000.0);
        assert_eq!(beep.render(48000).len(), 480);
    }

    #[test]
    fn render_alternates_every_half_period() {
        let beep = SquareBeep {
            frequency: 1000.0,
            duration: 0.002,
            gain: 0.25,
        };

        let samples = beep.render(48000);

        assert_eq!(samples.len(), 96);
        assert!(samples[..24].iter().all(|&s| s == 0.25));
        assert!(samples[24..48].iter().all(|&s| s == -0.25));
        assert!(samples[48..72].iter().all(|&s| s == 0.25));
    }
}
