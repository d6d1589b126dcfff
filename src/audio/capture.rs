//! Microphone capture on a dedicated thread

use super::{AudioConfig, SpectrumAnalyser};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, SampleFormat, StreamConfig};
use parking_lot::Mutex;
use std::sync::mpsc;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use thiserror::Error;

/// Audio capture errors
#[derive(Error, Debug)]
pub enum CaptureError {
    #[error("No input device found")]
    NoInputDevice,

    #[error("Failed to get device config: {0}")]
    ConfigError(String),

    #[error("Failed to build audio stream: {0}")]
    StreamError(String),

    #[error("Failed to start stream: {0}")]
    PlayError(String),

    #[error("Source not found: {0}")]
    SourceNotFound(String),

    #[error("Thread error: {0}")]
    ThreadError(String),
}

/// Latest spectrum snapshot and the audio clock it was taken at
#[derive(Debug, Clone, Default)]
pub struct SpectrumFrame {
    /// One amplitude byte per frequency bin
    pub bins: Vec<u8>,

    /// Seconds of audio captured when the snapshot was taken
    pub time: f64,

    /// Sample rate the snapshot was analysed at
    pub sample_rate: u32,
}

/// Commands sent to the audio thread
enum AudioCommand {
    Stop,
}

/// Audio capture handle
///
/// The cpal stream lives on a dedicated thread; this handle only carries the
/// command channel and the shared latest frame.
pub struct AudioCaptureHandle {
    command_tx: mpsc::Sender<AudioCommand>,
    thread_handle: Option<JoinHandle<()>>,
    latest_frame: Arc<Mutex<SpectrumFrame>>,
}

impl AudioCaptureHandle {
    /// Start capturing from `source_id` (`input:<name>`), or the default microphone
    pub fn new(source_id: Option<String>, config: AudioConfig) -> Result<Self, CaptureError> {
        let (command_tx, command_rx) = mpsc::channel();
        let latest_frame = Arc::new(Mutex::new(SpectrumFrame::default()));
        let frame_clone = latest_frame.clone();

        let thread_handle = thread::Builder::new()
            .name("audio-capture".to_string())
            .spawn(move || {
                if let Err(e) = run_audio_thread(source_id, config, command_rx, frame_clone) {
                    log::error!("Audio thread error: {}", e);
                }
            })
            .map_err(|e| CaptureError::ThreadError(e.to_string()))?;

        Ok(Self {
            command_tx,
            thread_handle: Some(thread_handle),
            latest_frame,
        })
    }

    /// Copy of the most recent spectrum snapshot
    pub fn latest_frame(&self) -> SpectrumFrame {
        self.latest_frame.lock().clone()
    }

    /// Stop the audio capture
    pub fn stop(&mut self) {
        let _ = self.command_tx.send(AudioCommand::Stop);
        if let Some(handle) = self.thread_handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for AudioCaptureHandle {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Circular audio buffer that also counts every sample ever pushed
pub struct AudioBuffer {
    samples: Vec<f32>,
    write_pos: usize,
    capacity: usize,
    total_written: u64,
}

impl AudioBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            samples: vec![0.0; capacity],
            write_pos: 0,
            capacity,
            total_written: 0,
        }
    }

    pub fn push_samples(&mut self, data: &[f32]) {
        for &sample in data {
            self.samples[self.write_pos] = sample;
            self.write_pos = (self.write_pos + 1) % self.capacity;
        }
        self.total_written += data.len() as u64;
    }

    pub fn get_latest(&self, count: usize) -> Vec<f32> {
        let count = count.min(self.capacity);
        let mut result = Vec::with_capacity(count);

        let start = if self.write_pos >= count {
            self.write_pos - count
        } else {
            self.capacity - (count - self.write_pos)
        };

        for i in 0..count {
            let idx = (start + i) % self.capacity;
            result.push(self.samples[idx]);
        }

        result
    }

    pub fn total_written(&self) -> u64 {
        self.total_written
    }
}

fn find_device(host: &cpal::Host, source_id: Option<&str>) -> Result<Device, CaptureError> {
    match source_id.and_then(|id| id.strip_prefix("input:")) {
        Some(device_name) => {
            log::info!("Using input device: {}", device_name);
            host.input_devices()
                .map_err(|e| CaptureError::ConfigError(e.to_string()))?
                .find(|d| d.name().map(|n| n == device_name).unwrap_or(false))
                .ok_or_else(|| CaptureError::SourceNotFound(device_name.to_string()))
        }
        None => {
            if let Some(id) = source_id {
                log::warn!("Unrecognised source '{}', using default microphone", id);
            }
            host.default_input_device().ok_or(CaptureError::NoInputDevice)
        }
    }
}

/// Run the audio capture in a dedicated thread
fn run_audio_thread(
    source_id: Option<String>,
    audio_config: AudioConfig,
    command_rx: mpsc::Receiver<AudioCommand>,
    frame_out: Arc<Mutex<SpectrumFrame>>,
) -> Result<(), CaptureError> {
    let host = cpal::default_host();
    let device = find_device(&host, source_id.as_deref())?;

    let config = device
        .default_input_config()
        .map_err(|e| CaptureError::ConfigError(e.to_string()))?;

    let sample_rate = config.sample_rate().0;
    let channels = config.channels() as usize;

    log::info!("Audio capture: {} Hz, {} channels", sample_rate, channels);

    let buffer = Arc::new(Mutex::new(AudioBuffer::new(sample_rate as usize * 2)));
    let mut analyser = SpectrumAnalyser::new(AudioConfig {
        sample_rate,
        ..audio_config
    });
    let mut bins = vec![0u8; analyser.bin_count()];

    let buffer_clone = buffer.clone();
    let stream = match config.sample_format() {
        SampleFormat::F32 => build_stream::<f32>(&device, &config.into(), buffer_clone, channels),
        SampleFormat::I16 => build_stream::<i16>(&device, &config.into(), buffer_clone, channels),
        SampleFormat::U16 => build_stream::<u16>(&device, &config.into(), buffer_clone, channels),
        _ => {
            return Err(CaptureError::ConfigError(
                "Unsupported sample format".to_string(),
            ))
        }
    }
    .map_err(|e| CaptureError::StreamError(e.to_string()))?;

    stream
        .play()
        .map_err(|e| CaptureError::PlayError(e.to_string()))?;

    log::info!("Audio capture started");

    loop {
        match command_rx.try_recv() {
            Ok(AudioCommand::Stop) => {
                log::info!("Audio capture stopping");
                break;
            }
            Err(mpsc::TryRecvError::Disconnected) => {
                log::info!("Audio capture channel disconnected");
                break;
            }
            Err(mpsc::TryRecvError::Empty) => {}
        }

        // Copy samples under lock, then release before the FFT
        let (samples, written) = {
            let buf = buffer.lock();
            (buf.get_latest(analyser.fft_size()), buf.total_written())
        };

        if written >= analyser.fft_size() as u64 && analyser.byte_frequency_data(&samples, &mut bins) {
            let mut frame = frame_out.lock();
            frame.bins.clone_from(&bins);
            frame.time = written as f64 / sample_rate as f64;
            frame.sample_rate = sample_rate;
        }

        std::thread::sleep(std::time::Duration::from_millis(10));
    }

    Ok(())
}

/// Build audio stream for given sample type
fn build_stream<T: cpal::Sample + cpal::SizedSample>(
    device: &Device,
    config: &StreamConfig,
    buffer: Arc<Mutex<AudioBuffer>>,
    channels: usize,
) -> Result<cpal::Stream, cpal::BuildStreamError>
where
    f32: cpal::FromSample<T>,
{
    device.build_input_stream(
        config,
        move |data: &[T], _: &cpal::InputCallbackInfo| {
            // Downmix interleaved frames to mono f32
            let mono: Vec<f32> = data
                .chunks(channels)
                .map(|frame| {
                    let sum: f32 = frame.iter().map(|s| s.to_sample::<f32>()).sum();
                    sum / channels as f32
                })
                .collect();

            buffer.lock().push_samples(&mono);
        },
        |err| {
            log::error!("Audio stream error: {}", err);
        },
        None,
    )
}
