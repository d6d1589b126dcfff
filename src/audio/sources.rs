//! Microphone enumeration

use cpal::traits::{DeviceTrait, HostTrait};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Audio source information
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioSource {
    /// Identifier accepted by `AudioCaptureHandle::new`
    pub id: String,

    /// Display name
    pub name: String,

    /// Whether this is the host's default input
    pub is_default: bool,
}

/// Audio source errors
#[derive(Error, Debug)]
pub enum SourceError {
    #[error("Failed to enumerate devices: {0}")]
    EnumerationError(String),
}

/// List available input devices, default first
pub fn list_sources() -> Result<Vec<AudioSource>, SourceError> {
    let host = cpal::default_host();
    let default_name = host.default_input_device().and_then(|d| d.name().ok());

    let devices = host
        .input_devices()
        .map_err(|e| SourceError::EnumerationError(e.to_string()))?;

    let mut sources: Vec<AudioSource> = devices
        .filter_map(|device| match device.name() {
            Ok(name) => Some(name),
            Err(e) => {
                log::warn!("Skipping unnamed input device: {}", e);
                None
            }
        })
        .map(|name| AudioSource {
            id: source_id(&name),
            is_default: default_name.as_deref() == Some(name.as_str()),
            name: format!("Input: {}", name),
        })
        .collect();

    sources.sort_by_key(|s| !s.is_default);
    Ok(sources)
}

fn source_id(device_name: &str) -> String {
    format!("input:{}", device_name)
}
