//! Audio device configuration
//!
//! Device selection and stream shape shared by every backend.

use serde::{Deserialize, Serialize};

use crate::types::{DEFAULT_FRAMES_PER_BUFFER, DEFAULT_SAMPLE_RATE};

/// Audio device identifier
///
/// Includes both the device name and the host backend (ALSA, JACK, etc.)
/// so devices from different hosts can be told apart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceId {
    /// Device name as reported by the system
    pub name: String,
    /// Audio host identifier (e.g., "ALSA", "CoreAudio")
    /// If None, searches every host
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
}

impl DeviceId {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            host: None,
        }
    }

    pub fn with_host(name: &str, host: &str) -> Self {
        Self {
            name: name.to_string(),
            host: Some(host.to_string()),
        }
    }

    /// Get a display label that includes the host if available
    pub fn display_label(&self) -> String {
        match &self.host {
            Some(host) => format!("[{}] {}", host, self.name),
            None => self.name.clone(),
        }
    }
}

/// Which devices a backend opens
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceSelection {
    /// Playback device (None = system default)
    pub output_device: Option<DeviceId>,
    /// Capture device (None = system default)
    pub input_device: Option<DeviceId>,
}

/// Shape of one device stream: mono 16-bit PCM at a fixed rate and block size
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamSpec {
    pub sample_rate: u32,
    pub frames_per_buffer: u32,
}

impl StreamSpec {
    pub fn new(sample_rate: u32, frames_per_buffer: u32) -> Self {
        Self {
            sample_rate,
            frames_per_buffer,
        }
    }

    /// Duration of one block in milliseconds
    pub fn latency_ms(&self) -> f32 {
        (self.frames_per_buffer as f32 / self.sample_rate as f32) * 1000.0
    }
}

impl Default for StreamSpec {
    fn default() -> Self {
        Self::new(DEFAULT_SAMPLE_RATE, DEFAULT_FRAMES_PER_BUFFER)
    }
}

/// Native device properties reported before an engine is created
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NativeAudioProperties {
    pub sample_rate: u32,
    /// Preferred block size, if the device reports a fixed one
    pub frames_per_buffer: Option<u32>,
}

impl NativeAudioProperties {
    /// Block size to use, falling back to the low-latency default
    pub fn frames_or_default(&self) -> u32 {
        self.frames_per_buffer.unwrap_or(DEFAULT_FRAMES_PER_BUFFER)
    }
}
