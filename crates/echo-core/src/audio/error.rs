//! Audio backend error types

use thiserror::Error;

/// Errors that can occur while opening or running audio devices
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AudioError {
    /// No audio devices available
    #[error("No audio {0} devices found")]
    NoDevices(&'static str),

    /// Failed to get default device
    #[error("Failed to get default audio device: {0}")]
    NoDefaultDevice(String),

    /// Device not found
    #[error("Audio device not found: {0}")]
    DeviceNotFound(String),

    /// The device cannot run at the requested rate / block size
    #[error("Unsupported configuration: {sample_rate}Hz with {frames_per_buffer}-frame buffers ({reason})")]
    UnsupportedConfig {
        sample_rate: u32,
        frames_per_buffer: u32,
        reason: String,
    },

    /// Failed to get device configuration
    #[error("Failed to get device config: {0}")]
    ConfigError(String),

    /// Failed to build audio stream
    #[error("Failed to build audio stream: {0}")]
    StreamBuildError(String),

    /// Failed to start/play stream
    #[error("Failed to start audio stream: {0}")]
    StreamPlayError(String),

    /// Stream error while running
    #[error("Audio stream error: {0}")]
    StreamError(String),

    /// Unsupported sample format
    #[error("Unsupported sample format: {0}")]
    UnsupportedFormat(String),

    /// Device already opened by someone else
    #[error("Audio device busy: {0}")]
    DeviceBusy(String),
}

/// Result type for audio operations
pub type AudioResult<T> = Result<T, AudioError>;
