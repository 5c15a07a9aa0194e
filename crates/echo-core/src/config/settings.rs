//! Application configuration
//!
//! ```yaml
//! audio:
//!   output_device:
//!     name: "Headphones"
//!     host: ALSA
//!   sample_rate: 48000        # omit to use the device's native rate
//!   frames_per_buffer: 192    # omit to use the device's native block size
//! echo:
//!   delay_ms: 300
//!   decay: 0.5
//! stats_interval_ms: 2000
//! ```

use serde::{Deserialize, Serialize};

use crate::audio::{DeviceSelection, NativeAudioProperties, StreamSpec};
use crate::params::EchoParameters;

/// Device and stream settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioSettings {
    #[serde(flatten)]
    pub devices: DeviceSelection,
    /// Override the device's native sample rate
    pub sample_rate: Option<u32>,
    /// Override the device's native block size
    pub frames_per_buffer: Option<u32>,
}

impl AudioSettings {
    /// Stream shape to run at: overrides first, then the device's own values
    pub fn resolve(&self, native: NativeAudioProperties) -> StreamSpec {
        StreamSpec::new(
            self.sample_rate.unwrap_or(native.sample_rate),
            self.frames_per_buffer
                .unwrap_or_else(|| native.frames_or_default()),
        )
    }
}

/// Top-level configuration file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EchoConfig {
    pub audio: AudioSettings,
    /// Echo settings applied when the engine is created
    pub echo: EchoParameters,
    /// How often the host prints pipeline statistics (0 disables)
    pub stats_interval_ms: u64,
}

impl Default for EchoConfig {
    fn default() -> Self {
        Self {
            audio: AudioSettings::default(),
            echo: EchoParameters::default(),
            stats_interval_ms: 2000,
        }
    }
}

impl EchoConfig {
    /// Replace out-of-range echo settings with defaults
    pub fn sanitized(mut self) -> Self {
        if let Err(e) = self.echo.validate() {
            log::warn!("Config echo settings invalid ({}), using defaults", e);
            self.echo = EchoParameters::default();
        }
        self
    }
}
