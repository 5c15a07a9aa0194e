//! Audio backend trait for device implementations
//!
//! Defines a common interface for the devices the engine drives:
//! - **cpal**: real input/output devices on every desktop platform
//! - **offline**: a caller-clocked device pair for tests and file rendering
//!
//! Both deliver mono 16-bit blocks through boxed callbacks that run on the
//! backend's audio thread. Streams are returned stopped; the engine starts
//! them explicitly.

use super::config::{NativeAudioProperties, StreamSpec};
use super::error::AudioResult;
use crate::types::Sample;

/// Fills one output block (runs on the audio thread)
pub type RenderCallback = Box<dyn FnMut(&mut [Sample]) + Send + 'static>;

/// Receives one captured block (runs on the audio thread)
pub type CaptureCallback = Box<dyn FnMut(&[Sample]) + Send + 'static>;

/// An open device stream
///
/// Dropping the stream releases the device.
pub trait DeviceStream {
    /// Begin delivering callbacks
    fn start(&mut self) -> AudioResult<()>;

    /// Stop delivering callbacks
    ///
    /// Backends may still be finishing one callback when this returns; the
    /// engine layers a [`CallbackGate`](super::CallbackGate) on top to make
    /// stopping synchronous.
    fn stop(&mut self) -> AudioResult<()>;
}

/// Device provider for the engine
pub trait AudioBackend {
    /// Short name for logs (e.g. "cpal/ALSA", "offline")
    fn name(&self) -> String;

    /// Sample rate and block size the output device prefers
    fn native_properties(&self) -> AudioResult<NativeAudioProperties>;

    /// Check that the output device can run at `spec`
    fn check_config(&self, spec: StreamSpec) -> AudioResult<()>;

    /// Open the output device; `render` is called once per device period
    fn open_output(
        &mut self,
        spec: StreamSpec,
        render: RenderCallback,
    ) -> AudioResult<Box<dyn DeviceStream>>;

    /// Open the input device (mono); `capture` is called once per period
    fn open_input(
        &mut self,
        spec: StreamSpec,
        capture: CaptureCallback,
    ) -> AudioResult<Box<dyn DeviceStream>>;
}
