//! Audio device layer
//!
//! Opens the capture and playback devices the engine runs on:
//! - **cpal**: real devices on every desktop platform (ALSA, JACK,
//!   CoreAudio, WASAPI)
//! - **offline**: a caller-clocked device pair for tests and file rendering
//!
//! # Architecture
//!
//! The audio layer knows nothing about echoes. A backend opens a device and
//! calls a boxed callback once per device period with a mono 16-bit block:
//!
//! - **Input device**: [`CaptureCallback`] receives what the microphone heard
//! - **Output device**: [`RenderCallback`] fills what the speaker plays
//! - **Control thread**: starts and stops streams; a [`CallbackGate`] makes
//!   stopping synchronous without locks on the audio thread
//!
//! # Example Usage
//!
//! ```ignore
//! use echo_core::audio::{AudioBackend, CpalBackend, DeviceSelection, StreamSpec};
//!
//! let mut backend = CpalBackend::new(DeviceSelection::default());
//! let mut stream = backend.open_output(
//!     StreamSpec::new(48000, 192),
//!     Box::new(|out| out.fill(0)),
//! )?;
//! stream.start()?;
//! ```

mod backend;
mod config;
mod cpal_backend;
mod device;
mod error;
mod gate;
mod offline;

pub use backend::{AudioBackend, CaptureCallback, DeviceStream, RenderCallback};
pub use config::{DeviceId, DeviceSelection, NativeAudioProperties, StreamSpec};
pub use cpal_backend::CpalBackend;
pub use device::{
    default_device, find_device_by_id, get_devices, resolve_device, AudioDevice, DeviceDirection,
};
pub use error::{AudioError, AudioResult};
pub use gate::{CallbackGate, GatePass};
pub use offline::{OfflineBackend, OfflineClock};
