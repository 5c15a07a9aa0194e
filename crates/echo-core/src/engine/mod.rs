//! Audio engine - capture path, playback path, lifecycle
//!
//! This module contains the real-time pipeline and its control API:
//! - Recorder: input device feeding the sample queue
//! - Player: output device whose callback runs the echo
//! - AudioEngine: the two paths plus echo state for one session
//! - EngineManager: the create/start/stop/delete API the host calls

mod atomics;
mod capture;
mod engine;
mod error;
mod link;
mod manager;
mod playback;

pub use atomics::*;
pub use capture::Recorder;
pub use engine::*;
pub use error::*;
pub use manager::*;
pub use playback::Player;
