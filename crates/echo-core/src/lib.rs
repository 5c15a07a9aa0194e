//! Echo Core - real-time microphone echo engine
//!
//! Captures mono 16-bit audio, mixes in a decaying delayed copy of its own
//! output and plays the result back with minimal latency.

pub mod audio;
pub mod config;
pub mod dsp;
pub mod engine;
pub mod params;
pub mod render;
pub mod types;

pub use engine::{EngineError, EngineManager, EngineResult, EngineState};
pub use params::{EchoParameters, ParamError};
pub use types::*;
