//! Error types for the engine control API

use thiserror::Error;

use crate::audio::AudioError;
use crate::params::ParamError;

/// Errors returned by [`EngineManager`](super::EngineManager) operations
///
/// Every failure leaves the engine in the state it was in before the call.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum EngineError {
    /// No engine has been created
    #[error("Echo engine not created")]
    NotInitialized,

    /// `create_engine` called while an engine is alive
    #[error("Echo engine already created")]
    AlreadyCreated,

    /// The playback path already exists
    #[error("Player already created")]
    PlayerExists,

    /// The capture path already exists
    #[error("Recorder already created")]
    RecorderExists,

    /// Operation needs the playback path
    #[error("No player: call create_player first")]
    NoPlayer,

    /// Operation needs the capture path
    #[error("No recorder: call create_recorder first")]
    NoRecorder,

    /// Delay or decay outside the supported range
    #[error("Invalid echo parameters: {0}")]
    InvalidParameters(#[from] ParamError),

    /// Device layer failure
    #[error(transparent)]
    Audio(#[from] AudioError),
}

/// Result type for engine operations
pub type EngineResult<T> = Result<T, EngineError>;
