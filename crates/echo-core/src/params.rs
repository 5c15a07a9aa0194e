//! Live echo parameters shared between the control and audio threads
//!
//! The control thread validates `(delay_ms, decay)`, converts the delay to
//! samples, and publishes both values packed into a single `AtomicU64`. The
//! render callback loads that word once per block, so it can never observe a
//! delay from one update paired with a decay from another.
//!
//! ```text
//!   control thread                         audio thread
//!   ──────────────                         ────────────
//!   configure(300, 0.5)
//!     validate + convert
//!     store(pack(14400, 0.5)) ──────────►  load() once per block
//!                                          unpack → EchoSnapshot
//! ```

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::{ms_to_samples, MAX_DELAY_MS};

/// Rejected parameter values
#[derive(Error, Debug, Clone, Copy, PartialEq)]
pub enum ParamError {
    #[error("Echo delay {0}ms outside 0-{max}ms", max = MAX_DELAY_MS)]
    DelayOutOfRange(u32),

    #[error("Echo decay {0} outside 0.0-1.0")]
    DecayOutOfRange(f32),
}

/// User-facing echo settings
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EchoParameters {
    /// Delay between the live signal and its echo (0-1000ms)
    pub delay_ms: u32,
    /// Attenuation applied to each echo repeat (0.0-1.0)
    pub decay: f32,
}

impl Default for EchoParameters {
    fn default() -> Self {
        Self {
            delay_ms: 100,
            decay: 0.1,
        }
    }
}

impl EchoParameters {
    pub fn new(delay_ms: u32, decay: f32) -> Self {
        Self { delay_ms, decay }
    }

    /// Check both values against their supported ranges
    pub fn validate(&self) -> Result<(), ParamError> {
        if self.delay_ms > MAX_DELAY_MS {
            return Err(ParamError::DelayOutOfRange(self.delay_ms));
        }
        // NaN fails the range check as well
        if !(0.0..=1.0).contains(&self.decay) {
            return Err(ParamError::DecayOutOfRange(self.decay));
        }
        Ok(())
    }

    /// Convert to the per-block form used by the DSP
    pub fn to_snapshot(&self, sample_rate: u32) -> EchoSnapshot {
        EchoSnapshot {
            delay_samples: ms_to_samples(self.delay_ms, sample_rate),
            decay: self.decay,
        }
    }
}

/// Parameters as seen by the render callback for one block
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EchoSnapshot {
    pub delay_samples: u32,
    pub decay: f32,
}

impl EchoSnapshot {
    #[inline]
    fn pack(self) -> u64 {
        ((self.delay_samples as u64) << 32) | self.decay.to_bits() as u64
    }

    #[inline]
    fn unpack(word: u64) -> Self {
        Self {
            delay_samples: (word >> 32) as u32,
            decay: f32::from_bits(word as u32),
        }
    }
}

/// Lock-free parameter cell plus the recording-session epoch
///
/// Shared via `Arc` between the engine (writer) and the render callback
/// (reader).
#[derive(Debug)]
pub struct EchoControl {
    /// Packed [`EchoSnapshot`]
    snapshot: AtomicU64,
    /// Bumped at every recording-session start; the DSP clears its history
    /// when it sees a new value
    session_epoch: AtomicU32,
}

impl EchoControl {
    pub fn new(initial: EchoSnapshot) -> Self {
        Self {
            snapshot: AtomicU64::new(initial.pack()),
            session_epoch: AtomicU32::new(0),
        }
    }

    /// Publish a new snapshot as one atomic store
    #[inline]
    pub fn publish(&self, snapshot: EchoSnapshot) {
        self.snapshot.store(snapshot.pack(), Ordering::Release);
    }

    /// Latest fully published snapshot (never blocks)
    #[inline]
    pub fn snapshot(&self) -> EchoSnapshot {
        EchoSnapshot::unpack(self.snapshot.load(Ordering::Acquire))
    }

    /// Mark the start of a new recording session
    pub fn begin_session(&self) -> u32 {
        self.session_epoch.fetch_add(1, Ordering::AcqRel).wrapping_add(1)
    }

    #[inline]
    pub fn session_epoch(&self) -> u32 {
        self.session_epoch.load(Ordering::Acquire)
    }
}
