//! Lock-free pipeline counters
//!
//! Written by the device callbacks with relaxed atomics, read by the host
//! for status display. Nothing here synchronizes data; the values are only
//! ever reported.

use std::fmt;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

/// Counters shared between the callbacks and the host
#[derive(Debug, Default)]
pub struct PipelineAtomics {
    /// Output blocks produced by the render callback
    pub blocks_rendered: AtomicU64,
    /// Input blocks delivered to the capture callback
    pub blocks_captured: AtomicU64,
    /// Samples rendered as silence because capture had not delivered them
    pub underrun_samples: AtomicU64,
    /// Captured samples dropped because the queue was full
    pub overrun_samples: AtomicU64,
    /// Queued samples discarded to keep latency bounded
    pub trimmed_samples: AtomicU64,
    /// Peak absolute value of the last rendered block
    pub output_peak: AtomicU32,
}

impl PipelineAtomics {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn record_render(&self, peak: u16) {
        self.blocks_rendered.fetch_add(1, Ordering::Relaxed);
        self.output_peak.store(peak as u32, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_capture(&self) {
        self.blocks_captured.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn add_underrun(&self, samples: usize) {
        self.underrun_samples.fetch_add(samples as u64, Ordering::Relaxed);
    }

    #[inline]
    pub fn add_overrun(&self, samples: usize) {
        self.overrun_samples.fetch_add(samples as u64, Ordering::Relaxed);
    }

    #[inline]
    pub fn add_trimmed(&self, samples: usize) {
        self.trimmed_samples.fetch_add(samples as u64, Ordering::Relaxed);
    }

    /// Copy all counters (lock-free)
    pub fn stats(&self) -> PipelineStats {
        PipelineStats {
            blocks_rendered: self.blocks_rendered.load(Ordering::Relaxed),
            blocks_captured: self.blocks_captured.load(Ordering::Relaxed),
            underrun_samples: self.underrun_samples.load(Ordering::Relaxed),
            overrun_samples: self.overrun_samples.load(Ordering::Relaxed),
            trimmed_samples: self.trimmed_samples.load(Ordering::Relaxed),
            output_peak: self.output_peak.load(Ordering::Relaxed) as u16,
        }
    }
}

/// Point-in-time copy of [`PipelineAtomics`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PipelineStats {
    pub blocks_rendered: u64,
    pub blocks_captured: u64,
    pub underrun_samples: u64,
    pub overrun_samples: u64,
    pub trimmed_samples: u64,
    pub output_peak: u16,
}

impl PipelineStats {
    /// Last output peak in dBFS (-inf for silence)
    pub fn output_peak_dbfs(&self) -> f32 {
        20.0 * (self.output_peak as f32 / 32768.0).log10()
    }
}

impl fmt::Display for PipelineStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "rendered={} captured={} underrun={} overrun={} trimmed={} peak={:.1}dBFS",
            self.blocks_rendered,
            self.blocks_captured,
            self.underrun_samples,
            self.overrun_samples,
            self.trimmed_samples,
            self.output_peak_dbfs()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_accumulate() {
        let atomics = PipelineAtomics::new();
        atomics.record_render(1000);
        atomics.record_render(16384);
        atomics.record_capture();
        atomics.add_underrun(192);
        atomics.add_overrun(10);
        atomics.add_trimmed(384);

        let stats = atomics.stats();
        assert_eq!(stats.blocks_rendered, 2);
        assert_eq!(stats.blocks_captured, 1);
        assert_eq!(stats.underrun_samples, 192);
        assert_eq!(stats.overrun_samples, 10);
        assert_eq!(stats.trimmed_samples, 384);
        assert_eq!(stats.output_peak, 16384);
    }

    #[test]
    fn test_peak_dbfs() {
        let stats = PipelineStats {
            output_peak: 16384,
            ..Default::default()
        };
        assert!((stats.output_peak_dbfs() + 6.02).abs() < 0.01);
        assert!(PipelineStats::default().output_peak_dbfs().is_infinite());
    }
}
