//! Common types for the echo engine
//!
//! The pipeline moves monophonic 16-bit PCM end to end: devices deliver and
//! accept `i16` samples, the delay line stores `i16` history, and only the
//! echo mix itself is computed in `f32` before clamping back.

use std::ops::{Index, IndexMut};

/// Audio sample type (signed 16-bit PCM, mono)
pub type Sample = i16;

/// Longest supported echo delay in milliseconds
pub const MAX_DELAY_MS: u32 = 1000;

/// Default sample rate when the device does not report one (48kHz)
pub const DEFAULT_SAMPLE_RATE: u32 = 48000;

/// Default device block size in frames
///
/// 192 frames is the native burst size of many low-latency mobile and USB
/// devices (4ms @ 48kHz).
pub const DEFAULT_FRAMES_PER_BUFFER: u32 = 192;

/// Maximum block size to pre-allocate (covers typical configurations)
/// Common values: 64, 128, 192, 256, 512, 1024, 2048, 4096 frames
pub const MAX_BUFFER_SIZE: usize = 8192;

/// Number of blocks kept in flight between capture and playback
///
/// Two blocks is classic double buffering: one is being filled by the input
/// device while the other is consumed by the output device.
pub const QUEUE_DEPTH_BLOCKS: usize = 2;

/// Capacity of the capture-to-playback queue in device blocks
///
/// Leaves room for input devices that deliver in larger bursts than the
/// output consumes.
pub const QUEUE_CAPACITY_BLOCKS: usize = 8;

/// Delay-line capacity in samples for the longest delay at `sample_rate`
///
/// `ceil(MAX_DELAY_MS * sample_rate / 1000) + 1`. Delays are clamped to
/// `capacity - 1`, so the extra slot keeps `MAX_DELAY_MS` itself reachable.
pub fn delay_line_capacity(sample_rate: u32) -> usize {
    let numerator = MAX_DELAY_MS as u64 * sample_rate as u64;
    numerator.div_ceil(1000) as usize + 1
}

/// Convert a delay in milliseconds to whole samples at `sample_rate`
#[inline]
pub fn ms_to_samples(delay_ms: u32, sample_rate: u32) -> u32 {
    (delay_ms as u64 * sample_rate as u64 / 1000) as u32
}

/// Saturate a mixed value to the 16-bit signed range
#[inline]
pub fn clamp_sample(value: f32) -> Sample {
    value.round().clamp(i16::MIN as f32, i16::MAX as f32) as Sample
}

/// A fixed-capacity block of mono samples
///
/// Allocated once with [`MonoBuffer::silence`] at the largest size a device
/// may ask for; callbacks then only change the working length with
/// [`MonoBuffer::set_len_from_capacity`], which never allocates.
#[derive(Debug, Clone, Default)]
pub struct MonoBuffer {
    samples: Vec<Sample>,
}

impl MonoBuffer {
    /// Create a buffer filled with silence
    pub fn silence(len: usize) -> Self {
        Self {
            samples: vec![0; len],
        }
    }

    /// Create a buffer from existing samples
    pub fn from_vec(samples: Vec<Sample>) -> Self {
        Self { samples }
    }

    /// Number of samples in the buffer
    #[inline]
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Allocated capacity in samples
    #[inline]
    pub fn capacity(&self) -> usize {
        self.samples.capacity()
    }

    /// Set the working length of a pre-allocated buffer (real-time safe)
    ///
    /// Lengths beyond the capacity are clamped rather than reallocating.
    /// Newly exposed samples are silent.
    #[inline]
    pub fn set_len_from_capacity(&mut self, new_len: usize) {
        let new_len = new_len.min(self.samples.capacity());
        if new_len > self.samples.len() {
            self.samples.resize(new_len, 0);
        } else {
            self.samples.truncate(new_len);
        }
    }

    /// Fill the buffer with silence
    pub fn fill_silence(&mut self) {
        self.samples.fill(0);
    }

    #[inline]
    pub fn as_slice(&self) -> &[Sample] {
        &self.samples
    }

    #[inline]
    pub fn as_mut_slice(&mut self) -> &mut [Sample] {
        &mut self.samples
    }

    /// Largest absolute sample value in the buffer
    pub fn peak(&self) -> u16 {
        self.samples
            .iter()
            .map(|s| s.unsigned_abs())
            .max()
            .unwrap_or(0)
    }
}

impl Index<usize> for MonoBuffer {
    type Output = Sample;

    #[inline]
    fn index(&self, index: usize) -> &Self::Output {
        &self.samples[index]
    }
}

impl IndexMut<usize> for MonoBuffer {
    #[inline]
    fn index_mut(&mut self, index: usize) -> &mut Self::Output {
        &mut self.samples[index]
    }
}
