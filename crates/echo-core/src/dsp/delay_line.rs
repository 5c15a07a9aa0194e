//! Circular sample history backing the echo
//!
//! Same ring layout as a latency-compensation delay line: a fixed buffer, a
//! write cursor that always points at the next free slot, and reads taken a
//! fixed distance behind it.

use crate::types::Sample;

/// Fixed-capacity ring of past output samples
pub struct DelayLine {
    buffer: Vec<Sample>,
    write_pos: usize,
}

impl DelayLine {
    /// Create a silent delay line holding `capacity` samples
    ///
    /// A zero capacity is bumped to one so the modulo arithmetic stays valid.
    pub fn new(capacity: usize) -> Self {
        Self {
            buffer: vec![0; capacity.max(1)],
            write_pos: 0,
        }
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.buffer.len()
    }

    /// Position of the next write
    #[inline]
    pub fn write_pos(&self) -> usize {
        self.write_pos
    }

    /// Largest delay that can be read without wrapping onto the write slot
    #[inline]
    pub fn max_delay(&self) -> usize {
        self.buffer.len() - 1
    }

    /// Index of the sample written `delay` samples ago
    ///
    /// `delay` is clamped to [`max_delay`](Self::max_delay), so the result is
    /// always in `[0, capacity)`.
    #[inline]
    pub fn read_index(&self, delay: usize) -> usize {
        let delay = delay.min(self.max_delay());
        if self.write_pos >= delay {
            self.write_pos - delay
        } else {
            self.buffer.len() - (delay - self.write_pos)
        }
    }

    /// Read the sample written `delay` samples ago
    #[inline]
    pub fn read(&self, delay: usize) -> Sample {
        self.buffer[self.read_index(delay)]
    }

    /// Store a sample at the cursor and advance it
    #[inline]
    pub fn write(&mut self, sample: Sample) {
        self.buffer[self.write_pos] = sample;
        self.write_pos += 1;
        if self.write_pos == self.buffer.len() {
            self.write_pos = 0;
        }
    }

    /// Fill with silence and rewind the cursor (no allocation)
    pub fn clear(&mut self) {
        self.buffer.fill(0);
        self.write_pos = 0;
    }
}
