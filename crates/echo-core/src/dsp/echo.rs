//! Feedback echo: live input plus a decayed copy of past output
//!
//! For every sample `n` of a block:
//!
//! ```text
//! delayed   = history[write - delay]
//! output[n] = clamp_i16(input[n] + decay * delayed)
//! history[write] = output[n]; write += 1
//! ```
//!
//! Because the mixed output (not the dry input) is written back, each echo
//! is itself echoed, giving the classic decaying repeat tail.

use std::sync::Arc;

use super::delay_line::DelayLine;
use crate::params::{EchoControl, EchoSnapshot};
use crate::types::{clamp_sample, Sample};

/// The echo effect state owned by the render callback
pub struct EchoUnit {
    line: DelayLine,
    control: Arc<EchoControl>,
    /// Session epoch the history belongs to
    epoch: u32,
}

impl EchoUnit {
    /// Create an echo unit with `capacity` samples of history
    ///
    /// Allocates; call from the control thread only.
    pub fn new(capacity: usize, control: Arc<EchoControl>) -> Self {
        let epoch = control.session_epoch();
        Self {
            line: DelayLine::new(capacity),
            control,
            epoch,
        }
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.line.capacity()
    }

    /// Process one block (real-time safe: no allocation, no locks)
    ///
    /// `input` and `output` must have the same length. Parameters are read
    /// once, so the whole block uses one consistent delay/decay pair.
    pub fn process(&mut self, input: &[Sample], output: &mut [Sample]) {
        debug_assert_eq!(input.len(), output.len());

        let epoch = self.control.session_epoch();
        if epoch != self.epoch {
            self.line.clear();
            self.epoch = epoch;
        }

        let EchoSnapshot { delay_samples, decay } = self.control.snapshot();
        let delay = (delay_samples as usize).min(self.line.max_delay());

        // A zero-length loop would feed the sample being produced back into itself
        let decay = if delay == 0 { 0.0 } else { decay };

        for (dry, out) in input.iter().zip(output.iter_mut()) {
            let delayed = self.line.read(delay);
            let mixed = clamp_sample(*dry as f32 + decay * delayed as f32);
            self.line.write(mixed);
            *out = mixed;
        }
    }

    /// Drop all history (control thread, while not rendering)
    pub fn reset(&mut self) {
        self.line.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::EchoParameters;
    use crate::types::delay_line_capacity;

    fn unit(delay_ms: u32, decay: f32, sample_rate: u32) -> (EchoUnit, Arc<EchoControl>) {
        let control = Arc::new(EchoControl::new(
            EchoParameters::new(delay_ms, decay).to_snapshot(sample_rate),
        ));
        let unit = EchoUnit::new(delay_line_capacity(sample_rate), Arc::clone(&control));
        (unit, control)
    }

    /// Run `input` through the unit in `block`-sized pieces
    fn run_blocks(unit: &mut EchoUnit, input: &[Sample], block: usize) -> Vec<Sample> {
        let mut output = vec![0; input.len()];
        for (i, o) in input.chunks(block).zip(output.chunks_mut(block)) {
            unit.process(i, o);
        }
        output
    }

    #[test]
    fn test_zero_decay_is_bit_exact_passthrough() {
        let (mut unit, _) = unit(250, 0.0, 48000);
        let input: Vec<Sample> = (0..48000).map(|i| ((i * 7919) % 65536 - 32768) as Sample).collect();
        let output = run_blocks(&mut unit, &input, 192);
        assert_eq!(output, input);
    }

    #[test]
    fn test_impulse_echo_lands_at_delay() {
        let (mut unit, _) = unit(300, 0.5, 48000);
        let mut input = vec![0 as Sample; 20000];
        input[0] = 10000;
        let output = run_blocks(&mut unit, &input, 192);

        assert_eq!(output[0], 10000);
        assert_eq!(output[14400], 5000);
        for (n, (&out, &dry)) in output.iter().zip(input.iter()).enumerate() {
            if n != 14400 {
                assert_eq!(out, dry, "sample {n} should be dry");
            }
        }
    }

    #[test]
    fn test_echo_feeds_back() {
        let (mut unit, _) = unit(10, 0.5, 1000);
        let mut input = vec![0 as Sample; 40];
        input[0] = 1000;
        let output = run_blocks(&mut unit, &input, 8);
        assert_eq!(output[10], 500);
        assert_eq!(output[20], 250);
        assert_eq!(output[30], 125);
    }

    #[test]
    fn test_longest_delay_lands_exactly() {
        let (mut unit, _) = unit(1000, 0.5, 1000);
        let mut input = vec![0 as Sample; 1200];
        input[0] = 1000;
        let output = run_blocks(&mut unit, &input, 64);
        assert_eq!(output[999], 0);
        assert_eq!(output[1000], 500);
    }

    #[test]
    fn test_output_saturates() {
        let (mut unit, _) = unit(1, 1.0, 1000);
        let input = vec![30000 as Sample; 4];
        let output = run_blocks(&mut unit, &input, 4);
        assert_eq!(output[0], 30000);
        assert_eq!(output[1], i16::MAX);
    }

    #[test]
    fn test_parameter_change_applies_next_block() {
        let (mut unit, control) = unit(0, 0.0, 1000);
        let mut out = [0 as Sample; 4];
        unit.process(&[100, 0, 0, 0], &mut out);
        assert_eq!(out, [100, 0, 0, 0]);

        control.publish(EchoParameters::new(4, 1.0).to_snapshot(1000));
        unit.process(&[0, 0, 0, 0], &mut out);
        // Impulse was written 4 samples before the first sample of this block
        assert_eq!(out, [100, 0, 0, 0]);
    }

    #[test]
    fn test_zero_delay_adds_nothing() {
        let (mut unit, _) = unit(0, 1.0, 48000);
        let input = [1000 as Sample, -1000, 500];
        let mut out = [0 as Sample; 3];
        unit.process(&input, &mut out);
        assert_eq!(out, input);
    }

    #[test]
    fn test_new_session_clears_history() {
        let (mut unit, control) = unit(2, 1.0, 1000);
        let mut out = [0 as Sample; 2];
        unit.process(&[100, 200], &mut out);

        control.begin_session();
        unit.process(&[0, 0], &mut out);
        assert_eq!(out, [0, 0]);
    }
}
