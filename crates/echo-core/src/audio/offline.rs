//! Caller-clocked device pair
//!
//! Stands in for real hardware in tests and file rendering. Nothing runs on
//! its own: each [`OfflineClock::tick`] is one device period in which the
//! input device delivers a block (from samples queued with
//! [`OfflineClock::feed`], silence when none are left) and then the output
//! device asks for one.
//!
//! The shared state sits behind a `Mutex` because it models the hardware,
//! not the real-time path: the engine's callbacks never see it.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

use super::backend::{AudioBackend, CaptureCallback, DeviceStream, RenderCallback};
use super::config::{NativeAudioProperties, StreamSpec};
use super::error::{AudioError, AudioResult};
use crate::types::{Sample, DEFAULT_FRAMES_PER_BUFFER, DEFAULT_SAMPLE_RATE, MAX_BUFFER_SIZE};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    Input,
    Output,
}

struct Slot<C> {
    id: u64,
    callback: C,
    running: bool,
    frames: usize,
}

#[derive(Default)]
struct OfflineState {
    next_id: u64,
    output: Option<Slot<RenderCallback>>,
    input: Option<Slot<CaptureCallback>>,
    pending_input: VecDeque<Sample>,
    rendered: Vec<Sample>,
    output_callbacks: u64,
    input_callbacks: u64,
    input_failure: Option<AudioError>,
    output_failure: Option<AudioError>,
}

fn lock(state: &Mutex<OfflineState>) -> MutexGuard<'_, OfflineState> {
    // A panicking test callback must not wedge every later assertion
    state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Offline device provider
pub struct OfflineBackend {
    state: Arc<Mutex<OfflineState>>,
    native: NativeAudioProperties,
    supported_rates: Option<Vec<u32>>,
}

impl OfflineBackend {
    /// Create a backend whose "device" prefers 48kHz / 192 frames
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(OfflineState::default())),
            native: NativeAudioProperties {
                sample_rate: DEFAULT_SAMPLE_RATE,
                frames_per_buffer: Some(DEFAULT_FRAMES_PER_BUFFER),
            },
            supported_rates: None,
        }
    }

    /// Restrict the sample rates the output device accepts
    pub fn with_supported_rates(mut self, rates: &[u32]) -> Self {
        self.supported_rates = Some(rates.to_vec());
        self
    }

    /// Make every `open_input` fail with `error`
    pub fn with_input_failure(self, error: AudioError) -> Self {
        lock(&self.state).input_failure = Some(error);
        self
    }

    /// Make every `open_output` fail with `error`
    pub fn with_output_failure(self, error: AudioError) -> Self {
        lock(&self.state).output_failure = Some(error);
        self
    }

    /// Handle for driving the devices
    pub fn clock(&self) -> OfflineClock {
        OfflineClock {
            state: Arc::clone(&self.state),
        }
    }
}

impl Default for OfflineBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioBackend for OfflineBackend {
    fn name(&self) -> String {
        "offline".to_string()
    }

    fn native_properties(&self) -> AudioResult<NativeAudioProperties> {
        Ok(self.native)
    }

    fn check_config(&self, spec: StreamSpec) -> AudioResult<()> {
        let unsupported = |reason: &str| AudioError::UnsupportedConfig {
            sample_rate: spec.sample_rate,
            frames_per_buffer: spec.frames_per_buffer,
            reason: reason.to_string(),
        };

        if let Some(rates) = &self.supported_rates {
            if !rates.contains(&spec.sample_rate) {
                return Err(unsupported("sample rate not offered by device"));
            }
        }
        if spec.frames_per_buffer == 0 || spec.frames_per_buffer as usize > MAX_BUFFER_SIZE {
            return Err(unsupported("buffer size out of range"));
        }
        Ok(())
    }

    fn open_output(
        &mut self,
        spec: StreamSpec,
        render: RenderCallback,
    ) -> AudioResult<Box<dyn DeviceStream>> {
        let mut state = lock(&self.state);
        if let Some(error) = state.output_failure.clone() {
            return Err(error);
        }
        if state.output.is_some() {
            return Err(AudioError::DeviceBusy("offline output".to_string()));
        }
        state.next_id += 1;
        let id = state.next_id;
        state.output = Some(Slot {
            id,
            callback: render,
            running: false,
            frames: spec.frames_per_buffer as usize,
        });
        Ok(Box::new(OfflineStream {
            state: Arc::clone(&self.state),
            direction: Direction::Output,
            id,
        }))
    }

    fn open_input(
        &mut self,
        spec: StreamSpec,
        capture: CaptureCallback,
    ) -> AudioResult<Box<dyn DeviceStream>> {
        let mut state = lock(&self.state);
        if let Some(error) = state.input_failure.clone() {
            return Err(error);
        }
        if state.input.is_some() {
            return Err(AudioError::DeviceBusy("offline input".to_string()));
        }
        state.next_id += 1;
        let id = state.next_id;
        state.input = Some(Slot {
            id,
            callback: capture,
            running: false,
            frames: spec.frames_per_buffer as usize,
        });
        Ok(Box::new(OfflineStream {
            state: Arc::clone(&self.state),
            direction: Direction::Input,
            id,
        }))
    }
}

struct OfflineStream {
    state: Arc<Mutex<OfflineState>>,
    direction: Direction,
    id: u64,
}

impl OfflineStream {
    fn set_running(&self, running: bool) {
        let mut state = lock(&self.state);
        match self.direction {
            Direction::Output => {
                if let Some(slot) = state.output.as_mut().filter(|s| s.id == self.id) {
                    slot.running = running;
                }
            }
            Direction::Input => {
                if let Some(slot) = state.input.as_mut().filter(|s| s.id == self.id) {
                    slot.running = running;
                }
            }
        }
    }
}

impl DeviceStream for OfflineStream {
    fn start(&mut self) -> AudioResult<()> {
        self.set_running(true);
        Ok(())
    }

    fn stop(&mut self) -> AudioResult<()> {
        self.set_running(false);
        Ok(())
    }
}

impl Drop for OfflineStream {
    fn drop(&mut self) {
        let mut state = lock(&self.state);
        match self.direction {
            Direction::Output => {
                if state.output.as_ref().is_some_and(|s| s.id == self.id) {
                    state.output = None;
                }
            }
            Direction::Input => {
                if state.input.as_ref().is_some_and(|s| s.id == self.id) {
                    state.input = None;
                }
            }
        }
    }
}

/// Drives an [`OfflineBackend`]'s devices one period at a time
#[derive(Clone)]
pub struct OfflineClock {
    state: Arc<Mutex<OfflineState>>,
}

impl OfflineClock {
    /// Queue samples for the input device to deliver
    pub fn feed(&self, samples: &[Sample]) {
        lock(&self.state).pending_input.extend(samples.iter().copied());
    }

    /// Samples queued but not yet delivered
    pub fn pending_input(&self) -> usize {
        lock(&self.state).pending_input.len()
    }

    /// Run one device period; returns true if the output device rendered
    pub fn tick(&self) -> bool {
        let mut guard = lock(&self.state);
        let state = &mut *guard;

        if let Some(slot) = state.input.as_mut().filter(|s| s.running) {
            let block: Vec<Sample> = (0..slot.frames)
                .map(|_| state.pending_input.pop_front().unwrap_or(0))
                .collect();
            (slot.callback)(&block);
            state.input_callbacks += 1;
        }

        match state.output.as_mut().filter(|s| s.running) {
            Some(slot) => {
                let mut block = vec![0 as Sample; slot.frames];
                (slot.callback)(&mut block);
                state.rendered.extend_from_slice(&block);
                state.output_callbacks += 1;
                true
            }
            None => false,
        }
    }

    /// Run `periods` device periods
    pub fn run(&self, periods: usize) {
        for _ in 0..periods {
            self.tick();
        }
    }

    /// Everything the output device has played so far (drains it)
    pub fn take_rendered(&self) -> Vec<Sample> {
        std::mem::take(&mut lock(&self.state).rendered)
    }

    /// Output callbacks delivered since creation
    pub fn output_callbacks(&self) -> u64 {
        lock(&self.state).output_callbacks
    }

    /// Input callbacks delivered since creation
    pub fn input_callbacks(&self) -> u64 {
        lock(&self.state).input_callbacks
    }

    /// Whether an output device is currently open
    pub fn has_output(&self) -> bool {
        lock(&self.state).output.is_some()
    }

    /// Whether an input device is currently open
    pub fn has_input(&self) -> bool {
        lock(&self.state).input.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_streams_start_stopped() {
        let mut backend = OfflineBackend::new();
        let clock = backend.clock();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let mut stream = backend
            .open_output(
                StreamSpec::new(48000, 4),
                Box::new(move |out: &mut [Sample]| {
                    counter.fetch_add(1, Ordering::SeqCst);
                    out.fill(7);
                }),
            )
            .unwrap();

        assert!(!clock.tick());
        stream.start().unwrap();
        assert!(clock.tick());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(clock.take_rendered(), vec![7; 4]);
    }

    #[test]
    fn test_input_delivers_fed_samples_then_silence() {
        let mut backend = OfflineBackend::new();
        let clock = backend.clock();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let mut stream = backend
            .open_input(
                StreamSpec::new(48000, 3),
                Box::new(move |block: &[Sample]| sink.lock().unwrap().extend_from_slice(block)),
            )
            .unwrap();
        stream.start().unwrap();

        clock.feed(&[1, 2, 3, 4]);
        clock.run(2);
        assert_eq!(*seen.lock().unwrap(), vec![1, 2, 3, 4, 0, 0]);
        assert_eq!(clock.input_callbacks(), 2);
    }

    #[test]
    fn test_drop_releases_device() {
        let mut backend = OfflineBackend::new();
        let clock = backend.clock();
        let stream = backend
            .open_output(StreamSpec::new(48000, 4), Box::new(|_: &mut [Sample]| {}))
            .unwrap();
        assert!(clock.has_output());
        assert!(matches!(
            backend.open_output(StreamSpec::new(48000, 4), Box::new(|_: &mut [Sample]| {})),
            Err(AudioError::DeviceBusy(_))
        ));
        drop(stream);
        assert!(!clock.has_output());
    }

    #[test]
    fn test_check_config() {
        let backend = OfflineBackend::new().with_supported_rates(&[48000]);
        assert!(backend.check_config(StreamSpec::new(48000, 192)).is_ok());
        assert!(matches!(
            backend.check_config(StreamSpec::new(44100, 192)),
            Err(AudioError::UnsupportedConfig { .. })
        ));
        assert!(backend.check_config(StreamSpec::new(48000, 0)).is_err());
    }

    #[test]
    fn test_failure_injection() {
        let mut backend =
            OfflineBackend::new().with_input_failure(AudioError::DeviceBusy("mic".into()));
        let result = backend.open_input(StreamSpec::default(), Box::new(|_: &[Sample]| {}));
        assert_eq!(result.err(), Some(AudioError::DeviceBusy("mic".into())));
    }
}
