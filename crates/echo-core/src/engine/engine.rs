//! Main audio engine - ties together the capture path, the playback path
//! and the echo parameters for one session

use std::sync::Arc;

use rtrb::RingBuffer;

use super::{PipelineAtomics, Player, Recorder};
use crate::audio::{AudioBackend, AudioError, AudioResult, StreamSpec};
use crate::dsp::EchoUnit;
use crate::params::{EchoControl, EchoParameters, ParamError};
use crate::types::{delay_line_capacity, Sample, QUEUE_CAPACITY_BLOCKS};

/// Sample queue size for a device block size
pub fn queue_capacity(frames_per_buffer: u32) -> usize {
    frames_per_buffer as usize * QUEUE_CAPACITY_BLOCKS
}

/// The audio engine for one session
///
/// Owns both device paths and the echo state. The echo unit is allocated
/// here and lent to the player's render callback while a player exists.
pub struct AudioEngine {
    spec: StreamSpec,
    /// Shared with the render callback
    control: Arc<EchoControl>,
    /// Last accepted parameters (control-thread copy)
    params: EchoParameters,
    atomics: Arc<PipelineAtomics>,
    delay_capacity: usize,
    /// Echo unit waiting for the next player
    echo: Option<EchoUnit>,
    player: Option<Player>,
    recorder: Option<Recorder>,
}

impl AudioEngine {
    /// Create an engine and allocate its delay line
    ///
    /// The backend is only asked whether it supports `spec`; no device is
    /// opened yet.
    pub fn new(
        backend: &dyn AudioBackend,
        spec: StreamSpec,
        params: EchoParameters,
    ) -> Result<Self, super::EngineError> {
        params.validate()?;
        if spec.sample_rate == 0 {
            return Err(AudioError::UnsupportedConfig {
                sample_rate: spec.sample_rate,
                frames_per_buffer: spec.frames_per_buffer,
                reason: "sample rate must be positive".to_string(),
            }
            .into());
        }
        backend.check_config(spec)?;

        let control = Arc::new(EchoControl::new(params.to_snapshot(spec.sample_rate)));
        let delay_capacity = delay_line_capacity(spec.sample_rate);
        let echo = EchoUnit::new(delay_capacity, Arc::clone(&control));

        log::info!(
            "Engine created: {}Hz, {} frames ({:.1}ms), delay line {} samples, echo {}ms / {:.2}",
            spec.sample_rate,
            spec.frames_per_buffer,
            spec.latency_ms(),
            delay_capacity,
            params.delay_ms,
            params.decay
        );

        Ok(Self {
            spec,
            control,
            params,
            atomics: Arc::new(PipelineAtomics::new()),
            delay_capacity,
            echo: Some(echo),
            player: None,
            recorder: None,
        })
    }

    pub fn spec(&self) -> StreamSpec {
        self.spec
    }

    pub fn parameters(&self) -> EchoParameters {
        self.params
    }

    pub fn delay_capacity(&self) -> usize {
        self.delay_capacity
    }

    /// Get lock-free pipeline counters
    pub fn atomics(&self) -> Arc<PipelineAtomics> {
        Arc::clone(&self.atomics)
    }

    /// Validate and publish new echo parameters
    ///
    /// On error the previous parameters stay in effect.
    pub fn configure(&mut self, params: EchoParameters) -> Result<(), ParamError> {
        params.validate()?;
        self.control.publish(params.to_snapshot(self.spec.sample_rate));
        self.params = params;
        log::debug!("Echo set to {}ms / {:.2}", params.delay_ms, params.decay);
        Ok(())
    }

    pub fn has_player(&self) -> bool {
        self.player.is_some()
    }

    pub fn has_recorder(&self) -> bool {
        self.recorder.is_some()
    }

    pub fn is_playing(&self) -> bool {
        self.player.as_ref().is_some_and(Player::is_playing)
    }

    pub fn is_recording(&self) -> bool {
        self.recorder.as_ref().is_some_and(Recorder::is_recording)
    }

    fn take_echo(&mut self) -> EchoUnit {
        self.echo
            .take()
            .unwrap_or_else(|| EchoUnit::new(self.delay_capacity, Arc::clone(&self.control)))
    }

    /// Open the output device with the echo unit in its callback
    pub fn open_player(&mut self, backend: &mut dyn AudioBackend) -> AudioResult<()> {
        let echo = self.take_echo();
        match Player::open(backend, self.spec, echo, self.atomics()) {
            Ok(player) => {
                self.player = Some(player);
                Ok(())
            }
            Err(e) => {
                // The unit went down with the callback
                self.echo = Some(EchoUnit::new(self.delay_capacity, Arc::clone(&self.control)));
                Err(e)
            }
        }
    }

    /// Stop and release the output device
    pub fn close_player(&mut self) {
        if let Some(mut player) = self.player.take() {
            player.stop();
            drop(player);
            if self.echo.is_none() {
                self.echo = Some(EchoUnit::new(self.delay_capacity, Arc::clone(&self.control)));
            }
            log::debug!("Player released");
        }
    }

    /// Open the input device
    pub fn open_recorder(&mut self, backend: &mut dyn AudioBackend) -> AudioResult<()> {
        let recorder = Recorder::open(backend, self.spec, self.atomics())?;
        self.recorder = Some(recorder);
        Ok(())
    }

    /// Stop and release the input device
    pub fn close_recorder(&mut self) {
        if let Some(mut recorder) = self.recorder.take() {
            recorder.stop();
            log::debug!("Recorder released");
        }
    }

    /// Give both callbacks a fresh empty queue
    ///
    /// Both halves are posted or neither is, so the two callbacks always end
    /// up on the same queue.
    fn link_paths(&mut self) {
        let (Some(player), Some(recorder)) = (self.player.as_mut(), self.recorder.as_mut()) else {
            return;
        };
        if !(player.can_attach() && recorder.can_attach()) {
            log::warn!("Previous queue hand-off still pending, keeping the current queue");
            return;
        }

        let (producer, consumer) =
            RingBuffer::<Sample>::new(queue_capacity(self.spec.frames_per_buffer));
        player.attach(consumer);
        recorder.attach(producer);
    }

    /// Begin a new session: clear the echo history and relink both paths
    ///
    /// Works whether or not the recorder is already running.
    pub fn begin_session(&mut self) {
        self.control.begin_session();
        self.link_paths();
    }

    /// Start a recording session
    ///
    /// Begins a new session, then starts the input device. Does nothing if
    /// the recorder is already running.
    pub fn start_recording(&mut self) -> AudioResult<()> {
        if !self.has_recorder() || self.is_recording() {
            return Ok(());
        }
        self.begin_session();
        match self.recorder.as_mut() {
            Some(recorder) => recorder.start(),
            None => Ok(()),
        }
    }

    pub fn stop_recording(&mut self) {
        if let Some(recorder) = self.recorder.as_mut() {
            recorder.stop();
        }
    }

    pub fn start_playback(&mut self) -> AudioResult<()> {
        match self.player.as_mut() {
            Some(player) => player.start(),
            None => Ok(()),
        }
    }

    pub fn stop_playback(&mut self) {
        if let Some(player) = self.player.as_mut() {
            player.stop();
        }
    }

    /// Stop both paths and release both devices
    ///
    /// Playback stops first so the render callback is gone before capture.
    pub fn shutdown(&mut self) {
        self.stop_playback();
        self.stop_recording();
        self.close_recorder();
        self.close_player();
    }
}

impl Drop for AudioEngine {
    fn drop(&mut self) {
        self.shutdown();
    }
}
