//! Engine lifecycle manager - the control API the host calls
//!
//! # State machine
//!
//! ```text
//!            create_engine            create_player, create_recorder, start_play
//!   Idle ─────────────────► Ready ───────────────────────────────────────────► Active
//!    ▲                        │  ◄─────────────────────────────────────────────  │
//!    └──── delete_engine ─────┘         stop_play (stops recording too)
//! ```
//!
//! Every operation runs on the control thread. Failures leave whatever was
//! created before them intact but not started.

use std::sync::Arc;

use super::{AudioEngine, EngineError, EngineResult, PipelineAtomics};
use crate::audio::{AudioBackend, StreamSpec};
use crate::params::EchoParameters;

/// Observable engine session state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    /// No engine
    Idle,
    /// Engine created, not playing
    Ready,
    /// Playback running
    Active,
}

/// Owns the device backend and at most one [`AudioEngine`]
pub struct EngineManager {
    backend: Box<dyn AudioBackend>,
    engine: Option<AudioEngine>,
}

impl EngineManager {
    pub fn new(backend: Box<dyn AudioBackend>) -> Self {
        log::debug!("Engine manager using {} backend", backend.name());
        Self {
            backend,
            engine: None,
        }
    }

    fn engine(&self) -> EngineResult<&AudioEngine> {
        self.engine.as_ref().ok_or(EngineError::NotInitialized)
    }

    /// Split borrow of the engine and the backend
    fn parts(&mut self) -> EngineResult<(&mut AudioEngine, &mut dyn AudioBackend)> {
        match self.engine.as_mut() {
            Some(engine) => Ok((engine, self.backend.as_mut())),
            None => Err(EngineError::NotInitialized),
        }
    }

    pub fn backend(&self) -> &dyn AudioBackend {
        self.backend.as_ref()
    }

    // ─────────────────────────────────────────────────────────────
    // Engine
    // ─────────────────────────────────────────────────────────────

    /// Create the engine for a session
    pub fn create_engine(
        &mut self,
        sample_rate: u32,
        frames_per_buffer: u32,
        delay_ms: u32,
        decay: f32,
    ) -> EngineResult<()> {
        if self.engine.is_some() {
            return Err(EngineError::AlreadyCreated);
        }
        let spec = StreamSpec::new(sample_rate, frames_per_buffer);
        let engine = AudioEngine::new(
            self.backend.as_ref(),
            spec,
            EchoParameters::new(delay_ms, decay),
        )?;
        self.engine = Some(engine);
        Ok(())
    }

    /// Free the engine; does nothing if none exists
    ///
    /// Paths the caller left alive are stopped and released first.
    pub fn delete_engine(&mut self) {
        let Some(mut engine) = self.engine.take() else {
            return;
        };
        if engine.has_player() || engine.has_recorder() {
            log::warn!("delete_engine called with live audio paths, tearing them down");
        }
        engine.shutdown();
        log::info!("Engine deleted");
    }

    pub fn state(&self) -> EngineState {
        match &self.engine {
            None => EngineState::Idle,
            Some(engine) if engine.is_playing() => EngineState::Active,
            Some(_) => EngineState::Ready,
        }
    }

    // ─────────────────────────────────────────────────────────────
    // Parameters
    // ─────────────────────────────────────────────────────────────

    /// Change the echo; takes effect at the next output block
    pub fn configure_echo(&mut self, delay_ms: u32, decay: f32) -> EngineResult<()> {
        let (engine, _) = self.parts()?;
        engine
            .configure(EchoParameters::new(delay_ms, decay))
            .map_err(|e| {
                log::warn!("Rejected echo parameters: {}", e);
                EngineError::from(e)
            })
    }

    pub fn echo_parameters(&self) -> EngineResult<EchoParameters> {
        Ok(self.engine()?.parameters())
    }

    // ─────────────────────────────────────────────────────────────
    // Playback path
    // ─────────────────────────────────────────────────────────────

    pub fn create_player(&mut self) -> EngineResult<()> {
        let (engine, backend) = self.parts()?;
        if engine.has_player() {
            return Err(EngineError::PlayerExists);
        }
        engine.open_player(backend)?;
        Ok(())
    }

    /// Release the output device, stopping it first if needed
    pub fn delete_player(&mut self) {
        if let Some(engine) = self.engine.as_mut() {
            engine.close_player();
        }
    }

    /// Start a session: recording first, then playback
    ///
    /// If recording is already running it keeps running; the session still
    /// starts fresh with an empty queue and a clear echo history.
    pub fn start_play(&mut self) -> EngineResult<()> {
        let (engine, _) = self.parts()?;
        if !engine.has_player() {
            return Err(EngineError::NoPlayer);
        }
        if !engine.has_recorder() {
            return Err(EngineError::NoRecorder);
        }
        if engine.is_playing() {
            return Ok(());
        }

        let was_recording = engine.is_recording();
        if was_recording {
            engine.begin_session();
        } else {
            engine.start_recording()?;
        }
        if let Err(e) = engine.start_playback() {
            if !was_recording {
                engine.stop_recording();
            }
            return Err(e.into());
        }
        log::info!("Echo started");
        Ok(())
    }

    /// Stop playback, then recording
    pub fn stop_play(&mut self) {
        if let Some(engine) = self.engine.as_mut() {
            let was_playing = engine.is_playing();
            engine.stop_playback();
            engine.stop_recording();
            if was_playing {
                log::info!("Echo stopped");
            }
        }
    }

    // ─────────────────────────────────────────────────────────────
    // Capture path
    // ─────────────────────────────────────────────────────────────

    pub fn create_recorder(&mut self) -> EngineResult<()> {
        let (engine, backend) = self.parts()?;
        if engine.has_recorder() {
            return Err(EngineError::RecorderExists);
        }
        engine.open_recorder(backend)?;
        Ok(())
    }

    /// Release the input device, stopping it first if needed
    pub fn delete_recorder(&mut self) {
        if let Some(engine) = self.engine.as_mut() {
            engine.close_recorder();
        }
    }

    pub fn start_recording(&mut self) -> EngineResult<()> {
        let (engine, _) = self.parts()?;
        if !engine.has_recorder() {
            return Err(EngineError::NoRecorder);
        }
        engine.start_recording()?;
        Ok(())
    }

    pub fn stop_recording(&mut self) {
        if let Some(engine) = self.engine.as_mut() {
            engine.stop_recording();
        }
    }

    // ─────────────────────────────────────────────────────────────
    // Host helpers
    // ─────────────────────────────────────────────────────────────

    /// Create both paths and start them, undoing everything on failure
    pub fn start_echo(&mut self) -> EngineResult<()> {
        let (engine, _) = self.parts()?;
        let had_player = engine.has_player();
        let had_recorder = engine.has_recorder();

        let result = self.open_and_start(had_player, had_recorder);
        if let Err(ref e) = result {
            log::error!("Failed to start echo: {}", e);
            self.stop_play();
            if !had_recorder {
                self.delete_recorder();
            }
            if !had_player {
                self.delete_player();
            }
        }
        result
    }

    fn open_and_start(&mut self, had_player: bool, had_recorder: bool) -> EngineResult<()> {
        if !had_player {
            self.create_player()?;
        }
        if !had_recorder {
            self.create_recorder()?;
        }
        self.start_play()
    }

    /// Stop and release both paths, keeping the engine
    pub fn stop_echo(&mut self) {
        self.stop_play();
        self.delete_recorder();
        self.delete_player();
    }

    pub fn pipeline_atomics(&self) -> EngineResult<Arc<PipelineAtomics>> {
        Ok(self.engine()?.atomics())
    }

    pub fn sample_rate(&self) -> EngineResult<u32> {
        Ok(self.engine()?.spec().sample_rate)
    }

    pub fn frames_per_buffer(&self) -> EngineResult<u32> {
        Ok(self.engine()?.spec().frames_per_buffer)
    }
}

impl Drop for EngineManager {
    fn drop(&mut self) {
        self.delete_engine();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::{AudioError, OfflineBackend, OfflineClock};
    use crate::params::ParamError;
    use crate::types::Sample;

    fn manager() -> (EngineManager, OfflineClock) {
        manager_with(OfflineBackend::new())
    }

    fn manager_with(backend: OfflineBackend) -> (EngineManager, OfflineClock) {
        let clock = backend.clock();
        (EngineManager::new(Box::new(backend)), clock)
    }

    /// Feed `input` and tick until it has all come back out
    fn run_through(clock: &OfflineClock, input: &[Sample], frames: usize) -> Vec<Sample> {
        clock.take_rendered();
        clock.feed(input);
        clock.run(input.len().div_ceil(frames));
        clock.take_rendered()
    }

    /// Feed a recognizable signal and check it comes out unchanged
    ///
    /// Expects an engine with zero decay; the signal may arrive up to one
    /// block late when the queue still holds samples from a previous session.
    fn assert_mic_reaches_output(mgr: &EngineManager, clock: &OfflineClock) {
        let input: Vec<Sample> = (0..192 * 4).map(|i| (i % 1000 + 1) as Sample).collect();
        clock.take_rendered();
        clock.feed(&input);
        clock.run(4 + 2);
        let output = clock.take_rendered();

        assert_eq!(mgr.state(), EngineState::Active);
        assert!(
            output.windows(input.len()).any(|w| w == input.as_slice()),
            "captured signal missing from output"
        );
    }

    #[test]
    fn test_operations_need_engine() {
        let (mut mgr, _) = manager();
        assert_eq!(mgr.state(), EngineState::Idle);
        assert_eq!(mgr.configure_echo(100, 0.5), Err(EngineError::NotInitialized));
        assert_eq!(mgr.create_player(), Err(EngineError::NotInitialized));
        assert_eq!(mgr.create_recorder(), Err(EngineError::NotInitialized));
        assert_eq!(mgr.start_play(), Err(EngineError::NotInitialized));
        assert_eq!(mgr.start_echo(), Err(EngineError::NotInitialized));
        assert!(mgr.pipeline_atomics().is_err());

        // Void operations are harmless without an engine
        mgr.stop_play();
        mgr.delete_player();
        mgr.delete_recorder();
        mgr.stop_recording();
    }

    #[test]
    fn test_create_engine_twice() {
        let (mut mgr, _) = manager();
        mgr.create_engine(48000, 192, 100, 0.1).unwrap();
        assert_eq!(mgr.create_engine(48000, 192, 100, 0.1), Err(EngineError::AlreadyCreated));
        assert_eq!(mgr.state(), EngineState::Ready);
        assert_eq!(mgr.sample_rate(), Ok(48000));
        assert_eq!(mgr.frames_per_buffer(), Ok(192));
    }

    #[test]
    fn test_unsupported_config_retains_nothing() {
        let (mut mgr, _) = manager_with(OfflineBackend::new().with_supported_rates(&[48000]));
        let result = mgr.create_engine(22050, 192, 100, 0.1);
        assert!(matches!(
            result,
            Err(EngineError::Audio(AudioError::UnsupportedConfig { .. }))
        ));
        assert_eq!(mgr.state(), EngineState::Idle);
        mgr.create_engine(48000, 192, 100, 0.1).unwrap();
    }

    #[test]
    fn test_invalid_initial_parameters() {
        let (mut mgr, _) = manager();
        assert_eq!(
            mgr.create_engine(48000, 192, 1500, 0.5),
            Err(EngineError::InvalidParameters(ParamError::DelayOutOfRange(1500)))
        );
        assert_eq!(mgr.state(), EngineState::Idle);
    }

    #[test]
    fn test_delete_engine_twice_is_noop() {
        let (mut mgr, _) = manager();
        mgr.create_engine(48000, 192, 100, 0.1).unwrap();
        mgr.delete_engine();
        mgr.delete_engine();
        assert_eq!(mgr.state(), EngineState::Idle);
        mgr.create_engine(48000, 192, 100, 0.1).unwrap();
    }

    #[test]
    fn test_delete_engine_tears_down_live_paths() {
        let (mut mgr, clock) = manager();
        mgr.create_engine(48000, 192, 100, 0.1).unwrap();
        mgr.start_echo().unwrap();
        assert_eq!(mgr.state(), EngineState::Active);

        mgr.delete_engine();
        assert!(!clock.has_output());
        assert!(!clock.has_input());
        assert!(!clock.tick());
    }

    #[test]
    fn test_configure_accepts_full_range() {
        let (mut mgr, _) = manager();
        mgr.create_engine(48000, 192, 100, 0.1).unwrap();
        for delay_ms in [0, 1, 300, 999, 1000] {
            for decay in [0.0, 0.3, 1.0] {
                mgr.configure_echo(delay_ms, decay).unwrap();
                assert_eq!(mgr.echo_parameters(), Ok(EchoParameters::new(delay_ms, decay)));
            }
        }
    }

    #[test]
    fn test_invalid_parameters_keep_previous() {
        let (mut mgr, _) = manager();
        mgr.create_engine(48000, 192, 250, 0.4).unwrap();

        assert_eq!(
            mgr.configure_echo(300, 1.2),
            Err(EngineError::InvalidParameters(ParamError::DecayOutOfRange(1.2)))
        );
        assert_eq!(
            mgr.configure_echo(1500, 0.5),
            Err(EngineError::InvalidParameters(ParamError::DelayOutOfRange(1500)))
        );
        assert_eq!(mgr.echo_parameters(), Ok(EchoParameters::new(250, 0.4)));
    }

    #[test]
    fn test_path_lifecycle_errors() {
        let (mut mgr, _) = manager();
        mgr.create_engine(48000, 192, 100, 0.1).unwrap();

        assert_eq!(mgr.start_play(), Err(EngineError::NoPlayer));
        mgr.create_player().unwrap();
        assert_eq!(mgr.create_player(), Err(EngineError::PlayerExists));
        assert_eq!(mgr.start_play(), Err(EngineError::NoRecorder));
        assert_eq!(mgr.start_recording(), Err(EngineError::NoRecorder));
        mgr.create_recorder().unwrap();
        assert_eq!(mgr.create_recorder(), Err(EngineError::RecorderExists));

        mgr.start_play().unwrap();
        assert_eq!(mgr.state(), EngineState::Active);
        mgr.stop_play();
        assert_eq!(mgr.state(), EngineState::Ready);

        mgr.delete_recorder();
        mgr.delete_player();
        mgr.create_player().unwrap();
        mgr.create_recorder().unwrap();
    }

    #[test]
    fn test_zero_decay_passthrough_end_to_end() {
        let (mut mgr, clock) = manager();
        mgr.create_engine(48000, 192, 300, 0.0).unwrap();
        mgr.start_echo().unwrap();

        let input: Vec<Sample> = (0..192 * 50).map(|i| ((i * 31) % 4000 - 2000) as Sample).collect();
        assert_eq!(run_through(&clock, &input, 192), input);
    }

    #[test]
    fn test_impulse_echo_end_to_end() {
        let (mut mgr, clock) = manager();
        mgr.create_engine(48000, 192, 300, 0.5).unwrap();
        mgr.start_echo().unwrap();

        let mut input = vec![0 as Sample; 192 * 80];
        input[0] = 20000;
        let output = run_through(&clock, &input, 192);

        assert_eq!(output[0], 20000);
        assert_eq!(output[14400], 10000);
        assert!(output[1..14400].iter().all(|&s| s == 0));
        assert!(output[14401..].iter().all(|&s| s == 0));

        let stats = mgr.pipeline_atomics().unwrap().stats();
        assert_eq!(stats.underrun_samples, 0);
        assert_eq!(stats.overrun_samples, 0);
        assert_eq!(stats.blocks_rendered, 80);
    }

    #[test]
    fn test_parameter_change_applies_next_block() {
        let (mut mgr, clock) = manager();
        mgr.create_engine(48000, 192, 1, 0.0).unwrap();
        mgr.start_echo().unwrap();

        // 1ms = 48 samples; turn the echo on between two blocks
        let mut block = vec![0 as Sample; 192];
        block[0] = 1000;
        assert_eq!(run_through(&clock, &block, 192), block);

        mgr.configure_echo(1, 0.5).unwrap();
        let mut expected = block.clone();
        expected[48] = 500;
        expected[96] = 250;
        expected[144] = 125;
        assert_eq!(run_through(&clock, &block, 192)[..192], expected[..]);
    }

    #[test]
    fn test_recorder_failure_rolls_back_player() {
        let (mut mgr, clock) = manager_with(
            OfflineBackend::new().with_input_failure(AudioError::DeviceBusy("mic".into())),
        );
        mgr.create_engine(48000, 192, 300, 0.5).unwrap();

        assert_eq!(
            mgr.start_echo(),
            Err(EngineError::Audio(AudioError::DeviceBusy("mic".into())))
        );
        assert_eq!(mgr.state(), EngineState::Ready);
        assert!(!clock.has_output());

        let before = clock.output_callbacks();
        clock.run(10);
        assert_eq!(clock.output_callbacks(), before);

        // Engine is still usable for a retry once the device frees up
        mgr.create_player().unwrap();
    }

    #[test]
    fn test_new_session_starts_with_clean_history() {
        let (mut mgr, clock) = manager();
        mgr.create_engine(48000, 192, 10, 1.0).unwrap();
        mgr.start_echo().unwrap();

        let mut input = vec![0 as Sample; 192];
        input[0] = 8000;
        run_through(&clock, &input, 192);
        mgr.stop_play();

        // 10ms = 480 samples: the old impulse would land at 480 - 192
        mgr.start_play().unwrap();
        let output = run_through(&clock, &vec![0; 192 * 3], 192);
        assert!(output.iter().all(|&s| s == 0));
    }

    #[test]
    fn test_stop_echo_releases_devices() {
        let (mut mgr, clock) = manager();
        mgr.create_engine(48000, 192, 100, 0.2).unwrap();
        mgr.start_echo().unwrap();
        clock.run(3);

        mgr.stop_echo();
        assert_eq!(mgr.state(), EngineState::Ready);
        assert!(!clock.has_output());
        assert!(!clock.has_input());

        mgr.start_echo().unwrap();
        assert_eq!(mgr.state(), EngineState::Active);
    }

    #[test]
    fn test_capture_without_playback_overruns() {
        let (mut mgr, clock) = manager();
        mgr.create_engine(48000, 192, 100, 0.2).unwrap();
        mgr.create_player().unwrap();
        mgr.create_recorder().unwrap();
        mgr.start_recording().unwrap();

        let capacity = crate::engine::queue_capacity(192);
        let ticks = capacity / 192 + 3;
        clock.run(ticks);

        let stats = mgr.pipeline_atomics().unwrap().stats();
        assert_eq!(stats.blocks_captured, ticks as u64);
        assert_eq!(stats.overrun_samples, (ticks * 192 - capacity) as u64);
        assert_eq!(stats.blocks_rendered, 0);
    }

    #[test]
    fn test_create_both_then_start_play() {
        let (mut mgr, clock) = manager();
        mgr.create_engine(48000, 192, 300, 0.0).unwrap();
        mgr.create_player().unwrap();
        mgr.create_recorder().unwrap();
        mgr.start_play().unwrap();
        assert_mic_reaches_output(&mgr, &clock);
    }

    #[test]
    fn test_recorder_first_then_player() {
        let (mut mgr, clock) = manager();
        mgr.create_engine(48000, 192, 300, 0.0).unwrap();
        mgr.create_recorder().unwrap();
        mgr.create_player().unwrap();
        mgr.start_play().unwrap();
        assert_mic_reaches_output(&mgr, &clock);
    }

    #[test]
    fn test_recording_before_player_exists() {
        let (mut mgr, clock) = manager();
        mgr.create_engine(48000, 192, 300, 0.0).unwrap();
        mgr.create_recorder().unwrap();
        mgr.start_recording().unwrap();
        clock.run(3);

        mgr.create_player().unwrap();
        mgr.start_play().unwrap();
        assert_mic_reaches_output(&mgr, &clock);

        let stats = mgr.pipeline_atomics().unwrap().stats();
        assert_eq!(stats.underrun_samples, 0);
    }

    #[test]
    fn test_recording_before_start_play() {
        let (mut mgr, clock) = manager();
        mgr.create_engine(48000, 192, 300, 0.0).unwrap();
        mgr.create_player().unwrap();
        mgr.create_recorder().unwrap();
        mgr.start_recording().unwrap();
        clock.run(2);

        mgr.start_play().unwrap();
        assert_mic_reaches_output(&mgr, &clock);
    }

    #[test]
    fn test_many_recording_sessions_while_player_stopped() {
        let (mut mgr, clock) = manager();
        mgr.create_engine(48000, 192, 300, 0.0).unwrap();
        mgr.create_player().unwrap();
        mgr.create_recorder().unwrap();

        // The stopped player never picks up its queue halves
        for _ in 0..12 {
            mgr.start_recording().unwrap();
            clock.tick();
            mgr.stop_recording();
        }

        mgr.start_play().unwrap();
        assert_mic_reaches_output(&mgr, &clock);
    }

    #[test]
    fn test_restart_recording_during_playback() {
        let (mut mgr, clock) = manager();
        mgr.create_engine(48000, 192, 300, 0.0).unwrap();
        mgr.start_echo().unwrap();
        assert_mic_reaches_output(&mgr, &clock);

        mgr.stop_recording();
        clock.run(2);
        mgr.start_recording().unwrap();
        assert_mic_reaches_output(&mgr, &clock);
    }

    #[test]
    fn test_start_play_again_after_stop() {
        let (mut mgr, clock) = manager();
        mgr.create_engine(48000, 192, 300, 0.0).unwrap();
        mgr.start_echo().unwrap();
        mgr.stop_play();
        assert_eq!(mgr.state(), EngineState::Ready);

        mgr.start_recording().unwrap();
        mgr.start_play().unwrap();
        assert_mic_reaches_output(&mgr, &clock);

        // Already active: nothing changes
        mgr.start_play().unwrap();
        assert_mic_reaches_output(&mgr, &clock);
    }
}
