//! Playback path: the render callback that drives the whole pipeline
//!
//! Each output period the render callback:
//! 1. pulls one block from the sample queue (silence for missing samples),
//! 2. runs the echo unit over it,
//! 3. hands the result to the device.
//!
//! The echo unit and its delay line live inside the callback for as long as
//! the player exists; the control thread only talks to them through
//! [`EchoControl`](crate::params::EchoControl).

use std::sync::Arc;

use rtrb::Consumer;

use super::atomics::PipelineAtomics;
use super::link::{link, LinkSender};
use crate::audio::{AudioBackend, AudioResult, CallbackGate, DeviceStream, StreamSpec};
use crate::dsp::EchoUnit;
use crate::types::{MonoBuffer, Sample, MAX_BUFFER_SIZE, QUEUE_DEPTH_BLOCKS};

/// Fill `block` from the queue, keeping queued latency bounded
///
/// If more than [`QUEUE_DEPTH_BLOCKS`] blocks are waiting, the oldest samples
/// are discarded until exactly one block remains. Missing samples are
/// rendered as silence. Returns `(trimmed, underrun)` sample counts.
#[inline]
pub(crate) fn pull_block(queue: &mut Consumer<Sample>, block: &mut [Sample]) -> (usize, usize) {
    let frames = block.len();

    let mut trimmed = 0;
    let queued = queue.slots();
    if queued > frames * QUEUE_DEPTH_BLOCKS {
        trimmed = queued - frames;
        if let Ok(chunk) = queue.read_chunk(trimmed) {
            chunk.commit_all();
        }
    }

    let available = queue.slots().min(frames);
    if let Ok(chunk) = queue.read_chunk(available) {
        let (first, second) = chunk.as_slices();
        block[..first.len()].copy_from_slice(first);
        block[first.len()..available].copy_from_slice(second);
        chunk.commit_all();
    }
    block[available..].fill(0);

    (trimmed, frames - available)
}

/// State moved into the render callback
struct RenderState {
    echo: EchoUnit,
    /// Dry block pulled from the queue
    input: MonoBuffer,
    atomics: Arc<PipelineAtomics>,
}

impl RenderState {
    fn render(&mut self, mut queue: Option<&mut Consumer<Sample>>, out: &mut [Sample]) {
        for chunk in out.chunks_mut(MAX_BUFFER_SIZE) {
            self.input.set_len_from_capacity(chunk.len());
            match queue.as_deref_mut() {
                Some(queue) => {
                    let (trimmed, underrun) = pull_block(queue, self.input.as_mut_slice());
                    if trimmed > 0 {
                        self.atomics.add_trimmed(trimmed);
                    }
                    if underrun > 0 {
                        self.atomics.add_underrun(underrun);
                    }
                }
                None => {
                    self.input.fill_silence();
                    self.atomics.add_underrun(chunk.len());
                }
            }
            self.echo.process(self.input.as_slice(), chunk);
        }
        let peak = out.iter().map(|s| s.unsigned_abs()).max().unwrap_or(0);
        self.atomics.record_render(peak);
    }
}

/// An open output device running the echo
pub struct Player {
    stream: Box<dyn DeviceStream>,
    gate: Arc<CallbackGate>,
    queue: LinkSender<Consumer<Sample>>,
    playing: bool,
}

impl Player {
    /// Open the output device (stopped) with `echo` moved into its callback
    ///
    /// Until [`Player::start`] the device renders silence.
    pub fn open(
        backend: &mut dyn AudioBackend,
        spec: StreamSpec,
        echo: EchoUnit,
        atomics: Arc<PipelineAtomics>,
    ) -> AudioResult<Self> {
        let gate = Arc::new(CallbackGate::new());
        let (queue, mut receiver) = link::<Consumer<Sample>>();
        let mut state = RenderState {
            echo,
            input: MonoBuffer::silence(MAX_BUFFER_SIZE),
            atomics,
        };

        let callback_gate = Arc::clone(&gate);
        let stream = backend.open_output(
            spec,
            Box::new(move |out: &mut [Sample]| {
                receiver.poll();
                let Some(_pass) = callback_gate.enter() else {
                    out.fill(0);
                    return;
                };
                state.render(receiver.current_mut(), out);
            }),
        )?;

        log::debug!(
            "Player opened at {}Hz / {} frames",
            spec.sample_rate,
            spec.frames_per_buffer
        );

        Ok(Self {
            stream,
            gate,
            queue,
            playing: false,
        })
    }

    /// Whether the callback can take another queue consumer now
    pub fn can_attach(&mut self) -> bool {
        self.queue.has_room()
    }

    /// Hand the callback a new queue consumer
    pub fn attach(&mut self, consumer: Consumer<Sample>) {
        if self.queue.send(consumer).is_err() {
            log::warn!("Player link mailbox full, keeping previous queue");
        }
    }

    /// Start rendering
    pub fn start(&mut self) -> AudioResult<()> {
        if self.playing {
            return Ok(());
        }
        self.gate.open();
        if let Err(e) = self.stream.start() {
            self.gate.close();
            return Err(e);
        }
        self.playing = true;
        Ok(())
    }

    /// Stop rendering; no render callback runs the echo after this returns
    pub fn stop(&mut self) {
        if !self.playing {
            return;
        }
        self.gate.close();
        if let Err(e) = self.stream.stop() {
            log::warn!("Failed to pause output stream: {}", e);
        }
        self.queue.collect();
        self.playing = false;
    }

    pub fn is_playing(&self) -> bool {
        self.playing
    }

    /// Number of callbacks that ran the echo
    pub fn blocks_rendered(&self) -> u64 {
        self.gate.passes()
    }
}

impl Drop for Player {
    fn drop(&mut self) {
        self.stop();
    }
}
