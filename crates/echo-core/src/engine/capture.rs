//! Capture path: microphone blocks into the sample queue
//!
//! The capture callback never blocks. Samples that do not fit in the queue
//! are dropped (newest first) and counted as overruns; the render side is
//! responsible for keeping the queue short.

use std::sync::Arc;

use rtrb::Producer;

use super::atomics::PipelineAtomics;
use super::link::{link, LinkSender};
use crate::audio::{AudioBackend, AudioResult, CallbackGate, DeviceStream, StreamSpec};
use crate::types::Sample;

/// Push one captured block into the queue; returns the samples dropped
#[inline]
pub(crate) fn push_block(queue: &mut Producer<Sample>, block: &[Sample]) -> usize {
    let fits = queue.slots().min(block.len());
    if let Ok(chunk) = queue.write_chunk_uninit(fits) {
        chunk.fill_from_iter(block.iter().copied());
    }
    block.len() - fits
}

/// An open input device feeding the sample queue
pub struct Recorder {
    stream: Box<dyn DeviceStream>,
    gate: Arc<CallbackGate>,
    queue: LinkSender<Producer<Sample>>,
    recording: bool,
}

impl Recorder {
    /// Open the input device (stopped)
    pub fn open(
        backend: &mut dyn AudioBackend,
        spec: StreamSpec,
        atomics: Arc<PipelineAtomics>,
    ) -> AudioResult<Self> {
        let gate = Arc::new(CallbackGate::new());
        let (queue, mut receiver) = link::<Producer<Sample>>();

        let callback_gate = Arc::clone(&gate);
        let stream = backend.open_input(
            spec,
            Box::new(move |block: &[Sample]| {
                receiver.poll();
                let Some(_pass) = callback_gate.enter() else {
                    return;
                };
                atomics.record_capture();

                // Nobody is listening yet
                let Some(queue) = receiver.current_mut() else {
                    return;
                };
                let dropped = push_block(queue, block);
                if dropped > 0 {
                    atomics.add_overrun(dropped);
                }
            }),
        )?;

        log::debug!("Recorder opened at {}Hz", spec.sample_rate);

        Ok(Self {
            stream,
            gate,
            queue,
            recording: false,
        })
    }

    /// Whether the callback can take another queue producer now
    pub fn can_attach(&mut self) -> bool {
        self.queue.has_room()
    }

    /// Hand the callback a new queue producer
    pub fn attach(&mut self, producer: Producer<Sample>) {
        if self.queue.send(producer).is_err() {
            log::warn!("Recorder link mailbox full, keeping previous queue");
        }
    }

    /// Start delivering captured blocks
    pub fn start(&mut self) -> AudioResult<()> {
        if self.recording {
            return Ok(());
        }
        self.gate.open();
        if let Err(e) = self.stream.start() {
            self.gate.close();
            return Err(e);
        }
        self.recording = true;
        Ok(())
    }

    /// Stop recording; no capture callback touches the queue after this returns
    pub fn stop(&mut self) {
        if !self.recording {
            return;
        }
        self.gate.close();
        if let Err(e) = self.stream.stop() {
            log::warn!("Failed to pause input stream: {}", e);
        }
        self.queue.collect();
        self.recording = false;
    }

    pub fn is_recording(&self) -> bool {
        self.recording
    }

    /// Number of callbacks that delivered into the pipeline
    pub fn blocks_delivered(&self) -> u64 {
        self.gate.passes()
    }
}

impl Drop for Recorder {
    fn drop(&mut self) {
        self.stop();
    }
}
