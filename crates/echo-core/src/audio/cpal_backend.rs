//! CPAL audio backend implementation
//!
//! Opens one capture stream and one playback stream on (possibly different)
//! devices. CPAL runs each on its own audio thread, so the two callbacks
//! never call each other; the engine joins them with a lock-free queue.
//!
//! ```text
//! ┌──────────────────┐   i16 mono    ┌─────────────────────┐
//! │  Input callback  │──────────────►│  CaptureCallback    │── push ─► SPSC queue
//! │ (any format/ch.) │  ch. 0 only   └─────────────────────┘
//! └──────────────────┘
//!                                    ┌─────────────────────┐
//! ┌──────────────────┐   i16 mono    │  RenderCallback     │◄─ pop ─── SPSC queue
//! │ Output callback  │◄──────────────│  (runs the echo)    │
//! │ (any format/ch.) │ all channels  └─────────────────────┘
//! └──────────────────┘
//! ```
//!
//! Devices are opened with 16-bit integer samples when offered, otherwise
//! 32-bit float with conversion in the callback. Conversion buffers are
//! allocated when the stream is built, never inside the callback.

use cpal::traits::{DeviceTrait, StreamTrait};
use cpal::{
    BufferSize as CpalBufferSize, BuildStreamError, FromSample, Sample as CpalSample, SampleFormat,
    SizedSample, Stream, StreamConfig, SupportedBufferSize, SupportedStreamConfigRange,
};

use super::backend::{AudioBackend, CaptureCallback, DeviceStream, RenderCallback};
use super::config::{DeviceSelection, NativeAudioProperties, StreamSpec};
use super::device::{resolve_device, DeviceDirection};
use super::error::{AudioError, AudioResult};
use crate::types::{MonoBuffer, Sample, DEFAULT_FRAMES_PER_BUFFER, MAX_BUFFER_SIZE};

/// Device provider backed by CPAL
pub struct CpalBackend {
    selection: DeviceSelection,
}

impl CpalBackend {
    pub fn new(selection: DeviceSelection) -> Self {
        Self { selection }
    }

    fn output_device(&self) -> AudioResult<cpal::Device> {
        resolve_device(self.selection.output_device.as_ref(), DeviceDirection::Output)
    }

    fn input_device(&self) -> AudioResult<cpal::Device> {
        resolve_device(self.selection.input_device.as_ref(), DeviceDirection::Input)
    }
}

impl AudioBackend for CpalBackend {
    fn name(&self) -> String {
        format!("cpal/{}", super::device::host_name(cpal::default_host().id()))
    }

    fn native_properties(&self) -> AudioResult<NativeAudioProperties> {
        let device = self.output_device()?;
        let config = device
            .default_output_config()
            .map_err(|e| AudioError::ConfigError(e.to_string()))?;

        let frames_per_buffer = match config.buffer_size() {
            SupportedBufferSize::Range { min, max } => {
                Some(DEFAULT_FRAMES_PER_BUFFER.clamp(*min, (*max).max(*min)))
            }
            SupportedBufferSize::Unknown => None,
        };

        Ok(NativeAudioProperties {
            sample_rate: config.sample_rate().0,
            frames_per_buffer,
        })
    }

    fn check_config(&self, spec: StreamSpec) -> AudioResult<()> {
        let device = self.output_device()?;
        let ranges = output_ranges(&device)?;
        pick_stream_config(&ranges, spec, 1).map(|_| ())
    }

    fn open_output(
        &mut self,
        spec: StreamSpec,
        render: RenderCallback,
    ) -> AudioResult<Box<dyn DeviceStream>> {
        let device = self.output_device()?;
        let device_name = device.name().unwrap_or_else(|_| "Unknown".to_string());
        let ranges = output_ranges(&device)?;
        let (config, format) = pick_stream_config(&ranges, spec, 1)?;

        log::info!(
            "Output device: {} ({} channels, {}Hz, {} frames, {:?}, ~{:.1}ms)",
            device_name,
            config.channels,
            spec.sample_rate,
            spec.frames_per_buffer,
            format,
            spec.latency_ms()
        );

        let stream = match format {
            SampleFormat::I16 => build_output_stream::<i16>(&device, &config, render)?,
            SampleFormat::F32 => build_output_stream::<f32>(&device, &config, render)?,
            other => return Err(AudioError::UnsupportedFormat(format!("{:?}", other))),
        };

        Ok(Box::new(CpalStream::paused(stream, "output")))
    }

    fn open_input(
        &mut self,
        spec: StreamSpec,
        capture: CaptureCallback,
    ) -> AudioResult<Box<dyn DeviceStream>> {
        let device = self.input_device()?;
        let device_name = device.name().unwrap_or_else(|_| "Unknown".to_string());
        let ranges: Vec<_> = device
            .supported_input_configs()
            .map_err(|e| AudioError::ConfigError(e.to_string()))?
            .collect();
        let (config, format) = pick_stream_config(&ranges, spec, 1)?;

        log::info!(
            "Input device: {} ({} channels, {}Hz, {} frames, {:?})",
            device_name,
            config.channels,
            spec.sample_rate,
            spec.frames_per_buffer,
            format
        );

        let stream = match format {
            SampleFormat::I16 => build_input_stream::<i16>(&device, &config, capture)?,
            SampleFormat::F32 => build_input_stream::<f32>(&device, &config, capture)?,
            other => return Err(AudioError::UnsupportedFormat(format!("{:?}", other))),
        };

        Ok(Box::new(CpalStream::paused(stream, "input")))
    }
}

fn output_ranges(device: &cpal::Device) -> AudioResult<Vec<SupportedStreamConfigRange>> {
    Ok(device
        .supported_output_configs()
        .map_err(|e| AudioError::ConfigError(e.to_string()))?
        .collect())
}

/// Rank a sample format: native 16-bit first, float second, others unusable
fn format_rank(format: SampleFormat) -> Option<u8> {
    match format {
        SampleFormat::I16 => Some(0),
        SampleFormat::F32 => Some(1),
        _ => None,
    }
}

fn buffer_fits(size: &SupportedBufferSize, frames: u32) -> bool {
    match size {
        SupportedBufferSize::Range { min, max } => (*min..=*max).contains(&frames),
        SupportedBufferSize::Unknown => true,
    }
}

/// Pick the best stream config for `spec` from a device's supported ranges
///
/// Requires the exact sample rate and block size; prefers i16 over f32 and
/// channel counts close to `channels`.
fn pick_stream_config(
    ranges: &[SupportedStreamConfigRange],
    spec: StreamSpec,
    channels: u16,
) -> AudioResult<(StreamConfig, SampleFormat)> {
    let unsupported = |reason: &str| AudioError::UnsupportedConfig {
        sample_rate: spec.sample_rate,
        frames_per_buffer: spec.frames_per_buffer,
        reason: reason.to_string(),
    };

    if ranges.is_empty() {
        return Err(unsupported("device reports no configurations"));
    }
    if spec.frames_per_buffer == 0 || spec.frames_per_buffer as usize > MAX_BUFFER_SIZE {
        return Err(unsupported("buffer size out of range"));
    }

    let rate = cpal::SampleRate(spec.sample_rate);
    let at_rate: Vec<_> = ranges
        .iter()
        .filter(|c| c.min_sample_rate() <= rate && rate <= c.max_sample_rate())
        .collect();
    if at_rate.is_empty() {
        return Err(unsupported("sample rate not offered by device"));
    }

    let best = at_rate
        .iter()
        .filter(|c| buffer_fits(c.buffer_size(), spec.frames_per_buffer))
        .filter_map(|c| format_rank(c.sample_format()).map(|rank| (rank, c)))
        .min_by_key(|(rank, c)| (*rank, c.channels().abs_diff(channels)))
        .map(|(_, c)| *c)
        .ok_or_else(|| unsupported("no 16-bit or float config with this buffer size"))?;

    log::debug!(
        "Selected config: {} channels, {:?} for {}Hz / {} frames",
        best.channels(),
        best.sample_format(),
        spec.sample_rate,
        spec.frames_per_buffer
    );

    Ok((
        StreamConfig {
            channels: best.channels(),
            sample_rate: rate,
            buffer_size: CpalBufferSize::Fixed(spec.frames_per_buffer),
        },
        best.sample_format(),
    ))
}

fn map_build_error(error: BuildStreamError) -> AudioError {
    match error {
        BuildStreamError::DeviceNotAvailable => AudioError::DeviceBusy(error.to_string()),
        BuildStreamError::StreamConfigNotSupported => AudioError::UnsupportedConfig {
            sample_rate: 0,
            frames_per_buffer: 0,
            reason: error.to_string(),
        },
        other => AudioError::StreamBuildError(other.to_string()),
    }
}

/// Build the playback stream
///
/// The render callback fills a mono i16 block, which is written to every
/// device channel.
fn build_output_stream<T>(
    device: &cpal::Device,
    config: &StreamConfig,
    mut render: RenderCallback,
) -> AudioResult<Stream>
where
    T: SizedSample + FromSample<Sample>,
{
    let channels = config.channels.max(1) as usize;
    let mut block = MonoBuffer::silence(MAX_BUFFER_SIZE);

    device
        .build_output_stream(
            config,
            move |data: &mut [T], _info: &cpal::OutputCallbackInfo| {
                let n_frames = (data.len() / channels).min(MAX_BUFFER_SIZE);
                block.set_len_from_capacity(n_frames);
                render(block.as_mut_slice());

                let mut frames = data.chunks_mut(channels);
                for (frame, &sample) in (&mut frames).zip(block.as_slice()) {
                    frame.fill(T::from_sample(sample));
                }
                // Anything past MAX_BUFFER_SIZE frames stays silent
                for frame in frames {
                    frame.fill(T::EQUILIBRIUM);
                }
            },
            move |err| {
                log::error!("Output audio stream error: {}", err);
            },
            None,
        )
        .map_err(map_build_error)
}

/// Build the capture stream
///
/// Only the first channel of a multi-channel device is used.
fn build_input_stream<T>(
    device: &cpal::Device,
    config: &StreamConfig,
    mut capture: CaptureCallback,
) -> AudioResult<Stream>
where
    T: SizedSample,
    Sample: FromSample<T>,
{
    let channels = config.channels.max(1) as usize;
    let mut block = MonoBuffer::silence(MAX_BUFFER_SIZE);

    device
        .build_input_stream(
            config,
            move |data: &[T], _info: &cpal::InputCallbackInfo| {
                for chunk in data.chunks(channels * MAX_BUFFER_SIZE) {
                    block.set_len_from_capacity(chunk.len() / channels);
                    for (dst, frame) in block.as_mut_slice().iter_mut().zip(chunk.chunks(channels)) {
                        *dst = Sample::from_sample(frame[0]);
                    }
                    capture(block.as_slice());
                }
            },
            move |err| {
                log::error!("Input audio stream error: {}", err);
            },
            None,
        )
        .map_err(map_build_error)
}

/// A CPAL stream behind the backend-neutral interface
struct CpalStream {
    stream: Stream,
    label: &'static str,
}

impl CpalStream {
    /// Wrap a freshly built stream, making sure it is not running yet
    fn paused(stream: Stream, label: &'static str) -> Self {
        // Some hosts start streams on build
        if let Err(e) = stream.pause() {
            log::debug!("Could not pause new {} stream: {}", label, e);
        }
        Self { stream, label }
    }
}

impl DeviceStream for CpalStream {
    fn start(&mut self) -> AudioResult<()> {
        self.stream
            .play()
            .map_err(|e| AudioError::StreamPlayError(format!("{}: {}", self.label, e)))
    }

    fn stop(&mut self) -> AudioResult<()> {
        self.stream
            .pause()
            .map_err(|e| AudioError::StreamError(format!("{}: {}", self.label, e)))
    }
}
