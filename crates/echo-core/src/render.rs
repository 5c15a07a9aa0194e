//! Offline rendering of WAV files through the echo pipeline
//!
//! Runs the same engine, player and recorder as live operation, with the
//! [`OfflineBackend`] standing in for the sound card. Input files of any
//! channel count and bit depth are mixed down to mono 16-bit first; the
//! output is always mono 16-bit PCM at the input's sample rate.

use std::path::Path;

use hound::{SampleFormat, WavReader, WavSpec, WavWriter};
use thiserror::Error;

use crate::audio::OfflineBackend;
use crate::engine::{EngineError, EngineManager, PipelineStats};
use crate::params::EchoParameters;
use crate::types::{clamp_sample, ms_to_samples, Sample, DEFAULT_FRAMES_PER_BUFFER, MAX_DELAY_MS};

/// Errors that can occur while rendering a file
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("WAV error: {0}")]
    Wav(#[from] hound::Error),

    #[error("Unsupported WAV format: {0}")]
    UnsupportedFormat(String),

    #[error(transparent)]
    Engine(#[from] EngineError),
}

/// Result type for render operations
pub type RenderResult<T> = Result<T, RenderError>;

/// How to run a render
#[derive(Debug, Clone, Copy)]
pub struct RenderOptions {
    pub params: EchoParameters,
    /// Block size the offline devices run at
    pub frames_per_buffer: u32,
    /// Extra silence rendered after the input so the echo can ring out
    pub tail_ms: u32,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            params: EchoParameters::default(),
            frames_per_buffer: DEFAULT_FRAMES_PER_BUFFER,
            tail_ms: MAX_DELAY_MS,
        }
    }
}

/// What a file render produced
#[derive(Debug, Clone, Copy)]
pub struct RenderSummary {
    pub sample_rate: u32,
    pub input_samples: usize,
    pub output_samples: usize,
    /// Largest absolute output sample
    pub peak: u16,
    pub stats: PipelineStats,
}

/// Read a WAV file as mono 16-bit samples
///
/// Channels are averaged; other bit depths are rescaled to 16 bits.
pub fn read_mono_wav(path: &Path) -> RenderResult<(Vec<Sample>, u32)> {
    let reader = WavReader::open(path)?;
    let spec = reader.spec();
    let channels = spec.channels.max(1) as usize;

    let interleaved: Vec<Sample> = match spec.sample_format {
        SampleFormat::Int => {
            let bits = spec.bits_per_sample as u32;
            if bits == 0 || bits > 32 {
                return Err(RenderError::UnsupportedFormat(format!("{}-bit integer", bits)));
            }
            reader
                .into_samples::<i32>()
                .map(|s| s.map(|v| rescale_to_16(v, bits)))
                .collect::<Result<_, _>>()?
        }
        SampleFormat::Float => reader
            .into_samples::<f32>()
            .map(|s| s.map(|v| clamp_sample(v * 32768.0)))
            .collect::<Result<_, _>>()?,
    };

    let mono = interleaved
        .chunks(channels)
        .map(|frame| {
            let sum: i32 = frame.iter().map(|&s| s as i32).sum();
            (sum / frame.len() as i32) as Sample
        })
        .collect();

    Ok((mono, spec.sample_rate))
}

fn rescale_to_16(value: i32, bits: u32) -> Sample {
    if bits >= 16 {
        (value >> (bits - 16)) as Sample
    } else {
        (value << (16 - bits)) as Sample
    }
}

/// Write mono 16-bit samples as a WAV file
pub fn write_mono_wav(path: &Path, samples: &[Sample], sample_rate: u32) -> RenderResult<()> {
    let spec = WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    };
    let mut writer = WavWriter::create(path, spec)?;
    for &sample in samples {
        writer.write_sample(sample)?;
    }
    writer.finalize()?;
    Ok(())
}

/// Run `input` through a fresh engine on offline devices
///
/// Returns `input.len()` plus the tail worth of output samples.
pub fn render_samples(
    input: &[Sample],
    sample_rate: u32,
    options: &RenderOptions,
) -> RenderResult<(Vec<Sample>, PipelineStats)> {
    let backend = OfflineBackend::new();
    let clock = backend.clock();
    let mut manager = EngineManager::new(Box::new(backend));

    manager.create_engine(
        sample_rate,
        options.frames_per_buffer,
        options.params.delay_ms,
        options.params.decay,
    )?;
    manager.start_echo()?;

    let total = input.len() + ms_to_samples(options.tail_ms, sample_rate) as usize;
    let frames = options.frames_per_buffer as usize;
    clock.feed(input);
    clock.run(total.div_ceil(frames));

    let stats = manager.pipeline_atomics()?.stats();
    manager.stop_echo();
    manager.delete_engine();

    let mut output = clock.take_rendered();
    output.truncate(total);
    Ok((output, stats))
}

/// Render a WAV file through the echo into a mono 16-bit WAV file
pub fn render_file(input: &Path, output: &Path, options: &RenderOptions) -> RenderResult<RenderSummary> {
    let (samples, sample_rate) = read_mono_wav(input)?;
    log::info!(
        "Rendering {} ({} samples @ {}Hz) with echo {}ms / {:.2}",
        input.display(),
        samples.len(),
        sample_rate,
        options.params.delay_ms,
        options.params.decay
    );

    let (rendered, stats) = render_samples(&samples, sample_rate, options)?;
    write_mono_wav(output, &rendered, sample_rate)?;

    log::info!("Wrote {} ({} samples)", output.display(), rendered.len());

    Ok(RenderSummary {
        sample_rate,
        input_samples: samples.len(),
        output_samples: rendered.len(),
        peak: rendered.iter().map(|s| s.unsigned_abs()).max().unwrap_or(0),
        stats,
    })
}
