//! Command-line arguments

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// Live microphone echo - hear yourself with a configurable delay
#[derive(Parser, Debug)]
#[command(name = "echo")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Config file (default: <config dir>/echo/config.yaml)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List audio input and output devices
    Devices,

    /// Run the live echo on the sound card (headphones required)
    ///
    /// Headphone presence is confirmed once with --headphones and is not
    /// watched afterwards.
    Run(RunArgs),

    /// Run a WAV file through the echo offline
    Render(RenderArgs),
}

/// Echo settings shared by `run` and `render`
#[derive(Args, Debug, Clone, Default)]
pub struct EchoArgs {
    /// Echo delay in milliseconds (0-1000)
    #[arg(short, long)]
    pub delay_ms: Option<u32>,

    /// Echo decay (0.0-1.0)
    #[arg(short = 'k', long)]
    pub decay: Option<f32>,

    /// Block size in frames
    #[arg(short, long)]
    pub frames: Option<u32>,
}

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Confirm headphones are connected (speakers would feed back into the mic)
    ///
    /// Checked once at startup only. If the headphones are unplugged while
    /// the echo runs, it keeps playing through whatever output the system
    /// switches to; type 'toggle' or 'quit' to stop it.
    #[arg(long)]
    pub headphones: bool,

    #[command(flatten)]
    pub echo: EchoArgs,

    /// Sample rate in Hz (default: the output device's native rate)
    #[arg(short = 'r', long)]
    pub sample_rate: Option<u32>,

    /// Output device name
    #[arg(long)]
    pub output: Option<String>,

    /// Input device name
    #[arg(long)]
    pub input: Option<String>,
}

#[derive(Args, Debug)]
pub struct RenderArgs {
    /// Input WAV file
    pub input: PathBuf,

    /// Output WAV file (mono 16-bit)
    pub output: PathBuf,

    #[command(flatten)]
    pub echo: EchoArgs,

    /// Silence appended so the echo can ring out, in milliseconds
    #[arg(long, default_value_t = 1000)]
    pub tail_ms: u32,
}
