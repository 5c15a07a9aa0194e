//! Echo - live microphone echo from the command line
//!
//! ## Subcommands
//!
//! - `devices`: list input and output devices
//! - `run --headphones`: run the echo live; type commands while it runs
//! - `render <in.wav> <out.wav>`: run a file through the echo offline

mod cli;
mod control;
mod session;

use anyhow::{Context, Result};
use clap::Parser;

use echo_core::audio::{get_devices, AudioDevice, AudioError, DeviceDirection};
use echo_core::config::{default_config_path, load_config, EchoConfig};
use echo_core::render::{render_file, RenderOptions};
use echo_core::{EchoParameters, DEFAULT_FRAMES_PER_BUFFER};

use cli::{Cli, Commands, RenderArgs};

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logger - set RUST_LOG=debug for verbose output
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let config_path = cli.config.clone().unwrap_or_else(default_config_path);
    let config: EchoConfig = load_config::<EchoConfig>(&config_path).sanitized();

    match cli.command {
        Commands::Devices => list_devices(),
        Commands::Run(args) => session::run(args, config),
        Commands::Render(args) => render(args, config),
    }
}

fn print_devices(title: &str, devices: &[AudioDevice]) {
    println!("{}:", title);
    for device in devices {
        let marker = if device.is_default { "*" } else { " " };
        let rates: Vec<String> = device.sample_rates.iter().map(|r| r.to_string()).collect();
        println!(
            " {} {}  ({} ch, {} Hz)",
            marker,
            device,
            device.max_channels,
            rates.join("/")
        );
    }
    println!();
}

fn list_devices() -> Result<()> {
    for (title, direction) in [
        ("Input devices", DeviceDirection::Input),
        ("Output devices", DeviceDirection::Output),
    ] {
        match get_devices(direction) {
            Ok(devices) => print_devices(title, &devices),
            Err(AudioError::NoDevices(_)) => println!("{}: none\n", title),
            Err(e) => return Err(e).context("Failed to enumerate audio devices"),
        }
    }
    println!("* = system default");
    Ok(())
}

fn render(args: RenderArgs, config: EchoConfig) -> Result<()> {
    let params = EchoParameters::new(
        args.echo.delay_ms.unwrap_or(config.echo.delay_ms),
        args.echo.decay.unwrap_or(config.echo.decay),
    );
    params.validate()?;

    let options = RenderOptions {
        params,
        frames_per_buffer: args
            .echo
            .frames
            .or(config.audio.frames_per_buffer)
            .unwrap_or(DEFAULT_FRAMES_PER_BUFFER),
        tail_ms: args.tail_ms,
    };

    let summary = render_file(&args.input, &args.output, &options)
        .with_context(|| format!("Failed to render {}", args.input.display()))?;

    println!(
        "Rendered {} -> {} ({} samples @ {}Hz, peak {}, {} underrun samples)",
        args.input.display(),
        args.output.display(),
        summary.output_samples,
        summary.sample_rate,
        summary.peak,
        summary.stats.underrun_samples
    );
    Ok(())
}
