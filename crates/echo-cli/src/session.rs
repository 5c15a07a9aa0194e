//! Live echo session on the sound card

use std::time::Duration;

use anyhow::{bail, Context, Result};
use crossbeam::channel::{never, select, tick, Receiver};

use echo_core::audio::{AudioBackend, CpalBackend, DeviceId};
use echo_core::config::EchoConfig;
use echo_core::engine::PipelineAtomics;
use echo_core::{EchoParameters, EngineManager, EngineState};

use crate::cli::RunArgs;
use crate::control::{parse_command, spawn_stdin_reader, ControlCommand, HELP};

/// Merge command-line overrides into the file configuration
pub fn apply_overrides(mut config: EchoConfig, args: &RunArgs) -> EchoConfig {
    if let Some(name) = &args.output {
        config.audio.devices.output_device = Some(DeviceId::new(name.as_str()));
    }
    if let Some(name) = &args.input {
        config.audio.devices.input_device = Some(DeviceId::new(name.as_str()));
    }
    if let Some(rate) = args.sample_rate {
        config.audio.sample_rate = Some(rate);
    }
    if let Some(frames) = args.echo.frames {
        config.audio.frames_per_buffer = Some(frames);
    }
    config.echo = EchoParameters::new(
        args.echo.delay_ms.unwrap_or(config.echo.delay_ms),
        args.echo.decay.unwrap_or(config.echo.decay),
    );
    config
}

pub fn run(args: RunArgs, config: EchoConfig) -> Result<()> {
    if !args.headphones {
        bail!(
            "Refusing to start without headphones: the speaker would feed back into the \
             microphone. Connect headphones and pass --headphones."
        );
    }

    let config = apply_overrides(config, &args);
    let backend = CpalBackend::new(config.audio.devices.clone());
    let native = backend
        .native_properties()
        .context("Failed to query the output device")?;
    let spec = config.audio.resolve(native);

    log::info!(
        "Output device native: {}Hz / {:?} frames, running at {}Hz / {} frames",
        native.sample_rate,
        native.frames_per_buffer,
        spec.sample_rate,
        spec.frames_per_buffer
    );

    let mut manager = EngineManager::new(Box::new(backend));
    manager
        .create_engine(
            spec.sample_rate,
            spec.frames_per_buffer,
            config.echo.delay_ms,
            config.echo.decay,
        )
        .context("Failed to create the echo engine")?;
    manager.start_echo().context("Failed to start the echo")?;

    let atomics = manager.pipeline_atomics()?;
    println!(
        "Echo running: {}ms delay, decay {:.2}. Type 'help' for commands.",
        config.echo.delay_ms, config.echo.decay
    );

    let lines = spawn_stdin_reader()?;
    let ticker = match config.stats_interval_ms {
        0 => never(),
        ms => tick(Duration::from_millis(ms)),
    };

    let result = command_loop(&mut manager, &atomics, &lines, &ticker);

    manager.stop_echo();
    manager.delete_engine();
    println!("Final: {}", atomics.stats());
    result
}

fn command_loop(
    manager: &mut EngineManager,
    atomics: &PipelineAtomics,
    lines: &Receiver<String>,
    ticker: &Receiver<std::time::Instant>,
) -> Result<()> {
    loop {
        select! {
            recv(lines) -> line => {
                let Ok(line) = line else {
                    log::info!("stdin closed, stopping");
                    return Ok(());
                };
                match parse_command(&line) {
                    Ok(Some(ControlCommand::Quit)) => return Ok(()),
                    Ok(Some(command)) => handle(manager, atomics, command),
                    Ok(None) => {}
                    Err(e) => println!("{:#}", e),
                }
            }
            recv(ticker) -> _ => {
                if manager.state() == EngineState::Active {
                    println!("{}", atomics.stats());
                }
            }
        }
    }
}

fn handle(manager: &mut EngineManager, atomics: &PipelineAtomics, command: ControlCommand) {
    let current = match manager.echo_parameters() {
        Ok(params) => params,
        Err(e) => {
            println!("{}", e);
            return;
        }
    };

    match command {
        ControlCommand::Delay(delay_ms) => match manager.configure_echo(delay_ms, current.decay) {
            Ok(()) => println!("delay {}ms", delay_ms),
            Err(e) => println!("{}", e),
        },
        ControlCommand::Decay(decay) => match manager.configure_echo(current.delay_ms, decay) {
            Ok(()) => println!("decay {:.2}", decay),
            Err(e) => println!("{}", e),
        },
        ControlCommand::Toggle => {
            if manager.state() == EngineState::Active {
                manager.stop_echo();
                println!("echo stopped");
            } else {
                match manager.start_echo() {
                    Ok(()) => println!("echo started"),
                    Err(e) => println!("{}", e),
                }
            }
        }
        ControlCommand::Stats => println!("{:?} {}", manager.state(), atomics.stats()),
        ControlCommand::Help => println!("{}", HELP),
        ControlCommand::Quit => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::EchoArgs;
    use echo_core::audio::OfflineBackend;

    fn run_args() -> RunArgs {
        RunArgs {
            headphones: true,
            echo: EchoArgs::default(),
            sample_rate: None,
            output: None,
            input: None,
        }
    }

    #[test]
    fn test_refuses_without_headphones() {
        let args = RunArgs {
            headphones: false,
            ..run_args()
        };
        let err = run(args, EchoConfig::default()).unwrap_err();
        assert!(err.to_string().contains("--headphones"));
    }

    #[test]
    fn test_overrides_replace_config_values() {
        let args = RunArgs {
            echo: EchoArgs {
                delay_ms: Some(400),
                decay: None,
                frames: Some(256),
            },
            output: Some("Headphones".to_string()),
            ..run_args()
        };
        let config = apply_overrides(EchoConfig::default(), &args);
        assert_eq!(config.echo.delay_ms, 400);
        assert_eq!(config.echo.decay, EchoParameters::default().decay);
        assert_eq!(config.audio.frames_per_buffer, Some(256));
        assert_eq!(config.audio.devices.output_device, Some(DeviceId::new("Headphones")));
        assert_eq!(config.audio.devices.input_device, None);
    }

    #[test]
    fn test_handle_commands() {
        let mut manager = EngineManager::new(Box::new(OfflineBackend::new()));
        manager.create_engine(48000, 192, 100, 0.2).unwrap();
        manager.start_echo().unwrap();
        let atomics = manager.pipeline_atomics().unwrap();

        handle(&mut manager, &atomics, ControlCommand::Delay(250));
        handle(&mut manager, &atomics, ControlCommand::Decay(0.6));
        assert_eq!(manager.echo_parameters().unwrap(), EchoParameters::new(250, 0.6));

        // Out of range: reported, previous value kept
        handle(&mut manager, &atomics, ControlCommand::Decay(3.0));
        assert_eq!(manager.echo_parameters().unwrap().decay, 0.6);

        handle(&mut manager, &atomics, ControlCommand::Toggle);
        assert_eq!(manager.state(), EngineState::Ready);
        handle(&mut manager, &atomics, ControlCommand::Toggle);
        assert_eq!(manager.state(), EngineState::Active);
    }
}
