//! Live commands typed on stdin while the echo runs

use std::io::BufRead;
use std::thread;

use anyhow::{anyhow, bail, Context, Result};
use crossbeam::channel::{self, Receiver};

/// One line of user input
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ControlCommand {
    /// Set the echo delay in milliseconds
    Delay(u32),
    /// Set the echo decay
    Decay(f32),
    /// Start the echo if stopped, stop it if running
    Toggle,
    /// Print pipeline statistics now
    Stats,
    Help,
    Quit,
}

pub const HELP: &str = "\
commands:
  delay <ms>     set echo delay (0-1000)
  decay <x>      set echo decay (0.0-1.0)
  toggle         start/stop the echo
  stats          print pipeline statistics
  quit           stop and exit";

/// Parse a command line; blank lines yield `None`
pub fn parse_command(line: &str) -> Result<Option<ControlCommand>> {
    let mut words = line.split_whitespace();
    let Some(verb) = words.next() else {
        return Ok(None);
    };

    let mut argument = |name: &str| {
        words
            .next()
            .ok_or_else(|| anyhow!("'{}' needs a value", name))
            .map(str::to_owned)
    };

    let command = match verb.to_ascii_lowercase().as_str() {
        "delay" | "d" => {
            let value = argument("delay")?;
            ControlCommand::Delay(
                value
                    .parse()
                    .with_context(|| format!("invalid delay '{}'", value))?,
            )
        }
        "decay" | "k" => {
            let value = argument("decay")?;
            ControlCommand::Decay(
                value
                    .parse()
                    .with_context(|| format!("invalid decay '{}'", value))?,
            )
        }
        "toggle" | "t" => ControlCommand::Toggle,
        "stats" | "s" => ControlCommand::Stats,
        "help" | "h" | "?" => ControlCommand::Help,
        "quit" | "q" | "exit" => ControlCommand::Quit,
        other => bail!("unknown command '{}' (try 'help')", other),
    };
    Ok(Some(command))
}

/// Read stdin lines on a background thread
///
/// The channel disconnects when stdin closes.
pub fn spawn_stdin_reader() -> Result<Receiver<String>> {
    let (sender, receiver) = channel::bounded(16);
    thread::Builder::new()
        .name("stdin-reader".to_string())
        .spawn(move || {
            let stdin = std::io::stdin();
            for line in stdin.lock().lines() {
                let Ok(line) = line else { break };
                if sender.send(line).is_err() {
                    break;
                }
            }
            log::debug!("stdin closed");
        })
        .context("Failed to spawn stdin reader thread")?;
    Ok(receiver)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_commands() {
        assert_eq!(parse_command("delay 300").unwrap(), Some(ControlCommand::Delay(300)));
        assert_eq!(parse_command("  DECAY 0.25 ").unwrap(), Some(ControlCommand::Decay(0.25)));
        assert_eq!(parse_command("t").unwrap(), Some(ControlCommand::Toggle));
        assert_eq!(parse_command("stats").unwrap(), Some(ControlCommand::Stats));
        assert_eq!(parse_command("q").unwrap(), Some(ControlCommand::Quit));
        assert_eq!(parse_command("   ").unwrap(), None);
    }

    #[test]
    fn test_parse_errors() {
        assert!(parse_command("delay").is_err());
        assert!(parse_command("delay soon").is_err());
        assert!(parse_command("delay -5").is_err());
        assert!(parse_command("louder").is_err());
    }
}
