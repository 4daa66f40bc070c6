//! # Interactive Commands
//!
//! Line-based user input for a running metronome. A dedicated thread reads
//! stdin and forwards parsed commands to the host loop, which is the only
//! place the scheduler is touched.

use anyhow::{anyhow, bail, Result};
use crossbeam_channel::Receiver;
use std::io::BufRead;
use std::str::FromStr;
use std::thread;
use toolbox_core::TimeSignature;
use tracing::warn;

/// Something the user asked the metronome to do.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Command {
    Tempo(f64),
    TimeSignature(TimeSignature),
    Start,
    Stop,
    Quit,
}

impl FromStr for Command {
    type Err = anyhow::Error;

    fn from_str(line: &str) -> Result<Self> {
        let mut words = line.split_whitespace();
        let verb = words.next().ok_or_else(|| anyhow!("empty command"))?;
        let argument = words.next();

        let command = match (verb.to_ascii_lowercase().as_str(), argument) {
            ("tempo" | "bpm", Some(value)) => Command::Tempo(
                value
                    .parse()
                    .map_err(|_| anyhow!("`{value}` is not a tempo"))?,
            ),
            ("sig" | "meter", Some(value)) => Command::TimeSignature(value.parse()?),
            ("start", None) => Command::Start,
            ("stop", None) => Command::Stop,
            ("quit" | "exit" | "q", None) => Command::Quit,
            _ => bail!("unknown command `{}`", line.trim()),
        };

        if words.next().is_some() {
            bail!("too many arguments in `{}`", line.trim());
        }
        Ok(command)
    }
}

/// Spawns the stdin reader. The channel closes when stdin reaches EOF.
pub fn spawn_stdin_reader() -> Receiver<Command> {
    let (tx, rx) = crossbeam_channel::unbounded();
    thread::spawn(move || {
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            let Ok(line) = line else { break };
            if line.trim().is_empty() {
                continue;
            }
            match line.parse::<Command>() {
                Ok(command) => {
                    if tx.send(command).is_err() {
                        break;
                    }
                }
                Err(e) => warn!("{e}"),
            }
        }
    });
    rx
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_commands() {
        assert_eq!("tempo 96".parse::<Command>().unwrap(), Command::Tempo(96.0));
        assert_eq!("BPM 300".parse::<Command>().unwrap(), Command::Tempo(300.0));
        assert_eq!(
            "sig 6/8".parse::<Command>().unwrap(),
            Command::TimeSignature(TimeSignature::SixEight)
        );
        assert_eq!(" stop ".parse::<Command>().unwrap(), Command::Stop);
        assert_eq!("start".parse::<Command>().unwrap(), Command::Start);
        assert_eq!("q".parse::<Command>().unwrap(), Command::Quit);
    }

    #[test]
    fn rejects_bad_input() {
        assert!("tempo fast".parse::<Command>().is_err());
        assert!("sig 9/8".parse::<Command>().is_err());
        assert!("tempo".parse::<Command>().is_err());
        assert!("stop now".parse::<Command>().is_err());
        assert!("".parse::<Command>().is_err());
    }
}
