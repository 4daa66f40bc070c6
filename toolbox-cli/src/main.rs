//! # Toolbox - Metronome and Tuner Host
//!
//! Command-line host for the toolbox core. It owns the event loop and the
//! user-facing surface; all timing and pitch logic lives in `toolbox-core`.
//!
//! ## Architecture
//! - **Main Thread**: crossbeam `select!` loop driving the core's periodic callbacks
//! - **Audio Threads**: owned by CPAL; talk to the main loop over channels
//! - **Input Thread**: reads interactive metronome commands from stdin
//! - **Output**: beat/note lines on stdout (text or JSON lines), logs on stderr

mod commands;
mod metronome;
mod render;
mod tuner;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;
use toolbox_core::{TempoState, TimeSignature, ToolboxConfig};
use tracing::{Level, debug};
use tracing_subscriber::util::SubscriberInitExt;

use render::{OutputMode, Renderer};

/// Practice toolbox: look-ahead metronome and real-time tuner
#[derive(Parser)]
#[command(name = "toolbox")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// JSON file with `metronome` and/or `tuner` settings
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Emit JSON lines instead of text
    #[arg(long, global = true)]
    json: bool,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Play a click track. Type `tempo N`, `sig N/D`, `start`, `stop` or `quit` while it runs
    Metronome {
        /// Tempo in beats per minute (clamped to 40..=240)
        #[arg(short, long, default_value_t = 120)]
        bpm: u32,

        /// Time signature: 1/4, 2/4, 3/4, 4/4, 5/4, 6/8 or 7/8
        #[arg(short = 's', long, default_value = "4/4")]
        time_signature: TimeSignature,

        /// Stop after this many seconds
        #[arg(short, long)]
        duration: Option<f64>,
    },

    /// Listen to the microphone and show the nearest note
    Tuner {
        /// Stop after this many seconds
        #[arg(short, long)]
        duration: Option<f64>,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    setup_logging(cli.verbose);

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn setup_logging(verbosity: u8) {
    let level = match verbosity {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(io::stderr)
        .compact()
        .finish()
        .init();
}

fn run(cli: Cli) -> Result<()> {
    let config = match &cli.config {
        Some(path) => load_config(path)?,
        None => ToolboxConfig::default(),
    };
    let mode = if cli.json {
        OutputMode::Json
    } else {
        OutputMode::Text
    };
    let mut renderer = Renderer::new(io::stdout().lock(), mode);

    match cli.command {
        Commands::Metronome {
            bpm,
            time_signature,
            duration,
        } => {
            let tempo = TempoState::new(bpm as f64, time_signature);
            metronome::run(
                config.metronome,
                tempo,
                seconds(duration)?,
                &mut renderer,
            )
        }
        Commands::Tuner { duration } => tuner::run(config.tuner, seconds(duration)?, &mut renderer),
    }
}

fn load_config(path: &Path) -> Result<ToolboxConfig> {
    let data = fs::read_to_string(path)
        .with_context(|| format!("failed to read config {}", path.display()))?;
    let config = serde_json::from_str(&data)
        .with_context(|| format!("invalid config {}", path.display()))?;
    debug!(?config, "loaded config");
    Ok(config)
}

fn seconds(duration: Option<f64>) -> Result<Option<Duration>> {
    duration
        .map(|secs| Duration::try_from_secs_f64(secs).context("duration must be a non-negative number of seconds"))
        .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_parses_metronome_flags() {
        let cli = Cli::try_parse_from(["toolbox", "--json", "metronome", "-b", "90", "-s", "7/8"]).unwrap();
        assert!(cli.json);
        match cli.command {
            Commands::Metronome {
                bpm,
                time_signature,
                duration,
            } => {
                assert_eq!(bpm, 90);
                assert_eq!(time_signature, TimeSignature::SevenEight);
                assert!(duration.is_none());
            }
            Commands::Tuner { .. } => panic!("expected metronome"),
        }
    }

    #[test]
    fn cli_rejects_unknown_time_signature() {
        assert!(Cli::try_parse_from(["toolbox", "metronome", "-s", "9/8"]).is_err());
    }

    #[test]
    fn negative_duration_is_an_error() {
        assert!(seconds(Some(-1.0)).is_err());
        assert_eq!(seconds(Some(1.5)).unwrap(), Some(Duration::from_millis(1500)));
        assert_eq!(seconds(None).unwrap(), None);
    }
}
