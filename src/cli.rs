//! Command-line argument parsing.

use clap::Parser;
use std::path::PathBuf;

/// Command line arguments
#[derive(Parser, Debug)]
#[command(name = "cue-timer")]
#[command(about = "Hear handheld beep cues and time manips against them", long_about = None)]
pub struct Args {
    /// JSON config file; every field is optional
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Input device ID (see --list-sources); default microphone if omitted
    #[arg(long, value_name = "ID")]
    pub source: Option<String>,

    /// Timing option name, overriding the config file
    #[arg(long, value_name = "NAME")]
    pub timing: Option<String>,

    /// Write every analysed frame to this JSON file on exit
    #[arg(long, value_name = "PATH")]
    pub capture: Option<PathBuf>,

    /// Beep on each lead-up beat
    #[arg(long)]
    pub metronome: bool,

    /// List input devices and exit
    #[arg(long)]
    pub list_sources: bool,

    /// List timing options and exit
    #[arg(long)]
    pub list_timings: bool,
}
