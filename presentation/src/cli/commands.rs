//! CLI command definitions

use clap::{Parser, ValueEnum};
use std::path::PathBuf;

/// Output format for session events
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Colored, human-readable lines
    Text,
    /// One JSON object per line
    Json,
}

/// CLI arguments for voxlink
#[derive(Parser, Debug)]
#[command(name = "voxlink")]
#[command(author, version, about = "Voice and text channel client running against a simulated backend")]
#[command(long_about = r#"
voxlink logs an account in, joins a channel, exchanges text messages and
pages through chat history, printing every state change along the way.

Configuration files are loaded from (in priority order):
1. VOXLINK_* environment variables (e.g. VOXLINK_BACKEND__LATENCY_TICKS=3)
2. --config <path>     Explicit config file
3. ./voxlink.toml      Project-level config
4. ~/.config/voxlink/config.toml   Global config

Example:
  voxlink
  voxlink --account dave --channel standup -m "morning" -m "anything blocking?"
  voxlink --positional --history 40 -vv
"#)]
pub struct Cli {
    /// Account name to log in as
    #[arg(short, long, default_value = "alice")]
    pub account: String,

    /// Display name announced at login
    #[arg(long, value_name = "NAME")]
    pub display_name: Option<String>,

    /// Channel to join
    #[arg(short, long, default_value = "lobby")]
    pub channel: String,

    /// Join as a positional (3D) channel
    #[arg(long)]
    pub positional: bool,

    /// Join the text stream only
    #[arg(long, conflicts_with = "audio_only")]
    pub text_only: bool,

    /// Join the audio stream only
    #[arg(long)]
    pub audio_only: bool,

    /// Messages to send once connected (can be specified multiple times)
    #[arg(short, long, value_name = "TEXT")]
    pub message: Vec<String>,

    /// Number of history messages to fetch
    #[arg(long, default_value_t = 15, value_name = "COUNT")]
    pub history: u32,

    /// Only fetch history containing this text
    #[arg(long, value_name = "TEXT")]
    pub search: Option<String>,

    /// Turn on transcription while connected
    #[arg(long)]
    pub transcribe: bool,

    /// Output format
    #[arg(short, long, value_enum, default_value = "text")]
    pub output: OutputFormat,

    /// Verbosity level (-v = info, -vv = debug, -vvv = trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Write diagnostic logs to this file instead of stderr
    #[arg(long, value_name = "PATH")]
    pub log_file: Option<PathBuf>,

    /// Write the protocol exchange as JSONL to this file
    #[arg(long, value_name = "PATH")]
    pub protocol_log: Option<PathBuf>,

    /// Disable colored output
    #[arg(long)]
    pub no_color: bool,

    /// Path to configuration file
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Disable loading of configuration files
    #[arg(long)]
    pub no_config: bool,

    /// Show configuration file locations and exit
    #[arg(long)]
    pub show_config: bool,
}
