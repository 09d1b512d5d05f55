//! Command definitions for the playd CLI.
//!
//! Uses clap derive macro for argument parsing.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

// ============================================================================
// CLI Structure
// ============================================================================

/// playd - background music player
#[derive(Parser, Debug)]
#[command(
    name = "playd",
    version,
    about = "バックグラウンド音楽プレイヤー",
    long_about = "音楽フォルダの曲を順番に再生するデーモンと、その操作用CLI。\n\
                  'playd daemon' で起動し、他のサブコマンドで操作します。",
    propagate_version = true
)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Enable verbose output for debugging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Daemon socket path (default: ~/.playd/playd.sock)
    #[arg(short, long, global = true, value_name = "PATH")]
    pub socket: Option<PathBuf>,
}

// ============================================================================
// Subcommands
// ============================================================================

/// Available subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Run the playback daemon in the foreground
    Daemon(DaemonArgs),

    /// Start or resume playback
    Play,

    /// Pause playback
    Pause,

    /// Stop playback
    Stop,

    /// Skip to the next track
    Next,

    /// Go back to the previous track
    #[command(visible_alias = "previous")]
    Prev,

    /// Play the track at the given position (0-based, see 'list')
    Select {
        /// Track number
        index: usize,
    },

    /// Show current playback status
    Status,

    /// List the tracks in the playlist
    List,

    /// Follow playback events until interrupted
    Watch,

    /// Stop playback and terminate the daemon
    Shutdown,

    /// Generate shell completion scripts
    Completions {
        /// Shell type for completion script
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

// ============================================================================
// Daemon Command Arguments
// ============================================================================

/// Arguments for the daemon command. Each one overrides the config file.
#[derive(Args, Debug, Clone, Default)]
pub struct DaemonArgs {
    /// Music directory to scan
    #[arg(short, long, value_name = "DIR")]
    pub dir: Option<PathBuf>,

    /// Track to start on
    #[arg(short, long)]
    pub index: Option<usize>,

    /// Do not start playing on launch
    #[arg(long)]
    pub no_autoplay: bool,

    /// Exit after this many seconds without playback (0 = never)
    #[arg(long, value_name = "SECS")]
    pub idle_exit: Option<u64>,

    /// Config file (default: ~/.playd/config.json)
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,
}

// ============================================================================
// Tests
// ============================================================================
