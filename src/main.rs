//! playd - background music player
//!
//! `playd daemon` scans a music folder and plays it in order, wrapping
//! around at the end. Every other subcommand talks to the running daemon
//! over a Unix socket.

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser};

use playd::cli::{Cli, Commands, DaemonArgs, Display, IpcClient};
use playd::config::{default_socket_path, DaemonConfig};

/// Main entry point
#[tokio::main(flavor = "current_thread")]
async fn main() {
    let cli = Cli::parse();

    if let Err(e) = execute(cli).await {
        Display::show_error(&format!("{:#}", e));
        std::process::exit(1);
    }
}

/// Initializes the tracing subscriber for logging.
///
/// `RUST_LOG` wins, then `--verbose`, then the configured filter.
fn init_tracing(verbose: bool, configured: Option<&str>) {
    use tracing_subscriber::{fmt, EnvFilter};

    let fallback = if verbose {
        "debug"
    } else {
        configured.unwrap_or("warn")
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .without_time()
        .init();
}

/// Executes the CLI command.
async fn execute(cli: Cli) -> Result<()> {
    if let Some(Commands::Daemon(args)) = &cli.command {
        let config = daemon_config(args, &cli)?;
        init_tracing(cli.verbose, config.log_filter.as_deref());
        return playd::daemon::run(config).await;
    }

    init_tracing(cli.verbose, None);
    tracing::debug!("Verbose mode enabled");

    let client = IpcClient::with_socket_path(cli.socket.clone().unwrap_or_else(default_socket_path));

    match cli.command {
        Some(Commands::Play) => Display::show_transport(&client.play().await?),
        Some(Commands::Pause) => Display::show_transport(&client.pause().await?),
        Some(Commands::Stop) => Display::show_transport(&client.stop().await?),
        Some(Commands::Next) => Display::show_transport(&client.next().await?),
        Some(Commands::Prev) => Display::show_transport(&client.previous().await?),
        Some(Commands::Select { index }) => Display::show_transport(&client.select(index).await?),
        Some(Commands::Status) => Display::show_status(&client.status().await?),
        Some(Commands::List) => Display::show_list(&client.list().await?),
        Some(Commands::Shutdown) => Display::show_shutdown_success(&client.shutdown().await?),
        Some(Commands::Watch) => {
            tokio::select! {
                result = client.watch(Display::show_watch_started, Display::show_event) => result?,
                _ = tokio::signal::ctrl_c() => {}
            }
        }
        Some(Commands::Completions { shell }) => {
            generate_completions(shell);
        }
        // Returned early above.
        Some(Commands::Daemon(_)) => {}
        None => {
            // No command provided, show help
            Cli::command().print_help()?;
        }
    }

    Ok(())
}

/// Loads the config file and applies command-line overrides.
fn daemon_config(args: &DaemonArgs, cli: &Cli) -> Result<DaemonConfig> {
    let mut config = match &args.config {
        Some(path) => DaemonConfig::load_from(path),
        None => DaemonConfig::load(),
    }
    .context("設定ファイルを読み込めません")?;

    if let Some(dir) = &args.dir {
        config.music_dir = dir.clone();
    }
    if let Some(socket) = &cli.socket {
        config.socket_path = socket.clone();
    }
    if let Some(index) = args.index {
        config.initial_index = index;
    }
    if args.no_autoplay {
        config.autoplay = false;
    }
    if let Some(secs) = args.idle_exit {
        config.idle_exit_secs = secs;
    }
    config.expand_paths();

    Ok(config)
}

/// Generates shell completion scripts.
fn generate_completions(shell: clap_complete::Shell) {
    use clap_complete::generate;
    use std::io;

    let mut cmd = Cli::command();
    let bin_name = cmd.get_name().to_string();
    generate(shell, &mut cmd, bin_name, &mut io::stdout());
}

// ============================================================================
// Tests
// ============================================================================
