//! channel-remote - Channel player with peer-to-peer remote control
//!
//! Plays channels from an M3U playlist on one machine (the host) and lets
//! other machines drive it through a six-character session code.
//!
//! # Usage
//!
//! ```bash
//! # Inspect a playlist
//! channel-remote channels playlist.m3u --group News
//! channel-remote groups playlist.m3u
//!
//! # Play and share
//! channel-remote host playlist.m3u --port 7878
//!
//! # Control from elsewhere
//! channel-remote remote http://192.168.1.20:7878/remote/AB12CD
//! ```

use clap::Parser;
use tracing_subscriber::EnvFilter;

use channel_remote::cli::{Cli, Command, ExitCode, Output};
use channel_remote::commands;

#[tokio::main]
async fn main() -> std::process::ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    run_cli(cli).await.into()
}

/// Log to stderr so stdout stays clean for JSON output
fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// Run CLI command and return exit code
async fn run_cli(cli: Cli) -> ExitCode {
    let output = Output::new(&cli);
    let config = commands::load_config(cli.config.as_deref());

    match cli.command {
        Command::Channels(cmd) => commands::channels_cmd(cmd, &config, &output).await,

        Command::Groups(cmd) => commands::groups_cmd(cmd, &config, &output).await,

        Command::Session(cmd) => commands::session_cmd(cmd, config, &output).await,

        Command::Host(cmd) => commands::host_cmd(cmd, config, &output).await,

        Command::Remote(cmd) => commands::remote_cmd(cmd, &output).await,
    }
}
