//! CLI - Command Line Interface for channel-remote
//!
//! Every command prints JSON when `--json` is set or stdout is not a TTY.
//!
//! # Examples
//!
//! ```bash
//! # Browse a playlist
//! channel-remote channels playlist.m3u --search news --group Sports
//!
//! # Play on this machine and share a remote session
//! channel-remote host playlist.m3u
//!
//! # Control it from another machine
//! channel-remote remote http://192.168.1.20:7878/remote/AB12CD
//! ```

use clap::{Args, Parser, Subcommand};
use serde::{Deserialize, Serialize};
use std::io::IsTerminal;
use std::path::PathBuf;

use crate::models::ALL_GROUPS;

// =============================================================================
// Exit Codes
// =============================================================================

/// Exit codes for CLI operations (semantic for scripting)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ExitCode {
    /// Success
    Success = 0,
    /// General error
    Error = 1,
    /// Invalid arguments
    InvalidArgs = 2,
    /// Network error
    NetworkError = 3,
    /// Playlist had no usable channels
    NoChannels = 4,
    /// Could not reach or keep a session
    SessionFailed = 5,
}

impl From<ExitCode> for i32 {
    fn from(code: ExitCode) -> i32 {
        code as i32
    }
}

impl From<ExitCode> for std::process::ExitCode {
    fn from(code: ExitCode) -> std::process::ExitCode {
        std::process::ExitCode::from(code as u8)
    }
}

// =============================================================================
// Main CLI Structure
// =============================================================================

/// channel-remote - Channel player with peer-to-peer remote control
#[derive(Parser, Debug)]
#[command(
    name = "channel-remote",
    version,
    author = "Gorka & Hermes",
    about = "Channel player with peer-to-peer remote control",
    long_about = "Browse a channel playlist, play it on one machine and \
                  control playback from another through a session code.",
    after_help = "EXAMPLES:\n\
                  channel-remote channels list.m3u -s news     Filter channels\n\
                  channel-remote host list.m3u                 Play and share\n\
                  channel-remote remote AB12CD -H 10.0.0.5:7878  Control a host"
)]
pub struct Cli {
    /// Output format as JSON (default for non-TTY)
    #[arg(long, short = 'j', global = true)]
    pub json: bool,

    /// Suppress non-essential output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,

    /// Verbose logging (same as RUST_LOG=debug)
    #[arg(long, short = 'v', global = true)]
    pub verbose: bool,

    /// Path to config file
    #[arg(long, short = 'c', global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    /// Check if JSON output should be used
    pub fn should_json(&self) -> bool {
        self.json || !std::io::stdout().is_terminal()
    }
}

// =============================================================================
// Subcommands
// =============================================================================

#[derive(Subcommand, Debug)]
pub enum Command {
    /// List channels, optionally filtered
    #[command(visible_alias = "ls")]
    Channels(ChannelsCmd),

    /// List channel groups
    #[command(visible_alias = "g")]
    Groups(GroupsCmd),

    /// Show or reset this machine's session code
    Session(SessionCmd),

    /// Play channels here and accept remotes
    Host(HostCmd),

    /// Control a host from this machine
    #[command(visible_alias = "r")]
    Remote(RemoteCmd),
}

/// Playlist source shared by several commands
#[derive(Args, Debug, Clone)]
pub struct PlaylistArg {
    /// Playlist path or URL (defaults to the configured playlist)
    pub playlist: Option<String>,
}

#[derive(Args, Debug)]
pub struct ChannelsCmd {
    #[command(flatten)]
    pub source: PlaylistArg,

    /// Case-insensitive name filter
    #[arg(long, short = 's', default_value = "")]
    pub search: String,

    /// Group filter
    #[arg(long, short = 'g', default_value = ALL_GROUPS)]
    pub group: String,

    /// Maximum channels to print
    #[arg(long, short = 'n', default_value = "100")]
    pub limit: usize,
}

#[derive(Args, Debug)]
pub struct GroupsCmd {
    #[command(flatten)]
    pub source: PlaylistArg,
}

#[derive(Args, Debug)]
pub struct SessionCmd {
    /// Generate a new code on next share
    #[arg(long)]
    pub reset: bool,
}

#[derive(Args, Debug)]
pub struct HostCmd {
    #[command(flatten)]
    pub source: PlaylistArg,

    /// TCP port to listen on
    #[arg(long, short = 'p')]
    pub port: Option<u16>,

    /// Channel to start with (url or name); defaults to the first
    #[arg(long)]
    pub start: Option<String>,

    /// Simulate a browser autoplay block on the first channel
    #[arg(long)]
    pub block_autoplay: bool,
}

#[derive(Args, Debug)]
pub struct RemoteCmd {
    /// Session code or share link
    pub target: String,

    /// Host address (host:port); taken from the share link if omitted
    #[arg(long, short = 'H')]
    pub host: Option<String>,
}

impl RemoteCmd {
    /// Host address from `--host`, else from a share link
    pub fn host_address(&self) -> Option<String> {
        self.host.clone().or_else(|| share_authority(&self.target))
    }
}

/// `host:port` part of an `http://host:port/remote/CODE` link
pub fn share_authority(link: &str) -> Option<String> {
    let rest = link.split_once("://").map(|(_, rest)| rest)?;
    let authority = rest.split('/').next()?;
    if authority.is_empty() {
        None
    } else {
        Some(authority.to_string())
    }
}

// =============================================================================
// JSON Output Types
// =============================================================================

/// Generic JSON output wrapper with status
#[derive(Debug, Serialize, Deserialize)]
pub struct JsonOutput<T: Serialize> {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "is_zero")]
    pub exit_code: i32,
}

fn is_zero(n: &i32) -> bool {
    *n == 0
}

impl<T: Serialize> JsonOutput<T> {
    /// Create success output with data
    pub fn success(data: T) -> Self {
        Self {
            data: Some(data),
            error: None,
            exit_code: 0,
        }
    }

    /// Create error output (no data)
    pub fn error_msg(msg: impl Into<String>, code: ExitCode) -> JsonOutput<()> {
        JsonOutput::<()> {
            data: None,
            error: Some(msg.into()),
            exit_code: code.into(),
        }
    }
}

/// Session code response
#[derive(Debug, Serialize, Deserialize)]
pub struct SessionInfo {
    pub session_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub share_url: Option<String>,
}

// =============================================================================
// Output Helpers
// =============================================================================

/// Output handler for consistent formatting
#[derive(Debug, Clone, Copy)]
pub struct Output {
    pub json: bool,
    pub quiet: bool,
}

impl Output {
    pub fn new(cli: &Cli) -> Self {
        Self {
            json: cli.should_json(),
            quiet: cli.quiet,
        }
    }

    /// Print a listing: one `row` per item, or the whole slice as JSON
    pub fn rows<T: Serialize>(
        &self,
        items: &[T],
        row: impl Fn(&T) -> String,
    ) -> anyhow::Result<()> {
        let text = self.render_rows(items, row)?;
        if !text.is_empty() {
            println!("{}", text);
        }
        Ok(())
    }

    pub fn render_rows<T: Serialize>(
        &self,
        items: &[T],
        row: impl Fn(&T) -> String,
    ) -> anyhow::Result<String> {
        if self.json {
            Ok(serde_json::to_string_pretty(&JsonOutput::success(items))?)
        } else {
            Ok(items.iter().map(row).collect::<Vec<_>>().join("\n"))
        }
    }

    /// Print a plain line, or the value as JSON
    pub fn line<T: Serialize>(&self, text: impl std::fmt::Display, data: T) -> anyhow::Result<()> {
        if self.json {
            println!("{}", serde_json::to_string(&JsonOutput::success(data))?);
        } else {
            println!("{}", text);
        }
        Ok(())
    }

    /// Print error and return exit code
    pub fn error(&self, msg: impl Into<String>, code: ExitCode) -> ExitCode {
        let msg = msg.into();
        if self.json {
            let output = JsonOutput::<()>::error_msg(&msg, code);
            if let Ok(json) = serde_json::to_string_pretty(&output) {
                eprintln!("{}", json);
            }
        } else if !self.quiet {
            eprintln!("Error: {}", msg);
        }
        code
    }

    /// Print info message (suppressed in quiet mode)
    pub fn info(&self, msg: impl std::fmt::Display) {
        if !self.quiet && !self.json {
            eprintln!("{}", msg);
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn verify_cli() {
        // Verify CLI structure is valid
        Cli::command().debug_assert();
    }

    #[test]
    fn test_subcommand_required() {
        assert!(Cli::try_parse_from(["channel-remote"]).is_err());
    }

    #[test]
    fn test_channels_command() {
        let cli = Cli::parse_from(["channel-remote", "channels", "list.m3u", "-s", "news"]);
        if let Command::Channels(cmd) = cli.command {
            assert_eq!(cmd.source.playlist.as_deref(), Some("list.m3u"));
            assert_eq!(cmd.search, "news");
            assert_eq!(cmd.group, "All");
            assert_eq!(cmd.limit, 100);
        } else {
            panic!("Expected Channels command");
        }
    }

    #[test]
    fn test_global_flags() {
        let cli = Cli::parse_from(["channel-remote", "--json", "--quiet", "-v", "session"]);
        assert!(cli.json);
        assert!(cli.quiet);
        assert!(cli.verbose);
    }

    #[test]
    fn test_host_options() {
        let cli = Cli::parse_from(["channel-remote", "host", "-p", "9000", "--start", "BBC"]);
        if let Command::Host(cmd) = cli.command {
            assert_eq!(cmd.port, Some(9000));
            assert_eq!(cmd.start.as_deref(), Some("BBC"));
            assert!(cmd.source.playlist.is_none());
        } else {
            panic!("Expected Host command");
        }
    }

    #[test]
    fn test_remote_host_from_share_link() {
        let cli = Cli::parse_from([
            "channel-remote",
            "remote",
            "http://192.168.1.20:7878/remote/AB12CD",
        ]);
        if let Command::Remote(cmd) = cli.command {
            assert_eq!(cmd.host_address().as_deref(), Some("192.168.1.20:7878"));
        } else {
            panic!("Expected Remote command");
        }
    }

    #[test]
    fn test_remote_explicit_host_wins() {
        let cmd = RemoteCmd {
            target: "http://a:1/remote/AB12CD".into(),
            host: Some("b:2".into()),
        };
        assert_eq!(cmd.host_address().as_deref(), Some("b:2"));
        let cmd = RemoteCmd {
            target: "AB12CD".into(),
            host: None,
        };
        assert!(cmd.host_address().is_none());
    }
}
