//! CLI Command Handlers
//!
//! Implements all CLI commands on top of the library.
//! Each handler takes CLI args and Output, returns ExitCode.

use std::net::SocketAddr;
use std::path::Path;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::api::{PlaylistClient, PlaylistError};
use crate::app::{HostApp, HostInput, RemoteApp, RemoteInput};
use crate::cli::{
    ChannelsCmd, ExitCode, GroupsCmd, HostCmd, Output, PlaylistArg, RemoteCmd, SessionCmd,
    SessionInfo,
};
use crate::config::Config;
use crate::models::{Channel, ChannelList};
use crate::remote::session::load_or_create;
use crate::remote::{Command, SessionId, TcpLink};
use crate::stream::{HeadlessEngine, StreamEngine};

/// Load config from `--config`, else the default location
pub fn load_config(path: Option<&Path>) -> Config {
    match path {
        Some(path) => Config::load_from(path),
        None => Config::load(),
    }
}

/// Resolve and load the playlist, mapping failures to exit codes
async fn load_channels(
    arg: &PlaylistArg,
    config: &Config,
    output: &Output,
) -> Result<ChannelList, ExitCode> {
    let Some(source) = arg.playlist.clone().or_else(|| config.playlist.clone()) else {
        return Err(output.error(
            "No playlist given and none configured",
            ExitCode::InvalidArgs,
        ));
    };

    output.info(format!("Loading playlist: {}", source));
    PlaylistClient::new().load(&source).await.map_err(|e| {
        let code = match e {
            PlaylistError::Empty => ExitCode::NoChannels,
            PlaylistError::RequestFailed(_) | PlaylistError::ServerError(_) => {
                ExitCode::NetworkError
            }
            PlaylistError::Io(_) => ExitCode::Error,
        };
        output.error(e.to_string(), code)
    })
}

// =============================================================================
// Channels / Groups Commands
// =============================================================================

pub async fn channels_cmd(cmd: ChannelsCmd, config: &Config, output: &Output) -> ExitCode {
    let list = match load_channels(&cmd.source, config, output).await {
        Ok(list) => list,
        Err(code) => return code,
    };

    let channels: Vec<&Channel> = list
        .filter_indices(&cmd.search, &cmd.group)
        .into_iter()
        .filter_map(|i| list.get(i))
        .take(cmd.limit)
        .collect();

    if let Err(e) = output.rows(&channels, |c| format!("{}  {}", c, c.url)) {
        return output.error(format!("Failed to serialize: {}", e), ExitCode::Error);
    }
    output.info(format!("{} of {} channels", channels.len(), list.len()));
    ExitCode::Success
}

pub async fn groups_cmd(cmd: GroupsCmd, config: &Config, output: &Output) -> ExitCode {
    let list = match load_channels(&cmd.source, config, output).await {
        Ok(list) => list,
        Err(code) => return code,
    };

    let groups = list.groups();
    if let Err(e) = output.rows(&groups, |g| g.to_string()) {
        return output.error(format!("Failed to serialize: {}", e), ExitCode::Error);
    }
    ExitCode::Success
}

// =============================================================================
// Session Command
// =============================================================================

pub async fn session_cmd(cmd: SessionCmd, mut config: Config, output: &Output) -> ExitCode {
    if cmd.reset {
        return match config.reset_session_id() {
            Ok(()) => {
                output.info("Session code cleared; a new one is generated on next share");
                ExitCode::Success
            }
            Err(e) => output.error(format!("Failed to save config: {}", e), ExitCode::Error),
        };
    }

    let id = config
        .session_id
        .as_deref()
        .and_then(|raw| SessionId::parse(raw).ok());
    let info = SessionInfo {
        share_url: id.as_ref().map(|id| id.share_url(&config.share_origin())),
        session_id: id.map(String::from),
    };

    let text = match (&info.session_id, &info.share_url) {
        (Some(id), Some(url)) => format!("{}  {}", id, url),
        _ => "No session code yet".to_string(),
    };
    match output.line(text, &info) {
        Ok(()) => ExitCode::Success,
        Err(e) => output.error(format!("Failed to serialize: {}", e), ExitCode::Error),
    }
}

// =============================================================================
// Host Command
// =============================================================================

/// Interpret one line of host console input
///
/// Remote commands (`n`, `p`, `play`, `vol 40%` ...) plus `search <text>`,
/// `group <name>`, `select <url>`, `share`, `unshare` and `quit`.
pub fn parse_host_line(line: &str) -> Option<HostInput> {
    let line = line.trim();
    let (word, rest) = match line.split_once(' ') {
        Some((word, rest)) => (word, rest.trim()),
        None => (line, ""),
    };
    match word.to_lowercase().as_str() {
        "q" | "quit" | "exit" => Some(HostInput::Shutdown),
        "share" => Some(HostInput::StartSharing),
        "unshare" => Some(HostInput::StopSharing),
        "search" => Some(HostInput::SetSearch(rest.to_string())),
        "group" if !rest.is_empty() => Some(HostInput::SetGroup(rest.to_string())),
        "select" if !rest.is_empty() => Some(HostInput::Select(rest.to_string())),
        _ => Command::parse_input(line).map(HostInput::Command),
    }
}

/// First channel whose url matches, else whose name matches ignoring case
fn find_start<'a>(list: &'a ChannelList, start: &str) -> Option<&'a Channel> {
    list.find(start).or_else(|| {
        let wanted = start.to_lowercase();
        list.iter().find(|c| c.name.to_lowercase() == wanted)
    })
}

pub async fn host_cmd(cmd: HostCmd, mut config: Config, output: &Output) -> ExitCode {
    let list = match load_channels(&cmd.source, &config, output).await {
        Ok(list) => list,
        Err(code) => return code,
    };

    let first = match &cmd.start {
        Some(start) => match find_start(&list, start) {
            Some(channel) => channel.clone(),
            None => {
                return output.error(
                    format!("No channel matches '{}'", start),
                    ExitCode::InvalidArgs,
                )
            }
        },
        None => match list.get(0) {
            Some(channel) => channel.clone(),
            None => return output.error("Playlist contains no channels", ExitCode::NoChannels),
        },
    };

    let port = cmd.port.unwrap_or_else(|| config.port());
    let origin = config.share_origin_on(port);
    let session_id = load_or_create(&mut config);

    let volume_step = config.volume_step();
    let retry_limit = config.network_retry_limit;
    let mut block_next = cmd.block_autoplay;
    let engines = move || -> Box<dyn StreamEngine> {
        if std::mem::take(&mut block_next) {
            Box::new(HeadlessEngine::new().with_autoplay_blocked())
        } else {
            Box::new(HeadlessEngine::new())
        }
    };

    let bind = SocketAddr::from(([0, 0, 0, 0], port));
    let app = HostApp::new(list, engines, TcpLink::host(bind), config)
        .with_volume_step(volume_step)
        .with_network_retry_limit(retry_limit);

    let (tx, rx) = mpsc::unbounded_channel();
    let _ = tx.send(HostInput::Select(first.url.clone()));
    let _ = tx.send(HostInput::StartSharing);

    let info = SessionInfo {
        session_id: Some(session_id.to_string()),
        share_url: Some(session_id.share_url(&origin)),
    };
    if let Err(e) = output.line(
        format!("Session code: {}\nShare link:   {}", session_id, session_id.share_url(&origin)),
        &info,
    ) {
        return output.error(format!("Failed to serialize: {}", e), ExitCode::Error);
    }
    output.info("Type n/p, play, s, m, +/-, vol 40%, search <text>, group <name> or q");

    // Print every player change
    let mut states = app.playback().subscribe();
    let printer = *output;
    tokio::spawn(async move {
        while states.changed().await.is_ok() {
            let state = states.borrow_and_update().clone();
            if let Err(e) = printer.line(&state, &state) {
                debug!(error = %e, "could not print state");
            }
        }
    });

    spawn_console(tx.clone(), *output, parse_host_line, HostInput::Shutdown);
    spawn_ctrl_c(tx, HostInput::Shutdown);

    match app.run(rx).await {
        Ok(()) => ExitCode::Success,
        Err(e) => output.error(format!("Host failed: {}", e), ExitCode::Error),
    }
}

// =============================================================================
// Remote Command
// =============================================================================

/// Interpret one line of remote console input
pub fn parse_remote_line(line: &str) -> Option<RemoteInput> {
    match line.trim().to_lowercase().as_str() {
        "q" | "quit" | "exit" => Some(RemoteInput::Shutdown),
        "r" | "reconnect" => Some(RemoteInput::Reconnect),
        "d" | "disconnect" => Some(RemoteInput::Disconnect),
        _ => Command::parse_input(line).map(RemoteInput::Command),
    }
}

pub async fn remote_cmd(cmd: RemoteCmd, output: &Output) -> ExitCode {
    let session_id = match SessionId::parse_any(&cmd.target) {
        Ok(id) => id,
        Err(e) => return output.error(e.to_string(), ExitCode::InvalidArgs),
    };
    let Some(address) = cmd.host_address() else {
        return output.error(
            "Host address unknown: pass a share link or --host",
            ExitCode::InvalidArgs,
        );
    };

    let target = match tokio::net::lookup_host(address.as_str()).await {
        Ok(mut addrs) => match addrs.next() {
            Some(addr) => addr,
            None => {
                return output.error(
                    format!("Could not resolve {}", address),
                    ExitCode::NetworkError,
                )
            }
        },
        Err(e) => {
            return output.error(
                format!("Could not resolve {}: {}", address, e),
                ExitCode::NetworkError,
            )
        }
    };

    let app = RemoteApp::new(TcpLink::remote(target));

    // Print every view the host sends
    let mut views = app.controller().subscribe();
    let printer = *output;
    tokio::spawn(async move {
        while views.changed().await.is_ok() {
            let view = views.borrow_and_update().clone();
            if let Err(e) = printer.line(&view, &view) {
                debug!(error = %e, "could not print view");
            }
        }
    });

    let (tx, rx) = mpsc::unbounded_channel();
    let _ = tx.send(RemoteInput::Connect(session_id.clone()));
    output.info(format!("Connecting to {} at {}", session_id, target));
    output.info("Type n/p, play, s, m, +/-, vol 40%, r to reconnect or q");

    spawn_console(tx.clone(), *output, parse_remote_line, RemoteInput::Shutdown);
    spawn_ctrl_c(tx, RemoteInput::Shutdown);

    match app.run(rx).await {
        Ok(()) => ExitCode::Success,
        Err(e) => output.error(format!("Remote failed: {}", e), ExitCode::SessionFailed),
    }
}

// =============================================================================
// Console Helpers
// =============================================================================

/// Feed parsed stdin lines into a loop; EOF sends `shutdown`
fn spawn_console<T, F>(tx: mpsc::UnboundedSender<T>, output: Output, parse: F, shutdown: T)
where
    T: Send + 'static,
    F: Fn(&str) -> Option<T> + Send + 'static,
{
    tokio::spawn(async move {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        loop {
            match lines.next_line().await {
                Ok(Some(line)) if line.trim().is_empty() => continue,
                Ok(Some(line)) => match parse(&line) {
                    Some(input) => {
                        if tx.send(input).is_err() {
                            return;
                        }
                    }
                    None => output.info(format!("Unknown command: {}", line.trim())),
                },
                Ok(None) => break,
                Err(e) => {
                    warn!(error = %e, "stdin closed");
                    break;
                }
            }
        }
        let _ = tx.send(shutdown);
    });
}

fn spawn_ctrl_c<T: Send + 'static>(tx: mpsc::UnboundedSender<T>, shutdown: T) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            let _ = tx.send(shutdown);
        }
    });
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_host_line_commands() {
        assert_eq!(parse_host_line("n"), Some(HostInput::Command(Command::Next)));
        assert_eq!(
            parse_host_line("vol 40%"),
            Some(HostInput::Command(Command::SetVolume(0.4)))
        );
        assert_eq!(parse_host_line("quit"), Some(HostInput::Shutdown));
        assert_eq!(parse_host_line("share"), Some(HostInput::StartSharing));
    }

    #[test]
    fn test_host_line_navigation_filters() {
        assert_eq!(
            parse_host_line("search bbc one"),
            Some(HostInput::SetSearch("bbc one".into()))
        );
        assert_eq!(parse_host_line("search"), Some(HostInput::SetSearch(String::new())));
        assert_eq!(
            parse_host_line("group News"),
            Some(HostInput::SetGroup("News".into()))
        );
        assert_eq!(parse_host_line("group"), None);
        assert_eq!(parse_host_line("bogus"), None);
    }

    #[test]
    fn test_remote_line() {
        assert_eq!(parse_remote_line("R"), Some(RemoteInput::Reconnect));
        assert_eq!(
            parse_remote_line("m"),
            Some(RemoteInput::Command(Command::ToggleMute))
        );
        assert_eq!(parse_remote_line("what"), None);
    }

    #[test]
    fn test_find_start_by_url_or_name() {
        let list = ChannelList::new(vec![
            Channel::new("Alpha", "http://s/a", "News"),
            Channel::new("Beta", "http://s/b", "News"),
        ]);
        assert_eq!(find_start(&list, "http://s/b").map(|c| c.name.as_str()), Some("Beta"));
        assert_eq!(find_start(&list, "alpha").map(|c| c.url.as_str()), Some("http://s/a"));
        assert!(find_start(&list, "gamma").is_none());
    }
}
