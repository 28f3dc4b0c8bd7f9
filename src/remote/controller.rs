//! Session controller (the remote)
//!
//! Runs on the controlling device. Holds at most one outbound connection,
//! sends commands, and mirrors the host's last snapshot into a
//! [`ControllerView`].
//!
//! ```text
//! initializing -> idle -> connecting -> connected
//!                              |           |
//!                              v           v
//!                            error    disconnected
//! ```
//! `connect` is allowed again from `error` and `disconnected`.

use serde::Serialize;
use std::fmt;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::models::Channel;
use crate::remote::link::{Connection, LinkEvent, LinkEvents, PeerLink};
use crate::remote::protocol::{Command, Message, NavSnapshot, PlayerSnapshot, Snapshot};
use crate::remote::session::SessionId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ControllerStatus {
    #[default]
    Initializing,
    Idle,
    Connecting,
    Connected,
    Disconnected,
    Error,
}

impl fmt::Display for ControllerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ControllerStatus::Initializing => write!(f, "initializing"),
            ControllerStatus::Idle => write!(f, "idle"),
            ControllerStatus::Connecting => write!(f, "connecting"),
            ControllerStatus::Connected => write!(f, "connected"),
            ControllerStatus::Disconnected => write!(f, "disconnected"),
            ControllerStatus::Error => write!(f, "error"),
        }
    }
}

/// Last known host state, as seen by the remote. Never authoritative.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ControllerView {
    pub channel: Option<Channel>,
    pub player: PlayerSnapshot,
    pub nav: NavSnapshot,
}

impl From<Snapshot> for ControllerView {
    fn from(snapshot: Snapshot) -> Self {
        Self {
            channel: snapshot.channel,
            player: snapshot.player,
            nav: snapshot.nav,
        }
    }
}

impl fmt::Display for ControllerView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Some(channel) = &self.channel else {
            return write!(f, "No channel");
        };
        let state = if let Some(err) = &self.player.error {
            format!("Error: {}", err)
        } else if self.player.is_loading {
            "Loading...".to_string()
        } else if self.player.is_playing {
            "▶ Playing".to_string()
        } else {
            "⏸ Paused".to_string()
        };
        let volume = if self.player.is_muted {
            "muted".to_string()
        } else {
            format!("{}%", (self.player.volume * 100.0).round() as u8)
        };
        write!(
            f,
            "{} | {} | vol {} | {}{}",
            channel.name,
            state,
            volume,
            if self.nav.has_prev { "◀ " } else { "" },
            if self.nav.has_next { "▶" } else { "" },
        )
    }
}

/// The controlling side of a remote-control session
pub struct SessionController {
    events: LinkEvents,
    status: ControllerStatus,
    session_id: Option<SessionId>,
    connection: Option<Box<dyn Connection>>,
    error: Option<String>,
    view: watch::Sender<ControllerView>,
}

impl SessionController {
    /// `events` is the queue the owning loop drains into [`Self::handle_event`]
    pub fn new(events: LinkEvents) -> Self {
        let (view, _) = watch::channel(ControllerView::default());
        Self {
            events,
            status: ControllerStatus::Initializing,
            session_id: None,
            connection: None,
            error: None,
            view,
        }
    }

    pub fn status(&self) -> ControllerStatus {
        self.status
    }

    pub fn session_id(&self) -> Option<&SessionId> {
        self.session_id.as_ref()
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Current view
    pub fn view(&self) -> ControllerView {
        self.view.borrow().clone()
    }

    /// Observe view replacements
    pub fn subscribe(&self) -> watch::Receiver<ControllerView> {
        self.view.subscribe()
    }

    /// The local link is usable
    pub fn ready(&mut self) {
        if self.status == ControllerStatus::Initializing {
            self.status = ControllerStatus::Idle;
        }
    }

    /// Connect to a host, superseding any previous connection
    pub fn connect(&mut self, link: &mut dyn PeerLink, id: SessionId) {
        self.teardown();
        info!(session = %id, "connecting to host");
        self.session_id = Some(id.clone());
        self.error = None;
        match link.connect(&id, self.events.clone()) {
            Ok(conn) => {
                self.connection = Some(conn);
                self.status = ControllerStatus::Connecting;
            }
            Err(e) => self.fail(e.to_string()),
        }
    }

    /// Connect again to the last session
    pub fn reconnect(&mut self, link: &mut dyn PeerLink) -> bool {
        match self.session_id.clone() {
            Some(id) => {
                self.connect(link, id);
                true
            }
            None => false,
        }
    }

    /// Leave the session on purpose
    pub fn disconnect(&mut self) {
        self.teardown();
        self.clear_host_fields();
        self.status = ControllerStatus::Idle;
    }

    /// Send a command; dropped unless connected
    pub fn send(&mut self, command: Command) -> bool {
        if self.status != ControllerStatus::Connected {
            debug!(%command, status = %self.status, "not connected, command dropped");
            return false;
        }
        let Some(conn) = self.connection.as_ref() else {
            return false;
        };
        match conn.send(Message::Command(command).encode()) {
            Ok(()) => true,
            Err(e) => {
                self.fail(e.to_string());
                false
            }
        }
    }

    pub fn handle_event(&mut self, event: LinkEvent) {
        let current = self.connection.as_ref().map(|c| c.id());
        match event {
            LinkEvent::Open(id) if Some(id) == current => {
                let sent = self
                    .connection
                    .as_ref()
                    .map(|c| c.send(Message::RemoteReady.encode()));
                match sent {
                    Some(Err(e)) => self.fail(e.to_string()),
                    _ => {
                        info!(session = ?self.session_id.as_ref().map(|s| s.to_string()), "connected");
                        self.status = ControllerStatus::Connected;
                    }
                }
            }
            LinkEvent::Data(id, value) if Some(id) == current => match Message::decode(&value) {
                Some(Message::State(snapshot)) => {
                    self.view.send_replace(snapshot.into());
                }
                Some(other) => debug!(?other, "ignoring non-state message from host"),
                None => {}
            },
            LinkEvent::Closed(id) if Some(id) == current => {
                info!("host closed the connection");
                self.connection = None;
                self.clear_host_fields();
                self.status = ControllerStatus::Disconnected;
            }
            LinkEvent::Error(id, e) if Some(id) == current => self.fail(e.to_string()),
            LinkEvent::Incoming(_, conn) => {
                debug!(id = %conn.id(), "remotes do not accept connections");
                conn.close();
            }
            other => debug!(event = ?other, "ignoring stale link event"),
        }
    }

    fn fail(&mut self, message: String) {
        warn!(error = %message, "remote connection failed");
        self.teardown();
        self.error = Some(message);
        self.status = ControllerStatus::Error;
    }

    fn teardown(&mut self) {
        if let Some(conn) = self.connection.take() {
            conn.close();
        }
    }

    /// Forget channel and nav; player fields stay as "last known"
    fn clear_host_fields(&mut self) {
        self.view.send_modify(|view| {
            view.channel = None;
            view.nav = NavSnapshot::default();
        });
    }
}

impl Drop for SessionController {
    fn drop(&mut self) {
        self.teardown();
    }
}
