//! Session host
//!
//! Runs on the playing device. Owns the listener and the set of connected
//! remotes, turns their messages into [`HostRequest`]s for the owning
//! event loop, and pushes snapshots to them.
//!
//! ```text
//! inactive -> connecting -> ready -> inactive (stop)
//!                 |           |
//!                 +--> error <+
//! ```

use tracing::{debug, info, warn};

use crate::remote::link::{
    Connection, ConnectionId, LinkEvent, LinkEvents, Listener, ListenerId, PeerLink,
};
use crate::remote::protocol::{Command, Message, Snapshot};
use crate::remote::session::{load_or_create, SessionId, SessionStatus, SessionStore};

/// Work the host cannot do itself: it owns no playback state
#[derive(Debug, Clone, PartialEq)]
pub enum HostRequest {
    /// Apply a remote's command
    Command(ConnectionId, Command),
    /// Push the current snapshot to one remote
    Snapshot(ConnectionId),
}

/// The sharing side of a remote-control session
pub struct SessionHost {
    events: LinkEvents,
    status: SessionStatus,
    session_id: Option<SessionId>,
    error: Option<String>,
    listener: Option<Box<dyn Listener>>,
    controllers: Vec<Box<dyn Connection>>,
}

impl SessionHost {
    /// `events` is the queue the owning loop drains into [`Self::handle_event`]
    pub fn new(events: LinkEvents) -> Self {
        Self {
            events,
            status: SessionStatus::Inactive,
            session_id: None,
            error: None,
            listener: None,
            controllers: Vec::new(),
        }
    }

    pub fn status(&self) -> SessionStatus {
        self.status
    }

    pub fn session_id(&self) -> Option<&SessionId> {
        self.session_id.as_ref()
    }

    /// Message of the last failure, if the session is in `error`
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn controller_count(&self) -> usize {
        self.controllers.len()
    }

    pub fn controller_ids(&self) -> Vec<ConnectionId> {
        self.controllers.iter().map(|c| c.id()).collect()
    }

    /// Start sharing. Idempotent while connecting or ready.
    pub fn start(&mut self, link: &mut dyn PeerLink, store: &mut dyn SessionStore) {
        if matches!(
            self.status,
            SessionStatus::Ready | SessionStatus::Connecting
        ) {
            debug!(status = %self.status, "session already started");
            return;
        }

        // A previous error may have left pieces behind
        self.release();

        let id = load_or_create(store);
        info!(session = %id, "starting session");
        self.session_id = Some(id.clone());
        self.error = None;

        match link.listen(&id, self.events.clone()) {
            Ok(listener) => {
                self.listener = Some(listener);
                self.status = SessionStatus::Connecting;
            }
            Err(e) => {
                warn!(error = %e, "failed to open listener");
                self.stop_with(SessionStatus::Error, Some(e.to_string()));
            }
        }
    }

    /// Stop sharing: closes every remote and releases the listener
    pub fn stop(&mut self) {
        self.stop_with(SessionStatus::Inactive, None);
    }

    /// Stop and land in `target` (`Inactive` or `Error`)
    pub fn stop_with(&mut self, target: SessionStatus, error: Option<String>) {
        self.release();
        info!(status = %target, "session stopped");
        self.status = target;
        self.error = error;
    }

    /// Feed one link event; returns work for the owning loop
    pub fn handle_event(&mut self, event: LinkEvent) -> Option<HostRequest> {
        match event {
            LinkEvent::ListenerReady(lid) => {
                if !self.is_live_listener(lid) {
                    debug!(listener = %lid, "ignoring ready from released listener");
                    return None;
                }
                if self.status == SessionStatus::Connecting {
                    self.status = SessionStatus::Ready;
                    if let Some(id) = &self.session_id {
                        info!(session = %id, "session ready");
                    }
                }
                None
            }
            LinkEvent::ListenerError(lid, e) => {
                if self.is_live_listener(lid) {
                    warn!(error = %e, "listener failed");
                    self.stop_with(SessionStatus::Error, Some(e.to_string()));
                } else {
                    debug!(listener = %lid, error = %e, "ignoring error from released listener");
                }
                None
            }
            LinkEvent::Incoming(lid, conn) => {
                if !self.is_live_listener(lid) {
                    debug!(id = %conn.id(), "refusing connection from released listener");
                    conn.close();
                    return None;
                }
                info!(id = %conn.id(), "remote connected");
                self.controllers.push(conn);
                None
            }
            LinkEvent::Open(id) => self
                .is_registered(id)
                .then_some(HostRequest::Snapshot(id)),
            LinkEvent::Data(id, value) => {
                if !self.is_registered(id) {
                    return None;
                }
                match Message::decode(&value)? {
                    Message::RemoteReady => Some(HostRequest::Snapshot(id)),
                    Message::Command(cmd) => {
                        debug!(%id, command = %cmd, "remote command");
                        Some(HostRequest::Command(id, cmd))
                    }
                    Message::State(_) => {
                        debug!(%id, "ignoring state from remote");
                        None
                    }
                }
            }
            LinkEvent::Closed(id) => {
                self.remove(id, "closed");
                None
            }
            LinkEvent::Error(id, e) => {
                if self.remove(id, "errored") {
                    debug!(%id, error = %e, "remote connection error");
                }
                None
            }
        }
    }

    /// Push a snapshot to every connected remote. Remotes whose send fails
    /// are dropped without affecting the rest.
    pub fn broadcast(&mut self, snapshot: &Snapshot) -> usize {
        let message = Message::State(snapshot.clone()).encode();
        let mut failed = Vec::new();
        let mut delivered = 0;
        for conn in &self.controllers {
            match conn.send(message.clone()) {
                Ok(()) => delivered += 1,
                Err(e) => {
                    debug!(id = %conn.id(), error = %e, "broadcast send failed");
                    failed.push(conn.id());
                }
            }
        }
        for id in failed {
            self.remove(id, "send failed");
        }
        delivered
    }

    /// Push a snapshot to one remote
    pub fn send_to(&mut self, id: ConnectionId, snapshot: &Snapshot) -> bool {
        let Some(conn) = self.controllers.iter().find(|c| c.id() == id) else {
            return false;
        };
        match conn.send(Message::State(snapshot.clone()).encode()) {
            Ok(()) => true,
            Err(e) => {
                debug!(%id, error = %e, "snapshot send failed");
                self.remove(id, "send failed");
                false
            }
        }
    }

    /// Events from a listener released by `stop` or a restart are stale
    fn is_live_listener(&self, id: ListenerId) -> bool {
        self.listener.as_ref().is_some_and(|l| l.id() == id)
    }

    fn is_registered(&self, id: ConnectionId) -> bool {
        self.controllers.iter().any(|c| c.id() == id)
    }

    fn remove(&mut self, id: ConnectionId, reason: &str) -> bool {
        let Some(pos) = self.controllers.iter().position(|c| c.id() == id) else {
            return false;
        };
        let conn = self.controllers.remove(pos);
        conn.close();
        info!(%id, reason, remaining = self.controllers.len(), "remote removed");
        true
    }

    fn release(&mut self) {
        for conn in self.controllers.drain(..) {
            conn.close();
        }
        if let Some(listener) = self.listener.take() {
            listener.close();
        }
    }
}

impl Drop for SessionHost {
    fn drop(&mut self) {
        self.release();
    }
}
