//! Peer link boundary
//!
//! A [`PeerLink`] establishes reliable, ordered, bidirectional channels
//! between two peers given a session identifier. Everything it observes is
//! posted as a [`LinkEvent`] into the owning event loop's queue; the
//! session host and controller never see the transport directly.

use serde_json::Value;
use std::fmt;
use thiserror::Error;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::remote::session::SessionId;

/// Identity of one end of a peer connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(pub Uuid);

impl ConnectionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Short form is plenty for logs
        let s = self.0.simple().to_string();
        write!(f, "{}", &s[..8])
    }
}

/// Identity of one bound listener; a rebind gets a fresh one
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(pub Uuid);

impl ListenerId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ListenerId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ListenerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = self.0.simple().to_string();
        write!(f, "{}", &s[..8])
    }
}

/// Errors from peer link operations
#[derive(Debug, Error)]
pub enum LinkError {
    #[error("session id {0} is already in use")]
    UnavailableId(String),
    #[error("no host is listening on session {0}")]
    PeerUnavailable(String),
    #[error("connection closed")]
    Closed,
    #[error("transport error: {0}")]
    Io(#[from] std::io::Error),
    #[error("protocol error: {0}")]
    Protocol(String),
}

/// Everything a link reports back to its owner
pub enum LinkEvent {
    /// The listener's identifier is live
    ListenerReady(ListenerId),
    /// The listener could not be established or died
    ListenerError(ListenerId, LinkError),
    /// A remote peer connected to the listener
    Incoming(ListenerId, Box<dyn Connection>),
    /// The connection can carry messages
    Open(ConnectionId),
    Data(ConnectionId, Value),
    Closed(ConnectionId),
    Error(ConnectionId, LinkError),
}

impl fmt::Debug for LinkEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LinkEvent::ListenerReady(id) => write!(f, "ListenerReady({})", id),
            LinkEvent::ListenerError(id, e) => write!(f, "ListenerError({}, {})", id, e),
            LinkEvent::Incoming(id, conn) => write!(f, "Incoming({}, {})", id, conn.id()),
            LinkEvent::Open(id) => write!(f, "Open({})", id),
            LinkEvent::Data(id, value) => write!(f, "Data({}, {})", id, value),
            LinkEvent::Closed(id) => write!(f, "Closed({})", id),
            LinkEvent::Error(id, e) => write!(f, "Error({}, {})", id, e),
        }
    }
}

/// Queue a link posts its events into
pub type LinkEvents = mpsc::UnboundedSender<LinkEvent>;

/// One end of a peer connection
pub trait Connection: Send {
    fn id(&self) -> ConnectionId;
    /// Queue a message for delivery
    fn send(&self, message: Value) -> Result<(), LinkError>;
    /// Close both directions; a `Closed` event follows
    fn close(&self);
    fn is_open(&self) -> bool;
}

/// A live listener bound to a session identifier
pub trait Listener: Send {
    /// Tag carried by every event this listener posts
    fn id(&self) -> ListenerId;
    fn session_id(&self) -> &SessionId;
    /// Stop accepting connections and release the identifier
    fn close(&self);
}

/// The signaling/transport substrate
pub trait PeerLink: Send {
    /// Bind a listener to `id`; `ListenerReady` or `ListenerError` follows
    fn listen(&mut self, id: &SessionId, events: LinkEvents)
        -> Result<Box<dyn Listener>, LinkError>;

    /// Open a connection to the host listening on `id`; `Open` or `Error`
    /// follows on the returned connection's id
    fn connect(&mut self, id: &SessionId, events: LinkEvents)
        -> Result<Box<dyn Connection>, LinkError>;
}
