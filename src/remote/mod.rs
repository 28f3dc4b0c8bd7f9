//! Remote control sessions
//!
//! - Protocol: the `state` / `command` / `remote-ready` messages
//! - Link: the peer transport boundary, with in-process and TCP transports
//! - Session: session codes and their persistence
//! - Host / Controller: the two ends of a session

pub mod controller;
pub mod host;
pub mod link;
pub mod memory;
pub mod protocol;
pub mod session;
pub mod tcp;

pub use controller::{ControllerStatus, ControllerView, SessionController};
pub use host::{HostRequest, SessionHost};
pub use link::{
    Connection, ConnectionId, LinkError, LinkEvent, LinkEvents, Listener, ListenerId, PeerLink,
};
pub use memory::MemoryBroker;
pub use protocol::{Command, Message, NavSnapshot, PlayerSnapshot, Snapshot};
pub use session::{MemoryStore, SessionId, SessionIdError, SessionStatus, SessionStore};
pub use tcp::TcpLink;
