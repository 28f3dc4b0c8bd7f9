//! channel-remote - Channel player with peer-to-peer remote control
//!
//! # Modules
//!
//! - `models` - Channels, playback phases and player state
//! - `navigator` - Search/group filtering and next/prev over a playlist
//! - `api` - Playlist loading (M3U over HTTP or from disk)
//! - `stream` - Engine boundary and the playback state machine
//! - `remote` - Session codes, wire protocol, transports, host and controller
//! - `app` - Host and remote event loops
//! - `config` - Persisted settings and session code
//! - `cli` / `commands` - Command line front end

pub mod api;
pub mod app;
pub mod cli;
pub mod commands;
pub mod config;
pub mod models;
pub mod navigator;
pub mod remote;
pub mod stream;

// Re-export commonly used types
pub use models::{Channel, ChannelList, PlaybackPhase, PlayerState};
pub use navigator::{ChannelNavigator, NavFlags};

pub use api::PlaylistClient;
pub use app::{HostApp, HostEvent, HostInput, RemoteApp, RemoteEvent, RemoteInput};
pub use config::Config;
pub use remote::{
    Command, ControllerStatus, ControllerView, MemoryBroker, SessionController, SessionHost,
    SessionId, SessionStatus, Snapshot, TcpLink,
};
pub use stream::{HeadlessEngine, Playback, StreamEngine};
