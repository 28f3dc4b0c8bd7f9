//! Clients for external resources
//!
//! - Playlist: extended M3U channel lists over HTTP or from disk

pub mod playlist;

pub use playlist::{parse_m3u, PlaylistClient, PlaylistError};
