//! Stream engine boundary
//!
//! The adaptive-bitrate engine (manifest fetching, segment loading,
//! decoding) lives outside this crate. The playback state machine drives it
//! through [`StreamEngine`] and observes it through [`EngineEvent`]s posted
//! into an event queue.

use std::fmt;
use thiserror::Error;
use tokio::sync::mpsc;

/// Identity of one engine instance. Events from a released instance carry a
/// stale id and are ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EngineId(pub u64);

impl fmt::Display for EngineId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "engine#{}", self.0)
    }
}

/// Engine error classes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Network,
    Media,
    Other,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::Network => write!(f, "network"),
            ErrorKind::Media => write!(f, "media"),
            ErrorKind::Other => write!(f, "other"),
        }
    }
}

/// Lifecycle events emitted by an engine instance
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEventKind {
    /// Manifest parsed, media can be started
    ManifestReady,
    Error {
        kind: ErrorKind,
        fatal: bool,
        details: String,
    },
    Playing,
    Paused,
    /// Playback stalled waiting for data
    Waiting,
    CanPlay,
    /// Current position in seconds
    TimeUpdate(f64),
    /// Duration in seconds (0 or infinite for live streams)
    LoadedMetadata { duration: f64 },
}

#[derive(Debug, Clone, PartialEq)]
pub struct EngineEvent {
    pub engine: EngineId,
    pub kind: EngineEventKind,
}

/// Sending half handed to an engine on attach
#[derive(Debug, Clone)]
pub struct EngineSink {
    engine: EngineId,
    tx: mpsc::UnboundedSender<EngineEvent>,
}

impl EngineSink {
    pub fn new(engine: EngineId, tx: mpsc::UnboundedSender<EngineEvent>) -> Self {
        Self { engine, tx }
    }

    pub fn engine(&self) -> EngineId {
        self.engine
    }

    /// Post an event; silently dropped once the event loop is gone
    pub fn emit(&self, kind: EngineEventKind) {
        let _ = self.tx.send(EngineEvent {
            engine: self.engine,
            kind,
        });
    }
}

/// Autoplay refused by the playback environment. Not a failure.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("playback start rejected: {0}")]
pub struct PlayRejected(pub String);

/// The external playback engine
pub trait StreamEngine: Send {
    /// Route this instance's events to the sink
    fn attach(&mut self, sink: EngineSink);
    /// Start loading a source
    fn load(&mut self, url: &str);
    /// Start or resume playback
    fn play(&mut self) -> Result<(), PlayRejected>;
    fn pause(&mut self);
    fn seek(&mut self, position: f64);
    fn set_volume(&mut self, volume: f64);
    fn set_muted(&mut self, muted: bool);
    /// Reload the current source after a network failure
    fn reload(&mut self);
    /// In-place decoder recovery after a media failure
    fn recover_media(&mut self);
    /// Stop, clear the source and drop the sink
    fn destroy(&mut self);
}

/// Creates a fresh engine per channel
pub trait EngineFactory: Send {
    fn create(&mut self) -> Box<dyn StreamEngine>;
}

impl<F> EngineFactory for F
where
    F: FnMut() -> Box<dyn StreamEngine> + Send,
{
    fn create(&mut self) -> Box<dyn StreamEngine> {
        self()
    }
}
