//! Playback infrastructure
//!
//! - Engine: boundary to the external adaptive-stream engine
//! - Playback: the host's authoritative playback state machine
//! - Headless: simulated engine for hosts without a media stack

pub mod engine;
pub mod headless;
pub mod playback;

pub use engine::{
    EngineEvent, EngineEventKind, EngineFactory, EngineId, EngineSink, ErrorKind, PlayRejected,
    StreamEngine,
};
pub use headless::HeadlessEngine;
pub use playback::Playback;
