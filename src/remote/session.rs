//! Session identifiers and persisted session state
//!
//! A session identifier is a short uppercase alphanumeric code addressing
//! one host's listener. It is generated once and persisted so remotes can
//! keep reusing the same code.

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Length of a session identifier
pub const SESSION_ID_LEN: usize = 6;

const ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Path segment in share links: `<origin>/remote/<id>`
const SHARE_PATH: &str = "/remote/";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SessionIdError {
    #[error("session code must be 6 characters, got {0}")]
    Length(usize),
    #[error("session code may only contain letters and digits")]
    Charset,
    #[error("not a remote share link: {0}")]
    NotAShareLink(String),
}

/// Short human-enterable session code, always stored uppercase
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SessionId(String);

impl SessionId {
    /// Generate a fresh random identifier
    pub fn generate() -> Self {
        let mut rng = rand::rng();
        let code = (0..SESSION_ID_LEN)
            .map(|_| ALPHABET[rng.random_range(0..ALPHABET.len())] as char)
            .collect();
        Self(code)
    }

    /// Parse user input; case-insensitive, surrounding whitespace ignored
    pub fn parse(input: &str) -> Result<Self, SessionIdError> {
        let code = input.trim();
        let len = code.chars().count();
        if len != SESSION_ID_LEN {
            return Err(SessionIdError::Length(len));
        }
        if !code.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(SessionIdError::Charset);
        }
        Ok(Self(code.to_ascii_uppercase()))
    }

    /// Extract the identifier from `<origin>/remote/<id>`
    pub fn from_share_url(url: &str) -> Result<Self, SessionIdError> {
        let (_, tail) = url
            .split_once(SHARE_PATH)
            .ok_or_else(|| SessionIdError::NotAShareLink(url.to_string()))?;
        let code = tail.split(['/', '?', '#']).next().unwrap_or_default();
        Self::parse(code)
    }

    /// Accept either a bare code or a share link
    pub fn parse_any(input: &str) -> Result<Self, SessionIdError> {
        if input.contains(SHARE_PATH) {
            Self::from_share_url(input)
        } else {
            Self::parse(input)
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Link a remote can open to reach this session
    pub fn share_url(&self, origin: &str) -> String {
        format!("{}{}{}", origin.trim_end_matches('/'), SHARE_PATH, self.0)
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for SessionId {
    type Err = SessionIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for SessionId {
    type Error = SessionIdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<SessionId> for String {
    fn from(id: SessionId) -> String {
        id.0
    }
}

/// Lifecycle of a host session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    #[default]
    Inactive,
    Connecting,
    Ready,
    Error,
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionStatus::Inactive => write!(f, "inactive"),
            SessionStatus::Connecting => write!(f, "connecting"),
            SessionStatus::Ready => write!(f, "ready"),
            SessionStatus::Error => write!(f, "error"),
        }
    }
}

// =============================================================================
// Persistence
// =============================================================================

/// One-key store for the host's session identifier
pub trait SessionStore: Send {
    fn load_session_id(&self) -> Option<String>;
    fn save_session_id(&mut self, id: &SessionId);
}

/// Load the persisted identifier, generating and saving one if absent or
/// unreadable
pub fn load_or_create(store: &mut dyn SessionStore) -> SessionId {
    if let Some(id) = store
        .load_session_id()
        .and_then(|raw| SessionId::parse(&raw).ok())
    {
        return id;
    }
    let id = SessionId::generate();
    store.save_session_id(&id);
    id
}

/// In-memory store, for tests and throwaway hosts
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    value: Option<String>,
    pub writes: usize,
}

impl MemoryStore {
    pub fn with_value(value: impl Into<String>) -> Self {
        Self {
            value: Some(value.into()),
            writes: 0,
        }
    }
}

impl SessionStore for MemoryStore {
    fn load_session_id(&self) -> Option<String> {
        self.value.clone()
    }

    fn save_session_id(&mut self, id: &SessionId) {
        self.value = Some(id.to_string());
        self.writes += 1;
    }
}
