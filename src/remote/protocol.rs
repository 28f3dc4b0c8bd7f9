//! Remote control wire protocol
//!
//! Three message kinds travel over a peer link, each a flat JSON object
//! tagged by `type`:
//!
//! ```text
//! host -> remote   {"type":"state","channel":{..},"player":{..},"nav":{..}}
//! remote -> host   {"type":"command","command":"set-volume","payload":{"value":0.4}}
//! remote -> host   {"type":"remote-ready"}
//! ```
//!
//! There are no acknowledgements or sequence numbers. Every state message
//! is a full snapshot, so a remote that misses one catches up on the next.
//! Malformed input is dropped without a reply.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use tracing::debug;

use crate::models::{Channel, PlayerState};
use crate::navigator::NavFlags;

// =============================================================================
// Snapshot
// =============================================================================

/// Player fields mirrored to remotes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerSnapshot {
    pub is_playing: bool,
    pub is_loading: bool,
    pub volume: f64,
    pub is_muted: bool,
    #[serde(default)]
    pub error: Option<String>,
}

impl Default for PlayerSnapshot {
    fn default() -> Self {
        PlayerSnapshot::from(&PlayerState::default())
    }
}

impl From<&PlayerState> for PlayerSnapshot {
    fn from(state: &PlayerState) -> Self {
        Self {
            is_playing: state.is_playing,
            is_loading: state.is_loading,
            volume: state.volume,
            is_muted: state.is_muted,
            error: state.error.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NavSnapshot {
    pub has_next: bool,
    pub has_prev: bool,
}

impl From<NavFlags> for NavSnapshot {
    fn from(flags: NavFlags) -> Self {
        Self {
            has_next: flags.has_next,
            has_prev: flags.has_prev,
        }
    }
}

/// Full `{channel, player, nav}` view broadcast by the host
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub channel: Option<Channel>,
    pub player: PlayerSnapshot,
    pub nav: NavSnapshot,
}

impl Snapshot {
    pub fn new(channel: Option<Channel>, player: &PlayerState, nav: NavFlags) -> Self {
        Self {
            channel,
            player: player.into(),
            nav: nav.into(),
        }
    }
}

// =============================================================================
// Commands
// =============================================================================

/// Player commands a remote may issue
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Command {
    Next,
    Prev,
    TogglePlay,
    Stop,
    ToggleMute,
    VolumeUp,
    VolumeDown,
    SetVolume(f64),
}

impl Command {
    /// Wire name of the command
    pub fn name(&self) -> &'static str {
        match self {
            Command::Next => "next",
            Command::Prev => "prev",
            Command::TogglePlay => "toggle-play",
            Command::Stop => "stop",
            Command::ToggleMute => "toggle-mute",
            Command::VolumeUp => "volume-up",
            Command::VolumeDown => "volume-down",
            Command::SetVolume(_) => "set-volume",
        }
    }

    /// Build a command from its wire parts. Unknown names and a
    /// `set-volume` without a finite numeric value yield None.
    pub fn from_wire(name: &str, payload: Option<&Value>) -> Option<Self> {
        let command = match name {
            "next" => Command::Next,
            "prev" => Command::Prev,
            "toggle-play" => Command::TogglePlay,
            "stop" => Command::Stop,
            "toggle-mute" => Command::ToggleMute,
            "volume-up" => Command::VolumeUp,
            "volume-down" => Command::VolumeDown,
            "set-volume" => {
                let value = payload?
                    .get("value")?
                    .as_f64()
                    .filter(|v| v.is_finite())?;
                Command::SetVolume(value)
            }
            _ => return None,
        };
        Some(command)
    }

    /// Parse the short forms typed at a remote prompt
    pub fn parse_input(input: &str) -> Option<Self> {
        let input = input.trim().to_lowercase();
        let mut parts = input.split_whitespace();
        let head = parts.next()?;
        match head {
            "n" | "next" => Some(Command::Next),
            "p" | "prev" => Some(Command::Prev),
            "space" | "play" | "pause" | "toggle-play" => Some(Command::TogglePlay),
            "s" | "stop" => Some(Command::Stop),
            "m" | "mute" | "toggle-mute" => Some(Command::ToggleMute),
            "+" | "up" | "volume-up" => Some(Command::VolumeUp),
            "-" | "down" | "volume-down" => Some(Command::VolumeDown),
            "vol" | "volume" | "set-volume" => {
                let raw = parts.next()?;
                let value = match raw.strip_suffix('%') {
                    Some(pct) => pct.parse::<f64>().ok()? / 100.0,
                    None => raw.parse::<f64>().ok()?,
                };
                value.is_finite().then_some(Command::SetVolume(value))
            }
            _ => None,
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::SetVolume(v) => write!(f, "{} {:.2}", self.name(), v),
            other => write!(f, "{}", other.name()),
        }
    }
}

// =============================================================================
// Messages
// =============================================================================

/// A decoded protocol message
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    State(Snapshot),
    Command(Command),
    RemoteReady,
}

/// Wire representation
#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
enum Frame {
    State(Snapshot),
    Command {
        command: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        payload: Option<Value>,
    },
    RemoteReady,
}

impl Message {
    /// Encode into the structured wire object
    pub fn encode(&self) -> Value {
        let frame = match self {
            Message::State(snapshot) => Frame::State(snapshot.clone()),
            Message::Command(cmd) => Frame::Command {
                command: cmd.name().to_string(),
                payload: match cmd {
                    Command::SetVolume(v) => Some(serde_json::json!({ "value": v })),
                    _ => None,
                },
            },
            Message::RemoteReady => Frame::RemoteReady,
        };
        // Frames hold only strings, numbers and bools; serializing cannot fail
        serde_json::to_value(frame).unwrap_or(Value::Null)
    }

    /// Decode a wire object; anything malformed is dropped
    pub fn decode(value: &Value) -> Option<Self> {
        let frame = match Frame::deserialize(value) {
            Ok(frame) => frame,
            Err(e) => {
                debug!(error = %e, "dropping malformed message");
                return None;
            }
        };
        match frame {
            Frame::State(snapshot) => Some(Message::State(snapshot)),
            Frame::RemoteReady => Some(Message::RemoteReady),
            Frame::Command { command, payload } => {
                let decoded = Command::from_wire(&command, payload.as_ref());
                if decoded.is_none() {
                    debug!(%command, "dropping invalid command");
                }
                decoded.map(Message::Command)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_remote_ready_wire_shape() {
        assert_eq!(Message::RemoteReady.encode(), json!({"type": "remote-ready"}));
    }

    #[test]
    fn test_command_wire_shape() {
        assert_eq!(
            Message::Command(Command::SetVolume(0.25)).encode(),
            json!({"type": "command", "command": "set-volume", "payload": {"value": 0.25}})
        );
        assert_eq!(
            Message::Command(Command::TogglePlay).encode(),
            json!({"type": "command", "command": "toggle-play"})
        );
    }

    #[test]
    fn test_set_volume_requires_number() {
        let msg = json!({"type": "command", "command": "set-volume", "payload": {"value": "loud"}});
        assert_eq!(Message::decode(&msg), None);
        let msg = json!({"type": "command", "command": "set-volume"});
        assert_eq!(Message::decode(&msg), None);
    }

    #[test]
    fn test_unknown_command_dropped() {
        let msg = json!({"type": "command", "command": "self-destruct"});
        assert_eq!(Message::decode(&msg), None);
        assert_eq!(Message::decode(&json!({"type": "bogus"})), None);
        assert_eq!(Message::decode(&json!("hello")), None);
    }

    #[test]
    fn test_parse_input() {
        assert_eq!(Command::parse_input("n"), Some(Command::Next));
        assert_eq!(Command::parse_input(" MUTE "), Some(Command::ToggleMute));
        assert_eq!(Command::parse_input("vol 40%"), Some(Command::SetVolume(0.4)));
        assert_eq!(Command::parse_input("vol 0.7"), Some(Command::SetVolume(0.7)));
        assert_eq!(Command::parse_input("vol"), None);
        assert_eq!(Command::parse_input("dance"), None);
    }
}
