//! Wire Protocol Tests
//!
//! The JSON shapes exchanged between host and remotes.

use channel_remote::models::{Channel, PlayerState};
use channel_remote::navigator::NavFlags;
use channel_remote::remote::{Command, Message, Snapshot};
use serde_json::json;

fn snapshot() -> Snapshot {
    let player = PlayerState {
        is_playing: true,
        volume: 0.4,
        current_time: 12.0,
        ..PlayerState::default()
    };
    Snapshot::new(
        Some(Channel::new("Alpha", "http://s/a", "News").with_logo("http://l/a.png")),
        &player,
        NavFlags {
            has_next: true,
            has_prev: false,
        },
    )
}

// =============================================================================
// State Messages
// =============================================================================

#[test]
fn test_state_wire_shape() {
    let wire = Message::State(snapshot()).encode();
    assert_eq!(
        wire,
        json!({
            "type": "state",
            "channel": {
                "name": "Alpha",
                "url": "http://s/a",
                "logo": "http://l/a.png",
                "group": "News"
            },
            "player": {
                "isPlaying": true,
                "isLoading": false,
                "volume": 0.4,
                "isMuted": false,
                "error": null
            },
            "nav": {"hasNext": true, "hasPrev": false}
        })
    );
}

#[test]
fn test_state_survives_the_wire() {
    let original = Message::State(snapshot());
    let text = serde_json::to_string(&original.encode()).unwrap();
    let value: serde_json::Value = serde_json::from_str(&text).unwrap();
    assert_eq!(Message::decode(&value), Some(original));
}

#[test]
fn test_snapshot_leaves_out_position() {
    let wire = Message::State(snapshot()).encode();
    assert!(wire["player"].get("currentTime").is_none());
    assert!(wire["player"].get("duration").is_none());
}

#[test]
fn test_state_without_channel() {
    let wire = json!({
        "type": "state",
        "channel": null,
        "player": {"isPlaying": false, "isLoading": false, "volume": 1.0, "isMuted": false},
        "nav": {"hasNext": false, "hasPrev": false}
    });
    match Message::decode(&wire) {
        Some(Message::State(snapshot)) => {
            assert!(snapshot.channel.is_none());
            assert!(snapshot.player.error.is_none());
        }
        other => panic!("expected state, got {:?}", other),
    }
}

// =============================================================================
// Commands
// =============================================================================

#[test]
fn test_every_command_decodes_by_name() {
    for command in [
        Command::Next,
        Command::Prev,
        Command::TogglePlay,
        Command::Stop,
        Command::ToggleMute,
        Command::VolumeUp,
        Command::VolumeDown,
    ] {
        let wire = json!({"type": "command", "command": command.name()});
        assert_eq!(Message::decode(&wire), Some(Message::Command(command)));
    }
}

#[test]
fn test_set_volume_payload() {
    let wire = json!({"type": "command", "command": "set-volume", "payload": {"value": 0.4}});
    assert_eq!(
        Message::decode(&wire),
        Some(Message::Command(Command::SetVolume(0.4)))
    );
}

#[test]
fn test_remote_ready() {
    assert_eq!(
        Message::decode(&json!({"type": "remote-ready"})),
        Some(Message::RemoteReady)
    );
}

// =============================================================================
// Malformed Input
// =============================================================================

#[test]
fn test_malformed_messages_are_dropped() {
    let junk = [
        json!(null),
        json!(42),
        json!([]),
        json!({}),
        json!({"type": 7}),
        json!({"type": "state"}),
        json!({"type": "state", "channel": null, "player": {}, "nav": {}}),
        json!({"type": "command"}),
        json!({"type": "command", "command": 3}),
        json!({"type": "command", "command": "set-volume", "payload": 0.5}),
        json!({"type": "command", "command": "eject"}),
    ];
    for value in junk {
        assert_eq!(Message::decode(&value), None, "decoded {}", value);
    }
}
