//! Core data models for channel-remote
//!
//! Channels, channel lists and the authoritative player state that the
//! host broadcasts to its remotes.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Wildcard group that matches every channel
pub const ALL_GROUPS: &str = "All";

/// Group assigned to playlist entries without a `group-title`
pub const DEFAULT_GROUP: &str = "Uncategorized";

/// Volume restored when unmuting from a stored volume of zero
pub const DEFAULT_UNMUTE_VOLUME: f64 = 0.5;

// =============================================================================
// Channel Models
// =============================================================================

/// A playable channel from a playlist
///
/// Identity is the `url`; two channels with the same url are the same
/// channel as far as navigation is concerned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Channel {
    pub name: String,
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logo: Option<String>,
    pub group: String,
}

impl Channel {
    pub fn new(name: impl Into<String>, url: impl Into<String>, group: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            logo: None,
            group: group.into(),
        }
    }

    /// Builder-style logo setter
    pub fn with_logo(mut self, logo: impl Into<String>) -> Self {
        self.logo = Some(logo.into());
        self
    }

    /// Case-insensitive substring match on the name plus exact group match
    pub fn matches(&self, search: &str, group: &str) -> bool {
        let group_ok = group == ALL_GROUPS || self.group == group;
        if !group_ok {
            return false;
        }
        search.is_empty() || self.name.to_lowercase().contains(&search.to_lowercase())
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}]", self.name, self.group)
    }
}

/// Ordered list of channels as parsed from a playlist
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChannelList {
    channels: Vec<Channel>,
}

impl ChannelList {
    pub fn new(channels: Vec<Channel>) -> Self {
        Self { channels }
    }

    pub fn len(&self) -> usize {
        self.channels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Channel> {
        self.channels.iter()
    }

    pub fn get(&self, index: usize) -> Option<&Channel> {
        self.channels.get(index)
    }

    /// First channel with the given url
    pub fn find(&self, url: &str) -> Option<&Channel> {
        self.channels.iter().find(|c| c.url == url)
    }

    /// "All" followed by every distinct group in first-seen order
    pub fn groups(&self) -> Vec<String> {
        let mut groups = vec![ALL_GROUPS.to_string()];
        for channel in &self.channels {
            if !groups.iter().any(|g| g == &channel.group) {
                groups.push(channel.group.clone());
            }
        }
        groups
    }

    /// Indices of channels matching the filter, in list order
    pub fn filter_indices(&self, search: &str, group: &str) -> Vec<usize> {
        self.channels
            .iter()
            .enumerate()
            .filter(|(_, c)| c.matches(search, group))
            .map(|(i, _)| i)
            .collect()
    }
}

impl From<Vec<Channel>> for ChannelList {
    fn from(channels: Vec<Channel>) -> Self {
        Self::new(channels)
    }
}

// =============================================================================
// Player Models
// =============================================================================

/// Coarse playback state of the host
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlaybackPhase {
    /// No channel selected
    #[default]
    Idle,
    /// Source attached, engine initializing
    Loading,
    Playing,
    Paused,
    /// Playing but starved of data
    Buffering,
    /// Unrecoverable engine error
    Errored,
}

impl PlaybackPhase {
    /// Phases in which direct player commands apply
    pub fn accepts_commands(&self) -> bool {
        matches!(
            self,
            PlaybackPhase::Playing | PlaybackPhase::Paused | PlaybackPhase::Buffering
        )
    }
}

impl fmt::Display for PlaybackPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlaybackPhase::Idle => write!(f, "Idle"),
            PlaybackPhase::Loading => write!(f, "Loading..."),
            PlaybackPhase::Playing => write!(f, "▶ Playing"),
            PlaybackPhase::Paused => write!(f, "⏸ Paused"),
            PlaybackPhase::Buffering => write!(f, "Buffering..."),
            PlaybackPhase::Errored => write!(f, "Error"),
        }
    }
}

/// Authoritative player state, owned by the host
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerState {
    pub is_playing: bool,
    pub is_loading: bool,
    /// Always within [0, 1]
    pub volume: f64,
    pub is_muted: bool,
    pub error: Option<String>,
    /// Seconds
    pub current_time: f64,
    /// Seconds
    pub duration: f64,
}

impl Default for PlayerState {
    fn default() -> Self {
        Self {
            is_playing: false,
            is_loading: false,
            volume: 1.0,
            is_muted: false,
            error: None,
            current_time: 0.0,
            duration: 0.0,
        }
    }
}

impl PlayerState {
    /// Format volume as percentage
    pub fn format_volume(&self) -> String {
        if self.is_muted {
            "muted".to_string()
        } else {
            format!("{}%", (self.volume * 100.0).round() as u8)
        }
    }

    /// Format position as HH:MM:SS
    pub fn format_position(&self) -> String {
        format_seconds(self.current_time)
    }
}

impl fmt::Display for PlayerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = if let Some(err) = &self.error {
            format!("Error: {}", err)
        } else if self.is_loading {
            "Loading...".to_string()
        } else if self.is_playing {
            "▶ Playing".to_string()
        } else {
            "⏸ Paused".to_string()
        };
        write!(f, "{} {} ({})", state, self.format_position(), self.format_volume())
    }
}

/// Clamp a volume into [0, 1]; NaN becomes 0
pub fn clamp_volume(v: f64) -> f64 {
    if v.is_nan() {
        0.0
    } else {
        v.clamp(0.0, 1.0)
    }
}

fn format_seconds(secs: f64) -> String {
    let total = if secs.is_finite() && secs > 0.0 {
        secs as u64
    } else {
        0
    };
    let hours = total / 3600;
    let mins = (total % 3600) / 60;
    let secs = total % 60;
    if hours > 0 {
        format!("{}:{:02}:{:02}", hours, mins, secs)
    } else {
        format!("{}:{:02}", mins, secs)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> ChannelList {
        ChannelList::new(vec![
            Channel::new("BBC News", "http://a/news.m3u8", "News"),
            Channel::new("Cartoon Time", "http://a/kids.m3u8", "Kids"),
            Channel::new("News 24", "http://a/n24.m3u8", "News"),
        ])
    }

    #[test]
    fn test_channel_matches_case_insensitive() {
        let c = Channel::new("BBC News", "u", "News");
        assert!(c.matches("bbc", ALL_GROUPS));
        assert!(c.matches("NEWS", "News"));
        assert!(!c.matches("bbc", "Kids"));
        assert!(c.matches("", ALL_GROUPS));
    }

    #[test]
    fn test_groups_first_seen_order() {
        assert_eq!(sample().groups(), vec!["All", "News", "Kids"]);
    }

    #[test]
    fn test_filter_indices() {
        let list = sample();
        assert_eq!(list.filter_indices("news", ALL_GROUPS), vec![0, 2]);
        assert_eq!(list.filter_indices("", "Kids"), vec![1]);
        assert!(list.filter_indices("zzz", ALL_GROUPS).is_empty());
    }

    #[test]
    fn test_player_state_serde_camel_case() {
        let json = serde_json::to_value(PlayerState::default()).unwrap();
        assert_eq!(json["isPlaying"], false);
        assert_eq!(json["isMuted"], false);
        assert_eq!(json["currentTime"], 0.0);
    }

    #[test]
    fn test_clamp_volume() {
        assert_eq!(clamp_volume(1.5), 1.0);
        assert_eq!(clamp_volume(-0.2), 0.0);
        assert_eq!(clamp_volume(0.3), 0.3);
        assert_eq!(clamp_volume(f64::NAN), 0.0);
    }

    #[test]
    fn test_player_state_display() {
        let mut state = PlayerState::default();
        state.is_playing = true;
        state.current_time = 3725.0;
        assert_eq!(state.to_string(), "▶ Playing 1:02:05 (100%)");
        state.is_muted = true;
        assert!(state.to_string().ends_with("(muted)"));
    }

    #[test]
    fn test_phase_accepts_commands() {
        assert!(PlaybackPhase::Playing.accepts_commands());
        assert!(PlaybackPhase::Buffering.accepts_commands());
        assert!(!PlaybackPhase::Idle.accepts_commands());
        assert!(!PlaybackPhase::Loading.accepts_commands());
    }
}
