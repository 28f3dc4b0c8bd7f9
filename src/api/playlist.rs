//! Playlist client
//!
//! Loads extended M3U channel playlists from a URL or a local file.
//!
//! ```text
//! #EXTM3U
//! #EXTINF:-1 tvg-logo="http://logo/bbc.png" group-title="News",BBC News
//! http://streams.example/bbc/index.m3u8
//! ```

use std::path::Path;
use thiserror::Error;
use tracing::{debug, info};

use crate::models::{Channel, ChannelList, DEFAULT_GROUP};

/// Errors from playlist loading
#[derive(Debug, Error)]
pub enum PlaylistError {
    #[error("Playlist request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),
    #[error("Playlist server returned status {0}")]
    ServerError(u16),
    #[error("Could not read playlist: {0}")]
    Io(#[from] std::io::Error),
    #[error("Playlist contains no channels")]
    Empty,
}

/// Parse an extended M3U playlist
///
/// `#EXTINF` lines carry the display name after the last comma and
/// optional `tvg-logo` / `group-title` attributes; the next non-directive
/// line is the stream url. Entries without a url are dropped.
pub fn parse_m3u(text: &str) -> ChannelList {
    let attr_re = regex::Regex::new(r#"([A-Za-z0-9_-]+)="([^"]*)""#).ok();
    let mut channels = Vec::new();
    let mut pending: Option<Channel> = None;

    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        if let Some(info) = line.strip_prefix("#EXTINF:") {
            let (meta, name) = match info.rfind(',') {
                Some(idx) => (&info[..idx], info[idx + 1..].trim()),
                None => (info, ""),
            };

            let mut logo = None;
            let mut group = None;
            if let Some(re) = &attr_re {
                for caps in re.captures_iter(meta) {
                    let value = caps[2].trim();
                    if value.is_empty() {
                        continue;
                    }
                    match &caps[1] {
                        "tvg-logo" => logo = Some(value.to_string()),
                        "group-title" => group = Some(value.to_string()),
                        _ => {}
                    }
                }
            }

            pending = Some(Channel {
                name: name.to_string(),
                url: String::new(),
                logo,
                group: group.unwrap_or_else(|| DEFAULT_GROUP.to_string()),
            });
            continue;
        }

        if line.starts_with('#') {
            continue;
        }

        if let Some(mut channel) = pending.take() {
            if channel.name.is_empty() {
                channel.name = line.to_string();
            }
            channel.url = line.to_string();
            channels.push(channel);
        } else {
            debug!(url = line, "skipping url without #EXTINF");
        }
    }

    ChannelList::new(channels)
}

/// Fetches and parses channel playlists
pub struct PlaylistClient {
    client: reqwest::Client,
}

impl PlaylistClient {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }

    /// Load from an http(s) url or a local path
    pub async fn load(&self, source: &str) -> Result<ChannelList, PlaylistError> {
        if source.starts_with("http://") || source.starts_with("https://") {
            self.fetch(source).await
        } else {
            Self::read_file(Path::new(source)).await
        }
    }

    /// Download a playlist
    pub async fn fetch(&self, url: &str) -> Result<ChannelList, PlaylistError> {
        info!(%url, "fetching playlist");
        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(PlaylistError::ServerError(status.as_u16()));
        }
        let body = response.text().await?;
        non_empty(parse_m3u(&body))
    }

    /// Read a playlist from disk
    pub async fn read_file(path: &Path) -> Result<ChannelList, PlaylistError> {
        let body = tokio::fs::read_to_string(path).await?;
        non_empty(parse_m3u(&body))
    }
}

impl Default for PlaylistClient {
    fn default() -> Self {
        Self::new()
    }
}

fn non_empty(list: ChannelList) -> Result<ChannelList, PlaylistError> {
    if list.is_empty() {
        Err(PlaylistError::Empty)
    } else {
        Ok(list)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_attributes() {
        let list = parse_m3u(
            "#EXTM3U\n#EXTINF:-1 tvg-id=\"x\" tvg-logo=\"http://l/a.png\" group-title=\"News\",Alpha TV\nhttp://s/a.m3u8\n",
        );
        assert_eq!(list.len(), 1);
        let ch = list.get(0).unwrap();
        assert_eq!(ch.name, "Alpha TV");
        assert_eq!(ch.url, "http://s/a.m3u8");
        assert_eq!(ch.logo.as_deref(), Some("http://l/a.png"));
        assert_eq!(ch.group, "News");
    }

    #[test]
    fn test_missing_group_defaults() {
        let list = parse_m3u("#EXTINF:-1,Beta\nhttp://s/b.m3u8");
        assert_eq!(list.get(0).unwrap().group, DEFAULT_GROUP);
        assert!(list.get(0).unwrap().logo.is_none());
    }

    #[test]
    fn test_comma_in_attributes_uses_last_comma() {
        let list = parse_m3u("#EXTINF:-1 group-title=\"A,B\",Gamma\nhttp://s/g");
        let ch = list.get(0).unwrap();
        assert_eq!(ch.name, "Gamma");
    }

    #[test]
    fn test_dangling_extinf_dropped() {
        let list = parse_m3u("#EXTINF:-1,One\nhttp://s/1\n#EXTINF:-1,Two\n");
        assert_eq!(list.len(), 1);
    }

    #[test]
    fn test_other_directives_skipped() {
        let list = parse_m3u("#EXTM3U\n#EXTINF:-1,One\n#EXTVLCOPT:http-user-agent=x\nhttp://s/1\n");
        assert_eq!(list.len(), 1);
        assert_eq!(list.get(0).unwrap().url, "http://s/1");
    }
}
