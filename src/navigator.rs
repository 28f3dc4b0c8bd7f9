//! Channel navigation over the filtered view
//!
//! The navigator keeps the source list, the current search/group filter and
//! the selected channel. "Next" and "previous" are always resolved against
//! the filtered view, anchored on the selected channel's url.

use tracing::debug;

use crate::models::{Channel, ChannelList, ALL_GROUPS};

/// Navigation flags sent to remotes alongside each snapshot
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NavFlags {
    pub has_next: bool,
    pub has_prev: bool,
}

/// Filtered channel list with a url-anchored selection
#[derive(Debug, Clone)]
pub struct ChannelNavigator {
    list: ChannelList,
    search: String,
    group: String,
    /// Indices into `list` matching the current filter
    filtered: Vec<usize>,
    selected: Option<Channel>,
    changed: bool,
}

impl ChannelNavigator {
    pub fn new(list: ChannelList) -> Self {
        let mut nav = Self {
            list,
            search: String::new(),
            group: ALL_GROUPS.to_string(),
            filtered: Vec::new(),
            selected: None,
            changed: false,
        };
        nav.refilter();
        nav
    }

    /// Replace the source list; the selection is kept even if it vanished
    pub fn set_channels(&mut self, list: ChannelList) {
        self.list = list;
        self.refilter();
    }

    pub fn set_search(&mut self, search: impl Into<String>) {
        self.search = search.into();
        self.refilter();
    }

    /// Set the group filter ("All" matches everything)
    pub fn set_group(&mut self, group: impl Into<String>) {
        self.group = group.into();
        self.refilter();
    }

    pub fn search(&self) -> &str {
        &self.search
    }

    pub fn group(&self) -> &str {
        &self.group
    }

    pub fn channels(&self) -> &ChannelList {
        &self.list
    }

    /// The filtered view in list order
    pub fn filtered(&self) -> Vec<&Channel> {
        self.filtered
            .iter()
            .filter_map(|&i| self.list.get(i))
            .collect()
    }

    pub fn selected(&self) -> Option<&Channel> {
        self.selected.as_ref()
    }

    /// Select a channel. Returns false if it was already selected.
    pub fn select(&mut self, channel: Channel) -> bool {
        if self.selected.as_ref().map(|c| &c.url) == Some(&channel.url) {
            return false;
        }
        debug!(url = %channel.url, name = %channel.name, "channel selected");
        self.selected = Some(channel);
        self.changed = true;
        true
    }

    /// Select the first channel in the source list with this url
    pub fn select_url(&mut self, url: &str) -> Option<Channel> {
        let channel = self.list.find(url)?.clone();
        self.select(channel.clone());
        Some(channel)
    }

    /// Position of the selected channel within the filtered view
    pub fn position(&self) -> Option<usize> {
        let url = &self.selected.as_ref()?.url;
        self.filtered
            .iter()
            .position(|&i| self.list.get(i).map(|c| &c.url) == Some(url))
    }

    pub fn has_next(&self) -> bool {
        matches!(self.position(), Some(pos) if pos + 1 < self.filtered.len())
    }

    pub fn has_prev(&self) -> bool {
        matches!(self.position(), Some(pos) if pos > 0)
    }

    pub fn flags(&self) -> NavFlags {
        NavFlags {
            has_next: self.has_next(),
            has_prev: self.has_prev(),
        }
    }

    /// Move to the next filtered channel; None at the end or when the
    /// selection is not in the filtered view
    pub fn next(&mut self) -> Option<Channel> {
        let pos = self.position()?;
        self.move_to(pos + 1)
    }

    /// Move to the previous filtered channel
    pub fn prev(&mut self) -> Option<Channel> {
        let pos = self.position()?;
        self.move_to(pos.checked_sub(1)?)
    }

    /// Returns and clears the change flag
    pub fn take_changed(&mut self) -> bool {
        std::mem::take(&mut self.changed)
    }

    fn move_to(&mut self, filtered_pos: usize) -> Option<Channel> {
        let index = *self.filtered.get(filtered_pos)?;
        let channel = self.list.get(index)?.clone();
        self.select(channel.clone());
        Some(channel)
    }

    fn refilter(&mut self) {
        let before = self.flags();
        self.filtered = self.list.filter_indices(&self.search, &self.group);
        if self.flags() != before {
            self.changed = true;
        }
    }
}

impl Default for ChannelNavigator {
    fn default() -> Self {
        Self::new(ChannelList::default())
    }
}
