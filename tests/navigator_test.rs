//! Channel Navigator Tests
//!
//! Filtering, url-anchored next/prev and the flags pushed to remotes.

use channel_remote::models::{Channel, ChannelList, ALL_GROUPS};
use channel_remote::navigator::{ChannelNavigator, NavFlags};

fn abc() -> ChannelList {
    ChannelList::new(vec![
        Channel::new("Alpha News", "http://s/a", "News"),
        Channel::new("Beta Sports", "http://s/b", "Sports"),
        Channel::new("Gamma News", "http://s/c", "News"),
    ])
}

// =============================================================================
// Next / Prev
// =============================================================================

#[test]
fn test_walk_forward_and_back() {
    let mut nav = ChannelNavigator::new(abc());
    assert_eq!(nav.flags(), NavFlags::default());

    nav.select_url("http://s/a").unwrap();
    assert_eq!(
        nav.flags(),
        NavFlags {
            has_next: true,
            has_prev: false
        }
    );

    assert_eq!(nav.next().unwrap().url, "http://s/b");
    assert!(nav.has_next());
    assert!(nav.has_prev());

    assert_eq!(nav.next().unwrap().url, "http://s/c");
    assert!(!nav.has_next());
    assert!(nav.next().is_none());
    assert_eq!(nav.selected().unwrap().url, "http://s/c");

    assert_eq!(nav.prev().unwrap().url, "http://s/b");
    assert_eq!(nav.prev().unwrap().url, "http://s/a");
    assert!(nav.prev().is_none());
}

#[test]
fn test_nothing_selected_means_no_navigation() {
    let mut nav = ChannelNavigator::new(abc());
    assert!(nav.next().is_none());
    assert!(nav.prev().is_none());
    assert!(nav.selected().is_none());
}

#[test]
fn test_empty_list() {
    let mut nav = ChannelNavigator::new(ChannelList::default());
    assert!(nav.filtered().is_empty());
    assert!(nav.select_url("http://s/a").is_none());
    assert_eq!(nav.flags(), NavFlags::default());
}

// =============================================================================
// Filtering
// =============================================================================

#[test]
fn test_group_filter_reanchors_navigation() {
    let mut nav = ChannelNavigator::new(abc());
    nav.select_url("http://s/a").unwrap();
    nav.set_group("News");

    // b is filtered out, so next from a jumps straight to c
    assert_eq!(nav.filtered().len(), 2);
    assert_eq!(nav.next().unwrap().url, "http://s/c");
    assert!(!nav.has_next());
}

#[test]
fn test_selection_outside_filter_has_no_neighbours() {
    let mut nav = ChannelNavigator::new(abc());
    nav.select_url("http://s/b").unwrap();
    nav.set_search("news");

    assert_eq!(nav.selected().unwrap().url, "http://s/b");
    assert!(nav.position().is_none());
    assert_eq!(nav.flags(), NavFlags::default());
    assert!(nav.next().is_none());

    nav.set_search("");
    assert_eq!(nav.position(), Some(1));
}

#[test]
fn test_search_is_case_insensitive() {
    let mut nav = ChannelNavigator::new(abc());
    nav.set_search("GAMMA");
    let names: Vec<_> = nav.filtered().iter().map(|c| c.name.clone()).collect();
    assert_eq!(names, vec!["Gamma News"]);

    nav.set_group(ALL_GROUPS);
    nav.set_search("");
    assert_eq!(nav.filtered().len(), 3);
}

#[test]
fn test_duplicate_urls_anchor_on_first() {
    let list = ChannelList::new(vec![
        Channel::new("One", "http://s/1", "A"),
        Channel::new("Dup", "http://s/dup", "A"),
        Channel::new("Two", "http://s/2", "A"),
        Channel::new("Dup again", "http://s/dup", "A"),
    ]);
    let mut nav = ChannelNavigator::new(list);
    nav.select_url("http://s/dup").unwrap();
    assert_eq!(nav.position(), Some(1));
    assert_eq!(nav.next().unwrap().url, "http://s/2");
}

// =============================================================================
// Change Tracking
// =============================================================================

#[test]
fn test_change_flag() {
    let mut nav = ChannelNavigator::new(abc());
    assert!(!nav.take_changed());

    nav.select_url("http://s/a");
    assert!(nav.take_changed());
    assert!(!nav.take_changed());

    // Reselecting the same channel is not a change
    nav.select_url("http://s/a");
    assert!(!nav.take_changed());

    // A filter that changes the flags is
    nav.set_group("Sports");
    assert!(nav.take_changed());
}

#[test]
fn test_replacing_channels_keeps_selection() {
    let mut nav = ChannelNavigator::new(abc());
    nav.select_url("http://s/c").unwrap();
    nav.set_channels(ChannelList::new(vec![
        Channel::new("Gamma News", "http://s/c", "News"),
        Channel::new("Delta", "http://s/d", "News"),
    ]));
    assert_eq!(nav.position(), Some(0));
    assert_eq!(nav.next().unwrap().url, "http://s/d");
}
