//! Per-channel event filtering.
//!
//! Each channel's include/exclude lists are combined with the global lists. An event
//! is wanted if its name matches any `include_events` pattern or its repository matches
//! any `include_repos` pattern. Exclusions are checked afterwards and veto on either
//! axis, so an exclusion always beats an inclusion. Nothing matching means not wanted.

use tracing::debug;

use crate::base::config::{Channel, Filters, Pattern};

fn any_match<'a>(global: &'a [Pattern], channel: &'a [Pattern], candidate: &str) -> bool {
    global.iter().chain(channel).any(|p| p.matches(candidate))
}

/// Decide whether `channel` should receive the event identified by `event_name` and `repo_name`.
///
/// Both names are expected to be lowercased already.
pub fn wants_event(global: &Filters, channel: &Channel, event_name: &str, repo_name: &str) -> bool {
    debug!("considering {} message for {} on channel {}", event_name, repo_name, channel.name);

    let local = &channel.filters;
    let mut want = false;

    if any_match(&global.include_events, &local.include_events, event_name) {
        debug!("found event in include_events");
        want = true;
    }

    if any_match(&global.include_repos, &local.include_repos, repo_name) {
        debug!("found repo in include_repos");
        want = true;
    }

    if any_match(&global.exclude_events, &local.exclude_events, event_name) {
        debug!("found event in exclude_events");
        want = false;
    }

    if any_match(&global.exclude_repos, &local.exclude_repos, repo_name) {
        debug!("found repo in exclude_repos");
        want = false;
    }

    want
}

// Tests.
