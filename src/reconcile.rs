// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::collections::HashSet;

use chrono::{NaiveDate, Utc};
use tracing::{debug, info};

use crate::error::ReconcileError;
use crate::feed::{LinkRel, ParsedEntry};
use crate::library::Library;
use crate::model::{Episode, Feed, NewEpisode, epoch_date};
use crate::store::FeedStore;

const NO_TITLE: &str = "No title found";
const NO_DESCRIPTION: &str = "No description found";

/// Result of merging a feed's entries into its stored episodes
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileOutcome {
    /// Episodes created by this pass, newest first
    pub new_episodes: Vec<Episode>,
    /// Previously stored episodes removed by retention trimming
    pub evicted_episodes: Vec<Episode>,
    /// Number of episodes the feed keeps after this pass
    pub retained: usize,
    /// New entries that fell outside the retention window and were never stored
    pub discarded: usize,
}

/// An episode already in the store or one discovered by this pass
enum Slot {
    Stored(Episode),
    Candidate(NewEpisode),
}

impl Slot {
    fn episode_date(&self) -> NaiveDate {
        match self {
            Slot::Stored(e) => e.episode_date(),
            Slot::Candidate(e) => e.episode_date,
        }
    }
}

/// Merge freshly parsed entries into a feed's stored episodes.
///
/// Entries whose id matches an episode already known for the feed are
/// ignored; entries without an id are always new. The combined list is
/// ordered newest first (ties keep discovery order) and cut at the feed's
/// retention count. Evicted episodes lose their media file first and their
/// record second. On success the feed's `last_updated` is advanced and the
/// feed is persisted.
pub fn reconcile(
    store: &dyn FeedStore,
    library: &Library,
    feed: &mut Feed,
    entries: &[ParsedEntry],
) -> Result<ReconcileOutcome, ReconcileError> {
    let existing = store.episodes(feed.id())?;

    let mut known: HashSet<String> = existing
        .iter()
        .map(|e| e.episode_id())
        .filter(|id| !id.is_empty())
        .map(str::to_string)
        .collect();

    let mut slots: Vec<Slot> = existing.into_iter().map(Slot::Stored).collect();

    for entry in entries {
        let candidate = new_episode_from_entry(entry);
        if !candidate.episode_id.is_empty() && !known.insert(candidate.episode_id.clone()) {
            continue;
        }
        debug!(feed = feed.name(), episode = %candidate.title, "Discovered episode");
        slots.push(Slot::Candidate(candidate));
    }

    // sort_by is stable: equal dates keep discovery order
    slots.sort_by(|a, b| b.episode_date().cmp(&a.episode_date()));

    let keep = (feed.number_to_keep() as usize).min(slots.len());
    let tail = slots.split_off(keep);

    let mut outcome = ReconcileOutcome {
        retained: slots.len(),
        ..Default::default()
    };

    for slot in tail {
        match slot {
            Slot::Stored(episode) => {
                library.remove_episode_file(feed, &episode)?;
                store.delete_episode(episode.id())?;
                debug!(feed = feed.name(), episode = episode.title(), "Evicted episode");
                outcome.evicted_episodes.push(episode);
            }
            Slot::Candidate(_) => outcome.discarded += 1,
        }
    }

    for slot in slots {
        if let Slot::Candidate(candidate) = slot {
            let episode = store.create_episode(feed.id(), candidate)?;
            outcome.new_episodes.push(episode);
        }
    }

    feed.set_last_updated(Utc::now());
    store.update_feed(feed)?;

    info!(
        feed = feed.name(),
        new = outcome.new_episodes.len(),
        evicted = outcome.evicted_episodes.len(),
        retained = outcome.retained,
        discarded = outcome.discarded,
        "Reconciled feed"
    );

    Ok(outcome)
}

/// Build an episode record from a parsed entry
pub fn new_episode_from_entry(entry: &ParsedEntry) -> NewEpisode {
    let (url, mime_type) = media_link(entry);

    NewEpisode {
        episode_id: entry.id.clone().unwrap_or_default(),
        url,
        mime_type,
        title: entry.title.clone().unwrap_or_else(|| NO_TITLE.to_string()),
        description: entry
            .description
            .clone()
            .unwrap_or_else(|| NO_DESCRIPTION.to_string()),
        episode_date: entry_date(entry),
    }
}

/// Date of an entry: updated, else published, else the epoch
pub fn entry_date(entry: &ParsedEntry) -> NaiveDate {
    entry
        .updated
        .or(entry.published)
        .map(|d| d.with_timezone(&Utc).date_naive())
        .unwrap_or_else(epoch_date)
}

/// Media URL and MIME type of an entry.
///
/// The first enclosure wins; otherwise the last alternate link; otherwise
/// both are empty.
pub fn media_link(entry: &ParsedEntry) -> (String, String) {
    entry
        .links
        .iter()
        .find(|l| l.rel == LinkRel::Enclosure)
        .or_else(|| entry.links.iter().rev().find(|l| l.rel == LinkRel::Alternate))
        .map(|l| (l.href.clone(), l.content_type.clone()))
        .unwrap_or_default()
}
