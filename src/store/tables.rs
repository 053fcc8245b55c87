// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::StoreError;
use crate::model::{Episode, EpisodeId, Feed, FeedId, NewEpisode, NewFeed, name_key};

/// Feed and episode rows plus the lowercased-name index.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub(super) struct Tables {
    #[serde(default)]
    next_feed_id: FeedId,
    #[serde(default)]
    next_episode_id: EpisodeId,
    #[serde(default)]
    feeds: Vec<Feed>,
    #[serde(default)]
    episodes: Vec<Episode>,
    #[serde(skip)]
    name_index: HashMap<String, FeedId>,
}

impl Tables {
    /// Rebuild the name index after deserializing.
    pub(super) fn reindex(&mut self) {
        self.name_index = self
            .feeds
            .iter()
            .map(|feed| (feed.name_key(), feed.id()))
            .collect();
    }

    pub(super) fn feeds(&self) -> Vec<Feed> {
        self.feeds.clone()
    }

    pub(super) fn feed(&self, id: FeedId) -> Option<Feed> {
        self.feeds.iter().find(|f| f.id() == id).cloned()
    }

    pub(super) fn find_feed_by_name(&self, name: &str) -> Option<Feed> {
        self.name_index
            .get(&name_key(name))
            .and_then(|id| self.feed(*id))
    }

    pub(super) fn create_feed(&mut self, new_feed: NewFeed) -> Result<Feed, StoreError> {
        let key = name_key(new_feed.name());
        if self.name_index.contains_key(&key) {
            return Err(StoreError::NameConflict(new_feed.name().to_string()));
        }

        self.next_feed_id += 1;
        let feed = new_feed.into_feed(self.next_feed_id);
        self.name_index.insert(key, feed.id());
        self.feeds.push(feed.clone());
        Ok(feed)
    }

    pub(super) fn update_feed(&mut self, feed: &Feed) -> Result<(), StoreError> {
        let key = feed.name_key();
        if let Some(owner) = self.name_index.get(&key)
            && *owner != feed.id()
        {
            return Err(StoreError::NameConflict(feed.name().to_string()));
        }

        let slot = self
            .feeds
            .iter_mut()
            .find(|f| f.id() == feed.id())
            .ok_or(StoreError::FeedNotFound(feed.id()))?;

        self.name_index.remove(&slot.name_key());
        self.name_index.insert(key, feed.id());
        *slot = feed.clone();
        Ok(())
    }

    pub(super) fn episodes(&self, feed_id: FeedId) -> Vec<Episode> {
        self.episodes
            .iter()
            .filter(|e| e.feed_id() == feed_id)
            .cloned()
            .collect()
    }

    pub(super) fn create_episode(
        &mut self,
        feed_id: FeedId,
        new_episode: NewEpisode,
    ) -> Result<Episode, StoreError> {
        if !self.feeds.iter().any(|f| f.id() == feed_id) {
            return Err(StoreError::FeedNotFound(feed_id));
        }

        self.next_episode_id += 1;
        let episode = new_episode.into_episode(self.next_episode_id, feed_id);
        self.episodes.push(episode.clone());
        Ok(episode)
    }

    pub(super) fn update_episode(&mut self, episode: &Episode) -> Result<(), StoreError> {
        let slot = self
            .episodes
            .iter_mut()
            .find(|e| e.id() == episode.id())
            .ok_or(StoreError::EpisodeNotFound(episode.id()))?;

        *slot = episode.clone();
        Ok(())
    }

    pub(super) fn delete_episode(&mut self, id: EpisodeId) -> Result<(), StoreError> {
        let index = self
            .episodes
            .iter()
            .position(|e| e.id() == id)
            .ok_or(StoreError::EpisodeNotFound(id))?;

        self.episodes.remove(index);
        Ok(())
    }
}
