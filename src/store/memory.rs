// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::sync::{Mutex, MutexGuard};

use crate::error::StoreError;
use crate::model::{Episode, EpisodeId, Feed, FeedId, NewEpisode, NewFeed};

use super::FeedStore;
use super::tables::Tables;

/// Store that keeps everything in memory
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Tables> {
        // Mutations validate before writing, so poisoned tables are still consistent
        self.tables.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl FeedStore for MemoryStore {
    fn feeds(&self) -> Result<Vec<Feed>, StoreError> {
        Ok(self.lock().feeds())
    }

    fn feed(&self, id: FeedId) -> Result<Option<Feed>, StoreError> {
        Ok(self.lock().feed(id))
    }

    fn find_feed_by_name(&self, name: &str) -> Result<Option<Feed>, StoreError> {
        Ok(self.lock().find_feed_by_name(name))
    }

    fn create_feed(&self, feed: NewFeed) -> Result<Feed, StoreError> {
        self.lock().create_feed(feed)
    }

    fn update_feed(&self, feed: &Feed) -> Result<(), StoreError> {
        self.lock().update_feed(feed)
    }

    fn episodes(&self, feed_id: FeedId) -> Result<Vec<Episode>, StoreError> {
        Ok(self.lock().episodes(feed_id))
    }

    fn create_episode(&self, feed_id: FeedId, episode: NewEpisode) -> Result<Episode, StoreError> {
        self.lock().create_episode(feed_id, episode)
    }

    fn update_episode(&self, episode: &Episode) -> Result<(), StoreError> {
        self.lock().update_episode(episode)
    }

    fn delete_episode(&self, id: EpisodeId) -> Result<(), StoreError> {
        self.lock().delete_episode(id)
    }
}
