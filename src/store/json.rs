// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use tracing::debug;

use crate::error::StoreError;
use crate::model::{Episode, EpisodeId, Feed, FeedId, NewEpisode, NewFeed};

use super::FeedStore;
use super::tables::Tables;

/// Store persisted as one pretty-printed JSON document.
///
/// Every mutation is applied to a copy of the tables, written to a temporary
/// file next to the store, and renamed over it. The in-memory state only
/// changes once the write succeeded.
#[derive(Debug)]
pub struct JsonStore {
    path: PathBuf,
    tables: Mutex<Tables>,
}

impl JsonStore {
    /// Open the store at `path`, starting empty if the file does not exist yet
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();

        let tables = if path.exists() {
            let content =
                std::fs::read_to_string(&path).map_err(|e| StoreError::ReadFailed {
                    path: path.clone(),
                    source: e,
                })?;
            let mut tables: Tables =
                serde_json::from_str(&content).map_err(|e| StoreError::JsonParseFailed {
                    path: path.clone(),
                    source: e,
                })?;
            tables.reindex();
            tables
        } else {
            Tables::default()
        };

        debug!(path = %path.display(), "Opened store");

        Ok(Self {
            path,
            tables: Mutex::new(tables),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lock(&self) -> MutexGuard<'_, Tables> {
        self.tables.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn mutate<T>(&self, f: impl FnOnce(&mut Tables) -> Result<T, StoreError>) -> Result<T, StoreError> {
        let mut guard = self.lock();
        let mut next = guard.clone();
        let result = f(&mut next)?;
        self.write(&next)?;
        *guard = next;
        Ok(result)
    }

    fn write(&self, tables: &Tables) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(|e| StoreError::WriteFailed {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }

        let json = serde_json::to_string_pretty(tables)?;
        let tmp_path = self.tmp_path();

        std::fs::write(&tmp_path, json).map_err(|e| StoreError::WriteFailed {
            path: tmp_path.clone(),
            source: e,
        })?;
        std::fs::rename(&tmp_path, &self.path).map_err(|e| StoreError::WriteFailed {
            path: self.path.clone(),
            source: e,
        })
    }

    fn tmp_path(&self) -> PathBuf {
        let mut name = self.path.as_os_str().to_os_string();
        name.push(".tmp");
        PathBuf::from(name)
    }
}

impl FeedStore for JsonStore {
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
        self.mutate(|tables| tables.create_feed(feed))
    }

    fn update_feed(&self, feed: &Feed) -> Result<(), StoreError> {
        self.mutate(|tables| tables.update_feed(feed))
    }

    fn episodes(&self, feed_id: FeedId) -> Result<Vec<Episode>, StoreError> {
        Ok(self.lock().episodes(feed_id))
    }

    fn create_episode(&self, feed_id: FeedId, episode: NewEpisode) -> Result<Episode, StoreError> {
        self.mutate(|tables| tables.create_episode(feed_id, episode))
    }

    fn update_episode(&self, episode: &Episode) -> Result<(), StoreError> {
        self.mutate(|tables| tables.update_episode(episode))
    }

    fn delete_episode(&self, id: EpisodeId) -> Result<(), StoreError> {
        self.mutate(|tables| tables.delete_episode(id))
    }
}
