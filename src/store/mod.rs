// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Persistence seam for feeds and their episodes.
//!
//! Entities never talk to storage themselves; the catalog and reconciler go
//! through [`FeedStore`]. Two implementations share the same table logic:
//! [`MemoryStore`] for tests and short-lived runs, [`JsonStore`] for a single
//! JSON file on disk.

mod json;
mod memory;
mod tables;

pub use json::JsonStore;
pub use memory::MemoryStore;

use crate::error::StoreError;
use crate::model::{Episode, EpisodeId, Feed, FeedId, NewEpisode, NewFeed};

/// Data-access contract for feed and episode records.
///
/// Implementations lock internally so a store can be shared across tasks.
pub trait FeedStore: Send + Sync {
    /// All feeds, in creation order.
    fn feeds(&self) -> Result<Vec<Feed>, StoreError>;

    /// Feed by id.
    fn feed(&self, id: FeedId) -> Result<Option<Feed>, StoreError>;

    /// Feed whose name matches case-insensitively.
    fn find_feed_by_name(&self, name: &str) -> Result<Option<Feed>, StoreError>;

    /// Insert a feed. Fails with `NameConflict` if the name is taken in any case.
    fn create_feed(&self, feed: NewFeed) -> Result<Feed, StoreError>;

    /// Overwrite a stored feed. Fails with `NameConflict` if a rename collides
    /// with a different feed.
    fn update_feed(&self, feed: &Feed) -> Result<(), StoreError>;

    /// Episodes of a feed in insertion order.
    fn episodes(&self, feed_id: FeedId) -> Result<Vec<Episode>, StoreError>;

    /// Insert an episode for an existing feed.
    fn create_episode(&self, feed_id: FeedId, episode: NewEpisode) -> Result<Episode, StoreError>;

    fn update_episode(&self, episode: &Episode) -> Result<(), StoreError>;

    fn delete_episode(&self, id: EpisodeId) -> Result<(), StoreError>;
}
