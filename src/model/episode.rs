// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::{EpisodeId, FeedId};

/// An episode kept for a feed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Episode {
    id: EpisodeId,
    feed_id: FeedId,
    episode_id: String,
    url: String,
    mime_type: String,
    title: String,
    description: String,
    episode_date: NaiveDate,
    downloaded: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    content_hash: Option<String>,
}

impl Episode {
    /// Store-assigned row identifier.
    pub fn id(&self) -> EpisodeId {
        self.id
    }

    pub fn feed_id(&self) -> FeedId {
        self.feed_id
    }

    /// Identifier taken from the feed entry. May be empty.
    pub fn episode_id(&self) -> &str {
        &self.episode_id
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    /// Publication date from the source feed, 1970-01-01 when the entry had none.
    pub fn episode_date(&self) -> NaiveDate {
        self.episode_date
    }

    pub fn downloaded(&self) -> Option<DateTime<Utc>> {
        self.downloaded
    }

    pub fn is_downloaded(&self) -> bool {
        self.downloaded.is_some()
    }

    /// `sha256:<hex>` of the bytes written by the last download.
    pub fn content_hash(&self) -> Option<&str> {
        self.content_hash.as_deref()
    }

    pub fn mark_downloaded(&mut self, at: DateTime<Utc>, content_hash: String) {
        self.downloaded = Some(at);
        self.content_hash = Some(content_hash);
    }
}

/// An episode discovered in a feed that has not been stored yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewEpisode {
    pub episode_id: String,
    pub url: String,
    pub mime_type: String,
    pub title: String,
    pub description: String,
    pub episode_date: NaiveDate,
}

impl NewEpisode {
    pub(crate) fn into_episode(self, id: EpisodeId, feed_id: FeedId) -> Episode {
        Episode {
            id,
            feed_id,
            episode_id: self.episode_id,
            url: self.url,
            mime_type: self.mime_type,
            title: self.title,
            description: self.description,
            episode_date: self.episode_date,
            downloaded: None,
            content_hash: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::epoch_date;

    fn make_new_episode() -> NewEpisode {
        NewEpisode {
            episode_id: "ep-1".to_string(),
            url: "https://example.com/ep1.mp3".to_string(),
            mime_type: "audio/mpeg".to_string(),
            title: "Episode 1".to_string(),
            description: "First".to_string(),
            episode_date: epoch_date(),
        }
    }

    #[test]
    fn stored_episode_starts_undownloaded() {
        let episode = make_new_episode().into_episode(3, 9);

        assert_eq!(episode.id(), 3);
        assert_eq!(episode.feed_id(), 9);
        assert!(!episode.is_downloaded());
        assert!(episode.content_hash().is_none());
    }

    #[test]
    fn mark_downloaded_records_time_and_hash() {
        let mut episode = make_new_episode().into_episode(1, 1);
        let now = Utc::now();

        episode.mark_downloaded(now, "sha256:abc".to_string());

        assert_eq!(episode.downloaded(), Some(now));
        assert_eq!(episode.content_hash(), Some("sha256:abc"));
        assert_eq!(episode.episode_date(), epoch_date());
    }
}
