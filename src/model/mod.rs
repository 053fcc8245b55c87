mod episode;
mod feed;

pub use episode::{Episode, NewEpisode};
pub use feed::{Feed, NewFeed};

use chrono::{DateTime, NaiveDate};

pub type FeedId = u64;
pub type EpisodeId = u64;

/// Date used for entries that carry neither an updated nor a published time.
pub fn epoch_date() -> NaiveDate {
    DateTime::UNIX_EPOCH.date_naive()
}

/// Normalized form of a feed name for case-insensitive comparison.
pub fn name_key(name: &str) -> String {
    name.to_lowercase()
}
