pub mod catalog;
pub mod config;
pub mod episode;
pub mod error;
pub mod feed;
pub mod http;
pub mod library;
pub mod model;
pub mod progress;
pub mod reconcile;
pub mod store;

// Re-export main types for convenience
pub use catalog::{AddOutcome, FeedCatalog, FeedDownloadReport, FeedListing, RunSummary};
pub use config::{Config, ConfigOverrides, FileConfig};
pub use episode::{DownloadOutcome, DownloadPolicy, download_episode, episode_filename, sanitize};
pub use error::{
    CatalogError, ConfigError, DownloadError, FeedError, LibraryError, ReconcileError, StoreError,
    ValidationError,
};
pub use feed::{FeedSource, HttpFeedSource, ParsedEntry, ParsedFeed, parse_feed};
pub use http::{HttpClient, HttpResponse, ReqwestClient};
pub use library::Library;
pub use model::{Episode, Feed, NewEpisode, NewFeed};
pub use progress::{
    NoopReporter, ProgressEvent, ProgressReporter, SharedProgressReporter, SkipReason,
};
pub use reconcile::{ReconcileOutcome, reconcile};
pub use store::{FeedStore, JsonStore, MemoryStore};
