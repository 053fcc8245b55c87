// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur when fetching or parsing a feed source
#[derive(Error, Debug)]
pub enum FeedError {
    #[error("Failed to fetch feed from {url}: {source}")]
    FetchFailed {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Failed to read feed file {path}: {source}")]
    FileReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse feed: {0}")]
    ParseFailed(#[from] rss::Error),

    #[error("Failed to parse Atom feed: {0}")]
    AtomParseFailed(#[from] feed_rs::parser::ParseFeedError),

    #[error("Invalid feed URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

/// Errors that can occur during episode downloads
#[derive(Error, Debug)]
pub enum DownloadError {
    #[error("Episode '{title}' has no media URL")]
    MissingUrl { title: String },

    #[error("HTTP request failed for {url}: {source}")]
    HttpFailed {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("HTTP error {status} for {url}")]
    HttpStatus { url: String, status: u16 },

    #[error("Failed to create file {path}: {source}")]
    FileCreateFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write to file {path}: {source}")]
    FileWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to move {from} into place: {source}")]
    FileRenameFailed {
        from: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Stream error while downloading {url}: {source}")]
    StreamFailed {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Failed to record download: {0}")]
    Persist(#[from] StoreError),
}

/// Errors raised by the feed and episode store
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Failed to read store file {path}: {source}")]
    ReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write store file {path}: {source}")]
    WriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse store JSON in {path}: {source}")]
    JsonParseFailed {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to serialize store: {0}")]
    JsonSerializeFailed(#[from] serde_json::Error),

    #[error("A feed named '{0}' already exists")]
    NameConflict(String),

    #[error("No feed with id {0}")]
    FeedNotFound(u64),

    #[error("No episode with id {0}")]
    EpisodeNotFound(u64),
}

/// Rejected field values on feed and episode records
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Feed name cannot be empty")]
    EmptyName,

    #[error("Feed URL cannot be empty")]
    EmptyUrl,

    #[error("Number of episodes to keep must be at least 1")]
    ZeroRetention,
}

/// Errors that can occur while preparing or cleaning download directories
#[derive(Error, Debug)]
pub enum LibraryError {
    #[error("Failed to create directory {path}: {source}")]
    CreateDirectoryFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to read directory {path}: {source}")]
    ReadDirectoryFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to remove file {path}: {source}")]
    RemoveFileFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to move {from} to {to}: {source}")]
    MoveDirectoryFailed {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Errors that can occur while reconciling a feed against freshly parsed entries
#[derive(Error, Debug)]
pub enum ReconcileError {
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Library error: {0}")]
    Library(#[from] LibraryError),
}

/// Errors surfaced by feed catalog operations
#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("Feed error: {0}")]
    Fetch(#[from] FeedError),

    #[error("A feed named '{0}' already exists")]
    NameConflict(String),

    #[error("No feed named '{0}'")]
    NotFound(String),

    #[error("Missing argument: {0}")]
    ArgsMissing(&'static str),

    #[error("Invalid argument: {0}")]
    InvalidArgument(#[from] ValidationError),

    #[error("Store error: {0}")]
    Store(StoreError),

    #[error("Library error: {0}")]
    Library(#[from] LibraryError),
}

impl From<StoreError> for CatalogError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NameConflict(name) => CatalogError::NameConflict(name),
            other => CatalogError::Store(other),
        }
    }
}

impl From<ReconcileError> for CatalogError {
    fn from(err: ReconcileError) -> Self {
        match err {
            ReconcileError::Store(e) => e.into(),
            ReconcileError::Library(e) => CatalogError::Library(e),
        }
    }
}

/// Errors that can occur when loading configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    ReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {source}")]
    ParseFailed {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Invalid config value for `{field}`: {reason}")]
    InvalidValue { field: &'static str, reason: String },

    #[error("Cannot determine a data directory; set HOME or XDG_DATA_HOME, or pass explicit paths")]
    NoDataDir,
}
