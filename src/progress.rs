use std::sync::Arc;

/// Why a download was not attempted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// A file already sits at the episode's path
    Exists,
    /// The episode was downloaded on an earlier run
    AlreadyDownloaded,
}

/// Events emitted while updating feeds and downloading episodes
#[derive(Debug, Clone)]
pub enum ProgressEvent {
    /// Feed is being fetched from its URL
    FetchingFeed {
        /// Identifies the worker slot (0 to max_concurrent-1)
        download_id: usize,
        feed_name: String,
        url: String,
    },

    /// Feed was reconciled against its source
    FeedUpdated {
        download_id: usize,
        feed_name: String,
        new_episodes: usize,
        evicted_episodes: usize,
        retained: usize,
    },

    /// Fetching or reconciling a feed failed
    FeedFailed {
        download_id: usize,
        feed_name: String,
        error: String,
    },

    /// Partial files from interrupted downloads were removed
    PartialFilesCleanedUp { feed_name: String, count: usize },

    /// A download is starting
    DownloadStarting {
        /// Identifies the download slot
        download_id: usize,
        feed_name: String,
        episode_title: String,
        /// Expected content length in bytes, if known
        content_length: Option<u64>,
    },

    /// Download progress update
    DownloadProgress {
        download_id: usize,
        episode_title: String,
        bytes_downloaded: u64,
        total_bytes: Option<u64>,
    },

    /// A download completed successfully
    DownloadCompleted {
        download_id: usize,
        episode_title: String,
        bytes_downloaded: u64,
    },

    /// A download was not attempted
    DownloadSkipped {
        feed_name: String,
        episode_title: String,
        reason: SkipReason,
    },

    /// A download failed
    DownloadFailed {
        download_id: usize,
        episode_title: String,
        error: String,
    },
}

/// Trait for reporting progress events.
///
/// Implementations can use this to display progress bars, log messages,
/// or collect statistics.
pub trait ProgressReporter: Send + Sync {
    /// Report a progress event
    fn report(&self, event: ProgressEvent);
}

/// A shared reference to a progress reporter
pub type SharedProgressReporter = Arc<dyn ProgressReporter>;

/// A no-op progress reporter that silently ignores all events.
/// Useful for tests or quiet mode.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopReporter;

impl ProgressReporter for NoopReporter {
    fn report(&self, _event: ProgressEvent) {}
}

impl NoopReporter {
    /// Create a new NoopReporter wrapped in an Arc
    pub fn shared() -> SharedProgressReporter {
        Arc::new(Self)
    }
}
