// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::episode::{episode_filename, feed_dir_name};
use crate::error::LibraryError;
use crate::model::{Episode, Feed};

/// Suffix of files still being written by a download
pub const PARTIAL_SUFFIX: &str = ".partial";

/// Layout of the download root: one directory per feed, one file per episode.
#[derive(Debug, Clone)]
pub struct Library {
    root: PathBuf,
}

impl Library {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory holding a feed's downloaded episodes
    pub fn feed_dir(&self, feed: &Feed) -> PathBuf {
        self.root.join(feed_dir_name(feed.name(), feed.id()))
    }

    /// Path an episode's media is (or would be) downloaded to
    pub fn episode_path(&self, feed: &Feed, episode: &Episode) -> PathBuf {
        self.feed_dir(feed).join(episode_filename(episode))
    }

    /// Create the feed directory if needed and remove leftovers of interrupted downloads.
    ///
    /// Returns the number of `.partial` files removed.
    pub fn prepare_feed_dir(&self, feed: &Feed) -> Result<usize, LibraryError> {
        let dir = self.feed_dir(feed);

        if !dir.exists() {
            std::fs::create_dir_all(&dir).map_err(|e| LibraryError::CreateDirectoryFailed {
                path: dir.clone(),
                source: e,
            })?;
            debug!(feed = feed.name(), path = %dir.display(), "Created feed directory");
            return Ok(0);
        }

        let entries = std::fs::read_dir(&dir).map_err(|e| LibraryError::ReadDirectoryFailed {
            path: dir.clone(),
            source: e,
        })?;

        let mut partial_files_cleaned = 0;
        for entry in entries {
            let entry = entry.map_err(|e| LibraryError::ReadDirectoryFailed {
                path: dir.clone(),
                source: e,
            })?;

            let path = entry.path();
            let is_partial = path
                .file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.ends_with(PARTIAL_SUFFIX));

            if is_partial && std::fs::remove_file(&path).is_ok() {
                partial_files_cleaned += 1;
            }
        }

        if partial_files_cleaned > 0 {
            info!(
                feed = feed.name(),
                count = partial_files_cleaned,
                "Removed partial downloads"
            );
        }

        Ok(partial_files_cleaned)
    }

    /// Delete an episode's media file. A file that is already gone is not an error.
    ///
    /// Returns whether a file was removed.
    pub fn remove_episode_file(&self, feed: &Feed, episode: &Episode) -> Result<bool, LibraryError> {
        let path = self.episode_path(feed, episode);

        match std::fs::remove_file(&path) {
            Ok(()) => {
                debug!(path = %path.display(), "Removed episode file");
                Ok(true)
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(LibraryError::RemoveFileFailed { path, source: e }),
        }
    }

    /// Move a feed's directory after a rename.
    ///
    /// Does nothing when the old directory is missing, when both names map to
    /// the same directory, or when the target already exists. Returns whether
    /// the directory was moved.
    pub fn migrate_feed_dir(&self, old: &Feed, new: &Feed) -> Result<bool, LibraryError> {
        let from = self.feed_dir(old);
        let to = self.feed_dir(new);

        if from == to || !from.is_dir() || to.exists() {
            return Ok(false);
        }

        std::fs::rename(&from, &to).map_err(|e| LibraryError::MoveDirectoryFailed {
            from: from.clone(),
            to: to.clone(),
            source: e,
        })?;

        info!(from = %from.display(), to = %to.display(), "Moved feed directory");
        Ok(true)
    }
}
