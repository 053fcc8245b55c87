// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::path::{Path, PathBuf};

use chrono::Utc;
use futures::StreamExt;
use sha2::{Digest, Sha256};
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

use crate::error::DownloadError;
use crate::http::HttpClient;
use crate::library::PARTIAL_SUFFIX;
use crate::model::Episode;
use crate::progress::{ProgressEvent, SharedProgressReporter, SkipReason};
use crate::store::FeedStore;

/// When to fetch an episode's media
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DownloadPolicy {
    /// Download even if a file already exists at the episode's path
    pub overwrite: bool,
    /// Skip episodes that were downloaded before, even if the file is gone
    pub new_only: bool,
}

impl Default for DownloadPolicy {
    fn default() -> Self {
        Self {
            overwrite: false,
            new_only: true,
        }
    }
}

/// What happened to one episode
#[derive(Debug)]
pub enum DownloadOutcome {
    Downloaded { bytes: u64, content_hash: String },
    SkippedExists,
    SkippedAlreadyDownloaded,
    Failed(DownloadError),
}

/// Bytes written and their hash
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadResult {
    pub bytes: u64,
    /// `sha256:<hex>`
    pub content_hash: String,
}

/// Context for tracking a download in concurrent scenarios
#[derive(Debug, Clone)]
pub struct DownloadContext {
    /// Slot ID (0 to max_concurrent-1) for progress bar management
    pub download_id: usize,
    pub feed_name: String,
}

/// Decide whether to fetch an episode and, if so, fetch it and record the download.
///
/// Never returns an error: failures come back as [`DownloadOutcome::Failed`]
/// with the episode left untouched, so callers can continue with the next one.
pub async fn download_episode<C: HttpClient + ?Sized>(
    client: &C,
    store: &dyn FeedStore,
    episode: &mut Episode,
    output_path: &Path,
    policy: DownloadPolicy,
    context: &DownloadContext,
    reporter: &SharedProgressReporter,
) -> DownloadOutcome {
    if !policy.overwrite && output_path.exists() {
        debug!(path = %output_path.display(), "File exists, skipping");
        reporter.report(ProgressEvent::DownloadSkipped {
            feed_name: context.feed_name.clone(),
            episode_title: episode.title().to_string(),
            reason: SkipReason::Exists,
        });
        return DownloadOutcome::SkippedExists;
    }

    if policy.new_only && episode.is_downloaded() {
        debug!(episode = episode.title(), "Already downloaded, skipping");
        reporter.report(ProgressEvent::DownloadSkipped {
            feed_name: context.feed_name.clone(),
            episode_title: episode.title().to_string(),
            reason: SkipReason::AlreadyDownloaded,
        });
        return DownloadOutcome::SkippedAlreadyDownloaded;
    }

    let result = match fetch_to_file(client, episode, output_path, context, reporter).await {
        Ok(result) => result,
        Err(e) => return fail(episode, context, reporter, e),
    };

    let mut updated = episode.clone();
    updated.mark_downloaded(Utc::now(), result.content_hash.clone());
    if let Err(e) = store.update_episode(&updated) {
        return fail(episode, context, reporter, e.into());
    }
    *episode = updated;

    info!(
        feed = %context.feed_name,
        episode = episode.title(),
        bytes = result.bytes,
        "Downloaded episode"
    );

    DownloadOutcome::Downloaded {
        bytes: result.bytes,
        content_hash: result.content_hash,
    }
}

fn fail(
    episode: &Episode,
    context: &DownloadContext,
    reporter: &SharedProgressReporter,
    error: DownloadError,
) -> DownloadOutcome {
    warn!(
        feed = %context.feed_name,
        episode = episode.title(),
        error = %error,
        "Download failed"
    );
    reporter.report(ProgressEvent::DownloadFailed {
        download_id: context.download_id,
        episode_title: episode.title().to_string(),
        error: error.to_string(),
    });
    DownloadOutcome::Failed(error)
}

/// Stream an episode's media to `output_path`
///
/// The body is written to `<output_path>.partial` and renamed into place once
/// complete, so an interrupted download never looks finished. The partial
/// file is removed on failure.
pub async fn fetch_to_file<C: HttpClient + ?Sized>(
    client: &C,
    episode: &Episode,
    output_path: &Path,
    context: &DownloadContext,
    reporter: &SharedProgressReporter,
) -> Result<DownloadResult, DownloadError> {
    let partial_path = partial_path(output_path);

    let result = stream_to_partial(client, episode, &partial_path, context, reporter).await;
    let result = match result {
        Ok(result) => tokio::fs::rename(&partial_path, output_path)
            .await
            .map(|_| result)
            .map_err(|e| DownloadError::FileRenameFailed {
                from: partial_path.clone(),
                source: e,
            }),
        Err(e) => Err(e),
    };

    if result.is_err() {
        let _ = tokio::fs::remove_file(&partial_path).await;
    }

    result
}

async fn stream_to_partial<C: HttpClient + ?Sized>(
    client: &C,
    episode: &Episode,
    partial_path: &Path,
    context: &DownloadContext,
    reporter: &SharedProgressReporter,
) -> Result<DownloadResult, DownloadError> {
    let url = episode.url();
    if url.is_empty() {
        return Err(DownloadError::MissingUrl {
            title: episode.title().to_string(),
        });
    }

    // Get streaming response
    let response = client
        .get_stream(url)
        .await
        .map_err(|e| DownloadError::HttpFailed {
            url: url.to_string(),
            source: e,
        })?;

    // Check for HTTP errors
    if response.status >= 400 {
        return Err(DownloadError::HttpStatus {
            url: url.to_string(),
            status: response.status,
        });
    }

    reporter.report(ProgressEvent::DownloadStarting {
        download_id: context.download_id,
        feed_name: context.feed_name.clone(),
        episode_title: episode.title().to_string(),
        content_length: response.content_length,
    });

    let mut file = File::create(partial_path)
        .await
        .map_err(|e| DownloadError::FileCreateFailed {
            path: partial_path.to_path_buf(),
            source: e,
        })?;

    let mut hasher = Sha256::new();
    let mut bytes_downloaded: u64 = 0;
    let mut stream = response.body;

    while let Some(chunk_result) = stream.next().await {
        let chunk = chunk_result.map_err(|e| DownloadError::StreamFailed {
            url: url.to_string(),
            source: e,
        })?;

        file.write_all(&chunk)
            .await
            .map_err(|e| DownloadError::FileWriteFailed {
                path: partial_path.to_path_buf(),
                source: e,
            })?;

        hasher.update(&chunk);
        bytes_downloaded += chunk.len() as u64;

        reporter.report(ProgressEvent::DownloadProgress {
            download_id: context.download_id,
            episode_title: episode.title().to_string(),
            bytes_downloaded,
            total_bytes: response.content_length,
        });
    }

    // Ensure all data is flushed to disk
    file.flush()
        .await
        .map_err(|e| DownloadError::FileWriteFailed {
            path: partial_path.to_path_buf(),
            source: e,
        })?;

    reporter.report(ProgressEvent::DownloadCompleted {
        download_id: context.download_id,
        episode_title: episode.title().to_string(),
        bytes_downloaded,
    });

    Ok(DownloadResult {
        bytes: bytes_downloaded,
        content_hash: format!("sha256:{:x}", hasher.finalize()),
    })
}

fn partial_path(output_path: &Path) -> PathBuf {
    let mut name = output_path.as_os_str().to_os_string();
    name.push(PARTIAL_SUFFIX);
    PathBuf::from(name)
}
