// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::sync::Arc;

use futures::StreamExt;
use tokio::sync::{Mutex, mpsc};
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::episode::{DownloadContext, DownloadOutcome, DownloadPolicy, download_episode};
use crate::error::{CatalogError, DownloadError, ValidationError};
use crate::feed::FeedSource;
use crate::http::HttpClient;
use crate::library::Library;
use crate::model::{Episode, Feed, FeedId, NewFeed};
use crate::progress::{NoopReporter, ProgressEvent, SharedProgressReporter};
use crate::reconcile::{ReconcileOutcome, reconcile};
use crate::store::FeedStore;

const NO_DESCRIPTION: &str = "No description found";

/// Per-feed results of a bulk operation
#[derive(Debug)]
pub struct RunSummary<T> {
    /// Feed name and result, in feed order
    pub succeeded: Vec<(String, T)>,
    /// Feed name and error, in feed order
    pub failed: Vec<(String, CatalogError)>,
}

impl<T> Default for RunSummary<T> {
    fn default() -> Self {
        Self {
            succeeded: Vec::new(),
            failed: Vec::new(),
        }
    }
}

impl<T> RunSummary<T> {
    pub fn is_empty(&self) -> bool {
        self.succeeded.is_empty() && self.failed.is_empty()
    }

    /// True when at least one feed was attempted and none succeeded
    pub fn all_failed(&self) -> bool {
        !self.failed.is_empty() && self.succeeded.is_empty()
    }
}

/// Result of downloading one feed's episodes
#[derive(Debug, Default)]
pub struct FeedDownloadReport {
    pub downloaded: usize,
    pub skipped: usize,
    pub bytes: u64,
    /// Episode title and the reason its download failed
    pub failed: Vec<(String, DownloadError)>,
}

/// Result of [`FeedCatalog::add`]
#[derive(Debug)]
pub enum AddOutcome {
    /// A feed with that name already existed and was left unchanged
    Existing(Feed),
    /// A new feed was created and reconciled against the fetched entries
    Created(Feed, ReconcileOutcome),
}

/// A feed together with its retained episodes, newest first
#[derive(Debug, Clone)]
pub struct FeedListing {
    pub feed: Feed,
    pub episodes: Vec<Episode>,
}

/// Operations over the whole set of feeds
pub struct FeedCatalog {
    store: Arc<dyn FeedStore>,
    source: Arc<dyn FeedSource>,
    client: Arc<dyn HttpClient>,
    library: Library,
    episodes_to_keep: u32,
    max_concurrent_feeds: usize,
    reporter: SharedProgressReporter,
    locks: std::sync::Mutex<HashMap<FeedId, Arc<Mutex<()>>>>,
}

impl FeedCatalog {
    pub fn new(
        store: Arc<dyn FeedStore>,
        source: Arc<dyn FeedSource>,
        client: Arc<dyn HttpClient>,
        config: &Config,
    ) -> Self {
        Self {
            store,
            source,
            client,
            library: Library::new(&config.download_dir),
            episodes_to_keep: config.episodes_to_keep,
            max_concurrent_feeds: config.max_concurrent_feeds.max(1),
            reporter: NoopReporter::shared(),
            locks: std::sync::Mutex::new(HashMap::new()),
        }
    }

    pub fn with_reporter(mut self, reporter: SharedProgressReporter) -> Self {
        self.reporter = reporter;
        self
    }

    pub fn library(&self) -> &Library {
        &self.library
    }

    /// Fetch every selected, subscribed feed and reconcile it
    pub async fn update(&self, names: &[String]) -> Result<RunSummary<ReconcileOutcome>, CatalogError> {
        let feeds = self.subscribed(names)?;
        Ok(self
            .run_parallel(feeds, |slot, feed| self.update_feed(slot, feed))
            .await)
    }

    /// Download the retained episodes of every selected, subscribed feed
    pub async fn download(
        &self,
        names: &[String],
        policy: DownloadPolicy,
    ) -> Result<RunSummary<FeedDownloadReport>, CatalogError> {
        let feeds = self.subscribed(names)?;
        Ok(self
            .run_parallel(feeds, |slot, feed| self.download_feed(slot, feed, policy))
            .await)
    }

    /// Subscribe the selected feeds. Returns the feeds that changed.
    pub async fn subscribe(&self, names: &[String]) -> Result<Vec<Feed>, CatalogError> {
        self.set_subscribed(names, true).await
    }

    /// Unsubscribe the selected feeds. Returns the feeds that changed.
    pub async fn unsubscribe(&self, names: &[String]) -> Result<Vec<Feed>, CatalogError> {
        self.set_subscribed(names, false).await
    }

    async fn set_subscribed(
        &self,
        names: &[String],
        subscribed: bool,
    ) -> Result<Vec<Feed>, CatalogError> {
        self.mutate_feeds(names, |feed| {
            if feed.is_subscribed() == subscribed {
                return Ok(false);
            }
            feed.set_subscribed(subscribed);
            Ok(true)
        })
        .await
    }

    /// Set the retention count of the selected feeds.
    ///
    /// Existing episodes beyond the new count are trimmed on the next update.
    pub async fn set_retention(
        &self,
        count: u32,
        names: &[String],
    ) -> Result<Vec<Feed>, CatalogError> {
        if count == 0 {
            return Err(ValidationError::ZeroRetention.into());
        }

        self.mutate_feeds(names, |feed| {
            if feed.number_to_keep() == count {
                return Ok(false);
            }
            feed.set_number_to_keep(count)?;
            Ok(true)
        })
        .await
    }

    /// Set the description of the selected feeds
    pub async fn describe(
        &self,
        description: &str,
        names: &[String],
    ) -> Result<Vec<Feed>, CatalogError> {
        self.mutate_feeds(names, |feed| {
            if feed.description() == description {
                return Ok(false);
            }
            feed.set_description(description);
            Ok(true)
        })
        .await
    }

    /// Add a feed by URL.
    ///
    /// With `alt_name`, an existing feed of that name is returned without
    /// fetching. Otherwise the feed is fetched and named after its title.
    pub async fn add(
        &self,
        url: &str,
        alt_name: Option<&str>,
        retention: Option<u32>,
    ) -> Result<AddOutcome, CatalogError> {
        if url.trim().is_empty() {
            return Err(CatalogError::ArgsMissing("url"));
        }
        if retention == Some(0) {
            return Err(ValidationError::ZeroRetention.into());
        }

        if let Some(name) = alt_name {
            if name.trim().is_empty() {
                return Err(ValidationError::EmptyName.into());
            }
            if let Some(existing) = self.store.find_feed_by_name(name)? {
                debug!(feed = existing.name(), "Feed already exists");
                return Ok(AddOutcome::Existing(existing));
            }
        }

        let parsed = self.source.fetch(url).await?;

        let name = match alt_name {
            Some(name) => name.to_string(),
            None => parsed.title.clone().ok_or(ValidationError::EmptyName)?,
        };

        if let Some(existing) = self.store.find_feed_by_name(&name)? {
            debug!(feed = existing.name(), "Feed already exists");
            return Ok(AddOutcome::Existing(existing));
        }

        let description = parsed
            .description
            .clone()
            .unwrap_or_else(|| NO_DESCRIPTION.to_string());
        let new_feed = NewFeed::new(
            name,
            url,
            description,
            retention.unwrap_or(self.episodes_to_keep),
        )?;

        let mut feed = self.store.create_feed(new_feed)?;
        info!(feed = feed.name(), url, "Added feed");

        let lock = self.feed_lock(feed.id());
        let _guard = lock.lock().await;
        let outcome = reconcile(&*self.store, &self.library, &mut feed, &parsed.entries)?;

        Ok(AddOutcome::Created(feed, outcome))
    }

    /// Rename a feed and move its download directory along.
    ///
    /// Returns the feed before and after the rename.
    pub async fn rename(&self, old: &str, new: &str) -> Result<(Feed, Feed), CatalogError> {
        if new.trim().is_empty() {
            return Err(ValidationError::EmptyName.into());
        }

        let target = self
            .store
            .find_feed_by_name(old)?
            .ok_or_else(|| CatalogError::NotFound(old.to_string()))?;

        if let Some(other) = self.store.find_feed_by_name(new)?
            && other.id() != target.id()
        {
            return Err(CatalogError::NameConflict(other.name().to_string()));
        }

        let lock = self.feed_lock(target.id());
        let _guard = lock.lock().await;

        let previous = self.reload(&target)?;
        let mut renamed = previous.clone();
        renamed.set_name(new)?;
        let moved = self.library.migrate_feed_dir(&previous, &renamed)?;
        if let Err(e) = self.store.update_feed(&renamed) {
            if moved && let Err(undo) = self.library.migrate_feed_dir(&renamed, &previous) {
                warn!(feed = previous.name(), error = %undo, "Could not move feed directory back");
            }
            return Err(e.into());
        }

        info!(from = previous.name(), to = renamed.name(), "Renamed feed");
        Ok((previous, renamed))
    }

    /// All feeds with their retained episodes
    pub fn feeds(&self) -> Result<Vec<FeedListing>, CatalogError> {
        self.store
            .feeds()?
            .into_iter()
            .map(|feed| self.listing(feed))
            .collect()
    }

    /// One feed, looked up case-insensitively
    pub fn feed(&self, name: &str) -> Result<FeedListing, CatalogError> {
        let feed = self
            .store
            .find_feed_by_name(name)?
            .ok_or_else(|| CatalogError::NotFound(name.to_string()))?;
        self.listing(feed)
    }

    fn listing(&self, feed: Feed) -> Result<FeedListing, CatalogError> {
        let episodes = newest_first(self.store.episodes(feed.id())?);
        Ok(FeedListing { feed, episodes })
    }

    /// Feeds matching `names`, or all feeds when `names` is empty.
    ///
    /// Unknown names are skipped.
    fn resolve(&self, names: &[String]) -> Result<Vec<Feed>, CatalogError> {
        if names.is_empty() {
            return Ok(self.store.feeds()?);
        }

        let mut seen = HashSet::new();
        let mut feeds = Vec::new();
        for name in names {
            match self.store.find_feed_by_name(name)? {
                Some(feed) => {
                    if seen.insert(feed.id()) {
                        feeds.push(feed);
                    }
                }
                None => debug!(name = %name, "No feed with that name, skipping"),
            }
        }
        Ok(feeds)
    }

    fn subscribed(&self, names: &[String]) -> Result<Vec<Feed>, CatalogError> {
        Ok(self
            .resolve(names)?
            .into_iter()
            .filter(Feed::is_subscribed)
            .collect())
    }

    /// Apply `change` to each selected feed under its lock and persist the
    /// ones it reports as changed.
    async fn mutate_feeds<F>(&self, names: &[String], mut change: F) -> Result<Vec<Feed>, CatalogError>
    where
        F: FnMut(&mut Feed) -> Result<bool, CatalogError>,
    {
        let mut changed = Vec::new();

        for feed in self.resolve(names)? {
            let lock = self.feed_lock(feed.id());
            let _guard = lock.lock().await;

            let mut feed = self.reload(&feed)?;
            if change(&mut feed)? {
                self.store.update_feed(&feed)?;
                debug!(feed = feed.name(), "Updated feed");
                changed.push(feed);
            }
        }

        Ok(changed)
    }

    /// Run `op` over `feeds` with at most `max_concurrent_feeds` in flight.
    ///
    /// Failures are collected per feed; they never stop the other feeds.
    async fn run_parallel<T, F, Fut>(&self, feeds: Vec<Feed>, op: F) -> RunSummary<T>
    where
        F: Fn(usize, Feed) -> Fut,
        Fut: Future<Output = Result<T, CatalogError>>,
    {
        let workers = self.max_concurrent_feeds;

        // The slot pool hands each running pass a stable id for progress display
        let (slot_tx, slot_rx) = mpsc::channel(workers);
        for slot in 0..workers {
            let _ = slot_tx.try_send(slot);
        }
        let slot_rx = Mutex::new(slot_rx);

        let results: Vec<_> = futures::stream::iter(feeds)
            .map(|feed| {
                let op = &op;
                let slot_rx = &slot_rx;
                let slot_tx = slot_tx.clone();
                async move {
                    let slot = slot_rx.lock().await.recv().await.unwrap_or(0);
                    let name = feed.name().to_string();
                    let result = op(slot, feed).await;

                    if let Err(e) = &result {
                        self.reporter.report(ProgressEvent::FeedFailed {
                            download_id: slot,
                            feed_name: name.clone(),
                            error: e.to_string(),
                        });
                    }

                    // Return slot to the pool when done
                    let _ = slot_tx.send(slot).await;
                    (name, result)
                }
            })
            .buffered(workers)
            .collect()
            .await;

        let mut summary = RunSummary::default();
        for (name, result) in results {
            match result {
                Ok(value) => summary.succeeded.push((name, value)),
                Err(e) => {
                    warn!(feed = %name, error = %e, "Feed failed");
                    summary.failed.push((name, e));
                }
            }
        }
        summary
    }

    async fn update_feed(&self, slot: usize, feed: Feed) -> Result<ReconcileOutcome, CatalogError> {
        let lock = self.feed_lock(feed.id());
        let _guard = lock.lock().await;
        let mut feed = self.reload(&feed)?;

        self.reporter.report(ProgressEvent::FetchingFeed {
            download_id: slot,
            feed_name: feed.name().to_string(),
            url: feed.url().to_string(),
        });

        let parsed = self.source.fetch(feed.url()).await?;
        let outcome = reconcile(&*self.store, &self.library, &mut feed, &parsed.entries)?;

        self.reporter.report(ProgressEvent::FeedUpdated {
            download_id: slot,
            feed_name: feed.name().to_string(),
            new_episodes: outcome.new_episodes.len(),
            evicted_episodes: outcome.evicted_episodes.len(),
            retained: outcome.retained,
        });

        Ok(outcome)
    }

    async fn download_feed(
        &self,
        slot: usize,
        feed: Feed,
        policy: DownloadPolicy,
    ) -> Result<FeedDownloadReport, CatalogError> {
        let lock = self.feed_lock(feed.id());
        let _guard = lock.lock().await;
        let feed = self.reload(&feed)?;

        let cleaned = self.library.prepare_feed_dir(&feed)?;
        if cleaned > 0 {
            self.reporter.report(ProgressEvent::PartialFilesCleanedUp {
                feed_name: feed.name().to_string(),
                count: cleaned,
            });
        }

        let context = DownloadContext {
            download_id: slot,
            feed_name: feed.name().to_string(),
        };

        let mut report = FeedDownloadReport::default();
        for mut episode in newest_first(self.store.episodes(feed.id())?) {
            let path = self.library.episode_path(&feed, &episode);
            let outcome = download_episode(
                &*self.client,
                &*self.store,
                &mut episode,
                &path,
                policy,
                &context,
                &self.reporter,
            )
            .await;

            match outcome {
                DownloadOutcome::Downloaded { bytes, .. } => {
                    report.downloaded += 1;
                    report.bytes += bytes;
                }
                DownloadOutcome::SkippedExists | DownloadOutcome::SkippedAlreadyDownloaded => {
                    report.skipped += 1;
                }
                DownloadOutcome::Failed(e) => {
                    report.failed.push((episode.title().to_string(), e));
                }
            }
        }

        info!(
            feed = feed.name(),
            downloaded = report.downloaded,
            skipped = report.skipped,
            failed = report.failed.len(),
            "Downloaded feed"
        );

        Ok(report)
    }

    /// Current stored state of a feed
    fn reload(&self, feed: &Feed) -> Result<Feed, CatalogError> {
        self.store
            .feed(feed.id())?
            .ok_or_else(|| CatalogError::NotFound(feed.name().to_string()))
    }

    fn feed_lock(&self, id: FeedId) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        locks.entry(id).or_default().clone()
    }
}

/// Sort episodes newest first, keeping stored order for equal dates
fn newest_first(mut episodes: Vec<Episode>) -> Vec<Episode> {
    episodes.sort_by(|a, b| b.episode_date().cmp(&a.episode_date()));
    episodes
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FeedError;
    use crate::feed::{EntryLink, LinkRel, ParsedEntry, ParsedFeed};
    use crate::http::{ByteStream, HttpResponse};
    use crate::store::MemoryStore;
    use async_trait::async_trait;
    use bytes::Bytes;
    use chrono::DateTime;
    use std::path::Path;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::tempdir;

    #[derive(Default)]
    struct MockSource {
        feeds: HashMap<String, ParsedFeed>,
        fetches: AtomicUsize,
    }

    impl MockSource {
        fn with(mut self, url: &str, feed: ParsedFeed) -> Self {
            self.feeds.insert(url.to_string(), feed);
            self
        }
    }

    #[async_trait]
    impl FeedSource for MockSource {
        async fn fetch(&self, url: &str) -> Result<ParsedFeed, FeedError> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            self.feeds
                .get(url)
                .cloned()
                .ok_or_else(|| FeedError::FileReadFailed {
                    path: url.into(),
                    source: std::io::Error::new(std::io::ErrorKind::NotFound, "unreachable"),
                })
        }
    }

    struct MockHttpClient;

    #[async_trait]
    impl HttpClient for MockHttpClient {
        async fn get_bytes(&self, _url: &str) -> Result<Bytes, reqwest::Error> {
            Ok(Bytes::from_static(b"audio"))
        }

        async fn get_stream(&self, url: &str) -> Result<HttpResponse, reqwest::Error> {
            let status = if url.contains("missing") { 404 } else { 200 };
            let stream: ByteStream = Box::pin(futures::stream::once(async {
                Ok(Bytes::from_static(b"audio"))
            }));
            Ok(HttpResponse {
                status,
                content_length: Some(5),
                body: stream,
            })
        }
    }

    fn entry(id: &str, date: &str) -> ParsedEntry {
        ParsedEntry {
            id: Some(id.to_string()),
            title: Some(format!("Episode {id}")),
            description: None,
            published: Some(
                DateTime::parse_from_rfc3339(&format!("{date}T08:00:00+00:00")).unwrap(),
            ),
            updated: None,
            links: vec![EntryLink {
                rel: LinkRel::Enclosure,
                href: format!("https://example.com/{id}.mp3"),
                content_type: "audio/mpeg".to_string(),
            }],
        }
    }

    fn parsed(title: &str, entries: Vec<ParsedEntry>) -> ParsedFeed {
        ParsedFeed {
            title: Some(title.to_string()),
            description: Some(format!("About {title}")),
            entries,
        }
    }

    fn setup(dir: &Path, source: MockSource) -> (FeedCatalog, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        let config = Config::with_data_root(dir);
        let catalog = FeedCatalog::new(
            store.clone(),
            Arc::new(source),
            Arc::new(MockHttpClient),
            &config,
        );
        (catalog, store)
    }

    fn names(feeds: &[Feed]) -> Vec<&str> {
        feeds.iter().map(Feed::name).collect()
    }

    #[tokio::test]
    async fn add_creates_feed_and_reconciles() {
        let dir = tempdir().unwrap();
        let source = MockSource::default().with(
            "https://a.example/feed",
            parsed("Show A", vec![entry("1", "2024-01-01"), entry("2", "2024-01-02")]),
        );
        let (catalog, store) = setup(dir.path(), source);

        let outcome = catalog
            .add("https://a.example/feed", None, Some(5))
            .await
            .unwrap();

        let AddOutcome::Created(feed, reconciled) = outcome else {
            panic!("expected a new feed");
        };
        assert_eq!(feed.name(), "Show A");
        assert_eq!(feed.description(), "About Show A");
        assert_eq!(feed.number_to_keep(), 5);
        assert!(feed.is_subscribed());
        assert!(feed.last_updated().is_some());
        assert_eq!(reconciled.new_episodes.len(), 2);
        assert_eq!(store.episodes(feed.id()).unwrap().len(), 2);
    }

    #[tokio::test]
    async fn add_twice_with_same_name_returns_existing() {
        let dir = tempdir().unwrap();
        let source =
            MockSource::default().with("https://a.example/feed", parsed("Show A", vec![]));
        let (catalog, store) = setup(dir.path(), source);

        catalog
            .add("https://a.example/feed", Some("Mine"), None)
            .await
            .unwrap();
        let second = catalog
            .add("https://a.example/feed", Some("MINE"), None)
            .await
            .unwrap();

        assert!(matches!(second, AddOutcome::Existing(ref f) if f.name() == "Mine"));
        assert_eq!(store.feeds().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn add_uses_configured_default_retention() {
        let dir = tempdir().unwrap();
        let source =
            MockSource::default().with("https://a.example/feed", parsed("Show A", vec![]));
        let (catalog, _) = setup(dir.path(), source);

        let AddOutcome::Created(feed, _) = catalog
            .add("https://a.example/feed", None, None)
            .await
            .unwrap()
        else {
            panic!("expected a new feed");
        };

        assert_eq!(feed.number_to_keep(), crate::config::DEFAULT_EPISODES_TO_KEEP);
    }

    #[tokio::test]
    async fn add_rejects_bad_arguments() {
        let dir = tempdir().unwrap();
        let (catalog, _) = setup(dir.path(), MockSource::default());

        assert!(matches!(
            catalog.add("", None, None).await,
            Err(CatalogError::ArgsMissing("url"))
        ));
        assert!(matches!(
            catalog.add("https://a.example/feed", None, Some(0)).await,
            Err(CatalogError::InvalidArgument(ValidationError::ZeroRetention))
        ));
    }

    #[tokio::test]
    async fn add_without_title_or_name_is_invalid() {
        let dir = tempdir().unwrap();
        let source = MockSource::default().with("https://a.example/feed", ParsedFeed::default());
        let (catalog, _) = setup(dir.path(), source);

        let err = catalog
            .add("https://a.example/feed", None, None)
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            CatalogError::InvalidArgument(ValidationError::EmptyName)
        ));
    }

    #[tokio::test]
    async fn rename_onto_existing_name_conflicts_without_mutation() {
        let dir = tempdir().unwrap();
        let source = MockSource::default()
            .with("https://a.example/feed", parsed("A", vec![]))
            .with("https://b.example/feed", parsed("B", vec![]));
        let (catalog, store) = setup(dir.path(), source);
        catalog.add("https://a.example/feed", None, None).await.unwrap();
        catalog.add("https://b.example/feed", None, None).await.unwrap();

        let err = catalog.rename("A", "b").await.unwrap_err();

        assert!(matches!(err, CatalogError::NameConflict(_)));
        let mut stored: Vec<_> = store
            .feeds()
            .unwrap()
            .iter()
            .map(|f| f.name().to_string())
            .collect();
        stored.sort();
        assert_eq!(stored, vec!["A", "B"]);
    }

    #[tokio::test]
    async fn rename_unknown_feed_is_not_found() {
        let dir = tempdir().unwrap();
        let (catalog, _) = setup(dir.path(), MockSource::default());

        let err = catalog.rename("ghost", "new").await.unwrap_err();

        assert!(matches!(err, CatalogError::NotFound(name) if name == "ghost"));
    }

    #[tokio::test]
    async fn rename_moves_feed_directory() {
        let dir = tempdir().unwrap();
        let source = MockSource::default().with(
            "https://a.example/feed",
            parsed("Old Name", vec![entry("1", "2024-01-01")]),
        );
        let (catalog, _) = setup(dir.path(), source);
        catalog.add("https://a.example/feed", None, None).await.unwrap();
        catalog.download(&[], DownloadPolicy::default()).await.unwrap();

        let (previous, renamed) = catalog.rename("old name", "New Name").await.unwrap();

        assert_eq!(previous.name(), "Old Name");
        assert_eq!(renamed.name(), "New Name");
        assert!(!catalog.library().feed_dir(&previous).exists());
        assert!(catalog.library().feed_dir(&renamed).is_dir());
        assert!(catalog.feed("new name").is_ok());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn rename_keeps_old_name_when_directory_cannot_move() {
        let dir = tempdir().unwrap();
        let source = MockSource::default().with("https://a.example/feed", parsed("A", vec![]));
        let (catalog, store) = setup(dir.path(), source);
        catalog.add("https://a.example/feed", None, None).await.unwrap();

        let feed = store.find_feed_by_name("A").unwrap().unwrap();
        catalog.library().prepare_feed_dir(&feed).unwrap();
        let mut blocked = feed.clone();
        blocked.set_name("B").unwrap();
        std::os::unix::fs::symlink(
            dir.path().join("nowhere"),
            catalog.library().feed_dir(&blocked),
        )
        .unwrap();

        let result = catalog.rename("A", "B").await;

        assert!(matches!(result, Err(CatalogError::Library(_))));
        assert!(store.find_feed_by_name("A").unwrap().is_some());
        assert!(store.find_feed_by_name("B").unwrap().is_none());
        assert!(catalog.library().feed_dir(&feed).is_dir());
    }

    #[tokio::test]
    async fn rename_allows_case_change_of_same_feed() {
        let dir = tempdir().unwrap();
        let source = MockSource::default().with("https://a.example/feed", parsed("show", vec![]));
        let (catalog, _) = setup(dir.path(), source);
        catalog.add("https://a.example/feed", None, None).await.unwrap();

        let (_, renamed) = catalog.rename("show", "Show").await.unwrap();

        assert_eq!(renamed.name(), "Show");
    }

    #[tokio::test]
    async fn update_failure_is_collected_and_does_not_advance_last_updated() {
        let dir = tempdir().unwrap();
        let source = MockSource::default()
            .with("https://a.example/feed", parsed("A", vec![entry("1", "2024-01-01")]));
        let (catalog, store) = setup(dir.path(), source);
        catalog.add("https://a.example/feed", None, None).await.unwrap();
        let broken = store
            .create_feed(NewFeed::new("Broken", "https://gone.example/feed", "", 3).unwrap())
            .unwrap();

        let summary = catalog.update(&[]).await.unwrap();

        assert_eq!(summary.succeeded.len(), 1);
        assert_eq!(summary.failed.len(), 1);
        assert_eq!(summary.failed[0].0, "Broken");
        assert!(matches!(summary.failed[0].1, CatalogError::Fetch(_)));
        assert!(!summary.all_failed());
        let stored = store.feed(broken.id()).unwrap().unwrap();
        assert!(stored.last_updated().is_none());
    }

    #[tokio::test]
    async fn update_skips_unsubscribed_and_unknown_names() {
        let dir = tempdir().unwrap();
        let source = MockSource::default()
            .with("https://a.example/feed", parsed("A", vec![]))
            .with("https://b.example/feed", parsed("B", vec![]));
        let (catalog, _) = setup(dir.path(), source);
        catalog.add("https://a.example/feed", None, None).await.unwrap();
        catalog.add("https://b.example/feed", None, None).await.unwrap();
        catalog.unsubscribe(&["b".to_string()]).await.unwrap();

        let summary = catalog
            .update(&["A".to_string(), "B".to_string(), "nobody".to_string()])
            .await
            .unwrap();

        let updated: Vec<_> = summary.succeeded.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(updated, vec!["A"]);
        assert!(summary.failed.is_empty());
    }

    #[tokio::test]
    async fn download_fetches_then_skips_existing_files() {
        let dir = tempdir().unwrap();
        let source = MockSource::default().with(
            "https://a.example/feed",
            parsed("A", vec![entry("1", "2024-01-01"), entry("2", "2024-01-02")]),
        );
        let (catalog, store) = setup(dir.path(), source);
        let AddOutcome::Created(feed, _) = catalog
            .add("https://a.example/feed", None, None)
            .await
            .unwrap()
        else {
            panic!("expected a new feed");
        };

        let first = catalog.download(&[], DownloadPolicy::default()).await.unwrap();
        let (_, report) = &first.succeeded[0];
        assert_eq!(report.downloaded, 2);
        assert_eq!(report.bytes, 10);
        assert!(
            store
                .episodes(feed.id())
                .unwrap()
                .iter()
                .all(Episode::is_downloaded)
        );

        let second = catalog.download(&[], DownloadPolicy::default()).await.unwrap();
        let (_, report) = &second.succeeded[0];
        assert_eq!(report.downloaded, 0);
        assert_eq!(report.skipped, 2);
    }

    #[tokio::test]
    async fn download_collects_episode_failures_per_feed() {
        let dir = tempdir().unwrap();
        let source = MockSource::default().with(
            "https://a.example/feed",
            parsed("A", vec![entry("ok", "2024-01-01"), entry("missing", "2024-01-02")]),
        );
        let (catalog, _) = setup(dir.path(), source);
        catalog.add("https://a.example/feed", None, None).await.unwrap();

        let summary = catalog.download(&[], DownloadPolicy::default()).await.unwrap();

        let (_, report) = &summary.succeeded[0];
        assert_eq!(report.downloaded, 1);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].0, "Episode missing");
        assert!(matches!(
            report.failed[0].1,
            DownloadError::HttpStatus { status: 404, .. }
        ));
    }

    #[tokio::test]
    async fn download_removes_partial_leftovers() {
        let dir = tempdir().unwrap();
        let source = MockSource::default().with("https://a.example/feed", parsed("A", vec![]));
        let (catalog, _) = setup(dir.path(), source);
        let AddOutcome::Created(feed, _) = catalog
            .add("https://a.example/feed", None, None)
            .await
            .unwrap()
        else {
            panic!("expected a new feed");
        };
        let feed_dir = catalog.library().feed_dir(&feed);
        std::fs::create_dir_all(&feed_dir).unwrap();
        std::fs::write(feed_dir.join("old.mp3.partial"), b"half").unwrap();

        catalog.download(&[], DownloadPolicy::default()).await.unwrap();

        assert!(!feed_dir.join("old.mp3.partial").exists());
    }

    #[tokio::test]
    async fn subscribe_reports_only_changed_feeds() {
        let dir = tempdir().unwrap();
        let source = MockSource::default()
            .with("https://a.example/feed", parsed("A", vec![]))
            .with("https://b.example/feed", parsed("B", vec![]));
        let (catalog, _) = setup(dir.path(), source);
        catalog.add("https://a.example/feed", None, None).await.unwrap();
        catalog.add("https://b.example/feed", None, None).await.unwrap();

        let changed = catalog.unsubscribe(&["B".to_string()]).await.unwrap();
        assert_eq!(names(&changed), vec!["B"]);

        let changed = catalog.subscribe(&[]).await.unwrap();
        assert_eq!(names(&changed), vec!["B"]);

        assert!(catalog.subscribe(&[]).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn set_retention_validates_and_applies() {
        let dir = tempdir().unwrap();
        let source = MockSource::default().with(
            "https://a.example/feed",
            parsed("A", vec![entry("1", "2024-01-01"), entry("2", "2024-01-02")]),
        );
        let (catalog, store) = setup(dir.path(), source);
        catalog.add("https://a.example/feed", None, None).await.unwrap();

        assert!(matches!(
            catalog.set_retention(0, &[]).await,
            Err(CatalogError::InvalidArgument(ValidationError::ZeroRetention))
        ));

        let changed = catalog.set_retention(1, &["a".to_string()]).await.unwrap();
        assert_eq!(changed[0].number_to_keep(), 1);
        // No retroactive trim
        assert_eq!(store.episodes(changed[0].id()).unwrap().len(), 2);

        catalog.update(&[]).await.unwrap();
        assert_eq!(store.episodes(changed[0].id()).unwrap().len(), 1);
    }

    #[tokio::test]
    async fn describe_sets_description() {
        let dir = tempdir().unwrap();
        let source = MockSource::default().with("https://a.example/feed", parsed("A", vec![]));
        let (catalog, _) = setup(dir.path(), source);
        catalog.add("https://a.example/feed", None, None).await.unwrap();

        catalog.describe("My favourite", &[]).await.unwrap();

        assert_eq!(catalog.feed("A").unwrap().feed.description(), "My favourite");
    }

    #[tokio::test]
    async fn feeds_lists_episodes_newest_first() {
        let dir = tempdir().unwrap();
        let source = MockSource::default().with(
            "https://a.example/feed",
            parsed("A", vec![entry("old", "2024-01-01"), entry("new", "2024-03-01")]),
        );
        let (catalog, _) = setup(dir.path(), source);
        catalog.add("https://a.example/feed", None, None).await.unwrap();

        let listings = catalog.feeds().unwrap();

        assert_eq!(listings.len(), 1);
        let ids: Vec<_> = listings[0]
            .episodes
            .iter()
            .map(|e| e.episode_id())
            .collect();
        assert_eq!(ids, vec!["new", "old"]);
    }

    #[tokio::test]
    async fn store_name_conflicts_surface_as_catalog_conflicts() {
        let dir = tempdir().unwrap();
        let (catalog, store) = setup(dir.path(), MockSource::default());
        store
            .create_feed(NewFeed::new("Taken", "https://t.example/feed", "", 3).unwrap())
            .unwrap();

        let err: CatalogError = store
            .create_feed(NewFeed::new("taken", "https://u.example/feed", "", 3).unwrap())
            .unwrap_err()
            .into();

        assert!(matches!(err, CatalogError::NameConflict(_)));
        assert!(catalog.feed("TAKEN").is_ok());
    }
}
