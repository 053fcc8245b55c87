use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};

use anyhow::{Context, Result};
use clap::{ArgAction, Parser, Subcommand};
use colored::Colorize;
use console::Emoji;
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};

use podkeeper::{
    AddOutcome, CatalogError, Config, ConfigOverrides, DownloadPolicy, Feed, FeedCatalog,
    FeedDownloadReport, HttpFeedSource, JsonStore, NoopReporter, ProgressEvent, ProgressReporter,
    ReconcileOutcome, ReqwestClient, RunSummary, SharedProgressReporter,
};

// Emoji with fallback for terminals without Unicode support
static MICROPHONE: Emoji<'_, '_> = Emoji("🎙️  ", "");
static SEARCH: Emoji<'_, '_> = Emoji("🔍 ", "[~] ");
static HEADPHONES: Emoji<'_, '_> = Emoji("🎧 ", "[i] ");
static DOWNLOAD: Emoji<'_, '_> = Emoji("📥 ", "[v] ");
static SUCCESS: Emoji<'_, '_> = Emoji("✅ ", "[+] ");
static FAILURE: Emoji<'_, '_> = Emoji("❌ ", "[!] ");
static BROOM: Emoji<'_, '_> = Emoji("🧹 ", "[-] ");
static PARTY: Emoji<'_, '_> = Emoji("🎉 ", "[*] ");
static FOLDER: Emoji<'_, '_> = Emoji("📁 ", "");
static CROSS: Emoji<'_, '_> = Emoji("✗ ", "x ");

/// Keep a bounded set of episodes from your podcast subscriptions
#[derive(Parser, Debug)]
#[command(name = "podkeeper")]
#[command(about = "Keep a bounded set of episodes from your podcast subscriptions")]
#[command(version)]
struct Cli {
    /// Path to a JSON config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Root directory for downloaded episodes
    #[arg(long, global = true)]
    download_dir: Option<PathBuf>,

    /// Path to the feed store
    #[arg(long, global = true)]
    store: Option<PathBuf>,

    /// More log output (repeat for more)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    /// Quiet mode - suppress progress output
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Fetch feeds and record new episodes
    #[command(visible_alias = "up")]
    Update {
        /// Feeds to update (all when omitted)
        names: Vec<String>,
    },

    /// Download episodes of subscribed feeds
    #[command(visible_alias = "dl")]
    Download {
        /// Feeds to download (all when omitted)
        names: Vec<String>,

        /// Replace files that already exist
        #[arg(long)]
        overwrite: bool,

        /// Also fetch episodes that were downloaded before
        #[arg(long)]
        all: bool,
    },

    /// Add a feed by URL or local path
    Add {
        url: String,

        /// Name to use instead of the feed title
        #[arg(long)]
        name: Option<String>,

        /// Number of episodes to keep
        #[arg(long)]
        keep: Option<u32>,
    },

    /// Resume updating and downloading feeds
    Subscribe { names: Vec<String> },

    /// Stop updating and downloading feeds
    Unsubscribe { names: Vec<String> },

    /// Rename a feed
    Rename { old: String, new: String },

    /// Set how many episodes feeds keep
    Keep { count: u32, names: Vec<String> },

    /// Set the description of feeds
    Describe {
        description: String,
        names: Vec<String>,
    },

    /// List feeds and their episodes
    List,
}

/// Progress reporter using indicatif for terminal output
struct IndicatifReporter {
    multi: MultiProgress,
    bars: Mutex<HashMap<usize, ProgressBar>>,
    main_bar: ProgressBar,
}

impl IndicatifReporter {
    fn new() -> Self {
        let multi = MultiProgress::new();

        let main_style = ProgressStyle::with_template("{spinner:.green} {wide_msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner());

        let main_bar = multi.add(ProgressBar::new_spinner());
        main_bar.set_style(main_style);
        main_bar.enable_steady_tick(std::time::Duration::from_millis(100));

        Self {
            multi,
            bars: Mutex::new(HashMap::new()),
            main_bar,
        }
    }

    fn bars(&self) -> MutexGuard<'_, HashMap<usize, ProgressBar>> {
        self.bars.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn get_or_create_bar(&self, download_id: usize) -> ProgressBar {
        let mut bars = self.bars();

        if let Some(bar) = bars.get(&download_id) {
            return bar.clone();
        }

        let style = ProgressStyle::with_template(&format!(
            "  {DOWNLOAD}[{{bar:30.cyan/blue}}] {{bytes}}/{{total_bytes}} {{wide_msg}}"
        ))
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▓░");

        let bar = self.multi.add(ProgressBar::new(0));
        bar.set_style(style);
        bars.insert(download_id, bar.clone());
        bar
    }

    fn finish_bar(&self, download_id: usize) {
        if let Some(bar) = self.bars().remove(&download_id) {
            bar.finish_and_clear();
        }
    }

    fn line(&self, message: String) {
        let _ = self.multi.println(message);
    }

    fn finish(&self) {
        self.main_bar.finish_and_clear();
    }
}

impl ProgressReporter for IndicatifReporter {
    fn report(&self, event: ProgressEvent) {
        match event {
            ProgressEvent::FetchingFeed { feed_name, url, .. } => {
                self.main_bar.set_message(format!(
                    "{SEARCH}Fetching {}: {}",
                    feed_name.bold(),
                    url.cyan()
                ));
            }

            ProgressEvent::FeedUpdated {
                feed_name,
                new_episodes,
                evicted_episodes,
                retained,
                ..
            } => {
                self.line(format!(
                    "{HEADPHONES}{} • {} new, {} removed, {} kept",
                    feed_name.bold().green(),
                    new_episodes.to_string().yellow(),
                    evicted_episodes.to_string().cyan(),
                    retained.to_string().cyan()
                ));
            }

            ProgressEvent::FeedFailed {
                feed_name, error, ..
            } => {
                self.line(format!("{FAILURE}{} - {}", feed_name.red().bold(), error.red()));
            }

            ProgressEvent::PartialFilesCleanedUp { feed_name, count } => {
                let message = format!("{BROOM}{feed_name}: removed {count} partial download(s)");
                self.line(message.dimmed().to_string());
            }

            ProgressEvent::DownloadStarting {
                download_id,
                feed_name,
                episode_title,
                content_length,
            } => {
                let bar = self.get_or_create_bar(download_id);
                bar.set_length(content_length.unwrap_or(0));
                bar.set_position(0);
                bar.set_message(format!(
                    "[{}] {}",
                    truncate_title(&feed_name, 20).cyan(),
                    truncate_title(&episode_title, 40)
                ));
            }

            ProgressEvent::DownloadProgress {
                download_id,
                bytes_downloaded,
                total_bytes,
                ..
            } => {
                let bar = self.get_or_create_bar(download_id);
                if let Some(total) = total_bytes {
                    bar.set_length(total);
                }
                bar.set_position(bytes_downloaded);
            }

            ProgressEvent::DownloadCompleted {
                download_id,
                episode_title,
                bytes_downloaded,
            } => {
                let bar = self.get_or_create_bar(download_id);
                bar.set_position(bytes_downloaded);
                self.line(format!(
                    "{SUCCESS}{}",
                    truncate_title(&episode_title, 60).green()
                ));
                self.finish_bar(download_id);
            }

            ProgressEvent::DownloadSkipped { .. } => {}

            ProgressEvent::DownloadFailed {
                download_id,
                episode_title,
                error,
            } => {
                self.line(format!(
                    "{FAILURE}{} - {}",
                    truncate_title(&episode_title, 30).red(),
                    error.red()
                ));
                self.finish_bar(download_id);
            }
        }
    }
}

fn truncate_title(title: &str, max_len: usize) -> String {
    if title.chars().count() <= max_len {
        title.to_string()
    } else {
        let kept: String = title.chars().take(max_len.saturating_sub(3)).collect();
        format!("{kept}...")
    }
}

fn init_tracing(verbose: u8, quiet: bool) {
    let default_level = match (quiet, verbose) {
        (true, _) => "error",
        (false, 0) => "warn",
        (false, 1) => "info",
        (false, 2) => "debug",
        _ => "trace",
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));
    let _ = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(filter)
        .try_init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.quiet);

    let config = Config::load(
        cli.config.as_deref(),
        ConfigOverrides {
            download_dir: cli.download_dir.clone(),
            store_path: cli.store.clone(),
        },
    )
    .context("Failed to load configuration")?;

    let client = ReqwestClient::with_user_agent(&config.user_agent)
        .context("Failed to build HTTP client")?;
    let store = JsonStore::open(&config.store_path)
        .with_context(|| format!("Failed to open store {}", config.store_path.display()))?;
    tracing::debug!(path = %store.path().display(), "Opened store");

    let shows_progress = matches!(cli.command, Command::Update { .. } | Command::Download { .. });
    let reporter = (shows_progress && !cli.quiet).then(|| Arc::new(IndicatifReporter::new()));
    let shared: SharedProgressReporter = match &reporter {
        Some(r) => r.clone() as SharedProgressReporter,
        None => NoopReporter::shared(),
    };

    let catalog = FeedCatalog::new(
        Arc::new(store),
        Arc::new(HttpFeedSource::new(client.clone())),
        Arc::new(client),
        &config,
    )
    .with_reporter(shared);

    let out = Output { quiet: cli.quiet };
    let succeeded = match cli.command {
        Command::Update { names } => {
            out.banner();
            let summary = catalog.update(&names).await?;
            if let Some(r) = &reporter {
                r.finish();
            }
            out.update_summary(&summary);
            !summary.all_failed()
        }

        Command::Download {
            names,
            overwrite,
            all,
        } => {
            out.banner();
            let policy = DownloadPolicy {
                overwrite,
                new_only: !all,
            };
            let summary = catalog.download(&names, policy).await?;
            if let Some(r) = &reporter {
                r.finish();
            }
            out.download_summary(&summary);
            if !cli.quiet {
                println!(
                    "\n{FOLDER}Output: {}\n",
                    catalog.library().root().display().to_string().cyan()
                );
            }
            download_succeeded(&summary)
        }

        Command::Add { url, name, keep } => {
            match catalog.add(&url, name.as_deref(), keep).await? {
                AddOutcome::Existing(feed) => {
                    out.note(format!("Feed {} already exists", feed.name().bold()))
                }
                AddOutcome::Created(feed, outcome) => out.note(format!(
                    "{SUCCESS}Added {} with {} episode(s)",
                    feed.name().bold().green(),
                    outcome.retained
                )),
            }
            true
        }

        Command::Subscribe { names } => {
            out.changed("Subscribed", &catalog.subscribe(&names).await?);
            true
        }

        Command::Unsubscribe { names } => {
            out.changed("Unsubscribed", &catalog.unsubscribe(&names).await?);
            true
        }

        Command::Rename { old, new } => {
            let (previous, renamed) = catalog.rename(&old, &new).await?;
            out.note(format!(
                "Renamed {} to {}",
                previous.name().yellow(),
                renamed.name().bold().green()
            ));
            true
        }

        Command::Keep { count, names } => {
            out.changed(
                &format!("Keeping {count} episode(s) for"),
                &catalog.set_retention(count, &names).await?,
            );
            true
        }

        Command::Describe { description, names } => {
            out.changed(
                "Updated description of",
                &catalog.describe(&description, &names).await?,
            );
            true
        }

        Command::List => {
            list(&catalog)?;
            true
        }
    };

    if !succeeded {
        std::process::exit(1);
    }

    Ok(())
}

/// Downloads fail the run when nothing succeeded but something failed
fn download_succeeded(summary: &RunSummary<FeedDownloadReport>) -> bool {
    if summary.all_failed() {
        return false;
    }
    let downloaded: usize = summary.succeeded.iter().map(|(_, r)| r.downloaded).sum();
    let failed: usize = summary.succeeded.iter().map(|(_, r)| r.failed.len()).sum();
    !(failed > 0 && downloaded == 0)
}

struct Output {
    quiet: bool,
}

impl Output {
    fn banner(&self) {
        if self.quiet {
            return;
        }
        println!(
            "\n{}{} {}\n",
            MICROPHONE,
            "podkeeper".bold().magenta(),
            "- Podcast Keeper".dimmed()
        );
    }

    fn note(&self, message: String) {
        if !self.quiet {
            println!("{message}");
        }
    }

    fn changed(&self, action: &str, feeds: &[Feed]) {
        if self.quiet {
            return;
        }
        if feeds.is_empty() {
            println!("{}", "Nothing to change".dimmed());
            return;
        }
        let names: Vec<_> = feeds.iter().map(Feed::name).collect();
        println!("{action} {}", names.join(", ").bold());
    }

    fn failures(&self, failed: &[(String, CatalogError)]) {
        if failed.is_empty() {
            return;
        }
        eprintln!("\n{}", "Failed feeds:".red().bold());
        for (name, error) in failed {
            eprintln!("  {}{} - {}", CROSS, name.yellow(), error.to_string().dimmed());
        }
    }

    fn update_summary(&self, summary: &RunSummary<ReconcileOutcome>) {
        self.failures(&summary.failed);
        if self.quiet {
            return;
        }
        if summary.is_empty() {
            println!("{}", "No subscribed feeds to update".dimmed());
            return;
        }
        let new_episodes: usize = summary
            .succeeded
            .iter()
            .map(|(_, o)| o.new_episodes.len())
            .sum();
        println!(
            "\n{PARTY}{} {} feed(s) updated, {} new episode(s), {} failed",
            "Update complete:".bold().green(),
            summary.succeeded.len().to_string().green().bold(),
            new_episodes.to_string().yellow(),
            failed_count(summary.failed.len())
        );
    }

    fn download_summary(&self, summary: &RunSummary<FeedDownloadReport>) {
        self.failures(&summary.failed);

        let episode_failures: Vec<_> = summary
            .succeeded
            .iter()
            .flat_map(|(feed, report)| report.failed.iter().map(move |f| (feed, f)))
            .collect();
        if !episode_failures.is_empty() {
            eprintln!("\n{}", "Failed episodes:".red().bold());
            for (feed, (title, error)) in episode_failures {
                eprintln!(
                    "  {}{} / {} - {}",
                    CROSS,
                    feed.cyan(),
                    title.yellow(),
                    error.to_string().dimmed()
                );
            }
        }

        if self.quiet {
            return;
        }
        let (downloaded, skipped, failed) =
            summary
                .succeeded
                .iter()
                .fold((0, 0, 0), |(d, s, f), (_, r)| {
                    (d + r.downloaded, s + r.skipped, f + r.failed.len())
                });
        println!(
            "\n{PARTY}{} {} downloaded, {} skipped, {} failed",
            "Download complete:".bold().green(),
            downloaded.to_string().green().bold(),
            skipped.to_string().yellow(),
            failed_count(failed + summary.failed.len())
        );
    }
}

fn failed_count(count: usize) -> colored::ColoredString {
    if count > 0 {
        count.to_string().red().bold()
    } else {
        count.to_string().green()
    }
}

fn list(catalog: &FeedCatalog) -> Result<()> {
    let listings = catalog.feeds().context("Failed to read feeds")?;
    if listings.is_empty() {
        println!("{}", "No feeds yet. Add one with `podkeeper add <url>`.".dimmed());
        return Ok(());
    }

    for listing in listings {
        let feed = &listing.feed;
        let status = if feed.is_subscribed() {
            "subscribed".green()
        } else {
            "unsubscribed".yellow()
        };
        let updated = feed
            .last_updated()
            .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_else(|| "never".to_string());

        println!(
            "{HEADPHONES}{} ({}, keep {}, updated {})",
            feed.name().bold(),
            status,
            feed.number_to_keep(),
            updated.dimmed()
        );
        println!("   {}", feed.url().cyan());
        for episode in &listing.episodes {
            let marker = if episode.is_downloaded() {
                SUCCESS.to_string()
            } else {
                "   ".to_string()
            };
            println!(
                "   {marker}{} {}",
                episode.episode_date().to_string().dimmed(),
                episode.title()
            );
        }
    }

    Ok(())
}
