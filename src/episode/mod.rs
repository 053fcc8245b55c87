mod download;
mod filename;

pub use download::{
    DownloadContext, DownloadOutcome, DownloadPolicy, DownloadResult, download_episode,
    fetch_to_file,
};
pub use filename::{
    episode_filename, episode_filename_stem, extension_from_url, feed_dir_name, sanitize,
};
