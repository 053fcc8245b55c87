// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use url::Url;

use crate::model::{Episode, FeedId};

/// Replacement for every character outside the allowed set
const REPLACEMENT: char = '-';

/// Maximum number of title characters kept in a filename.
///
/// Date, extension and the `.partial` suffix must still fit in 255 bytes.
const MAX_TITLE_LENGTH: usize = 200;

/// Check if a character is allowed in filenames (whitelist approach)
fn is_valid_filename_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | '(' | ')' | ' ')
}

/// Map arbitrary text to a filesystem-safe token.
///
/// Each character outside ASCII letters, digits, `-`, `_`, `.`, `(`, `)` and
/// space is replaced by `-`, one for one. The result has the same number of
/// characters as the input, and sanitizing twice changes nothing.
pub fn sanitize(text: &str) -> String {
    text.chars()
        .map(|c| {
            if is_valid_filename_char(c) {
                c
            } else {
                REPLACEMENT
            }
        })
        .collect()
}

/// Extension of the last path segment of `url`, including the leading dot.
///
/// Returns an empty string when the URL has no extension. Query strings and
/// fragments are ignored; the extension is sanitized like the rest of the name.
pub fn extension_from_url(url: &str) -> String {
    let last_segment = match Url::parse(url) {
        Ok(parsed) => parsed
            .path_segments()
            .and_then(|mut segments| segments.next_back())
            .map(str::to_string),
        Err(_) => url
            .split(['?', '#'])
            .next()
            .and_then(|path| path.rsplit('/').next())
            .map(str::to_string),
    };

    let Some(segment) = last_segment else {
        return String::new();
    };

    match segment.rfind('.') {
        // A leading dot names a hidden file, not an extension
        Some(pos) if pos > 0 && pos + 1 < segment.len() => sanitize(&segment[pos..]),
        _ => String::new(),
    }
}

/// Generate the filename stem (without extension) for an episode
///
/// Format: "YYYY-MM-DD_title", sanitized as a whole. Titles longer than
/// `MAX_TITLE_LENGTH` characters are cut off.
pub fn episode_filename_stem(episode: &Episode) -> String {
    let date = episode.episode_date().format("%Y-%m-%d");
    let title: String = episode.title().chars().take(MAX_TITLE_LENGTH).collect();
    sanitize(&format!("{}_{}", date, title))
}

/// Generate the complete media filename for an episode
pub fn episode_filename(episode: &Episode) -> String {
    format!(
        "{}{}",
        episode_filename_stem(episode),
        extension_from_url(episode.url())
    )
}

/// Directory name for a feed's downloads.
///
/// Spaces become underscores before sanitizing. Names that would resolve to
/// the current or parent directory fall back to `feed-<id>`.
pub fn feed_dir_name(name: &str, id: FeedId) -> String {
    let sanitized = sanitize(&name.trim().replace(' ', "_"));

    if sanitized.is_empty() || sanitized.chars().all(|c| c == '.') {
        format!("feed-{}", id)
    } else {
        sanitized
    }
}
