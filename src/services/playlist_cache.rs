//! Code → playlist id lookups.
//!
//! Playlists created by this tool carry a marker `[autotube:<code>]` in their
//! description, which makes the mapping recoverable after a restart without
//! any local storage.
//!
//! The code is escaped inside the marker (`\\` and `\]`), so any group key
//! reads back unchanged.
//!
//! Staleness contract: entries learned from remote data only ever arrive
//! through [`PlaylistCache::refresh`], which replaces the whole map. Callers
//! refresh once at the start of a reconciliation run and once more on a lookup
//! miss before creating a new playlist. The one single-entry write is
//! [`PlaylistCache::insert_created`], for a playlist this process has just
//! created; it is overwritten by the next refresh like any other entry.

use regex::Regex;
use std::borrow::Cow;
use std::collections::HashMap;
use std::sync::LazyLock;
use std::time::Instant;

static MARKER_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[autotube:((?:[^\]\\]|\\.)+)\]").expect("Invalid marker regex"));

/// Description marker identifying the playlist for `code`
pub fn marker_for(code: &str) -> String {
    let escaped = code.replace('\\', r"\\").replace(']', r"\]");
    format!("[autotube:{escaped}]")
}

/// Code embedded in a playlist description, if any
pub fn parse_marker(description: &str) -> Option<Cow<'_, str>> {
    let raw = MARKER_PATTERN.captures(description)?.get(1)?.as_str();
    if !raw.contains('\\') {
        return Some(Cow::Borrowed(raw));
    }

    let mut code = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' => code.extend(chars.next()),
            other => code.push(other),
        }
    }
    Some(Cow::Owned(code))
}

/// Append the marker for `code` to `description` unless it is already there
pub fn with_marker(description: &str, code: &str) -> String {
    if parse_marker(description).as_deref() == Some(code) {
        return description.to_string();
    }
    let marker = marker_for(code);
    if description.is_empty() {
        marker
    } else {
        format!("{description}\n\n{marker}")
    }
}

#[derive(Debug, Default)]
pub struct PlaylistCache {
    entries: HashMap<String, String>,
    refreshed_at: Option<Instant>,
}

impl PlaylistCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace every entry from `(playlist_id, description)` pairs.
    ///
    /// When two playlists carry the same code the first one listed wins.
    pub fn refresh<'a, I>(&mut self, playlists: I)
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut entries = HashMap::new();
        for (id, description) in playlists {
            if let Some(code) = parse_marker(description) {
                entries
                    .entry(code.into_owned())
                    .or_insert_with(|| id.to_string());
            }
        }
        tracing::debug!("Playlist cache refreshed with {} tagged playlists", entries.len());
        self.entries = entries;
        self.refreshed_at = Some(Instant::now());
    }

    pub fn get(&self, code: &str) -> Option<&str> {
        self.entries.get(code).map(String::as_str)
    }

    /// Record a playlist this process just created
    pub fn insert_created(&mut self, code: &str, playlist_id: &str) {
        self.entries.insert(code.to_string(), playlist_id.to_string());
    }

    pub fn is_loaded(&self) -> bool {
        self.refreshed_at.is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
