use std::collections::HashSet;
use std::ops::Range;

/// One entry of a remote playlist
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaylistItem {
    pub item_id: String,
    pub video_id: String,
    pub title: String,
    pub description: String,
}

/// Ordered, immutable view of a playlist taken once per reconciliation run.
///
/// Positional references are always resolved against a single snapshot; it is
/// never refreshed in place.
#[derive(Debug, Clone, Default)]
pub struct PlaylistSnapshot {
    items: Vec<PlaylistItem>,
    known_ids: HashSet<String>,
}

impl PlaylistSnapshot {
    pub fn new(items: Vec<PlaylistItem>) -> Self {
        let known_ids = items.iter().map(|i| i.video_id.clone()).collect();
        Self { items, known_ids }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn contains(&self, video_id: &str) -> bool {
        self.known_ids.contains(video_id)
    }

    /// Map a signed 1-based manifest index onto a snapshot offset.
    ///
    /// `p > 0` maps to `p - 1`; `p <= 0` counts from the end (`-1` is the
    /// last item). Offsets outside the snapshot yield `None`.
    pub fn offset_of(&self, index: i64) -> Option<usize> {
        let len = self.items.len() as i64;
        let offset = if index > 0 { index - 1 } else { len + index };
        (0..len).contains(&offset).then_some(offset as usize)
    }

    pub fn resolve(&self, index: i64) -> Option<&PlaylistItem> {
        self.offset_of(index).map(|offset| &self.items[offset])
    }

    /// First item carrying `video_id`
    pub fn find(&self, video_id: &str) -> Option<&PlaylistItem> {
        self.items.iter().find(|i| i.video_id == video_id)
    }

    pub fn items(&self) -> &[PlaylistItem] {
        &self.items
    }
}

/// How a manifest link names its video
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReferenceKind {
    Direct(String),
    Positional(i64),
}

/// A link found in a manifest
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestReference {
    pub kind: ReferenceKind,
    /// Display title inside the brackets
    pub title: String,
    /// Exact manifest text the reference was parsed from
    pub matched: String,
    /// Byte range of `matched` within the manifest
    pub span: Range<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TitleChange {
    pub video_id: String,
    pub old_title: String,
    pub new_title: String,
}

impl TitleChange {
    /// Change-log line: `(id): old --(changed)--> new`
    pub fn log_line(&self) -> String {
        format!(
            "({}): {} --(changed)--> {}",
            self.video_id, self.old_title, self.new_title
        )
    }
}
