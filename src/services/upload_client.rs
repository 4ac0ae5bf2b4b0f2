//! Boundary to the video hosting platform.
//!
//! The pipeline and the reconciler only ever talk to [`UploadClient`]; the
//! production implementation is [`YouTubeClient`](crate::services::YouTubeClient).

use crate::error::UploadError;
use crate::models::{DEFAULT_TITLE_MAX_CHARS, EffectiveConfig, PlaylistItem, PlaylistSpec};
use async_trait::async_trait;
use camino::Utf8Path;

pub type Result<T> = std::result::Result<T, UploadError>;

/// Video platform operations used by the pipeline
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait UploadClient: Send + Sync {
    /// Upload `path` as a new video and return its id.
    ///
    /// Long-running; implementations report progress through `tracing`.
    async fn upload(&self, path: &Utf8Path, title: &str, config: &EffectiveConfig) -> Result<String>;

    async fn add_to_playlist(&self, playlist_id: &str, video_id: &str, add_first: bool) -> Result<()>;

    /// Find the playlist tagged with `code`, creating it from `spec` if none exists.
    async fn get_or_create_playlist(&self, code: &str, spec: &PlaylistSpec) -> Result<String>;

    /// Reload the code → playlist mapping from the platform
    async fn refresh_playlists(&self) -> Result<()> {
        Ok(())
    }

    /// All items of a playlist, in playlist order
    async fn list_playlist_items(&self, playlist_id: &str) -> Result<Vec<PlaylistItem>>;

    async fn update_video(&self, video_id: &str, title: &str, description: &str) -> Result<()>;

    async fn update_playlist_metadata(
        &self,
        playlist_id: &str,
        title: &str,
        description: &str,
        privacy_status: &str,
    ) -> Result<()>;
}

/// Title length limit applied before anything is sent to the platform
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TitlePolicy {
    pub max_chars: usize,
}

/// A title cut down to fit the platform
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FittedTitle {
    pub title: String,
    pub truncated: bool,
}

impl TitlePolicy {
    pub fn new(max_chars: usize) -> Self {
        Self { max_chars }
    }

    /// Truncate on a character boundary
    pub fn fit(&self, title: &str) -> FittedTitle {
        match title.char_indices().nth(self.max_chars) {
            Some((cut, _)) => FittedTitle {
                title: title[..cut].to_string(),
                truncated: true,
            },
            None => FittedTitle {
                title: title.to_string(),
                truncated: false,
            },
        }
    }

    /// Description to send alongside `title`: the full title is kept at the
    /// top when it had to be truncated.
    pub fn describe(&self, title: &str, description: &str) -> String {
        if self.fit(title).truncated {
            if description.is_empty() {
                title.to_string()
            } else {
                format!("{title}\n\n{description}")
            }
        } else {
            description.to_string()
        }
    }
}

impl Default for TitlePolicy {
    fn default() -> Self {
        Self::new(DEFAULT_TITLE_MAX_CHARS)
    }
}
