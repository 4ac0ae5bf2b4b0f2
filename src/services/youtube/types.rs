//! YouTube Data API v3 response types
//!
//! Only the fields the pipeline reads are modelled.

use crate::models::PlaylistItem;
use serde::Deserialize;

/// Any `*.list` response
///
/// See: https://developers.google.com/youtube/v3/docs/playlistItems/list
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListResponse<T> {
    #[serde(default = "Vec::new")]
    pub items: Vec<T>,

    #[serde(default)]
    pub next_page_token: Option<String>,
}

/// Response of `videos.insert` and `playlists.insert`
#[derive(Debug, Deserialize)]
pub struct InsertedResource {
    pub id: String,
}

#[derive(Debug, Deserialize)]
pub struct PlaylistResource {
    pub id: String,

    #[serde(default)]
    pub snippet: Option<PlaylistSnippet>,
}

#[derive(Debug, Default, Deserialize)]
pub struct PlaylistSnippet {
    #[serde(default)]
    pub title: String,

    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Deserialize)]
pub struct PlaylistItemResource {
    pub id: String,
    pub snippet: PlaylistItemSnippet,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaylistItemSnippet {
    #[serde(default)]
    pub title: String,

    #[serde(default)]
    pub description: String,

    pub resource_id: ResourceId,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceId {
    #[serde(default)]
    pub video_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct VideoResource {
    pub id: String,
    pub snippet: VideoSnippet,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoSnippet {
    #[serde(default)]
    pub title: String,

    #[serde(default)]
    pub description: String,

    #[serde(default)]
    pub category_id: Option<String>,

    #[serde(default)]
    pub tags: Option<Vec<String>>,
}

impl From<PlaylistItemResource> for PlaylistItem {
    fn from(resource: PlaylistItemResource) -> Self {
        PlaylistItem {
            item_id: resource.id,
            video_id: resource.snippet.resource_id.video_id.unwrap_or_default(),
            title: resource.snippet.title,
            description: resource.snippet.description,
        }
    }
}
