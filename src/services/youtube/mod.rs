//! YouTube Data API v3 implementation of [`UploadClient`].
//!
//! Credentials are out of scope: the client is handed an OAuth 2.0 access
//! token with the `youtube.upload` and `youtube` scopes.

pub mod types;

use crate::error::UploadError;
use crate::models::{DEFAULT_UPLOAD_CHUNK_BYTES, EffectiveConfig, PlaylistItem, PlaylistSpec};
use crate::services::playlist_cache::{PlaylistCache, with_marker};
use crate::services::upload_client::{Result, TitlePolicy, UploadClient};
use async_trait::async_trait;
use camino::Utf8Path;
use reqwest::header::{CONTENT_LENGTH, CONTENT_RANGE, LOCATION, RANGE};
use reqwest::{RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use std::io::SeekFrom;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tokio::sync::RwLock;
use tracing::{debug, info, instrument, warn};
use types::{
    InsertedResource, ListResponse, PlaylistItemResource, PlaylistResource, VideoResource,
};

/// YouTube Data API base URL
const API_BASE: &str = "https://www.googleapis.com/youtube/v3";

/// Resumable upload endpoint
const UPLOAD_URL: &str = "https://www.googleapis.com/upload/youtube/v3/videos";

/// Maximum results per page (API limit)
const MAX_PAGE_SIZE: &str = "50";

/// Upload chunks must be multiples of this
const CHUNK_GRANULARITY: usize = 256 * 1024;

const MAX_RETRIES: u32 = 3;

/// Environment variable holding the OAuth access token
pub const ACCESS_TOKEN_ENV: &str = "YOUTUBE_ACCESS_TOKEN";

pub struct YouTubeClient {
    http: reqwest::Client,
    access_token: String,
    titles: TitlePolicy,
    chunk_size: usize,
    playlists: RwLock<PlaylistCache>,
}

impl YouTubeClient {
    /// # Arguments
    ///
    /// * `access_token` - OAuth 2.0 access token
    /// * `titles` - Title limit applied to every title sent
    /// * `chunk_size` - Upload chunk size; rounded down to a multiple of 256 KiB
    pub fn new(access_token: String, titles: TitlePolicy, chunk_size: usize) -> Result<Self> {
        if access_token.trim().is_empty() {
            return Err(UploadError::AuthenticationFailed(
                "access token is empty".to_string(),
            ));
        }

        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(30))
            .user_agent(concat!("autotube/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            http,
            access_token,
            titles,
            chunk_size: normalize_chunk_size(chunk_size),
            playlists: RwLock::new(PlaylistCache::new()),
        })
    }

    /// Build a client from the `YOUTUBE_ACCESS_TOKEN` environment variable
    pub fn from_env(titles: TitlePolicy, chunk_size: usize) -> Result<Self> {
        let token = std::env::var(ACCESS_TOKEN_ENV).map_err(|_| {
            UploadError::AuthenticationFailed(format!("{ACCESS_TOKEN_ENV} is not set"))
        })?;
        Self::new(token, titles, chunk_size)
    }

    /// Send a request, retrying rate limits, server errors and network
    /// failures with exponential backoff.
    ///
    /// `build` is called once per attempt.
    async fn send_with_retry<F>(&self, build: F) -> Result<Response>
    where
        F: Fn() -> RequestBuilder,
    {
        let mut attempt = 0;

        loop {
            let outcome = build().bearer_auth(&self.access_token).send().await;

            let retry_reason = match outcome {
                Ok(response) => {
                    let status = response.status();
                    if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
                        format!("status={status}")
                    } else {
                        return Ok(response);
                    }
                }
                Err(e) if e.is_timeout() || e.is_connect() || e.is_request() => e.to_string(),
                Err(e) => return Err(e.into()),
            };

            attempt += 1;
            if attempt >= MAX_RETRIES {
                warn!("Request failed after {} attempts: {}", MAX_RETRIES, retry_reason);
                return Err(UploadError::NetworkError(format!(
                    "request failed after {MAX_RETRIES} attempts: {retry_reason}"
                )));
            }

            let backoff_ms = 500u64 * 2u64.pow(attempt);
            warn!(
                "Request failed (attempt {}/{}): {}, retrying in {}ms",
                attempt, MAX_RETRIES, retry_reason, backoff_ms
            );
            tokio::time::sleep(Duration::from_millis(backoff_ms)).await;
        }
    }

    async fn send_json<T, F>(&self, build: F) -> Result<T>
    where
        T: DeserializeOwned,
        F: Fn() -> RequestBuilder,
    {
        let response = check_status(self.send_with_retry(build).await?).await?;
        let body = response.bytes().await?;
        serde_json::from_slice(&body).map_err(|e| UploadError::ParseError(e.to_string()))
    }

    /// Fetch every page of a list endpoint
    async fn list_all<T>(&self, endpoint: &str, query: &[(&str, &str)]) -> Result<Vec<T>>
    where
        T: DeserializeOwned,
    {
        let url = format!("{API_BASE}/{endpoint}");
        let mut items = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let page: ListResponse<T> = self
                .send_json(|| {
                    let mut request = self
                        .http
                        .get(&url)
                        .timeout(Duration::from_secs(30))
                        .query(query)
                        .query(&[("maxResults", MAX_PAGE_SIZE)]);
                    if let Some(token) = &page_token {
                        request = request.query(&[("pageToken", token.as_str())]);
                    }
                    request
                })
                .await?;

            items.extend(page.items);
            match page.next_page_token {
                Some(token) if !token.is_empty() => page_token = Some(token),
                _ => break,
            }
        }

        Ok(items)
    }

    /// Reload the code → playlist id cache from the channel's playlists
    async fn reload_playlist_cache(&self) -> Result<()> {
        let playlists: Vec<PlaylistResource> = self
            .list_all("playlists", &[("part", "snippet"), ("mine", "true")])
            .await?;

        let mut cache = self.playlists.write().await;
        cache.refresh(playlists.iter().map(|p| {
            let description = p.snippet.as_ref().map(|s| s.description.as_str()).unwrap_or("");
            (p.id.as_str(), description)
        }));
        Ok(())
    }

    async fn cached_playlist(&self, code: &str) -> Option<String> {
        self.playlists.read().await.get(code).map(str::to_string)
    }

    async fn start_upload_session(&self, body: &Value, total: u64) -> Result<String> {
        let response = self
            .send_with_retry(|| {
                self.http
                    .post(UPLOAD_URL)
                    .timeout(Duration::from_secs(60))
                    .query(&[("uploadType", "resumable"), ("part", "snippet,status")])
                    .header("X-Upload-Content-Length", total)
                    .header("X-Upload-Content-Type", "video/*")
                    .json(body)
            })
            .await?;
        let response = check_status(response).await?;

        response
            .headers()
            .get(LOCATION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .ok_or_else(|| UploadError::ParseError("upload session has no Location header".to_string()))
    }
}

#[async_trait]
impl UploadClient for YouTubeClient {
    #[instrument(skip(self, config), fields(path = %path))]
    async fn upload(&self, path: &Utf8Path, title: &str, config: &EffectiveConfig) -> Result<String> {
        let mut file = tokio::fs::File::open(path).await?;
        let total = file.metadata().await?.len();
        if total == 0 {
            return Err(UploadError::Io(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                "file is empty",
            )));
        }

        let body = video_insert_body(title, config, &self.titles);
        let session = self.start_upload_session(&body, total).await?;
        info!("Video upload started ({} bytes)", total);

        let mut offset = 0u64;
        loop {
            let size = (total - offset).min(self.chunk_size as u64) as usize;
            let mut chunk = vec![0u8; size];
            file.seek(SeekFrom::Start(offset)).await?;
            file.read_exact(&mut chunk).await?;
            let content_range = format!("bytes {}-{}/{}", offset, offset + size as u64 - 1, total);

            let response = self
                .send_with_retry(|| {
                    self.http
                        .put(&session)
                        .header(CONTENT_LENGTH, size as u64)
                        .header(CONTENT_RANGE, content_range.as_str())
                        .body(chunk.clone())
                })
                .await?;

            match response.status().as_u16() {
                200 | 201 => {
                    let inserted: InsertedResource = response
                        .json()
                        .await
                        .map_err(|e| UploadError::ParseError(e.to_string()))?;
                    if inserted.id.is_empty() {
                        return Err(UploadError::MissingVideoId);
                    }
                    info!("Video upload complete: {}", inserted.id);
                    return Ok(inserted.id);
                }
                // Resume Incomplete
                308 => {
                    offset = response
                        .headers()
                        .get(RANGE)
                        .and_then(|v| v.to_str().ok())
                        .and_then(next_offset_from_range)
                        .unwrap_or(0);
                    if offset >= total {
                        return Err(UploadError::MissingVideoId);
                    }
                    info!("Upload {}%", offset * 100 / total);
                }
                _ => return Err(check_status(response).await.err().unwrap_or(UploadError::MissingVideoId)),
            }
        }
    }

    #[instrument(skip(self))]
    async fn add_to_playlist(&self, playlist_id: &str, video_id: &str, add_first: bool) -> Result<()> {
        let mut snippet = json!({
            "playlistId": playlist_id,
            "resourceId": {"kind": "youtube#video", "videoId": video_id},
        });
        if add_first {
            snippet["position"] = json!(0);
        }
        let body = json!({ "snippet": snippet });

        let _: InsertedResource = self
            .send_json(|| {
                self.http
                    .post(format!("{API_BASE}/playlistItems"))
                    .timeout(Duration::from_secs(30))
                    .query(&[("part", "snippet")])
                    .json(&body)
            })
            .await?;
        debug!("Added {} to playlist {}", video_id, playlist_id);
        Ok(())
    }

    #[instrument(skip(self, spec))]
    async fn get_or_create_playlist(&self, code: &str, spec: &PlaylistSpec) -> Result<String> {
        if let Some(id) = spec.id.as_deref().filter(|id| !id.is_empty()) {
            return Ok(id.to_string());
        }

        let loaded = self.playlists.read().await.is_loaded();
        if loaded {
            if let Some(id) = self.cached_playlist(code).await {
                return Ok(id);
            }
        }

        // Miss (or first use): refresh once before creating anything
        self.reload_playlist_cache().await?;
        if let Some(id) = self.cached_playlist(code).await {
            return Ok(id);
        }

        let title = if spec.title.is_empty() { code } else { spec.title.as_str() };
        let body = json!({
            "snippet": {
                "title": self.titles.fit(title).title,
                "description": with_marker(&spec.description, code),
            },
            "status": {"privacyStatus": spec.privacy_status},
        });
        let created: InsertedResource = self
            .send_json(|| {
                self.http
                    .post(format!("{API_BASE}/playlists"))
                    .timeout(Duration::from_secs(30))
                    .query(&[("part", "snippet,status")])
                    .json(&body)
            })
            .await?;

        info!("Created playlist {} for code {}", created.id, code);
        self.playlists
            .write()
            .await
            .insert_created(code, &created.id);
        Ok(created.id)
    }

    async fn refresh_playlists(&self) -> Result<()> {
        self.reload_playlist_cache().await
    }

    #[instrument(skip(self))]
    async fn list_playlist_items(&self, playlist_id: &str) -> Result<Vec<PlaylistItem>> {
        let items: Vec<PlaylistItemResource> = self
            .list_all(
                "playlistItems",
                &[("part", "snippet"), ("playlistId", playlist_id)],
            )
            .await?;
        Ok(items.into_iter().map(PlaylistItem::from).collect())
    }

    #[instrument(skip(self, description))]
    async fn update_video(&self, video_id: &str, title: &str, description: &str) -> Result<()> {
        // videos.update replaces the whole snippet, so categoryId and tags must be sent back
        let current: ListResponse<VideoResource> = self
            .send_json(|| {
                self.http
                    .get(format!("{API_BASE}/videos"))
                    .timeout(Duration::from_secs(30))
                    .query(&[("part", "snippet"), ("id", video_id)])
            })
            .await?;
        let video = current
            .items
            .into_iter()
            .find(|v| v.id == video_id)
            .ok_or_else(|| UploadError::ApiError {
                status_code: 404,
                message: format!("video {video_id} not found"),
            })?;

        let mut snippet = json!({
            "title": self.titles.fit(title).title,
            "description": description,
            "categoryId": video.snippet.category_id.unwrap_or_else(|| "22".to_string()),
        });
        if let Some(tags) = video.snippet.tags {
            snippet["tags"] = json!(tags);
        }
        let body = json!({ "id": video_id, "snippet": snippet });

        let _: Value = self
            .send_json(|| {
                self.http
                    .put(format!("{API_BASE}/videos"))
                    .timeout(Duration::from_secs(30))
                    .query(&[("part", "snippet")])
                    .json(&body)
            })
            .await?;
        Ok(())
    }

    #[instrument(skip(self, description))]
    async fn update_playlist_metadata(
        &self,
        playlist_id: &str,
        title: &str,
        description: &str,
        privacy_status: &str,
    ) -> Result<()> {
        let body = json!({
            "id": playlist_id,
            "snippet": {
                "title": self.titles.fit(title).title,
                "description": description,
            },
            "status": {"privacyStatus": privacy_status},
        });

        let _: Value = self
            .send_json(|| {
                self.http
                    .put(format!("{API_BASE}/playlists"))
                    .timeout(Duration::from_secs(30))
                    .query(&[("part", "snippet,status")])
                    .json(&body)
            })
            .await?;
        Ok(())
    }
}

/// Turn a non-success response into an [`UploadError`]
async fn check_status(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let message = response.text().await.unwrap_or_default();
    if status == StatusCode::UNAUTHORIZED {
        return Err(UploadError::AuthenticationFailed(message));
    }
    Err(UploadError::ApiError {
        status_code: status.as_u16(),
        message,
    })
}

/// Request body for `videos.insert`
pub fn video_insert_body(title: &str, config: &EffectiveConfig, titles: &TitlePolicy) -> Value {
    json!({
        "snippet": {
            "title": titles.fit(title).title,
            "description": titles.describe(title, &config.default_description),
            "tags": config.default_tags,
            "categoryId": config.category_id,
        },
        "status": {
            "privacyStatus": config.privacy_status,
            "selfDeclaredMadeForKids": false,
        },
    })
}

/// Next byte to send given a `Range: bytes=0-N` header from a 308 response
pub fn next_offset_from_range(range: &str) -> Option<u64> {
    let (_, end) = range.strip_prefix("bytes=")?.split_once('-')?;
    end.trim().parse::<u64>().ok().map(|last| last + 1)
}

fn normalize_chunk_size(requested: usize) -> usize {
    let rounded = requested - requested % CHUNK_GRANULARITY;
    if rounded == 0 {
        DEFAULT_UPLOAD_CHUNK_BYTES
    } else {
        rounded
    }
}
