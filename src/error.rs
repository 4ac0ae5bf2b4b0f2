//! Error taxonomy for the upload pipeline.
//!
//! Each enum belongs to one boundary:
//! - [`ConfigError`]: malformed configuration, fatal for the affected file only
//! - [`UploadError`]: anything the video platform boundary reports
//! - [`FileStateError`]: rename/mkdir failures in the watched folder
//! - [`ReconcileError`]: any failure inside a playlist reconciliation run
//! - [`PlaylistSideEffectError`]: playlist attach/update after a successful upload
//!
//! How each one is handled is decided by [`crate::pipeline::FileOutcome`].

use camino::Utf8PathBuf;
use thiserror::Error;

/// Configuration could not be applied to a file
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Template for {field} references unknown placeholder {{{placeholder}}}")]
    UnknownPlaceholder { field: String, placeholder: String },

    #[error("Template for {field} is malformed: {reason}")]
    MalformedTemplate { field: String, reason: String },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Errors reported by an [`UploadClient`](crate::services::UploadClient)
#[derive(Error, Debug)]
pub enum UploadError {
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("YouTube API error (status {status_code}): {message}")]
    ApiError { status_code: u16, message: String },

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Failed to parse API response: {0}")]
    ParseError(String),

    #[error("Upload session ended without a video id")]
    MissingVideoId,

    #[error("File error during upload: {0}")]
    Io(#[from] std::io::Error),
}

impl From<reqwest::Error> for UploadError {
    fn from(error: reqwest::Error) -> Self {
        match error.status() {
            Some(status) => UploadError::ApiError {
                status_code: status.as_u16(),
                message: error.to_string(),
            },
            None => UploadError::NetworkError(error.to_string()),
        }
    }
}

/// Filesystem state transition failures
#[derive(Error, Debug)]
pub enum FileStateError {
    #[error("Source file no longer exists: {0}")]
    SourceMissing(Utf8PathBuf),

    #[error("Destination already exists: {0}")]
    DestinationExists(Utf8PathBuf),

    #[error("File name is not valid UTF-8 or has no name: {0}")]
    InvalidName(String),

    #[error("Failed to {op} {path}: {source}")]
    Io {
        op: &'static str,
        path: Utf8PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl FileStateError {
    pub(crate) fn io(op: &'static str, path: impl Into<Utf8PathBuf>, source: std::io::Error) -> Self {
        FileStateError::Io {
            op,
            path: path.into(),
            source,
        }
    }
}

/// A playlist reconciliation run failed as a whole
#[derive(Error, Debug)]
pub enum ReconcileError {
    #[error("Failed to list playlist {playlist_id}: {source}")]
    ListItems {
        playlist_id: String,
        #[source]
        source: UploadError,
    },

    #[error("Failed to update title of video {video_id}: {source}")]
    UpdateVideo {
        video_id: String,
        #[source]
        source: UploadError,
    },

    #[error("Failed to read manifest {path}: {source}")]
    ReadManifest {
        path: Utf8PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write {path}: {source}")]
    Write {
        path: Utf8PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Could not resolve playlist {code}: {source}")]
    ResolvePlaylist {
        code: String,
        #[source]
        source: UploadError,
    },
}

/// Attaching to or updating a playlist failed after the video itself succeeded
#[derive(Error, Debug)]
#[error("Playlist {code} side effect failed: {source}")]
pub struct PlaylistSideEffectError {
    pub code: String,
    #[source]
    pub source: UploadError,
}
