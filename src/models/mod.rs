//! Data models for the upload pipeline.
//!
//! - [`AppConfig`]: everything loaded from `config.yaml` and the user overlay
//! - [`EffectiveConfig`]: the per-file view produced by the resolver
//! - [`PendingFile`] and friends: a file at each lifecycle stage
//! - [`PlaylistSnapshot`], [`ManifestReference`], [`TitleChange`]: reconciliation data

pub mod config;
pub mod file;
pub mod playlist;

pub use config::{
    AppConfig, DEFAULT_DEBOUNCE_SECS, DEFAULT_DIRECT_LINK_BASE, DEFAULT_LOG_TEMPLATE,
    DEFAULT_POSITION_HOST,
    DEFAULT_OUTPUT_FILENAME_TEMPLATE, DEFAULT_TITLE_MAX_CHARS, DEFAULT_UPLOAD_CHUNK_BYTES,
    EffectiveConfig, GroupConfig, LoggingConfig, ManifestConfig, PlaylistSpec, PolicyConfig,
    StatusPrefix,
};
pub use file::{DoneFile, FileKind, PendingFile, RestoredFile, UploadingFile};
pub use playlist::{
    ManifestReference, PlaylistItem, PlaylistSnapshot, ReferenceKind, TitleChange,
};
