//! Services module - the upload pipeline's business logic.
//!
//! Nothing in here knows about the scan loop or process lifecycle; the
//! [`Pipeline`](crate::pipeline::Pipeline) wires these pieces together.
//!
//! # Components
//!
//! - [`ConfigResolver`]: base config + first matching group → [`EffectiveConfig`](crate::models::EffectiveConfig)
//! - [`FileStateMachine`]: Pending → Uploading → Done / Restored, encoded in file names
//! - [`UploadClient`]: boundary to the video platform, implemented by [`YouTubeClient`]
//! - [`PlaylistReconciler`]: keeps manifest links and video titles in sync with a playlist
//! - [`ManifestParser`] and [`PlaylistCache`]: helpers for the reconciler and the client
//!
//! # Usage Example
//!
//! ```ignore
//! use autotube::services::{ConfigResolver, FileStateMachine, ScanFilter};
//!
//! let resolver = ConfigResolver::new(app_config.clone());
//! let machine = FileStateMachine::new(
//!     app_config.upload_folder.clone(),
//!     ScanFilter::from_config(&app_config),
//! );
//!
//! for pending in machine.list_pending(SystemTime::now())? {
//!     let config = resolver.resolve(&pending.original_name)?;
//!     let uploading = machine.to_uploading(&pending, &config)?;
//!     // ...
//! }
//! ```

pub mod file_state;
pub mod manifest;
pub mod playlist_cache;
pub mod reconciler;
pub mod resolver;
pub mod template;
pub mod upload_client;
pub mod youtube;

pub use file_state::{FileStateMachine, ScanFilter, ensure_directory};
pub use manifest::ManifestParser;
pub use playlist_cache::PlaylistCache;
pub use reconciler::{PlaylistReconciler, ReconcileOutcome, ReconcileReport};
pub use resolver::ConfigResolver;
pub use upload_client::{FittedTitle, TitlePolicy, UploadClient};
pub use youtube::YouTubeClient;
