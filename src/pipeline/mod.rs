//! Scan loop and per-file orchestration.
//!
//! One pass lists the pending files and runs each one start to finish, in name
//! order. Every per-file failure is turned into a [`FileOutcome`]; nothing a
//! single file does can abort the pass.
//!
//! | Failure                                   | Outcome              | File left as |
//! |-------------------------------------------|----------------------|--------------|
//! | config cannot be resolved                 | `FatalFailure`       | Pending      |
//! | rename to Uploading fails                 | `FatalFailure`       | Pending      |
//! | upload fails                              | `RestorableFailure`  | Pending      |
//! | upload fails and restore fails            | `FatalFailure`       | Uploading    |
//! | upload succeeds, rename to Done fails     | `FatalFailure`       | Uploading    |
//! | playlist, log or reconcile failure        | `Success` (logged)   | Done         |
//!
//! A file left in Uploading is never picked up again, which is what keeps an
//! already-uploaded video from being uploaded twice.

use crate::error::{ConfigError, FileStateError, PlaylistSideEffectError, ReconcileError};
use crate::metrics::Metrics;
use crate::models::{AppConfig, DoneFile, EffectiveConfig, FileKind, PendingFile, PlaylistSpec};
use crate::services::playlist_cache::with_marker;
use crate::services::resolver::{LOG_TEMPLATE_VARS, TITLE_TEMPLATE_VARS};
use crate::services::{
    ConfigResolver, FileStateMachine, ManifestParser, PlaylistReconciler, ReconcileReport,
    ScanFilter, TitlePolicy, UploadClient, ensure_directory, template,
};
use camino::Utf8Path;
use std::fs::OpenOptions;
use std::io::{self, Write};
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime};
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

/// Timestamp used as the "video id" of a Done manifest
const MANIFEST_ID_FORMAT: &str = "%Y%m%d_%H%M%S";

/// How a single file's run ended
#[derive(Debug)]
pub enum FileOutcome {
    /// The file reached Done. `id` is the video id, or a timestamp for manifests.
    Success { done: DoneFile, id: String },

    /// Nothing was published and the file is Pending again; the next scan retries it
    RestorableFailure { reason: String },

    /// The file needs an operator; it was left where it is
    FatalFailure { reason: String },
}

impl FileOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, FileOutcome::Success { .. })
    }
}

pub struct Pipeline {
    resolver: ConfigResolver,
    files: FileStateMachine,
    client: Arc<dyn UploadClient>,
    reconciler: PlaylistReconciler,
    metrics: Arc<Metrics>,
    direct_link_base: String,
    scan_interval: Duration,
}

impl Pipeline {
    pub fn new(
        config: AppConfig,
        client: Arc<dyn UploadClient>,
        metrics: Arc<Metrics>,
    ) -> Result<Self, ConfigError> {
        let parser = ManifestParser::new(&config.manifest)
            .map_err(|e| ConfigError::Invalid(format!("manifest link pattern: {e}")))?;
        let titles = TitlePolicy::new(config.policy.title_max_chars);

        Ok(Self {
            files: FileStateMachine::new(config.upload_folder.clone(), ScanFilter::from_config(&config)),
            reconciler: PlaylistReconciler::new(client.clone(), parser, titles),
            direct_link_base: config.manifest.direct_link_base.clone(),
            scan_interval: Duration::from_secs(config.scan_interval),
            resolver: ConfigResolver::new(config),
            client,
            metrics,
        })
    }

    pub fn files(&self) -> &FileStateMachine {
        &self.files
    }

    /// Scan until `cancel` becomes `true` (or its sender is dropped).
    ///
    /// A failing pass is logged and the loop carries on after the usual sleep.
    pub async fn run(&self, mut cancel: watch::Receiver<bool>) {
        info!(
            "Watching {} every {}s",
            self.files.upload_folder(),
            self.scan_interval.as_secs()
        );

        loop {
            if *cancel.borrow() {
                break;
            }

            match self.scan(SystemTime::now(), Some(&cancel)).await {
                Ok(outcomes) if !outcomes.is_empty() => {
                    let succeeded = outcomes.iter().filter(|o| o.is_success()).count();
                    info!("Pass finished: {}/{} files succeeded", succeeded, outcomes.len());
                }
                Ok(_) => debug!("Pass finished: nothing pending"),
                Err(e) => error!("Pass aborted: {}", e),
            }
            self.metrics.record_pass();

            tokio::select! {
                _ = tokio::time::sleep(self.scan_interval) => {}
                changed = cancel.changed() => {
                    if changed.is_err() || *cancel.borrow() {
                        break;
                    }
                }
            }
        }

        info!("Scan loop stopped");
    }

    /// One full pass over the upload folder
    pub async fn run_pass(&self, now: SystemTime) -> Result<Vec<FileOutcome>, FileStateError> {
        self.scan(now, None).await
    }

    async fn scan(
        &self,
        now: SystemTime,
        cancel: Option<&watch::Receiver<bool>>,
    ) -> Result<Vec<FileOutcome>, FileStateError> {
        let pending = self.files.list_pending(now)?;
        if !pending.is_empty() {
            info!("Found {} pending file(s)", pending.len());
        }

        let mut outcomes = Vec::with_capacity(pending.len());
        for file in pending {
            if cancel.is_some_and(|rx| *rx.borrow()) {
                info!("Cancelled, leaving remaining files for the next run");
                break;
            }
            outcomes.push(self.process_file(&file).await);
        }
        Ok(outcomes)
    }

    /// Drive one pending file through its whole lifecycle
    pub async fn process_file(&self, pending: &PendingFile) -> FileOutcome {
        info!("Processing {}", pending.original_name);

        let outcome = match self.resolver.resolve(&pending.original_name) {
            Ok(config) => match pending.kind {
                FileKind::Video => self.process_video(pending, &config).await,
                FileKind::Manifest => self.process_manifest(pending, &config).await,
            },
            Err(e) => FileOutcome::FatalFailure {
                reason: e.to_string(),
            },
        };

        match &outcome {
            FileOutcome::Success { done, .. } => info!("Done: {}", done.path()),
            FileOutcome::RestorableFailure { reason } => {
                self.metrics.record_failure();
                self.metrics.record_restore();
                warn!("{} will be retried: {}", pending.original_name, reason);
            }
            FileOutcome::FatalFailure { reason } => {
                self.metrics.record_failure();
                error!("{} needs attention: {}", pending.original_name, reason);
            }
        }
        outcome
    }

    async fn process_video(&self, pending: &PendingFile, config: &EffectiveConfig) -> FileOutcome {
        let uploading = match self.files.to_uploading(pending, config) {
            Ok(uploading) => uploading,
            Err(e) => return FileOutcome::FatalFailure { reason: e.to_string() },
        };

        let title = upload_title(config, uploading.name_without_ext());
        let started = Instant::now();
        let video_id = match self.client.upload(&uploading.path, &title, config).await {
            Ok(id) => id,
            Err(upload_error) => {
                return match self.files.restore(&uploading, config) {
                    Ok(_) => FileOutcome::RestorableFailure {
                        reason: upload_error.to_string(),
                    },
                    Err(restore_error) => FileOutcome::FatalFailure {
                        reason: format!(
                            "{upload_error}; restoring {} also failed: {restore_error}",
                            uploading.path
                        ),
                    },
                };
            }
        };
        self.metrics.record_upload(started.elapsed());
        info!("Uploaded {} as {}", uploading.original_name, video_id);

        // Past this point the video is published: never restore
        let done = match self.files.to_done(&uploading, &video_id, config) {
            Ok(done) => done,
            Err(e) => {
                return FileOutcome::FatalFailure {
                    reason: format!("video {video_id} uploaded but {e}"),
                };
            }
        };

        if let Some(log_file) = &config.log_file_path {
            if let Err(e) = self.write_upload_log(log_file, uploading.name_without_ext(), &video_id, config) {
                warn!("Failed to write upload log {}: {}", log_file, e);
            }
        }

        if let Some(spec) = config.active_playlist() {
            if let Err(e) = self.attach_to_playlist(&spec, &video_id).await {
                warn!("{}", e);
            }
        }

        FileOutcome::Success { done, id: video_id }
    }

    async fn process_manifest(&self, pending: &PendingFile, config: &EffectiveConfig) -> FileOutcome {
        let uploading = match self.files.to_uploading(pending, config) {
            Ok(uploading) => uploading,
            Err(e) => return FileOutcome::FatalFailure { reason: e.to_string() },
        };

        let stamp = chrono::Local::now().format(MANIFEST_ID_FORMAT).to_string();
        let done = match self.files.to_done(&uploading, &stamp, config) {
            Ok(done) => done,
            // Nothing was published yet, so the manifest can simply be retried
            Err(e) => {
                return match self.files.restore(&uploading, config) {
                    Ok(_) => FileOutcome::RestorableFailure { reason: e.to_string() },
                    Err(restore_error) => FileOutcome::FatalFailure {
                        reason: format!("{e}; restoring also failed: {restore_error}"),
                    },
                };
            }
        };
        self.metrics.record_manifest();

        match config.active_playlist() {
            Some(spec) => {
                // Errors are logged where they happen
                if let Ok(report) = self.reconcile_manifest(&done, &spec, config).await {
                    self.metrics.record_title_changes(report.changes.len());
                }
            }
            None => debug!("No playlist configured for {}, skipping reconciliation", done.path()),
        }

        FileOutcome::Success { done, id: stamp }
    }

    async fn attach_to_playlist(
        &self,
        spec: &PlaylistSpec,
        video_id: &str,
    ) -> Result<String, PlaylistSideEffectError> {
        let side_effect = |source| PlaylistSideEffectError {
            code: spec.code.clone(),
            source,
        };

        let playlist_id = self
            .client
            .get_or_create_playlist(&spec.code, spec)
            .await
            .map_err(side_effect)?;
        self.client
            .add_to_playlist(&playlist_id, video_id, spec.add_first)
            .await
            .map_err(side_effect)?;

        info!(
            "Added {} to playlist {} ({})",
            video_id,
            playlist_id,
            if spec.add_first { "first" } else { "last" }
        );
        Ok(playlist_id)
    }

    async fn reconcile_manifest(
        &self,
        done: &DoneFile,
        spec: &PlaylistSpec,
        config: &EffectiveConfig,
    ) -> Result<ReconcileReport, ReconcileError> {
        // The code → id mapping is refreshed once per reconciliation run
        if let Err(e) = self.client.refresh_playlists().await {
            warn!("Could not refresh playlist cache: {}", e);
        }

        let playlist_id = self
            .client
            .get_or_create_playlist(&spec.code, spec)
            .await
            .map_err(|source| ReconcileError::ResolvePlaylist {
                code: spec.code.clone(),
                source,
            })
            .inspect_err(|e| error!("Playlist reconciliation failed for {}: {}", done.path(), e))?;

        if let Err(e) = self.sync_playlist_metadata(&playlist_id, spec).await {
            warn!("{}", e);
        }

        self.reconciler
            .run(done.path(), &playlist_id, config.log_file_path.as_deref())
            .await
    }

    async fn sync_playlist_metadata(
        &self,
        playlist_id: &str,
        spec: &PlaylistSpec,
    ) -> Result<(), PlaylistSideEffectError> {
        let title = if spec.title.is_empty() { &spec.code } else { &spec.title };
        if title.is_empty() {
            return Ok(());
        }
        let description = if spec.code.is_empty() {
            spec.description.clone()
        } else {
            with_marker(&spec.description, &spec.code)
        };

        self.client
            .update_playlist_metadata(playlist_id, title, &description, &spec.privacy_status)
            .await
            .map_err(|source| PlaylistSideEffectError {
                code: spec.code.clone(),
                source,
            })
    }

    fn write_upload_log(
        &self,
        log_file: &Utf8Path,
        name_without_ext: &str,
        video_id: &str,
        config: &EffectiveConfig,
    ) -> io::Result<()> {
        let url = format!("{}{}", self.direct_link_base, video_id);
        let line = template::render(
            &config.log_template,
            &[
                (LOG_TEMPLATE_VARS[0], name_without_ext),
                (LOG_TEMPLATE_VARS[1], &url),
                (LOG_TEMPLATE_VARS[2], video_id),
                (LOG_TEMPLATE_VARS[3], &config.code),
            ],
        )
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e.to_string()))?;

        if let Some(parent) = log_file.parent().filter(|p| !p.as_str().is_empty()) {
            ensure_directory(parent).map_err(io::Error::other)?;
        }

        let mut file = OpenOptions::new().create(true).append(true).open(log_file)?;
        writeln!(file, "{line}")?;
        debug!("Upload log written: {}", log_file);
        Ok(())
    }
}

/// Title sent with the upload: the rendered `default_title`, or the file stem
pub fn upload_title(config: &EffectiveConfig, name_without_ext: &str) -> String {
    let Some(title_template) = config.default_title.as_deref().filter(|t| !t.is_empty()) else {
        return name_without_ext.to_string();
    };
    template::render(
        title_template,
        &[
            (TITLE_TEMPLATE_VARS[0], name_without_ext),
            (TITLE_TEMPLATE_VARS[1], &config.code),
        ],
    )
    .unwrap_or_else(|e| {
        warn!("default_title could not be rendered ({}), using file name", e);
        name_without_ext.to_string()
    })
}
