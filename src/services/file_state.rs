//! Filename-encoded file lifecycle.
//!
//! A file's state is carried entirely by its name prefix:
//!
//! | State     | Name                                   | Directory                      |
//! |-----------|----------------------------------------|--------------------------------|
//! | Pending   | `{prefix}{original_name}`              | upload folder                  |
//! | Uploading | `{uploading}{original_name}`           | upload folder                  |
//! | Done      | `{done}{template(stem, id)}{ext}`      | after-upload dir or upload dir |
//! | Restored  | `{prefix}{original_name}` (= Pending)  | upload folder                  |
//!
//! Renames are the only coordination mechanism, so a single process per
//! folder is assumed.

use crate::error::FileStateError;
use crate::models::{
    AppConfig, DoneFile, EffectiveConfig, FileKind, PendingFile, RestoredFile, UploadingFile,
};
use crate::services::resolver::OUTPUT_FILENAME_VARS;
use crate::services::template;
use camino::{Utf8Path, Utf8PathBuf};
use std::fs;
use std::io::ErrorKind;
use std::time::{Duration, SystemTime};

/// Which files a scan should pick up
#[derive(Debug, Clone)]
pub struct ScanFilter {
    pub prefix: String,
    pub video_extensions: Vec<String>,
    pub manifest_extensions: Vec<String>,
    /// Files modified within this window before "now" are skipped
    pub debounce: Duration,
}

impl ScanFilter {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            prefix: config.prefix.clone(),
            video_extensions: config.video_extensions.clone(),
            manifest_extensions: config.manifest_extensions.clone(),
            debounce: Duration::from_secs(config.policy.debounce_secs),
        }
    }

    /// Classify `name`, or `None` if it is not pending work.
    pub fn classify(&self, name: &str) -> Option<FileKind> {
        if !name.starts_with(&self.prefix) {
            return None;
        }
        let has_ext = |exts: &[String]| {
            exts.iter().any(|ext| {
                name.len() > ext.len()
                    && name.is_char_boundary(name.len() - ext.len())
                    && name[name.len() - ext.len()..].eq_ignore_ascii_case(ext)
            })
        };
        if has_ext(&self.video_extensions) {
            Some(FileKind::Video)
        } else if has_ext(&self.manifest_extensions) {
            Some(FileKind::Manifest)
        } else {
            None
        }
    }
}

/// Performs lifecycle renames inside one upload folder
#[derive(Debug, Clone)]
pub struct FileStateMachine {
    upload_folder: Utf8PathBuf,
    filter: ScanFilter,
}

impl FileStateMachine {
    pub fn new(upload_folder: impl Into<Utf8PathBuf>, filter: ScanFilter) -> Self {
        Self {
            upload_folder: upload_folder.into(),
            filter,
        }
    }

    pub fn upload_folder(&self) -> &Utf8Path {
        &self.upload_folder
    }

    pub fn filter(&self) -> &ScanFilter {
        &self.filter
    }

    /// Pending files, sorted by name, skipping anything modified in the
    /// last `debounce` before `now`.
    pub fn list_pending(&self, now: SystemTime) -> Result<Vec<PendingFile>, FileStateError> {
        let entries = fs::read_dir(&self.upload_folder)
            .map_err(|e| FileStateError::io("list", &self.upload_folder, e))?;

        let mut pending = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| FileStateError::io("list", &self.upload_folder, e))?;
            let Ok(name) = entry.file_name().into_string() else {
                tracing::debug!("Skipping non UTF-8 file name in {}", self.upload_folder);
                continue;
            };
            let Some(kind) = self.filter.classify(&name) else {
                continue;
            };

            // The entry can vanish between listing and stat; just skip it
            let metadata = match entry.metadata() {
                Ok(metadata) => metadata,
                Err(e) => {
                    tracing::debug!("Could not stat {}: {}", name, e);
                    continue;
                }
            };
            if !metadata.is_file() {
                continue;
            }
            if let Ok(modified) = metadata.modified() {
                if is_recent(modified, now, self.filter.debounce) {
                    tracing::debug!("Skipping {} (still being written)", name);
                    continue;
                }
            }

            pending.push(PendingFile {
                path: self.upload_folder.join(&name),
                original_name: name[self.filter.prefix.len()..].to_string(),
                kind,
            });
        }

        pending.sort_by(|a, b| a.path.file_name().cmp(&b.path.file_name()));
        Ok(pending)
    }

    /// Pending → Uploading. Never overwrites an existing destination.
    pub fn to_uploading(
        &self,
        pending: &PendingFile,
        config: &EffectiveConfig,
    ) -> Result<UploadingFile, FileStateError> {
        let target = self
            .upload_folder
            .join(format!("{}{}", config.status_prefix.uploading, pending.original_name));

        rename_exclusive(&pending.path, &target)?;
        tracing::debug!("{} -> {}", pending.path, target);

        Ok(UploadingFile {
            path: target,
            original_name: pending.original_name.clone(),
            kind: pending.kind,
        })
    }

    /// Name a Done file would get for `video_id`
    pub fn done_name(
        &self,
        uploading: &UploadingFile,
        video_id: &str,
        config: &EffectiveConfig,
    ) -> Result<String, FileStateError> {
        let base = template::render(
            &config.output_filename_template,
            &[
                (OUTPUT_FILENAME_VARS[0], uploading.name_without_ext()),
                (OUTPUT_FILENAME_VARS[1], video_id),
                (OUTPUT_FILENAME_VARS[2], &config.code),
            ],
        )
        .map_err(|e| FileStateError::InvalidName(format!("output_filename_template: {e}")))?;

        Ok(format!(
            "{}{}{}",
            config.status_prefix.done,
            base,
            uploading.extension()
        ))
    }

    /// Uploading → Done, into the configured after-upload directory.
    ///
    /// Video files refuse to overwrite; manifests use [`safe_rename`](Self::safe_rename)
    /// since their timestamped names may still collide.
    pub fn to_done(
        &self,
        uploading: &UploadingFile,
        video_id: &str,
        config: &EffectiveConfig,
    ) -> Result<DoneFile, FileStateError> {
        let target_dir = config.done_dir();
        ensure_directory(target_dir)?;
        let target = target_dir.join(self.done_name(uploading, video_id, config)?);

        match uploading.kind {
            FileKind::Video => rename_exclusive(&uploading.path, &target)?,
            FileKind::Manifest => self.safe_rename(&uploading.path, &target)?,
        }
        tracing::info!("File moved: {}", target);

        Ok(DoneFile { path: target })
    }

    /// Uploading → Pending name, so the next scan retries the file.
    pub fn restore(
        &self,
        uploading: &UploadingFile,
        config: &EffectiveConfig,
    ) -> Result<RestoredFile, FileStateError> {
        let target = self
            .upload_folder
            .join(format!("{}{}", config.prefix, uploading.original_name));

        rename_exclusive(&uploading.path, &target)?;
        tracing::info!("File state restored: {}", target);

        Ok(RestoredFile { path: target })
    }

    /// Rename, replacing whatever already sits at `dst`.
    pub fn safe_rename(&self, src: &Utf8Path, dst: &Utf8Path) -> Result<(), FileStateError> {
        if !src.exists() {
            return Err(FileStateError::SourceMissing(src.to_path_buf()));
        }
        match fs::remove_file(dst) {
            Ok(()) => tracing::warn!("Replaced existing file {}", dst),
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(FileStateError::io("remove", dst, e)),
        }
        fs::rename(src, dst).map_err(|e| FileStateError::io("rename", src, e))
    }
}

/// Create `path` and its parents if missing
pub fn ensure_directory(path: &Utf8Path) -> Result<(), FileStateError> {
    fs::create_dir_all(path).map_err(|e| FileStateError::io("create directory", path, e))
}

fn rename_exclusive(src: &Utf8Path, dst: &Utf8Path) -> Result<(), FileStateError> {
    if !src.exists() {
        return Err(FileStateError::SourceMissing(src.to_path_buf()));
    }
    if dst.exists() {
        return Err(FileStateError::DestinationExists(dst.to_path_buf()));
    }
    fs::rename(src, dst).map_err(|e| match e.kind() {
        ErrorKind::NotFound => FileStateError::SourceMissing(src.to_path_buf()),
        _ => FileStateError::io("rename", src, e),
    })
}

fn is_recent(modified: SystemTime, now: SystemTime, window: Duration) -> bool {
    match now.duration_since(modified) {
        Ok(age) => age < window,
        // Modified "in the future" (clock skew): treat as still being written
        Err(_) => true,
    }
}
