//! Manifest-driven playlist reconciliation.
//!
//! A manifest is an operator-authored markdown list of links into a playlist.
//! Reconciling it:
//! 1. takes one snapshot of the playlist,
//! 2. resolves every link (direct or positional) against that snapshot,
//! 3. pushes the manifest's titles to videos whose platform title differs,
//! 4. writes a change log block and a `_v2` manifest where positional links
//!    are replaced by direct ones.
//!
//! Nothing is written when no title changed, so running twice against an
//! unchanged playlist is a no-op the second time.

use crate::error::ReconcileError;
use crate::models::{PlaylistSnapshot, ReferenceKind, TitleChange};
use crate::services::manifest::ManifestParser;
use crate::services::upload_client::{TitlePolicy, UploadClient};
use camino::{Utf8Path, Utf8PathBuf};
use std::collections::HashMap;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::ops::Range;
use std::sync::Arc;

/// Result of reconciling manifest text against a playlist
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileOutcome {
    pub changes: Vec<TitleChange>,
    /// Manifest with every resolved link in direct form; only set when
    /// something changed
    pub rewritten: Option<String>,
}

/// What a file-level run produced on disk
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    pub changes: Vec<TitleChange>,
    pub v2_path: Option<Utf8PathBuf>,
}

pub struct PlaylistReconciler {
    client: Arc<dyn UploadClient>,
    parser: ManifestParser,
    titles: TitlePolicy,
}

impl PlaylistReconciler {
    pub fn new(client: Arc<dyn UploadClient>, parser: ManifestParser, titles: TitlePolicy) -> Self {
        Self {
            client,
            parser,
            titles,
        }
    }

    /// Reconcile `manifest_text` against `playlist_id`.
    ///
    /// Stops at the first failing platform call; titles already updated stay
    /// updated.
    pub async fn reconcile(
        &self,
        manifest_text: &str,
        playlist_id: &str,
    ) -> Result<ReconcileOutcome, ReconcileError> {
        let items = self
            .client
            .list_playlist_items(playlist_id)
            .await
            .map_err(|source| ReconcileError::ListItems {
                playlist_id: playlist_id.to_string(),
                source,
            })?;
        let snapshot = PlaylistSnapshot::new(items);
        tracing::info!(
            "Reconciling manifest against playlist {} ({} items)",
            playlist_id,
            snapshot.len()
        );

        // Titles applied during this run, so a video listed twice is not re-updated
        let mut applied: HashMap<String, String> = HashMap::new();
        let mut changes = Vec::new();
        let mut rewrites: Vec<(Range<usize>, String)> = Vec::new();

        for reference in self.parser.parse(manifest_text) {
            let video_id = match &reference.kind {
                ReferenceKind::Direct(id) => id.clone(),
                ReferenceKind::Positional(index) => match snapshot.resolve(*index) {
                    Some(item) => item.video_id.clone(),
                    None => {
                        tracing::debug!(
                            "Position {} is outside the playlist ({} items), skipping",
                            index,
                            snapshot.len()
                        );
                        continue;
                    }
                },
            };

            rewrites.push((
                reference.span.clone(),
                self.parser.canonical_link(&reference.title, &video_id),
            ));

            let Some(item) = snapshot.find(&video_id) else {
                tracing::debug!("Video {} is not in the playlist, not comparing", video_id);
                continue;
            };

            let current = applied.get(&video_id).unwrap_or(&item.title);
            let wanted = self.titles.fit(&reference.title).title;
            if *current == wanted {
                continue;
            }

            let description = if item.description.is_empty() {
                reference.title.clone()
            } else {
                format!("{}\n\n{}", reference.title, item.description)
            };
            self.client
                .update_video(&video_id, &reference.title, &description)
                .await
                .map_err(|source| ReconcileError::UpdateVideo {
                    video_id: video_id.clone(),
                    source,
                })?;

            tracing::info!("Title updated ({}): {} -> {}", video_id, current, reference.title);
            changes.push(TitleChange {
                video_id: video_id.clone(),
                old_title: current.clone(),
                new_title: reference.title.clone(),
            });
            applied.insert(video_id, wanted);
        }

        let rewritten = (!changes.is_empty()).then(|| apply_rewrites(manifest_text, &rewrites));
        Ok(ReconcileOutcome { changes, rewritten })
    }

    /// Reconcile the manifest at `manifest_path`, then write the change log
    /// block to `log_file` and the `_v2` sibling if any title changed.
    pub async fn run(
        &self,
        manifest_path: &Utf8Path,
        playlist_id: &str,
        log_file: Option<&Utf8Path>,
    ) -> Result<ReconcileReport, ReconcileError> {
        let result = self.run_inner(manifest_path, playlist_id, log_file).await;
        if let Err(e) = &result {
            tracing::error!("Playlist reconciliation failed for {}: {}", manifest_path, e);
        }
        result
    }

    async fn run_inner(
        &self,
        manifest_path: &Utf8Path,
        playlist_id: &str,
        log_file: Option<&Utf8Path>,
    ) -> Result<ReconcileReport, ReconcileError> {
        let text =
            fs::read_to_string(manifest_path).map_err(|source| ReconcileError::ReadManifest {
                path: manifest_path.to_path_buf(),
                source,
            })?;

        let outcome = self.reconcile(&text, playlist_id).await?;
        let Some(rewritten) = outcome.rewritten else {
            tracing::info!("No title changes for {}", manifest_path);
            return Ok(ReconcileReport::default());
        };

        if let Some(log_file) = log_file {
            append_change_log(log_file, manifest_path, &outcome.changes)?;
        }

        let v2_path = v2_path(manifest_path);
        fs::write(&v2_path, rewritten).map_err(|source| ReconcileError::Write {
            path: v2_path.clone(),
            source,
        })?;
        tracing::info!(
            "{} title change(s), rewritten manifest saved to {}",
            outcome.changes.len(),
            v2_path
        );

        Ok(ReconcileReport {
            changes: outcome.changes,
            v2_path: Some(v2_path),
        })
    }
}

/// `dir/name_v2.ext` next to `path`
pub fn v2_path(path: &Utf8Path) -> Utf8PathBuf {
    let stem = path.file_stem().unwrap_or_default();
    let name = match path.extension() {
        Some(ext) => format!("{stem}_v2.{ext}"),
        None => format!("{stem}_v2"),
    };
    path.with_file_name(name)
}

/// Append a timestamped change block
pub fn append_change_log(
    log_file: &Utf8Path,
    manifest_path: &Utf8Path,
    changes: &[TitleChange],
) -> Result<(), ReconcileError> {
    let write_err = |source| ReconcileError::Write {
        path: log_file.to_path_buf(),
        source,
    };

    if let Some(parent) = log_file.parent().filter(|p| !p.as_str().is_empty()) {
        fs::create_dir_all(parent).map_err(write_err)?;
    }

    let mut block = format!(
        "\n[{}] Title changes from {}\n",
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
        manifest_path.file_name().unwrap_or(manifest_path.as_str())
    );
    for change in changes {
        block.push_str(&change.log_line());
        block.push('\n');
    }

    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_file)
        .map_err(write_err)?;
    file.write_all(block.as_bytes()).map_err(write_err)
}

/// Replace each span with its text; spans must be sorted and disjoint.
fn apply_rewrites(text: &str, rewrites: &[(Range<usize>, String)]) -> String {
    let mut out = String::with_capacity(text.len());
    let mut cursor = 0;
    for (span, replacement) in rewrites {
        out.push_str(&text[cursor..span.start]);
        out.push_str(replacement);
        cursor = span.end;
    }
    out.push_str(&text[cursor..]);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ManifestConfig, PlaylistItem};
    use crate::services::upload_client::MockUploadClient;
    use mockall::predicate::eq;
    use tempfile::TempDir;

    fn item(video_id: &str, title: &str) -> PlaylistItem {
        PlaylistItem {
            item_id: format!("it-{video_id}"),
            video_id: video_id.to_string(),
            title: title.to_string(),
            description: "prev".to_string(),
        }
    }

    fn reconciler(client: MockUploadClient) -> PlaylistReconciler {
        PlaylistReconciler::new(
            Arc::new(client),
            ManifestParser::new(&ManifestConfig::default()).unwrap(),
            TitlePolicy::default(),
        )
    }

    #[tokio::test]
    async fn test_positional_reference_title_change() {
        let mut client = MockUploadClient::new();
        client
            .expect_list_playlist_items()
            .with(eq("PL1"))
            .times(1)
            .returning(|_| Ok(vec![item("v1", "Old"), item("v2", "Mid")]));
        client
            .expect_update_video()
            .with(eq("v1"), eq("Intro"), eq("Intro\n\nprev"))
            .times(1)
            .returning(|_, _, _| Ok(()));

        let outcome = reconciler(client)
            .reconcile("[Intro](https://indirect.example/x/1)", "PL1")
            .await
            .unwrap();

        assert_eq!(
            outcome.changes,
            vec![TitleChange {
                video_id: "v1".to_string(),
                old_title: "Old".to_string(),
                new_title: "Intro".to_string(),
            }]
        );
        assert_eq!(outcome.rewritten.as_deref(), Some("[Intro](https://youtu.be/v1)"));
    }

    #[tokio::test]
    async fn test_matching_titles_produce_nothing() {
        let mut client = MockUploadClient::new();
        client
            .expect_list_playlist_items()
            .returning(|_| Ok(vec![item("v1", "Intro"), item("v2", "Outro")]));
        client.expect_update_video().never();

        let outcome = reconciler(client)
            .reconcile(
                "- [Intro](https://youtu.be/v1)\n- [Outro](https://youtu.be/v2)\n",
                "PL1",
            )
            .await
            .unwrap();

        assert!(outcome.changes.is_empty());
        assert!(outcome.rewritten.is_none());
    }

    #[tokio::test]
    async fn test_out_of_range_and_unknown_references_skipped() {
        let mut client = MockUploadClient::new();
        client
            .expect_list_playlist_items()
            .returning(|_| Ok(vec![item("v1", "One")]));
        client
            .expect_update_video()
            .with(eq("v1"), eq("First"), mockall::predicate::always())
            .times(1)
            .returning(|_, _, _| Ok(()));

        let text = "[Gone](https://indirect.example/5)\n[Other](https://youtu.be/zzz)\n[First](https://indirect.example/-1)\n";
        let outcome = reconciler(client).reconcile(text, "PL1").await.unwrap();

        assert_eq!(outcome.changes.len(), 1);
        assert_eq!(
            outcome.rewritten.unwrap(),
            "[Gone](https://indirect.example/5)\n[Other](https://youtu.be/zzz)\n[First](https://youtu.be/v1)\n"
        );
    }

    #[tokio::test]
    async fn test_duplicate_reference_updated_once() {
        let mut client = MockUploadClient::new();
        client
            .expect_list_playlist_items()
            .returning(|_| Ok(vec![item("v1", "Old")]));
        client
            .expect_update_video()
            .times(1)
            .returning(|_, _, _| Ok(()));

        let text = "[New](https://youtu.be/v1) and again [New](https://indirect.example/1)";
        let outcome = reconciler(client).reconcile(text, "PL1").await.unwrap();
        assert_eq!(outcome.changes.len(), 1);
    }

    #[tokio::test]
    async fn test_update_failure_aborts_run() {
        let mut client = MockUploadClient::new();
        client
            .expect_list_playlist_items()
            .returning(|_| Ok(vec![item("v1", "Old")]));
        client.expect_update_video().returning(|_, _, _| {
            Err(crate::error::UploadError::ApiError {
                status_code: 403,
                message: "forbidden".to_string(),
            })
        });

        let err = reconciler(client)
            .reconcile("[New](https://youtu.be/v1)", "PL1")
            .await
            .unwrap_err();
        assert!(matches!(err, ReconcileError::UpdateVideo { .. }));
    }

    #[tokio::test]
    async fn test_run_writes_log_and_v2() {
        let temp = TempDir::new().unwrap();
        let dir = Utf8PathBuf::try_from(temp.path().to_path_buf()).unwrap();
        let manifest = dir.join("d_course.md");
        let log = dir.join("logs/course.md");
        fs::write(&manifest, "# Course\n\n1. [Intro](https://indirect.example/x/1)\n").unwrap();

        let mut client = MockUploadClient::new();
        client
            .expect_list_playlist_items()
            .returning(|_| Ok(vec![item("v1", "Old")]));
        client.expect_update_video().returning(|_, _, _| Ok(()));

        let report = reconciler(client)
            .run(&manifest, "PL1", Some(&log))
            .await
            .unwrap();

        assert_eq!(report.v2_path, Some(dir.join("d_course_v2.md")));
        assert_eq!(
            fs::read_to_string(dir.join("d_course_v2.md")).unwrap(),
            "# Course\n\n1. [Intro](https://youtu.be/v1)\n"
        );
        let log_text = fs::read_to_string(&log).unwrap();
        assert!(log_text.contains("Title changes from d_course.md"));
        assert!(log_text.contains("(v1): Old --(changed)--> Intro"));
    }

    #[test]
    fn test_v2_path() {
        assert_eq!(v2_path(Utf8Path::new("/a/list.md")), Utf8PathBuf::from("/a/list_v2.md"));
        assert_eq!(v2_path(Utf8Path::new("/a/list")), Utf8PathBuf::from("/a/list_v2"));
    }

    #[tokio::test]
    async fn test_previous_description_kept_verbatim() {
        let mut client = MockUploadClient::new();
        client.expect_list_playlist_items().returning(|_| {
            Ok(vec![PlaylistItem {
                description: "Old\n\nnotes  \n".to_string(),
                ..item("v1", "Old")
            }])
        });
        client
            .expect_update_video()
            .with(eq("v1"), eq("New"), eq("New\n\nOld\n\nnotes  \n"))
            .times(1)
            .returning(|_, _, _| Ok(()));

        reconciler(client)
            .reconcile("[New](https://youtu.be/v1)", "PL1")
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_empty_description_becomes_title() {
        let mut client = MockUploadClient::new();
        client.expect_list_playlist_items().returning(|_| {
            Ok(vec![PlaylistItem {
                description: String::new(),
                ..item("v1", "Old")
            }])
        });
        client
            .expect_update_video()
            .with(eq("v1"), eq("New"), eq("New"))
            .times(1)
            .returning(|_, _, _| Ok(()));

        reconciler(client)
            .reconcile("[New](https://youtu.be/v1)", "PL1")
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_numbered_links_elsewhere_left_alone() {
        let mut client = MockUploadClient::new();
        client
            .expect_list_playlist_items()
            .returning(|_| Ok(vec![item("v1", "Lecture 1"), item("v2", "Lecture 2")]));
        client.expect_update_video().never();

        let outcome = reconciler(client)
            .reconcile(
                "- [Lecture 1](https://youtu.be/v1)\n\nSee [bug report](https://github.com/org/repo/issues/2) for errata.\n",
                "PL1",
            )
            .await
            .unwrap();

        assert!(outcome.changes.is_empty());
        assert!(outcome.rewritten.is_none());
    }

    #[test]
    fn test_apply_rewrites_preserves_other_bytes() {
        let text = "ab[x]cd[y]ef";
        let out = apply_rewrites(text, &[(2..5, "X".to_string()), (7..10, "Y".to_string())]);
        assert_eq!(out, "abXcdYef");
    }
}
