//! Per-file configuration resolution.
//!
//! The group table is an ordered map. The first group whose non-empty
//! `regex` pattern occurs anywhere in the file name wins, and only that one is
//! applied. Matching is plain substring containment, so config authors must
//! pick codes that do not overlap (a pattern `A1` also matches `A10_intro.mp4`).

use crate::error::ConfigError;
use crate::models::{AppConfig, EffectiveConfig, GroupConfig};
use crate::services::template::{self, TemplateError};
use camino::Utf8PathBuf;

/// Placeholders accepted by `output_filename_template`; `code` as for [`LOG_TEMPLATE_VARS`]
pub const OUTPUT_FILENAME_VARS: &[&str] = &["original_name", "video_id", "code"];

/// Placeholders accepted by `log_template`.
///
/// `code` is bound again at render time, for templates that mixed it with
/// other placeholders and were therefore kept verbatim by group expansion.
pub const LOG_TEMPLATE_VARS: &[&str] = &["file_name_without_ext", "url", "video_id", "code"];

/// Placeholders accepted by `default_title`
pub const TITLE_TEMPLATE_VARS: &[&str] = &["original_name", "code"];

/// Resolves the [`EffectiveConfig`] for a file name
#[derive(Debug, Clone)]
pub struct ConfigResolver {
    base: AppConfig,
}

impl ConfigResolver {
    pub fn new(base: AppConfig) -> Self {
        Self { base }
    }

    pub fn base(&self) -> &AppConfig {
        &self.base
    }

    /// Key and rule of the first group matching `filename`
    pub fn matching_group<'a>(&'a self, filename: &str) -> Option<(&'a str, &'a GroupConfig)> {
        self.base
            .group_settings
            .iter()
            .find(|(_, group)| !group.regex.is_empty() && filename.contains(group.regex.as_str()))
            .map(|(code, group)| (code.as_str(), group))
    }

    /// Build the effective configuration for `filename`.
    ///
    /// Templates are validated here so that a broken config stops the file
    /// before anything is renamed or uploaded.
    pub fn resolve(&self, filename: &str) -> Result<EffectiveConfig, ConfigError> {
        let mut effective = base_effective(&self.base);

        if let Some((code, group)) = self.matching_group(filename) {
            tracing::debug!("{} matched group {}", filename, code);
            apply_group(&mut effective, &expand_code(group, code), code);
        }

        check_template(
            "output_filename_template",
            &effective.output_filename_template,
            OUTPUT_FILENAME_VARS,
        )?;
        check_template("log_template", &effective.log_template, LOG_TEMPLATE_VARS)?;
        if let Some(title) = &effective.default_title {
            check_template("default_title", title, TITLE_TEMPLATE_VARS)?;
        }
        // A status prefix starting with the pending prefix would be picked up again by the scan
        if effective.status_prefix.uploading.starts_with(&effective.prefix)
            || effective.status_prefix.done.starts_with(&effective.prefix)
        {
            return Err(ConfigError::Invalid(format!(
                "status prefixes must not start with pending prefix {:?}",
                effective.prefix
            )));
        }

        Ok(effective)
    }
}

/// Substitute `{code}` in a single string field.
///
/// Fields that fail to render (another placeholder, stray braces) are kept
/// verbatim.
pub fn substitute_code(value: &str, code: &str) -> String {
    template::render(value, &[("code", code)]).unwrap_or_else(|_| value.to_string())
}

/// Group rule with `{code}` expanded in every string field.
///
/// Non-string fields (tags, the nested playlist) are copied unchanged.
pub fn expand_code(group: &GroupConfig, code: &str) -> GroupConfig {
    let sub = |field: &Option<String>| field.as_deref().map(|v| substitute_code(v, code));

    GroupConfig {
        regex: substitute_code(&group.regex, code),
        after_upload_dir: sub(&group.after_upload_dir),
        privacy_status: sub(&group.privacy_status),
        log_template: sub(&group.log_template),
        log_file_path: sub(&group.log_file_path),
        output_filename_template: sub(&group.output_filename_template),
        default_title: sub(&group.default_title),
        default_description: sub(&group.default_description),
        category_id: sub(&group.category_id),
        default_tags: group.default_tags.clone(),
        playlist: group.playlist.clone(),
    }
}

fn base_effective(base: &AppConfig) -> EffectiveConfig {
    EffectiveConfig {
        upload_folder: base.upload_folder.clone(),
        prefix: base.prefix.clone(),
        status_prefix: base.status_prefix.clone(),
        output_filename_template: base.output_filename_template.clone(),
        default_title: base.default_title.clone(),
        default_description: base.default_description.clone(),
        default_tags: base.default_tags.clone(),
        category_id: base.category_id.clone(),
        privacy_status: base.privacy_status.clone(),
        after_upload_dir: base.after_upload_dir.clone(),
        log_file_path: base.log_file_path.clone(),
        log_template: base.log_template.clone(),
        playlist: base.playlist.clone(),
        code: String::new(),
    }
}

fn apply_group(effective: &mut EffectiveConfig, group: &GroupConfig, code: &str) {
    if let Some(dir) = &group.after_upload_dir {
        effective.after_upload_dir = Some(Utf8PathBuf::from(dir));
    }
    if let Some(path) = &group.log_file_path {
        effective.log_file_path = Some(Utf8PathBuf::from(path));
    }
    if let Some(privacy) = &group.privacy_status {
        effective.privacy_status = privacy.clone();
    }
    if let Some(template) = &group.log_template {
        effective.log_template = template.clone();
    }
    if let Some(template) = &group.output_filename_template {
        effective.output_filename_template = template.clone();
    }
    if let Some(title) = &group.default_title {
        effective.default_title = Some(title.clone());
    }
    if let Some(description) = &group.default_description {
        effective.default_description = description.clone();
    }
    if let Some(tags) = &group.default_tags {
        effective.default_tags = tags.clone();
    }
    if let Some(category) = &group.category_id {
        effective.category_id = category.clone();
    }
    if let Some(playlist) = &group.playlist {
        effective.playlist = Some(playlist.clone());
    }
    effective.code = code.to_string();
}

fn check_template(field: &str, value: &str, allowed: &[&str]) -> Result<(), ConfigError> {
    template::validate(value, allowed).map_err(|e| match e {
        TemplateError::UnknownPlaceholder(placeholder) => ConfigError::UnknownPlaceholder {
            field: field.to_string(),
            placeholder,
        },
        other => ConfigError::MalformedTemplate {
            field: field.to_string(),
            reason: other.to_string(),
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{PlaylistSpec, StatusPrefix};
    use indexmap::IndexMap;
    use proptest::prelude::*;

    fn base_config() -> AppConfig {
        serde_yaml_ng::from_str(
            r#"
upload_folder: /watch
prefix: r_
status_prefix:
  uploading: u_
  done: d_
privacy_status: private
"#,
        )
        .unwrap()
    }

    fn group(pattern: &str) -> GroupConfig {
        GroupConfig {
            regex: pattern.to_string(),
            ..GroupConfig::default()
        }
    }

    #[test]
    fn test_no_match_returns_base_with_empty_code() {
        let resolver = ConfigResolver::new(base_config());
        let effective = resolver.resolve("movie1.mp4").unwrap();

        assert_eq!(effective.code, "");
        assert_eq!(effective.privacy_status, "private");
        assert_eq!(effective.after_upload_dir, None);
        assert_eq!(
            effective.status_prefix,
            StatusPrefix {
                uploading: "u_".to_string(),
                done: "d_".to_string()
            }
        );
    }

    #[test]
    fn test_first_match_in_declaration_order_wins() {
        let mut base = base_config();
        let mut first = group("lec");
        first.privacy_status = Some("unlisted".to_string());
        let mut second = group("lecture");
        second.privacy_status = Some("public".to_string());
        base.group_settings.insert("B".to_string(), first);
        base.group_settings.insert("A".to_string(), second);

        let effective = ConfigResolver::new(base).resolve("lecture_01.mp4").unwrap();
        assert_eq!(effective.code, "B");
        assert_eq!(effective.privacy_status, "unlisted");
    }

    #[test]
    fn test_code_is_substituted_in_string_fields() {
        let mut base = base_config();
        let mut rule = group("MATH");
        rule.after_upload_dir = Some("/done/{code}".to_string());
        rule.log_file_path = Some("/logs/{code}.md".to_string());
        rule.default_description = Some("Course {code}".to_string());
        base.group_settings.insert("MATH101".to_string(), rule);

        let effective = ConfigResolver::new(base).resolve("MATH_week1.mp4").unwrap();
        assert_eq!(effective.after_upload_dir, Some(Utf8PathBuf::from("/done/MATH101")));
        assert_eq!(effective.log_file_path, Some(Utf8PathBuf::from("/logs/MATH101.md")));
        assert_eq!(effective.default_description, "Course MATH101");
        assert_eq!(effective.code, "MATH101");
    }

    #[test]
    fn test_field_with_other_placeholder_left_verbatim() {
        let mut base = base_config();
        let mut rule = group("X");
        rule.log_template = Some("- [{file_name_without_ext}]({url}) #{code}".to_string());
        base.group_settings.insert("XY".to_string(), rule);

        let effective = ConfigResolver::new(base).resolve("X_1.mp4").unwrap();
        assert_eq!(
            effective.log_template,
            "- [{file_name_without_ext}]({url}) #{code}"
        );
    }

    #[test]
    fn test_non_string_fields_pass_through() {
        let mut base = base_config();
        let mut rule = group("S");
        rule.default_tags = Some(vec!["{code}".to_string()]);
        rule.playlist = Some(PlaylistSpec {
            title: "{code} list".to_string(),
            enable: true,
            ..PlaylistSpec::default()
        });
        base.group_settings.insert("S1".to_string(), rule);

        let effective = ConfigResolver::new(base).resolve("S_a.mp4").unwrap();
        assert_eq!(effective.default_tags, vec!["{code}"]);
        assert_eq!(effective.playlist.unwrap().title, "{code} list");
    }

    #[test]
    fn test_empty_pattern_never_matches() {
        let mut base = base_config();
        base.group_settings.insert("ALL".to_string(), group(""));

        let effective = ConfigResolver::new(base).resolve("anything.mp4").unwrap();
        assert_eq!(effective.code, "");
    }

    #[test]
    fn test_unknown_placeholder_in_output_template_is_config_error() {
        let mut base = base_config();
        base.output_filename_template = "{original_name}_{title}".to_string();

        let err = ConfigResolver::new(base).resolve("a.mp4").unwrap_err();
        assert_eq!(
            err,
            ConfigError::UnknownPlaceholder {
                field: "output_filename_template".to_string(),
                placeholder: "title".to_string(),
            }
        );
    }

    #[test]
    fn test_status_prefix_overlapping_prefix_rejected() {
        let mut base = base_config();
        base.status_prefix.done = "r_done_".to_string();
        assert!(ConfigResolver::new(base).resolve("a.mp4").is_err());
    }

    fn table_strategy() -> impl Strategy<Value = Vec<(String, String)>> {
        prop::collection::vec(("[A-Z]{1,3}", "[a-c]{0,2}"), 0..6)
    }

    proptest! {
        #[test]
        fn prop_selects_first_matching_group(table in table_strategy(), filename in "[a-c]{0,6}") {
            let mut groups = IndexMap::new();
            for (code, pattern) in &table {
                groups.entry(code.clone()).or_insert_with(|| group(pattern));
            }
            let expected = groups
                .iter()
                .find(|(_, g)| !g.regex.is_empty() && filename.contains(g.regex.as_str()))
                .map(|(code, _)| code.clone())
                .unwrap_or_default();

            let mut base = base_config();
            base.group_settings = groups;
            let effective = ConfigResolver::new(base).resolve(&filename).unwrap();
            prop_assert_eq!(effective.code, expected);
        }

        #[test]
        fn prop_code_substitution_is_total(value in "[a-z /_.]{0,12}", code in "[A-Z0-9]{1,4}") {
            prop_assert_eq!(substitute_code(&value, &code), value.clone());

            let with_token = format!("{value}{{code}}");
            prop_assert_eq!(substitute_code(&with_token, &code), format!("{value}{code}"));
        }
    }
}
