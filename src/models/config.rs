use camino::{Utf8Path, Utf8PathBuf};
use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize};

/// Files modified more recently than this are assumed to still be written.
pub const DEFAULT_DEBOUNCE_SECS: u64 = 30;

/// Longest title the platform accepts, in characters.
pub const DEFAULT_TITLE_MAX_CHARS: usize = 100;

/// Resumable upload chunk size. Must stay a multiple of 256 KiB.
pub const DEFAULT_UPLOAD_CHUNK_BYTES: usize = 8 * 1024 * 1024;

pub const DEFAULT_OUTPUT_FILENAME_TEMPLATE: &str = "{original_name}_{video_id}";
pub const DEFAULT_LOG_TEMPLATE: &str = "- [{file_name_without_ext}]({url})";
pub const DEFAULT_DIRECT_LINK_BASE: &str = "https://youtu.be/";
pub const DEFAULT_POSITION_HOST: &str = "indirect.example";

/// Top-level configuration from `config.yaml` (+ `user_config.yaml` overlay)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub upload_folder: Utf8PathBuf,

    pub prefix: String,

    pub status_prefix: StatusPrefix,

    #[serde(default = "default_output_filename_template")]
    pub output_filename_template: String,

    #[serde(default)]
    pub default_title: Option<String>,

    #[serde(default)]
    pub default_description: String,

    #[serde(default)]
    pub default_tags: Vec<String>,

    #[serde(default = "default_category_id", deserialize_with = "string_or_number")]
    pub category_id: String,

    #[serde(default = "default_privacy_status")]
    pub privacy_status: String,

    /// Seconds to sleep between scan passes
    #[serde(default = "default_scan_interval")]
    pub scan_interval: u64,

    #[serde(default = "default_log_template")]
    pub log_template: String,

    #[serde(default)]
    pub log_file_path: Option<Utf8PathBuf>,

    #[serde(default)]
    pub after_upload_dir: Option<Utf8PathBuf>,

    /// Group rules keyed by code, matched in declaration order
    #[serde(default)]
    pub group_settings: IndexMap<String, GroupConfig>,

    #[serde(default)]
    pub playlist: Option<PlaylistSpec>,

    #[serde(default = "default_video_extensions")]
    pub video_extensions: Vec<String>,

    #[serde(default = "default_manifest_extensions")]
    pub manifest_extensions: Vec<String>,

    #[serde(default)]
    pub policy: PolicyConfig,

    #[serde(default)]
    pub manifest: ManifestConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusPrefix {
    pub uploading: String,
    pub done: String,
}

/// One entry of `group_settings`.
///
/// Every field except `regex` is an override; `None` keeps the base value.
/// String fields may contain `{code}`, which is replaced by the group key.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GroupConfig {
    /// Substring pattern (not a regular expression despite the key name)
    #[serde(default)]
    pub regex: String,

    #[serde(default)]
    pub after_upload_dir: Option<String>,

    #[serde(default)]
    pub privacy_status: Option<String>,

    #[serde(default)]
    pub log_template: Option<String>,

    #[serde(default)]
    pub log_file_path: Option<String>,

    #[serde(default)]
    pub output_filename_template: Option<String>,

    #[serde(default)]
    pub default_title: Option<String>,

    #[serde(default)]
    pub default_description: Option<String>,

    #[serde(default)]
    pub default_tags: Option<Vec<String>>,

    #[serde(default, deserialize_with = "optional_string_or_number")]
    pub category_id: Option<String>,

    #[serde(default)]
    pub playlist: Option<PlaylistSpec>,
}

/// Playlist attachment / reconciliation target
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaylistSpec {
    /// Logical code, embedded as a marker in the playlist description.
    /// Empty means "use the matched group's code".
    #[serde(default)]
    pub code: String,

    /// Explicit platform playlist id; skips the marker lookup
    #[serde(default)]
    pub id: Option<String>,

    #[serde(default)]
    pub enable: bool,

    #[serde(rename = "addFirst", alias = "add_first", default)]
    pub add_first: bool,

    #[serde(default)]
    pub title: String,

    #[serde(default)]
    pub description: String,

    #[serde(default = "default_privacy_status")]
    pub privacy_status: String,
}

impl Default for PlaylistSpec {
    fn default() -> Self {
        Self {
            code: String::new(),
            id: None,
            enable: false,
            add_first: false,
            title: String::new(),
            description: String::new(),
            privacy_status: default_privacy_status(),
        }
    }
}

/// Policy constants that have sensible defaults but may be tuned per deployment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyConfig {
    #[serde(default = "default_debounce_secs")]
    pub debounce_secs: u64,

    #[serde(default = "default_title_max_chars")]
    pub title_max_chars: usize,

    #[serde(default = "default_upload_chunk_bytes")]
    pub upload_chunk_bytes: usize,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            debounce_secs: DEFAULT_DEBOUNCE_SECS,
            title_max_chars: DEFAULT_TITLE_MAX_CHARS,
            upload_chunk_bytes: DEFAULT_UPLOAD_CHUNK_BYTES,
        }
    }
}

/// Manifest link grammar settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestConfig {
    /// Base of direct links, followed by the video id
    #[serde(default = "default_direct_link_base")]
    pub direct_link_base: String,

    /// Host of position-reference links. Empty disables positional links.
    #[serde(default = "default_position_host")]
    pub position_host: String,
}

impl Default for ManifestConfig {
    fn default() -> Self {
        Self {
            direct_link_base: default_direct_link_base(),
            position_host: default_position_host(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_dir")]
    pub dir: Utf8PathBuf,

    #[serde(default = "default_log_prefix")]
    pub prefix: String,

    #[serde(default)]
    pub debug: bool,

    #[serde(default = "default_true")]
    pub console: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            dir: default_log_dir(),
            prefix: default_log_prefix(),
            debug: false,
            console: true,
        }
    }
}

/// Per-file configuration produced by
/// [`ConfigResolver`](crate::services::ConfigResolver).
///
/// Never mutated after resolution.
#[derive(Debug, Clone, PartialEq)]
pub struct EffectiveConfig {
    pub upload_folder: Utf8PathBuf,
    pub prefix: String,
    pub status_prefix: StatusPrefix,
    pub output_filename_template: String,
    pub default_title: Option<String>,
    pub default_description: String,
    pub default_tags: Vec<String>,
    pub category_id: String,
    pub privacy_status: String,
    pub after_upload_dir: Option<Utf8PathBuf>,
    pub log_file_path: Option<Utf8PathBuf>,
    pub log_template: String,
    pub playlist: Option<PlaylistSpec>,
    /// Key of the matched group, empty when no group matched
    pub code: String,
}

impl EffectiveConfig {
    /// Directory where Done files land
    pub fn done_dir(&self) -> &Utf8Path {
        self.after_upload_dir
            .as_deref()
            .unwrap_or(&self.upload_folder)
    }

    /// The playlist to use for this file, if one is enabled.
    ///
    /// An empty playlist code falls back to the group code.
    pub fn active_playlist(&self) -> Option<PlaylistSpec> {
        let spec = self.playlist.as_ref().filter(|p| p.enable)?;
        let mut spec = spec.clone();
        if spec.code.is_empty() {
            spec.code = self.code.clone();
        }
        if spec.code.is_empty() && spec.id.is_none() {
            return None;
        }
        Some(spec)
    }
}

fn default_output_filename_template() -> String {
    DEFAULT_OUTPUT_FILENAME_TEMPLATE.to_string()
}

fn default_log_template() -> String {
    DEFAULT_LOG_TEMPLATE.to_string()
}

fn default_category_id() -> String {
    "22".to_string()
}

fn default_privacy_status() -> String {
    "private".to_string()
}

fn default_scan_interval() -> u64 {
    60
}

fn default_video_extensions() -> Vec<String> {
    vec![".mp4".to_string()]
}

fn default_manifest_extensions() -> Vec<String> {
    vec![".md".to_string()]
}

fn default_debounce_secs() -> u64 {
    DEFAULT_DEBOUNCE_SECS
}

fn default_title_max_chars() -> usize {
    DEFAULT_TITLE_MAX_CHARS
}

fn default_upload_chunk_bytes() -> usize {
    DEFAULT_UPLOAD_CHUNK_BYTES
}

fn default_direct_link_base() -> String {
    DEFAULT_DIRECT_LINK_BASE.to_string()
}

fn default_position_host() -> String {
    DEFAULT_POSITION_HOST.to_string()
}

fn default_log_dir() -> Utf8PathBuf {
    Utf8PathBuf::from("logs")
}

fn default_log_prefix() -> String {
    "autotube".to_string()
}

fn default_true() -> bool {
    true
}

#[derive(Deserialize)]
#[serde(untagged)]
enum StringOrNumber {
    String(String),
    Integer(i64),
}

impl From<StringOrNumber> for String {
    fn from(value: StringOrNumber) -> Self {
        match value {
            StringOrNumber::String(s) => s,
            StringOrNumber::Integer(n) => n.to_string(),
        }
    }
}

// category_id is written as a bare number in most existing configs
fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    StringOrNumber::deserialize(deserializer).map(String::from)
}

fn optional_string_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<StringOrNumber>::deserialize(deserializer).map(|v| v.map(String::from))
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
upload_folder: /watch
prefix: r_
status_prefix:
  uploading: u_
  done: d_
"#;

    #[test]
    fn test_minimal_config_defaults() {
        let config: AppConfig = serde_yaml_ng::from_str(MINIMAL).unwrap();

        assert_eq!(config.output_filename_template, "{original_name}_{video_id}");
        assert_eq!(config.category_id, "22");
        assert_eq!(config.privacy_status, "private");
        assert_eq!(config.policy.debounce_secs, 30);
        assert_eq!(config.policy.title_max_chars, 100);
        assert_eq!(config.video_extensions, vec![".mp4"]);
        assert!(config.group_settings.is_empty());
        assert!(config.playlist.is_none());
    }

    #[test]
    fn test_category_id_accepts_number() {
        let yaml = format!("{MINIMAL}category_id: 20\n");
        let config: AppConfig = serde_yaml_ng::from_str(&yaml).unwrap();
        assert_eq!(config.category_id, "20");
    }

    #[test]
    fn test_group_settings_keep_declaration_order() {
        let yaml = format!(
            "{MINIMAL}group_settings:\n  zeta:\n    regex: z\n  alpha:\n    regex: a\n  mid:\n    regex: m\n"
        );
        let config: AppConfig = serde_yaml_ng::from_str(&yaml).unwrap();
        let keys: Vec<_> = config.group_settings.keys().cloned().collect();
        assert_eq!(keys, vec!["zeta", "alpha", "mid"]);
    }

    #[test]
    fn test_json_config_parses() {
        let json = r#"{
            "upload_folder": "/watch",
            "prefix": "r_",
            "status_prefix": {"uploading": "u_", "done": "d_"},
            "playlist": {"code": "PLX", "enable": true, "addFirst": true}
        }"#;
        let config: AppConfig = serde_yaml_ng::from_str(json).unwrap();
        let playlist = config.playlist.unwrap();
        assert!(playlist.add_first);
        assert_eq!(playlist.privacy_status, "private");
    }

    #[test]
    fn test_active_playlist_falls_back_to_group_code() {
        let config = EffectiveConfig {
            upload_folder: Utf8PathBuf::from("/watch"),
            prefix: "r_".to_string(),
            status_prefix: StatusPrefix {
                uploading: "u_".to_string(),
                done: "d_".to_string(),
            },
            output_filename_template: DEFAULT_OUTPUT_FILENAME_TEMPLATE.to_string(),
            default_title: None,
            default_description: String::new(),
            default_tags: Vec::new(),
            category_id: "22".to_string(),
            privacy_status: "private".to_string(),
            after_upload_dir: None,
            log_file_path: None,
            log_template: DEFAULT_LOG_TEMPLATE.to_string(),
            playlist: Some(PlaylistSpec {
                enable: true,
                ..PlaylistSpec::default()
            }),
            code: "lec".to_string(),
        };

        assert_eq!(config.active_playlist().unwrap().code, "lec");
        assert_eq!(config.done_dir(), Utf8Path::new("/watch"));
    }
}
