use crate::models::AppConfig;
use anyhow::{Context, Result, bail};
use camino::{Utf8Path, Utf8PathBuf};
use serde_yaml_ng::{Mapping, Value};
use std::fs;

/// Base configuration file, tried first
pub const CONFIG_FILE: &str = "config.yaml";

/// Older deployments keep their base config as JSON
pub const LEGACY_CONFIG_FILE: &str = "config.json";

pub const USER_CONFIG_FILE: &str = "user_config.yaml";
pub const LEGACY_USER_CONFIG_FILE: &str = "userConfig.json";

/// Configuration manager for loading and saving the pipeline configuration.
///
/// Manages two files in one directory:
/// - Base config (`config.yaml`, or legacy `config.json`): required
/// - User config (`user_config.yaml`, or legacy `userConfig.json`): optional
///   overrides; each top-level key replaces the base key wholesale
#[derive(Debug, Clone)]
pub struct ConfigManager {
    config_dir: Utf8PathBuf,
    config_path: Utf8PathBuf,
    user_config_path: Utf8PathBuf,
}

impl ConfigManager {
    /// Create a new ConfigManager with the specified configuration directory.
    ///
    /// # Arguments
    /// * `config_dir` - Directory containing configuration files
    pub fn new<P: AsRef<Utf8Path>>(config_dir: P) -> Result<Self> {
        let config_dir = config_dir.as_ref().to_path_buf();

        if !config_dir.exists() {
            fs::create_dir_all(&config_dir)
                .with_context(|| format!("Failed to create config directory: {}", config_dir))?;
        }

        Ok(Self {
            config_path: config_dir.join(CONFIG_FILE),
            user_config_path: config_dir.join(USER_CONFIG_FILE),
            config_dir,
        })
    }

    /// Load the base config with the user overlay applied.
    pub fn load_config(&self) -> Result<AppConfig> {
        let legacy_path = self.config_dir.join(LEGACY_CONFIG_FILE);
        let base_path = if self.config_path.exists() {
            &self.config_path
        } else if legacy_path.exists() {
            tracing::info!("Using legacy config file: {}", legacy_path);
            &legacy_path
        } else {
            bail!(
                "Config file not found at {} or {}",
                self.config_path,
                legacy_path
            );
        };

        let mut merged = read_mapping(base_path)?;

        if let Some(user_path) = self.user_config_file() {
            let overlay = read_mapping(&user_path)?;
            tracing::info!(
                "Applying {} user config keys from {}",
                overlay.len(),
                user_path
            );
            overlay_top_level(&mut merged, overlay);
        }

        let config: AppConfig = serde_yaml_ng::from_value(Value::Mapping(merged))
            .with_context(|| format!("Failed to parse config: {}", base_path))?;

        tracing::info!("Loaded config from {}", base_path);
        Ok(config)
    }

    /// Save `config` as the base config file.
    ///
    /// The user overlay is left untouched.
    pub fn save_config(&self, config: &AppConfig) -> Result<()> {
        let yaml_string =
            serde_yaml_ng::to_string(config).context("Failed to serialize config to YAML")?;

        fs::write(&self.config_path, yaml_string)
            .with_context(|| format!("Failed to write config: {}", self.config_path))?;

        tracing::info!("Saved config to {}", self.config_path);
        Ok(())
    }

    /// Get the configuration directory path.
    pub fn config_dir(&self) -> &Utf8Path {
        &self.config_dir
    }

    fn user_config_file(&self) -> Option<Utf8PathBuf> {
        let legacy_path = self.config_dir.join(LEGACY_USER_CONFIG_FILE);
        if self.user_config_path.exists() {
            Some(self.user_config_path.clone())
        } else if legacy_path.exists() {
            tracing::info!("Using legacy user config file: {}", legacy_path);
            Some(legacy_path)
        } else {
            tracing::debug!("No user config at {}", self.user_config_path);
            None
        }
    }
}

fn read_mapping(path: &Utf8Path) -> Result<Mapping> {
    let contents =
        fs::read_to_string(path).with_context(|| format!("Failed to read config: {}", path))?;

    match serde_yaml_ng::from_str::<Value>(&contents)
        .with_context(|| format!("Failed to parse config: {}", path))?
    {
        Value::Mapping(mapping) => Ok(mapping),
        // An empty file parses as null
        Value::Null => Ok(Mapping::new()),
        _ => bail!("Config file {} must contain a mapping at the top level", path),
    }
}

/// Shallow merge: every top-level key of `overlay` replaces the base key
fn overlay_top_level(base: &mut Mapping, overlay: Mapping) {
    for (key, value) in overlay {
        base.insert(key, value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const BASE: &str = r#"
upload_folder: /watch
prefix: r_
status_prefix:
  uploading: u_
  done: d_
privacy_status: private
group_settings:
  lec:
    regex: lecture
"#;

    fn create_test_config_manager() -> (ConfigManager, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let config_path = Utf8PathBuf::try_from(temp_dir.path().to_path_buf()).unwrap();
        let manager = ConfigManager::new(&config_path).unwrap();
        (manager, temp_dir)
    }

    #[test]
    fn test_missing_config_is_error() {
        let (manager, _temp_dir) = create_test_config_manager();
        assert!(manager.load_config().is_err());
    }

    #[test]
    fn test_load_base_config() {
        let (manager, _temp_dir) = create_test_config_manager();
        fs::write(manager.config_dir().join(CONFIG_FILE), BASE).unwrap();

        let config = manager.load_config().unwrap();
        assert_eq!(config.prefix, "r_");
        assert!(config.group_settings.contains_key("lec"));
    }

    #[test]
    fn test_user_overlay_replaces_top_level_keys() {
        let (manager, _temp_dir) = create_test_config_manager();
        fs::write(manager.config_dir().join(CONFIG_FILE), BASE).unwrap();
        fs::write(
            manager.config_dir().join(USER_CONFIG_FILE),
            "privacy_status: unlisted\ngroup_settings:\n  other:\n    regex: x\n",
        )
        .unwrap();

        let config = manager.load_config().unwrap();
        assert_eq!(config.privacy_status, "unlisted");
        // Shallow: the whole map is replaced, not merged
        assert!(!config.group_settings.contains_key("lec"));
        assert!(config.group_settings.contains_key("other"));
        assert_eq!(config.prefix, "r_");
    }

    #[test]
    fn test_legacy_json_files() {
        let (manager, _temp_dir) = create_test_config_manager();
        fs::write(
            manager.config_dir().join(LEGACY_CONFIG_FILE),
            r#"{"upload_folder": "/w", "prefix": "r_", "status_prefix": {"uploading": "u_", "done": "d_"}}"#,
        )
        .unwrap();
        fs::write(
            manager.config_dir().join(LEGACY_USER_CONFIG_FILE),
            r#"{"scan_interval": 5}"#,
        )
        .unwrap();

        let config = manager.load_config().unwrap();
        assert_eq!(config.upload_folder, Utf8PathBuf::from("/w"));
        assert_eq!(config.scan_interval, 5);
    }

    #[test]
    fn test_save_and_reload() {
        let (manager, _temp_dir) = create_test_config_manager();
        fs::write(manager.config_dir().join(CONFIG_FILE), BASE).unwrap();

        let mut config = manager.load_config().unwrap();
        config.scan_interval = 120;
        manager.save_config(&config).unwrap();

        let reloaded = manager.load_config().unwrap();
        assert_eq!(reloaded.scan_interval, 120);
        assert_eq!(reloaded.group_settings.len(), 1);
    }

    #[test]
    fn test_non_mapping_rejected() {
        let (manager, _temp_dir) = create_test_config_manager();
        fs::write(manager.config_dir().join(CONFIG_FILE), "- a\n- b\n").unwrap();
        assert!(manager.load_config().is_err());
    }
}
