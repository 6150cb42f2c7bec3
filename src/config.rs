//! Persistent user configuration.
//!
//! One JSON file per user (`~/.clicod/config.json`) holds the Gemini API key
//! and the generation preferences. Every command that needs settings loads it
//! once through [`ConfigStore::load`]; only the `config` command writes it.

use crate::error::{ClicodError, Result};
use crate::output::write_atomic;
use dirs::home_dir;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";

/// Environment variable consulted when no key is stored.
pub const API_KEY_ENV: &str = "GEMINI_API_KEY";

/// Current value of `GEMINI_API_KEY`, if any.
pub fn env_api_key() -> Option<String> {
    std::env::var(API_KEY_ENV).ok()
}

/// Overrides the configuration directory (`~/.clicod` otherwise).
pub const CONFIG_DIR_ENV: &str = "CLICOD_CONFIG_DIR";

const CONFIG_FILE_NAME: &str = "config.json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Configuration {
    pub gemini_api_key: Option<String>,
    pub default_model: String,
    pub save_location: PathBuf,
    pub auto_save: bool,
    pub streaming: bool,
    pub json_format: bool,
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            gemini_api_key: None,
            default_model: DEFAULT_MODEL.to_string(),
            save_location: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            auto_save: false,
            streaming: false,
            json_format: false,
        }
    }
}

impl Configuration {
    /// Applies an already validated setting.
    pub fn apply(&mut self, setting: Setting) {
        match setting {
            Setting::GeminiApiKey(key) => self.gemini_api_key = Some(key),
            Setting::DefaultModel(model) => self.default_model = model,
            Setting::SaveLocation(path) => self.save_location = path,
            Setting::AutoSave(on) => self.auto_save = on,
            Setting::Streaming(on) => self.streaming = on,
            Setting::JsonFormat(on) => self.json_format = on,
        }
    }

    /// Stored key first, then the given environment value.
    pub fn effective_api_key(&self, env_key: Option<String>) -> Option<String> {
        self.gemini_api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .or_else(|| env_key.filter(|k| !k.trim().is_empty()))
    }


    /// Display form of the configuration. The raw key is never copied out.
    pub fn masked(&self, env_key: Option<String>) -> MaskedConfiguration {
        let (api_key, api_key_source) = match (&self.gemini_api_key, env_key) {
            (Some(key), _) if !key.trim().is_empty() => (Some(mask_secret(key)), KeySource::Config),
            (_, Some(key)) if !key.trim().is_empty() => {
                (Some(mask_secret(&key)), KeySource::Environment)
            }
            _ => (None, KeySource::Unset),
        };

        MaskedConfiguration {
            api_key,
            api_key_source,
            default_model: self.default_model.clone(),
            save_location: self.save_location.clone(),
            auto_save: self.auto_save,
            streaming: self.streaming,
            json_format: self.json_format,
        }
    }
}

/// Where the effective API key came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeySource {
    Config,
    Environment,
    Unset,
}

/// Configuration with the API key replaced by its masked form.
#[derive(Debug, Clone, PartialEq)]
pub struct MaskedConfiguration {
    pub api_key: Option<String>,
    pub api_key_source: KeySource,
    pub default_model: String,
    pub save_location: PathBuf,
    pub auto_save: bool,
    pub streaming: bool,
    pub json_format: bool,
}

/// Shows only the last four characters of a secret.
pub fn mask_secret(secret: &str) -> String {
    let chars: Vec<char> = secret.trim().chars().collect();
    if chars.len() <= 4 {
        return "****".to_string();
    }
    let suffix: String = chars[chars.len() - 4..].iter().collect();
    format!("****{}", suffix)
}

// =============================================================================
// Option table
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptionKind {
    Secret,
    Text,
    Path,
    Bool,
}

impl OptionKind {
    pub fn expected(self) -> &'static str {
        match self {
            OptionKind::Secret => "a non-empty string",
            OptionKind::Text => "a non-empty string without spaces",
            OptionKind::Path => "an existing directory",
            OptionKind::Bool => "a boolean (true/false, yes/no, on/off, 1/0)",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigKey {
    GeminiApiKey,
    DefaultModel,
    SaveLocation,
    AutoSave,
    Streaming,
    JsonFormat,
}

/// A validated, typed value for one option.
#[derive(Debug, Clone, PartialEq)]
pub enum Setting {
    GeminiApiKey(String),
    DefaultModel(String),
    SaveLocation(PathBuf),
    AutoSave(bool),
    Streaming(bool),
    JsonFormat(bool),
}

/// One entry of the recognized option table.
#[derive(Debug)]
pub struct OptionSpec {
    pub key: ConfigKey,
    pub name: &'static str,
    pub kind: OptionKind,
    pub description: &'static str,
}

pub const OPTIONS: &[OptionSpec] = &[
    OptionSpec {
        key: ConfigKey::GeminiApiKey,
        name: "gemini_api_key",
        kind: OptionKind::Secret,
        description: "API key used for every Gemini call",
    },
    OptionSpec {
        key: ConfigKey::DefaultModel,
        name: "default_model",
        kind: OptionKind::Text,
        description: "Model used when --model is not given",
    },
    OptionSpec {
        key: ConfigKey::SaveLocation,
        name: "save_location",
        kind: OptionKind::Path,
        description: "Directory generated scripts are saved to",
    },
    OptionSpec {
        key: ConfigKey::AutoSave,
        name: "auto_save",
        kind: OptionKind::Bool,
        description: "Save every generated script without --save",
    },
    OptionSpec {
        key: ConfigKey::Streaming,
        name: "streaming",
        kind: OptionKind::Bool,
        description: "Stream responses without --stream",
    },
    OptionSpec {
        key: ConfigKey::JsonFormat,
        name: "json_format",
        kind: OptionKind::Bool,
        description: "Request the structured JSON response format",
    },
];

/// Finds an option by name. `auto-save` and `AUTO_SAVE` match `auto_save`.
pub fn lookup_option(name: &str) -> Result<&'static OptionSpec> {
    let normalized = name.trim().to_ascii_lowercase().replace('-', "_");
    OPTIONS
        .iter()
        .find(|spec| spec.name == normalized)
        .ok_or_else(|| ClicodError::UnknownOption {
            name: name.to_string(),
            valid: option_names().join(", "),
        })
}

pub fn option_names() -> Vec<&'static str> {
    OPTIONS.iter().map(|spec| spec.name).collect()
}

impl OptionSpec {
    /// Coerces a raw CLI string into this option's typed value.
    pub fn parse(&self, raw: &str) -> Result<Setting> {
        let setting = match self.key {
            ConfigKey::GeminiApiKey => Setting::GeminiApiKey(self.parse_secret(raw)?),
            ConfigKey::DefaultModel => Setting::DefaultModel(self.parse_text(raw)?),
            ConfigKey::SaveLocation => Setting::SaveLocation(self.parse_path(raw)?),
            ConfigKey::AutoSave => Setting::AutoSave(self.parse_bool(raw)?),
            ConfigKey::Streaming => Setting::Streaming(self.parse_bool(raw)?),
            ConfigKey::JsonFormat => Setting::JsonFormat(self.parse_bool(raw)?),
        };
        Ok(setting)
    }

    fn invalid(&self, raw: &str) -> ClicodError {
        let value = if self.kind == OptionKind::Secret {
            mask_secret(raw)
        } else {
            raw.to_string()
        };
        ClicodError::InvalidValue {
            option: self.name.to_string(),
            value,
            expected: self.kind.expected().to_string(),
        }
    }

    fn parse_secret(&self, raw: &str) -> Result<String> {
        let value = raw.trim();
        if value.is_empty() {
            return Err(self.invalid(raw));
        }
        Ok(value.to_string())
    }

    fn parse_text(&self, raw: &str) -> Result<String> {
        let value = raw.trim();
        if value.is_empty() || value.chars().any(char::is_whitespace) {
            return Err(self.invalid(raw));
        }
        Ok(value.to_string())
    }

    fn parse_path(&self, raw: &str) -> Result<PathBuf> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(self.invalid(raw));
        }
        let expanded = PathBuf::from(shellexpand::tilde(trimmed).as_ref());
        if !expanded.is_dir() {
            return Err(self.invalid(raw));
        }
        fs::canonicalize(&expanded).map_err(|_| self.invalid(raw))
    }

    fn parse_bool(&self, raw: &str) -> Result<bool> {
        parse_bool(raw).ok_or_else(|| self.invalid(raw))
    }
}

/// Accepts the spellings users type for on/off switches.
pub fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "yes" | "on" | "1" => Some(true),
        "false" | "no" | "off" | "0" => Some(false),
        _ => None,
    }
}

// =============================================================================
// Store
// =============================================================================

/// Reads and writes the configuration file at a fixed path.
#[derive(Debug, Clone)]
pub struct ConfigStore {
    path: PathBuf,
}

impl ConfigStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store at `$CLICOD_CONFIG_DIR/config.json` or `~/.clicod/config.json`.
    pub fn open_default() -> Result<Self> {
        Ok(Self::new(Self::config_dir()?.join(CONFIG_FILE_NAME)))
    }

    pub fn config_dir() -> Result<PathBuf> {
        if let Ok(dir) = std::env::var(CONFIG_DIR_ENV) {
            if !dir.trim().is_empty() {
                return Ok(PathBuf::from(dir));
            }
        }
        let home = home_dir().ok_or(ClicodError::NoHomeDir)?;
        Ok(home.join(".clicod"))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Missing file means defaults; an unreadable one is an error and is left alone.
    pub fn load(&self) -> Result<Configuration> {
        let content = match fs::read(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No config file at {}, using defaults", self.path.display());
                return Ok(Configuration::default());
            }
            Err(e) => return Err(e.into()),
        };

        let config: Configuration =
            serde_json::from_slice(&content).map_err(|source| ClicodError::ConfigCorrupt {
                path: self.path.clone(),
                source,
            })?;
        debug!("Loaded config from: {}", self.path.display());
        Ok(config)
    }

    pub fn save(&self, config: &Configuration) -> Result<()> {
        let content = serde_json::to_string_pretty(config).map_err(|e| ClicodError::ConfigWrite {
            path: self.path.clone(),
            source: std::io::Error::other(e),
        })?;

        write_atomic(&self.path, content.as_bytes(), None).map_err(|source| {
            ClicodError::ConfigWrite {
                path: self.path.clone(),
                source,
            }
        })?;
        info!("Saved config to: {}", self.path.display());
        Ok(())
    }

    pub fn set(&self, key: &str, value: &str) -> Result<Configuration> {
        self.apply(&[(key.to_string(), value.to_string())])
    }

    /// Validates every pair, then persists them with a single write.
    pub fn apply(&self, updates: &[(String, String)]) -> Result<Configuration> {
        let settings = updates
            .iter()
            .map(|(key, value)| lookup_option(key)?.parse(value))
            .collect::<Result<Vec<_>>>()?;

        let mut config = self.load()?;
        for setting in settings {
            config.apply(setting);
        }
        self.save(&config)?;

        let names: Vec<&str> = updates.iter().map(|(k, _)| k.as_str()).collect();
        info!("Updated config options: {}", names.join(", "));
        Ok(config)
    }

    pub fn show(&self) -> Result<MaskedConfiguration> {
        Ok(self.load()?.masked(env_api_key()))
    }

    /// Rewrites the file with defaults. Works on a corrupt file too.
    pub fn reset(&self) -> Result<Configuration> {
        let config = Configuration::default();
        self.save(&config)?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn temp_store() -> (TempDir, ConfigStore) {
        let temp = TempDir::new().unwrap();
        let store = ConfigStore::new(temp.path().join("nested").join("config.json"));
        (temp, store)
    }

    #[test]
    fn test_load_missing_file_returns_defaults() {
        let (_temp, store) = temp_store();
        let config = store.load().unwrap();

        assert_eq!(config.gemini_api_key, None);
        assert_eq!(config.default_model, "gemini-2.5-flash");
        assert!(!config.auto_save);
        assert!(!config.streaming);
        assert!(!config.json_format);
        assert!(!store.path().exists());
    }

    #[test]
    fn test_load_malformed_file_is_corrupt_and_untouched() {
        let (_temp, store) = temp_store();
        fs::create_dir_all(store.path().parent().unwrap()).unwrap();
        fs::write(store.path(), "{ not json").unwrap();

        let err = store.load().unwrap_err();
        assert!(matches!(err, ClicodError::ConfigCorrupt { .. }));
        assert_eq!(fs::read_to_string(store.path()).unwrap(), "{ not json");
    }

    #[test]
    fn test_load_non_utf8_file_is_corrupt_and_untouched() {
        let (_temp, store) = temp_store();
        fs::create_dir_all(store.path().parent().unwrap()).unwrap();
        let bytes = [0xff, 0xfe, b'{', b'}'];
        fs::write(store.path(), bytes).unwrap();

        assert!(matches!(store.load(), Err(ClicodError::ConfigCorrupt { .. })));
        assert_eq!(fs::read(store.path()).unwrap(), bytes);
    }

    #[test]
    fn test_load_unreadable_path_is_error_not_defaults() {
        let (_temp, store) = temp_store();
        fs::create_dir_all(store.path()).unwrap();

        assert!(matches!(store.load(), Err(ClicodError::Io(_))));
    }

    #[test]
    fn test_load_empty_file_is_corrupt() {
        let (_temp, store) = temp_store();
        fs::create_dir_all(store.path().parent().unwrap()).unwrap();
        fs::write(store.path(), "").unwrap();

        assert!(matches!(store.load(), Err(ClicodError::ConfigCorrupt { .. })));
    }

    #[test]
    fn test_partial_file_falls_back_and_ignores_unknown_fields() {
        let (_temp, store) = temp_store();
        fs::create_dir_all(store.path().parent().unwrap()).unwrap();
        fs::write(
            store.path(),
            r#"{"streaming": true, "theme": "monokai", "gemini_api_key": "abc"}"#,
        )
        .unwrap();

        let config = store.load().unwrap();
        assert!(config.streaming);
        assert_eq!(config.gemini_api_key.as_deref(), Some("abc"));
        assert_eq!(config.default_model, DEFAULT_MODEL);
        assert!(!config.auto_save);
    }

    #[test]
    fn test_save_creates_parent_directories() {
        let (_temp, store) = temp_store();
        store.save(&Configuration::default()).unwrap();
        assert!(store.path().exists());

        let raw: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(store.path()).unwrap()).unwrap();
        let keys: Vec<&String> = raw.as_object().unwrap().keys().collect();
        assert_eq!(keys.len(), 6);
    }

    #[test]
    fn test_set_model_updates_only_that_field() {
        let (_temp, store) = temp_store();
        store.set("streaming", "on").unwrap();
        let before = store.load().unwrap();

        store.set("default_model", "gemini-2.5-pro").unwrap();
        let after = store.load().unwrap();

        assert_eq!(after.default_model, "gemini-2.5-pro");
        assert_eq!(after.streaming, before.streaming);
        assert_eq!(after.auto_save, before.auto_save);
        assert_eq!(after.save_location, before.save_location);
        assert_eq!(after.gemini_api_key, before.gemini_api_key);
    }

    #[test]
    fn test_set_then_load_scenario() {
        let (_temp, store) = temp_store();
        store.set("auto_save", "true").unwrap();

        let returned = store.set("default_model", "gemini-2.5-flash").unwrap();
        let loaded = store.load().unwrap();

        assert_eq!(loaded, returned);
        assert_eq!(loaded.default_model, "gemini-2.5-flash");
        assert!(loaded.auto_save);
    }

    #[test]
    fn test_set_every_bool_option() {
        let (_temp, store) = temp_store();
        store.set("auto_save", "YES").unwrap();
        store.set("streaming", "1").unwrap();
        store.set("json-format", "on").unwrap();

        let config = store.load().unwrap();
        assert!(config.auto_save);
        assert!(config.streaming);
        assert!(config.json_format);
    }

    #[test]
    fn test_set_invalid_bool_leaves_file_unchanged() {
        let (_temp, store) = temp_store();
        store.set("default_model", "gemini-2.5-pro").unwrap();
        let before = fs::read(store.path()).unwrap();

        let err = store.set("auto_save", "not-a-bool").unwrap_err();
        assert!(matches!(err, ClicodError::InvalidValue { .. }));
        assert_eq!(fs::read(store.path()).unwrap(), before);
    }

    #[test]
    fn test_set_unknown_key_never_writes() {
        let (_temp, store) = temp_store();

        let err = store.set("colour", "red").unwrap_err();
        assert!(matches!(err, ClicodError::UnknownOption { .. }));
        assert!(!store.path().exists());

        store.set("streaming", "true").unwrap();
        let before = store.load().unwrap();
        let raw_before = fs::read(store.path()).unwrap();
        assert!(store.set("theme", "dark").is_err());
        assert_eq!(store.load().unwrap(), before);
        assert_eq!(fs::read(store.path()).unwrap(), raw_before);
    }

    #[test]
    fn test_apply_is_all_or_nothing() {
        let (_temp, store) = temp_store();
        let updates = vec![
            ("default_model".to_string(), "gemini-2.5-pro".to_string()),
            ("streaming".to_string(), "sometimes".to_string()),
        ];

        assert!(store.apply(&updates).is_err());
        assert!(!store.path().exists());
    }

    #[test]
    fn test_set_save_location_requires_existing_directory() {
        let (temp, store) = temp_store();
        let target = temp.path().join("scripts");
        fs::create_dir_all(&target).unwrap();

        let config = store.set("save_location", target.to_str().unwrap()).unwrap();
        assert_eq!(config.save_location, fs::canonicalize(&target).unwrap());

        let missing = temp.path().join("missing");
        let err = store.set("save_location", missing.to_str().unwrap()).unwrap_err();
        assert!(matches!(err, ClicodError::InvalidValue { .. }));
        assert_eq!(store.load().unwrap().save_location, fs::canonicalize(&target).unwrap());
    }

    #[test]
    fn test_set_rejects_model_with_spaces_and_empty_key() {
        let (_temp, store) = temp_store();
        assert!(store.set("default_model", "gemini 2.5").is_err());
        assert!(store.set("gemini_api_key", "   ").is_err());
        assert!(!store.path().exists());
    }

    #[test]
    fn test_invalid_secret_is_masked_in_error() {
        let spec = lookup_option("gemini_api_key").unwrap();
        let err = spec.invalid("AIzaSySecretValue");
        assert!(!err.to_string().contains("AIzaSySecretValue"));
    }

    #[test]
    fn test_show_masks_stored_key() {
        let config = Configuration {
            gemini_api_key: Some("AIzaSyExampleKey1234".to_string()),
            ..Configuration::default()
        };

        let masked = config.masked(None);
        assert_eq!(masked.api_key.as_deref(), Some("****1234"));
        assert_eq!(masked.api_key_source, KeySource::Config);
        assert!(!format!("{:?}", masked).contains("AIzaSyExampleKey1234"));
    }

    #[test]
    fn test_show_masks_environment_key() {
        let masked = Configuration::default().masked(Some("env-secret-9876".to_string()));
        assert_eq!(masked.api_key.as_deref(), Some("****9876"));
        assert_eq!(masked.api_key_source, KeySource::Environment);
    }

    #[test]
    fn test_show_without_key() {
        let masked = Configuration::default().masked(None);
        assert_eq!(masked.api_key, None);
        assert_eq!(masked.api_key_source, KeySource::Unset);
    }

    #[test]
    fn test_mask_short_secret_fully() {
        assert_eq!(mask_secret("abcd"), "****");
        assert_eq!(mask_secret("abcde"), "****bcde");
    }

    #[test]
    fn test_effective_api_key_prefers_config() {
        let config = Configuration {
            gemini_api_key: Some("stored".to_string()),
            ..Configuration::default()
        };
        assert_eq!(
            config.effective_api_key(Some("env".to_string())).as_deref(),
            Some("stored")
        );
        assert_eq!(
            Configuration::default()
                .effective_api_key(Some("env".to_string()))
                .as_deref(),
            Some("env")
        );
        assert_eq!(Configuration::default().effective_api_key(None), None);
    }

    #[test]
    fn test_reset_overwrites_corrupt_file() {
        let (_temp, store) = temp_store();
        fs::create_dir_all(store.path().parent().unwrap()).unwrap();
        fs::write(store.path(), "garbage").unwrap();

        store.reset().unwrap();
        let config = store.load().unwrap();
        assert_eq!(config.default_model, DEFAULT_MODEL);
    }

    #[test]
    fn test_lookup_option_lists_valid_names() {
        let err = lookup_option("model").unwrap_err();
        let message = err.to_string();
        for name in option_names() {
            assert!(message.contains(name));
        }
    }

    #[test]
    fn test_parse_bool_spellings() {
        assert_eq!(parse_bool("On"), Some(true));
        assert_eq!(parse_bool(" no "), Some(false));
        assert_eq!(parse_bool("maybe"), None);
    }
}
