//! fsmlab configuration.
//!
//! Configuration is loaded in the following order (later overrides earlier):
//! 1. Default values
//! 2. YAML config file (if specified via FSMLAB_CONFIG or --config)
//! 3. Environment variables

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// fsmlab configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Output configuration.
    pub output: OutputConfig,
    /// Definition file acceptance rules.
    pub upload: UploadConfig,
    /// REPL configuration.
    pub repl: ReplConfig,
}

impl Config {
    /// Loads configuration from `path` (if given), then applies environment overrides.
    pub fn load_from(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };

        config.apply_env_overrides();
        config.validate()?;

        Ok(config)
    }

    /// Loads configuration from a YAML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::IoError(path.to_path_buf(), e))?;
        let config: Config = serde_yaml::from_str(&content)
            .map_err(|e| ConfigError::ParseError(path.to_path_buf(), e.to_string()))?;
        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Applies overrides from `lookup`, keyed by environment variable name.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        self.output.apply_overrides(&lookup);
        self.upload.apply_overrides(&lookup);
        self.repl.apply_overrides(&lookup);
    }

    /// Validates the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.upload.validate()
    }

    /// Saves configuration to a YAML file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();
        std::fs::write(path, self.to_yaml()?)
            .map_err(|e| ConfigError::IoError(path.to_path_buf(), e))?;
        Ok(())
    }

    /// Renders the configuration as YAML.
    pub fn to_yaml(&self) -> Result<String, ConfigError> {
        serde_yaml::to_string(self).map_err(|e| ConfigError::SerializeError(e.to_string()))
    }
}

fn parse_bool(value: &str) -> bool {
    value == "1" || value.eq_ignore_ascii_case("true")
}

/// Output format for one-shot commands.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum OutputFormat {
    /// Human-readable tables.
    #[default]
    Text,
    /// Pretty JSON (JSON lines for batches).
    Json,
}

/// Output configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub format: OutputFormat,
    /// Colorize text output.
    pub color: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            format: OutputFormat::Text,
            color: true,
        }
    }
}

impl OutputConfig {
    fn apply_overrides(&mut self, lookup: &impl Fn(&str) -> Option<String>) {
        if let Some(format) = lookup("FSMLAB_OUTPUT_FORMAT") {
            match format.to_lowercase().as_str() {
                "text" => self.format = OutputFormat::Text,
                "json" => self.format = OutputFormat::Json,
                other => tracing::warn!("Ignoring unknown FSMLAB_OUTPUT_FORMAT '{}'", other),
            }
        }

        if let Some(color) = lookup("FSMLAB_COLOR") {
            self.color = parse_bool(&color);
        }
    }
}

/// Rules a definition file must pass before it is parsed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UploadConfig {
    /// Accepted file extensions without the dot. Empty accepts any file.
    pub allowed_extensions: Vec<String>,
    /// Maximum file size in bytes (0 = unlimited).
    pub max_bytes: u64,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            allowed_extensions: vec!["txt".to_string(), "fsm".to_string()],
            max_bytes: 1024 * 1024,
        }
    }
}

impl UploadConfig {
    fn apply_overrides(&mut self, lookup: &impl Fn(&str) -> Option<String>) {
        if let Some(list) = lookup("FSMLAB_ALLOWED_EXTENSIONS") {
            self.allowed_extensions = list
                .split(',')
                .map(|ext| ext.trim().to_lowercase())
                .filter(|ext| !ext.is_empty())
                .collect();
        }

        if let Some(max) = lookup("FSMLAB_MAX_BYTES") {
            if let Ok(n) = max.parse() {
                self.max_bytes = n;
            }
        }
    }

    /// Returns whether `path` has an accepted extension.
    pub fn allows(&self, path: &Path) -> bool {
        if self.allowed_extensions.is_empty() {
            return true;
        }
        let Some(ext) = path.extension().and_then(|e| e.to_str()) else {
            return false;
        };
        self.allowed_extensions
            .iter()
            .any(|allowed| allowed.eq_ignore_ascii_case(ext))
    }

    /// Returns whether a file of `size` bytes is too large.
    pub fn exceeds_limit(&self, size: u64) -> bool {
        self.max_bytes > 0 && size > self.max_bytes
    }

    /// Validates the extension list.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for ext in &self.allowed_extensions {
            if ext.is_empty() {
                return Err(ConfigError::ValidationError(
                    "allowed_extensions contains an empty entry".to_string(),
                ));
            }
            if ext.contains('.') {
                return Err(ConfigError::ValidationError(format!(
                    "allowed extension '{}' must not contain '.'",
                    ext
                )));
            }
        }
        Ok(())
    }
}

/// REPL configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReplConfig {
    /// History file. Defaults to `~/.fsmlab_history`.
    pub history_file: Option<PathBuf>,
}

impl ReplConfig {
    fn apply_overrides(&mut self, lookup: &impl Fn(&str) -> Option<String>) {
        if let Some(path) = lookup("FSMLAB_HISTORY_FILE") {
            self.history_file = Some(PathBuf::from(path));
        }
    }

    /// Returns the history file to use.
    pub fn history_path(&self) -> PathBuf {
        self.history_file.clone().unwrap_or_else(|| {
            home::home_dir()
                .map(|home| home.join(".fsmlab_history"))
                .unwrap_or_else(|| PathBuf::from(".fsmlab_history"))
        })
    }
}

/// Configuration error.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file '{}': {}", .0.display(), .1)]
    IoError(PathBuf, #[source] std::io::Error),

    #[error("failed to parse config file '{}': {}", .0.display(), .1)]
    ParseError(PathBuf, String),

    #[error("failed to serialize config: {0}")]
    SerializeError(String),

    #[error("configuration validation failed: {0}")]
    ValidationError(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.output.format, OutputFormat::Text);
        assert!(config.output.color);
        assert_eq!(config.upload.allowed_extensions, vec!["txt", "fsm"]);
        assert_eq!(config.upload.max_bytes, 1024 * 1024);
        assert!(config.repl.history_file.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_yaml_roundtrip() {
        let mut config = Config::default();
        config.output.format = OutputFormat::Json;
        config.repl.history_file = Some(PathBuf::from("/tmp/history"));

        let yaml = serde_yaml::to_string(&config).unwrap();
        let parsed: Config = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_partial_yaml_uses_defaults() {
        let parsed: Config = serde_yaml::from_str("output:\n  format: json\n").unwrap();
        assert_eq!(parsed.output.format, OutputFormat::Json);
        assert!(parsed.output.color);
        assert_eq!(parsed.upload, UploadConfig::default());
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fsmlab.yaml");

        let mut config = Config::default();
        config.upload.max_bytes = 4096;
        config.save(&path).unwrap();

        assert_eq!(Config::from_file(&path).unwrap(), config);
    }

    #[test]
    fn test_missing_file() {
        let err = Config::from_file("/nonexistent/fsmlab.yaml").unwrap_err();
        assert!(matches!(err, ConfigError::IoError(..)));
        assert!(err.to_string().contains("/nonexistent/fsmlab.yaml"));
    }

    #[test]
    fn test_invalid_yaml() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        std::io::Write::write_all(&mut file, b"output: [unclosed").unwrap();
        let err = Config::from_file(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::ParseError(..)));
    }

    #[test]
    fn test_overrides() {
        let mut config = Config::default();
        config.apply_overrides(lookup(&[
            ("FSMLAB_OUTPUT_FORMAT", "JSON"),
            ("FSMLAB_COLOR", "false"),
            ("FSMLAB_ALLOWED_EXTENSIONS", "fsm, TXT ,,dfa"),
            ("FSMLAB_MAX_BYTES", "0"),
            ("FSMLAB_HISTORY_FILE", "/tmp/h"),
        ]));

        assert_eq!(config.output.format, OutputFormat::Json);
        assert!(!config.output.color);
        assert_eq!(config.upload.allowed_extensions, vec!["fsm", "txt", "dfa"]);
        assert_eq!(config.upload.max_bytes, 0);
        assert_eq!(config.repl.history_path(), PathBuf::from("/tmp/h"));
    }

    #[test]
    fn test_bad_overrides_ignored() {
        let mut config = Config::default();
        config.apply_overrides(lookup(&[
            ("FSMLAB_OUTPUT_FORMAT", "xml"),
            ("FSMLAB_MAX_BYTES", "lots"),
        ]));
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_validate_extensions() {
        let mut upload = UploadConfig {
            allowed_extensions: vec![".fsm".to_string()],
            ..Default::default()
        };
        assert!(matches!(
            upload.validate(),
            Err(ConfigError::ValidationError(_))
        ));

        upload.allowed_extensions = vec![String::new()];
        assert!(upload.validate().is_err());
    }

    #[test]
    fn test_upload_rules() {
        let upload = UploadConfig::default();
        assert!(upload.allows(Path::new("divby4.fsm")));
        assert!(upload.allows(Path::new("models/DIVBY4.TXT")));
        assert!(!upload.allows(Path::new("divby4.json")));
        assert!(!upload.allows(Path::new("divby4")));

        let any = UploadConfig {
            allowed_extensions: Vec::new(),
            max_bytes: 0,
        };
        assert!(any.allows(Path::new("divby4")));
        assert!(!any.exceeds_limit(u64::MAX));
        assert!(upload.exceeds_limit(1024 * 1024 + 1));
        assert!(!upload.exceeds_limit(1024 * 1024));
    }
}
