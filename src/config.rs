//! Configuration loader and validator for the carousel publisher.
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

use crate::model::CloudinarySettings;
use crate::publish::DEFAULT_PACING;
use crate::thumbnail::{DEFAULT_POLL_ATTEMPTS, DEFAULT_POLL_INTERVAL};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("YAML parse error: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("Invalid configuration: {0}")]
    Invalid(&'static str),
}

/// Root configuration struct mirroring the YAML schema exactly.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Config {
    pub app: App,
    pub graph: Graph,
    #[serde(default)]
    pub publish: Publish,
    pub cloudinary: Cloudinary,
}

/// App-level settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct App {
    /// JSON document holding linked accounts, Cloudinary settings and images.
    pub data_file: String,
}

/// Graph API connection settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Graph {
    pub base_url: String,
    pub request_timeout_secs: u64,
    pub connect_timeout_secs: u64,
}

/// Timing of the publish and thumbnail workflows.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Publish {
    /// Fixed wait between pages in one run.
    #[serde(default = "default_pacing_ms")]
    pub pacing_ms: u64,
    #[serde(default = "default_thumbnail_poll_ms")]
    pub thumbnail_poll_ms: u64,
    #[serde(default = "default_thumbnail_poll_attempts")]
    pub thumbnail_poll_attempts: u32,
}

impl Default for Publish {
    fn default() -> Self {
        Self {
            pacing_ms: default_pacing_ms(),
            thumbnail_poll_ms: default_thumbnail_poll_ms(),
            thumbnail_poll_attempts: default_thumbnail_poll_attempts(),
        }
    }
}

fn default_pacing_ms() -> u64 {
    DEFAULT_PACING.as_millis() as u64
}

fn default_thumbnail_poll_ms() -> u64 {
    DEFAULT_POLL_INTERVAL.as_millis() as u64
}

fn default_thumbnail_poll_attempts() -> u32 {
    DEFAULT_POLL_ATTEMPTS
}

/// Cloudinary-compatible upload service.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Cloudinary {
    pub api_base: String,
    #[serde(default)]
    pub cloud_name: Option<String>,
    #[serde(default)]
    pub preset: Option<String>,
}

impl Config {
    /// Ensure the parent directory of `app.data_file` exists.
    pub fn ensure_dirs(&self) -> Result<(), std::io::Error> {
        match Path::new(&self.app.data_file).parent() {
            Some(parent) if !parent.as_os_str().is_empty() => fs::create_dir_all(parent),
            _ => Ok(()),
        }
    }

    pub fn pacing(&self) -> Duration {
        Duration::from_millis(self.publish.pacing_ms)
    }

    pub fn thumbnail_poll(&self) -> Duration {
        Duration::from_millis(self.publish.thumbnail_poll_ms)
    }

    /// Upload settings from the file, overridden field by field by `stored`.
    pub fn cloudinary_settings(&self, stored: &CloudinarySettings) -> CloudinarySettings {
        let pick = |stored: &Option<String>, file: &Option<String>| {
            stored
                .clone()
                .filter(|v| !v.trim().is_empty())
                .or_else(|| file.clone().filter(|v| !v.trim().is_empty()))
        };
        CloudinarySettings {
            cloud_name: pick(&stored.cloud_name, &self.cloudinary.cloud_name),
            preset: pick(&stored.preset, &self.cloudinary.preset),
        }
    }
}

/// Load configuration from a YAML file and validate it.
/// - If `path` is None, uses `config.yaml` in the current working directory.
pub fn load(path: Option<&Path>) -> Result<Config, ConfigError> {
    let path = path.unwrap_or_else(|| Path::new("config.yaml"));
    let content = fs::read_to_string(path)?;
    let cfg: Config = serde_yaml::from_str(&content)?;
    validate(&cfg)?;
    Ok(cfg)
}

/// Validate a configuration instance.
fn validate(cfg: &Config) -> Result<(), ConfigError> {
    if cfg.app.data_file.trim().is_empty() {
        return Err(ConfigError::Invalid("app.data_file must be non-empty"));
    }

    if !cfg.graph.base_url.starts_with("http") {
        return Err(ConfigError::Invalid("graph.base_url must be an http(s) URL"));
    }
    if !cfg.graph.base_url.ends_with('/') {
        return Err(ConfigError::Invalid("graph.base_url must end with '/'"));
    }
    if cfg.graph.request_timeout_secs == 0 {
        return Err(ConfigError::Invalid("graph.request_timeout_secs must be > 0"));
    }
    if cfg.graph.connect_timeout_secs == 0 {
        return Err(ConfigError::Invalid("graph.connect_timeout_secs must be > 0"));
    }

    // pacing_ms may be 0 to disable the wait between pages
    if cfg.publish.thumbnail_poll_ms == 0 {
        return Err(ConfigError::Invalid("publish.thumbnail_poll_ms must be > 0"));
    }
    if cfg.publish.thumbnail_poll_attempts == 0 {
        return Err(ConfigError::Invalid("publish.thumbnail_poll_attempts must be > 0"));
    }

    if !cfg.cloudinary.api_base.starts_with("http") {
        return Err(ConfigError::Invalid("cloudinary.api_base must be an http(s) URL"));
    }

    Ok(())
}

/// Returns the example YAML content.
pub fn example() -> &'static str {
    r#"app:
  data_file: "./data/fb-carousel.json"

graph:
  base_url: "https://graph.facebook.com/v10.0/"
  request_timeout_secs: 30
  connect_timeout_secs: 10

publish:
  pacing_ms: 5000
  thumbnail_poll_ms: 9000
  thumbnail_poll_attempts: 20

cloudinary:
  api_base: "https://api.cloudinary.com/"
  cloud_name: "YOUR_CLOUD_NAME"
  preset: "YOUR_UNSIGNED_PRESET"
"#
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn parse_example_ok() {
        let cfg: Config = serde_yaml::from_str(example()).unwrap();
        validate(&cfg).unwrap();
        assert_eq!(cfg.pacing(), Duration::from_secs(5));
        assert_eq!(cfg.thumbnail_poll(), Duration::from_secs(9));
    }

    #[test]
    fn invalid_data_file() {
        let mut cfg: Config = serde_yaml::from_str(example()).unwrap();
        cfg.app.data_file = " ".into();
        let err = validate(&cfg).unwrap_err();
        match err {
            ConfigError::Invalid(msg) => assert!(msg.contains("app.data_file")),
            _ => panic!("wrong error"),
        }
    }

    #[test]
    fn invalid_graph_settings() {
        let mut cfg: Config = serde_yaml::from_str(example()).unwrap();
        cfg.graph.base_url = "https://graph.facebook.com/v10.0".into();
        let err = validate(&cfg).unwrap_err();
        match err {
            ConfigError::Invalid(msg) => assert!(msg.contains("end with")),
            _ => panic!("wrong error"),
        }

        let mut cfg: Config = serde_yaml::from_str(example()).unwrap();
        cfg.graph.request_timeout_secs = 0;
        assert!(matches!(validate(&cfg), Err(ConfigError::Invalid(_))));

        let mut cfg: Config = serde_yaml::from_str(example()).unwrap();
        cfg.graph.connect_timeout_secs = 0;
        assert!(matches!(validate(&cfg), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn zero_pacing_is_allowed() {
        let mut cfg: Config = serde_yaml::from_str(example()).unwrap();
        cfg.publish.pacing_ms = 0;
        validate(&cfg).unwrap();

        cfg.publish.thumbnail_poll_attempts = 0;
        assert!(matches!(validate(&cfg), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn stored_cloudinary_overrides_file() {
        let cfg: Config = serde_yaml::from_str(example()).unwrap();
        let stored = CloudinarySettings {
            cloud_name: Some("stored-cloud".into()),
            preset: Some("".into()),
        };
        let merged = cfg.cloudinary_settings(&stored);
        assert_eq!(merged.cloud_name.as_deref(), Some("stored-cloud"));
        assert_eq!(merged.preset.as_deref(), Some("YOUR_UNSIGNED_PRESET"));
    }

    #[test]
    fn ensure_dirs_creates_data_parent() {
        let td = tempdir().unwrap();
        let data_path = td.path().join("nested").join("data.json");
        let mut cfg: Config = serde_yaml::from_str(example()).unwrap();
        cfg.app.data_file = data_path.to_string_lossy().to_string();
        cfg.ensure_dirs().unwrap();
        assert!(td.path().join("nested").exists());
    }

    #[test]
    fn load_from_file_ok() {
        let td = tempdir().unwrap();
        let p = td.path().join("config.yaml");
        fs::write(&p, example()).unwrap();
        let cfg = load(Some(&p)).unwrap();
        assert_eq!(cfg.graph.base_url, "https://graph.facebook.com/v10.0/");
        assert_eq!(cfg.publish.thumbnail_poll_attempts, 20);
    }

    #[test]
    fn publish_timings_fall_back_to_defaults() {
        let yaml = r#"app:
  data_file: "./data/fb-carousel.json"
graph:
  base_url: "https://graph.facebook.com/v10.0/"
  request_timeout_secs: 30
  connect_timeout_secs: 10
publish:
  thumbnail_poll_attempts: 3
cloudinary:
  api_base: "https://api.cloudinary.com/"
"#;
        let td = tempdir().unwrap();
        let p = td.path().join("config.yaml");
        fs::write(&p, yaml).unwrap();

        let cfg = load(Some(&p)).unwrap();
        assert_eq!(cfg.pacing(), Duration::from_secs(5));
        assert_eq!(cfg.thumbnail_poll(), Duration::from_secs(9));
        assert_eq!(cfg.publish.thumbnail_poll_attempts, 3);
        assert_eq!(cfg.cloudinary.cloud_name, None);
    }

    #[test]
    fn missing_publish_section_uses_defaults() {
        let yaml = r#"app:
  data_file: "data.json"
graph:
  base_url: "https://graph.facebook.com/v10.0/"
  request_timeout_secs: 30
  connect_timeout_secs: 10
cloudinary:
  api_base: "https://api.cloudinary.com/"
"#;
        let cfg: Config = serde_yaml::from_str(yaml).unwrap();
        validate(&cfg).unwrap();
        assert_eq!(cfg.publish, Publish::default());
        assert_eq!(cfg.publish.pacing_ms, 5000);
        assert_eq!(cfg.publish.thumbnail_poll_attempts, 20);
    }
}
