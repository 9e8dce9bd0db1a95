//! `incident-nav.ron` configuration, overridable from the command line.
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use navigator_core::DEFAULT_CONTEXT_BUDGET;
use navigator_engine::{ApiSettings, StreamSettings, DEFAULT_COMPLETION_PATH};
use navigator_logging::{nav_debug, nav_info};
use serde::{Deserialize, Serialize};

pub const CONFIG_FILENAME: &str = "incident-nav.ron";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub base_url: String,
    pub completion_path: String,
    /// System prompt sent with every completion request.
    pub prompt: String,
    pub temperature: f32,
    pub max_context_tokens: u32,
    /// Industries the assistant restricts its ticket search to; empty means all.
    pub industries: Vec<String>,
    pub connect_timeout_secs: u64,
    pub request_timeout_secs: u64,
    pub stream_timeout_secs: u64,
    pub max_bytes: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:5000/".to_string(),
            completion_path: DEFAULT_COMPLETION_PATH.to_string(),
            prompt: String::new(),
            temperature: 1.0,
            max_context_tokens: DEFAULT_CONTEXT_BUDGET,
            industries: Vec::new(),
            connect_timeout_secs: 10,
            request_timeout_secs: 30,
            stream_timeout_secs: 300,
            max_bytes: 8 * 1024 * 1024,
        }
    }
}

/// Values given on the command line; `None` keeps the file's value.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub base_url: Option<String>,
    pub prompt: Option<String>,
    pub temperature: Option<f32>,
    pub industries: Vec<String>,
}

impl AppConfig {
    /// Reads the file at `path`. A missing file yields the defaults.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = match fs::read_to_string(path) {
            Ok(text) => text,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                nav_debug!("No config at {:?}, using defaults", path);
                return Ok(Self::default());
            }
            Err(err) => {
                return Err(err).with_context(|| format!("failed to read config {path:?}"));
            }
        };
        let config: AppConfig =
            ron::from_str(&content).with_context(|| format!("failed to parse config {path:?}"))?;
        nav_info!("Loaded config from {:?}", path);
        Ok(config)
    }

    pub fn apply(mut self, overrides: ConfigOverrides) -> anyhow::Result<Self> {
        if let Some(base_url) = overrides.base_url {
            self.base_url = base_url;
        }
        if let Some(prompt) = overrides.prompt {
            self.prompt = prompt;
        }
        if let Some(temperature) = overrides.temperature {
            self.temperature = temperature;
        }
        if !overrides.industries.is_empty() {
            self.industries = overrides.industries;
        }
        self.validate()?;
        Ok(self)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(!self.base_url.trim().is_empty(), "base_url must not be empty");
        anyhow::ensure!(
            (0.0..=2.0).contains(&self.temperature),
            "temperature must be between 0 and 2, got {}",
            self.temperature
        );
        anyhow::ensure!(self.max_bytes > 0, "max_bytes must be positive");
        Ok(())
    }

    pub fn api_settings(&self) -> ApiSettings {
        ApiSettings {
            base_url: self.base_url.clone(),
            connect_timeout: Duration::from_secs(self.connect_timeout_secs),
            request_timeout: Duration::from_secs(self.request_timeout_secs),
        }
    }

    pub fn stream_settings(&self) -> StreamSettings {
        StreamSettings {
            base_url: self.base_url.clone(),
            completion_path: self.completion_path.clone(),
            connect_timeout: Duration::from_secs(self.connect_timeout_secs),
            request_timeout: Duration::from_secs(self.stream_timeout_secs),
            max_bytes: self.max_bytes,
        }
    }
}

/// `--config` wins; otherwise the file in the state directory.
pub fn config_path(explicit: Option<&Path>, state_dir: &Path) -> PathBuf {
    explicit
        .map(Path::to_path_buf)
        .unwrap_or_else(|| state_dir.join(CONFIG_FILENAME))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    #[test]
    fn missing_file_gives_defaults() {
        let temp = TempDir::new().unwrap();
        let config = AppConfig::load(&temp.path().join(CONFIG_FILENAME)).unwrap();
        assert_eq!(config, AppConfig::default());
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join(CONFIG_FILENAME);
        fs::write(
            &path,
            r#"(base_url: "https://nav.example.com/api/", industries: ["Chemicals"])"#,
        )
        .unwrap();

        let config = AppConfig::load(&path).unwrap();
        assert_eq!(config.base_url, "https://nav.example.com/api/");
        assert_eq!(config.industries, vec!["Chemicals".to_string()]);
        assert_eq!(config.max_context_tokens, DEFAULT_CONTEXT_BUDGET);
        assert_eq!(config.completion_path, DEFAULT_COMPLETION_PATH);
    }

    #[test]
    fn broken_file_is_an_error() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join(CONFIG_FILENAME);
        fs::write(&path, "(base_url: ").unwrap();
        assert!(AppConfig::load(&path).is_err());
    }

    #[test]
    fn overrides_replace_file_values() {
        let config = AppConfig::default()
            .apply(ConfigOverrides {
                base_url: Some("http://10.0.0.5:5000".to_string()),
                temperature: Some(0.3),
                ..ConfigOverrides::default()
            })
            .unwrap();
        assert_eq!(config.base_url, "http://10.0.0.5:5000");
        assert_eq!(config.temperature, 0.3);
        assert_eq!(config.stream_settings().request_timeout, Duration::from_secs(300));
    }

    #[test]
    fn out_of_range_temperature_is_rejected() {
        let result = AppConfig::default().apply(ConfigOverrides {
            temperature: Some(7.0),
            ..ConfigOverrides::default()
        });
        assert!(result.is_err());
    }

    #[test]
    fn explicit_config_path_wins() {
        let state = Path::new("/var/lib/nav");
        assert_eq!(config_path(None, state), state.join(CONFIG_FILENAME));
        assert_eq!(
            config_path(Some(Path::new("/etc/nav.ron")), state),
            PathBuf::from("/etc/nav.ron")
        );
    }
}
