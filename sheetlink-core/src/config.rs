use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::ConfigError;

/// Name of the config file picked up from the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "sheetlink.toml";

/// Top-level sheetlink configuration, matching `sheetlink.toml`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SheetlinkConfig {
    #[serde(default)]
    pub server: ServerSection,
    #[serde(default)]
    pub upload: UploadSection,
    #[serde(default)]
    pub monitor: MonitorSection,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSection {
    pub api_base_url: String,
    pub ws_base_url: String,
    pub request_timeout_ms: u64,
    pub upload_timeout_ms: u64,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            api_base_url: "http://localhost:8000".to_string(),
            ws_base_url: "ws://localhost:8000".to_string(),
            request_timeout_ms: 120_000,
            upload_timeout_ms: 300_000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UploadSection {
    pub max_file_size: u64,
    pub max_files: usize,
    pub allowed_extensions: Vec<String>,
}

impl Default for UploadSection {
    fn default() -> Self {
        Self {
            max_file_size: 100 * 1024 * 1024,
            max_files: 5,
            allowed_extensions: vec![
                ".xlsx".into(),
                ".xls".into(),
                ".xlsm".into(),
                ".csv".into(),
            ],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorSection {
    pub poll_interval_ms: u64,
}

impl Default for MonitorSection {
    fn default() -> Self {
        Self {
            poll_interval_ms: 3000,
        }
    }
}

impl SheetlinkConfig {
    /// Parse a TOML document. Missing sections and keys take their defaults.
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        toml::from_str(s).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Load from an explicit path, or from `sheetlink.toml` in the working
    /// directory when present, falling back to defaults.
    ///
    /// An explicit path that does not exist is an error; a missing implicit
    /// file is not.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(p) => {
                if !p.exists() {
                    return Err(ConfigError::NotFound(p.display().to_string()));
                }
                Self::read_file(p)
            }
            None => {
                let implicit = Path::new(DEFAULT_CONFIG_FILE);
                if implicit.exists() {
                    Self::read_file(implicit)
                } else {
                    Ok(Self::default())
                }
            }
        }
    }

    fn read_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::NotFound(format!("{}: {e}", path.display())))?;
        debug!(path = %path.display(), "Loaded config file");
        Self::from_toml_str(&text)
    }

    /// Overlay `SHEETLINK_*` variables using the given lookup.
    ///
    /// The lookup is injected so callers and tests control the source;
    /// the CLI passes `|k| std::env::var(k).ok()`.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("SHEETLINK_API_BASE_URL") {
            self.server.api_base_url = v;
        }
        if let Some(v) = lookup("SHEETLINK_WS_BASE_URL") {
            self.server.ws_base_url = v;
        }
        if let Some(v) = lookup("SHEETLINK_POLL_INTERVAL_MS") {
            self.monitor.poll_interval_ms = parse_env("SHEETLINK_POLL_INTERVAL_MS", &v)?;
        }
        if let Some(v) = lookup("SHEETLINK_MAX_FILE_SIZE") {
            self.upload.max_file_size = parse_env("SHEETLINK_MAX_FILE_SIZE", &v)?;
        }
        if let Some(v) = lookup("SHEETLINK_MAX_FILES") {
            self.upload.max_files = parse_env("SHEETLINK_MAX_FILES", &v)?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        check_scheme("server.api_base_url", &self.server.api_base_url, &["http", "https"])?;
        check_scheme("server.ws_base_url", &self.server.ws_base_url, &["ws", "wss"])?;
        if self.server.request_timeout_ms == 0 || self.server.upload_timeout_ms == 0 {
            return Err(ConfigError::Invalid("timeouts must be greater than zero".into()));
        }
        if self.monitor.poll_interval_ms == 0 {
            return Err(ConfigError::Invalid(
                "monitor.poll_interval_ms must be greater than zero".into(),
            ));
        }
        if self.upload.max_file_size == 0 || self.upload.max_files == 0 {
            return Err(ConfigError::Invalid("upload limits must be greater than zero".into()));
        }
        if self.upload.allowed_extensions.is_empty() {
            return Err(ConfigError::Invalid(
                "upload.allowed_extensions must not be empty".into(),
            ));
        }
        Ok(())
    }

    /// REST root, `{api_base_url}/api/v1`.
    pub fn api_root(&self) -> String {
        format!("{}/api/v1", self.server.api_base_url.trim_end_matches('/'))
    }

    /// WebSocket endpoint for one job.
    pub fn job_socket_url(&self, job_id: &str) -> String {
        format!(
            "{}/api/v1/jobs/{job_id}/ws",
            self.server.ws_base_url.trim_end_matches('/')
        )
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.monitor.poll_interval_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.server.request_timeout_ms)
    }

    pub fn upload_timeout(&self) -> Duration {
        Duration::from_millis(self.server.upload_timeout_ms)
    }
}

fn parse_env<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::Invalid(format!("{key}: cannot parse {value:?}")))
}

fn check_scheme(field: &str, value: &str, schemes: &[&str]) -> Result<(), ConfigError> {
    let parsed =
        url::Url::parse(value).map_err(|e| ConfigError::Invalid(format!("{field}: {e}")))?;
    if schemes.contains(&parsed.scheme()) {
        Ok(())
    } else {
        Err(ConfigError::Invalid(format!(
            "{field}: scheme must be one of {}, got {:?}",
            schemes.join("/"),
            parsed.scheme()
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn defaults_match_documented_values() {
        let config = SheetlinkConfig::default();
        assert_eq!(config.server.api_base_url, "http://localhost:8000");
        assert_eq!(config.server.ws_base_url, "ws://localhost:8000");
        assert_eq!(config.upload.max_file_size, 104_857_600);
        assert_eq!(config.upload.max_files, 5);
        assert_eq!(config.upload.allowed_extensions.len(), 4);
        assert_eq!(config.poll_interval(), Duration::from_secs(3));
        assert_eq!(config.upload_timeout(), Duration::from_secs(300));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let config = SheetlinkConfig::from_toml_str(
            "[server]\napi_base_url = \"https://analysis.example.com\"\n\n[monitor]\npoll_interval_ms = 500\n",
        )
        .unwrap();
        assert_eq!(config.server.api_base_url, "https://analysis.example.com");
        assert_eq!(config.server.ws_base_url, "ws://localhost:8000");
        assert_eq!(config.monitor.poll_interval_ms, 500);
        assert_eq!(config.upload.max_files, 5);
    }

    #[test]
    fn bad_toml_is_parse_error() {
        let err = SheetlinkConfig::from_toml_str("[server\n").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn env_overrides_file_values() {
        let env: HashMap<&str, &str> = [
            ("SHEETLINK_API_BASE_URL", "http://10.0.0.2:9000"),
            ("SHEETLINK_POLL_INTERVAL_MS", "250"),
            ("SHEETLINK_MAX_FILES", "8"),
        ]
        .into_iter()
        .collect();
        let mut config = SheetlinkConfig::default();
        config
            .apply_env(|k| env.get(k).map(|v| (*v).to_string()))
            .unwrap();
        assert_eq!(config.server.api_base_url, "http://10.0.0.2:9000");
        assert_eq!(config.monitor.poll_interval_ms, 250);
        assert_eq!(config.upload.max_files, 8);
        assert_eq!(config.upload.max_file_size, 104_857_600);
    }

    #[test]
    fn unparseable_env_value_is_invalid() {
        let mut config = SheetlinkConfig::default();
        let err = config
            .apply_env(|k| (k == "SHEETLINK_MAX_FILE_SIZE").then(|| "lots".to_string()))
            .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn validate_rejects_bad_values() {
        let mut config = SheetlinkConfig::default();
        config.monitor.poll_interval_ms = 0;
        assert!(config.validate().is_err());

        let mut config = SheetlinkConfig::default();
        config.server.ws_base_url = "http://localhost:8000".into();
        assert!(config.validate().is_err());

        let mut config = SheetlinkConfig::default();
        config.server.api_base_url = "localhost:8000/api".into();
        assert!(config.validate().is_err());

        let mut config = SheetlinkConfig::default();
        config.upload.allowed_extensions.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn urls_are_joined_without_double_slash() {
        let mut config = SheetlinkConfig::default();
        config.server.api_base_url = "http://host:1/".into();
        config.server.ws_base_url = "wss://host:1/".into();
        assert_eq!(config.api_root(), "http://host:1/api/v1");
        assert_eq!(config.job_socket_url("j1"), "wss://host:1/api/v1/jobs/j1/ws");
    }

    #[test]
    fn load_explicit_missing_path_fails() {
        let dir = tempfile::tempdir().unwrap();
        let err = SheetlinkConfig::load(Some(&dir.path().join("nope.toml"))).unwrap_err();
        assert!(matches!(err, ConfigError::NotFound(_)));
    }

    #[test]
    fn load_explicit_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sheetlink.toml");
        std::fs::write(&path, "[upload]\nmax_files = 2\n").unwrap();
        let config = SheetlinkConfig::load(Some(&path)).unwrap();
        assert_eq!(config.upload.max_files, 2);
    }
}
