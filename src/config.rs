use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::AppError;
use crate::triage::Pacing;

pub const DEFAULT_API_URL: &str = "http://localhost:8000";

/// Matches the timeout of the web portal's HTTP client.
const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 10;

const ENV_API_URL: &str = "CAREBRIDGE_API_URL";
const ENV_DATA_DIR: &str = "CAREBRIDGE_DATA_DIR";
const ENV_TICKET_DIR: &str = "CAREBRIDGE_TICKET_DIR";
const ENV_HTTP_TIMEOUT: &str = "CAREBRIDGE_HTTP_TIMEOUT_SECS";
const ENV_PACING: &str = "CAREBRIDGE_PACING";

/// Resolved runtime configuration.
///
/// Precedence, lowest first: built-in defaults, TOML file, `.env`, process
/// environment, command-line flags (applied by the caller).
#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    /// Origin of the CareBridge API, without the `/api/v1` prefix.
    pub api_base_url: String,
    pub http_timeout_secs: u64,
    /// Holds the SQLite store, logs and crash reports.
    pub data_dir: PathBuf,
    /// Where appointment tickets are written.
    pub ticket_dir: PathBuf,
    pub pacing: Pacing,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileConfig {
    api_base_url: Option<String>,
    http_timeout_secs: Option<u64>,
    data_dir: Option<PathBuf>,
    ticket_dir: Option<PathBuf>,
    pacing: Option<Pacing>,
}

impl Default for AppConfig {
    fn default() -> Self {
        let data_dir = dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("carebridge");
        let ticket_dir = dirs::download_dir().unwrap_or_else(|| data_dir.join("tickets"));
        Self {
            api_base_url: DEFAULT_API_URL.to_string(),
            http_timeout_secs: DEFAULT_HTTP_TIMEOUT_SECS,
            data_dir,
            ticket_dir,
            pacing: Pacing::Typed,
        }
    }
}

/// `<config_dir>/carebridge/config.toml`, when the platform has a config dir.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("carebridge").join("config.toml"))
}

impl AppConfig {
    /// Load configuration from an explicit file (which must exist) or the
    /// default location (which may be absent), then the environment.
    pub fn load(explicit: Option<&Path>) -> Result<Self, AppError> {
        let mut config = Self::default();

        match explicit {
            Some(path) => {
                let raw = std::fs::read_to_string(path).map_err(|e| {
                    AppError::Config(format!("cannot read {}: {e}", path.display()))
                })?;
                config.merge_toml(&raw)?;
            }
            None => {
                if let Some(path) = default_config_path().filter(|p| p.exists()) {
                    let raw = std::fs::read_to_string(&path)?;
                    config.merge_toml(&raw)?;
                    tracing::debug!(path = %path.display(), "Loaded config file");
                }
            }
        }

        // A missing .env file is the normal case.
        let _ = dotenvy::dotenv();
        config.apply_env(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Overlay values from a TOML document.
    pub fn merge_toml(&mut self, raw: &str) -> Result<(), AppError> {
        let file: FileConfig = toml::from_str(raw)?;
        if let Some(url) = file.api_base_url {
            self.api_base_url = url;
        }
        if let Some(secs) = file.http_timeout_secs {
            self.http_timeout_secs = secs;
        }
        if let Some(dir) = file.data_dir {
            self.data_dir = dir;
        }
        if let Some(dir) = file.ticket_dir {
            self.ticket_dir = dir;
        }
        if let Some(pacing) = file.pacing {
            self.pacing = pacing;
        }
        Ok(())
    }

    /// Overlay values from environment-style lookups.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), AppError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup(ENV_API_URL) {
            self.api_base_url = url;
        }
        if let Some(dir) = lookup(ENV_DATA_DIR) {
            self.data_dir = PathBuf::from(dir);
        }
        if let Some(dir) = lookup(ENV_TICKET_DIR) {
            self.ticket_dir = PathBuf::from(dir);
        }
        if let Some(raw) = lookup(ENV_HTTP_TIMEOUT) {
            self.http_timeout_secs = raw.trim().parse().map_err(|_| {
                AppError::Config(format!("{ENV_HTTP_TIMEOUT} must be a number of seconds, got {raw:?}"))
            })?;
        }
        if let Some(raw) = lookup(ENV_PACING) {
            self.pacing = raw.parse()?;
        }
        Ok(())
    }

    /// Check invariants and normalize the base URL.
    pub fn validate(&mut self) -> Result<(), AppError> {
        let trimmed = self.api_base_url.trim().trim_end_matches('/').to_string();
        let parsed = url::Url::parse(&trimmed)
            .map_err(|e| AppError::Config(format!("invalid API URL {trimmed:?}: {e}")))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(AppError::Config(format!(
                "API URL must use http or https, got {}",
                parsed.scheme()
            )));
        }
        if self.http_timeout_secs == 0 {
            return Err(AppError::Config("HTTP timeout must be at least one second".into()));
        }
        self.api_base_url = trimmed;
        Ok(())
    }

    pub fn log_dir(&self) -> PathBuf {
        self.data_dir.join("logs")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn base() -> AppConfig {
        AppConfig {
            api_base_url: DEFAULT_API_URL.into(),
            http_timeout_secs: 10,
            data_dir: PathBuf::from("/tmp/cb"),
            ticket_dir: PathBuf::from("/tmp/cb/tickets"),
            pacing: Pacing::Typed,
        }
    }

    #[test]
    fn test_merge_toml_overrides_only_present_keys() {
        let mut config = base();
        config
            .merge_toml("api_base_url = \"https://api.carebridge.test\"\npacing = \"instant\"\n")
            .unwrap();
        assert_eq!(config.api_base_url, "https://api.carebridge.test");
        assert_eq!(config.pacing, Pacing::Instant);
        assert_eq!(config.http_timeout_secs, 10);
    }

    #[test]
    fn test_merge_toml_rejects_unknown_keys() {
        let mut config = base();
        let err = config.merge_toml("api_url = \"x\"").unwrap_err();
        assert!(matches!(err, AppError::Config(_)));
    }

    #[test]
    fn test_env_overrides_file() {
        let mut config = base();
        config.merge_toml("http_timeout_secs = 30").unwrap();
        let env: HashMap<&str, &str> = [
            ("CAREBRIDGE_HTTP_TIMEOUT_SECS", "5"),
            ("CAREBRIDGE_TICKET_DIR", "/srv/tickets"),
        ]
        .into_iter()
        .collect();
        config
            .apply_env(|k| env.get(k).map(|v| v.to_string()))
            .unwrap();
        assert_eq!(config.http_timeout_secs, 5);
        assert_eq!(config.ticket_dir, PathBuf::from("/srv/tickets"));
    }

    #[test]
    fn test_env_rejects_bad_timeout() {
        let mut config = base();
        let err = config
            .apply_env(|k| (k == "CAREBRIDGE_HTTP_TIMEOUT_SECS").then(|| "soon".to_string()))
            .unwrap_err();
        assert!(matches!(err, AppError::Config(_)));
    }

    #[test]
    fn test_validate_trims_trailing_slash() {
        let mut config = base();
        config.api_base_url = "http://localhost:8000/".into();
        config.validate().unwrap();
        assert_eq!(config.api_base_url, "http://localhost:8000");
    }

    #[test]
    fn test_validate_rejects_non_http_scheme() {
        let mut config = base();
        config.api_base_url = "ftp://example.com".into();
        assert!(config.validate().is_err());
        config.api_base_url = "not a url".into();
        assert!(config.validate().is_err());
    }
}
