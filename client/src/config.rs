//! Layered client configuration.
//!
//! Three layers with precedence (later overrides earlier):
//! 1. Hardcoded defaults (`http://127.0.0.1:8000`, 30 s request timeout,
//!    5 s poll interval)
//! 2. File config from `{AUTOQA_HOME | ~/.autoqa}/config.toml`
//! 3. `AUTOQA_*` environment overrides

use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;
use url::Url;

/// Default backend base URL (the dev backend the dashboards point at).
pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:8000";

/// Default per-request timeout in milliseconds.
pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 30_000;

/// Default polling cadence in milliseconds.
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 5_000;

/// Errors that can occur during configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error loading config: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("invalid value for {source_name}: '{value}' ({expected})")]
    InvalidValue {
        /// Field or environment variable the bad value came from.
        source_name: String,
        value: String,
        expected: String,
    },

    #[error("cannot determine home directory")]
    NoHomeDir,
}

/// Resolved client configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Backend base URL, stored without a trailing slash.
    pub base_url: Url,
    /// Timeout applied to every HTTP request.
    pub request_timeout: Duration,
    /// Cadence of the sync engine's polling timer.
    pub poll_interval: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            // Infallible: the literal is a valid absolute URL.
            #[expect(clippy::unwrap_used)]
            base_url: Url::parse(DEFAULT_BASE_URL).unwrap(),
            request_timeout: Duration::from_millis(DEFAULT_REQUEST_TIMEOUT_MS),
            poll_interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
        }
    }
}

impl ClientConfig {
    /// Base URL rendered without a trailing slash, ready for `{base}{path}`
    /// concatenation.
    pub fn base(&self) -> &str {
        self.base_url.as_str().trim_end_matches('/')
    }

    /// Replace the base URL, validating it parses as an absolute URL.
    pub fn with_base_url(mut self, value: &str) -> Result<Self, ConfigError> {
        self.base_url = parse_base_url("base_url", value)?;
        Ok(self)
    }
}

/// File layer, deserialized from `config.toml`. All fields optional.
#[derive(Debug, Default, Deserialize)]
struct FileConfig {
    base_url: Option<String>,
    request_timeout_ms: Option<u64>,
    poll_interval_ms: Option<u64>,
}

/// Builder for layered configuration loading.
///
/// By default all layers are enabled and the home directory is resolved
/// from `$AUTOQA_HOME`, falling back to `~/.autoqa`.
pub struct ConfigLoader {
    home: Option<PathBuf>,
    env_prefix: String,
    skip_file: bool,
    skip_env: bool,
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self {
            home: None,
            env_prefix: "AUTOQA".to_string(),
            skip_file: false,
            skip_env: false,
        }
    }

    /// Set the config home directory explicitly (mainly for tests).
    pub fn with_home(mut self, path: PathBuf) -> Self {
        self.home = Some(path);
        self
    }

    /// Set the environment variable prefix for overrides (default `AUTOQA`).
    pub fn with_env_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.env_prefix = prefix.into();
        self
    }

    /// Skip the file layer (defaults + env only).
    pub fn skip_file_layer(mut self) -> Self {
        self.skip_file = true;
        self
    }

    /// Skip environment overrides (defaults + file only).
    pub fn skip_env_layer(mut self) -> Self {
        self.skip_env = true;
        self
    }

    /// Load configuration with all enabled layers merged.
    pub fn load(self) -> Result<ClientConfig, ConfigError> {
        let mut config = ClientConfig::default();

        if !self.skip_file {
            let home = self.resolve_home()?;
            apply_file_layer(&mut config, &home)?;
        }

        if !self.skip_env {
            apply_env_overrides(&mut config, &self.env_prefix)?;
        }

        Ok(config)
    }

    /// Resolve the config home: explicit > `$AUTOQA_HOME` > `~/.autoqa`.
    fn resolve_home(&self) -> Result<PathBuf, ConfigError> {
        if let Some(ref path) = self.home {
            return Ok(path.clone());
        }

        if let Ok(path) = env::var("AUTOQA_HOME")
            && !path.trim().is_empty()
        {
            return Ok(PathBuf::from(path));
        }

        dirs::home_dir()
            .map(|home| home.join(".autoqa"))
            .ok_or(ConfigError::NoHomeDir)
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

/// Merge `config.toml` from `home` into `config`. A missing file is not an
/// error; a malformed one is.
fn apply_file_layer(config: &mut ClientConfig, home: &Path) -> Result<(), ConfigError> {
    let config_path = home.join("config.toml");

    let contents = match std::fs::read_to_string(&config_path) {
        Ok(s) => s,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!("config.toml not found at {:?}, using defaults", config_path);
            return Ok(());
        }
        Err(e) => return Err(ConfigError::Io(e)),
    };

    let file: FileConfig = toml::from_str(&contents)?;

    if let Some(ref base) = file.base_url {
        config.base_url = parse_base_url("base_url", base)?;
    }
    if let Some(ms) = file.request_timeout_ms {
        config.request_timeout = Duration::from_millis(ms);
    }
    if let Some(ms) = file.poll_interval_ms {
        config.poll_interval = Duration::from_millis(ms);
    }

    Ok(())
}

/// Apply `{PREFIX}_BASE_URL`, `{PREFIX}_TIMEOUT_MS`, `{PREFIX}_POLL_INTERVAL_MS`.
fn apply_env_overrides(config: &mut ClientConfig, prefix: &str) -> Result<(), ConfigError> {
    let base_var = format!("{prefix}_BASE_URL");
    if let Ok(value) = env::var(&base_var)
        && !value.trim().is_empty()
    {
        tracing::debug!("applying env override {}={}", base_var, value);
        config.base_url = parse_base_url(&base_var, &value)?;
    }

    let timeout_var = format!("{prefix}_TIMEOUT_MS");
    if let Some(ms) = parse_ms_var(&timeout_var)? {
        config.request_timeout = Duration::from_millis(ms);
    }

    let interval_var = format!("{prefix}_POLL_INTERVAL_MS");
    if let Some(ms) = parse_ms_var(&interval_var)? {
        config.poll_interval = Duration::from_millis(ms);
    }

    Ok(())
}

fn parse_ms_var(var: &str) -> Result<Option<u64>, ConfigError> {
    match env::var(var) {
        Ok(value) if !value.trim().is_empty() => {
            let ms = value
                .trim()
                .parse::<u64>()
                .map_err(|_| ConfigError::InvalidValue {
                    source_name: var.to_string(),
                    value,
                    expected: "non-negative integer milliseconds".to_string(),
                })?;
            Ok(Some(ms))
        }
        _ => Ok(None),
    }
}

fn parse_base_url(source_name: &str, value: &str) -> Result<Url, ConfigError> {
    Url::parse(value.trim()).map_err(|e| ConfigError::InvalidValue {
        source_name: source_name.to_string(),
        value: value.to_string(),
        expected: format!("absolute URL ({e})"),
    })
}
