//! Watcher configuration.
//!
//! Loads configuration from a TOML file with support for environment variable
//! expansion in string values. Variables use `$VAR` or `${VAR}` syntax.
//!
//! # Example Configuration
//!
//! ```toml
//! api_key = "$CHIEFPAY_KEY"
//! base_url = "https://api.chiefpay.org"
//! profile = "latest"
//! ts = 0
//! timeout_secs = 30
//! max_rate_limit_retries = 10
//! ```
//!
//! # Environment Variables
//!
//! - `CONFIG` - Path to configuration file (default: `chiefpay.toml`)
//! - `CHIEFPAY_API_KEY` - Override the API key
//! - `CHIEFPAY_BASE_URL` - Override the API root
//! - `CHIEFPAY_PROFILE` - Override the API profile

use std::fmt;
use std::path::Path;
use std::time::Duration;

use chiefpay::ApiProfile;
use chiefpay_http::ClientConfig;
use serde::Deserialize;

/// Default configuration file name.
pub const DEFAULT_CONFIG_PATH: &str = "chiefpay.toml";

/// Errors raised while loading the configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The file exists but could not be read.
    #[error("failed to read {path}: {source}")]
    Read {
        /// Path that was read.
        path: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// The file is not valid TOML for [`WatchConfig`].
    #[error("invalid configuration: {0}")]
    Parse(#[from] toml::de::Error),
    /// No API key in the file or the environment.
    #[error("no API key configured (set api_key or CHIEFPAY_API_KEY)")]
    MissingApiKey,
    /// The profile name matches no preset.
    #[error("unknown profile {0:?} (expected latest, v1, merchant or legacy)")]
    UnknownProfile(String),
}

/// Top-level watcher configuration.
#[derive(Clone, Deserialize)]
pub struct WatchConfig {
    /// Merchant API key.
    #[serde(default)]
    pub api_key: String,

    /// API root (default: `https://api.chiefpay.org`).
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Profile name: `latest`, `v1`, `merchant` or `legacy` (default: `latest`).
    #[serde(default = "default_profile")]
    pub profile: String,

    /// Initial resume cursor.
    #[serde(default)]
    pub ts: u64,

    /// Per-request timeout in seconds.
    #[serde(default)]
    pub timeout_secs: Option<u64>,

    /// Give up on a request after this many HTTP 429 retries.
    #[serde(default)]
    pub max_rate_limit_retries: Option<u32>,
}

impl fmt::Debug for WatchConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WatchConfig")
            .field("api_key", &"[redacted]")
            .field("base_url", &self.base_url)
            .field("profile", &self.profile)
            .field("ts", &self.ts)
            .field("timeout_secs", &self.timeout_secs)
            .field("max_rate_limit_retries", &self.max_rate_limit_retries)
            .finish()
    }
}

fn default_base_url() -> String {
    chiefpay_http::constants::DEFAULT_BASE_URL.to_owned()
}

fn default_profile() -> String {
    "latest".to_owned()
}

impl WatchConfig {
    /// Loads configuration from a specific file path, then applies the
    /// `CHIEFPAY_*` environment overrides.
    ///
    /// A missing file is treated as empty.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = if path.exists() {
            std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
                path: path.display().to_string(),
                source,
            })?
        } else {
            String::new()
        };
        let mut config = Self::parse(&content)?;
        config.apply_overrides(|name| std::env::var(name).ok());
        Ok(config)
    }

    /// Parses TOML after expanding environment variables in it.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] on invalid TOML.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(&expand_env_vars(content))?)
    }

    /// Applies `CHIEFPAY_API_KEY`, `CHIEFPAY_BASE_URL` and `CHIEFPAY_PROFILE`
    /// as returned by `lookup`.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(key) = lookup("CHIEFPAY_API_KEY") {
            self.api_key = key;
        }
        if let Some(url) = lookup("CHIEFPAY_BASE_URL") {
            self.base_url = url;
        }
        if let Some(profile) = lookup("CHIEFPAY_PROFILE") {
            self.profile = profile;
        }
    }

    /// Resolves the profile name.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::UnknownProfile`] for names other than the
    /// presets.
    pub fn api_profile(&self) -> Result<ApiProfile, ConfigError> {
        ApiProfile::by_name(self.profile.trim())
            .ok_or_else(|| ConfigError::UnknownProfile(self.profile.clone()))
    }

    /// Builds the client configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is missing or unresolved, or the profile
    /// is unknown.
    pub fn client_config(&self) -> Result<ClientConfig, ConfigError> {
        let key = self.api_key.trim();
        if key.is_empty() || key.starts_with('$') {
            return Err(ConfigError::MissingApiKey);
        }
        let mut config = ClientConfig::new(key)
            .with_base_url(self.base_url.clone())
            .with_profile(self.api_profile()?)
            .with_ts(self.ts);
        if let Some(secs) = self.timeout_secs {
            config = config.with_timeout(Duration::from_secs(secs));
        }
        if let Some(retries) = self.max_rate_limit_retries {
            config = config.with_max_rate_limit_retries(retries);
        }
        Ok(config)
    }
}

/// Expands `$VAR` and `${VAR}` patterns in a string from environment variables.
///
/// Unresolved variables are left as-is.
fn expand_env_vars(input: &str) -> String {
    expand_with(input, |name| std::env::var(name).ok())
}

fn expand_with(input: &str, lookup: impl Fn(&str) -> Option<String>) -> String {
    let mut result = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch != '$' {
            result.push(ch);
            continue;
        }
        let braced = chars.next_if_eq(&'{').is_some();

        let mut name = String::new();
        let mut closed = false;
        while let Some(&c) = chars.peek() {
            if braced {
                chars.next();
                if c == '}' {
                    closed = true;
                    break;
                }
            } else if c.is_ascii_alphanumeric() || c == '_' {
                chars.next();
            } else {
                break;
            }
            name.push(c);
        }

        let value = if name.is_empty() || (braced && !closed) {
            None
        } else {
            lookup(&name)
        };
        match value {
            Some(value) => result.push_str(&value),
            None => {
                result.push('$');
                if braced {
                    result.push('{');
                }
                result.push_str(&name);
                if closed {
                    result.push('}');
                }
            }
        }
    }

    result
}
