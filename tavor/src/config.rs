//! Client configuration.
//!
//! Configuration is resolved exactly once, when a client is constructed, by
//! the pure function [`ClientConfig::resolve`]. The environment is passed in
//! as a snapshot; nothing reads process-wide state afterwards.

use crate::types::BoxConfig;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::time::Duration;
use tavor_shared::constants::{api, defaults, envs};
use tavor_shared::errors::{TavorError, TavorResult};

/// Explicit client settings. Every field is optional.
#[derive(Clone, Default, Serialize, Deserialize)]
pub struct ClientOptions {
    /// API key (`sk-tavor-...`). Falls back to `TAVOR_API_KEY`.
    #[serde(default)]
    pub api_key: Option<String>,

    /// Service endpoint. Falls back to `TAVOR_BASE_URL`, then
    /// `https://api.tavor.dev`.
    #[serde(default)]
    pub base_url: Option<String>,

    /// Timeout for non-streaming requests, in seconds.
    ///
    /// Default: 30
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

impl ClientOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout_secs = Some(timeout.as_secs());
        self
    }
}

impl fmt::Debug for ClientOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientOptions")
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("base_url", &self.base_url)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

/// Defaults applied to every [`BoxConfig`] a client submits.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BoxDefaults {
    pub cpu: Option<u32>,
    pub mib_ram: Option<u64>,
    /// Lifetime in seconds.
    pub timeout: u64,
}

impl Default for BoxDefaults {
    fn default() -> Self {
        Self {
            cpu: None,
            mib_ram: None,
            timeout: defaults::BOX_TIMEOUT_SECS,
        }
    }
}

impl BoxDefaults {
    /// Read `TAVOR_BOX_CPU`, `TAVOR_BOX_MIB_RAM` and `TAVOR_BOX_TIMEOUT`.
    ///
    /// Values that do not parse are ignored.
    pub fn resolve(env: &HashMap<String, String>) -> Self {
        let fallback = Self::default();
        Self {
            cpu: parse_env(env, envs::BOX_CPU),
            mib_ram: parse_env(env, envs::BOX_MIB_RAM),
            timeout: parse_env(env, envs::BOX_TIMEOUT).unwrap_or(fallback.timeout),
        }
    }

    /// Fill the unset fields of `config`.
    pub fn apply(&self, mut config: BoxConfig) -> BoxConfig {
        config.cpu = config.cpu.or(self.cpu);
        config.mib_ram = config.mib_ram.or(self.mib_ram);
        config.timeout = config.timeout.or(Some(self.timeout));
        config
    }
}

fn parse_env<T: std::str::FromStr>(env: &HashMap<String, String>, key: &str) -> Option<T> {
    let raw = env.get(key)?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            tracing::warn!(key, value = %raw, "Ignoring unparsable environment value");
            None
        }
    }
}

/// Fully resolved client configuration.
#[derive(Clone)]
pub struct ClientConfig {
    pub api_key: String,
    /// Base URL without trailing slash.
    pub base_url: String,
    /// Applied to every request except command streams.
    pub timeout: Duration,
    pub box_defaults: BoxDefaults,
}

impl ClientConfig {
    /// Resolve explicit options against an environment snapshot.
    ///
    /// Precedence: explicit value, then environment, then built-in default.
    ///
    /// # Example
    ///
    /// ```
    /// use std::collections::HashMap;
    /// use tavor::{ClientConfig, ClientOptions};
    ///
    /// let env = HashMap::from([("TAVOR_API_KEY".to_string(), "sk-tavor-env".to_string())]);
    /// let config = ClientConfig::resolve(ClientOptions::new(), &env).unwrap();
    /// assert_eq!(config.api_key, "sk-tavor-env");
    /// assert_eq!(config.base_url, "https://api.tavor.dev");
    /// ```
    pub fn resolve(options: ClientOptions, env: &HashMap<String, String>) -> TavorResult<Self> {
        let api_key = options
            .api_key
            .or_else(|| env.get(envs::API_KEY).cloned())
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| {
                TavorError::Configuration(format!(
                    "API key is required. Set {} or pass api_key explicitly.",
                    envs::API_KEY
                ))
            })?;

        let base_url = options
            .base_url
            .or_else(|| env.get(envs::BASE_URL).cloned())
            .unwrap_or_else(|| api::DEFAULT_BASE_URL.to_string());
        let base_url = base_url.trim().trim_end_matches('/').to_string();

        reqwest::Url::parse(&base_url).map_err(|e| {
            TavorError::Configuration(format!("invalid base URL '{}': {}", base_url, e))
        })?;

        let timeout = Duration::from_secs(
            options
                .timeout_secs
                .unwrap_or(defaults::REQUEST_TIMEOUT_SECS),
        );

        Ok(Self {
            api_key,
            base_url,
            timeout,
            box_defaults: BoxDefaults::resolve(env),
        })
    }

    /// Resolve against a snapshot of the current process environment.
    pub fn from_env(options: ClientOptions) -> TavorResult<Self> {
        let env: HashMap<String, String> = std::env::vars().collect();
        Self::resolve(options, &env)
    }

    /// Absolute URL for an API path.
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("api_key", &"<redacted>")
            .field("base_url", &self.base_url)
            .field("timeout", &self.timeout)
            .field("box_defaults", &self.box_defaults)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_api_key_required() {
        let err = ClientConfig::resolve(ClientOptions::new(), &HashMap::new()).unwrap_err();
        assert!(matches!(err, TavorError::Configuration(_)));
        assert!(err.to_string().contains("API key is required"));

        let err = ClientConfig::resolve(ClientOptions::new().api_key("  "), &HashMap::new())
            .unwrap_err();
        assert!(matches!(err, TavorError::Configuration(_)));
    }

    #[test]
    fn test_defaults() {
        let config =
            ClientConfig::resolve(ClientOptions::new().api_key("sk-tavor-test"), &HashMap::new())
                .unwrap();
        assert_eq!(config.api_key, "sk-tavor-test");
        assert_eq!(config.base_url, "https://api.tavor.dev");
        assert_eq!(config.timeout, Duration::from_secs(30));
        assert_eq!(config.box_defaults, BoxDefaults::default());
    }

    #[test]
    fn test_explicit_beats_environment() {
        let env = env(&[
            ("TAVOR_API_KEY", "sk-tavor-env"),
            ("TAVOR_BASE_URL", "https://env.example"),
        ]);
        let options = ClientOptions::new()
            .api_key("sk-tavor-explicit")
            .base_url("http://localhost:4000/");
        let config = ClientConfig::resolve(options, &env).unwrap();
        assert_eq!(config.api_key, "sk-tavor-explicit");
        assert_eq!(config.base_url, "http://localhost:4000");
    }

    #[test]
    fn test_environment_beats_default() {
        let env = env(&[
            ("TAVOR_API_KEY", "sk-tavor-env"),
            ("TAVOR_BASE_URL", "https://env.example/"),
        ]);
        let config = ClientConfig::resolve(ClientOptions::new(), &env).unwrap();
        assert_eq!(config.api_key, "sk-tavor-env");
        assert_eq!(config.base_url, "https://env.example");
        assert_eq!(config.url("/api/v2/boxes"), "https://env.example/api/v2/boxes");
    }

    #[test]
    fn test_invalid_base_url() {
        let options = ClientOptions::new().api_key("k").base_url("not a url");
        let err = ClientConfig::resolve(options, &HashMap::new()).unwrap_err();
        assert!(matches!(err, TavorError::Configuration(_)));
    }

    #[test]
    fn test_box_defaults_from_env() {
        let defaults = BoxDefaults::resolve(&env(&[
            ("TAVOR_BOX_CPU", "4"),
            ("TAVOR_BOX_MIB_RAM", "4096"),
            ("TAVOR_BOX_TIMEOUT", "1200"),
        ]));
        assert_eq!(defaults.cpu, Some(4));
        assert_eq!(defaults.mib_ram, Some(4096));
        assert_eq!(defaults.timeout, 1200);
    }

    #[test]
    fn test_box_defaults_ignore_garbage() {
        let defaults = BoxDefaults::resolve(&env(&[
            ("TAVOR_BOX_CPU", "many"),
            ("TAVOR_BOX_TIMEOUT", "-5"),
        ]));
        assert_eq!(defaults, BoxDefaults::default());
    }

    #[test]
    fn test_box_defaults_fill_only_unset_fields() {
        let defaults = BoxDefaults {
            cpu: Some(4),
            mib_ram: Some(4096),
            timeout: 1200,
        };
        let config = defaults.apply(BoxConfig::new().cpu(1));
        assert_eq!(config.cpu, Some(1));
        assert_eq!(config.mib_ram, Some(4096));
        assert_eq!(config.timeout, Some(1200));

        let config = defaults.apply(BoxConfig::new().timeout(60));
        assert_eq!(config.timeout, Some(60));
    }

    #[test]
    fn test_debug_redacts_api_key() {
        let config =
            ClientConfig::resolve(ClientOptions::new().api_key("sk-tavor-secret"), &HashMap::new())
                .unwrap();
        assert!(!format!("{:?}", config).contains("sk-tavor-secret"));
        assert!(!format!("{:?}", ClientOptions::new().api_key("sk-tavor-secret")).contains("secret"));
    }
}
