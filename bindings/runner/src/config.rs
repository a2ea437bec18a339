use std::path::{Path, PathBuf};
use std::time::Duration;

use kasm_client_instrumented::prelude::KasmClientConfig;
use serde::Deserialize;
use session_stress_runner::prelude::ReadyPolicy;

const CONFIG_FILE_NAME: &str = ".kasm-stress-test.json";

/// Errors that stop the stress test before any session is requested.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Could not read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Could not decode config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Invalid value {value:?} for {var}: {reason}")]
    InvalidEnv {
        var: &'static str,
        value: String,
        reason: String,
    },

    #[error("{0} is required")]
    Missing(&'static str),

    #[error("{field} must be greater than zero")]
    Zero { field: &'static str },
}

/// Settings for talking to the Kasm API and pacing the run.
///
/// Read from a JSON file, then overridden by `KASM_*` environment variables.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Config {
    pub api_key: String,
    pub api_secret: String,
    pub api_host: String,
    pub default_image_id: String,
    pub log_level: String,
    pub timeout_seconds: u64,
    pub poll_interval_seconds: u64,
    pub ready_timeout_seconds: u64,
    pub stuck_requested_seconds: u64,
    pub stuck_cooldown_seconds: u64,
    pub stuck_retries: u32,
}

impl Default for Config {
    fn default() -> Self {
        let policy = ReadyPolicy::default();
        Self {
            api_key: String::new(),
            api_secret: String::new(),
            api_host: String::new(),
            default_image_id: String::new(),
            log_level: "info".to_string(),
            timeout_seconds: 30,
            poll_interval_seconds: policy.poll_interval.as_secs(),
            ready_timeout_seconds: policy.ready_timeout.as_secs(),
            stuck_requested_seconds: policy.stuck_threshold.as_secs(),
            stuck_cooldown_seconds: policy.stuck_cooldown.as_secs(),
            stuck_retries: policy.stuck_retries,
        }
    }
}

/// Where the config came from, to be logged once logging is set up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    File(PathBuf),
    /// The default config file does not exist, so only the environment was used.
    EnvironmentOnly { missing: Option<PathBuf> },
}

/// `~/.kasm-stress-test.json`, if a home directory can be found.
pub fn default_config_path() -> Option<PathBuf> {
    std::env::var_os("HOME")
        .or_else(|| std::env::var_os("USERPROFILE"))
        .map(|home| PathBuf::from(home).join(CONFIG_FILE_NAME))
}

impl Config {
    /// Load the config from `path`, or the default location if no path is given, then apply
    /// overrides from the process environment.
    ///
    /// A config file given explicitly must exist. The default config file is optional.
    pub fn load(path: Option<&Path>) -> Result<(Config, ConfigSource), ConfigError> {
        Self::load_with_env(path, default_config_path(), |var| std::env::var(var).ok())
    }

    pub(crate) fn load_with_env(
        path: Option<&Path>,
        default_path: Option<PathBuf>,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<(Config, ConfigSource), ConfigError> {
        let (mut config, source) = match (path, default_path) {
            (Some(path), _) => (Self::from_file(path)?, ConfigSource::File(path.to_path_buf())),
            (None, Some(default_path)) if default_path.exists() => (
                Self::from_file(&default_path)?,
                ConfigSource::File(default_path),
            ),
            (None, missing) => (Config::default(), ConfigSource::EnvironmentOnly { missing }),
        };

        config.apply_env(env)?;
        config.validate()?;

        Ok((config, source))
    }

    fn from_file(path: &Path) -> Result<Config, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    fn apply_env(&mut self, env: impl Fn(&str) -> Option<String>) -> Result<(), ConfigError> {
        let env = |var: &str| env(var).filter(|value| !value.is_empty());

        if let Some(key) = env("KASM_KEY") {
            self.api_key = key;
        }
        if let Some(secret) = env("KASM_SECRET") {
            self.api_secret = secret;
        }
        if let Some(host) = env("KASM_API_HOST") {
            self.api_host = host;
        }
        if let Some(image_id) = env("KASM_DEFAULT_IMAGE_ID") {
            self.default_image_id = image_id;
        }
        if let Some(log_level) = env("KASM_LOG_LEVEL") {
            self.log_level = log_level;
        }
        if let Some(timeout) = env("KASM_TIMEOUT") {
            self.timeout_seconds =
                timeout
                    .trim()
                    .parse()
                    .map_err(|e: std::num::ParseIntError| ConfigError::InvalidEnv {
                        var: "KASM_TIMEOUT",
                        value: timeout.clone(),
                        reason: e.to_string(),
                    })?;
        }

        Ok(())
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.api_key.trim().is_empty() {
            return Err(ConfigError::Missing("API key"));
        }
        if self.api_secret.trim().is_empty() {
            return Err(ConfigError::Missing("API secret"));
        }
        if self.api_host.trim().is_empty() {
            return Err(ConfigError::Missing("API host"));
        }

        for (field, value) in [
            ("timeout_seconds", self.timeout_seconds),
            ("poll_interval_seconds", self.poll_interval_seconds),
            ("ready_timeout_seconds", self.ready_timeout_seconds),
            ("stuck_requested_seconds", self.stuck_requested_seconds),
        ] {
            if value == 0 {
                return Err(ConfigError::Zero { field });
            }
        }

        Ok(())
    }

    pub fn ready_policy(&self) -> ReadyPolicy {
        ReadyPolicy {
            poll_interval: Duration::from_secs(self.poll_interval_seconds),
            ready_timeout: Duration::from_secs(self.ready_timeout_seconds),
            stuck_threshold: Duration::from_secs(self.stuck_requested_seconds),
            stuck_cooldown: Duration::from_secs(self.stuck_cooldown_seconds),
            stuck_retries: self.stuck_retries,
        }
    }

    pub fn client_config(&self) -> KasmClientConfig {
        KasmClientConfig::new(&self.api_host, &self.api_key, &self.api_secret)
            .with_timeout(Duration::from_secs(self.timeout_seconds))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;
    use std::io::Write;

    fn env(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect::<HashMap<_, _>>();
        move |var| vars.get(var).cloned()
    }

    fn write_config(content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn load_from_file_with_defaults() {
        let file = write_config(
            r#"{
                "api_key": "key",
                "api_secret": "secret",
                "api_host": "https://kasm.example.com/api/public",
                "default_image_id": "img-1"
            }"#,
        );

        let (config, source) =
            Config::load_with_env(Some(file.path()), None, env(&[])).unwrap();

        assert_eq!(ConfigSource::File(file.path().to_path_buf()), source);
        assert_eq!("key", config.api_key);
        assert_eq!("img-1", config.default_image_id);
        assert_eq!("info", config.log_level);
        assert_eq!(30, config.timeout_seconds);
        assert_eq!(ReadyPolicy::default(), config.ready_policy());
    }

    #[test]
    fn environment_overrides_file() {
        let file = write_config(
            r#"{"api_key": "key", "api_secret": "secret", "api_host": "https://a", "timeout_seconds": 10}"#,
        );

        let (config, _) = Config::load_with_env(
            Some(file.path()),
            None,
            env(&[
                ("KASM_KEY", "env-key"),
                ("KASM_API_HOST", "https://b"),
                ("KASM_LOG_LEVEL", "debug"),
                ("KASM_TIMEOUT", "45"),
                ("KASM_SECRET", ""),
            ]),
        )
        .unwrap();

        assert_eq!("env-key", config.api_key);
        assert_eq!("secret", config.api_secret);
        assert_eq!("https://b", config.api_host);
        assert_eq!("debug", config.log_level);
        assert_eq!(45, config.timeout_seconds);
    }

    #[test]
    fn missing_default_file_uses_environment() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join(CONFIG_FILE_NAME);

        let (config, source) = Config::load_with_env(
            None,
            Some(missing.clone()),
            env(&[
                ("KASM_KEY", "key"),
                ("KASM_SECRET", "secret"),
                ("KASM_API_HOST", "https://kasm"),
            ]),
        )
        .unwrap();

        assert_eq!(
            ConfigSource::EnvironmentOnly {
                missing: Some(missing)
            },
            source
        );
        assert_eq!("https://kasm", config.api_host);
    }

    #[test]
    fn explicit_file_must_exist() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.json");

        let err = Config::load_with_env(Some(&missing), None, env(&[])).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }), "{err}");
    }

    #[test]
    fn malformed_file_is_an_error() {
        let file = write_config("{ not json");

        let err = Config::load_with_env(Some(file.path()), None, env(&[])).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }), "{err}");
    }

    #[test]
    fn invalid_timeout_is_an_error() {
        let err = Config::load_with_env(
            None,
            None,
            env(&[
                ("KASM_KEY", "key"),
                ("KASM_SECRET", "secret"),
                ("KASM_API_HOST", "https://kasm"),
                ("KASM_TIMEOUT", "soon"),
            ]),
        )
        .unwrap_err();

        assert!(
            err.to_string().starts_with("Invalid value \"soon\" for KASM_TIMEOUT"),
            "{err}"
        );
    }

    #[test]
    fn credentials_and_host_are_required() {
        let err = Config::load_with_env(None, None, env(&[])).unwrap_err();
        assert_eq!("API key is required", err.to_string());

        let err = Config::load_with_env(None, None, env(&[("KASM_KEY", "key")])).unwrap_err();
        assert_eq!("API secret is required", err.to_string());

        let err = Config::load_with_env(
            None,
            None,
            env(&[("KASM_KEY", "key"), ("KASM_SECRET", "secret")]),
        )
        .unwrap_err();
        assert_eq!("API host is required", err.to_string());
    }

    #[test]
    fn zero_poll_interval_is_rejected() {
        let file = write_config(
            r#"{"api_key": "key", "api_secret": "secret", "api_host": "https://a", "poll_interval_seconds": 0}"#,
        );

        let err = Config::load_with_env(Some(file.path()), None, env(&[])).unwrap_err();
        assert_eq!("poll_interval_seconds must be greater than zero", err.to_string());
    }
}
