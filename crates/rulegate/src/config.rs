use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{RootError, RootResult};

/// Logging configuration for the binary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// `tracing-subscriber` filter directive used when `RUST_LOG` is unset.
    #[serde(default = "default_filter")]
    pub filter: String,
}

fn default_filter() -> String {
    "rulegate=info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: default_filter(),
        }
    }
}

/// Configuration for enforced checks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnforcementConfig {
    /// Record every enforced decision through the tracing audit sink.
    #[serde(default = "default_audit")]
    pub audit: bool,
}

fn default_audit() -> bool {
    true
}

impl Default for EnforcementConfig {
    fn default() -> Self {
        Self {
            audit: default_audit(),
        }
    }
}

/// Top-level configuration for the rulegate binary.
///
/// Loaded from a TOML file (typically `~/.rulegate/config.toml`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RootConfig {
    /// Policy document to load; `.json` files are read as JSON, anything
    /// else as TOML.
    #[serde(default = "default_policy_path")]
    pub policy_path: PathBuf,

    /// Policy used when a command names none.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_policy: Option<String>,

    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub enforcement: EnforcementConfig,
}

fn default_policy_path() -> PathBuf {
    dirs_or_default(".rulegate/policies.toml")
}

/// Returns `$HOME/<suffix>` if HOME is available, otherwise `./<suffix>`.
fn dirs_or_default(suffix: &str) -> PathBuf {
    std::env::var("HOME")
        .map(|h| PathBuf::from(h).join(suffix))
        .unwrap_or_else(|_| PathBuf::from(suffix))
}

impl Default for RootConfig {
    fn default() -> Self {
        Self {
            policy_path: default_policy_path(),
            default_policy: None,
            logging: LoggingConfig::default(),
            enforcement: EnforcementConfig::default(),
        }
    }
}

impl RootConfig {
    /// Load configuration from a TOML file. If the file does not exist,
    /// returns a default configuration.
    pub fn load(path: &Path) -> RootResult<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = std::fs::read_to_string(path).map_err(RootError::Io)?;
        let config: RootConfig = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values.
    pub fn validate(&self) -> RootResult<()> {
        if self.policy_path.as_os_str().is_empty() {
            return Err(RootError::Config("policy_path must not be empty".into()));
        }
        if let Some(name) = &self.default_policy {
            if name.trim().is_empty() {
                return Err(RootError::Config(
                    "default_policy must not be empty when set".into(),
                ));
            }
        }
        if let Err(e) = tracing_subscriber::EnvFilter::try_new(&self.logging.filter) {
            return Err(RootError::Config(format!(
                "invalid logging filter '{}': {}",
                self.logging.filter, e
            )));
        }
        Ok(())
    }

    /// Resolve the policy to use: the explicit name, else `default_policy`.
    pub fn policy_name<'a>(&'a self, explicit: Option<&'a str>) -> RootResult<&'a str> {
        explicit
            .or(self.default_policy.as_deref())
            .ok_or_else(|| RootError::Config("no policy named and no default_policy set".into()))
    }

    /// Return the path to the default config file location.
    pub fn default_config_path() -> PathBuf {
        dirs_or_default(".rulegate/config.toml")
    }
}
