//! Configuration loading and defaults.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Top-level relay configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub relay: Option<RelaySettings>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub server: Option<ServerConfig>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub logging: Option<LoggingConfig>,
}

/// Multiplexer tuning and history policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelaySettings {
    /// How long one wait for either producer may take before counting as idle.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Idle polls tolerated after the primary stream ends before the
    /// notification stream is closed.
    #[serde(default = "default_idle_grace_ticks")]
    pub idle_grace_ticks: u32,

    #[serde(default)]
    pub history_mode: HistoryMode,

    /// Advance the primary run one step after every history commit.
    #[serde(default)]
    pub advance_after_commit: bool,

    #[serde(default = "default_synthetic_item_id")]
    pub synthetic_item_id: String,
}

impl Default for RelaySettings {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
            idle_grace_ticks: default_idle_grace_ticks(),
            history_mode: HistoryMode::default(),
            advance_after_commit: false,
            synthetic_item_id: default_synthetic_item_id(),
        }
    }
}

fn default_poll_interval_ms() -> u64 {
    100
}

fn default_idle_grace_ticks() -> u32 {
    5
}

fn default_synthetic_item_id() -> String {
    "stream_notification".into()
}

/// When notification text is committed to the run history.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HistoryMode {
    /// Buffer fragments and commit one message when the burst ends.
    #[default]
    Burst,
    /// Commit every fragment as its own completed message.
    PerFragment,
}

/// Notification server endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub url: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
}

fn default_connect_timeout_secs() -> u64 {
    5
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log format: "plain" (default) or "json".
    #[serde(default = "default_log_format")]
    pub format: String,

    /// Log level override (trace/debug/info/warn/error).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub level: Option<String>,

    /// Per-crate log level overrides (e.g. "mcp_relay_agent=debug").
    #[serde(default)]
    pub filters: Vec<String>,
}

fn default_log_format() -> String {
    "plain".into()
}

fn substitute_env_vars(input: &str) -> crate::error::Result<String> {
    let re = regex::Regex::new(r"\$\{([^}]+)\}")
        .map_err(|e| crate::error::RelayError::Config(e.to_string()))?;
    Ok(re
        .replace_all(input, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_default()
        })
        .into_owned())
}

impl Config {
    /// Load config from a JSON5 file, substituting `${ENV_VAR}` references.
    pub fn load(path: &Path) -> crate::error::Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let raw = std::fs::read_to_string(path)?;
        let substituted = substitute_env_vars(&raw)?;

        let config: Config = json5::from_str(&substituted)
            .map_err(|e| crate::error::RelayError::Config(e.to_string()))?;
        config.validate()?;

        Ok(config)
    }

    fn validate(&self) -> crate::error::Result<()> {
        if let Some(relay) = &self.relay {
            if relay.poll_interval_ms == 0 {
                return Err(crate::error::RelayError::Config(
                    "relay.poll_interval_ms must be greater than zero".into(),
                ));
            }
            if relay.idle_grace_ticks == 0 {
                return Err(crate::error::RelayError::Config(
                    "relay.idle_grace_ticks must be at least one".into(),
                ));
            }
            if relay.synthetic_item_id.is_empty() {
                return Err(crate::error::RelayError::Config(
                    "relay.synthetic_item_id must not be empty".into(),
                ));
            }
        }
        Ok(())
    }

    /// Default config file location.
    pub fn config_path() -> PathBuf {
        data_dir().join("config.json")
    }

    pub fn relay_settings(&self) -> RelaySettings {
        self.relay.clone().unwrap_or_default()
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(
            self.relay
                .as_ref()
                .map(|r| r.poll_interval_ms)
                .unwrap_or_else(default_poll_interval_ms),
        )
    }

    pub fn idle_grace_ticks(&self) -> u32 {
        self.relay
            .as_ref()
            .map(|r| r.idle_grace_ticks)
            .unwrap_or_else(default_idle_grace_ticks)
    }

    pub fn server_url(&self) -> Option<&str> {
        self.server.as_ref().map(|s| s.url.as_str())
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(
            self.server
                .as_ref()
                .map(|s| s.connect_timeout_secs)
                .unwrap_or_else(default_connect_timeout_secs),
        )
    }

    pub fn log_level(&self) -> &str {
        self.logging
            .as_ref()
            .and_then(|l| l.level.as_deref())
            .unwrap_or("info")
    }

    pub fn log_json(&self) -> bool {
        self.logging.as_ref().is_some_and(|l| l.format == "json")
    }
}

/// Relay data directory (`~/.mcp-relay`).
pub fn data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".mcp-relay")
}
