//! Configuration management for notifyd
//!
//! This module defines the main `Config` struct and its sub-structs,
//! responsible for holding all application settings. It uses the `figment`
//! crate to layer built-in defaults, a `notifyd.toml` file, environment
//! variables and command-line arguments.

use crate::cli::Cli;
use crate::core::ChannelId;
use crate::dispatcher::ChannelPriority;
use anyhow::{bail, Result};
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// The config file read when `--config` is not given. Missing is fine.
pub const DEFAULT_CONFIG_FILE: &str = "notifyd.toml";

/// The main configuration struct for the application.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct Config {
    pub core: CoreConfig,
    pub server: ServerConfig,
    pub dispatch: DispatchConfig,
    pub channels: ChannelsConfig,
    pub incidents: IncidentsConfig,
    pub metrics: MetricsConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct CoreConfig {
    /// The logging level for the application, used when `RUST_LOG` is unset.
    pub log_level: String,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct ServerConfig {
    /// The address the HTTP API binds to.
    pub listen_address: SocketAddr,
}

/// Configuration for the fallback dispatcher.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct DispatchConfig {
    /// Channels in the order they are tried.
    pub priority: Vec<ChannelId>,
    /// Upper bound for a single delivery attempt, in milliseconds.
    pub attempt_timeout_ms: u64,
    /// Open a `monitoring` incident when a notification fails on every channel.
    #[serde(default)]
    pub record_exhausted_incidents: bool,
}

impl DispatchConfig {
    pub fn attempt_timeout(&self) -> Duration {
        Duration::from_millis(self.attempt_timeout_ms)
    }
}

/// Which sender implementation backs a channel.
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum SenderKind {
    /// Logs the message and reports success.
    #[default]
    Log,
    /// POSTs a JSON payload to `webhook_url`.
    Webhook,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct ChannelConfig {
    #[serde(default)]
    pub kind: SenderKind,
    #[serde(default)]
    pub webhook_url: Option<String>,
    /// HTTP timeout for webhook senders, in milliseconds.
    #[serde(default = "default_sender_timeout_ms")]
    pub timeout_ms: u64,
    /// Subject line for email payloads.
    #[serde(default)]
    pub subject: Option<String>,
}

fn default_sender_timeout_ms() -> u64 {
    5_000
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            kind: SenderKind::Log,
            webhook_url: None,
            timeout_ms: default_sender_timeout_ms(),
            subject: None,
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Default)]
pub struct ChannelsConfig {
    #[serde(default)]
    pub email: ChannelConfig,
    #[serde(default)]
    pub sms: ChannelConfig,
    #[serde(default)]
    pub telegram: ChannelConfig,
}

impl ChannelsConfig {
    pub fn get(&self, channel: ChannelId) -> &ChannelConfig {
        match channel {
            ChannelId::Email => &self.email,
            ChannelId::Sms => &self.sms,
            ChannelId::Telegram => &self.telegram,
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct IncidentsConfig {
    /// SQLite database file. `:memory:` keeps incidents for the process lifetime only.
    pub database_path: PathBuf,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct MetricsConfig {
    pub enabled: bool,
    pub listen_address: SocketAddr,
}

impl Config {
    /// Loads the configuration by layering defaults, the TOML file,
    /// `NOTIFYD_`-prefixed environment variables and the CLI arguments.
    pub fn load(cli: &Cli) -> Result<Self> {
        let figment = match &cli.config {
            Some(path) => {
                if !path.exists() {
                    bail!("config file not found: {}", path.display());
                }
                Self::figment(path)
            }
            None => Self::figment(Path::new(DEFAULT_CONFIG_FILE)),
        };

        let config: Config = figment.merge(cli.clone()).extract()?;
        config.validate()?;
        Ok(config)
    }

    fn figment(path: &Path) -> Figment {
        Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(path))
            // e.g. NOTIFYD_SERVER__LISTEN_ADDRESS=127.0.0.1:8080
            .merge(Env::prefixed("NOTIFYD_").split("__"))
    }

    /// Rejects configurations the application cannot start with.
    pub fn validate(&self) -> Result<()> {
        if let Err(e) = ChannelPriority::new(self.dispatch.priority.clone()) {
            bail!("invalid dispatch.priority: {}", e);
        }
        if self.dispatch.attempt_timeout_ms == 0 {
            bail!("dispatch.attempt_timeout_ms must be greater than zero");
        }
        for channel in ChannelId::ALL {
            let channel_config = self.channels.get(channel);
            if channel_config.kind == SenderKind::Webhook
                && channel_config
                    .webhook_url
                    .as_deref()
                    .map_or(true, |url| url.trim().is_empty())
            {
                bail!(
                    "channels.{} uses the webhook sender but has no webhook_url",
                    channel
                );
            }
        }
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            core: CoreConfig {
                log_level: "info".to_string(),
            },
            server: ServerConfig {
                listen_address: SocketAddr::from(([0, 0, 0, 0], 8000)),
            },
            dispatch: DispatchConfig {
                priority: ChannelId::ALL.to_vec(),
                attempt_timeout_ms: 10_000,
                record_exhausted_incidents: false,
            },
            channels: ChannelsConfig::default(),
            incidents: IncidentsConfig {
                database_path: PathBuf::from("incidents.db"),
            },
            metrics: MetricsConfig {
                enabled: false,
                listen_address: SocketAddr::from(([127, 0, 0, 1], 9090)),
            },
        }
    }
}
