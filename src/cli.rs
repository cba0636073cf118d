//! Command-Line Interface (CLI) argument parsing.
//!
//! This module defines the command-line arguments for the application using the
//! `clap` crate. These arguments are parsed at startup and then merged on top of
//! the configuration from the `notifyd.toml` file and environment variables.

use clap::Parser;
use figment::{
    value::{Dict, Map, Tag, Value},
    Error, Metadata, Profile, Provider,
};
use std::net::SocketAddr;
use std::path::PathBuf;

/// A notification service that delivers over email, SMS or Telegram with fallback.
#[derive(Parser, Debug, Clone, Default)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to the TOML configuration file.
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Address for the HTTP API to listen on.
    #[arg(long, value_name = "ADDR")]
    pub listen: Option<SocketAddr>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Path to the incident database.
    #[arg(long, value_name = "PATH")]
    pub database: Option<PathBuf>,

    /// Timeout for a single delivery attempt in milliseconds.
    #[arg(long, value_name = "MS")]
    pub attempt_timeout_ms: Option<u64>,

    /// Serve Prometheus metrics.
    #[arg(long)]
    pub metrics: bool,
}

impl Provider for Cli {
    fn metadata(&self) -> Metadata {
        Metadata::named("Command-Line Arguments")
    }

    fn data(&self) -> Result<Map<Profile, Dict>, Error> {
        let mut core = Dict::new();
        let mut server = Dict::new();
        let mut dispatch = Dict::new();
        let mut incidents = Dict::new();
        let mut metrics = Dict::new();

        if let Some(level) = &self.log_level {
            core.insert("log_level".into(), Value::from(level.clone()));
        }
        if let Some(listen) = self.listen {
            server.insert("listen_address".into(), Value::from(listen.to_string()));
        }
        if let Some(timeout) = self.attempt_timeout_ms {
            dispatch.insert("attempt_timeout_ms".into(), Value::from(timeout));
        }
        if let Some(path) = &self.database {
            incidents.insert(
                "database_path".into(),
                Value::from(path.to_string_lossy().to_string()),
            );
        }
        // A bare flag can only turn metrics on; the file or env decides otherwise.
        if self.metrics {
            metrics.insert("enabled".into(), Value::from(true));
        }

        let mut dict = Dict::new();
        for (section, values) in [
            ("core", core),
            ("server", server),
            ("dispatch", dispatch),
            ("incidents", incidents),
            ("metrics", metrics),
        ] {
            if !values.is_empty() {
                dict.insert(section.into(), Value::Dict(Tag::Default, values));
            }
        }

        let mut map = Map::new();
        map.insert(Profile::Default, dict);
        Ok(map)
    }
}
