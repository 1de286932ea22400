/// Service configuration, read from the environment.
// region:    --- Imports
use crate::guild::GuildRecord;
use crate::MemberId;
use serde::Deserialize;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
// endregion: --- Imports

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {var}: {value:?}")]
    InvalidValue { var: &'static str, value: String },

    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
}

/// Starting balance, as read from the `DKP_SEED` file.
#[derive(Debug, Clone, Deserialize)]
pub struct BalanceSeed {
    pub member_id: MemberId,
    pub balance: i64,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub bind_addr: SocketAddr,
    /// Postgres ledger when set, in-memory ledger otherwise.
    pub database_url: Option<String>,
    pub db_max_connections: u32,
    pub settlement_interval: Duration,
    pub guild_directory: Option<PathBuf>,
    pub dkp_seed: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 3000)),
            database_url: None,
            db_max_connections: 5,
            settlement_interval: Duration::from_secs(1),
            guild_directory: None,
            dkp_seed: None,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Same as `from_env`, with the variable source injected.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let non_empty = |var: &str| lookup(var).filter(|v| !v.trim().is_empty());

        let bind_addr = match non_empty("APP_BIND_ADDR") {
            Some(v) => parse_var("APP_BIND_ADDR", &v)?,
            None => defaults.bind_addr,
        };
        let db_max_connections = match non_empty("DB_MAX_CONNECTIONS") {
            Some(v) => parse_var("DB_MAX_CONNECTIONS", &v)?,
            None => defaults.db_max_connections,
        };
        let settlement_interval = match non_empty("SETTLEMENT_INTERVAL_SECS") {
            Some(v) => match parse_var::<u64>("SETTLEMENT_INTERVAL_SECS", &v)? {
                0 => {
                    return Err(ConfigError::InvalidValue {
                        var: "SETTLEMENT_INTERVAL_SECS",
                        value: v,
                    })
                }
                secs => Duration::from_secs(secs),
            },
            None => defaults.settlement_interval,
        };

        Ok(Self {
            bind_addr,
            database_url: non_empty("DATABASE_URL"),
            db_max_connections,
            settlement_interval,
            guild_directory: non_empty("GUILD_DIRECTORY").map(PathBuf::from),
            dkp_seed: non_empty("DKP_SEED").map(PathBuf::from),
        })
    }

    pub fn load_guilds(&self) -> Result<Vec<GuildRecord>, ConfigError> {
        match &self.guild_directory {
            Some(path) => read_json(path),
            None => Ok(Vec::new()),
        }
    }

    pub fn load_balance_seed(&self) -> Result<Vec<BalanceSeed>, ConfigError> {
        match &self.dkp_seed {
            Some(path) => read_json(path),
            None => Ok(Vec::new()),
        }
    }
}

fn parse_var<T: std::str::FromStr>(var: &'static str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidValue {
        var,
        value: value.to_string(),
    })
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, ConfigError> {
    let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}
