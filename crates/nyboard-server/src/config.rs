use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::warn;

use nyboard_api::entries::RankPolicy;

const DEV_TOKEN_SECRET: &str = "dev-secret-change-me";

/// Where entries and messages live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreLocation {
    Sqlite(PathBuf),
    Memory,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub addr: SocketAddr,
    pub store: StoreLocation,
    pub token_secret: String,
    pub rank_policy: RankPolicy,
    pub request_timeout: Duration,
}

impl Config {
    /// Read configuration from the process environment (after `.env`).
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(var: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let host = var("NYBOARD_HOST").unwrap_or_else(|| "0.0.0.0".into());
        let port: u16 = var("NYBOARD_PORT")
            .unwrap_or_else(|| "3000".into())
            .parse()
            .context("NYBOARD_PORT must be a port number")?;
        let addr: SocketAddr = format!("{}:{}", host, port)
            .parse()
            .context("NYBOARD_HOST must be an IP address")?;

        let store = match var("NYBOARD_DB_PATH") {
            Some(path) if path == ":memory:" => StoreLocation::Memory,
            Some(path) => StoreLocation::Sqlite(PathBuf::from(path)),
            None => StoreLocation::Sqlite(PathBuf::from("nyboard.db")),
        };

        let token_secret = var("NYBOARD_TOKEN_SECRET").unwrap_or_else(|| {
            warn!("NYBOARD_TOKEN_SECRET not set, using the development secret");
            DEV_TOKEN_SECRET.into()
        });

        let rank_policy = match var("NYBOARD_RANK_POLICY") {
            Some(policy) => policy.parse()?,
            None => RankPolicy::default(),
        };

        let timeout_ms: u64 = var("NYBOARD_REQUEST_TIMEOUT_MS")
            .unwrap_or_else(|| "5000".into())
            .parse()
            .context("NYBOARD_REQUEST_TIMEOUT_MS must be a number of milliseconds")?;

        Ok(Self {
            addr,
            store,
            token_secret,
            rank_policy,
            request_timeout: Duration::from_millis(timeout_ms),
        })
    }
}
