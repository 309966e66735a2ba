use anyhow::{Context, Result};
use std::env;
use std::str::FromStr;
use std::time::Duration;

use academy::portfolio::STARTING_CASH;

pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:5001";
pub const DEFAULT_MARKET_DATA_URL: &str = "https://query1.finance.yahoo.com";

/// Which market data backend serves quotes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarketDataProvider {
    Yahoo,
    /// Fixed offline prices, for demos and local development
    Static,
}

impl FromStr for MarketDataProvider {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "yahoo" => Ok(MarketDataProvider::Yahoo),
            "static" => Ok(MarketDataProvider::Static),
            _ => anyhow::bail!(
                "Invalid MARKET_DATA_PROVIDER: {}. Must be 'yahoo' or 'static'",
                s
            ),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind_addr: String,
    pub starting_cash: f64,
    pub market_data_provider: MarketDataProvider,
    pub market_data_url: String,
    pub market_data_timeout: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: DEFAULT_BIND_ADDR.to_string(),
            starting_cash: STARTING_CASH,
            market_data_provider: MarketDataProvider::Yahoo,
            market_data_url: DEFAULT_MARKET_DATA_URL.to_string(),
            market_data_timeout: Duration::from_secs(10),
        }
    }
}

fn parse_var<T>(name: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| anyhow::anyhow!("{}", e))
            .with_context(|| format!("Failed to parse {name}={raw}")),
        Err(_) => Ok(None),
    }
}

impl ServerConfig {
    /// Reads the configuration from the environment (after `.env` is loaded).
    /// Unset variables fall back to defaults; malformed ones are an error.
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();

        let starting_cash = parse_var::<f64>("STARTING_CASH")?.unwrap_or(defaults.starting_cash);
        if !starting_cash.is_finite() || starting_cash < 0.0 {
            anyhow::bail!("STARTING_CASH must be a non-negative number");
        }

        Ok(Self {
            bind_addr: env::var("BIND_ADDR").unwrap_or(defaults.bind_addr),
            starting_cash,
            market_data_provider: parse_var("MARKET_DATA_PROVIDER")?
                .unwrap_or(defaults.market_data_provider),
            market_data_url: env::var("MARKET_DATA_URL").unwrap_or(defaults.market_data_url),
            market_data_timeout: parse_var::<u64>("MARKET_DATA_TIMEOUT_SECS")?
                .map(Duration::from_secs)
                .unwrap_or(defaults.market_data_timeout),
        })
    }
}
