//! Configuration module - environment variable parsing

use std::env;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use crate::game::world::MIN_GRID_WIDTH;
use crate::game::{Grid, GridError};
use crate::util::rate_limit::INPUT_RATE_LIMIT;

const DEFAULT_SERVER_ADDR: &str = "0.0.0.0:8765";
const DEFAULT_GRID_SIZE: i32 = 20;
const DEFAULT_TICK_PERIOD_SECS: f64 = 0.15;

/// Application configuration loaded from environment variables
#[derive(Clone, Debug)]
pub struct Config {
    /// Server binding address
    pub server_addr: SocketAddr,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Allowed client origins for CORS, comma separated, `*` for any
    pub client_origin: String,

    /// Playing field
    pub grid: Grid,
    /// Time between simulation ticks
    pub tick_period: Duration,
    /// Broadcast after fruit moves that were rejected
    pub broadcast_rejected_moves: bool,
    /// Inbound messages per second per session (0 = unlimited)
    pub input_rate_limit: u32,
    /// Fixed seed for fruit placement
    pub rng_seed: Option<u64>,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        // Hosting platforms provide PORT, fall back to SERVER_ADDR or default
        let server_addr = match lookup("PORT") {
            Some(port) => format!("0.0.0.0:{}", port),
            None => lookup("SERVER_ADDR").unwrap_or_else(|| DEFAULT_SERVER_ADDR.to_string()),
        };

        let width = parse_or(&lookup, "GRID_WIDTH", DEFAULT_GRID_SIZE)?;
        let height = parse_or(&lookup, "GRID_HEIGHT", DEFAULT_GRID_SIZE)?;
        let grid = Grid::new(width, height)?;
        if width < MIN_GRID_WIDTH {
            return Err(ConfigError::GridTooNarrow {
                width,
                min: MIN_GRID_WIDTH,
            });
        }

        let tick_secs: f64 = parse_or(&lookup, "TICK_PERIOD_SECS", DEFAULT_TICK_PERIOD_SECS)?;
        if !tick_secs.is_finite() || tick_secs <= 0.0 {
            return Err(ConfigError::InvalidTickPeriod(tick_secs));
        }

        Ok(Self {
            server_addr: server_addr
                .parse()
                .map_err(|_| ConfigError::InvalidAddress)?,

            log_level: lookup("LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
            client_origin: lookup("CLIENT_ORIGIN").unwrap_or_else(|| "*".to_string()),

            grid,
            tick_period: Duration::from_secs_f64(tick_secs),
            broadcast_rejected_moves: parse_or(&lookup, "BROADCAST_REJECTED_MOVES", true)?,
            input_rate_limit: parse_or(&lookup, "INPUT_RATE_LIMIT", INPUT_RATE_LIMIT)?,
            rng_seed: lookup("RNG_SEED")
                .map(|raw| parse_value("RNG_SEED", &raw))
                .transpose()?,
        })
    }
}

fn parse_or<F, T>(lookup: &F, key: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(key) {
        Some(raw) => parse_value(key, &raw),
        None => Ok(default),
    }
}

fn parse_value<T: FromStr>(key: &'static str, raw: &str) -> Result<T, ConfigError> {
    raw.trim().parse().map_err(|_| ConfigError::Invalid {
        key,
        value: raw.to_string(),
    })
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {key}: {value:?}")]
    Invalid { key: &'static str, value: String },

    #[error("Invalid server address format")]
    InvalidAddress,

    #[error(transparent)]
    Grid(#[from] GridError),

    #[error("Grid width {width} is too narrow, need at least {min}")]
    GridTooNarrow { width: i32, min: i32 },

    #[error("Tick period must be a positive number of seconds, got {0}")]
    InvalidTickPeriod(f64),
}
