use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use tracing::warn;

/// Runtime configuration, read from the process environment.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_path: String,
    pub port: u16,
    pub fetch_interval: Duration,
    pub fetch_timeout: Duration,
    pub on_demand_timeout: Duration,
    pub max_concurrent_fetches: usize,
    pub log_dir: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_path: "ash.db".to_string(),
            port: 4000,
            fetch_interval: Duration::from_secs(30 * 60),
            fetch_timeout: Duration::from_secs(20),
            on_demand_timeout: Duration::from_secs(60),
            max_concurrent_fetches: 8,
            log_dir: PathBuf::from("logs"),
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            database_path: env::var("DATABASE_PATH").unwrap_or(defaults.database_path),
            port: get_env_var_or("PORT", defaults.port),
            fetch_interval: get_env_secs_or("FETCH_INTERVAL_SECS", defaults.fetch_interval),
            fetch_timeout: get_env_secs_or("FETCH_TIMEOUT_SECS", defaults.fetch_timeout),
            on_demand_timeout: get_env_secs_or("ON_DEMAND_TIMEOUT_SECS", defaults.on_demand_timeout),
            // Zero would stall every cycle.
            max_concurrent_fetches: get_env_var_or(
                "MAX_CONCURRENT_FETCHES",
                defaults.max_concurrent_fetches,
            )
            .max(1),
            log_dir: env::var("LOG_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.log_dir),
        }
    }
}

/// Retrieves an environment variable and parses it, falling back to `default`
/// when it is unset or does not parse.
pub fn get_env_var_or<T: FromStr + Copy + std::fmt::Display>(var: &str, default: T) -> T {
    match env::var(var) {
        Ok(raw) => match raw.trim().parse::<T>() {
            Ok(value) => value,
            Err(_) => {
                warn!("Ignoring unparseable {}={:?}, using {}", var, raw, default);
                default
            }
        },
        Err(_) => default,
    }
}

/// A period in whole seconds. Zero is refused in favour of `default`: a zero
/// interval cannot drive a timer and a zero timeout fails every fetch.
pub fn get_env_secs_or(var: &str, default: Duration) -> Duration {
    match get_env_var_or(var, default.as_secs()) {
        0 => {
            warn!("Ignoring {}=0, using {} seconds", var, default.as_secs());
            default
        }
        secs => Duration::from_secs(secs),
    }
}
