//! Environment-sourced runtime configuration.

pub const DEFAULT_PORT: u16 = 5000;
pub const DEFAULT_UPDATE_INTERVAL_MS: u64 = 2000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Config {
    /// WebSocket listen port (`PORT`).
    pub port: u16,
    /// Sampling tick interval in milliseconds (`UPDATE_INTERVAL_MS`).
    pub update_interval_ms: u64,
}

impl Config {
    /// Read `PORT` and `UPDATE_INTERVAL_MS` from the process environment.
    /// Absent or unparseable values fall back to the defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Self {
        Config {
            port: get("PORT")
                .and_then(|v| v.parse().ok())
                .unwrap_or(DEFAULT_PORT),
            // The tick loop panics on a zero period, so 0 is clamped up.
            update_interval_ms: get("UPDATE_INTERVAL_MS")
                .and_then(|v| v.parse::<u64>().ok())
                .map(|ms| ms.max(1))
                .unwrap_or(DEFAULT_UPDATE_INTERVAL_MS),
        }
    }
}
