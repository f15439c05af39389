//! Runtime configuration loaded from environment variables.
//!
//! Every setting has a default; a variable that is unset or fails to parse
//! falls back to it.
//!
//! | Variable | Default |
//! |----------|---------|
//! | `APEXSTATS_PORT` | `3000` |
//! | `APEXSTATS_DATABASE_URL` | `sqlite:apexstats.db?mode=rwc` |
//! | `APEXSTATS_RESOURCE_URL` | `https://stats-apex.vercel.app/api/stats` |
//! | `APEXSTATS_REFRESH_SECS` | `8` |
//! | `APEXSTATS_ATTEMPT_TIMEOUT_SECS` | `5` |
//! | `APEXSTATS_HISTORY_KEY` | `apexstats.activity_history` |

use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Deserializer};

/// Prefix shared by every variable; the rest of the name is the field name.
pub const ENV_PREFIX: &str = "APEXSTATS_";

/// Default port if not specified via environment variable.
pub const DEFAULT_PORT: u16 = 3000;

/// Default database path if not specified via environment variable.
pub const DEFAULT_DB_PATH: &str = "sqlite:apexstats.db?mode=rwc";

/// The upstream status feed.
pub const DEFAULT_RESOURCE_URL: &str = "https://stats-apex.vercel.app/api/stats";

pub const DEFAULT_REFRESH_SECS: u64 = 8;

pub const DEFAULT_ATTEMPT_TIMEOUT_SECS: u64 = 5;

/// Namespace key for the persisted history blob.
pub const DEFAULT_HISTORY_KEY: &str = "apexstats.activity_history";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub port: u16,
    pub database_url: String,
    pub resource_url: String,
    /// Interval between scheduled refresh cycles.
    pub refresh_interval: Duration,
    /// Upper bound on a single strategy attempt.
    pub attempt_timeout: Duration,
    pub history_key: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            database_url: DEFAULT_DB_PATH.to_string(),
            resource_url: DEFAULT_RESOURCE_URL.to_string(),
            refresh_interval: Duration::from_secs(DEFAULT_REFRESH_SECS),
            attempt_timeout: Duration::from_secs(DEFAULT_ATTEMPT_TIMEOUT_SECS),
            history_key: DEFAULT_HISTORY_KEY.to_string(),
        }
    }
}

/// Variables as they appear in the environment, with the prefix stripped.
#[derive(Debug, Default, Deserialize)]
struct EnvConfig {
    #[serde(default, deserialize_with = "lenient")]
    port: Option<u16>,
    database_url: Option<String>,
    resource_url: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    refresh_secs: Option<u64>,
    #[serde(default, deserialize_with = "lenient")]
    attempt_timeout_secs: Option<u64>,
    history_key: Option<String>,
}

/// Deserialize a value that may fail to parse as `None` instead of an error.
fn lenient<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: FromStr,
{
    let raw = String::deserialize(deserializer)?;
    Ok(raw.trim().parse().ok())
}

impl From<EnvConfig> for Config {
    fn from(env: EnvConfig) -> Self {
        let defaults = Self::default();
        // zero would mean "never tick" / "time out immediately"
        let secs = |value: Option<u64>, default: Duration| {
            value
                .filter(|s| *s > 0)
                .map(Duration::from_secs)
                .unwrap_or(default)
        };

        Self {
            port: env.port.unwrap_or(defaults.port),
            database_url: env.database_url.unwrap_or(defaults.database_url),
            resource_url: env.resource_url.unwrap_or(defaults.resource_url),
            refresh_interval: secs(env.refresh_secs, defaults.refresh_interval),
            attempt_timeout: secs(env.attempt_timeout_secs, defaults.attempt_timeout),
            history_key: env.history_key.unwrap_or(defaults.history_key),
        }
    }
}

impl Config {
    /// Load configuration from the process environment.
    pub fn from_env() -> Result<Self, envy::Error> {
        envy::prefixed(ENV_PREFIX).from_env::<EnvConfig>().map(Self::from)
    }

    /// Load configuration from an explicit set of `(name, value)` variables.
    pub fn from_vars<I>(vars: I) -> Result<Self, envy::Error>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        envy::prefixed(ENV_PREFIX)
            .from_iter::<_, EnvConfig>(vars)
            .map(Self::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_from(vars: &[(&str, &str)]) -> Config {
        Config::from_vars(vars.iter().map(|(k, v)| (k.to_string(), v.to_string()))).unwrap()
    }

    #[test]
    fn test_defaults() {
        assert_eq!(config_from(&[]), Config::default());
    }

    #[test]
    fn test_overrides() {
        let config = config_from(&[
            ("APEXSTATS_PORT", "8080"),
            ("APEXSTATS_RESOURCE_URL", "http://localhost:9000/stats"),
            ("APEXSTATS_REFRESH_SECS", "30"),
            ("APEXSTATS_ATTEMPT_TIMEOUT_SECS", " 2 "),
            ("APEXSTATS_HISTORY_KEY", "custom"),
        ]);

        assert_eq!(config.port, 8080);
        assert_eq!(config.resource_url, "http://localhost:9000/stats");
        assert_eq!(config.refresh_interval, Duration::from_secs(30));
        assert_eq!(config.attempt_timeout, Duration::from_secs(2));
        assert_eq!(config.history_key, "custom");
        assert_eq!(config.database_url, DEFAULT_DB_PATH);
    }

    #[test]
    fn test_invalid_values_fall_back() {
        let config = config_from(&[
            ("APEXSTATS_PORT", "not-a-port"),
            ("APEXSTATS_REFRESH_SECS", "0"),
            ("APEXSTATS_ATTEMPT_TIMEOUT_SECS", "-5"),
        ]);

        assert_eq!(config.port, DEFAULT_PORT);
        assert_eq!(config.refresh_interval, Duration::from_secs(DEFAULT_REFRESH_SECS));
        assert_eq!(
            config.attempt_timeout,
            Duration::from_secs(DEFAULT_ATTEMPT_TIMEOUT_SECS)
        );
    }

    #[test]
    fn test_unrelated_variables_are_ignored() {
        let config = config_from(&[
            ("PORT", "9999"),
            ("APEXSTATS_UNKNOWN", "x"),
            ("APEXSTATS_DATABASE_URL", "sqlite::memory:"),
        ]);

        assert_eq!(config.port, DEFAULT_PORT);
        assert_eq!(config.database_url, "sqlite::memory:");
    }
}
