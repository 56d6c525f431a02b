use std::env;

use chrono::{DateTime, FixedOffset, Local, Offset, TimeZone, Utc};
use thiserror::Error;

use crate::constants;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Environment variable '{0}' not set")]
    VarNotSet(&'static str),
    #[error("Invalid data service url '{0}': {1}")]
    InvalidUrl(String, url::ParseError),
    #[error("Unknown timezone '{0}'")]
    InvalidTimezone(String),
}

/// Endpoint of the aggregated-trades data service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataServiceConfig {
    pub url: String,
}

/// Network configuration as seen by the loaders.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkConfig {
    pub oasis_data_service: DataServiceConfig,
}

impl NetworkConfig {
    pub fn new(url: &str) -> Result<Self, ConfigError> {
        url::Url::parse(url).map_err(|e| ConfigError::InvalidUrl(url.into(), e))?;
        Ok(NetworkConfig {
            oasis_data_service: DataServiceConfig { url: url.into() },
        })
    }
}

/// Timezone charts are bucketed and floored in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChartClock {
    Local,
    Named(chrono_tz::Tz),
}

impl ChartClock {
    pub fn parse(name: &str) -> Result<Self, ConfigError> {
        name.parse::<chrono_tz::Tz>()
            .map(ChartClock::Named)
            .map_err(|_| ConfigError::InvalidTimezone(name.into()))
    }

    /// The given instant on this clock's wall time.
    pub fn at(&self, instant: &DateTime<Utc>) -> DateTime<FixedOffset> {
        match self {
            ChartClock::Local => instant.with_timezone(&Local).fixed_offset(),
            ChartClock::Named(tz) => instant.with_timezone(tz).fixed_offset(),
        }
    }

    /// Minutes east of UTC at the given instant.
    pub fn offset_minutes(&self, instant: &DateTime<Utc>) -> i32 {
        let offset = match self {
            ChartClock::Local => Local.offset_from_utc_datetime(&instant.naive_utc()).fix(),
            ChartClock::Named(tz) => tz.offset_from_utc_datetime(&instant.naive_utc()).fix(),
        };
        offset.local_minus_utc() / 60
    }

    /// Resolves a wall-clock time in this timezone, taking the earlier
    /// instant when it is ambiguous.
    pub fn resolve(&self, naive: &chrono::NaiveDateTime) -> Option<DateTime<Utc>> {
        match self {
            ChartClock::Local => Local
                .from_local_datetime(naive)
                .earliest()
                .map(|dt| dt.with_timezone(&Utc)),
            ChartClock::Named(tz) => tz
                .from_local_datetime(naive)
                .earliest()
                .map(|dt| dt.with_timezone(&Utc)),
        }
    }
}

/// Application configuration read from the environment.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub network: NetworkConfig,
    pub clock: ChartClock,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let url = env::var(constants::ENV_DATA_SERVICE_URL)
            .map_err(|_| ConfigError::VarNotSet(constants::ENV_DATA_SERVICE_URL))?;
        let clock = match env::var(constants::ENV_CHART_TIMEZONE) {
            Ok(name) if !name.trim().is_empty() => ChartClock::parse(name.trim())?,
            _ => ChartClock::Local,
        };

        Ok(AppConfig {
            network: NetworkConfig::new(&url)?,
            clock,
        })
    }

    /// Storage location only, the announcement command does not need the network.
    pub fn sqlite_file_from_env() -> String {
        env::var(constants::ENV_SQLITE_FILE)
            .unwrap_or_else(|_| constants::DEFAULT_SQLITE_FILE.into())
    }
}
