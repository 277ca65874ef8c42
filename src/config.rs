//! Machine configuration.

use std::str::FromStr;
use std::time::Duration;

use tokio::time::MissedTickBehavior;

use crate::tick::IntervalTicks;

/// Default period between interval ticks (roughly one 60Hz frame).
pub const DEFAULT_TICK_PERIOD: Duration = Duration::from_millis(16);

/// Default capacity of the failed-transition broadcast channel.
pub const DEFAULT_ERROR_CAPACITY: usize = 64;

/// Errors building a [`MachineConfig`] or a tick source from it.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid duration {value:?}: {source}")]
    InvalidDuration {
        value: String,
        #[source]
        source: humantime::DurationError,
    },
    #[error("tick period must be greater than zero")]
    ZeroTickPeriod,
    #[error("error channel capacity must be greater than zero")]
    ZeroErrorCapacity,
    #[error("unknown missed tick policy {0:?} (expected burst, delay or skip)")]
    UnknownMissedTicks(String),
}

/// What an interval tick source does when the machine falls behind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MissedTicks {
    /// Fire missed ticks back to back until caught up.
    Burst,
    /// Restart the period from the moment the late tick was taken.
    #[default]
    Delay,
    /// Drop missed ticks and wait for the next aligned one.
    Skip,
}

impl From<MissedTicks> for MissedTickBehavior {
    fn from(missed: MissedTicks) -> Self {
        match missed {
            MissedTicks::Burst => Self::Burst,
            MissedTicks::Delay => Self::Delay,
            MissedTicks::Skip => Self::Skip,
        }
    }
}

impl FromStr for MissedTicks {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "burst" => Ok(Self::Burst),
            "delay" => Ok(Self::Delay),
            "skip" => Ok(Self::Skip),
            _ => Err(ConfigError::UnknownMissedTicks(s.to_string())),
        }
    }
}

/// Settings for a [`StateMachine`](crate::StateMachine) and its interval
/// ticks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MachineConfig {
    /// Period of [`IntervalTicks`] built by [`MachineConfig::interval_ticks`].
    pub tick_period: Duration,
    pub missed_ticks: MissedTicks,
    /// Failed transitions a slow error subscriber may fall behind by before
    /// it starts missing them.
    pub error_capacity: usize,
}

impl Default for MachineConfig {
    fn default() -> Self {
        Self {
            tick_period: DEFAULT_TICK_PERIOD,
            missed_ticks: MissedTicks::default(),
            error_capacity: DEFAULT_ERROR_CAPACITY,
        }
    }
}

impl MachineConfig {
    /// Parses a human readable period such as `"16ms"` or `"1s 500ms"`.
    pub fn parse_tick_period(value: &str) -> Result<Duration, ConfigError> {
        let period =
            humantime::parse_duration(value).map_err(|source| ConfigError::InvalidDuration {
                value: value.to_string(),
                source,
            })?;
        if period.is_zero() {
            return Err(ConfigError::ZeroTickPeriod);
        }
        Ok(period)
    }

    /// Sets the tick period from a human readable string.
    pub fn with_tick_period(mut self, value: &str) -> Result<Self, ConfigError> {
        self.tick_period = Self::parse_tick_period(value)?;
        Ok(self)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tick_period.is_zero() {
            return Err(ConfigError::ZeroTickPeriod);
        }
        if self.error_capacity == 0 {
            return Err(ConfigError::ZeroErrorCapacity);
        }
        Ok(())
    }

    /// Builds an interval tick source with this period and missed tick
    /// policy. Must be called from within a Tokio runtime.
    pub fn interval_ticks(&self) -> Result<IntervalTicks, ConfigError> {
        IntervalTicks::new(self.tick_period, self.missed_ticks)
    }
}
