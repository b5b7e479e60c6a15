//! Configuration management for the task presenter.
//!
//! Configuration can be set via environment variables:
//! - `PRESENTER_TASK_PARAM` - Optional. Parameter handed to the data source. Defaults to `Task`.
//! - `PRESENTER_LOAD_DELAY_MS` - Optional. Delay of the stock data provider. Defaults to `5000`.
//! - `PRESENTER_FAILURE_RATE` - Optional. Failure probability of the stock provider, in `[0, 1]`. Defaults to `0.5`.
//! - `PRESENTER_BACKGROUND_WORKERS` - Optional. Worker threads of the background pool. Defaults to `4`.
//! - `PRESENTER_AWAIT_TIMEOUT_MS` - Optional. Upper bound on the safe-wait. Unset means no timeout.
//! - `PRESENTER_RUN_FOR_MS` - Optional. How long the demo host stays alive. Defaults to `8000`.

use std::time::Duration;
use thiserror::Error;

use crate::util::parse_or;

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("Invalid value for {0}: {1}")]
    InvalidValue(String, String),
}

/// Presenter configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Parameter passed to `DataSource::load`
    pub task_param: String,

    /// How long the stock data provider blocks
    pub load_delay: Duration,

    /// Probability that the stock data provider fails
    pub failure_rate: f64,

    /// Worker threads for the background pool
    pub background_workers: usize,

    /// Optional hardening timeout for the safe-wait
    pub await_timeout: Option<Duration>,

    /// Lifetime of the demo host before it is destroyed
    pub run_for: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            task_param: "Task".to_string(),
            load_delay: Duration::from_millis(5000),
            failure_rate: 0.5,
            background_workers: 4,
            await_timeout: None,
            run_for: Duration::from_millis(8000),
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if a variable is set but cannot be parsed
    /// or is out of range.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let task_param = lookup("PRESENTER_TASK_PARAM")
            .filter(|v| !v.trim().is_empty())
            .unwrap_or(defaults.task_param);

        let load_delay_ms: u64 = parse_or(
            lookup("PRESENTER_LOAD_DELAY_MS"),
            defaults.load_delay.as_millis() as u64,
        )
        .map_err(|e| invalid("PRESENTER_LOAD_DELAY_MS", e))?;

        let failure_rate: f64 = parse_or(lookup("PRESENTER_FAILURE_RATE"), defaults.failure_rate)
            .map_err(|e| invalid("PRESENTER_FAILURE_RATE", e))?;
        if !(0.0..=1.0).contains(&failure_rate) {
            return Err(invalid(
                "PRESENTER_FAILURE_RATE",
                format!("{} is outside [0, 1]", failure_rate),
            ));
        }

        let background_workers: usize = parse_or(
            lookup("PRESENTER_BACKGROUND_WORKERS"),
            defaults.background_workers,
        )
        .map_err(|e| invalid("PRESENTER_BACKGROUND_WORKERS", e))?;
        if background_workers == 0 {
            return Err(invalid(
                "PRESENTER_BACKGROUND_WORKERS",
                "must be at least 1".to_string(),
            ));
        }

        let await_timeout = match lookup("PRESENTER_AWAIT_TIMEOUT_MS") {
            Some(raw) if !raw.trim().is_empty() => {
                let ms: u64 = raw
                    .trim()
                    .parse()
                    .map_err(|e| invalid("PRESENTER_AWAIT_TIMEOUT_MS", format!("{}", e)))?;
                Some(Duration::from_millis(ms))
            }
            _ => None,
        };

        let run_for_ms: u64 = parse_or(
            lookup("PRESENTER_RUN_FOR_MS"),
            defaults.run_for.as_millis() as u64,
        )
        .map_err(|e| invalid("PRESENTER_RUN_FOR_MS", e))?;

        Ok(Self {
            task_param,
            load_delay: Duration::from_millis(load_delay_ms),
            failure_rate,
            background_workers,
            await_timeout,
            run_for: Duration::from_millis(run_for_ms),
        })
    }
}

fn invalid(name: &str, reason: String) -> ConfigError {
    ConfigError::InvalidValue(name.to_string(), reason)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn empty_environment_yields_defaults() {
        let config = Config::from_lookup(lookup_from(&[])).expect("defaults should load");
        assert_eq!(config, Config::default());
        assert_eq!(config.task_param, "Task");
        assert_eq!(config.await_timeout, None);
    }

    #[test]
    fn overrides_are_applied() {
        let config = Config::from_lookup(lookup_from(&[
            ("PRESENTER_TASK_PARAM", "Report"),
            ("PRESENTER_LOAD_DELAY_MS", "250"),
            ("PRESENTER_FAILURE_RATE", "1.0"),
            ("PRESENTER_BACKGROUND_WORKERS", "2"),
            ("PRESENTER_AWAIT_TIMEOUT_MS", "100"),
            ("PRESENTER_RUN_FOR_MS", "600"),
        ]))
        .expect("overrides should load");

        assert_eq!(config.task_param, "Report");
        assert_eq!(config.load_delay, Duration::from_millis(250));
        assert_eq!(config.failure_rate, 1.0);
        assert_eq!(config.background_workers, 2);
        assert_eq!(config.await_timeout, Some(Duration::from_millis(100)));
        assert_eq!(config.run_for, Duration::from_millis(600));
    }

    #[test]
    fn failure_rate_out_of_range_is_rejected() {
        let err = Config::from_lookup(lookup_from(&[("PRESENTER_FAILURE_RATE", "1.5")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue(ref name, _) if name == "PRESENTER_FAILURE_RATE"));
    }

    #[test]
    fn zero_workers_is_rejected() {
        let err = Config::from_lookup(lookup_from(&[("PRESENTER_BACKGROUND_WORKERS", "0")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue(ref name, _) if name == "PRESENTER_BACKGROUND_WORKERS"));
    }

    #[test]
    fn unparsable_delay_is_rejected() {
        let err = Config::from_lookup(lookup_from(&[("PRESENTER_LOAD_DELAY_MS", "soon")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue(ref name, _) if name == "PRESENTER_LOAD_DELAY_MS"));
    }

    #[test]
    fn blank_task_param_falls_back_to_default() {
        let config = Config::from_lookup(lookup_from(&[("PRESENTER_TASK_PARAM", "  ")])).unwrap();
        assert_eq!(config.task_param, "Task");
    }
}
