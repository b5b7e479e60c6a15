//! Data source contract and the stock blocking provider.
//!
//! A data source performs one blocking, fallible unit of work. It always runs
//! on the background pool, never on the foreground thread.

use std::time::{Duration, Instant};

use rand::Rng;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::config::Config;

/// Granularity at which the stock provider re-checks its cancellation token.
const CANCEL_POLL_INTERVAL: Duration = Duration::from_millis(25);

#[derive(Debug, Error, Clone, PartialEq)]
pub enum LoadError {
    #[error("Loading {param:?} failed: {reason}")]
    Failed { param: String, reason: String },

    #[error("Loading {param:?} was cancelled")]
    Cancelled { param: String },
}

/// A blocking operation producing a string for a parameter.
///
/// Implementations must be safe to call concurrently from several background
/// workers.
pub trait DataSource: Send + Sync {
    /// Run the operation to completion. May block for seconds.
    fn load(&self, param: &str) -> Result<String, LoadError>;

    /// Run the operation, giving up early once `cancel` fires.
    ///
    /// The default ignores the token; the caller discards late results anyway.
    fn load_cancellable(
        &self,
        param: &str,
        cancel: &CancellationToken,
    ) -> Result<String, LoadError> {
        let _ = cancel;
        self.load(param)
    }
}

/// Stock provider: sleeps, then fails at random.
#[derive(Debug, Clone)]
pub struct DataProvider {
    delay: Duration,
    failure_rate: f64,
}

impl DataProvider {
    /// Create a provider. `failure_rate` is clamped to `[0, 1]`; NaN means
    /// the provider never fails.
    pub fn new(delay: Duration, failure_rate: f64) -> Self {
        let failure_rate = if failure_rate.is_nan() {
            0.0
        } else {
            failure_rate.clamp(0.0, 1.0)
        };
        Self {
            delay,
            failure_rate,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.load_delay, config.failure_rate)
    }

    fn sleep(&self, param: &str, cancel: &CancellationToken) -> Result<(), LoadError> {
        let deadline = Instant::now() + self.delay;
        loop {
            if cancel.is_cancelled() {
                return Err(LoadError::Cancelled {
                    param: param.to_string(),
                });
            }
            let now = Instant::now();
            if now >= deadline {
                return Ok(());
            }
            std::thread::sleep(CANCEL_POLL_INTERVAL.min(deadline - now));
        }
    }
}

impl DataSource for DataProvider {
    fn load(&self, param: &str) -> Result<String, LoadError> {
        self.load_cancellable(param, &CancellationToken::new())
    }

    fn load_cancellable(
        &self,
        param: &str,
        cancel: &CancellationToken,
    ) -> Result<String, LoadError> {
        self.sleep(param, cancel)?;

        if rand::thread_rng().gen_bool(self.failure_rate) {
            tracing::debug!(param = %param, "DataProvider rolled a failure");
            return Err(LoadError::Failed {
                param: param.to_string(),
                reason: "unlucky roll".to_string(),
            });
        }

        Ok(format!("data for {}", param))
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_always_succeeds_at_zero_failure_rate() {
        let provider = DataProvider::new(Duration::ZERO, 0.0);
        assert_eq!(provider.load("Task").unwrap(), "data for Task");
    }

    #[test]
    fn provider_always_fails_at_full_failure_rate() {
        let provider = DataProvider::new(Duration::ZERO, 1.0);
        let err = provider.load("Task").unwrap_err();
        assert!(matches!(err, LoadError::Failed { ref param, .. } if param == "Task"));
    }

    #[test]
    fn provider_stops_early_when_cancelled() {
        let provider = DataProvider::new(Duration::from_secs(30), 0.0);
        let cancel = CancellationToken::new();
        cancel.cancel();

        let started = Instant::now();
        let err = provider.load_cancellable("Task", &cancel).unwrap_err();
        assert_eq!(
            err,
            LoadError::Cancelled {
                param: "Task".to_string()
            }
        );
        assert!(started.elapsed() < Duration::from_secs(1));
    }

    #[test]
    fn provider_observes_cancellation_mid_sleep() {
        let provider = DataProvider::new(Duration::from_secs(30), 0.0);
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        let canceller = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(50));
            trigger.cancel();
        });

        let started = Instant::now();
        assert!(provider.load_cancellable("Task", &cancel).is_err());
        assert!(started.elapsed() < Duration::from_secs(5));
        canceller.join().unwrap();
    }

    #[test]
    fn failure_rate_is_clamped() {
        let provider = DataProvider::new(Duration::ZERO, 3.0);
        assert!(provider.load("x").is_err());
        let provider = DataProvider::new(Duration::ZERO, -1.0);
        assert!(provider.load("x").is_ok());
    }

    #[test]
    fn nan_failure_rate_never_fails() {
        let provider = DataProvider::new(Duration::ZERO, f64::NAN);
        assert_eq!(provider.load("Task").unwrap(), "data for Task");
    }
}
