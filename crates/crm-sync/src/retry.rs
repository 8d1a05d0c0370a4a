use crate::RemoteError;

use crm_config::RetryConfig;

use std::fmt::Display;
use std::time::Duration;

use log::{debug, info, warn};
use tokio::time::sleep;

/// Runs `operation` until it succeeds, fails with a non-retryable error, or
/// `config.max_attempts` attempts have been made. Delays grow by
/// `backoff_multiplier` up to `max_delay`, optionally jittered by 0.5x-1.5x.
pub async fn with_retry<F, Fut, T, E>(
    config: &RetryConfig,
    operation_name: &str,
    mut operation: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display + IsRetryable,
{
    let max_delay = config.max_delay();
    let mut delay = config.initial_delay();
    let mut attempts = 0;

    loop {
        attempts += 1;

        let error = match operation().await {
            Ok(result) => {
                if attempts > 1 {
                    info!("{operation_name} succeeded after {attempts} attempts");
                }
                return Ok(result);
            }
            Err(e) => e,
        };

        if !error.is_retryable() || attempts >= config.max_attempts {
            warn!("{operation_name} failed after {attempts} attempts: {error}");
            return Err(error);
        }

        let wait = if config.jitter {
            delay.mul_f64(0.5 + rand::random::<f64>())
        } else {
            delay
        };

        debug!("{operation_name} attempt {attempts} failed: {error}. Retrying in {wait:?}");
        sleep(wait).await;

        delay = delay.mul_f64(config.backoff_multiplier).min(max_delay);
    }
}

/// Errors that can tell whether an immediate retry may succeed.
pub trait IsRetryable {
    fn is_retryable(&self) -> bool;
}

impl IsRetryable for RemoteError {
    fn is_retryable(&self) -> bool {
        RemoteError::is_retryable(self)
    }
}

