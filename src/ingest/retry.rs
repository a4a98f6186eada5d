use std::time::Duration;

use crate::logging::{self, Component};

/// Configuration for retry logic
#[derive(Debug, Clone)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub exponential_base: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_secs(5),
            max_delay: Duration::from_secs(30),
            exponential_base: 2.0,
        }
    }
}

impl RetryConfig {
    /// Delay to wait after failed attempt number `attempt` (1-based).
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let factor = self.exponential_base.powi(attempt.saturating_sub(1) as i32);
        let millis = self.initial_delay.as_millis() as f64 * factor;
        Duration::from_millis(millis as u64).min(self.max_delay)
    }
}

/// Run a blocking operation with exponential backoff retry.
///
/// `should_retry` decides whether an error is worth another attempt; errors
/// it rejects are returned immediately. Returns the last error once
/// `max_attempts` is exhausted, along with the number of attempts made.
pub fn retry_with_backoff<T, E, F, R>(
    config: &RetryConfig,
    operation_name: &str,
    mut operation: F,
    should_retry: R,
) -> Result<T, (E, u32)>
where
    F: FnMut(u32) -> Result<T, E>,
    R: Fn(&E) -> bool,
    E: std::fmt::Display,
{
    let mut attempt = 0;

    loop {
        attempt += 1;

        match operation(attempt) {
            Ok(result) => {
                if attempt > 1 {
                    logging::warn(
                        Component::Extract,
                        None,
                        &format!("'{}' succeeded after {} attempts", operation_name, attempt),
                    );
                }
                return Ok(result);
            }
            Err(error) => {
                if !should_retry(&error) || attempt >= config.max_attempts {
                    return Err((error, attempt));
                }

                let delay = config.delay_after(attempt);
                logging::warn(
                    Component::Extract,
                    None,
                    &format!(
                        "'{}' failed (attempt {}/{}): {}. Retrying in {:?}",
                        operation_name, attempt, config.max_attempts, error, delay
                    ),
                );
                std::thread::sleep(delay);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fast_config(max_attempts: u32) -> RetryConfig {
        RetryConfig {
            max_attempts,
            initial_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(5),
            exponential_base: 2.0,
        }
    }

    #[test]
    fn test_retry_success_on_third_attempt() {
        let result: Result<u32, (String, u32)> = retry_with_backoff(
            &fast_config(3),
            "test_operation",
            |attempt| if attempt < 3 { Err(format!("attempt {}", attempt)) } else { Ok(attempt) },
            |_| true,
        );
        assert_eq!(result, Ok(3));
    }

    #[test]
    fn test_retry_gives_up_after_max_attempts() {
        let mut calls = 0;
        let result: Result<(), (String, u32)> = retry_with_backoff(
            &fast_config(3),
            "test_operation",
            |_| {
                calls += 1;
                Err("still down".to_string())
            },
            |_| true,
        );
        assert_eq!(result, Err(("still down".to_string(), 3)));
        assert_eq!(calls, 3);
    }

    #[test]
    fn test_non_retryable_error_returns_immediately() {
        let mut calls = 0;
        let result: Result<(), (String, u32)> = retry_with_backoff(
            &fast_config(5),
            "test_operation",
            |_| {
                calls += 1;
                Err("fatal".to_string())
            },
            |e| e != "fatal",
        );
        assert_eq!(result, Err(("fatal".to_string(), 1)));
        assert_eq!(calls, 1);
    }

    #[test]
    fn test_delay_grows_and_is_capped() {
        let config = RetryConfig {
            max_attempts: 5,
            initial_delay: Duration::from_secs(5),
            max_delay: Duration::from_secs(12),
            exponential_base: 2.0,
        };
        assert_eq!(config.delay_after(1), Duration::from_secs(5));
        assert_eq!(config.delay_after(2), Duration::from_secs(10));
        assert_eq!(config.delay_after(3), Duration::from_secs(12));
    }
}
