use log::{debug, warn};
use std::fmt::Display;

#[derive(Debug, PartialEq, Eq)]
pub enum RetryError<E> {
    /// Every attempt failed with a retryable error, the last one is kept.
    Exhausted { attempts: u32, last: E },

    /// An error which retrying can't fix.
    Fatal(E),
}

/// Runs `operation` up to `max_attempts` times, stopping at the first success. Only errors
/// accepted by `retryable` lead to another attempt, anything else is returned immediately.
pub fn bounded<T, E, R, F>(
    label: &str,
    max_attempts: u32,
    retryable: R,
    mut operation: F,
) -> Result<T, RetryError<E>>
where
    E: Display,
    R: Fn(&E) -> bool,
    F: FnMut(u32) -> Result<T, E>,
{
    let max_attempts = max_attempts.max(1);
    let mut attempt = 1;
    loop {
        match operation(attempt) {
            Ok(value) => {
                if attempt > 1 {
                    debug!("{} succeeded on attempt {}", label, attempt);
                }
                return Ok(value);
            }
            Err(error) if !retryable(&error) => return Err(RetryError::Fatal(error)),
            Err(error) => {
                warn!(
                    "{} failed (Attempt {} of {}): {}",
                    label, attempt, max_attempts, error
                );
                if attempt >= max_attempts {
                    return Err(RetryError::Exhausted {
                        attempts: attempt,
                        last: error,
                    });
                }
                attempt += 1;
            }
        }
    }
}
