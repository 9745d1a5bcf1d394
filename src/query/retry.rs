//! Bounded retry for reads that race asynchronous view builds
//!
//! Each attempt is classified as `Ready`, `Retry` or `Fatal`. Retries sleep
//! with exponential backoff capped at `max_delay` and stop after
//! `max_attempts`.

use crate::query::error::{QueryError, QueryResult};
use crate::store::{StoreError, StoreResult};
use std::future::Future;
use std::time::Duration;

/// Result of a single attempt
#[derive(Debug)]
pub enum Attempt<T> {
    Ready(T),
    /// Transient; try the same operation again
    Retry(StoreError),
    Fatal(StoreError),
}

impl<T> Attempt<T> {
    /// Classify a store result, treating `IndexMissing` as transient
    pub fn from_result(result: StoreResult<T>) -> Self {
        Self::classify(result, StoreError::is_index_missing)
    }

    /// Classify a store result with a custom transient predicate
    pub fn classify(result: StoreResult<T>, transient: impl Fn(&StoreError) -> bool) -> Self {
        match result {
            Ok(value) => Attempt::Ready(value),
            Err(e) if transient(&e) => Attempt::Retry(e),
            Err(e) => Attempt::Fatal(e),
        }
    }
}

/// How many times, and how patiently, to retry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 10,
            initial_delay: Duration::from_millis(50),
            max_delay: Duration::from_secs(2),
        }
    }
}

impl RetryPolicy {
    /// Delay before retry number `retry` (0-based)
    pub fn delay_for(&self, retry: u32) -> Duration {
        let factor = 2u32.saturating_pow(retry.min(16));
        self.initial_delay
            .saturating_mul(factor)
            .min(self.max_delay)
    }

    /// Run `op` until it is ready, fatal, or out of attempts
    pub async fn run<T, F, Fut>(&self, operation: &str, mut op: F) -> QueryResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Attempt<T>>,
    {
        let attempts = self.max_attempts.max(1);

        for attempt in 0..attempts {
            if attempt > 0 {
                tokio::time::sleep(self.delay_for(attempt - 1)).await;
            }

            match op().await {
                Attempt::Ready(value) => return Ok(value),
                Attempt::Fatal(e) => return Err(QueryError::Store(e)),
                Attempt::Retry(e) => {
                    tracing::debug!(
                        "{} attempt {}/{} not ready: {}",
                        operation,
                        attempt + 1,
                        attempts,
                        e
                    );
                }
            }
        }

        Err(QueryError::RetriesExhausted {
            operation: operation.to_string(),
            attempts,
        })
    }
}
