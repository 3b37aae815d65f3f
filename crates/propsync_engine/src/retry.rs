//! Retry scheduling with exponential backoff.

use crate::config::RetryConfig;
use crate::error::{DefaultClassifier, ErrorClassifier, FailureClass, SyncError};
use crate::executor::OperationExecutor;
use propsync_queue::SyncOperation;
use std::sync::Arc;
use std::time::Duration;

/// Outcome of a single execution attempt.
#[derive(Debug)]
pub enum AttemptOutcome {
    /// The executor succeeded; the operation is done.
    Success,
    /// A retryable failure with budget remaining; the backoff delay has
    /// already elapsed and the caller must requeue the operation.
    Retry {
        /// The delay that was waited before returning.
        delay: Duration,
    },
    /// A fatal failure or exhausted budget; the operation is terminal.
    Fatal {
        /// The failure that ended the operation.
        error: SyncError,
    },
}

/// Wraps executor calls with failure classification and backoff.
///
/// One call makes exactly one attempt. On a retryable failure the
/// operation's `retry_count` is incremented, the backoff delay
/// `min(max_delay, base_delay * multiplier^(retry_count - 1))` is slept,
/// and the caller requeues the operation for the next pass. The operation
/// becomes terminal exactly when `retry_count` reaches its `max_retries`,
/// or immediately on a fatal classification.
pub struct RetryScheduler {
    config: RetryConfig,
    classifier: Arc<dyn ErrorClassifier>,
}

impl RetryScheduler {
    /// Creates a scheduler with the default classifier.
    pub fn new(config: RetryConfig) -> Self {
        Self {
            config,
            classifier: Arc::new(DefaultClassifier),
        }
    }

    /// Creates a scheduler with a custom classifier.
    pub fn with_classifier(config: RetryConfig, classifier: Arc<dyn ErrorClassifier>) -> Self {
        Self { config, classifier }
    }

    /// The retry configuration.
    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    /// Makes one execution attempt for `operation`.
    pub fn execute(
        &self,
        operation: &mut SyncOperation,
        executor: &dyn OperationExecutor,
        timeout: Duration,
    ) -> AttemptOutcome {
        let error = match executor.execute(&operation.payload, timeout) {
            Ok(()) => return AttemptOutcome::Success,
            Err(e) => e,
        };

        operation.record_error(error.to_string());

        if self.classifier.classify(&error) == FailureClass::Fatal {
            tracing::debug!(id = %operation.id, kind = %operation.kind, %error, "fatal failure");
            return AttemptOutcome::Fatal { error };
        }

        operation.retry_count += 1;
        if operation.is_exhausted() {
            tracing::debug!(
                id = %operation.id,
                kind = %operation.kind,
                retries = operation.retry_count,
                "retry budget exhausted"
            );
            return AttemptOutcome::Fatal { error };
        }

        let delay = self.config.delay_for_attempt(operation.retry_count);
        tracing::debug!(
            id = %operation.id,
            kind = %operation.kind,
            retry = operation.retry_count,
            ?delay,
            "retryable failure, backing off"
        );
        std::thread::sleep(delay);
        AttemptOutcome::Retry { delay }
    }
}
