//! Error types and failure classification.

use thiserror::Error;

/// Result type for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Errors that can occur while executing or coordinating sync operations.
#[derive(Error, Debug, Clone)]
pub enum SyncError {
    /// Network unreachable, connection dropped, DNS failure.
    #[error("connectivity error: {message}")]
    Connectivity {
        /// Error message.
        message: String,
    },

    /// Remote service failed (5xx-equivalent).
    #[error("remote service error: {message}")]
    RemoteService {
        /// Error message.
        message: String,
    },

    /// The remote rejected the operation (4xx-equivalent): malformed
    /// payload, permission denied, and similar. Never retried.
    #[error("operation rejected: {message}")]
    ClientRejection {
        /// Error message.
        message: String,
    },

    /// The executor's call exceeded the supplied timeout.
    #[error("operation timed out")]
    Timeout,

    /// A drain was requested while offline.
    #[error("offline: drain refused")]
    Offline,

    /// No executor is registered for the operation's kind.
    ///
    /// Typically a restored snapshot referencing a registration that was
    /// not re-established; a configuration error, permanent for that
    /// operation.
    #[error("no executor registered for kind {kind:?}")]
    UnregisteredKind {
        /// The unresolved kind tag.
        kind: String,
    },

    /// Queue snapshot encoding or storage failed.
    #[error("snapshot error: {0}")]
    Snapshot(String),

    /// Sync was cancelled.
    #[error("sync cancelled")]
    Cancelled,
}

impl SyncError {
    /// Creates a connectivity error.
    pub fn connectivity(message: impl Into<String>) -> Self {
        Self::Connectivity {
            message: message.into(),
        }
    }

    /// Creates a remote service error.
    pub fn remote_service(message: impl Into<String>) -> Self {
        Self::RemoteService {
            message: message.into(),
        }
    }

    /// Creates a client rejection error.
    pub fn client_rejection(message: impl Into<String>) -> Self {
        Self::ClientRejection {
            message: message.into(),
        }
    }

    /// Returns true if this error permits another attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            SyncError::Connectivity { .. } | SyncError::RemoteService { .. } | SyncError::Timeout
        )
    }
}

impl From<propsync_queue::SnapshotError> for SyncError {
    fn from(e: propsync_queue::SnapshotError) -> Self {
        SyncError::Snapshot(e.to_string())
    }
}

/// Whether a failed attempt may be tried again.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureClass {
    /// Further attempts are permitted up to the retry budget.
    Retryable,
    /// The operation is terminal regardless of remaining budget.
    Fatal,
}

/// Pluggable classifier deciding whether a failure is worth retrying.
pub trait ErrorClassifier: Send + Sync {
    /// Classifies an executor failure.
    fn classify(&self, error: &SyncError) -> FailureClass;
}

/// Default classification: connectivity, timeout and server-side errors are
/// retryable; client rejections and unregistered kinds are fatal. Anything
/// unrecognized defaults to retryable so work is never silently dropped on
/// an unfamiliar failure shape.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultClassifier;

impl ErrorClassifier for DefaultClassifier {
    fn classify(&self, error: &SyncError) -> FailureClass {
        match error {
            SyncError::ClientRejection { .. }
            | SyncError::UnregisteredKind { .. }
            | SyncError::Cancelled => FailureClass::Fatal,
            _ => FailureClass::Retryable,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_errors() {
        assert!(SyncError::connectivity("connection reset").is_retryable());
        assert!(SyncError::remote_service("internal error").is_retryable());
        assert!(SyncError::Timeout.is_retryable());
        assert!(!SyncError::client_rejection("bad payload").is_retryable());
        assert!(!SyncError::Cancelled.is_retryable());
        assert!(!SyncError::Offline.is_retryable());
    }

    #[test]
    fn default_classification() {
        let classifier = DefaultClassifier;
        assert_eq!(
            classifier.classify(&SyncError::connectivity("down")),
            FailureClass::Retryable
        );
        assert_eq!(
            classifier.classify(&SyncError::remote_service("503")),
            FailureClass::Retryable
        );
        assert_eq!(
            classifier.classify(&SyncError::Timeout),
            FailureClass::Retryable
        );
        assert_eq!(
            classifier.classify(&SyncError::client_rejection("403")),
            FailureClass::Fatal
        );
        assert_eq!(
            classifier.classify(&SyncError::UnregisteredKind {
                kind: "ghost".into()
            }),
            FailureClass::Fatal
        );
        // Unknown shapes lean retryable.
        assert_eq!(
            classifier.classify(&SyncError::Snapshot("odd".into())),
            FailureClass::Retryable
        );
    }

    #[test]
    fn error_display() {
        let err = SyncError::UnregisteredKind {
            kind: "file_upload".into(),
        };
        assert!(err.to_string().contains("file_upload"));

        assert_eq!(SyncError::Offline.to_string(), "offline: drain refused");
    }
}
