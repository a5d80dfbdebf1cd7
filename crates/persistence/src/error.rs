//! Store error taxonomy and classification.
//!
//! Every failure coming out of the store is classified exactly once, here,
//! into a closed set of kinds. The connection manager only retries
//! [`StoreError::Transient`]; all other kinds propagate unchanged.

use std::fmt;
use std::io::ErrorKind;

use thiserror::Error;
use validator::ValidationErrors;

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// The flavours of failure that are expected to clear up on retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransientKind {
    /// The connection could not be established or was lost.
    Connection,
    /// Establishing the connection took too long.
    ConnectionTimedOut,
    /// The server actively refused the connection.
    ConnectionRefused,
    /// A generic database-level failure (resources, serialization, shutdown).
    Database,
    /// The operation did not complete within its time limit.
    Timeout,
}

impl TransientKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransientKind::Connection => "connection",
            TransientKind::ConnectionTimedOut => "connection_timed_out",
            TransientKind::ConnectionRefused => "connection_refused",
            TransientKind::Database => "database",
            TransientKind::Timeout => "timeout",
        }
    }
}

impl fmt::Display for TransientKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classified store failure.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum StoreError {
    /// The caller supplied invalid input. Never retried.
    #[error("Validation error: {0}")]
    Validation(String),

    /// No row matched.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Connection, timeout or generic database failure. Retried.
    #[error("Transient store error ({kind}): {message}")]
    Transient { kind: TransientKind, message: String },

    /// No pooled connection became free before the acquire deadline.
    #[error("No connection available within {waited_ms} ms")]
    PoolExhausted { waited_ms: u64 },

    /// Constraint violations, malformed queries, bad configuration. Never retried.
    #[error("Store error: {0}")]
    Terminal(String),
}

impl StoreError {
    pub fn transient(kind: TransientKind, message: impl Into<String>) -> Self {
        StoreError::Transient {
            kind,
            message: message.into(),
        }
    }

    pub fn terminal(message: impl Into<String>) -> Self {
        StoreError::Terminal(message.into())
    }

    /// Whether the retry policy applies to this error.
    pub fn is_transient(&self) -> bool {
        matches!(self, StoreError::Transient { .. })
    }

    /// Whether the connection that produced this error should not go back to the pool.
    pub fn poisons_connection(&self) -> bool {
        matches!(
            self,
            StoreError::Transient {
                kind: TransientKind::Connection
                    | TransientKind::ConnectionTimedOut
                    | TransientKind::ConnectionRefused
                    | TransientKind::Timeout,
                ..
            }
        )
    }
}

/// Classifies a Postgres SQLSTATE code. `None` means the error is terminal.
pub fn classify_sqlstate(code: &str) -> Option<TransientKind> {
    match code {
        // query_canceled, raised by statement_timeout
        "57014" => Some(TransientKind::Timeout),
        // sqlserver_rejected_establishment_of_sqlconnection
        "08004" => Some(TransientKind::ConnectionRefused),
        // admin_shutdown, crash_shutdown, cannot_connect_now
        "57P01" | "57P02" | "57P03" => Some(TransientKind::Connection),
        _ => match code.get(..2) {
            Some("08") => Some(TransientKind::Connection),
            Some("28") => Some(TransientKind::ConnectionRefused),
            // data exception, integrity constraint violation, syntax error or
            // access rule violation, feature not supported, invalid catalog name
            Some("22") | Some("23") | Some("42") | Some("0A") | Some("3D") | Some("44") => None,
            _ => Some(TransientKind::Database),
        },
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => StoreError::NotFound("Row not found".into()),
            sqlx::Error::PoolTimedOut => StoreError::PoolExhausted { waited_ms: 0 },
            sqlx::Error::PoolClosed => StoreError::terminal("Connection pool is closed"),
            sqlx::Error::Io(io) => {
                let kind = match io.kind() {
                    ErrorKind::ConnectionRefused => TransientKind::ConnectionRefused,
                    ErrorKind::TimedOut => TransientKind::ConnectionTimedOut,
                    _ => TransientKind::Connection,
                };
                StoreError::transient(kind, io.to_string())
            }
            sqlx::Error::Tls(e) => StoreError::transient(TransientKind::Connection, e.to_string()),
            sqlx::Error::Protocol(msg) => StoreError::transient(TransientKind::Connection, msg),
            sqlx::Error::WorkerCrashed => {
                StoreError::transient(TransientKind::Connection, "Connection worker crashed")
            }
            sqlx::Error::Database(db_err) => {
                let message = db_err.message().to_string();
                match db_err.code() {
                    Some(code) => match classify_sqlstate(&code) {
                        Some(kind) => StoreError::transient(kind, message),
                        None => StoreError::Terminal(format!("{} (SQLSTATE {})", message, code)),
                    },
                    None => StoreError::transient(TransientKind::Database, message),
                }
            }
            other => StoreError::Terminal(other.to_string()),
        }
    }
}

impl From<ValidationErrors> for StoreError {
    fn from(errors: ValidationErrors) -> Self {
        let mut messages: Vec<String> = errors
            .field_errors()
            .iter()
            .flat_map(|(field, errors)| {
                errors.iter().map(move |e| match &e.message {
                    Some(message) => format!("{}: {}", field, message),
                    None => format!("{}: {}", field, e.code),
                })
            })
            .collect();
        messages.sort();
        StoreError::Validation(messages.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use validator::ValidationError;

    #[test]
    fn test_sqlstate_constraint_violations_are_terminal() {
        assert_eq!(classify_sqlstate("23505"), None);
        assert_eq!(classify_sqlstate("23502"), None);
        assert_eq!(classify_sqlstate("42601"), None);
        assert_eq!(classify_sqlstate("42P01"), None);
        assert_eq!(classify_sqlstate("22001"), None);
    }

    #[test]
    fn test_sqlstate_connection_failures_are_transient() {
        assert_eq!(classify_sqlstate("08006"), Some(TransientKind::Connection));
        assert_eq!(classify_sqlstate("08001"), Some(TransientKind::Connection));
        assert_eq!(classify_sqlstate("08004"), Some(TransientKind::ConnectionRefused));
        assert_eq!(classify_sqlstate("57P01"), Some(TransientKind::Connection));
        assert_eq!(classify_sqlstate("28P01"), Some(TransientKind::ConnectionRefused));
    }

    #[test]
    fn test_sqlstate_generic_database_errors_are_transient() {
        assert_eq!(classify_sqlstate("40001"), Some(TransientKind::Database));
        assert_eq!(classify_sqlstate("40P01"), Some(TransientKind::Database));
        assert_eq!(classify_sqlstate("53300"), Some(TransientKind::Database));
        assert_eq!(classify_sqlstate("57014"), Some(TransientKind::Timeout));
    }

    #[test]
    fn test_io_errors_are_classified_by_kind() {
        let refused = std::io::Error::new(ErrorKind::ConnectionRefused, "refused");
        assert_eq!(
            StoreError::from(sqlx::Error::Io(refused)),
            StoreError::transient(TransientKind::ConnectionRefused, "refused")
        );

        let timed_out = std::io::Error::new(ErrorKind::TimedOut, "slow");
        let err = StoreError::from(sqlx::Error::Io(timed_out));
        assert!(matches!(
            err,
            StoreError::Transient {
                kind: TransientKind::ConnectionTimedOut,
                ..
            }
        ));

        let reset = std::io::Error::new(ErrorKind::ConnectionReset, "reset");
        let err = StoreError::from(sqlx::Error::Io(reset));
        assert!(err.is_transient());
        assert!(err.poisons_connection());
    }

    #[test]
    fn test_sqlx_pool_and_row_errors() {
        assert!(matches!(
            StoreError::from(sqlx::Error::RowNotFound),
            StoreError::NotFound(_)
        ));
        assert!(matches!(
            StoreError::from(sqlx::Error::PoolTimedOut),
            StoreError::PoolExhausted { .. }
        ));
        assert!(matches!(
            StoreError::from(sqlx::Error::PoolClosed),
            StoreError::Terminal(_)
        ));
        assert!(StoreError::from(sqlx::Error::Protocol("bad frame".into())).is_transient());
    }

    #[test]
    fn test_only_transient_errors_retry() {
        assert!(StoreError::transient(TransientKind::Database, "x").is_transient());
        assert!(!StoreError::Validation("x".into()).is_transient());
        assert!(!StoreError::NotFound("x".into()).is_transient());
        assert!(!StoreError::PoolExhausted { waited_ms: 10 }.is_transient());
        assert!(!StoreError::Terminal("x".into()).is_transient());
    }

    #[test]
    fn test_database_kind_keeps_connection() {
        assert!(!StoreError::transient(TransientKind::Database, "x").poisons_connection());
        assert!(StoreError::transient(TransientKind::Timeout, "x").poisons_connection());
    }

    #[test]
    fn test_from_validation_errors() {
        let mut errors = ValidationErrors::new();
        let mut err = ValidationError::new("required");
        err.message = Some("Title can not be empty".into());
        errors.add("title", err);

        assert_eq!(
            StoreError::from(errors),
            StoreError::Validation("title: Title can not be empty".into())
        );
    }

    #[test]
    fn test_display() {
        assert_eq!(
            StoreError::transient(TransientKind::ConnectionRefused, "nope").to_string(),
            "Transient store error (connection_refused): nope"
        );
        assert_eq!(
            StoreError::PoolExhausted { waited_ms: 30000 }.to_string(),
            "No connection available within 30000 ms"
        );
    }
}
