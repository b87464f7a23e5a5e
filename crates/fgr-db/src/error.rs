use std::fmt;

/// Coarse classification of a store failure, attached to error context so
/// operators can tell a lock timeout from a dropped connection.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StoreFault {
    /// `55P03` lock_not_available (lock_timeout elapsed).
    LockTimeout,
    /// `40001` serialization_failure or `40P01` deadlock_detected.
    Serialization,
    /// `23505` unique_violation.
    UniqueViolation { constraint: Option<String> },
    /// Socket, TLS, or pool acquisition failure.
    Connectivity,
    Other,
}

impl StoreFault {
    pub fn classify(err: &sqlx::Error) -> StoreFault {
        match err {
            sqlx::Error::Database(db_err) => match db_err.code().as_deref() {
                Some("55P03") => StoreFault::LockTimeout,
                Some("40001") | Some("40P01") => StoreFault::Serialization,
                Some("23505") => StoreFault::UniqueViolation {
                    constraint: db_err.constraint().map(|c| c.to_string()),
                },
                _ => StoreFault::Other,
            },
            sqlx::Error::Io(_)
            | sqlx::Error::Tls(_)
            | sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed
            | sqlx::Error::WorkerCrashed => StoreFault::Connectivity,
            _ => StoreFault::Other,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            StoreFault::LockTimeout => "lock_timeout",
            StoreFault::Serialization => "serialization",
            StoreFault::UniqueViolation { .. } => "unique_violation",
            StoreFault::Connectivity => "connectivity",
            StoreFault::Other => "other",
        }
    }
}

impl fmt::Display for StoreFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreFault::UniqueViolation {
                constraint: Some(c),
            } => write!(f, "unique_violation constraint={c}"),
            other => f.write_str(other.as_str()),
        }
    }
}

/// Wrap a driver error with the operation name and its fault class.
pub(crate) fn annotate(err: sqlx::Error, what: &str) -> anyhow::Error {
    let fault = StoreFault::classify(&err);
    anyhow::Error::new(err).context(format!("{what} failed fault={fault}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pool_timeout_is_connectivity() {
        assert_eq!(
            StoreFault::classify(&sqlx::Error::PoolTimedOut),
            StoreFault::Connectivity
        );
    }

    #[test]
    fn row_not_found_is_other() {
        assert_eq!(
            StoreFault::classify(&sqlx::Error::RowNotFound),
            StoreFault::Other
        );
    }

    #[test]
    fn annotation_names_operation_and_fault() {
        let err = annotate(sqlx::Error::PoolTimedOut, "load edges");
        assert_eq!(err.to_string(), "load edges failed fault=connectivity");
    }
}
