use std::fmt;

use crate::lock_information::Version;

/// Error type for lock storage operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageError {
    /// Taking or returning a database connection failed.
    Connection(String),
    /// A conditional write affected zero rows: the expected owner/version no
    /// longer holds, or the row is gone.
    VersionMiss {
        lock_id: String,
        expected_version: Version,
    },
    /// No row exists for the lock id.
    LockNotFound(String),
    /// Create hit the primary-key constraint.
    LockAlreadyExists(String),
    /// The SQL statement itself failed.
    Execution(String),
    /// Creating the lock table failed.
    SchemaInit(String),
    /// Storage options are unusable.
    InvalidConfig(String),
    /// An argument cannot be stored (e.g. a version above `i64::MAX`).
    InvalidArgument(String),
    /// Lock information could not be encoded or decoded.
    Serde(String),
    /// The context was cancelled.
    Cancelled,
    /// The context deadline passed.
    DeadlineExceeded,
}

impl StorageError {
    pub fn is_version_miss(&self) -> bool {
        matches!(self, StorageError::VersionMiss { .. })
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, StorageError::LockNotFound(_))
    }

    /// True for `Cancelled` and `DeadlineExceeded`.
    pub fn is_context_error(&self) -> bool {
        matches!(self, StorageError::Cancelled | StorageError::DeadlineExceeded)
    }
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageError::Connection(msg) => write!(f, "connection error: {}", msg),
            StorageError::VersionMiss {
                lock_id,
                expected_version,
            } => write!(
                f,
                "version miss for lock {} (expected version {})",
                lock_id, expected_version
            ),
            StorageError::LockNotFound(lock_id) => write!(f, "lock not found: {}", lock_id),
            StorageError::LockAlreadyExists(lock_id) => {
                write!(f, "lock already exists: {}", lock_id)
            }
            StorageError::Execution(msg) => write!(f, "statement failed: {}", msg),
            StorageError::SchemaInit(msg) => write!(f, "schema init failed: {}", msg),
            StorageError::InvalidConfig(msg) => write!(f, "invalid storage config: {}", msg),
            StorageError::InvalidArgument(msg) => write!(f, "invalid argument: {}", msg),
            StorageError::Serde(msg) => write!(f, "lock information serialization error: {}", msg),
            StorageError::Cancelled => write!(f, "context cancelled"),
            StorageError::DeadlineExceeded => write!(f, "context deadline exceeded"),
        }
    }
}

impl std::error::Error for StorageError {}

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        StorageError::Serde(err.to_string())
    }
}
