use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::StorageError;

/// Fencing token supplied by the lock manager.
pub type Version = u64;

/// Metadata a lock manager keeps about a held lock.
///
/// Storage only reads `owner_id`; the rest is persisted as JSON and handed back
/// verbatim by `get`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockInformation {
    pub owner_id: String,
    pub version: Version,
    /// Reentrant acquisitions held by `owner_id`.
    pub lock_count: u32,
    /// Stored as an RFC 3339 string.
    pub lock_begin_time: DateTime<Utc>,
}

impl LockInformation {
    pub fn new(owner_id: impl Into<String>, version: Version) -> Self {
        LockInformation {
            owner_id: owner_id.into(),
            version,
            lock_count: 1,
            lock_begin_time: Utc::now(),
        }
    }

    /// Same holder, next version.
    pub fn with_version(&self, version: Version) -> Self {
        LockInformation {
            version,
            ..self.clone()
        }
    }

    pub fn to_json_string(&self) -> Result<String, StorageError> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json_str(json: &str) -> Result<Self, StorageError> {
        Ok(serde_json::from_str(json)?)
    }
}

/// One row of the lock table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockRecord {
    pub lock_id: String,
    pub owner_id: String,
    pub version: Version,
    pub lock_information_json_string: String,
}

impl LockRecord {
    /// Decode the stored payload.
    pub fn lock_information(&self) -> Result<LockInformation, StorageError> {
        LockInformation::from_json_str(&self.lock_information_json_string)
    }
}
