//! SQL text for the lock table. `table` is always a validated identifier.

pub(crate) fn create_table(table: &str) -> String {
    format!(
        "CREATE TABLE IF NOT EXISTS {} (
    lock_id VARCHAR(255) NOT NULL PRIMARY KEY,
    owner_id VARCHAR(255) NOT NULL,
    version BIGINT NOT NULL,
    lock_information_json_string VARCHAR(255) NOT NULL
)",
        table
    )
}

pub(crate) fn insert(table: &str) -> String {
    format!(
        "INSERT INTO {} (lock_id, owner_id, version, lock_information_json_string) VALUES (?1, ?2, ?3, ?4)",
        table
    )
}

pub(crate) fn update_with_version(table: &str) -> String {
    format!(
        "UPDATE {} SET version = ?1, lock_information_json_string = ?2 WHERE lock_id = ?3 AND owner_id = ?4 AND version = ?5",
        table
    )
}

pub(crate) fn delete_with_version(table: &str) -> String {
    format!(
        "DELETE FROM {} WHERE lock_id = ?1 AND owner_id = ?2 AND version = ?3",
        table
    )
}

pub(crate) fn select_payload(table: &str) -> String {
    format!(
        "SELECT lock_information_json_string FROM {} WHERE lock_id = ?1",
        table
    )
}

pub(crate) fn select_all(table: &str) -> String {
    format!(
        "SELECT lock_id, owner_id, version, lock_information_json_string FROM {}",
        table
    )
}

/// Milliseconds since the Unix epoch by the database's clock.
pub(crate) const SERVER_TIME_MILLIS: &str =
    "SELECT CAST(ROUND((julianday('now') - 2440587.5) * 86400000.0) AS INTEGER)";
