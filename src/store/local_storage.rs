use rusqlite::{params, Connection, OptionalExtension, Result};

/// Initializes the key-value table backing local storage.
pub fn create_table(conn: &Connection) -> Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS local_storage (
            key TEXT PRIMARY KEY NOT NULL,
            value TEXT NOT NULL
        );",
        [],
    )?;
    Ok(())
}

/// Returns the stored string for `key`, if any.
pub fn get_item(conn: &Connection, key: &str) -> Result<Option<String>> {
    conn.query_row(
        "SELECT value FROM local_storage WHERE key = ?1",
        [key],
        |row| row.get(0),
    )
    .optional()
}

/// Stores `value` under `key`. Uses REPLACE to overwrite an existing entry.
pub fn set_item(conn: &Connection, key: &str, value: &str) -> Result<()> {
    conn.execute(
        "REPLACE INTO local_storage (key, value) VALUES (?1, ?2)",
        params![key, value],
    )?;
    Ok(())
}
