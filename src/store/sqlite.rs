use rusqlite::{Connection, OpenFlags};

/// Opens (or creates) the database file with WAL journaling.
pub fn init_connection(path: &str) -> Result<Connection, String> {
    let conn = Connection::open_with_flags(
        path,
        OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_CREATE,
    )
    .map_err(|e| format!("fail to open sqlite file {}. {}", path, e))?;

    let mode: String = conn
        .query_row("PRAGMA journal_mode=WAL;", [], |row| row.get(0))
        .map_err(|e| format!("fail to execute PRAGMA journal_mode=WAL. {}", e))?;
    if !mode.eq_ignore_ascii_case("wal") {
        log::warn!("{} stays in journal mode {}", path, mode);
    }
    Ok(conn)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opens_file_in_wal_mode() {
        let path = std::env::temp_dir().join(format!("oasis_chart_{}.db", std::process::id()));
        let path = path.to_string_lossy().to_string();

        let conn = init_connection(&path).unwrap();
        let mode: String = conn
            .query_row("PRAGMA journal_mode;", [], |row| row.get(0))
            .unwrap();
        assert_eq!(mode.to_lowercase(), "wal");

        drop(conn);
        for suffix in ["", "-wal", "-shm"] {
            let _ = std::fs::remove_file(format!("{}{}", path, suffix));
        }
    }
}
