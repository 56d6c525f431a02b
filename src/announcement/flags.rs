use std::collections::HashMap;

use rusqlite::Connection;

use super::AnnouncementError;
use crate::constants;
use crate::store::local_storage;

/// Per-announcement "seen" flags.
pub trait SeenFlags {
    fn get(&self, id: &str) -> Result<bool, AnnouncementError>;
    fn set(&mut self, id: &str, seen: bool) -> Result<(), AnnouncementError>;
}

/// Flags kept for the lifetime of the process only.
#[derive(Debug, Default)]
pub struct MemoryFlags {
    seen: HashMap<String, bool>,
}

impl SeenFlags for MemoryFlags {
    fn get(&self, id: &str) -> Result<bool, AnnouncementError> {
        Ok(self.seen.get(id).copied().unwrap_or(false))
    }

    fn set(&mut self, id: &str, seen: bool) -> Result<(), AnnouncementError> {
        self.seen.insert(id.into(), seen);
        Ok(())
    }
}

/// Flags persisted as one JSON object under the `announcements` key of
/// local storage.
///
/// `set` reads the whole map, changes one entry and writes the whole map
/// back. Two writers racing on the same database can lose an update.
pub struct LocalStorageFlags {
    conn: Connection,
}

impl LocalStorageFlags {
    pub fn new(conn: Connection) -> Result<Self, AnnouncementError> {
        local_storage::create_table(&conn)?;
        Ok(LocalStorageFlags { conn })
    }

    fn read_all(&self) -> Result<HashMap<String, bool>, AnnouncementError> {
        match local_storage::get_item(&self.conn, constants::ANNOUNCEMENTS_KEY)? {
            Some(raw) => Ok(serde_json::from_str(&raw)?),
            None => Ok(HashMap::new()),
        }
    }
}

impl SeenFlags for LocalStorageFlags {
    fn get(&self, id: &str) -> Result<bool, AnnouncementError> {
        Ok(self.read_all()?.get(id).copied().unwrap_or(false))
    }

    fn set(&mut self, id: &str, seen: bool) -> Result<(), AnnouncementError> {
        let mut all = self.read_all()?;
        all.insert(id.into(), seen);
        log::debug!("announcement flags: {:?}", all);
        local_storage::set_item(
            &self.conn,
            constants::ANNOUNCEMENTS_KEY,
            &serde_json::to_string(&all)?,
        )?;
        Ok(())
    }
}
