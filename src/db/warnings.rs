use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;
use uuid::Uuid;

use crate::error::Result;

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct WarningRecord {
    pub id: Uuid,
    pub reason: String,
    pub moderator: String,
    #[serde(rename = "moderatorId")]
    pub moderator_id: u64,
    pub timestamp: DateTime<Utc>,
}

impl WarningRecord {
    pub fn new(reason: &str, moderator: &str, moderator_id: u64) -> Self {
        WarningRecord {
            id: Uuid::new_v4(),
            reason: reason.to_string(),
            moderator: moderator.to_string(),
            moderator_id,
            timestamp: Utc::now(),
        }
    }
}

type WarningDocument = HashMap<u64, HashMap<u64, Vec<WarningRecord>>>;

// Flat JSON store of moderator-issued warnings, keyed by guild and user.
#[derive(Debug)]
pub struct WarningStore {
    path: PathBuf,
    entries: Mutex<WarningDocument>,
}

impl WarningStore {
    pub fn load(path: &Path) -> Self {
        let entries = match fs::read_to_string(path) {
            Ok(raw) => match serde_json::from_str(&raw) {
                Ok(parsed) => parsed,
                Err(err) => {
                    warn!("Can't parse the warnings document: {}", err);
                    HashMap::new()
                }
            },
            Err(_) => HashMap::new(),
        };

        WarningStore {
            path: path.to_path_buf(),
            entries: Mutex::new(entries),
        }
    }

    // Appends a warning and returns the user's new total.
    pub fn add(&self, guild_id: u64, user_id: u64, record: WarningRecord) -> Result<usize> {
        let (snapshot, total) = {
            let mut entries = self.entries.lock().unwrap();
            let user_warnings = entries
                .entry(guild_id)
                .or_default()
                .entry(user_id)
                .or_default();
            user_warnings.push(record);
            (entries.clone(), entries[&guild_id][&user_id].len())
        };
        self.save(&snapshot)?;
        Ok(total)
    }

    pub fn list(&self, guild_id: u64, user_id: u64) -> Vec<WarningRecord> {
        self.entries
            .lock()
            .unwrap()
            .get(&guild_id)
            .and_then(|guild| guild.get(&user_id))
            .cloned()
            .unwrap_or_default()
    }

    fn save(&self, entries: &WarningDocument) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let raw = serde_json::to_string_pretty(entries)?;
        fs::write(&self.path, raw)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use uuid::Uuid;

    use crate::db::warnings::{WarningRecord, WarningStore};

    fn temp_path() -> std::path::PathBuf {
        std::env::temp_dir().join(format!("hearthguard-warnings-{}.json", Uuid::new_v4()))
    }

    #[test]
    fn test_empty_store_lists_nothing() {
        let store = WarningStore::load(&temp_path());
        assert_eq!(store.list(1, 2).is_empty(), true);
    }

    #[test]
    fn test_add_returns_the_running_total() {
        let path = temp_path();
        let store = WarningStore::load(&path);

        let first = store
            .add(1, 2, WarningRecord::new("spamming", "Mod", 9))
            .unwrap();
        let second = store
            .add(1, 2, WarningRecord::new("caps", "Mod", 9))
            .unwrap();

        assert_eq!(first, 1);
        assert_eq!(second, 2);
        assert_eq!(store.list(1, 2).len(), 2);

        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn test_warnings_round_trip_through_disk() {
        let path = temp_path();
        let store = WarningStore::load(&path);
        store
            .add(1, 2, WarningRecord::new("spamming", "Mod", 9))
            .unwrap();

        let reloaded = WarningStore::load(&path);
        let records = reloaded.list(1, 2);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].reason, "spamming");
        assert_eq!(records[0].moderator_id, 9);

        std::fs::remove_file(&path).ok();
    }
}
