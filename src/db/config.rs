use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::Result;

// Per-guild feature configuration, stored as one flat JSON document.
// An absent value means the feature is disabled for the guild.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct GuildConfig {
    #[serde(rename = "AUTO_ROLE_ID", default, skip_serializing_if = "Option::is_none")]
    pub auto_role_id: Option<u64>,
    #[serde(rename = "VERIFY_ROLE_ID", default, skip_serializing_if = "Option::is_none")]
    pub verify_role_id: Option<u64>,
    #[serde(
        rename = "VERIFY_TIMEOUT_MINUTES",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub verify_timeout_minutes: Option<u64>,
    #[serde(rename = "WELCOME_CHANNEL_ID", default, skip_serializing_if = "Option::is_none")]
    pub welcome_channel_id: Option<u64>,
    #[serde(rename = "GOODBYE_CHANNEL_ID", default, skip_serializing_if = "Option::is_none")]
    pub goodbye_channel_id: Option<u64>,
    #[serde(rename = "LOGGING_CHANNEL_ID", default, skip_serializing_if = "Option::is_none")]
    pub logging_channel_id: Option<u64>,
}

#[derive(Debug)]
pub struct ConfigStore {
    path: PathBuf,
    entries: Mutex<HashMap<u64, GuildConfig>>,
}

impl ConfigStore {
    // Loads the document from disk; a missing or broken file starts the
    // store empty rather than failing the boot.
    pub fn load(path: &Path) -> Self {
        let entries = match fs::read_to_string(path) {
            Ok(raw) => match serde_json::from_str(&raw) {
                Ok(parsed) => parsed,
                Err(err) => {
                    warn!("Can't parse the guild config document: {}", err);
                    HashMap::new()
                }
            },
            Err(_) => HashMap::new(),
        };

        ConfigStore {
            path: path.to_path_buf(),
            entries: Mutex::new(entries),
        }
    }

    pub fn get(&self, guild_id: u64) -> GuildConfig {
        self.entries
            .lock()
            .unwrap()
            .get(&guild_id)
            .cloned()
            .unwrap_or_default()
    }

    // Applies a change to one guild's config and writes the document back.
    pub fn update(&self, guild_id: u64, f: impl FnOnce(&mut GuildConfig)) -> Result<()> {
        let snapshot = {
            let mut entries = self.entries.lock().unwrap();
            f(entries.entry(guild_id).or_default());
            entries.clone()
        };
        self.save(&snapshot)
    }

    fn save(&self, entries: &HashMap<u64, GuildConfig>) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let raw = serde_json::to_string_pretty(entries)?;
        fs::write(&self.path, raw)?;
        Ok(())
    }
}
