use std::path::Path;
use std::sync::Arc;

use crate::activities::spam::SpamTracker;
use crate::activities::verify::VerificationSystem;
use crate::db::config::ConfigStore;
use crate::db::warnings::WarningStore;
use crate::gateway::Gateway;
use crate::registry::ActivityRegistry;

// Everything the command handlers and event listeners share. The
// registry is the single home of all ephemeral activity state.
pub struct BotState {
    pub registry: Arc<ActivityRegistry>,
    pub spam: SpamTracker,
    pub verify: VerificationSystem,
    pub config: ConfigStore,
    pub warnings: WarningStore,
    pub gateway: Arc<dyn Gateway>,
}

impl BotState {
    pub fn new(gateway: Arc<dyn Gateway>, data_dir: &Path) -> Self {
        let registry = Arc::new(ActivityRegistry::new());
        BotState {
            spam: SpamTracker::new(registry.clone()),
            verify: VerificationSystem::new(registry.clone()),
            config: ConfigStore::load(&data_dir.join("config.json")),
            warnings: WarningStore::load(&data_dir.join("warnings.json")),
            registry,
            gateway,
        }
    }
}
