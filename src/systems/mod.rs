pub mod auto_role;
pub mod welcome;

use std::sync::Arc;

use tracing::warn;

use crate::db::config::GuildConfig;
use crate::gateway::Gateway;

// Posts a line to the guild's moderation log channel, when one is
// configured. Absence of the channel silently disables the feature.
pub async fn log_to_guild(gateway: &Arc<dyn Gateway>, config: &GuildConfig, content: &str) {
    let Some(channel_id) = config.logging_channel_id else {
        return;
    };
    if let Err(err) = gateway.send_message(channel_id, content).await {
        warn!("Can't post to the logging channel: {}", err);
    }
}
