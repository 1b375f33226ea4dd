use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use crate::db::config::GuildConfig;
use crate::gateway::Gateway;

pub const ASSIGN_DELAY_MS: u64 = 1000;

// Assigns the configured role to a freshly joined member. Without a
// configured role the feature is disabled for the guild.
pub fn member_joined(
    gateway: &Arc<dyn Gateway>,
    config: &GuildConfig,
    guild_id: u64,
    user_id: u64,
) {
    let Some(role_id) = config.auto_role_id else {
        warn!("AUTO_ROLE_ID is not configured for guild {}", guild_id);
        return;
    };

    let gateway = gateway.clone();
    tokio::spawn(async move {
        // Small delay so the join settles before the role write.
        tokio::time::sleep(Duration::from_millis(ASSIGN_DELAY_MS)).await;
        match gateway
            .add_role(guild_id, user_id, role_id, "Auto role assignment on join")
            .await
        {
            Ok(()) => info!(
                "Auto role {} assigned to {} in guild {}",
                role_id, user_id, guild_id,
            ),
            Err(err) => warn!("Failed to assign auto role to {}: {}", user_id, err),
        }
    });
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use crate::db::config::GuildConfig;
    use crate::gateway::Gateway;
    use crate::gateway::testing::{GatewayCall, RecordingGateway};
    use crate::systems::auto_role::member_joined;

    #[tokio::test(start_paused = true)]
    async fn test_configured_role_is_assigned_after_the_delay() {
        let recording = Arc::new(RecordingGateway::new());
        let gateway: Arc<dyn Gateway> = recording.clone();
        let config = GuildConfig {
            auto_role_id: Some(500),
            ..GuildConfig::default()
        };

        member_joined(&gateway, &config, 1, 42);
        tokio::time::sleep(Duration::from_secs(2)).await;

        let calls = recording.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(
            calls[0],
            GatewayCall::AddRole {
                guild_id: 1,
                user_id: 42,
                role_id: 500,
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_without_configuration_nothing_happens() {
        let recording = Arc::new(RecordingGateway::new());
        let gateway: Arc<dyn Gateway> = recording.clone();

        member_joined(&gateway, &GuildConfig::default(), 1, 42);
        tokio::time::sleep(Duration::from_secs(2)).await;

        assert_eq!(recording.calls().is_empty(), true);
    }
}
