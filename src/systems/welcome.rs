use std::sync::Arc;

use tracing::{info, warn};

use crate::db::config::GuildConfig;
use crate::gateway::Gateway;

pub const MILESTONES: [u64; 10] = [10, 25, 50, 100, 250, 500, 1000, 2500, 5000, 10000];

// Greets a new member in the configured channel, tries a direct message
// and celebrates member-count milestones.
pub async fn member_joined(
    gateway: &Arc<dyn Gateway>,
    config: &GuildConfig,
    guild_name: &str,
    member_count: u64,
    user_id: u64,
) {
    let Some(channel_id) = config.welcome_channel_id else {
        info!(
            "New member {} joined {} - no welcome channel configured",
            user_id, guild_name,
        );
        return;
    };

    let content = format!(
        "<@{}> Welcome to **{}**! 🎉\nYou're member #{}. Read the rules, introduce yourself and have fun chatting!",
        user_id, guild_name, member_count,
    );
    if let Err(err) = gateway.send_message(channel_id, &content).await {
        warn!("Can't post the welcome message: {}", err);
    }

    // The member may disallow direct messages; that is fine.
    let direct = format!(
        "Welcome to **{}**! Thanks for joining our community. Read the server rules, check out the channels and don't hesitate to ask questions.",
        guild_name,
    );
    if gateway.send_direct_message(user_id, &direct).await.is_err() {
        info!("Could not send welcome DM to {}", user_id);
    }

    if MILESTONES.contains(&member_count) {
        let milestone = format!(
            "🎉 **MILESTONE REACHED!** We've just hit **{}** members!\nSpecial thanks to <@{}> for being our newest member!",
            member_count, user_id,
        );
        if let Err(err) = gateway.send_message(channel_id, &milestone).await {
            warn!("Can't post the milestone message: {}", err);
        }
    }
}

// Says goodbye in the goodbye channel, falling back to the welcome one.
pub async fn member_left(
    gateway: &Arc<dyn Gateway>,
    config: &GuildConfig,
    user_tag: &str,
    member_count: u64,
) {
    let Some(channel_id) = config.goodbye_channel_id.or(config.welcome_channel_id) else {
        return;
    };

    let content = format!(
        "**{}** has left the server. We now have {} members.",
        user_tag, member_count,
    );
    if let Err(err) = gateway.send_message(channel_id, &content).await {
        warn!("Can't post the goodbye message: {}", err);
    }
}
