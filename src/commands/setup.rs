use poise::CreateReply;
use serenity::model::channel::GuildChannel;
use serenity::model::guild::Role;
use tracing::info;

use crate::activities::verify::DEFAULT_TIMEOUT_MINUTES;
use crate::commands::Context;
use crate::error::Result;

/// Setup and configure bot features for your server
#[poise::command(
    slash_command,
    guild_only,
    subcommands("autorole", "verification", "welcome", "logging", "view"),
    required_permissions = "ADMINISTRATOR"
)]
pub async fn setup(_ctx: Context<'_>) -> Result<()> {
    Ok(())
}

/// Configure automatic role assignment
#[poise::command(slash_command, guild_only)]
pub async fn autorole(
    ctx: Context<'_>,
    #[description = "Role to auto-assign to new members"] role: Role,
) -> Result<()> {
    let state = &ctx.data().state;
    let Some(guild_id) = ctx.guild_id() else {
        return Ok(());
    };

    state
        .config
        .update(guild_id.get(), |config| {
            config.auto_role_id = Some(role.id.get())
        })?;

    ctx.send(CreateReply::default().content(format!(
        "✅ **Auto Role Configured**\nNew members will receive the **{}** role.",
        role.name,
    )))
    .await?;
    info!("Auto role configured in guild {}: {}", guild_id, role.name);
    Ok(())
}

/// Setup the verification system
#[poise::command(slash_command, guild_only)]
pub async fn verification(
    ctx: Context<'_>,
    #[description = "Role given after verification"] role: Role,
    #[description = "Minutes before kicking unverified users (default: 10)"]
    #[min = 1]
    #[max = 1440]
    timeout: Option<u32>,
) -> Result<()> {
    let state = &ctx.data().state;
    let Some(guild_id) = ctx.guild_id() else {
        return Ok(());
    };
    let timeout_minutes = timeout.map(|minutes| minutes as u64).unwrap_or(DEFAULT_TIMEOUT_MINUTES);

    state.config.update(guild_id.get(), |config| {
        config.verify_role_id = Some(role.id.get());
        config.verify_timeout_minutes = Some(timeout_minutes);
    })?;

    ctx.send(CreateReply::default().content(format!(
        "✅ **Verification Configured**\nRequired role: **{}**\nKick timeout: {} minutes",
        role.name, timeout_minutes,
    )))
    .await?;
    info!(
        "Verification configured in guild {}: role {} / {} minutes",
        guild_id, role.name, timeout_minutes,
    );
    Ok(())
}

/// Setup the welcome and goodbye messages
#[poise::command(slash_command, guild_only)]
pub async fn welcome(
    ctx: Context<'_>,
    #[description = "Channel for welcome messages"]
    #[channel_types("Text")]
    welcome_channel: GuildChannel,
    #[description = "Channel for goodbye messages (optional)"]
    #[channel_types("Text")]
    goodbye_channel: Option<GuildChannel>,
) -> Result<()> {
    let state = &ctx.data().state;
    let Some(guild_id) = ctx.guild_id() else {
        return Ok(());
    };

    let goodbye_id = goodbye_channel.as_ref().map(|channel| channel.id.get());
    state.config.update(guild_id.get(), |config| {
        config.welcome_channel_id = Some(welcome_channel.id.get());
        config.goodbye_channel_id = goodbye_id;
    })?;

    ctx.send(CreateReply::default().content(format!(
        "✅ **Welcome System Configured**\nWelcome channel: <#{}>\nGoodbye channel: {}",
        welcome_channel.id.get(),
        goodbye_id
            .map(|id| format!("<#{}>", id))
            .unwrap_or_else(|| "same as welcome".to_string()),
    )))
    .await?;
    Ok(())
}

/// Setup moderation logging
#[poise::command(slash_command, guild_only)]
pub async fn logging(
    ctx: Context<'_>,
    #[description = "Channel for moderation logs"]
    #[channel_types("Text")]
    channel: GuildChannel,
) -> Result<()> {
    let state = &ctx.data().state;
    let Some(guild_id) = ctx.guild_id() else {
        return Ok(());
    };

    state.config.update(guild_id.get(), |config| {
        config.logging_channel_id = Some(channel.id.get())
    })?;

    ctx.send(CreateReply::default().content(format!(
        "✅ **Logging Configured**\nModeration logs will be posted to <#{}>.",
        channel.id.get(),
    )))
    .await?;
    Ok(())
}

/// View the current bot configuration
#[poise::command(slash_command, guild_only)]
pub async fn view(ctx: Context<'_>) -> Result<()> {
    let state = &ctx.data().state;
    let Some(guild_id) = ctx.guild_id() else {
        return Ok(());
    };

    let config = state.config.get(guild_id.get());
    let role = |value: Option<u64>| {
        value
            .map(|id| format!("<@&{}>", id))
            .unwrap_or_else(|| "not configured".to_string())
    };
    let channel = |value: Option<u64>| {
        value
            .map(|id| format!("<#{}>", id))
            .unwrap_or_else(|| "not configured".to_string())
    };

    let content = format!(
        "🔧 **Server Configuration**\nAuto role: {}\nVerification role: {}\nVerification timeout: {} minutes\nWelcome channel: {}\nGoodbye channel: {}\nLogging channel: {}",
        role(config.auto_role_id),
        role(config.verify_role_id),
        config.verify_timeout_minutes.unwrap_or(DEFAULT_TIMEOUT_MINUTES),
        channel(config.welcome_channel_id),
        channel(config.goodbye_channel_id),
        channel(config.logging_channel_id),
    );
    ctx.send(CreateReply::default().content(content).ephemeral(true))
        .await?;
    Ok(())
}
