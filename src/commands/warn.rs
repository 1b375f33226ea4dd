use poise::CreateReply;
use serenity::model::user::User;
use tracing::info;

use crate::commands::Context;
use crate::db::warnings::WarningRecord;
use crate::error::Result;
use crate::systems;

/// Issue a warning to a user
#[poise::command(slash_command, guild_only, required_permissions = "MODERATE_MEMBERS")]
pub async fn warn(
    ctx: Context<'_>,
    #[description = "The user to warn"] user: User,
    #[description = "Reason for the warning"]
    #[max_length = 1000]
    reason: String,
) -> Result<()> {
    let state = &ctx.data().state;
    let Some(guild_id) = ctx.guild_id() else {
        return Ok(());
    };

    if user.bot {
        ctx.send(
            CreateReply::default()
                .content("You cannot warn bots.")
                .ephemeral(true),
        )
        .await?;
        return Ok(());
    }

    let (is_admin, guild_name) = {
        match ctx.guild() {
            Some(guild) => {
                let is_admin = guild
                    .members
                    .get(&user.id)
                    .map(|member| guild.member_permissions(member).administrator())
                    .unwrap_or(false);
                (is_admin, guild.name.clone())
            }
            None => (false, "this server".to_string()),
        }
    };
    if is_admin {
        ctx.send(
            CreateReply::default()
                .content("You cannot warn administrators.")
                .ephemeral(true),
        )
        .await?;
        return Ok(());
    }

    let record = WarningRecord::new(&reason, &ctx.author().name, ctx.author().id.get());
    let total = state.warnings.add(guild_id.get(), user.id.get(), record)?;

    ctx.send(CreateReply::default().content(format!(
        "⚠️ <@{}> has been warned: {} (warning #{})",
        user.id.get(),
        reason,
        total,
    )))
    .await?;

    // The warned user may have direct messages disabled.
    let _ = state
        .gateway
        .send_direct_message(
            user.id.get(),
            &format!(
                "⚠️ You received a warning in **{}**.\nReason: {}",
                guild_name, reason,
            ),
        )
        .await;

    let config = state.config.get(guild_id.get());
    systems::log_to_guild(
        &state.gateway,
        &config,
        &format!(
            "⚠️ {} warned {} ({}): {}",
            ctx.author().name,
            user.tag(),
            user.id.get(),
            reason,
        ),
    )
    .await;

    info!(
        "Warning issued by {} to {}: {}",
        ctx.author().name,
        user.tag(),
        reason,
    );
    Ok(())
}

/// Show the warnings issued to a user
#[poise::command(slash_command, guild_only, required_permissions = "MODERATE_MEMBERS")]
pub async fn warnings(
    ctx: Context<'_>,
    #[description = "The user to look up"] user: User,
) -> Result<()> {
    let state = &ctx.data().state;
    let Some(guild_id) = ctx.guild_id() else {
        return Ok(());
    };

    let records = state.warnings.list(guild_id.get(), user.id.get());
    let content = match records.is_empty() {
        true => format!("{} has no warnings.", user.tag()),
        false => {
            let lines = records
                .iter()
                .rev()
                .take(10)
                .enumerate()
                .map(|(index, record)| {
                    format!(
                        "{}. {} — by {} <t:{}:R>",
                        index + 1,
                        record.reason,
                        record.moderator,
                        record.timestamp.timestamp(),
                    )
                })
                .collect::<Vec<String>>()
                .join("\n");
            format!(
                "⚠️ **Warnings for {}** ({} in total)\n{}",
                user.tag(),
                records.len(),
                lines,
            )
        }
    };

    ctx.send(CreateReply::default().content(content).ephemeral(true))
        .await?;
    Ok(())
}
