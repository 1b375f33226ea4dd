use std::time::Duration as StdDuration;

use chrono::{Duration, Utc};
use poise::CreateReply;
use serenity::builder::{CreateActionRow, CreateButton};
use serenity::model::application::ButtonStyle;
use tracing::info;

use crate::activities::giveaway as giveaways;
use crate::commands::Context;
use crate::error::Result;
use crate::gateway::ScopeRef;
use crate::registry::models::{Activity, ActivityPayload, GiveawayState};

/// Create and manage giveaways
#[poise::command(
    slash_command,
    guild_only,
    subcommands("start", "end"),
    required_permissions = "MANAGE_EVENTS"
)]
pub async fn giveaway(_ctx: Context<'_>) -> Result<()> {
    Ok(())
}

/// Start a new giveaway
#[poise::command(slash_command, guild_only)]
pub async fn start(
    ctx: Context<'_>,
    #[description = "What are you giving away?"]
    #[max_length = 256]
    prize: String,
    #[description = "Duration in minutes"]
    #[min = 1]
    #[max = 10080]
    duration: u32,
    #[description = "Number of winners (default: 1)"]
    #[min = 1]
    #[max = 20]
    winners: Option<u32>,
    #[description = "Entry requirements (optional)"]
    #[max_length = 500]
    requirements: Option<String>,
) -> Result<()> {
    let state = &ctx.data().state;
    let winner_count = winners.unwrap_or(1) as usize;
    let deadline = Utc::now() + Duration::minutes(duration as i64);

    let giveaway_state = GiveawayState::new(&prize, winner_count, requirements);
    let content =
        giveaways::render_open(&giveaway_state, ctx.author().id.get(), deadline.timestamp());
    let scope = ScopeRef::new(
        ctx.guild_id().map(|guild_id| guild_id.get()),
        ctx.channel_id().get(),
    );
    let activity = Activity::new(
        ctx.author().id.get(),
        scope,
        ActivityPayload::Giveaway(giveaway_state),
    )
    .with_deadline(deadline);
    let id = activity.id;

    let button = CreateButton::new(format!("giveaway_enter_{}", id))
        .label("Enter Giveaway")
        .emoji('🎉')
        .style(ButtonStyle::Success);
    let components = vec![CreateActionRow::Buttons(vec![button])];
    let reply = ctx
        .send(CreateReply::default().content(content).components(components))
        .await?;
    let message = reply.message().await?;

    let mut activity = activity;
    activity.scope.message_id = Some(message.id.get());
    state.registry.insert(activity);

    let gateway = state.gateway.clone();
    state.registry.schedule(
        id,
        StdDuration::from_secs(duration as u64 * 60),
        move |activity| async move {
            giveaways::finish(&gateway, activity).await;
        },
    );

    info!("Giveaway started by {}: {}", ctx.author().name, prize);
    Ok(())
}

/// End a giveaway early
#[poise::command(slash_command, guild_only)]
pub async fn end(
    ctx: Context<'_>,
    #[description = "Message ID of the giveaway to end"] message_id: String,
) -> Result<()> {
    let state = &ctx.data().state;

    let Ok(parsed) = message_id.trim().parse::<u64>() else {
        ctx.send(
            CreateReply::default()
                .content("The message ID must be a number.")
                .ephemeral(true),
        )
        .await?;
        return Ok(());
    };

    let Some(activity) = state.registry.find_by_message(parsed) else {
        ctx.send(
            CreateReply::default()
                .content("Giveaway not found or already ended.")
                .ephemeral(true),
        )
        .await?;
        return Ok(());
    };

    let response = match giveaways::end(
        &state.registry,
        &state.gateway,
        &activity.id,
        ctx.author().id.get(),
    )
    .await
    {
        Ok(()) => "Giveaway ended successfully!".to_string(),
        Err(err) => err.to_string(),
    };
    ctx.send(CreateReply::default().content(response).ephemeral(true))
        .await?;
    Ok(())
}
