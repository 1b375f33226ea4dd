use std::time::Duration as StdDuration;

use chrono::{Duration, Utc};
use poise::CreateReply;
use serenity::model::user::User;
use tracing::info;

use crate::activities::reminder as reminders;
use crate::commands::Context;
use crate::commands::duration::{MILLIS_PER_DAY, parse_duration};
use crate::error::Result;
use crate::gateway::ScopeRef;
use crate::registry::models::{Activity, ActivityPayload, ReminderState};

// Reminders further out than a month are rejected.
pub const MAX_REMINDER_MILLIS: i64 = 30 * MILLIS_PER_DAY;

/// Set a reminder for yourself or others
#[poise::command(slash_command, guild_only)]
pub async fn remind(
    ctx: Context<'_>,
    #[description = "When to remind (e.g., \"5m\", \"2h\", \"1d\")"] time: String,
    #[description = "Reminder message"]
    #[max_length = 500]
    message: String,
    #[description = "User to remind (defaults to yourself)"] user: Option<User>,
    #[description = "Send reminder privately (default: false)"] private: Option<bool>,
) -> Result<()> {
    let state = &ctx.data().state;

    let millis = parse_duration(&time)
        .map(|parsed| parsed.millis)
        .filter(|millis| *millis > 0 && *millis <= MAX_REMINDER_MILLIS);
    let Some(millis) = millis else {
        ctx.send(
            CreateReply::default()
                .content("Invalid time format. Use formats like: 5m, 1h, 2d, 1w")
                .ephemeral(true),
        )
        .await?;
        return Ok(());
    };

    let target_user_id = user
        .map(|user| user.id.get())
        .unwrap_or_else(|| ctx.author().id.get());
    let fire_at = Utc::now() + Duration::milliseconds(millis);

    let payload = ActivityPayload::Reminder(ReminderState {
        text: message.clone(),
        target_user_id,
        private: private.unwrap_or(false),
    });
    let scope = ScopeRef::new(
        ctx.guild_id().map(|guild_id| guild_id.get()),
        ctx.channel_id().get(),
    );
    let activity = Activity::new(ctx.author().id.get(), scope, payload).with_deadline(fire_at);
    let id = state.registry.insert(activity);

    let gateway = state.gateway.clone();
    state.registry.schedule(
        id,
        StdDuration::from_millis(millis as u64),
        move |activity| async move {
            reminders::fire(&gateway, activity).await;
        },
    );

    ctx.send(CreateReply::default().content(format!(
        "⏰ **Reminder Set**\nFor: <@{}>\nWhen: <t:{}:R>\nMessage: {}",
        target_user_id,
        fire_at.timestamp(),
        message,
    )))
    .await?;

    info!(
        "Reminder set by {} for user {}: {}",
        ctx.author().name,
        target_user_id,
        time,
    );
    Ok(())
}
