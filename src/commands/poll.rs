use std::time::Duration as StdDuration;

use chrono::{Duration, Utc};
use poise::CreateReply;
use serenity::builder::{CreateActionRow, CreateButton};
use serenity::model::application::ButtonStyle;
use serenity::model::channel::ReactionType;
use tracing::info;

use crate::activities::poll as polls;
use crate::activities::poll::OPTION_EMOJIS;
use crate::commands::Context;
use crate::error::Result;
use crate::gateway::ScopeRef;
use crate::registry::models::{Activity, ActivityPayload, PollState};

pub const DEFAULT_DURATION_MINUTES: u32 = 60;

/// Create a poll with multiple options
#[poise::command(slash_command, guild_only)]
pub async fn poll(
    ctx: Context<'_>,
    #[description = "The poll question"]
    #[max_length = 256]
    question: String,
    #[description = "First option"]
    #[max_length = 80]
    option1: String,
    #[description = "Second option"]
    #[max_length = 80]
    option2: String,
    #[description = "Poll duration in minutes (default: 60)"]
    #[min = 1]
    #[max = 1440]
    duration: Option<u32>,
    #[description = "Third option"]
    #[max_length = 80]
    option3: Option<String>,
    #[description = "Fourth option"]
    #[max_length = 80]
    option4: Option<String>,
    #[description = "Fifth option"]
    #[max_length = 80]
    option5: Option<String>,
) -> Result<()> {
    let state = &ctx.data().state;
    let duration = duration.unwrap_or(DEFAULT_DURATION_MINUTES);
    let options = [Some(option1), Some(option2), option3, option4, option5]
        .into_iter()
        .flatten()
        .collect::<Vec<String>>();
    let deadline = Utc::now() + Duration::minutes(duration as i64);

    let poll_state = PollState::new(&question, options);
    let content = polls::render_open(&poll_state, deadline.timestamp());
    let option_count = poll_state.options.len();
    let scope = ScopeRef::new(
        ctx.guild_id().map(|guild_id| guild_id.get()),
        ctx.channel_id().get(),
    );
    let activity = Activity::new(
        ctx.author().id.get(),
        scope,
        ActivityPayload::Poll(poll_state),
    )
    .with_deadline(deadline);
    let id = activity.id;

    let mut buttons = Vec::new();
    for index in 0..option_count {
        buttons.push(
            CreateButton::new(format!("poll_vote_{}_{}", id, index))
                .label(format!("Option {}", index + 1))
                .emoji(ReactionType::Unicode(OPTION_EMOJIS[index].to_string()))
                .style(ButtonStyle::Primary),
        );
    }
    // The creator's early-exit control.
    buttons.push(
        CreateButton::new(format!("poll_end_{}", id))
            .label("End Poll")
            .emoji('🛑')
            .style(ButtonStyle::Danger),
    );
    let components = buttons
        .chunks(5)
        .map(|chunk| CreateActionRow::Buttons(chunk.to_vec()))
        .collect::<Vec<CreateActionRow>>();

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
            polls::finish(&gateway, activity, false).await;
        },
    );

    info!("Poll created by {}: \"{}\"", ctx.author().name, question);
    Ok(())
}
