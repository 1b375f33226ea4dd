use chrono::Utc;
use poise::CreateReply;
use serenity::builder::GetMessages;
use serenity::model::channel::Message;
use serenity::model::user::User;
use tracing::info;

use crate::bulk::{self, CandidateMessage};
use crate::commands::{Context, message_created_at};
use crate::error::Result;

/// Bulk delete messages with various filters
#[poise::command(
    slash_command,
    guild_only,
    required_permissions = "MANAGE_MESSAGES",
    ephemeral
)]
pub async fn purge(
    ctx: Context<'_>,
    #[description = "Number of messages to delete (1-100)"]
    #[min = 1]
    #[max = 100]
    amount: u32,
    #[description = "Only delete messages from this user"] user: Option<User>,
    #[description = "Only delete messages containing this text"]
    #[max_length = 100]
    contains: Option<String>,
    #[description = "Only delete messages from bots"] bots_only: Option<bool>,
    #[description = "Only delete messages with embeds"] embeds_only: Option<bool>,
    #[description = "Only delete messages with attachments"] attachments_only: Option<bool>,
) -> Result<()> {
    ctx.defer_ephemeral().await?;
    let state = &ctx.data().state;

    // Fetch more than requested to account for filtering.
    let fetch_limit = (amount * 2).min(100) as u8;
    let messages = ctx
        .channel_id()
        .messages(ctx.http(), GetMessages::new().limit(fetch_limit))
        .await?;

    let mut to_delete = messages.iter().collect::<Vec<&Message>>();
    let mut filters = Vec::new();

    if let Some(user) = &user {
        to_delete.retain(|message| message.author.id == user.id);
        filters.push(format!("from {}", user.tag()));
    }
    if let Some(text) = &contains {
        let needle = text.to_lowercase();
        to_delete.retain(|message| message.content.to_lowercase().contains(&needle));
        filters.push(format!("containing \"{}\"", text));
    }
    if bots_only.unwrap_or(false) {
        to_delete.retain(|message| message.author.bot);
        filters.push("from bots only".to_string());
    }
    if embeds_only.unwrap_or(false) {
        to_delete.retain(|message| !message.embeds.is_empty());
        filters.push("with embeds only".to_string());
    }
    if attachments_only.unwrap_or(false) {
        to_delete.retain(|message| !message.attachments.is_empty());
        filters.push("with attachments only".to_string());
    }
    to_delete.truncate(amount as usize);

    let candidates = to_delete
        .iter()
        .map(|message| CandidateMessage {
            message_id: message.id.get(),
            created_at: message_created_at(message),
        })
        .collect::<Vec<CandidateMessage>>();
    let report =
        bulk::delete_candidates(&state.gateway, ctx.channel_id().get(), candidates, Utc::now())
            .await;

    let mut summary = format!(
        "🗑️ **Messages Purged**\nDeleted: {}\nRequested: {}",
        report.deleted, amount,
    );
    if report.failed > 0 {
        summary.push_str(&format!("\nFailed: {}", report.failed));
    }
    if !filters.is_empty() {
        summary.push_str(&format!("\nFilters applied: {}", filters.join(", ")));
    }
    ctx.send(CreateReply::default().content(summary)).await?;

    info!(
        "Purge executed by {} in channel {}: {} messages deleted",
        ctx.author().name,
        ctx.channel_id(),
        report.deleted,
    );
    Ok(())
}
