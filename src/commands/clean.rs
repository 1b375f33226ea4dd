use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use poise::CreateReply;
use serenity::builder::GetMessages;
use serenity::model::channel::GuildChannel;
use serenity::model::id::{ChannelId, MessageId};
use tracing::info;

use crate::bulk::{self, BulkDeleteReport, CandidateMessage};
use crate::commands::duration::parse_duration;
use crate::commands::{Context, message_created_at};
use crate::error::Result;

// Upper bound on how much history a single cleanup walks.
pub const HISTORY_WALK_LIMIT: usize = 1000;

/// Delete messages in a channel
#[poise::command(
    slash_command,
    guild_only,
    subcommands("age", "between", "count"),
    required_permissions = "MANAGE_MESSAGES"
)]
pub async fn clean(_ctx: Context<'_>) -> Result<()> {
    Ok(())
}

/// Delete messages older than specified time
#[poise::command(slash_command, guild_only, ephemeral)]
pub async fn age(
    ctx: Context<'_>,
    #[description = "Age of messages to delete (e.g., 90d, 7d, 24h)"] duration: String,
    #[description = "Channel to clean (defaults to current)"]
    #[channel_types("Text")]
    channel: Option<GuildChannel>,
) -> Result<()> {
    ctx.defer_ephemeral().await?;

    let Some(parsed) = parse_duration(&duration) else {
        ctx.send(
            CreateReply::default()
                .content("Invalid duration format. Use format like: 90d, 7d, 24h, 30m"),
        )
        .await?;
        return Ok(());
    };
    let cutoff = Utc::now() - chrono::Duration::milliseconds(parsed.millis);
    let channel_id = channel.map(|channel| channel.id).unwrap_or(ctx.channel_id());

    let candidates =
        collect_history(&ctx, channel_id, |created| created < cutoff, None).await?;
    finish_cleanup(&ctx, channel_id, candidates, "age").await
}

/// Delete messages between two dates
#[poise::command(slash_command, guild_only, ephemeral)]
pub async fn between(
    ctx: Context<'_>,
    #[description = "Start date (YYYY-MM-DD or YYYY-MM-DD HH:MM)"] start_date: String,
    #[description = "End date (YYYY-MM-DD or YYYY-MM-DD HH:MM)"] end_date: String,
    #[description = "Channel to clean (defaults to current)"]
    #[channel_types("Text")]
    channel: Option<GuildChannel>,
) -> Result<()> {
    ctx.defer_ephemeral().await?;

    let (Some(start), Some(end)) = (parse_date(&start_date), parse_date(&end_date)) else {
        ctx.send(
            CreateReply::default()
                .content("Invalid date format. Use format: YYYY-MM-DD or YYYY-MM-DD HH:MM"),
        )
        .await?;
        return Ok(());
    };
    if start >= end {
        ctx.send(CreateReply::default().content("Start date must be before end date."))
            .await?;
        return Ok(());
    }
    let channel_id = channel.map(|channel| channel.id).unwrap_or(ctx.channel_id());

    let candidates = collect_history(
        &ctx,
        channel_id,
        |created| created >= start && created <= end,
        // Paging reaches ever older messages; past the start there is
        // nothing left to collect.
        Some(start),
    )
    .await?;
    finish_cleanup(&ctx, channel_id, candidates, "between").await
}

/// Delete a specific number of recent messages
#[poise::command(slash_command, guild_only, ephemeral)]
pub async fn count(
    ctx: Context<'_>,
    #[description = "Number of messages to delete (1-100)"]
    #[min = 1]
    #[max = 100]
    amount: u32,
    #[description = "Channel to clean (defaults to current)"]
    #[channel_types("Text")]
    channel: Option<GuildChannel>,
) -> Result<()> {
    ctx.defer_ephemeral().await?;
    let channel_id = channel.map(|channel| channel.id).unwrap_or(ctx.channel_id());

    let messages = channel_id
        .messages(ctx.http(), GetMessages::new().limit(amount as u8))
        .await?;
    let candidates = messages
        .iter()
        .map(|message| CandidateMessage {
            message_id: message.id.get(),
            created_at: message_created_at(message),
        })
        .collect::<Vec<CandidateMessage>>();
    finish_cleanup(&ctx, channel_id, candidates, "count").await
}

// Pages backwards through the channel history collecting candidates the
// predicate accepts, bounded by the walk limit.
async fn collect_history(
    ctx: &Context<'_>,
    channel_id: ChannelId,
    keep: impl Fn(DateTime<Utc>) -> bool,
    stop_before: Option<DateTime<Utc>>,
) -> Result<Vec<CandidateMessage>> {
    let mut candidates = Vec::new();
    let mut before: Option<MessageId> = None;
    let mut scanned = 0;

    while candidates.len() < HISTORY_WALK_LIMIT && scanned < HISTORY_WALK_LIMIT {
        let mut builder = GetMessages::new().limit(100);
        if let Some(before) = before {
            builder = builder.before(before);
        }
        let batch = channel_id.messages(ctx.http(), builder).await?;
        let Some(oldest) = batch.last() else {
            break;
        };
        scanned += batch.len();

        for message in &batch {
            let created = message_created_at(message);
            if keep(created) {
                candidates.push(CandidateMessage {
                    message_id: message.id.get(),
                    created_at: created,
                });
            }
        }

        let oldest_created = message_created_at(oldest);
        before = Some(oldest.id);
        if stop_before.map(|boundary| oldest_created < boundary).unwrap_or(false) {
            break;
        }
    }

    Ok(candidates)
}

async fn finish_cleanup(
    ctx: &Context<'_>,
    channel_id: ChannelId,
    candidates: Vec<CandidateMessage>,
    method: &str,
) -> Result<()> {
    if candidates.is_empty() {
        ctx.send(CreateReply::default().content("No messages found matching the specified criteria."))
            .await?;
        return Ok(());
    }

    let state = &ctx.data().state;
    let report: BulkDeleteReport =
        bulk::delete_candidates(&state.gateway, channel_id.get(), candidates, Utc::now()).await;

    let mut summary = format!(
        "🗑️ **Message Cleanup Complete**\nChannel: <#{}>\nMessages deleted: {}\nMethod: {}",
        channel_id.get(),
        report.deleted,
        method,
    );
    if report.failed > 0 {
        summary.push_str(&format!("\nFailed to delete: {} messages", report.failed));
    }
    ctx.send(CreateReply::default().content(summary)).await?;

    info!(
        "Message cleanup completed by {} in channel {}: {} deleted",
        ctx.author().name,
        channel_id,
        report.deleted,
    );
    Ok(())
}

fn parse_date(text: &str) -> Option<DateTime<Utc>> {
    let trimmed = text.trim();
    if let Ok(datetime) = NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%d %H:%M") {
        return Some(datetime.and_utc());
    }
    NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|datetime| datetime.and_utc())
}

#[cfg(test)]
mod tests {
    use crate::commands::clean::parse_date;

    #[test]
    fn test_parse_plain_date() {
        let parsed = parse_date("2024-03-01").unwrap();
        assert_eq!(parsed.to_rfc3339(), "2024-03-01T00:00:00+00:00");
    }

    #[test]
    fn test_parse_date_with_time() {
        let parsed = parse_date("2024-03-01 14:30").unwrap();
        assert_eq!(parsed.to_rfc3339(), "2024-03-01T14:30:00+00:00");
    }

    #[test]
    fn test_parse_rejects_other_shapes() {
        assert_eq!(parse_date("03/01/2024").is_none(), true);
        assert_eq!(parse_date("yesterday").is_none(), true);
    }
}
