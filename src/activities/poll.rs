use std::sync::Arc;

use tracing::{info, warn};

use crate::error::{Error, Result};
use crate::gateway::Gateway;
use crate::registry::ActivityRegistry;
use crate::registry::models::{Activity, ActivityId, ActivityPayload, PollState};

pub const OPTION_EMOJIS: [&str; 5] = ["1️⃣", "2️⃣", "3️⃣", "4️⃣", "5️⃣"];

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum VoteOutcome {
    Registered,
    InvalidOption,
    Closed,
}

// Casts a vote. A user holds at most one vote across all options, so the
// previous vote (if any) is withdrawn first.
pub fn vote(
    registry: &ActivityRegistry,
    id: &ActivityId,
    user_id: u64,
    option_index: usize,
) -> VoteOutcome {
    registry
        .mutate(id, |activity| match &mut activity.payload {
            ActivityPayload::Poll(state) => {
                if option_index >= state.options.len() {
                    return VoteOutcome::InvalidOption;
                }
                for votes in state.votes.iter_mut() {
                    votes.remove(&user_id);
                }
                state.votes[option_index].insert(user_id);
                VoteOutcome::Registered
            }
            _ => VoteOutcome::Closed,
        })
        .unwrap_or(VoteOutcome::Closed)
}

// Forces the final tally ahead of the deadline. Creator only.
pub async fn end(
    registry: &ActivityRegistry,
    gateway: &Arc<dyn Gateway>,
    id: &ActivityId,
    caller_id: u64,
) -> Result<()> {
    let activity = registry
        .get(id)
        .ok_or_else(|| Error::Activity("The requested poll was not found.".to_string()))?;
    if activity.owner_id != caller_id {
        let message = "Only the poll creator can end this poll.".to_string();
        return Err(Error::Activity(message));
    }

    if let Some(activity) = registry.take(id) {
        finish(gateway, activity, true).await;
    }
    Ok(())
}

// The terminal action: render the final tally from the snapshot and
// remove the interactive controls.
pub async fn finish(gateway: &Arc<dyn Gateway>, activity: Activity, ended_by_creator: bool) {
    let ActivityPayload::Poll(state) = &activity.payload else {
        return;
    };
    let content = render_final(state, ended_by_creator);

    if let Some(message) = activity.scope.message_ref() {
        if let Err(err) = gateway.edit_message(&message, &content, true).await {
            warn!("Could not update poll message after ending: {}", err);
        }
    }

    info!(
        "Poll {} ended with {} total votes",
        activity.id,
        state.total_votes()
    );
}

pub fn percentage(count: usize, total: usize) -> u32 {
    match total > 0 {
        true => ((count * 100) as f64 / total as f64).round() as u32,
        false => 0,
    }
}

fn render_bar(percentage: u32) -> String {
    let filled = ((percentage as f64) / 5.0).round() as usize;
    format!("{}{}", "█".repeat(filled), "░".repeat(20 - filled))
}

fn render_tally(state: &PollState) -> String {
    let total = state.total_votes();
    state
        .options
        .iter()
        .enumerate()
        .map(|(index, option)| {
            let count = state.votes[index].len();
            let share = percentage(count, total);
            format!(
                "{} **{}**\n`{}` {} votes ({}%)",
                OPTION_EMOJIS[index],
                option,
                render_bar(share),
                count,
                share,
            )
        })
        .collect::<Vec<String>>()
        .join("\n\n")
}

// The interactive message shown while the poll runs.
pub fn render_open(state: &PollState, ends_at_unix: i64) -> String {
    format!(
        "📊 **Poll**\n{}\n\n**Results**\n{}\n\nPoll ends <t:{}:R> | {} total votes",
        state.question,
        render_tally(state),
        ends_at_unix,
        state.total_votes(),
    )
}

pub fn render_final(state: &PollState, ended_by_creator: bool) -> String {
    let total = state.total_votes();
    let results = match total > 0 {
        true => render_tally(state),
        false => "No votes were cast.".to_string(),
    };
    let reason = match ended_by_creator {
        true => "by creator",
        false => "automatically",
    };
    format!(
        "📊 **Poll Ended**\n{}\n\n**Final Results**\n{}\n\nPoll ended {} | {} total votes",
        state.question, results, reason, total,
    )
}
