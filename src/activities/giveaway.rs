use std::collections::HashSet;
use std::sync::Arc;

use rand::seq::SliceRandom;
use tracing::{info, warn};

use crate::error::{Error, Result};
use crate::gateway::Gateway;
use crate::registry::ActivityRegistry;
use crate::registry::models::{Activity, ActivityId, ActivityPayload, GiveawayState};

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum EntryOutcome {
    // The user was added; carries the updated entry count.
    Entered(usize),
    // A benign duplicate, not an error.
    AlreadyEntered,
    // The giveaway is no longer live.
    Closed,
}

// Registers an entry for the user. Valid only while the giveaway is open.
pub fn enter(registry: &ActivityRegistry, id: &ActivityId, user_id: u64) -> EntryOutcome {
    registry
        .mutate(id, |activity| match &mut activity.payload {
            ActivityPayload::Giveaway(state) => match state.participants.insert(user_id) {
                true => EntryOutcome::Entered(state.participants.len()),
                false => EntryOutcome::AlreadyEntered,
            },
            _ => EntryOutcome::Closed,
        })
        .unwrap_or(EntryOutcome::Closed)
}

// Draws up to `requested` distinct winners uniformly without replacement.
// Partial Fisher-Yates: only the drawn prefix gets shuffled.
pub fn draw_winners(participants: &HashSet<u64>, requested: usize) -> Vec<u64> {
    let mut pool = participants.iter().copied().collect::<Vec<u64>>();
    let count = requested.min(pool.len());
    let mut rng = rand::thread_rng();
    let (winners, _) = pool.partial_shuffle(&mut rng, count);
    winners.to_vec()
}

// Forces the terminal action ahead of the deadline. Only the owner of
// the giveaway may do this.
pub async fn end(
    registry: &ActivityRegistry,
    gateway: &Arc<dyn Gateway>,
    id: &ActivityId,
    caller_id: u64,
) -> Result<()> {
    let activity = registry.get(id).ok_or_else(|| {
        Error::Activity("The requested giveaway was not found.".to_string())
    })?;
    if activity.owner_id != caller_id {
        let message = "For interacting with this giveaway you need to be its owner.".to_string();
        return Err(Error::Activity(message));
    }

    // Losing the race against the expiry timer here is fine; the timer
    // already performed the terminal action.
    if let Some(activity) = registry.take(id) {
        finish(gateway, activity).await;
    }
    Ok(())
}

// The terminal action: draw winners from the snapshot, update the
// giveaway message and congratulate in the channel. Gateway failures are
// logged and the activity stays removed either way.
pub async fn finish(gateway: &Arc<dyn Gateway>, activity: Activity) {
    let ActivityPayload::Giveaway(state) = &activity.payload else {
        return;
    };
    let winners = draw_winners(&state.participants, state.winner_count);
    let content = render_closed(state, &winners);

    if let Some(message) = activity.scope.message_ref() {
        if let Err(err) = gateway.edit_message(&message, &content, true).await {
            warn!("Can't update the finished giveaway message: {}", err);
        }
    }

    if !winners.is_empty() {
        let congratulations = render_congratulations(state, &winners);
        if let Err(err) = gateway
            .send_message(activity.scope.channel_id, &congratulations)
            .await
        {
            warn!("Can't announce the giveaway winners: {}", err);
        }
    }

    info!(
        "Giveaway {} finished: {} entries, {} winners",
        activity.id,
        state.participants.len(),
        winners.len()
    );
}

// The interactive message shown while the giveaway runs.
pub fn render_open(state: &GiveawayState, owner_id: u64, ends_at_unix: i64) -> String {
    let mut content = format!(
        "🎉 **GIVEAWAY** 🎉\n**Prize:** {}\n**Winners:** {}\n**Host:** <@{}>\n**Ends:** <t:{}:R>",
        state.prize, state.winner_count, owner_id, ends_at_unix,
    );
    if let Some(requirements) = &state.requirements {
        content.push_str(&format!("\n**Requirements:** {}", requirements));
    }
    content.push_str(&format!(
        "\n\nClick the 🎉 button below to enter!\n**Entries:** {}",
        state.participants.len()
    ));
    content
}

pub fn render_closed(state: &GiveawayState, winners: &[u64]) -> String {
    match winners.is_empty() {
        true => format!(
            "🎉 **Giveaway Ended** 🎉\n**Prize:** {}\n**Winners:** No one entered the giveaway",
            state.prize,
        ),
        false => format!(
            "🎉 **Giveaway Ended!** 🎉\n**Prize:** {}\n**Winners:**\n{}\n**Total Entries:** {}",
            state.prize,
            winners
                .iter()
                .map(|id| format!("<@{}>", id))
                .collect::<Vec<String>>()
                .join("\n"),
            state.participants.len(),
        ),
    }
}

fn render_congratulations(state: &GiveawayState, winners: &[u64]) -> String {
    let plural = match winners.len() > 1 {
        true => "s",
        false => "",
    };
    format!(
        "🎉 Congratulations to the winner{}!\n{}\n\nYou won: **{}**!",
        plural,
        winners
            .iter()
            .map(|id| format!("<@{}>", id))
            .collect::<Vec<String>>()
            .join(" "),
        state.prize,
    )
}
