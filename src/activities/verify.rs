use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{Duration, Utc};
use dashmap::DashMap;
use tracing::{info, warn};

use crate::gateway::{Gateway, MemberView, ScopeRef};
use crate::registry::ActivityRegistry;
use crate::registry::models::{Activity, ActivityId, ActivityPayload, VerificationState};

pub const DEFAULT_TIMEOUT_MINUTES: u64 = 10;

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum VerifyOutcome {
    Verified,
    Kicked,
    Abandoned,
}

// Tracks members who joined but have not verified yet. Each pending
// member holds one VerificationTimer activity in the registry; gaining
// the required role or leaving the guild cancels it.
#[derive(Clone)]
pub struct VerificationSystem {
    registry: Arc<ActivityRegistry>,
    pending: Arc<DashMap<(u64, u64), ActivityId>>,
}

impl VerificationSystem {
    pub fn new(registry: Arc<ActivityRegistry>) -> Self {
        VerificationSystem {
            registry,
            pending: Arc::new(DashMap::new()),
        }
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    // Starts the verification timer for a freshly joined member.
    pub fn start(
        &self,
        gateway: &Arc<dyn Gateway>,
        guild_id: u64,
        guild_name: &str,
        user_id: u64,
        role_id: u64,
        timeout_minutes: u64,
    ) {
        let state = VerificationState {
            member_id: user_id,
            role_id,
            timeout_minutes,
        };
        let deadline = Utc::now() + Duration::minutes(timeout_minutes as i64);
        let activity = Activity::new(
            user_id,
            ScopeRef::guild(guild_id),
            ActivityPayload::VerificationTimer(state),
        )
        .with_deadline(deadline);
        let id = self.registry.insert(activity);
        self.pending.insert((guild_id, user_id), id);

        let system = self.clone();
        let gateway = gateway.clone();
        let guild_name = guild_name.to_string();
        self.registry.schedule(
            id,
            StdDuration::from_secs(timeout_minutes * 60),
            move |activity| async move {
                system.pending.remove(&(guild_id, user_id));
                expire(gateway, guild_name, activity).await;
            },
        );

        info!(
            "Started verification timer for {} in guild {} ({} minutes)",
            user_id, guild_id, timeout_minutes,
        );
    }

    // Cancels the timer once the member gains the required role.
    pub fn member_updated(&self, guild_id: u64, user_id: u64, role_ids: &[u64]) {
        let Some(entry) = self.pending.get(&(guild_id, user_id)) else {
            return;
        };
        let id = *entry.value();
        drop(entry);

        let required = self.registry.get(&id).and_then(|activity| match activity.payload {
            ActivityPayload::VerificationTimer(state) => Some(state.role_id),
            _ => None,
        });
        if required.map(|role_id| role_ids.contains(&role_id)).unwrap_or(false) {
            self.pending.remove(&(guild_id, user_id));
            self.registry.cancel(&id);
            info!("Verification timer cancelled for {} - role assigned", user_id);
        }
    }

    // A leaving member abandons the verification; nothing further happens.
    pub fn member_left(&self, guild_id: u64, user_id: u64) {
        if let Some((_, id)) = self.pending.remove(&(guild_id, user_id)) {
            self.registry.cancel(&id);
            info!("Verification timer cleaned up for {} - member left", user_id);
        }
    }
}

// The expiry decision, separated from its side effects.
pub fn resolve(member: Option<&MemberView>, role_id: u64) -> VerifyOutcome {
    match member {
        None => VerifyOutcome::Abandoned,
        Some(view) if view.has_role(role_id) => VerifyOutcome::Verified,
        Some(view) if !view.kickable => VerifyOutcome::Abandoned,
        Some(_) => VerifyOutcome::Kicked,
    }
}

async fn expire(gateway: Arc<dyn Gateway>, guild_name: String, activity: Activity) {
    let ActivityPayload::VerificationTimer(state) = &activity.payload else {
        return;
    };
    let Some(guild_id) = activity.scope.guild_id else {
        return;
    };

    // Work from fresh member data; roles may have changed since the join.
    let member = gateway.fetch_member(guild_id, state.member_id).await;
    match resolve(member.as_ref(), state.role_id) {
        VerifyOutcome::Verified => {
            info!(
                "User {} successfully verified in guild {}",
                state.member_id, guild_id,
            );
        }
        VerifyOutcome::Abandoned => match member {
            Some(_) => warn!(
                "Cannot kick {} - insufficient permissions or higher role",
                state.member_id,
            ),
            None => info!(
                "User {} left guild {} before the verification deadline",
                state.member_id, guild_id,
            ),
        },
        VerifyOutcome::Kicked => {
            let notice = format!(
                "⚠️ You have been removed from **{}** for not completing verification within {} minutes.\n\nYou can rejoin and complete verification if this was a mistake.",
                guild_name, state.timeout_minutes,
            );
            if gateway
                .send_direct_message(state.member_id, &notice)
                .await
                .is_err()
            {
                warn!("Could not DM {} about verification kick", state.member_id);
            }

            let reason = format!("Failed to verify within {} minutes", state.timeout_minutes);
            match gateway.kick_member(guild_id, state.member_id, &reason).await {
                Ok(()) => info!(
                    "Kicked {} from guild {} for not verifying in time",
                    state.member_id, guild_id,
                ),
                Err(err) => warn!("Error kicking unverified member {}: {}", state.member_id, err),
            }
        }
    }
}
