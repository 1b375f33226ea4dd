use std::collections::HashSet;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::gateway::ScopeRef;

pub type ActivityId = Uuid;

// Closed set of activity kinds the registry knows how to host. Each kind
// maps onto one state machine in the `activities` module.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ActivityKind {
    Giveaway,
    Poll,
    Reminder,
    SpamWindow,
    VerificationTimer,
}

impl ActivityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActivityKind::Giveaway => "giveaway",
            ActivityKind::Poll => "poll",
            ActivityKind::Reminder => "reminder",
            ActivityKind::SpamWindow => "spam-window",
            ActivityKind::VerificationTimer => "verification-timer",
        }
    }
}

// An ephemeral, time- or event-bounded unit of state. Lives in the
// registry between creation and its terminal action.
#[derive(Clone, Debug)]
pub struct Activity {
    pub id: ActivityId,
    pub owner_id: u64,
    pub created_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
    pub scope: ScopeRef,
    pub payload: ActivityPayload,
    pub cancelled: bool,
}

impl Activity {
    pub fn new(owner_id: u64, scope: ScopeRef, payload: ActivityPayload) -> Self {
        Activity {
            id: Uuid::new_v4(),
            owner_id,
            created_at: Utc::now(),
            expires_at: None,
            scope,
            payload,
            cancelled: false,
        }
    }

    pub fn with_deadline(mut self, expires_at: DateTime<Utc>) -> Self {
        self.expires_at = Some(expires_at);
        self
    }

    // Returns the kind tag matching the stored payload.
    pub fn kind(&self) -> ActivityKind {
        match &self.payload {
            ActivityPayload::Giveaway(_) => ActivityKind::Giveaway,
            ActivityPayload::Poll(_) => ActivityKind::Poll,
            ActivityPayload::Reminder(_) => ActivityKind::Reminder,
            ActivityPayload::SpamWindow(_) => ActivityKind::SpamWindow,
            ActivityPayload::VerificationTimer(_) => ActivityKind::VerificationTimer,
        }
    }
}

#[derive(Clone, Debug)]
pub enum ActivityPayload {
    Giveaway(GiveawayState),
    Poll(PollState),
    Reminder(ReminderState),
    SpamWindow(SpamWindowState),
    VerificationTimer(VerificationState),
}

#[derive(Clone, Debug)]
pub struct GiveawayState {
    pub prize: String,
    pub winner_count: usize,
    pub requirements: Option<String>,
    pub participants: HashSet<u64>,
}

impl GiveawayState {
    pub fn new(prize: &str, winner_count: usize, requirements: Option<String>) -> Self {
        GiveawayState {
            prize: prize.to_string(),
            winner_count,
            requirements,
            participants: HashSet::new(),
        }
    }
}

#[derive(Clone, Debug)]
pub struct PollState {
    pub question: String,
    pub options: Vec<String>,
    // One vote set per option; a user id appears in at most one of them.
    pub votes: Vec<HashSet<u64>>,
}

impl PollState {
    pub fn new(question: &str, options: Vec<String>) -> Self {
        let votes = options.iter().map(|_| HashSet::new()).collect();
        PollState {
            question: question.to_string(),
            options,
            votes,
        }
    }

    pub fn total_votes(&self) -> usize {
        self.votes.iter().map(|set| set.len()).sum()
    }
}

#[derive(Clone, Debug)]
pub struct ReminderState {
    pub text: String,
    pub target_user_id: u64,
    pub private: bool,
}

#[derive(Clone, Debug)]
pub struct MessageFingerprint {
    // Lowercased message content, the form all duplicate checks use.
    pub content: String,
    pub timestamp: DateTime<Utc>,
    pub channel_id: u64,
}

#[derive(Clone, Debug, Default)]
pub struct SpamWindowState {
    pub window: Vec<MessageFingerprint>,
    pub warning_count: u32,
}

#[derive(Clone, Debug)]
pub struct VerificationState {
    pub member_id: u64,
    pub role_id: u64,
    pub timeout_minutes: u64,
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};

    use crate::gateway::ScopeRef;
    use crate::registry::models::{
        Activity, ActivityKind, ActivityPayload, GiveawayState, PollState,
    };

    #[test]
    fn test_new_activity_has_no_deadline() {
        let payload = ActivityPayload::Giveaway(GiveawayState::new("a prize", 1, None));
        let activity = Activity::new(1, ScopeRef::new(Some(10), 20), payload);

        assert_eq!(activity.expires_at, None);
        assert_eq!(activity.cancelled, false);
        assert_eq!(activity.kind(), ActivityKind::Giveaway);
    }

    #[test]
    fn test_with_deadline_sets_expiry() {
        let deadline = Utc::now() + Duration::minutes(5);
        let payload = ActivityPayload::Poll(PollState::new("q", vec!["a".to_string()]));
        let activity =
            Activity::new(1, ScopeRef::new(Some(10), 20), payload).with_deadline(deadline);

        assert_eq!(activity.expires_at, Some(deadline));
        assert_eq!(activity.kind(), ActivityKind::Poll);
    }

    #[test]
    fn test_poll_state_allocates_one_vote_set_per_option() {
        let options = vec!["yes".to_string(), "no".to_string(), "maybe".to_string()];
        let state = PollState::new("question", options);

        assert_eq!(state.votes.len(), 3);
        assert_eq!(state.total_votes(), 0);
    }

    #[test]
    fn test_activity_ids_are_unique() {
        let first = Activity::new(
            1,
            ScopeRef::new(None, 20),
            ActivityPayload::Giveaway(GiveawayState::new("prize", 1, None)),
        );
        let second = Activity::new(
            1,
            ScopeRef::new(None, 20),
            ActivityPayload::Giveaway(GiveawayState::new("prize", 1, None)),
        );

        assert_ne!(first.id, second.id);
    }
}
