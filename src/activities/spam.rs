use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use tracing::{info, warn};

use crate::gateway::{Gateway, MessageRef, ScopeRef};
use crate::registry::ActivityRegistry;
use crate::registry::models::{
    Activity, ActivityId, ActivityPayload, MessageFingerprint, SpamWindowState,
};

pub const SPAM_WINDOW_MS: i64 = 5000;
pub const FREQUENCY_THRESHOLD: usize = 5;
pub const DUPLICATE_THRESHOLD: usize = 3;
pub const MENTION_THRESHOLD: usize = 5;
// Violations beyond this many prior warnings escalate to a timeout.
pub const ESCALATION_THRESHOLD: u32 = 2;
pub const MAX_TIMEOUT_MINUTES: u64 = 60;
pub const NOTICE_TTL_SECONDS: u64 = 10;

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ViolationKind {
    Frequency,
    Duplicate,
    Caps,
    Mentions,
}

impl ViolationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ViolationKind::Frequency => "frequency",
            ViolationKind::Duplicate => "duplicate",
            ViolationKind::Caps => "caps",
            ViolationKind::Mentions => "mentions",
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum SpamAction {
    Warn,
    Timeout { minutes: u64 },
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Violation {
    pub kind: ViolationKind,
    pub description: String,
    // Violations recorded for the user before this one.
    pub prior_warnings: u32,
    pub action: SpamAction,
}

// The slice of an inbound message the tracker needs.
#[derive(Clone, Debug)]
pub struct ObservedMessage {
    pub guild_id: u64,
    pub guild_name: String,
    pub channel_id: u64,
    pub message_id: u64,
    pub author_id: u64,
    pub content: String,
    pub mention_count: usize,
    pub timestamp: DateTime<Utc>,
}

// Per-user, per-guild sliding-window spam detector. Each user's window
// lives in the registry as a SpamWindow activity without a deadline; it
// expires per message instead of per timer.
#[derive(Clone)]
pub struct SpamTracker {
    registry: Arc<ActivityRegistry>,
    windows: Arc<DashMap<(u64, u64), ActivityId>>,
}

impl SpamTracker {
    pub fn new(registry: Arc<ActivityRegistry>) -> Self {
        SpamTracker {
            registry,
            windows: Arc::new(DashMap::new()),
        }
    }

    // Feeds one message into the user's window and reports at most one
    // violation, evaluated in fixed priority order.
    pub fn observe(&self, message: &ObservedMessage) -> Option<Violation> {
        let id = self.window_id(message);
        self.registry
            .mutate(&id, |activity| {
                let ActivityPayload::SpamWindow(state) = &mut activity.payload else {
                    return None;
                };
                state.window.push(MessageFingerprint {
                    content: message.content.to_lowercase(),
                    timestamp: message.timestamp,
                    channel_id: message.channel_id,
                });
                let horizon = message.timestamp - Duration::milliseconds(SPAM_WINDOW_MS);
                state.window.retain(|entry| entry.timestamp > horizon);

                let (kind, description) = evaluate(state, message)?;
                let prior_warnings = state.warning_count;
                state.warning_count += 1;
                Some(Violation {
                    kind,
                    description,
                    prior_warnings,
                    action: action_for(prior_warnings),
                })
            })
            .flatten()
    }

    // Applies the side effects of a violation: delete the offending
    // message, escalate to a timeout when due, post a short-lived channel
    // notice and attempt a direct message. Every Gateway failure here is
    // swallowed; one offender's error must not poison the tracker.
    pub async fn enforce(
        &self,
        gateway: &Arc<dyn Gateway>,
        message: &ObservedMessage,
        violation: &Violation,
    ) {
        let offending = MessageRef {
            channel_id: message.channel_id,
            message_id: message.message_id,
        };
        let _ = gateway.delete_message(&offending).await;

        let mut applied_timeout = false;
        if let SpamAction::Timeout { minutes } = violation.action {
            let member = gateway
                .fetch_member(message.guild_id, message.author_id)
                .await;
            if member.map(|view| view.moderatable).unwrap_or(false) {
                let until = Utc::now() + Duration::minutes(minutes as i64);
                let reason = format!("Anti-spam: {}", violation.description);
                match gateway
                    .timeout_member(message.guild_id, message.author_id, until, &reason)
                    .await
                {
                    Ok(()) => applied_timeout = true,
                    Err(err) => warn!("Can't time the spammer out: {}", err),
                }
            }
        }

        let notice = render_notice(message.author_id, violation, applied_timeout);
        match gateway.send_message(message.channel_id, &notice).await {
            Ok(sent) => {
                // The channel notice removes itself after a short while.
                let gateway = gateway.clone();
                tokio::spawn(async move {
                    tokio::time::sleep(StdDuration::from_secs(NOTICE_TTL_SECONDS)).await;
                    let _ = gateway.delete_message(&sent).await;
                });
            }
            Err(err) => warn!("Can't post the anti-spam notice: {}", err),
        }

        let _ = gateway
            .send_direct_message(
                message.author_id,
                &render_direct_notice(&message.guild_name, violation),
            )
            .await;

        info!(
            "Anti-spam action taken: user {} - {} - warning #{}",
            message.author_id,
            violation.kind.as_str(),
            violation.prior_warnings + 1,
        );
    }

    fn window_id(&self, message: &ObservedMessage) -> ActivityId {
        *self
            .windows
            .entry((message.guild_id, message.author_id))
            .or_insert_with(|| {
                let activity = Activity::new(
                    message.author_id,
                    ScopeRef::new(Some(message.guild_id), message.channel_id),
                    ActivityPayload::SpamWindow(SpamWindowState::default()),
                );
                self.registry.insert(activity)
            })
            .value()
    }
}

// Fixed priority order; the first matching rule wins and only one
// violation is reported per message.
fn evaluate(
    state: &SpamWindowState,
    message: &ObservedMessage,
) -> Option<(ViolationKind, String)> {
    if state.window.len() >= FREQUENCY_THRESHOLD {
        let description = format!(
            "Sending {} messages in {} seconds",
            state.window.len(),
            SPAM_WINDOW_MS / 1000,
        );
        return Some((ViolationKind::Frequency, description));
    }

    let needle = message.content.to_lowercase();
    let duplicates = state
        .window
        .iter()
        .filter(|entry| entry.content == needle)
        .count();
    if duplicates >= DUPLICATE_THRESHOLD {
        let description = format!("Repeating the same message {} times", duplicates);
        return Some((ViolationKind::Duplicate, description));
    }

    if is_caps_spam(&message.content) {
        let description = "Excessive use of capital letters".to_string();
        return Some((ViolationKind::Caps, description));
    }

    if message.mention_count >= MENTION_THRESHOLD {
        let description = format!(
            "Mentioning {} users/roles in one message",
            message.mention_count,
        );
        return Some((ViolationKind::Mentions, description));
    }

    None
}

fn is_caps_spam(content: &str) -> bool {
    let total = content.chars().count();
    if total <= 20 || content != content.to_uppercase() {
        return false;
    }
    let upper = content.chars().filter(|c| c.is_ascii_uppercase()).count();
    upper as f64 > total as f64 * 0.7
}

fn action_for(prior_warnings: u32) -> SpamAction {
    match prior_warnings >= ESCALATION_THRESHOLD {
        true => SpamAction::Timeout {
            minutes: timeout_minutes(prior_warnings),
        },
        false => SpamAction::Warn,
    }
}

// Exponential backoff: 5 * 2^(warnings - 2) minutes, capped at one hour.
pub fn timeout_minutes(prior_warnings: u32) -> u64 {
    let exponent = (prior_warnings - ESCALATION_THRESHOLD).min(4);
    (5u64 << exponent).min(MAX_TIMEOUT_MINUTES)
}

fn render_notice(author_id: u64, violation: &Violation, applied_timeout: bool) -> String {
    let mut notice = format!(
        "<@{}>, please slow down and follow our community guidelines.\n🚫 **Anti-Spam Detection**: {} (warning #{})",
        author_id,
        violation.description,
        violation.prior_warnings + 1,
    );
    if applied_timeout {
        if let SpamAction::Timeout { minutes } = violation.action {
            notice.push_str(&format!(
                "\nUser has been timed out for {} minutes",
                minutes
            ));
        }
    }
    notice
}

fn render_direct_notice(guild_name: &str, violation: &Violation) -> String {
    let action = match violation.action {
        SpamAction::Timeout { minutes } => {
            format!("You have been timed out for {} minutes", minutes)
        }
        SpamAction::Warn => "This is a warning".to_string(),
    };
    format!(
        "⚠️ **Spam Detection**\nYour message in **{}** was flagged for spam.\nReason: {}\nAction: {}",
        guild_name, violation.description, action,
    )
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration as StdDuration;

    use chrono::{DateTime, Duration, Utc};

    use crate::activities::spam::{
        ObservedMessage, SpamAction, SpamTracker, Violation, ViolationKind, timeout_minutes,
    };
    use crate::gateway::testing::{GatewayCall, RecordingGateway};
    use crate::gateway::{Gateway, MemberView};
    use crate::registry::ActivityRegistry;

    fn base_time() -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000, 0).unwrap()
    }

    fn message(content: &str, offset_ms: i64, message_id: u64) -> ObservedMessage {
        ObservedMessage {
            guild_id: 1,
            guild_name: "Test Guild".to_string(),
            channel_id: 2,
            message_id,
            author_id: 42,
            content: content.to_string(),
            mention_count: 0,
            timestamp: base_time() + Duration::milliseconds(offset_ms),
        }
    }

    fn tracker() -> SpamTracker {
        SpamTracker::new(Arc::new(ActivityRegistry::new()))
    }

    #[test]
    fn test_five_quick_messages_trigger_one_frequency_violation() {
        let tracker = tracker();

        for index in 0..4 {
            let observed = message(&format!("message {}", index), index * 500, index as u64);
            assert_eq!(tracker.observe(&observed).is_none(), true);
        }

        let violation = tracker.observe(&message("message 4", 2000, 4)).unwrap();
        assert_eq!(violation.kind, ViolationKind::Frequency);
        assert_eq!(violation.action, SpamAction::Warn);
    }

    #[test]
    fn test_duplicates_fire_before_the_frequency_rule() {
        let tracker = tracker();

        assert_eq!(tracker.observe(&message("buy cheap keys", 0, 0)).is_none(), true);
        assert_eq!(tracker.observe(&message("BUY CHEAP KEYS", 500, 1)).is_none(), true);

        let violation = tracker.observe(&message("buy cheap keys", 1000, 2)).unwrap();
        assert_eq!(violation.kind, ViolationKind::Duplicate);
        assert_eq!(violation.description, "Repeating the same message 3 times");
    }

    #[test]
    fn test_long_upper_case_message_triggers_the_caps_rule() {
        let tracker = tracker();

        let violation = tracker
            .observe(&message("THIS IS DEFINITELY WAY TOO LOUD FOR CHAT", 0, 0))
            .unwrap();
        assert_eq!(violation.kind, ViolationKind::Caps);
    }

    #[test]
    fn test_short_or_mixed_case_messages_pass_the_caps_rule() {
        let tracker = tracker();

        assert_eq!(tracker.observe(&message("SHORT YELL", 0, 0)).is_none(), true);
        assert_eq!(
            tracker
                .observe(&message("This Is A Long Message With Mixed Case", 6000, 1))
                .is_none(),
            true
        );
    }

    #[test]
    fn test_mention_heavy_message_triggers_the_mentions_rule() {
        let tracker = tracker();

        let mut observed = message("hello there", 0, 0);
        observed.mention_count = 5;
        let violation = tracker.observe(&observed).unwrap();
        assert_eq!(violation.kind, ViolationKind::Mentions);
        assert_eq!(violation.description, "Mentioning 5 users/roles in one message");
    }

    #[test]
    fn test_old_entries_are_pruned_from_the_window() {
        let tracker = tracker();

        for index in 0..4 {
            tracker.observe(&message(&format!("m{}", index), index * 500, index as u64));
        }
        // Far enough in the future that every earlier entry fell out.
        let observed = message("m4", 60_000, 4);
        assert_eq!(tracker.observe(&observed).is_none(), true);
    }

    #[test]
    fn test_timeouts_back_off_exponentially_and_cap_at_an_hour() {
        let tracker = tracker();
        let mut actions = Vec::new();

        // Violations spaced outside the window, so only the caps rule fires.
        for index in 0..7 {
            let observed = message(
                "THIS IS DEFINITELY WAY TOO LOUD FOR CHAT",
                index * 10_000,
                index as u64,
            );
            let violation = tracker.observe(&observed).unwrap();
            actions.push(violation.action);
        }

        assert_eq!(actions[0], SpamAction::Warn);
        assert_eq!(actions[1], SpamAction::Warn);
        assert_eq!(actions[2], SpamAction::Timeout { minutes: 5 });
        assert_eq!(actions[3], SpamAction::Timeout { minutes: 10 });
        assert_eq!(actions[4], SpamAction::Timeout { minutes: 20 });
        assert_eq!(actions[5], SpamAction::Timeout { minutes: 40 });
        assert_eq!(actions[6], SpamAction::Timeout { minutes: 60 });
    }

    #[test]
    fn test_timeout_minutes_stay_capped_for_long_histories() {
        assert_eq!(timeout_minutes(2), 5);
        assert_eq!(timeout_minutes(3), 10);
        assert_eq!(timeout_minutes(6), 60);
        assert_eq!(timeout_minutes(40), 60);
    }

    fn warn_violation() -> Violation {
        Violation {
            kind: ViolationKind::Frequency,
            description: "Sending 5 messages in 5 seconds".to_string(),
            prior_warnings: 0,
            action: SpamAction::Warn,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_enforce_deletes_the_message_and_posts_a_fading_notice() {
        let tracker = tracker();
        let recording = Arc::new(RecordingGateway::new());
        let gateway: Arc<dyn Gateway> = recording.clone();
        let observed = message("spam spam spam", 0, 7);

        tracker.enforce(&gateway, &observed, &warn_violation()).await;

        let calls = recording.calls();
        assert_eq!(calls.len(), 3);
        match &calls[0] {
            GatewayCall::DeleteMessage { message } => assert_eq!(message.message_id, 7),
            other => panic!("unexpected call: {:?}", other),
        }
        match &calls[1] {
            GatewayCall::SendMessage { content, .. } => {
                assert_eq!(content.contains("please slow down"), true);
                assert_eq!(content.contains("warning #1"), true);
            }
            other => panic!("unexpected call: {:?}", other),
        }

        // The notice deletes itself after its time to live.
        tokio::time::sleep(StdDuration::from_secs(11)).await;
        let calls = recording.calls();
        assert_eq!(calls.len(), 4);
        match &calls[3] {
            GatewayCall::DeleteMessage { .. } => {}
            other => panic!("unexpected call: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_enforce_times_a_moderatable_member_out() {
        let tracker = tracker();
        let recording = Arc::new(RecordingGateway::new());
        recording.put_member(
            1,
            MemberView {
                user_id: 42,
                role_ids: vec![],
                kickable: true,
                moderatable: true,
            },
        );
        let gateway: Arc<dyn Gateway> = recording.clone();
        let observed = message("spam spam spam", 0, 7);
        let violation = Violation {
            action: SpamAction::Timeout { minutes: 5 },
            prior_warnings: 2,
            ..warn_violation()
        };

        tracker.enforce(&gateway, &observed, &violation).await;

        let timed_out = recording
            .calls()
            .iter()
            .any(|call| matches!(call, GatewayCall::Timeout { user_id: 42, .. }));
        assert_eq!(timed_out, true);
    }

    #[tokio::test]
    async fn test_enforce_skips_the_timeout_for_missing_members() {
        let tracker = tracker();
        let recording = Arc::new(RecordingGateway::new());
        let gateway: Arc<dyn Gateway> = recording.clone();
        let observed = message("spam spam spam", 0, 7);
        let violation = Violation {
            action: SpamAction::Timeout { minutes: 5 },
            prior_warnings: 2,
            ..warn_violation()
        };

        tracker.enforce(&gateway, &observed, &violation).await;

        let timed_out = recording
            .calls()
            .iter()
            .any(|call| matches!(call, GatewayCall::Timeout { .. }));
        assert_eq!(timed_out, false);
    }
}
