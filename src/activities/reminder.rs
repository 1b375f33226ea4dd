use std::sync::Arc;

use tracing::{info, warn};

use crate::gateway::Gateway;
use crate::registry::models::{Activity, ActivityPayload};

// Delivers the reminder once its deadline fires. There is no
// cancellation path: once set, a reminder always fires.
pub async fn fire(gateway: &Arc<dyn Gateway>, activity: Activity) {
    let ActivityPayload::Reminder(state) = &activity.payload else {
        return;
    };
    let content = format!(
        "⏰ **Reminder!**\n{}\n\nSet by <@{}> <t:{}:R>",
        state.text,
        activity.owner_id,
        activity.created_at.timestamp(),
    );

    match state.private {
        true => {
            // Private delivery falls back to a channel mention when the
            // target disallows direct messages.
            if gateway
                .send_direct_message(state.target_user_id, &content)
                .await
                .is_err()
            {
                let fallback = format!(
                    "<@{}>, I couldn't send you a private reminder:\n{}",
                    state.target_user_id, content,
                );
                if let Err(err) = gateway
                    .send_message(activity.scope.channel_id, &fallback)
                    .await
                {
                    warn!("Can't deliver the reminder {}: {}", activity.id, err);
                }
            }
        }
        false => {
            let message = format!("<@{}>\n{}", state.target_user_id, content);
            if let Err(err) = gateway
                .send_message(activity.scope.channel_id, &message)
                .await
            {
                warn!("Can't deliver the reminder {}: {}", activity.id, err);
            }
        }
    }

    info!(
        "Reminder {} delivered to the user {}",
        activity.id, state.target_user_id
    );
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use crate::activities::reminder::fire;
    use crate::gateway::testing::{GatewayCall, RecordingGateway};
    use crate::gateway::{Gateway, ScopeRef};
    use crate::registry::models::{Activity, ActivityPayload, ReminderState};

    fn reminder(private: bool) -> Activity {
        let payload = ActivityPayload::Reminder(ReminderState {
            text: "stretch your legs".to_string(),
            target_user_id: 77,
            private,
        });
        Activity::new(1, ScopeRef::new(Some(1), 2), payload)
    }

    #[tokio::test]
    async fn test_public_reminder_mentions_the_target_in_the_channel() {
        let recording = Arc::new(RecordingGateway::new());
        let gateway: Arc<dyn Gateway> = recording.clone();

        fire(&gateway, reminder(false)).await;

        let calls = recording.calls();
        assert_eq!(calls.len(), 1);
        match &calls[0] {
            GatewayCall::SendMessage { channel_id, content } => {
                assert_eq!(*channel_id, 2);
                assert_eq!(content.starts_with("<@77>"), true);
                assert_eq!(content.contains("stretch your legs"), true);
            }
            other => panic!("unexpected call: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_private_reminder_goes_over_direct_message() {
        let recording = Arc::new(RecordingGateway::new());
        let gateway: Arc<dyn Gateway> = recording.clone();

        fire(&gateway, reminder(true)).await;

        let calls = recording.calls();
        assert_eq!(calls.len(), 1);
        match &calls[0] {
            GatewayCall::DirectMessage { user_id, content } => {
                assert_eq!(*user_id, 77);
                assert_eq!(content.contains("stretch your legs"), true);
            }
            other => panic!("unexpected call: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_private_reminder_falls_back_to_the_channel() {
        let recording = Arc::new(RecordingGateway::new());
        recording.fail_direct_messages();
        let gateway: Arc<dyn Gateway> = recording.clone();

        fire(&gateway, reminder(true)).await;

        let calls = recording.calls();
        assert_eq!(calls.len(), 1);
        match &calls[0] {
            GatewayCall::SendMessage { channel_id, content } => {
                assert_eq!(*channel_id, 2);
                assert_eq!(content.contains("couldn't send you a private reminder"), true);
            }
            other => panic!("unexpected call: {:?}", other),
        }
    }
}
