pub mod models;

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::task::JoinHandle;
use tracing::info;

use crate::registry::models::{Activity, ActivityId};

// Process-wide keyed store of live ephemeral activities. Owns the
// expiry timer of every entry, so cancellation and firing behave the
// same for all activity kinds.
//
// Mutations go through `mutate`, which applies the transition function
// against the stored value under the map entry, never against a stale
// snapshot. Terminal removal (`take` or the timer firing) wins every
// race: once the entry is gone, further mutations are no-ops.
#[derive(Debug, Default)]
pub struct ActivityRegistry {
    entries: DashMap<ActivityId, Activity>,
    timers: DashMap<ActivityId, JoinHandle<()>>,
}

impl ActivityRegistry {
    pub fn new() -> Self {
        ActivityRegistry::default()
    }

    // Stores the activity and returns its id.
    pub fn insert(&self, activity: Activity) -> ActivityId {
        let id = activity.id;
        info!("Registered {} activity {}", activity.kind().as_str(), id);
        self.entries.insert(id, activity);
        id
    }

    // Snapshot of a live activity. Absent when the id was never created,
    // already terminal, or cancelled.
    pub fn get(&self, id: &ActivityId) -> Option<Activity> {
        self.entries.get(id).map(|entry| entry.value().clone())
    }

    // Applies a transition to the stored activity. Returns None when the
    // activity is no longer live; the transition is not applied then.
    pub fn mutate<R>(&self, id: &ActivityId, f: impl FnOnce(&mut Activity) -> R) -> Option<R> {
        self.entries.get_mut(id).map(|mut entry| f(entry.value_mut()))
    }

    // Removes the activity for its terminal action and clears the pending
    // timer. The timer is only aborted when this call actually removed
    // the entry, so an already-running expiry is never cancelled mid-way.
    pub fn take(&self, id: &ActivityId) -> Option<Activity> {
        let removed = self.entries.remove(id).map(|(_, activity)| activity);
        if removed.is_some() {
            if let Some((_, handle)) = self.timers.remove(id) {
                handle.abort();
            }
        }
        removed
    }

    // Idempotent removal without a terminal action.
    pub fn cancel(&self, id: &ActivityId) {
        if let Some(mut activity) = self.take(id) {
            activity.cancelled = true;
            info!("Cancelled {} activity {}", activity.kind().as_str(), id);
        }
    }

    // Looks a live activity up by the message it is attached to.
    pub fn find_by_message(&self, message_id: u64) -> Option<Activity> {
        self.entries
            .iter()
            .find(|entry| entry.value().scope.message_id == Some(message_id))
            .map(|entry| entry.value().clone())
    }

    pub fn live_count(&self) -> usize {
        self.entries.len()
    }

    // Schedules a cancellable expiry timer for the activity. When it
    // fires, the entry is removed first and `on_expire` runs with the
    // owned snapshot; a timer whose entry was already taken does nothing.
    pub fn schedule<F, Fut>(self: &Arc<Self>, id: ActivityId, delay: Duration, on_expire: F)
    where
        F: FnOnce(Activity) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let registry = Arc::clone(self);
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            // Dropping our own handle first keeps a late `cancel` from
            // aborting the terminal action below.
            registry.timers.remove(&id);
            if let Some((_, activity)) = registry.entries.remove(&id) {
                on_expire(activity).await;
            }
        });
        self.timers.insert(id, handle);
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    use crate::gateway::ScopeRef;
    use crate::registry::ActivityRegistry;
    use crate::registry::models::{Activity, ActivityPayload, GiveawayState};

    fn giveaway_activity(owner_id: u64) -> Activity {
        let payload = ActivityPayload::Giveaway(GiveawayState::new("prize", 1, None));
        Activity::new(owner_id, ScopeRef::new(Some(1), 2), payload)
    }

    fn participants(activity: &Activity) -> HashSet<u64> {
        match &activity.payload {
            ActivityPayload::Giveaway(state) => state.participants.clone(),
            _ => panic!("expected a giveaway payload"),
        }
    }

    #[test]
    fn test_insert_and_get_returns_snapshot() {
        let registry = ActivityRegistry::new();
        let id = registry.insert(giveaway_activity(1));

        let snapshot = registry.get(&id).unwrap();
        assert_eq!(snapshot.id, id);
        assert_eq!(snapshot.owner_id, 1);
        assert_eq!(registry.live_count(), 1);
    }

    #[test]
    fn test_get_for_unknown_id_is_none() {
        let registry = ActivityRegistry::new();
        let unknown = giveaway_activity(1).id;

        assert_eq!(registry.get(&unknown).is_none(), true);
    }

    #[test]
    fn test_mutate_applies_to_stored_value() {
        let registry = ActivityRegistry::new();
        let id = registry.insert(giveaway_activity(1));

        let result = registry.mutate(&id, |activity| {
            if let ActivityPayload::Giveaway(state) = &mut activity.payload {
                state.participants.insert(42);
            }
            activity.owner_id
        });
        assert_eq!(result, Some(1));

        let snapshot = registry.get(&id).unwrap();
        assert_eq!(participants(&snapshot).contains(&42), true);
    }

    #[test]
    fn test_take_removes_the_entry_exactly_once() {
        let registry = ActivityRegistry::new();
        let id = registry.insert(giveaway_activity(1));

        assert_eq!(registry.take(&id).is_some(), true);
        assert_eq!(registry.take(&id).is_none(), true);
        assert_eq!(registry.get(&id).is_none(), true);
    }

    #[test]
    fn test_mutate_after_take_is_a_no_op() {
        let registry = ActivityRegistry::new();
        let id = registry.insert(giveaway_activity(1));
        registry.take(&id);

        let result = registry.mutate(&id, |_| ());
        assert_eq!(result.is_none(), true);
    }

    #[test]
    fn test_cancel_is_idempotent() {
        let registry = ActivityRegistry::new();
        let id = registry.insert(giveaway_activity(1));

        registry.cancel(&id);
        registry.cancel(&id);
        assert_eq!(registry.get(&id).is_none(), true);
    }

    #[test]
    fn test_find_by_message() {
        let registry = ActivityRegistry::new();
        let mut activity = giveaway_activity(1);
        activity.scope.message_id = Some(555);
        let id = registry.insert(activity);

        assert_eq!(registry.find_by_message(555).unwrap().id, id);
        assert_eq!(registry.find_by_message(556).is_none(), true);
    }

    #[tokio::test(start_paused = true)]
    async fn test_scheduled_timer_fires_exactly_once() {
        let registry = Arc::new(ActivityRegistry::new());
        let id = registry.insert(giveaway_activity(1));
        let fired = Arc::new(AtomicU32::new(0));

        let counter = fired.clone();
        registry.schedule(id, Duration::from_secs(60), move |_| async move {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        tokio::time::sleep(Duration::from_secs(61)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert_eq!(registry.get(&id).is_none(), true);

        tokio::time::sleep(Duration::from_secs(120)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_before_the_deadline_prevents_firing() {
        let registry = Arc::new(ActivityRegistry::new());
        let id = registry.insert(giveaway_activity(1));
        let fired = Arc::new(AtomicU32::new(0));

        let counter = fired.clone();
        registry.schedule(id, Duration::from_secs(60), move |_| async move {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        registry.cancel(&id);

        tokio::time::sleep(Duration::from_secs(120)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);
        assert_eq!(registry.get(&id).is_none(), true);
    }

    #[tokio::test(start_paused = true)]
    async fn test_expiry_wins_over_a_late_mutation() {
        let registry = Arc::new(ActivityRegistry::new());
        let id = registry.insert(giveaway_activity(1));

        registry.schedule(id, Duration::from_secs(60), move |_| async move {});
        tokio::time::sleep(Duration::from_secs(61)).await;

        // The mutation attempt targets a now-terminal id and must not apply.
        let result = registry.mutate(&id, |activity| {
            if let ActivityPayload::Giveaway(state) = &mut activity.payload {
                state.participants.insert(7);
            }
        });
        assert_eq!(result.is_none(), true);
        assert_eq!(registry.get(&id).is_none(), true);
    }

    #[tokio::test(start_paused = true)]
    async fn test_mutations_before_expiry_are_visible_to_the_terminal_action() {
        let registry = Arc::new(ActivityRegistry::new());
        let id = registry.insert(giveaway_activity(1));
        let seen = Arc::new(AtomicU32::new(0));

        let counter = seen.clone();
        registry.schedule(id, Duration::from_secs(60), move |activity| async move {
            if let ActivityPayload::Giveaway(state) = &activity.payload {
                counter.store(state.participants.len() as u32, Ordering::SeqCst);
            }
        });

        registry.mutate(&id, |activity| {
            if let ActivityPayload::Giveaway(state) = &mut activity.payload {
                state.participants.insert(1);
                state.participants.insert(2);
            }
        });

        tokio::time::sleep(Duration::from_secs(61)).await;
        assert_eq!(seen.load(Ordering::SeqCst), 2);
    }
}
