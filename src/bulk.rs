use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration, Utc};
use tracing::{info, warn};

use crate::gateway::{Gateway, MessageRef};

// The platform refuses bulk deletion of messages older than two weeks.
pub const BULK_ELIGIBILITY_DAYS: i64 = 14;
pub const BULK_BATCH_SIZE: usize = 100;
pub const BULK_BATCH_DELAY_MS: u64 = 1000;
pub const SINGLE_DELETE_DELAY_MS: u64 = 500;

#[derive(Clone, Debug)]
pub struct CandidateMessage {
    pub message_id: u64,
    pub created_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct BulkDeleteReport {
    pub deleted: usize,
    pub failed: usize,
}

// Deletes the candidate messages, batching what the platform allows and
// throttling the rest. Messages young enough for bulk deletion go out in
// batches; older ones are deleted one at a time with an inter-call
// delay. Individual failures are counted, never abort the remainder.
pub async fn delete_candidates(
    gateway: &Arc<dyn Gateway>,
    channel_id: u64,
    candidates: Vec<CandidateMessage>,
    now: DateTime<Utc>,
) -> BulkDeleteReport {
    let boundary = now - Duration::days(BULK_ELIGIBILITY_DAYS);
    let (recent, old): (Vec<CandidateMessage>, Vec<CandidateMessage>) = candidates
        .into_iter()
        .partition(|candidate| candidate.created_at > boundary);

    let mut report = BulkDeleteReport::default();

    let batches = recent.chunks(BULK_BATCH_SIZE).collect::<Vec<_>>();
    let batch_count = batches.len();
    for (index, batch) in batches.into_iter().enumerate() {
        let result = match batch.len() {
            // The bulk endpoint rejects single-message batches.
            1 => {
                let message = MessageRef {
                    channel_id,
                    message_id: batch[0].message_id,
                };
                gateway.delete_message(&message).await
            }
            _ => {
                let ids = batch
                    .iter()
                    .map(|candidate| candidate.message_id)
                    .collect::<Vec<u64>>();
                gateway.delete_messages(channel_id, &ids).await
            }
        };

        match result {
            Ok(()) => report.deleted += batch.len(),
            Err(err) => {
                warn!("Error bulk deleting messages: {}", err);
                report.failed += batch.len();
            }
        }

        if index + 1 < batch_count {
            tokio::time::sleep(StdDuration::from_millis(BULK_BATCH_DELAY_MS)).await;
        }
    }

    for candidate in &old {
        let message = MessageRef {
            channel_id,
            message_id: candidate.message_id,
        };
        match gateway.delete_message(&message).await {
            Ok(()) => report.deleted += 1,
            Err(_) => report.failed += 1,
        }

        // Individual deletions get the longer delay.
        tokio::time::sleep(StdDuration::from_millis(SINGLE_DELETE_DELAY_MS)).await;
    }

    info!(
        "Bulk deletion finished: {} deleted, {} failed",
        report.deleted, report.failed,
    );
    report
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::{Duration, Utc};

    use crate::bulk::{BulkDeleteReport, CandidateMessage, delete_candidates};
    use crate::gateway::Gateway;
    use crate::gateway::testing::{GatewayCall, RecordingGateway};

    fn candidates(recent: usize, old: usize) -> Vec<CandidateMessage> {
        let now = Utc::now();
        let mut result = Vec::new();
        for index in 0..recent {
            result.push(CandidateMessage {
                message_id: index as u64,
                created_at: now - Duration::hours(1),
            });
        }
        for index in 0..old {
            result.push(CandidateMessage {
                message_id: (recent + index) as u64,
                created_at: now - Duration::days(20),
            });
        }
        result
    }

    fn recording_pair() -> (Arc<RecordingGateway>, Arc<dyn Gateway>) {
        let recording = Arc::new(RecordingGateway::new());
        let gateway: Arc<dyn Gateway> = recording.clone();
        (recording, gateway)
    }

    #[tokio::test(start_paused = true)]
    async fn test_partitioning_batches_recent_and_walks_old_individually() {
        let (recording, gateway) = recording_pair();

        let report = delete_candidates(&gateway, 7, candidates(120, 30), Utc::now()).await;
        assert_eq!(report, BulkDeleteReport { deleted: 150, failed: 0 });

        let calls = recording.calls();
        let bulk_sizes = calls
            .iter()
            .filter_map(|call| match call {
                GatewayCall::DeleteMessages { message_ids, .. } => Some(message_ids.len()),
                _ => None,
            })
            .collect::<Vec<usize>>();
        assert_eq!(bulk_sizes, vec![100, 20]);

        let individual = calls
            .iter()
            .filter(|call| matches!(call, GatewayCall::DeleteMessage { .. }))
            .count();
        assert_eq!(individual, 30);
    }

    #[tokio::test(start_paused = true)]
    async fn test_a_single_recent_message_avoids_the_bulk_endpoint() {
        let (recording, gateway) = recording_pair();

        let report = delete_candidates(&gateway, 7, candidates(1, 0), Utc::now()).await;
        assert_eq!(report, BulkDeleteReport { deleted: 1, failed: 0 });

        let calls = recording.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(matches!(calls[0], GatewayCall::DeleteMessage { .. }), true);
    }

    #[tokio::test(start_paused = true)]
    async fn test_individual_failures_are_counted_and_do_not_abort() {
        let (recording, gateway) = recording_pair();
        // Two of the old messages refuse to die.
        recording.fail_delete_of(10);
        recording.fail_delete_of(12);

        let report = delete_candidates(&gateway, 7, candidates(10, 5), Utc::now()).await;
        assert_eq!(report, BulkDeleteReport { deleted: 13, failed: 2 });
    }

    #[tokio::test(start_paused = true)]
    async fn test_a_failed_batch_counts_all_of_its_messages() {
        let (recording, gateway) = recording_pair();
        recording.fail_delete_of(5);

        let report = delete_candidates(&gateway, 7, candidates(120, 0), Utc::now()).await;
        assert_eq!(report, BulkDeleteReport { deleted: 20, failed: 100 });
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_candidates_produce_an_empty_report() {
        let (recording, gateway) = recording_pair();

        let report = delete_candidates(&gateway, 7, Vec::new(), Utc::now()).await;
        assert_eq!(report, BulkDeleteReport::default());
        assert_eq!(recording.calls().is_empty(), true);
    }
}
