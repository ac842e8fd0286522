use std::sync::Arc;

use tokio::task::JoinHandle;

use super::service::PasskeyService;
use crate::passkey::ChallengeStore;

/// Upper bound on consecutive full batches in one sweep run.
const MAX_BATCHES_PER_RUN: usize = 100;

/// Sweeps full batches until a short one comes back. Returns the total removed.
pub async fn sweep_until_clean(challenges: &ChallengeStore, batch_limit: usize) -> u64 {
    if batch_limit == 0 {
        return 0;
    }

    let mut total = 0;
    for _ in 0..MAX_BATCHES_PER_RUN {
        let deleted = challenges.sweep_expired(batch_limit).await;
        total += deleted;
        if deleted < batch_limit as u64 {
            break;
        }
    }
    total
}

/// Runs one sweep immediately, then one every `sweep_interval`.
///
/// The task runs until the returned handle is aborted or the runtime shuts down.
pub fn spawn_challenge_sweeper(service: Arc<PasskeyService>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let batch = service.config().sweep_batch;
        let mut interval = tokio::time::interval(service.config().sweep_interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            // The first tick completes immediately.
            interval.tick().await;
            let removed = sweep_until_clean(service.challenges(), batch).await;
            if removed > 0 {
                tracing::info!(
                    event = "passkey_challenges_swept",
                    removed,
                    "Removed expired challenges"
                );
            }
        }
    })
}
