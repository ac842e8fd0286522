use std::sync::Arc;

use chrono::Duration;

use super::storage::ChallengeRepository;
use crate::clock::Clock;

/// Sliding-window limit on challenge issuance per client IP, counted from the
/// challenge table itself.
pub struct RateLimiter {
    challenges: Arc<dyn ChallengeRepository>,
    clock: Arc<dyn Clock>,
}

impl RateLimiter {
    pub(crate) fn new(challenges: Arc<dyn ChallengeRepository>, clock: Arc<dyn Clock>) -> Self {
        Self { challenges, clock }
    }

    /// True when `origin_ip` issued more than `max_attempts` challenges within `window`.
    ///
    /// An unknown IP is never limited. Storage errors fail open.
    pub async fn is_limited(&self, origin_ip: Option<&str>, max_attempts: u32, window: Duration) -> bool {
        let Some(ip) = origin_ip.map(str::trim).filter(|ip| !ip.is_empty()) else {
            return false;
        };

        let since = self.clock.now() - window;
        let limit = max_attempts as usize + 1;
        match self.challenges.count_recent_by_ip(ip, since, limit).await {
            Ok(count) => count > max_attempts as usize,
            Err(e) => {
                tracing::warn!("Rate limit check failed for {}, allowing request: {}", ip, e);
                false
            }
        }
    }
}
