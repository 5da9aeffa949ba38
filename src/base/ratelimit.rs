//! Token bucket rate limiter for outbound chat messages.
//!
//! Allows bursts of up to `bucket` messages. Once the bucket is empty, messages
//! are spaced at least `interval` apart. The bucket is refilled in full (not
//! incrementally) whenever `bucket_interval` has passed since the last grant.
//!
//! Because the refill is measured from the last grant rather than from the moment
//! the bucket ran dry, a sender that always waits longer than `bucket_interval`
//! between messages never sees an empty bucket.

use std::time::Duration;

use tokio::time::{Instant, sleep_until};
use tracing::debug;

use super::config::RatelimitConfig;

/// Slack added to the spacing deadline, since spacing requires strictly more than `interval`.
const SPACING_EPSILON: Duration = Duration::from_millis(1);

/// Stand-in deadline for durations that do not fit in an `Instant`.
const FAR_FUTURE: Duration = Duration::from_secs(86400 * 365 * 30);

#[derive(Debug)]
pub struct Ratelimit {
    interval: Duration,
    bucket: u32,
    bucket_interval: Duration,
    count: u32,
    last: Option<Instant>,
}

impl Ratelimit {
    pub fn new(interval: Duration, bucket: u32, bucket_interval: Duration) -> Self {
        Self {
            interval,
            bucket,
            bucket_interval,
            count: 0,
            last: None,
        }
    }

    /// Tokens left in the bucket as of the last grant.
    pub fn remaining(&self) -> u32 {
        self.count
    }

    /// Wait until one message may be sent.
    ///
    /// Never fails; it only delays.
    pub async fn acquire(&mut self) {
        loop {
            let now = Instant::now();

            let Some(last) = self.last else {
                // Nothing granted yet, so the bucket starts full.
                self.count = self.bucket;
                self.grant(now);
                return;
            };

            let delta = now.saturating_duration_since(last);

            if delta >= self.bucket_interval {
                self.count = self.bucket;
            }

            debug!(bucket = self.bucket, count = self.count, ?delta, "ratelimit check");

            if self.count > 0 || delta > self.interval {
                self.grant(now);
                return;
            }

            debug!("ratelimiting");

            let spacing_deadline = deadline(last, self.interval.saturating_add(SPACING_EPSILON), now);
            let refill_deadline = deadline(last, self.bucket_interval, now);
            sleep_until(spacing_deadline.min(refill_deadline)).await;
        }
    }

    fn grant(&mut self, now: Instant) {
        self.count = self.count.saturating_sub(1);
        self.last = Some(now);
    }
}

fn deadline(last: Instant, after: Duration, now: Instant) -> Instant {
    last.checked_add(after).unwrap_or_else(|| now + FAR_FUTURE)
}

impl From<&RatelimitConfig> for Ratelimit {
    fn from(config: &RatelimitConfig) -> Self {
        Self::new(config.interval, config.bucket, config.bucket_interval)
    }
}

// Tests.
