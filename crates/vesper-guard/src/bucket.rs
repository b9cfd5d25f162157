//! Per-channel token-bucket rate limiting.

use std::time::Instant;
use tracing::trace;
use vesper_config::RateLimitSettings;
use vesper_core::ChannelId;

/// A token bucket. Tokens are always in `[0, max_tokens]`.
#[derive(Debug)]
pub struct RateBucket {
    tokens: u32,
    last_refill: Instant,
    settings: RateLimitSettings,
}

impl RateBucket {
    /// Create a full bucket.
    #[must_use]
    pub fn new(settings: RateLimitSettings, now: Instant) -> Self {
        Self {
            tokens: settings.max_tokens,
            last_refill: now,
            settings,
        }
    }

    /// Current token count.
    #[must_use]
    pub fn tokens(&self) -> u32 {
        self.tokens
    }

    /// Refill based on elapsed time, then consume one token if any
    /// remain. Returns whether a token was consumed.
    pub fn try_consume(&mut self, now: Instant) -> bool {
        self.refill(now);
        if self.tokens > 0 {
            self.tokens = self.tokens.saturating_sub(1);
            true
        } else {
            trace!("rate bucket empty");
            false
        }
    }

    fn refill(&mut self, now: Instant) {
        let interval = self.settings.refill_interval();
        if interval.is_zero() {
            self.tokens = self.settings.max_tokens;
            self.last_refill = now;
            return;
        }

        let elapsed = now.saturating_duration_since(self.last_refill);
        let intervals = elapsed.as_nanos().checked_div(interval.as_nanos());
        let Some(intervals) = intervals else { return };
        if intervals == 0 {
            return;
        }

        let intervals_u32 = u32::try_from(intervals).unwrap_or(u32::MAX);
        let added = intervals_u32.saturating_mul(self.settings.refill_amount);
        self.tokens = self
            .tokens
            .saturating_add(added)
            .min(self.settings.max_tokens);

        // Advance by whole intervals so fractional elapsed time keeps
        // accruing toward the next refill.
        let advance = interval.saturating_mul(intervals_u32);
        self.last_refill = self
            .last_refill
            .checked_add(advance)
            .unwrap_or(now);
    }
}

/// Per-channel rate limiter.
#[derive(Debug)]
pub struct RateLimiter {
    buckets: dashmap::DashMap<ChannelId, RateBucket>,
    settings: RateLimitSettings,
}

impl RateLimiter {
    /// Create a limiter; buckets materialize per channel on first use.
    #[must_use]
    pub fn new(settings: RateLimitSettings) -> Self {
        Self {
            buckets: dashmap::DashMap::new(),
            settings,
        }
    }

    /// Try to consume one token from the channel's bucket.
    pub fn try_consume(&self, channel: &ChannelId, now: Instant) -> bool {
        self.buckets
            .entry(channel.clone())
            .or_insert_with(|| RateBucket::new(self.settings, now))
            .try_consume(now)
    }

    /// Token count for a channel, if its bucket exists yet.
    #[must_use]
    pub fn tokens(&self, channel: &ChannelId) -> Option<u32> {
        self.buckets.get(channel).map(|b| b.tokens())
    }
}
