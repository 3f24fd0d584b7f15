use std::sync::atomic::{AtomicUsize, Ordering};

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use dashmap::DashMap;
use tokio::time::Instant;
use utils::response::ApiResponse;
use uuid::Uuid;

pub const RATE_LIMIT_MESSAGE: &str =
    "You're asking too quickly. Please wait a moment and try again.";

/// Idle buckets are swept once every this many checks
const PRUNE_EVERY: usize = 256;

pub struct RateLimitExceeded;

impl IntoResponse for RateLimitExceeded {
    fn into_response(self) -> Response {
        (
            StatusCode::TOO_MANY_REQUESTS,
            Json(ApiResponse::<()>::error(RATE_LIMIT_MESSAGE)),
        )
            .into_response()
    }
}

/// Token bucket refilled continuously at `refill_rate` tokens per second
#[derive(Debug)]
pub struct TokenBucket {
    tokens: f64,
    last_refill: Instant,
    max_tokens: f64,
    refill_rate: f64,
}

impl TokenBucket {
    pub fn new(max_tokens: f64, refill_rate: f64) -> Self {
        Self {
            tokens: max_tokens,
            last_refill: Instant::now(),
            max_tokens,
            refill_rate,
        }
    }

    fn refilled(&self, now: Instant) -> f64 {
        let elapsed = now.duration_since(self.last_refill).as_secs_f64();
        (self.tokens + elapsed * self.refill_rate).min(self.max_tokens)
    }

    pub fn try_consume(&mut self) -> bool {
        let now = Instant::now();
        self.tokens = self.refilled(now);
        self.last_refill = now;

        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }

    pub fn available_tokens(&self) -> f64 {
        self.refilled(Instant::now())
    }

    /// A full bucket carries no state worth keeping
    pub fn is_full(&self) -> bool {
        self.available_tokens() >= self.max_tokens
    }
}

/// One bucket per user for the ask endpoint. A limit of zero disables it.
pub struct AskRateLimiter {
    per_minute: u32,
    buckets: DashMap<Uuid, TokenBucket>,
    checks: AtomicUsize,
}

impl AskRateLimiter {
    pub fn per_minute(per_minute: u32) -> Self {
        Self {
            per_minute,
            buckets: DashMap::new(),
            checks: AtomicUsize::new(0),
        }
    }

    pub fn check(&self, user_id: Uuid) -> Result<(), RateLimitExceeded> {
        if self.per_minute == 0 {
            return Ok(());
        }

        if self.checks.fetch_add(1, Ordering::Relaxed) % PRUNE_EVERY == PRUNE_EVERY - 1 {
            self.prune();
        }

        let max = f64::from(self.per_minute);
        let allowed = self
            .buckets
            .entry(user_id)
            .or_insert_with(|| TokenBucket::new(max, max / 60.0))
            .try_consume();

        if allowed {
            Ok(())
        } else {
            tracing::warn!("Ask rate limit hit for user {}", user_id);
            Err(RateLimitExceeded)
        }
    }

    /// Drop buckets that have refilled to capacity. Returns how many went.
    pub fn prune(&self) -> usize {
        let before = self.buckets.len();
        self.buckets.retain(|_, bucket| !bucket.is_full());
        let removed = before.saturating_sub(self.buckets.len());
        if removed > 0 {
            tracing::debug!("Pruned {} idle ask rate-limit buckets", removed);
        }
        removed
    }

    pub fn tracked_users(&self) -> usize {
        self.buckets.len()
    }
}
