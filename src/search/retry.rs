//! Retry-then-degrade for one-time session establishment.
//!
//! Searchers that must log in before they can search (Reddit, Bluesky,
//! Fediverse instances) wrap that login in [`establish`]. A rate-limit
//! response makes it back off and try again, `base * attempt` each time, up
//! to a fixed number of attempts. If the platform is still rate limiting at
//! that point the searcher is built anyway, in a [`Session::Degraded`] state
//! that searches nothing until the next process start.
//!
//! Any other authentication failure is returned as-is: bad credentials will
//! not get better by waiting.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::UpstreamError;

/// Default number of authentication attempts before degrading.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

/// Default backoff unit; the n-th retry waits `n * DEFAULT_BACKOFF_BASE`.
pub const DEFAULT_BACKOFF_BASE: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub base: Duration,
    /// Total attempts, including the first. Values below 1 are treated as 1.
    pub max_attempts: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            base: DEFAULT_BACKOFF_BASE,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }
}

/// Bounded backoff state: attempt counter → next delay → exhausted.
#[derive(Debug, Clone)]
pub struct Backoff {
    policy: RetryPolicy,
    attempt: u32,
}

impl Backoff {
    pub fn new(policy: RetryPolicy) -> Self {
        Self {
            policy: RetryPolicy {
                max_attempts: policy.max_attempts.max(1),
                ..policy
            },
            attempt: 1,
        }
    }

    /// The attempt currently in flight (1-based).
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    /// Delay to wait before the next attempt, or `None` once the ceiling is
    /// reached.
    pub fn next_delay(&mut self) -> Option<Duration> {
        if self.attempt >= self.policy.max_attempts {
            return None;
        }
        let delay = self.policy.base.saturating_mul(self.attempt);
        self.attempt += 1;
        Some(delay)
    }
}

/// Something that can wait. Production uses tokio's timer; tests record the
/// requested delays instead of sleeping.
#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// A retry policy together with the sleeper that enforces it.
#[derive(Clone)]
pub struct Retry {
    pub policy: RetryPolicy,
    sleeper: Arc<dyn Sleeper>,
}

impl Retry {
    pub fn new(policy: RetryPolicy) -> Self {
        Self {
            policy,
            sleeper: Arc::new(TokioSleeper),
        }
    }

    pub fn with_sleeper(policy: RetryPolicy, sleeper: Arc<dyn Sleeper>) -> Self {
        Self { policy, sleeper }
    }
}

impl Default for Retry {
    fn default() -> Self {
        Self::new(RetryPolicy::default())
    }
}

/// Outcome of session establishment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Session<T> {
    /// Logged in; holds whatever the searcher needs (usually a token).
    Active(T),
    /// Gave up after repeated rate limiting. Searches return nothing.
    Degraded,
}

impl<T> Session<T> {
    pub fn active(&self) -> Option<&T> {
        match self {
            Session::Active(value) => Some(value),
            Session::Degraded => None,
        }
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self, Session::Degraded)
    }
}

/// Run `attempt` until it succeeds, fails for a reason other than rate
/// limiting, or the retry ceiling is reached.
pub async fn establish<T, F, Fut>(
    retry: &Retry,
    platform: &'static str,
    mut attempt: F,
) -> Result<Session<T>, UpstreamError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, UpstreamError>>,
{
    let mut backoff = Backoff::new(retry.policy);

    loop {
        match attempt().await {
            Ok(value) => {
                tracing::debug!(platform, attempt = backoff.attempt(), "Session established");
                return Ok(Session::Active(value));
            }
            Err(err) if err.is_rate_limited() => {
                let failed_attempt = backoff.attempt();
                match backoff.next_delay() {
                    Some(delay) => {
                        tracing::warn!(
                            platform,
                            attempt = failed_attempt,
                            delay_secs = delay.as_secs_f64(),
                            "Rate limited during authentication, backing off"
                        );
                        retry.sleeper.sleep(delay).await;
                    }
                    None => {
                        tracing::warn!(
                            platform,
                            attempts = failed_attempt,
                            "Still rate limited after final attempt, continuing in degraded mode"
                        );
                        return Ok(Session::Degraded);
                    }
                }
            }
            Err(err) => return Err(err),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
