//! Admission rate limiting for retirement actions, using governor.

use std::fmt;
use std::num::NonZeroU32;
use std::time::Duration;

use governor::{
    clock::DefaultClock,
    middleware::NoOpMiddleware,
    state::{InMemoryState, NotKeyed},
    Quota, RateLimiter,
};
use thiserror::Error;
use tokio_util::sync::CancellationToken;

/// Rate limiter type alias.
pub type DirectRateLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock, NoOpMiddleware>;

/// Returned when an admission wait is interrupted by cancellation.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("admission wait cancelled")]
pub struct AdmissionCancelled;

/// Caps how many retirement actions may start per second across a pass.
///
/// Admissions are spaced evenly at `1s / rate`, rounded up to the nanosecond,
/// with no burst allowance, so any rolling one-second window admits at most
/// `rate` actions. A rate of zero disables limiting.
pub struct AdmissionLimiter {
    limiter: Option<DirectRateLimiter>,
    rate_per_second: u32,
}

impl fmt::Debug for AdmissionLimiter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AdmissionLimiter")
            .field("rate_per_second", &self.rate_per_second)
            .field("limiter", &self.limiter.as_ref().map(|_| "<governor::RateLimiter>"))
            .finish()
    }
}

const NANOS_PER_SEC: u64 = 1_000_000_000;

/// Quota admitting at most `rate_per_second` actions in any one-second window.
///
/// The period is rounded up to whole nanoseconds, so rates that do not divide
/// one second never squeeze `rate + 1` admissions into it. Rates above one per
/// nanosecond are clamped to one per nanosecond. Returns `None` for zero.
pub fn admission_quota(rate_per_second: u32) -> Option<Quota> {
    let rate = NonZeroU32::new(rate_per_second)?;
    let period_nanos = NANOS_PER_SEC.div_ceil(u64::from(rate.get()));
    Quota::with_period(Duration::from_nanos(period_nanos))
        .map(|quota| quota.allow_burst(NonZeroU32::MIN))
}

impl AdmissionLimiter {
    /// Create a limiter admitting at most `rate_per_second` actions per second.
    pub fn new(rate_per_second: u32) -> Self {
        Self {
            limiter: admission_quota(rate_per_second).map(RateLimiter::direct),
            rate_per_second,
        }
    }

    /// Wait for one admission slot.
    ///
    /// Returns [`AdmissionCancelled`] as soon as `cancel` fires, without
    /// consuming a slot.
    pub async fn admit(&self, cancel: &CancellationToken) -> Result<(), AdmissionCancelled> {
        if cancel.is_cancelled() {
            return Err(AdmissionCancelled);
        }

        let Some(limiter) = &self.limiter else {
            return Ok(());
        };

        tokio::select! {
            biased;
            () = cancel.cancelled() => Err(AdmissionCancelled),
            () = limiter.until_ready() => Ok(()),
        }
    }
}
