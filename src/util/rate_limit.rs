//! Rate limiting utilities

use governor::{
    clock::DefaultClock,
    state::{InMemoryState, NotKeyed},
    Quota, RateLimiter,
};
use std::num::NonZeroU32;

type Limiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Default inbound messages per second per session; zero leaves input unlimited
pub const INPUT_RATE_LIMIT: u32 = 0;

/// Per-session inbound message limiter. A limit of zero disables it.
pub struct InputRateLimiter {
    limiter: Option<Limiter>,
}

impl InputRateLimiter {
    pub fn new(per_second: u32) -> Self {
        Self {
            limiter: NonZeroU32::new(per_second)
                .map(|rate| RateLimiter::direct(Quota::per_second(rate))),
        }
    }

    /// Check if an input message is allowed (returns true if allowed)
    pub fn check(&self) -> bool {
        self.limiter
            .as_ref()
            .map_or(true, |limiter| limiter.check().is_ok())
    }
}
