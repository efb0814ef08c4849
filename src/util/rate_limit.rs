//! Inbound message throttling, one limiter per WebSocket connection

use std::num::NonZeroU32;

use governor::{
    clock::DefaultClock,
    state::{InMemoryState, NotKeyed},
    Quota, RateLimiter,
};

type DirectLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Token bucket over inbound frames, owned by the connection's reader loop
pub struct ConnectionRateLimiter {
    limiter: DirectLimiter,
    dropped: u64,
}

impl ConnectionRateLimiter {
    /// A rate of zero is treated as one message per second
    pub fn new(messages_per_second: u32) -> Self {
        let rate = NonZeroU32::new(messages_per_second).unwrap_or(NonZeroU32::MIN);
        Self {
            limiter: RateLimiter::direct(Quota::per_second(rate)),
            dropped: 0,
        }
    }

    /// Admit one message. Rejections are counted.
    pub fn admit(&mut self) -> bool {
        let admitted = self.limiter.check().is_ok();
        if !admitted {
            self.dropped += 1;
        }
        admitted
    }

    /// Messages rejected so far
    pub fn dropped(&self) -> u64 {
        self.dropped
    }
}
