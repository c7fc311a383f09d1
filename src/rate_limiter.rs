//! Admission gate shared by every outbound request.
//!
//! The budget is a bucket of `N` tokens. Each token spent is scheduled to
//! return to the bucket exactly one window after it was taken, so refill is
//! continuous (token by token, in the order they were spent) and no rolling
//! window ever sees more than `N` grants.

use std::collections::VecDeque;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::{sleep_until, Instant};

/// Process-wide admission state: tokens on hand plus their refill schedule
#[derive(Debug)]
struct RateBudget {
    available: u32,
    /// Instants at which spent tokens return, oldest first
    refills: VecDeque<Instant>,
}

impl RateBudget {
    fn reclaim(&mut self, now: Instant) {
        while self.refills.front().is_some_and(|at| *at <= now) {
            self.refills.pop_front();
            self.available += 1;
        }
    }
}

#[derive(Debug)]
pub struct RateLimiter {
    window: Duration,
    capacity: u32,
    budget: Mutex<RateBudget>,
}

impl RateLimiter {
    /// Allows at most `per_second` grants in any rolling second
    pub fn per_second(per_second: u32) -> Self {
        Self::new(per_second, Duration::from_secs(1))
    }

    pub fn new(capacity: u32, window: Duration) -> Self {
        let capacity = capacity.max(1);
        Self {
            window,
            capacity,
            budget: Mutex::new(RateBudget {
                available: capacity,
                refills: VecDeque::with_capacity(capacity as usize),
            }),
        }
    }

    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    /// Waits until a token is available and takes it.
    ///
    /// The budget lock is held while waiting for the next refill. Tokio's
    /// mutex queues waiters in FIFO order, so every caller is served as
    /// tokens come back and nobody waits forever.
    pub async fn acquire(&self) {
        let mut budget = self.budget.lock().await;
        loop {
            let now = Instant::now();
            budget.reclaim(now);

            if budget.available > 0 {
                budget.available -= 1;
                budget.refills.push_back(now + self.window);
                return;
            }

            // tokens on hand plus scheduled refills always equal capacity
            let Some(next) = budget.refills.front().copied() else {
                budget.available = self.capacity;
                continue;
            };
            sleep_until(next).await;
        }
    }
}
