use std::sync::Mutex;
use std::time::{Duration, Instant};

/// A blocking fixed-window request limiter.
///
/// ServiceTitan meters API calls per tenant, so every outbound request takes
/// a slot from the current window before it is sent. Once the window is
/// spent, callers sleep until it rolls over instead of getting throttled by
/// the remote side.
#[derive(Debug)]
pub(crate) struct RateLimiter {
    window: Mutex<Window>,
    max_requests: usize,
    period: Duration,
}

#[derive(Debug)]
struct Window {
    opened: Instant,
    used: usize,
}

impl RateLimiter {
    pub fn new(max_requests: usize, period: Duration) -> Self {
        RateLimiter {
            window: Mutex::new(Window {
                opened: Instant::now(),
                used: 0,
            }),
            max_requests,
            period,
        }
    }

    /// Blocks until the current window has a free slot, then claims it.
    pub fn wait(&self) {
        loop {
            let sleep_for = {
                let Ok(mut window) = self.window.lock() else {
                    continue;
                };
                let now = Instant::now();
                if now.duration_since(window.opened) >= self.period {
                    window.opened = now;
                    window.used = 0;
                }
                if window.used < self.max_requests {
                    window.used += 1;
                    return;
                }
                self.period - now.duration_since(window.opened)
            };
            std::thread::sleep(sleep_for);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn hands_out_slots_across_threads() {
        let limiter = Arc::new(RateLimiter::new(4, Duration::from_millis(50)));
        let mut handles = vec![];

        for _ in 0..8 {
            let limiter = Arc::clone(&limiter);
            handles.push(thread::spawn(move || limiter.wait()));
        }

        for handle in handles {
            handle.join().unwrap();
        }
    }

    #[test]
    fn exhausted_window_rolls_over() {
        let limiter = RateLimiter::new(1, Duration::from_millis(10));
        limiter.wait();
        // Must not deadlock once the window expires
        limiter.wait();
    }
}
