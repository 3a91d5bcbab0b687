//! Sliding-window rate limiting shared across batch workers.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use tokio::sync::Mutex;
use tokio::time;
use tracing::{debug, warn};

use crate::config::ConfigError;

/// Safety margin added to limiter waits so a woken caller does not land
/// exactly on the window boundary and re-trigger the wait.
const WAIT_MARGIN: Duration = Duration::from_millis(10);

/// Rolling-window admission gate shared by all workers of a batch run.
///
/// Admissions are counted over a trailing window; [`admit`](Self::admit)
/// delays the caller until one more admission would not exceed
/// `max_requests` within `window`. Admissions smooth out over time rather
/// than bursting at window boundaries.
///
/// The timestamp log is held under one async mutex for the whole admission
/// decision, including any wait, so concurrent callers can never over-grant.
pub struct RateLimiter {
    max_requests: usize,
    window: Duration,
    state: Mutex<LimiterState>,
}

struct LimiterState {
    /// Instants of admissions inside the trailing window, oldest first.
    /// Entries older than the window are purged lazily on each admission.
    admitted: VecDeque<Instant>,
    total_admitted: u64,
}

impl RateLimiter {
    /// Create a limiter allowing at most `max_requests` admissions per
    /// trailing `window`. Fails fast on non-positive limits.
    pub fn new(max_requests: usize, window: Duration) -> Result<Self, ConfigError> {
        if max_requests == 0 {
            return Err(ConfigError::ZeroRateLimit);
        }
        if window.is_zero() {
            return Err(ConfigError::ZeroWindow);
        }

        Ok(Self {
            max_requests,
            window,
            state: Mutex::new(LimiterState {
                admitted: VecDeque::with_capacity(max_requests),
                total_admitted: 0,
            }),
        })
    }

    /// Block until admitting one more call stays within the budget, then
    /// record the admission. Never errors; only delays.
    pub async fn admit(&self) {
        let mut state = self.state.lock().await;

        Self::purge(&mut state.admitted, Instant::now(), self.window);

        if state.admitted.len() >= self.max_requests {
            if let Some(&oldest) = state.admitted.front() {
                let reopen = oldest + self.window + WAIT_MARGIN;
                let now = Instant::now();
                if reopen > now {
                    let wait = reopen - now;
                    warn!(
                        in_window = state.admitted.len(),
                        max_requests = self.max_requests,
                        wait_ms = wait.as_millis() as u64,
                        "rate limit window full, waiting"
                    );
                    time::sleep(wait).await;
                }
            }
            Self::purge(&mut state.admitted, Instant::now(), self.window);
        }

        state.admitted.push_back(Instant::now());
        state.total_admitted += 1;
        debug!(
            in_window = state.admitted.len(),
            max_requests = self.max_requests,
            "admission granted"
        );
    }

    /// Total admissions granted over the limiter's lifetime, for diagnostics.
    pub async fn total_admitted(&self) -> u64 {
        self.state.lock().await.total_admitted
    }

    fn purge(admitted: &mut VecDeque<Instant>, now: Instant, window: Duration) {
        while let Some(&oldest) = admitted.front() {
            if now.duration_since(oldest) >= window {
                admitted.pop_front();
            } else {
                break;
            }
        }
    }
}
