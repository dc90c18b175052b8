use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use axum::body::Body;
use axum::extract::State;
use axum::http::{Request, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

/// Fixed one-second window over the whole public surface. Coarse on purpose:
/// the browse endpoints are unauthenticated and share one counter.
#[derive(Clone, Debug)]
pub struct RateGuard {
    per_second: u32,
    window: Arc<Mutex<Window>>,
}

#[derive(Debug)]
struct Window {
    opened: Instant,
    served: u32,
}

impl RateGuard {
    pub fn new(per_second: u32) -> Self {
        Self {
            per_second: per_second.max(1),
            window: Arc::new(Mutex::new(Window {
                opened: Instant::now(),
                served: 0,
            })),
        }
    }

    fn try_acquire(&self) -> bool {
        let mut window = self
            .window
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let now = Instant::now();
        if now.duration_since(window.opened) >= Duration::from_secs(1) {
            window.opened = now;
            window.served = 0;
        }
        if window.served < self.per_second {
            window.served += 1;
            true
        } else {
            false
        }
    }
}

pub async fn throttle(
    State(guard): State<RateGuard>,
    req: Request<Body>,
    next: Next,
) -> Response {
    if !guard.try_acquire() {
        return (StatusCode::TOO_MANY_REQUESTS, "rate_limit_exceeded").into_response();
    }
    next.run(req).await
}

#[cfg(test)]
mod tests {
    use super::RateGuard;

    #[test]
    fn requests_beyond_the_window_budget_are_refused() {
        let guard = RateGuard::new(2);
        assert!(guard.try_acquire());
        assert!(guard.try_acquire());
        assert!(!guard.try_acquire());
    }

    #[test]
    fn zero_budget_still_admits_one_request_per_window() {
        let guard = RateGuard::new(0);
        assert!(guard.try_acquire());
        assert!(!guard.try_acquire());
    }
}
