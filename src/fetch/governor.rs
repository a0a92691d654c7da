//! Request pacing for rate-limited providers.
//!
//! Every outbound request waits for [`RequestBudgetGovernor::before_request`].
//! The governor holds its lock across the pause, so concurrent callers are
//! serialized through one gate: a fixed delay before each request, and a
//! cool-down once the per-window budget is spent. The window is a fixed
//! window reset, not a sliding one.

use async_trait::async_trait;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::{Instant, sleep};
use tracing::{debug, warn};

use super::client::HttpClient;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BudgetConfig {
    /// Requests allowed per window.
    pub threshold: u32,
    pub window: Duration,
    /// Pause once `threshold` requests were issued inside one window.
    pub cool_down: Duration,
    /// Pause before every request.
    pub min_delay: Duration,
}

impl BudgetConfig {
    pub fn per_minute(threshold: u32) -> Self {
        Self {
            threshold,
            window: Duration::from_secs(60),
            cool_down: Duration::from_secs(60),
            min_delay: Duration::from_secs(1),
        }
    }
}

#[derive(Debug)]
struct RequestBudgetState {
    issued: u32,
    window_start: Instant,
}

impl RequestBudgetState {
    fn reset(&mut self, now: Instant) {
        self.issued = 0;
        self.window_start = now;
    }
}

#[derive(Debug)]
pub struct RequestBudgetGovernor {
    config: BudgetConfig,
    state: Mutex<RequestBudgetState>,
    total: AtomicU64,
}

impl RequestBudgetGovernor {
    pub fn new(config: BudgetConfig) -> Self {
        Self {
            config,
            state: Mutex::new(RequestBudgetState {
                issued: 0,
                window_start: Instant::now(),
            }),
            total: AtomicU64::new(0),
        }
    }

    /// Waits until one more request may be issued and counts it.
    pub async fn before_request(&self) {
        let mut state = self.state.lock().await;

        let now = Instant::now();
        if now.duration_since(state.window_start) >= self.config.window {
            state.reset(now);
        } else if state.issued >= self.config.threshold {
            warn!(
                issued = state.issued,
                cool_down_secs = self.config.cool_down.as_secs(),
                "Request budget spent, cooling down"
            );
            sleep(self.config.cool_down).await;
            state.reset(Instant::now());
        }

        sleep(self.config.min_delay).await;
        state.issued += 1;
        let total = self.total.fetch_add(1, Ordering::Relaxed) + 1;
        debug!(issued = state.issued, total, "Request slot granted");
    }

    /// Requests counted in the current window.
    #[cfg(test)]
    pub async fn issued(&self) -> u32 {
        self.state.lock().await.issued
    }

    /// Requests counted since the governor was created.
    pub fn total(&self) -> u64 {
        self.total.load(Ordering::Relaxed)
    }
}

/// An [`HttpClient`] wrapper that passes every request through a shared
/// [`RequestBudgetGovernor`] first.
pub struct Governed<C> {
    pub inner: C,
    pub governor: Arc<RequestBudgetGovernor>,
}

impl<C> Governed<C> {
    pub fn new(inner: C, governor: Arc<RequestBudgetGovernor>) -> Self {
        Self { inner, governor }
    }
}

#[async_trait]
impl<C: HttpClient> HttpClient for Governed<C> {
    async fn execute(&self, req: reqwest::Request) -> reqwest::Result<reqwest::Response> {
        self.governor.before_request().await;
        self.inner.execute(req).await
    }
}
