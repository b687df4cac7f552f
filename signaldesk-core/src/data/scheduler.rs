//! Request scheduler: FIFO, interval-paced dispatch with a daily budget.
//!
//! Every outbound market-data call goes through `throttle`. Callers queue on
//! a fair async mutex, so dispatch order is submission order. The holder
//! sleeps until `min_interval` has passed since the previous dispatch
//! *started*, bumps the daily counter, then runs the operation while still
//! holding the queue.
//!
//! The budget is advisory: `throttle` never refuses work. Callers check
//! `is_over_daily_limit` before enqueueing and fall back to mock data. The
//! counter resets on the first check after local midnight.

use crate::clock::{next_local_midnight, Clock};
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::time::Instant;

/// Default gap between dispatch starts.
pub const DEFAULT_MIN_INTERVAL: Duration = Duration::from_millis(8_500);

/// Default daily call budget, kept under the vendor's nominal 800/day cap.
pub const DEFAULT_DAILY_BUDGET: u32 = 750;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerConfig {
    pub min_interval: Duration,
    pub daily_budget: u32,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            min_interval: DEFAULT_MIN_INTERVAL,
            daily_budget: DEFAULT_DAILY_BUDGET,
        }
    }
}

/// Daily counter state, exportable so a short-lived process can carry its
/// usage over to the next run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BudgetSnapshot {
    pub calls_today: u32,
    pub next_reset: DateTime<Local>,
}

pub struct RequestScheduler {
    config: SchedulerConfig,
    clock: Arc<dyn Clock>,
    /// Start of the previous dispatch. Holding this lock *is* the queue.
    queue: tokio::sync::Mutex<Option<Instant>>,
    budget: Mutex<BudgetSnapshot>,
    total_dispatches: AtomicU64,
}

impl RequestScheduler {
    pub fn new(config: SchedulerConfig, clock: Arc<dyn Clock>) -> Self {
        let next_reset = next_local_midnight(clock.now());
        Self {
            config,
            clock,
            queue: tokio::sync::Mutex::new(None),
            budget: Mutex::new(BudgetSnapshot {
                calls_today: 0,
                next_reset,
            }),
            total_dispatches: AtomicU64::new(0),
        }
    }

    pub fn config(&self) -> SchedulerConfig {
        self.config
    }

    /// Queue `op`, wait for its turn and pacing gap, then run it.
    ///
    /// The operation's output (including any error) goes back to this caller
    /// only. The queue is released when the call settles, including on panic.
    pub async fn throttle<F, Fut>(&self, op: F) -> Fut::Output
    where
        F: FnOnce() -> Fut,
        Fut: Future,
    {
        let mut last_start = self.queue.lock().await;
        if let Some(prev) = *last_start {
            tokio::time::sleep_until(prev + self.config.min_interval).await;
        }
        *last_start = Some(Instant::now());
        self.record_dispatch();
        op().await
    }

    /// True once today's counter has reached the budget.
    pub fn is_over_daily_limit(&self) -> bool {
        let state = self.rolled_state();
        state.calls_today >= self.config.daily_budget
    }

    pub fn calls_today(&self) -> u32 {
        self.rolled_state().calls_today
    }

    pub fn remaining_today(&self) -> u32 {
        self.config
            .daily_budget
            .saturating_sub(self.rolled_state().calls_today)
    }

    pub fn next_reset(&self) -> DateTime<Local> {
        self.rolled_state().next_reset
    }

    /// Dispatches since construction, across resets.
    pub fn total_dispatches(&self) -> u64 {
        self.total_dispatches.load(Ordering::Relaxed)
    }

    pub fn snapshot(&self) -> BudgetSnapshot {
        self.rolled_state()
    }

    /// Adopt a previously saved counter. A snapshot from an earlier day is
    /// discarded by the normal midnight rollover.
    pub fn restore(&self, snapshot: BudgetSnapshot) {
        *self.budget.lock().unwrap_or_else(PoisonError::into_inner) = snapshot;
        let _ = self.rolled_state();
    }

    fn record_dispatch(&self) {
        let mut state = self.budget.lock().unwrap_or_else(PoisonError::into_inner);
        self.roll_over(&mut state);
        state.calls_today = state.calls_today.saturating_add(1);
        let total = self.total_dispatches.fetch_add(1, Ordering::Relaxed) + 1;
        tracing::debug!(
            calls_today = state.calls_today,
            remaining = self.config.daily_budget.saturating_sub(state.calls_today),
            total,
            "dispatching market data request"
        );
    }

    fn rolled_state(&self) -> BudgetSnapshot {
        let mut state = self.budget.lock().unwrap_or_else(PoisonError::into_inner);
        self.roll_over(&mut state);
        *state
    }

    fn roll_over(&self, state: &mut BudgetSnapshot) {
        let now = self.clock.now();
        if now >= state.next_reset {
            tracing::info!(
                previous_calls = state.calls_today,
                "daily request budget reset"
            );
            state.calls_today = 0;
            state.next_reset = next_local_midnight(now);
        }
    }
}
