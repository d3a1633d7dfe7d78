//! Metrics collector for the scheduler
//!
//! Handles are registered once through the `metrics` macros; whichever
//! recorder is installed (Prometheus in the binary, none in tests) receives them.

use metrics::{counter, gauge, histogram, Counter, Gauge, Histogram};
use tracing::{debug, warn};

/// Metrics collector for task executions and timers
#[derive(Clone)]
pub struct MetricsCollector {
    // Task execution metrics
    task_executions_total: Counter,
    task_execution_duration: Histogram,
    task_failures_total: Counter,
    task_timeouts_total: Counter,
    task_attempts_total: Counter,
    task_retries_total: Counter,

    // Scheduler metrics
    running_executions: Gauge,
    registered_jobs: Gauge,
    notifications_total: Counter,
    dependency_dispatches_total: Counter,
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self {
            task_executions_total: counter!("scheduler_task_executions_total"),
            task_execution_duration: histogram!("scheduler_task_execution_duration_seconds"),
            task_failures_total: counter!("scheduler_task_failures_total"),
            task_timeouts_total: counter!("scheduler_task_timeouts_total"),
            task_attempts_total: counter!("scheduler_task_attempts_total"),
            task_retries_total: counter!("scheduler_task_retries_total"),
            running_executions: gauge!("scheduler_running_executions"),
            registered_jobs: gauge!("scheduler_registered_jobs"),
            notifications_total: counter!("scheduler_notifications_total"),
            dependency_dispatches_total: counter!("scheduler_dependency_dispatches_total"),
        }
    }

    /// Record a finished task execution (all hosts, all attempts)
    pub fn record_task_execution(&self, task_id: i64, outcome: &str, duration_seconds: f64) {
        self.task_executions_total.increment(1);
        self.task_execution_duration.record(duration_seconds);

        debug!(
            task_id = task_id,
            outcome = outcome,
            duration_seconds = duration_seconds,
            "Task execution completed"
        );
    }

    pub fn record_attempt(&self) {
        self.task_attempts_total.increment(1);
    }

    pub fn record_task_failure(&self, task_id: i64, host: &str) {
        self.task_failures_total.increment(1);

        warn!(task_id = task_id, host = host, "Task attempt failed");
    }

    pub fn record_task_timeout(&self, task_id: i64, host: &str, timeout_seconds: u32) {
        self.task_timeouts_total.increment(1);

        warn!(
            task_id = task_id,
            host = host,
            timeout_seconds = timeout_seconds,
            "Task attempt timed out"
        );
    }

    pub fn record_task_retry(&self, task_id: i64, attempt_number: u32) {
        self.task_retries_total.increment(1);

        debug!(
            task_id = task_id,
            attempt_number = attempt_number,
            "Task retry initiated"
        );
    }

    pub fn update_running_executions(&self, count: usize) {
        self.running_executions.set(count as f64);
    }

    pub fn update_registered_jobs(&self, count: usize) {
        self.registered_jobs.set(count as f64);
    }

    pub fn record_notification(&self) {
        self.notifications_total.increment(1);
    }

    pub fn record_dependency_dispatch(&self, parent_id: i64, child_id: i64) {
        self.dependency_dispatches_total.increment(1);

        debug!(
            parent_id = parent_id,
            child_id = child_id,
            "Dependent task dispatched"
        );
    }
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new()
    }
}
