//! Jobs and results flowing through the engine queues

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;

use super::error::EvalError;
use super::rule::AlertRule;
use super::state::AlertState;

/// One pending or in-flight evaluation of a rule
///
/// A job is shared between the scheduler, which created it, and whichever
/// loop currently owns it through the queues. Only the owning loop mutates
/// the flags below.
#[derive(Debug)]
pub struct AlertJob {
    rule: Arc<AlertRule>,
    running: AtomicBool,
    retry_count: AtomicU32,
    completed: AtomicBool,
}

impl AlertJob {
    /// Create a new idle job for `rule`
    pub fn new(rule: Arc<AlertRule>) -> Self {
        Self {
            rule,
            running: AtomicBool::new(false),
            retry_count: AtomicU32::new(0),
            completed: AtomicBool::new(false),
        }
    }

    /// Get the rule being evaluated
    pub fn rule(&self) -> &AlertRule {
        &self.rule
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn retry_count(&self) -> u32 {
        self.retry_count.load(Ordering::SeqCst)
    }

    /// Whether the job reached a terminal result
    pub fn is_completed(&self) -> bool {
        self.completed.load(Ordering::SeqCst)
    }

    /// Claim the job for dispatch. Returns false if it is already running.
    pub(crate) fn begin(&self) -> bool {
        self.running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }

    pub(crate) fn finish(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    /// Count one more retry and return the new total
    pub(crate) fn record_retry(&self) -> u32 {
        self.retry_count.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub(crate) fn reset_retries(&self) {
        self.retry_count.store(0, Ordering::SeqCst);
    }

    pub(crate) fn complete(&self) {
        self.completed.store(true, Ordering::SeqCst);
    }
}

/// Outcome of one evaluation attempt
#[derive(Debug, Clone)]
pub struct AlertResult {
    pub state: AlertState,
    /// Wall-clock time of the attempt in milliseconds, stamped by the engine
    pub duration_ms: f64,
    pub actual_value: Option<f64>,
    pub error: Option<EvalError>,
    pub description: String,
    pub job: Arc<AlertJob>,
}

impl AlertResult {
    /// Successful evaluation with the given state
    pub fn new(job: Arc<AlertJob>, state: AlertState) -> Self {
        Self {
            state,
            duration_ms: 0.0,
            actual_value: None,
            error: None,
            description: String::new(),
            job,
        }
    }

    /// Failed evaluation. The state stays `Pending` until the retry policy decides.
    pub fn failed(job: Arc<AlertJob>, error: EvalError) -> Self {
        Self {
            error: Some(error),
            ..Self::new(job, AlertState::Pending)
        }
    }

    pub fn with_actual_value(mut self, value: f64) -> Self {
        self.actual_value = Some(value);
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn rule(&self) -> &AlertRule {
        self.job.rule()
    }
}
