//! Decides which rules are due on each tick

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use super::error::EngineError;
use super::job::AlertJob;
use super::rule::AlertRule;

/// Producer handle onto the bounded job queue
///
/// `push` waits for a free slot, which is how a slow dispatch side throttles
/// scheduling. It gives up as soon as the engine shuts down.
#[derive(Clone)]
pub struct JobSink {
    tx: mpsc::Sender<Arc<AlertJob>>,
    shutdown: CancellationToken,
}

impl JobSink {
    /// Wrap a job queue sender
    pub fn new(tx: mpsc::Sender<Arc<AlertJob>>, shutdown: CancellationToken) -> Self {
        Self { tx, shutdown }
    }

    /// Queue a job, waiting while the queue is full
    pub async fn push(&self, job: Arc<AlertJob>) -> Result<(), EngineError> {
        tokio::select! {
            biased;
            _ = self.shutdown.cancelled() => Err(EngineError::ShuttingDown),
            sent = self.tx.send(job) => sent.map_err(|_| EngineError::QueueClosed),
        }
    }

    /// Free slots left in the queue
    pub fn available(&self) -> usize {
        self.tx.capacity()
    }
}

/// Owner of the live rule set
#[async_trait]
pub trait Scheduler: Send {
    /// Replace the rule set
    fn update(&mut self, rules: Vec<AlertRule>);

    /// Push one job per due rule. Returns how many jobs were pushed.
    async fn tick(&mut self, now: DateTime<Utc>, jobs: &JobSink) -> Result<usize, EngineError>;
}

struct ScheduleEntry {
    rule: Arc<AlertRule>,
    last_scheduled: Option<DateTime<Utc>>,
    /// Most recent job created for the rule
    current: Option<Arc<AlertJob>>,
}

impl ScheduleEntry {
    fn is_due(&self, now: DateTime<Utc>) -> bool {
        let Some(last) = self.last_scheduled else {
            return true;
        };
        match chrono::Duration::from_std(self.rule.frequency) {
            Ok(frequency) => now.signed_duration_since(last) >= frequency,
            Err(_) => false,
        }
    }

    /// Previous job is still running or waiting for a retry
    fn is_busy(&self) -> bool {
        self.current.as_deref().is_some_and(is_unsettled)
    }
}

fn is_unsettled(job: &AlertJob) -> bool {
    job.is_running() || !job.is_completed()
}

/// Schedules each rule every `frequency`, starting on the first tick it is seen
pub struct FrequencyScheduler {
    entries: BTreeMap<i64, ScheduleEntry>,
    /// Unsettled jobs of rules dropped from the rule set, kept so a rule that
    /// comes back is not scheduled twice
    orphans: HashMap<i64, Arc<AlertJob>>,
}

impl FrequencyScheduler {
    /// Create an empty scheduler
    pub fn new() -> Self {
        Self {
            entries: BTreeMap::new(),
            orphans: HashMap::new(),
        }
    }

    /// Number of tracked rules
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// When the rule was last put on the job queue
    pub fn last_scheduled(&self, rule_id: i64) -> Option<DateTime<Utc>> {
        self.entries.get(&rule_id).and_then(|e| e.last_scheduled)
    }
}

impl Default for FrequencyScheduler {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Scheduler for FrequencyScheduler {
    fn update(&mut self, rules: Vec<AlertRule>) {
        let mut entries = BTreeMap::new();

        for rule in rules {
            if rule.frequency.is_zero() {
                tracing::warn!(rule_id = rule.id, rule_name = %rule.name, "Ignoring rule with zero frequency");
                continue;
            }

            let previous = self.entries.remove(&rule.id);
            let entry = match previous {
                Some(mut entry) => {
                    if *entry.rule != rule {
                        entry.rule = Arc::new(rule);
                    }
                    entry
                }
                None => ScheduleEntry {
                    current: self.orphans.remove(&rule.id),
                    rule: Arc::new(rule),
                    last_scheduled: None,
                },
            };
            entries.insert(entry.rule.id, entry);
        }

        if !self.entries.is_empty() {
            tracing::debug!(removed = self.entries.len(), "Dropped rules no longer defined");
        }

        for (id, entry) in std::mem::replace(&mut self.entries, entries) {
            if let Some(job) = entry.current.filter(|job| is_unsettled(job)) {
                self.orphans.insert(id, job);
            }
        }
        self.orphans.retain(|_, job| is_unsettled(job));
    }

    async fn tick(&mut self, now: DateTime<Utc>, jobs: &JobSink) -> Result<usize, EngineError> {
        let mut pushed = 0;

        for entry in self.entries.values_mut() {
            if !entry.is_due(now) {
                continue;
            }
            if entry.is_busy() {
                tracing::trace!(rule_id = entry.rule.id, "Rule due but previous job unsettled");
                continue;
            }

            let job = Arc::new(AlertJob::new(Arc::clone(&entry.rule)));
            tracing::trace!(rule_name = %entry.rule.name, "Putting job on to exec queue");

            jobs.push(Arc::clone(&job)).await?;
            entry.last_scheduled = Some(now);
            entry.current = Some(job);
            pushed += 1;
        }

        Ok(pushed)
    }
}
