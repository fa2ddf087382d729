//! Persistence of finished alert results

use std::collections::VecDeque;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use parking_lot::Mutex;
use serde::Serialize;

use super::error::SinkError;
use super::job::AlertResult;
use super::state::AlertState;

/// Persists terminal alert results. Failures are not retried by the engine.
#[async_trait]
pub trait StateSink: Send + Sync {
    async fn save(&self, result: &AlertResult) -> Result<(), SinkError>;
}

/// Snapshot of a persisted result
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StateRecord {
    pub rule_id: i64,
    pub rule_name: String,
    pub state: AlertState,
    pub actual_value: Option<f64>,
    pub duration_ms: f64,
    pub description: String,
    pub error: Option<String>,
    pub saved_at: DateTime<Utc>,
}

impl From<&AlertResult> for StateRecord {
    fn from(result: &AlertResult) -> Self {
        Self {
            rule_id: result.rule().id,
            rule_name: result.rule().name.clone(),
            state: result.state,
            actual_value: result.actual_value,
            duration_ms: result.duration_ms,
            description: result.description.clone(),
            error: result.error.as_ref().map(|e| e.to_string()),
            saved_at: Utc::now(),
        }
    }
}

/// Writes alert states to the tracing log
#[derive(Debug, Default)]
pub struct LogStateSink;

#[async_trait]
impl StateSink for LogStateSink {
    async fn save(&self, result: &AlertResult) -> Result<(), SinkError> {
        let rule = result.rule();
        match result.state {
            AlertState::Critical | AlertState::Warning => tracing::warn!(
                rule_id = rule.id,
                rule_name = %rule.name,
                state = %result.state,
                actual = ?result.actual_value,
                "Alert state: {}",
                result.description
            ),
            _ => tracing::info!(
                rule_id = rule.id,
                rule_name = %rule.name,
                state = %result.state,
                actual = ?result.actual_value,
                duration_ms = result.duration_ms,
                "Alert state: {}",
                result.description
            ),
        }
        Ok(())
    }
}

/// Default number of records kept by [`MemoryStateSink`]
pub const DEFAULT_HISTORY_LIMIT: usize = 10_000;

/// Keeps recent persisted states in memory
///
/// History is bounded; once full the oldest record is evicted. The latest
/// state per rule is always kept.
pub struct MemoryStateSink {
    history: Mutex<VecDeque<StateRecord>>,
    history_limit: usize,
    latest: DashMap<i64, StateRecord>,
}

impl MemoryStateSink {
    /// Create a sink keeping up to [`DEFAULT_HISTORY_LIMIT`] records
    pub fn new() -> Self {
        Self::with_history_limit(DEFAULT_HISTORY_LIMIT)
    }

    /// Create a sink keeping at most `limit` records (at least one)
    pub fn with_history_limit(limit: usize) -> Self {
        Self {
            history: Mutex::new(VecDeque::new()),
            history_limit: limit.max(1),
            latest: DashMap::new(),
        }
    }

    /// Retained records, oldest first
    pub fn history(&self) -> Vec<StateRecord> {
        self.history.lock().iter().cloned().collect()
    }

    /// Most recent state of a rule
    pub fn latest(&self, rule_id: i64) -> Option<StateRecord> {
        self.latest.get(&rule_id).map(|r| r.value().clone())
    }

    pub fn len(&self) -> usize {
        self.history.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl StateSink for MemoryStateSink {
    async fn save(&self, result: &AlertResult) -> Result<(), SinkError> {
        let record = StateRecord::from(result);
        self.latest.insert(record.rule_id, record.clone());

        let mut history = self.history.lock();
        if history.len() >= self.history_limit {
            history.pop_front();
        }
        history.push_back(record);
        Ok(())
    }
}

impl Default for MemoryStateSink {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alerting::error::EvalError;
    use crate::alerting::job::AlertJob;
    use crate::alerting::rule::AlertRule;
    use std::sync::Arc;
    use std::time::Duration;

    fn job(id: i64) -> Arc<AlertJob> {
        Arc::new(AlertJob::new(Arc::new(AlertRule::new(
            id,
            format!("rule-{}", id),
            Duration::from_secs(10),
        ))))
    }

    #[tokio::test]
    async fn test_memory_sink_tracks_latest() {
        let sink = MemoryStateSink::new();
        let job = job(1);

        sink.save(&AlertResult::new(Arc::clone(&job), AlertState::Ok))
            .await
            .unwrap();
        sink.save(&AlertResult::failed(job, EvalError::Query("down".into())))
            .await
            .unwrap();

        assert_eq!(sink.len(), 2);
        let latest = sink.latest(1).unwrap();
        assert_eq!(latest.state, AlertState::Pending);
        assert_eq!(latest.error.as_deref(), Some("down"));
        assert!(sink.latest(2).is_none());
    }

    #[tokio::test]
    async fn test_memory_sink_evicts_oldest() {
        let sink = MemoryStateSink::with_history_limit(2);
        for id in 1..=3 {
            sink.save(&AlertResult::new(job(id), AlertState::Ok)).await.unwrap();
        }

        let ids: Vec<i64> = sink.history().iter().map(|r| r.rule_id).collect();
        assert_eq!(ids, vec![2, 3]);
        assert_eq!(sink.len(), 2);
        assert!(sink.latest(1).is_some());
    }

    #[tokio::test]
    async fn test_log_sink_accepts_all_states() {
        let sink = LogStateSink;
        for state in [AlertState::Ok, AlertState::Critical, AlertState::NoData] {
            let result = AlertResult::new(job(1), state).with_actual_value(1.0);
            assert!(sink.save(&result).await.is_ok());
        }
    }
}
