//! Rule evaluation

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;

use super::error::{EvalError, RuleSourceError};
use super::job::{AlertJob, AlertResult};
use super::rule::{AlertRule, Threshold};
use super::state::AlertState;

/// Evaluates one job into exactly one result
///
/// The engine runs `execute` on its own task and may stop waiting for it
/// after the execution timeout, so implementations must not rely on being
/// polled to completion.
#[async_trait]
pub trait Executor: Send + Sync {
    async fn execute(&self, job: Arc<AlertJob>) -> AlertResult;
}

/// Backend returning the data points a rule evaluates
#[async_trait]
pub trait SeriesSource: Send + Sync {
    async fn query(&self, rule: &AlertRule) -> Result<Vec<f64>, EvalError>;
}

/// Aggregates the rule's series and compares it against its thresholds
pub struct ThresholdExecutor<S> {
    source: Arc<S>,
}

impl<S: SeriesSource> ThresholdExecutor<S> {
    pub fn new(source: Arc<S>) -> Self {
        Self { source }
    }

    /// Evaluate a series against a rule
    fn evaluate(rule: &AlertRule, values: &[f64]) -> Result<Evaluation, EvalError> {
        if rule.warn.is_none() && rule.crit.is_none() {
            return Err(EvalError::InvalidRule(format!(
                "rule '{}' has no thresholds",
                rule.name
            )));
        }

        let Some(value) = rule.aggregator.apply(values) else {
            return Ok(Evaluation {
                state: AlertState::NoData,
                value: None,
                message: "Query returned no data points".to_string(),
            });
        };

        if value.is_nan() {
            return Err(EvalError::Query(format!(
                "{:?} of series '{}' is not a number",
                rule.aggregator, rule.query_ref
            )));
        }

        let (state, threshold) = match (rule.crit, rule.warn) {
            (Some(crit), _) if crit.matches(value) => (AlertState::Critical, Some(crit)),
            (_, Some(warn)) if warn.matches(value) => (AlertState::Warning, Some(warn)),
            _ => (AlertState::Ok, None),
        };

        Ok(Evaluation {
            state,
            value: Some(value),
            message: describe(value, threshold),
        })
    }
}

fn describe(value: f64, threshold: Option<Threshold>) -> String {
    match threshold {
        Some(t) => format!("value {} {} threshold {}", value, t.operator.symbol(), t.level),
        None => format!("value {} within thresholds", value),
    }
}

struct Evaluation {
    state: AlertState,
    value: Option<f64>,
    message: String,
}

#[async_trait]
impl<S: SeriesSource> Executor for ThresholdExecutor<S> {
    async fn execute(&self, job: Arc<AlertJob>) -> AlertResult {
        let values = match self.source.query(job.rule()).await {
            Ok(values) => values,
            Err(e) => return AlertResult::failed(job, e),
        };

        match Self::evaluate(job.rule(), &values) {
            Ok(eval) => {
                let mut result = AlertResult::new(job, eval.state).with_description(eval.message);
                result.actual_value = eval.value;
                result
            }
            Err(e) => AlertResult::failed(job, e),
        }
    }
}

/// In-memory series keyed by `query_ref`
#[derive(Default)]
pub struct StaticSeriesSource {
    series: RwLock<HashMap<String, Vec<f64>>>,
}

impl StaticSeriesSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load series from a JSON object of `query_ref -> [values]`
    pub fn load(path: impl AsRef<Path>) -> Result<Self, RuleSourceError> {
        let raw = std::fs::read_to_string(path)?;
        let series: HashMap<String, Vec<f64>> = serde_json::from_str(&raw)?;
        Ok(Self {
            series: RwLock::new(series),
        })
    }

    pub fn set(&self, query_ref: impl Into<String>, values: Vec<f64>) {
        self.series.write().insert(query_ref.into(), values);
    }
}

#[async_trait]
impl SeriesSource for StaticSeriesSource {
    async fn query(&self, rule: &AlertRule) -> Result<Vec<f64>, EvalError> {
        self.series
            .read()
            .get(&rule.query_ref)
            .cloned()
            .ok_or_else(|| EvalError::Query(format!("series '{}' not found", rule.query_ref)))
    }
}
