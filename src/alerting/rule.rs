//! Alert rule definitions

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Alert rule definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertRule {
    /// Unique rule ID
    pub id: i64,
    /// Human-readable name
    pub name: String,
    /// How often the rule is evaluated
    #[serde(with = "secs_serde", default = "default_frequency")]
    pub frequency: Duration,
    /// Series the rule evaluates
    #[serde(default)]
    pub query_ref: String,
    /// Look-back window of the query
    #[serde(with = "secs_serde", default = "default_query_range")]
    pub query_range: Duration,
    /// Reduction applied to the series before comparing
    #[serde(default)]
    pub aggregator: Aggregator,
    /// Warning threshold
    #[serde(default)]
    pub warn: Option<Threshold>,
    /// Critical threshold
    #[serde(default)]
    pub crit: Option<Threshold>,
}

fn default_frequency() -> Duration {
    Duration::from_secs(10)
}

fn default_query_range() -> Duration {
    Duration::from_secs(3600)
}

impl AlertRule {
    /// Create a new rule evaluated every `frequency`
    pub fn new(id: i64, name: impl Into<String>, frequency: Duration) -> Self {
        Self {
            id,
            name: name.into(),
            frequency,
            query_ref: String::new(),
            query_range: default_query_range(),
            aggregator: Aggregator::default(),
            warn: None,
            crit: None,
        }
    }

    /// Set the series reference and look-back window
    pub fn with_query(mut self, query_ref: impl Into<String>, range: Duration) -> Self {
        self.query_ref = query_ref.into();
        self.query_range = range;
        self
    }

    /// Set how the series is reduced to one value
    pub fn with_aggregator(mut self, aggregator: Aggregator) -> Self {
        self.aggregator = aggregator;
        self
    }

    /// Set the warning threshold
    pub fn with_warn(mut self, operator: Operator, level: f64) -> Self {
        self.warn = Some(Threshold { operator, level });
        self
    }

    /// Set the critical threshold
    pub fn with_crit(mut self, operator: Operator, level: f64) -> Self {
        self.crit = Some(Threshold { operator, level });
        self
    }
}

/// Series reduction
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Aggregator {
    #[default]
    Avg,
    Sum,
    Min,
    Max,
    Median,
}

impl Aggregator {
    /// Reduce a series to one value. Returns `None` for an empty series.
    pub fn apply(&self, values: &[f64]) -> Option<f64> {
        if values.is_empty() {
            return None;
        }

        let value = match self {
            Aggregator::Avg => values.iter().sum::<f64>() / values.len() as f64,
            Aggregator::Sum => values.iter().sum(),
            Aggregator::Min => values.iter().copied().fold(f64::INFINITY, f64::min),
            Aggregator::Max => values.iter().copied().fold(f64::NEG_INFINITY, f64::max),
            Aggregator::Median => {
                let mut sorted = values.to_vec();
                sorted.sort_by(|a, b| a.total_cmp(b));
                let mid = sorted.len() / 2;
                if sorted.len() % 2 == 0 {
                    (sorted[mid - 1] + sorted[mid]) / 2.0
                } else {
                    sorted[mid]
                }
            }
        };

        Some(value)
    }
}

/// Comparison operator of a threshold
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Operator {
    #[serde(rename = ">")]
    GreaterThan,
    #[serde(rename = "<")]
    LessThan,
    #[serde(rename = ">=")]
    GreaterOrEqual,
    #[serde(rename = "<=")]
    LessOrEqual,
}

impl Operator {
    pub fn symbol(&self) -> &'static str {
        match self {
            Operator::GreaterThan => ">",
            Operator::LessThan => "<",
            Operator::GreaterOrEqual => ">=",
            Operator::LessOrEqual => "<=",
        }
    }
}

/// Threshold level checked against the aggregated value
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Threshold {
    pub operator: Operator,
    pub level: f64,
}

impl Threshold {
    /// Whether `value` crosses this threshold
    pub fn matches(&self, value: f64) -> bool {
        match self.operator {
            Operator::GreaterThan => value > self.level,
            Operator::LessThan => value < self.level,
            Operator::GreaterOrEqual => value >= self.level,
            Operator::LessOrEqual => value <= self.level,
        }
    }
}

/// Durations as whole seconds
mod secs_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}
