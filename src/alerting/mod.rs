//! Alerting engine
//!
//! Rules are turned into jobs on every tick, evaluated under a timeout and
//! reduced into a persisted alert state. Errored evaluations are retried a
//! bounded number of times before the rule is marked critical.

pub mod engine;
pub mod error;
pub mod executor;
pub mod job;
pub mod reader;
pub mod rule;
pub mod scheduler;
pub mod sink;
pub mod state;
pub mod ticker;

pub use engine::Engine;
pub use error::{EngineError, EvalError, RuleSourceError, SinkError, TickError};
pub use executor::{Executor, SeriesSource, StaticSeriesSource, ThresholdExecutor};
pub use job::{AlertJob, AlertResult};
pub use reader::{FileRuleSource, RuleSource, StaticRuleSource};
pub use rule::{Aggregator, AlertRule, Operator, Threshold};
pub use scheduler::{FrequencyScheduler, JobSink, Scheduler};
pub use sink::{LogStateSink, MemoryStateSink, StateRecord, StateSink};
pub use state::AlertState;
pub use ticker::{TickSender, Ticker};
