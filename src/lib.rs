//! Vigil: tick-driven alert rule engine
//!
//! Turns a set of monitoring rules into scheduled evaluation jobs, runs each
//! job with a hard timeout, and reduces the outcome into a persisted alert
//! state with bounded retry.
//!
//! # Features
//!
//! - **Bounded Queues**: Job and result queues block producers when full
//! - **Timeouts**: Slow evaluations are abandoned after a deadline
//! - **Bounded Retry**: Errored evaluations are retried before going critical
//! - **Clean Shutdown**: All loops stop on a shared cancellation token
//! - **Threshold Rules**: Aggregated series compared against warn/crit levels
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//! use vigil::alerting::{
//!     AlertRule, Engine, LogStateSink, Operator, StaticRuleSource, StaticSeriesSource,
//!     ThresholdExecutor,
//! };
//! use vigil::EngineConfig;
//!
//! # async fn run() {
//! let rule = AlertRule::new(1, "CPU high", Duration::from_secs(10))
//!     .with_query("cpu", Duration::from_secs(300))
//!     .with_crit(Operator::GreaterThan, 90.0);
//!
//! let series = Arc::new(StaticSeriesSource::new());
//! series.set("cpu", vec![42.0, 97.5]);
//!
//! let mut engine = Engine::new(
//!     EngineConfig::default(),
//!     Arc::new(StaticRuleSource::new(vec![rule])),
//!     Arc::new(ThresholdExecutor::new(series)),
//!     Arc::new(LogStateSink),
//! );
//! engine.start().unwrap();
//! tokio::time::sleep(Duration::from_secs(30)).await;
//! engine.stop().await;
//! # }
//! ```

pub mod alerting;
pub mod config;

pub use alerting::{AlertJob, AlertResult, AlertRule, AlertState, Engine, EngineError, EvalError};
pub use config::EngineConfig;
