use std::str::FromStr;
use std::time::Duration;

/// Engine configuration
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    /// Capacity of the job queue
    pub job_queue_capacity: usize,
    /// Capacity of the result queue
    pub result_queue_capacity: usize,
    /// How long a single evaluation may take
    pub execution_timeout: Duration,
    /// Errored attempts before a rule is marked critical
    pub max_retries: u32,
    /// Rules are refreshed every this many ticks
    pub rule_refresh_ticks: u64,
    /// Nominal tick cadence
    pub tick_interval: Duration,
    /// How far tick timestamps lag the wall clock
    pub tick_offset: Duration,
    /// Number of dispatch loops sharing the job queue
    pub dispatch_workers: usize,
    /// Abort timed out evaluations instead of letting them finish in the background
    pub abort_timed_out: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            job_queue_capacity: 1000,
            result_queue_capacity: 1000,
            execution_timeout: Duration::from_secs(5),
            max_retries: 4,
            rule_refresh_ticks: 10,
            tick_interval: Duration::from_secs(1),
            tick_offset: Duration::ZERO,
            dispatch_workers: 1,
            abort_timed_out: false,
        }
    }
}

impl EngineConfig {
    /// Create a config from environment variables, falling back to defaults
    ///
    /// VIGIL_JOB_QUEUE_CAPACITY=1000
    /// VIGIL_RESULT_QUEUE_CAPACITY=1000
    /// VIGIL_EXECUTION_TIMEOUT_SECS=5
    /// VIGIL_MAX_RETRIES=4
    /// VIGIL_RULE_REFRESH_TICKS=10
    /// VIGIL_TICK_INTERVAL_MS=1000
    /// VIGIL_TICK_OFFSET_MS=0
    /// VIGIL_DISPATCH_WORKERS=1
    /// VIGIL_ABORT_TIMED_OUT=false
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let parse = |key: &str| lookup(key).and_then(|v| v.trim().parse::<u64>().ok());

        Self {
            job_queue_capacity: parse_or(&lookup, "VIGIL_JOB_QUEUE_CAPACITY", defaults.job_queue_capacity).max(1),
            result_queue_capacity: parse_or(&lookup, "VIGIL_RESULT_QUEUE_CAPACITY", defaults.result_queue_capacity)
                .max(1),
            execution_timeout: parse("VIGIL_EXECUTION_TIMEOUT_SECS")
                .filter(|secs| *secs > 0)
                .map(Duration::from_secs)
                .unwrap_or(defaults.execution_timeout),
            max_retries: parse_or(&lookup, "VIGIL_MAX_RETRIES", defaults.max_retries),
            rule_refresh_ticks: parse_or(&lookup, "VIGIL_RULE_REFRESH_TICKS", defaults.rule_refresh_ticks).max(1),
            tick_interval: parse("VIGIL_TICK_INTERVAL_MS")
                .filter(|ms| *ms > 0)
                .map(Duration::from_millis)
                .unwrap_or(defaults.tick_interval),
            tick_offset: parse("VIGIL_TICK_OFFSET_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.tick_offset),
            dispatch_workers: parse_or(&lookup, "VIGIL_DISPATCH_WORKERS", defaults.dispatch_workers).max(1),
            abort_timed_out: lookup("VIGIL_ABORT_TIMED_OUT")
                .map(|v| v == "true" || v == "1")
                .unwrap_or(defaults.abort_timed_out),
        }
    }
}

fn parse_or<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> T {
    lookup(key)
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(vars: &[(&str, &str)]) -> EngineConfig {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        EngineConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        assert_eq!(config_from(&[]), EngineConfig::default());
        let config = EngineConfig::default();
        assert_eq!(config.job_queue_capacity, 1000);
        assert_eq!(config.execution_timeout, Duration::from_secs(5));
        assert_eq!(config.max_retries, 4);
        assert_eq!(config.rule_refresh_ticks, 10);
    }

    #[test]
    fn test_overrides() {
        let config = config_from(&[
            ("VIGIL_JOB_QUEUE_CAPACITY", "50"),
            ("VIGIL_EXECUTION_TIMEOUT_SECS", "2"),
            ("VIGIL_MAX_RETRIES", "1"),
            ("VIGIL_TICK_INTERVAL_MS", "250"),
            ("VIGIL_DISPATCH_WORKERS", "4"),
            ("VIGIL_ABORT_TIMED_OUT", "true"),
        ]);

        assert_eq!(config.job_queue_capacity, 50);
        assert_eq!(config.execution_timeout, Duration::from_secs(2));
        assert_eq!(config.max_retries, 1);
        assert_eq!(config.tick_interval, Duration::from_millis(250));
        assert_eq!(config.dispatch_workers, 4);
        assert!(config.abort_timed_out);
    }

    #[test]
    fn test_invalid_and_zero_values() {
        let config = config_from(&[
            ("VIGIL_JOB_QUEUE_CAPACITY", "0"),
            ("VIGIL_EXECUTION_TIMEOUT_SECS", "0"),
            ("VIGIL_MAX_RETRIES", "lots"),
            ("VIGIL_RULE_REFRESH_TICKS", "0"),
            ("VIGIL_TICK_INTERVAL_MS", "0"),
            ("VIGIL_DISPATCH_WORKERS", "0"),
        ]);

        assert_eq!(config.job_queue_capacity, 1);
        assert_eq!(config.execution_timeout, Duration::from_secs(5));
        assert_eq!(config.max_retries, 4);
        assert_eq!(config.rule_refresh_ticks, 1);
        assert_eq!(config.tick_interval, Duration::from_secs(1));
        assert_eq!(config.dispatch_workers, 1);
    }
}
