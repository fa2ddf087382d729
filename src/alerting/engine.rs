//! Alerting engine: tick, dispatch and result loops

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot, Mutex};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use super::error::{EngineError, EvalError};
use super::executor::Executor;
use super::job::{AlertJob, AlertResult};
use super::reader::RuleSource;
use super::scheduler::{FrequencyScheduler, JobSink, Scheduler};
use super::sink::StateSink;
use super::state::AlertState;
use super::ticker::Ticker;
use crate::config::EngineConfig;

type JobQueue = Arc<Mutex<mpsc::Receiver<Arc<AlertJob>>>>;

/// Turns rules into scheduled jobs, runs them under a timeout and persists
/// their outcome with bounded retry
pub struct Engine {
    config: EngineConfig,
    rule_source: Arc<dyn RuleSource>,
    executor: Arc<dyn Executor>,
    sink: Arc<dyn StateSink>,
    scheduler: Option<Box<dyn Scheduler>>,
    ticker: Option<Ticker>,
    shutdown: CancellationToken,
    handles: Vec<JoinHandle<()>>,
    started: bool,
}

impl Engine {
    /// Create an engine with the default scheduler and a wall-clock ticker
    pub fn new(
        config: EngineConfig,
        rule_source: Arc<dyn RuleSource>,
        executor: Arc<dyn Executor>,
        sink: Arc<dyn StateSink>,
    ) -> Self {
        Self {
            config,
            rule_source,
            executor,
            sink,
            scheduler: Some(Box::new(FrequencyScheduler::new())),
            ticker: None,
            shutdown: CancellationToken::new(),
            handles: Vec::new(),
            started: false,
        }
    }

    /// Replace the default [`FrequencyScheduler`]
    pub fn with_scheduler(mut self, scheduler: Box<dyn Scheduler>) -> Self {
        self.scheduler = Some(scheduler);
        self
    }

    /// Drive the engine from a custom tick source instead of the wall clock
    pub fn with_ticker(mut self, ticker: Ticker) -> Self {
        self.ticker = Some(ticker);
        self
    }

    /// Get the engine configuration
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Launch the loops and return immediately. Must be called within a tokio runtime.
    pub fn start(&mut self) -> Result<(), EngineError> {
        if self.started {
            return Err(EngineError::AlreadyStarted);
        }
        let scheduler = self.scheduler.take().ok_or(EngineError::AlreadyStarted)?;
        self.started = true;

        tracing::info!(
            dispatch_workers = self.config.dispatch_workers,
            timeout = ?self.config.execution_timeout,
            max_retries = self.config.max_retries,
            "Alerting engine starting"
        );

        let ticker = self.ticker.take().unwrap_or_else(|| {
            Ticker::with_offset(self.config.tick_interval, self.config.tick_offset)
        });

        let (job_tx, job_rx) = mpsc::channel(self.config.job_queue_capacity);
        let (result_tx, result_rx) = mpsc::channel(self.config.result_queue_capacity);
        let jobs = JobSink::new(job_tx, self.shutdown.clone());
        let job_rx: JobQueue = Arc::new(Mutex::new(job_rx));

        self.handles.push(tokio::spawn(tick_loop(
            ticker,
            scheduler,
            Arc::clone(&self.rule_source),
            jobs.clone(),
            self.config.rule_refresh_ticks.max(1),
            self.shutdown.clone(),
        )));

        for worker in 0..self.config.dispatch_workers.max(1) {
            self.handles.push(tokio::spawn(dispatch_loop(
                worker,
                Arc::clone(&job_rx),
                result_tx.clone(),
                Arc::clone(&self.executor),
                self.config.clone(),
                self.shutdown.clone(),
            )));
        }

        self.handles.push(tokio::spawn(result_loop(
            result_rx,
            jobs,
            Arc::clone(&self.sink),
            self.config.max_retries,
            self.shutdown.clone(),
        )));

        Ok(())
    }

    /// Signal shutdown and wait for all loops to exit
    pub async fn stop(&mut self) {
        self.shutdown.cancel();

        for result in futures::future::join_all(self.handles.drain(..)).await {
            if let Err(e) = result {
                tracing::error!(error = %e, "Alerting loop ended abnormally");
            }
        }

        tracing::info!("Alerting engine stopped");
    }

    /// Started, not stopped, and none of the loops has exited
    pub fn is_running(&self) -> bool {
        self.started
            && !self.shutdown.is_cancelled()
            && !self.handles.iter().any(|h| h.is_finished())
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

async fn tick_loop(
    mut ticker: Ticker,
    mut scheduler: Box<dyn Scheduler>,
    rule_source: Arc<dyn RuleSource>,
    jobs: JobSink,
    refresh_ticks: u64,
    shutdown: CancellationToken,
) {
    let mut tick_index: u64 = 0;

    loop {
        let tick = tokio::select! {
            _ = shutdown.cancelled() => break,
            tick = ticker.next() => match tick {
                Some(tick) => tick,
                None => {
                    tracing::info!("Tick source closed");
                    break;
                }
            },
        };

        if tick_index % refresh_ticks == 0 {
            match rule_source.fetch() {
                Ok(rules) => {
                    tracing::debug!(count = rules.len(), "Refreshing alert rules");
                    scheduler.update(rules);
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Failed to fetch alert rules, keeping previous set");
                }
            }
        }

        match scheduler.tick(tick, &jobs).await {
            Ok(0) => {}
            Ok(count) => tracing::trace!(count, "Scheduled jobs"),
            Err(EngineError::ShuttingDown) => break,
            Err(e) => {
                tracing::warn!(error = %e, "Tick loop stopping, job queue unavailable");
                break;
            }
        }

        tick_index += 1;
    }

    tracing::debug!("Tick loop stopped");
}

async fn dispatch_loop(
    worker: usize,
    queue: JobQueue,
    results: mpsc::Sender<AlertResult>,
    executor: Arc<dyn Executor>,
    config: EngineConfig,
    shutdown: CancellationToken,
) {
    loop {
        let job = {
            let mut queue = queue.lock().await;
            tokio::select! {
                _ = shutdown.cancelled() => break,
                job = queue.recv() => match job {
                    Some(job) => job,
                    None => break,
                },
            }
        };

        if !job.begin() {
            tracing::debug!(rule_id = job.rule().id, "Job already running, skipping");
            continue;
        }

        tracing::trace!(worker, rule_name = %job.rule().name, "Starting job");

        let Some(result) = execute_job(
            Arc::clone(&job),
            Arc::clone(&executor),
            config.execution_timeout,
            config.abort_timed_out,
            &shutdown,
        )
        .await
        else {
            job.finish();
            break;
        };

        tokio::select! {
            biased;
            _ = shutdown.cancelled() => {
                job.finish();
                break;
            }
            sent = results.send(result) => {
                if sent.is_err() {
                    job.finish();
                    break;
                }
            }
        }
    }

    tracing::debug!(worker, "Dispatch loop stopped");
}

/// Run one job against a deadline
///
/// The executor runs on its own task and answers through a oneshot channel.
/// On timeout that task is abandoned; its late send lands in a channel no one
/// reads. Returns `None` only when shutdown interrupts the wait.
async fn execute_job(
    job: Arc<AlertJob>,
    executor: Arc<dyn Executor>,
    timeout: Duration,
    abort_on_timeout: bool,
    shutdown: &CancellationToken,
) -> Option<AlertResult> {
    let started = Instant::now();
    let (tx, rx) = oneshot::channel();

    let task = tokio::spawn({
        let job = Arc::clone(&job);
        async move {
            let result = executor.execute(job).await;
            let _ = tx.send(result);
        }
    });

    tokio::select! {
        _ = shutdown.cancelled() => None,
        _ = tokio::time::sleep(timeout) => {
            if abort_on_timeout {
                task.abort();
            }
            let mut result = AlertResult::failed(job, EvalError::Timeout(timeout));
            result.duration_ms = elapsed_ms(started);
            tracing::trace!(duration_ms = result.duration_ms, "Job timed out");
            Some(result)
        }
        received = rx => {
            let mut result = match received {
                Ok(result) => result,
                Err(_) => AlertResult::failed(job, EvalError::Aborted),
            };
            result.duration_ms = elapsed_ms(started);
            tracing::trace!(duration_ms = result.duration_ms, "Job done");
            Some(result)
        }
    }
}

fn elapsed_ms(started: Instant) -> f64 {
    started.elapsed().as_nanos() as f64 / 1_000_000.0
}

async fn result_loop(
    mut results: mpsc::Receiver<AlertResult>,
    jobs: JobSink,
    sink: Arc<dyn StateSink>,
    max_retries: u32,
    shutdown: CancellationToken,
) {
    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            result = results.recv() => match result {
                Some(result) => {
                    handle_result(result, Some(&jobs), sink.as_ref(), max_retries).await;
                }
                None => break,
            },
        }
    }

    // Persist whatever is already queued; retries are not started any more.
    results.close();
    while let Some(result) = results.recv().await {
        handle_result(result, None, sink.as_ref(), max_retries).await;
    }

    tracing::debug!("Result loop stopped");
}

/// What the result loop did with a result
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Outcome {
    Saved,
    Retried,
    Failed,
    Dropped,
}

/// Apply the retry policy to one result
///
/// `retry` is `None` while draining on shutdown, in which case retryable
/// results are dropped instead of re-enqueued.
pub(crate) async fn handle_result(
    mut result: AlertResult,
    retry: Option<&JobSink>,
    sink: &dyn StateSink,
    max_retries: u32,
) -> Outcome {
    let job = Arc::clone(&result.job);
    let rule = job.rule();

    tracing::debug!(
        rule_id = rule.id,
        state = %result.state,
        actual = ?result.actual_value,
        retry = job.retry_count(),
        "Alert result"
    );

    job.finish();

    let Some(error) = result.error.clone() else {
        job.reset_retries();
        job.complete();
        save(sink, &result).await;
        return Outcome::Saved;
    };

    let retries = job.retry_count();

    if retries < max_retries {
        job.record_retry();
        let Some(jobs) = retry else {
            tracing::warn!(rule_name = %rule.name, error = %error, "Dropping retry during shutdown");
            job.complete();
            return Outcome::Dropped;
        };

        tracing::error!(rule_name = %rule.name, error = %error, "Result error, retrying");
        return match jobs.push(Arc::clone(&job)).await {
            Ok(()) => Outcome::Retried,
            Err(e) => {
                tracing::warn!(rule_name = %rule.name, error = %e, "Could not re-enqueue job");
                job.complete();
                Outcome::Dropped
            }
        };
    }

    tracing::error!(rule_name = %rule.name, error = %error, "Result error, max retries reached");

    result.state = AlertState::Critical;
    result.description = format!("Failed to run check after {} retires, Error: {}", retries, error);
    job.complete();
    save(sink, &result).await;
    Outcome::Failed
}

async fn save(sink: &dyn StateSink, result: &AlertResult) {
    if let Err(e) = sink.save(result).await {
        tracing::error!(rule_id = result.rule().id, error = %e, "Failed to save alert state");
    }
}
