//! Tick sources driving the scheduler

use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use tokio::time::{self, MissedTickBehavior};

use super::error::TickError;

/// Stream of strictly increasing tick timestamps
pub struct Ticker {
    rx: mpsc::Receiver<DateTime<Utc>>,
    task: Option<tokio::task::JoinHandle<()>>,
}

impl Ticker {
    /// Tick from the wall clock every `interval`. Must be called within a tokio runtime.
    pub fn new(interval: Duration) -> Self {
        Self::with_offset(interval, Duration::ZERO)
    }

    /// Like [`Ticker::new`], but each timestamp lags the wall clock by `offset`
    /// so evaluations see data that arrived late.
    pub fn with_offset(interval: Duration, offset: Duration) -> Self {
        let (tx, rx) = mpsc::channel(1);
        let offset = chrono::Duration::from_std(offset).unwrap_or_else(|_| chrono::Duration::zero());

        let task = tokio::spawn(async move {
            let mut interval = time::interval(interval);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            let mut last: Option<DateTime<Utc>> = None;

            loop {
                interval.tick().await;

                let now = Utc::now() - offset;
                if last.is_some_and(|prev| now <= prev) {
                    tracing::warn!("Clock went backwards, skipping tick at {}", now);
                    continue;
                }
                last = Some(now);

                if tx.send(now).await.is_err() {
                    break;
                }
            }
        });

        Self { rx, task: Some(task) }
    }

    /// Synthetic ticker fed by hand, for tests and replay
    pub fn manual() -> (TickSender, Self) {
        let (tx, rx) = mpsc::channel(1);
        (
            TickSender { tx, last: None },
            Self { rx, task: None },
        )
    }

    /// Wait for the next tick. Returns `None` once the source is closed.
    pub async fn next(&mut self) -> Option<DateTime<Utc>> {
        self.rx.recv().await
    }
}

impl Drop for Ticker {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

/// Producer half of a manual ticker
pub struct TickSender {
    tx: mpsc::Sender<DateTime<Utc>>,
    last: Option<DateTime<Utc>>,
}

impl TickSender {
    /// Deliver a tick. Waits until the previous one has been taken.
    pub async fn tick(&mut self, at: DateTime<Utc>) -> Result<(), TickError> {
        if let Some(previous) = self.last {
            if at <= previous {
                return Err(TickError::NotMonotonic { previous, next: at });
            }
        }

        self.tx.send(at).await.map_err(|_| TickError::Closed)?;
        self.last = Some(at);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[tokio::test]
    async fn test_manual_ticks_in_order() {
        let (mut sender, mut ticker) = Ticker::manual();
        let t0 = Utc.timestamp_opt(1_000, 0).unwrap();
        let t1 = Utc.timestamp_opt(1_001, 0).unwrap();

        sender.tick(t0).await.unwrap();
        assert_eq!(ticker.next().await, Some(t0));
        sender.tick(t1).await.unwrap();
        assert_eq!(ticker.next().await, Some(t1));

        drop(sender);
        assert_eq!(ticker.next().await, None);
    }

    #[tokio::test]
    async fn test_manual_rejects_non_monotonic() {
        let (mut sender, mut ticker) = Ticker::manual();
        let t0 = Utc.timestamp_opt(1_000, 0).unwrap();

        sender.tick(t0).await.unwrap();
        ticker.next().await;

        let err = sender.tick(t0).await.unwrap_err();
        assert!(matches!(err, TickError::NotMonotonic { .. }));
    }

    #[tokio::test]
    async fn test_manual_closed_ticker() {
        let (mut sender, ticker) = Ticker::manual();
        drop(ticker);
        let err = sender.tick(Utc::now()).await.unwrap_err();
        assert_eq!(err, TickError::Closed);
    }

    #[tokio::test]
    async fn test_interval_ticks_increase() {
        let mut ticker = Ticker::new(Duration::from_millis(5));
        let a = ticker.next().await.unwrap();
        let b = ticker.next().await.unwrap();
        let c = ticker.next().await.unwrap();
        assert!(a < b && b < c);
    }

    #[tokio::test]
    async fn test_offset_lags_wall_clock() {
        let mut ticker = Ticker::with_offset(Duration::from_millis(5), Duration::from_secs(60));
        let tick = ticker.next().await.unwrap();
        assert!(tick < Utc::now() - chrono::Duration::seconds(59));
    }
}
