//! Reconciliation sweeper.
//!
//! Periodically re-runs the delivery pipeline for messages that were accepted
//! but never reached a terminal status. Only messages created between 24 and
//! 2 hours ago are considered, so fresh sends still owned by a channel worker
//! are left alone.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::dispatcher::Dispatcher;
use crate::error::DispatchError;

pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(600);
pub const DEFAULT_MAX_CONCURRENCY: usize = 16;

const WINDOW_START_HOURS: i64 = 24;
const WINDOW_END_HOURS: i64 = 2;

/// `(created_after, created_before)` bounds of one sweep at `now`.
pub fn in_flight_window(now: DateTime<Utc>) -> (DateTime<Utc>, DateTime<Utc>) {
    (
        now - TimeDelta::hours(WINDOW_START_HOURS),
        now - TimeDelta::hours(WINDOW_END_HOURS),
    )
}

/// IDs with a resend task still pending or running.
#[derive(Clone, Default)]
struct InFlight(Arc<Mutex<HashSet<String>>>);

impl InFlight {
    fn ids(&self) -> MutexGuard<'_, HashSet<String>> {
        self.0.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Claim `id` for one resend; `None` when a task already owns it.
    fn claim(&self, id: &str) -> Option<Claim> {
        if !self.ids().insert(id.to_string()) {
            return None;
        }
        Some(Claim {
            in_flight: self.clone(),
            id: id.to_string(),
        })
    }
}

/// Releases its ID when the resend task finishes, panics or is aborted.
struct Claim {
    in_flight: InFlight,
    id: String,
}

impl Drop for Claim {
    fn drop(&mut self) {
        self.in_flight.ids().remove(&self.id);
    }
}

pub struct Sweeper {
    dispatcher: Dispatcher,
    interval: Duration,
    permits: Arc<Semaphore>,
    in_flight: InFlight,
}

impl Sweeper {
    /// `max_concurrency` caps simultaneous resends; zero is treated as one.
    pub fn new(dispatcher: Dispatcher, interval: Duration, max_concurrency: usize) -> Self {
        Self {
            dispatcher,
            interval,
            permits: Arc::new(Semaphore::new(max_concurrency.max(1))),
            in_flight: InFlight::default(),
        }
    }

    /// Sweep immediately, then every `interval`, until `cancel` fires.
    ///
    /// Resends already spawned by a cycle keep running after cancellation.
    pub async fn run(&self, cancel: CancellationToken) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        tracing::info!(
            interval_secs = self.interval.as_secs(),
            "Reconciliation sweeper started"
        );

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }

            match self.check(Utc::now()).await {
                Ok(spawned) if !spawned.is_empty() => {
                    tracing::info!(count = spawned.len(), "Resending in-flight messages");
                }
                Ok(_) => tracing::debug!("No in-flight messages to resend"),
                Err(e) => tracing::error!(error = %e, "Failed to find in-flight messages"),
            }
        }

        tracing::info!("Reconciliation sweeper stopped");
    }

    /// Run one sweep as of `now`, returning the spawned resend tasks.
    ///
    /// Messages whose resend from an earlier cycle has not finished, including
    /// ones still waiting for a permit, are skipped.
    pub async fn check(&self, now: DateTime<Utc>) -> Result<Vec<JoinHandle<()>>, DispatchError> {
        let (created_after, created_before) = in_flight_window(now);
        let messages = self
            .dispatcher
            .store
            .find_in_flight(created_after, created_before)
            .await?;

        let mut spawned = Vec::with_capacity(messages.len());
        for message in messages {
            let Some(claim) = self.in_flight.claim(&message.id) else {
                tracing::debug!(message_id = %message.id, "Resend already in flight");
                continue;
            };
            let dispatcher = self.dispatcher.clone();
            let permits = Arc::clone(&self.permits);

            spawned.push(tokio::spawn(async move {
                let _claim = claim;
                let Ok(_permit) = permits.acquire_owned().await else {
                    return;
                };

                if let Err(e) = dispatcher.deliver(&message).await {
                    tracing::error!(
                        message_id = %message.id,
                        channel = %message.channel,
                        error = %e,
                        "Failed to resend message"
                    );
                }
            }));
        }

        Ok(spawned)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_window_spans_24h_to_2h_ago() {
        let now = Utc.with_ymd_and_hms(2026, 3, 10, 12, 0, 0).unwrap();
        let (start, end) = in_flight_window(now);

        assert_eq!(start, Utc.with_ymd_and_hms(2026, 3, 9, 12, 0, 0).unwrap());
        assert_eq!(end, Utc.with_ymd_and_hms(2026, 3, 10, 10, 0, 0).unwrap());
    }

    #[test]
    fn test_claim_is_exclusive_until_dropped() {
        let in_flight = InFlight::default();

        let claim = in_flight.claim("NS-1").unwrap();
        assert!(in_flight.claim("NS-1").is_none());
        assert!(in_flight.claim("NS-2").is_some());

        drop(claim);
        assert!(in_flight.claim("NS-1").is_some());
    }

    #[test]
    fn test_message_from_one_hour_ago_is_outside_window() {
        let now = Utc::now();
        let (start, end) = in_flight_window(now);
        let created = now - TimeDelta::hours(1);

        assert!(!(created > start && created < end));
    }
}
