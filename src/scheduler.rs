use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Local;
use tokio::sync::watch;
use tokio::time;
use tracing::{debug, error, info, instrument, warn};

use crate::alerts::{AlertMonitor, Notifier};
use crate::models::AlertRule;
use crate::services::live_service::LiveSnapshot;
use crate::services::LiveService;

/// Hands out increasing tickets and accepts a response only if its ticket is
/// newer than the last one applied.
#[derive(Debug, Default)]
pub struct RequestSequencer {
    issued: AtomicU64,
    applied: AtomicU64,
}

impl RequestSequencer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Tickets start at 1.
    pub fn next_ticket(&self) -> u64 {
        self.issued.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Marks `ticket` applied. Returns `false` when a newer ticket already was.
    pub fn try_apply(&self, ticket: u64) -> bool {
        self.applied.fetch_max(ticket, Ordering::SeqCst) < ticket
    }

    pub fn last_applied(&self) -> u64 {
        self.applied.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone)]
pub struct LiveUpdate {
    pub ticket: u64,
    pub snapshot: LiveSnapshot,
    pub fired: Vec<AlertRule>,
}

/// Polls the live reading for `city` every `interval` and publishes the
/// freshest result on `updates`. Each tick runs in its own task, so a slow
/// request never delays the next tick; responses that lose the race to a newer
/// one are dropped.
#[instrument(skip(live, updates, monitor), fields(interval_secs = interval.as_secs()))]
pub async fn start_live_poller<N>(
    live: LiveService,
    city: String,
    interval: Duration,
    updates: watch::Sender<Option<LiveUpdate>>,
    monitor: Option<Arc<AlertMonitor<N>>>,
) where
    N: Notifier + 'static,
{
    let mut ticker = time::interval(interval);
    let sequencer = Arc::new(RequestSequencer::new());
    let updates = Arc::new(updates);

    info!("Live poller started for {} every {:?}", city, interval);

    loop {
        ticker.tick().await;
        if updates.is_closed() {
            info!("No live view is listening, stopping poller");
            break;
        }

        let ticket = sequencer.next_ticket();
        debug!("Poller tick - issuing request {}", ticket);

        let live = live.clone();
        let city = city.clone();
        let sequencer = Arc::clone(&sequencer);
        let updates = Arc::clone(&updates);
        let monitor = monitor.clone();
        tokio::spawn(async move {
            poll_once(&live, &city, ticket, &sequencer, &updates, monitor.as_deref()).await;
        });
    }
}

#[instrument(skip(live, sequencer, updates, monitor))]
async fn poll_once<N: Notifier>(
    live: &LiveService,
    city: &str,
    ticket: u64,
    sequencer: &RequestSequencer,
    updates: &watch::Sender<Option<LiveUpdate>>,
    monitor: Option<&AlertMonitor<N>>,
) {
    let snapshot = match live.snapshot(city, true).await {
        Ok(snapshot) => snapshot,
        Err(e) => {
            error!("Live refresh failed: {}", e);
            return;
        }
    };

    if !sequencer.try_apply(ticket) {
        warn!(
            "Discarding response {} for {}, newer data {} already shown",
            ticket,
            city,
            sequencer.last_applied()
        );
        return;
    }

    let fired = match monitor {
        Some(monitor) => monitor
            .check(city, snapshot.reading.aqi, Local::now().naive_local())
            .unwrap_or_else(|e| {
                warn!("Alert check failed: {}", e);
                Vec::new()
            }),
        None => Vec::new(),
    };

    updates.send_replace(Some(LiveUpdate {
        ticket,
        snapshot,
        fired,
    }));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tickets_increase() {
        let seq = RequestSequencer::new();
        assert_eq!(seq.next_ticket(), 1);
        assert_eq!(seq.next_ticket(), 2);
        assert_eq!(seq.next_ticket(), 3);
    }

    #[test]
    fn test_older_response_is_rejected_after_newer() {
        let seq = RequestSequencer::new();
        let first = seq.next_ticket();
        let second = seq.next_ticket();

        assert!(seq.try_apply(second));
        assert!(!seq.try_apply(first));
        assert_eq!(seq.last_applied(), second);
    }

    #[test]
    fn test_in_order_responses_apply() {
        let seq = RequestSequencer::new();
        let first = seq.next_ticket();
        let second = seq.next_ticket();
        assert!(seq.try_apply(first));
        assert!(seq.try_apply(second));
        assert!(!seq.try_apply(second));
    }
}
