use std::{sync::Arc, thread};

use chrono::{DateTime, Utc};
use flume::{Receiver, Sender, TrySendError};
use futures::executor;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TelemetryEvent {
    CatalogLookup {
        catalog: String,
        lookup: String,
        found: bool,
        latency_ms: f64,
        timestamp: DateTime<Utc>,
    },
    MovieUpserted {
        imdb_id: String,
        created: bool,
        timestamp: DateTime<Utc>,
    },
    MoviePatched {
        imdb_id: String,
        timestamp: DateTime<Utc>,
    },
    MovieDeleted {
        imdb_id: String,
        timestamp: DateTime<Utc>,
    },
}

impl TelemetryEvent {
    fn timestamp(&self) -> DateTime<Utc> {
        match self {
            TelemetryEvent::CatalogLookup { timestamp, .. }
            | TelemetryEvent::MovieUpserted { timestamp, .. }
            | TelemetryEvent::MoviePatched { timestamp, .. }
            | TelemetryEvent::MovieDeleted { timestamp, .. } => *timestamp,
        }
    }
}

/// Running totals folded from the event stream since process start.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ActivitySummary {
    pub catalog_lookups: u64,
    pub catalog_misses: u64,
    pub movies_created: u64,
    pub movies_replaced: u64,
    pub movies_patched: u64,
    pub movies_deleted: u64,
    pub last_event_at: Option<DateTime<Utc>>,
}

impl ActivitySummary {
    fn record(&mut self, event: &TelemetryEvent) {
        match event {
            TelemetryEvent::CatalogLookup { found, .. } => {
                self.catalog_lookups += 1;
                if !found {
                    self.catalog_misses += 1;
                }
            }
            TelemetryEvent::MovieUpserted { created: true, .. } => self.movies_created += 1,
            TelemetryEvent::MovieUpserted { created: false, .. } => self.movies_replaced += 1,
            TelemetryEvent::MoviePatched { .. } => self.movies_patched += 1,
            TelemetryEvent::MovieDeleted { .. } => self.movies_deleted += 1,
        }
        self.last_event_at = Some(event.timestamp());
    }
}

#[derive(Clone)]
pub struct TelemetryHub {
    tx: Sender<TelemetryEvent>,
    summary: Arc<RwLock<ActivitySummary>>,
}

impl TelemetryHub {
    pub fn new(buffer: usize) -> Self {
        let (tx, rx) = flume::bounded(buffer);
        let summary = Arc::new(RwLock::new(ActivitySummary::default()));
        let drain = Self::drain(rx, summary.clone());
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(drain);
            }
            Err(_) => {
                let spawned = thread::Builder::new()
                    .name("cinevault-telemetry".into())
                    .spawn(move || executor::block_on(drain));
                if let Err(err) = spawned {
                    warn!(%err, "telemetry drain not started");
                }
            }
        }
        Self { tx, summary }
    }

    /// Never blocks the caller; a full buffer drops the event.
    pub fn publish(&self, event: TelemetryEvent) {
        match self.tx.try_send(event) {
            Ok(()) => {}
            Err(TrySendError::Full(event)) => warn!(event = ?event, "telemetry buffer full"),
            Err(TrySendError::Disconnected(_)) => warn!("telemetry drain stopped"),
        }
    }

    pub fn summary(&self) -> ActivitySummary {
        self.summary.read().clone()
    }

    async fn drain(rx: Receiver<TelemetryEvent>, summary: Arc<RwLock<ActivitySummary>>) {
        while let Ok(event) = rx.recv_async().await {
            debug!(event = ?event, "telemetry");
            summary.write().record(&event);
        }
    }
}
