//! Delivery counters for the event pipeline.
//!
//! Tracks what the pixel accepted, flushed and dropped so operators can tell a
//! quiet storefront from a failing transport. A persistent log starts from the
//! totals a previous run saved.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Counter values as written to `delivery.json`.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
struct Totals {
    records_accepted: u64,
    records_failed: u64,
    batches_flushed: u64,
    events_flushed: u64,
    batches_dropped: u64,
}

#[derive(Serialize, Deserialize)]
struct SavedTotals {
    #[serde(flatten)]
    totals: Totals,
    last_updated: DateTime<Utc>,
}

fn read_totals(path: &Path) -> Result<Totals, std::io::Error> {
    if !path.exists() {
        return Ok(Totals::default());
    }
    let content = std::fs::read_to_string(path)?;
    let saved: SavedTotals = serde_json::from_str(&content).map_err(std::io::Error::other)?;
    Ok(saved.totals)
}

/// Delivery statistics for the current run.
#[derive(Debug)]
pub struct DeliveryLog {
    /// Records appended to the buffer
    records_accepted: AtomicU64,
    /// Record calls that failed before reaching the buffer
    records_failed: AtomicU64,
    /// Batches the sink took
    batches_flushed: AtomicU64,
    /// Records contained in those batches
    events_flushed: AtomicU64,
    /// Batches lost to a sink error or panic
    batches_dropped: AtomicU64,
    started_at: DateTime<Utc>,
    persist_path: Option<PathBuf>,
}

impl DeliveryLog {
    fn from_totals(totals: Totals, persist_path: Option<PathBuf>) -> Self {
        Self {
            records_accepted: AtomicU64::new(totals.records_accepted),
            records_failed: AtomicU64::new(totals.records_failed),
            batches_flushed: AtomicU64::new(totals.batches_flushed),
            events_flushed: AtomicU64::new(totals.events_flushed),
            batches_dropped: AtomicU64::new(totals.batches_dropped),
            started_at: Utc::now(),
            persist_path,
        }
    }

    /// Counters for this run only.
    pub fn new() -> Self {
        Self::from_totals(Totals::default(), None)
    }

    /// Counters that continue from the totals saved at `path`.
    ///
    /// An unreadable file is logged and the count starts from zero.
    pub fn with_persistence(path: PathBuf) -> Self {
        let totals = read_totals(&path).unwrap_or_else(|e| {
            tracing::warn!(path = %path.display(), error = %e, "Could not load previous delivery stats");
            Totals::default()
        });
        Self::from_totals(totals, Some(path))
    }

    /// Shared handle for the pipeline and its observers.
    pub fn shared(self) -> SharedDeliveryLog {
        Arc::new(self)
    }

    pub fn record_accepted(&self) {
        self.records_accepted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_failed(&self) {
        self.records_failed.fetch_add(1, Ordering::Relaxed);
    }

    /// Count a batch the sink accepted.
    pub fn batch_flushed(&self, events: usize) {
        self.batches_flushed.fetch_add(1, Ordering::Relaxed);
        self.events_flushed
            .fetch_add(events as u64, Ordering::Relaxed);
    }

    pub fn batch_dropped(&self) {
        self.batches_dropped.fetch_add(1, Ordering::Relaxed);
    }

    fn totals(&self) -> Totals {
        Totals {
            records_accepted: self.records_accepted.load(Ordering::Relaxed),
            records_failed: self.records_failed.load(Ordering::Relaxed),
            batches_flushed: self.batches_flushed.load(Ordering::Relaxed),
            events_flushed: self.events_flushed.load(Ordering::Relaxed),
            batches_dropped: self.batches_dropped.load(Ordering::Relaxed),
        }
    }

    pub fn stats(&self) -> DeliveryStats {
        let totals = self.totals();
        DeliveryStats {
            records_accepted: totals.records_accepted,
            records_failed: totals.records_failed,
            batches_flushed: totals.batches_flushed,
            events_flushed: totals.events_flushed,
            batches_dropped: totals.batches_dropped,
            started_at: self.started_at,
            uptime_secs: (Utc::now() - self.started_at).num_seconds().max(0) as u64,
        }
    }

    /// Multi-line report for the CLI.
    pub fn summary(&self) -> String {
        let stats = self.stats();
        let delivered_share = if stats.batches_flushed + stats.batches_dropped == 0 {
            100.0
        } else {
            stats.batches_flushed as f64 * 100.0
                / (stats.batches_flushed + stats.batches_dropped) as f64
        };
        format!(
            "Delivery Statistics:\n\
             - Records: {} accepted, {} failed\n\
             - Batches: {} delivered ({} events), {} dropped ({:.0}% delivered)\n\
             - Uptime: {} seconds",
            stats.records_accepted,
            stats.records_failed,
            stats.batches_flushed,
            stats.events_flushed,
            stats.batches_dropped,
            delivered_share,
            stats.uptime_secs
        )
    }

    /// Write the totals to the persistence path, if any.
    pub fn save(&self) -> Result<(), std::io::Error> {
        let Some(ref path) = self.persist_path else {
            return Ok(());
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let saved = SavedTotals {
            totals: self.totals(),
            last_updated: Utc::now(),
        };
        let json = serde_json::to_string_pretty(&saved).map_err(std::io::Error::other)?;
        std::fs::write(path, json)
    }
}

/// Snapshot of delivery statistics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryStats {
    pub records_accepted: u64,
    pub records_failed: u64,
    pub batches_flushed: u64,
    pub events_flushed: u64,
    pub batches_dropped: u64,
    pub started_at: DateTime<Utc>,
    pub uptime_secs: u64,
}

pub type SharedDeliveryLog = Arc<DeliveryLog>;
