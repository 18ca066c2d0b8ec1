//! Session-scoped event statistics.

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Occurrence count for one event type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventCount {
    pub event_type: String,
    pub count: u64,
}

impl std::fmt::Display for EventCount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.event_type, self.count)
    }
}

/// Running statistics for the current session.
///
/// Counts are kept in first-occurrence order so rankings can break ties stably.
#[derive(Debug, Clone)]
pub struct EventStats {
    total_events: u64,
    session_start_ms: i64,
    counts: Vec<EventCount>,
    index: HashMap<String, usize>,
}

impl EventStats {
    pub fn new(session_start_ms: i64) -> Self {
        Self {
            total_events: 0,
            session_start_ms,
            counts: Vec::new(),
            index: HashMap::new(),
        }
    }

    /// Count one recorded event.
    pub fn record(&mut self, event_type: &str) {
        self.total_events += 1;
        match self.index.get(event_type) {
            Some(&slot) => self.counts[slot].count += 1,
            None => {
                self.index.insert(event_type.to_string(), self.counts.len());
                self.counts.push(EventCount {
                    event_type: event_type.to_string(),
                    count: 1,
                });
            }
        }
    }

    pub fn total_events(&self) -> u64 {
        self.total_events
    }

    pub fn session_start_ms(&self) -> i64 {
        self.session_start_ms
    }

    /// Occurrences of one event type.
    pub fn count_of(&self, event_type: &str) -> u64 {
        self.index
            .get(event_type)
            .map(|&slot| self.counts[slot].count)
            .unwrap_or(0)
    }

    /// Milliseconds since the session started, as of `now_ms`.
    pub fn session_duration_ms(&self, now_ms: i64) -> i64 {
        (now_ms - self.session_start_ms).max(0)
    }

    /// The `n` most frequent event types, ties in first-occurrence order.
    pub fn top_events(&self, n: usize) -> Vec<EventCount> {
        rank(&self.counts, n)
    }

    /// Copy the current state out for inspection.
    pub fn snapshot(&self, now_ms: i64) -> StatsSnapshot {
        StatsSnapshot {
            total_events: self.total_events,
            session_start: Utc
                .timestamp_millis_opt(self.session_start_ms)
                .single()
                .unwrap_or_default(),
            session_duration_ms: self.session_duration_ms(now_ms),
            event_counts: self.counts.clone(),
        }
    }
}

/// Highest counts first; equal counts keep their input order.
fn rank(counts: &[EventCount], n: usize) -> Vec<EventCount> {
    let mut ranked = counts.to_vec();
    // sort_by is stable
    ranked.sort_by(|a, b| b.count.cmp(&a.count));
    ranked.truncate(n);
    ranked
}

/// Point-in-time copy of the session statistics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatsSnapshot {
    pub total_events: u64,
    pub session_start: DateTime<Utc>,
    pub session_duration_ms: i64,
    /// Counts in first-occurrence order
    pub event_counts: Vec<EventCount>,
}

impl StatsSnapshot {
    pub fn count_of(&self, event_type: &str) -> u64 {
        self.event_counts
            .iter()
            .find(|c| c.event_type == event_type)
            .map(|c| c.count)
            .unwrap_or(0)
    }

    pub fn top_events(&self, n: usize) -> Vec<EventCount> {
        rank(&self.event_counts, n)
    }

    /// Whole seconds, formatted for log lines (`"12s"`).
    pub fn session_duration_label(&self) -> String {
        format!(
            "{}s",
            (self.session_duration_ms as f64 / 1000.0).round() as i64
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stats_from(events: &[&str]) -> EventStats {
        let mut stats = EventStats::new(1_000);
        for e in events {
            stats.record(e);
        }
        stats
    }

    #[test]
    fn test_counts_and_total() {
        let stats = stats_from(&["a", "b", "a", "c", "a"]);
        assert_eq!(stats.total_events(), 5);
        assert_eq!(stats.count_of("a"), 3);
        assert_eq!(stats.count_of("b"), 1);
        assert_eq!(stats.count_of("missing"), 0);
    }

    #[test]
    fn test_top_events_ties_keep_first_occurrence() {
        let stats = stats_from(&[
            "a", "b", "a", "c", "a", "b", "d", "c", "a", "b", "c", "a",
        ]);
        let top: Vec<String> = stats.top_events(3).iter().map(|c| c.to_string()).collect();
        assert_eq!(top, vec!["a: 5", "b: 3", "c: 3"]);
        assert_eq!(stats.snapshot(2_000).top_events(3), stats.top_events(3));
    }

    #[test]
    fn test_top_events_tie_order_follows_first_seen_not_name() {
        let stats = stats_from(&["c", "b", "b", "c"]);
        let top = stats.top_events(2);
        assert_eq!(top[0].event_type, "c");
        assert_eq!(top[1].event_type, "b");
    }

    #[test]
    fn test_session_duration() {
        let stats = EventStats::new(1_000);
        assert_eq!(stats.session_duration_ms(4_500), 3_500);
        assert_eq!(stats.session_duration_ms(500), 0);

        let snapshot = stats.snapshot(4_500);
        assert_eq!(snapshot.session_duration_label(), "4s");
    }

    #[test]
    fn test_snapshot_is_detached() {
        let mut stats = stats_from(&["a"]);
        let snapshot = stats.snapshot(2_000);
        stats.record("a");
        assert_eq!(snapshot.total_events, 1);
        assert_eq!(snapshot.count_of("a"), 1);
        assert_eq!(stats.count_of("a"), 2);
    }
}
