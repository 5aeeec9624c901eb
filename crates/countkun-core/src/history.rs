//! Append-only snapshot history
//!
//! Every committed change records the complete counter vector, so any entry
//! can be rendered on its own. Entries are kept in insertion order, which is
//! also chronological order: `sequence_time` never decreases.
//!
//! The log rejects out-of-order entries with [`HistoryError::OutOfOrderEntry`].
//! Writers that build entries from a wall clock should stamp them with
//! [`HistoryLog::next_sequence_time`], which clamps to the last recorded time.

use chrono::{Local, LocalResult, TimeZone};
use serde::{Deserialize, Serialize};

use crate::types::CounterVector;

/// Errors raised by history validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
pub enum HistoryError {
    /// Entry would move time backwards
    #[error("History entry at {attempted}ms precedes the last entry at {last}ms")]
    OutOfOrderEntry {
        /// Time of the current last entry
        last: u64,
        /// Time of the rejected entry
        attempted: u64,
    },
}

/// One immutable snapshot of the inventory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    /// Milliseconds since the Unix epoch
    pub sequence_time: u64,
    /// Complete counter vector at that time
    pub counts: CounterVector,
}

impl HistoryEntry {
    /// Create a history entry
    pub fn new(sequence_time: u64, counts: CounterVector) -> Self {
        Self {
            sequence_time,
            counts,
        }
    }

    /// Render as a chart point.
    pub fn chart_point(&self) -> ChartPoint {
        let [p1, p2, p3, p4, p5] = *self.counts.as_array();
        ChartPoint {
            sequence_time: self.sequence_time,
            time: clock_label(self.sequence_time),
            p1,
            p2,
            p3,
            p4,
            p5,
        }
    }
}

/// History entry flattened into the row shape a line chart consumes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChartPoint {
    /// Milliseconds since the Unix epoch
    pub sequence_time: u64,
    /// Local wall-clock label, `HH:MM:SS`
    pub time: String,
    /// Remaining `1等`
    pub p1: u32,
    /// Remaining `2等`
    pub p2: u32,
    /// Remaining `3等`
    pub p3: u32,
    /// Remaining `4等`
    pub p4: u32,
    /// Remaining `5等`
    pub p5: u32,
}

fn clock_label(sequence_time: u64) -> String {
    let millis = i64::try_from(sequence_time).unwrap_or(i64::MAX);
    match Local.timestamp_millis_opt(millis) {
        LocalResult::Single(at) | LocalResult::Ambiguous(at, _) => at.format("%H:%M:%S").to_string(),
        LocalResult::None => "--:--:--".to_string(),
    }
}

/// Ordered, append-only sequence of [`HistoryEntry`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<HistoryEntry>", into = "Vec<HistoryEntry>")]
pub struct HistoryLog {
    entries: Vec<HistoryEntry>,
}

impl HistoryLog {
    /// Create an empty history log
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an entry at the end.
    ///
    /// Fails without modifying the log if the entry is older than the last one.
    pub fn append(&mut self, entry: HistoryEntry) -> Result<(), HistoryError> {
        if let Some(last) = self.entries.last() {
            if entry.sequence_time < last.sequence_time {
                return Err(HistoryError::OutOfOrderEntry {
                    last: last.sequence_time,
                    attempted: entry.sequence_time,
                });
            }
        }
        self.entries.push(entry);
        Ok(())
    }

    /// Replace the whole log with either nothing or a single seed entry.
    pub fn truncate_to(&mut self, seed: Option<HistoryEntry>) {
        self.entries.clear();
        self.entries.extend(seed);
    }

    /// Time to stamp the next entry with, given the writer's clock reading.
    pub fn next_sequence_time(&self, now_ms: u64) -> u64 {
        self.entries
            .last()
            .map_or(now_ms, |last| now_ms.max(last.sequence_time))
    }

    /// All entries in chronological order
    pub fn entries(&self) -> &[HistoryEntry] {
        &self.entries
    }

    /// Iterate entries in chronological order
    pub fn iter(&self) -> impl Iterator<Item = &HistoryEntry> + '_ {
        self.entries.iter()
    }

    /// Most recent entry
    pub fn last(&self) -> Option<&HistoryEntry> {
        self.entries.last()
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the log has no entries
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Chart rows in chronological order.
    pub fn chart_points(&self) -> Vec<ChartPoint> {
        self.entries.iter().map(HistoryEntry::chart_point).collect()
    }
}

impl TryFrom<Vec<HistoryEntry>> for HistoryLog {
    type Error = HistoryError;

    fn try_from(entries: Vec<HistoryEntry>) -> Result<Self, Self::Error> {
        let mut log = HistoryLog {
            entries: Vec::with_capacity(entries.len()),
        };
        for entry in entries {
            log.append(entry)?;
        }
        Ok(log)
    }
}

impl From<HistoryLog> for Vec<HistoryEntry> {
    fn from(log: HistoryLog) -> Self {
        log.entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn entry(time: u64, first: u32) -> HistoryEntry {
        HistoryEntry::new(time, CounterVector::new([first, 0, 0, 0, 0]))
    }

    #[test]
    fn test_append_in_order() {
        let mut log = HistoryLog::new();
        log.append(entry(10, 3)).unwrap();
        log.append(entry(10, 2)).unwrap();
        log.append(entry(25, 1)).unwrap();

        assert_eq!(log.len(), 3);
        assert_eq!(log.last().unwrap().counts.as_array()[0], 1);
        assert_eq!(log.last().unwrap().sequence_time, 25);
    }

    #[test]
    fn test_append_rejects_out_of_order() {
        let mut log = HistoryLog::new();
        log.append(entry(100, 3)).unwrap();

        let err = log.append(entry(99, 2)).unwrap_err();
        assert_eq!(
            err,
            HistoryError::OutOfOrderEntry {
                last: 100,
                attempted: 99
            }
        );
        assert_eq!(log.len(), 1);
    }

    #[test]
    fn test_truncate_to_seed_and_empty() {
        let mut log = HistoryLog::new();
        log.append(entry(1, 5)).unwrap();
        log.append(entry(2, 4)).unwrap();

        log.truncate_to(Some(entry(50, 9)));
        assert_eq!(log.entries(), &[entry(50, 9)]);

        log.truncate_to(None);
        assert!(log.is_empty());
    }

    #[test]
    fn test_next_sequence_time_clamps_to_last() {
        let mut log = HistoryLog::new();
        assert_eq!(log.next_sequence_time(7), 7);

        log.append(entry(100, 1)).unwrap();
        assert_eq!(log.next_sequence_time(40), 100);
        assert_eq!(log.next_sequence_time(140), 140);
    }

    #[test]
    fn test_deserialize_validates_order() {
        let ordered = r#"[{"sequence_time":1,"counts":[1,0,0,0,0]},{"sequence_time":2,"counts":[0,0,0,0,0]}]"#;
        let log: HistoryLog = serde_json::from_str(ordered).unwrap();
        assert_eq!(log.len(), 2);

        let unordered = r#"[{"sequence_time":2,"counts":[1,0,0,0,0]},{"sequence_time":1,"counts":[0,0,0,0,0]}]"#;
        assert!(serde_json::from_str::<HistoryLog>(unordered).is_err());
    }

    #[test]
    fn test_chart_point_shape() {
        let point = HistoryEntry::new(0, CounterVector::new([5, 4, 3, 2, 1])).chart_point();
        assert_eq!((point.p1, point.p2, point.p3, point.p4, point.p5), (5, 4, 3, 2, 1));
        assert_eq!(point.time.len(), "00:00:00".len());
    }

    proptest! {
        #[test]
        fn prop_stamped_entries_stay_chronological(clock in proptest::collection::vec(0u64..10_000, 1..50)) {
            let mut log = HistoryLog::new();
            for now in clock {
                let at = log.next_sequence_time(now);
                log.append(HistoryEntry::new(at, CounterVector::zero())).unwrap();
            }
            let times: Vec<u64> = log.entries().iter().map(|entry| entry.sequence_time).collect();
            prop_assert!(times.windows(2).all(|pair| pair[0] <= pair[1]));
        }
    }
}
