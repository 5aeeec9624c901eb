//! Shared inventory aggregate
//!
//! [`SharedState`] is the unit that is persisted, synchronized and replaced.
//! Transitions return a new value and never touch counts without history or
//! history without counts.

use serde::{Deserialize, Serialize};

use crate::errors::{StoreError, StoreResult};
use crate::history::{HistoryEntry, HistoryLog};
use crate::types::{CounterVector, Rank};

/// Current counts plus the history that justifies them.
///
/// Consistent when the history is empty and every count is zero, or when the
/// last history entry carries exactly the current counts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SharedState {
    counts: CounterVector,
    history: HistoryLog,
}

impl SharedState {
    /// All-zero counts with empty history; the create-if-absent seed.
    pub fn initial() -> Self {
        Self::default()
    }

    /// Start a new round: counts become `initial` and history restarts from a
    /// single entry recording them.
    pub fn reseeded(initial: CounterVector, now_ms: u64) -> Self {
        let mut history = HistoryLog::new();
        history.truncate_to(Some(HistoryEntry::new(now_ms, initial)));
        Self {
            counts: initial,
            history,
        }
    }

    /// State after drawing one prize of `rank`.
    ///
    /// The new entry is stamped with `now_ms`, clamped so history stays
    /// chronological even when the writer's clock lags a previous writer.
    pub fn drawn(&self, rank: Rank, now_ms: u64) -> StoreResult<Self> {
        let counts = self
            .counts
            .decremented(rank)
            .ok_or(StoreError::AlreadyZero { rank })?;

        let mut history = self.history.clone();
        let at = history.next_sequence_time(now_ms);
        history.append(HistoryEntry::new(at, counts))?;

        Ok(Self { counts, history })
    }

    /// Current counts
    pub fn counts(&self) -> CounterVector {
        self.counts
    }

    /// History log
    pub fn history(&self) -> &HistoryLog {
        &self.history
    }

    /// Whether counts and history agree.
    pub fn is_consistent(&self) -> bool {
        match self.history.last() {
            Some(last) => last.counts == self.counts,
            None => self.counts.is_zero(),
        }
    }

    /// Reject states whose counts are not justified by their history.
    pub fn validate(&self) -> StoreResult<()> {
        if self.is_consistent() {
            Ok(())
        } else {
            Err(StoreError::internal(format!(
                "counts {} are not justified by the last history entry",
                self.counts
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use proptest::prelude::*;

    #[test]
    fn test_initial_is_empty_and_consistent() {
        let state = SharedState::initial();
        assert!(state.counts().is_zero());
        assert!(state.history().is_empty());
        assert!(state.is_consistent());
    }

    #[test]
    fn test_reseeded_has_single_entry() {
        let initial = CounterVector::new([5, 5, 5, 5, 5]);
        let state = SharedState::reseeded(initial, 1_000);

        assert_eq!(state.counts(), initial);
        assert_eq!(state.history().entries(), &[HistoryEntry::new(1_000, initial)]);
        assert!(state.is_consistent());
    }

    #[test]
    fn test_drawn_appends_snapshot() {
        let state = SharedState::reseeded(CounterVector::new([3, 0, 0, 0, 0]), 10);
        let rank = Rank::ALL[0];

        let next = state.drawn(rank, 20).unwrap();
        assert_eq!(next.counts(), CounterVector::new([2, 0, 0, 0, 0]));
        assert_eq!(next.history().len(), 2);
        assert_eq!(next.history().last().unwrap().counts, next.counts());
        assert!(next.is_consistent());

        // Source state is untouched
        assert_eq!(state.history().len(), 1);
    }

    #[test]
    fn test_drawn_exhausted_rank() {
        let state = SharedState::reseeded(CounterVector::new([3, 0, 0, 0, 0]), 10);
        let rank = Rank::ALL[1];
        assert_matches!(state.drawn(rank, 20), Err(StoreError::AlreadyZero { rank: r }) if r == rank);
    }

    #[test]
    fn test_drawn_clamps_lagging_clock() {
        let state = SharedState::reseeded(CounterVector::new([2, 0, 0, 0, 0]), 500);
        let next = state.drawn(Rank::ALL[0], 100).unwrap();
        assert_eq!(next.history().last().unwrap().sequence_time, 500);
    }

    #[test]
    fn test_validate_rejects_unjustified_counts() {
        let json = r#"{"counts":[1,0,0,0,0],"history":[]}"#;
        let state: SharedState = serde_json::from_str(json).unwrap();
        assert!(!state.is_consistent());
        assert_matches!(state.validate(), Err(StoreError::Internal { .. }));
    }

    proptest! {
        #[test]
        fn prop_draw_decrements_exactly_one_rank(
            counts in proptest::array::uniform5(0u32..20),
            index in 0usize..5,
        ) {
            let initial = CounterVector::new(counts);
            let state = SharedState::reseeded(initial, 0);
            let rank = Rank::new(index).unwrap();

            match state.drawn(rank, 1) {
                Ok(next) => {
                    prop_assert!(counts[index] > 0);
                    prop_assert_eq!(next.counts().get(rank), counts[index] - 1);
                    for other in Rank::ALL.iter().filter(|r| **r != rank) {
                        prop_assert_eq!(next.counts().get(*other), initial.get(*other));
                    }
                    prop_assert_eq!(next.history().len(), 2);
                    prop_assert!(next.is_consistent());
                }
                Err(err) => {
                    prop_assert_eq!(counts[index], 0);
                    prop_assert_eq!(err, StoreError::AlreadyZero { rank });
                }
            }
        }
    }
}
