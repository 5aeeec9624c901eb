//! Inventory value types
//!
//! [`Rank`] identifies one of the five prize tiers, [`CounterVector`] holds one
//! count per tier and [`Version`] orders commits of the shared document.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::errors::StoreError;

/// Number of prize ranks tracked by the inventory.
pub const RANK_COUNT: usize = 5;

// =============================================================================
// Rank
// =============================================================================

/// One of the five prize tiers, identified by a zero-based index.
///
/// Display numbering is one-based: index 0 renders as `1等`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct Rank(u8);

impl Rank {
    /// All ranks in display order.
    pub const ALL: [Rank; RANK_COUNT] = [Rank(0), Rank(1), Rank(2), Rank(3), Rank(4)];

    /// Create a rank from a zero-based index in `[0, 5)`.
    pub fn new(index: usize) -> Result<Self, StoreError> {
        if index < RANK_COUNT {
            Ok(Self(index as u8))
        } else {
            Err(StoreError::invalid_input(format!(
                "rank index {index} is outside [0, {RANK_COUNT})"
            )))
        }
    }

    /// Create a rank from its one-based display number (`1` for `1等`).
    pub fn from_number(number: usize) -> Result<Self, StoreError> {
        match number.checked_sub(1) {
            Some(index) if index < RANK_COUNT => Ok(Self(index as u8)),
            _ => Err(StoreError::invalid_input(format!(
                "rank number {number} is outside [1, {RANK_COUNT}]"
            ))),
        }
    }

    /// Zero-based index.
    pub fn index(self) -> usize {
        usize::from(self.0)
    }

    /// One-based display number.
    pub fn number(self) -> usize {
        self.index() + 1
    }

    /// Display label, e.g. `3等`.
    pub fn label(self) -> String {
        format!("{}等", self.number())
    }
}

impl fmt::Display for Rank {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}等", self.number())
    }
}

impl TryFrom<u8> for Rank {
    type Error = StoreError;

    fn try_from(index: u8) -> Result<Self, Self::Error> {
        Self::new(usize::from(index))
    }
}

impl From<Rank> for u8 {
    fn from(rank: Rank) -> Self {
        rank.0
    }
}

// =============================================================================
// CounterVector
// =============================================================================

/// Remaining count per rank.
///
/// Exactly five unsigned counts, so length and non-negativity cannot be
/// violated by construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CounterVector([u32; RANK_COUNT]);

impl CounterVector {
    /// Create a vector from explicit counts.
    pub const fn new(counts: [u32; RANK_COUNT]) -> Self {
        Self(counts)
    }

    /// All-zero vector.
    pub const fn zero() -> Self {
        Self([0; RANK_COUNT])
    }

    /// Validate untyped input: exactly five elements, each in `[0, u32::MAX]`.
    pub fn try_from_slice(values: &[i64]) -> Result<Self, StoreError> {
        if values.len() != RANK_COUNT {
            return Err(StoreError::invalid_input(format!(
                "expected {RANK_COUNT} counts, got {}",
                values.len()
            )));
        }

        let mut counts = [0u32; RANK_COUNT];
        for (slot, (rank, value)) in counts.iter_mut().zip(Rank::ALL.iter().zip(values)) {
            *slot = u32::try_from(*value).map_err(|_| {
                StoreError::invalid_input(format!("count for {rank} must be non-negative, got {value}"))
            })?;
        }
        Ok(Self(counts))
    }

    /// Parse the five text fields of the inventory setup form.
    ///
    /// A blank field counts as zero; anything else must be a non-negative
    /// integer.
    pub fn parse_inputs<S: AsRef<str>>(inputs: &[S]) -> Result<Self, StoreError> {
        if inputs.len() != RANK_COUNT {
            return Err(StoreError::invalid_input(format!(
                "expected {RANK_COUNT} fields, got {}",
                inputs.len()
            )));
        }

        let mut counts = [0u32; RANK_COUNT];
        for (slot, (rank, raw)) in counts.iter_mut().zip(Rank::ALL.iter().zip(inputs)) {
            let raw = raw.as_ref().trim();
            if raw.is_empty() {
                continue;
            }
            *slot = raw.parse::<u32>().map_err(|_| {
                StoreError::invalid_input(format!(
                    "count for {rank} must be a non-negative integer, got {raw:?}"
                ))
            })?;
        }
        Ok(Self(counts))
    }

    /// Count for one rank.
    pub fn get(&self, rank: Rank) -> u32 {
        self.0[rank.index()]
    }

    /// Counts in rank order.
    pub fn as_array(&self) -> &[u32; RANK_COUNT] {
        &self.0
    }

    /// `(rank, count)` pairs in rank order.
    pub fn iter(&self) -> impl Iterator<Item = (Rank, u32)> + '_ {
        Rank::ALL.iter().map(move |rank| (*rank, self.get(*rank)))
    }

    /// Sum of all counts.
    pub fn total(&self) -> u64 {
        self.0.iter().map(|count| u64::from(*count)).sum()
    }

    /// Whether every rank is exhausted.
    pub fn is_zero(&self) -> bool {
        self.0.iter().all(|count| *count == 0)
    }

    /// Copy with one rank decremented, or `None` if that rank is exhausted.
    pub fn decremented(&self, rank: Rank) -> Option<Self> {
        let mut next = self.0;
        next[rank.index()] = next[rank.index()].checked_sub(1)?;
        Some(Self(next))
    }
}

impl From<[u32; RANK_COUNT]> for CounterVector {
    fn from(counts: [u32; RANK_COUNT]) -> Self {
        Self(counts)
    }
}

impl fmt::Display for CounterVector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d, e] = self.0;
        write!(f, "[{a}, {b}, {c}, {d}, {e}]")
    }
}

// =============================================================================
// Version
// =============================================================================

/// Commit counter assigned by the backing store to each write of the document.
///
/// Strictly increasing per document; observers use it to discard stale
/// notifications and writers use it as the conditional-write precondition.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Version(u64);

impl Version {
    /// Version of a freshly created document.
    pub const FIRST: Version = Version(1);

    /// Wrap a raw commit counter.
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    /// Raw commit counter.
    pub const fn value(self) -> u64 {
        self.0
    }

    /// Version assigned to the next commit.
    pub const fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.0)
    }
}
