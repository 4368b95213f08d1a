//! Fixed-capacity measurement window.

use std::collections::VecDeque;

use serde::Serialize;

use crate::error::{Error, Result};

/// Entries reserved up front; larger windows grow on demand
const PREALLOCATED_ENTRIES: usize = 64;

/// Most recent `(round index, value)` pairs of the dependent variable.
///
/// Holds at most `capacity` entries; pushing into a full window evicts the
/// oldest entry. Round indices must increase by exactly one per push.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SlidingWindow {
    capacity: usize,
    entries: VecDeque<(usize, f64)>,
}

impl SlidingWindow {
    /// Create an empty window
    pub fn new(capacity: usize) -> Result<Self> {
        if capacity == 0 {
            return Err(Error::InvalidConfig(
                "window capacity must be positive".to_string(),
            ));
        }
        Ok(Self {
            capacity,
            entries: VecDeque::with_capacity(capacity.min(PREALLOCATED_ENTRIES) + 1),
        })
    }

    /// Build a window from consecutive values starting at `first_round`
    pub fn from_values(first_round: usize, values: &[f64]) -> Result<Self> {
        let mut window = Self::new(values.len().max(1))?;
        for (offset, &value) in values.iter().enumerate() {
            let round = first_round.checked_add(offset).ok_or_else(|| {
                Error::InvalidConfig(format!(
                    "{} values starting at round {} overflow the round index",
                    values.len(),
                    first_round
                ))
            })?;
            window.push(round, value)?;
        }
        Ok(window)
    }

    /// Insert a value, returning the evicted entry if the window was full
    pub fn push(&mut self, round: usize, value: f64) -> Result<Option<(usize, f64)>> {
        if let Some(&(last, _)) = self.entries.back() {
            let expected = last.checked_add(1).ok_or_else(|| {
                Error::InvalidConfig(format!("no round can follow round {last}"))
            })?;
            if round != expected {
                return Err(Error::NonContiguousRound {
                    expected,
                    actual: round,
                });
            }
        }

        self.entries.push_back((round, value));
        if self.entries.len() > self.capacity {
            Ok(self.entries.pop_front())
        } else {
            Ok(None)
        }
    }

    /// Configured capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Current number of entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the window has no entries
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Whether the window holds `capacity` entries
    pub fn is_full(&self) -> bool {
        self.entries.len() == self.capacity
    }

    /// Round indices, oldest first
    pub fn rounds(&self) -> Vec<usize> {
        self.entries.iter().map(|&(r, _)| r).collect()
    }

    /// Values, oldest first
    pub fn values(&self) -> Vec<f64> {
        self.entries.iter().map(|&(_, v)| v).collect()
    }

    /// Iterate entries, oldest first
    pub fn iter(&self) -> impl Iterator<Item = (usize, f64)> + '_ {
        self.entries.iter().copied()
    }
}
