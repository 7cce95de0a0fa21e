use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::state::media::Side;

/// A configured pairing of two teams.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Match {
    /// Team playing on the blue side.
    pub blue_team: String,
    /// Team playing on the orange side.
    pub orange_team: String,
}

impl Match {
    /// Build a match from two team names.
    pub fn new(blue_team: impl Into<String>, orange_team: impl Into<String>) -> Self {
        Self {
            blue_team: blue_team.into(),
            orange_team: orange_team.into(),
        }
    }

    /// Team name playing on `side`.
    pub fn team(&self, side: Side) -> &str {
        match side {
            Side::Blue => &self.blue_team,
            Side::Orange => &self.orange_team,
        }
    }
}

/// Errors raised by [`MatchRegistry`] lookups and updates.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    /// The registry holds no match.
    #[error("no current match configured")]
    NoCurrentMatch,
    /// The requested index is outside `[0, len)`.
    #[error("Invalid 'match_index'. Must be between 0 and {}", .len.saturating_sub(1))]
    InvalidMatchIndex {
        /// Requested index.
        index: i64,
        /// Number of configured matches.
        len: usize,
    },
}

/// Read-only view of one registry entry with its position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchEntry {
    /// Zero-based position inside the registry.
    pub index: usize,
    /// Configured pairing.
    pub pairing: Match,
}

impl MatchEntry {
    /// Human-facing sequence number (1-based).
    pub fn number(&self) -> usize {
        self.index + 1
    }
}

/// Ordered matches plus the pointer to the one currently played.
///
/// The current index always points to a valid element unless the registry is
/// empty, in which case every lookup fails with [`RegistryError::NoCurrentMatch`].
#[derive(Debug, Clone, Default)]
pub struct MatchRegistry {
    matches: Vec<Match>,
    current: usize,
}

impl MatchRegistry {
    /// Seed the registry; an out-of-range `current` is clamped to the first match.
    pub fn new(matches: Vec<Match>, current: usize) -> Self {
        let current = if current < matches.len() { current } else { 0 };
        Self { matches, current }
    }

    /// Number of configured matches.
    pub fn len(&self) -> usize {
        self.matches.len()
    }

    /// Whether the registry holds no match.
    pub fn is_empty(&self) -> bool {
        self.matches.is_empty()
    }

    /// The current match.
    pub fn current(&self) -> Result<MatchEntry, RegistryError> {
        self.matches
            .get(self.current)
            .map(|pairing| MatchEntry {
                index: self.current,
                pairing: pairing.clone(),
            })
            .ok_or(RegistryError::NoCurrentMatch)
    }

    /// Index of the current match, `None` when the registry is empty.
    pub fn current_index(&self) -> Option<usize> {
        (!self.matches.is_empty()).then_some(self.current)
    }

    /// Select another match. Leaves the current index untouched on error.
    pub fn set_current(&mut self, index: i64) -> Result<MatchEntry, RegistryError> {
        let invalid = RegistryError::InvalidMatchIndex {
            index,
            len: self.matches.len(),
        };
        let position = usize::try_from(index).map_err(|_| invalid.clone())?;
        let pairing = self.matches.get(position).cloned().ok_or(invalid)?;
        self.current = position;
        Ok(MatchEntry {
            index: position,
            pairing,
        })
    }

    /// Whether `index` designates the last configured match (the final).
    pub fn is_final(&self, index: usize) -> bool {
        index + 1 == self.matches.len()
    }

    /// Every match with its position.
    pub fn entries(&self) -> Vec<MatchEntry> {
        self.matches
            .iter()
            .enumerate()
            .map(|(index, pairing)| MatchEntry {
                index,
                pairing: pairing.clone(),
            })
            .collect()
    }
}
