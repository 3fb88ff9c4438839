//! Ordered score indices for range queries
//!
//! Each parameter type owns a [`ParameterIndex`] mapping scores to the set of
//! players advertising them. Indices are created lazily by the
//! [`IndexRegistry`] the first time a player declares a value on an axis.

use crate::error::{MatchmakingError, Result};
use crate::types::{ParameterOperator, ParameterType, PlayerId};
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::ops::Bound;

/// Totally ordered wrapper around a declared score
#[derive(Debug, Clone, Copy)]
pub struct Score(f64);

impl Score {
    pub fn new(value: f64) -> Self {
        // -0.0 and 0.0 must land on the same level
        if value == 0.0 {
            Self(0.0)
        } else {
            Self(value)
        }
    }

    pub fn value(self) -> f64 {
        self.0
    }
}

impl PartialEq for Score {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Score {}

impl PartialOrd for Score {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Score {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0)
    }
}

/// Score index for a single parameter type
#[derive(Debug, Clone, Default)]
pub struct ParameterIndex {
    /// Players grouped by score, ascending
    levels: BTreeMap<Score, BTreeSet<PlayerId>>,
    /// Reverse lookup so removal does not need the score
    scores: HashMap<PlayerId, Score>,
}

impl ParameterIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Advertise a score for a player, replacing any previous one
    pub fn insert(&mut self, player_id: &str, value: f64) {
        self.remove(player_id);

        let score = Score::new(value);
        self.levels
            .entry(score)
            .or_default()
            .insert(player_id.to_string());
        self.scores.insert(player_id.to_string(), score);
    }

    /// Remove a player from the index. Returns true if an entry was removed.
    pub fn remove(&mut self, player_id: &str) -> bool {
        let Some(score) = self.scores.remove(player_id) else {
            return false;
        };

        if let Some(level) = self.levels.get_mut(&score) {
            level.remove(player_id);
            if level.is_empty() {
                self.levels.remove(&score);
            }
        }
        true
    }

    pub fn contains(&self, player_id: &str) -> bool {
        self.scores.contains_key(player_id)
    }

    pub fn score_of(&self, player_id: &str) -> Option<f64> {
        self.scores.get(player_id).map(|s| s.value())
    }

    pub fn len(&self) -> usize {
        self.scores.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scores.is_empty()
    }

    /// Up to `limit` players satisfying `operator` against `value`.
    ///
    /// `=` returns the players at that exact score, `>` walks scores upward
    /// from just above `value`, and `<` walks downward from just below it, so
    /// the closest scores come first. Ties are returned in player id order.
    pub fn range_query(
        &self,
        operator: ParameterOperator,
        value: f64,
        limit: usize,
    ) -> Result<Vec<PlayerId>> {
        let pivot = Score::new(value);

        let players = match operator {
            ParameterOperator::Equal => self
                .levels
                .get(&pivot)
                .into_iter()
                .flatten()
                .take(limit)
                .cloned()
                .collect(),
            ParameterOperator::GreaterThan => self
                .levels
                .range((Bound::Excluded(pivot), Bound::Unbounded))
                .flat_map(|(_, level)| level.iter())
                .take(limit)
                .cloned()
                .collect(),
            ParameterOperator::SmallerThan => self
                .levels
                .range(..pivot)
                .rev()
                .flat_map(|(_, level)| level.iter())
                .take(limit)
                .cloned()
                .collect(),
            ParameterOperator::NotEqual => {
                return Err(MatchmakingError::UnsupportedOperator {
                    operator: operator.to_string(),
                }
                .into())
            }
        };

        Ok(players)
    }
}

/// Lazily populated set of named parameter indices
#[derive(Debug, Clone, Default)]
pub struct IndexRegistry {
    indices: HashMap<ParameterType, ParameterIndex>,
}

impl IndexRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the index for a type, opening it on first use
    pub fn index_mut(&mut self, parameter_type: &str) -> &mut ParameterIndex {
        self.indices
            .entry(parameter_type.to_string())
            .or_default()
    }

    pub fn get(&self, parameter_type: &str) -> Option<&ParameterIndex> {
        self.indices.get(parameter_type)
    }

    /// Remove a player from one index. Returns true if an entry was removed.
    pub fn remove(&mut self, parameter_type: &str, player_id: &str) -> bool {
        self.indices
            .get_mut(parameter_type)
            .map(|index| index.remove(player_id))
            .unwrap_or(false)
    }

    /// Remove a player from every index. Returns the number of entries removed.
    pub fn remove_everywhere(&mut self, player_id: &str) -> usize {
        self.indices
            .values_mut()
            .map(|index| index.remove(player_id))
            .filter(|removed| *removed)
            .count()
    }

    /// Range query against a named index; unknown types have no members
    pub fn range_query(
        &self,
        parameter_type: &str,
        operator: ParameterOperator,
        value: f64,
        limit: usize,
    ) -> Result<Vec<PlayerId>> {
        if !operator.is_range_queryable() {
            return Err(MatchmakingError::UnsupportedOperator {
                operator: operator.to_string(),
            }
            .into());
        }

        match self.indices.get(parameter_type) {
            Some(index) => index.range_query(operator, value, limit),
            None => Ok(Vec::new()),
        }
    }

    pub fn types(&self) -> impl Iterator<Item = &str> {
        self.indices.keys().map(|k| k.as_str())
    }
}
