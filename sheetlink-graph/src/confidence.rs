// Confidence aggregation and per-level visibility filtering.

use serde::{Deserialize, Serialize};

use crate::model::ConfidenceLevel;
use crate::transform::GraphEdge;

/// Edge totals per confidence bucket.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfidenceCounts {
    #[serde(rename = "HIGH")]
    pub high: usize,
    #[serde(rename = "MEDIUM")]
    pub medium: usize,
    #[serde(rename = "LOW")]
    pub low: usize,
}

impl ConfidenceCounts {
    pub fn get(&self, level: ConfidenceLevel) -> usize {
        match level {
            ConfidenceLevel::High => self.high,
            ConfidenceLevel::Medium => self.medium,
            ConfidenceLevel::Low => self.low,
        }
    }

    fn bump(&mut self, level: ConfidenceLevel) {
        match level {
            ConfidenceLevel::High => self.high += 1,
            ConfidenceLevel::Medium => self.medium += 1,
            ConfidenceLevel::Low => self.low += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.high + self.medium + self.low
    }
}

/// Count edges per confidence level. Every edge lands in exactly one bucket.
pub fn count_by_confidence(edges: &[GraphEdge]) -> ConfidenceCounts {
    edges.iter().fold(ConfidenceCounts::default(), |mut acc, edge| {
        acc.bump(edge.confidence_level);
        acc
    })
}

/// Visibility and fixed edge count for one level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LevelFilter {
    pub visible: bool,
    pub count: usize,
}

/// Per-level visibility toggles.
///
/// Counts are fixed when the filter is built; only visibility changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfidenceFilter {
    levels: [LevelFilter; 3],
}

impl Default for ConfidenceFilter {
    fn default() -> Self {
        Self::all_visible(ConfidenceCounts::default())
    }
}

impl ConfidenceFilter {
    /// Initial state after a result loads: every level visible.
    pub fn all_visible(counts: ConfidenceCounts) -> Self {
        let level = |l| LevelFilter {
            visible: true,
            count: counts.get(l),
        };
        Self {
            levels: [
                level(ConfidenceLevel::High),
                level(ConfidenceLevel::Medium),
                level(ConfidenceLevel::Low),
            ],
        }
    }

    pub fn level(&self, level: ConfidenceLevel) -> LevelFilter {
        self.levels[level.index()]
    }

    pub fn is_visible(&self, level: ConfidenceLevel) -> bool {
        self.levels[level.index()].visible
    }

    /// Flip visibility of one level; the others are untouched.
    pub fn toggle(&mut self, level: ConfidenceLevel) {
        let entry = &mut self.levels[level.index()];
        entry.visible = !entry.visible;
    }

    pub fn set_visible(&mut self, level: ConfidenceLevel, visible: bool) {
        self.levels[level.index()].visible = visible;
    }

    /// Visible levels in HIGH, MEDIUM, LOW order.
    pub fn visible_levels(&self) -> Vec<ConfidenceLevel> {
        ConfidenceLevel::ALL
            .into_iter()
            .filter(|l| self.is_visible(*l))
            .collect()
    }

    /// Sum of the fixed per-level counts.
    pub fn total(&self) -> usize {
        self.levels.iter().map(|l| l.count).sum()
    }

    /// Indices into `edges` whose level is currently visible, in edge order.
    ///
    /// Always computed from the full edge set.
    pub fn visible_indices(&self, edges: &[GraphEdge]) -> Vec<usize> {
        edges
            .iter()
            .enumerate()
            .filter(|(_, e)| self.is_visible(e.confidence_level))
            .map(|(i, _)| i)
            .collect()
    }
}
