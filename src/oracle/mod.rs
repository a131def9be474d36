pub mod metric;

pub use self::metric::{Approximant, ChirpMetricOracle};

use crate::error::EvaluationFailure;
use crate::index::NeighborhoodIndex;
use crate::template::{Point, Template};
use rayon::prelude::*;

/// The expensive similarity function the placement loop tries to call as
/// rarely as possible.
///
/// `prepare` builds the oracle's intermediate representation of a point
/// (the part worth caching); `score` compares two prepared points and
/// returns a match in `[0, 1]`. Any configuration the oracle needs (cutoff
/// frequencies, approximation mode) lives inside the oracle value.
pub trait ScoringOracle: Sync {
    type Prepared: Send + Sync;

    fn prepare(&self, point: &Point) -> Result<Self::Prepared, EvaluationFailure>;

    fn score(&self, a: &Self::Prepared, b: &Self::Prepared) -> Result<f64, EvaluationFailure>;
}

/// Result of a coverage check against the neighborhood of a candidate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Coverage {
    /// Highest match found, 0.0 when there were no neighbors.
    pub best_match: f64,
    /// Bank position of the neighbor achieving `best_match`.
    pub best_neighbor: Option<usize>,
    /// Number of neighbors scored.
    pub neighbors: usize,
}

impl Coverage {
    pub fn none() -> Self {
        Self {
            best_match: 0.0,
            best_neighbor: None,
            neighbors: 0,
        }
    }

    /// A candidate is covered when some neighbor matches at or above `match_min`.
    #[inline(always)]
    pub fn is_covered(&self, match_min: f64) -> bool {
        self.best_neighbor.is_some() && self.best_match >= match_min
    }
}

fn checked_score<O: ScoringOracle>(
    oracle: &O,
    candidate: &O::Prepared,
    neighbor: &Template<O::Prepared>,
) -> Result<f64, EvaluationFailure> {
    let value = match neighbor.cache() {
        Some(prepared) => oracle.score(candidate, prepared)?,
        None => {
            let transient = oracle.prepare(&neighbor.point)?;
            oracle.score(candidate, &transient)?
        }
    };

    if !(0.0..=1.0).contains(&value) {
        return Err(EvaluationFailure::Degenerate(format!(
            "match {} outside [0, 1]",
            value
        )));
    }
    Ok(value)
}

/// Scores `candidate` against every bank entry whose key lies within
/// `window` of `key` and reports the best match.
///
/// All neighbors are scored. Ties on the maximum go to the lowest bank
/// position, so the rayon path (taken when the neighborhood has at least
/// `parallel_threshold` entries, 0 disables it) gives the same answer as
/// the sequential one.
pub fn covers<O: ScoringOracle>(
    oracle: &O,
    candidate: &O::Prepared,
    bank: &NeighborhoodIndex<Template<O::Prepared>>,
    key: f64,
    window: f64,
    parallel_threshold: usize,
) -> Result<Coverage, EvaluationFailure> {
    let range = bank.range(key, window);
    if range.is_empty() {
        return Ok(Coverage::none());
    }

    let offset = range.start;
    let neighbors = &bank.items()[range];

    let scores: Vec<f64> = if parallel_threshold > 0 && neighbors.len() >= parallel_threshold {
        neighbors
            .par_iter()
            .map(|t| checked_score(oracle, candidate, t))
            .collect::<Result<Vec<_>, _>>()?
    } else {
        neighbors
            .iter()
            .map(|t| checked_score(oracle, candidate, t))
            .collect::<Result<Vec<_>, _>>()?
    };

    let mut best = Coverage {
        best_match: f64::NEG_INFINITY,
        best_neighbor: None,
        neighbors: scores.len(),
    };
    for (i, &s) in scores.iter().enumerate() {
        if s > best.best_match {
            best.best_match = s;
            best.best_neighbor = Some(offset + i);
        }
    }
    Ok(best)
}
