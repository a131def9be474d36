use crate::consts::{CONVERGENCE_WINDOW_LEN, CONVERGENCE_WINDOW_SEED};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Smoothed rejection run-length statistic that decides when placement stops.
///
/// `k` counts proposals since the last acceptance (including the one being
/// evaluated). Each acceptance pushes the completed run length into a
/// fixed-size window and resets `k`.
#[derive(Debug, Clone, PartialEq)]
pub struct ConvergenceTracker {
    k: usize,
    window: VecDeque<usize>,
}

/// Serializable view of the tracker, stored in checkpoints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConvergenceState {
    pub k: usize,
    pub window: Vec<usize>,
}

impl Default for ConvergenceTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl ConvergenceTracker {
    pub fn new() -> Self {
        Self {
            k: 0,
            window: std::iter::repeat(CONVERGENCE_WINDOW_SEED)
                .take(CONVERGENCE_WINDOW_LEN)
                .collect(),
        }
    }

    pub fn from_state(state: &ConvergenceState) -> Option<Self> {
        if state.window.len() != CONVERGENCE_WINDOW_LEN {
            return None;
        }
        Some(Self {
            k: state.k,
            window: state.window.iter().copied().collect(),
        })
    }

    pub fn state(&self) -> ConvergenceState {
        ConvergenceState {
            k: self.k,
            window: self.window.iter().copied().collect(),
        }
    }

    #[inline(always)]
    pub fn k(&self) -> usize {
        self.k
    }

    /// `(k + sum(window)) / len(window)`
    pub fn smoothed_run_length(&self) -> f64 {
        let sum: usize = self.window.iter().sum();
        (self.k + sum) as f64 / self.window.len() as f64
    }

    pub fn is_converged(&self, threshold: f64) -> bool {
        self.smoothed_run_length() >= threshold
    }

    /// A proposal is about to be evaluated.
    #[inline(always)]
    pub fn record_proposal(&mut self) {
        self.k += 1;
    }

    /// Undo the count for a proposal that should not advance the run.
    pub fn forget_proposal(&mut self) {
        self.k = self.k.saturating_sub(1);
    }

    /// Commit the current run length and start a new run.
    pub fn record_acceptance(&mut self) {
        if self.window.len() == CONVERGENCE_WINDOW_LEN {
            self.window.pop_front();
        }
        self.window.push_back(self.k);
        self.k = 0;
    }
}
