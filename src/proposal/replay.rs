use super::{ProposalSource, SourceSignature};
use crate::template::Point;
use fastrand::Rng;

/// Replays a pre-recorded list of points once, then reports exhaustion.
#[derive(Debug, Clone, Default)]
pub struct ReplaySource {
    points: Vec<Point>,
    cursor: usize,
}

impl ReplaySource {
    pub fn new(points: Vec<Point>) -> Self {
        Self { points, cursor: 0 }
    }

    pub fn remaining(&self) -> usize {
        self.points.len().saturating_sub(self.cursor)
    }
}

impl ProposalSource for ReplaySource {
    fn next_proposal(&mut self, _rng: &mut Rng) -> Option<Point> {
        let p = self.points.get(self.cursor).copied()?;
        self.cursor += 1;
        Some(p)
    }

    fn resume_at(&mut self, drawn: u64) {
        self.cursor = (drawn as usize).min(self.points.len());
    }

    fn signature(&self) -> Option<SourceSignature> {
        Some(SourceSignature::Replay {
            len: self.points.len(),
        })
    }
}
