pub mod replay;
pub mod sampler;

pub use self::replay::ReplaySource;
pub use self::sampler::UniformSampler;

use crate::config::SamplerParams;
use crate::template::Point;
use fastrand::Rng;
use serde::{Deserialize, Serialize};

/// Identifies the stream a source produces, so a resumed run can refuse a
/// source that would draw different points from the same generator state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceSignature {
    Uniform(SamplerParams),
    Replay { len: usize },
}

/// A lazy, possibly unbounded stream of candidate points.
///
/// The engine owns the random generator and lends it to the source for each
/// draw, so the generator state captured in a checkpoint fully determines
/// what a random source produces next.
pub trait ProposalSource {
    /// Next candidate, or `None` once a finite source is exhausted.
    fn next_proposal(&mut self, rng: &mut Rng) -> Option<Point>;

    /// Reposition after a resume, given how many proposals were already drawn.
    /// Random sources ignore this; their position lives in the generator.
    fn resume_at(&mut self, _drawn: u64) {}

    /// `None` for sources that cannot describe themselves; those are never
    /// checked on resume.
    fn signature(&self) -> Option<SourceSignature> {
        None
    }
}

impl<F> ProposalSource for F
where
    F: FnMut(&mut Rng) -> Option<Point>,
{
    fn next_proposal(&mut self, rng: &mut Rng) -> Option<Point> {
        self(rng)
    }
}
