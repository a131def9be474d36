use super::{ProposalSource, SourceSignature};
use crate::config::SamplerParams;
use crate::template::Point;
use fastrand::Rng;

/// Draws component masses and aligned spins uniformly inside a box.
/// Points are ordered so that `mass1 >= mass2`.
#[derive(Debug, Clone)]
pub struct UniformSampler {
    params: SamplerParams,
}

impl UniformSampler {
    pub fn new(params: SamplerParams) -> Self {
        Self { params }
    }
}

#[inline(always)]
fn uniform(rng: &mut Rng, lo: f64, hi: f64) -> f64 {
    lo + (hi - lo) * rng.f64()
}

impl ProposalSource for UniformSampler {
    fn next_proposal(&mut self, rng: &mut Rng) -> Option<Point> {
        let p = &self.params;
        let m1 = uniform(rng, p.mass1_min, p.mass1_max);
        let m2 = uniform(rng, p.mass2_min, p.mass2_max);
        let s1 = uniform(rng, p.spin_min, p.spin_max);
        let s2 = uniform(rng, p.spin_min, p.spin_max);

        if m1 >= m2 {
            Some(Point::new(m1, m2, s1, s2))
        } else {
            Some(Point::new(m2, m1, s2, s1))
        }
    }

    fn signature(&self) -> Option<SourceSignature> {
        Some(SourceSignature::Uniform(self.params.clone()))
    }
}
