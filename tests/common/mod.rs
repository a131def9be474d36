#![allow(dead_code)]

use bankforge::chirp::ChirpTimes;
use bankforge::config::PlacementParams;
use bankforge::error::EvaluationFailure;
use bankforge::oracle::ScoringOracle;
use bankforge::template::Point;
use fastrand::Rng;
use std::sync::atomic::{AtomicUsize, Ordering};

pub const F_LOW: f64 = 30.0;

/// One-dimensional oracle on tau0: `match = max(0, 1 - |d tau0| / spread)`.
/// Two points are within `spread * (1 - match_min)` seconds of tau0 exactly
/// when one covers the other.
pub struct LineOracle {
    pub spread: f64,
    pub prepared: AtomicUsize,
}

impl LineOracle {
    pub fn new(spread: f64) -> Self {
        Self {
            spread,
            prepared: AtomicUsize::new(0),
        }
    }

    pub fn tau0(point: &Point) -> f64 {
        ChirpTimes::compute(point, F_LOW).map(|t| t.tau0).unwrap_or(f64::NAN)
    }

    pub fn match_between(&self, a: &Point, b: &Point) -> f64 {
        (1.0 - (Self::tau0(a) - Self::tau0(b)).abs() / self.spread).max(0.0)
    }

    pub fn prepare_calls(&self) -> usize {
        self.prepared.load(Ordering::Relaxed)
    }
}

impl ScoringOracle for LineOracle {
    type Prepared = f64;

    fn prepare(&self, point: &Point) -> Result<f64, EvaluationFailure> {
        self.prepared.fetch_add(1, Ordering::Relaxed);
        ChirpTimes::compute(point, F_LOW)
            .map(|t| t.tau0)
            .ok_or_else(|| EvaluationFailure::Unphysical(format!("{:?}", point)))
    }

    fn score(&self, a: &f64, b: &f64) -> Result<f64, EvaluationFailure> {
        Ok((1.0 - (a - b).abs() / self.spread).max(0.0))
    }
}

/// Every neighbor is a perfect match.
pub struct AlwaysCovered;

impl ScoringOracle for AlwaysCovered {
    type Prepared = ();

    fn prepare(&self, _point: &Point) -> Result<(), EvaluationFailure> {
        Ok(())
    }

    fn score(&self, _a: &(), _b: &()) -> Result<f64, EvaluationFailure> {
        Ok(1.0)
    }
}

/// Fails to prepare any point with `mass1` above `limit`.
pub struct FailingOracle {
    pub limit: f64,
}

impl ScoringOracle for FailingOracle {
    type Prepared = f64;

    fn prepare(&self, point: &Point) -> Result<f64, EvaluationFailure> {
        if point.mass1 > self.limit {
            Err(EvaluationFailure::Unphysical(format!(
                "mass1 {} above {}",
                point.mass1, self.limit
            )))
        } else {
            Ok(LineOracle::tau0(point))
        }
    }

    fn score(&self, a: &f64, b: &f64) -> Result<f64, EvaluationFailure> {
        Ok((1.0 - (a - b).abs() / 10.0).max(0.0))
    }
}

/// Returns a match outside [0, 1] for any pair.
pub struct BrokenOracle;

impl ScoringOracle for BrokenOracle {
    type Prepared = ();

    fn prepare(&self, _point: &Point) -> Result<(), EvaluationFailure> {
        Ok(())
    }

    fn score(&self, _a: &(), _b: &()) -> Result<f64, EvaluationFailure> {
        Ok(1.5)
    }
}

pub fn params(seed: u64) -> PlacementParams {
    PlacementParams {
        match_min: 0.9,
        convergence_threshold: 10.0,
        neighborhood_size: 5.0,
        f_low: F_LOW,
        seed: Some(seed),
        ..Default::default()
    }
}

/// Equal-mass binaries with total mass drawn uniformly in [2, 6].
pub fn equal_mass_source(rng: &mut Rng) -> Option<Point> {
    let m = 1.0 + 2.0 * rng.f64();
    Some(Point::non_spinning(m, m))
}

/// `n` equal-mass points spaced evenly in component mass from 1 to 3.
pub fn mass_ladder(n: usize) -> Vec<Point> {
    (0..n)
        .map(|i| {
            let m = 1.0 + 2.0 * i as f64 / (n.max(2) - 1) as f64;
            Point::non_spinning(m, m)
        })
        .collect()
}
