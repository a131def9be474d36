use super::ScoringOracle;
use crate::chirp::ChirpTimes;
use crate::config::OracleParams;
use crate::error::EvaluationFailure;
use crate::template::Point;
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumIter, EnumString};

/// Which chirp-time coordinates enter the metric.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, EnumIter, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Approximant {
    /// Leading-order phasing: only tau0 separates templates.
    Newtonian,
    /// tau0 and the spin-corrected tau3.
    #[strum(serialize = "chirp_times")]
    #[serde(rename = "chirp_times")]
    ChirpTimes,
}

/// Analytic stand-in for a waveform overlap: a flat metric on chirp-time
/// coordinates, `match = exp(-d^2 / 2)`.
#[derive(Debug, Clone)]
pub struct ChirpMetricOracle {
    pub f_low: f64,
    pub approximant: Approximant,
    pub tau0_scale: f64,
    pub tau3_scale: f64,
}

impl ChirpMetricOracle {
    pub fn new(f_low: f64, params: &OracleParams) -> Self {
        Self {
            f_low,
            approximant: params.approximant,
            tau0_scale: params.tau0_scale,
            tau3_scale: params.tau3_scale,
        }
    }
}

impl ScoringOracle for ChirpMetricOracle {
    type Prepared = ChirpTimes;

    fn prepare(&self, point: &Point) -> Result<ChirpTimes, EvaluationFailure> {
        ChirpTimes::compute(point, self.f_low).ok_or_else(|| {
            EvaluationFailure::Unphysical(format!(
                "m1={:.4} m2={:.4} s1z={:.3} s2z={:.3}",
                point.mass1, point.mass2, point.spin1z, point.spin2z
            ))
        })
    }

    fn score(&self, a: &ChirpTimes, b: &ChirpTimes) -> Result<f64, EvaluationFailure> {
        let d0 = (a.tau0 - b.tau0) / self.tau0_scale;
        let mut d2 = d0 * d0;
        if self.approximant == Approximant::ChirpTimes {
            let d3 = (a.tau3 - b.tau3) / self.tau3_scale;
            d2 += d3 * d3;
        }

        let m = (-0.5 * d2).exp();
        if m.is_finite() {
            Ok(m)
        } else {
            Err(EvaluationFailure::Degenerate(format!(
                "non-finite metric distance {}",
                d2
            )))
        }
    }
}
