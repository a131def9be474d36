use crate::consts::MTSUN_SI;
use crate::template::Point;
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use strum_macros::{Display, EnumIter, EnumString};

/// Post-Newtonian chirp times of a point at a given low-frequency cutoff, in seconds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChirpTimes {
    pub tau0: f64,
    pub tau2: f64,
    /// 1.5PN chirp time including the aligned-spin spin-orbit correction.
    pub tau3: f64,
}

impl ChirpTimes {
    /// Returns `None` for unphysical input (non-positive masses, |spin| > 1,
    /// non-positive cutoff) or when any chirp time is not finite.
    pub fn compute(point: &Point, f_low: f64) -> Option<Self> {
        if !point.is_finite() || point.mass1 <= 0.0 || point.mass2 <= 0.0 || f_low <= 0.0 {
            return None;
        }
        if point.spin1z.abs() > 1.0 || point.spin2z.abs() > 1.0 {
            return None;
        }

        let m_total = point.total_mass();
        let eta = point.eta();
        let m_sec = m_total * MTSUN_SI;
        let v = (PI * m_sec * f_low).cbrt();

        let tau0 = 5.0 / (256.0 * eta) * m_sec / v.powi(8);
        let tau2 = 5.0 / (192.0 * eta) * m_sec / v.powi(6) * (743.0 / 336.0 + 11.0 / 4.0 * eta);
        let tau3_ns = PI / (8.0 * eta) * m_sec / v.powi(5);
        let tau3 = tau3_ns * (1.0 - spin_orbit_beta(point) / (4.0 * PI));

        let times = Self { tau0, tau2, tau3 };
        if times.tau0.is_finite() && times.tau2.is_finite() && times.tau3.is_finite() {
            Some(times)
        } else {
            None
        }
    }

    /// Inspiral duration estimate to 1.5PN order.
    #[inline(always)]
    pub fn duration(&self) -> f64 {
        self.tau0 + self.tau2 - self.tau3
    }
}

/// 1.5PN spin-orbit coupling for aligned spins.
fn spin_orbit_beta(point: &Point) -> f64 {
    let m = point.total_mass();
    let eta = point.eta();
    let term = |mass: f64, chi: f64| {
        let x = mass / m;
        chi * (113.0 * x * x + 75.0 * eta)
    };
    (term(point.mass1, point.spin1z) + term(point.mass2, point.spin2z)) / 12.0
}

/// Scalar projection used to order the bank and define neighborhoods.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, EnumIter, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum SortKey {
    #[strum(serialize = "tau0")]
    #[serde(rename = "tau0")]
    Tau0,
    #[strum(serialize = "tau3")]
    #[serde(rename = "tau3")]
    Tau3,
    Duration,
}

impl SortKey {
    pub fn project(&self, point: &Point, f_low: f64) -> Option<f64> {
        let times = ChirpTimes::compute(point, f_low)?;
        Some(self.select(&times))
    }

    #[inline(always)]
    pub fn select(&self, times: &ChirpTimes) -> f64 {
        match self {
            Self::Tau0 => times.tau0,
            Self::Tau3 => times.tau3,
            Self::Duration => times.duration(),
        }
    }
}
