use serde::{Deserialize, Serialize};

/// A location in the (aligned-spin, two-body) parameter space.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub mass1: f64,
    pub mass2: f64,
    #[serde(default)]
    pub spin1z: f64,
    #[serde(default)]
    pub spin2z: f64,
}

impl Point {
    pub fn new(mass1: f64, mass2: f64, spin1z: f64, spin2z: f64) -> Self {
        Self {
            mass1,
            mass2,
            spin1z,
            spin2z,
        }
    }

    pub fn non_spinning(mass1: f64, mass2: f64) -> Self {
        Self::new(mass1, mass2, 0.0, 0.0)
    }

    #[inline(always)]
    pub fn total_mass(&self) -> f64 {
        self.mass1 + self.mass2
    }

    #[inline(always)]
    pub fn eta(&self) -> f64 {
        let m = self.total_mass();
        self.mass1 * self.mass2 / (m * m)
    }

    #[inline(always)]
    pub fn chirp_mass(&self) -> f64 {
        self.total_mass() * self.eta().powf(0.6)
    }

    pub fn is_finite(&self) -> bool {
        self.mass1.is_finite()
            && self.mass2.is_finite()
            && self.spin1z.is_finite()
            && self.spin2z.is_finite()
    }
}

/// An accepted (or candidate) point together with its provenance and an
/// optional oracle-prepared representation.
///
/// `C` is the oracle's prepared type. The point never changes after
/// construction; only the cache comes and goes.
#[derive(Debug, Clone)]
pub struct Template<C> {
    pub point: Point,
    pub is_seed: bool,
    /// Position in acceptance order; seeds are numbered before placed templates.
    pub sequence: u64,
    /// Best neighbor match seen when this template was accepted (0 if it had no neighbors).
    pub accept_match: f64,
    cache: Option<C>,
}

impl<C> Template<C> {
    pub fn proposal(point: Point) -> Self {
        Self {
            point,
            is_seed: false,
            sequence: 0,
            accept_match: 0.0,
            cache: None,
        }
    }

    pub fn seed(point: Point) -> Self {
        Self {
            is_seed: true,
            ..Self::proposal(point)
        }
    }

    pub fn cache(&self) -> Option<&C> {
        self.cache.as_ref()
    }

    pub fn has_cache(&self) -> bool {
        self.cache.is_some()
    }

    pub fn set_cache(&mut self, prepared: C) {
        self.cache = Some(prepared);
    }

    pub fn take_cache(&mut self) -> Option<C> {
        self.cache.take()
    }

    pub fn clear_cache(&mut self) {
        self.cache = None;
    }

    pub fn to_record(&self) -> TemplateRecord {
        TemplateRecord {
            mass1: self.point.mass1,
            mass2: self.point.mass2,
            spin1z: self.point.spin1z,
            spin2z: self.point.spin2z,
            is_seed: self.is_seed,
            sequence: self.sequence,
            accept_match: self.accept_match,
        }
    }

    pub fn from_record(record: &TemplateRecord) -> Self {
        Self {
            point: record.point(),
            is_seed: record.is_seed,
            sequence: record.sequence,
            accept_match: record.accept_match,
            cache: None,
        }
    }
}

/// Flat, cache-free form of a template used for CSV rows and checkpoints.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TemplateRecord {
    pub mass1: f64,
    pub mass2: f64,
    #[serde(default)]
    pub spin1z: f64,
    #[serde(default)]
    pub spin2z: f64,
    #[serde(default)]
    pub is_seed: bool,
    #[serde(default)]
    pub sequence: u64,
    #[serde(default)]
    pub accept_match: f64,
}

impl TemplateRecord {
    pub fn point(&self) -> Point {
        Point::new(self.mass1, self.mass2, self.spin1z, self.spin2z)
    }
}
