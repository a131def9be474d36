use crate::chirp::SortKey;
use crate::consts::DEFAULT_PARALLEL_THRESHOLD;
use crate::error::{BankForgeError, BfResult};
use crate::oracle::Approximant;
use clap::{parser::ValueSource, ArgMatches, Args};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use strum_macros::{Display, EnumIter, EnumString};

#[derive(Args, Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[command(flatten)]
    #[serde(default)]
    pub placement: PlacementParams,
    #[command(flatten)]
    #[serde(default)]
    pub sampler: SamplerParams,
    #[command(flatten)]
    #[serde(default)]
    pub oracle: OracleParams,
}

/// What an oracle evaluation failure does to the convergence counter.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, EnumIter, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// A failed proposal advances `k` exactly like a rejection.
    Count,
    /// A failed proposal is dropped without touching `k`.
    Skip,
}

#[derive(Args, Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlacementParams {
    /// Minimum match a neighbor must reach for a proposal to count as covered.
    #[arg(long, default_value_t = 0.97)]
    pub match_min: f64,
    /// Stop once the smoothed rejection run length reaches this value.
    #[arg(long, default_value_t = 20.0)]
    pub convergence_threshold: f64,
    #[arg(long, default_value_t = usize::MAX)]
    pub max_new_templates: usize,

    // === NEIGHBORHOOD ===
    #[arg(long, default_value = "tau0")]
    pub neighborhood_param: SortKey,
    /// Half-width of the neighborhood window, in seconds.
    #[arg(long, default_value_t = 1.0)]
    pub neighborhood_size: f64,
    /// Low-frequency cutoff used for the sort key projection (Hz).
    #[arg(long, default_value_t = 30.0)]
    pub f_low: f64,

    // === RESOURCES ===
    #[arg(long, default_value_t = false)]
    pub cache_templates: bool,
    /// Neighborhoods at least this large are scored on the rayon pool (0 = never).
    #[arg(long, default_value_t = DEFAULT_PARALLEL_THRESHOLD)]
    pub parallel_threshold: usize,

    // === CHECKPOINTS & RNG ===
    /// Checkpoint every N acceptances (0 disables checkpointing).
    #[arg(long, default_value_t = 0)]
    pub checkpoint_interval: usize,
    #[arg(long)]
    pub seed: Option<u64>,
    #[arg(long, default_value = "count")]
    pub failure_policy: FailurePolicy,
}

impl Default for PlacementParams {
    fn default() -> Self {
        Self {
            match_min: 0.97,
            convergence_threshold: 20.0,
            max_new_templates: usize::MAX,
            neighborhood_param: SortKey::Tau0,
            neighborhood_size: 1.0,
            f_low: 30.0,
            cache_templates: false,
            parallel_threshold: DEFAULT_PARALLEL_THRESHOLD,
            checkpoint_interval: 0,
            seed: None,
            failure_policy: FailurePolicy::Count,
        }
    }
}

#[derive(Args, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SamplerParams {
    #[arg(long, default_value_t = 1.0)]
    pub mass1_min: f64,
    #[arg(long, default_value_t = 3.0)]
    pub mass1_max: f64,
    #[arg(long, default_value_t = 1.0)]
    pub mass2_min: f64,
    #[arg(long, default_value_t = 3.0)]
    pub mass2_max: f64,
    #[arg(long, default_value_t = 0.0, allow_hyphen_values = true)]
    pub spin_min: f64,
    #[arg(long, default_value_t = 0.0, allow_hyphen_values = true)]
    pub spin_max: f64,
}

impl Default for SamplerParams {
    fn default() -> Self {
        Self {
            mass1_min: 1.0,
            mass1_max: 3.0,
            mass2_min: 1.0,
            mass2_max: 3.0,
            spin_min: 0.0,
            spin_max: 0.0,
        }
    }
}

#[derive(Args, Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OracleParams {
    #[arg(long, default_value = "chirp_times")]
    pub approximant: Approximant,
    /// tau0 separation (s) corresponding to one unit of metric distance.
    #[arg(long, default_value_t = 1.0)]
    pub tau0_scale: f64,
    /// tau3 separation (s) corresponding to one unit of metric distance.
    #[arg(long, default_value_t = 0.5)]
    pub tau3_scale: f64,
}

impl Default for OracleParams {
    fn default() -> Self {
        Self {
            approximant: Approximant::ChirpTimes,
            tau0_scale: 1.0,
            tau3_scale: 0.5,
        }
    }
}

impl Config {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> BfResult<Self> {
        let content = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Overlays every flag the user actually typed onto a file-based config.
    pub fn merge_from_cli(&mut self, cli: &Config, matches: &ArgMatches) {
        macro_rules! update_if_present {
            ($group:ident . $field:ident) => {
                if matches.value_source(stringify!($field)) == Some(ValueSource::CommandLine) {
                    self.$group.$field = cli.$group.$field.clone();
                }
            };
        }

        update_if_present!(placement.match_min);
        update_if_present!(placement.convergence_threshold);
        update_if_present!(placement.max_new_templates);
        update_if_present!(placement.neighborhood_param);
        update_if_present!(placement.neighborhood_size);
        update_if_present!(placement.f_low);
        update_if_present!(placement.cache_templates);
        update_if_present!(placement.parallel_threshold);
        update_if_present!(placement.checkpoint_interval);
        update_if_present!(placement.seed);
        update_if_present!(placement.failure_policy);

        update_if_present!(sampler.mass1_min);
        update_if_present!(sampler.mass1_max);
        update_if_present!(sampler.mass2_min);
        update_if_present!(sampler.mass2_max);
        update_if_present!(sampler.spin_min);
        update_if_present!(sampler.spin_max);

        update_if_present!(oracle.approximant);
        update_if_present!(oracle.tau0_scale);
        update_if_present!(oracle.tau3_scale);
    }

    pub fn validate(&self) -> BfResult<()> {
        self.placement.validate()?;
        self.sampler.validate()?;
        self.oracle.validate()
    }
}

impl PlacementParams {
    pub fn validate(&self) -> BfResult<()> {
        if !(self.match_min > 0.0 && self.match_min <= 1.0) {
            return Err(config_err(format!(
                "match_min must be in (0, 1], got {}",
                self.match_min
            )));
        }
        if !(self.convergence_threshold > 0.0) {
            return Err(config_err(format!(
                "convergence_threshold must be positive, got {}",
                self.convergence_threshold
            )));
        }
        if !(self.neighborhood_size >= 0.0) || !self.neighborhood_size.is_finite() {
            return Err(config_err(format!(
                "neighborhood_size must be a finite non-negative number, got {}",
                self.neighborhood_size
            )));
        }
        if !(self.f_low > 0.0) {
            return Err(config_err(format!("f_low must be positive, got {}", self.f_low)));
        }
        Ok(())
    }
}

impl SamplerParams {
    pub fn validate(&self) -> BfResult<()> {
        let ranges = [
            ("mass1", self.mass1_min, self.mass1_max),
            ("mass2", self.mass2_min, self.mass2_max),
        ];
        for (name, lo, hi) in ranges {
            if !(lo > 0.0 && lo <= hi && hi.is_finite()) {
                return Err(config_err(format!(
                    "{} range [{}, {}] must satisfy 0 < min <= max",
                    name, lo, hi
                )));
            }
        }
        if !(-1.0..=1.0).contains(&self.spin_min)
            || !(-1.0..=1.0).contains(&self.spin_max)
            || self.spin_min > self.spin_max
        {
            return Err(config_err(format!(
                "spin range [{}, {}] must lie within [-1, 1]",
                self.spin_min, self.spin_max
            )));
        }
        Ok(())
    }
}

impl OracleParams {
    pub fn validate(&self) -> BfResult<()> {
        if !(self.tau0_scale > 0.0 && self.tau3_scale > 0.0) {
            return Err(config_err(format!(
                "metric scales must be positive, got tau0={} tau3={}",
                self.tau0_scale, self.tau3_scale
            )));
        }
        Ok(())
    }
}

fn config_err(msg: String) -> BankForgeError {
    BankForgeError::Config(msg)
}
