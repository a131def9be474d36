pub mod runner;

pub use self::runner::{
    NoProgress, PlacementProgress, PlacementReport, ProgressCallback, RunOutcome,
};

use crate::checkpoint::{BankSnapshot, CheckpointManager, CheckpointState};
use crate::config::{FailurePolicy, PlacementParams};
use crate::consts::CHECKPOINT_VERSION;
use crate::convergence::ConvergenceTracker;
use crate::error::{BankForgeError, BfResult, EvaluationFailure};
use crate::index::NeighborhoodIndex;
use crate::oracle::{covers, Coverage, ScoringOracle};
use crate::proposal::{ProposalSource, SourceSignature};
use crate::sink::TemplateSink;
use crate::template::{Point, Template, TemplateRecord};
use fastrand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, trace, warn};

/// Running totals of a placement run. Restored verbatim on resume.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlacementCounters {
    /// Proposals drawn from the source.
    pub proposals: u64,
    pub accepted: u64,
    pub rejected: u64,
    pub failed: u64,
    /// Accepted templates handed to the output sink.
    pub emitted: u64,
    pub seeds: u64,
}

/// Outcome of a single proposal.
#[derive(Debug, Clone, PartialEq)]
pub enum Decision {
    Accepted(Coverage),
    Rejected(Coverage),
    Failed(EvaluationFailure),
}

pub type Bank<C> = NeighborhoodIndex<Template<C>>;

/// Greedy stochastic template placement.
///
/// Owns the bank, the convergence tracker and the random generator; the
/// proposal source and output sink are lent in per call. Decisions are
/// strictly sequential: each one sees every acceptance before it.
pub struct PlacementEngine<O: ScoringOracle> {
    params: PlacementParams,
    oracle: O,
    bank: Bank<O::Prepared>,
    tracker: ConvergenceTracker,
    rng: Rng,
    counters: PlacementCounters,
    next_sequence: u64,
    checkpoints: Option<CheckpointManager>,
    checkpoint_failures: u64,
    /// Set after a restore until the source has been repositioned.
    pending_resume: Option<u64>,
    source: Option<SourceSignature>,
}

impl<O: ScoringOracle> PlacementEngine<O> {
    pub fn new(params: PlacementParams, oracle: O) -> BfResult<Self> {
        params.validate()?;

        let seed = params.seed.unwrap_or_else(|| {
            let s = fastrand::u64(..);
            info!("🎲 No seed given, drew {}", s);
            s
        });

        Ok(Self::with_rng(params, oracle, Rng::with_seed(seed)))
    }

    fn with_rng(params: PlacementParams, oracle: O, rng: Rng) -> Self {
        Self {
            params,
            oracle,
            bank: NeighborhoodIndex::new(),
            tracker: ConvergenceTracker::new(),
            rng,
            counters: PlacementCounters::default(),
            next_sequence: 0,
            checkpoints: None,
            checkpoint_failures: 0,
            pending_resume: None,
            source: None,
        }
    }

    pub fn with_checkpoints(mut self, manager: CheckpointManager) -> Self {
        self.checkpoints = Some(manager);
        self
    }

    /// Rebuilds an engine from the checkpoint in `manager`'s directory.
    ///
    /// The bank, counters, convergence window and generator state come from
    /// the checkpoint; `params.seed` is ignored. The sort key and cutoff must
    /// match the ones the bank was built with, and the first `step` refuses a
    /// source whose signature differs from the recorded one.
    pub fn resume(params: PlacementParams, oracle: O, manager: CheckpointManager) -> BfResult<Self> {
        params.validate()?;
        let state = manager.restore()?;
        let snap = state.snapshot;

        if snap.sort_key != params.neighborhood_param || snap.f_low != params.f_low {
            return Err(BankForgeError::Checkpoint(format!(
                "checkpoint was built with {} at f_low={} but the run asks for {} at f_low={}",
                snap.sort_key, snap.f_low, params.neighborhood_param, params.f_low
            )));
        }

        let tracker = ConvergenceTracker::from_state(&snap.convergence).ok_or_else(|| {
            BankForgeError::Checkpoint(format!(
                "convergence window has {} entries",
                snap.convergence.window.len()
            ))
        })?;

        let mut engine = Self::with_rng(params, oracle, Rng::with_seed(state.rng_state));
        engine.tracker = tracker;
        engine.source = snap.source;
        engine.counters = snap.counters;
        engine.next_sequence = snap.next_sequence;

        for (i, record) in snap.templates.iter().enumerate() {
            let template = Template::from_record(record);
            let key = engine.key_of(&template.point).ok_or_else(|| {
                BankForgeError::Checkpoint(format!("template {} has no valid sort key", i))
            })?;
            engine.insert_existing(key, template);
        }

        engine.pending_resume = Some(engine.counters.proposals);
        engine.checkpoints = Some(manager);
        Ok(engine)
    }

    /// Inserts pre-existing templates that cover but are never emitted.
    /// Must happen before the first proposal. Seeds without a valid sort key
    /// are skipped with a warning. Returns how many were inserted.
    pub fn import_seeds<I>(&mut self, seeds: I) -> BfResult<usize>
    where
        I: IntoIterator<Item = Point>,
    {
        if self.counters.proposals > 0 || self.pending_resume.is_some() {
            return Err(BankForgeError::Validation(
                "seed templates must be imported before placement starts".to_string(),
            ));
        }

        let mut inserted = 0;
        for point in seeds {
            let Some(key) = self.key_of(&point) else {
                warn!(
                    "Skipping seed m1={} m2={}: no valid sort key",
                    point.mass1, point.mass2
                );
                continue;
            };
            let mut template = Template::seed(point);
            template.sequence = self.next_sequence;
            self.next_sequence += 1;
            self.insert_existing(key, template);
            inserted += 1;
        }

        self.counters.seeds += inserted as u64;
        info!("🌱 Imported {} seed templates", inserted);
        Ok(inserted)
    }

    fn insert_existing(&mut self, key: f64, mut template: Template<O::Prepared>) {
        if self.params.cache_templates {
            match self.oracle.prepare(&template.point) {
                Ok(prepared) => template.set_cache(prepared),
                Err(e) => debug!("Template left uncached: {}", e),
            }
        }
        self.bank.insert(key, template);
    }

    #[inline(always)]
    fn key_of(&self, point: &Point) -> Option<f64> {
        self.params
            .neighborhood_param
            .project(point, self.params.f_low)
    }

    pub fn params(&self) -> &PlacementParams {
        &self.params
    }

    pub fn oracle(&self) -> &O {
        &self.oracle
    }

    pub fn bank(&self) -> &Bank<O::Prepared> {
        &self.bank
    }

    pub fn counters(&self) -> PlacementCounters {
        self.counters
    }

    pub fn tracker(&self) -> &ConvergenceTracker {
        &self.tracker
    }

    pub fn checkpoint_failures(&self) -> u64 {
        self.checkpoint_failures
    }

    /// Current generator state, i.e. the state that draws the next proposal.
    pub fn rng_state(&self) -> u64 {
        self.rng.get_seed()
    }

    /// Why the loop should stop now, if it should.
    pub fn stop_reason(&self) -> Option<RunOutcome> {
        if self.counters.accepted >= self.params.max_new_templates as u64 {
            return Some(RunOutcome::MaxTemplatesReached);
        }
        if self.tracker.is_converged(self.params.convergence_threshold) {
            return Some(RunOutcome::Converged);
        }
        None
    }

    /// Draws one proposal and decides it. `None` means the source is exhausted.
    pub fn step<S, K>(&mut self, source: &mut S, sink: &mut K) -> BfResult<Option<Decision>>
    where
        S: ProposalSource + ?Sized,
        K: TemplateSink + ?Sized,
    {
        if self.pending_resume.is_some() {
            self.check_source(&*source)?;
        }
        if let Some(drawn) = self.pending_resume.take() {
            source.resume_at(drawn);
        }
        if self.source.is_none() {
            self.source = source.signature();
        }

        let Some(point) = source.next_proposal(&mut self.rng) else {
            return Ok(None);
        };
        self.offer(Template::proposal(point), sink).map(Some)
    }

    fn check_source<S>(&self, source: &S) -> BfResult<()>
    where
        S: ProposalSource + ?Sized,
    {
        if let (Some(recorded), Some(current)) = (&self.source, source.signature()) {
            if *recorded != current {
                return Err(BankForgeError::Checkpoint(format!(
                    "checkpoint was drawn from {:?} but the run supplies {:?}",
                    recorded, current
                )));
            }
        }
        Ok(())
    }

    /// Runs the accept/reject decision for one candidate and commits it.
    pub fn offer<K>(&mut self, mut proposal: Template<O::Prepared>, sink: &mut K) -> BfResult<Decision>
    where
        K: TemplateSink + ?Sized,
    {
        self.counters.proposals += 1;
        self.tracker.record_proposal();

        let evaluated = self.evaluate(&proposal.point);
        let (key, prepared, coverage) = match evaluated {
            Ok(v) => v,
            Err(failure) => {
                self.counters.failed += 1;
                if self.params.failure_policy == FailurePolicy::Skip {
                    self.tracker.forget_proposal();
                }
                debug!("❌ Proposal failed: {}", failure);
                return Ok(Decision::Failed(failure));
            }
        };

        if coverage.is_covered(self.params.match_min) {
            self.counters.rejected += 1;
            trace!(
                "Rejected: match {:.4} against bank #{:?}",
                coverage.best_match,
                coverage.best_neighbor
            );
            return Ok(Decision::Rejected(coverage));
        }

        proposal.sequence = self.next_sequence;
        self.next_sequence += 1;
        proposal.accept_match = coverage.best_match.max(0.0);
        if self.params.cache_templates {
            proposal.set_cache(prepared);
        }
        let record = proposal.to_record();

        let before = self.bank.len();
        self.bank.insert(key, proposal);
        assert_eq!(self.bank.len(), before + 1, "bank must grow by one on accept");

        self.counters.accepted += 1;
        self.tracker.record_acceptance();

        if !record.is_seed {
            sink.emit(&record)?;
            self.counters.emitted += 1;
        }

        self.maybe_checkpoint();
        Ok(Decision::Accepted(coverage))
    }

    fn evaluate(&self, point: &Point) -> Result<(f64, O::Prepared, Coverage), EvaluationFailure> {
        let key = self.key_of(point).ok_or_else(|| {
            EvaluationFailure::Unphysical(format!(
                "no {} for m1={} m2={}",
                self.params.neighborhood_param, point.mass1, point.mass2
            ))
        })?;
        let prepared = self.oracle.prepare(point)?;
        let coverage = covers(
            &self.oracle,
            &prepared,
            &self.bank,
            key,
            self.params.neighborhood_size,
            self.params.parallel_threshold,
        )?;
        Ok((key, prepared, coverage))
    }

    fn maybe_checkpoint(&mut self) {
        let accepted = self.counters.accepted;
        let Some(manager) = &self.checkpoints else {
            return;
        };
        if let Err(e) = manager.maybe_checkpoint(accepted, || self.snapshot()) {
            self.checkpoint_failures += 1;
            warn!(
                "⚠️  Checkpoint at acceptance {} failed, keeping previous one: {}",
                accepted, e
            );
        }
    }

    /// Consistent view of the bank and generator for a checkpoint.
    pub fn snapshot(&self) -> CheckpointState {
        CheckpointState {
            snapshot: BankSnapshot {
                version: CHECKPOINT_VERSION,
                sort_key: self.params.neighborhood_param,
                f_low: self.params.f_low,
                source: self.source.clone(),
                counters: self.counters,
                next_sequence: self.next_sequence,
                convergence: self.tracker.state(),
                templates: self.bank.items().iter().map(|t| t.to_record()).collect(),
            },
            rng_state: self.rng_state(),
        }
    }

    /// Drops every cached representation and writes a closing checkpoint
    /// when checkpointing is enabled.
    pub fn finalize(&mut self) {
        for t in self.bank.items_mut() {
            t.clear_cache();
        }

        if let Some(manager) = &self.checkpoints {
            if manager.interval() > 0 {
                if let Err(e) = manager.write(&self.snapshot()) {
                    self.checkpoint_failures += 1;
                    warn!("⚠️  Final checkpoint failed: {}", e);
                }
            }
        }
    }

    /// Non-seed templates in acceptance order.
    pub fn placed_records(&self) -> Vec<TemplateRecord> {
        let mut placed: Vec<TemplateRecord> = self
            .bank
            .items()
            .iter()
            .filter(|t| !t.is_seed)
            .map(|t| t.to_record())
            .collect();
        placed.sort_by_key(|r| r.sequence);
        placed
    }

    /// Every template in bank (sort key) order.
    pub fn bank_records(&self) -> Vec<TemplateRecord> {
        self.bank.items().iter().map(|t| t.to_record()).collect()
    }

    pub fn cached_templates(&self) -> usize {
        self.bank.items().iter().filter(|t| t.has_cache()).count()
    }
}
