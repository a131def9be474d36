use super::{PlacementCounters, PlacementEngine};
use crate::error::BfResult;
use crate::oracle::ScoringOracle;
use crate::proposal::ProposalSource;
use crate::sink::TemplateSink;
use serde::Serialize;
use std::time::{Duration, Instant};
use strum_macros::Display;
use tracing::{info, warn};

/// Why a placement run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum RunOutcome {
    Converged,
    MaxTemplatesReached,
    SourceExhausted,
    Cancelled,
}

/// Snapshot handed to a progress callback after every proposal.
#[derive(Debug, Clone, Copy)]
pub struct PlacementProgress {
    pub counters: PlacementCounters,
    pub bank_size: usize,
    pub smoothed_run_length: f64,
}

/// A trait for receiving updates during placement.
/// Boolean return value indicates if placement should continue (true) or stop (false).
pub trait ProgressCallback: Send + Sync {
    fn on_progress(&self, progress: &PlacementProgress) -> bool;
}

pub struct NoProgress;

impl ProgressCallback for NoProgress {
    fn on_progress(&self, _progress: &PlacementProgress) -> bool {
        true
    }
}

impl<F> ProgressCallback for F
where
    F: Fn(&PlacementProgress) -> bool + Send + Sync,
{
    fn on_progress(&self, progress: &PlacementProgress) -> bool {
        self(progress)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PlacementReport {
    pub outcome: RunOutcome,
    pub counters: PlacementCounters,
    pub bank_size: usize,
    pub smoothed_run_length: f64,
    pub checkpoint_failures: u64,
    pub elapsed: Duration,
}

impl<O: ScoringOracle> PlacementEngine<O> {
    /// Places templates until convergence, the acceptance cap, exhaustion of
    /// `source`, or the callback asking to stop. Finalizes the engine and
    /// flushes `sink` before returning, also when a step fails.
    pub fn run<S, K, CB>(&mut self, source: &mut S, sink: &mut K, callback: CB) -> BfResult<PlacementReport>
    where
        S: ProposalSource + ?Sized,
        K: TemplateSink + ?Sized,
        CB: ProgressCallback,
    {
        let start = Instant::now();
        info!(
            "🚀 Placing templates (match_min={}, threshold={}, bank={})",
            self.params.match_min,
            self.params.convergence_threshold,
            self.bank.len()
        );

        let outcome = match self.place(source, sink, &callback) {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!("⚠️  Placement aborted: {}", e);
                self.finalize();
                if let Err(flush) = sink.finish() {
                    warn!("⚠️  Sink flush failed: {}", flush);
                }
                return Err(e);
            }
        };

        self.finalize();
        sink.finish()?;

        let report = PlacementReport {
            outcome,
            counters: self.counters,
            bank_size: self.bank.len(),
            smoothed_run_length: self.tracker.smoothed_run_length(),
            checkpoint_failures: self.checkpoint_failures,
            elapsed: start.elapsed(),
        };

        info!(
            "🏁 {} after {} proposals: {} accepted, {} rejected, {} failed",
            report.outcome,
            report.counters.proposals,
            report.counters.accepted,
            report.counters.rejected,
            report.counters.failed
        );
        Ok(report)
    }

    fn place<S, K, CB>(&mut self, source: &mut S, sink: &mut K, callback: &CB) -> BfResult<RunOutcome>
    where
        S: ProposalSource + ?Sized,
        K: TemplateSink + ?Sized,
        CB: ProgressCallback,
    {
        loop {
            if let Some(reason) = self.stop_reason() {
                return Ok(reason);
            }

            if self.step(source, sink)?.is_none() {
                return Ok(RunOutcome::SourceExhausted);
            }

            let progress = PlacementProgress {
                counters: self.counters,
                bank_size: self.bank.len(),
                smoothed_run_length: self.tracker.smoothed_run_length(),
            };
            if !callback.on_progress(&progress) {
                return Ok(RunOutcome::Cancelled);
            }
        }
    }
}
