use crate::chirp::SortKey;
use crate::consts::{CHECKPOINT_BANK_FILE, CHECKPOINT_RNG_FILE, CHECKPOINT_VERSION};
use crate::convergence::ConvergenceState;
use crate::error::{BankForgeError, BfResult};
use crate::placement::PlacementCounters;
use crate::proposal::SourceSignature;
use crate::template::TemplateRecord;
use crate::util::{temp_path_for, write_synced};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Everything needed to continue a run: the bank in key order with its
/// provenance flags, the counters, the convergence window and the settings
/// that shaped the bank ordering and the proposal stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BankSnapshot {
    pub version: u32,
    pub sort_key: SortKey,
    pub f_low: f64,
    /// Source the run was drawing from, when it could describe itself.
    #[serde(default)]
    pub source: Option<SourceSignature>,
    pub counters: PlacementCounters,
    pub next_sequence: u64,
    pub convergence: ConvergenceState,
    pub templates: Vec<TemplateRecord>,
}

/// Random-state companion file. `accepted` and `proposals` tie it to the
/// bank snapshot written alongside it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
struct RngSnapshot {
    version: u32,
    accepted: u64,
    proposals: u64,
    state: u64,
}

impl RngSnapshot {
    /// Two writes with the same counters captured the same engine state.
    fn pairs_with(&self, bank: &BankSnapshot) -> bool {
        self.accepted == bank.counters.accepted && self.proposals == bank.counters.proposals
    }
}

/// A consistent (bank, generator) pair.
#[derive(Debug, Clone, PartialEq)]
pub struct CheckpointState {
    pub snapshot: BankSnapshot,
    /// Raw fastrand state that produces the next proposal.
    pub rng_state: u64,
}

/// Writes and restores checkpoints inside one directory.
///
/// A write stages both files as `*.tmp`, syncs them, then renames the RNG
/// companion and the bank snapshot into place. A failure before the renames
/// removes the staging files and leaves the previous pair untouched; a crash
/// between them is rolled forward on the next restore.
#[derive(Debug, Clone)]
pub struct CheckpointManager {
    dir: PathBuf,
    interval: usize,
}

impl CheckpointManager {
    pub fn new<P: AsRef<Path>>(dir: P, interval: usize) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
            interval,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn interval(&self) -> usize {
        self.interval
    }

    pub fn bank_path(&self) -> PathBuf {
        self.dir.join(CHECKPOINT_BANK_FILE)
    }

    pub fn rng_path(&self) -> PathBuf {
        self.dir.join(CHECKPOINT_RNG_FILE)
    }

    pub fn exists(&self) -> bool {
        self.bank_path().exists()
    }

    /// Only meaningful right after an acceptance has been committed.
    #[inline(always)]
    pub fn is_due(&self, accepted: u64) -> bool {
        self.interval > 0 && accepted > 0 && accepted % self.interval as u64 == 0
    }

    /// Writes the state produced by `snapshot` if `accepted` lands on the
    /// interval. Returns whether a checkpoint was written.
    pub fn maybe_checkpoint<F>(&self, accepted: u64, snapshot: F) -> BfResult<bool>
    where
        F: FnOnce() -> CheckpointState,
    {
        if !self.is_due(accepted) {
            return Ok(false);
        }
        self.write(&snapshot())?;
        Ok(true)
    }

    pub fn write(&self, state: &CheckpointState) -> BfResult<()> {
        fs::create_dir_all(&self.dir)?;

        let counters = &state.snapshot.counters;
        let rng = RngSnapshot {
            version: CHECKPOINT_VERSION,
            accepted: counters.accepted,
            proposals: counters.proposals,
            state: state.rng_state,
        };
        let bank_bytes = serde_json::to_vec(&state.snapshot)?;
        let rng_bytes = serde_json::to_vec(&rng)?;

        let bank_path = self.bank_path();
        let rng_path = self.rng_path();
        let bank_tmp = temp_path_for(&bank_path);
        let rng_tmp = temp_path_for(&rng_path);

        let staged = write_synced(&bank_tmp, &bank_bytes)
            .and_then(|()| write_synced(&rng_tmp, &rng_bytes))
            .and_then(|()| fs::rename(&rng_tmp, &rng_path));
        if let Err(e) = staged {
            discard(&bank_tmp);
            discard(&rng_tmp);
            return Err(e.into());
        }
        // From here on the staged bank pairs with the live RNG file; if this
        // rename fails, restore finishes it.
        fs::rename(&bank_tmp, &bank_path)?;

        debug!(
            "💾 Checkpoint written: {} templates, {} accepted",
            state.snapshot.templates.len(),
            counters.accepted
        );
        Ok(())
    }

    /// Loads the last complete checkpoint, finishing an interrupted write on
    /// disk first. Any missing, unreadable or mismatched piece is an error:
    /// resuming from a guess would silently change every later decision.
    pub fn restore(&self) -> BfResult<CheckpointState> {
        self.roll_forward();
        let state = self.load()?;

        info!(
            "♻️  Restored checkpoint: {} templates, {} accepted, {} proposals",
            state.snapshot.templates.len(),
            state.snapshot.counters.accepted,
            state.snapshot.counters.proposals
        );
        Ok(state)
    }

    /// Same checks as [`restore`](Self::restore) without touching any file.
    /// A staged bank that pairs with the live RNG file is read in place of
    /// the live bank.
    pub fn load(&self) -> BfResult<CheckpointState> {
        let rng_path = self.rng_path();
        let bank_path = self.bank_path();

        let staged = self.staged_bank();
        if staged.is_none() && !bank_path.exists() {
            return Err(BankForgeError::Checkpoint(format!(
                "bank snapshot {} not found",
                bank_path.display()
            )));
        }
        if !rng_path.exists() {
            return Err(BankForgeError::Checkpoint(format!(
                "random-state companion {} not found",
                rng_path.display()
            )));
        }

        let rng: RngSnapshot = read_json(&rng_path)?;
        let snapshot = match staged {
            Some(pending) => pending,
            None => read_json::<BankSnapshot>(&bank_path)?,
        };

        if rng.version != CHECKPOINT_VERSION || snapshot.version != CHECKPOINT_VERSION {
            return Err(BankForgeError::Checkpoint(format!(
                "unsupported checkpoint version (bank {}, rng {}, expected {})",
                snapshot.version, rng.version, CHECKPOINT_VERSION
            )));
        }
        if !rng.pairs_with(&snapshot) {
            return Err(BankForgeError::Checkpoint(format!(
                "random state belongs to acceptance {} (proposal {}) but bank snapshot is at {} ({})",
                rng.accepted,
                rng.proposals,
                snapshot.counters.accepted,
                snapshot.counters.proposals
            )));
        }
        if let Some(bad) = snapshot.templates.iter().position(|t| !t.point().is_finite()) {
            return Err(BankForgeError::Checkpoint(format!(
                "template {} has non-finite parameters",
                bad
            )));
        }

        Ok(CheckpointState {
            snapshot,
            rng_state: rng.state,
        })
    }

    /// The staged bank snapshot, if one exists and the live RNG file was
    /// written by the same checkpoint.
    fn staged_bank(&self) -> Option<BankSnapshot> {
        let bank_tmp = temp_path_for(&self.bank_path());
        if !bank_tmp.exists() {
            return None;
        }
        let rng = read_json::<RngSnapshot>(&self.rng_path()).ok()?;
        let pending = read_json::<BankSnapshot>(&bank_tmp).ok()?;
        rng.pairs_with(&pending).then_some(pending)
    }

    /// Finishes a write that was interrupted between its two renames and
    /// drops staging files left by any other failed write.
    fn roll_forward(&self) {
        let bank_path = self.bank_path();
        let bank_tmp = temp_path_for(&bank_path);

        if self.staged_bank().is_some() {
            match fs::rename(&bank_tmp, &bank_path) {
                Ok(()) => warn!("Completed interrupted checkpoint write"),
                Err(e) => warn!("Could not complete interrupted checkpoint write: {}", e),
            }
        } else if bank_tmp.exists() {
            warn!("Discarding stale staging file {}", bank_tmp.display());
            discard(&bank_tmp);
        }
        discard(&temp_path_for(&self.rng_path()));
    }
}

fn discard(path: &Path) {
    if let Err(e) = fs::remove_file(path) {
        if e.kind() != std::io::ErrorKind::NotFound {
            debug!("Could not remove {}: {}", path.display(), e);
        }
    }
}

fn read_json<T: for<'de> Deserialize<'de>>(path: &Path) -> BfResult<T> {
    let content = fs::read(path)?;
    serde_json::from_slice(&content).map_err(|e| {
        BankForgeError::Checkpoint(format!("{} is malformed: {}", path.display(), e))
    })
}
