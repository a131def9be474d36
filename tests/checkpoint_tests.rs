mod common;

use bankforge::checkpoint::CheckpointManager;
use bankforge::chirp::SortKey;
use bankforge::config::{PlacementParams, SamplerParams};
use bankforge::error::{BankForgeError, BfResult};
use bankforge::placement::{NoProgress, PlacementEngine, PlacementProgress, RunOutcome};
use bankforge::proposal::{ReplaySource, UniformSampler};
use bankforge::sink::TemplateSink;
use bankforge::template::{Point, TemplateRecord};
use common::*;
use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};

fn checkpointed(seed: u64, interval: usize) -> PlacementParams {
    PlacementParams {
        checkpoint_interval: interval,
        ..params(seed)
    }
}

fn uninterrupted(params: PlacementParams) -> Vec<TemplateRecord> {
    let mut engine = PlacementEngine::new(params, LineOracle::new(20.0)).unwrap();
    let mut sink: Vec<TemplateRecord> = Vec::new();
    engine
        .run(&mut equal_mass_source, &mut sink, NoProgress)
        .unwrap();
    engine.placed_records()
}

fn copy_checkpoint(from: &Path, to: &Path) {
    fs::create_dir_all(to).unwrap();
    for name in ["bank.chk.json", "bank.chk.rng"] {
        fs::copy(from.join(name), to.join(name)).unwrap();
    }
}

#[test]
fn resume_after_crash_reproduces_uninterrupted_run() {
    let reference = uninterrupted(checkpointed(42, 5));
    assert!(reference.len() > 10, "need a bank larger than the crash point");

    let live = tempfile::tempdir().unwrap();
    let crash = tempfile::tempdir().unwrap();
    let crash_dir = crash.path().join("at10");

    // Run to completion while grabbing the on-disk checkpoint the moment
    // acceptance #10 lands, as a crash right after it would leave it.
    let copied = AtomicBool::new(false);
    let grab = |p: &PlacementProgress| {
        if p.counters.accepted == 10 && !copied.swap(true, Ordering::SeqCst) {
            copy_checkpoint(live.path(), &crash_dir);
        }
        true
    };
    let mut engine = PlacementEngine::new(checkpointed(42, 5), LineOracle::new(20.0))
        .unwrap()
        .with_checkpoints(CheckpointManager::new(live.path(), 5));
    let mut sink: Vec<TemplateRecord> = Vec::new();
    engine.run(&mut equal_mass_source, &mut sink, grab).unwrap();
    assert!(copied.load(Ordering::SeqCst));
    assert_eq!(engine.placed_records(), reference);

    let mut resumed = PlacementEngine::resume(
        checkpointed(42, 5),
        LineOracle::new(20.0),
        CheckpointManager::new(&crash_dir, 5),
    )
    .unwrap();
    assert_eq!(resumed.counters().accepted, 10);

    let mut tail: Vec<TemplateRecord> = Vec::new();
    resumed
        .run(&mut equal_mass_source, &mut tail, NoProgress)
        .unwrap();

    assert_eq!(resumed.placed_records(), reference);
    assert_eq!(tail.as_slice(), &reference[10..], "restored templates must not be re-emitted");
}

#[test]
fn stop_and_resume_with_a_replay_source() {
    let points = {
        let mut rng = fastrand::Rng::with_seed(5);
        (0..300)
            .filter_map(|_| equal_mass_source(&mut rng))
            .collect::<Vec<Point>>()
    };
    let params = PlacementParams {
        convergence_threshold: 1e9,
        ..checkpointed(1, 3)
    };

    let mut full = PlacementEngine::new(params.clone(), LineOracle::new(20.0)).unwrap();
    let mut sink: Vec<TemplateRecord> = Vec::new();
    full.run(&mut ReplaySource::new(points.clone()), &mut sink, NoProgress)
        .unwrap();

    let dir = tempfile::tempdir().unwrap();
    let mut first = PlacementEngine::new(params.clone(), LineOracle::new(20.0))
        .unwrap()
        .with_checkpoints(CheckpointManager::new(dir.path(), 3));
    let mut part: Vec<TemplateRecord> = Vec::new();
    let report = first
        .run(
            &mut ReplaySource::new(points.clone()),
            &mut part,
            |p: &PlacementProgress| p.counters.accepted < 6,
        )
        .unwrap();
    assert_eq!(report.outcome, RunOutcome::Cancelled);

    let mut second =
        PlacementEngine::resume(params, LineOracle::new(20.0), CheckpointManager::new(dir.path(), 3))
            .unwrap();
    let mut rest: Vec<TemplateRecord> = Vec::new();
    let report = second
        .run(&mut ReplaySource::new(points), &mut rest, NoProgress)
        .unwrap();

    assert_eq!(report.outcome, RunOutcome::SourceExhausted);
    part.extend(rest);
    assert_eq!(part, sink);
    assert_eq!(second.counters(), full.counters());
}

#[test]
fn seeds_survive_a_resume_and_stay_unemitted() {
    let dir = tempfile::tempdir().unwrap();
    let params = PlacementParams {
        max_new_templates: 4,
        ..checkpointed(3, 2)
    };
    let mut engine = PlacementEngine::new(params.clone(), LineOracle::new(20.0))
        .unwrap()
        .with_checkpoints(CheckpointManager::new(dir.path(), 2));
    engine.import_seeds(mass_ladder(3)).unwrap();
    let mut sink: Vec<TemplateRecord> = Vec::new();
    engine
        .run(&mut equal_mass_source, &mut sink, NoProgress)
        .unwrap();

    let resumed = PlacementEngine::resume(
        PlacementParams {
            max_new_templates: 8,
            ..params
        },
        LineOracle::new(20.0),
        CheckpointManager::new(dir.path(), 2),
    )
    .unwrap();
    assert_eq!(resumed.bank().len(), 7);
    assert_eq!(resumed.bank_records().iter().filter(|r| r.is_seed).count(), 3);
    assert_eq!(resumed.placed_records(), sink);

    let err = {
        let mut r = resumed;
        r.import_seeds(mass_ladder(1)).unwrap_err()
    };
    assert!(matches!(err, BankForgeError::Validation(_)));
}

fn write_one_checkpoint(dir: &Path) {
    let mut engine = PlacementEngine::new(
        PlacementParams {
            max_new_templates: 3,
            ..checkpointed(8, 1)
        },
        LineOracle::new(20.0),
    )
    .unwrap()
    .with_checkpoints(CheckpointManager::new(dir, 1));
    let mut sink: Vec<TemplateRecord> = Vec::new();
    engine
        .run(&mut equal_mass_source, &mut sink, NoProgress)
        .unwrap();
}

fn restore_err(dir: &Path) -> BankForgeError {
    match PlacementEngine::resume(checkpointed(8, 1), LineOracle::new(20.0), CheckpointManager::new(dir, 1)) {
        Ok(_) => panic!("restore unexpectedly succeeded"),
        Err(e) => e,
    }
}

#[test]
fn missing_rng_companion_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    write_one_checkpoint(dir.path());
    fs::remove_file(dir.path().join("bank.chk.rng")).unwrap();
    assert!(matches!(restore_err(dir.path()), BankForgeError::Checkpoint(_)));
}

#[test]
fn missing_checkpoint_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    assert!(matches!(restore_err(dir.path()), BankForgeError::Checkpoint(_)));
}

#[test]
fn malformed_snapshot_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    write_one_checkpoint(dir.path());
    fs::write(dir.path().join("bank.chk.json"), "{ not json").unwrap();
    assert!(matches!(restore_err(dir.path()), BankForgeError::Checkpoint(_)));
}

#[test]
fn mismatched_rng_companion_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    write_one_checkpoint(dir.path());
    fs::write(
        dir.path().join("bank.chk.rng"),
        r#"{"version": 2, "accepted": 99, "proposals": 0, "state": 12345}"#,
    )
    .unwrap();
    let err = restore_err(dir.path());
    assert!(err.to_string().contains("99"), "{}", err);
}

#[test]
fn unknown_version_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    write_one_checkpoint(dir.path());
    fs::write(
        dir.path().join("bank.chk.rng"),
        r#"{"version": 7, "accepted": 3, "proposals": 0, "state": 12345}"#,
    )
    .unwrap();
    assert!(matches!(restore_err(dir.path()), BankForgeError::Checkpoint(_)));
}

#[test]
fn resume_refuses_a_different_sort_key() {
    let dir = tempfile::tempdir().unwrap();
    write_one_checkpoint(dir.path());
    let params = PlacementParams {
        neighborhood_param: SortKey::Duration,
        ..checkpointed(8, 1)
    };
    let result = PlacementEngine::resume(params, LineOracle::new(20.0), CheckpointManager::new(dir.path(), 1));
    assert!(matches!(result, Err(BankForgeError::Checkpoint(_))));
}

#[test]
fn checkpoint_write_failure_does_not_stop_the_run() {
    let dir = tempfile::tempdir().unwrap();
    // A regular file where the checkpoint directory should be.
    let blocked = dir.path().join("not_a_dir");
    fs::write(&blocked, "occupied").unwrap();

    let params = PlacementParams {
        max_new_templates: 6,
        ..checkpointed(2, 2)
    };
    let mut engine = PlacementEngine::new(params, LineOracle::new(20.0))
        .unwrap()
        .with_checkpoints(CheckpointManager::new(&blocked, 2));
    let mut sink: Vec<TemplateRecord> = Vec::new();
    let report = engine
        .run(&mut equal_mass_source, &mut sink, NoProgress)
        .unwrap();

    assert_eq!(report.outcome, RunOutcome::MaxTemplatesReached);
    assert_eq!(sink.len(), 6);
    // Three periodic attempts plus the closing one.
    assert_eq!(report.checkpoint_failures, 4);
    assert_eq!(fs::read_to_string(&blocked).unwrap(), "occupied");
}

#[test]
fn disabled_interval_writes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let mut engine = PlacementEngine::new(
        PlacementParams {
            max_new_templates: 5,
            ..params(1)
        },
        LineOracle::new(20.0),
    )
    .unwrap()
    .with_checkpoints(CheckpointManager::new(dir.path(), 0));
    let mut sink: Vec<TemplateRecord> = Vec::new();
    engine
        .run(&mut equal_mass_source, &mut sink, NoProgress)
        .unwrap();
    assert!(!CheckpointManager::new(dir.path(), 0).exists());
}

#[test]
fn failed_write_at_the_same_acceptance_keeps_the_earlier_checkpoint() {
    let dir = tempfile::tempdir().unwrap();
    let manager = CheckpointManager::new(dir.path(), 1);
    let point = Point::non_spinning(1.4, 1.4);
    let mut source = ReplaySource::new(vec![point; 6]);
    let mut engine = PlacementEngine::new(checkpointed(4, 1), LineOracle::new(20.0))
        .unwrap()
        .with_checkpoints(manager.clone());
    let mut sink: Vec<TemplateRecord> = Vec::new();

    // The first proposal is accepted and checkpointed.
    engine.step(&mut source, &mut sink).unwrap();
    let earlier = engine.snapshot();
    assert_eq!(manager.restore().unwrap(), earlier);

    // Five rejections follow; the closing write then fails before its
    // random-state file is staged.
    fs::create_dir(dir.path().join("bank.chk.rng.tmp")).unwrap();
    let report = engine.run(&mut source, &mut sink, NoProgress).unwrap();
    assert_eq!(report.counters.rejected, 5);
    assert_eq!(report.checkpoint_failures, 1);
    assert!(!dir.path().join("bank.chk.json.tmp").exists());

    // Even a staged bank left behind by a crash must not displace it.
    let later = engine.snapshot();
    assert_eq!(later.snapshot.counters.accepted, earlier.snapshot.counters.accepted);
    fs::write(
        dir.path().join("bank.chk.json.tmp"),
        serde_json::to_vec(&later.snapshot).unwrap(),
    )
    .unwrap();

    let restored = manager.restore().unwrap();
    assert_eq!(restored, earlier);
    assert_eq!(restored.snapshot.counters.proposals, 1);
}

/// Accepts `capacity` templates, then fails every emit.
struct FullAfter {
    capacity: usize,
    records: Vec<TemplateRecord>,
    finished: bool,
}

impl TemplateSink for FullAfter {
    fn emit(&mut self, record: &TemplateRecord) -> BfResult<()> {
        if self.records.len() == self.capacity {
            return Err(std::io::Error::other("sink full").into());
        }
        self.records.push(*record);
        Ok(())
    }

    fn finish(&mut self) -> BfResult<()> {
        self.finished = true;
        Ok(())
    }
}

#[test]
fn sink_failure_still_finalizes_the_engine() {
    let dir = tempfile::tempdir().unwrap();
    let params = PlacementParams {
        cache_templates: true,
        ..checkpointed(6, 100)
    };
    let mut engine = PlacementEngine::new(params.clone(), LineOracle::new(20.0))
        .unwrap()
        .with_checkpoints(CheckpointManager::new(dir.path(), 100));
    let mut sink = FullAfter {
        capacity: 3,
        records: Vec::new(),
        finished: false,
    };

    let err = engine
        .run(&mut equal_mass_source, &mut sink, NoProgress)
        .unwrap_err();
    assert!(err.to_string().contains("sink full"), "{}", err);
    assert!(sink.finished);
    assert_eq!(engine.counters().accepted, 4);
    assert_eq!(engine.counters().emitted, 3);
    assert_eq!(engine.cached_templates(), 0);

    let resumed =
        PlacementEngine::resume(params, LineOracle::new(20.0), CheckpointManager::new(dir.path(), 100))
            .unwrap();
    assert_eq!(resumed.counters(), engine.counters());
    assert_eq!(resumed.bank().len(), 4);
}

#[test]
fn resume_does_not_draw_a_fresh_seed() {
    let dir = tempfile::tempdir().unwrap();
    write_one_checkpoint(dir.path());
    let recorded = CheckpointManager::new(dir.path(), 1).load().unwrap();

    fastrand::seed(42);
    let engine = PlacementEngine::resume(
        PlacementParams {
            seed: None,
            ..checkpointed(8, 1)
        },
        LineOracle::new(20.0),
        CheckpointManager::new(dir.path(), 1),
    )
    .unwrap();
    assert_eq!(fastrand::u64(..), fastrand::Rng::with_seed(42).u64(..));
    assert_eq!(engine.rng_state(), recorded.rng_state);
}

fn sampled_run(dir: &Path, box_params: SamplerParams) {
    let params = PlacementParams {
        max_new_templates: 4,
        convergence_threshold: 1e9,
        ..checkpointed(12, 2)
    };
    let mut engine = PlacementEngine::new(params, LineOracle::new(20.0))
        .unwrap()
        .with_checkpoints(CheckpointManager::new(dir, 2));
    let mut sink: Vec<TemplateRecord> = Vec::new();
    engine
        .run(&mut UniformSampler::new(box_params), &mut sink, NoProgress)
        .unwrap();
}

#[test]
fn resume_refuses_a_different_sampling_box() {
    let dir = tempfile::tempdir().unwrap();
    let original = SamplerParams::default();
    sampled_run(dir.path(), original.clone());

    let resume = || {
        PlacementEngine::resume(
            PlacementParams {
                max_new_templates: 8,
                convergence_threshold: 1e9,
                ..checkpointed(12, 2)
            },
            LineOracle::new(20.0),
            CheckpointManager::new(dir.path(), 2),
        )
        .unwrap()
    };
    let mut sink: Vec<TemplateRecord> = Vec::new();

    let wider = SamplerParams {
        mass1_max: 5.0,
        ..original.clone()
    };
    let err = resume()
        .run(&mut UniformSampler::new(wider), &mut sink, NoProgress)
        .unwrap_err();
    assert!(matches!(err, BankForgeError::Checkpoint(_)), "{}", err);
    assert!(sink.is_empty());

    let report = resume()
        .run(&mut UniformSampler::new(original), &mut sink, NoProgress)
        .unwrap();
    assert_eq!(report.counters.accepted, 8);
}
