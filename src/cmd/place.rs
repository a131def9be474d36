use crate::reports;
use bankforge::checkpoint::CheckpointManager;
use bankforge::config::Config;
use bankforge::error::{BankForgeError, BfResult};
use bankforge::io::{load_points, write_records};
use bankforge::oracle::ChirpMetricOracle;
use bankforge::placement::{PlacementEngine, PlacementProgress, ProgressCallback};
use bankforge::proposal::{ProposalSource, ReplaySource, UniformSampler};
use bankforge::sink::TracingSink;
use bankforge::util::atomic_write;
use clap::{ArgMatches, Args};
use std::path::PathBuf;
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tracing::{info, warn};

#[derive(Args, Debug, Clone)]
pub struct PlaceArgs {
    #[command(flatten)]
    pub config: Config,

    /// JSON config file; flags given on the command line override it.
    #[arg(long = "config")]
    pub config_file: Option<PathBuf>,

    /// CSV of pre-existing templates that cover but are never emitted.
    #[arg(long)]
    pub seed_bank: Option<PathBuf>,

    /// CSV of proposals to replay instead of sampling.
    #[arg(long)]
    pub replay: Option<PathBuf>,

    #[arg(short, long, default_value = "bank.csv")]
    pub output: PathBuf,

    #[arg(long)]
    pub checkpoint_dir: Option<PathBuf>,

    /// Continue from the checkpoint in --checkpoint-dir.
    #[arg(long, default_value_t = false)]
    pub resume: bool,
}

/// Throttled progress logging.
struct CliLogger {
    last_print: Mutex<Instant>,
    every: Duration,
}

impl CliLogger {
    fn new(every: Duration) -> Self {
        Self {
            last_print: Mutex::new(Instant::now()),
            every,
        }
    }
}

impl ProgressCallback for CliLogger {
    fn on_progress(&self, p: &PlacementProgress) -> bool {
        if let Ok(mut last) = self.last_print.lock() {
            if last.elapsed() >= self.every {
                info!(
                    "⏳ proposals={} accepted={} bank={} run_length={:.2}",
                    p.counters.proposals, p.counters.accepted, p.bank_size, p.smoothed_run_length
                );
                *last = Instant::now();
            }
        }
        true
    }
}

pub fn run(args: &PlaceArgs, matches: &ArgMatches) -> BfResult<()> {
    let config = match &args.config_file {
        Some(path) => {
            info!("⚙️  Loading config from {}", path.display());
            let mut file_config = Config::load_from_file(path)?;
            file_config.merge_from_cli(&args.config, matches);
            file_config
        }
        None => args.config.clone(),
    };
    config.validate()?;

    let params = config.placement.clone();
    let oracle = ChirpMetricOracle::new(params.f_low, &config.oracle);

    let mut engine = if args.resume {
        let dir = args.checkpoint_dir.as_ref().ok_or_else(|| {
            BankForgeError::Config("--resume requires --checkpoint-dir".to_string())
        })?;
        if args.seed_bank.is_some() {
            info!("🌱 Seed bank ignored on resume; seeds are part of the checkpoint");
        }
        let manager = CheckpointManager::new(dir, params.checkpoint_interval);
        PlacementEngine::resume(params, oracle, manager)?
    } else {
        let mut engine = PlacementEngine::new(params, oracle)?;
        if let Some(dir) = &args.checkpoint_dir {
            let manager = CheckpointManager::new(dir, engine.params().checkpoint_interval);
            if manager.exists() {
                warn!(
                    "⚠️  {} already holds a checkpoint; it will be overwritten (use --resume to continue it)",
                    dir.display()
                );
            }
            engine = engine.with_checkpoints(manager);
        }
        if let Some(path) = &args.seed_bank {
            engine.import_seeds(load_points(path)?)?;
        }
        engine
    };

    let mut source: Box<dyn ProposalSource> = match &args.replay {
        Some(path) => Box::new(ReplaySource::new(load_points(path)?)),
        None => Box::new(UniformSampler::new(config.sampler.clone())),
    };

    let mut sink = TracingSink::default();
    let report = engine.run(
        &mut *source,
        &mut sink,
        CliLogger::new(Duration::from_secs(2)),
    )?;

    let placed = engine.placed_records();
    let mut buf = Vec::new();
    write_records(&mut buf, &placed)?;
    atomic_write(&args.output, buf)?;
    info!(
        "💾 Wrote {} templates to {}",
        placed.len(),
        args.output.display()
    );

    reports::print_placement_report(&report);
    println!("Outcome: {}", report.outcome);
    println!("Accepted templates: {}", placed.len());
    Ok(())
}
