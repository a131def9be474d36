/// Number of completed run lengths kept by the convergence tracker.
pub const CONVERGENCE_WINDOW_LEN: usize = 10;

/// Initial value of every slot in the convergence window.
pub const CONVERGENCE_WINDOW_SEED: usize = 1;

/// Bumped whenever the checkpoint layout changes.
pub const CHECKPOINT_VERSION: u32 = 2;

/// File name of the checkpoint bank snapshot.
pub const CHECKPOINT_BANK_FILE: &str = "bank.chk.json";

/// File name of the random-state companion file.
pub const CHECKPOINT_RNG_FILE: &str = "bank.chk.rng";

/// Solar mass expressed in seconds (G * M_sun / c^3).
pub const MTSUN_SI: f64 = 4.925_490_947_641_267e-6;

/// Default number of neighbors above which scoring fans out to rayon.
pub const DEFAULT_PARALLEL_THRESHOLD: usize = 64;
