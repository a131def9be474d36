pub mod checkpoint;
pub mod chirp;
pub mod config;
pub mod consts;
pub mod convergence;
pub mod error;
pub mod index;
pub mod io;
pub mod oracle;
pub mod placement;
pub mod proposal;
pub mod sink;
pub mod template;
pub mod util;
// cmd and reports are modules of the binary crate (main.rs).
