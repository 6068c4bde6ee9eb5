//! Child-process supervision with dependency ordering.
//!
//! One worker task per child: it waits for the child's dependency to show
//! up in the registry, spawns the process, marks it running once it
//! survives the stabilization window, and respawns forever on exit.

mod kill;
mod worker;

use std::path::PathBuf;

pub use kill::kill;
pub use worker::supervise;

/// Command information to run a binary as a supervised child. Immutable
/// after boot.
#[derive(Debug, Clone)]
pub struct ChildSpec {
    pub name: String,
    pub exe: PathBuf,
    pub args: Vec<String>,
    /// Name of another child that must be observed running before this one
    /// may spawn.
    pub dep: Option<String>,
    /// Command run to completion after every exit (log rotation and the
    /// like). Failures are logged, never fatal.
    pub post_exe: Option<PathBuf>,
    pub post_args: Vec<String>,
}
