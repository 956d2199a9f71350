//! Thread coordination shared by the solver and the player.
//!
//! A fixed pool of workers runs one [`SearchTask`] under a single atomic
//! [`ThreadState`]. The controlling thread starts and ends runs through a
//! barrier of `workers + 1`; garbage collection elects one worker through a
//! barrier of `workers` while the others stay parked.

mod barrier;
mod pool;
mod spin;
mod state;
pub mod sync_compat;
mod timer;

pub use barrier::Barrier;
pub use pool::{GcVerdict, SearchTask, Step, WorkerPool};
pub use spin::{SpinGuard, SpinLock};
pub use state::{RunControl, StateCell, ThreadState};
pub use timer::{AlarmId, TimerService};
