use parking_lot::Mutex;

use super::barrier::Barrier;
use crate::error::SearchError;
use super::sync_compat::{AtomicU8, Ordering};

/// Worker pool state. Every change is a compare-and-swap from an expected
/// state, so concurrent requests (timeout vs. GC vs. solved) never overwrite
/// each other.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ThreadState {
    /// threads exit
    Cancelled = 0,
    /// parked at the run barrier
    WaitStart = 1,
    /// parked, and will exit instead of running
    WaitStartCancelled = 2,
    Running = 3,
    /// one worker collects garbage, the rest wait
    Gc = 4,
    /// GC in progress and a stop was requested: end the run after it
    GcEnd = 5,
    /// run over, waiting for the controller
    WaitEnd = 6,
}

impl ThreadState {
    const fn from_u8(v: u8) -> ThreadState {
        match v {
            0 => ThreadState::Cancelled,
            1 => ThreadState::WaitStart,
            2 => ThreadState::WaitStartCancelled,
            3 => ThreadState::Running,
            4 => ThreadState::Gc,
            5 => ThreadState::GcEnd,
            _ => ThreadState::WaitEnd,
        }
    }
}

pub struct StateCell(AtomicU8);

impl StateCell {
    pub fn new(state: ThreadState) -> Self {
        StateCell(AtomicU8::new(state as u8))
    }

    #[inline]
    pub fn load(&self) -> ThreadState {
        ThreadState::from_u8(self.0.load(Ordering::Acquire))
    }

    /// CAS `from -> to`; false if the state was anything else.
    #[inline]
    pub fn transition(&self, from: ThreadState, to: ThreadState) -> bool {
        self.0
            .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }
}

/// Shared state and barriers of one worker generation.
pub struct RunControl {
    state: StateCell,
    pub(super) run_barrier: Barrier,
    pub(super) gc_barrier: Barrier,
    /// first worker panic of the current run
    panic: Mutex<Option<SearchError>>,
}

impl RunControl {
    pub fn new(workers: usize) -> Self {
        RunControl {
            state: StateCell::new(ThreadState::WaitStart),
            run_barrier: Barrier::new(workers + 1),
            gc_barrier: Barrier::new(workers),
            panic: Mutex::new(None),
        }
    }

    #[inline]
    pub fn state(&self) -> ThreadState {
        self.state.load()
    }

    #[inline]
    pub fn is_running(&self) -> bool {
        self.state.load() == ThreadState::Running
    }

    #[inline]
    pub fn transition(&self, from: ThreadState, to: ThreadState) -> bool {
        self.state.transition(from, to)
    }

    /// Timeout or external cancellation. A GC in flight finishes first.
    pub fn stop(&self) {
        self.state.transition(ThreadState::Running, ThreadState::WaitEnd);
        self.state.transition(ThreadState::Gc, ThreadState::GcEnd);
    }

    /// Keep the first panic of a run and end the run.
    pub fn record_panic(&self, worker: usize, message: String) {
        log::error!("worker {worker} panicked, ending the run: {message}");
        {
            let mut slot = self.panic.lock();
            if slot.is_none() {
                *slot = Some(SearchError::WorkerPanicked { worker, message });
            }
        }
        self.stop();
    }

    pub fn take_panic(&self) -> Option<SearchError> {
        self.panic.lock().take()
    }
}
