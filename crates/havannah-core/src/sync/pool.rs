use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use super::state::{RunControl, ThreadState};
use super::timer::TimerService;
use crate::error::SearchResult;
use crate::util::panic::payload_message;

/// Default worker stack; PNS recursion copies a board per ply.
const DEFAULT_STACK_MB: usize = 16;

/// Result of one unit of work.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Continue,
    /// nothing left to do (tree solved, run budget spent)
    Finished,
    /// memory limit reached
    NeedGc,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GcVerdict {
    Resume,
    /// too little was reclaimed to keep searching
    Exhausted,
}

/// Work driven by a [`WorkerPool`].
pub trait SearchTask: Send + Sync + 'static {
    type Local: Send + 'static;

    /// Per-worker scratch state, created once per thread.
    fn make_local(&self, worker: usize) -> Self::Local;

    /// One bounded unit of search. Implementations poll
    /// [`RunControl::is_running`] and return promptly once it turns false.
    fn step(&self, local: &mut Self::Local, control: &RunControl) -> Step;

    /// Runs on exactly one worker while all others are parked.
    fn collect_garbage(&self) -> GcVerdict;
}

/// Fixed set of OS threads running one [`SearchTask`].
pub struct WorkerPool<T: SearchTask> {
    name: &'static str,
    task: Arc<T>,
    control: Arc<RunControl>,
    handles: Vec<JoinHandle<()>>,
}

impl<T: SearchTask> WorkerPool<T> {
    pub fn new(name: &'static str, task: Arc<T>, threads: usize) -> Self {
        let threads = threads.max(1);
        let mut pool = WorkerPool {
            name,
            task,
            control: Arc::new(RunControl::new(threads)),
            handles: Vec::with_capacity(threads),
        };
        pool.spawn(threads);
        pool
    }

    fn spawn(&mut self, threads: usize) {
        let stack_mb = crate::util::env_var::<usize>("HAVANNAH_WORKER_STACK_MB").unwrap_or(DEFAULT_STACK_MB);
        for id in 0..threads {
            let task = Arc::clone(&self.task);
            let control = Arc::clone(&self.control);
            let handle = thread::Builder::new()
                .name(format!("{}-worker-{id}", self.name))
                .stack_size(stack_mb * 1024 * 1024)
                .spawn(move || worker_loop(task, control, id))
                .expect("spawn search worker");
            self.handles.push(handle);
        }
        log::debug!("{}: spawned {threads} workers", self.name);
    }

    pub fn task(&self) -> &Arc<T> {
        &self.task
    }

    pub fn threads(&self) -> usize {
        self.handles.len()
    }

    pub fn control(&self) -> &Arc<RunControl> {
        &self.control
    }

    /// Run all workers until the task finishes, memory runs out, or `limit`
    /// elapses. Blocks the calling thread.
    ///
    /// A worker panic ends the run early and is returned as
    /// [`SearchError::WorkerPanicked`](crate::error::SearchError). The
    /// workers stay usable for the next run.
    pub fn run(&self, timer: &TimerService, limit: Duration) -> SearchResult<()> {
        let control = &self.control;
        debug_assert_eq!(control.state(), ThreadState::WaitStart);

        control.run_barrier.wait();
        control.transition(ThreadState::WaitStart, ThreadState::Running);

        let alarm = {
            let control = Arc::clone(control);
            timer.schedule(limit, move || control.stop())
        };

        control.run_barrier.wait();
        control.transition(ThreadState::WaitEnd, ThreadState::WaitStart);
        timer.cancel(alarm);

        match control.take_panic() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// Ask a running search to end. Safe from any thread.
    pub fn stop(&self) {
        self.control.stop();
    }

    /// Replace the workers with `threads` new ones.
    pub fn set_threads(&mut self, threads: usize) {
        let threads = threads.max(1);
        if threads == self.threads() {
            return;
        }
        self.shutdown();
        self.control = Arc::new(RunControl::new(threads));
        self.spawn(threads);
    }

    fn shutdown(&mut self) {
        if self.handles.is_empty() {
            return;
        }
        let cancelled = self.control.transition(ThreadState::WaitStart, ThreadState::WaitStartCancelled);
        assert!(cancelled, "{}: shutdown while a run is active", self.name);
        self.control.run_barrier.wait();
        for handle in self.handles.drain(..) {
            if handle.join().is_err() {
                log::warn!("{}: worker panicked before shutdown", self.name);
            }
        }
    }
}

impl<T: SearchTask> Drop for WorkerPool<T> {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn worker_loop<T: SearchTask>(task: Arc<T>, control: Arc<RunControl>, id: usize) {
    let mut local = task.make_local(id);
    loop {
        match control.state() {
            ThreadState::Cancelled => return,

            ThreadState::WaitStart | ThreadState::WaitStartCancelled => {
                control.run_barrier.wait();
                control.transition(ThreadState::WaitStart, ThreadState::Running);
                control.transition(ThreadState::WaitStartCancelled, ThreadState::Cancelled);
            }

            ThreadState::WaitEnd => {
                control.run_barrier.wait();
                control.transition(ThreadState::WaitEnd, ThreadState::WaitStart);
            }

            ThreadState::Running => {
                match catch_unwind(AssertUnwindSafe(|| task.step(&mut local, &control))) {
                    Ok(Step::Continue) => {}
                    Ok(Step::Finished) => {
                        control.transition(ThreadState::Running, ThreadState::WaitEnd);
                    }
                    Ok(Step::NeedGc) => {
                        control.transition(ThreadState::Running, ThreadState::Gc);
                    }
                    Err(payload) => {
                        control.record_panic(id, payload_message(&*payload));
                        // scratch state may be half-updated
                        local = task.make_local(id);
                    }
                }
            }

            ThreadState::Gc | ThreadState::GcEnd => {
                // only the leader leaves Gc, and before the others are released
                if control.gc_barrier.wait() {
                    let verdict = catch_unwind(AssertUnwindSafe(|| task.collect_garbage()))
                        .unwrap_or_else(|payload| {
                            control.record_panic(id, payload_message(&*payload));
                            GcVerdict::Exhausted
                        });
                    if verdict == GcVerdict::Exhausted {
                        control.transition(ThreadState::Gc, ThreadState::GcEnd);
                    }
                    control.transition(ThreadState::Gc, ThreadState::Running);
                    control.transition(ThreadState::GcEnd, ThreadState::WaitEnd);
                }
                control.gc_barrier.wait();
            }
        }
    }
}
