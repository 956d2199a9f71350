//! Background alarm service.

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, bounded, unbounded};

type Callback = Box<dyn FnOnce() + Send + 'static>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AlarmId(u64);

enum Command {
    Schedule { id: u64, deadline: Instant, callback: Callback },
    Cancel { id: u64, ack: Sender<bool> },
    Shutdown,
}

/// One thread firing scheduled callbacks.
///
/// Callbacks run on the service thread and must be short. [`cancel`] is
/// synchronous: once it returns, the callback has either already finished or
/// will never run.
///
/// [`cancel`]: TimerService::cancel
pub struct TimerService {
    tx: Sender<Command>,
    next_id: AtomicU64,
    handle: Option<JoinHandle<()>>,
}

impl TimerService {
    pub fn new() -> Self {
        let (tx, rx) = unbounded();
        let handle = thread::Builder::new()
            .name("havannah-timer".to_string())
            .spawn(move || timer_loop(rx))
            .expect("spawn timer thread");
        TimerService { tx, next_id: AtomicU64::new(1), handle: Some(handle) }
    }

    /// Run `callback` once after `delay`.
    pub fn schedule(&self, delay: Duration, callback: impl FnOnce() + Send + 'static) -> AlarmId {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let deadline = Instant::now().checked_add(delay).unwrap_or_else(far_future);
        if self.tx.send(Command::Schedule { id, deadline, callback: Box::new(callback) }).is_err() {
            log::warn!("timer: service stopped, alarm {id} dropped");
        }
        AlarmId(id)
    }

    /// Cancel a pending alarm. Returns true if it had not fired yet.
    pub fn cancel(&self, alarm: AlarmId) -> bool {
        let (ack_tx, ack_rx) = bounded(1);
        if self.tx.send(Command::Cancel { id: alarm.0, ack: ack_tx }).is_err() {
            return false;
        }
        ack_rx.recv().unwrap_or(false)
    }
}

impl Default for TimerService {
    fn default() -> Self {
        TimerService::new()
    }
}

impl Drop for TimerService {
    fn drop(&mut self) {
        let _ = self.tx.send(Command::Shutdown);
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                log::warn!("timer: service thread panicked");
            }
        }
    }
}

fn far_future() -> Instant {
    Instant::now() + Duration::from_secs(60 * 60 * 24 * 365)
}

fn timer_loop(rx: Receiver<Command>) {
    let mut queue: BinaryHeap<Reverse<(Instant, u64)>> = BinaryHeap::new();
    let mut pending: HashMap<u64, Callback> = HashMap::new();

    loop {
        let received = match queue.peek() {
            Some(Reverse((deadline, _))) => {
                let wait = deadline.saturating_duration_since(Instant::now());
                rx.recv_timeout(wait)
            }
            None => rx.recv().map_err(|_| RecvTimeoutError::Disconnected),
        };

        match received {
            Ok(Command::Schedule { id, deadline, callback }) => {
                queue.push(Reverse((deadline, id)));
                pending.insert(id, callback);
            }
            Ok(Command::Cancel { id, ack }) => {
                let _ = ack.send(pending.remove(&id).is_some());
            }
            Ok(Command::Shutdown) | Err(RecvTimeoutError::Disconnected) => return,
            Err(RecvTimeoutError::Timeout) => {}
        }

        let now = Instant::now();
        while let Some(&Reverse((deadline, id))) = queue.peek() {
            if deadline > now {
                break;
            }
            queue.pop();
            // cancelled alarms leave a stale heap entry behind
            if let Some(callback) = pending.remove(&id) {
                callback();
            }
        }
    }
}
