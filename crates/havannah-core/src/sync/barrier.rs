use parking_lot::{Condvar, Mutex};

struct BarrierState {
    arrived: usize,
    generation: u64,
}

/// Reusable rendezvous for a fixed number of threads.
///
/// `wait` returns true on exactly one thread per generation (the last to
/// arrive), which the GC path uses to elect its leader.
pub struct Barrier {
    count: usize,
    state: Mutex<BarrierState>,
    cvar: Condvar,
}

impl Barrier {
    pub fn new(count: usize) -> Self {
        assert!(count > 0, "barrier needs at least one participant");
        Barrier { count, state: Mutex::new(BarrierState { arrived: 0, generation: 0 }), cvar: Condvar::new() }
    }

    pub fn count(&self) -> usize {
        self.count
    }

    pub fn wait(&self) -> bool {
        let mut state = self.state.lock();
        state.arrived += 1;
        if state.arrived == self.count {
            state.arrived = 0;
            state.generation = state.generation.wrapping_add(1);
            self.cvar.notify_all();
            return true;
        }
        let generation = state.generation;
        while state.generation == generation {
            self.cvar.wait(&mut state);
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_one_leader_per_generation() {
        let barrier = Arc::new(Barrier::new(3));
        let leaders = Arc::new(AtomicUsize::new(0));
        let handles: Vec<_> = (0..3)
            .map(|_| {
                let (barrier, leaders) = (Arc::clone(&barrier), Arc::clone(&leaders));
                std::thread::spawn(move || {
                    for _ in 0..5 {
                        if barrier.wait() {
                            leaders.fetch_add(1, Ordering::Relaxed);
                        }
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(leaders.load(Ordering::Relaxed), 5);
    }
}
