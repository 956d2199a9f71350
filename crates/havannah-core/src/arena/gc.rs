use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use super::{Arena, ArenaNode, NodeRef};
use crate::config::CompactParams;

/// Adaptive pruning threshold (work count for the solver, visits for the
/// player).
#[derive(Debug)]
pub struct GcThreshold {
    value: AtomicU64,
    floor: u64,
}

impl GcThreshold {
    pub fn new(floor: u64) -> Self {
        let floor = floor.max(1);
        GcThreshold { value: AtomicU64::new(floor), floor }
    }

    #[inline]
    pub fn get(&self) -> u64 {
        self.value.load(Ordering::Relaxed)
    }

    pub fn reset(&self) {
        self.value.store(self.floor, Ordering::Relaxed);
    }

    /// Grow by 30% if the tree still fills half the limit after a
    /// collection, otherwise decay by 10% towards the floor.
    pub fn adapt(&self, used: u64, limit: u64) -> u64 {
        let cur = self.get();
        let next = if used >= limit / 2 {
            ((cur as f64 * 1.3) as u64).max(cur + 1)
        } else {
            ((cur as f64 * 0.9) as u64).max(self.floor)
        };
        self.value.store(next, Ordering::Relaxed);
        next
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GcReport {
    pub before: u64,
    pub after: u64,
    pub freed_slots: u64,
    pub prune_time: Duration,
    pub compact_time: Duration,
    /// less than 1% of the tree could be reclaimed
    pub exhausted: bool,
}

impl GcReport {
    /// Percentage of the tree kept.
    pub fn kept_percent(&self) -> u64 {
        if self.before == 0 { 100 } else { self.after * 100 / self.before }
    }
}

/// Drop the subtrees of every non-root node for which `should_drop` holds,
/// then compact. The root's own children always stay.
pub fn collect_garbage<T, F>(arena: &mut Arena<T>, mut should_drop: F, params: CompactParams) -> GcReport
where
    T: ArenaNode,
    F: FnMut(&T) -> bool,
{
    let before = arena.memory_used();
    let start = Instant::now();

    let mut freed_slots = 0;
    if let Some(root) = arena.root() {
        if let Some(seg) = arena.node(root).children().segment() {
            let cap = arena.capacity(seg) as usize;
            for i in 0..cap {
                freed_slots += prune(arena, seg.node(i), &mut should_drop);
            }
        }
    }
    let prune_time = start.elapsed();

    let start = Instant::now();
    arena.compact(params);
    let compact_time = start.elapsed();

    let after = arena.memory_used();
    GcReport {
        before,
        after,
        freed_slots,
        prune_time,
        compact_time,
        exhausted: before.saturating_sub(after) < before / 100,
    }
}

fn prune<T, F>(arena: &Arena<T>, node: NodeRef, should_drop: &mut F) -> u64
where
    T: ArenaNode,
    F: FnMut(&T) -> bool,
{
    let n = arena.node(node);
    let Some(seg) = n.children().segment() else {
        return 0;
    };
    if should_drop(n) {
        n.children().take();
        return arena.free_subtree(seg);
    }
    let cap = arena.capacity(seg) as usize;
    (0..cap).map(|i| prune(arena, seg.node(i), should_drop)).sum()
}
