use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use super::*;

#[derive(Default)]
struct TestNode {
    value: AtomicU64,
    children: ChildrenHandle,
}

impl ArenaNode for TestNode {
    fn children(&self) -> &ChildrenHandle {
        &self.children
    }

    fn copy_from(&self, other: &Self) {
        self.value.store(other.value.load(Ordering::Relaxed), Ordering::Relaxed);
        self.children.copy_from(&other.children);
    }

    fn reset(&self) {
        self.value.store(0, Ordering::Relaxed);
        self.children.clear();
    }
}

fn expand(arena: &Arena<TestNode>, node: NodeRef, n: u32, next: &mut u64) -> SegmentRef {
    let handle = arena.node(node).children();
    assert!(handle.try_lock());
    let seg = arena.alloc(n, node).expect("arena full");
    for child in arena.segment(seg) {
        *next += 1;
        child.value.store(*next, Ordering::Relaxed);
    }
    handle.publish(seg);
    seg
}

/// Root plus `width` children, each with `width` grandchildren.
fn build_tree(arena: &Arena<TestNode>, width: u32) -> u64 {
    let mut next = 0;
    let root = arena.ensure_root().expect("root");
    arena.node(root).value.store(u64::MAX, Ordering::Relaxed);
    let seg = expand(arena, root, width, &mut next);
    for i in 0..width as usize {
        let child = seg.node(i);
        let grand = expand(arena, child, width, &mut next);
        if i % 3 == 0 {
            expand(arena, grand.node(0), 4, &mut next);
        }
    }
    next
}

/// Preorder node values, checking every back reference on the way.
fn snapshot(arena: &Arena<TestNode>) -> Vec<u64> {
    fn walk(arena: &Arena<TestNode>, node: NodeRef, out: &mut Vec<u64>) {
        let n = arena.node(node);
        out.push(n.value.load(Ordering::Relaxed));
        if let Some(seg) = n.children().segment() {
            assert_eq!(arena.segment_parent(seg), Some(node));
            for i in 0..arena.capacity(seg) as usize {
                walk(arena, seg.node(i), out);
            }
        }
    }
    let mut out = Vec::new();
    if let Some(root) = arena.root() {
        walk(arena, root, &mut out);
    }
    out
}

#[test]
fn test_concurrent_alloc_is_disjoint() {
    let arena = Arc::new(Arena::<TestNode>::new(1024));
    let handles: Vec<_> = (0..8u32)
        .map(|t| {
            let arena = Arc::clone(&arena);
            std::thread::spawn(move || {
                let mut got = Vec::new();
                for i in 0..300u32 {
                    let cap = 1 + (i * 7 + t * 13) % 61;
                    let seg = arena.alloc(cap, NodeRef::ROOT_HOLDER).expect("arena full");
                    got.push((seg.index(), cap));
                }
                got
            })
        })
        .collect();

    let mut ranges: Vec<(u32, u32)> = handles.into_iter().flat_map(|h| h.join().unwrap()).collect();
    ranges.sort_unstable();
    for pair in ranges.windows(2) {
        let (a, a_cap) = pair[0];
        let (b, _) = pair[1];
        assert!(a + a_cap <= b, "segments {a}+{a_cap} and {b} overlap");
    }
    // no segment straddles a chunk boundary
    for &(start, cap) in &ranges {
        assert_eq!(start / 1024, (start + cap - 1) / 1024);
    }
    let total: u64 = ranges.iter().map(|&(_, cap)| cap as u64).sum();
    assert_eq!(arena.live_slots(), total);
}

#[test]
fn test_freelist_serves_exact_capacity() {
    let arena = Arena::<TestNode>::new(MAX_SEGMENT);
    let a = arena.alloc(10, NodeRef::ROOT_HOLDER).unwrap();
    let _b = arena.alloc(20, NodeRef::ROOT_HOLDER).unwrap();
    arena.free(a);
    assert_eq!(arena.segment_parent(a), None);

    let c = arena.alloc(11, NodeRef::ROOT_HOLDER).unwrap();
    assert_ne!(c, a);
    let d = arena.alloc(10, NodeRef::ROOT_HOLDER).unwrap();
    assert_eq!(d, a);
    assert_eq!(arena.live_slots(), 41);
}

#[test]
fn test_alloc_links_new_chunks() {
    let arena = Arena::<TestNode>::new(MAX_SEGMENT);
    for _ in 0..5 {
        arena.alloc(300, NodeRef::ROOT_HOLDER).unwrap();
    }
    assert_eq!(arena.memory_allocated(), 5 * MAX_SEGMENT as u64 * Arena::<TestNode>::slot_bytes() as u64);
    // the sealed 212-slot tails were recycled
    let tail = arena.alloc(212, NodeRef::ROOT_HOLDER).unwrap();
    assert!(tail.index() < 4 * MAX_SEGMENT);
}

#[test]
fn test_alloc_resets_nodes() {
    let arena = Arena::<TestNode>::new(MAX_SEGMENT);
    let seg = arena.alloc(4, NodeRef::ROOT_HOLDER).unwrap();
    for node in arena.segment(seg) {
        node.value.store(99, Ordering::Relaxed);
    }
    arena.free(seg);
    let again = arena.alloc(4, NodeRef::ROOT_HOLDER).unwrap();
    assert_eq!(again, seg);
    assert!(arena.segment(again).iter().all(|n| n.value.load(Ordering::Relaxed) == 0));
}

#[test]
#[should_panic(expected = "double free")]
fn test_double_free_panics() {
    let arena = Arena::<TestNode>::new(MAX_SEGMENT);
    let seg = arena.alloc(3, NodeRef::ROOT_HOLDER).unwrap();
    arena.free(seg);
    arena.free(seg);
}

#[test]
fn test_compaction_preserves_tree() {
    let mut arena = Arena::<TestNode>::new(MAX_SEGMENT);
    build_tree(&arena, 40);

    // punch holes: drop every second subtree below the root's children
    let root = arena.root().unwrap();
    let seg = arena.node(root).children().segment().unwrap();
    for i in (0..40).step_by(2) {
        let child = arena.node(seg.node(i));
        if let Some(grand) = child.children().take() {
            arena.free_subtree(grand);
        }
    }

    let before = snapshot(&arena);
    let live = arena.live_slots();
    let stats = arena.compact(CompactParams { release: 1.0, lazy: 0.0 });

    assert!(stats.moved_segments > 0);
    assert!(stats.chunks_after < stats.chunks_before);
    assert_eq!(arena.live_slots(), live);
    assert_eq!(snapshot(&arena), before);

    // allocation after compaction does not clobber live nodes
    let mut next = 10_000;
    let child = seg_child(&arena, 0);
    expand(&arena, child, 30, &mut next);
    let after = snapshot(&arena);
    assert_eq!(after.len(), before.len() + 30);
    assert_eq!(arena.live_slots(), live + 30);
}

fn seg_child(arena: &Arena<TestNode>, i: usize) -> NodeRef {
    let root = arena.root().unwrap();
    arena.node(root).children().segment().unwrap().node(i)
}

#[test]
fn test_lazy_compaction_only_recycles() {
    let mut arena = Arena::<TestNode>::new(MAX_SEGMENT);
    build_tree(&arena, 30);
    let root = arena.root().unwrap();
    let seg = arena.node(root).children().segment().unwrap();
    let mut freed = HashSet::new();
    for i in 0..10 {
        if let Some(grand) = arena.node(seg.node(i)).children().take() {
            freed.insert(grand);
            arena.free_subtree(grand);
        }
    }
    let before = snapshot(&arena);
    let stats = arena.compact(CompactParams { release: 1.0, lazy: 1.0 });
    assert_eq!(stats.moved_segments, 0);
    assert_eq!(stats.chunks_after, stats.chunks_before);
    assert_eq!(snapshot(&arena), before);

    let reused = arena.alloc(30, NodeRef::ROOT_HOLDER).unwrap();
    assert!(freed.contains(&reused));
}

#[test]
fn test_mixed_compaction_keeps_back_references() {
    let mut arena = Arena::<TestNode>::new(MAX_SEGMENT);
    build_tree(&arena, 50);
    for i in (1..50).step_by(3) {
        if let Some(grand) = arena.node(seg_child(&arena, i)).children().take() {
            arena.free_subtree(grand);
        }
    }
    let before = snapshot(&arena);
    let live = arena.live_slots();
    arena.compact(CompactParams { release: 0.5, lazy: 0.5 });
    assert_eq!(snapshot(&arena), before);
    assert_eq!(arena.live_slots(), live);
}

#[test]
fn test_promote_to_root() {
    let arena = Arena::<TestNode>::new(MAX_SEGMENT);
    let mut next = 0;
    let root = arena.ensure_root().unwrap();
    let seg = expand(&arena, root, 3, &mut next);
    for i in 0..3 {
        expand(&arena, seg.node(i), 2, &mut next);
    }
    assert_eq!(arena.live_slots(), 10);

    let kept = arena.node(seg.node(1)).value.load(Ordering::Relaxed);
    let new_root = arena.promote_to_root(seg.node(1)).unwrap();
    assert_eq!(arena.root(), Some(new_root));
    assert_eq!(arena.live_slots(), 3);
    let snap = snapshot(&arena);
    assert_eq!(snap[0], kept);
    assert_eq!(snap.len(), 3);
}

#[test]
fn test_gc_drops_marked_subtrees() {
    let mut arena = Arena::<TestNode>::new(MAX_SEGMENT);
    build_tree(&arena, 20);
    let live = arena.live_slots();
    let report = collect_garbage(&mut arena, |n| n.value.load(Ordering::Relaxed) % 2 == 0, CompactParams::default());
    assert!(report.after < report.before);
    assert!(!report.exhausted);
    assert!(arena.live_slots() < live);
    // the root's children survive
    assert!(arena.node(arena.root().unwrap()).children().segment().is_some());
    assert_eq!(snapshot(&arena).len() as u64, arena.live_slots());

    // nothing left to drop
    let report = collect_garbage(&mut arena, |_| false, CompactParams::default());
    assert!(report.exhausted);
}

#[test]
fn test_clear_tree() {
    let arena = Arena::<TestNode>::new(MAX_SEGMENT);
    build_tree(&arena, 10);
    arena.clear_tree();
    assert_eq!(arena.live_slots(), 0);
    assert_eq!(arena.root(), None);
}
