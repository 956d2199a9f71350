use criterion::{BatchSize, BenchmarkId, Criterion, criterion_group, criterion_main};
use std::hint::black_box;
use std::sync::Arc;
use std::thread;

use havannah_core::CompactParams;
use havannah_core::arena::{Arena, ArenaNode, NodeRef, collect_garbage};
use havannah_core::pns::PnsNode;

const CHUNK: u32 = 1 << 16;

/// Root with `width` children, each with `width` children of its own.
fn two_level_tree(width: u32) -> Arena<PnsNode> {
    let arena = Arena::new(CHUNK);
    let root = arena.ensure_root().unwrap();
    let seg = arena.alloc(width, root).unwrap();
    arena.node(root).children().try_lock();
    arena.node(root).children().publish(seg);
    for i in 0..width as usize {
        let child = seg.node(i);
        let grand = arena.alloc(width, child).unwrap();
        for (k, n) in arena.segment(grand).iter().enumerate() {
            n.set_work(k as u64);
        }
        arena.node(child).set_work(i as u64);
        arena.node(child).children().try_lock();
        arena.node(child).children().publish(grand);
    }
    arena
}

fn bench_alloc_free(c: &mut Criterion) {
    let mut g = c.benchmark_group("arena_alloc");
    for &cap in &[7u32, 61, 127] {
        g.bench_with_input(BenchmarkId::new("alloc_free", cap), &cap, |b, &cap| {
            let arena: Arena<PnsNode> = Arena::new(CHUNK);
            let parent = NodeRef::ROOT_HOLDER;
            b.iter(|| {
                let seg = arena.alloc(cap, parent).unwrap();
                arena.free(black_box(seg));
            });
        });
    }

    // 4 スレッド同時 bump
    g.bench_function("bump_4_threads", |b| {
        b.iter_batched(
            || Arc::new(Arena::<PnsNode>::new(CHUNK)),
            |arena| {
                let handles: Vec<_> = (0..4)
                    .map(|_| {
                        let arena = Arc::clone(&arena);
                        thread::spawn(move || {
                            for _ in 0..256 {
                                black_box(arena.alloc(61, NodeRef::ROOT_HOLDER));
                            }
                        })
                    })
                    .collect();
                for h in handles {
                    h.join().unwrap();
                }
                arena
            },
            BatchSize::SmallInput,
        );
    });
    g.finish();
}

fn bench_gc(c: &mut Criterion) {
    let mut g = c.benchmark_group("arena_gc");
    g.sample_size(20);
    for (name, params) in [
        ("eager", CompactParams { release: 1.0, lazy: 0.0 }),
        ("mixed", CompactParams::default()),
        ("lazy", CompactParams { release: 1.0, lazy: 1.0 }),
    ] {
        g.bench_function(name, |b| {
            b.iter_batched(
                || two_level_tree(61),
                |mut arena| {
                    let report = collect_garbage(&mut arena, |n| n.work() % 2 == 0, params);
                    black_box(report.after);
                    arena
                },
                BatchSize::LargeInput,
            );
        });
    }
    g.finish();
}

criterion_group!(benches, bench_alloc_free, bench_gc);
criterion_main!(benches);
