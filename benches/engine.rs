//! Benchmarks for the eviction engine.
//!
//! Run with: `cargo bench --bench engine`

use std::hint::black_box;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Instant;

use criterion::{BatchSize, BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use pagekit::builder::EngineBuilder;
use pagekit::config::PolicyKind;
use pagekit::engine::EvictionEngine;
use pagekit::page::{ObjectId, PageClass, PageId, PageIdentity};
use pagekit::traits::PageOwner;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

const PAGES: usize = 16_384;
const OPS: u64 = 100_000;
const KINDS: [PolicyKind; 2] = [PolicyKind::Clock, PolicyKind::ClockPro];

struct BenchOwner {
    referenced: Vec<AtomicBool>,
}

impl BenchOwner {
    fn new(pages: usize) -> Self {
        Self {
            referenced: (0..pages).map(|_| AtomicBool::new(false)).collect(),
        }
    }
}

impl PageOwner for BenchOwner {
    type Token = ();

    fn try_lock_owner(&self, _page: PageId) -> Option<()> {
        Some(())
    }

    fn test_and_clear_reference(&self, page: PageId) -> bool {
        self.referenced[page.index()].swap(false, Ordering::Relaxed)
    }

    fn try_drop_swap(&self, _page: PageId) -> bool {
        false
    }

    fn identity(&self, page: PageId) -> PageIdentity {
        PageIdentity::new(ObjectId(7), page.index() as u64, PageClass::File)
    }

    fn free_pages(&self) -> usize {
        0
    }

    fn free_target(&self) -> usize {
        PAGES / 64
    }
}

fn populated(kind: PolicyKind, ncpu: usize) -> EvictionEngine<Arc<BenchOwner>> {
    let engine = EngineBuilder::new(kind, PAGES)
        .ncpu(ncpu)
        .ring_capacity(64)
        .build(Arc::new(BenchOwner::new(PAGES)));
    for i in 0..PAGES {
        let page = PageId::new(i);
        engine.page_activate(page);
        engine.page_realize(page);
    }
    engine.flush_all();
    engine.tune();
    engine
}

// ============================================================================
// Intent + realize through the per-CPU ring (batched under the global lock)
// ============================================================================

fn bench_ring_realize(c: &mut Criterion) {
    let mut group = c.benchmark_group("ring_realize");
    group.throughput(Throughput::Elements(OPS));

    for kind in KINDS {
        group.bench_with_input(BenchmarkId::from_parameter(kind), &kind, |b, &kind| {
            let engine = populated(kind, 1);
            let mut rng = SmallRng::seed_from_u64(1);
            b.iter(|| {
                for _ in 0..OPS {
                    let page = PageId::new(rng.random_range(0..PAGES));
                    engine.page_activate(page);
                    engine.page_realize(black_box(page));
                }
                engine.flush_all();
            })
        });
    }

    group.finish();
}

// ============================================================================
// Direct realization (one global lock per page)
// ============================================================================

fn bench_realize_now(c: &mut Criterion) {
    let mut group = c.benchmark_group("realize_now");
    group.throughput(Throughput::Elements(OPS));

    for kind in KINDS {
        group.bench_with_input(BenchmarkId::from_parameter(kind), &kind, |b, &kind| {
            let engine = populated(kind, 1);
            let mut rng = SmallRng::seed_from_u64(2);
            b.iter(|| {
                for _ in 0..OPS {
                    let page = PageId::new(rng.random_range(0..PAGES));
                    engine.page_deactivate(page);
                    engine.realize_now(black_box(page));
                }
            })
        });
    }

    group.finish();
}

// ============================================================================
// Reclaim cycle: select victims, dequeue them, fault them back in
// ============================================================================

fn bench_reclaim_cycle(c: &mut Criterion) {
    const VICTIMS: usize = 1024;
    let mut group = c.benchmark_group("reclaim_cycle");
    group.throughput(Throughput::Elements(VICTIMS as u64));

    for kind in KINDS {
        group.bench_with_input(BenchmarkId::from_parameter(kind), &kind, |b, &kind| {
            b.iter_batched(
                || populated(kind, 1),
                |engine| {
                    if engine.needs_scan() {
                        engine.balance_queue(0);
                    }
                    engine.scan_init();
                    let mut victims = Vec::with_capacity(VICTIMS);
                    while victims.len() < VICTIMS {
                        let Some((page, token)) = engine.select_victim() else {
                            break;
                        };
                        drop(token);
                        engine.page_dequeue(page);
                        engine.realize_now(page);
                        victims.push(page);
                    }
                    engine.scan_fini();
                    for page in victims {
                        engine.page_activate(page);
                        engine.page_realize(page);
                    }
                    engine.flush_all();
                    black_box(engine.queued_pages())
                },
                BatchSize::LargeInput,
            )
        });
    }

    group.finish();
}

// ============================================================================
// Concurrent intents: threads touching disjoint pages
// ============================================================================

fn bench_concurrent_intents(c: &mut Criterion) {
    const THREADS: usize = 4;
    let mut group = c.benchmark_group("concurrent_intents");
    group.throughput(Throughput::Elements(OPS));

    for kind in KINDS {
        group.bench_with_input(BenchmarkId::from_parameter(kind), &kind, |b, &kind| {
            let engine = Arc::new(populated(kind, THREADS));
            b.iter_custom(|iters| {
                let start = Instant::now();
                for _ in 0..iters {
                    let handles: Vec<_> = (0..THREADS)
                        .map(|t| {
                            let engine = Arc::clone(&engine);
                            thread::spawn(move || {
                                let per_thread = OPS as usize / THREADS;
                                for i in 0..per_thread {
                                    let page = PageId::new((t + i * THREADS) % PAGES);
                                    engine.page_activate(page);
                                    engine.page_realize(page);
                                }
                                engine.flush();
                            })
                        })
                        .collect();
                    for handle in handles {
                        let _ = handle.join();
                    }
                }
                start.elapsed()
            })
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_ring_realize,
    bench_realize_now,
    bench_reclaim_cycle,
    bench_concurrent_intents
);
criterion_main!(benches);
