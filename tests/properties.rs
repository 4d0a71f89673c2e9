// ==============================================
// ENGINE PROPERTY TESTS (integration)
// ==============================================
//
// Random operation sequences checked against a membership model: a page is
// queued exactly when the last intent realized for it says so.

mod common;

use common::TestOwner;
use pagekit::builder::EngineBuilder;
use pagekit::config::PolicyKind;
use pagekit::engine::EvictionEngine;
use pagekit::page::{Intent, PageId, QueueTag};
use proptest::prelude::*;

const PAGES: usize = 24;

#[derive(Debug, Clone)]
enum Op {
    Intent(usize, Intent),
    Realize(usize, usize),
    Reference(usize),
    FlushAll,
    Scan,
    Balance(u32),
    Tune,
}

fn intent_strategy() -> impl Strategy<Value = Intent> {
    prop_oneof![
        Just(Intent::Activate),
        Just(Intent::Deactivate),
        Just(Intent::Enqueue),
        Just(Intent::Dequeue),
    ]
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        4 => (0..PAGES, intent_strategy()).prop_map(|(p, i)| Op::Intent(p, i)),
        4 => (0..PAGES, 0..2usize).prop_map(|(p, cpu)| Op::Realize(p, cpu)),
        1 => (0..PAGES).prop_map(Op::Reference),
        1 => Just(Op::FlushAll),
        2 => Just(Op::Scan),
        1 => (0u32..3).prop_map(Op::Balance),
        1 => Just(Op::Tune),
    ]
}

#[derive(Debug, Default, Clone, Copy)]
struct ModelPage {
    queued: bool,
    intent: Option<Intent>,
    pending: bool,
    // an entry stays in its ring even after realize_now consumed the intent
    in_ring: bool,
}

struct Model {
    kind: PolicyKind,
    pages: Vec<ModelPage>,
}

impl Model {
    fn new(kind: PolicyKind) -> Self {
        Self {
            kind,
            pages: vec![ModelPage::default(); PAGES],
        }
    }

    fn flush(&mut self) {
        for index in 0..PAGES {
            if self.pages[index].in_ring {
                self.realize(index);
            }
        }
    }

    fn realize(&mut self, index: usize) {
        let page = &mut self.pages[index];
        page.pending = false;
        page.in_ring = false;
        match page.intent.take() {
            Some(Intent::Activate | Intent::Enqueue) => page.queued = true,
            Some(Intent::Deactivate) if self.kind == PolicyKind::Clock => page.queued = true,
            Some(Intent::Dequeue) => page.queued = false,
            _ => {}
        }
    }
}

fn engine(kind: PolicyKind) -> EvictionEngine<TestOwner> {
    // rings never overflow, so realization happens only at flush time
    EngineBuilder::new(kind, PAGES)
        .ncpu(2)
        .ring_capacity(1024)
        .build(TestOwner::new(PAGES))
}

fn assert_matches(engine: &EvictionEngine<TestOwner>, model: &Model) -> Result<(), TestCaseError> {
    for (index, expected) in model.pages.iter().enumerate() {
        let queue = engine.page_queue(PageId::new(index));
        prop_assert_eq!(queue.is_some(), expected.queued, "page {}", index);
        if let Some(queue) = queue {
            let allowed: &[QueueTag] = match model.kind {
                PolicyKind::Clock => &[QueueTag::Active, QueueTag::Inactive],
                PolicyKind::ClockPro => &[QueueTag::New, QueueTag::Cold, QueueTag::Hot],
            };
            prop_assert!(allowed.contains(&queue), "{:?} on {:?}", model.kind, queue);
        }
    }
    if let Err(err) = engine.check_invariants() {
        return Err(TestCaseError::fail(err.to_string()));
    }
    Ok(())
}

fn run(kind: PolicyKind, ops: Vec<Op>) -> Result<(), TestCaseError> {
    let engine = engine(kind);
    let mut model = Model::new(kind);

    for op in ops {
        match op {
            Op::Intent(index, intent) => {
                let mut guard = engine.lock_page(PageId::new(index));
                match intent {
                    Intent::Activate => guard.activate(),
                    Intent::Deactivate => guard.deactivate(),
                    Intent::Enqueue => guard.enqueue(),
                    Intent::Dequeue => guard.dequeue(),
                }
                model.pages[index].intent = Some(intent);
            }
            Op::Realize(index, cpu) => {
                engine.page_realize_on(cpu, PageId::new(index));
                let page = &mut model.pages[index];
                if page.intent.is_some() && !page.pending {
                    page.pending = true;
                    page.in_ring = true;
                }
            }
            Op::Reference(index) => engine.owner().reference(PageId::new(index)),
            Op::FlushAll => {
                engine.flush_all();
                model.flush();
                assert_matches(&engine, &model)?;
            }
            Op::Scan => {
                engine.scan_init();
                if let Some((victim, ())) = engine.select_victim() {
                    prop_assert!(model.pages[victim.index()].queued);
                    engine.page_dequeue(victim);
                    engine.realize_now(victim);
                    let page = &mut model.pages[victim.index()];
                    page.queued = false;
                    page.intent = None;
                    page.pending = false;
                }
                engine.scan_fini();
            }
            Op::Balance(swap) => engine.balance_queue(swap),
            Op::Tune => engine.tune(),
        }
    }

    engine.flush_all();
    model.flush();
    assert_matches(&engine, &model)?;
    let (active, inactive) = engine.estimate_pageable();
    prop_assert_eq!(
        active + inactive,
        model.pages.iter().filter(|p| p.queued).count()
    );
    Ok(())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    #[test]
    fn clock_membership_follows_intents(ops in prop::collection::vec(op_strategy(), 1..160)) {
        run(PolicyKind::Clock, ops)?;
    }

    #[test]
    fn clock_pro_membership_follows_intents(ops in prop::collection::vec(op_strategy(), 1..160)) {
        run(PolicyKind::ClockPro, ops)?;
    }
}
