//! Staged conversions through the session context

use proptest::prelude::*;
use stagehand::testing::FakeDomain;
use stagehand::{
    capture_equip_change, Conversion, DomainError, EntityId, Roster, SessionContext, SlotData,
    SlotDataMap, SlotId, StepModifiers,
};

fn id(name: &str) -> EntityId {
    EntityId::new(name)
}

/// Two uncapped pools feeding two capped retinues
fn domain() -> FakeDomain {
    FakeDomain::new()
        .with_faction("clan", &["militia", "recruit", "guard", "elite"])
        .with_conversion_sources("guard", &["militia", "recruit"])
        .with_conversion_sources("elite", &["militia"])
        .with_capacity("guard", 10)
        .with_capacity("elite", 4)
        .with_cost("guard", 3)
        .with_budget(300)
        .with_count("militia", 20)
        .with_count("recruit", 20)
}

fn session() -> SessionContext<FakeDomain> {
    let mut session = SessionContext::new(domain());
    session.reset();
    session.set_entity(Some(id("guard")), false);
    session
}

#[test]
fn test_netting_through_session() {
    let mut session = session();

    session.stage_conversion(&id("militia"), &id("guard"), 5);
    session.stage_conversion(&id("guard"), &id("militia"), 3);
    assert_eq!(
        session.ledger().orders(),
        &[Conversion::new(id("militia"), id("guard"), 2)]
    );
    assert_eq!(
        session.state().conversion_candidates().get(&id("militia")),
        Some(&2)
    );

    session.stage_conversion(&id("guard"), &id("militia"), 2);
    assert!(session.ledger().orders().is_empty());
    assert_eq!(
        session.state().conversion_candidates().get(&id("militia")),
        Some(&0)
    );
}

#[test]
fn test_capacity_clamp_ignores_origin_size() {
    let mut session = session();
    session.domain_mut().set_count("guard", 9);
    session.domain_mut().set_count("militia", 500);

    assert_eq!(session.virtual_count(&id("guard")), 9);
    assert_eq!(session.max_stageable(&id("militia"), &id("guard")), 1);
    assert_eq!(session.stage_conversion(&id("militia"), &id("guard"), 40), 1);
    assert_eq!(session.max_stageable(&id("militia"), &id("guard")), 0);
}

#[test]
fn test_commit_reclamps_shared_target() {
    let mut session = session();

    // Both orders fit virtually: 4 + 4 into a cap of 10
    session.stage_conversion(&id("militia"), &id("guard"), 4);
    session.stage_conversion(&id("recruit"), &id("guard"), 4);
    assert_eq!(session.virtual_count(&id("guard")), 8);

    // Someone else fills the retinue before commit
    session.domain_mut().set_count("guard", 5);

    let report = session.apply_conversions().unwrap();

    assert_eq!(
        report.applied,
        vec![
            Conversion::new(id("militia"), id("guard"), 4),
            Conversion::new(id("recruit"), id("guard"), 1),
        ]
    );
    assert_eq!(session.domain().count_of(&id("guard")), 10);
    assert_eq!(session.domain().count_of(&id("recruit")), 19);
    assert!(!session.ledger().has_pending());
    assert_eq!(
        session.state().population_counts().get(&id("guard")),
        Some(&10)
    );
}

#[test]
fn test_commit_clears_even_when_everything_is_skipped() {
    let mut session = session();
    session.stage_conversion(&id("militia"), &id("guard"), 3);
    session.domain_mut().set_count("guard", 10);

    let report = session.apply_conversions().unwrap();

    assert!(report.applied.is_empty());
    assert_eq!(report.skipped.len(), 1);
    assert!(!session.ledger().has_pending());
}

#[test]
fn test_illegal_order_is_skipped() {
    let mut session = SessionContext::new(domain().illegal("recruit", "guard"));
    session.reset();

    session.stage_conversion(&id("militia"), &id("guard"), 2);
    session.stage_conversion(&id("recruit"), &id("guard"), 2);
    let report = session.apply_conversions().unwrap();

    assert_eq!(report.applied.len(), 1);
    assert_eq!(
        report.skipped,
        vec![Conversion::new(id("recruit"), id("guard"), 2)]
    );
}

#[test]
fn test_commit_over_budget_is_rejected() {
    let mut session = session();
    session.stage_conversion(&id("militia"), &id("guard"), 10);
    session.domain_mut().set_budget(20);

    let err = session.apply_conversions().unwrap_err();

    assert_eq!(
        err,
        DomainError::InsufficientBudget {
            needed: 30,
            available: 20
        }
    );
    assert!(session.ledger().has_pending());
    assert_eq!(session.domain().count_of(&id("guard")), 0);
}

#[test]
fn test_switching_capped_target_clears_ledger() {
    let mut session = session();
    session.stage_conversion(&id("militia"), &id("guard"), 3);
    session.stage_conversion(&id("recruit"), &id("guard"), 2);

    session.set_entity(Some(id("elite")), false);
    session.stage_conversion(&id("militia"), &id("elite"), 1);

    assert!(session
        .ledger()
        .orders()
        .iter()
        .all(|o| o.to != id("guard") && o.from != id("guard")));
    assert_eq!(session.virtual_count(&id("guard")), 0);
    assert_eq!(session.virtual_count(&id("elite")), 1);
}

#[test]
fn test_budget_bounds_staging() {
    let mut session = session();
    session.domain_mut().set_budget(10);

    // 10 / 3 = 3 affordable
    assert_eq!(session.stage_conversion(&id("militia"), &id("guard"), 9), 3);
    assert_eq!(session.ledger().pending_total_cost(session.domain()), 9);
    assert_eq!(session.stage_conversion(&id("recruit"), &id("guard"), 1), 0);
}

#[test]
fn test_stage_step_click() {
    let mut session = session();

    let step = session.stage_step(StepModifiers::CTRL, &id("guard"));
    assert_eq!(step, 5);
    session.stage_conversion(&id("militia"), &id("guard"), step);

    let step = session.stage_step(StepModifiers::CTRL, &id("militia"));
    assert_eq!(step, 1000);
    // Releasing everything back is bounded by what was staged
    assert_eq!(session.stage_conversion(&id("guard"), &id("militia"), step), 5);
    assert!(!session.ledger().has_pending());
}

#[test]
fn test_identical_snapshots_capture_nothing() {
    let snapshot: SlotDataMap = [(
        SlotId::new("head"),
        SlotData {
            content: Some("cap".into()),
            staged: None,
        },
    )]
    .into_iter()
    .collect();

    let head = SlotId::new("head");
    assert!(capture_equip_change(Some(&snapshot), &snapshot.clone(), &head).is_none());
    assert!(capture_equip_change(Some(&snapshot), &snapshot, &head).is_none());
}

const ENTITIES: [&str; 4] = ["militia", "recruit", "guard", "elite"];

fn stage_op() -> impl Strategy<Value = (usize, usize, u32)> {
    (0..ENTITIES.len(), 0..ENTITIES.len(), 0u32..12)
}

proptest! {
    #[test]
    fn virtual_counts_match_orders(ops in prop::collection::vec(stage_op(), 0..30)) {
        let mut session = session();
        for (from, to, amount) in ops {
            session.stage_conversion(&id(ENTITIES[from]), &id(ENTITIES[to]), amount);

            for name in ENTITIES {
                let e = id(name);
                let orders = session.ledger().orders();
                let inbound: i64 = orders.iter().filter(|o| o.to == e).map(|o| i64::from(o.amount)).sum();
                let outbound: i64 = orders.iter().filter(|o| o.from == e).map(|o| i64::from(o.amount)).sum();
                prop_assert_eq!(
                    session.virtual_count(&e),
                    i64::from(session.domain().count_of(&e)) + inbound - outbound
                );
            }
        }
    }

    #[test]
    fn capacity_never_exceeded(
        present in 0u32..=10,
        ops in prop::collection::vec(stage_op(), 0..30),
    ) {
        let mut session = session();
        session.domain_mut().set_count("guard", present);
        for (from, to, amount) in ops {
            session.stage_conversion(&id(ENTITIES[from]), &id(ENTITIES[to]), amount);
            prop_assert!(session.virtual_count(&id("guard")) <= 10);
            prop_assert!(session.virtual_count(&id("elite")) <= 4);
        }

        session.apply_conversions().unwrap();
        prop_assert!(session.domain().count_of(&id("guard")) <= 10);
        prop_assert!(session.domain().count_of(&id("elite")) <= 4);
        prop_assert!(!session.ledger().has_pending());
    }
}
