mod common;

use chrono::Duration;
use common::{at_risk_customer, insert_customer, scripted_engine};
use retention_core::{
    patterns::pattern_key,
    types::{ActivityType, Segment},
};

/// A retained outcome creates the (segment, type, strategy) pattern at 1.0
/// in the same cycle as the follow-up, and marks the intervention as fed back.
#[test]
fn retained_outcome_creates_pattern() {
    let (mut engine, p) = scripted_engine(0.94);
    let customer = insert_customer(&engine, &at_risk_customer("dana@ortiz.io", 0.94));
    engine.run_cycle();
    p.set(0.70);
    engine.clock.advance(Duration::hours(30));

    let report = engine.run_cycle();

    assert_eq!(report.follow_ups, 1);
    assert_eq!(report.patterns_updated, 1);
    let name = pattern_key(Segment::MidMarket, "retention_outreach", "satisfaction_recovery");
    let pattern = engine.store().pattern_by_name(&name).unwrap().expect("pattern created");
    assert_eq!(pattern.success_rate, 1.0);
    assert_eq!(pattern.successful_interventions, vec!["satisfaction_recovery".to_string()]);
    assert_eq!(pattern.churn_reason_category, "retention_outreach");
    assert!(!pattern.embedding.is_empty());

    let intervention = &engine.store().interventions_for_customer(customer.id).unwrap()[0];
    assert!(intervention.pattern_feedback_at.is_some());
    let learned = engine.store().activities_of_type(ActivityType::PatternLearning).unwrap();
    assert_eq!(learned.len(), 1);
    assert_eq!(learned[0].metadata["success"], true);
}

/// A non-retained outcome creates the pattern at 0.1.
#[test]
fn stable_outcome_counts_as_failure() {
    let (mut engine, p) = scripted_engine(0.94);
    insert_customer(&engine, &at_risk_customer("dana@ortiz.io", 0.94));
    engine.run_cycle();
    // stable: the drop stays under 0.10
    p.set(0.90);
    engine.clock.advance(Duration::hours(30));

    engine.run_cycle();

    let name = pattern_key(Segment::MidMarket, "retention_outreach", "satisfaction_recovery");
    let pattern = engine.store().pattern_by_name(&name).unwrap().expect("pattern created");
    assert!((pattern.success_rate - 0.1).abs() < 1e-12);
    assert!(pattern.successful_interventions.is_empty());
}

/// An outcome feeds the library exactly once, however many cycles follow.
#[test]
fn each_outcome_is_learned_once() {
    let (mut engine, p) = scripted_engine(0.94);
    insert_customer(&engine, &at_risk_customer("dana@ortiz.io", 0.94));
    engine.run_cycle();
    p.set(0.70);
    engine.clock.advance(Duration::hours(30));

    let mut updates = 0;
    for _ in 0..4 {
        updates += engine.run_cycle().patterns_updated;
        engine.clock.advance(Duration::hours(6));
    }

    assert_eq!(updates, 1);
    let name = pattern_key(Segment::MidMarket, "retention_outreach", "satisfaction_recovery");
    assert_eq!(engine.store().pattern_by_name(&name).unwrap().unwrap().success_rate, 1.0);
}

/// The seeded historical intervention is already fed back and is not
/// learned again.
#[test]
fn seeded_history_is_not_relearned() {
    let (mut engine, _p) = scripted_engine(0.10);
    engine.seed_demo_data().unwrap();

    let report = engine.run_cycle();

    assert_eq!(report.patterns_updated, 0);
    assert_eq!(report.follow_ups, 0);
}
