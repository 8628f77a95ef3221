mod common;

use chrono::Duration;
use common::{at_risk_customer, insert_customer, scripted_engine};
use retention_core::{
    intervention::ChurnIntervention,
    plan::fallback_plan,
    types::{ActivityType, InterventionStatus},
};

/// An intervention left `executing` for more than an hour is marked
/// `timeout` and stops blocking its customer, in the same cycle.
#[test]
fn stale_executing_intervention_is_abandoned() {
    let (mut engine, _p) = scripted_engine(0.94);
    let customer = insert_customer(&engine, &at_risk_customer("dana@ortiz.io", 0.94));
    let now = engine.clock.now();
    let plan = fallback_plan(&customer.profile(), 0.94, 0.9);
    let orphan = ChurnIntervention::open(&customer, &plan, now - Duration::minutes(90));
    let orphan_id = engine.store().insert_intervention(&orphan).unwrap();

    let report = engine.run_cycle();

    assert_eq!(report.orphans_abandoned, 1);
    let stored = engine.store().get_intervention(orphan_id).unwrap();
    assert_eq!(stored.status, InterventionStatus::Timeout);
    assert_eq!(stored.completed_at, Some(now));

    let abandoned = engine.store().activities_of_type(ActivityType::InterventionAbandoned).unwrap();
    assert_eq!(abandoned.len(), 1);
    assert_eq!(abandoned[0].intervention_id, Some(orphan_id));

    assert_eq!(report.interventions_created, 1, "customer is free again once the orphan is closed");
}

/// A young executing intervention is left alone.
#[test]
fn recent_executing_intervention_is_not_an_orphan() {
    let (mut engine, _p) = scripted_engine(0.94);
    let customer = insert_customer(&engine, &at_risk_customer("dana@ortiz.io", 0.94));
    let now = engine.clock.now();
    let plan = fallback_plan(&customer.profile(), 0.94, 0.9);
    let id = engine
        .store()
        .insert_intervention(&ChurnIntervention::open(&customer, &plan, now - Duration::minutes(20)))
        .unwrap();

    let report = engine.run_cycle();

    assert_eq!(report.orphans_abandoned, 0);
    assert_eq!(engine.store().get_intervention(id).unwrap().status, InterventionStatus::Executing);
}
