mod common;

use common::{at_risk_customer, insert_customer, scripted_engine, ScriptedChannel};
use retention_core::{
    communication::CommunicationType,
    intervention::StepStatus,
    plan::StepKind,
    types::{ActivityType, InterventionStatus},
};

/// With no intervention budget left, no step reaches the channel and the
/// intervention ends as `timeout`.
#[test]
fn exhausted_budget_skips_every_step() {
    let (engine, _p) = scripted_engine(0.94);
    let channel = ScriptedChannel::reliable();
    let log = channel.log();
    let mut engine = engine.with_channel(Box::new(channel));
    engine.config.execution.intervention_timeout_secs = 0;
    let customer = insert_customer(&engine, &at_risk_customer("dana@ortiz.io", 0.94));

    let report = engine.run_cycle();

    assert_eq!(report.errors, 0);
    assert!(log.calls().is_empty());
    let intervention = &engine.store().interventions_for_customer(customer.id).unwrap()[0];
    assert_eq!(intervention.status, InterventionStatus::Timeout);
    assert_eq!(intervention.outcome_details.len(), 3);
    assert!(intervention
        .outcome_details
        .iter()
        .all(|s| s.status == StepStatus::SkippedTimeout));

    let executed = engine.store().activities_of_type(ActivityType::InterventionExecuted).unwrap();
    assert_eq!(executed[0].metadata["timed_out"], true);
}

/// A delivery slower than the step budget counts as a failure and goes
/// through self-correction.
#[test]
fn slow_step_fails_and_is_corrected() {
    let (engine, _p) = scripted_engine(0.94);
    let channel = ScriptedChannel::reliable().slow("email", 40);
    let log = channel.log();
    let mut engine = engine.with_channel(Box::new(channel));
    engine.config.execution.step_timeout_ms = 5;
    let customer = insert_customer(&engine, &at_risk_customer("dana@ortiz.io", 0.94));

    engine.run_cycle();

    let intervention = &engine.store().interventions_for_customer(customer.id).unwrap()[0];
    let first = &intervention.outcome_details[0];
    assert_eq!(first.status, StepStatus::Failed);
    assert!(first.error.as_deref().unwrap_or_default().starts_with("timeout after"));
    assert!(first.elapsed_ms >= 40);
    assert_eq!(log.calls()[..2], ["email", "call"]);
    assert_eq!(intervention.status, InterventionStatus::Successful);
}

/// A slow delivery that failed on its own keeps the channel's reason, so a
/// budget decline is still answered with a payment plan.
#[test]
fn slow_decline_keeps_its_reason() {
    let (engine, _p) = scripted_engine(0.94);
    let channel = ScriptedChannel::reliable()
        .failing("offer")
        .with_reason("over budget this quarter")
        .slow("offer", 40);
    let mut engine = engine.with_channel(Box::new(channel));
    engine.config.execution.step_timeout_ms = 5;
    let customer = insert_customer(&engine, &at_risk_customer("dana@ortiz.io", 0.94));

    engine.run_cycle();

    let intervention = &engine.store().interventions_for_customer(customer.id).unwrap()[0];
    let offer = intervention
        .outcome_details
        .iter()
        .find(|s| s.step_type == StepKind::RetentionOffer && !s.correction)
        .expect("offer step recorded");
    assert_eq!(offer.status, StepStatus::Failed);
    assert_eq!(offer.error.as_deref(), Some("over budget this quarter"));

    let corrections = engine.store().activities_of_type(ActivityType::SelfCorrection).unwrap();
    assert!(corrections.iter().any(|a| a.metadata["rule"] == "payment_plan_offer"));
}

/// A delivery that arrived too late counts as failed and is not logged as a
/// sent communication.
#[test]
fn slow_success_leaves_no_message() {
    let (engine, _p) = scripted_engine(0.94);
    let mut engine = engine.with_channel(Box::new(ScriptedChannel::reliable().slow("email", 40)));
    engine.config.execution.step_timeout_ms = 5;
    let customer = insert_customer(&engine, &at_risk_customer("dana@ortiz.io", 0.94));

    engine.run_cycle();

    let sent = engine.store().communications_for_customer(customer.id).unwrap();
    assert!(sent.iter().all(|c| c.communication_type != CommunicationType::Email));
    assert!(sent.iter().any(|c| c.communication_type == CommunicationType::Offer));
}
