mod common;

use chrono::Utc;
use common::{at_risk_customer, ScriptedChannel};
use retention_core::{
    advisor::RuleTableAdvisor,
    config::AgentConfig,
    customer::Customer,
    executor::{correction_for, CorrectionRule, ExecutionReport, InterventionExecutor, MANUAL_REVIEW},
    intervention::StepStatus,
    plan::{OfferType, PlanStep},
    types::{ContactMethod, InterventionStatus, Urgency},
};

// ── Helpers ──────────────────────────────────────────────────────────────────

fn customer() -> Customer {
    Customer { id: 7, ..at_risk_customer("dana@ortiz.io", 0.94) }
}

fn run(channel: &ScriptedChannel, customer: &Customer, steps: &[PlanStep]) -> ExecutionReport {
    let config = AgentConfig::default_test();
    let advisor = RuleTableAdvisor::new(&config.thresholds);
    InterventionExecutor::new(channel, &advisor, &config).execute(customer, "retention_outreach", steps, Utc::now())
}

fn email_outreach() -> PlanStep {
    PlanStep::PersonalizedOutreach { method: Some(ContactMethod::Email) }
}

// ── Tests ────────────────────────────────────────────────────────────────────

/// A failed email is retried by phone exactly once, and a failed retry is
/// not retried again.
#[test]
fn email_failure_retries_by_phone_once() {
    let channel = ScriptedChannel::reliable().failing("email").failing("call");
    let log = channel.log();

    let report = run(&channel, &customer(), &[email_outreach()]);

    assert_eq!(log.calls(), vec!["email", "call"]);
    assert_eq!(report.corrections.len(), 1);
    assert_eq!(report.corrections[0].rule, CorrectionRule::RetryViaPhone);
    assert!(!report.corrections[0].succeeded);
    assert_eq!(report.results.len(), 2);
    assert!(report.results[1].correction);
    assert_eq!(report.status, InterventionStatus::Failed);
}

/// Outreach without a method uses the preferred method, so an
/// email-preferring customer is also retried by phone.
#[test]
fn preferred_email_outreach_retries_by_phone() {
    let channel = ScriptedChannel::reliable().failing("email");

    let report = run(&channel, &customer(), &[PlanStep::PersonalizedOutreach { method: None }]);

    assert_eq!(report.corrections[0].rule, CorrectionRule::RetryViaPhone);
    assert_eq!(report.status, InterventionStatus::Successful);
}

/// An offer declined over budget becomes a payment-plan offer.
#[test]
fn budget_decline_switches_to_payment_plan() {
    let channel = ScriptedChannel::reliable().failing("offer").with_reason("Over BUDGET this quarter");

    let report = run(&channel, &customer(), &[PlanStep::discount(25)]);

    let record = &report.corrections[0];
    assert_eq!(record.rule, CorrectionRule::PaymentPlanOffer);
    assert!(matches!(
        record.corrected_step,
        Some(PlanStep::RetentionOffer { offer_type: OfferType::PaymentPlan, .. })
    ));
    assert_eq!(record.failure_reason.as_deref(), Some("Over BUDGET this quarter"));
}

/// An offer declined for another reason has no alternative.
#[test]
fn other_offer_decline_has_no_alternative() {
    let channel = ScriptedChannel::reliable().failing("offer").with_reason("not interested");
    let log = channel.log();

    let report = run(&channel, &customer(), &[PlanStep::discount(25)]);

    assert_eq!(log.calls(), vec!["offer"]);
    assert_eq!(report.corrections[0].rule, CorrectionRule::NoAlternative);
    assert_eq!(report.results[1].status, StepStatus::CorrectionAttempted);
    assert_eq!(report.status, InterventionStatus::Failed);
}

/// A failed call for a customer who does not prefer the phone becomes a
/// video demo of value.
#[test]
fn failed_call_switches_to_value_demo() {
    let channel = ScriptedChannel::reliable().failing("call");
    let log = channel.log();

    let report = run(&channel, &customer(), &[PlanStep::ScheduleCall { urgency: Urgency::High }]);

    assert_eq!(log.calls(), vec!["call", "demo"]);
    assert_eq!(report.corrections[0].rule, CorrectionRule::ValueDemo);
    assert_eq!(
        report.corrections[0].corrected_step,
        Some(PlanStep::FeatureDemo { method: "video_call".into(), focus: "value_demonstration".into() })
    );
    assert_eq!(report.status, InterventionStatus::Successful);
}

/// Phone-preferring customers get no demo when their call fails.
#[test]
fn failed_call_for_phone_customer_has_no_alternative() {
    let phone_person = Customer { preferred_contact: ContactMethod::Phone, ..customer() };

    assert_eq!(
        correction_for(&PlanStep::ScheduleCall { urgency: Urgency::Medium }, Some("busy"), &phone_person),
        None
    );
}

/// Partial failures do not abort the plan: later steps still run.
#[test]
fn failure_does_not_abort_remaining_steps() {
    let channel = ScriptedChannel::reliable().failing("demo");
    let log = channel.log();
    let steps = [
        PlanStep::FeatureDemo { method: "video_call".into(), focus: "reporting".into() },
        PlanStep::discount(10),
    ];

    let report = run(&channel, &customer(), &steps);

    assert_eq!(log.calls(), vec!["demo", "offer"]);
    assert_eq!(report.status, InterventionStatus::Successful);
}

/// A transport fault is recorded for manual review and is not corrected.
#[test]
fn transport_fault_is_logged_for_review() {
    let channel = ScriptedChannel::reliable().broken("email");
    let log = channel.log();

    let report = run(&channel, &customer(), &[email_outreach()]);

    assert_eq!(log.calls(), vec!["email"]);
    assert!(report.corrections.is_empty());
    assert_eq!(report.results[0].status, StepStatus::ErrorHandled);
    assert_eq!(report.results[0].recovery_action.as_deref(), Some(MANUAL_REVIEW));
    assert_eq!(report.status, InterventionStatus::Failed);
}

/// Steps the executor does not know are recorded and skipped.
#[test]
fn unknown_step_is_a_no_op() {
    let channel = ScriptedChannel::reliable();
    let log = channel.log();
    let step = PlanStep::from_value(&serde_json::json!({ "type": "send_gift_basket" }));

    let report = run(&channel, &customer(), &[step]);

    assert!(log.calls().is_empty());
    assert_eq!(report.results[0].status, StepStatus::UnknownStep);
    assert_eq!(report.results[0].detail.as_deref(), Some("send_gift_basket"));
    assert!(report.corrections.is_empty());
    assert_eq!(report.status, InterventionStatus::Failed);
}

/// Requested discounts are capped at the configured maximum.
#[test]
fn discount_is_capped() {
    let channel = ScriptedChannel::reliable();

    let report = run(&channel, &customer(), &[PlanStep::discount(60)]);

    assert_eq!(report.results[0].detail.as_deref(), Some("30% discount on your next renewal"));
    assert_eq!(report.messages.len(), 1);
}
