//! Plan execution.
//!
//! Steps run in plan order through the notification boundary. For each
//! step:
//!   1. if the intervention budget is spent, the step is `skipped_timeout`
//!      and the channel is not called
//!   2. otherwise the step runs; a call slower than `step_timeout_ms`
//!      counts as failed with reason "timeout"
//!   3. a failed step gets exactly one self-correction attempt
//!
//! Self-correction rules, first match wins:
//!   email outreach failed           → same outreach by phone
//!   offer failed citing "budget"    → payment-plan offer
//!   call failed, phone not preferred → video demo of value
//!   anything else                   → `correction_attempted`, no retry
//!
//! Corrections are never corrected again.
//!
//! The executor does no storage. It returns the step results, the
//! corrections it made and the messages it sent; the engine persists them.

use crate::{
    advisor::{outreach_message, OutreachRequest, StrategyAdvisor},
    communication::{Communication, CommunicationType},
    config::AgentConfig,
    customer::Customer,
    error::NotificationError,
    intervention::{StepResult, StepStatus},
    notification::{DeliveryResult, NotificationChannel},
    plan::{OfferType, PlanStep, DEFAULT_DISCOUNT_PERCENT},
    types::{ContactMethod, InterventionStatus, Urgency},
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::time::{Duration, Instant};

/// Recovery action recorded for steps that hit an unexpected fault.
pub const MANUAL_REVIEW: &str = "logged_for_manual_review";

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CorrectionRule {
    RetryViaPhone,
    PaymentPlanOffer,
    ValueDemo,
    NoAlternative,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct CorrectionRecord {
    pub failed_step:    PlanStep,
    pub failure_reason: Option<String>,
    pub rule:           CorrectionRule,
    pub corrected_step: Option<PlanStep>,
    pub succeeded:      bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionReport {
    pub status:      InterventionStatus,
    pub results:     Vec<StepResult>,
    pub corrections: Vec<CorrectionRecord>,
    pub messages:    Vec<Communication>,
    pub timed_out:   bool,
}

pub struct InterventionExecutor<'a> {
    channel: &'a dyn NotificationChannel,
    advisor: &'a dyn StrategyAdvisor,
    config:  &'a AgentConfig,
}

/// Per-plan context.
struct Run<'c> {
    customer:          &'c Customer,
    intervention_type: &'c str,
    now:               DateTime<Utc>,
    messages:          Vec<Communication>,
}

impl<'a> InterventionExecutor<'a> {
    pub fn new(
        channel: &'a dyn NotificationChannel,
        advisor: &'a dyn StrategyAdvisor,
        config: &'a AgentConfig,
    ) -> Self {
        Self { channel, advisor, config }
    }

    pub fn execute(
        &self,
        customer: &Customer,
        intervention_type: &str,
        steps: &[PlanStep],
        now: DateTime<Utc>,
    ) -> ExecutionReport {
        let budget = Duration::from_secs(self.config.execution.intervention_timeout_secs);
        let started = Instant::now();
        let mut run = Run { customer, intervention_type, now, messages: Vec::new() };
        let mut results = Vec::with_capacity(steps.len());
        let mut corrections = Vec::new();
        let mut timed_out = false;

        for step in steps {
            if started.elapsed() >= budget {
                timed_out = true;
                results.push(StepResult::new(step.kind(), StepStatus::SkippedTimeout, now));
                continue;
            }

            let result = self.run_step(&mut run, step, false);
            let failed = result.status == StepStatus::Failed;
            let failure_reason = result.error.clone();
            results.push(result);

            if failed {
                let (record, correction) = self.self_correct(&mut run, step, failure_reason);
                log::info!(
                    "customer={} self-correction {:?} after {} failed",
                    customer.id,
                    record.rule,
                    step.kind().as_str()
                );
                results.push(correction);
                corrections.push(record);
            }
        }

        let status = if results.iter().any(StepResult::is_success) {
            InterventionStatus::Successful
        } else if timed_out {
            InterventionStatus::Timeout
        } else {
            InterventionStatus::Failed
        };

        ExecutionReport { status, results, corrections, messages: run.messages, timed_out }
    }

    fn self_correct(
        &self,
        run: &mut Run<'_>,
        failed_step: &PlanStep,
        failure_reason: Option<String>,
    ) -> (CorrectionRecord, StepResult) {
        match correction_for(failed_step, failure_reason.as_deref(), run.customer) {
            Some((rule, corrected)) => {
                let result = self.run_step(run, &corrected, true);
                let record = CorrectionRecord {
                    failed_step: failed_step.clone(),
                    failure_reason,
                    rule,
                    corrected_step: Some(corrected),
                    succeeded: result.is_success(),
                };
                (record, result)
            }
            None => {
                let mut result = StepResult::new(failed_step.kind(), StepStatus::CorrectionAttempted, run.now)
                    .with_detail("no alternative strategy");
                result.error = failure_reason.clone();
                result.correction = true;
                let record = CorrectionRecord {
                    failed_step: failed_step.clone(),
                    failure_reason,
                    rule: CorrectionRule::NoAlternative,
                    corrected_step: None,
                    succeeded: false,
                };
                (record, result)
            }
        }
    }

    fn run_step(&self, run: &mut Run<'_>, step: &PlanStep, correction: bool) -> StepResult {
        let started = Instant::now();
        let sent_before = run.messages.len();
        let (detail, delivery) = match step {
            PlanStep::PersonalizedOutreach { method } => {
                let method = method.unwrap_or(run.customer.preferred_contact);
                (method.as_str().to_string(), self.outreach(run, method))
            }
            PlanStep::RetentionOffer { offer_type, discount_percent, target_plan, credit_amount, details } => {
                let text = self.offer_details(*offer_type, *discount_percent, target_plan.as_deref(), *credit_amount, details.as_deref());
                let delivery = self.channel.send_offer(
                    &run.customer.email,
                    &run.customer.name,
                    &text,
                    self.urgency_for(run.customer),
                );
                if matches!(delivery, Ok(true)) {
                    run.messages.push(Communication::outbound(run.customer.id, CommunicationType::Offer, text.clone(), run.now));
                }
                (text, delivery)
            }
            PlanStep::ScheduleCall { urgency } => (
                urgency.as_str().to_string(),
                self.channel.schedule_call(&run.customer.phone, &run.customer.timezone, *urgency),
            ),
            PlanStep::FeatureDemo { method, focus } => {
                let delivery = self.channel.schedule_demo(
                    &run.customer.email,
                    &run.customer.name,
                    focus,
                    run.customer.feature_usage_score,
                );
                (format!("{method}: {focus}"), delivery)
            }
            PlanStep::Unknown { step_type } => {
                log::warn!("customer={} skipping unknown step type '{step_type}'", run.customer.id);
                let mut result = StepResult::new(step.kind(), StepStatus::UnknownStep, run.now)
                    .with_detail(step_type.clone());
                result.correction = correction;
                return result;
            }
        };
        let elapsed = started.elapsed();

        let mut result = match delivery {
            Ok(true) => StepResult::new(step.kind(), StepStatus::Success, run.now),
            Ok(false) => StepResult::new(step.kind(), StepStatus::Failed, run.now).with_error("delivery failed"),
            Err(NotificationError::Declined { reason }) => {
                StepResult::new(step.kind(), StepStatus::Failed, run.now).with_error(reason)
            }
            Err(NotificationError::Transport(e)) => {
                log::error!("customer={} {} transport fault: {e}", run.customer.id, step.kind().as_str());
                let mut r = StepResult::new(step.kind(), StepStatus::ErrorHandled, run.now).with_error(e);
                r.recovery_action = Some(MANUAL_REVIEW.to_string());
                r
            }
        };

        let step_budget = Duration::from_millis(self.config.execution.step_timeout_ms);
        if elapsed > step_budget && result.status == StepStatus::Success {
            result.status = StepStatus::Failed;
            result.error = Some(format!("timeout after {}ms", elapsed.as_millis()));
        }
        // only delivered steps leave a message in the log
        if result.status != StepStatus::Success {
            run.messages.truncate(sent_before);
        }

        result.detail = Some(detail);
        result.correction = correction;
        result.elapsed_ms = elapsed.as_millis() as u64;
        result
    }

    fn outreach(&self, run: &mut Run<'_>, method: ContactMethod) -> DeliveryResult {
        let customer = run.customer;
        match method {
            ContactMethod::Email => {
                let factors = customer.risk_factors();
                let body = outreach_message(
                    self.advisor,
                    &OutreachRequest {
                        customer_name: &customer.name,
                        company: &customer.company,
                        intervention_type: run.intervention_type,
                        risk_factors: &factors,
                    },
                );
                let subject = format!("We value your partnership, {}", customer.name);
                let delivery = self.channel.send_email(&customer.email, &subject, &body);
                if matches!(delivery, Ok(true)) {
                    run.messages.push(Communication::outbound(customer.id, CommunicationType::Email, body, run.now));
                }
                delivery
            }
            ContactMethod::Phone => {
                self.channel.schedule_call(&customer.phone, &customer.timezone, self.urgency_for(customer))
            }
            ContactMethod::Slack => {
                let message = format!(
                    "Hi {}! Your customer success manager would like to connect about getting more out of your plan. \
                     Could we schedule a quick call?",
                    customer.name
                );
                let delivery = self.channel.send_chat(customer.id, &message);
                if matches!(delivery, Ok(true)) {
                    run.messages.push(Communication::outbound(customer.id, CommunicationType::Chat, message, run.now));
                }
                delivery
            }
            ContactMethod::Unsupported => Err(NotificationError::Declined {
                reason: "Unknown contact method".into(),
            }),
        }
    }

    fn urgency_for(&self, customer: &Customer) -> Urgency {
        if customer.churn_probability >= self.config.thresholds.high_urgency_probability {
            Urgency::High
        } else {
            Urgency::Medium
        }
    }

    fn offer_details(
        &self,
        offer_type: OfferType,
        discount_percent: Option<f64>,
        target_plan: Option<&str>,
        credit_amount: Option<f64>,
        details: Option<&str>,
    ) -> String {
        match offer_type {
            OfferType::Discount => {
                let cap = self.config.thresholds.max_discount_percent;
                let requested = discount_percent
                    .filter(|p| p.is_finite() && *p >= 0.0)
                    .map(|p| p.round() as u32)
                    .unwrap_or(DEFAULT_DISCOUNT_PERCENT);
                format!("{}% discount on your next renewal", requested.min(cap))
            }
            OfferType::Upgrade => format!(
                "Complimentary upgrade to {} plan for 3 months",
                target_plan.unwrap_or("Pro")
            ),
            OfferType::PaymentPlan => "Flexible payment terms - pay monthly instead of annually".into(),
            OfferType::FeatureCredit => format!("${:.0} in feature credits", credit_amount.unwrap_or(500.0)),
            OfferType::Custom => details.unwrap_or("Custom retention package").to_string(),
        }
    }
}

/// The correction for a failed step, if one applies.
pub fn correction_for(
    step: &PlanStep,
    failure_reason: Option<&str>,
    customer: &Customer,
) -> Option<(CorrectionRule, PlanStep)> {
    match step {
        PlanStep::PersonalizedOutreach { method }
            if method.unwrap_or(customer.preferred_contact) == ContactMethod::Email =>
        {
            Some((
                CorrectionRule::RetryViaPhone,
                PlanStep::PersonalizedOutreach { method: Some(ContactMethod::Phone) },
            ))
        }
        PlanStep::RetentionOffer { .. }
            if failure_reason.is_some_and(|r| r.to_lowercase().contains("budget")) =>
        {
            Some((
                CorrectionRule::PaymentPlanOffer,
                PlanStep::RetentionOffer {
                    offer_type: OfferType::PaymentPlan,
                    discount_percent: None,
                    target_plan: None,
                    credit_amount: None,
                    details: None,
                },
            ))
        }
        PlanStep::ScheduleCall { .. } if customer.preferred_contact != ContactMethod::Phone => Some((
            CorrectionRule::ValueDemo,
            PlanStep::FeatureDemo {
                method: "video_call".into(),
                focus: "value_demonstration".into(),
            },
        )),
        _ => None,
    }
}
