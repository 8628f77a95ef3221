//! Churn interventions and the results of executing their steps.

use crate::{
    customer::Customer,
    plan::{InterventionPlan, PlanStep, StepKind},
    types::{ActualOutcome, CustomerId, InterventionId, InterventionStatus},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChurnIntervention {
    /// 0 until the row is inserted.
    pub id:                        InterventionId,
    pub customer_id:               CustomerId,
    pub intervention_type:         String,
    pub churn_probability_before:  f64,
    pub churn_probability_after:   Option<f64>,
    pub trigger_reason:            String,
    pub strategy_chosen:           String,
    pub confidence_score:          f64,
    pub expected_success_rate:     f64,
    pub status:                    InterventionStatus,
    pub execution_steps:           Vec<PlanStep>,
    pub outcome_details:           Vec<StepResult>,
    pub revenue_at_risk:           f64,
    pub estimated_retention_value: f64,
    pub actual_outcome:            Option<ActualOutcome>,
    pub reasoning:                 String,
    pub created_at:                DateTime<Utc>,
    pub completed_at:              Option<DateTime<Utc>>,
    pub follow_up_at:              Option<DateTime<Utc>>,
    pub pattern_feedback_at:       Option<DateTime<Utc>>,
}

impl ChurnIntervention {
    /// A new `executing` intervention for `customer` following `plan`.
    pub fn open(customer: &Customer, plan: &InterventionPlan, now: DateTime<Utc>) -> Self {
        let revenue_at_risk = customer.annual_contract_value;
        Self {
            id: 0,
            customer_id: customer.id,
            intervention_type: plan.intervention_type.clone(),
            churn_probability_before: customer.churn_probability,
            churn_probability_after: None,
            trigger_reason: plan.trigger_reason.clone(),
            strategy_chosen: plan.strategy.clone(),
            confidence_score: plan.confidence,
            expected_success_rate: plan.expected_success_rate,
            status: InterventionStatus::Executing,
            execution_steps: plan.execution_plan.clone(),
            outcome_details: Vec::new(),
            revenue_at_risk,
            estimated_retention_value: revenue_at_risk * plan.expected_success_rate,
            actual_outcome: None,
            reasoning: plan.reasoning.clone(),
            created_at: now,
            completed_at: None,
            follow_up_at: None,
            pattern_feedback_at: None,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Success,
    Failed,
    /// The executor has no handler for the step type. Treated as a no-op.
    UnknownStep,
    /// A failure with no applicable correction.
    CorrectionAttempted,
    /// The channel raised an unexpected fault; the step awaits manual review.
    ErrorHandled,
    /// The intervention budget ran out before the step started.
    SkippedTimeout,
}

impl StepStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Failed => "failed",
            Self::UnknownStep => "unknown_step",
            Self::CorrectionAttempted => "correction_attempted",
            Self::ErrorHandled => "error_handled",
            Self::SkippedTimeout => "skipped_timeout",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StepResult {
    pub step_type:       StepKind,
    pub status:          StepStatus,
    /// Method, offer text, urgency or focus, depending on the step.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail:          Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error:           Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recovery_action: Option<String>,
    /// Set on the result of a self-correction attempt.
    #[serde(default)]
    pub correction:      bool,
    pub elapsed_ms:      u64,
    pub timestamp:       DateTime<Utc>,
}

impl StepResult {
    pub fn new(step_type: StepKind, status: StepStatus, timestamp: DateTime<Utc>) -> Self {
        Self {
            step_type,
            status,
            detail: None,
            error: None,
            recovery_action: None,
            correction: false,
            elapsed_ms: 0,
            timestamp,
        }
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }

    pub fn is_success(&self) -> bool {
        self.status == StepStatus::Success
    }
}

// ── Follow-up ──────────────────────────────────────────────────

/// How the agent reads a follow-up measurement.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FollowUpVerdict {
    Success,
    PartialSuccess,
    NeedsEscalation,
}

/// Map the drop in churn probability since the intervention to an outcome.
/// Both bounds are strict: exactly +0.10 is `stable`, exactly -0.05 is
/// `at_risk`.
pub fn classify_improvement(improvement: f64) -> (ActualOutcome, FollowUpVerdict) {
    if improvement > 0.10 {
        (ActualOutcome::Retained, FollowUpVerdict::Success)
    } else if improvement > -0.05 {
        (ActualOutcome::Stable, FollowUpVerdict::PartialSuccess)
    } else {
        (ActualOutcome::AtRisk, FollowUpVerdict::NeedsEscalation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classification_boundaries() {
        assert_eq!(classify_improvement(0.25).0, ActualOutcome::Retained);
        assert_eq!(classify_improvement(0.100_001).0, ActualOutcome::Retained);
        assert_eq!(classify_improvement(0.10).0, ActualOutcome::Stable);
        assert_eq!(classify_improvement(0.0).0, ActualOutcome::Stable);
        assert_eq!(classify_improvement(-0.049).0, ActualOutcome::Stable);
        assert_eq!(classify_improvement(-0.05).0, ActualOutcome::AtRisk);
        assert_eq!(classify_improvement(-0.3), (ActualOutcome::AtRisk, FollowUpVerdict::NeedsEscalation));
    }
}
