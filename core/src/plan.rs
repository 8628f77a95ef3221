//! Intervention plans: what the advisor proposes and what the executor runs.
//!
//! RULE: a plan that reaches the executor has passed `validate()`. Steps the
//! executor does not understand are kept as `PlanStep::Unknown` rather than
//! failing the whole plan, and are reported as `unknown_step` no-ops.

use crate::{
    customer::CustomerProfile,
    error::{AgentError, AgentResult},
    types::{ContactMethod, RiskLevel, Segment, Urgency},
};
use serde::{Deserialize, Serialize};

/// Confidence attached to every rule-table plan.
pub const FALLBACK_CONFIDENCE: f64 = 0.75;

/// Discount offered when a step does not name one.
pub const DEFAULT_DISCOUNT_PERCENT: u32 = 20;

/// Discount the rule-table plan offers.
pub const FALLBACK_DISCOUNT_PERCENT: u32 = 15;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum OfferType {
    #[default]
    Discount,
    Upgrade,
    PaymentPlan,
    FeatureCredit,
    #[serde(other)]
    Custom,
}

/// One executable step of a plan. Serialized with a `type` tag, which is
/// also the shape the advisor is asked to produce.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PlanStep {
    /// `method: None` means the customer's preferred contact method.
    PersonalizedOutreach {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        method: Option<ContactMethod>,
    },
    RetentionOffer {
        #[serde(default)]
        offer_type: OfferType,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        discount_percent: Option<f64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        target_plan: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        credit_amount: Option<f64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        details: Option<String>,
    },
    ScheduleCall {
        #[serde(default)]
        urgency: Urgency,
    },
    FeatureDemo {
        #[serde(default = "default_demo_method")]
        method: String,
        #[serde(default = "default_demo_focus")]
        focus: String,
    },
    Unknown {
        step_type: String,
    },
}

fn default_demo_method() -> String {
    "video_call".into()
}

fn default_demo_focus() -> String {
    "underutilized_features".into()
}

/// Closed form of a step's type, used in step results and logs.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum StepKind {
    PersonalizedOutreach,
    RetentionOffer,
    ScheduleCall,
    FeatureDemo,
    Unknown,
}

impl StepKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PersonalizedOutreach => "personalized_outreach",
            Self::RetentionOffer => "retention_offer",
            Self::ScheduleCall => "schedule_call",
            Self::FeatureDemo => "feature_demo",
            Self::Unknown => "unknown",
        }
    }
}

impl PlanStep {
    pub fn kind(&self) -> StepKind {
        match self {
            Self::PersonalizedOutreach { .. } => StepKind::PersonalizedOutreach,
            Self::RetentionOffer { .. } => StepKind::RetentionOffer,
            Self::ScheduleCall { .. } => StepKind::ScheduleCall,
            Self::FeatureDemo { .. } => StepKind::FeatureDemo,
            Self::Unknown { .. } => StepKind::Unknown,
        }
    }

    /// Decode one step from an advisor payload. Anything that does not fit a
    /// known step shape becomes `Unknown`, carrying whatever `type` it named.
    pub fn from_value(value: &serde_json::Value) -> PlanStep {
        match serde_json::from_value::<PlanStep>(value.clone()) {
            Ok(step) => step,
            Err(_) => PlanStep::Unknown {
                step_type: value
                    .get("type")
                    .and_then(|t| t.as_str())
                    .unwrap_or("missing")
                    .to_string(),
            },
        }
    }

    pub fn discount(percent: u32) -> Self {
        Self::RetentionOffer {
            offer_type: OfferType::Discount,
            discount_percent: Some(percent as f64),
            target_plan: None,
            credit_amount: None,
            details: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InterventionPlan {
    pub trigger_reason:        String,
    pub intervention_type:     String,
    pub strategy:              String,
    pub confidence:            f64,
    pub expected_success_rate: f64,
    pub execution_plan:        Vec<PlanStep>,
    #[serde(default)]
    pub reasoning:             String,
}

/// Wire shape of an advisor response. Steps stay raw so a single bad step
/// degrades to `Unknown` instead of rejecting the plan.
#[derive(Deserialize)]
struct RawPlan {
    trigger_reason:        String,
    intervention_type:     String,
    strategy:              String,
    confidence:            f64,
    expected_success_rate: f64,
    execution_plan:        Vec<serde_json::Value>,
    #[serde(default)]
    reasoning:             String,
}

impl InterventionPlan {
    /// Parse an advisor response. Tolerates a surrounding ```json fence.
    pub fn from_response(text: &str) -> AgentResult<Self> {
        let body = strip_code_fence(text);
        let raw: RawPlan = serde_json::from_str(body)
            .map_err(|e| AgentError::InvalidPlan(format!("unparseable plan: {e}")))?;
        let plan = InterventionPlan {
            trigger_reason:        raw.trigger_reason,
            intervention_type:     raw.intervention_type,
            strategy:              raw.strategy,
            confidence:            raw.confidence,
            expected_success_rate: raw.expected_success_rate,
            execution_plan:        raw.execution_plan.iter().map(PlanStep::from_value).collect(),
            reasoning:             raw.reasoning,
        };
        plan.validate()?;
        Ok(plan)
    }

    pub fn validate(&self) -> AgentResult<()> {
        if self.intervention_type.trim().is_empty() {
            return Err(AgentError::InvalidPlan("intervention_type is blank".into()));
        }
        if self.strategy.trim().is_empty() {
            return Err(AgentError::InvalidPlan("strategy is blank".into()));
        }
        for (name, value) in [
            ("confidence", self.confidence),
            ("expected_success_rate", self.expected_success_rate),
        ] {
            if !value.is_finite() || !(0.0..=1.0).contains(&value) {
                return Err(AgentError::InvalidPlan(format!("{name} out of range: {value}")));
            }
        }
        if self.execution_plan.is_empty() {
            return Err(AgentError::InvalidPlan("execution_plan is empty".into()));
        }
        Ok(())
    }
}

/// The `{...}` body of a response that may be wrapped in a markdown fence.
pub fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

// ── Rule table ─────────────────────────────────────────────────

/// Deterministic plan used whenever the advisor is unavailable or answers
/// with something unusable. First matching row wins:
///
/// | condition        | strategy              | intervention_type  | expected |
/// |------------------|-----------------------|--------------------|----------|
/// | enterprise       | executive_outreach    | success_call       | 0.78     |
/// | usage < 0.3      | feature_adoption      | feature_demo       | 0.65     |
/// | nps < 6          | satisfaction_recovery | retention_outreach | 0.71     |
/// | otherwise        | value_reinforcement   | discount_offer     | 0.68     |
pub fn fallback_plan(
    profile: &CustomerProfile,
    churn_probability: f64,
    high_urgency_probability: f64,
) -> InterventionPlan {
    let (strategy, intervention_type, expected_success_rate) =
        if profile.segment == Segment::Enterprise {
            ("executive_outreach", "success_call", 0.78)
        } else if profile.feature_usage_score < 0.3 {
            ("feature_adoption", "feature_demo", 0.65)
        } else if profile.nps_score < 6.0 {
            ("satisfaction_recovery", "retention_outreach", 0.71)
        } else {
            ("value_reinforcement", "discount_offer", 0.68)
        };

    let urgency = if churn_probability >= high_urgency_probability {
        Urgency::High
    } else {
        Urgency::Medium
    };
    let level = crate::risk_scorer::RiskScorer::risk_level(churn_probability);

    InterventionPlan {
        trigger_reason: trigger_reason(churn_probability, level),
        intervention_type: intervention_type.into(),
        strategy: strategy.into(),
        confidence: FALLBACK_CONFIDENCE,
        expected_success_rate,
        execution_plan: vec![
            PlanStep::PersonalizedOutreach { method: Some(profile.preferred_contact) },
            PlanStep::discount(FALLBACK_DISCOUNT_PERCENT),
            PlanStep::ScheduleCall { urgency },
        ],
        reasoning: format!(
            "Rule-based {intervention_type} for a {} customer (usage {:.2}, NPS {})",
            profile.segment, profile.feature_usage_score, profile.nps_score
        ),
    }
}

pub fn trigger_reason(churn_probability: f64, level: RiskLevel) -> String {
    format!("High churn probability ({:.1}%) with {level} risk", churn_probability * 100.0)
}
