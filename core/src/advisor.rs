//! Strategy advisor: turns a customer's situation into an intervention plan.
//!
//! The engine never trusts an advisor blindly. `decide_plan` wraps any
//! advisor with three guards, applied in order:
//!
//!   1. an error or unusable answer is replaced by the rule-table plan
//!   2. the plan must pass `InterventionPlan::validate`
//!   3. confidence below the floor is handled by the low-confidence policy
//!
//! `RuleTableAdvisor` answers from the rule table alone and is the default.
//! `CompletionAdvisor` delegates to any text-completion backend and parses
//! its JSON answer.

use crate::{
    communication::Communication,
    config::{LowConfidencePolicy, ThresholdConfig},
    customer::CustomerProfile,
    error::{AgentError, AgentResult},
    memory::RecalledMemory,
    patterns::PatternMatch,
    plan::{fallback_plan, InterventionPlan},
};
use serde::Serialize;

/// Everything the advisor may consider when planning.
#[derive(Debug, Clone, Serialize)]
pub struct PlanRequest<'a> {
    pub profile:           &'a CustomerProfile,
    pub churn_probability: f64,
    pub similar_cases:     &'a [PatternMatch],
    pub memories:          &'a [RecalledMemory],
    pub communications:    &'a [Communication],
}

#[derive(Debug, Clone, Serialize)]
pub struct OutreachRequest<'a> {
    pub customer_name:     &'a str,
    pub company:           &'a str,
    pub intervention_type: &'a str,
    pub risk_factors:      &'a [(String, String)],
}

pub trait StrategyAdvisor {
    fn name(&self) -> &'static str;
    fn propose_plan(&self, request: &PlanRequest<'_>) -> AgentResult<InterventionPlan>;
    fn compose_outreach(&self, request: &OutreachRequest<'_>) -> AgentResult<String>;
}

/// Where an accepted plan came from.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PlanSource {
    Advisor,
    RuleTable,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PlanDecision {
    Accepted { plan: InterventionPlan, source: PlanSource },
    Rejected { plan: InterventionPlan, reason: String },
}

/// Ask `advisor` for a plan and apply the guards.
pub fn decide_plan(
    advisor: &dyn StrategyAdvisor,
    request: &PlanRequest<'_>,
    thresholds: &ThresholdConfig,
) -> PlanDecision {
    let rule_table = || {
        fallback_plan(request.profile, request.churn_probability, thresholds.high_urgency_probability)
    };

    let (plan, source) = match advisor
        .propose_plan(request)
        .and_then(|plan| plan.validate().map(|_| plan))
    {
        Ok(plan) => (plan, PlanSource::Advisor),
        Err(e) => {
            log::warn!("advisor {} gave no usable plan ({e}); using rule table", advisor.name());
            (rule_table(), PlanSource::RuleTable)
        }
    };

    if plan.confidence >= thresholds.confidence_floor {
        return PlanDecision::Accepted { plan, source };
    }

    let reason = format!(
        "confidence {:.2} below floor {:.2}",
        plan.confidence, thresholds.confidence_floor
    );
    match (thresholds.low_confidence_policy, source) {
        (LowConfidencePolicy::Fallback, PlanSource::Advisor) => {
            let fallback = rule_table();
            if fallback.confidence >= thresholds.confidence_floor {
                log::info!("plan for {}: {reason}; using rule table", request.profile.name);
                PlanDecision::Accepted { plan: fallback, source: PlanSource::RuleTable }
            } else {
                PlanDecision::Rejected { plan: fallback, reason }
            }
        }
        _ => PlanDecision::Rejected { plan, reason },
    }
}

/// Outreach text from the advisor, or the static template when it fails.
pub fn outreach_message(advisor: &dyn StrategyAdvisor, request: &OutreachRequest<'_>) -> String {
    match advisor.compose_outreach(request) {
        Ok(text) if !text.trim().is_empty() => text,
        Ok(_) => outreach_template(request.customer_name, request.company),
        Err(e) => {
            log::warn!("advisor {} could not compose outreach ({e}); using template", advisor.name());
            outreach_template(request.customer_name, request.company)
        }
    }
}

pub fn outreach_template(customer_name: &str, company: &str) -> String {
    format!(
        "Dear {customer_name},\n\n\
         I hope this message finds you well. I wanted to reach out personally to ensure \
         {company}'s success with our platform.\n\n\
         We've noticed some opportunities to help you get more value from your subscription, \
         and I'd love to schedule a brief 15-minute call to discuss how we can better support \
         your goals.\n\n\
         Would you be available for a quick conversation this week?\n\n\
         Best regards,\nCustomer Success Team"
    )
}

// ── Rule table ─────────────────────────────────────────────────

/// Deterministic advisor backed only by the rule table.
#[derive(Debug, Default, Clone, Copy)]
pub struct RuleTableAdvisor {
    pub high_urgency_probability: f64,
}

impl RuleTableAdvisor {
    pub fn new(thresholds: &ThresholdConfig) -> Self {
        Self { high_urgency_probability: thresholds.high_urgency_probability }
    }
}

impl StrategyAdvisor for RuleTableAdvisor {
    fn name(&self) -> &'static str {
        "rule_table"
    }

    fn propose_plan(&self, request: &PlanRequest<'_>) -> AgentResult<InterventionPlan> {
        Ok(fallback_plan(request.profile, request.churn_probability, self.high_urgency_probability))
    }

    fn compose_outreach(&self, request: &OutreachRequest<'_>) -> AgentResult<String> {
        Ok(outreach_template(request.customer_name, request.company))
    }
}

// ── Completion backend ─────────────────────────────────────────

/// Any text-completion service.
pub trait CompletionBackend {
    fn complete(&self, prompt: &str) -> AgentResult<String>;
}

/// Advisor that asks a completion backend for a JSON plan.
pub struct CompletionAdvisor<B: CompletionBackend> {
    backend: B,
}

impl<B: CompletionBackend> CompletionAdvisor<B> {
    pub fn new(backend: B) -> Self {
        Self { backend }
    }

    fn plan_prompt(request: &PlanRequest<'_>) -> AgentResult<String> {
        let cases: Vec<&PatternMatch> = request.similar_cases.iter().take(3).collect();
        let memories: Vec<(&str, &str)> = request
            .memories
            .iter()
            .map(|m| (m.memory.context.strategy.as_str(), m.memory.outcome.as_str()))
            .collect();
        let messages: Vec<&str> = request
            .communications
            .iter()
            .map(|c| c.message_content.as_str())
            .collect();
        Ok(format!(
            "You are a customer retention strategist. Plan an intervention for this customer.\n\n\
             CUSTOMER PROFILE:\n{profile}\n\n\
             CHURN PROBABILITY: {p:.1}%\n\n\
             SIMILAR SUCCESSFUL CASES:\n{cases}\n\n\
             PAST INTERVENTIONS (strategy, outcome):\n{memories}\n\n\
             RECENT MESSAGES MENTIONING CHURN FACTORS:\n{messages}\n\n\
             Answer with a single JSON object with the keys trigger_reason, intervention_type, \
             strategy, confidence (0-1), expected_success_rate (0-1), reasoning and \
             execution_plan. execution_plan is a list of steps, each with a \"type\" of \
             personalized_outreach, retention_offer, schedule_call or feature_demo.",
            profile = serde_json::to_string_pretty(request.profile)?,
            p = request.churn_probability * 100.0,
            cases = serde_json::to_string_pretty(&cases)?,
            memories = serde_json::to_string(&memories)?,
            messages = serde_json::to_string(&messages)?,
        ))
    }
}

impl<B: CompletionBackend> StrategyAdvisor for CompletionAdvisor<B> {
    fn name(&self) -> &'static str {
        "completion"
    }

    fn propose_plan(&self, request: &PlanRequest<'_>) -> AgentResult<InterventionPlan> {
        let prompt = Self::plan_prompt(request)?;
        let answer = self.backend.complete(&prompt)?;
        InterventionPlan::from_response(&answer)
    }

    fn compose_outreach(&self, request: &OutreachRequest<'_>) -> AgentResult<String> {
        let factors = request
            .risk_factors
            .iter()
            .map(|(k, v)| format!("- {k}: {v}"))
            .collect::<Vec<_>>()
            .join("\n");
        let prompt = format!(
            "Write a short, warm retention email to {name} at {company}. Intervention: {kind}.\n\
             Risk factors to address without naming them directly:\n{factors}\n\
             Offer a 15-minute call. Answer with the email body only.",
            name = request.customer_name,
            company = request.company,
            kind = request.intervention_type,
        );
        let text = self.backend.complete(&prompt)?;
        if text.trim().is_empty() {
            return Err(AgentError::AdvisorUnavailable("empty outreach text".into()));
        }
        Ok(text.trim().to_string())
    }
}
