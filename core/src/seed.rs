//! Demo data for an empty database.
//!
//! Seeds a small book of customers spanning every segment and risk level,
//! four starter retention patterns, a handful of inbound messages and one
//! completed historical intervention. Customers are scored with the live
//! scorer so the stored probabilities match what the agent would compute.

use crate::{
    communication::{sentiment_score, Communication, CommunicationType, Direction},
    customer::Customer,
    embedding::embed_text,
    error::AgentResult,
    intervention::{ChurnIntervention, StepResult, StepStatus},
    patterns::{CharacteristicValue, Characteristics, RetentionPattern},
    plan::PlanStep,
    risk_scorer::RiskScorer,
    store::AgentStore,
    types::{ActualOutcome, ContactMethod, InterventionStatus, RiskLevel, Segment, SubscriptionTier, Urgency},
};
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct SeedSummary {
    pub customers:      usize,
    pub patterns:       usize,
    pub communications: usize,
    pub interventions:  usize,
}

struct DemoCustomer {
    name:        &'static str,
    email:       &'static str,
    company:     &'static str,
    tier:        SubscriptionTier,
    monthly:     f64,
    acv:         f64,
    signup_days: u32,
    login_days:  u32,
    tickets:     u32,
    usage:       f64,
    nps:         f64,
    delays:      u32,
    phone:       &'static str,
    timezone:    &'static str,
    contact:     ContactMethod,
}

const DEMO_CUSTOMERS: [DemoCustomer; 10] = [
    DemoCustomer { name: "Sarah Chen", email: "sarah.chen@techstart.com", company: "TechStart Inc", tier: SubscriptionTier::Pro, monthly: 1_200.0, acv: 14_400.0, signup_days: 180, login_days: 12, tickets: 8, usage: 0.3, nps: 5.0, delays: 1, phone: "+1-555-0201", timezone: "America/Los_Angeles", contact: ContactMethod::Email },
    DemoCustomer { name: "Mike Rodriguez", email: "mike@growthcorp.com", company: "GrowthCorp", tier: SubscriptionTier::Enterprise, monthly: 4_500.0, acv: 54_000.0, signup_days: 90, login_days: 8, tickets: 12, usage: 0.25, nps: 4.0, delays: 2, phone: "+1-555-0202", timezone: "America/New_York", contact: ContactMethod::Phone },
    DemoCustomer { name: "Jennifer Walsh", email: "j.walsh@innovateplus.com", company: "InnovatePlus", tier: SubscriptionTier::Pro, monthly: 800.0, acv: 9_600.0, signup_days: 45, login_days: 15, tickets: 6, usage: 0.2, nps: 6.0, delays: 0, phone: "+1-555-0203", timezone: "America/Chicago", contact: ContactMethod::Email },
    DemoCustomer { name: "David Park", email: "david@nexustech.com", company: "Nexus Technologies", tier: SubscriptionTier::Basic, monthly: 299.0, acv: 3_588.0, signup_days: 120, login_days: 5, tickets: 3, usage: 0.6, nps: 7.0, delays: 0, phone: "+1-555-0204", timezone: "America/Los_Angeles", contact: ContactMethod::Email },
    DemoCustomer { name: "Lisa Thompson", email: "lisa@fasttrack.com", company: "FastTrack Solutions", tier: SubscriptionTier::Pro, monthly: 1_500.0, acv: 18_000.0, signup_days: 200, login_days: 3, tickets: 2, usage: 0.55, nps: 6.0, delays: 1, phone: "+1-555-0205", timezone: "America/New_York", contact: ContactMethod::Phone },
    DemoCustomer { name: "Alex Kumar", email: "alex@scalevision.com", company: "ScaleVision Inc", tier: SubscriptionTier::Enterprise, monthly: 8_900.0, acv: 106_800.0, signup_days: 300, login_days: 1, tickets: 1, usage: 0.9, nps: 9.0, delays: 0, phone: "+1-555-0206", timezone: "America/Los_Angeles", contact: ContactMethod::Email },
    DemoCustomer { name: "Rachel Green", email: "rachel@brightfuture.com", company: "BrightFuture Corp", tier: SubscriptionTier::Pro, monthly: 2_200.0, acv: 26_400.0, signup_days: 150, login_days: 1, tickets: 0, usage: 0.8, nps: 8.0, delays: 0, phone: "+1-555-0207", timezone: "America/New_York", contact: ContactMethod::Email },
    DemoCustomer { name: "Tom Wilson", email: "tom@dynamictech.com", company: "Dynamic Tech", tier: SubscriptionTier::Basic, monthly: 199.0, acv: 2_388.0, signup_days: 60, login_days: 2, tickets: 1, usage: 0.7, nps: 8.0, delays: 0, phone: "+1-555-0208", timezone: "America/Chicago", contact: ContactMethod::Email },
    DemoCustomer { name: "Emma Davis", email: "emma@cloudstream.com", company: "CloudStream", tier: SubscriptionTier::Enterprise, monthly: 5_600.0, acv: 67_200.0, signup_days: 400, login_days: 7, tickets: 4, usage: 0.4, nps: 6.0, delays: 1, phone: "+1-555-0209", timezone: "America/Los_Angeles", contact: ContactMethod::Phone },
    DemoCustomer { name: "James Miller", email: "james@pivotcorp.com", company: "Pivot Corporation", tier: SubscriptionTier::Pro, monthly: 999.0, acv: 11_988.0, signup_days: 75, login_days: 4, tickets: 2, usage: 0.65, nps: 7.0, delays: 0, phone: "+1-555-0210", timezone: "America/New_York", contact: ContactMethod::Email },
];

/// (name, segment, reason, strategies, success_rate, avg_revenue, avg_usage, avg_nps)
const DEMO_PATTERNS: [(&str, Segment, &str, [&str; 3], f64, f64, f64, f64); 4] = [
    ("enterprise_retention_call", Segment::Enterprise, "satisfaction_issues",
        ["executive_outreach", "custom_training", "account_review"], 0.84, 50_000.0, 0.6, 6.0),
    ("smb_discount_offer", Segment::Smb, "pricing_concerns",
        ["discount_offer", "payment_plan", "feature_demo"], 0.71, 8_000.0, 0.4, 5.0),
    ("mid_market_feature_adoption", Segment::MidMarket, "underutilization",
        ["feature_demo", "training_session", "success_call"], 0.78, 25_000.0, 0.3, 6.0),
    ("enterprise_support_escalation", Segment::Enterprise, "support_issues",
        ["support_escalation", "dedicated_csm", "executive_review"], 0.89, 75_000.0, 0.7, 4.0),
];

/// (customer email, message)
const DEMO_MESSAGES: [(&str, &str); 4] = [
    ("sarah.chen@techstart.com", "Frustrated with support response times this month, three tickets still open."),
    ("mike@growthcorp.com", "Billing was wrong again and our team is evaluating a competitor."),
    ("j.walsh@innovateplus.com", "We never figured out the reporting feature, the team stopped using it."),
    ("alex@scalevision.com", "Great quarter, the team is happy with the new dashboards."),
];

/// Seed demo data unless the database already holds customers.
pub fn seed_demo_data(
    store: &AgentStore,
    scorer: &RiskScorer,
    embedding_dim: usize,
    now: DateTime<Utc>,
) -> AgentResult<SeedSummary> {
    if store.customer_count()? > 0 {
        log::info!("seed: customers already present, skipping");
        return Ok(SeedSummary::default());
    }

    store.unit_of_work(|store| {
        let mut summary = SeedSummary::default();
        let mut ids = Vec::with_capacity(DEMO_CUSTOMERS.len());

        for demo in &DEMO_CUSTOMERS {
            let mut customer = Customer {
                id: 0,
                name: demo.name.into(),
                company: demo.company.into(),
                email: demo.email.into(),
                phone: demo.phone.into(),
                timezone: demo.timezone.into(),
                subscription_tier: demo.tier,
                monthly_revenue: demo.monthly,
                annual_contract_value: demo.acv,
                days_since_signup: demo.signup_days,
                last_login_days_ago: demo.login_days,
                support_tickets_count: demo.tickets,
                feature_usage_score: demo.usage,
                nps_score: demo.nps,
                payment_delays: demo.delays,
                churn_probability: 0.0,
                churn_risk_level: RiskLevel::Low,
                behavior_embedding: Vec::new(),
                preferred_contact: demo.contact,
            };
            customer.churn_probability = scorer.predict_churn_probability(&customer.signals());
            customer.churn_risk_level = RiskScorer::risk_level(customer.churn_probability);
            customer.behavior_embedding = embed_text(&customer.embedding_text(), embedding_dim);
            let id = store.insert_customer(&customer, now)?;
            log::debug!(
                "seed: customer {id} {} p={:.3} ({})",
                customer.name,
                customer.churn_probability,
                customer.churn_risk_level
            );
            ids.push((demo.email, id, customer));
            summary.customers += 1;
        }

        for (name, segment, reason, strategies, rate, revenue, usage, nps) in DEMO_PATTERNS {
            let mut characteristics = Characteristics::new();
            characteristics.insert("segment".into(), CharacteristicValue::Text(segment.as_str().into()));
            characteristics.insert("avg_revenue".into(), CharacteristicValue::Number(revenue));
            characteristics.insert("avg_usage_score".into(), CharacteristicValue::Number(usage));
            characteristics.insert("avg_nps".into(), CharacteristicValue::Number(nps));
            let mut pattern = RetentionPattern {
                id: 0,
                pattern_name: name.into(),
                customer_segment: segment,
                churn_reason_category: reason.into(),
                customer_characteristics: characteristics,
                successful_interventions: strategies.iter().map(|s| s.to_string()).collect(),
                success_rate: rate,
                embedding: Vec::new(),
                created_at: now,
                updated_at: now,
            };
            pattern.embedding = embed_text(&pattern.embedding_text(), embedding_dim);
            store.insert_pattern(&pattern)?;
            summary.patterns += 1;
        }

        for (email, message) in DEMO_MESSAGES {
            if let Some((_, id, _)) = ids.iter().find(|(e, _, _)| *e == email) {
                store.insert_communication(&Communication {
                    id: 0,
                    customer_id: *id,
                    message_content: message.into(),
                    communication_type: CommunicationType::Email,
                    direction: Direction::Inbound,
                    sentiment_score: sentiment_score(message),
                    created_at: now - Duration::days(3),
                })?;
                summary.communications += 1;
            }
        }

        // One retained intervention from last week, already learned from.
        if let Some((_, id, customer)) = ids.first() {
            let created_at = now - Duration::days(8);
            let completed_at = created_at + Duration::hours(12);
            let steps = vec![
                PlanStep::PersonalizedOutreach { method: Some(ContactMethod::Email) },
                PlanStep::ScheduleCall { urgency: Urgency::High },
                PlanStep::FeatureDemo {
                    method: "video_call".into(),
                    focus: "underutilized_features".into(),
                },
            ];
            let results = steps
                .iter()
                .map(|s| StepResult::new(s.kind(), StepStatus::Success, completed_at))
                .collect::<Vec<_>>();
            store.insert_intervention(&ChurnIntervention {
                id: 0,
                customer_id: *id,
                intervention_type: "retention_outreach".into(),
                churn_probability_before: 0.89,
                churn_probability_after: Some(0.34),
                trigger_reason: "Low usage and high support tickets".into(),
                strategy_chosen: "personalized_success_call".into(),
                confidence_score: 0.82,
                expected_success_rate: 0.75,
                status: InterventionStatus::Successful,
                execution_steps: steps,
                outcome_details: results,
                revenue_at_risk: customer.annual_contract_value,
                estimated_retention_value: customer.annual_contract_value * 0.75,
                actual_outcome: Some(ActualOutcome::Retained),
                reasoning: "Historical record".into(),
                created_at,
                completed_at: Some(completed_at),
                follow_up_at: Some(completed_at + Duration::hours(24)),
                pattern_feedback_at: Some(completed_at + Duration::hours(24)),
            })?;
            summary.interventions += 1;
        }

        log::info!(
            "seed: {} customers, {} patterns, {} messages, {} historical interventions",
            summary.customers,
            summary.patterns,
            summary.communications,
            summary.interventions
        );
        Ok(summary)
    })
}
