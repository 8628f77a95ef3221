//! Read-only portfolio analytics over customers and recent interventions.

use crate::{
    customer::Customer,
    intervention::ChurnIntervention,
    risk_scorer::RiskScorer,
    types::{InterventionStatus, RiskLevel},
};
use serde::Serialize;
use std::collections::BTreeMap;

/// Probability at or above which a customer counts as high risk.
pub const HIGH_RISK_PROBABILITY: f64 = 0.6;

/// Interventions that started at or above this count as critical.
pub const CRITICAL_PROBABILITY: f64 = 0.8;

#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct RiskBucket {
    pub count:         usize,
    pub total_at_risk: f64,
}

#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct AgentPerformance {
    pub interventions_24h:          usize,
    pub successful_24h:             usize,
    pub critical_interventions_24h: usize,
    pub revenue_protected_24h:      f64,
    /// Percentage of the last 24h interventions that succeeded.
    pub success_rate:               f64,
}

#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct ChurnAnalytics {
    pub total_customers:     usize,
    pub high_risk_customers: usize,
    pub distribution:        BTreeMap<RiskLevel, RiskBucket>,
    pub performance:         AgentPerformance,
}

/// Summarise `customers` and the interventions created in the last 24h.
pub fn churn_analytics(customers: &[Customer], recent: &[ChurnIntervention]) -> ChurnAnalytics {
    let mut distribution: BTreeMap<RiskLevel, RiskBucket> =
        RiskLevel::ALL.iter().map(|l| (*l, RiskBucket::default())).collect();
    for c in customers {
        let bucket = distribution
            .entry(RiskScorer::risk_level(c.churn_probability))
            .or_default();
        bucket.count += 1;
        bucket.total_at_risk += c.annual_contract_value;
    }

    let successful: Vec<&ChurnIntervention> = recent
        .iter()
        .filter(|i| i.status == InterventionStatus::Successful)
        .collect();
    let success_rate = if recent.is_empty() {
        0.0
    } else {
        successful.len() as f64 / recent.len() as f64 * 100.0
    };

    ChurnAnalytics {
        total_customers: customers.len(),
        high_risk_customers: customers
            .iter()
            .filter(|c| c.churn_probability >= HIGH_RISK_PROBABILITY)
            .count(),
        distribution,
        performance: AgentPerformance {
            interventions_24h: recent.len(),
            successful_24h: successful.len(),
            critical_interventions_24h: recent
                .iter()
                .filter(|i| i.churn_probability_before >= CRITICAL_PROBABILITY)
                .count(),
            revenue_protected_24h: successful.iter().map(|i| i.estimated_retention_value).sum(),
            success_rate,
        },
    }
}
