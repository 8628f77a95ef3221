//! Customer records and the views derived from them.
//!
//! A customer is created once at seed time and never deleted. The agent
//! only mutates `churn_probability`, `churn_risk_level` and, when missing,
//! `behavior_embedding`.

use crate::types::{ContactMethod, CustomerId, RiskLevel, Segment, SubscriptionTier};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Customer {
    pub id:                    CustomerId,
    pub name:                  String,
    pub company:               String,
    pub email:                 String,
    pub phone:                 String,
    pub timezone:              String,
    pub subscription_tier:     SubscriptionTier,
    pub monthly_revenue:       f64,
    pub annual_contract_value: f64,
    pub days_since_signup:     u32,
    pub last_login_days_ago:   u32,
    pub support_tickets_count: u32,
    pub feature_usage_score:   f64,
    pub nps_score:             f64,
    pub payment_delays:        u32,
    pub churn_probability:     f64,
    pub churn_risk_level:      RiskLevel,
    /// Empty until the agent generates one.
    pub behavior_embedding:    Vec<f32>,
    pub preferred_contact:     ContactMethod,
}

/// The raw behavioural inputs the risk scorer consumes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CustomerSignals {
    pub days_since_signup:     f64,
    pub last_login_days_ago:   f64,
    pub support_tickets_count: f64,
    pub feature_usage_score:   f64,
    pub nps_score:             f64,
    pub payment_delays:        f64,
    pub monthly_revenue:       f64,
}

impl Default for CustomerSignals {
    /// Neutral inputs used when a field is unknown.
    fn default() -> Self {
        Self {
            days_since_signup:     0.0,
            last_login_days_ago:   0.0,
            support_tickets_count: 0.0,
            feature_usage_score:   0.5,
            nps_score:             7.0,
            payment_delays:        0.0,
            monthly_revenue:       100.0,
        }
    }
}

/// Snapshot handed to the strategy advisor and stored as pattern
/// characteristics.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CustomerProfile {
    pub name:                  String,
    pub company:               String,
    pub segment:               Segment,
    pub subscription_tier:     SubscriptionTier,
    pub monthly_revenue:       f64,
    pub annual_contract_value: f64,
    pub days_since_signup:     u32,
    pub last_login_days_ago:   u32,
    pub support_tickets_count: u32,
    pub feature_usage_score:   f64,
    pub nps_score:             f64,
    pub payment_delays:        u32,
    pub churn_probability:     f64,
    pub churn_risk_level:      RiskLevel,
    pub preferred_contact:     ContactMethod,
    pub timezone:              String,
}

impl Customer {
    pub fn segment(&self) -> Segment {
        Segment::from_annual_contract_value(self.annual_contract_value)
    }

    pub fn signals(&self) -> CustomerSignals {
        CustomerSignals {
            days_since_signup:     self.days_since_signup as f64,
            last_login_days_ago:   self.last_login_days_ago as f64,
            support_tickets_count: self.support_tickets_count as f64,
            feature_usage_score:   self.feature_usage_score,
            nps_score:             self.nps_score,
            payment_delays:        self.payment_delays as f64,
            monthly_revenue:       self.monthly_revenue,
        }
    }

    pub fn profile(&self) -> CustomerProfile {
        CustomerProfile {
            name:                  self.name.clone(),
            company:               self.company.clone(),
            segment:               self.segment(),
            subscription_tier:     self.subscription_tier,
            monthly_revenue:       self.monthly_revenue,
            annual_contract_value: self.annual_contract_value,
            days_since_signup:     self.days_since_signup,
            last_login_days_ago:   self.last_login_days_ago,
            support_tickets_count: self.support_tickets_count,
            feature_usage_score:   self.feature_usage_score,
            nps_score:             self.nps_score,
            payment_delays:        self.payment_delays,
            churn_probability:     self.churn_probability,
            churn_risk_level:      self.churn_risk_level,
            preferred_contact:     self.preferred_contact,
            timezone:              self.timezone.clone(),
        }
    }

    /// Named risk factors, used to personalise outreach content.
    pub fn risk_factors(&self) -> Vec<(String, String)> {
        let mut factors = Vec::new();
        if self.last_login_days_ago > 7 {
            factors.push(("inactivity".into(), format!("{} days since last login", self.last_login_days_ago)));
        }
        if self.nps_score < 6.0 {
            factors.push(("satisfaction".into(), format!("NPS {}", self.nps_score)));
        }
        if self.feature_usage_score < 0.3 {
            factors.push(("adoption".into(), format!("feature usage {:.2}", self.feature_usage_score)));
        }
        if self.support_tickets_count > 5 {
            factors.push(("support".into(), format!("{} support tickets", self.support_tickets_count)));
        }
        if self.payment_delays > 2 {
            factors.push(("billing".into(), format!("{} payment delays", self.payment_delays)));
        }
        factors
    }

    /// Text the behaviour embedding is derived from. The identity part keeps
    /// embeddings distinct per customer; the marker words bias the vector
    /// towards the patterns that share them.
    pub fn embedding_text(&self) -> String {
        let mut text = format!(
            "{} {} {} plan {}",
            self.email,
            self.segment(),
            self.subscription_tier,
            self.company,
        );
        if self.churn_probability >= 0.6 {
            text.push_str(" high risk");
        }
        if self.feature_usage_score < 0.3 {
            text.push_str(" underutilization");
        }
        if self.support_tickets_count > 5 {
            text.push_str(" support issues");
        }
        if self.payment_delays > 2 {
            text.push_str(" billing issues");
        }
        text
    }
}
