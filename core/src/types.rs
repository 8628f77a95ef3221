//! Shared primitive types used across the entire agent.
//!
//! RULE: every categorical field is a closed enum with a stable
//! snake_case string form. The string form is what lands in the
//! database and in advisor payloads, so it must never change.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Row id of a customer.
pub type CustomerId = i64;

/// Row id of a churn intervention.
pub type InterventionId = i64;

/// Length of every behaviour / pattern embedding.
pub const EMBEDDING_DIM: usize = 768;

/// Generates `as_str`, `parse` and `Display` for a unit enum whose serde
/// form is snake_case.
macro_rules! string_enum {
    ($name:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $text,)+
                }
            }

            pub fn parse(s: &str) -> Option<Self> {
                match s {
                    $($text => Some(Self::$variant),)+
                    _ => None,
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionTier {
    Basic,
    Pro,
    Enterprise,
}

string_enum!(SubscriptionTier {
    Basic => "basic",
    Pro => "pro",
    Enterprise => "enterprise",
});

/// Coarse customer tier derived from annual contract value.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Segment {
    Enterprise,
    MidMarket,
    Smb,
}

string_enum!(Segment {
    Enterprise => "enterprise",
    MidMarket => "mid_market",
    Smb => "smb",
});

impl Segment {
    pub const ALL: [Segment; 3] = [Segment::Enterprise, Segment::MidMarket, Segment::Smb];

    /// ACV ≥ 50k → enterprise, ≥ 10k → mid_market, otherwise smb.
    pub fn from_annual_contract_value(acv: f64) -> Self {
        if acv >= 50_000.0 {
            Self::Enterprise
        } else if acv >= 10_000.0 {
            Self::MidMarket
        } else {
            Self::Smb
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    Critical,
}

string_enum!(RiskLevel {
    Low => "low",
    Medium => "medium",
    High => "high",
    Critical => "critical",
});

impl RiskLevel {
    pub const ALL: [RiskLevel; 4] = [
        RiskLevel::Low,
        RiskLevel::Medium,
        RiskLevel::High,
        RiskLevel::Critical,
    ];
}

/// How a customer prefers to be contacted, and the method of an outreach
/// step. Advisor payloads may name a method we cannot serve; those land in
/// `Unsupported` and the outreach step reports a failure.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ContactMethod {
    Email,
    Phone,
    Slack,
    #[serde(other)]
    Unsupported,
}

string_enum!(ContactMethod {
    Email => "email",
    Phone => "phone",
    Slack => "slack",
    Unsupported => "unsupported",
});

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum Urgency {
    Low,
    Medium,
    High,
    Critical,
}

string_enum!(Urgency {
    Low => "low",
    Medium => "medium",
    High => "high",
    Critical => "critical",
});

impl Default for Urgency {
    fn default() -> Self {
        Self::Medium
    }
}

/// Lifecycle of a churn intervention.
///
/// pending → executing → successful | failed
/// executing → timeout (budget exhausted or orphaned)
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum InterventionStatus {
    Pending,
    Executing,
    Successful,
    Failed,
    Timeout,
}

string_enum!(InterventionStatus {
    Pending => "pending",
    Executing => "executing",
    Successful => "successful",
    Failed => "failed",
    Timeout => "timeout",
});

impl InterventionStatus {
    /// Statuses that block a new intervention for the same customer.
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Pending | Self::Executing)
    }
}

/// Business outcome attached during follow-up.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ActualOutcome {
    Retained,
    Stable,
    AtRisk,
    Churned,
    Pending,
}

string_enum!(ActualOutcome {
    Retained => "retained",
    Stable => "stable",
    AtRisk => "at_risk",
    Churned => "churned",
    Pending => "pending",
});

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ActivityType {
    ChurnDetected,
    PlanRejected,
    InterventionExecuted,
    SelfCorrection,
    InterventionFollowUp,
    PatternLearning,
    InterventionAbandoned,
}

string_enum!(ActivityType {
    ChurnDetected => "churn_detected",
    PlanRejected => "plan_rejected",
    InterventionExecuted => "intervention_executed",
    SelfCorrection => "self_correction",
    InterventionFollowUp => "intervention_follow_up",
    PatternLearning => "pattern_learning",
    InterventionAbandoned => "intervention_abandoned",
});

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn segment_thresholds_follow_contract_value() {
        assert_eq!(Segment::from_annual_contract_value(54_000.0), Segment::Enterprise);
        assert_eq!(Segment::from_annual_contract_value(50_000.0), Segment::Enterprise);
        assert_eq!(Segment::from_annual_contract_value(49_999.0), Segment::MidMarket);
        assert_eq!(Segment::from_annual_contract_value(10_000.0), Segment::MidMarket);
        assert_eq!(Segment::from_annual_contract_value(9_600.0), Segment::Smb);
    }

    #[test]
    fn string_forms_round_trip() {
        for level in RiskLevel::ALL {
            assert_eq!(RiskLevel::parse(level.as_str()), Some(level));
        }
        assert_eq!(ActualOutcome::parse("at_risk"), Some(ActualOutcome::AtRisk));
        assert_eq!(Segment::parse("mid_market"), Some(Segment::MidMarket));
        assert_eq!(InterventionStatus::parse("bogus"), None);
    }

    #[test]
    fn unknown_contact_method_deserializes_as_unsupported() {
        let method: ContactMethod = serde_json::from_str("\"fax\"").unwrap();
        assert_eq!(method, ContactMethod::Unsupported);
        let method: ContactMethod = serde_json::from_str("\"phone\"").unwrap();
        assert_eq!(method, ContactMethod::Phone);
    }
}
