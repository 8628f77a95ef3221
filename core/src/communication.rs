//! Customer communications log.
//!
//! Outbound messages the agent sends are recorded here together with a
//! lexicon sentiment score. Before planning, the agent searches a
//! customer's log for the usual churn factors and passes the hits to the
//! strategy advisor.

use crate::types::CustomerId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Terms searched for before planning an intervention.
pub const CHURN_FACTOR_TERMS: [&str; 4] = ["billing", "support", "feature", "competitor"];

const POSITIVE_WORDS: [&str; 7] = ["good", "great", "excellent", "happy", "satisfied", "love", "amazing"];
const NEGATIVE_WORDS: [&str; 7] = ["bad", "terrible", "hate", "angry", "frustrated", "disappointed", "awful"];

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CommunicationType {
    Email,
    Chat,
    Phone,
    Offer,
    Demo,
}

impl CommunicationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Email => "email",
            Self::Chat => "chat",
            Self::Phone => "phone",
            Self::Offer => "offer",
            Self::Demo => "demo",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "email" => Some(Self::Email),
            "chat" => Some(Self::Chat),
            "phone" => Some(Self::Phone),
            "offer" => Some(Self::Offer),
            "demo" => Some(Self::Demo),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Inbound,
    Outbound,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Inbound => "inbound",
            Self::Outbound => "outbound",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "inbound" => Some(Self::Inbound),
            "outbound" => Some(Self::Outbound),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Communication {
    pub id:                 i64,
    pub customer_id:        CustomerId,
    pub message_content:    String,
    pub communication_type: CommunicationType,
    pub direction:          Direction,
    pub sentiment_score:    f64,
    pub created_at:         DateTime<Utc>,
}

impl Communication {
    pub fn outbound(
        customer_id: CustomerId,
        communication_type: CommunicationType,
        message_content: impl Into<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        let message_content = message_content.into();
        Self {
            id: 0,
            customer_id,
            sentiment_score: sentiment_score(&message_content),
            message_content,
            communication_type,
            direction: Direction::Outbound,
            created_at,
        }
    }
}

/// Lexicon sentiment in [-1, 1]: (positive - negative) / matched words.
/// Text with no lexicon words scores 0.
pub fn sentiment_score(text: &str) -> f64 {
    let mut positive = 0u32;
    let mut negative = 0u32;
    for word in text
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(str::to_lowercase)
    {
        if POSITIVE_WORDS.contains(&word.as_str()) {
            positive += 1;
        } else if NEGATIVE_WORDS.contains(&word.as_str()) {
            negative += 1;
        }
    }
    let total = positive + negative;
    if total == 0 {
        return 0.0;
    }
    (positive as f64 - negative as f64) / total as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sentiment_counts_lexicon_words() {
        assert_eq!(sentiment_score("We love the product, it is great!"), 1.0);
        assert_eq!(sentiment_score("Terrible support, very frustrated."), -1.0);
        assert_eq!(sentiment_score("Good features but awful billing"), 0.0);
        assert_eq!(sentiment_score("Renewal is next month"), 0.0);
    }

    #[test]
    fn sentiment_ignores_substrings() {
        assert_eq!(sentiment_score("badge goodwill"), 0.0);
    }
}
