//! Retention pattern library.
//!
//! A pattern records how well a (segment, intervention type, strategy)
//! combination has worked. Two operations sit on top of the table:
//!
//!   find_similar_cases: three retrieval tiers, tried in order, first
//!                        non-empty result wins; never returns empty
//!   update_pattern    : reinforce or decay one pattern after an outcome
//!
//! Retrieval tiers:
//!   1. similarity : cosine against pattern embeddings in the customer's
//!                    segment, success_rate > 0.5; confidence is
//!                    min(success_rate × similarity, 0.95)
//!   2. segment    : best success rates in the segment; similarity 0.7,
//!                    confidence success_rate × 0.8
//!   3. default    : one canned pattern per segment
//!
//! A failure inside a tier is logged and treated like an empty tier.

use crate::{
    customer::CustomerProfile,
    embedding::{cosine_similarity, embed_text},
    error::{AgentError, AgentResult},
    store::AgentStore,
    types::Segment,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::{cmp::Ordering, collections::BTreeMap};

/// Tier-1 patterns must beat this success rate.
pub const MIN_SIMILARITY_SUCCESS_RATE: f64 = 0.5;
/// Tier-1 confidence never exceeds this.
pub const MAX_SIMILARITY_CONFIDENCE: f64 = 0.95;
/// Similarity reported for segment-tier matches.
pub const SEGMENT_TIER_SIMILARITY: f64 = 0.7;
/// Segment-tier confidence is success_rate scaled by this.
pub const SEGMENT_TIER_DISCOUNT: f64 = 0.8;
/// Success rate of a pattern created by a successful first outcome.
pub const NEW_PATTERN_SUCCESS: f64 = 1.0;
/// Success rate of a pattern created by a failed first outcome.
pub const NEW_PATTERN_FAILURE: f64 = 0.1;
/// Failed outcomes multiply an existing success rate by this.
pub const FAILURE_DECAY: f64 = 0.9;

/// One characteristic value. Numbers are averaged on update; everything
/// else is overwritten.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum CharacteristicValue {
    Number(f64),
    Text(String),
    Flag(bool),
    List(Vec<String>),
}

pub type Characteristics = BTreeMap<String, CharacteristicValue>;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RetentionPattern {
    pub id:                       i64,
    pub pattern_name:             String,
    pub customer_segment:         Segment,
    pub churn_reason_category:    String,
    pub customer_characteristics: Characteristics,
    pub successful_interventions: Vec<String>,
    pub success_rate:             f64,
    pub embedding:                Vec<f32>,
    pub created_at:               DateTime<Utc>,
    pub updated_at:               DateTime<Utc>,
}

impl RetentionPattern {
    /// Text a pattern embedding is generated from.
    pub fn embedding_text(&self) -> String {
        format!(
            "{} {} {} {}",
            self.customer_segment,
            self.pattern_name.replace('_', " "),
            self.churn_reason_category.replace('_', " "),
            self.successful_interventions.join(" ").replace('_', " "),
        )
    }
}

/// `{segment}_{intervention_type}_{strategy}`, the key `update_pattern` uses.
pub fn pattern_key(segment: Segment, intervention_type: &str, strategy: &str) -> String {
    format!("{segment}_{intervention_type}_{strategy}")
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum RetrievalTier {
    Similarity,
    Segment,
    Default,
}

impl RetrievalTier {
    /// Evaluation order.
    pub const ORDER: [RetrievalTier; 3] =
        [RetrievalTier::Similarity, RetrievalTier::Segment, RetrievalTier::Default];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Similarity => "similarity",
            Self::Segment => "segment",
            Self::Default => "default",
        }
    }
}

/// A pattern as handed to the strategy advisor.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PatternMatch {
    pub pattern_name:             String,
    pub customer_segment:         Segment,
    pub churn_reason_category:    String,
    pub customer_characteristics: Characteristics,
    pub successful_interventions: Vec<String>,
    pub success_rate:             f64,
    pub similarity_score:         f64,
    pub confidence:               f64,
    pub source:                   RetrievalTier,
}

impl PatternMatch {
    fn from_pattern(p: RetentionPattern, similarity_score: f64, confidence: f64, source: RetrievalTier) -> Self {
        Self {
            pattern_name: p.pattern_name,
            customer_segment: p.customer_segment,
            churn_reason_category: p.churn_reason_category,
            customer_characteristics: p.customer_characteristics,
            successful_interventions: p.successful_interventions,
            success_rate: p.success_rate,
            similarity_score,
            confidence,
            source,
        }
    }
}

enum TierOutcome {
    Found(Vec<PatternMatch>),
    Empty,
    Failed(AgentError),
}

/// What `update_pattern` did.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum PatternUpdate {
    Created { pattern_name: String, success_rate: f64 },
    Updated { pattern_name: String, previous_rate: f64, success_rate: f64 },
}

impl PatternUpdate {
    pub fn pattern_name(&self) -> &str {
        match self {
            Self::Created { pattern_name, .. } | Self::Updated { pattern_name, .. } => pattern_name,
        }
    }

    pub fn success_rate(&self) -> f64 {
        match self {
            Self::Created { success_rate, .. } | Self::Updated { success_rate, .. } => *success_rate,
        }
    }
}

/// Next success rate after one outcome: success moves halfway to 1.0,
/// failure decays by 10%.
pub fn reinforce(rate: f64, success: bool) -> f64 {
    if success {
        (rate + 1.0) / 2.0
    } else {
        rate * FAILURE_DECAY
    }
}

/// Fold `incoming` into `existing`: numbers present on both sides are
/// averaged, anything else is overwritten or added.
pub fn merge_characteristics(existing: &mut Characteristics, incoming: &Characteristics) {
    for (key, value) in incoming {
        match (existing.get_mut(key), value) {
            (Some(CharacteristicValue::Number(old)), CharacteristicValue::Number(new)) => {
                *old = (*old + new) / 2.0;
            }
            _ => {
                existing.insert(key.clone(), value.clone());
            }
        }
    }
}

/// Flatten a customer profile into pattern characteristics.
pub fn characteristics_from_profile(profile: &CustomerProfile) -> AgentResult<Characteristics> {
    let value = serde_json::to_value(profile)?;
    let mut out = Characteristics::new();
    if let serde_json::Value::Object(map) = value {
        for (key, v) in map {
            let converted = match v {
                serde_json::Value::Number(n) => n.as_f64().map(CharacteristicValue::Number),
                serde_json::Value::String(s) => Some(CharacteristicValue::Text(s)),
                serde_json::Value::Bool(b) => Some(CharacteristicValue::Flag(b)),
                _ => None,
            };
            if let Some(c) = converted {
                out.insert(key, c);
            }
        }
    }
    Ok(out)
}

/// Canned pattern for a segment, used when the library has nothing.
pub fn default_pattern(segment: Segment) -> PatternMatch {
    let (name, rate, similarity, confidence, strategies, reason, revenue, usage): (
        &str,
        f64,
        f64,
        f64,
        [&str; 3],
        &str,
        f64,
        f64,
    ) = match segment {
        Segment::Enterprise => (
            "enterprise_executive_outreach",
            0.82,
            0.6,
            0.75,
            ["executive_call", "custom_training", "dedicated_support"],
            "service_expectations",
            50_000.0,
            0.6,
        ),
        Segment::MidMarket => (
            "midmarket_value_demonstration",
            0.71,
            0.6,
            0.68,
            ["roi_analysis", "feature_demo", "discount_offer"],
            "value_realization",
            25_000.0,
            0.5,
        ),
        Segment::Smb => (
            "smb_cost_optimization",
            0.69,
            0.55,
            0.65,
            ["discount_offer", "payment_plan", "simplified_setup"],
            "pricing_concerns",
            8_000.0,
            0.4,
        ),
    };
    let mut characteristics = Characteristics::new();
    characteristics.insert("avg_revenue".into(), CharacteristicValue::Number(revenue));
    characteristics.insert("avg_usage_score".into(), CharacteristicValue::Number(usage));
    PatternMatch {
        pattern_name: name.into(),
        customer_segment: segment,
        churn_reason_category: reason.into(),
        customer_characteristics: characteristics,
        successful_interventions: strategies.iter().map(|s| s.to_string()).collect(),
        success_rate: rate,
        similarity_score: similarity,
        confidence,
        source: RetrievalTier::Default,
    }
}

/// Pattern retrieval and learning over an `AgentStore`.
pub struct PatternLibrary<'a> {
    store: &'a AgentStore,
    dim:   usize,
}

impl<'a> PatternLibrary<'a> {
    pub fn new(store: &'a AgentStore, dim: usize) -> Self {
        Self { store, dim }
    }

    /// Up to `limit` patterns relevant to a customer, best first. Never
    /// empty: the default tier always answers.
    pub fn find_similar_cases(
        &self,
        embedding: &[f32],
        segment: Segment,
        churn_probability: f64,
        limit: usize,
    ) -> Vec<PatternMatch> {
        let limit = limit.max(1);
        for tier in RetrievalTier::ORDER {
            match self.run_tier(tier, embedding, segment, limit) {
                TierOutcome::Found(matches) => {
                    log::debug!(
                        "retrieval: {} match(es) from {} tier for {segment} (p={churn_probability:.2})",
                        matches.len(),
                        tier.as_str()
                    );
                    return matches;
                }
                TierOutcome::Empty => {}
                TierOutcome::Failed(e) => {
                    log::warn!("retrieval: {} tier failed for {segment}: {e}", tier.as_str());
                }
            }
        }
        vec![default_pattern(segment)]
    }

    fn run_tier(&self, tier: RetrievalTier, embedding: &[f32], segment: Segment, limit: usize) -> TierOutcome {
        let result = match tier {
            RetrievalTier::Similarity => self.similarity_tier(embedding, segment, limit),
            RetrievalTier::Segment => self.segment_tier(segment, limit),
            RetrievalTier::Default => Ok(vec![default_pattern(segment)]),
        };
        match result {
            Ok(matches) if matches.is_empty() => TierOutcome::Empty,
            Ok(matches) => TierOutcome::Found(matches),
            Err(e) => TierOutcome::Failed(e),
        }
    }

    fn similarity_tier(&self, embedding: &[f32], segment: Segment, limit: usize) -> AgentResult<Vec<PatternMatch>> {
        if embedding.is_empty() {
            return Ok(Vec::new());
        }
        let patterns = self
            .store
            .patterns_for_segment(segment, Some(MIN_SIMILARITY_SUCCESS_RATE), None)?;
        let mut scored = Vec::with_capacity(patterns.len());
        for pattern in patterns {
            if pattern.embedding.len() != embedding.len() {
                log::debug!(
                    "retrieval: skipping {} ({}-dim embedding, query is {})",
                    pattern.pattern_name,
                    pattern.embedding.len(),
                    embedding.len()
                );
                continue;
            }
            let similarity = match cosine_similarity(embedding, &pattern.embedding) {
                Ok(similarity) => similarity,
                Err(e) => {
                    log::warn!("retrieval: skipping {}: {e}", pattern.pattern_name);
                    continue;
                }
            };
            let confidence = (pattern.success_rate * similarity).clamp(0.0, MAX_SIMILARITY_CONFIDENCE);
            scored.push(PatternMatch::from_pattern(pattern, similarity, confidence, RetrievalTier::Similarity));
        }
        scored.sort_by(|a, b| {
            b.similarity_score
                .partial_cmp(&a.similarity_score)
                .unwrap_or(Ordering::Equal)
        });
        scored.truncate(limit);
        Ok(scored)
    }

    fn segment_tier(&self, segment: Segment, limit: usize) -> AgentResult<Vec<PatternMatch>> {
        let patterns = self.store.patterns_for_segment(segment, None, Some(limit))?;
        Ok(patterns
            .into_iter()
            .map(|p| {
                let confidence = p.success_rate * SEGMENT_TIER_DISCOUNT;
                PatternMatch::from_pattern(p, SEGMENT_TIER_SIMILARITY, confidence, RetrievalTier::Segment)
            })
            .collect())
    }

    /// Reinforce or decay the pattern for (segment, type, strategy) in one
    /// transaction, creating it on first use.
    pub fn update_pattern(
        &self,
        segment: Segment,
        intervention_type: &str,
        strategy: &str,
        success: bool,
        characteristics: &Characteristics,
        now: DateTime<Utc>,
    ) -> AgentResult<PatternUpdate> {
        self.store.unit_of_work(|store| {
            PatternLibrary::new(store, self.dim)
                .apply_update(segment, intervention_type, strategy, success, characteristics, now)
        })
    }

    /// `update_pattern` without its own transaction, for callers that
    /// already hold a unit of work.
    pub fn apply_update(
        &self,
        segment: Segment,
        intervention_type: &str,
        strategy: &str,
        success: bool,
        characteristics: &Characteristics,
        now: DateTime<Utc>,
    ) -> AgentResult<PatternUpdate> {
        let name = pattern_key(segment, intervention_type, strategy);
        match self.store.pattern_by_name(&name)? {
            Some(mut pattern) => {
                let previous_rate = pattern.success_rate;
                pattern.success_rate = reinforce(previous_rate, success);
                if success && !pattern.successful_interventions.iter().any(|s| s == strategy) {
                    pattern.successful_interventions.push(strategy.to_string());
                }
                merge_characteristics(&mut pattern.customer_characteristics, characteristics);
                if pattern.embedding.len() != self.dim {
                    pattern.embedding = embed_text(&pattern.embedding_text(), self.dim);
                }
                pattern.updated_at = now;
                self.store.update_pattern_row(&pattern)?;
                log::info!(
                    "pattern {name}: success_rate {previous_rate:.3} -> {:.3} ({})",
                    pattern.success_rate,
                    if success { "success" } else { "failure" }
                );
                Ok(PatternUpdate::Updated {
                    pattern_name: name,
                    previous_rate,
                    success_rate: pattern.success_rate,
                })
            }
            None => {
                let success_rate = if success { NEW_PATTERN_SUCCESS } else { NEW_PATTERN_FAILURE };
                let mut pattern = RetentionPattern {
                    id: 0,
                    pattern_name: name.clone(),
                    customer_segment: segment,
                    churn_reason_category: intervention_type.to_string(),
                    customer_characteristics: characteristics.clone(),
                    successful_interventions: if success { vec![strategy.to_string()] } else { Vec::new() },
                    success_rate,
                    embedding: Vec::new(),
                    created_at: now,
                    updated_at: now,
                };
                pattern.embedding = embed_text(&pattern.embedding_text(), self.dim);
                self.store.insert_pattern(&pattern)?;
                log::info!("pattern {name}: created with success_rate {success_rate:.3}");
                Ok(PatternUpdate::Created { pattern_name: name, success_rate })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reinforcement_moves_halfway_to_one() {
        assert_eq!(reinforce(0.5, true), 0.75);
        assert_eq!(reinforce(0.75, true), 0.875);
        assert!((reinforce(0.8, false) - 0.72).abs() < 1e-12);
    }

    #[test]
    fn numbers_average_and_text_overwrites() {
        let mut existing = Characteristics::new();
        existing.insert("nps_score".into(), CharacteristicValue::Number(4.0));
        existing.insert("company".into(), CharacteristicValue::Text("Old".into()));
        let mut incoming = Characteristics::new();
        incoming.insert("nps_score".into(), CharacteristicValue::Number(8.0));
        incoming.insert("company".into(), CharacteristicValue::Text("New".into()));
        incoming.insert("timezone".into(), CharacteristicValue::Text("UTC".into()));
        merge_characteristics(&mut existing, &incoming);
        assert_eq!(existing["nps_score"], CharacteristicValue::Number(6.0));
        assert_eq!(existing["company"], CharacteristicValue::Text("New".into()));
        assert_eq!(existing.len(), 3);
    }

    #[test]
    fn default_patterns_cover_every_segment() {
        for segment in Segment::ALL {
            let p = default_pattern(segment);
            assert_eq!(p.customer_segment, segment);
            assert_eq!(p.source, RetrievalTier::Default);
            assert_eq!(p.successful_interventions.len(), 3);
        }
        assert_eq!(default_pattern(Segment::Enterprise).success_rate, 0.82);
        assert_eq!(default_pattern(Segment::Smb).confidence, 0.65);
    }
}
