//! Agent memory: what the agent did for a customer and how it went.
//!
//! Memories are written when an intervention starts and again at
//! follow-up. Recall ranks the memories of the same customer, or of the
//! same interaction type, by cosine similarity to a query embedding and
//! hands the best few to the strategy advisor.

use crate::{
    embedding::{cosine_similarity, embed_text},
    error::AgentResult,
    types::{CustomerId, Segment},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Interaction type under which intervention memories are filed.
pub const CHURN_INTERVENTION: &str = "churn_intervention";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MemoryContext {
    pub segment:           Segment,
    pub churn_probability: f64,
    pub intervention_type: String,
    pub strategy:          String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub improvement:       Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AgentMemory {
    pub id:               i64,
    pub session_id:       String,
    pub customer_id:      CustomerId,
    pub interaction_type: String,
    pub context:          MemoryContext,
    pub outcome:          String,
    pub embedding:        Vec<f32>,
    pub created_at:       DateTime<Utc>,
}

impl AgentMemory {
    pub fn new(
        customer_id: CustomerId,
        interaction_type: &str,
        context: MemoryContext,
        outcome: &str,
        dim: usize,
        created_at: DateTime<Utc>,
    ) -> Self {
        let text = format!(
            "{} {} {} {} outcome {}",
            interaction_type, context.segment, context.intervention_type, context.strategy, outcome
        );
        Self {
            id: 0,
            session_id: uuid::Uuid::new_v4().to_string(),
            customer_id,
            interaction_type: interaction_type.to_string(),
            context,
            outcome: outcome.to_string(),
            embedding: embed_text(&text, dim),
            created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct RecalledMemory {
    pub memory:     AgentMemory,
    pub similarity: f64,
}

/// Rank `candidates` by similarity to `query`, best first, keeping `limit`.
/// Memories whose embedding does not match the query dimension are skipped.
pub fn rank_memories(query: &[f32], candidates: Vec<AgentMemory>, limit: usize) -> AgentResult<Vec<RecalledMemory>> {
    let mut ranked = Vec::with_capacity(candidates.len());
    for memory in candidates {
        if memory.embedding.len() != query.len() {
            log::debug!("memory {} skipped: embedding dimension {}", memory.id, memory.embedding.len());
            continue;
        }
        let similarity = cosine_similarity(query, &memory.embedding)?;
        ranked.push(RecalledMemory { memory, similarity });
    }
    ranked.sort_by(|a, b| b.similarity.partial_cmp(&a.similarity).unwrap_or(Ordering::Equal));
    ranked.truncate(limit);
    Ok(ranked)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn memory(customer_id: CustomerId, strategy: &str, outcome: &str) -> AgentMemory {
        let context = MemoryContext {
            segment: Segment::Enterprise,
            churn_probability: 0.8,
            intervention_type: "executive_outreach".into(),
            strategy: strategy.into(),
            improvement: None,
        };
        let at = Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap();
        AgentMemory::new(customer_id, CHURN_INTERVENTION, context, outcome, 64, at)
    }

    #[test]
    fn recall_orders_by_similarity() {
        let target = memory(1, "success_call", "retained");
        let query = target.embedding.clone();
        let ranked = rank_memories(
            &query,
            vec![memory(2, "discount_offer", "initiated"), target.clone()],
            1,
        )
        .unwrap();
        assert_eq!(ranked.len(), 1);
        assert_eq!(ranked[0].memory.customer_id, 1);
        assert!((ranked[0].similarity - 1.0).abs() < 1e-6);
    }

    #[test]
    fn mismatched_embeddings_are_skipped() {
        let mut odd = memory(3, "success_call", "retained");
        odd.embedding.truncate(10);
        let query = memory(1, "success_call", "retained").embedding;
        assert!(rank_memories(&query, vec![odd], 5).unwrap().is_empty());
    }
}
