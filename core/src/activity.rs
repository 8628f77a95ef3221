//! Agent activity feed.
//!
//! Every decision the agent takes in a cycle is recorded as one activity
//! row. The feed is append-only and is also what `run_cycle` returns.

use crate::types::{ActivityType, CustomerId, InterventionId, Urgency};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AgentActivity {
    /// 0 until persisted.
    pub id:              i64,
    pub cycle:           u64,
    pub activity_type:   ActivityType,
    pub customer_id:     Option<CustomerId>,
    pub intervention_id: Option<InterventionId>,
    pub description:     String,
    pub urgency:         Urgency,
    pub metadata:        serde_json::Value,
    pub created_at:      DateTime<Utc>,
}

impl AgentActivity {
    pub fn new(
        cycle: u64,
        activity_type: ActivityType,
        description: impl Into<String>,
        urgency: Urgency,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: 0,
            cycle,
            activity_type,
            customer_id: None,
            intervention_id: None,
            description: description.into(),
            urgency,
            metadata: serde_json::Value::Object(Default::default()),
            created_at,
        }
    }

    pub fn for_customer(mut self, customer_id: CustomerId) -> Self {
        self.customer_id = Some(customer_id);
        self
    }

    pub fn for_intervention(mut self, intervention_id: InterventionId) -> Self {
        self.intervention_id = Some(intervention_id);
        self
    }

    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = metadata;
        self
    }
}
