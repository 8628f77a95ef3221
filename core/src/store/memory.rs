use super::{decode_json, encode_json, AgentStore};
use crate::{
    clock::{from_millis, to_millis},
    error::AgentResult,
    memory::AgentMemory,
    types::CustomerId,
};
use rusqlite::{params, types::Type, Row};

fn memory_from_row(row: &Row<'_>) -> rusqlite::Result<AgentMemory> {
    let context: String = row.get(4)?;
    Ok(AgentMemory {
        id: row.get(0)?,
        session_id: row.get(1)?,
        customer_id: row.get(2)?,
        interaction_type: row.get(3)?,
        context: serde_json::from_str(&context)
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(4, Type::Text, Box::new(e)))?,
        outcome: row.get(5)?,
        embedding: decode_json(6, row.get(6)?)?,
        created_at: from_millis(row.get(7)?),
    })
}

impl AgentStore {
    // ── Agent memory ───────────────────────────────────────────

    pub fn insert_memory(&self, m: &AgentMemory) -> AgentResult<i64> {
        self.conn.execute(
            "INSERT INTO agent_memory (
                session_id, customer_id, interaction_type, context, outcome, embedding, created_at
            ) VALUES (?1,?2,?3,?4,?5,?6,?7)",
            params![
                &m.session_id,
                m.customer_id,
                &m.interaction_type,
                encode_json(&m.context)?,
                &m.outcome,
                encode_json(&m.embedding)?,
                to_millis(m.created_at),
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    /// Memories of this customer or of this interaction type, newest first.
    pub fn memories_related_to(
        &self,
        customer_id: CustomerId,
        interaction_type: &str,
    ) -> AgentResult<Vec<AgentMemory>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, session_id, customer_id, interaction_type, context, outcome, embedding, created_at
             FROM agent_memory
             WHERE customer_id = ?1 OR interaction_type = ?2
             ORDER BY created_at DESC, id DESC",
        )?;
        let rows = stmt
            .query_map(params![customer_id, interaction_type], memory_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn memories_for_customer(&self, customer_id: CustomerId) -> AgentResult<Vec<AgentMemory>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, session_id, customer_id, interaction_type, context, outcome, embedding, created_at
             FROM agent_memory
             WHERE customer_id = ?1
             ORDER BY created_at, id",
        )?;
        let rows = stmt
            .query_map(params![customer_id], memory_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }
}
