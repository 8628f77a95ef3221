use super::{decode_enum, AgentStore};
use crate::{
    clock::{from_millis, to_millis},
    communication::{Communication, CommunicationType, Direction},
    error::AgentResult,
    types::CustomerId,
};
use rusqlite::{params, Row};

fn communication_from_row(row: &Row<'_>) -> rusqlite::Result<Communication> {
    Ok(Communication {
        id: row.get(0)?,
        customer_id: row.get(1)?,
        message_content: row.get(2)?,
        communication_type: decode_enum(3, row.get(3)?, CommunicationType::parse)?,
        direction: decode_enum(4, row.get(4)?, Direction::parse)?,
        sentiment_score: row.get(5)?,
        created_at: from_millis(row.get(6)?),
    })
}

impl AgentStore {
    // ── Communications log ─────────────────────────────────────

    pub fn insert_communication(&self, c: &Communication) -> AgentResult<i64> {
        self.conn.execute(
            "INSERT INTO customer_communications (
                customer_id, message_content, communication_type, direction, sentiment_score, created_at
            ) VALUES (?1,?2,?3,?4,?5,?6)",
            params![
                c.customer_id,
                &c.message_content,
                c.communication_type.as_str(),
                c.direction.as_str(),
                c.sentiment_score,
                to_millis(c.created_at),
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    /// A customer's messages mentioning any of `terms` (case-insensitive),
    /// newest first.
    pub fn search_communications(
        &self,
        customer_id: CustomerId,
        terms: &[&str],
        limit: usize,
    ) -> AgentResult<Vec<Communication>> {
        if terms.is_empty() {
            return Ok(Vec::new());
        }
        let clause = (0..terms.len())
            .map(|i| format!("LOWER(message_content) LIKE ?{}", i + 3))
            .collect::<Vec<_>>()
            .join(" OR ");
        let sql = format!(
            "SELECT id, customer_id, message_content, communication_type, direction, sentiment_score, created_at
             FROM customer_communications
             WHERE customer_id = ?1 AND ({clause})
             ORDER BY created_at DESC, id DESC
             LIMIT ?2"
        );
        let mut values: Vec<rusqlite::types::Value> = vec![customer_id.into(), (limit as i64).into()];
        values.extend(terms.iter().map(|t| format!("%{}%", t.to_lowercase()).into()));
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt
            .query_map(rusqlite::params_from_iter(values), communication_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn communications_for_customer(&self, customer_id: CustomerId) -> AgentResult<Vec<Communication>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, customer_id, message_content, communication_type, direction, sentiment_score, created_at
             FROM customer_communications
             WHERE customer_id = ?1
             ORDER BY created_at, id",
        )?;
        let rows = stmt
            .query_map(params![customer_id], communication_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }
}
