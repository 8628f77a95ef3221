use super::{decode_enum, decode_json, encode_json, AgentStore};
use crate::{
    clock::{from_millis, to_millis},
    error::AgentResult,
    patterns::RetentionPattern,
    types::Segment,
};
use rusqlite::{params, OptionalExtension, Row};

const PATTERN_COLUMNS: &str = "id, pattern_name, customer_segment, churn_reason_category,
    customer_characteristics, successful_interventions, success_rate, pattern_embedding,
    created_at, updated_at";

fn pattern_from_row(row: &Row<'_>) -> rusqlite::Result<RetentionPattern> {
    Ok(RetentionPattern {
        id: row.get(0)?,
        pattern_name: row.get(1)?,
        customer_segment: decode_enum(2, row.get(2)?, Segment::parse)?,
        churn_reason_category: row.get(3)?,
        customer_characteristics: decode_json(4, row.get(4)?)?,
        successful_interventions: decode_json(5, row.get(5)?)?,
        success_rate: row.get(6)?,
        embedding: decode_json(7, row.get(7)?)?,
        created_at: from_millis(row.get(8)?),
        updated_at: from_millis(row.get(9)?),
    })
}

impl AgentStore {
    // ── Retention patterns ─────────────────────────────────────

    pub fn insert_pattern(&self, p: &RetentionPattern) -> AgentResult<i64> {
        self.conn.execute(
            "INSERT INTO retention_patterns (
                pattern_name, customer_segment, churn_reason_category, customer_characteristics,
                successful_interventions, success_rate, pattern_embedding, created_at, updated_at
            ) VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9)",
            params![
                &p.pattern_name,
                p.customer_segment.as_str(),
                &p.churn_reason_category,
                encode_json(&p.customer_characteristics)?,
                encode_json(&p.successful_interventions)?,
                p.success_rate,
                encode_json(&p.embedding)?,
                to_millis(p.created_at),
                to_millis(p.updated_at),
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    pub fn update_pattern_row(&self, p: &RetentionPattern) -> AgentResult<()> {
        self.conn.execute(
            "UPDATE retention_patterns SET
                customer_characteristics = ?2, successful_interventions = ?3,
                success_rate = ?4, pattern_embedding = ?5, updated_at = ?6
             WHERE pattern_name = ?1",
            params![
                &p.pattern_name,
                encode_json(&p.customer_characteristics)?,
                encode_json(&p.successful_interventions)?,
                p.success_rate,
                encode_json(&p.embedding)?,
                to_millis(p.updated_at),
            ],
        )?;
        Ok(())
    }

    pub fn pattern_by_name(&self, name: &str) -> AgentResult<Option<RetentionPattern>> {
        Ok(self
            .conn
            .query_row(
                &format!("SELECT {PATTERN_COLUMNS} FROM retention_patterns WHERE pattern_name = ?1"),
                params![name],
                pattern_from_row,
            )
            .optional()?)
    }

    /// Patterns of one segment, best success rate first. `min_success_rate`
    /// is an exclusive lower bound.
    pub fn patterns_for_segment(
        &self,
        segment: Segment,
        min_success_rate: Option<f64>,
        limit: Option<usize>,
    ) -> AgentResult<Vec<RetentionPattern>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {PATTERN_COLUMNS} FROM retention_patterns
             WHERE customer_segment = ?1 AND success_rate > ?2
             ORDER BY success_rate DESC, id
             LIMIT ?3"
        ))?;
        let floor = min_success_rate.unwrap_or(-1.0);
        let limit = limit.map(|l| l as i64).unwrap_or(-1);
        let rows = stmt
            .query_map(params![segment.as_str(), floor, limit], pattern_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn all_patterns(&self) -> AgentResult<Vec<RetentionPattern>> {
        let mut stmt = self
            .conn
            .prepare(&format!("SELECT {PATTERN_COLUMNS} FROM retention_patterns ORDER BY id"))?;
        let rows = stmt
            .query_map([], pattern_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn pattern_count(&self) -> AgentResult<i64> {
        Ok(self
            .conn
            .query_row("SELECT COUNT(*) FROM retention_patterns", [], |row| row.get(0))?)
    }
}
