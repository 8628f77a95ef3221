use super::{decode_enum, encode_json, AgentStore};
use crate::{
    activity::AgentActivity,
    clock::{from_millis, to_millis},
    error::AgentResult,
    types::{ActivityType, Urgency},
};
use chrono::{DateTime, Utc};
use rusqlite::{params, types::Type, Row};

fn activity_from_row(row: &Row<'_>) -> rusqlite::Result<AgentActivity> {
    let metadata: String = row.get(7)?;
    Ok(AgentActivity {
        id: row.get(0)?,
        cycle: row.get::<_, i64>(1)? as u64,
        activity_type: decode_enum(2, row.get(2)?, ActivityType::parse)?,
        customer_id: row.get(3)?,
        intervention_id: row.get(4)?,
        description: row.get(5)?,
        urgency: decode_enum(6, row.get(6)?, Urgency::parse)?,
        metadata: serde_json::from_str(&metadata)
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(7, Type::Text, Box::new(e)))?,
        created_at: from_millis(row.get(8)?),
    })
}

impl AgentStore {
    // ── Activity feed ──────────────────────────────────────────

    /// Append an activity; returns it with its new id.
    pub fn insert_activity(&self, activity: &AgentActivity) -> AgentResult<AgentActivity> {
        self.conn.execute(
            "INSERT INTO agent_activities (
                cycle, activity_type, customer_id, intervention_id,
                description, urgency_level, metadata, created_at
            ) VALUES (?1,?2,?3,?4,?5,?6,?7,?8)",
            params![
                activity.cycle as i64,
                activity.activity_type.as_str(),
                activity.customer_id,
                activity.intervention_id,
                &activity.description,
                activity.urgency.as_str(),
                encode_json(&activity.metadata)?,
                to_millis(activity.created_at),
            ],
        )?;
        let mut stored = activity.clone();
        stored.id = self.conn.last_insert_rowid();
        Ok(stored)
    }

    /// Most recent activities first.
    pub fn recent_activities(&self, limit: usize) -> AgentResult<Vec<AgentActivity>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, cycle, activity_type, customer_id, intervention_id,
                    description, urgency_level, metadata, created_at
             FROM agent_activities
             ORDER BY created_at DESC, id DESC
             LIMIT ?1",
        )?;
        let rows = stmt
            .query_map(params![limit as i64], activity_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn activities_of_type(&self, activity_type: ActivityType) -> AgentResult<Vec<AgentActivity>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, cycle, activity_type, customer_id, intervention_id,
                    description, urgency_level, metadata, created_at
             FROM agent_activities
             WHERE activity_type = ?1
             ORDER BY id",
        )?;
        let rows = stmt
            .query_map(params![activity_type.as_str()], activity_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn activity_count_since(&self, since: DateTime<Utc>) -> AgentResult<i64> {
        Ok(self.conn.query_row(
            "SELECT COUNT(*) FROM agent_activities WHERE created_at >= ?1",
            params![to_millis(since)],
            |row| row.get(0),
        )?)
    }
}
