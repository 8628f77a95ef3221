use super::{decode_enum, decode_json, encode_json, AgentStore};
use crate::{
    clock::{from_millis, to_millis},
    error::{AgentError, AgentResult},
    intervention::{ChurnIntervention, StepResult},
    types::{ActualOutcome, CustomerId, InterventionId, InterventionStatus},
};
use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension, Row};

const INTERVENTION_COLUMNS: &str = "id, customer_id, intervention_type, churn_probability_before,
    churn_probability_after, trigger_reason, strategy_chosen, confidence_score,
    expected_success_rate, status, execution_steps, outcome_details, revenue_at_risk,
    estimated_retention_value, actual_outcome, reasoning, created_at, completed_at,
    follow_up_at, pattern_feedback_at";

fn intervention_from_row(row: &Row<'_>) -> rusqlite::Result<ChurnIntervention> {
    let actual_outcome: Option<String> = row.get(14)?;
    Ok(ChurnIntervention {
        id: row.get(0)?,
        customer_id: row.get(1)?,
        intervention_type: row.get(2)?,
        churn_probability_before: row.get(3)?,
        churn_probability_after: row.get(4)?,
        trigger_reason: row.get(5)?,
        strategy_chosen: row.get(6)?,
        confidence_score: row.get(7)?,
        expected_success_rate: row.get(8)?,
        status: decode_enum(9, row.get(9)?, InterventionStatus::parse)?,
        execution_steps: decode_json(10, row.get(10)?)?,
        outcome_details: decode_json(11, row.get(11)?)?,
        revenue_at_risk: row.get(12)?,
        estimated_retention_value: row.get(13)?,
        actual_outcome: actual_outcome
            .map(|raw| decode_enum(14, raw, ActualOutcome::parse))
            .transpose()?,
        reasoning: row.get(15)?,
        created_at: from_millis(row.get(16)?),
        completed_at: row.get::<_, Option<i64>>(17)?.map(from_millis),
        follow_up_at: row.get::<_, Option<i64>>(18)?.map(from_millis),
        pattern_feedback_at: row.get::<_, Option<i64>>(19)?.map(from_millis),
    })
}

impl AgentStore {
    // ── Interventions ──────────────────────────────────────────

    /// Insert an intervention and return its id. `i.id` is ignored.
    pub fn insert_intervention(&self, i: &ChurnIntervention) -> AgentResult<InterventionId> {
        self.conn.execute(
            "INSERT INTO churn_interventions (
                customer_id, intervention_type, churn_probability_before, churn_probability_after,
                trigger_reason, strategy_chosen, confidence_score, expected_success_rate, status,
                execution_steps, outcome_details, revenue_at_risk, estimated_retention_value,
                actual_outcome, reasoning, created_at, completed_at, follow_up_at, pattern_feedback_at
            ) VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11,?12,?13,?14,?15,?16,?17,?18,?19)",
            params![
                i.customer_id,
                &i.intervention_type,
                i.churn_probability_before,
                i.churn_probability_after,
                &i.trigger_reason,
                &i.strategy_chosen,
                i.confidence_score,
                i.expected_success_rate,
                i.status.as_str(),
                encode_json(&i.execution_steps)?,
                encode_json(&i.outcome_details)?,
                i.revenue_at_risk,
                i.estimated_retention_value,
                i.actual_outcome.map(|o| o.as_str()),
                &i.reasoning,
                to_millis(i.created_at),
                i.completed_at.map(to_millis),
                i.follow_up_at.map(to_millis),
                i.pattern_feedback_at.map(to_millis),
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    pub fn get_intervention(&self, id: InterventionId) -> AgentResult<ChurnIntervention> {
        self.conn
            .query_row(
                &format!("SELECT {INTERVENTION_COLUMNS} FROM churn_interventions WHERE id = ?1"),
                params![id],
                intervention_from_row,
            )
            .optional()?
            .ok_or(AgentError::InterventionNotFound { id })
    }

    pub fn interventions_for_customer(&self, customer_id: CustomerId) -> AgentResult<Vec<ChurnIntervention>> {
        self.query_interventions(
            "WHERE customer_id = ?1 ORDER BY created_at, id",
            params![customer_id],
        )
    }

    /// Interventions created at or after `since`, newest first.
    pub fn interventions_created_since(&self, since: DateTime<Utc>) -> AgentResult<Vec<ChurnIntervention>> {
        self.query_interventions(
            "WHERE created_at >= ?1 ORDER BY created_at DESC, id DESC",
            params![to_millis(since)],
        )
    }

    pub fn all_interventions(&self) -> AgentResult<Vec<ChurnIntervention>> {
        self.query_interventions("ORDER BY id", [])
    }

    /// True when the customer has a pending or executing intervention
    /// created at or after `since`.
    pub fn has_active_intervention(&self, customer_id: CustomerId, since: DateTime<Utc>) -> AgentResult<bool> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM churn_interventions
             WHERE customer_id = ?1 AND status IN ('pending', 'executing') AND created_at >= ?2",
            params![customer_id, to_millis(since)],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    /// Record the result of running a plan.
    pub fn complete_intervention(
        &self,
        id: InterventionId,
        status: InterventionStatus,
        results: &[StepResult],
        completed_at: DateTime<Utc>,
    ) -> AgentResult<()> {
        let changed = self.conn.execute(
            "UPDATE churn_interventions
             SET status = ?2, outcome_details = ?3, completed_at = ?4
             WHERE id = ?1",
            params![id, status.as_str(), encode_json(&results)?, to_millis(completed_at)],
        )?;
        if changed == 0 {
            return Err(AgentError::InterventionNotFound { id });
        }
        Ok(())
    }

    /// Mark `executing` interventions created before `created_before` that
    /// never completed as `timeout`. Returns the abandoned records.
    pub fn abandon_orphaned_interventions(
        &self,
        created_before: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> AgentResult<Vec<ChurnIntervention>> {
        let orphans = self.query_interventions(
            "WHERE status = 'executing' AND completed_at IS NULL AND created_at < ?1 ORDER BY id",
            params![to_millis(created_before)],
        )?;
        for orphan in &orphans {
            self.conn.execute(
                "UPDATE churn_interventions SET status = 'timeout', completed_at = ?2 WHERE id = ?1",
                params![orphan.id, to_millis(now)],
            )?;
        }
        Ok(orphans)
    }

    /// Completed (successful or failed) interventions with no outcome yet,
    /// whose completion falls inside `[from, to]`.
    pub fn interventions_due_for_follow_up(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> AgentResult<Vec<ChurnIntervention>> {
        self.query_interventions(
            "WHERE status IN ('successful', 'failed') AND actual_outcome IS NULL
               AND completed_at >= ?1 AND completed_at <= ?2
             ORDER BY completed_at, id",
            params![to_millis(from), to_millis(to)],
        )
    }

    pub fn record_follow_up(
        &self,
        id: InterventionId,
        probability_after: f64,
        outcome: ActualOutcome,
        now: DateTime<Utc>,
    ) -> AgentResult<()> {
        let changed = self.conn.execute(
            "UPDATE churn_interventions
             SET churn_probability_after = ?2, actual_outcome = ?3, follow_up_at = ?4
             WHERE id = ?1 AND actual_outcome IS NULL",
            params![id, probability_after, outcome.as_str(), to_millis(now)],
        )?;
        if changed == 0 {
            return Err(AgentError::InterventionNotFound { id });
        }
        Ok(())
    }

    /// Interventions whose outcome was recorded at or after `since` and
    /// that have not yet fed back into the pattern library.
    pub fn interventions_awaiting_pattern_feedback(&self, since: DateTime<Utc>) -> AgentResult<Vec<ChurnIntervention>> {
        self.query_interventions(
            "WHERE actual_outcome IS NOT NULL AND pattern_feedback_at IS NULL
               AND follow_up_at >= ?1
             ORDER BY follow_up_at, id",
            params![to_millis(since)],
        )
    }

    pub fn mark_pattern_feedback(&self, id: InterventionId, now: DateTime<Utc>) -> AgentResult<()> {
        let changed = self.conn.execute(
            "UPDATE churn_interventions SET pattern_feedback_at = ?2
             WHERE id = ?1 AND pattern_feedback_at IS NULL",
            params![id, to_millis(now)],
        )?;
        if changed == 0 {
            return Err(AgentError::InterventionNotFound { id });
        }
        Ok(())
    }

    fn query_interventions<P: rusqlite::Params>(
        &self,
        clause: &str,
        params: P,
    ) -> AgentResult<Vec<ChurnIntervention>> {
        let mut stmt = self
            .conn
            .prepare(&format!("SELECT {INTERVENTION_COLUMNS} FROM churn_interventions {clause}"))?;
        let rows = stmt
            .query_map(params, intervention_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }
}
