use super::{decode_enum, decode_json, encode_json, AgentStore};
use crate::{
    clock::to_millis,
    customer::Customer,
    error::{AgentError, AgentResult},
    types::{ContactMethod, CustomerId, RiskLevel, SubscriptionTier},
};
use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension, Row};

const CUSTOMER_COLUMNS: &str = "id, name, company, email, phone, timezone, subscription_tier,
    monthly_revenue, annual_contract_value, days_since_signup, last_login_days_ago,
    support_tickets_count, feature_usage_score, nps_score, payment_delays,
    churn_probability, churn_risk_level, behavior_embedding, preferred_contact";

fn customer_from_row(row: &Row<'_>) -> rusqlite::Result<Customer> {
    Ok(Customer {
        id: row.get(0)?,
        name: row.get(1)?,
        company: row.get(2)?,
        email: row.get(3)?,
        phone: row.get(4)?,
        timezone: row.get(5)?,
        subscription_tier: decode_enum(6, row.get(6)?, SubscriptionTier::parse)?,
        monthly_revenue: row.get(7)?,
        annual_contract_value: row.get(8)?,
        days_since_signup: row.get(9)?,
        last_login_days_ago: row.get(10)?,
        support_tickets_count: row.get(11)?,
        feature_usage_score: row.get(12)?,
        nps_score: row.get(13)?,
        payment_delays: row.get(14)?,
        churn_probability: row.get(15)?,
        churn_risk_level: decode_enum(16, row.get(16)?, RiskLevel::parse)?,
        behavior_embedding: decode_json(17, row.get(17)?)?,
        preferred_contact: decode_enum(18, row.get(18)?, ContactMethod::parse)?,
    })
}

impl AgentStore {
    // ── Customers ──────────────────────────────────────────────

    /// Insert a customer and return its new id. `c.id` is ignored.
    pub fn insert_customer(&self, c: &Customer, now: DateTime<Utc>) -> AgentResult<CustomerId> {
        let embedding = if c.behavior_embedding.is_empty() {
            None
        } else {
            Some(encode_json(&c.behavior_embedding)?)
        };
        self.conn.execute(
            "INSERT INTO customers (
                name, company, email, phone, timezone, subscription_tier,
                monthly_revenue, annual_contract_value, days_since_signup, last_login_days_ago,
                support_tickets_count, feature_usage_score, nps_score, payment_delays,
                churn_probability, churn_risk_level, behavior_embedding, preferred_contact,
                created_at, updated_at
            ) VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11,?12,?13,?14,?15,?16,?17,?18,?19,?19)",
            params![
                &c.name,
                &c.company,
                &c.email,
                &c.phone,
                &c.timezone,
                c.subscription_tier.as_str(),
                c.monthly_revenue,
                c.annual_contract_value,
                c.days_since_signup,
                c.last_login_days_ago,
                c.support_tickets_count,
                c.feature_usage_score,
                c.nps_score,
                c.payment_delays,
                c.churn_probability,
                c.churn_risk_level.as_str(),
                embedding,
                c.preferred_contact.as_str(),
                to_millis(now),
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    pub fn get_customer(&self, id: CustomerId) -> AgentResult<Customer> {
        self.conn
            .query_row(
                &format!("SELECT {CUSTOMER_COLUMNS} FROM customers WHERE id = ?1"),
                params![id],
                customer_from_row,
            )
            .optional()?
            .ok_or(AgentError::CustomerNotFound { id })
    }

    pub fn all_customers(&self) -> AgentResult<Vec<Customer>> {
        let mut stmt = self
            .conn
            .prepare(&format!("SELECT {CUSTOMER_COLUMNS} FROM customers ORDER BY id"))?;
        let rows = stmt
            .query_map([], customer_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Customers whose stored probability is at or above `threshold`,
    /// highest risk first.
    pub fn customers_at_or_above(&self, threshold: f64) -> AgentResult<Vec<Customer>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {CUSTOMER_COLUMNS} FROM customers
             WHERE churn_probability >= ?1
             ORDER BY churn_probability DESC, id"
        ))?;
        let rows = stmt
            .query_map(params![threshold], customer_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn customer_count(&self) -> AgentResult<i64> {
        Ok(self
            .conn
            .query_row("SELECT COUNT(*) FROM customers", [], |row| row.get(0))?)
    }

    pub fn update_customer_risk(
        &self,
        id: CustomerId,
        probability: f64,
        level: RiskLevel,
        now: DateTime<Utc>,
    ) -> AgentResult<()> {
        let changed = self.conn.execute(
            "UPDATE customers SET churn_probability = ?2, churn_risk_level = ?3, updated_at = ?4
             WHERE id = ?1",
            params![id, probability, level.as_str(), to_millis(now)],
        )?;
        if changed == 0 {
            return Err(AgentError::CustomerNotFound { id });
        }
        Ok(())
    }

    pub fn set_customer_embedding(&self, id: CustomerId, embedding: &[f32], now: DateTime<Utc>) -> AgentResult<()> {
        let changed = self.conn.execute(
            "UPDATE customers SET behavior_embedding = ?2, updated_at = ?3 WHERE id = ?1",
            params![id, encode_json(&embedding)?, to_millis(now)],
        )?;
        if changed == 0 {
            return Err(AgentError::CustomerNotFound { id });
        }
        Ok(())
    }

    /// Overwrite the behavioural signals of a customer. Used by demo data
    /// and by tests that simulate a customer's behaviour changing.
    pub fn update_customer_signals(&self, c: &Customer, now: DateTime<Utc>) -> AgentResult<()> {
        let changed = self.conn.execute(
            "UPDATE customers SET
                last_login_days_ago = ?2, support_tickets_count = ?3, feature_usage_score = ?4,
                nps_score = ?5, payment_delays = ?6, days_since_signup = ?7, updated_at = ?8
             WHERE id = ?1",
            params![
                c.id,
                c.last_login_days_ago,
                c.support_tickets_count,
                c.feature_usage_score,
                c.nps_score,
                c.payment_delays,
                c.days_since_signup,
                to_millis(now),
            ],
        )?;
        if changed == 0 {
            return Err(AgentError::CustomerNotFound { id: c.id });
        }
        Ok(())
    }
}
