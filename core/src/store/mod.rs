//! SQLite persistence layer.
//!
//! RULE: only the store talks to the database. The engine and its phases
//! call store methods; they never execute SQL directly.
//!
//! Timestamps are stored as epoch milliseconds. Embeddings, plan steps,
//! step results and other structured columns are stored as JSON text.

use crate::error::AgentResult;
use rusqlite::{types::Type, Connection};
use serde::de::DeserializeOwned;

mod activity;
mod communication;
mod customer;
mod intervention;
mod memory;
mod pattern;

pub struct AgentStore {
    conn: Connection,
}

impl AgentStore {
    pub fn open(path: &str) -> AgentResult<Self> {
        let conn = Connection::open_with_flags(
            path,
            rusqlite::OpenFlags::SQLITE_OPEN_READ_WRITE
                | rusqlite::OpenFlags::SQLITE_OPEN_CREATE
                | rusqlite::OpenFlags::SQLITE_OPEN_URI,
        )?;
        // WAL mode only matters for real files; :memory: ignores it.
        let _ = conn.execute_batch("PRAGMA journal_mode=WAL;");
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        Ok(Self { conn })
    }

    /// Open an in-memory database (used in tests).
    pub fn in_memory() -> AgentResult<Self> {
        let conn = Connection::open(":memory:")?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        Ok(Self { conn })
    }

    /// Apply all schema migrations in order. Idempotent.
    pub fn migrate(&self) -> AgentResult<()> {
        self.conn
            .execute_batch(include_str!("../../../migrations/001_customers.sql"))?;
        self.conn
            .execute_batch(include_str!("../../../migrations/002_interventions.sql"))?;
        self.conn
            .execute_batch(include_str!("../../../migrations/003_patterns.sql"))?;
        self.conn
            .execute_batch(include_str!("../../../migrations/004_activity_memory.sql"))?;
        Ok(())
    }

    /// Run `work` inside one transaction. Any error rolls every write back.
    ///
    /// Units of work do not nest: `work` must not call `unit_of_work` again.
    pub fn unit_of_work<T>(&self, work: impl FnOnce(&Self) -> AgentResult<T>) -> AgentResult<T> {
        let tx = self.conn.unchecked_transaction()?;
        let out = work(self)?;
        tx.commit()?;
        Ok(out)
    }
}

// ── Column decoding ────────────────────────────────────────────

/// Decode a text column into a closed enum, failing the row on unknown values.
pub(crate) fn decode_enum<T>(col: usize, raw: String, parse: fn(&str) -> Option<T>) -> rusqlite::Result<T> {
    parse(&raw).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(col, Type::Text, format!("unexpected value '{raw}'").into())
    })
}

/// Decode a JSON text column. NULL decodes to `T::default()`.
pub(crate) fn decode_json<T: DeserializeOwned + Default>(col: usize, raw: Option<String>) -> rusqlite::Result<T> {
    match raw {
        None => Ok(T::default()),
        Some(text) => serde_json::from_str(&text)
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(col, Type::Text, Box::new(e))),
    }
}

pub(crate) fn encode_json<T: serde::Serialize>(value: &T) -> AgentResult<String> {
    Ok(serde_json::to_string(value)?)
}
