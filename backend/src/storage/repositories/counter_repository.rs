use anyhow::Result;
use sqlx::Row;

use crate::storage::connection::DbConnection;

/// Persisted counter names backing the identity allocator
pub const RECEIPT_COUNTER: &str = "receipt_counter";
pub const INVOICE_COUNTER: &str = "invoice_counter";
pub const ENQUIRY_COUNTER: &str = "enquiry_counter";
pub const MEMBER_COUNTER: &str = "member_counter";

/// Repository for the named allocation counters
#[derive(Clone)]
pub struct CounterRepository {
    db: DbConnection,
}

impl CounterRepository {
    pub fn new(db: DbConnection) -> Self {
        Self { db }
    }

    /// Atomically increment a counter and return the new value. The counter
    /// is seeded with `base` on first use, so the first returned value is
    /// `base + 1`. Single statement: concurrent callers can never observe
    /// the same value twice.
    pub async fn allocate(&self, name: &str, base: i64) -> Result<i64> {
        let row = sqlx::query(
            r#"
            INSERT INTO counters (name, value)
            VALUES (?, ? + 1)
            ON CONFLICT (name) DO UPDATE SET value = value + 1
            RETURNING value
            "#,
        )
        .bind(name)
        .bind(base)
        .fetch_one(self.db.pool())
        .await?;

        Ok(row.get("value"))
    }

    pub async fn get(&self, name: &str) -> Result<Option<i64>> {
        let row = sqlx::query("SELECT value FROM counters WHERE name = ?")
            .bind(name)
            .fetch_optional(self.db.pool())
            .await?;

        Ok(row.map(|r| r.get("value")))
    }

    /// Raise a counter to at least `value`; never lowers it
    pub async fn raise_to(&self, name: &str, value: i64) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO counters (name, value)
            VALUES (?, ?)
            ON CONFLICT (name) DO UPDATE SET value = MAX(value, excluded.value)
            "#,
        )
        .bind(name)
        .bind(value)
        .execute(self.db.pool())
        .await?;
        Ok(())
    }
}
