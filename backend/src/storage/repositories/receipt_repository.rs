use anyhow::Result;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection};

use crate::storage::connection::DbConnection;
use shared::{Receipt, ReceiptCategory};

/// Repository for payment ledger rows
#[derive(Clone)]
pub struct ReceiptRepository {
    db: DbConnection,
}

const RECEIPT_COLUMNS: &str = "id, receipt_number, member_id, payer_name, amount, amount_paid, \
     due_amount, payment_method, description, receipt_category, is_initial, \
     original_receipt_id, version_number, is_current_version, superseded_at, created_at";

pub(crate) fn row_to_receipt(row: &SqliteRow) -> Receipt {
    Receipt {
        id: row.get("id"),
        receipt_number: row.get("receipt_number"),
        member_id: row.get("member_id"),
        payer_name: row.get("payer_name"),
        amount: row.get("amount"),
        amount_paid: row.get("amount_paid"),
        due_amount: row.get("due_amount"),
        payment_method: row.get("payment_method"),
        description: row.get("description"),
        receipt_category: row
            .get::<Option<String>, _>("receipt_category")
            .and_then(|s| ReceiptCategory::parse(&s)),
        is_initial: row.get::<i64, _>("is_initial") != 0,
        original_receipt_id: row.get("original_receipt_id"),
        version_number: row.get("version_number"),
        is_current_version: row.get::<i64, _>("is_current_version") != 0,
        superseded_at: row.get("superseded_at"),
        created_at: row.get("created_at"),
    }
}

impl ReceiptRepository {
    pub fn new(db: DbConnection) -> Self {
        Self { db }
    }

    /// Insert a receipt row on an existing transaction
    pub async fn insert_receipt_tx(conn: &mut SqliteConnection, receipt: &Receipt) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO receipts (
                id, receipt_number, member_id, payer_name, amount, amount_paid,
                due_amount, payment_method, description, receipt_category,
                is_initial, original_receipt_id, version_number,
                is_current_version, superseded_at, created_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&receipt.id)
        .bind(&receipt.receipt_number)
        .bind(&receipt.member_id)
        .bind(&receipt.payer_name)
        .bind(receipt.amount)
        .bind(receipt.amount_paid)
        .bind(receipt.due_amount)
        .bind(&receipt.payment_method)
        .bind(&receipt.description)
        .bind(receipt.receipt_category.map(|c| c.as_str()))
        .bind(receipt.is_initial as i64)
        .bind(&receipt.original_receipt_id)
        .bind(receipt.version_number)
        .bind(receipt.is_current_version as i64)
        .bind(&receipt.superseded_at)
        .bind(&receipt.created_at)
        .execute(conn)
        .await?;
        Ok(())
    }

    pub async fn get_receipt(&self, receipt_id: &str) -> Result<Option<Receipt>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM receipts WHERE id = ?",
            RECEIPT_COLUMNS
        ))
        .bind(receipt_id)
        .fetch_optional(self.db.pool())
        .await?;

        Ok(row.as_ref().map(row_to_receipt))
    }

    /// Current-version receipts for a member, oldest first
    pub async fn list_member_receipts(&self, member_id: &str) -> Result<Vec<Receipt>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM receipts WHERE member_id = ? AND is_current_version = 1 ORDER BY ROWID",
            RECEIPT_COLUMNS
        ))
        .bind(member_id)
        .fetch_all(self.db.pool())
        .await?;

        Ok(rows.iter().map(row_to_receipt).collect())
    }

    /// The initial registration receipt for a (member, category) pair, if any
    pub async fn get_initial_receipt(
        &self,
        member_id: &str,
        category: Option<ReceiptCategory>,
    ) -> Result<Option<Receipt>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM receipts WHERE member_id = ? AND is_initial = 1 \
             AND receipt_category IS ? LIMIT 1",
            RECEIPT_COLUMNS
        ))
        .bind(member_id)
        .bind(category.map(|c| c.as_str()))
        .fetch_optional(self.db.pool())
        .await?;

        Ok(row.as_ref().map(row_to_receipt))
    }

    /// Rewrite the mutable fields of a receipt on an existing transaction
    pub async fn update_receipt_tx(conn: &mut SqliteConnection, receipt: &Receipt) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE receipts
            SET amount = ?, amount_paid = ?, due_amount = ?, payment_method = ?,
                description = ?
            WHERE id = ?
            "#,
        )
        .bind(receipt.amount)
        .bind(receipt.amount_paid)
        .bind(receipt.due_amount)
        .bind(&receipt.payment_method)
        .bind(&receipt.description)
        .bind(&receipt.id)
        .execute(conn)
        .await?;
        Ok(())
    }

    /// Delete a receipt row on an existing transaction; returns whether it existed
    pub async fn delete_receipt_tx(conn: &mut SqliteConnection, receipt_id: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM receipts WHERE id = ?")
            .bind(receipt_id)
            .execute(conn)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Flag a receipt as superseded by a newer version
    pub async fn mark_superseded_tx(
        conn: &mut SqliteConnection,
        receipt_id: &str,
        superseded_at: &str,
    ) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE receipts
            SET is_current_version = 0, superseded_at = ?
            WHERE id = ? AND is_current_version = 1
            "#,
        )
        .bind(superseded_at)
        .bind(receipt_id)
        .execute(conn)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// All versions of a receipt chain ordered by version number. The root id
    /// is its own `original_receipt_id` for the first version.
    pub async fn list_receipt_versions(&self, root_id: &str) -> Result<Vec<Receipt>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM receipts WHERE id = ? OR original_receipt_id = ? \
             ORDER BY version_number",
            RECEIPT_COLUMNS
        ))
        .bind(root_id)
        .bind(root_id)
        .fetch_all(self.db.pool())
        .await?;

        Ok(rows.iter().map(row_to_receipt).collect())
    }
}
