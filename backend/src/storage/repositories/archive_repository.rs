use anyhow::Result;
use log::warn;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection};

use crate::storage::connection::DbConnection;
use crate::storage::repositories::member_repository::MemberRepository;
use shared::{DeletedMemberSnapshot, Member};

/// Repository for the member deletion archive
#[derive(Clone)]
pub struct ArchiveRepository {
    db: DbConnection,
}

fn row_to_snapshot(row: &SqliteRow) -> Result<DeletedMemberSnapshot> {
    let member_json: String = row.get("member_json");
    let member: Member = serde_json::from_str(&member_json)?;

    Ok(DeletedMemberSnapshot {
        id: row.get("id"),
        member_id: row.get("member_id"),
        member_number: row.get("member_number"),
        member,
        deleted_by: row.get("deleted_by"),
        delete_reason: row.get("delete_reason"),
        deleted_at: row.get("deleted_at"),
    })
}

fn is_foreign_key_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(e) if e.message().contains("FOREIGN KEY constraint failed"))
}

async fn delete_member_rows(conn: &mut SqliteConnection, member_id: &str) -> sqlx::Result<()> {
    // Dependent rows first, then the member itself. The schema also carries
    // ON DELETE CASCADE, so these deletes are belt-and-braces ordering.
    for table in ["receipts", "invoices", "attendance", "body_measurements"] {
        sqlx::query(&format!("DELETE FROM {} WHERE member_id = ?", table))
            .bind(member_id)
            .execute(&mut *conn)
            .await?;
    }
    sqlx::query("DELETE FROM members WHERE id = ?")
        .bind(member_id)
        .execute(conn)
        .await?;
    Ok(())
}

impl ArchiveRepository {
    pub fn new(db: DbConnection) -> Self {
        Self { db }
    }

    /// Snapshot a member and remove it with its dependent rows, atomically.
    /// The snapshot insert precedes every destructive statement: a failure
    /// after it leaves at worst an orphan snapshot, never a member lost
    /// without one.
    pub async fn archive_and_delete(&self, snapshot: &DeletedMemberSnapshot) -> Result<()> {
        let member_json = serde_json::to_string(&snapshot.member)?;

        let mut tx = self.db.pool().begin().await?;

        sqlx::query(
            r#"
            INSERT INTO deleted_members (
                id, member_id, member_number, member_json, deleted_by,
                delete_reason, deleted_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&snapshot.id)
        .bind(&snapshot.member_id)
        .bind(&snapshot.member_number)
        .bind(&member_json)
        .bind(&snapshot.deleted_by)
        .bind(&snapshot.delete_reason)
        .bind(&snapshot.deleted_at)
        .execute(&mut *tx)
        .await?;

        if let Err(err) = delete_member_rows(&mut tx, &snapshot.member_id).await {
            if !is_foreign_key_violation(&err) {
                return Err(err.into());
            }

            // Narrowly-scoped fallback: defer FK enforcement to commit time
            // for this transaction only, then retry the cascade once.
            warn!(
                "Cascade delete for {} hit a foreign key constraint; retrying with deferred enforcement",
                snapshot.member_id
            );
            sqlx::query("PRAGMA defer_foreign_keys = ON")
                .execute(&mut *tx)
                .await?;
            delete_member_rows(&mut tx, &snapshot.member_id).await?;
        }

        tx.commit().await?;
        Ok(())
    }

    pub async fn get_snapshot(&self, snapshot_id: &str) -> Result<Option<DeletedMemberSnapshot>> {
        let row = sqlx::query("SELECT * FROM deleted_members WHERE id = ?")
            .bind(snapshot_id)
            .fetch_optional(self.db.pool())
            .await?;

        row.as_ref().map(row_to_snapshot).transpose()
    }

    /// All snapshots, most recent deletion first
    pub async fn list_snapshots(&self) -> Result<Vec<DeletedMemberSnapshot>> {
        let rows = sqlx::query("SELECT * FROM deleted_members ORDER BY deleted_at DESC")
            .fetch_all(self.db.pool())
            .await?;

        rows.iter().map(row_to_snapshot).collect()
    }

    /// Re-insert the member carried by a snapshot and consume the snapshot,
    /// atomically.
    pub async fn restore_snapshot(&self, snapshot_id: &str, member: &Member) -> Result<()> {
        let mut tx = self.db.pool().begin().await?;

        MemberRepository::insert_member_tx(&mut tx, member).await?;

        sqlx::query("DELETE FROM deleted_members WHERE id = ?")
            .bind(snapshot_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }

    /// Remove a snapshot with no further trace; returns whether it existed
    pub async fn delete_snapshot(&self, snapshot_id: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM deleted_members WHERE id = ?")
            .bind(snapshot_id)
            .execute(self.db.pool())
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
