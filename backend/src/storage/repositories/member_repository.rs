use anyhow::Result;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection};

use crate::storage::connection::DbConnection;
use shared::{Member, MemberStatus, PlanType, SubscriptionStatus};

/// Repository for member rows
#[derive(Clone)]
pub struct MemberRepository {
    db: DbConnection,
}

const MEMBER_COLUMNS: &str = "id, member_number, name, phone, email, registration_fee, \
     package_fee, membership_fees, discount, paid_amount, subscription_start, \
     subscription_end, plan_type, subscription_status, status, created_at, updated_at";

/// Sum of amount_paid over the member's current member-category receipts.
/// Runs as one statement so the cached figure can never be observed between
/// a ledger write and its reconciliation.
const SYNC_PAID_AMOUNT_SQL: &str = r#"
    UPDATE members
    SET paid_amount = (
        SELECT COALESCE(SUM(amount_paid), 0)
        FROM receipts
        WHERE member_id = members.id
          AND is_current_version = 1
          AND (receipt_category IS NULL OR receipt_category = 'member')
    ),
    updated_at = ?
    WHERE id = ?
    "#;

pub(crate) fn row_to_member(row: &SqliteRow) -> Member {
    Member {
        id: row.get("id"),
        member_number: row.get("member_number"),
        name: row.get("name"),
        phone: row.get("phone"),
        email: row.get("email"),
        registration_fee: row.get("registration_fee"),
        package_fee: row.get("package_fee"),
        membership_fees: row.get("membership_fees"),
        discount: row.get("discount"),
        paid_amount: row.get("paid_amount"),
        subscription_start: row.get("subscription_start"),
        subscription_end: row.get("subscription_end"),
        plan_type: row
            .get::<Option<String>, _>("plan_type")
            .and_then(|s| PlanType::parse(&s)),
        subscription_status: row
            .get::<Option<String>, _>("subscription_status")
            .and_then(|s| SubscriptionStatus::parse(&s)),
        status: MemberStatus::parse(row.get::<String, _>("status").as_str())
            .unwrap_or(MemberStatus::Active),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

impl MemberRepository {
    pub fn new(db: DbConnection) -> Self {
        Self { db }
    }

    /// Insert a member row on an existing transaction
    pub async fn insert_member_tx(conn: &mut SqliteConnection, member: &Member) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO members (
                id, member_number, name, phone, email, registration_fee,
                package_fee, membership_fees, discount, paid_amount,
                subscription_start, subscription_end, plan_type,
                subscription_status, status, created_at, updated_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&member.id)
        .bind(&member.member_number)
        .bind(&member.name)
        .bind(&member.phone)
        .bind(&member.email)
        .bind(member.registration_fee)
        .bind(member.package_fee)
        .bind(member.membership_fees)
        .bind(member.discount)
        .bind(member.paid_amount)
        .bind(&member.subscription_start)
        .bind(&member.subscription_end)
        .bind(member.plan_type.map(|p| p.as_str()))
        .bind(member.subscription_status.map(|s| s.as_str()))
        .bind(member.status.as_str())
        .bind(&member.created_at)
        .bind(&member.updated_at)
        .execute(conn)
        .await?;
        Ok(())
    }

    /// Store a member in the database
    pub async fn store_member(&self, member: &Member) -> Result<()> {
        let mut conn = self.db.pool().acquire().await?;
        Self::insert_member_tx(&mut conn, member).await
    }

    pub async fn get_member(&self, member_id: &str) -> Result<Option<Member>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM members WHERE id = ?",
            MEMBER_COLUMNS
        ))
        .bind(member_id)
        .fetch_optional(self.db.pool())
        .await?;

        Ok(row.as_ref().map(row_to_member))
    }

    pub async fn get_member_by_number(&self, member_number: &str) -> Result<Option<Member>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM members WHERE member_number = ?",
            MEMBER_COLUMNS
        ))
        .bind(member_number)
        .fetch_optional(self.db.pool())
        .await?;

        Ok(row.as_ref().map(row_to_member))
    }

    /// List all members ordered by name
    pub async fn list_members(&self) -> Result<Vec<Member>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM members ORDER BY name",
            MEMBER_COLUMNS
        ))
        .fetch_all(self.db.pool())
        .await?;

        Ok(rows.iter().map(row_to_member).collect())
    }

    /// Persist every field of an existing member row except `paid_amount`,
    /// which only the reconciler writes.
    pub async fn update_member(&self, member: &Member) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE members
            SET member_number = ?, name = ?, phone = ?, email = ?,
                registration_fee = ?, package_fee = ?, membership_fees = ?,
                discount = ?, subscription_start = ?, subscription_end = ?,
                plan_type = ?, subscription_status = ?, status = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(&member.member_number)
        .bind(&member.name)
        .bind(&member.phone)
        .bind(&member.email)
        .bind(member.registration_fee)
        .bind(member.package_fee)
        .bind(member.membership_fees)
        .bind(member.discount)
        .bind(&member.subscription_start)
        .bind(&member.subscription_end)
        .bind(member.plan_type.map(|p| p.as_str()))
        .bind(member.subscription_status.map(|s| s.as_str()))
        .bind(member.status.as_str())
        .bind(&member.updated_at)
        .bind(&member.id)
        .execute(self.db.pool())
        .await?;
        Ok(())
    }

    /// Rewrite the cached `paid_amount` from the receipt ledger
    pub async fn sync_paid_amount(&self, member_id: &str) -> Result<()> {
        sqlx::query(SYNC_PAID_AMOUNT_SQL)
            .bind(chrono::Utc::now().to_rfc3339())
            .bind(member_id)
            .execute(self.db.pool())
            .await?;
        Ok(())
    }

    /// Transaction-scoped variant of [`sync_paid_amount`](Self::sync_paid_amount)
    pub async fn sync_paid_amount_tx(conn: &mut SqliteConnection, member_id: &str) -> Result<()> {
        sqlx::query(SYNC_PAID_AMOUNT_SQL)
            .bind(chrono::Utc::now().to_rfc3339())
            .bind(member_id)
            .execute(conn)
            .await?;
        Ok(())
    }

    /// Write a recomputed subscription status, guarded so an unchanged status
    /// performs no write. Returns true when a row was actually updated.
    pub async fn update_subscription_status_guarded(
        &self,
        member_id: &str,
        status: SubscriptionStatus,
    ) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE members
            SET subscription_status = ?, updated_at = ?
            WHERE id = ?
              AND (subscription_status IS NULL OR subscription_status != ?)
            "#,
        )
        .bind(status.as_str())
        .bind(chrono::Utc::now().to_rfc3339())
        .bind(member_id)
        .bind(status.as_str())
        .execute(self.db.pool())
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Members eligible for the subscription sweep: live rows with an end date
    pub async fn list_members_with_end_date(&self) -> Result<Vec<Member>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM members WHERE subscription_end IS NOT NULL ORDER BY member_number",
            MEMBER_COLUMNS
        ))
        .fetch_all(self.db.pool())
        .await?;

        Ok(rows.iter().map(row_to_member).collect())
    }

    /// All member numbers currently in use (for allocation scans)
    pub async fn list_member_numbers(&self) -> Result<Vec<String>> {
        let rows = sqlx::query("SELECT member_number FROM members")
            .fetch_all(self.db.pool())
            .await?;

        Ok(rows.iter().map(|r| r.get("member_number")).collect())
    }

    pub async fn member_number_exists(&self, candidate: &str) -> Result<bool> {
        let row = sqlx::query("SELECT COUNT(*) AS n FROM members WHERE member_number = ?")
            .bind(candidate)
            .fetch_one(self.db.pool())
            .await?;
        let n: i64 = row.get("n");
        Ok(n > 0)
    }
}
