//! Reconciler: the single source of truth for "how much has this member
//! actually paid". Recomputes the member's cached `paid_amount` from the
//! receipt ledger; no other code path writes that field.

use log::info;
use std::sync::Arc;

use crate::domain::errors::{LedgerError, LedgerResult};
use crate::domain::fees;
use crate::storage::connection::DbConnection;
use crate::storage::repositories::member_repository::MemberRepository;

/// Totals derived from the fee structure and the ledger
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReconciliationSummary {
    pub total_billable: f64,
    pub actual_paid: f64,
    pub calculated_due: f64,
}

#[derive(Clone)]
pub struct ReconciliationService {
    member_repository: MemberRepository,
}

impl ReconciliationService {
    pub fn new(db: Arc<DbConnection>) -> Self {
        Self {
            member_repository: MemberRepository::new((*db).clone()),
        }
    }

    /// Recompute the member's cached paid total from its current
    /// member-category receipts and return the resulting totals.
    pub async fn recalculate_member_totals(
        &self,
        member_id: &str,
    ) -> LedgerResult<ReconciliationSummary> {
        // Existence check first so a missing member is a typed failure,
        // not a silent zero-row update
        if self.member_repository.get_member(member_id).await?.is_none() {
            return Err(LedgerError::not_found("member", member_id));
        }

        self.member_repository.sync_paid_amount(member_id).await?;

        let member = self
            .member_repository
            .get_member(member_id)
            .await?
            .ok_or_else(|| LedgerError::not_found("member", member_id))?;

        let total_billable = fees::total_billable(&member);
        let actual_paid = member.paid_amount;
        let calculated_due = fees::due_amount(&member, actual_paid);

        info!(
            "Reconciled member {}: billable={:.2} paid={:.2} due={:.2}",
            member_id, total_billable, actual_paid, calculated_due
        );

        Ok(ReconciliationSummary {
            total_billable,
            actual_paid,
            calculated_due,
        })
    }

    /// Narrower variant used after single-receipt mutations; same
    /// sum-from-ledger approach, returns only the outstanding due.
    pub async fn update_member_due_amount(&self, member_id: &str) -> LedgerResult<f64> {
        let summary = self.recalculate_member_totals(member_id).await?;
        Ok(summary.calculated_due)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::repositories::receipt_repository::ReceiptRepository;
    use shared::{Member, MemberStatus, Receipt, ReceiptCategory};

    async fn setup_test() -> (
        ReconciliationService,
        MemberRepository,
        ReceiptRepository,
        Arc<DbConnection>,
    ) {
        let db = Arc::new(
            DbConnection::init_test()
                .await
                .expect("Failed to create test database"),
        );
        (
            ReconciliationService::new(db.clone()),
            MemberRepository::new((*db).clone()),
            ReceiptRepository::new((*db).clone()),
            db,
        )
    }

    fn test_member(id: &str, registration_fee: f64, package_fee: f64) -> Member {
        Member {
            id: id.to_string(),
            member_number: id.replace("member::", ""),
            name: "Test Member".to_string(),
            phone: None,
            email: None,
            registration_fee,
            package_fee: Some(package_fee),
            membership_fees: None,
            discount: 0.0,
            paid_amount: 0.0,
            subscription_start: None,
            subscription_end: None,
            plan_type: None,
            subscription_status: None,
            status: MemberStatus::Active,
            created_at: "2025-01-01T00:00:00Z".to_string(),
            updated_at: "2025-01-01T00:00:00Z".to_string(),
        }
    }

    fn test_receipt(
        id: &str,
        member_id: &str,
        number: &str,
        amount_paid: f64,
        category: Option<ReceiptCategory>,
    ) -> Receipt {
        Receipt {
            id: id.to_string(),
            receipt_number: number.to_string(),
            member_id: Some(member_id.to_string()),
            payer_name: "Test Member".to_string(),
            amount: amount_paid,
            amount_paid,
            due_amount: 0.0,
            payment_method: "cash".to_string(),
            description: None,
            receipt_category: category,
            is_initial: false,
            original_receipt_id: None,
            version_number: 1,
            is_current_version: true,
            superseded_at: None,
            created_at: "2025-01-01T00:00:00Z".to_string(),
        }
    }

    async fn insert_receipt(db: &DbConnection, receipt: &Receipt) {
        let mut conn = db.pool().acquire().await.unwrap();
        ReceiptRepository::insert_receipt_tx(&mut conn, receipt)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_recalculate_sums_member_receipts() {
        let (service, members, _receipts, db) = setup_test().await;

        let member = test_member("member::a", 500.0, 1500.0);
        members.store_member(&member).await.unwrap();

        insert_receipt(
            &db,
            &test_receipt("receipt::1", "member::a", "001001", 600.0, Some(ReceiptCategory::Member)),
        )
        .await;
        insert_receipt(
            &db,
            &test_receipt("receipt::2", "member::a", "001002", 400.0, None),
        )
        .await;
        // Staff receipts never count toward the member total
        insert_receipt(
            &db,
            &test_receipt("receipt::3", "member::a", "001003", 999.0, Some(ReceiptCategory::Staff)),
        )
        .await;

        let summary = service
            .recalculate_member_totals("member::a")
            .await
            .unwrap();

        assert_eq!(summary.total_billable, 2000.0);
        assert_eq!(summary.actual_paid, 1000.0);
        assert_eq!(summary.calculated_due, 1000.0);

        let reloaded = members.get_member("member::a").await.unwrap().unwrap();
        assert_eq!(reloaded.paid_amount, 1000.0);
    }

    #[tokio::test]
    async fn test_recalculate_repairs_drifted_cache() {
        let (service, members, _receipts, db) = setup_test().await;

        let mut member = test_member("member::b", 0.0, 1000.0);
        member.paid_amount = 777.0; // drifted cache
        members.store_member(&member).await.unwrap();

        insert_receipt(
            &db,
            &test_receipt("receipt::4", "member::b", "001004", 250.0, None),
        )
        .await;

        let summary = service
            .recalculate_member_totals("member::b")
            .await
            .unwrap();
        assert_eq!(summary.actual_paid, 250.0);

        let reloaded = members.get_member("member::b").await.unwrap().unwrap();
        assert_eq!(reloaded.paid_amount, 250.0);
    }

    #[tokio::test]
    async fn test_superseded_receipts_do_not_count() {
        let (service, members, _receipts, db) = setup_test().await;

        let member = test_member("member::c", 0.0, 1000.0);
        members.store_member(&member).await.unwrap();

        let mut old = test_receipt("receipt::5", "member::c", "001005", 800.0, None);
        old.is_current_version = false;
        old.superseded_at = Some("2025-01-02T00:00:00Z".to_string());
        insert_receipt(&db, &old).await;
        insert_receipt(
            &db,
            &test_receipt("receipt::6", "member::c", "001006", 500.0, None),
        )
        .await;

        let summary = service
            .recalculate_member_totals("member::c")
            .await
            .unwrap();
        assert_eq!(summary.actual_paid, 500.0);
    }

    #[tokio::test]
    async fn test_missing_member_is_not_found() {
        let (service, _, _, _) = setup_test().await;

        let err = service
            .recalculate_member_totals("member::missing")
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_update_member_due_amount() {
        let (service, members, _receipts, db) = setup_test().await;

        let member = test_member("member::d", 500.0, 1500.0);
        members.store_member(&member).await.unwrap();
        insert_receipt(
            &db,
            &test_receipt("receipt::7", "member::d", "001007", 1500.0, None),
        )
        .await;

        let due = service.update_member_due_amount("member::d").await.unwrap();
        assert_eq!(due, 500.0);
    }
}
