//! Soft delete and restore. Deleting a member first snapshots the full
//! profile into the archive, then removes the member and its dependent
//! rows in the same transaction; restoring replays the snapshot.

use chrono::Utc;
use log::info;
use std::sync::Arc;
use uuid::Uuid;

use crate::domain::errors::{LedgerError, LedgerResult};
use crate::storage::connection::DbConnection;
use crate::storage::repositories::archive_repository::ArchiveRepository;
use crate::storage::repositories::member_repository::MemberRepository;
use shared::{DeletedMemberSnapshot, Member};

#[derive(Clone)]
pub struct ArchiveService {
    archive_repository: ArchiveRepository,
    member_repository: MemberRepository,
}

impl ArchiveService {
    pub fn new(db: Arc<DbConnection>) -> Self {
        Self {
            archive_repository: ArchiveRepository::new((*db).clone()),
            member_repository: MemberRepository::new((*db).clone()),
        }
    }

    /// Archive a member and delete it with its dependent rows. The receipts
    /// are gone afterwards; the snapshot keeps the profile as it stood at
    /// deletion time, cached `paid_amount` included.
    pub async fn delete_member(
        &self,
        member_id: &str,
        deleted_by: &str,
        delete_reason: Option<String>,
    ) -> LedgerResult<DeletedMemberSnapshot> {
        let member = self
            .member_repository
            .get_member(member_id)
            .await?
            .ok_or_else(|| LedgerError::not_found("member", member_id))?;

        let snapshot = DeletedMemberSnapshot {
            id: DeletedMemberSnapshot::generate_id(&Uuid::new_v4().to_string()),
            member_id: member.id.clone(),
            member_number: member.member_number.clone(),
            member,
            deleted_by: deleted_by.to_string(),
            delete_reason,
            deleted_at: Utc::now().to_rfc3339(),
        };

        self.archive_repository.archive_and_delete(&snapshot).await?;

        info!(
            "Archived and deleted member {} (number {}) by {}",
            snapshot.member_id, snapshot.member_number, snapshot.deleted_by
        );
        Ok(snapshot)
    }

    /// Bring an archived member back. Rejected when the member number has
    /// been handed out again since the deletion; the archived receipts are
    /// gone, so the restored member keeps only its snapshotted totals.
    pub async fn restore_deleted_member(&self, snapshot_id: &str) -> LedgerResult<Member> {
        let snapshot = self
            .archive_repository
            .get_snapshot(snapshot_id)
            .await?
            .ok_or_else(|| LedgerError::not_found("snapshot", snapshot_id))?;

        if self
            .member_repository
            .member_number_exists(&snapshot.member_number)
            .await?
        {
            return Err(LedgerError::conflict(format!(
                "Member number {} is in use; cannot restore snapshot {}",
                snapshot.member_number, snapshot_id
            )));
        }

        // Restored members always come back live, whatever they were frozen as
        let mut member = snapshot.member.clone();
        member.status = shared::MemberStatus::Active;
        member.updated_at = Utc::now().to_rfc3339();

        self.archive_repository
            .restore_snapshot(snapshot_id, &member)
            .await?;

        info!(
            "Restored member {} (number {}) from snapshot {}",
            snapshot.member_id, snapshot.member_number, snapshot_id
        );
        Ok(member)
    }

    /// Drop a snapshot for good; the member becomes unrecoverable
    pub async fn permanently_delete_member(&self, snapshot_id: &str) -> LedgerResult<()> {
        if !self.archive_repository.delete_snapshot(snapshot_id).await? {
            return Err(LedgerError::not_found("snapshot", snapshot_id));
        }
        info!("Permanently deleted snapshot {}", snapshot_id);
        Ok(())
    }

    pub async fn get_snapshot(&self, snapshot_id: &str) -> LedgerResult<DeletedMemberSnapshot> {
        self.archive_repository
            .get_snapshot(snapshot_id)
            .await?
            .ok_or_else(|| LedgerError::not_found("snapshot", snapshot_id))
    }

    pub async fn list_snapshots(&self) -> LedgerResult<Vec<DeletedMemberSnapshot>> {
        Ok(self.archive_repository.list_snapshots().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::commands::members::CreateMemberCommand;
    use crate::domain::member_service::MemberService;
    use crate::domain::notifications::NotificationQueue;
    use crate::storage::repositories::receipt_repository::ReceiptRepository;

    async fn setup_test() -> (ArchiveService, MemberService, Arc<DbConnection>) {
        let db = Arc::new(
            DbConnection::init_test()
                .await
                .expect("Failed to create test database"),
        );
        let (queue, _receiver) = NotificationQueue::new();
        (
            ArchiveService::new(db.clone()),
            MemberService::new(db.clone(), queue),
            db,
        )
    }

    async fn register(members: &MemberService, name: &str, initial_payment: f64) -> Member {
        members
            .create_member(CreateMemberCommand {
                name: name.to_string(),
                phone: None,
                email: None,
                member_number: None,
                registration_fee: 500.0,
                package_fee: Some(1500.0),
                discount: 0.0,
                initial_payment,
                payment_method: Some("cash".to_string()),
                subscription_start: None,
                subscription_end: None,
                plan_type: None,
            })
            .await
            .unwrap()
            .member
    }

    #[tokio::test]
    async fn test_delete_archives_and_removes_member() {
        let (archive, members, db) = setup_test().await;
        let member = register(&members, "To Delete", 800.0).await;

        let snapshot = archive
            .delete_member(&member.id, "admin", Some("left town".to_string()))
            .await
            .unwrap();

        assert_eq!(snapshot.member_id, member.id);
        assert_eq!(snapshot.member.paid_amount, 800.0);
        assert_eq!(snapshot.deleted_by, "admin");

        // The member and its receipts are gone
        assert!(matches!(
            members.get_member(&member.id).await.unwrap_err(),
            LedgerError::NotFound { .. }
        ));
        let receipts = ReceiptRepository::new((*db).clone())
            .list_member_receipts(&member.id)
            .await
            .unwrap();
        assert!(receipts.is_empty());
    }

    #[tokio::test]
    async fn test_delete_missing_member_is_not_found() {
        let (archive, _, _) = setup_test().await;
        assert!(matches!(
            archive
                .delete_member("member::missing", "admin", None)
                .await
                .unwrap_err(),
            LedgerError::NotFound { .. }
        ));
    }

    #[tokio::test]
    async fn test_restore_round_trip() {
        let (archive, members, _) = setup_test().await;
        let member = register(&members, "Boomerang", 1200.0).await;

        let snapshot = archive.delete_member(&member.id, "admin", None).await.unwrap();
        let restored = archive.restore_deleted_member(&snapshot.id).await.unwrap();

        assert_eq!(restored.id, member.id);
        assert_eq!(restored.member_number, member.member_number);
        assert_eq!(restored.status, shared::MemberStatus::Active);
        // Totals are the snapshotted figures; the receipts did not come back
        assert_eq!(restored.paid_amount, 1200.0);

        let reloaded = members.get_member(&member.id).await.unwrap();
        assert_eq!(reloaded.name, "Boomerang");

        // Snapshot was consumed
        assert!(matches!(
            archive.get_snapshot(&snapshot.id).await.unwrap_err(),
            LedgerError::NotFound { .. }
        ));
    }

    #[tokio::test]
    async fn test_restore_conflicts_with_reused_number() {
        let (archive, members, _) = setup_test().await;
        let member = register(&members, "Original", 0.0).await;

        let snapshot = archive.delete_member(&member.id, "admin", None).await.unwrap();

        // The number gets handed out again before the restore
        members
            .update_member(
                &register(&members, "Squatter", 0.0).await.id,
                crate::domain::commands::members::UpdateMemberCommand {
                    member_number: Some(member.member_number.clone()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert!(matches!(
            archive.restore_deleted_member(&snapshot.id).await.unwrap_err(),
            LedgerError::Conflict(_)
        ));
        // Snapshot survives a failed restore
        assert!(archive.get_snapshot(&snapshot.id).await.is_ok());
    }

    #[tokio::test]
    async fn test_permanent_delete_consumes_snapshot() {
        let (archive, members, _) = setup_test().await;
        let member = register(&members, "Gone For Good", 0.0).await;

        let snapshot = archive.delete_member(&member.id, "admin", None).await.unwrap();
        archive.permanently_delete_member(&snapshot.id).await.unwrap();

        assert!(matches!(
            archive.restore_deleted_member(&snapshot.id).await.unwrap_err(),
            LedgerError::NotFound { .. }
        ));
        assert!(archive.list_snapshots().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_list_snapshots_most_recent_first() {
        let (archive, members, _) = setup_test().await;

        let first = register(&members, "First Out", 0.0).await;
        let second = register(&members, "Second Out", 0.0).await;

        let s1 = archive.delete_member(&first.id, "admin", None).await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        let s2 = archive.delete_member(&second.id, "admin", None).await.unwrap();

        let snapshots = archive.list_snapshots().await.unwrap();
        assert_eq!(snapshots.len(), 2);
        assert_eq!(snapshots[0].id, s2.id);
        assert_eq!(snapshots[1].id, s1.id);
    }
}
