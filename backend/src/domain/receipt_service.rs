//! Payment ledger: creation, correction, versioning and deletion of receipt
//! rows. Every mutation that touches a member's receipts reconciles that
//! member's cached totals inside the same transaction, so the ledger-sum
//! invariant holds at every commit point.

use anyhow::Result;
use chrono::Utc;
use log::info;
use std::sync::Arc;
use uuid::Uuid;

use crate::domain::commands::receipts::{
    CreateReceiptCommand, CreateReceiptOutcome, UpdateReceiptCommand,
};
use crate::domain::errors::{LedgerError, LedgerResult};
use crate::domain::fees;
use crate::domain::identity_service::IdentityService;
use crate::storage::connection::DbConnection;
use crate::storage::repositories::member_repository::MemberRepository;
use crate::storage::repositories::receipt_repository::ReceiptRepository;
use shared::{Receipt, ReceiptCategory};

/// Service owning all writes to the receipt ledger
#[derive(Clone)]
pub struct ReceiptService {
    db: Arc<DbConnection>,
    receipt_repository: ReceiptRepository,
    member_repository: MemberRepository,
    identity_service: IdentityService,
}

fn is_initial_unique_violation(err: &anyhow::Error) -> bool {
    matches!(
        err.downcast_ref::<sqlx::Error>(),
        Some(sqlx::Error::Database(db))
            if db.message().contains("UNIQUE constraint failed: receipts.member_id")
    )
}

impl ReceiptService {
    pub fn new(db: Arc<DbConnection>) -> Self {
        Self {
            receipt_repository: ReceiptRepository::new((*db).clone()),
            member_repository: MemberRepository::new((*db).clone()),
            identity_service: IdentityService::new(db.clone()),
            db,
        }
    }

    /// Create a receipt and reconcile its member. A duplicate initial receipt
    /// for the same (member, category) is suppressed by the storage-level
    /// uniqueness constraint and returned as a successful no-op, so retried
    /// registration flows are idempotent.
    pub async fn create_receipt(
        &self,
        command: CreateReceiptCommand,
    ) -> LedgerResult<CreateReceiptOutcome> {
        self.validate_create(&command)?;

        if let Some(member_id) = command.member_id.as_deref() {
            if self.member_repository.get_member(member_id).await?.is_none() {
                return Err(LedgerError::not_found("member", member_id));
            }
        }

        let receipt_number = self.identity_service.allocate_receipt_number().await?;
        let due_amount = command
            .due_amount
            .unwrap_or_else(|| fees::receipt_due(command.amount, command.amount_paid));

        // An unset category means member. Initial receipts store it
        // explicitly: the uniqueness constraint compares category values,
        // and NULLs never compare equal to each other.
        let receipt_category = if command.is_initial {
            Some(command.receipt_category.unwrap_or(ReceiptCategory::Member))
        } else {
            command.receipt_category
        };

        let receipt = Receipt {
            id: Receipt::generate_id(&Uuid::new_v4().to_string()),
            receipt_number,
            member_id: command.member_id.clone(),
            payer_name: command.payer_name.trim().to_string(),
            amount: command.amount,
            amount_paid: command.amount_paid,
            due_amount,
            payment_method: command.payment_method.clone(),
            description: command.description.clone(),
            receipt_category,
            is_initial: command.is_initial,
            original_receipt_id: None,
            version_number: 1,
            is_current_version: true,
            superseded_at: None,
            created_at: Utc::now().to_rfc3339(),
        };

        match self.insert_reconciled(&receipt).await {
            Ok(()) => {
                info!(
                    "Created receipt {} ({}) for {:?}",
                    receipt.receipt_number, receipt.id, receipt.member_id
                );
                Ok(CreateReceiptOutcome::Created(receipt))
            }
            Err(e) if command.is_initial && is_initial_unique_violation(&e) => {
                // The charge already exists; hand back the persisted receipt
                let member_id = command.member_id.as_deref().unwrap_or_default();
                let existing = self
                    .receipt_repository
                    .get_initial_receipt(member_id, receipt_category)
                    .await?
                    .ok_or_else(|| LedgerError::not_found("receipt", member_id))?;
                info!(
                    "Duplicate initial receipt suppressed for member {}",
                    member_id
                );
                Ok(CreateReceiptOutcome::DuplicateSuppressed(existing))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Mutate amount/paid/due/method/description of an existing receipt and
    /// reconcile its member
    pub async fn update_receipt(
        &self,
        receipt_id: &str,
        command: UpdateReceiptCommand,
    ) -> LedgerResult<Receipt> {
        let mut receipt = self
            .receipt_repository
            .get_receipt(receipt_id)
            .await?
            .ok_or_else(|| LedgerError::not_found("receipt", receipt_id))?;

        if let Some(amount) = command.amount {
            receipt.amount = amount;
        }
        if let Some(amount_paid) = command.amount_paid {
            receipt.amount_paid = amount_paid;
        }
        receipt.due_amount = command
            .due_amount
            .unwrap_or_else(|| fees::receipt_due(receipt.amount, receipt.amount_paid));
        if let Some(method) = command.payment_method {
            receipt.payment_method = method;
        }
        if let Some(description) = command.description {
            receipt.description = Some(description);
        }

        if receipt.amount < 0.0 || receipt.amount_paid < 0.0 || receipt.due_amount < 0.0 {
            return Err(LedgerError::validation(
                "Receipt amounts cannot be negative",
            ));
        }

        let mut tx = self.db.pool().begin().await.map_err(anyhow::Error::from)?;
        ReceiptRepository::update_receipt_tx(&mut tx, &receipt).await?;
        if let Some(member_id) = receipt.member_id.as_deref() {
            MemberRepository::sync_paid_amount_tx(&mut tx, member_id).await?;
        }
        tx.commit().await.map_err(anyhow::Error::from)?;

        info!("Updated receipt {}", receipt_id);
        Ok(receipt)
    }

    /// Remove a receipt and shrink its member's cached totals accordingly
    pub async fn delete_receipt(&self, receipt_id: &str) -> LedgerResult<()> {
        let receipt = self
            .receipt_repository
            .get_receipt(receipt_id)
            .await?
            .ok_or_else(|| LedgerError::not_found("receipt", receipt_id))?;

        let mut tx = self.db.pool().begin().await.map_err(anyhow::Error::from)?;
        ReceiptRepository::delete_receipt_tx(&mut tx, receipt_id).await?;
        if let Some(member_id) = receipt.member_id.as_deref() {
            MemberRepository::sync_paid_amount_tx(&mut tx, member_id).await?;
        }
        tx.commit().await.map_err(anyhow::Error::from)?;

        info!("Deleted receipt {}", receipt_id);
        Ok(())
    }

    /// Replace a receipt with a corrected version without destroying history.
    /// The current version is flagged superseded and a new row with an
    /// incremented version number becomes current; the historical
    /// `amount_paid` is never rewritten.
    pub async fn create_receipt_version(
        &self,
        receipt_id: &str,
        command: UpdateReceiptCommand,
    ) -> LedgerResult<Receipt> {
        let original = self
            .receipt_repository
            .get_receipt(receipt_id)
            .await?
            .ok_or_else(|| LedgerError::not_found("receipt", receipt_id))?;

        let root_id = original
            .original_receipt_id
            .clone()
            .unwrap_or_else(|| original.id.clone());

        let versions = self.receipt_repository.list_receipt_versions(&root_id).await?;
        let current = versions
            .iter()
            .filter(|r| r.is_current_version)
            .max_by_key(|r| r.version_number)
            .cloned()
            .ok_or_else(|| LedgerError::not_found("receipt", &*root_id))?;

        let amount = command.amount.unwrap_or(current.amount);
        let amount_paid = command.amount_paid.unwrap_or(current.amount_paid);
        let due_amount = command
            .due_amount
            .unwrap_or_else(|| fees::receipt_due(amount, amount_paid));
        if amount < 0.0 || amount_paid < 0.0 || due_amount < 0.0 {
            return Err(LedgerError::validation(
                "Receipt amounts cannot be negative",
            ));
        }

        let replacement = Receipt {
            id: Receipt::generate_id(&Uuid::new_v4().to_string()),
            receipt_number: self.identity_service.allocate_receipt_number().await?,
            member_id: current.member_id.clone(),
            payer_name: current.payer_name.clone(),
            amount,
            amount_paid,
            due_amount,
            payment_method: command
                .payment_method
                .unwrap_or_else(|| current.payment_method.clone()),
            description: command.description.or_else(|| current.description.clone()),
            receipt_category: current.receipt_category,
            is_initial: false,
            original_receipt_id: Some(root_id),
            version_number: current.version_number + 1,
            is_current_version: true,
            superseded_at: None,
            created_at: Utc::now().to_rfc3339(),
        };

        let mut tx = self.db.pool().begin().await.map_err(anyhow::Error::from)?;
        ReceiptRepository::mark_superseded_tx(&mut tx, &current.id, &Utc::now().to_rfc3339())
            .await?;
        ReceiptRepository::insert_receipt_tx(&mut tx, &replacement).await?;
        if let Some(member_id) = replacement.member_id.as_deref() {
            MemberRepository::sync_paid_amount_tx(&mut tx, member_id).await?;
        }
        tx.commit().await.map_err(anyhow::Error::from)?;

        info!(
            "Receipt {} superseded by version {} ({})",
            current.id, replacement.version_number, replacement.id
        );
        Ok(replacement)
    }

    /// Flag a receipt as no longer current without creating a replacement
    pub async fn mark_receipt_superseded(&self, receipt_id: &str) -> LedgerResult<Receipt> {
        let receipt = self
            .receipt_repository
            .get_receipt(receipt_id)
            .await?
            .ok_or_else(|| LedgerError::not_found("receipt", receipt_id))?;

        let mut tx = self.db.pool().begin().await.map_err(anyhow::Error::from)?;
        ReceiptRepository::mark_superseded_tx(&mut tx, receipt_id, &Utc::now().to_rfc3339())
            .await?;
        if let Some(member_id) = receipt.member_id.as_deref() {
            MemberRepository::sync_paid_amount_tx(&mut tx, member_id).await?;
        }
        tx.commit().await.map_err(anyhow::Error::from)?;

        self.receipt_repository
            .get_receipt(receipt_id)
            .await?
            .ok_or_else(|| LedgerError::not_found("receipt", receipt_id))
    }

    /// All versions of a receipt chain ordered by version number
    pub async fn get_receipt_history(&self, root_id: &str) -> LedgerResult<Vec<Receipt>> {
        let versions = self.receipt_repository.list_receipt_versions(root_id).await?;
        if versions.is_empty() {
            return Err(LedgerError::not_found("receipt", root_id));
        }
        Ok(versions)
    }

    /// Absorb a direct edit of a member's cached paid figure into the ledger.
    ///
    /// Policy (sum-preserving, history-lossy): with no receipts, synthesize
    /// one reflecting the new totals; otherwise collapse the adjustment onto
    /// the most recent receipt and zero the earlier receipts' paid/due
    /// fields, preserving receipt count for audit while keeping the ledger
    /// sum equal to the edited figure.
    pub async fn handle_member_payment_update(
        &self,
        member_id: &str,
        old_paid: f64,
        new_paid: f64,
    ) -> LedgerResult<()> {
        if new_paid < 0.0 {
            return Err(LedgerError::validation("Paid amount cannot be negative"));
        }

        let member = self
            .member_repository
            .get_member(member_id)
            .await?
            .ok_or_else(|| LedgerError::not_found("member", member_id))?;

        let total_billable = fees::total_billable(&member);
        let new_due = (total_billable - new_paid).max(0.0);

        let ledger: Vec<Receipt> = self
            .receipt_repository
            .list_member_receipts(member_id)
            .await?
            .into_iter()
            .filter(|r| r.counts_toward_member())
            .collect();

        if ledger.is_empty() {
            let receipt = Receipt {
                id: Receipt::generate_id(&Uuid::new_v4().to_string()),
                receipt_number: self.identity_service.allocate_receipt_number().await?,
                member_id: Some(member_id.to_string()),
                payer_name: member.name.clone(),
                amount: total_billable,
                amount_paid: new_paid,
                due_amount: new_due,
                payment_method: "adjustment".to_string(),
                description: Some("Paid amount adjusted on member profile".to_string()),
                receipt_category: Some(ReceiptCategory::Member),
                is_initial: false,
                original_receipt_id: None,
                version_number: 1,
                is_current_version: true,
                superseded_at: None,
                created_at: Utc::now().to_rfc3339(),
            };
            self.insert_reconciled(&receipt).await?;
        } else if let Some((latest, earlier)) = ledger.split_last() {
            let mut tx = self.db.pool().begin().await.map_err(anyhow::Error::from)?;
            for receipt in earlier {
                let mut zeroed = receipt.clone();
                zeroed.amount_paid = 0.0;
                zeroed.due_amount = 0.0;
                ReceiptRepository::update_receipt_tx(&mut tx, &zeroed).await?;
            }
            let mut collapsed = latest.clone();
            collapsed.amount = total_billable;
            collapsed.amount_paid = new_paid;
            collapsed.due_amount = new_due;
            ReceiptRepository::update_receipt_tx(&mut tx, &collapsed).await?;
            MemberRepository::sync_paid_amount_tx(&mut tx, member_id).await?;
            tx.commit().await.map_err(anyhow::Error::from)?;
        }

        info!(
            "Collapsed payment update for member {}: {:.2} -> {:.2}",
            member_id, old_paid, new_paid
        );
        Ok(())
    }

    /// Current receipts with an outstanding balance for a member
    pub async fn list_unpaid_receipts(&self, member_id: &str) -> LedgerResult<Vec<Receipt>> {
        let receipts = self
            .receipt_repository
            .list_member_receipts(member_id)
            .await?
            .into_iter()
            .filter(|r| r.counts_toward_member() && r.due_amount > 0.0)
            .collect();
        Ok(receipts)
    }

    pub async fn get_receipt(&self, receipt_id: &str) -> LedgerResult<Receipt> {
        self.receipt_repository
            .get_receipt(receipt_id)
            .await?
            .ok_or_else(|| LedgerError::not_found("receipt", receipt_id))
    }

    fn validate_create(&self, command: &CreateReceiptCommand) -> LedgerResult<()> {
        if command.payer_name.trim().is_empty() {
            return Err(LedgerError::validation("Receipt requires a payer name"));
        }
        if command.payment_method.trim().is_empty() {
            return Err(LedgerError::validation("Receipt requires a payment method"));
        }
        if command.amount < 0.0 || command.amount_paid < 0.0 {
            return Err(LedgerError::validation(
                "Receipt amounts cannot be negative",
            ));
        }
        if let Some(due) = command.due_amount {
            if due < 0.0 {
                return Err(LedgerError::validation("Due amount cannot be negative"));
            }
        }

        let member_required =
            command.receipt_category == Some(ReceiptCategory::Member) || command.is_initial;
        if member_required && command.member_id.is_none() {
            return Err(LedgerError::validation(
                "Member-category receipts require a member reference",
            ));
        }

        Ok(())
    }

    /// Insert a receipt and reconcile its member in one transaction
    async fn insert_reconciled(&self, receipt: &Receipt) -> Result<()> {
        let mut tx = self.db.pool().begin().await?;
        ReceiptRepository::insert_receipt_tx(&mut tx, receipt).await?;
        if let Some(member_id) = receipt.member_id.as_deref() {
            MemberRepository::sync_paid_amount_tx(&mut tx, member_id).await?;
        }
        tx.commit().await?;
        Ok(())
    }
}
