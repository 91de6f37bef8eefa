//! Member lifecycle: registration, profile edits, due collection and
//! lookups. Every payment-bearing flow routes through the receipt ledger
//! and the reconciler so the cached totals never drift.

use chrono::Utc;
use log::info;
use std::sync::Arc;
use uuid::Uuid;

use crate::domain::commands::members::{
    CreateMemberCommand, CreateMemberResult, DueAmountResult, PayDueCommand, PayDueResult,
    UpdateMemberCommand,
};
use crate::domain::commands::receipts::CreateReceiptCommand;
use crate::domain::errors::{LedgerError, LedgerResult};
use crate::domain::fees;
use crate::domain::identity_service::IdentityService;
use crate::domain::notifications::{NotificationJob, NotificationQueue};
use crate::domain::receipt_service::ReceiptService;
use crate::domain::reconciliation_service::ReconciliationService;
use crate::domain::subscription_service::SubscriptionService;
use crate::storage::connection::DbConnection;
use crate::storage::repositories::member_repository::MemberRepository;
use shared::{Member, MemberStatus, Receipt};

#[derive(Clone)]
pub struct MemberService {
    member_repository: MemberRepository,
    receipt_service: ReceiptService,
    reconciliation_service: ReconciliationService,
    subscription_service: SubscriptionService,
    identity_service: IdentityService,
    notifications: NotificationQueue,
}

impl MemberService {
    pub fn new(db: Arc<DbConnection>, notifications: NotificationQueue) -> Self {
        Self {
            member_repository: MemberRepository::new((*db).clone()),
            receipt_service: ReceiptService::new(db.clone()),
            reconciliation_service: ReconciliationService::new(db.clone()),
            subscription_service: SubscriptionService::new(db.clone()),
            identity_service: IdentityService::new(db),
            notifications,
        }
    }

    /// Register a member. Partial registrations are fine: fees and
    /// subscription dates may arrive later through an update. A non-zero
    /// registration payment produces the initial ledger receipt.
    pub async fn create_member(
        &self,
        command: CreateMemberCommand,
    ) -> LedgerResult<CreateMemberResult> {
        self.validate_create(&command)?;

        let member_number = match command.member_number {
            Some(ref requested) => {
                if self.identity_service.is_member_number_taken(requested).await? {
                    return Err(LedgerError::conflict(format!(
                        "Member number {} is already in use",
                        requested
                    )));
                }
                requested.clone()
            }
            None => self.identity_service.allocate_member_number().await,
        };

        let now = Utc::now().to_rfc3339();
        let member = Member {
            id: Member::generate_id(&Uuid::new_v4().to_string()),
            member_number: member_number.clone(),
            name: command.name.trim().to_string(),
            phone: command.phone.clone(),
            email: command.email.clone(),
            registration_fee: command.registration_fee,
            package_fee: command.package_fee,
            membership_fees: None,
            discount: command.discount,
            paid_amount: 0.0,
            subscription_start: command.subscription_start.clone(),
            subscription_end: command.subscription_end.clone(),
            plan_type: command.plan_type,
            subscription_status: None,
            status: MemberStatus::Active,
            created_at: now.clone(),
            updated_at: now,
        };
        self.member_repository.store_member(&member).await?;

        // The initial receipt represents the full registration charge, with
        // the cash received against it; its due is the open remainder.
        let initial_receipt = if command.initial_payment > 0.0 {
            let total_billable = fees::total_billable(&member);
            let outcome = self
                .receipt_service
                .create_receipt(CreateReceiptCommand {
                    member_id: Some(member.id.clone()),
                    payer_name: member.name.clone(),
                    amount: total_billable,
                    amount_paid: command.initial_payment,
                    due_amount: Some(fees::receipt_due(total_billable, command.initial_payment)),
                    payment_method: command
                        .payment_method
                        .clone()
                        .unwrap_or_else(|| "cash".to_string()),
                    description: Some("Registration payment".to_string()),
                    receipt_category: Some(shared::ReceiptCategory::Member),
                    is_initial: true,
                })
                .await?;
            Some(outcome.into_receipt())
        } else {
            None
        };

        if member.subscription_end.is_some() {
            self.subscription_service
                .update_member_subscription_status(&member.id)
                .await?;
        }

        let member = self.get_member(&member.id).await?;
        let success_message = format!(
            "Member {} registered with number {}",
            member.name, member.member_number
        );
        info!("{}", success_message);

        if let Some(receipt) = &initial_receipt {
            self.notifications.enqueue(NotificationJob::PaymentNotice {
                member_id: member.id.clone(),
                message: format!(
                    "Registration payment of {:.2} received (receipt {})",
                    receipt.amount_paid, receipt.receipt_number
                ),
            });
        }

        Ok(CreateMemberResult {
            member,
            initial_receipt,
            success_message,
        })
    }

    /// Edit a member profile. Profile fields are written first; a direct
    /// `paid_amount` edit is then absorbed into the ledger, and a changed
    /// end date triggers a status recompute. The ordering matters: the
    /// ledger collapse reads the already-updated fee fields.
    pub async fn update_member(
        &self,
        member_id: &str,
        command: UpdateMemberCommand,
    ) -> LedgerResult<Member> {
        let existing = self.get_member(member_id).await?;

        if let Some(ref requested) = command.member_number {
            if *requested != existing.member_number
                && self.identity_service.is_member_number_taken(requested).await?
            {
                return Err(LedgerError::conflict(format!(
                    "Member number {} is already in use",
                    requested
                )));
            }
        }

        let mut updated = existing.clone();
        if let Some(name) = command.name {
            if name.trim().is_empty() {
                return Err(LedgerError::validation("Member name cannot be empty"));
            }
            updated.name = name.trim().to_string();
        }
        // Contact fields: an empty string clears the field back to NULL
        if let Some(phone) = command.phone {
            updated.phone = (!phone.trim().is_empty()).then_some(phone);
        }
        if let Some(email) = command.email {
            updated.email = (!email.trim().is_empty()).then_some(email);
        }
        if let Some(number) = command.member_number {
            updated.member_number = number;
        }
        if let Some(fee) = command.registration_fee {
            if fee < 0.0 {
                return Err(LedgerError::validation("Fees cannot be negative"));
            }
            updated.registration_fee = fee;
        }
        if let Some(fee) = command.package_fee {
            if fee < 0.0 {
                return Err(LedgerError::validation("Fees cannot be negative"));
            }
            updated.package_fee = Some(fee);
        }
        if let Some(discount) = command.discount {
            if discount < 0.0 {
                return Err(LedgerError::validation("Discount cannot be negative"));
            }
            updated.discount = discount;
        }
        if let Some(start) = command.subscription_start {
            updated.subscription_start = Some(start);
        }
        if let Some(end) = command.subscription_end.clone() {
            updated.subscription_end = Some(end);
        }
        if let Some(plan) = command.plan_type {
            updated.plan_type = Some(plan);
        }
        if let Some(status) = command.status {
            updated.status = status;
        }
        updated.updated_at = Utc::now().to_rfc3339();

        self.member_repository.update_member(&updated).await?;

        // A direct edit of the cached figure is ledger business, never a
        // plain column write
        if let Some(new_paid) = command.paid_amount {
            if (new_paid - existing.paid_amount).abs() > f64::EPSILON {
                self.receipt_service
                    .handle_member_payment_update(member_id, existing.paid_amount, new_paid)
                    .await?;
            }
        }

        if command.subscription_end.is_some() {
            self.subscription_service
                .update_member_subscription_status(member_id)
                .await?;
        }

        self.get_member(member_id).await
    }

    /// Record a payment against a member's outstanding due. The receipt
    /// captures the due before payment and this payment alone; the cached
    /// totals come back from the reconciler.
    pub async fn pay_due(
        &self,
        member_id: &str,
        command: PayDueCommand,
    ) -> LedgerResult<PayDueResult> {
        if command.amount <= 0.0 {
            return Err(LedgerError::validation("Payment amount must be positive"));
        }

        let summary = self
            .reconciliation_service
            .recalculate_member_totals(member_id)
            .await?;
        if summary.calculated_due <= 0.0 {
            return Err(LedgerError::validation(
                "Member has no outstanding due to pay",
            ));
        }

        let member = self.get_member(member_id).await?;
        let due_before = summary.calculated_due;
        let receipt = self
            .receipt_service
            .create_receipt(CreateReceiptCommand {
                member_id: Some(member_id.to_string()),
                payer_name: member.name.clone(),
                amount: due_before,
                amount_paid: command.amount,
                due_amount: Some((due_before - command.amount).max(0.0)),
                payment_method: command.payment_method.clone(),
                description: Some(format!("Due payment recorded by {}", command.actor)),
                receipt_category: Some(shared::ReceiptCategory::Member),
                is_initial: false,
            })
            .await?
            .into_receipt();

        let member = self.get_member(member_id).await?;
        let confirmation_message = format!(
            "Received {:.2} from {} (receipt {}); outstanding due is now {:.2}",
            command.amount, member.name, receipt.receipt_number, receipt.due_amount
        );
        info!("{}", confirmation_message);

        self.notifications.enqueue(NotificationJob::PaymentNotice {
            member_id: member_id.to_string(),
            message: confirmation_message.clone(),
        });

        Ok(PayDueResult {
            member,
            receipt,
            confirmation_message,
        })
    }

    /// Outstanding due plus the open receipts behind it
    pub async fn get_due_amount(&self, member_id: &str) -> LedgerResult<DueAmountResult> {
        let summary = self
            .reconciliation_service
            .recalculate_member_totals(member_id)
            .await?;
        let unpaid_invoices: Vec<Receipt> =
            self.receipt_service.list_unpaid_receipts(member_id).await?;

        Ok(DueAmountResult {
            due_amount: summary.calculated_due,
            unpaid_invoices,
        })
    }

    pub async fn get_member(&self, member_id: &str) -> LedgerResult<Member> {
        self.member_repository
            .get_member(member_id)
            .await?
            .ok_or_else(|| LedgerError::not_found("member", member_id))
    }

    pub async fn get_member_by_number(&self, member_number: &str) -> LedgerResult<Member> {
        self.member_repository
            .get_member_by_number(member_number)
            .await?
            .ok_or_else(|| LedgerError::not_found("member", member_number))
    }

    pub async fn list_members(&self) -> LedgerResult<Vec<Member>> {
        Ok(self.member_repository.list_members().await?)
    }

    fn validate_create(&self, command: &CreateMemberCommand) -> LedgerResult<()> {
        if command.name.trim().is_empty() {
            return Err(LedgerError::validation("Member name cannot be empty"));
        }
        if command.registration_fee < 0.0
            || command.package_fee.is_some_and(|f| f < 0.0)
            || command.discount < 0.0
            || command.initial_payment < 0.0
        {
            return Err(LedgerError::validation(
                "Fees and payments cannot be negative",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn setup_test() -> MemberService {
        let db = Arc::new(
            DbConnection::init_test()
                .await
                .expect("Failed to create test database"),
        );
        let (queue, _receiver) = NotificationQueue::new();
        MemberService::new(db, queue)
    }

    fn registration(name: &str, initial_payment: f64) -> CreateMemberCommand {
        CreateMemberCommand {
            name: name.to_string(),
            phone: Some("555-0100".to_string()),
            email: None,
            member_number: None,
            registration_fee: 500.0,
            package_fee: Some(1500.0),
            discount: 0.0,
            initial_payment,
            payment_method: Some("cash".to_string()),
            subscription_start: Some("2025-06-01".to_string()),
            subscription_end: Some("2026-06-01".to_string()),
            plan_type: Some(shared::PlanType::Yearly),
        }
    }

    #[tokio::test]
    async fn test_registration_with_initial_payment() {
        let service = setup_test().await;

        let result = service
            .create_member(registration("Asha Pillai", 1000.0))
            .await
            .unwrap();

        assert_eq!(result.member.member_number, "1001");
        assert_eq!(result.member.paid_amount, 1000.0);

        // The receipt carries the full charge and the outstanding remainder
        let receipt = result.initial_receipt.as_ref().expect("initial receipt");
        assert!(receipt.is_initial);
        assert_eq!(receipt.amount, 2000.0);
        assert_eq!(receipt.amount_paid, 1000.0);
        assert_eq!(receipt.due_amount, 1000.0);

        // Outstanding due is billable minus ledger sum, and the open charge
        // is visible at the receipt level too
        let due = service.get_due_amount(&result.member.id).await.unwrap();
        assert_eq!(due.due_amount, 1000.0);
        assert_eq!(due.unpaid_invoices.len(), 1);
        assert_eq!(due.unpaid_invoices[0].id, receipt.id);
    }

    #[tokio::test]
    async fn test_registration_without_payment_has_no_receipt() {
        let service = setup_test().await;

        let result = service
            .create_member(registration("No Payment", 0.0))
            .await
            .unwrap();

        assert!(result.initial_receipt.is_none());
        assert_eq!(result.member.paid_amount, 0.0);
    }

    #[tokio::test]
    async fn test_registration_sets_subscription_status() {
        let service = setup_test().await;

        let mut command = registration("Long Runner", 0.0);
        command.subscription_end = Some("2099-01-01".to_string());
        let result = service.create_member(command).await.unwrap();

        assert_eq!(
            result.member.subscription_status,
            Some(shared::SubscriptionStatus::Active)
        );
    }

    #[tokio::test]
    async fn test_explicit_member_number_conflict() {
        let service = setup_test().await;

        let mut first = registration("First", 0.0);
        first.member_number = Some("2000".to_string());
        service.create_member(first).await.unwrap();

        let mut second = registration("Second", 0.0);
        second.member_number = Some("2000".to_string());
        assert!(matches!(
            service.create_member(second).await.unwrap_err(),
            LedgerError::Conflict(_)
        ));
    }

    #[tokio::test]
    async fn test_blank_name_rejected() {
        let service = setup_test().await;

        let mut command = registration("  ", 0.0);
        command.name = "  ".to_string();
        assert!(matches!(
            service.create_member(command).await.unwrap_err(),
            LedgerError::Validation(_)
        ));
    }

    #[tokio::test]
    async fn test_pay_due_full_settlement() {
        let service = setup_test().await;

        let created = service
            .create_member(registration("Asha Pillai", 1000.0))
            .await
            .unwrap();

        let result = service
            .pay_due(
                &created.member.id,
                PayDueCommand {
                    amount: 1000.0,
                    payment_method: "card".to_string(),
                    actor: "front-desk".to_string(),
                },
            )
            .await
            .unwrap();

        // Receipt records the due before payment and this payment alone
        assert_eq!(result.receipt.amount, 1000.0);
        assert_eq!(result.receipt.amount_paid, 1000.0);
        assert_eq!(result.receipt.due_amount, 0.0);
        assert_eq!(result.member.paid_amount, 2000.0);

        let due = service.get_due_amount(&created.member.id).await.unwrap();
        assert_eq!(due.due_amount, 0.0);
    }

    #[tokio::test]
    async fn test_pay_due_partial_payment() {
        let service = setup_test().await;

        let created = service
            .create_member(registration("Partial Payer", 500.0))
            .await
            .unwrap();

        let result = service
            .pay_due(
                &created.member.id,
                PayDueCommand {
                    amount: 600.0,
                    payment_method: "cash".to_string(),
                    actor: "front-desk".to_string(),
                },
            )
            .await
            .unwrap();

        assert_eq!(result.receipt.amount, 1500.0);
        assert_eq!(result.receipt.amount_paid, 600.0);
        assert_eq!(result.receipt.due_amount, 900.0);
        assert_eq!(result.member.paid_amount, 1100.0);
    }

    #[tokio::test]
    async fn test_pay_due_with_nothing_owed_is_rejected() {
        let service = setup_test().await;

        let created = service
            .create_member(registration("Fully Paid", 2000.0))
            .await
            .unwrap();

        assert!(matches!(
            service
                .pay_due(
                    &created.member.id,
                    PayDueCommand {
                        amount: 100.0,
                        payment_method: "cash".to_string(),
                        actor: "front-desk".to_string(),
                    },
                )
                .await
                .unwrap_err(),
            LedgerError::Validation(_)
        ));
    }

    #[tokio::test]
    async fn test_update_profile_fields() {
        let service = setup_test().await;

        let created = service
            .create_member(registration("Old Name", 0.0))
            .await
            .unwrap();

        let updated = service
            .update_member(
                &created.member.id,
                UpdateMemberCommand {
                    name: Some("New Name".to_string()),
                    phone: Some("555-0199".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(updated.name, "New Name");
        assert_eq!(updated.phone.as_deref(), Some("555-0199"));
        // Payment state untouched
        assert_eq!(updated.paid_amount, 0.0);
    }

    #[tokio::test]
    async fn test_update_clears_contact_fields_with_empty_string() {
        let service = setup_test().await;

        let created = service
            .create_member(registration("Reachable", 0.0))
            .await
            .unwrap();
        assert!(created.member.phone.is_some());

        let updated = service
            .update_member(
                &created.member.id,
                UpdateMemberCommand {
                    phone: Some("".to_string()),
                    email: Some("gym@example.com".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(updated.phone, None);
        assert_eq!(updated.email.as_deref(), Some("gym@example.com"));
    }

    #[tokio::test]
    async fn test_update_paid_amount_routes_through_ledger() {
        let service = setup_test().await;

        let created = service
            .create_member(registration("Ledger Edit", 400.0))
            .await
            .unwrap();

        let updated = service
            .update_member(
                &created.member.id,
                UpdateMemberCommand {
                    paid_amount: Some(1500.0),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(updated.paid_amount, 1500.0);

        // The ledger sum backs the figure; due follows
        let due = service.get_due_amount(&created.member.id).await.unwrap();
        assert_eq!(due.due_amount, 500.0);
    }

    #[tokio::test]
    async fn test_update_end_date_recomputes_status() {
        let service = setup_test().await;

        let created = service
            .create_member(registration("Lapsing", 0.0))
            .await
            .unwrap();

        let updated = service
            .update_member(
                &created.member.id,
                UpdateMemberCommand {
                    subscription_end: Some("2020-01-01".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(
            updated.subscription_status,
            Some(shared::SubscriptionStatus::Expired)
        );
    }

    #[tokio::test]
    async fn test_lookup_by_number() {
        let service = setup_test().await;

        let created = service
            .create_member(registration("Findable", 0.0))
            .await
            .unwrap();

        let found = service
            .get_member_by_number(&created.member.member_number)
            .await
            .unwrap();
        assert_eq!(found.id, created.member.id);

        assert!(matches!(
            service.get_member_by_number("9999").await.unwrap_err(),
            LedgerError::NotFound { .. }
        ));
    }
}
