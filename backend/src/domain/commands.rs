//! Domain-level command and result types
//! These structs are used by services inside the domain layer and are **not**
//! exposed over the public API. The REST layer maps the public DTOs defined
//! in the `shared` crate to these internal types.

pub mod members {
    use shared::{Member, PlanType, Receipt};

    /// Input for registering a member. Partial registrations are allowed:
    /// fee and subscription fields may arrive later through an update.
    #[derive(Debug, Clone)]
    pub struct CreateMemberCommand {
        pub name: String,
        pub phone: Option<String>,
        pub email: Option<String>,
        /// Explicit member number; allocated when None
        pub member_number: Option<String>,
        pub registration_fee: f64,
        pub package_fee: Option<f64>,
        pub discount: f64,
        /// Payment received at registration; non-zero creates the initial receipt
        pub initial_payment: f64,
        pub payment_method: Option<String>,
        pub subscription_start: Option<String>,
        pub subscription_end: Option<String>,
        pub plan_type: Option<PlanType>,
    }

    /// Input for editing a member profile; None fields are left unchanged.
    /// An empty contact string clears that field.
    #[derive(Debug, Clone, Default)]
    pub struct UpdateMemberCommand {
        pub name: Option<String>,
        pub phone: Option<String>,
        pub email: Option<String>,
        pub member_number: Option<String>,
        pub registration_fee: Option<f64>,
        pub package_fee: Option<f64>,
        pub discount: Option<f64>,
        /// Direct edit of the cached paid figure
        pub paid_amount: Option<f64>,
        pub subscription_start: Option<String>,
        pub subscription_end: Option<String>,
        pub plan_type: Option<PlanType>,
        pub status: Option<shared::MemberStatus>,
    }

    #[derive(Debug, Clone)]
    pub struct PayDueCommand {
        pub amount: f64,
        pub payment_method: String,
        pub actor: String,
    }

    /// Result of registering a member
    #[derive(Debug, Clone)]
    pub struct CreateMemberResult {
        pub member: Member,
        pub initial_receipt: Option<Receipt>,
        pub success_message: String,
    }

    /// Result of clearing (part of) a member's outstanding due
    #[derive(Debug, Clone)]
    pub struct PayDueResult {
        pub member: Member,
        pub receipt: Receipt,
        pub confirmation_message: String,
    }

    /// Result of querying a member's outstanding due
    #[derive(Debug, Clone)]
    pub struct DueAmountResult {
        pub due_amount: f64,
        pub unpaid_invoices: Vec<Receipt>,
    }
}

pub mod receipts {
    use shared::{Receipt, ReceiptCategory};

    /// Input for creating a ledger receipt
    #[derive(Debug, Clone)]
    pub struct CreateReceiptCommand {
        pub member_id: Option<String>,
        pub payer_name: String,
        pub amount: f64,
        pub amount_paid: f64,
        /// Computed from amount and amount_paid when None
        pub due_amount: Option<f64>,
        pub payment_method: String,
        pub description: Option<String>,
        pub receipt_category: Option<ReceiptCategory>,
        pub is_initial: bool,
    }

    /// Input for mutating an existing receipt; None fields are left unchanged
    #[derive(Debug, Clone, Default)]
    pub struct UpdateReceiptCommand {
        pub amount: Option<f64>,
        pub amount_paid: Option<f64>,
        pub due_amount: Option<f64>,
        pub payment_method: Option<String>,
        pub description: Option<String>,
    }

    /// Outcome of a receipt creation. A duplicate initial receipt is a
    /// successful no-op so retried registration flows stay idempotent.
    #[derive(Debug, Clone)]
    pub enum CreateReceiptOutcome {
        Created(Receipt),
        DuplicateSuppressed(Receipt),
    }

    impl CreateReceiptOutcome {
        pub fn receipt(&self) -> &Receipt {
            match self {
                CreateReceiptOutcome::Created(r) => r,
                CreateReceiptOutcome::DuplicateSuppressed(r) => r,
            }
        }

        pub fn into_receipt(self) -> Receipt {
            match self {
                CreateReceiptOutcome::Created(r) => r,
                CreateReceiptOutcome::DuplicateSuppressed(r) => r,
            }
        }

        pub fn was_suppressed(&self) -> bool {
            matches!(self, CreateReceiptOutcome::DuplicateSuppressed(_))
        }
    }
}

pub mod subscription {
    use shared::SubscriptionStatus;

    /// Result of a batch subscription sweep
    #[derive(Debug, Clone, Default)]
    pub struct SweepOutcome {
        /// Members transitioned into each state by this sweep
        pub expired: usize,
        pub expiring_soon: usize,
        pub active: usize,
        /// The members whose status actually changed, for the notification
        /// boundary
        pub transitioned: Vec<(String, SubscriptionStatus)>,
    }

    impl SweepOutcome {
        pub fn total_transitioned(&self) -> usize {
            self.transitioned.len()
        }
    }
}
