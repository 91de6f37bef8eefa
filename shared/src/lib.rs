use serde::{Deserialize, Serialize};
use std::fmt;

/// Member ID in format: "member::<uuid>"
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Member {
    pub id: String,
    /// Human-facing member number (unique, numeric string for system-allocated numbers)
    pub member_number: String,
    pub name: String,
    pub phone: Option<String>,
    pub email: Option<String>,
    /// One-time registration fee
    pub registration_fee: f64,
    /// Fee of the currently selected package
    pub package_fee: Option<f64>,
    /// Legacy alias for package fee; consulted only when `package_fee` is unset
    pub membership_fees: Option<f64>,
    pub discount: f64,
    /// Ledger-derived cache: sum of `amount_paid` over current member-category
    /// receipts. Written only by the reconciler.
    pub paid_amount: f64,
    /// Subscription start date (YYYY-MM-DD)
    pub subscription_start: Option<String>,
    /// Subscription end date (YYYY-MM-DD)
    pub subscription_end: Option<String>,
    pub plan_type: Option<PlanType>,
    /// Derived from the subscription end date; never set by operators directly
    pub subscription_status: Option<SubscriptionStatus>,
    /// Operator-controlled account status, independent of subscription_status
    pub status: MemberStatus,
    pub created_at: String,
    pub updated_at: String,
}

impl Member {
    /// Generate a unique member ID
    pub fn generate_id(uuid: &str) -> String {
        format!("member::{}", uuid)
    }
}

/// Operator-controlled account status
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemberStatus {
    Active,
    Inactive,
    Frozen,
}

impl MemberStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MemberStatus::Active => "active",
            MemberStatus::Inactive => "inactive",
            MemberStatus::Frozen => "frozen",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "active" => Some(MemberStatus::Active),
            "inactive" => Some(MemberStatus::Inactive),
            "frozen" => Some(MemberStatus::Frozen),
            _ => None,
        }
    }
}

/// Subscription plan duration
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanType {
    Monthly,
    Quarterly,
    HalfYearly,
    Yearly,
}

impl PlanType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlanType::Monthly => "monthly",
            PlanType::Quarterly => "quarterly",
            PlanType::HalfYearly => "half_yearly",
            PlanType::Yearly => "yearly",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "monthly" => Some(PlanType::Monthly),
            "quarterly" => Some(PlanType::Quarterly),
            "half_yearly" => Some(PlanType::HalfYearly),
            "yearly" => Some(PlanType::Yearly),
            _ => None,
        }
    }
}

/// Subscription status derived from the end date with a 7-day look-ahead
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    Active,
    ExpiringSoon,
    Expired,
}

impl SubscriptionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubscriptionStatus::Active => "active",
            SubscriptionStatus::ExpiringSoon => "expiring_soon",
            SubscriptionStatus::Expired => "expired",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "active" => Some(SubscriptionStatus::Active),
            "expiring_soon" => Some(SubscriptionStatus::ExpiringSoon),
            "expired" => Some(SubscriptionStatus::Expired),
            _ => None,
        }
    }
}

impl fmt::Display for SubscriptionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Discriminates member receipts from staff/administrative receipts.
/// Reconciliation only considers member receipts (a missing category is
/// treated as member for legacy rows).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReceiptCategory {
    Member,
    Staff,
}

impl ReceiptCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReceiptCategory::Member => "member",
            ReceiptCategory::Staff => "staff",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "member" => Some(ReceiptCategory::Member),
            "staff" => Some(ReceiptCategory::Staff),
            _ => None,
        }
    }
}

/// Receipt ID in format: "receipt::<uuid>"
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Receipt {
    pub id: String,
    /// Globally unique, allocated once, never reused
    pub receipt_number: String,
    /// Owning member; None for standalone non-member receipts
    pub member_id: Option<String>,
    pub payer_name: String,
    /// Total amount the receipt represents
    pub amount: f64,
    /// Amount actually received
    pub amount_paid: f64,
    /// Outstanding remainder: max(0, amount - amount_paid)
    pub due_amount: f64,
    pub payment_method: String,
    pub description: Option<String>,
    pub receipt_category: Option<ReceiptCategory>,
    /// Set on the receipt generated automatically at registration
    pub is_initial: bool,
    /// Root receipt of this version chain; None for unversioned receipts
    pub original_receipt_id: Option<String>,
    pub version_number: i64,
    pub is_current_version: bool,
    pub superseded_at: Option<String>,
    pub created_at: String,
}

impl Receipt {
    pub fn generate_id(uuid: &str) -> String {
        format!("receipt::{}", uuid)
    }

    /// True when this receipt participates in member reconciliation
    pub fn counts_toward_member(&self) -> bool {
        matches!(self.receipt_category, None | Some(ReceiptCategory::Member))
    }
}

/// Immutable copy of a member row taken at deletion time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeletedMemberSnapshot {
    pub id: String,
    pub member_id: String,
    pub member_number: String,
    /// Full member row as it existed at deletion time
    pub member: Member,
    pub deleted_by: String,
    pub delete_reason: Option<String>,
    pub deleted_at: String,
}

impl DeletedMemberSnapshot {
    pub fn generate_id(uuid: &str) -> String {
        format!("snapshot::{}", uuid)
    }
}

// ---------------------------------------------------------------------------
// Request / response DTOs
// ---------------------------------------------------------------------------

/// Envelope returned by every command endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn err(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message.into()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateMemberRequest {
    pub name: String,
    pub phone: Option<String>,
    pub email: Option<String>,
    /// Explicit member number; allocated automatically when absent
    pub member_number: Option<String>,
    pub registration_fee: Option<f64>,
    pub package_fee: Option<f64>,
    pub discount: Option<f64>,
    /// Payment received at registration; a non-zero value creates the
    /// initial receipt
    pub paid_amount: Option<f64>,
    pub payment_method: Option<String>,
    pub subscription_start: Option<String>,
    pub subscription_end: Option<String>,
    pub plan_type: Option<PlanType>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UpdateMemberRequest {
    pub name: Option<String>,
    /// Omitted fields are left unchanged; send an empty string to clear a
    /// contact field
    pub phone: Option<String>,
    pub email: Option<String>,
    pub member_number: Option<String>,
    pub registration_fee: Option<f64>,
    pub package_fee: Option<f64>,
    pub discount: Option<f64>,
    /// Direct edit of the cached paid figure; routed through the ledger's
    /// payment-update collapse
    pub paid_amount: Option<f64>,
    pub subscription_start: Option<String>,
    pub subscription_end: Option<String>,
    pub plan_type: Option<PlanType>,
    pub status: Option<MemberStatus>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemberResponse {
    pub member: Member,
    pub success_message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemberListResponse {
    pub members: Vec<Member>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeleteMemberRequest {
    pub actor: String,
    pub reason: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RestoreMemberRequest {
    pub snapshot_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RestoreMemberResponse {
    pub member_id: String,
    pub success_message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotListResponse {
    pub snapshots: Vec<DeletedMemberSnapshot>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateReceiptRequest {
    pub member_id: Option<String>,
    pub payer_name: String,
    pub amount: f64,
    pub amount_paid: f64,
    /// Computed as max(0, amount - amount_paid) when absent
    pub due_amount: Option<f64>,
    pub payment_method: String,
    pub description: Option<String>,
    pub receipt_category: Option<ReceiptCategory>,
    /// Marks this as the registration receipt; duplicates are suppressed
    pub is_initial: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UpdateReceiptRequest {
    pub amount: Option<f64>,
    pub amount_paid: Option<f64>,
    pub due_amount: Option<f64>,
    pub payment_method: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReceiptResponse {
    pub receipt: Receipt,
    pub success_message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReceiptHistoryResponse {
    pub receipts: Vec<Receipt>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PayDueRequest {
    pub amount: f64,
    pub payment_method: String,
    pub actor: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PayDueResponse {
    pub member: Member,
    pub receipt: Receipt,
    pub confirmation_message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DueAmountResponse {
    pub due_amount: f64,
    /// Current receipts with an outstanding balance
    pub unpaid_invoices: Vec<Receipt>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SweepResponse {
    /// Members transitioned into each state by this sweep
    pub expired: usize,
    pub expiring_soon: usize,
    pub active: usize,
}
