//! Fee structure resolver: pure derivations of what a member owes from its
//! stored fee fields. The paid figure always comes from the reconciler, never
//! from the member's cached `paid_amount` (the cache can lag the ledger).

use shared::Member;

/// Effective package fee, falling back to the legacy `membership_fees` field
pub fn package_fee(member: &Member) -> f64 {
    member
        .package_fee
        .or(member.membership_fees)
        .unwrap_or(0.0)
}

/// Total billable amount: registration fee + package fee - discount,
/// clamped at zero
pub fn total_billable(member: &Member) -> f64 {
    (member.registration_fee + package_fee(member) - member.discount).max(0.0)
}

/// Outstanding due given a ledger-derived paid figure, clamped at zero
pub fn due_amount(member: &Member, actual_paid: f64) -> f64 {
    (total_billable(member) - actual_paid).max(0.0)
}

/// Per-receipt due: max(0, amount - amount_paid)
pub fn receipt_due(amount: f64, amount_paid: f64) -> f64 {
    (amount - amount_paid).max(0.0)
}
