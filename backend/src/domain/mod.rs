//! Domain layer: the billing and subscription business logic.
//!
//! Services here own all writes. The REST layer maps public DTOs to the
//! command types in [`commands`] and calls into these services; repositories
//! under `storage` stay free of business rules.

pub mod archive_service;
pub mod commands;
pub mod errors;
pub mod fees;
pub mod identity_service;
pub mod member_service;
pub mod notifications;
pub mod receipt_service;
pub mod reconciliation_service;
pub mod scheduler;
pub mod subscription_service;

pub use archive_service::ArchiveService;
pub use errors::{LedgerError, LedgerResult};
pub use identity_service::IdentityService;
pub use member_service::MemberService;
pub use notifications::{NotificationJob, NotificationQueue};
pub use receipt_service::ReceiptService;
pub use reconciliation_service::ReconciliationService;
pub use subscription_service::SubscriptionService;
