//! Repository layer: one repository per table family, raw SQL inside,
//! domain types out.

pub mod archive_repository;
pub mod counter_repository;
pub mod member_repository;
pub mod receipt_repository;

pub use archive_repository::ArchiveRepository;
pub use counter_repository::CounterRepository;
pub use member_repository::MemberRepository;
pub use receipt_repository::ReceiptRepository;
