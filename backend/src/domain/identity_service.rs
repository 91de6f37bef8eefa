//! Identity allocator: human-facing member numbers and the monotonic
//! receipt/invoice/enquiry sequences, all backed by persisted counters.

use anyhow::Result;
use chrono::Utc;
use log::warn;
use std::sync::Arc;

use crate::storage::connection::DbConnection;
use crate::storage::repositories::counter_repository::{
    CounterRepository, ENQUIRY_COUNTER, INVOICE_COUNTER, MEMBER_COUNTER, RECEIPT_COUNTER,
};
use crate::storage::repositories::member_repository::MemberRepository;

// Seed values used when a counter row does not exist yet
const RECEIPT_COUNTER_BASE: i64 = 1000;
const INVOICE_COUNTER_BASE: i64 = 1000;
const ENQUIRY_COUNTER_BASE: i64 = 0;
const MEMBER_NUMBER_BASE: i64 = 1000;

/// Service issuing unique identifiers from persisted counters
#[derive(Clone)]
pub struct IdentityService {
    counter_repository: CounterRepository,
    member_repository: MemberRepository,
}

impl IdentityService {
    pub fn new(db: Arc<DbConnection>) -> Self {
        Self {
            counter_repository: CounterRepository::new((*db).clone()),
            member_repository: MemberRepository::new((*db).clone()),
        }
    }

    /// Next receipt number, zero-padded. Never reused, even for deleted
    /// receipts.
    pub async fn allocate_receipt_number(&self) -> Result<String> {
        let value = self
            .counter_repository
            .allocate(RECEIPT_COUNTER, RECEIPT_COUNTER_BASE)
            .await?;
        Ok(format!("{:06}", value))
    }

    pub async fn allocate_invoice_number(&self) -> Result<String> {
        let value = self
            .counter_repository
            .allocate(INVOICE_COUNTER, INVOICE_COUNTER_BASE)
            .await?;
        Ok(format!("INV{:06}", value))
    }

    pub async fn allocate_enquiry_number(&self) -> Result<String> {
        let value = self
            .counter_repository
            .allocate(ENQUIRY_COUNTER, ENQUIRY_COUNTER_BASE)
            .await?;
        Ok(format!("ENQ{:03}", value))
    }

    /// Propose the next member number. Scans existing numbers rather than
    /// trusting the counter alone, so manual edits cannot cause a collision;
    /// probes upward past taken candidates and persists the new high-water
    /// mark for future fast allocation. Falls back to a timestamp-derived
    /// number on storage failure: registration is never failed for the sake
    /// of a pretty number.
    pub async fn allocate_member_number(&self) -> String {
        match self.try_allocate_member_number().await {
            Ok(number) => number,
            Err(e) => {
                warn!(
                    "Member number allocation failed ({}); falling back to timestamp-derived number",
                    e
                );
                format!("M{}", Utc::now().timestamp_millis())
            }
        }
    }

    async fn try_allocate_member_number(&self) -> Result<String> {
        let numbers = self.member_repository.list_member_numbers().await?;
        let highest_numeric = numbers
            .iter()
            .filter_map(|n| n.parse::<i64>().ok())
            .max()
            .unwrap_or(MEMBER_NUMBER_BASE);

        let stored = self
            .counter_repository
            .get(MEMBER_COUNTER)
            .await?
            .unwrap_or(0);

        let mut candidate = highest_numeric.max(stored) + 1;
        while self.is_member_number_taken(&candidate.to_string()).await? {
            candidate += 1;
        }

        self.counter_repository
            .raise_to(MEMBER_COUNTER, candidate)
            .await?;

        Ok(candidate.to_string())
    }

    /// Existence check shared by the allocator and manual admin renames
    pub async fn is_member_number_taken(&self, candidate: &str) -> Result<bool> {
        self.member_repository.member_number_exists(candidate).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::{Member, MemberStatus};

    async fn setup_test() -> (IdentityService, MemberRepository) {
        let db = Arc::new(
            DbConnection::init_test()
                .await
                .expect("Failed to create test database"),
        );
        (
            IdentityService::new(db.clone()),
            MemberRepository::new((*db).clone()),
        )
    }

    fn member_with_number(number: &str) -> Member {
        Member {
            id: Member::generate_id(&uuid::Uuid::new_v4().to_string()),
            member_number: number.to_string(),
            name: "Test Member".to_string(),
            phone: None,
            email: None,
            registration_fee: 0.0,
            package_fee: None,
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

    #[tokio::test]
    async fn test_receipt_numbers_monotonic_and_distinct() {
        let (service, _) = setup_test().await;

        let mut numbers = Vec::new();
        for _ in 0..10 {
            numbers.push(service.allocate_receipt_number().await.unwrap());
        }

        let mut sorted = numbers.clone();
        sorted.sort();
        sorted.dedup();
        assert_eq!(sorted.len(), numbers.len(), "numbers must be distinct");
        assert_eq!(numbers[0], "001001");
        assert_eq!(numbers[9], "001010");
    }

    #[tokio::test]
    async fn test_number_formats() {
        let (service, _) = setup_test().await;

        assert_eq!(service.allocate_invoice_number().await.unwrap(), "INV001001");
        assert_eq!(service.allocate_enquiry_number().await.unwrap(), "ENQ001");
    }

    #[tokio::test]
    async fn test_member_number_starts_from_base() {
        let (service, _) = setup_test().await;

        assert_eq!(service.allocate_member_number().await, "1001");
    }

    #[tokio::test]
    async fn test_member_number_follows_highest_existing() {
        let (service, members) = setup_test().await;

        members
            .store_member(&member_with_number("1500"))
            .await
            .unwrap();
        // Non-numeric numbers are ignored by the scan
        members
            .store_member(&member_with_number("LEGACY-7"))
            .await
            .unwrap();

        assert_eq!(service.allocate_member_number().await, "1501");
    }

    #[tokio::test]
    async fn test_member_number_probes_past_taken_candidates() {
        let (service, members) = setup_test().await;

        members
            .store_member(&member_with_number("1001"))
            .await
            .unwrap();
        members
            .store_member(&member_with_number("1002"))
            .await
            .unwrap();

        // Counter drift: pretend the counter still says 1000
        assert_eq!(service.allocate_member_number().await, "1003");
    }

    #[tokio::test]
    async fn test_is_member_number_taken() {
        let (service, members) = setup_test().await;

        members
            .store_member(&member_with_number("1234"))
            .await
            .unwrap();

        assert!(service.is_member_number_taken("1234").await.unwrap());
        assert!(!service.is_member_number_taken("9999").await.unwrap());
    }
}
