//! Background sweep loop. Runs a subscription sweep once at startup and
//! then every 24 hours, pushing reminder jobs onto the notification queue
//! for members the sweep moved into expiring_soon or expired.

use log::{error, info};
use std::time::Duration;
use tokio::task::JoinHandle;

use crate::domain::notifications::{NotificationJob, NotificationQueue};
use crate::domain::subscription_service::SubscriptionService;
use shared::SubscriptionStatus;

const SWEEP_INTERVAL: Duration = Duration::from_secs(24 * 60 * 60);

/// One sweep iteration: classify everyone, then fan out reminders for the
/// members whose status actually changed.
pub async fn run_sweep_once(service: &SubscriptionService, notifications: &NotificationQueue) {
    match service.sweep_all().await {
        Ok(outcome) => {
            for (member_id, status) in outcome.transitioned {
                if matches!(
                    status,
                    SubscriptionStatus::ExpiringSoon | SubscriptionStatus::Expired
                ) {
                    notifications.enqueue(NotificationJob::SubscriptionReminder {
                        member_id,
                        status,
                    });
                }
            }
        }
        Err(e) => {
            // A failed sweep is retried on the next tick; nothing to unwind
            error!("Subscription sweep failed: {}", e);
        }
    }
}

/// Spawn the daily sweep loop
pub fn spawn_sweep_loop(
    service: SubscriptionService,
    notifications: NotificationQueue,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(SWEEP_INTERVAL);
        info!("Subscription sweep scheduler started (every 24h)");
        loop {
            ticker.tick().await;
            run_sweep_once(&service, &notifications).await;
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::connection::DbConnection;
    use crate::storage::repositories::member_repository::MemberRepository;
    use chrono::{Duration as ChronoDuration, Local};
    use shared::{Member, MemberStatus};
    use std::sync::Arc;

    fn member_ending(id: &str, end_offset_days: i64) -> Member {
        let end = Local::now().date_naive() + ChronoDuration::days(end_offset_days);
        Member {
            id: id.to_string(),
            member_number: id.replace("member::", ""),
            name: "Test Member".to_string(),
            phone: None,
            email: None,
            registration_fee: 0.0,
            package_fee: None,
            membership_fees: None,
            discount: 0.0,
            paid_amount: 0.0,
            subscription_start: None,
            subscription_end: Some(end.format("%Y-%m-%d").to_string()),
            plan_type: None,
            subscription_status: None,
            status: MemberStatus::Active,
            created_at: "2025-01-01T00:00:00Z".to_string(),
            updated_at: "2025-01-01T00:00:00Z".to_string(),
        }
    }

    #[tokio::test]
    async fn test_sweep_enqueues_reminders_for_lapsing_members_only() {
        let db = Arc::new(DbConnection::init_test().await.unwrap());
        let members = MemberRepository::new((*db).clone());

        members.store_member(&member_ending("member::late", -10)).await.unwrap();
        members.store_member(&member_ending("member::soon", 3)).await.unwrap();
        members.store_member(&member_ending("member::fine", 90)).await.unwrap();

        let service = SubscriptionService::new(db);
        let (queue, mut receiver) = NotificationQueue::new();

        run_sweep_once(&service, &queue).await;

        let mut reminded = Vec::new();
        while let Ok(job) = receiver.try_recv() {
            match job {
                NotificationJob::SubscriptionReminder { member_id, .. } => {
                    reminded.push(member_id)
                }
                other => panic!("unexpected job: {:?}", other),
            }
        }
        reminded.sort();
        assert_eq!(reminded, vec!["member::late", "member::soon"]);
    }
}
