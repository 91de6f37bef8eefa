//! Boundary to the (external) notification subsystem. The ledger only needs
//! to enqueue jobs; composition and delivery happen elsewhere. Jobs are
//! enqueued after the originating transaction commits, never inside it.

use log::{info, warn};
use shared::SubscriptionStatus;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

#[derive(Debug, Clone)]
pub enum NotificationJob {
    /// A payment was recorded or a due changed
    PaymentNotice { member_id: String, message: String },
    /// A sweep moved a member into expiring_soon or expired
    SubscriptionReminder {
        member_id: String,
        status: SubscriptionStatus,
    },
}

/// Cheap handle for enqueuing notification jobs
#[derive(Clone)]
pub struct NotificationQueue {
    sender: mpsc::UnboundedSender<NotificationJob>,
}

impl NotificationQueue {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<NotificationJob>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }

    /// Enqueue a job; a closed queue is logged, never surfaced to the caller
    pub fn enqueue(&self, job: NotificationJob) {
        if self.sender.send(job).is_err() {
            warn!("Notification queue is closed; dropping job");
        }
    }
}

/// Drain the queue on a background task. This stands in for the messaging
/// subsystem's intake; here each job is only logged.
pub fn spawn_drain(mut receiver: mpsc::UnboundedReceiver<NotificationJob>) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(job) = receiver.recv().await {
            match job {
                NotificationJob::PaymentNotice { member_id, message } => {
                    info!("Payment notice queued for {}: {}", member_id, message);
                }
                NotificationJob::SubscriptionReminder { member_id, status } => {
                    info!(
                        "Subscription reminder queued for {} (now {})",
                        member_id, status
                    );
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_enqueue_and_receive() {
        let (queue, mut receiver) = NotificationQueue::new();

        queue.enqueue(NotificationJob::PaymentNotice {
            member_id: "member::a".to_string(),
            message: "paid".to_string(),
        });

        match receiver.recv().await {
            Some(NotificationJob::PaymentNotice { member_id, .. }) => {
                assert_eq!(member_id, "member::a");
            }
            other => panic!("unexpected job: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_enqueue_after_close_does_not_panic() {
        let (queue, receiver) = NotificationQueue::new();
        drop(receiver);

        queue.enqueue(NotificationJob::SubscriptionReminder {
            member_id: "member::b".to_string(),
            status: SubscriptionStatus::Expired,
        });
    }
}
