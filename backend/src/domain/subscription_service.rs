//! Subscription status machine. Status is a pure function of the stored end
//! date and the current date with a fixed 7-day look-ahead; operators never
//! set it directly.

use chrono::{Duration, Local, NaiveDate};
use log::{info, warn};
use std::sync::Arc;

use crate::domain::commands::subscription::SweepOutcome;
use crate::domain::errors::{LedgerError, LedgerResult};
use crate::storage::connection::DbConnection;
use crate::storage::repositories::member_repository::MemberRepository;
use shared::SubscriptionStatus;

/// Days before the end date at which a subscription counts as expiring soon
pub const LOOK_AHEAD_DAYS: i64 = 7;

/// Classify a subscription end date against `today`
pub fn status_for(end_date: NaiveDate, today: NaiveDate) -> SubscriptionStatus {
    if end_date < today {
        SubscriptionStatus::Expired
    } else if end_date <= today + Duration::days(LOOK_AHEAD_DAYS) {
        SubscriptionStatus::ExpiringSoon
    } else {
        SubscriptionStatus::Active
    }
}

fn parse_end_date(raw: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d").ok()
}

#[derive(Clone)]
pub struct SubscriptionService {
    member_repository: MemberRepository,
}

impl SubscriptionService {
    pub fn new(db: Arc<DbConnection>) -> Self {
        Self {
            member_repository: MemberRepository::new((*db).clone()),
        }
    }

    /// Recompute and persist one member's status; invoked after any
    /// subscription-date edit. Returns the computed status, or None when the
    /// member has no end date to classify.
    pub async fn update_member_subscription_status(
        &self,
        member_id: &str,
    ) -> LedgerResult<Option<SubscriptionStatus>> {
        let member = self
            .member_repository
            .get_member(member_id)
            .await?
            .ok_or_else(|| LedgerError::not_found("member", member_id))?;

        let Some(raw) = member.subscription_end.as_deref() else {
            return Ok(None);
        };
        let Some(end_date) = parse_end_date(raw) else {
            warn!("Member {} has unparseable end date {:?}", member_id, raw);
            return Ok(None);
        };

        let status = status_for(end_date, Local::now().date_naive());
        self.member_repository
            .update_subscription_status_guarded(member_id, status)
            .await?;

        Ok(Some(status))
    }

    /// Batch sweep over all members with an end date. Idempotent: the guarded
    /// update writes nothing when the stored status already matches, so a
    /// second immediate sweep reports zero transitions.
    pub async fn sweep_all(&self) -> LedgerResult<SweepOutcome> {
        self.sweep_all_at(Local::now().date_naive()).await
    }

    /// Sweep against an explicit "today", used by the tests to pin dates
    pub async fn sweep_all_at(&self, today: NaiveDate) -> LedgerResult<SweepOutcome> {
        let members = self.member_repository.list_members_with_end_date().await?;
        let mut outcome = SweepOutcome::default();

        for member in members {
            let Some(end_date) = member.subscription_end.as_deref().and_then(parse_end_date)
            else {
                warn!(
                    "Skipping member {}: unparseable end date {:?}",
                    member.id, member.subscription_end
                );
                continue;
            };

            let status = status_for(end_date, today);
            let changed = self
                .member_repository
                .update_subscription_status_guarded(&member.id, status)
                .await?;

            if changed {
                match status {
                    SubscriptionStatus::Expired => outcome.expired += 1,
                    SubscriptionStatus::ExpiringSoon => outcome.expiring_soon += 1,
                    SubscriptionStatus::Active => outcome.active += 1,
                }
                outcome.transitioned.push((member.id, status));
            }
        }

        info!(
            "Subscription sweep: {} transitioned ({} expired, {} expiring soon, {} active)",
            outcome.total_transitioned(),
            outcome.expired,
            outcome.expiring_soon,
            outcome.active
        );

        Ok(outcome)
    }
}
