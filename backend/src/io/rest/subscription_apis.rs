//! # REST API for Subscriptions
//!
//! Manual trigger for the subscription status sweep (the scheduler runs the
//! same sweep daily).

use axum::{
    extract::State,
    response::{IntoResponse, Json},
};
use log::{error, info};

use crate::io::rest::error_response;
use crate::AppState;
use shared::{ApiResponse, SweepResponse};

pub async fn sweep_subscriptions(State(state): State<AppState>) -> impl IntoResponse {
    info!("POST /api/subscriptions/sweep");

    match state.subscription_service.sweep_all().await {
        Ok(outcome) => {
            // Fan out reminders exactly as the scheduled sweep would
            for (member_id, status) in &outcome.transitioned {
                if matches!(
                    status,
                    shared::SubscriptionStatus::ExpiringSoon | shared::SubscriptionStatus::Expired
                ) {
                    state.notifications.enqueue(
                        crate::domain::NotificationJob::SubscriptionReminder {
                            member_id: member_id.clone(),
                            status: *status,
                        },
                    );
                }
            }
            Json(ApiResponse::ok(SweepResponse {
                expired: outcome.expired,
                expiring_soon: outcome.expiring_soon,
                active: outcome.active,
            }))
            .into_response()
        }
        Err(e) => {
            error!("Subscription sweep failed: {}", e);
            error_response(e)
        }
    }
}
