//! Gym billing ledger backend: member billing, the receipt ledger with its
//! reconciler, the subscription status machine, and the deletion archive,
//! exposed over a small REST API.

pub mod domain;
pub mod io;
pub mod storage;

use axum::{
    http::{HeaderValue, Method},
    routing::{delete, get, post, put},
    Router,
};
use anyhow::Result;
use log::info;
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedReceiver;
use tower_http::cors::{Any, CorsLayer};

use crate::domain::{
    ArchiveService, MemberService, NotificationJob, NotificationQueue, ReceiptService,
    ReconciliationService, SubscriptionService,
};
use crate::storage::connection::DbConnection;

/// Main application state that holds all services
#[derive(Clone)]
pub struct AppState {
    pub member_service: MemberService,
    pub receipt_service: ReceiptService,
    pub reconciliation_service: ReconciliationService,
    pub subscription_service: SubscriptionService,
    pub archive_service: ArchiveService,
    pub notifications: NotificationQueue,
}

impl AppState {
    fn build(db: Arc<DbConnection>, notifications: NotificationQueue) -> Self {
        Self {
            member_service: MemberService::new(db.clone(), notifications.clone()),
            receipt_service: ReceiptService::new(db.clone()),
            reconciliation_service: ReconciliationService::new(db.clone()),
            subscription_service: SubscriptionService::new(db.clone()),
            archive_service: ArchiveService::new(db),
            notifications,
        }
    }
}

/// Initialize the backend with all required services. The returned receiver
/// feeds the notification drain task.
pub async fn initialize_backend() -> Result<(AppState, UnboundedReceiver<NotificationJob>)> {
    info!("Setting up database");
    let db = Arc::new(DbConnection::init().await?);

    info!("Setting up domain model");
    let (notifications, receiver) = NotificationQueue::new();
    let app_state = AppState::build(db, notifications);

    Ok((app_state, receiver))
}

/// Create the Axum router with all routes configured
pub fn create_router(app_state: AppState) -> Router {
    // CORS setup to allow a local frontend to make requests
    let cors = CorsLayer::new()
        .allow_origin("http://localhost:8080".parse::<HeaderValue>().expect("static origin"))
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers(Any);

    let api_routes = Router::new()
        .route(
            "/members",
            get(io::rest::member_apis::list_members).post(io::rest::member_apis::create_member),
        )
        .route("/members/restore", post(io::rest::archive_apis::restore_member))
        .route(
            "/members/:id",
            get(io::rest::member_apis::get_member)
                .put(io::rest::member_apis::update_member)
                .delete(io::rest::archive_apis::delete_member),
        )
        .route("/members/:id/due", get(io::rest::member_apis::get_due_amount))
        .route("/members/:id/pay-due", post(io::rest::member_apis::pay_due))
        .route("/receipts", post(io::rest::receipt_apis::create_receipt))
        .route(
            "/receipts/:id",
            put(io::rest::receipt_apis::update_receipt)
                .delete(io::rest::receipt_apis::delete_receipt),
        )
        .route(
            "/receipts/:id/history",
            get(io::rest::receipt_apis::get_receipt_history),
        )
        .route(
            "/receipts/:id/versions",
            post(io::rest::receipt_apis::create_receipt_version),
        )
        .route(
            "/subscriptions/sweep",
            post(io::rest::subscription_apis::sweep_subscriptions),
        )
        .route("/archive", get(io::rest::archive_apis::list_snapshots))
        .route("/archive/:id", delete(io::rest::archive_apis::permanently_delete));

    Router::new()
        .nest("/api", api_routes)
        .layer(cors)
        .with_state(app_state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    async fn test_router() -> Router {
        let db = Arc::new(
            DbConnection::init_test()
                .await
                .expect("Failed to create test database"),
        );
        let (notifications, _receiver) = NotificationQueue::new();
        create_router(AppState::build(db, notifications))
    }

    #[tokio::test]
    async fn test_list_members_route() {
        let app = test_router().await;

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/members")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_unknown_member_is_404() {
        let app = test_router().await;

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/members/member::missing")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_create_member_route() {
        let app = test_router().await;

        let body = serde_json::json!({
            "name": "Route Test",
            "registration_fee": 500.0,
            "package_fee": 1500.0,
            "paid_amount": 1000.0,
            "payment_method": "cash"
        });
        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/members")
                    .header("content-type", "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::CREATED);
    }
}
