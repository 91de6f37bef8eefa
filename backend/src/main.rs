use std::net::SocketAddr;

use gym_backend::domain::{notifications, scheduler};
use gym_backend::{create_router, initialize_backend};
use tracing::{info, Level};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_max_level(Level::INFO)
        .init();

    let (app_state, notification_receiver) = initialize_backend().await?;

    // Background work: notification drain and the daily subscription sweep
    notifications::spawn_drain(notification_receiver);
    scheduler::spawn_sweep_loop(
        app_state.subscription_service.clone(),
        app_state.notifications.clone(),
    );

    let app = create_router(app_state);

    let addr = SocketAddr::from(([127, 0, 0, 1], 3000));
    info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
