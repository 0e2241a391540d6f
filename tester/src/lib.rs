//! In-memory stand-in for the emergency alert backend.
//!
//! Serves the same JSON endpoints the client polls, with just enough behavior to drive
//! it end to end: the `sessionid` cookie value is the username, POSTs must echo the
//! configured CSRF token, alerts are listed newest first and capped at 50.
//!
//! # Setup
//!
//! ```sh
//! RUST_LOG=info RUST_PORT=8000 MOCK_CSRF_TOKEN=dev-token cargo run -p tester
//! ```
use std::{net::SocketAddr, sync::Arc, time::Duration};

use axum::{
    Router,
    http::{HeaderName, Method, header::CONTENT_TYPE},
    routing::{get, post},
};
use signal::ctrl_c;
#[cfg(unix)]
use signal::unix::{SignalKind, signal};
use tokio::{net::TcpListener, signal};
use tower_http::cors::CorsLayer;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, fmt};

pub mod config;
pub mod error;
pub mod routes;
pub mod state;

use config::Config;
use error::AppError;
use routes::{
    CSRF_HEADER, alerts_handler, clear_notifications_handler, live_locations_handler,
    nearby_services_handler, notification_count_handler, reverse_geocode_handler,
    send_alert_handler, update_location_handler,
};
use state::AppState;

pub fn router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE, HeaderName::from_static(CSRF_HEADER)])
        .max_age(Duration::from_secs(60 * 60));

    Router::new()
        .route("/live-locations/", get(live_locations_handler))
        .route("/alerts/", get(alerts_handler))
        .route("/nearby-services/", get(nearby_services_handler))
        .route("/reverse-geocode/", get(reverse_geocode_handler))
        .route("/send-alert/", post(send_alert_handler))
        .route("/update-location/", post(update_location_handler))
        .route("/notifications/count/", get(notification_count_handler))
        .route("/notifications/clear/", post(clear_notifications_handler))
        .layer(cors)
        .with_state(state)
}

pub async fn start_server() -> Result<(), AppError> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();

    info!("Initializing state...");
    let state = AppState::seeded(Config::load()?);

    let address = format!("0.0.0.0:{}", state.config.port);
    info!("Binding to {address}");

    let listener = TcpListener::bind(&address).await?;
    info!("Server running on {address}");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shutting down...");
    Ok(())
}

/// Serves `state` on an ephemeral localhost port in the background.
pub async fn spawn_local(state: Arc<AppState>) -> std::io::Result<SocketAddr> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let address = listener.local_addr()?;

    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, router(state)).await {
            error!("Mock backend stopped: {e}");
        }
    });

    Ok(address)
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {e}");
            std::future::pending::<()>().await;
        }

        info!("Received Ctrl+C, shutting down");
    };

    #[cfg(unix)]
    let terminate = async {
        match signal(SignalKind::terminate()) {
            Ok(mut terminate) => {
                terminate.recv().await;
                info!("Received terminate signal, shutting down");
            }
            Err(e) => {
                error!("Failed to install signal handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
