//! # Emergency Alert Client
//!
//! Client side of the emergency alert platform: a live map of users, alerts and nearby
//! police/hospitals, emergency reports, and local notifications for new alerts.
//!
//!
//!
//! # Overall Payloads
//!
//! Requests/responses between the client and the backend. All JSON.
//!
//! ## Verification
//! Cookies
//! - sessionid: backend session, presence means the user is logged in
//! - csrftoken: echoed back on every POST
//!
//! Headers
//! - X-CSRFToken: value of the csrftoken cookie, empty if the cookie is missing
//!
//! ## Live Map
//! - `GET /live-locations/`: every user's last reported position, keyed by username
//! - `GET /alerts/`: newest 50 alerts, newest first
//! - `GET /nearby-services/?lat&lon`: police and hospitals around a point
//!
//! ## Reporting
//! - `GET /reverse-geocode/?lat&lon`: address for the current position
//! - `POST /send-alert/`: multipart latitude, longitude, address, optional description
//! - `POST /update-location/`: JSON `{lat, lon}`
//!
//! ## Notifications
//! - `GET /notifications/count/`: unread count
//! - `POST /notifications/clear/`: drop them all
//!
//!
//!
//! # Flow
//!
//! - Center the map on the device if a position is available, otherwise stay on the
//!   default view and warn that nearby services need the location
//! - Fetch nearby services once
//! - Poll users, alerts and the alert banner on their own intervals
//! - Report the device position periodically
//! - Reports need a logged-in session; checked before any request goes out
//!
//!
//!
//! # Setup
//!
//! Run against the mock backend.
//! ```sh
//! cargo run -p tester
//! ALERT_COOKIE="sessionid=alice; csrftoken=dev-token" ALERT_POSITION="17.385,78.486" \
//!     RUST_LOG=info cargo run -p client -- watch
//! ```
//!
//! Send a report.
//! ```sh
//! cargo run -p client -- --position 17.385,78.486 report --description "Two cars"
//! ```
use std::sync::Arc;

use tokio::{signal, sync::Mutex};
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, fmt};

pub mod api;
pub mod config;
pub mod error;
pub mod map;
pub mod models;
pub mod notify;
pub mod push;
pub mod reconciler;
pub mod report;
pub mod scheduler;
pub mod session;
pub mod snapshot;

use api::{AlertReport, ApiClient};
use config::Config;
use error::Result;
use map::MemoryMap;
use notify::{AlertWatcher, LogNotifier, NotificationPermission};
use reconciler::{Collection, MapController};
use report::{FixedLocator, submit_alert};
use scheduler::Scheduler;

pub fn init_tracing() {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();
}

/// Keeps the map live until Ctrl+C or SIGTERM.
pub async fn watch(config: Config) -> Result<()> {
    info!("Initializing client against {}", config.base_url);
    let api = Arc::new(ApiClient::new(&config)?);

    let mut controller = MapController::new(MemoryMap::new(), config.retention);
    if let Some(position) = config.position {
        controller.show_position(position);
    }
    let map = Arc::new(Mutex::new(controller));

    if config.notification_permission != NotificationPermission::Granted {
        info!("Notification permission not granted, alerts will not pop up");
    }
    let watcher = Arc::new(Mutex::new(AlertWatcher::new(config.notification_permission)));

    Scheduler::new(config.polling, api, map.clone(), watcher, Arc::new(LogNotifier))
        .with_position(config.position)
        .run(shutdown_signal())
        .await;

    let map = map.lock().await;
    info!(
        "Final map: {} users, {} alerts, {} services",
        map.ids(Collection::Users).len(),
        map.ids(Collection::Alerts).len(),
        map.ids(Collection::Services).len(),
    );

    Ok(())
}

pub async fn send_report(config: &Config, description: Option<String>) -> Result<AlertReport> {
    let api = ApiClient::new(config)?;

    submit_alert(&api, &FixedLocator(config.position), description).await
}

pub async fn unread_notifications(config: &Config, clear: bool) -> Result<u32> {
    let api = ApiClient::new(config)?;

    if clear {
        api.clear_notifications().await?;
        info!("Notifications cleared");
    }

    api.unread_notifications().await
}

async fn shutdown_signal() {
    let ctrl_c = async {
        match signal::ctrl_c().await {
            Ok(()) => info!("Received Ctrl+C, shutting down"),
            Err(e) => {
                error!("Failed to install Ctrl+C handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
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
