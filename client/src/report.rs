//! # Alert Submission
//!
//! 1. Check the session is logged in. Nothing touches the network otherwise.
//! 2. Ask the locator for the device position.
//! 3. Turn the position into an address through the backend.
//! 4. Post the multipart report with the CSRF header.
use tracing::info;

use crate::{
    api::{AlertReport, ApiClient},
    error::{ClientError, Permission, Result},
    models::LatLng,
};

pub trait Geolocator {
    fn current_position(&self) -> Result<LatLng>;
}

/// Position known up front (configuration or command line). `None` behaves like a
/// denied permission prompt.
pub struct FixedLocator(pub Option<LatLng>);

impl Geolocator for FixedLocator {
    fn current_position(&self) -> Result<LatLng> {
        self.0.ok_or(ClientError::PermissionDenied(Permission::Geolocation))
    }
}

pub async fn submit_alert(
    api: &ApiClient,
    locator: &impl Geolocator,
    description: Option<String>,
) -> Result<AlertReport> {
    if !api.session().authenticated {
        return Err(ClientError::NotLoggedIn);
    }

    info!("📡 Fetching location...");
    let position = locator.current_position()?;

    let address = api.reverse_geocode(position).await?;
    info!("📍 Location: {address}");

    let report = AlertReport {
        position,
        address,
        description: description.filter(|d| !d.trim().is_empty()),
    };

    api.send_alert(&report).await?;
    info!("✅ Emergency alert sent!");

    Ok(report)
}
