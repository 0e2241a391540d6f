use std::fmt;

use html_escaper::HtmlEscaper;
use tracing::warn;

use crate::{
    map::Icon,
    models::{AlertRecord, LatLng, LiveLocation, ServiceRecord},
};

/// Display adapter that writes its value through `html_escaper::HtmlEscaper`.
struct Escape<T>(T);

impl<T: fmt::Display> fmt::Display for Escape<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use fmt::Write;
        write!(HtmlEscaper(f), "{}", self.0)
    }
}

pub const ADDRESS_PLACEHOLDER: &str = "Address not available";
pub const UNKNOWN_NAME: &str = "Unknown";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Category {
    User,
    Alert,
    Police,
    Hospital,
}

impl Category {
    /// Anything the backend does not tag as police is drawn as a hospital.
    pub fn for_service(kind: Option<&str>) -> Self {
        match kind {
            Some("police") => Category::Police,
            _ => Category::Hospital,
        }
    }

    pub fn icon(&self) -> Icon {
        match self {
            Category::User => Icon::User,
            Category::Alert => Icon::Alert,
            Category::Police => Icon::Police,
            Category::Hospital => Icon::Hospital,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct MarkerSnapshotEntry {
    pub id: String,
    pub position: LatLng,
    pub label: String,
    pub detail: Option<String>,
    pub category: Category,
}

impl MarkerSnapshotEntry {
    pub fn popup(&self) -> String {
        let label = Escape(&self.label);

        match self.category {
            Category::User => format!("👤 <b>{label}</b>"),
            Category::Alert => format!("🚨 <b>{label}</b><br>{}", self.address()),
            Category::Police | Category::Hospital => {
                let glyph = self.category.icon().glyph().unwrap_or_default();
                format!("{glyph} <b>{label}</b><br>{}", self.address())
            }
        }
    }

    fn address(&self) -> String {
        match self.detail.as_deref().map(str::trim) {
            Some(address) if !address.is_empty() => Escape(address).to_string(),
            _ => ADDRESS_PLACEHOLDER.to_string(),
        }
    }
}

pub fn users_snapshot(locations: &[LiveLocation]) -> Vec<MarkerSnapshotEntry> {
    locations
        .iter()
        .filter_map(|user| {
            let (Some(username), Some(latitude), Some(longitude)) =
                (user.username.as_deref(), user.latitude, user.longitude)
            else {
                warn!("Skipping incomplete live location: {user:?}");
                return None;
            };

            Some(MarkerSnapshotEntry {
                id: username.to_string(),
                position: LatLng::new(latitude, longitude),
                label: username.to_string(),
                detail: None,
                category: Category::User,
            })
        })
        .collect()
}

pub fn alerts_snapshot(alerts: &[AlertRecord]) -> Vec<MarkerSnapshotEntry> {
    alerts
        .iter()
        .filter_map(|alert| {
            let (Some(id), Some(latitude), Some(longitude)) =
                (alert.id.as_deref(), alert.latitude, alert.longitude)
            else {
                warn!("Skipping incomplete alert: {alert:?}");
                return None;
            };

            Some(MarkerSnapshotEntry {
                id: id.to_string(),
                position: LatLng::new(latitude, longitude),
                label: "Emergency Alert".to_string(),
                detail: alert.address.clone(),
                category: Category::Alert,
            })
        })
        .collect()
}

pub fn services_snapshot(services: &[ServiceRecord]) -> Vec<MarkerSnapshotEntry> {
    services
        .iter()
        .filter_map(|service| {
            let (Some(latitude), Some(longitude)) = (service.latitude, service.longitude) else {
                warn!("Skipping service without coordinates: {:?}", service.name);
                return None;
            };

            let name = service
                .name
                .clone()
                .filter(|name| !name.trim().is_empty())
                .unwrap_or_else(|| UNKNOWN_NAME.to_string());

            Some(MarkerSnapshotEntry {
                id: format!("{name}@{latitude:.6},{longitude:.6}"),
                position: LatLng::new(latitude, longitude),
                label: name,
                detail: service.address.clone(),
                category: Category::for_service(service.kind.as_deref()),
            })
        })
        .collect()
}
