use serde::{Deserialize, Deserializer, Serialize};

pub const LIVE_LOCATIONS: &str = "/live-locations/";
pub const ALERTS: &str = "/alerts/";
pub const NEARBY_SERVICES: &str = "/nearby-services/";
pub const REVERSE_GEOCODE: &str = "/reverse-geocode/";
pub const SEND_ALERT: &str = "/send-alert/";
pub const UPDATE_LOCATION: &str = "/update-location/";
pub const NOTIFICATION_COUNT: &str = "/notifications/count/";
pub const NOTIFICATION_CLEAR: &str = "/notifications/clear/";

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LatLng {
    pub latitude: f64,
    pub longitude: f64,
}

impl LatLng {
    pub const fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }
}

#[derive(Deserialize)]
pub struct LocationsResponse {
    pub locations: Vec<LiveLocation>,
}

/// Entries are decoded field by field so that one broken record cannot sink the
/// rest of the poll; incomplete ones are dropped when building the snapshot.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct LiveLocation {
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub latitude: Option<f64>,
    #[serde(default)]
    pub longitude: Option<f64>,
}

#[derive(Deserialize)]
pub struct AlertsResponse {
    pub alerts: Vec<AlertRecord>,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct AlertRecord {
    #[serde(default, deserialize_with = "id_string")]
    pub id: Option<String>,
    #[serde(default)]
    pub latitude: Option<f64>,
    #[serde(default)]
    pub longitude: Option<f64>,
    #[serde(default)]
    pub address: Option<String>,
}

#[derive(Deserialize)]
pub struct ServicesResponse {
    pub services: Vec<ServiceRecord>,
}

/// One police station or hospital near a position. The backend copies these
/// out of OpenStreetMap tags, so any field may be missing.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct ServiceRecord {
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub latitude: Option<f64>,
    #[serde(default)]
    pub longitude: Option<f64>,
    #[serde(default)]
    pub address: Option<String>,
}

#[derive(Deserialize)]
pub struct GeocodeResponse {
    #[serde(default)]
    pub address: Option<String>,
}

#[derive(Deserialize)]
pub struct NotificationCount {
    pub count: u32,
}

#[derive(Serialize)]
pub struct LocationUpdate {
    pub lat: f64,
    pub lon: f64,
}

/// Alert ids come back as integers from the database but are treated as opaque keys.
fn id_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawId {
        Number(i64),
        Text(String),
    }

    Ok(match Option::<RawId>::deserialize(deserializer)? {
        Some(RawId::Number(n)) => Some(n.to_string()),
        Some(RawId::Text(s)) => Some(s),
        None => None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alert_ids_accept_numbers_and_strings() {
        let json = r#"{"alerts":[
            {"id": 7, "latitude": 1.0, "longitude": 2.0, "address": "Main St"},
            {"id": "a1", "latitude": 3.0, "longitude": 4.0}
        ]}"#;

        let response: AlertsResponse = serde_json::from_str(json).unwrap();

        assert_eq!(response.alerts[0].id.as_deref(), Some("7"));
        assert_eq!(response.alerts[0].address.as_deref(), Some("Main St"));
        assert_eq!(response.alerts[1].id.as_deref(), Some("a1"));
        assert_eq!(response.alerts[1].address, None);
    }

    #[test]
    fn test_broken_alert_does_not_reject_the_poll() {
        let json = r#"{"alerts":[
            {"id": 1, "latitude": 1.0, "longitude": 2.0, "address": "Main St"},
            {"id": 2, "latitude": null, "longitude": 4.0},
            {"id": null, "latitude": 5.0, "longitude": 6.0},
            {"latitude": 7.0, "longitude": 8.0}
        ]}"#;

        let response: AlertsResponse = serde_json::from_str(json).unwrap();

        assert_eq!(response.alerts.len(), 4);
        assert_eq!(response.alerts[0].latitude, Some(1.0));
        assert_eq!(response.alerts[1].latitude, None);
        assert!(response.alerts[2].id.is_none());
        assert!(response.alerts[3].id.is_none());
    }

    #[test]
    fn test_broken_location_does_not_reject_the_poll() {
        let json = r#"{"locations":[
            {"username": "alice", "latitude": 17.4, "longitude": 78.5},
            {"username": "bob", "latitude": null, "longitude": 78.5},
            {"latitude": 1.0, "longitude": 2.0}
        ]}"#;

        let response: LocationsResponse = serde_json::from_str(json).unwrap();

        assert_eq!(response.locations.len(), 3);
        assert_eq!(response.locations[0].username.as_deref(), Some("alice"));
        assert_eq!(response.locations[1].latitude, None);
        assert!(response.locations[2].username.is_none());
    }

    #[test]
    fn test_service_fields_are_optional() {
        let json = r#"{"services":[
            {"type": "police", "name": "Central", "latitude": 1.5, "longitude": 2.5, "address": ""},
            {"name": "Unknown"}
        ]}"#;

        let response: ServicesResponse = serde_json::from_str(json).unwrap();

        assert_eq!(response.services[0].kind.as_deref(), Some("police"));
        assert_eq!(response.services[0].latitude, Some(1.5));
        assert!(response.services[1].kind.is_none());
        assert!(response.services[1].latitude.is_none());
    }

    #[test]
    fn test_location_update_shape() {
        let body = serde_json::to_value(LocationUpdate { lat: 1.0, lon: 2.0 }).unwrap();
        assert_eq!(body, serde_json::json!({"lat": 1.0, "lon": 2.0}));
    }
}
