use std::sync::Arc;

use axum::{
    Json,
    extract::{Multipart, Query, State},
    http::{HeaderMap, header::COOKIE},
};
use serde::Deserialize;
use serde_json::{Value, json};
#[cfg(feature = "verbose")]
use tracing::debug;
use tracing::info;

use crate::{error::AppError, state::AppState};

pub const CSRF_HEADER: &str = "x-csrftoken";

#[derive(Deserialize)]
pub struct Coordinates {
    lat: Option<f64>,
    lon: Option<f64>,
}

impl Coordinates {
    fn require(&self) -> Result<(f64, f64), AppError> {
        match (self.lat, self.lon) {
            (Some(lat), Some(lon)) => Ok((lat, lon)),
            _ => Err(AppError::MissingCoordinates),
        }
    }
}

#[derive(Deserialize)]
pub struct LocationPayload {
    lat: f64,
    lon: f64,
}

pub async fn live_locations_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<Value>, AppError> {
    session_user(&headers)?;
    let store = state.store.lock().await;

    let locations: Vec<_> = store.locations.values().collect();
    Ok(Json(json!({ "locations": locations })))
}

pub async fn alerts_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<Value>, AppError> {
    session_user(&headers)?;
    let store = state.store.lock().await;

    let alerts: Vec<Value> = store
        .recent_alerts()
        .into_iter()
        .map(|alert| {
            json!({
                "id": alert.id,
                "latitude": alert.latitude,
                "longitude": alert.longitude,
                "address": alert.address,
            })
        })
        .collect();

    Ok(Json(json!({ "alerts": alerts })))
}

pub async fn nearby_services_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(coordinates): Query<Coordinates>,
) -> Result<Json<Value>, AppError> {
    session_user(&headers)?;
    let (_lat, _lon) = coordinates.require()?;
    let store = state.store.lock().await;

    Ok(Json(json!({ "services": store.services })))
}

pub async fn reverse_geocode_handler(
    headers: HeaderMap,
    Query(coordinates): Query<Coordinates>,
) -> Result<Json<Value>, AppError> {
    session_user(&headers)?;
    let (lat, lon) = coordinates.require()?;

    Ok(Json(json!({ "address": format!("Near {lat:.4}, {lon:.4}") })))
}

pub async fn send_alert_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> Result<Json<Value>, AppError> {
    let username = session_user(&headers)?;
    check_csrf(&state, &headers)?;

    let mut latitude = None;
    let mut longitude = None;
    let mut address = String::new();
    let mut description = None;

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().unwrap_or_default().to_string();
        let value = field.text().await?;

        #[cfg(feature = "verbose")]
        debug!("Field {name}: {value}");

        match name.as_str() {
            "latitude" => latitude = value.parse::<f64>().ok(),
            "longitude" => longitude = value.parse::<f64>().ok(),
            "address" => address = value,
            "description" => description = Some(value),
            _ => {}
        }
    }

    let (Some(latitude), Some(longitude)) = (latitude, longitude) else {
        return Err(AppError::MalformedPayload);
    };

    let id = state
        .store
        .lock()
        .await
        .add_alert(&username, latitude, longitude, &address, description.as_deref());
    info!("Alert #{id} from {username} at {address}");

    Ok(Json(json!({ "status": "success" })))
}

pub async fn update_location_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(payload): Json<LocationPayload>,
) -> Result<Json<Value>, AppError> {
    let username = session_user(&headers)?;
    check_csrf(&state, &headers)?;

    state
        .store
        .lock()
        .await
        .update_location(&username, payload.lat, payload.lon);

    Ok(Json(json!({ "status": "ok" })))
}

pub async fn notification_count_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<Value>, AppError> {
    let username = session_user(&headers)?;
    let store = state.store.lock().await;

    let count = store.unread.get(&username).copied().unwrap_or(0);
    Ok(Json(json!({ "count": count })))
}

pub async fn clear_notifications_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<Value>, AppError> {
    let username = session_user(&headers)?;
    check_csrf(&state, &headers)?;

    state.store.lock().await.unread.remove(&username);

    Ok(Json(json!({ "status": "ok" })))
}

/// The mock treats the `sessionid` cookie value as the username.
fn session_user(headers: &HeaderMap) -> Result<String, AppError> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|cookies| cookies.split(';'))
        .map(str::trim)
        .find_map(|pair| pair.strip_prefix("sessionid="))
        .filter(|user| !user.is_empty())
        .map(str::to_string)
        .ok_or(AppError::Unauthorized)
}

fn check_csrf(state: &AppState, headers: &HeaderMap) -> Result<(), AppError> {
    let token = headers
        .get(CSRF_HEADER)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default();

    if token != state.config.csrf_token {
        return Err(AppError::Forbidden);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use axum::http::HeaderValue;

    use super::*;
    use crate::config::Config;

    fn headers(cookie: &str, csrf: Option<&str>) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(COOKIE, HeaderValue::from_str(cookie).unwrap());
        if let Some(csrf) = csrf {
            headers.insert(CSRF_HEADER, HeaderValue::from_str(csrf).unwrap());
        }
        headers
    }

    #[test]
    fn test_session_user() {
        assert_eq!(session_user(&headers("csrftoken=x; sessionid=bob", None)).unwrap(), "bob");
        assert!(matches!(
            session_user(&headers("csrftoken=x", None)),
            Err(AppError::Unauthorized)
        ));
        assert!(matches!(
            session_user(&headers("sessionid=", None)),
            Err(AppError::Unauthorized)
        ));
    }

    #[test]
    fn test_csrf() {
        let state = AppState::new(Config::local("secret"));

        assert!(check_csrf(&state, &headers("sessionid=bob", Some("secret"))).is_ok());
        assert!(matches!(
            check_csrf(&state, &headers("sessionid=bob", Some("wrong"))),
            Err(AppError::Forbidden)
        ));
        assert!(matches!(
            check_csrf(&state, &headers("sessionid=bob", None)),
            Err(AppError::Forbidden)
        ));
    }
}
