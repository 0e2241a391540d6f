use std::{collections::BTreeSet, sync::Arc};

use axum::{Json, Router, routing::get};
use client::{
    api::{ApiClient, Feed, UNKNOWN_LOCATION},
    config::Config,
    error::ClientError,
    map::{Icon, MemoryMap},
    models::LatLng,
    reconciler::{Collection, MapController, UserRetention},
    report::{FixedLocator, submit_alert},
    scheduler::{Refresh, refresh_alerts, refresh_services, refresh_users},
    snapshot::ADDRESS_PLACEHOLDER,
};
use reqwest::StatusCode;
use serde_json::{Value, json};
use tester::{config::Config as BackendConfig, state::AppState};
use tokio::{net::TcpListener, sync::Mutex};

const TOKEN: &str = "test-token";
const HERE: LatLng = LatLng::new(17.385, 78.486);

async fn backend() -> (Arc<AppState>, String) {
    let state = AppState::seeded(BackendConfig::local(TOKEN));
    let address = tester::spawn_local(state.clone()).await.unwrap();

    (state, format!("http://{address}"))
}

/// A backend that answers GETs on `path` with `body` and nothing else.
async fn stub(path: &str, body: Value) -> String {
    let app = Router::new().route(path, get(move || async move { Json(body) }));
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let address = listener.local_addr().unwrap();

    tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });

    format!("http://{address}")
}

fn config(base_url: &str, cookie: Option<&str>) -> Config {
    let base_url = base_url.to_string();
    let cookie = cookie.map(str::to_string);

    Config::from_source(move |key| match key {
        "ALERT_BASE_URL" => Some(base_url.clone()),
        "ALERT_COOKIE" => cookie.clone(),
        "ALERT_POSITION" => Some("17.385,78.486".to_string()),
        _ => None,
    })
    .unwrap()
}

fn logged_in(base_url: &str, user: &str) -> ApiClient {
    let cookie = format!("sessionid={user}; csrftoken={TOKEN}");
    ApiClient::new(&config(base_url, Some(&cookie))).unwrap()
}

fn map() -> Mutex<MapController<MemoryMap>> {
    Mutex::new(MapController::new(MemoryMap::new(), UserRetention::Keep))
}

fn ids(map: &MapController<MemoryMap>, collection: Collection) -> BTreeSet<String> {
    map.ids(collection).into_iter().map(str::to_string).collect()
}

#[tokio::test]
async fn test_only_latest_alerts_stay_visible() {
    let (state, url) = backend().await;
    let api = logged_in(&url, "alice");
    let map = map();

    let first = state
        .store
        .lock()
        .await
        .add_alert("carol", 10.0, 20.0, "Main St", None);

    let ticket = map.lock().await.issue(Collection::Alerts);
    assert_eq!(refresh_alerts(&api, &map, ticket).await, Refresh::Applied);
    let visible = ids(&*map.lock().await, Collection::Alerts);
    assert_eq!(visible, BTreeSet::from([first.to_string()]));

    let second = {
        let mut store = state.store.lock().await;
        store.alerts.clear();
        store.add_alert("carol", 11.0, 21.0, "Elm St", None)
    };

    let ticket = map.lock().await.issue(Collection::Alerts);
    assert_eq!(refresh_alerts(&api, &map, ticket).await, Refresh::Applied);

    let map = map.lock().await;
    assert_eq!(ids(&map, Collection::Alerts), BTreeSet::from([second.to_string()]));

    let handle = map.handle(Collection::Alerts, &second.to_string()).unwrap();
    let marker = map.view().get(handle).unwrap();
    assert_eq!(marker.popup, "🚨 <b>Emergency Alert</b><br>Elm St");
    assert_eq!(marker.position, LatLng::new(11.0, 21.0));
    assert_eq!(map.view().len(), 1);
}

#[tokio::test]
async fn test_broken_records_do_not_sink_the_poll() {
    let alerts = json!({ "alerts": [
        { "id": 1, "latitude": 10.0, "longitude": 20.0, "address": "Main St" },
        { "id": 2, "latitude": null, "longitude": 21.0 },
        { "latitude": 12.0, "longitude": 22.0 },
    ]});
    let api = logged_in(&stub("/alerts/", alerts).await, "alice");
    let map = map();

    let ticket = map.lock().await.issue(Collection::Alerts);
    assert_eq!(refresh_alerts(&api, &map, ticket).await, Refresh::Applied);
    let visible = ids(&*map.lock().await, Collection::Alerts);
    assert_eq!(visible, BTreeSet::from(["1".to_string()]));

    let locations = json!({ "locations": [
        { "username": "alice", "latitude": 17.4, "longitude": 78.5 },
        { "username": "bob", "latitude": 17.5 },
    ]});
    let api = logged_in(&stub("/live-locations/", locations).await, "alice");

    let ticket = map.lock().await.issue(Collection::Users);
    assert_eq!(refresh_users(&api, &map, ticket).await, Refresh::Applied);
    let visible = ids(&*map.lock().await, Collection::Users);
    assert_eq!(visible, BTreeSet::from(["alice".to_string()]));
}

#[tokio::test]
async fn test_reported_locations_show_up_as_users() {
    let (_state, url) = backend().await;
    let alice = logged_in(&url, "alice");
    let bob = logged_in(&url, "bob");
    let map = map();

    alice.update_location(HERE).await.unwrap();
    bob.update_location(LatLng::new(17.4, 78.5)).await.unwrap();

    let ticket = map.lock().await.issue(Collection::Users);
    assert_eq!(refresh_users(&alice, &map, ticket).await, Refresh::Applied);

    let map = map.lock().await;
    assert_eq!(
        ids(&map, Collection::Users),
        BTreeSet::from(["alice".to_string(), "bob".to_string()])
    );
    let handle = map.handle(Collection::Users, "bob").unwrap();
    assert_eq!(map.view().get(handle).unwrap().popup, "👤 <b>bob</b>");
}

#[tokio::test]
async fn test_nearby_services_markers() {
    let (_state, url) = backend().await;
    let api = logged_in(&url, "alice");
    let map = map();

    let ticket = map.lock().await.issue(Collection::Services);
    assert_eq!(refresh_services(&api, &map, ticket, HERE).await, Refresh::Applied);

    let map = map.lock().await;
    let icons: Vec<Icon> = map.view().markers().map(|m| m.icon).collect();
    assert_eq!(icons.len(), 2);
    assert!(icons.contains(&Icon::Police));
    assert!(icons.contains(&Icon::Hospital));

    let hospital = map
        .view()
        .markers()
        .find(|m| m.icon == Icon::Hospital)
        .unwrap();
    assert!(hospital.popup.ends_with(ADDRESS_PLACEHOLDER));
}

#[tokio::test]
async fn test_submit_alert() {
    let (state, url) = backend().await;
    let alice = logged_in(&url, "alice");
    let bob = logged_in(&url, "bob");
    bob.update_location(HERE).await.unwrap();

    let report = submit_alert(&alice, &FixedLocator(Some(HERE)), Some("Two cars".to_string()))
        .await
        .unwrap();
    assert_eq!(report.address, "Near 17.3850, 78.4860");

    {
        let store = state.store.lock().await;
        assert_eq!(store.alerts.len(), 1);
        assert_eq!(store.alerts[0].username, "alice");
        assert_eq!(store.alerts[0].description.as_deref(), Some("Two cars"));
        assert_eq!(store.alerts[0].latitude, HERE.latitude);
    }

    assert_eq!(bob.unread_notifications().await.unwrap(), 1);
    bob.clear_notifications().await.unwrap();
    assert_eq!(bob.unread_notifications().await.unwrap(), 0);
}

#[tokio::test]
async fn test_blank_description_is_left_out() {
    let (state, url) = backend().await;
    let api = logged_in(&url, "alice");

    let report = submit_alert(&api, &FixedLocator(Some(HERE)), Some("   ".to_string()))
        .await
        .unwrap();
    assert_eq!(report.description, None);

    submit_alert(&api, &FixedLocator(Some(HERE)), None)
        .await
        .unwrap();

    let store = state.store.lock().await;
    assert_eq!(store.alerts.len(), 2);
    assert!(store.alerts.iter().all(|alert| alert.description.is_none()));
}

#[tokio::test]
async fn test_reverse_geocode_falls_back_to_unknown() {
    for body in [json!({ "address": "" }), json!({ "address": null }), json!({})] {
        let url = stub("/reverse-geocode/", body).await;
        let api = logged_in(&url, "alice");

        assert_eq!(api.reverse_geocode(HERE).await.unwrap(), UNKNOWN_LOCATION);
    }
}

#[tokio::test]
async fn test_submit_requires_login() {
    let (state, url) = backend().await;
    let anonymous = ApiClient::new(&config(&url, Some("csrftoken=test-token"))).unwrap();

    let result = submit_alert(&anonymous, &FixedLocator(Some(HERE)), None).await;

    assert!(matches!(result, Err(ClientError::NotLoggedIn)));
    assert!(state.store.lock().await.alerts.is_empty());
}

#[tokio::test]
async fn test_submit_requires_position() {
    let (state, url) = backend().await;
    let api = logged_in(&url, "alice");

    let result = submit_alert(&api, &FixedLocator(None), None).await;

    assert!(matches!(result, Err(ClientError::PermissionDenied(_))));
    assert!(state.store.lock().await.alerts.is_empty());
}

#[tokio::test]
async fn test_missing_csrf_is_rejected() {
    let (_state, url) = backend().await;
    let api = ApiClient::new(&config(&url, Some("sessionid=alice"))).unwrap();

    let result = api.update_location(HERE).await;

    assert!(matches!(
        result,
        Err(ClientError::Status {
            status: StatusCode::FORBIDDEN,
            ..
        })
    ));
}

#[tokio::test]
async fn test_rejected_poll_keeps_markers() {
    let (state, url) = backend().await;
    let api = logged_in(&url, "alice");
    let anonymous = ApiClient::new(&config(&url, None)).unwrap();
    let map = map();

    state
        .store
        .lock()
        .await
        .add_alert("carol", 10.0, 20.0, "Main St", None);

    let ticket = map.lock().await.issue(Collection::Alerts);
    refresh_alerts(&api, &map, ticket).await;
    let before: Vec<_> = map.lock().await.view().markers().cloned().collect();

    let ticket = map.lock().await.issue(Collection::Alerts);
    assert_eq!(refresh_alerts(&anonymous, &map, ticket).await, Refresh::Failed);

    let after: Vec<_> = map.lock().await.view().markers().cloned().collect();
    assert_eq!(before, after);
    assert_eq!(after.len(), 1);
}
