use std::future::Future;

use reqwest::{
    Client, RequestBuilder, Response,
    header::{COOKIE, HeaderMap, HeaderValue},
    multipart::Form,
};
use serde::de::DeserializeOwned;
use tracing::{debug, info};

use crate::{
    config::Config,
    error::{ClientError, Result},
    models::{
        ALERTS, AlertRecord, AlertsResponse, GeocodeResponse, LIVE_LOCATIONS, LatLng,
        LiveLocation, LocationUpdate, LocationsResponse, NEARBY_SERVICES, NOTIFICATION_CLEAR,
        NOTIFICATION_COUNT, NotificationCount, REVERSE_GEOCODE, SEND_ALERT, ServiceRecord,
        ServicesResponse, UPDATE_LOCATION,
    },
    session::{CSRF_HEADER, Session},
};

pub const UNKNOWN_LOCATION: &str = "Unknown location";

/// Everything the background polls need from the backend.
pub trait Feed: Send + Sync + 'static {
    fn live_locations(&self) -> impl Future<Output = Result<Vec<LiveLocation>>> + Send;

    fn alerts(&self) -> impl Future<Output = Result<Vec<AlertRecord>>> + Send;

    fn nearby_services(
        &self,
        around: LatLng,
    ) -> impl Future<Output = Result<Vec<ServiceRecord>>> + Send;

    fn update_location(&self, at: LatLng) -> impl Future<Output = Result<()>> + Send;
}

#[derive(Clone, Debug, PartialEq)]
pub struct AlertReport {
    pub position: LatLng,
    pub address: String,
    pub description: Option<String>,
}

#[derive(Clone)]
pub struct ApiClient {
    http: Client,
    base_url: String,
    session: Session,
}

impl ApiClient {
    pub fn new(config: &Config) -> Result<Self> {
        let mut headers = HeaderMap::new();

        if let Some(cookie) = &config.session.cookie {
            headers.insert(COOKIE, HeaderValue::from_str(cookie)?);
        }

        let mut builder = Client::builder().default_headers(headers);

        if let Some(timeout) = config.request_timeout {
            builder = builder.timeout(timeout);
        }

        Ok(Self {
            http: builder.build()?,
            base_url: config.base_url.clone(),
            session: config.session.clone(),
        })
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub async fn reverse_geocode(&self, at: LatLng) -> Result<String> {
        let request = self.get(REVERSE_GEOCODE).query(&coordinates(at));
        let response: GeocodeResponse = read_json(REVERSE_GEOCODE, request).await?;

        Ok(response
            .address
            .filter(|address| !address.is_empty())
            .unwrap_or_else(|| UNKNOWN_LOCATION.to_string()))
    }

    pub async fn send_alert(&self, report: &AlertReport) -> Result<serde_json::Value> {
        let mut form = Form::new()
            .text("latitude", report.position.latitude.to_string())
            .text("longitude", report.position.longitude.to_string())
            .text("address", report.address.clone());

        if let Some(description) = &report.description {
            form = form.text("description", description.clone());
        }

        let request = self.post(SEND_ALERT).multipart(form);
        read_json(SEND_ALERT, request).await
    }

    pub async fn unread_notifications(&self) -> Result<u32> {
        let request = self.get(NOTIFICATION_COUNT);
        let response: NotificationCount = read_json(NOTIFICATION_COUNT, request).await?;

        Ok(response.count)
    }

    pub async fn clear_notifications(&self) -> Result<()> {
        send(NOTIFICATION_CLEAR, self.post(NOTIFICATION_CLEAR)).await?;

        Ok(())
    }

    fn get(&self, path: &str) -> RequestBuilder {
        self.http.get(format!("{}{path}", self.base_url))
    }

    fn post(&self, path: &str) -> RequestBuilder {
        self.http
            .post(format!("{}{path}", self.base_url))
            .header(CSRF_HEADER, self.session.csrf_header_value())
    }
}

impl Feed for ApiClient {
    async fn live_locations(&self) -> Result<Vec<LiveLocation>> {
        let request = self.get(LIVE_LOCATIONS);
        let response: LocationsResponse = read_json(LIVE_LOCATIONS, request).await?;

        Ok(response.locations)
    }

    async fn alerts(&self) -> Result<Vec<AlertRecord>> {
        let response: AlertsResponse = read_json(ALERTS, self.get(ALERTS)).await?;

        Ok(response.alerts)
    }

    async fn nearby_services(&self, around: LatLng) -> Result<Vec<ServiceRecord>> {
        let request = self.get(NEARBY_SERVICES).query(&coordinates(around));
        let response: ServicesResponse = read_json(NEARBY_SERVICES, request).await?;

        Ok(response.services)
    }

    async fn update_location(&self, at: LatLng) -> Result<()> {
        let request = self.post(UPDATE_LOCATION).json(&LocationUpdate {
            lat: at.latitude,
            lon: at.longitude,
        });

        let response: serde_json::Value = read_json(UPDATE_LOCATION, request).await?;
        info!("Location updated: {response}");

        Ok(())
    }
}

fn coordinates(at: LatLng) -> [(&'static str, f64); 2] {
    [("lat", at.latitude), ("lon", at.longitude)]
}

async fn send(endpoint: &'static str, request: RequestBuilder) -> Result<Response> {
    let response = request.send().await?;
    let status = response.status();

    #[cfg(feature = "verbose")]
    debug!("{endpoint} -> {status}");

    if !status.is_success() {
        debug!("{endpoint} failed with {status}");
        return Err(ClientError::Status { endpoint, status });
    }

    Ok(response)
}

async fn read_json<T: DeserializeOwned>(
    endpoint: &'static str,
    request: RequestBuilder,
) -> Result<T> {
    let text = send(endpoint, request).await?.text().await?;

    Ok(serde_json::from_str(&text)?)
}
