use std::{env, fmt::Display, str::FromStr, time::Duration};

use reqwest::Url;
use tracing::{info, warn};

use crate::{
    error::{ClientError, Result},
    models::LatLng,
    notify::NotificationPermission,
    reconciler::UserRetention,
    scheduler::PollingPolicy,
    session::Session,
};

pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:8000";

pub struct Config {
    pub base_url: String,
    pub session: Session,
    pub position: Option<LatLng>,
    pub notification_permission: NotificationPermission,
    pub polling: PollingPolicy,
    pub retention: UserRetention,
    pub request_timeout: Option<Duration>,
}

impl Config {
    pub fn load() -> Result<Self> {
        Self::from_source(|key| env::var(key).ok())
    }

    /// Same as [`Config::load`] with a custom variable lookup.
    pub fn from_source(source: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let source = &source;

        let prune: bool = try_load(source, "ALERT_PRUNE_USERS", "false")?;

        Ok(Self {
            base_url: base_url(&try_load::<String>(source, "ALERT_BASE_URL", DEFAULT_BASE_URL)?)?,
            session: Session::from_cookie(var(source, "ALERT_COOKIE")),
            position: optional(source, "ALERT_POSITION", parse_position)?,
            notification_permission: try_load(source, "ALERT_NOTIFICATION_PERMISSION", "default")?,
            polling: PollingPolicy {
                users: seconds(source, "ALERT_USERS_POLL_SECS", "30")?,
                alerts: seconds(source, "ALERT_ALERTS_POLL_SECS", "15")?,
                banner: seconds(source, "ALERT_BANNER_POLL_SECS", "5")?,
                location: seconds(source, "ALERT_LOCATION_POLL_SECS", "30")?,
            },
            retention: if prune {
                UserRetention::Prune
            } else {
                UserRetention::Keep
            },
            request_timeout: optional(source, "ALERT_REQUEST_TIMEOUT_SECS", |raw| {
                raw.parse::<u64>()
                    .map(Duration::from_secs)
                    .map_err(|e| e.to_string())
            })?,
        })
    }
}

fn var(source: &impl Fn(&str) -> Option<String>, key: &str) -> Option<String> {
    let value = source(key);

    if value.is_none() {
        info!("Environment variable {key} not found");
    }

    value
}

fn try_load<T: FromStr>(
    source: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: &str,
) -> Result<T>
where
    T::Err: Display,
{
    var(source, key)
        .unwrap_or_else(|| {
            info!("{key} not set, using default: {default}");
            default.to_string()
        })
        .parse()
        .map_err(|e| {
            warn!("Invalid {key} value: {e}");
            ClientError::Config(format!("{key}: {e}"))
        })
}

fn optional<T>(
    source: &impl Fn(&str) -> Option<String>,
    key: &str,
    parse: impl Fn(&str) -> std::result::Result<T, String>,
) -> Result<Option<T>> {
    var(source, key)
        .filter(|raw| !raw.trim().is_empty())
        .map(|raw| {
            parse(raw.trim()).map_err(|e| {
                warn!("Invalid {key} value: {e}");
                ClientError::Config(format!("{key}: {e}"))
            })
        })
        .transpose()
}

fn seconds(
    source: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: &str,
) -> Result<Duration> {
    let secs: u64 = try_load(source, key, default)?;

    if secs == 0 {
        return Err(ClientError::Config(format!("{key} must be at least 1 second")));
    }

    Ok(Duration::from_secs(secs))
}

fn base_url(raw: &str) -> Result<String> {
    let url = Url::parse(raw).map_err(|e| ClientError::Config(format!("ALERT_BASE_URL: {e}")))?;

    Ok(url.as_str().trim_end_matches('/').to_string())
}

/// Parses `lat,lon`.
pub fn parse_position(raw: &str) -> std::result::Result<LatLng, String> {
    let (lat, lon) = raw
        .split_once(',')
        .ok_or_else(|| format!("expected `lat,lon`, got `{raw}`"))?;

    let latitude: f64 = lat.trim().parse().map_err(|e| format!("latitude: {e}"))?;
    let longitude: f64 = lon.trim().parse().map_err(|e| format!("longitude: {e}"))?;

    if !(-90.0..=90.0).contains(&latitude) || !(-180.0..=180.0).contains(&longitude) {
        return Err(format!("`{raw}` is out of range"));
    }

    Ok(LatLng::new(latitude, longitude))
}
