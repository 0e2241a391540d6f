//! # Push Notifications
//!
//! Service worker side of server push. A push carries an optional JSON payload with
//! `title` and `body`; anything missing falls back to a generic emergency text. The
//! notification stays up until the user interacts with it, and clicking it opens the
//! notification list.
use serde::{Deserialize, Serialize};

use crate::error::Result;

pub const DEFAULT_TITLE: &str = "🚨 Emergency Alert";
pub const DEFAULT_BODY: &str = "Emergency nearby!";
pub const PUSH_ICON: &str = "/static/images/alert.png";
pub const PUSH_VIBRATION: [u32; 5] = [500, 200, 500, 200, 800];
pub const NOTIFICATIONS_URL: &str = "/notifications/";

#[derive(Debug, Default, Deserialize)]
pub struct PushPayload {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub body: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct NotificationData {
    pub url: String,
}

/// Title plus the options handed to `showNotification`.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PushNotification {
    #[serde(skip)]
    pub title: String,
    pub body: String,
    pub icon: String,
    pub badge: String,
    pub vibrate: Vec<u32>,
    pub require_interaction: bool,
    pub data: NotificationData,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ClickAction {
    /// Close the notification, then open or focus the url.
    CloseAndOpen(String),
}

pub fn on_push(data: Option<&[u8]>) -> Result<PushNotification> {
    let payload = match data {
        Some(bytes) => serde_json::from_slice(bytes)?,
        None => PushPayload::default(),
    };

    Ok(PushNotification {
        title: payload.title.unwrap_or_else(|| DEFAULT_TITLE.to_string()),
        body: payload.body.unwrap_or_else(|| DEFAULT_BODY.to_string()),
        icon: PUSH_ICON.to_string(),
        badge: PUSH_ICON.to_string(),
        vibrate: PUSH_VIBRATION.to_vec(),
        require_interaction: true,
        data: NotificationData {
            url: NOTIFICATIONS_URL.to_string(),
        },
    })
}

pub fn on_notification_click(notification: &PushNotification) -> ClickAction {
    ClickAction::CloseAndOpen(notification.data.url.clone())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payload_fields() {
        let notification = on_push(Some(br#"{"title": "Fire", "body": "Block C"}"#)).unwrap();

        assert_eq!(notification.title, "Fire");
        assert_eq!(notification.body, "Block C");
        assert!(notification.require_interaction);
    }

    #[test]
    fn test_missing_payload_uses_defaults() {
        let notification = on_push(None).unwrap();

        assert_eq!(notification.title, DEFAULT_TITLE);
        assert_eq!(notification.body, DEFAULT_BODY);
        assert_eq!(notification.vibrate, PUSH_VIBRATION);

        let partial = on_push(Some(br#"{"body": "Only body"}"#)).unwrap();
        assert_eq!(partial.title, DEFAULT_TITLE);
        assert_eq!(partial.body, "Only body");
    }

    #[test]
    fn test_invalid_payload_is_an_error() {
        assert!(on_push(Some(b"not json")).is_err());
    }

    #[test]
    fn test_options_shape() {
        let options = serde_json::to_value(on_push(None).unwrap()).unwrap();

        assert_eq!(
            options,
            serde_json::json!({
                "body": DEFAULT_BODY,
                "icon": PUSH_ICON,
                "badge": PUSH_ICON,
                "vibrate": [500, 200, 500, 200, 800],
                "requireInteraction": true,
                "data": { "url": NOTIFICATIONS_URL }
            })
        );
    }

    #[test]
    fn test_click_opens_notifications() {
        let notification = on_push(None).unwrap();

        assert_eq!(
            on_notification_click(&notification),
            ClickAction::CloseAndOpen(NOTIFICATIONS_URL.to_string())
        );
    }
}
