//! # Emergency Notifications
//!
//! The banner check polls `/alerts/` every few seconds and raises a local notification
//! whenever the newest alert changes. The very first non-empty poll always notifies since
//! nothing has been seen yet.
//!
//! The popup needs notification permission. Sound and vibration are attempted either way.
use std::str::FromStr;

use tracing::{info, warn};

use crate::{models::AlertRecord, reconciler::Sequence, snapshot::ADDRESS_PLACEHOLDER};

pub const BANNER_TITLE: &str = "🚨 Emergency Alert Nearby";
pub const ALERT_ICON: &str = "/static/images/alert.png";
pub const ALERT_SOUND: &str = "/static/sounds/emergency.mp3";
pub const BANNER_VIBRATION: [u32; 5] = [500, 200, 500, 200, 1000];

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum NotificationPermission {
    Granted,
    Denied,
    #[default]
    Default,
}

impl FromStr for NotificationPermission {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "granted" => Ok(Self::Granted),
            "denied" => Ok(Self::Denied),
            "default" => Ok(Self::Default),
            other => Err(format!("unknown permission `{other}`")),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct EmergencyNotification {
    pub alert_id: String,
    pub title: String,
    pub body: String,
    pub icon: &'static str,
    pub sound: &'static str,
    pub vibration: &'static [u32],
    /// False when the permission was not granted; only sound and vibration go out.
    pub popup: bool,
}

pub trait Notifier: Send + Sync + 'static {
    fn notify(&self, notification: &EmergencyNotification);
}

/// Writes notifications to the log.
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, notification: &EmergencyNotification) {
        if notification.popup {
            warn!("{}: {}", notification.title, notification.body);
        } else {
            info!(
                "Alert {} without popup permission: {}",
                notification.alert_id, notification.body
            );
        }
    }
}

pub struct AlertWatcher {
    last_alert_id: Option<String>,
    permission: NotificationPermission,
    sequence: Sequence,
}

impl AlertWatcher {
    pub fn new(permission: NotificationPermission) -> Self {
        Self {
            last_alert_id: None,
            permission,
            sequence: Sequence::default(),
        }
    }

    pub fn issue(&mut self) -> u64 {
        self.sequence.issue()
    }

    /// Feeds the response of poll `seq`. Older responses than the last observed one
    /// are ignored.
    pub fn observe(&mut self, seq: u64, alerts: &[AlertRecord]) -> Option<EmergencyNotification> {
        if !self.sequence.admit(seq) {
            return None;
        }

        let (latest, id) = alerts
            .iter()
            .find_map(|alert| Some((alert, alert.id.as_deref()?)))?;

        if self.last_alert_id.as_deref() == Some(id) {
            return None;
        }

        self.last_alert_id = Some(id.to_string());

        let body = match latest.address.as_deref().map(str::trim) {
            Some(address) if !address.is_empty() => address.to_string(),
            _ => ADDRESS_PLACEHOLDER.to_string(),
        };

        Some(EmergencyNotification {
            alert_id: id.to_string(),
            title: BANNER_TITLE.to_string(),
            body,
            icon: ALERT_ICON,
            sound: ALERT_SOUND,
            vibration: &BANNER_VIBRATION,
            popup: self.permission == NotificationPermission::Granted,
        })
    }

    pub fn last_alert_id(&self) -> Option<&str> {
        self.last_alert_id.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn alert(id: &str) -> AlertRecord {
        AlertRecord {
            id: Some(id.to_string()),
            latitude: Some(10.0),
            longitude: Some(20.0),
            address: Some(format!("{id} street")),
        }
    }

    fn poll(watcher: &mut AlertWatcher, alerts: &[AlertRecord]) -> Option<EmergencyNotification> {
        let seq = watcher.issue();
        watcher.observe(seq, alerts)
    }

    #[test]
    fn test_notifies_once_per_latest_alert() {
        let mut watcher = AlertWatcher::new(NotificationPermission::Granted);

        let first = poll(&mut watcher, &[alert("2"), alert("1")]).unwrap();
        assert_eq!(first.alert_id, "2");
        assert_eq!(first.body, "2 street");
        assert_eq!(first.title, BANNER_TITLE);
        assert!(first.popup);

        assert!(poll(&mut watcher, &[alert("2"), alert("1")]).is_none());

        let next = poll(&mut watcher, &[alert("3"), alert("2")]).unwrap();
        assert_eq!(next.alert_id, "3");
        assert_eq!(watcher.last_alert_id(), Some("3"));
    }

    #[test]
    fn test_empty_list_keeps_last_seen() {
        let mut watcher = AlertWatcher::new(NotificationPermission::Granted);

        assert!(poll(&mut watcher, &[]).is_none());
        poll(&mut watcher, &[alert("1")]).unwrap();
        assert!(poll(&mut watcher, &[]).is_none());
        assert!(poll(&mut watcher, &[alert("1")]).is_none());
    }

    #[test]
    fn test_popup_needs_permission() {
        let mut watcher = AlertWatcher::new(NotificationPermission::Default);

        let notification = poll(&mut watcher, &[alert("1")]).unwrap();

        assert!(!notification.popup);
        assert_eq!(notification.sound, ALERT_SOUND);
        assert_eq!(notification.vibration, &BANNER_VIBRATION);
    }

    #[test]
    fn test_late_response_is_ignored() {
        let mut watcher = AlertWatcher::new(NotificationPermission::Granted);

        let slow = watcher.issue();
        let fast = watcher.issue();

        assert!(watcher.observe(fast, &[alert("2")]).is_some());
        assert!(watcher.observe(slow, &[alert("1")]).is_none());
        assert_eq!(watcher.last_alert_id(), Some("2"));
    }

    #[test]
    fn test_missing_address_uses_placeholder() {
        let mut watcher = AlertWatcher::new(NotificationPermission::Granted);

        let mut missing = alert("1");
        missing.address = None;
        assert_eq!(poll(&mut watcher, &[missing]).unwrap().body, ADDRESS_PLACEHOLDER);

        let mut blank = alert("2");
        blank.address = Some("  ".to_string());
        assert_eq!(poll(&mut watcher, &[blank]).unwrap().body, ADDRESS_PLACEHOLDER);
    }

    #[test]
    fn test_alerts_without_id_are_passed_over() {
        let mut watcher = AlertWatcher::new(NotificationPermission::Granted);

        let mut anonymous = alert("x");
        anonymous.id = None;

        let notification = poll(&mut watcher, &[anonymous, alert("1")]).unwrap();

        assert_eq!(notification.alert_id, "1");
    }

    #[test]
    fn test_permission_parsing() {
        assert_eq!("Granted".parse(), Ok(NotificationPermission::Granted));
        assert_eq!("denied".parse(), Ok(NotificationPermission::Denied));
        assert!("sure".parse::<NotificationPermission>().is_err());
    }
}
