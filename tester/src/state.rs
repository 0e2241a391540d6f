use std::{
    collections::{BTreeMap, HashMap},
    sync::Arc,
};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::Mutex;

use super::config::Config;

pub const MAX_ALERTS: usize = 50;

#[derive(Clone, Debug, Serialize)]
pub struct Location {
    pub username: String,
    pub latitude: f64,
    pub longitude: f64,
}

#[derive(Clone, Debug)]
pub struct StoredAlert {
    pub id: u64,
    pub username: String,
    pub latitude: f64,
    pub longitude: f64,
    pub address: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Debug, Serialize)]
pub struct Service {
    #[serde(rename = "type")]
    pub kind: String,
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
    pub address: String,
}

#[derive(Default)]
pub struct Store {
    pub locations: BTreeMap<String, Location>,
    pub alerts: Vec<StoredAlert>,
    pub services: Vec<Service>,
    pub unread: HashMap<String, u32>,
    next_alert_id: u64,
}

impl Store {
    pub fn add_alert(
        &mut self,
        username: &str,
        latitude: f64,
        longitude: f64,
        address: &str,
        description: Option<&str>,
    ) -> u64 {
        self.next_alert_id += 1;
        let id = self.next_alert_id;

        self.alerts.push(StoredAlert {
            id,
            username: username.to_string(),
            latitude,
            longitude,
            address: address.to_string(),
            description: description.map(str::to_string),
            created_at: Utc::now(),
        });

        for other in self.locations.keys().filter(|name| name.as_str() != username) {
            *self.unread.entry(other.clone()).or_default() += 1;
        }

        id
    }

    /// Newest first, capped at [`MAX_ALERTS`].
    pub fn recent_alerts(&self) -> Vec<&StoredAlert> {
        let mut alerts: Vec<&StoredAlert> = self.alerts.iter().collect();
        alerts.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        alerts.truncate(MAX_ALERTS);

        alerts
    }

    pub fn update_location(&mut self, username: &str, latitude: f64, longitude: f64) {
        self.locations.insert(
            username.to_string(),
            Location {
                username: username.to_string(),
                latitude,
                longitude,
            },
        );
    }
}

pub struct AppState {
    pub config: Config,
    pub store: Mutex<Store>,
}

impl AppState {
    pub fn new(config: Config) -> Arc<Self> {
        Arc::new(Self {
            config,
            store: Mutex::new(Store::default()),
        })
    }

    /// A couple of services around the default map center so a fresh client has
    /// something to draw.
    pub fn seeded(config: Config) -> Arc<Self> {
        let store = Store {
            services: vec![
                Service {
                    kind: "police".to_string(),
                    name: "Abids Police Station".to_string(),
                    latitude: 17.3916,
                    longitude: 78.4744,
                    address: "Abids Road, Hyderabad".to_string(),
                },
                Service {
                    kind: "hospital".to_string(),
                    name: "Osmania General Hospital".to_string(),
                    latitude: 17.3714,
                    longitude: 78.4737,
                    address: String::new(),
                },
            ],
            ..Store::default()
        };

        Arc::new(Self {
            config,
            store: Mutex::new(store),
        })
    }
}
