//! # Marker Reconciliation
//!
//! Keeps the markers on a [`MapView`] in line with the latest server snapshots.
//!
//! ## Collections
//! - Users: incremental. Known ids are moved in place so an open popup survives the
//!   update, new ids get a marker. Ids missing from a snapshot stay on the map unless
//!   [`UserRetention::Prune`] is configured.
//! - Alerts, services: full replace. Every tracked marker is removed and the snapshot is
//!   drawn from scratch, so the visible id set always equals the last snapshot.
//!
//! ## Ordering
//! Polls run on fixed intervals and a slow response can land after a newer one. Every
//! fetch takes a [`Ticket`] first, and [`MapController::apply`] drops a response whose
//! ticket is older than the last one applied for that collection.
//!
//! ## Invariants
//! - At most one live marker per id per collection. Duplicate ids inside one snapshot
//!   resolve to the later entry and the earlier marker is removed, never orphaned.
//! - A failed fetch never reaches the controller, so the previous markers stay as they were.
use std::collections::{BTreeSet, HashMap};

#[cfg(feature = "verbose")]
use tracing::debug;

use crate::{
    map::{Icon, MapView, Marker, MarkerHandle, POSITION_ZOOM},
    models::LatLng,
    snapshot::MarkerSnapshotEntry,
};

pub const POSITION_POPUP: &str = "📍 You are here";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Collection {
    Users,
    Alerts,
    Services,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum UserRetention {
    /// Once seen, a user stays on the map for the whole session.
    #[default]
    Keep,
    Prune,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Ticket {
    pub collection: Collection,
    pub seq: u64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Outcome {
    Applied,
    Stale,
}

/// Monotonic request numbering. A response is admitted only if it is newer than
/// everything admitted before it.
#[derive(Debug, Default)]
pub struct Sequence {
    issued: u64,
    applied: u64,
}

impl Sequence {
    pub fn issue(&mut self) -> u64 {
        self.issued += 1;
        self.issued
    }

    pub fn admit(&mut self, seq: u64) -> bool {
        if seq <= self.applied {
            return false;
        }

        self.applied = seq;
        true
    }
}

#[derive(Default)]
struct Layer {
    markers: HashMap<String, MarkerHandle>,
    sequence: Sequence,
}

pub struct MapController<V: MapView> {
    view: V,
    users: Layer,
    alerts: Layer,
    services: Layer,
    position: Option<MarkerHandle>,
    retention: UserRetention,
}

impl<V: MapView> MapController<V> {
    pub fn new(view: V, retention: UserRetention) -> Self {
        Self {
            view,
            users: Layer::default(),
            alerts: Layer::default(),
            services: Layer::default(),
            position: None,
            retention,
        }
    }

    pub fn view(&self) -> &V {
        &self.view
    }

    pub fn ids(&self, collection: Collection) -> BTreeSet<&str> {
        self.layer(collection)
            .markers
            .keys()
            .map(String::as_str)
            .collect()
    }

    pub fn handle(&self, collection: Collection, id: &str) -> Option<&MarkerHandle> {
        self.layer(collection).markers.get(id)
    }

    pub fn issue(&mut self, collection: Collection) -> Ticket {
        Ticket {
            collection,
            seq: self.layer_mut(collection).sequence.issue(),
        }
    }

    pub fn apply(&mut self, ticket: Ticket, snapshot: &[MarkerSnapshotEntry]) -> Outcome {
        if !self.layer_mut(ticket.collection).sequence.admit(ticket.seq) {
            return Outcome::Stale;
        }

        match ticket.collection {
            Collection::Users => self.reconcile_users(snapshot),
            Collection::Alerts => self.replace_alerts(snapshot),
            Collection::Services => self.replace_services(snapshot),
        }

        Outcome::Applied
    }

    pub fn reconcile_users(&mut self, snapshot: &[MarkerSnapshotEntry]) {
        for entry in snapshot {
            match self.users.markers.get(&entry.id) {
                Some(handle) => self.view.move_marker(handle, entry.position),
                None => {
                    #[cfg(feature = "verbose")]
                    debug!("New user marker: {}", entry.id);

                    let handle = self.view.add_marker(marker_for(entry));
                    self.users.markers.insert(entry.id.clone(), handle);
                }
            }
        }

        if self.retention == UserRetention::Prune {
            let seen: BTreeSet<&str> = snapshot.iter().map(|entry| entry.id.as_str()).collect();
            let stale: Vec<String> = self
                .users
                .markers
                .keys()
                .filter(|id| !seen.contains(id.as_str()))
                .cloned()
                .collect();

            for id in stale {
                if let Some(handle) = self.users.markers.remove(&id) {
                    self.view.remove_marker(handle);
                }
            }
        }
    }

    pub fn replace_alerts(&mut self, snapshot: &[MarkerSnapshotEntry]) {
        replace(&mut self.view, &mut self.alerts, snapshot);
    }

    pub fn replace_services(&mut self, snapshot: &[MarkerSnapshotEntry]) {
        replace(&mut self.view, &mut self.services, snapshot);
    }

    /// Centers on the device and marks it with an open popup.
    pub fn show_position(&mut self, position: LatLng) {
        self.view.set_view(position, POSITION_ZOOM);

        if let Some(previous) = self.position.take() {
            self.view.remove_marker(previous);
        }

        self.position = Some(self.view.add_marker(Marker {
            position,
            icon: Icon::Pin,
            popup: POSITION_POPUP.to_string(),
            popup_open: true,
        }));
    }

    fn layer(&self, collection: Collection) -> &Layer {
        match collection {
            Collection::Users => &self.users,
            Collection::Alerts => &self.alerts,
            Collection::Services => &self.services,
        }
    }

    fn layer_mut(&mut self, collection: Collection) -> &mut Layer {
        match collection {
            Collection::Users => &mut self.users,
            Collection::Alerts => &mut self.alerts,
            Collection::Services => &mut self.services,
        }
    }
}

fn replace<V: MapView>(view: &mut V, layer: &mut Layer, snapshot: &[MarkerSnapshotEntry]) {
    for (_, handle) in layer.markers.drain() {
        view.remove_marker(handle);
    }

    for entry in snapshot {
        let handle = view.add_marker(marker_for(entry));

        if let Some(previous) = layer.markers.insert(entry.id.clone(), handle) {
            view.remove_marker(previous);
        }
    }
}

fn marker_for(entry: &MarkerSnapshotEntry) -> Marker {
    Marker {
        position: entry.position,
        icon: entry.category.icon(),
        popup: entry.popup(),
        popup_open: false,
    }
}
