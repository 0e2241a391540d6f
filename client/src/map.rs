//! # Map View
//!
//! Rendering surface for markers.
//!
//! The reconciler only talks to a [`MapView`]. A browser build would back it with the
//! tile map widget; [`MemoryMap`] keeps everything in memory so the client can run
//! headless and tests can inspect exactly what is on screen.
//!
//! ## Icons
//! - Users: blue dot image, 32x32 anchored at the bottom center
//! - Alerts: red dot image, same geometry
//! - Police: 🚓 glyph, 30x30
//! - Hospital: 🏥 glyph, 30x30
//! - Own position: default pin
use std::collections::BTreeMap;

use crate::models::LatLng;

pub const DEFAULT_CENTER: LatLng = LatLng::new(17.385044, 78.486671);
pub const DEFAULT_ZOOM: u8 = 13;
pub const POSITION_ZOOM: u8 = 14;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Icon {
    User,
    Alert,
    Police,
    Hospital,
    Pin,
}

impl Icon {
    pub fn image_url(&self) -> Option<&'static str> {
        match self {
            Icon::User => Some("https://maps.google.com/mapfiles/ms/icons/blue-dot.png"),
            Icon::Alert => Some("https://maps.google.com/mapfiles/ms/icons/red-dot.png"),
            _ => None,
        }
    }

    pub fn glyph(&self) -> Option<&'static str> {
        match self {
            Icon::Police => Some("🚓"),
            Icon::Hospital => Some("🏥"),
            _ => None,
        }
    }

    pub fn size(&self) -> (u16, u16) {
        match self {
            Icon::User | Icon::Alert => (32, 32),
            Icon::Police | Icon::Hospital => (30, 30),
            Icon::Pin => (25, 41),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Marker {
    pub position: LatLng,
    pub icon: Icon,
    pub popup: String,
    pub popup_open: bool,
}

/// Ownership of one rendered marker. Not `Clone`: whoever holds it is the only one
/// allowed to move or remove the marker.
#[derive(Debug, PartialEq, Eq, Hash)]
pub struct MarkerHandle(u64);

impl MarkerHandle {
    pub fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub fn raw(&self) -> u64 {
        self.0
    }
}

pub trait MapView {
    fn add_marker(&mut self, marker: Marker) -> MarkerHandle;

    /// Moves in place. The popup and its open state are kept.
    fn move_marker(&mut self, handle: &MarkerHandle, position: LatLng);

    fn remove_marker(&mut self, handle: MarkerHandle);

    fn set_view(&mut self, center: LatLng, zoom: u8);
}

pub struct MemoryMap {
    markers: BTreeMap<u64, Marker>,
    next_handle: u64,
    center: LatLng,
    zoom: u8,
    created: usize,
    removed: usize,
}

impl MemoryMap {
    pub fn new() -> Self {
        Self {
            markers: BTreeMap::new(),
            next_handle: 0,
            center: DEFAULT_CENTER,
            zoom: DEFAULT_ZOOM,
            created: 0,
            removed: 0,
        }
    }

    pub fn get(&self, handle: &MarkerHandle) -> Option<&Marker> {
        self.markers.get(&handle.0)
    }

    pub fn markers(&self) -> impl Iterator<Item = &Marker> {
        self.markers.values()
    }

    pub fn len(&self) -> usize {
        self.markers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.markers.is_empty()
    }

    pub fn center(&self) -> (LatLng, u8) {
        (self.center, self.zoom)
    }

    /// Markers ever created and removed, for checking reuse versus recreation.
    pub fn churn(&self) -> (usize, usize) {
        (self.created, self.removed)
    }
}

impl Default for MemoryMap {
    fn default() -> Self {
        Self::new()
    }
}

impl MapView for MemoryMap {
    fn add_marker(&mut self, marker: Marker) -> MarkerHandle {
        let raw = self.next_handle;
        self.next_handle += 1;
        self.created += 1;

        self.markers.insert(raw, marker);
        MarkerHandle(raw)
    }

    fn move_marker(&mut self, handle: &MarkerHandle, position: LatLng) {
        if let Some(marker) = self.markers.get_mut(&handle.0) {
            marker.position = position;
        }
    }

    fn remove_marker(&mut self, handle: MarkerHandle) {
        if self.markers.remove(&handle.0).is_some() {
            self.removed += 1;
        }
    }

    fn set_view(&mut self, center: LatLng, zoom: u8) {
        self.center = center;
        self.zoom = zoom;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn marker(lat: f64) -> Marker {
        Marker {
            position: LatLng::new(lat, 0.0),
            icon: Icon::User,
            popup: "popup".to_string(),
            popup_open: true,
        }
    }

    #[test]
    fn test_move_keeps_popup_state() {
        let mut map = MemoryMap::new();
        let handle = map.add_marker(marker(1.0));

        map.move_marker(&handle, LatLng::new(5.0, 6.0));

        let moved = map.get(&handle).unwrap();
        assert_eq!(moved.position, LatLng::new(5.0, 6.0));
        assert!(moved.popup_open);
        assert_eq!(map.churn(), (1, 0));
    }

    #[test]
    fn test_remove_frees_marker() {
        let mut map = MemoryMap::new();
        let first = map.add_marker(marker(1.0));
        let second = map.add_marker(marker(2.0));
        assert_ne!(first, second);

        map.remove_marker(first);

        assert_eq!(map.len(), 1);
        assert_eq!(map.churn(), (2, 1));
    }

    #[test]
    fn test_icons() {
        assert_eq!(Icon::Police.glyph(), Some("🚓"));
        assert_eq!(Icon::Hospital.glyph(), Some("🏥"));
        assert!(Icon::User.image_url().unwrap().ends_with("blue-dot.png"));
        assert!(Icon::Alert.image_url().unwrap().ends_with("red-dot.png"));
        assert_eq!(Icon::Alert.size(), (32, 32));
    }

    #[test]
    fn test_default_view() {
        let mut map = MemoryMap::new();
        assert_eq!(map.center(), (DEFAULT_CENTER, DEFAULT_ZOOM));

        map.set_view(LatLng::new(1.0, 2.0), POSITION_ZOOM);
        assert_eq!(map.center(), (LatLng::new(1.0, 2.0), 14));
    }
}
