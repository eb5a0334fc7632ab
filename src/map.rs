//! Fixed geographic region shown by the map panel.
//!
//! The map is a read-only collaborator: nothing in the conversation session
//! feeds it. This module only describes what region the panel may show.

use crate::error::{KioskError, Result};
use serde::{Deserialize, Serialize};

/// A WGS84 coordinate in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatLng {
    pub lat: f64,
    pub lng: f64,
}

impl LatLng {
    pub const fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }
}

/// Axis-aligned bounding box given by its south-west and north-east corners.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatLngBounds {
    pub south_west: LatLng,
    pub north_east: LatLng,
}

impl LatLngBounds {
    pub const fn new(south_west: LatLng, north_east: LatLng) -> Self {
        Self {
            south_west,
            north_east,
        }
    }

    /// Whether `point` lies inside the box (edges inclusive).
    pub fn contains(&self, point: LatLng) -> bool {
        point.lat >= self.south_west.lat
            && point.lat <= self.north_east.lat
            && point.lng >= self.south_west.lng
            && point.lng <= self.north_east.lng
    }

    /// Pull `point` back inside the box along each axis.
    pub fn clamp(&self, point: LatLng) -> LatLng {
        LatLng {
            lat: point.lat.clamp(self.south_west.lat, self.north_east.lat),
            lng: point.lng.clamp(self.south_west.lng, self.north_east.lng),
        }
    }

    fn is_ordered(&self) -> bool {
        self.south_west.lat <= self.north_east.lat && self.south_west.lng <= self.north_east.lng
    }
}

/// Map panel region: initial view, zoom limits and the panning bounds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MapRegion {
    /// Initial center.
    pub center: LatLng,
    /// Initial zoom level.
    pub zoom: u8,
    pub min_zoom: u8,
    pub max_zoom: u8,
    /// Panning is restricted to this box.
    pub bounds: LatLngBounds,
    /// Tile URL template (`{s}`, `{z}`, `{x}`, `{y}` placeholders).
    pub tile_url: String,
    pub attribution: String,
}

impl Default for MapRegion {
    fn default() -> Self {
        // Penang, Malaysia.
        Self {
            center: LatLng::new(5.4141, 100.3288),
            zoom: 13,
            min_zoom: 11,
            max_zoom: 18,
            bounds: LatLngBounds::new(LatLng::new(5.2847, 100.1892), LatLng::new(5.4847, 100.3892)),
            tile_url: "https://{s}.tile.openstreetmap.org/{z}/{x}/{y}.png".to_owned(),
            attribution: "&copy; OpenStreetMap contributors".to_owned(),
        }
    }
}

impl MapRegion {
    /// Clamp a requested zoom level into `min_zoom..=max_zoom`.
    pub fn clamp_zoom(&self, zoom: u8) -> u8 {
        zoom.clamp(self.min_zoom, self.max_zoom)
    }

    /// Check that the region is self-consistent.
    ///
    /// # Errors
    ///
    /// Returns [`KioskError::Config`] when the bounds are inverted, the zoom
    /// range is empty, the initial zoom is outside it, or the center lies
    /// outside the bounds.
    pub fn validate(&self) -> Result<()> {
        if !self.bounds.is_ordered() {
            return Err(KioskError::Config("map bounds are inverted".into()));
        }
        if self.min_zoom > self.max_zoom {
            return Err(KioskError::Config(format!(
                "map min_zoom {} exceeds max_zoom {}",
                self.min_zoom, self.max_zoom
            )));
        }
        if self.clamp_zoom(self.zoom) != self.zoom {
            return Err(KioskError::Config(format!(
                "map zoom {} outside {}..={}",
                self.zoom, self.min_zoom, self.max_zoom
            )));
        }
        if !self.bounds.contains(self.center) {
            return Err(KioskError::Config("map center lies outside bounds".into()));
        }
        Ok(())
    }
}
