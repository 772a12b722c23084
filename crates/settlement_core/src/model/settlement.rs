//! Settlement record and administrative-region helpers.
//!
//! # Responsibility
//! - Define the canonical `Settlement` record shared by all stages.
//! - Derive the administrative region used as a partition key.
//!
//! # Invariants
//! - A leaf settlement lists itself as its only constituent.
//! - Constituent names are unique and keep first-seen order.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Geographic coordinate in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub lat: f64,
    pub lon: f64,
}

impl Coordinate {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }
}

/// One populated place, possibly standing for several merged census areas.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settlement {
    /// Display name, usually `"<place>, <region>"`.
    pub name: String,
    pub population: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lat: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lon: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grid_x: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grid_y: Option<f64>,
    /// Original census names folded into this record.
    #[serde(default)]
    pub constituent_settlements: Vec<String>,
}

impl Settlement {
    /// Creates a leaf settlement whose only constituent is itself.
    pub fn new(name: impl Into<String>, population: u64) -> Self {
        let name = name.into();
        Self {
            constituent_settlements: vec![name.clone()],
            name,
            population,
            lat: None,
            lon: None,
            grid_x: None,
            grid_y: None,
        }
    }

    /// Returns a copy placed at `coordinate`.
    pub fn located_at(mut self, coordinate: Coordinate) -> Self {
        self.lat = Some(coordinate.lat);
        self.lon = Some(coordinate.lon);
        self
    }

    /// Returns the coordinate when both components are present.
    pub fn coordinate(&self) -> Option<Coordinate> {
        match (self.lat, self.lon) {
            (Some(lat), Some(lon)) => Some(Coordinate::new(lat, lon)),
            _ => None,
        }
    }

    /// Administrative region parsed from the display name.
    pub fn admin_region(&self) -> &str {
        admin_region(&self.name)
    }

    /// Constituent names, falling back to the record's own name when empty.
    pub fn constituents_or_self(&self) -> Vec<String> {
        if self.constituent_settlements.is_empty() {
            vec![self.name.clone()]
        } else {
            self.constituent_settlements.clone()
        }
    }
}

/// Returns the trimmed text after the first comma, or `""` when there is none.
///
/// Settlements with different regions are never merged or clustered together.
pub fn admin_region(name: &str) -> &str {
    name.split_once(',')
        .map(|(_, region)| region.trim())
        .unwrap_or("")
}

/// Flattens member constituents, keeping first-seen order and dropping repeats.
pub fn flatten_constituents<'a>(members: impl IntoIterator<Item = &'a Settlement>) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut flattened = Vec::new();
    for member in members {
        for name in member.constituents_or_self() {
            if seen.insert(name.clone()) {
                flattened.push(name);
            }
        }
    }
    flattened
}

/// Exact population sum.
pub fn total_population<'a>(settlements: impl IntoIterator<Item = &'a Settlement>) -> u64 {
    settlements.into_iter().map(|s| s.population).sum()
}
