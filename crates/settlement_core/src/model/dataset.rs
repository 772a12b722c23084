//! Persisted dataset envelope (`settlements.json`) and stage payloads.

use crate::geo::transform::GridTransform;
use crate::model::settlement::{total_population, Settlement};
use serde::{Deserialize, Serialize};

/// Provenance labels written into dataset metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataSources {
    pub population: String,
    pub coordinates: String,
}

impl Default for DataSources {
    fn default() -> Self {
        Self {
            population: "CSO Ireland Census 2022".to_string(),
            coordinates: "Google Maps".to_string(),
        }
    }
}

/// Dataset-level totals and provenance.
///
/// `total_ireland_population` is the nationwide figure from the census and
/// stays fixed across appends; `total_population` is the sum of the
/// settlements actually present.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetMetadata {
    pub total_population: u64,
    pub total_settlements: usize,
    pub total_ireland_population: u64,
    pub grid_transform: GridTransform,
    pub data_sources: DataSources,
    pub unmatched_settlements: Vec<String>,
    pub failure_rate: f64,
}

/// Simulation-ready settlement set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SettlementDataset {
    pub settlements: Vec<Settlement>,
    pub metadata: DatasetMetadata,
}

impl SettlementDataset {
    /// Recomputes `total_population` and `total_settlements` from the records.
    pub fn refresh_totals(&mut self) {
        self.metadata.total_population = total_population(&self.settlements);
        self.metadata.total_settlements = self.settlements.len();
    }
}

/// A grouped settlement the geocoder could not place.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnmatchedSettlement {
    pub name: String,
    pub population: u64,
    pub constituent_settlements: Vec<String>,
}

impl From<&Settlement> for UnmatchedSettlement {
    fn from(value: &Settlement) -> Self {
        Self {
            name: value.name.clone(),
            population: value.population,
            constituent_settlements: value.constituents_or_self(),
        }
    }
}

/// Output of the processing stage: located settlements plus the leftovers.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ProcessedSettlements {
    pub matched: Vec<Settlement>,
    pub unmatched: Vec<UnmatchedSettlement>,
}

impl ProcessedSettlements {
    /// Number of grouped settlements that went through the processing stage.
    pub fn attempted(&self) -> usize {
        self.matched.len() + self.unmatched.len()
    }

    pub fn unmatched_names(&self) -> Vec<String> {
        self.unmatched.iter().map(|s| s.name.clone()).collect()
    }
}
