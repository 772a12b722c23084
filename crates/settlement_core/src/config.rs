//! Pipeline run configuration.

use crate::cluster::DEFAULT_CLUSTER_DISTANCE_KM;
use crate::geo::transform::IRELAND_BBOX;
use crate::geocode::ResolverOptions;
use crate::model::dataset::DataSources;
use crate::source::CensusCsvConfig;
use std::path::PathBuf;
use std::time::Duration;

/// Unresolved rate above which a run halts: 1000 bps = 10%.
pub const DEFAULT_FAILURE_THRESHOLD_BPS: u32 = 1000;

/// Tunables and file locations for one pipeline run.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineConfig {
    /// Floor a pregrouped settlement must reach.
    pub min_population: u64,
    /// Pregrouping only runs above this many census areas.
    pub max_settlements: usize,
    pub cluster_distance_km: f64,
    pub batch_size: usize,
    pub request_delay: Duration,
    pub batch_delay: Duration,
    /// Halting threshold for the unresolved rate, in basis points.
    pub failure_threshold_bps: u32,
    /// Match names missing from the geocode cache by similarity.
    pub fuzzy_match: bool,
    pub country_bias: String,
    pub output_path: PathBuf,
    pub unmatched_path: PathBuf,
    pub missing_analysis_path: PathBuf,
    pub census: CensusCsvConfig,
    pub data_sources: DataSources,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            min_population: 1000,
            max_settlements: 1000,
            cluster_distance_km: DEFAULT_CLUSTER_DISTANCE_KM,
            batch_size: 50,
            request_delay: Duration::from_millis(100),
            batch_delay: Duration::from_secs(1),
            failure_threshold_bps: DEFAULT_FAILURE_THRESHOLD_BPS,
            fuzzy_match: true,
            country_bias: "Ireland".to_string(),
            output_path: PathBuf::from("../mapData/sourceData/settlements.json"),
            unmatched_path: PathBuf::from("unmatched_settlements.json"),
            missing_analysis_path: PathBuf::from("missing_settlements_analysis.json"),
            census: CensusCsvConfig::default(),
            data_sources: DataSources::default(),
        }
    }
}

impl PipelineConfig {
    /// Resolver options derived from the batching and bias settings.
    pub fn resolver_options(&self) -> ResolverOptions {
        ResolverOptions {
            batch_size: self.batch_size,
            request_delay: self.request_delay,
            batch_delay: self.batch_delay,
            country_bias: self.country_bias.clone(),
            location_bias: IRELAND_BBOX,
            ..ResolverOptions::default()
        }
    }

    /// Disables request and batch pauses.
    pub fn without_delays(mut self) -> Self {
        self.request_delay = Duration::ZERO;
        self.batch_delay = Duration::ZERO;
        self
    }
}
