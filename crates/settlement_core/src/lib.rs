//! Core library for building the settlement dataset.
//! Census ingest, pregrouping, geocoding, clustering and checkpointed orchestration.

pub mod cluster;
pub mod config;
pub mod db;
pub mod export;
pub mod geo;
pub mod geocode;
pub mod logging;
pub mod model;
pub mod normalize;
pub mod population;
pub mod pregroup;
pub mod repo;
pub mod service;
pub mod source;

pub use config::PipelineConfig;
pub use geocode::{GeocodeError, Geocoder, GooglePlacesGeocoder};
pub use logging::{default_log_level, init_cli_logging, init_logging, logging_status};
pub use model::dataset::{SettlementDataset, UnmatchedSettlement};
pub use model::settlement::{Coordinate, Settlement};
pub use repo::checkpoint_repo::{
    CheckpointStore, InMemoryCheckpointStore, RepoError, RepoResult, SqliteCheckpointStore, Stage,
};
pub use service::pipeline_service::{
    PipelineError, PipelineReport, PipelineResult, RunMode, SettlementPipeline,
};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
