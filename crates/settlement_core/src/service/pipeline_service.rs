//! Checkpointed settlement pipeline.
//!
//! # Responsibility
//! - Drive the stages `cso_settlements → grouped_settlements → locations →
//!   processed_settlements → final_settlements → written` in order.
//! - Skip every stage whose checkpoint already exists.
//! - Halt when too many grouped settlements could not be located.
//!
//! # Invariants
//! - Stages only move forward; a failure leaves earlier checkpoints intact.
//! - `processed_settlements` is saved only once the unresolved-rate gate
//!   passes; while it exists no geocoder request is made.
//! - Checkpoints are cleared only after a successful write with an acceptable
//!   unresolved rate.
//! - Append mode never changes `total_ireland_population`.

use crate::cluster::{cluster_settlements, merge_cluster, ClusterError};
use crate::config::PipelineConfig;
use crate::export::{read_existing_dataset, write_dataset, write_unmatched, ExportError};
use crate::geo::transform::GridTransform;
use crate::geocode::{GeocodeCache, GeocodeResolver, Geocoder};
use crate::model::dataset::{
    DatasetMetadata, ProcessedSettlements, SettlementDataset, UnmatchedSettlement,
};
use crate::model::settlement::{total_population, Coordinate, Settlement};
use crate::normalize::{best_fuzzy_match, normalize_name};
use crate::population::{undistribute, PopulationError};
use crate::pregroup::pregroup_small_settlements;
use crate::repo::checkpoint_repo::{CheckpointStore, RepoError, Stage};
use crate::source::{CensusCsvSource, MissingSettlementsSource, SettlementSource, SourceError};
use log::{debug, info, warn};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::PathBuf;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Source(#[from] SourceError),
    #[error(transparent)]
    Checkpoint(#[from] RepoError),
    #[error(transparent)]
    Population(#[from] PopulationError),
    #[error(transparent)]
    Cluster(#[from] ClusterError),
    #[error(transparent)]
    Output(#[from] ExportError),
    #[error(
        "unresolved rate too high: {unresolved} of {total} settlements could not be located"
    )]
    HighUnresolvedRate { unresolved: usize, total: usize },
    #[error("no settlements could be matched with coordinates")]
    NoSettlementsMatched,
    #[error("append mode requires an existing dataset at `{}`", .0.display())]
    ExistingDatasetMissing(PathBuf),
    #[error("existing dataset is invalid: {0}")]
    InvalidDataset(String),
}

impl PipelineError {
    /// Whether re-running may pick up from the saved checkpoints.
    ///
    /// Missing inputs and unusable existing datasets need operator action first.
    pub fn is_resumable(&self) -> bool {
        !matches!(
            self,
            Self::Source(SourceError::InputMissing(_))
                | Self::Source(SourceError::MissingColumn(_))
                | Self::ExistingDatasetMissing(_)
                | Self::InvalidDataset(_)
        )
    }
}

pub type PipelineResult<T> = Result<T, PipelineError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    /// Build the dataset from the census CSV.
    Full,
    /// Add the settlements listed in the missing-settlements analysis to the
    /// existing dataset.
    Append,
}

/// Summary of a completed run.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineReport {
    pub run_id: Uuid,
    pub total_settlements: usize,
    pub total_population: u64,
    pub total_ireland_population: u64,
    pub unresolved: usize,
    pub failure_rate: f64,
}

/// `true` when `unresolved / total` is strictly above `threshold_bps` basis points.
pub fn exceeds_failure_threshold(unresolved: usize, total: usize, threshold_bps: u32) -> bool {
    unresolved as u128 * 10_000 > u128::from(threshold_bps) * total as u128
}

/// Joins grouped settlements with resolved coordinates.
///
/// Exact names win. With `fuzzy` set, a name missing from `locations` takes
/// the cached entry with the most similar normalized name above the match
/// threshold.
pub fn match_locations(
    grouped: &[Settlement],
    locations: &GeocodeCache,
    fuzzy: bool,
) -> ProcessedSettlements {
    let normalized: Vec<(String, Coordinate)> = if fuzzy {
        locations
            .iter()
            .map(|(name, coordinate)| (normalize_name(name), *coordinate))
            .collect()
    } else {
        Vec::new()
    };

    let mut processed = ProcessedSettlements::default();
    for settlement in grouped {
        let coordinate = locations.get(&settlement.name).copied().or_else(|| {
            if !fuzzy {
                return None;
            }
            let target = normalize_name(&settlement.name);
            let candidates = normalized.iter().map(|(name, c)| (name.as_str(), *c));
            best_fuzzy_match(&target, candidates).map(|(coordinate, ratio)| {
                debug!(
                    "event=fuzzy_match module=service status=ok name={:?} ratio={:.3}",
                    settlement.name, ratio
                );
                coordinate
            })
        });

        match coordinate {
            Some(coordinate) => {
                let mut located = settlement.clone().located_at(coordinate);
                located.constituent_settlements = settlement.constituents_or_self();
                processed.matched.push(located);
            }
            None => processed.unmatched.push(UnmatchedSettlement::from(settlement)),
        }
    }
    processed
}

/// Stage-by-stage settlement pipeline over an injected store and geocoder.
pub struct SettlementPipeline<'a, S: CheckpointStore, G: Geocoder> {
    store: &'a S,
    geocoder: &'a G,
    config: PipelineConfig,
    run_id: Uuid,
}

impl<'a, S: CheckpointStore, G: Geocoder> SettlementPipeline<'a, S, G> {
    pub fn new(store: &'a S, geocoder: &'a G, config: PipelineConfig) -> Self {
        Self {
            store,
            geocoder,
            config,
            run_id: Uuid::new_v4(),
        }
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Runs with the configured source: the census CSV, or the missing
    /// settlements analysis in append mode.
    pub fn run(&self, mode: RunMode) -> PipelineResult<PipelineReport> {
        match mode {
            RunMode::Full => {
                self.run_with_source(mode, &CensusCsvSource::new(self.config.census.clone()))
            }
            RunMode::Append => self.run_with_source(
                mode,
                &MissingSettlementsSource::new(self.config.missing_analysis_path.clone()),
            ),
        }
    }

    /// Runs every pending stage, reading leaf settlements from `source`.
    pub fn run_with_source<Src: SettlementSource>(
        &self,
        mode: RunMode,
        source: &Src,
    ) -> PipelineResult<PipelineReport> {
        info!(
            "event=pipeline_run module=service status=start run_id={} mode={:?}",
            self.run_id, mode
        );

        let existing = match mode {
            RunMode::Full => None,
            RunMode::Append => Some(self.prepare_append()?),
        };

        // cso_settlements
        let leaves = match mode {
            RunMode::Full => self.checkpointed(Stage::CsoSettlements, || {
                Ok(source.load_settlements()?)
            })?,
            RunMode::Append => source.load_settlements()?,
        };
        let total_ireland_population = match &existing {
            Some(dataset) => dataset.metadata.total_ireland_population,
            None => total_population(&leaves),
        };
        info!(
            "event=pipeline_input module=service status=ok run_id={} settlements={} population={}",
            self.run_id,
            leaves.len(),
            total_population(&leaves)
        );

        // grouped_settlements
        let grouped: Vec<Settlement> = self.checkpointed(Stage::GroupedSettlements, || {
            Ok(pregroup_small_settlements(
                leaves,
                self.config.min_population,
                self.config.max_settlements,
            )?)
        })?;

        // locations, processed_settlements
        let checkpointed_processed: Option<ProcessedSettlements> =
            self.store.load(Stage::ProcessedSettlements)?;
        let fresh = checkpointed_processed.is_none();
        let processed = match checkpointed_processed {
            Some(processed) => {
                info!(
                    "event=pipeline_stage module=service status=skipped run_id={} stage={}",
                    self.run_id,
                    Stage::ProcessedSettlements
                );
                processed
            }
            None => {
                let names: Vec<String> = grouped.iter().map(|s| s.name.clone()).collect();
                let resolver =
                    GeocodeResolver::new(self.store, self.geocoder, self.config.resolver_options());
                let locations = resolver.resolve(&names)?;
                match_locations(&grouped, &locations, self.config.fuzzy_match)
            }
        };
        let total = processed.attempted();
        let unresolved = processed.unmatched.len();
        if unresolved > 0 {
            write_unmatched(&self.config.unmatched_path, &processed.unmatched)?;
            warn!(
                "event=pipeline_unresolved module=service status=partial run_id={} unresolved={} total={}",
                self.run_id, unresolved, total
            );
        }
        if exceeds_failure_threshold(unresolved, total, self.config.failure_threshold_bps) {
            return Err(PipelineError::HighUnresolvedRate { unresolved, total });
        }
        if processed.matched.is_empty() {
            return Err(PipelineError::NoSettlementsMatched);
        }
        if fresh {
            self.store.save(Stage::ProcessedSettlements, &processed)?;
            info!(
                "event=pipeline_stage module=service status=ok run_id={} stage={}",
                self.run_id,
                Stage::ProcessedSettlements
            );
        }
        let failure_rate = if total == 0 {
            0.0
        } else {
            unresolved as f64 / total as f64
        };

        // final_settlements
        let dataset: SettlementDataset = self.checkpointed(Stage::FinalSettlements, || {
            let mut dataset = self.build_dataset(
                processed.matched.clone(),
                processed.unmatched_names(),
                failure_rate,
                total_ireland_population,
            )?;
            if let Some(existing) = existing.clone() {
                dataset = append_to_existing(existing, dataset)?;
            }
            Ok(dataset)
        })?;

        // written
        write_dataset(&self.config.output_path, &dataset)?;
        self.store.clear_all()?;

        info!(
            "event=pipeline_run module=service status=ok run_id={} settlements={} population={} ireland_population={}",
            self.run_id,
            dataset.metadata.total_settlements,
            dataset.metadata.total_population,
            dataset.metadata.total_ireland_population
        );
        Ok(PipelineReport {
            run_id: self.run_id,
            total_settlements: dataset.metadata.total_settlements,
            total_population: dataset.metadata.total_population,
            total_ireland_population: dataset.metadata.total_ireland_population,
            unresolved,
            failure_rate,
        })
    }

    /// Loads the dataset being extended and discards stale checkpoints.
    fn prepare_append(&self) -> PipelineResult<SettlementDataset> {
        let path = &self.config.output_path;
        let existing = match read_existing_dataset(path) {
            Ok(Some(dataset)) => dataset,
            Ok(None) => return Err(PipelineError::ExistingDatasetMissing(path.clone())),
            Err(ExportError::Json { source, .. }) => {
                return Err(PipelineError::InvalidDataset(source.to_string()))
            }
            Err(err) => return Err(err.into()),
        };
        let removed = self.store.clear_all()?;
        info!(
            "event=pipeline_append module=service status=ready run_id={} existing_settlements={} cleared_checkpoints={}",
            self.run_id,
            existing.settlements.len(),
            removed
        );
        Ok(existing)
    }

    /// Clusters located settlements and wraps them in a dataset.
    fn build_dataset(
        &self,
        matched: Vec<Settlement>,
        unmatched_settlements: Vec<String>,
        failure_rate: f64,
        total_ireland_population: u64,
    ) -> PipelineResult<SettlementDataset> {
        let transform = GridTransform::simulation();
        let clusters = cluster_settlements(matched, self.config.cluster_distance_km)?;
        let mut settlements = Vec::with_capacity(clusters.len());
        for cluster in &clusters {
            let mut merged = merge_cluster(cluster)?;
            if let Some(coordinate) = merged.coordinate() {
                let (x, y) = transform.to_grid(coordinate.lat, coordinate.lon);
                merged.grid_x = Some(x);
                merged.grid_y = Some(y);
            }
            settlements.push(merged);
        }

        let mut dataset = SettlementDataset {
            settlements,
            metadata: DatasetMetadata {
                total_population: 0,
                total_settlements: 0,
                total_ireland_population,
                grid_transform: transform,
                data_sources: self.config.data_sources.clone(),
                unmatched_settlements,
                failure_rate,
            },
        };
        dataset.refresh_totals();
        Ok(dataset)
    }

    /// Returns the checkpoint for `stage`, computing and saving it when absent.
    fn checkpointed<T, F>(&self, stage: Stage, compute: F) -> PipelineResult<T>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> PipelineResult<T>,
    {
        if let Some(value) = self.store.load(stage)? {
            info!(
                "event=pipeline_stage module=service status=skipped run_id={} stage={}",
                self.run_id, stage
            );
            return Ok(value);
        }
        let value = compute()?;
        self.store.save(stage, &value)?;
        info!(
            "event=pipeline_stage module=service status=ok run_id={} stage={}",
            self.run_id, stage
        );
        Ok(value)
    }
}

/// Folds a freshly built dataset into an existing one.
///
/// Population the old settlements absorbed for areas now present in their own
/// right is removed from them first, so the combined total matches the
/// nationwide figure again.
pub fn append_to_existing(
    mut existing: SettlementDataset,
    addition: SettlementDataset,
) -> PipelineResult<SettlementDataset> {
    let old_sum = total_population(&existing.settlements);
    let new_sum = total_population(&addition.settlements);
    let distributed = (old_sum + new_sum).saturating_sub(existing.metadata.total_ireland_population);
    if distributed > 0 {
        info!(
            "event=population_undistribute module=service status=start amount={} settlements={}",
            distributed,
            existing.settlements.len()
        );
        undistribute(&mut existing.settlements, distributed)?;
    }

    let mut unmatched = existing.metadata.unmatched_settlements;
    unmatched.extend(addition.metadata.unmatched_settlements);

    let mut settlements = existing.settlements;
    settlements.extend(addition.settlements);

    let mut combined = SettlementDataset {
        settlements,
        metadata: DatasetMetadata {
            total_population: 0,
            total_settlements: 0,
            total_ireland_population: existing.metadata.total_ireland_population,
            grid_transform: addition.metadata.grid_transform,
            data_sources: addition.metadata.data_sources,
            unmatched_settlements: unmatched,
            failure_rate: addition.metadata.failure_rate,
        },
    };
    combined.refresh_totals();
    Ok(combined)
}
