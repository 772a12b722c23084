//! Offline operations on a finished dataset.
//!
//! # Responsibility
//! - Report census areas that no dataset settlement accounts for.
//! - Project the dataset onto the simulation grid.

use crate::export::{
    read_dataset, to_simulation, write_json_atomic, write_simulation, SimulationExport,
};
use crate::service::pipeline_service::PipelineResult;
use crate::source::{CensusCsvConfig, CensusCsvSource, MissingSettlementsAnalysis};
use log::info;
use std::path::Path;

/// Compares the census CSV with `dataset_path` and writes the analysis to `output_path`.
pub fn analyze_missing_settlements(
    census: &CensusCsvConfig,
    dataset_path: &Path,
    output_path: &Path,
) -> PipelineResult<MissingSettlementsAnalysis> {
    let dataset = read_dataset(dataset_path)?;
    let rows = CensusCsvSource::new(census.clone()).read_rows()?;
    let analysis = MissingSettlementsAnalysis::compute(&dataset, &rows);
    write_json_atomic(output_path, &analysis)?;
    info!(
        "event=missing_analysis_write module=service status=ok missing={} percentage={:.1} path={}",
        analysis.metadata.total_missing,
        analysis.metadata.percentage_missing,
        output_path.display()
    );
    Ok(analysis)
}

/// Reads `dataset_path` and writes its simulation projection to `output_path`.
pub fn export_simulation(
    dataset_path: &Path,
    output_path: &Path,
) -> PipelineResult<SimulationExport> {
    let dataset = read_dataset(dataset_path)?;
    let export = to_simulation(&dataset)?;
    write_simulation(output_path, &export)?;
    Ok(export)
}
