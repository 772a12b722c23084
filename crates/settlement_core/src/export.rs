//! JSON outputs: the settlement dataset, the unmatched side file and the
//! simulation export.
//!
//! # Invariants
//! - Files are written to a sibling temp file and renamed into place, so a
//!   crash never leaves a truncated output.

use crate::geo::transform::{GridTransform, SIMULATION_GRID_SIZE};
use crate::model::dataset::{SettlementDataset, UnmatchedSettlement};
use crate::normalize::simulation_display_name;
use log::info;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Average demand per person in kW.
pub const KW_PER_PERSON: f64 = 1.67;

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("`{}` not found", .0.display())]
    NotFound(PathBuf),
    #[error("I/O error on `{}`: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid JSON in `{}`: {source}", .path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("settlement `{0}` has no coordinates")]
    MissingCoordinates(String),
}

pub fn read_dataset(path: &Path) -> Result<SettlementDataset, ExportError> {
    read_json(path)
}

/// Reads the dataset, or `None` if the file does not exist.
pub fn read_existing_dataset(path: &Path) -> Result<Option<SettlementDataset>, ExportError> {
    match read_json(path) {
        Ok(dataset) => Ok(Some(dataset)),
        Err(ExportError::NotFound(_)) => Ok(None),
        Err(err) => Err(err),
    }
}

pub fn write_dataset(path: &Path, dataset: &SettlementDataset) -> Result<(), ExportError> {
    write_json_atomic(path, dataset)?;
    info!(
        "event=dataset_write module=export status=ok settlements={} population={} path={}",
        dataset.metadata.total_settlements,
        dataset.metadata.total_population,
        path.display()
    );
    Ok(())
}

/// Writes the list of grouped settlements that could not be geocoded.
pub fn write_unmatched(path: &Path, unmatched: &[UnmatchedSettlement]) -> Result<(), ExportError> {
    write_json_atomic(path, &unmatched)?;
    info!(
        "event=unmatched_write module=export status=ok count={} path={}",
        unmatched.len(),
        path.display()
    );
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GridPoint {
    pub x: f64,
    pub y: f64,
}

/// Settlement as consumed by the simulation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationSettlement {
    pub name: String,
    pub coordinate: GridPoint,
    pub population: u64,
    /// Demand in MW.
    pub power_usage: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CoordinateSystem {
    pub min_x: f64,
    pub max_x: f64,
    pub min_y: f64,
    pub max_y: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationMetadata {
    pub total_settlements: usize,
    pub total_population: u64,
    pub total_power_usage: f64,
    pub coordinate_system: CoordinateSystem,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationExport {
    pub settlements: Vec<SimulationSettlement>,
    pub metadata: SimulationMetadata,
}

/// Demand in MW for a population.
pub fn power_usage_mw(population: u64) -> f64 {
    population as f64 * KW_PER_PERSON / 1000.0
}

/// Projects a dataset into the simulation format, largest settlement first.
pub fn to_simulation(dataset: &SettlementDataset) -> Result<SimulationExport, ExportError> {
    let transform = GridTransform::simulation();
    let mut settlements = Vec::with_capacity(dataset.settlements.len());
    for settlement in &dataset.settlements {
        let coordinate = settlement
            .coordinate()
            .ok_or_else(|| ExportError::MissingCoordinates(settlement.name.clone()))?;
        let (x, y) = transform.to_grid(coordinate.lat, coordinate.lon);
        settlements.push(SimulationSettlement {
            name: simulation_display_name(&settlement.name),
            coordinate: GridPoint { x, y },
            population: settlement.population,
            power_usage: power_usage_mw(settlement.population),
        });
    }
    settlements.sort_by(|a, b| b.population.cmp(&a.population));

    let metadata = SimulationMetadata {
        total_settlements: settlements.len(),
        total_population: settlements.iter().map(|s| s.population).sum(),
        total_power_usage: settlements.iter().map(|s| s.power_usage).sum(),
        coordinate_system: CoordinateSystem {
            min_x: 0.0,
            max_x: SIMULATION_GRID_SIZE,
            min_y: 0.0,
            max_y: SIMULATION_GRID_SIZE,
        },
    };
    Ok(SimulationExport {
        settlements,
        metadata,
    })
}

pub fn write_simulation(path: &Path, export: &SimulationExport) -> Result<(), ExportError> {
    write_json_atomic(path, export)?;
    info!(
        "event=simulation_write module=export status=ok settlements={} power_mw={:.1} path={}",
        export.metadata.total_settlements,
        export.metadata.total_power_usage,
        path.display()
    );
    Ok(())
}

pub(crate) fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, ExportError> {
    let file = std::fs::File::open(path).map_err(|source| {
        if source.kind() == std::io::ErrorKind::NotFound {
            ExportError::NotFound(path.to_path_buf())
        } else {
            ExportError::Io {
                path: path.to_path_buf(),
                source,
            }
        }
    })?;
    serde_json::from_reader(BufReader::new(file)).map_err(|source| ExportError::Json {
        path: path.to_path_buf(),
        source,
    })
}

/// Pretty-prints `value` to `path` via temp file and rename; creates parent dirs.
pub(crate) fn write_json_atomic<T: Serialize + ?Sized>(
    path: &Path,
    value: &T,
) -> Result<(), ExportError> {
    let io_err = |source: std::io::Error| ExportError::Io {
        path: path.to_path_buf(),
        source,
    };
    let parent = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
        _ => PathBuf::from("."),
    };
    std::fs::create_dir_all(&parent).map_err(io_err)?;

    let temp = tempfile::NamedTempFile::new_in(&parent).map_err(io_err)?;
    let mut writer = BufWriter::new(temp);
    serde_json::to_writer_pretty(&mut writer, value).map_err(|source| ExportError::Json {
        path: path.to_path_buf(),
        source,
    })?;
    writer.flush().map_err(io_err)?;
    let temp = writer.into_inner().map_err(|err| io_err(err.into_error()))?;
    temp.persist(path).map_err(|err| io_err(err.error))?;
    Ok(())
}
