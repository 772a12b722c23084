//! Settlement sources: the census CSV and the missing-settlements analysis.
//!
//! # Responsibility
//! - Read census population rows into leaf settlements.
//! - Compare a finished dataset with the census to find omitted areas.
//! - Load those omitted areas back as input for an append run.
//!
//! # Invariants
//! - Only rows with the configured statistic code are read.
//! - Rows with an empty or unparseable population are skipped, not fatal.
//! - A missing input file is reported before anything is written.

use crate::model::dataset::SettlementDataset;
use crate::model::settlement::{admin_region, Settlement};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fs::File;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("input file `{}` not found", .0.display())]
    InputMissing(PathBuf),
    #[error("failed to read `{}`: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed CSV input: {0}")]
    Csv(#[from] csv::Error),
    #[error("required column `{0}` missing from census header")]
    MissingColumn(String),
    #[error("malformed JSON in `{}`: {source}", .path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("no settlement rows found in `{}`", .0.display())]
    Empty(PathBuf),
}

/// Produces the leaf settlements that seed a pipeline run.
pub trait SettlementSource {
    fn load_settlements(&self) -> Result<Vec<Settlement>, SourceError>;
}

impl SettlementSource for Vec<Settlement> {
    fn load_settlements(&self) -> Result<Vec<Settlement>, SourceError> {
        Ok(self.clone())
    }
}

/// Census CSV location and column layout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CensusCsvConfig {
    pub path: PathBuf,
    pub statistic_column: String,
    pub statistic_code: String,
    pub name_column: String,
    pub value_column: String,
}

impl Default for CensusCsvConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("Population.csv"),
            statistic_column: "STATISTIC".to_string(),
            statistic_code: "F1011C01".to_string(),
            name_column: "Electoral Divisions".to_string(),
            value_column: "VALUE".to_string(),
        }
    }
}

/// Census population table read from CSV.
#[derive(Debug, Clone)]
pub struct CensusCsvSource {
    config: CensusCsvConfig,
}

impl CensusCsvSource {
    pub fn new(config: CensusCsvConfig) -> Self {
        Self { config }
    }

    /// Reads `(name, population)` rows in file order, duplicates included.
    pub fn read_rows(&self) -> Result<Vec<(String, u64)>, SourceError> {
        let path = &self.config.path;
        let file = open_input(path)?;
        let mut reader = csv::ReaderBuilder::new().flexible(true).from_reader(file);

        let headers = reader.headers()?.clone();
        let column = |wanted: &str| -> Result<usize, SourceError> {
            headers
                .iter()
                .position(|h| h.trim_start_matches('\u{feff}').trim() == wanted)
                .ok_or_else(|| SourceError::MissingColumn(wanted.to_string()))
        };
        let statistic_idx = column(&self.config.statistic_column)?;
        let name_idx = column(&self.config.name_column)?;
        let value_idx = column(&self.config.value_column)?;

        let mut rows = Vec::new();
        let mut skipped = 0usize;
        for record in reader.records() {
            let record = record?;
            if record.get(statistic_idx).map(str::trim) != Some(self.config.statistic_code.as_str()) {
                continue;
            }
            let name = record.get(name_idx).unwrap_or("").trim();
            let value = record.get(value_idx).unwrap_or("").trim();
            if value.is_empty() {
                continue;
            }
            match parse_population(value) {
                Some(population) => rows.push((name.to_string(), population)),
                None => {
                    skipped += 1;
                    debug!("event=census_row module=source status=skipped name={name:?} value={value:?}");
                }
            }
        }

        if rows.is_empty() {
            return Err(SourceError::Empty(path.clone()));
        }
        info!(
            "event=census_read module=source status=ok rows={} skipped={} path={}",
            rows.len(),
            skipped,
            path.display()
        );
        Ok(rows)
    }
}

impl SettlementSource for CensusCsvSource {
    fn load_settlements(&self) -> Result<Vec<Settlement>, SourceError> {
        Ok(self
            .read_rows()?
            .into_iter()
            .map(|(name, population)| Settlement::new(name, population))
            .collect())
    }
}

/// Parses a census value, rounding half to even. Negative or non-finite values are rejected.
pub fn parse_population(value: &str) -> Option<u64> {
    let parsed: f64 = value.trim().parse().ok()?;
    if !parsed.is_finite() || parsed < 0.0 {
        return None;
    }
    Some(parsed.round_ties_even() as u64)
}

/// One omitted area listed under its region.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MissingEntry {
    pub name: String,
    pub population: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MissingAnalysisMetadata {
    pub total_missing: usize,
    pub total_missing_population: u64,
    pub total_settlements_csv: usize,
    pub total_settlements_json: usize,
    pub percentage_missing: f64,
}

/// Census areas absent from every constituent list of a dataset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MissingSettlementsAnalysis {
    pub missing_settlements: BTreeMap<String, u64>,
    pub missing_by_region: BTreeMap<String, Vec<MissingEntry>>,
    pub metadata: MissingAnalysisMetadata,
}

/// Region label used when a census name carries no region suffix.
const UNKNOWN_REGION: &str = "Unknown";

impl MissingSettlementsAnalysis {
    /// Compares census rows (later duplicates win) with dataset constituents.
    pub fn compute(dataset: &SettlementDataset, census_rows: &[(String, u64)]) -> Self {
        let covered: HashSet<&str> = dataset
            .settlements
            .iter()
            .flat_map(|s| s.constituent_settlements.iter().map(String::as_str))
            .collect();
        let census: BTreeMap<&str, u64> = census_rows
            .iter()
            .map(|(name, population)| (name.as_str(), *population))
            .collect();

        let mut missing_settlements = BTreeMap::new();
        let mut missing_by_region: BTreeMap<String, Vec<MissingEntry>> = BTreeMap::new();
        for (&name, &population) in &census {
            if covered.contains(name) {
                continue;
            }
            missing_settlements.insert(name.to_string(), population);
            let region = match admin_region(name) {
                "" => UNKNOWN_REGION,
                region => region,
            };
            missing_by_region
                .entry(region.to_string())
                .or_default()
                .push(MissingEntry {
                    name: name.to_string(),
                    population,
                });
        }

        let total_missing_population: u64 = missing_settlements.values().sum();
        let percentage_missing = if census.is_empty() {
            0.0
        } else {
            missing_settlements.len() as f64 / census.len() as f64 * 100.0
        };
        let metadata = MissingAnalysisMetadata {
            total_missing: missing_settlements.len(),
            total_missing_population,
            total_settlements_csv: census.len(),
            total_settlements_json: covered.len(),
            percentage_missing,
        };
        info!(
            "event=missing_analysis module=source status=ok missing={} population={}",
            metadata.total_missing, metadata.total_missing_population
        );

        Self {
            missing_settlements,
            missing_by_region,
            metadata,
        }
    }
}

/// Reads the `missing_settlements` map of an analysis file as append-mode input.
#[derive(Debug, Clone)]
pub struct MissingSettlementsSource {
    path: PathBuf,
}

impl MissingSettlementsSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl SettlementSource for MissingSettlementsSource {
    fn load_settlements(&self) -> Result<Vec<Settlement>, SourceError> {
        let file = open_input(&self.path)?;
        let analysis: MissingSettlementsAnalysis =
            serde_json::from_reader(std::io::BufReader::new(file)).map_err(|source| {
                SourceError::Json {
                    path: self.path.clone(),
                    source,
                }
            })?;
        Ok(analysis
            .missing_settlements
            .into_iter()
            .map(|(name, population)| Settlement::new(name, population))
            .collect())
    }
}

fn open_input(path: &Path) -> Result<File, SourceError> {
    File::open(path).map_err(|source| {
        if source.kind() == std::io::ErrorKind::NotFound {
            SourceError::InputMissing(path.to_path_buf())
        } else {
            SourceError::Io {
                path: path.to_path_buf(),
                source,
            }
        }
    })
}
