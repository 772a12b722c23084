use settlement_core::model::dataset::{DataSources, DatasetMetadata};
use settlement_core::geo::transform::GridTransform;
use settlement_core::service::dataset_service::analyze_missing_settlements;
use settlement_core::source::{
    CensusCsvConfig, CensusCsvSource, MissingSettlementsAnalysis, MissingSettlementsSource,
    SettlementSource, SourceError,
};
use settlement_core::export::write_dataset;
use settlement_core::{Settlement, SettlementDataset};
use std::path::Path;

const CENSUS_CSV: &str = "\u{feff}STATISTIC,Statistic Label,Electoral Divisions,UNIT,VALUE\n\
F1011C01,Population,\"Alpha, Cork\",Number,1200\n\
F1011C02,Males,\"Alpha, Cork\",Number,600\n\
F1011C01,Population,\"Beta, Cork\",Number,\n\
F1011C01,Population,\"Gamma, Cork\",Number,n/a\n\
F1011C01,Population,\"Delta, Kerry\",Number,2.5\n\
F1011C01,Population,Ireland,Number,40\n";

fn census_at(path: &Path) -> CensusCsvConfig {
    CensusCsvConfig {
        path: path.to_path_buf(),
        ..CensusCsvConfig::default()
    }
}

#[test]
fn census_rows_are_filtered_and_malformed_values_skipped() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("Population.csv");
    std::fs::write(&path, CENSUS_CSV).unwrap();

    let settlements = CensusCsvSource::new(census_at(&path))
        .load_settlements()
        .unwrap();

    let summary: Vec<(&str, u64)> = settlements
        .iter()
        .map(|s| (s.name.as_str(), s.population))
        .collect();
    assert_eq!(
        summary,
        vec![("Alpha, Cork", 1200), ("Delta, Kerry", 2), ("Ireland", 40)]
    );
    assert_eq!(settlements[0].constituent_settlements, vec!["Alpha, Cork"]);
}

#[test]
fn missing_census_file_is_an_input_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("absent.csv");

    let err = CensusCsvSource::new(census_at(&path))
        .load_settlements()
        .unwrap_err();
    assert!(matches!(err, SourceError::InputMissing(p) if p == path));
}

#[test]
fn missing_column_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("Population.csv");
    std::fs::write(&path, "STATISTIC,Electoral Divisions,COUNT\nF1011C01,\"Alpha, Cork\",1\n").unwrap();

    let err = CensusCsvSource::new(census_at(&path)).read_rows().unwrap_err();
    assert!(matches!(err, SourceError::MissingColumn(column) if column == "VALUE"));
}

#[test]
fn census_without_rows_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("Population.csv");
    std::fs::write(&path, "STATISTIC,Electoral Divisions,VALUE\n").unwrap();

    let err = CensusCsvSource::new(census_at(&path)).read_rows().unwrap_err();
    assert!(matches!(err, SourceError::Empty(_)));
}

fn dataset_covering(constituents: &[&str]) -> SettlementDataset {
    let mut settlement = Settlement::new(constituents[0], 3000);
    settlement.constituent_settlements = constituents.iter().map(|c| c.to_string()).collect();
    let mut dataset = SettlementDataset {
        settlements: vec![settlement],
        metadata: DatasetMetadata {
            total_population: 0,
            total_settlements: 0,
            total_ireland_population: 3000,
            grid_transform: GridTransform::simulation(),
            data_sources: DataSources::default(),
            unmatched_settlements: Vec::new(),
            failure_rate: 0.0,
        },
    };
    dataset.refresh_totals();
    dataset
}

#[test]
fn missing_analysis_groups_uncovered_areas_by_region() {
    let dataset = dataset_covering(&["Alpha, Cork", "Beta, Cork"]);
    let rows = vec![
        ("Alpha, Cork".to_string(), 1000),
        ("Beta, Cork".to_string(), 2000),
        ("Gamma, Cork".to_string(), 300),
        ("Ireland".to_string(), 40),
    ];

    let analysis = MissingSettlementsAnalysis::compute(&dataset, &rows);

    assert_eq!(analysis.missing_settlements.len(), 2);
    assert_eq!(analysis.missing_settlements["Gamma, Cork"], 300);
    assert_eq!(analysis.missing_by_region["Cork"][0].name, "Gamma, Cork");
    assert_eq!(analysis.missing_by_region["Unknown"][0].population, 40);
    assert_eq!(analysis.metadata.total_missing_population, 340);
    assert_eq!(analysis.metadata.total_settlements_csv, 4);
    assert_eq!(analysis.metadata.total_settlements_json, 2);
    assert!((analysis.metadata.percentage_missing - 50.0).abs() < 1e-9);
}

#[test]
fn analysis_file_feeds_append_source() {
    let dir = tempfile::tempdir().unwrap();
    let csv_path = dir.path().join("Population.csv");
    std::fs::write(&csv_path, CENSUS_CSV).unwrap();
    let dataset_path = dir.path().join("settlements.json");
    write_dataset(&dataset_path, &dataset_covering(&["Alpha, Cork"])).unwrap();
    let analysis_path = dir.path().join("missing_settlements_analysis.json");

    let analysis =
        analyze_missing_settlements(&census_at(&csv_path), &dataset_path, &analysis_path).unwrap();
    assert_eq!(analysis.metadata.total_missing, 2);

    let missing = MissingSettlementsSource::new(&analysis_path)
        .load_settlements()
        .unwrap();
    let names: Vec<&str> = missing.iter().map(|s| s.name.as_str()).collect();
    assert_eq!(names, vec!["Delta, Kerry", "Ireland"]);
    assert_eq!(missing[0].population, 2);
}

#[test]
fn missing_analysis_file_is_an_input_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = MissingSettlementsSource::new(dir.path().join("none.json"))
        .load_settlements()
        .unwrap_err();
    assert!(matches!(err, SourceError::InputMissing(_)));
}
