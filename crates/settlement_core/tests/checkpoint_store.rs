use settlement_core::db::{open_db, open_db_in_memory};
use settlement_core::geocode::GeocodeCache;
use settlement_core::{
    CheckpointStore, Coordinate, InMemoryCheckpointStore, RepoError, Settlement,
    SqliteCheckpointStore, Stage,
};

#[test]
fn sqlite_store_persists_across_connections() {
    let dir = tempfile::tempdir().unwrap();
    let grouped = vec![
        Settlement::new("Alpha, Cork", 1200),
        Settlement::new("Beta, Kerry", 3400),
    ];

    {
        let conn = open_db(dir.path()).unwrap();
        let store = SqliteCheckpointStore::new(&conn);
        store.save(Stage::GroupedSettlements, &grouped).unwrap();
    }

    let conn = open_db(dir.path()).unwrap();
    let store = SqliteCheckpointStore::new(&conn);
    let loaded: Vec<Settlement> = store.load(Stage::GroupedSettlements).unwrap().unwrap();
    assert_eq!(loaded, grouped);
    assert_eq!(store.saved_stages().unwrap(), vec![Stage::GroupedSettlements]);
}

#[test]
fn save_replaces_previous_payload() {
    let conn = open_db_in_memory().unwrap();
    let store = SqliteCheckpointStore::new(&conn);

    let mut cache = GeocodeCache::new();
    cache.insert("Alpha, Cork".to_string(), Coordinate::new(51.9, -8.5));
    store.save(Stage::Locations, &cache).unwrap();
    cache.insert("Beta, Kerry".to_string(), Coordinate::new(52.1, -9.6));
    store.save(Stage::Locations, &cache).unwrap();

    let loaded: GeocodeCache = store.load(Stage::Locations).unwrap().unwrap();
    assert_eq!(loaded.len(), 2);
    let rows: i64 = conn
        .query_row("SELECT COUNT(*) FROM checkpoints;", [], |row| row.get(0))
        .unwrap();
    assert_eq!(rows, 1);
}

#[test]
fn clear_all_removes_every_stage() {
    let conn = open_db_in_memory().unwrap();
    let sqlite = SqliteCheckpointStore::new(&conn);
    let memory = InMemoryCheckpointStore::new();

    for store in [&sqlite as &dyn ClearCheck, &memory as &dyn ClearCheck] {
        store.fill();
        assert_eq!(store.clear(), 3);
        assert!(store.is_empty());
    }
}

#[test]
fn undecodable_payload_is_reported() {
    let store = InMemoryCheckpointStore::new();
    store.save_payload(Stage::CsoSettlements, "{not json").unwrap();

    let err = store
        .load::<Vec<Settlement>>(Stage::CsoSettlements)
        .unwrap_err();
    assert!(matches!(
        err,
        RepoError::Serialization {
            stage: Stage::CsoSettlements,
            ..
        }
    ));
}

#[test]
fn missing_stage_loads_as_none() {
    let store = InMemoryCheckpointStore::new();
    let loaded: Option<Vec<Settlement>> = store.load(Stage::FinalSettlements).unwrap();
    assert!(loaded.is_none());
}

trait ClearCheck {
    fn fill(&self);
    fn clear(&self) -> usize;
    fn is_empty(&self) -> bool;
}

impl<S: CheckpointStore> ClearCheck for S {
    fn fill(&self) {
        for stage in [Stage::CsoSettlements, Stage::Locations, Stage::FinalSettlements] {
            self.save_payload(stage, "[]").unwrap();
        }
    }

    fn clear(&self) -> usize {
        self.clear_all().unwrap()
    }

    fn is_empty(&self) -> bool {
        self.saved_stages().unwrap().is_empty()
    }
}
