use settlement_core::geocode::{
    GeocodeError, GeocodeQuery, GeocodeResolver, Geocoder, ResolverOptions,
};
use settlement_core::{CheckpointStore, Coordinate, InMemoryCheckpointStore, RepoResult, Stage};
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::time::Duration;

/// Answers from a fixed table keyed by the cleaned name, counting requests.
struct TableGeocoder {
    places: HashMap<String, Coordinate>,
    failing: Vec<String>,
    requests: Cell<usize>,
    queries: RefCell<Vec<String>>,
}

impl TableGeocoder {
    fn new(places: &[(&str, f64, f64)]) -> Self {
        Self {
            places: places
                .iter()
                .map(|(name, lat, lon)| (name.to_string(), Coordinate::new(*lat, *lon)))
                .collect(),
            failing: Vec::new(),
            requests: Cell::new(0),
            queries: RefCell::new(Vec::new()),
        }
    }
}

impl Geocoder for TableGeocoder {
    fn geocode(&self, query: &GeocodeQuery) -> Result<Option<Coordinate>, GeocodeError> {
        self.requests.set(self.requests.get() + 1);
        self.queries.borrow_mut().push(query.text.clone());
        let key = query.text.trim_end_matches(", Ireland");
        if self.failing.iter().any(|name| name == key) {
            return Err(GeocodeError::Status {
                status: 503,
                body: "unavailable".to_string(),
            });
        }
        Ok(self.places.get(key).copied())
    }
}

/// In-memory store that counts saves per stage.
#[derive(Default)]
struct RecordingStore {
    inner: InMemoryCheckpointStore,
    saves: RefCell<Vec<Stage>>,
}

impl CheckpointStore for RecordingStore {
    fn load_payload(&self, stage: Stage) -> RepoResult<Option<String>> {
        self.inner.load_payload(stage)
    }

    fn save_payload(&self, stage: Stage, payload: &str) -> RepoResult<()> {
        self.saves.borrow_mut().push(stage);
        self.inner.save_payload(stage, payload)
    }

    fn clear_all(&self) -> RepoResult<usize> {
        self.inner.clear_all()
    }

    fn saved_stages(&self) -> RepoResult<Vec<Stage>> {
        self.inner.saved_stages()
    }
}

fn options(batch_size: usize) -> ResolverOptions {
    ResolverOptions {
        batch_size,
        request_delay: Duration::ZERO,
        batch_delay: Duration::ZERO,
        ..ResolverOptions::default()
    }
}

fn names(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| v.to_string()).collect()
}

#[test]
fn second_resolve_issues_no_requests() {
    let store = InMemoryCheckpointStore::new();
    let geocoder = TableGeocoder::new(&[("Alpha, Cork", 51.9, -8.47), ("Beta, Kerry", 52.06, -9.5)]);
    let resolver = GeocodeResolver::new(&store, &geocoder, options(50));
    let wanted = names(&["Alpha, Cork", "Beta, Kerry"]);

    let first = resolver.resolve(&wanted).unwrap();
    assert_eq!(geocoder.requests.get(), 2);

    let second = resolver.resolve(&wanted).unwrap();
    assert_eq!(geocoder.requests.get(), 2);
    assert_eq!(first, second);
    assert_eq!(second["Alpha, Cork"], Coordinate::new(51.9, -8.47));
}

#[test]
fn checkpoint_is_saved_after_every_batch() {
    let store = RecordingStore::default();
    let geocoder = TableGeocoder::new(&[
        ("A, Cork", 51.9, -8.4),
        ("B, Cork", 51.8, -8.3),
        ("C, Cork", 51.7, -8.2),
        ("D, Cork", 51.6, -8.1),
        ("E, Cork", 51.5, -8.0),
    ]);
    let resolver = GeocodeResolver::new(&store, &geocoder, options(2));

    resolver
        .resolve(&names(&["A, Cork", "B, Cork", "C, Cork", "D, Cork", "E, Cork"]))
        .unwrap();

    assert_eq!(*store.saves.borrow(), vec![Stage::Locations; 3]);
}

#[test]
fn resume_only_queries_uncached_names() {
    let store = InMemoryCheckpointStore::new();
    let geocoder = TableGeocoder::new(&[("A, Cork", 51.9, -8.4), ("B, Cork", 51.8, -8.3)]);
    GeocodeResolver::new(&store, &geocoder, options(1))
        .resolve(&names(&["A, Cork"]))
        .unwrap();

    let resumed = TableGeocoder::new(&[("A, Cork", 0.0, 0.0), ("B, Cork", 51.8, -8.3)]);
    let cache = GeocodeResolver::new(&store, &resumed, options(1))
        .resolve(&names(&["A, Cork", "B, Cork"]))
        .unwrap();

    assert_eq!(resumed.requests.get(), 1);
    assert_eq!(cache["A, Cork"], Coordinate::new(51.9, -8.4));
}

#[test]
fn provider_errors_and_misses_are_soft() {
    let store = InMemoryCheckpointStore::new();
    let mut geocoder = TableGeocoder::new(&[("A, Cork", 51.9, -8.4), ("B, Cork", 51.8, -8.3)]);
    geocoder.failing.push("A, Cork".to_string());
    let resolver = GeocodeResolver::new(&store, &geocoder, options(50));

    let cache = resolver
        .resolve(&names(&["A, Cork", "B, Cork", "Ghost, Mayo", "B, Cork"]))
        .unwrap();

    assert_eq!(geocoder.requests.get(), 3);
    assert!(!cache.contains_key("A, Cork"));
    assert!(!cache.contains_key("Ghost, Mayo"));
    assert!(cache.contains_key("B, Cork"));
}

#[test]
fn queries_are_cleaned_and_biased() {
    let store = InMemoryCheckpointStore::new();
    let geocoder = TableGeocoder::new(&[]);
    GeocodeResolver::new(&store, &geocoder, options(50))
        .resolve(&names(&["Clonmel Rural, Tipperary", "Ballyfermot-Drumfinn (East), Dublin"]))
        .unwrap();

    assert_eq!(
        *geocoder.queries.borrow(),
        vec![
            "Clonmel, Tipperary, Ireland".to_string(),
            "Ballyfermot-Drumfinn, Dublin, Ireland".to_string()
        ]
    );
}
