//! Geocoding boundary and checkpointed batch resolution.
//!
//! # Responsibility
//! - Define the request/response contract with an external geocoder.
//! - Resolve settlement names in batches, persisting progress per batch.
//!
//! # Invariants
//! - A per-name geocoder failure never aborts a batch.
//! - The geocode cache only grows; resolved names are never re-queried.

use crate::geo::transform::BoundingBox;
use crate::model::settlement::Coordinate;
use std::collections::BTreeMap;
use thiserror::Error;

pub mod google;
pub mod resolver;

pub use google::GooglePlacesGeocoder;
pub use resolver::{GeocodeResolver, ResolverOptions};

/// Resolved coordinates keyed by settlement display name.
pub type GeocodeCache = BTreeMap<String, Coordinate>;

#[derive(Debug, Error)]
pub enum GeocodeError {
    #[error("{0} environment variable not set")]
    MissingApiKey(&'static str),
    #[error("geocoder request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("geocoder returned HTTP {status}: {body}")]
    Status { status: u16, body: String },
    #[error("geocoder response could not be decoded: {0}")]
    Decode(String),
}

/// One text-search request.
#[derive(Debug, Clone, PartialEq)]
pub struct GeocodeQuery {
    /// Canonicalized search text, including the country bias term.
    pub text: String,
    /// Rectangle the provider should prefer results from.
    pub location_bias: BoundingBox,
    pub language_code: String,
    pub region_code: String,
}

/// Text-search geocoder. `Ok(None)` means the provider returned no candidate.
pub trait Geocoder {
    fn geocode(&self, query: &GeocodeQuery) -> Result<Option<Coordinate>, GeocodeError>;
}
