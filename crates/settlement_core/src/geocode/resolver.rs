//! Checkpointed batch geocode resolution.
//!
//! # Invariants
//! - Names already in the `locations` checkpoint are never sent again.
//! - The checkpoint is rewritten after every batch, so an interrupt loses at
//!   most one batch of work.
//! - Unresolved names are not retried within the same run.

use super::{GeocodeCache, GeocodeQuery, Geocoder};
use crate::geo::transform::{BoundingBox, IRELAND_BBOX};
use crate::normalize::clean_search_name;
use crate::repo::checkpoint_repo::{CheckpointStore, RepoResult, Stage};
use log::{debug, info, warn};
use std::collections::HashSet;
use std::time::Duration;

/// Batching, pacing and query-shaping options.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolverOptions {
    pub batch_size: usize,
    /// Pause after every request.
    pub request_delay: Duration,
    /// Pause after every batch.
    pub batch_delay: Duration,
    /// Appended to each query as `", <country>"`; empty disables it.
    pub country_bias: String,
    pub location_bias: BoundingBox,
    pub language_code: String,
    pub region_code: String,
}

impl Default for ResolverOptions {
    fn default() -> Self {
        Self {
            batch_size: 50,
            request_delay: Duration::from_millis(100),
            batch_delay: Duration::from_secs(1),
            country_bias: "Ireland".to_string(),
            location_bias: IRELAND_BBOX,
            language_code: "en".to_string(),
            region_code: "IE".to_string(),
        }
    }
}

impl ResolverOptions {
    /// Builds the provider query for one settlement name.
    pub fn query_for(&self, name: &str) -> GeocodeQuery {
        let cleaned = clean_search_name(name);
        let text = if self.country_bias.is_empty() {
            cleaned
        } else {
            format!("{cleaned}, {}", self.country_bias)
        };
        GeocodeQuery {
            text,
            location_bias: self.location_bias,
            language_code: self.language_code.clone(),
            region_code: self.region_code.clone(),
        }
    }
}

/// Resolves names through a geocoder, memoized in the `locations` checkpoint.
pub struct GeocodeResolver<'a, S: CheckpointStore, G: Geocoder> {
    store: &'a S,
    geocoder: &'a G,
    options: ResolverOptions,
}

impl<'a, S: CheckpointStore, G: Geocoder> GeocodeResolver<'a, S, G> {
    pub fn new(store: &'a S, geocoder: &'a G, options: ResolverOptions) -> Self {
        Self {
            store,
            geocoder,
            options,
        }
    }

    /// Returns the cache after resolving every name not already present.
    ///
    /// The returned map may contain entries for names outside `names` left by
    /// earlier runs.
    pub fn resolve(&self, names: &[String]) -> RepoResult<GeocodeCache> {
        let mut cache: GeocodeCache = self.store.load(Stage::Locations)?.unwrap_or_default();

        let mut seen = HashSet::new();
        let pending: Vec<&String> = names
            .iter()
            .filter(|name| !cache.contains_key(name.as_str()) && seen.insert(name.as_str()))
            .collect();

        if pending.is_empty() {
            info!(
                "event=geocode_resolve module=geocode status=cached names={}",
                names.len()
            );
            return Ok(cache);
        }

        let batch_size = self.options.batch_size.max(1);
        let total_batches = pending.len().div_ceil(batch_size);
        info!(
            "event=geocode_resolve module=geocode status=start pending={} batches={} batch_size={}",
            pending.len(),
            total_batches,
            batch_size
        );

        for (batch_index, batch) in pending.chunks(batch_size).enumerate() {
            let mut matched = 0usize;
            for name in batch {
                if self.resolve_one(name, &mut cache) {
                    matched += 1;
                }
                pause(self.options.request_delay);
            }

            self.store.save(Stage::Locations, &cache)?;
            info!(
                "event=geocode_batch module=geocode status=ok batch={}/{} matched={} unmatched={}",
                batch_index + 1,
                total_batches,
                matched,
                batch.len() - matched
            );
            pause(self.options.batch_delay);
        }

        let unresolved = names
            .iter()
            .filter(|name| !cache.contains_key(name.as_str()))
            .count();
        info!(
            "event=geocode_resolve module=geocode status=ok requested={} resolved={} unresolved={}",
            names.len(),
            names.len() - unresolved,
            unresolved
        );
        Ok(cache)
    }

    /// Queries one name; returns whether it was resolved.
    fn resolve_one(&self, name: &str, cache: &mut GeocodeCache) -> bool {
        let query = self.options.query_for(name);
        debug!(
            "event=geocode_request module=geocode status=start query={:?}",
            query.text
        );
        match self.geocoder.geocode(&query) {
            Ok(Some(coordinate)) => {
                cache.insert(name.to_string(), coordinate);
                true
            }
            Ok(None) => {
                debug!("event=geocode_request module=geocode status=no_match name={name:?}");
                false
            }
            Err(err) => {
                warn!(
                    "event=geocode_request module=geocode status=error name={:?} error={}",
                    name, err
                );
                false
            }
        }
    }
}

fn pause(delay: Duration) {
    if !delay.is_zero() {
        std::thread::sleep(delay);
    }
}
