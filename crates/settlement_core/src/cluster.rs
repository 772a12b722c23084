//! Distance-based clustering of geocoded settlements and cluster merging.
//!
//! # Responsibility
//! - Partition located settlements into same-region clusters whose members
//!   chain together within a distance threshold.
//! - Collapse each cluster into one representative settlement.
//!
//! # Invariants
//! - Clustering is a single pass seeded in descending population order; a
//!   member added during a scan only anchors candidates later in that scan.
//! - A cluster never spans two administrative regions.
//! - Merged population is the exact sum of member populations.

use crate::geo::distance::haversine_km;
use crate::model::settlement::{flatten_constituents, Coordinate, Settlement};
use log::info;
use thiserror::Error;

/// Default clustering radius in kilometres.
pub const DEFAULT_CLUSTER_DISTANCE_KM: f64 = 30.0;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClusterError {
    #[error("cannot merge an empty cluster")]
    EmptyCluster,
    #[error("settlement `{0}` has no coordinates")]
    MissingCoordinates(String),
}

/// Partitions `settlements` into clusters reachable within `max_distance_km`.
///
/// Every input must carry coordinates. Clusters are returned in seed order and
/// members in the order they joined.
pub fn cluster_settlements(
    settlements: Vec<Settlement>,
    max_distance_km: f64,
) -> Result<Vec<Vec<Settlement>>, ClusterError> {
    let mut located: Vec<(Coordinate, Settlement)> = settlements
        .into_iter()
        .map(|s| match s.coordinate() {
            Some(coordinate) => Ok((coordinate, s)),
            None => Err(ClusterError::MissingCoordinates(s.name)),
        })
        .collect::<Result<_, _>>()?;
    located.sort_by(|a, b| b.1.population.cmp(&a.1.population));

    let mut used = vec![false; located.len()];
    let mut clusters: Vec<Vec<usize>> = Vec::new();

    for seed in 0..located.len() {
        if used[seed] {
            continue;
        }
        used[seed] = true;
        let region = located[seed].1.admin_region();
        let mut members = vec![seed];

        for candidate in 0..located.len() {
            if used[candidate] || located[candidate].1.admin_region() != region {
                continue;
            }
            let point = located[candidate].0;
            let reachable = members
                .iter()
                .any(|&member| haversine_km(located[member].0, point) <= max_distance_km);
            if reachable {
                members.push(candidate);
                used[candidate] = true;
            }
        }
        clusters.push(members);
    }

    let mut slots: Vec<Option<Settlement>> = located.into_iter().map(|(_, s)| Some(s)).collect();
    let clusters: Vec<Vec<Settlement>> = clusters
        .into_iter()
        .map(|members| {
            members
                .into_iter()
                .filter_map(|index| slots[index].take())
                .collect()
        })
        .collect();

    info!(
        "event=cluster module=cluster status=ok clusters={} max_distance_km={}",
        clusters.len(),
        max_distance_km
    );
    Ok(clusters)
}

/// Collapses a cluster into one settlement.
///
/// Population is summed, the coordinate is the population-weighted centroid,
/// the name comes from the (first) most populous member and constituents are
/// flattened without repeats.
pub fn merge_cluster(members: &[Settlement]) -> Result<Settlement, ClusterError> {
    let mut largest: Option<&Settlement> = None;
    for member in members {
        if largest.map_or(true, |best| member.population > best.population) {
            largest = Some(member);
        }
    }
    let largest = largest.ok_or(ClusterError::EmptyCluster)?;

    let mut points = Vec::with_capacity(members.len());
    for member in members {
        let coordinate = member
            .coordinate()
            .ok_or_else(|| ClusterError::MissingCoordinates(member.name.clone()))?;
        points.push((coordinate, member.population));
    }

    let population: u64 = members.iter().map(|m| m.population).sum();
    let centroid = if population == 0 {
        let n = points.len() as f64;
        Coordinate::new(
            points.iter().map(|(c, _)| c.lat).sum::<f64>() / n,
            points.iter().map(|(c, _)| c.lon).sum::<f64>() / n,
        )
    } else {
        let weight = population as f64;
        Coordinate::new(
            points.iter().map(|(c, p)| c.lat * *p as f64).sum::<f64>() / weight,
            points.iter().map(|(c, p)| c.lon * *p as f64).sum::<f64>() / weight,
        )
    };

    let mut merged = Settlement::new(largest.name.clone(), population).located_at(centroid);
    merged.constituent_settlements = flatten_constituents(members);
    Ok(merged)
}
