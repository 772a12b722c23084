//! Population pregrouping of small census areas.
//!
//! # Responsibility
//! - Reduce the settlement count by merging sub-floor areas within a region.
//!
//! # Invariants
//! - Output count never exceeds input count.
//! - Settlements at or above the floor pass through unchanged.
//! - Groups never span two administrative regions.
//! - Total population is identical before and after.

use crate::model::settlement::{flatten_constituents, total_population, Settlement};
use crate::population::{population_delta, redistribute, PopulationError};
use log::{debug, info};
use std::collections::HashMap;

/// Groups settlements below `min_population` until each group reaches it.
///
/// When the input already has at most `max_settlements` entries it is returned
/// as-is. Otherwise sub-floor settlements are partitioned by region and, in
/// descending population order, greedily accumulated into groups.
pub fn pregroup_small_settlements(
    settlements: Vec<Settlement>,
    min_population: u64,
    max_settlements: usize,
) -> Result<Vec<Settlement>, PopulationError> {
    let initial_population = total_population(&settlements);
    let initial_count = settlements.len();

    if initial_count <= max_settlements {
        info!(
            "event=pregroup module=pregroup status=skipped settlements={} max_settlements={}",
            initial_count, max_settlements
        );
        return Ok(settlements);
    }

    let mut by_population = settlements;
    by_population.sort_by(|a, b| b.population.cmp(&a.population));

    let (mut result, remaining): (Vec<_>, Vec<_>) = by_population
        .into_iter()
        .partition(|s| s.population >= min_population);
    debug!(
        "event=pregroup_partition module=pregroup above_floor={} below_floor={} min_population={}",
        result.len(),
        remaining.len(),
        min_population
    );

    for (region, members) in group_by_region(remaining) {
        let before = result.len();
        accumulate_region(members, min_population, &mut result);
        debug!(
            "event=pregroup_region module=pregroup region={:?} groups={}",
            region,
            result.len() - before
        );
    }

    let final_population = total_population(&result);
    if final_population != initial_population {
        let delta = population_delta(initial_population, final_population);
        info!(
            "event=pregroup_reconcile module=pregroup status=start delta={}",
            delta
        );
        redistribute(&mut result, delta)?;
    }

    info!(
        "event=pregroup module=pregroup status=ok input={} output={} population={}",
        initial_count,
        result.len(),
        total_population(&result)
    );
    Ok(result)
}

/// Merges members (sorted descending) into floor-satisfying groups.
fn accumulate_region(members: Vec<Settlement>, min_population: u64, out: &mut Vec<Settlement>) {
    let mut pending = members.into_iter();
    while let Some(first) = pending.next() {
        let mut group_population = first.population;
        let mut group = vec![first];
        while group_population < min_population {
            match pending.next() {
                Some(next) => {
                    group_population += next.population;
                    group.push(next);
                }
                None => break,
            }
        }
        out.push(merge_group(group, group_population));
    }
}

/// Collapses a pregroup into one record named after its largest member.
fn merge_group(mut group: Vec<Settlement>, population: u64) -> Settlement {
    if group.len() == 1 {
        return group.remove(0);
    }
    // Members arrive in descending order, so the first is the largest.
    let mut merged = Settlement::new(group[0].name.clone(), population);
    merged.constituent_settlements = flatten_constituents(&group);
    merged
}

/// Partitions by region, keeping regions in first-seen order.
fn group_by_region(settlements: Vec<Settlement>) -> Vec<(String, Vec<Settlement>)> {
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut regions: Vec<(String, Vec<Settlement>)> = Vec::new();
    for settlement in settlements {
        let region = settlement.admin_region().to_string();
        match index.get(&region) {
            Some(&slot) => regions[slot].1.push(settlement),
            None => {
                index.insert(region.clone(), regions.len());
                regions.push((region, vec![settlement]));
            }
        }
    }
    regions
}

#[cfg(test)]
mod tests {
    use super::{group_by_region, pregroup_small_settlements};
    use crate::model::settlement::Settlement;

    #[test]
    fn group_by_region_keeps_first_seen_order() {
        let regions = group_by_region(vec![
            Settlement::new("A, Kerry", 1),
            Settlement::new("B, Cork", 1),
            Settlement::new("C, Kerry", 1),
            Settlement::new("D", 1),
        ]);
        let keys: Vec<&str> = regions.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(keys, vec!["Kerry", "Cork", ""]);
        assert_eq!(regions[0].1.len(), 2);
    }

    #[test]
    fn tail_group_below_floor_is_still_emitted() {
        let input = vec![
            Settlement::new("A, R", 600),
            Settlement::new("B, R", 500),
            Settlement::new("C, R", 100),
        ];
        let output = pregroup_small_settlements(input, 1000, 0).unwrap();
        assert_eq!(output.len(), 2);
        assert_eq!(output[0].population, 1100);
        assert_eq!(output[1].name, "C, R");
        assert_eq!(output[1].population, 100);
    }
}
