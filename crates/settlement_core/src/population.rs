//! Exact proportional population adjustment.
//!
//! # Responsibility
//! - Spread a signed population difference across settlements in proportion
//!   to their current population.
//!
//! # Invariants
//! - The adjusted sum differs from the original by exactly `delta`.
//! - Results do not depend on input order: remainder ties are broken by
//!   larger population, then name, then position.
//! - A removal never drives any settlement below zero.

use crate::model::settlement::{total_population, Settlement};
use log::info;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PopulationError {
    #[error("cannot distribute {delta} people across an empty settlement list")]
    NoRecipients { delta: i64 },
    #[error("cannot remove {requested} people from settlements holding only {available}")]
    InsufficientPopulation { requested: u64, available: u64 },
}

/// Adds (positive `delta`) or removes (negative `delta`) people proportionally.
///
/// Uses the largest-remainder method, so the residual is always zero.
pub fn redistribute(settlements: &mut [Settlement], delta: i64) -> Result<(), PopulationError> {
    if delta == 0 {
        return Ok(());
    }
    if settlements.is_empty() {
        return Err(PopulationError::NoRecipients { delta });
    }

    let amount = delta.unsigned_abs();
    let available = total_population(settlements.iter());
    if delta < 0 && amount > available {
        return Err(PopulationError::InsufficientPopulation {
            requested: amount,
            available,
        });
    }

    let shares = largest_remainder_shares(settlements, amount);
    for (settlement, share) in settlements.iter_mut().zip(shares) {
        if delta > 0 {
            settlement.population += share;
        } else {
            settlement.population -= share;
        }
    }

    info!(
        "event=population_redistribute module=population status=ok delta={} recipients={}",
        delta,
        settlements.len()
    );
    Ok(())
}

/// Signed difference `target - current`, saturating at the `i64` bounds.
pub fn population_delta(target: u64, current: u64) -> i64 {
    let difference = i128::from(target) - i128::from(current);
    i64::try_from(difference).unwrap_or(if difference > 0 { i64::MAX } else { i64::MIN })
}

/// Removes exactly `amount` people previously spread over `settlements`.
pub fn undistribute(settlements: &mut [Settlement], amount: u64) -> Result<(), PopulationError> {
    let delta = i64::try_from(amount).map_err(|_| PopulationError::InsufficientPopulation {
        requested: amount,
        available: total_population(settlements.iter()),
    })?;
    redistribute(settlements, -delta)
}

/// Integer shares of `amount` weighted by population, summing to `amount`.
fn largest_remainder_shares(settlements: &[Settlement], amount: u64) -> Vec<u64> {
    let total: u128 = settlements.iter().map(|s| u128::from(s.population)).sum();
    // An all-zero set still receives people, evenly.
    let weight = |s: &Settlement| -> u128 {
        if total == 0 {
            1
        } else {
            u128::from(s.population)
        }
    };
    let total_weight = if total == 0 {
        settlements.len() as u128
    } else {
        total
    };

    let amount = u128::from(amount);
    let mut shares = Vec::with_capacity(settlements.len());
    let mut remainders = Vec::with_capacity(settlements.len());
    for settlement in settlements {
        let scaled = amount * weight(settlement);
        shares.push(scaled / total_weight);
        remainders.push(scaled % total_weight);
    }

    let assigned: u128 = shares.iter().sum();
    let leftover = (amount - assigned) as usize;

    let mut order: Vec<usize> = (0..settlements.len()).collect();
    order.sort_by(|&a, &b| {
        remainders[b]
            .cmp(&remainders[a])
            .then_with(|| settlements[b].population.cmp(&settlements[a].population))
            .then_with(|| settlements[a].name.cmp(&settlements[b].name))
    });
    for &index in order.iter().take(leftover) {
        shares[index] += 1;
    }

    // Each share is at most `amount`, which fits in u64.
    shares.into_iter().map(|share| share as u64).collect()
}

#[cfg(test)]
mod tests {
    use super::{redistribute, undistribute, PopulationError};
    use crate::model::settlement::{total_population, Settlement};

    fn settlements(pops: &[u64]) -> Vec<Settlement> {
        pops.iter()
            .enumerate()
            .map(|(i, p)| Settlement::new(format!("S{i}, R"), *p))
            .collect()
    }

    #[test]
    fn redistribute_adds_exact_delta() {
        let mut list = settlements(&[1, 1, 1]);
        redistribute(&mut list, 2).unwrap();
        assert_eq!(total_population(&list), 5);
        // Equal remainders fall back to name order.
        assert_eq!(list.iter().map(|s| s.population).collect::<Vec<_>>(), vec![2, 2, 1]);
    }

    #[test]
    fn redistribute_is_proportional() {
        let mut list = settlements(&[3000, 1000]);
        redistribute(&mut list, 400).unwrap();
        assert_eq!(list[0].population, 3300);
        assert_eq!(list[1].population, 1100);
    }

    #[test]
    fn result_is_independent_of_input_order() {
        let mut forward = settlements(&[7, 5, 3]);
        let mut reversed: Vec<Settlement> = forward.iter().rev().cloned().collect();
        redistribute(&mut forward, 4).unwrap();
        redistribute(&mut reversed, 4).unwrap();
        for settlement in &forward {
            let twin = reversed.iter().find(|s| s.name == settlement.name).unwrap();
            assert_eq!(twin.population, settlement.population);
        }
    }

    #[test]
    fn undistribute_removes_exact_amount_without_underflow() {
        let mut list = settlements(&[10, 1, 0, 989]);
        undistribute(&mut list, 999).unwrap();
        assert_eq!(total_population(&list), 1);
    }

    #[test]
    fn undistribute_rejects_more_than_available() {
        let mut list = settlements(&[10]);
        let err = undistribute(&mut list, 11).unwrap_err();
        assert_eq!(
            err,
            PopulationError::InsufficientPopulation {
                requested: 11,
                available: 10
            }
        );
    }

    #[test]
    fn zero_population_set_receives_even_shares() {
        let mut list = settlements(&[0, 0]);
        redistribute(&mut list, 3).unwrap();
        assert_eq!(total_population(&list), 3);
    }

    #[test]
    fn empty_set_cannot_absorb_a_difference() {
        let mut list: Vec<Settlement> = Vec::new();
        assert!(redistribute(&mut list, 0).is_ok());
        assert_eq!(
            redistribute(&mut list, 5),
            Err(PopulationError::NoRecipients { delta: 5 })
        );
    }
}
