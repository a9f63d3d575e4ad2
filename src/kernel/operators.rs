//! Tour operators as executed by one kernel worker.
//!
//! Every function works on a cyclic tour window: `n + 1` genes where the
//! last repeats the first. Operators only rearrange the first `n` genes
//! and then restore the trailing duplicate, so a permutation stays a
//! permutation.
//!
//! # Operators
//!
//! - [`order_crossover`] (OX): Davis (1985), preserves relative order
//! - [`swap_mutation`]: exchange two random positions
//!
//! Both avoid scratch allocations (membership is a scan of the copied
//! segment) so they translate one-to-one into the WGSL kernel.

use super::rng::WorkerRng;
use crate::tour::Point;

/// Length of a cyclic tour: the sum of distances between consecutive genes.
///
/// `cities` is the device city table, indexed by gene value.
pub fn tour_length(cities: &[Point], tour: &[u32]) -> f32 {
    tour.windows(2)
        .map(|w| cities[w[0] as usize].distance(&cities[w[1] as usize]))
        .sum()
}

/// Order crossover into `child`.
///
/// Copies a random segment `[start, end]` from `template`, then fills the
/// remaining positions with the genes of `donor` in their cyclic order,
/// starting after `end` and skipping genes already in the segment.
///
/// All three slices are cyclic windows of the same length.
pub fn order_crossover(template: &[u32], donor: &[u32], child: &mut [u32], rng: &mut WorkerRng) {
    let n = template.len() - 1;
    debug_assert_eq!(donor.len(), n + 1);
    debug_assert_eq!(child.len(), n + 1);

    let (start, end) = random_segment(n, rng);
    let segment = &template[start..=end];
    child[start..=end].copy_from_slice(segment);

    let mut pos = (end + 1) % n;
    for offset in 0..n {
        let gene = donor[(end + 1 + offset) % n];
        if !segment.contains(&gene) {
            child[pos] = gene;
            pos = (pos + 1) % n;
        }
    }
    child[n] = child[0];
}

/// Swap mutation: exchange two random positions.
pub fn swap_mutation(tour: &mut [u32], rng: &mut WorkerRng) {
    let n = tour.len() - 1;
    if n < 2 {
        return;
    }
    let i = rng.below(n as u32) as usize;
    let j = rng.below(n as u32) as usize;
    tour.swap(i, j);
    tour[n] = tour[0];
}

/// Pick a random segment `[start, end]` within `0..n` where `start <= end`.
fn random_segment(n: usize, rng: &mut WorkerRng) -> (usize, usize) {
    let a = rng.below(n as u32) as usize;
    let b = rng.below(n as u32) as usize;
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}
