//! Random problem instances: city sets and permutation populations.

use super::city::City;
use rand::seq::SliceRandom;
use rand::Rng;

/// Side length of the square random cities are drawn from.
pub const COORDINATE_RANGE: f32 = 100.0;

/// Generates `n` cities with ids `1..=n`, uniform in `[0, 100)²`.
pub fn random_cities<R: Rng>(n: usize, rng: &mut R) -> Vec<City> {
    (1..=n as u32)
        .map(|id| {
            City::new(
                id,
                rng.random_range(0.0..COORDINATE_RANGE),
                rng.random_range(0.0..COORDINATE_RANGE),
            )
        })
        .collect()
}

/// Generates `count` random permutations of the city ids `1..=num_cities`.
pub fn random_population<R: Rng>(count: usize, num_cities: usize, rng: &mut R) -> Vec<Vec<u32>> {
    let ids: Vec<u32> = (1..=num_cities as u32).collect();
    (0..count)
        .map(|_| {
            let mut tour = ids.clone();
            tour.shuffle(rng);
            tour
        })
        .collect()
}
