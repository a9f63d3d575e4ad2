//! Flat cyclic encoding of a population of tours.
//!
//! All chromosomes share one contiguous `u32` buffer. Individual `i`
//! occupies `genes[i * stride..(i + 1) * stride]` where
//! `stride = num_cities + 1`; the last gene of every window repeats the
//! first so a worker can walk consecutive pairs without wrapping.

use super::city::CityTable;
use crate::error::{Result, TspGaError};

/// A population flattened into one buffer of cyclic tours.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedPopulation {
    genes: Vec<u32>,
    num_cities: usize,
    population_size: usize,
}

impl EncodedPopulation {
    /// Encodes `chromosomes` without checking their contents.
    ///
    /// # Errors
    /// - [`TspGaError::EmptyPopulation`] if there are no chromosomes
    /// - [`TspGaError::NoCities`] if the chromosomes have no genes
    /// - [`TspGaError::ChromosomeLength`] if any length differs from the first
    pub fn encode<C: AsRef<[u32]>>(chromosomes: &[C]) -> Result<Self> {
        let first = chromosomes.first().ok_or(TspGaError::EmptyPopulation)?;
        let num_cities = first.as_ref().len();
        if num_cities == 0 {
            return Err(TspGaError::NoCities);
        }

        let stride = num_cities + 1;
        let mut genes = Vec::with_capacity(chromosomes.len() * stride);
        for (index, chromosome) in chromosomes.iter().enumerate() {
            let tour = chromosome.as_ref();
            if tour.len() != num_cities {
                return Err(TspGaError::ChromosomeLength {
                    index,
                    expected: num_cities,
                    found: tour.len(),
                });
            }
            genes.extend_from_slice(tour);
            genes.push(tour[0]);
        }

        Ok(Self {
            genes,
            num_cities,
            population_size: chromosomes.len(),
        })
    }

    /// Encodes `chromosomes` and checks that each one is a permutation of
    /// the ids in `cities`.
    pub fn encode_for<C: AsRef<[u32]>>(cities: &CityTable, chromosomes: &[C]) -> Result<Self> {
        let encoded = Self::encode(chromosomes)?;
        let n = cities.num_cities();
        if encoded.num_cities != n {
            return Err(TspGaError::ChromosomeLength {
                index: 0,
                expected: n,
                found: encoded.num_cities,
            });
        }
        for index in 0..encoded.population_size {
            if !is_cyclic_permutation(encoded.tour(index), n) {
                return Err(TspGaError::NotAPermutation { index });
            }
        }
        Ok(encoded)
    }

    /// Rebuilds a population from a buffer read back from a device.
    pub(crate) fn from_raw(genes: Vec<u32>, num_cities: usize, population_size: usize) -> Self {
        debug_assert_eq!(genes.len(), population_size * (num_cities + 1));
        Self {
            genes,
            num_cities,
            population_size,
        }
    }

    pub fn num_cities(&self) -> usize {
        self.num_cities
    }

    pub fn population_size(&self) -> usize {
        self.population_size
    }

    /// Genes per individual, including the trailing duplicate.
    pub fn stride(&self) -> usize {
        self.num_cities + 1
    }

    /// The whole flat buffer.
    pub fn genes(&self) -> &[u32] {
        &self.genes
    }

    /// Cyclic tour of individual `index` (length `stride()`).
    pub fn tour(&self, index: usize) -> &[u32] {
        let stride = self.stride();
        &self.genes[index * stride..(index + 1) * stride]
    }

    /// Decodes individual `index` back into its city sequence.
    pub fn decode(&self, index: usize) -> Vec<u32> {
        let tour = self.tour(index);
        tour[..tour.len() - 1].to_vec()
    }

    /// Iterates over all cyclic tours.
    pub fn tours(&self) -> std::slice::ChunksExact<'_, u32> {
        self.genes.chunks_exact(self.stride())
    }
}

/// Checks that `tour` is a cyclic encoding of a permutation of `1..=n`.
pub fn is_cyclic_permutation(tour: &[u32], n: usize) -> bool {
    if tour.len() != n + 1 || tour[0] != tour[n] {
        return false;
    }
    let mut seen = vec![false; n + 1];
    for &gene in &tour[..n] {
        let g = gene as usize;
        if g == 0 || g > n || seen[g] {
            return false;
        }
        seen[g] = true;
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tour::city::City;
    use proptest::prelude::*;

    #[test]
    fn test_layout_appends_first_gene() {
        let pop = EncodedPopulation::encode(&[vec![1, 2, 3], vec![3, 1, 2]]).unwrap();
        assert_eq!(pop.genes(), &[1, 2, 3, 1, 3, 1, 2, 3]);
        assert_eq!(pop.stride(), 4);
        assert_eq!(pop.tour(1), &[3, 1, 2, 3]);
        assert_eq!(pop.decode(1), vec![3, 1, 2]);
    }

    #[test]
    fn test_mismatched_lengths() {
        let err = EncodedPopulation::encode(&[vec![1, 2, 3], vec![1, 2]]).unwrap_err();
        assert!(matches!(
            err,
            TspGaError::ChromosomeLength {
                index: 1,
                expected: 3,
                found: 2
            }
        ));
    }

    #[test]
    fn test_empty_population() {
        let empty: Vec<Vec<u32>> = Vec::new();
        assert!(matches!(
            EncodedPopulation::encode(&empty),
            Err(TspGaError::EmptyPopulation)
        ));
    }

    #[test]
    fn test_zero_cities() {
        let err = EncodedPopulation::encode(&[Vec::<u32>::new()]).unwrap_err();
        assert!(matches!(err, TspGaError::NoCities));
    }

    #[test]
    fn test_encode_for_rejects_duplicates() {
        let cities = CityTable::new([
            City::new(1, 0.0, 0.0),
            City::new(2, 1.0, 0.0),
            City::new(3, 2.0, 0.0),
        ])
        .unwrap();
        let err = EncodedPopulation::encode_for(&cities, &[vec![1, 2, 3], vec![1, 1, 3]])
            .unwrap_err();
        assert!(matches!(err, TspGaError::NotAPermutation { index: 1 }));
    }

    #[test]
    fn test_encode_for_rejects_wrong_city_count() {
        let cities = CityTable::new([City::new(1, 0.0, 0.0), City::new(2, 1.0, 0.0)]).unwrap();
        let err = EncodedPopulation::encode_for(&cities, &[vec![1, 2, 3]]).unwrap_err();
        assert!(matches!(err, TspGaError::ChromosomeLength { .. }));
    }

    #[test]
    fn test_is_cyclic_permutation() {
        assert!(is_cyclic_permutation(&[2, 1, 3, 2], 3));
        assert!(!is_cyclic_permutation(&[2, 1, 3, 1], 3));
        assert!(!is_cyclic_permutation(&[2, 2, 3, 2], 3));
        assert!(!is_cyclic_permutation(&[0, 1, 2, 0], 3));
        assert!(!is_cyclic_permutation(&[1, 2, 1], 3));
    }

    proptest! {
        #[test]
        fn prop_every_window_is_cyclic(n in 1usize..30, count in 1usize..10, seed in any::<u64>()) {
            use rand::{rngs::StdRng, SeedableRng};
            let mut rng = StdRng::seed_from_u64(seed);
            let chromosomes = crate::tour::seeding::random_population(count, n, &mut rng);
            let pop = EncodedPopulation::encode(&chromosomes).unwrap();

            prop_assert_eq!(pop.genes().len(), count * (n + 1));
            for (i, tour) in pop.tours().enumerate() {
                prop_assert!(is_cyclic_permutation(tour, n));
                prop_assert_eq!(pop.decode(i), chromosomes[i].clone());
            }
        }
    }
}
