//! One kernel worker's share of a generation.
//!
//! A worker owns exactly one individual. It reads the whole pre-generation
//! tour buffer (`src`) but writes only its own window of the next buffer
//! (`dst`), its own fitness slot and its own survivor slot. The signature
//! enforces this: the worker never sees any other slot mutably.
//!
//! # Policy
//!
//! 1. Fitness is the length of the worker's own tour.
//! 2. Survival is a binary tournament against one rival drawn uniformly
//!    from the other individuals. The worker survives when its tour is
//!    strictly shorter, or equally long and its index is lower.
//! 3. Survivors are copied through unchanged.
//! 4. A non-survivor's slot is replaced: with probability `prob_crossover`
//!    by the order crossover of the rival (segment) and its own tour
//!    (fill order), then with probability `prob_mutate` two genes swap.

use super::operators::{order_crossover, swap_mutation, tour_length};
use super::rng::WorkerRng;
use crate::tour::Point;

/// Scalar kernel arguments for one dispatch.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GenerationParams {
    pub num_cities: u32,
    pub population_size: u32,
    pub prob_mutate: f32,
    pub prob_crossover: f32,
}

impl GenerationParams {
    /// Genes per individual, including the trailing duplicate.
    pub fn stride(&self) -> usize {
        self.num_cities as usize + 1
    }
}

/// What a worker produced besides its tour.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WorkerOutput {
    pub fitness: f32,
    pub survivor: bool,
    /// Final RNG state, to be stored into the shared seed.
    pub seed: u32,
}

/// Runs worker `gid` for one generation.
///
/// `src` is the full population as of the start of the generation; `dst`
/// is this worker's window in the next buffer.
pub fn generation_step(
    gid: usize,
    params: &GenerationParams,
    cities: &[Point],
    src: &[u32],
    dst: &mut [u32],
    shared_seed: u32,
) -> WorkerOutput {
    let stride = params.stride();
    let own = &src[gid * stride..(gid + 1) * stride];
    let mut rng = WorkerRng::new(shared_seed, gid as u32);

    let own_length = tour_length(cities, own);

    let rival = pick_rival(gid, params.population_size, &mut rng);
    let rival_tour = &src[rival * stride..(rival + 1) * stride];
    let rival_length = tour_length(cities, rival_tour);
    let survivor = survives(gid, own_length, rival, rival_length);

    dst.copy_from_slice(own);
    if !survivor {
        if rng.chance(params.prob_crossover) {
            order_crossover(rival_tour, own, dst, &mut rng);
        }
        if rng.chance(params.prob_mutate) {
            swap_mutation(dst, &mut rng);
        }
    }

    WorkerOutput {
        fitness: own_length,
        survivor,
        seed: rng.state(),
    }
}

/// Evaluate-only pass: the length of individual `gid` in `tours`.
pub fn evaluate(gid: usize, params: &GenerationParams, cities: &[Point], tours: &[u32]) -> f32 {
    let stride = params.stride();
    tour_length(cities, &tours[gid * stride..(gid + 1) * stride])
}

/// Uniform rival among the other individuals; a lone individual is its own rival.
fn pick_rival(gid: usize, population_size: u32, rng: &mut WorkerRng) -> usize {
    if population_size < 2 {
        return gid;
    }
    let r = rng.below(population_size - 1) as usize;
    if r >= gid {
        r + 1
    } else {
        r
    }
}

/// Tournament outcome; ties go to the lower index.
fn survives(gid: usize, own_length: f32, rival: usize, rival_length: f32) -> bool {
    own_length < rival_length || (own_length == rival_length && gid <= rival)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tour::{is_cyclic_permutation, City, CityTable, EncodedPopulation};
    use rand::SeedableRng;

    fn square() -> CityTable {
        CityTable::new([
            City::new(1, 0.0, 0.0),
            City::new(2, 0.0, 1.0),
            City::new(3, 1.0, 1.0),
            City::new(4, 1.0, 0.0),
        ])
        .unwrap()
    }

    fn params(pop: &EncodedPopulation, pm: f32, pc: f32) -> GenerationParams {
        GenerationParams {
            num_cities: pop.num_cities() as u32,
            population_size: pop.population_size() as u32,
            prob_mutate: pm,
            prob_crossover: pc,
        }
    }

    fn step_all(
        pop: &EncodedPopulation,
        p: &GenerationParams,
        cities: &CityTable,
        seed: u32,
    ) -> (Vec<u32>, Vec<WorkerOutput>) {
        let mut next = vec![0u32; pop.genes().len()];
        let outputs = next
            .chunks_exact_mut(p.stride())
            .enumerate()
            .map(|(gid, dst)| generation_step(gid, p, cities.points(), pop.genes(), dst, seed))
            .collect();
        (next, outputs)
    }

    #[test]
    fn test_fitness_is_pre_generation_length() {
        let cities = square();
        let pop = EncodedPopulation::encode(&[vec![1, 2, 3, 4], vec![1, 3, 2, 4]]).unwrap();
        let p = params(&pop, 1.0, 1.0);
        let (_, outputs) = step_all(&pop, &p, &cities, 77);

        assert!((outputs[0].fitness - 4.0).abs() < 1e-6);
        assert!((outputs[1].fitness - (2.0 + 2.0 * 2f32.sqrt())).abs() < 1e-5);
    }

    #[test]
    fn test_better_tour_survives_worse_replaced() {
        let cities = square();
        let pop = EncodedPopulation::encode(&[vec![1, 2, 3, 4], vec![1, 3, 2, 4]]).unwrap();
        let p = params(&pop, 0.0, 0.0);
        let (next, outputs) = step_all(&pop, &p, &cities, 5);

        assert!(outputs[0].survivor);
        assert!(!outputs[1].survivor);
        // zero probabilities leave every slot untouched
        assert_eq!(next, pop.genes());
    }

    #[test]
    fn test_survivor_copied_unchanged() {
        let cities = square();
        let pop = EncodedPopulation::encode(&[vec![1, 2, 3, 4], vec![1, 3, 2, 4]]).unwrap();
        let p = params(&pop, 1.0, 1.0);
        for seed in 0..50 {
            let (next, outputs) = step_all(&pop, &p, &cities, seed);
            assert!(outputs[0].survivor);
            assert_eq!(&next[..5], pop.tour(0));
        }
    }

    #[test]
    fn test_ties_go_to_lower_index() {
        let cities = square();
        let pop = EncodedPopulation::encode(&[vec![1, 2, 3, 4], vec![2, 3, 4, 1]]).unwrap();
        let p = params(&pop, 0.0, 0.0);
        let (_, outputs) = step_all(&pop, &p, &cities, 9);
        assert!(outputs[0].survivor);
        assert!(!outputs[1].survivor);
    }

    #[test]
    fn test_lone_individual_survives() {
        let cities = square();
        let pop = EncodedPopulation::encode(&[vec![1, 3, 2, 4]]).unwrap();
        let p = params(&pop, 1.0, 1.0);
        let (next, outputs) = step_all(&pop, &p, &cities, 123);
        assert!(outputs[0].survivor);
        assert_eq!(next, pop.genes());
    }

    #[test]
    fn test_offspring_are_permutations() {
        let cities = CityTable::new((1..=12).map(|i| {
            let a = i as f32 * 0.5;
            City::new(i, a.cos() * 10.0, a.sin() * 10.0)
        }))
        .unwrap();
        let mut rng = rand::rngs::StdRng::seed_from_u64(8);
        let chromosomes = crate::tour::seeding::random_population(16, 12, &mut rng);
        let pop = EncodedPopulation::encode(&chromosomes).unwrap();
        let p = params(&pop, 0.7, 0.9);

        for seed in 0..20 {
            let (next, outputs) = step_all(&pop, &p, &cities, seed);
            for tour in next.chunks_exact(p.stride()) {
                assert!(is_cyclic_permutation(tour, 12), "invalid tour {tour:?}");
            }
            assert!(outputs.iter().all(|o| o.fitness.is_finite() && o.fitness >= 0.0));
        }
    }

    #[test]
    fn test_pick_rival_never_self() {
        let mut rng = WorkerRng::new(1, 2);
        for gid in 0..5 {
            for _ in 0..200 {
                let r = pick_rival(gid, 5, &mut rng);
                assert_ne!(r, gid);
                assert!(r < 5);
            }
        }
        assert_eq!(pick_rival(0, 1, &mut rng), 0);
    }

    #[test]
    fn test_evaluate_matches_step_fitness() {
        let cities = square();
        let pop = EncodedPopulation::encode(&[vec![4, 3, 2, 1], vec![2, 4, 1, 3]]).unwrap();
        let p = params(&pop, 0.0, 0.0);
        let (_, outputs) = step_all(&pop, &p, &cities, 0);
        for (gid, out) in outputs.iter().enumerate() {
            assert_eq!(evaluate(gid, &p, cities.points(), pop.genes()), out.fitness);
        }
    }
}
