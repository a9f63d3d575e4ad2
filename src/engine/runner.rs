//! Generation loop execution.
//!
//! [`TspGa`] orchestrates one run:
//! validate → upload → dispatch × generations → download → extract.

use super::config::TspGaConfig;
use super::result::{BestTour, RunReport};
use crate::device::{ComputeDevice, CpuDevice, DevicePopulation};
use crate::error::{Result, TspGaError};
use crate::kernel::rng::mix32;
use crate::kernel::GenerationParams;
use crate::tour::{CityTable, EncodedPopulation};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Instant, SystemTime, UNIX_EPOCH};

/// A TSP instance bound to a compute device.
///
/// The city table and the encoded starting population are validated once
/// at construction. Every run uploads that same starting population, so
/// runs are independent of each other.
///
/// # Usage
///
/// ```
/// use u_tspga::engine::TspGa;
/// use u_tspga::tour::{City, CityTable};
///
/// let cities = CityTable::new([
///     City::new(1, 0.0, 0.0),
///     City::new(2, 1.0, 0.0),
///     City::new(3, 1.0, 1.0),
///     City::new(4, 0.0, 1.0),
/// ])
/// .unwrap();
/// let tours = vec![vec![1, 2, 3, 4], vec![1, 3, 2, 4]];
///
/// let ga = TspGa::new(cities, &tours).unwrap();
/// let report = ga.run(100, 0.1, 0.5).unwrap();
/// assert!(report.best_length() >= 4.0);
/// ```
#[derive(Debug)]
pub struct TspGa<D: ComputeDevice = CpuDevice> {
    device: D,
    cities: CityTable,
    population: EncodedPopulation,
}

impl TspGa<CpuDevice> {
    /// Binds the instance to a [`CpuDevice`] on the global pool.
    ///
    /// # Errors
    /// Any encoding precondition: empty population, mismatched lengths,
    /// or a chromosome that is not a permutation of the city ids.
    pub fn new<C: AsRef<[u32]>>(cities: CityTable, chromosomes: &[C]) -> Result<Self> {
        Self::with_device(CpuDevice::new(), cities, chromosomes)
    }
}

impl<D: ComputeDevice> TspGa<D> {
    /// Binds the instance to `device`.
    pub fn with_device<C: AsRef<[u32]>>(
        device: D,
        cities: CityTable,
        chromosomes: &[C],
    ) -> Result<Self> {
        let population = EncodedPopulation::encode_for(&cities, chromosomes)?;
        Ok(Self {
            device,
            cities,
            population,
        })
    }

    pub fn cities(&self) -> &CityTable {
        &self.cities
    }

    /// The starting population every run uploads.
    pub fn population(&self) -> &EncodedPopulation {
        &self.population
    }

    pub fn device(&self) -> &D {
        &self.device
    }

    /// Runs `generations` generations and reports the best tour.
    ///
    /// Probabilities are taken as given; values outside `[0, 1]` are
    /// rejected rather than clamped.
    ///
    /// # Errors
    /// [`TspGaError::InvalidProbability`] for an out-of-range probability,
    /// otherwise whatever the device reports.
    pub fn run(
        &self,
        generations: usize,
        prob_mutate: f32,
        prob_crossover: f32,
    ) -> Result<RunReport> {
        self.run_with_config(&TspGaConfig::new(generations, prob_mutate, prob_crossover))
    }

    /// Runs with a full configuration.
    pub fn run_with_config(&self, config: &TspGaConfig) -> Result<RunReport> {
        self.run_with_cancel(config, None)
    }

    /// Runs with an optional cancellation token.
    ///
    /// The flag is checked before each dispatch. Once it is set, no further
    /// generations are enqueued and the population is downloaded as it
    /// stands; [`RunReport::generations`] tells how many ran.
    pub fn run_with_cancel(
        &self,
        config: &TspGaConfig,
        cancel: Option<Arc<AtomicBool>>,
    ) -> Result<RunReport> {
        config.validate()?;

        let size = self.population.population_size();
        let max = self.device.max_population();
        if size > max {
            return Err(TspGaError::PopulationTooLarge { size, max });
        }

        let params = GenerationParams {
            num_cities: self.population.num_cities() as u32,
            population_size: size as u32,
            prob_mutate: config.prob_mutate,
            prob_crossover: config.prob_crossover,
        };
        let seed = config.seed.unwrap_or_else(clock_seed);
        let device_name = self.device.name();

        log::info!(
            "running {} generations on {} ({} cities, {} individuals, seed {})",
            config.generations,
            device_name,
            params.num_cities,
            size,
            seed
        );

        let start = Instant::now();
        let mut resident = self.device.upload(&self.cities, &self.population, seed, &params)?;
        for _ in 0..config.generations {
            if cancel.as_ref().is_some_and(|c| c.load(Ordering::Relaxed)) {
                log::info!("cancelled after {} generations", resident.generations());
                break;
            }
            resident.advance()?;
        }
        let download = resident.download()?;
        let elapsed = start.elapsed();

        let best = BestTour::extract(&download)?;
        log::info!(
            "finished {} generations in {:.3}s, best length {:.4} (individual {})",
            download.generations,
            elapsed.as_secs_f64(),
            best.length,
            best.index
        );

        Ok(RunReport {
            best,
            fitness: download.fitness,
            generations: download.generations,
            seed,
            elapsed,
            device: device_name,
        })
    }
}

/// Kernel seed derived from the wall clock.
fn clock_seed() -> u32 {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| d.as_nanos());
    mix32(nanos as u32 ^ (nanos >> 32) as u32)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::result::best_index;
    use crate::kernel::operators::tour_length;
    use crate::tour::{is_cyclic_permutation, seeding, City};
    use proptest::prelude::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn unit_square() -> CityTable {
        CityTable::new([
            City::new(1, 0.0, 0.0),
            City::new(2, 1.0, 0.0),
            City::new(3, 1.0, 1.0),
            City::new(4, 0.0, 1.0),
        ])
        .unwrap()
    }

    fn random_instance(cities: usize, pop: usize, seed: u64) -> TspGa {
        let mut rng = StdRng::seed_from_u64(seed);
        let table = CityTable::new(seeding::random_cities(cities, &mut rng)).unwrap();
        let tours = seeding::random_population(pop, cities, &mut rng);
        TspGa::new(table, &tours).unwrap()
    }

    #[test]
    fn test_unit_square_zero_generations() {
        let tours = vec![vec![1, 2, 3, 4]; 8];
        let ga = TspGa::new(unit_square(), &tours).unwrap();
        let report = ga.run(0, 0.0, 0.0).unwrap();

        assert_eq!(report.generations, 0);
        assert!((report.best_length() - 4.0).abs() < 1e-6);
        assert_eq!(report.best.index, 0);
        assert_eq!(report.best_tour(), &[1, 2, 3, 4]);
        assert_eq!(report.fitness.len(), 8);
    }

    #[test]
    fn test_unit_square_finds_perimeter() {
        let tours = vec![
            vec![1, 3, 2, 4],
            vec![1, 2, 4, 3],
            vec![2, 4, 1, 3],
            vec![1, 2, 3, 4],
        ];
        let ga = TspGa::new(unit_square(), &tours).unwrap();
        let config = TspGaConfig::new(50, 0.3, 0.5).with_seed(17);
        let report = ga.run_with_config(&config).unwrap();
        assert!((report.best_length() - 4.0).abs() < 1e-5);
    }

    #[test]
    fn test_single_individual_unchanged() {
        let ga = TspGa::new(unit_square(), &[vec![1, 3, 2, 4]]).unwrap();
        let report = ga.run(100, 1.0, 1.0).unwrap();
        assert_eq!(report.best_tour(), &[1, 3, 2, 4]);
        assert_eq!(report.best.index, 0);
    }

    #[test]
    fn test_two_cities() {
        let cities = CityTable::new([City::new(1, 0.0, 0.0), City::new(2, 3.0, 4.0)]).unwrap();
        let ga = TspGa::new(cities, &[vec![1, 2], vec![2, 1]]).unwrap();
        let report = ga.run(20, 1.0, 1.0).unwrap();
        assert!((report.best_length() - 10.0).abs() < 1e-5);
    }

    #[test]
    fn test_single_city() {
        let cities = CityTable::new([City::new(1, 2.0, 2.0)]).unwrap();
        let ga = TspGa::new(cities, &[vec![1], vec![1]]).unwrap();
        let report = ga.run(5, 1.0, 1.0).unwrap();
        assert_eq!(report.best_length(), 0.0);
        assert_eq!(report.best_tour(), &[1]);
    }

    #[test]
    fn test_empty_population_rejected() {
        let err = TspGa::new(unit_square(), &Vec::<Vec<u32>>::new()).unwrap_err();
        assert!(matches!(err, TspGaError::EmptyPopulation));
        assert!(err.is_precondition());
    }

    #[test]
    fn test_mismatched_lengths_rejected() {
        let err = TspGa::new(unit_square(), &[vec![1, 2, 3, 4], vec![1, 2, 3]]).unwrap_err();
        assert!(matches!(err, TspGaError::ChromosomeLength { index: 1, .. }));
    }

    #[test]
    fn test_bad_probability_rejected() {
        let ga = TspGa::new(unit_square(), &[vec![1, 2, 3, 4]]).unwrap();
        let err = ga.run(10, 1.2, 0.5).unwrap_err();
        assert!(matches!(
            err,
            TspGaError::InvalidProbability {
                name: "prob_mutate",
                ..
            }
        ));
        let err = ga.run(10, 0.5, -0.1).unwrap_err();
        assert!(matches!(
            err,
            TspGaError::InvalidProbability {
                name: "prob_crossover",
                ..
            }
        ));
    }

    #[test]
    fn test_reported_best_is_minimum_of_final_fitness() {
        let ga = random_instance(20, 48, 3);
        let report = ga.run_with_config(&TspGaConfig::fast().with_seed(8)).unwrap();
        let index = best_index(&report.fitness).unwrap();
        assert_eq!(report.best.index, index);
        assert_eq!(report.best_length(), report.fitness[index]);

        let mut closed = report.best.tour.clone();
        closed.push(closed[0]);
        let length = tour_length(ga.cities().points(), &closed);
        assert!((length - report.best_length()).abs() < 1e-3);
    }

    #[test]
    fn test_runs_improve_on_start() {
        let ga = random_instance(16, 32, 4);
        let start = ga.run(0, 0.0, 0.0).unwrap();
        let end = ga.run_with_config(&TspGaConfig::fast().with_seed(2)).unwrap();
        assert!(end.best_length() <= start.best_length());
        assert_eq!(end.generations, 500);
    }

    #[test]
    fn test_runs_start_from_same_population() {
        let ga = random_instance(10, 16, 5);
        let before = ga.population().clone();
        ga.run(50, 0.5, 0.5).unwrap();
        assert_eq!(ga.population(), &before);
    }

    #[test]
    fn test_cancellation() {
        let ga = random_instance(10, 16, 6);
        let cancel = Arc::new(AtomicBool::new(true));
        let report = ga
            .run_with_cancel(&TspGaConfig::new(1000, 0.1, 0.5), Some(cancel))
            .unwrap();
        assert_eq!(report.generations, 0);
    }

    #[test]
    fn test_report_carries_seed_and_device() {
        let ga = random_instance(6, 4, 7);
        let report = ga
            .run_with_config(&TspGaConfig::new(3, 0.1, 0.5).with_seed(1234))
            .unwrap();
        assert_eq!(report.seed, 1234);
        assert!(report.device.starts_with("cpu"));
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(24))]

        #[test]
        fn prop_final_tours_are_permutations(
            cities in 2usize..20,
            pop in 1usize..40,
            generations in 0usize..60,
            pm in 0.0f32..=1.0,
            pc in 0.0f32..=1.0,
            seed in any::<u64>(),
        ) {
            let ga = random_instance(cities, pop, seed);
            let report = ga.run_with_config(
                &TspGaConfig::new(generations, pm, pc).with_seed(seed as u32),
            ).unwrap();

            let mut closed = report.best.tour.clone();
            closed.push(closed[0]);
            prop_assert!(is_cyclic_permutation(&closed, cities));
            prop_assert_eq!(report.fitness.len(), pop);
            prop_assert!(report.fitness.iter().all(|f| f.is_finite()));
        }
    }
}
