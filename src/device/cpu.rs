//! Host device: the kernel's workers run as rayon tasks.
//!
//! Each [`DevicePopulation::advance`] runs one worker per individual over
//! the front tour buffer, writing the back buffer, then swaps the two.
//! Without the `parallel` feature the workers run sequentially.

use super::{check_upload, ComputeDevice, DevicePopulation, Download};
use crate::error::Result;
use crate::kernel::rng::SharedSeed;
use crate::kernel::{evaluate, generation_step, GenerationParams};
use crate::tour::{CityTable, EncodedPopulation, Point};
#[cfg(feature = "parallel")]
use rayon::prelude::*;
#[cfg(feature = "parallel")]
use std::sync::Arc;

/// Worker pool executing the kernel on the host.
#[derive(Debug, Clone, Default)]
pub struct CpuDevice {
    #[cfg(feature = "parallel")]
    pool: Option<Arc<rayon::ThreadPool>>,
}

impl CpuDevice {
    /// Uses the global rayon pool.
    pub fn new() -> Self {
        Self::default()
    }

    /// Uses a dedicated pool of `threads` workers.
    #[cfg(feature = "parallel")]
    pub fn with_threads(threads: usize) -> Result<Self> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|i| format!("tspga-worker-{i}"))
            .build()
            .map_err(|e| crate::TspGaError::InvalidConfig(e.to_string()))?;
        Ok(Self {
            pool: Some(Arc::new(pool)),
        })
    }
}

impl ComputeDevice for CpuDevice {
    type Population = CpuPopulation;

    fn name(&self) -> String {
        #[cfg(feature = "parallel")]
        {
            let threads = self
                .pool
                .as_ref()
                .map_or_else(rayon::current_num_threads, |p| p.current_num_threads());
            format!("cpu ({threads} threads)")
        }
        #[cfg(not(feature = "parallel"))]
        {
            "cpu (sequential)".to_string()
        }
    }

    fn upload(
        &self,
        cities: &CityTable,
        population: &EncodedPopulation,
        seed: u32,
        params: &GenerationParams,
    ) -> Result<CpuPopulation> {
        check_upload(cities, population, params)?;
        let size = population.population_size();
        log::debug!(
            "uploading {} tours of {} genes to {}",
            size,
            population.stride(),
            self.name()
        );
        Ok(CpuPopulation {
            #[cfg(feature = "parallel")]
            pool: self.pool.clone(),
            cities: cities.points().to_vec(),
            front: population.genes().to_vec(),
            back: population.genes().to_vec(),
            fitness: vec![0.0; size],
            survivors: vec![false; size],
            seed: SharedSeed::new(seed),
            params: *params,
            generations: 0,
        })
    }
}

/// Population state held by [`CpuDevice`].
#[derive(Debug)]
pub struct CpuPopulation {
    #[cfg(feature = "parallel")]
    pool: Option<Arc<rayon::ThreadPool>>,
    cities: Vec<Point>,
    front: Vec<u32>,
    back: Vec<u32>,
    fitness: Vec<f32>,
    survivors: Vec<bool>,
    seed: SharedSeed,
    params: GenerationParams,
    generations: usize,
}

impl CpuPopulation {
    #[cfg(feature = "parallel")]
    fn install<F: FnOnce() + Send>(pool: &Option<Arc<rayon::ThreadPool>>, f: F) {
        match pool {
            Some(pool) => pool.install(f),
            None => f(),
        }
    }
}

impl DevicePopulation for CpuPopulation {
    fn advance(&mut self) -> Result<()> {
        let CpuPopulation {
            cities,
            front,
            back,
            fitness,
            survivors,
            seed,
            params,
            generations,
            ..
        } = self;
        let stride = params.stride();
        let params: &GenerationParams = params;
        let cities: &[Point] = cities;
        let seed: &SharedSeed = seed;
        let src: &[u32] = front;

        let worker = |(gid, ((dst, fit), survivor)): (usize, ((&mut [u32], &mut f32), &mut bool))| {
            let out = generation_step(gid, params, cities, src, dst, seed.load());
            *fit = out.fitness;
            *survivor = out.survivor;
            seed.store(out.seed);
        };

        #[cfg(feature = "parallel")]
        Self::install(&self.pool, || {
            back.par_chunks_mut(stride)
                .zip(fitness.par_iter_mut())
                .zip(survivors.par_iter_mut())
                .enumerate()
                .for_each(worker)
        });
        #[cfg(not(feature = "parallel"))]
        back.chunks_mut(stride)
            .zip(fitness.iter_mut())
            .zip(survivors.iter_mut())
            .enumerate()
            .for_each(worker);

        std::mem::swap(front, back);
        *generations += 1;
        Ok(())
    }

    fn generations(&self) -> usize {
        self.generations
    }

    fn download(mut self) -> Result<Download> {
        let params = self.params;
        let cities = &self.cities;
        let tours = &self.front;

        #[cfg(feature = "parallel")]
        {
            let fitness = &mut self.fitness;
            Self::install(&self.pool, || {
                fitness
                    .par_iter_mut()
                    .enumerate()
                    .for_each(|(gid, f)| *f = evaluate(gid, &params, cities, tours))
            });
        }
        #[cfg(not(feature = "parallel"))]
        for (gid, f) in self.fitness.iter_mut().enumerate() {
            *f = evaluate(gid, &params, cities, tours);
        }

        log::debug!(
            "downloaded {} individuals after {} generations",
            self.fitness.len(),
            self.generations
        );

        Ok(Download {
            fitness: self.fitness,
            survivors: self.survivors,
            population: EncodedPopulation::from_raw(
                self.front,
                params.num_cities as usize,
                params.population_size as usize,
            ),
            generations: self.generations,
        })
    }
}
