//! Compute devices holding the population for a whole run.
//!
//! A [`ComputeDevice`] is a session created once and reused across runs.
//! [`ComputeDevice::upload`] allocates the per-run state (city table,
//! two tour buffers, fitness, survivor flags and the shared seed) and
//! copies the encoded population in. The returned [`DevicePopulation`] is
//! advanced in place one generation at a time and read back exactly once
//! by [`DevicePopulation::download`], which consumes it.
//!
//! # Implementations
//!
//! - [`CpuDevice`]: host workers, one per individual, on a rayon pool
//! - `GpuDevice` (feature `gpu`): wgpu compute pipelines

mod cpu;
#[cfg(feature = "gpu")]
mod gpu;

pub use cpu::{CpuDevice, CpuPopulation};
#[cfg(feature = "gpu")]
pub use gpu::{GpuDevice, GpuOptions, GpuPopulation};

use crate::error::{Result, TspGaError};
use crate::kernel::GenerationParams;
use crate::tour::{is_cyclic_permutation, CityTable, EncodedPopulation};

/// A compute session able to host populations.
pub trait ComputeDevice {
    /// Device-resident population produced by [`upload`](Self::upload).
    type Population: DevicePopulation;

    /// Human-readable device name for reports and logs.
    fn name(&self) -> String;

    /// Largest population a single dispatch can cover.
    fn max_population(&self) -> usize {
        usize::MAX
    }

    /// Allocates per-run buffers and uploads cities, tours, the seed and
    /// the scalar kernel arguments.
    ///
    /// # Errors
    /// A precondition error when `population` or `params` disagree with
    /// `cities` (see [`check_upload`]), and
    /// [`TspGaError::OutOfMemory`] when allocation fails.
    fn upload(
        &self,
        cities: &CityTable,
        population: &EncodedPopulation,
        seed: u32,
        params: &GenerationParams,
    ) -> Result<Self::Population>;
}

/// A population resident on a device.
pub trait DevicePopulation {
    /// Enqueues one generation. Implementations must not wait for the
    /// device or read results back.
    fn advance(&mut self) -> Result<()>;

    /// Number of generations enqueued so far.
    fn generations(&self) -> usize;

    /// Recomputes fitness for the final tours, waits for the device and
    /// reads everything back.
    fn download(self) -> Result<Download>;
}

/// Host copy of a population after the run.
#[derive(Debug, Clone)]
pub struct Download {
    /// Tour length of every individual in `population`.
    pub fitness: Vec<f32>,
    /// Survivor flags of the last generation (all `false` after zero generations).
    pub survivors: Vec<bool>,
    pub population: EncodedPopulation,
    pub generations: usize,
}

/// Checks that a population and its kernel arguments fit a city table.
///
/// Every [`ComputeDevice::upload`] runs this before allocating anything.
///
/// # Errors
/// - [`TspGaError::ChromosomeLength`] when the tours are not `n + 1` genes
/// - [`TspGaError::NotAPermutation`] when a tour holds an unknown or
///   repeated city id
/// - [`TspGaError::InvalidConfig`] when `params` describes another shape
pub fn check_upload(
    cities: &CityTable,
    population: &EncodedPopulation,
    params: &GenerationParams,
) -> Result<()> {
    let n = cities.num_cities();
    if population.num_cities() != n {
        return Err(TspGaError::ChromosomeLength {
            index: 0,
            expected: n,
            found: population.num_cities(),
        });
    }
    if let Some(index) = population
        .tours()
        .position(|tour| !is_cyclic_permutation(tour, n))
    {
        return Err(TspGaError::NotAPermutation { index });
    }
    if params.num_cities as usize != n
        || params.population_size as usize != population.population_size()
    {
        return Err(TspGaError::InvalidConfig(format!(
            "kernel arguments describe {} tours of {} cities, population has {} tours of {}",
            params.population_size,
            params.num_cities,
            population.population_size(),
            n
        )));
    }
    Ok(())
}
