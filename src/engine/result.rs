//! Result extraction and the run report.

use crate::device::Download;
use crate::error::{Result, TspGaError};
use std::time::Duration;

/// Index of the smallest value; ties go to the first occurrence.
///
/// Returns `None` for an empty slice.
pub fn best_index(fitness: &[f32]) -> Option<usize> {
    let mut iter = fitness.iter().enumerate();
    let (mut best, mut best_value) = iter.next().map(|(i, &f)| (i, f))?;
    for (i, &f) in iter {
        if f < best_value {
            best = i;
            best_value = f;
        }
    }
    Some(best)
}

/// The shortest tour of the final population.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BestTour {
    /// Position of the individual in the population.
    pub index: usize,
    /// Tour length.
    pub length: f32,
    /// City ids in visiting order, without the closing duplicate.
    pub tour: Vec<u32>,
}

impl BestTour {
    /// Scans the downloaded fitness for the minimum and decodes that tour.
    pub fn extract(download: &Download) -> Result<Self> {
        let index = best_index(&download.fitness).ok_or(TspGaError::EmptyPopulation)?;
        Ok(Self {
            index,
            length: download.fitness[index],
            tour: download.population.decode(index),
        })
    }
}

/// Outcome of one run.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RunReport {
    pub best: BestTour,

    /// Tour length of every individual in the final population.
    pub fitness: Vec<f32>,

    /// Number of generations dispatched.
    pub generations: usize,

    /// Initial value of the shared kernel seed.
    pub seed: u32,

    /// Wall-clock time from upload to the end of the download.
    pub elapsed: Duration,

    /// Name of the device the run executed on.
    pub device: String,
}

impl RunReport {
    pub fn best_length(&self) -> f32 {
        self.best.length
    }

    pub fn best_tour(&self) -> &[u32] {
        &self.best.tour
    }
}
