//! Error kinds for the TSP genetic-algorithm engine.
//!
//! Three families: precondition violations (nothing is dispatched),
//! device and kernel-build failures, and resource exhaustion. None of
//! them is recovered locally; every failure aborts the run.

use thiserror::Error;

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, TspGaError>;

#[derive(Debug, Error)]
pub enum TspGaError {
    #[error("population is empty")]
    EmptyPopulation,

    #[error("city set is empty")]
    NoCities,

    #[error("chromosome {index} has {found} genes, expected {expected}")]
    ChromosomeLength {
        index: usize,
        expected: usize,
        found: usize,
    },

    #[error("chromosome {index} is not a permutation of the city ids")]
    NotAPermutation { index: usize },

    #[error("city ids must be exactly 1..={expected_max}")]
    CityIds { expected_max: usize },

    #[error("city {id} has a non-finite coordinate")]
    InvalidCoordinate { id: u32 },

    #[error("{name} must be a probability in [0, 1], got {value}")]
    InvalidProbability { name: &'static str, value: f32 },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("population of {size} exceeds the device limit of {max}")]
    PopulationTooLarge { size: usize, max: usize },

    #[error("failed to read kernel source: {0}")]
    KernelSource(#[from] std::io::Error),

    #[error("kernel failed to build: {0}")]
    KernelBuild(String),

    #[error("no compatible compute device found")]
    NoDevice,

    #[error("kernel dispatch failed: {0}")]
    Dispatch(String),

    #[error("device out of memory: {0}")]
    OutOfMemory(String),
}

impl TspGaError {
    /// Returns `true` for errors raised before anything touched the device.
    pub fn is_precondition(&self) -> bool {
        matches!(
            self,
            TspGaError::EmptyPopulation
                | TspGaError::NoCities
                | TspGaError::ChromosomeLength { .. }
                | TspGaError::NotAPermutation { .. }
                | TspGaError::CityIds { .. }
                | TspGaError::InvalidCoordinate { .. }
                | TspGaError::InvalidProbability { .. }
                | TspGaError::InvalidConfig(_)
                | TspGaError::PopulationTooLarge { .. }
        )
    }
}
