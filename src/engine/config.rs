//! Run configuration.
//!
//! [`TspGaConfig`] holds the parameters of one run of the generation loop.

use crate::error::{Result, TspGaError};

/// Configuration for one run.
///
/// # Defaults
///
/// ```
/// use u_tspga::engine::TspGaConfig;
///
/// let config = TspGaConfig::default();
/// assert_eq!(config.generations, 5000);
/// assert!(config.seed.is_none());
/// ```
///
/// # Builder Pattern
///
/// ```
/// use u_tspga::engine::TspGaConfig;
///
/// let config = TspGaConfig::default()
///     .with_generations(1000)
///     .with_mutation_rate(0.2)
///     .with_crossover_rate(0.6)
///     .with_seed(42);
/// ```
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TspGaConfig {
    /// Number of kernel dispatches (generations) to issue.
    pub generations: usize,

    /// Probability that a replaced individual is mutated (0.0–1.0).
    pub prob_mutate: f32,

    /// Probability that a replaced individual is recombined with its
    /// rival (0.0–1.0).
    pub prob_crossover: f32,

    /// Initial value of the shared kernel seed.
    ///
    /// `None` derives it from the wall clock at upload.
    pub seed: Option<u32>,
}

impl Default for TspGaConfig {
    fn default() -> Self {
        Self {
            generations: 5000,
            prob_mutate: 0.1,
            prob_crossover: 0.5,
            seed: None,
        }
    }
}

impl TspGaConfig {
    /// Configuration for `run(generations, prob_mutate, prob_crossover)`.
    pub fn new(generations: usize, prob_mutate: f32, prob_crossover: f32) -> Self {
        Self {
            generations,
            prob_mutate,
            prob_crossover,
            seed: None,
        }
    }

    /// Sets the number of generations.
    pub fn with_generations(mut self, n: usize) -> Self {
        self.generations = n;
        self
    }

    /// Sets the mutation probability, clamped to `[0, 1]`.
    pub fn with_mutation_rate(mut self, rate: f32) -> Self {
        self.prob_mutate = rate.clamp(0.0, 1.0);
        self
    }

    /// Sets the crossover probability, clamped to `[0, 1]`.
    pub fn with_crossover_rate(mut self, rate: f32) -> Self {
        self.prob_crossover = rate.clamp(0.0, 1.0);
        self
    }

    /// Fixes the initial kernel seed.
    pub fn with_seed(mut self, seed: u32) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Preset for quick runs: 500 generations.
    pub fn fast() -> Self {
        Self {
            generations: 500,
            ..Self::default()
        }
    }

    /// Preset for moderate runs: 2000 generations.
    pub fn balanced() -> Self {
        Self {
            generations: 2000,
            ..Self::default()
        }
    }

    /// Preset for long runs: 20000 generations, more mutation.
    pub fn quality() -> Self {
        Self {
            generations: 20_000,
            prob_mutate: 0.2,
            ..Self::default()
        }
    }

    /// Validates the configuration.
    ///
    /// # Errors
    /// [`TspGaError::InvalidProbability`] if either probability is not a
    /// finite value in `[0, 1]`.
    pub fn validate(&self) -> Result<()> {
        check_probability("prob_mutate", self.prob_mutate)?;
        check_probability("prob_crossover", self.prob_crossover)?;
        Ok(())
    }
}

fn check_probability(name: &'static str, value: f32) -> Result<()> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(TspGaError::InvalidProbability { name, value })
    }
}
