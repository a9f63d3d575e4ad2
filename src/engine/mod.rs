//! The host-side generation loop.
//!
//! A run uploads the encoded population once, dispatches the kernel once
//! per generation without reading anything back in between, then
//! downloads the final fitness and tours and picks the shortest tour.
//!
//! # Key Types
//!
//! - [`TspGa`]: a TSP instance bound to a compute device
//! - [`TspGaConfig`]: run parameters (generations, probabilities, presets)
//! - [`RunReport`]: best tour, final fitness, timing
//!
//! # References
//!
//! - Goldberg & Lingle (1985), *Alleles, Loci, and the Traveling Salesman Problem*
//! - Davis (1985), *Applying Adaptive Algorithms to Epistatic Domains* (order crossover)

mod config;
mod result;
mod runner;

pub use config::TspGaConfig;
pub use result::{best_index, BestTour, RunReport};
pub use runner::TspGa;
