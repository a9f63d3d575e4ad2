//! Data-parallel genetic algorithm for the travelling-salesman problem.
//!
//! The whole population lives on a compute device for the duration of a
//! run and advances one generation per kernel dispatch:
//!
//! - **Tour Encoding** ([`tour`]): a population of permutations flattened
//!   into one contiguous buffer of cyclic tours, the first city repeated
//!   at the end of each.
//! - **Generation Kernel** ([`kernel`]): one worker per individual computes
//!   its tour length, plays a binary tournament against a random rival
//!   and, if it loses, rebuilds its tour by order crossover and swap
//!   mutation. Randomness comes from a single shared seed.
//! - **Devices** ([`device`]): a rayon worker pool on the host, and a wgpu
//!   compute pipeline behind the `gpu` feature. Both keep tours, fitness,
//!   survivor flags and the seed resident for the whole run.
//! - **Generation Loop** ([`engine`]): uploads once, dispatches without
//!   reading back in between, downloads once and reports the best tour.
//!
//! # Example
//!
//! ```
//! use rand::rngs::StdRng;
//! use rand::SeedableRng;
//! use u_tspga::tour::{seeding, CityTable};
//! use u_tspga::{TspGa, TspGaConfig};
//!
//! let mut rng = StdRng::seed_from_u64(7);
//! let cities = CityTable::new(seeding::random_cities(30, &mut rng))?;
//! let tours = seeding::random_population(64, 30, &mut rng);
//!
//! let ga = TspGa::new(cities, &tours)?;
//! let report = ga.run_with_config(&TspGaConfig::fast().with_seed(1))?;
//! assert_eq!(report.best_tour().len(), 30);
//! # Ok::<(), u_tspga::TspGaError>(())
//! ```
//!
//! # Features
//!
//! - `parallel` (default): CPU workers on a rayon pool
//! - `gpu`: `device::GpuDevice` on wgpu
//! - `serde`: serialization for cities, configuration and reports

pub mod device;
pub mod engine;
pub mod error;
pub mod kernel;
pub mod tour;

pub use engine::{RunReport, TspGa, TspGaConfig};
pub use error::{Result, TspGaError};
