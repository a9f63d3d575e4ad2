//! The generation kernel.
//!
//! One worker per individual computes its tour length, decides survival
//! against a random rival and, if it lost, rebuilds its slot by crossover
//! and mutation. The same algorithm exists twice:
//!
//! - in Rust ([`generation_step`], [`evaluate`]), run by the CPU device
//! - in WGSL ([`KERNEL_SOURCE`]), compiled by the GPU device
//!
//! Both read the population as it was at the start of the generation and
//! write into a second buffer, so no worker can observe another worker's
//! output from the same generation.
//!
//! # Submodules
//!
//! - [`rng`]: shared-seed randomness
//! - [`operators`]: tour length, order crossover, swap mutation

pub mod operators;
pub mod rng;
mod worker;

pub use worker::{evaluate, generation_step, GenerationParams, WorkerOutput};

/// WGSL source of the kernel, built into the crate.
pub const KERNEL_SOURCE: &str = include_str!("tsp_generation.wgsl");

/// Entry point advancing the population by one generation.
pub const GENERATION_ENTRY_POINT: &str = "tsp_one_generation";

/// Entry point recomputing fitness without touching tours.
pub const EVALUATE_ENTRY_POINT: &str = "evaluate_fitness";

/// Workers per workgroup; must match `@workgroup_size` in the kernel.
pub const WORKGROUP_SIZE: u32 = 64;

/// Number of workgroups needed to cover `population_size` workers.
pub fn workgroup_count(population_size: u32) -> u32 {
    population_size.div_ceil(WORKGROUP_SIZE)
}
