//! Tour representation shared by host and device.
//!
//! - [`CityTable`]: city coordinates indexed by id, with a sentinel slot 0
//! - [`EncodedPopulation`]: a population flattened into one buffer of
//!   cyclic tours (`num_cities + 1` genes each)
//! - [`seeding`]: random instances for experiments and tests

mod city;
mod encoding;
pub mod seeding;

pub use city::{City, CityTable, Point};
pub use encoding::{is_cyclic_permutation, EncodedPopulation};
