//! Use-case facade over the repositories and derived subsystems.

pub mod garden_service;

pub use garden_service::{Garden, GardenError, GardenEvent, GardenResult};
