//! Sparse voxel maps with ray-based fusion of per-pixel measurements.
//!
//! This crate bundles the [`strata_map`] data model with a [`Config`] that can be loaded from RON files.

mod config;

pub use config::{Config, ConfigError};

pub use strata_map::*;
