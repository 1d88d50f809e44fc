use crate::coordinates::BlockIndex;

use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum MapError {
    #[error("no block allocated at index {index}")]
    BlockNotFound { index: BlockIndex },

    #[error("invalid layer configuration: {0}")]
    InvalidLayerConfig(String),
}

#[derive(Debug, Error, PartialEq)]
pub enum IntegrationError {
    /// Every bearing vector needs exactly one measurement.
    #[error("batch has {bearings} bearing vectors but {measurements} measurements")]
    MismatchedBatch { bearings: usize, measurements: usize },

    #[error("invalid integrator configuration: {0}")]
    InvalidConfig(String),
}
