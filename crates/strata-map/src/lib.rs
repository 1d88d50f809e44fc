//! The strata map data model.
//!
//! # Layers and Blocks
//!
//! A [`Layer`](crate::Layer) is an unbounded, sparse grid of [`Block`](crate::Block)s. Every block is a cube of
//! `voxels_per_side^3` voxels of the same type, and blocks are only allocated where something has been observed (or is
//! about to be written). Space without a block is "unobserved"; there is no ambient value.
//!
//! All of the coordinate math (world points to block indices, voxel indices and linear indices) lives in
//! [`BlockIndexer`](crate::BlockIndexer), which is shared by every layer with the same geometry.
//!
//! ## Voxels
//!
//! Distance voxels ([`TsdfVoxel`](crate::TsdfVoxel), [`EsdfVoxel`](crate::EsdfVoxel)) describe surfaces. Fusion voxels
//! ([`ColorVoxel`](crate::ColorVoxel), [`IntensityVoxel`](crate::IntensityVoxel)) accumulate weighted measurements that
//! are attached to those surfaces.
//!
//! # Fusion
//!
//! A [`RayFusionIntegrator`](crate::RayFusionIntegrator) takes a batch of bearing vectors from one sensor origin, finds
//! where each ray first crosses a surface in a distance layer with a [`RayMarcher`](crate::RayMarcher), and blends the
//! ray's measurement into the target layer at that point.
//!
//! # Concurrency
//!
//! Layers are shared by reference between threads. Block allocation is atomic per index and every block has its own
//! reader-writer lock, so readers, allocators and integrators can run at the same time.

mod block;
mod color;
mod compare;
mod config;
mod coordinates;
mod error;
mod integrator;
mod layer;
mod raymarch;
mod voxel;

pub mod testing;

pub use block::*;
pub use color::*;
pub use compare::*;
pub use config::*;
pub use coordinates::*;
pub use error::*;
pub use integrator::*;
pub use layer::*;
pub use raymarch::*;
pub use voxel::*;

pub use strata_core;
