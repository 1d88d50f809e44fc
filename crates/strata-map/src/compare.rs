//! Structural and value comparison of two layers, for tests and round-trip checks.

use crate::coordinates::BlockIndex;
use crate::layer::Layer;
use crate::voxel::Voxel;

use std::sync::Arc;
use strata_core::approx::AbsDiffEq;
use thiserror::Error;

/// Tolerance for float comparisons of voxel payloads and sizes stored as `f32`.
pub const DEFAULT_TOLERANCE: f32 = 1e-6;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum LayerSide {
    Left,
    Right,
}

/// The first difference found between two layers.
#[derive(Clone, Debug, Error, PartialEq)]
pub enum LayerMismatch {
    #[error("voxel sizes differ: {left} vs {right}")]
    VoxelSize { left: f32, right: f32 },
    #[error("voxels per side differ: {left} vs {right}")]
    VoxelsPerSide { left: u32, right: u32 },
    #[error("block {index} is missing from the {missing_from:?} layer")]
    MissingBlock {
        index: BlockIndex,
        missing_from: LayerSide,
    },
    #[error("origins of block {index} differ")]
    BlockOrigin { index: BlockIndex },
    #[error("voxel {linear_index} of block {index} differs")]
    Voxel { index: BlockIndex, linear_index: usize },
    #[error("memory sizes differ: {left} vs {right} bytes")]
    MemorySize { left: usize, right: usize },
}

/// Checks that `left` and `right` have the same geometry, the same allocated blocks, and voxels that agree within
/// `tolerance` (see [`Voxel::approx_eq`]).
///
/// Blocks are visited in ascending `(z, y, x)` order so the reported mismatch doesn't depend on hash order.
pub fn compare_layers<V: Voxel>(left: &Layer<V>, right: &Layer<V>, tolerance: f32) -> Result<(), LayerMismatch> {
    if !left.voxel_size().abs_diff_eq(&right.voxel_size(), tolerance) {
        return Err(LayerMismatch::VoxelSize {
            left: left.voxel_size(),
            right: right.voxel_size(),
        });
    }
    if left.voxels_per_side() != right.voxels_per_side() {
        return Err(LayerMismatch::VoxelsPerSide {
            left: left.voxels_per_side(),
            right: right.voxels_per_side(),
        });
    }

    let mut left_blocks = left.blocks();
    left_blocks.sort_by_key(|(index, _)| sort_key(*index));
    for (index, _) in left_blocks.iter() {
        if !right.contains_block(*index) {
            return Err(LayerMismatch::MissingBlock {
                index: *index,
                missing_from: LayerSide::Right,
            });
        }
    }
    let mut right_only: Vec<BlockIndex> = right
        .all_allocated_block_indices()
        .into_iter()
        .filter(|index| !left.contains_block(*index))
        .collect();
    right_only.sort_by_key(|index| sort_key(*index));
    if let Some(&index) = right_only.first() {
        return Err(LayerMismatch::MissingBlock {
            index,
            missing_from: LayerSide::Left,
        });
    }

    for (index, left_block) in left_blocks.iter() {
        let right_block = match right.block_by_index(*index) {
            Some(b) => b,
            None => {
                return Err(LayerMismatch::MissingBlock {
                    index: *index,
                    missing_from: LayerSide::Right,
                })
            }
        };
        if !left_block.origin().abs_diff_eq(right_block.origin(), tolerance) {
            return Err(LayerMismatch::BlockOrigin { index: *index });
        }

        if Arc::ptr_eq(left_block, &right_block) {
            continue;
        }

        // Never hold two block locks at once. A queued writer on either block would otherwise block the second read.
        let left_voxels = left_block.read().voxels().to_vec();
        let right_voxels = right_block.read();
        let differing = left_voxels
            .iter()
            .zip(right_voxels.voxels().iter())
            .position(|(l, r)| !l.approx_eq(r, tolerance));
        if let Some(linear_index) = differing {
            return Err(LayerMismatch::Voxel {
                index: *index,
                linear_index,
            });
        }
    }

    let (left_size, right_size) = (left.memory_size(), right.memory_size());
    if left_size != right_size {
        return Err(LayerMismatch::MemorySize {
            left: left_size,
            right: right_size,
        });
    }

    Ok(())
}

/// [`compare_layers`] with [`DEFAULT_TOLERANCE`], logging the mismatch if there is one.
pub fn is_same_layer<V: Voxel>(left: &Layer<V>, right: &Layer<V>) -> bool {
    match compare_layers(left, right, DEFAULT_TOLERANCE) {
        Ok(()) => true,
        Err(mismatch) => {
            log::error!("{} layers are not the same: {}", V::KIND, mismatch);
            false
        }
    }
}

fn sort_key(index: BlockIndex) -> [i32; 3] {
    [index.z, index.y, index.x]
}

// ████████╗███████╗███████╗████████╗
// ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝
//    ██║   █████╗  ███████╗   ██║
//    ██║   ██╔══╝  ╚════██║   ██║
//    ██║   ███████╗███████║   ██║
//    ╚═╝   ╚══════╝╚══════╝   ╚═╝
