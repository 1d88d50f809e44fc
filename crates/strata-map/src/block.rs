use crate::coordinates::{BlockIndexer, VoxelIndex};
use crate::voxel::Voxel;

use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::mem;
use std::sync::atomic::{AtomicBool, Ordering};
use strata_core::glam::Vec3A;

/// A cube of `voxels_per_side^3` voxels, the unit of allocation in a [`Layer`](crate::Layer).
///
/// Voxels are guarded by a single `RwLock` per block, so any number of readers or one writer can touch the block at a time.
/// A fused update is always done under one write guard, which makes every ray's mutation atomic at block granularity.
pub struct Block<V> {
    origin: Vec3A,
    indexer: BlockIndexer,
    has_data: AtomicBool,
    voxels: RwLock<Box<[V]>>,
}

impl<V: Voxel> Block<V> {
    /// A block whose voxels are all in the never-observed (default) state.
    pub fn new(indexer: BlockIndexer, origin: Vec3A) -> Self {
        Self {
            origin,
            indexer,
            has_data: AtomicBool::new(false),
            voxels: RwLock::new(vec![V::default(); indexer.num_voxels_per_block()].into_boxed_slice()),
        }
    }

    /// The world coordinates of the block's minimum corner.
    #[inline]
    pub fn origin(&self) -> Vec3A {
        self.origin
    }

    #[inline]
    pub fn voxel_size(&self) -> f32 {
        self.indexer.voxel_size()
    }

    #[inline]
    pub fn voxels_per_side(&self) -> u32 {
        self.indexer.voxels_per_side()
    }

    #[inline]
    pub fn block_size(&self) -> f32 {
        self.indexer.block_size()
    }

    #[inline]
    pub fn num_voxels(&self) -> usize {
        self.indexer.num_voxels_per_block()
    }

    #[inline]
    pub fn has_data(&self) -> bool {
        self.has_data.load(Ordering::Acquire)
    }

    #[inline]
    pub fn mark_has_data(&self) {
        self.has_data.store(true, Ordering::Release);
    }

    pub fn read(&self) -> BlockReadGuard<'_, V> {
        BlockReadGuard {
            block: self,
            voxels: self.voxels.read(),
        }
    }

    pub fn write(&self) -> BlockWriteGuard<'_, V> {
        BlockWriteGuard {
            block: self,
            voxels: self.voxels.write(),
        }
    }

    /// Copy of the voxel at `linear_index`.
    ///
    /// # Panics
    ///
    /// If `linear_index >= self.num_voxels()`.
    pub fn voxel_at_linear_index(&self, linear_index: usize) -> V {
        *self.read().voxel_by_linear_index(linear_index)
    }

    /// Copy of the voxel containing `p`. The caller must make sure `p` is inside of this block; points outside are clamped
    /// onto the boundary voxels.
    pub fn voxel_at_point(&self, p: Vec3A) -> V {
        *self.read().voxel_by_coordinates(p)
    }

    #[inline]
    pub fn voxel_index_from_point(&self, p: Vec3A) -> VoxelIndex {
        self.indexer.voxel_index_from_point(self.origin, p)
    }

    #[inline]
    pub fn linear_index_from_point(&self, p: Vec3A) -> usize {
        self.indexer.linear_index(self.voxel_index_from_point(p))
    }

    /// The world coordinates of the center of the voxel at `voxel`.
    pub fn voxel_center(&self, voxel: VoxelIndex) -> Vec3A {
        self.origin + (voxel.as_vec3a() + Vec3A::splat(0.5)) * self.voxel_size()
    }

    /// Fixed per-block overhead plus voxel storage. Meant for diagnostics, not as an exact heap measurement.
    pub fn memory_size(&self) -> usize {
        mem::size_of::<Self>() + self.num_voxels() * mem::size_of::<V>()
    }

    /// An independent copy of the block with the same origin, voxels and `has_data` flag.
    pub fn deep_clone(&self) -> Self {
        let voxels = self.voxels.read().clone();
        Self {
            origin: self.origin,
            indexer: self.indexer,
            has_data: AtomicBool::new(self.has_data()),
            voxels: RwLock::new(voxels),
        }
    }
}

/// Shared access to the voxels of a [`Block`].
pub struct BlockReadGuard<'a, V> {
    block: &'a Block<V>,
    voxels: RwLockReadGuard<'a, Box<[V]>>,
}

impl<'a, V: Voxel> BlockReadGuard<'a, V> {
    pub fn voxels(&self) -> &[V] {
        &self.voxels
    }

    #[inline]
    pub fn voxel_by_linear_index(&self, linear_index: usize) -> &V {
        &self.voxels[checked_linear_index(linear_index, self.voxels.len())]
    }

    #[inline]
    pub fn voxel_by_voxel_index(&self, voxel: VoxelIndex) -> &V {
        &self.voxels[self.block.indexer.linear_index(voxel)]
    }

    #[inline]
    pub fn voxel_by_coordinates(&self, p: Vec3A) -> &V {
        &self.voxels[self.block.linear_index_from_point(p)]
    }
}

/// Exclusive access to the voxels of a [`Block`]. Mutable accessors mark the block as having data.
pub struct BlockWriteGuard<'a, V> {
    block: &'a Block<V>,
    voxels: RwLockWriteGuard<'a, Box<[V]>>,
}

impl<'a, V: Voxel> BlockWriteGuard<'a, V> {
    pub fn voxels(&self) -> &[V] {
        &self.voxels
    }

    pub fn voxels_mut(&mut self) -> &mut [V] {
        self.block.mark_has_data();
        &mut self.voxels
    }

    #[inline]
    pub fn voxel_by_linear_index(&self, linear_index: usize) -> &V {
        &self.voxels[checked_linear_index(linear_index, self.voxels.len())]
    }

    #[inline]
    pub fn voxel_by_coordinates(&self, p: Vec3A) -> &V {
        &self.voxels[self.block.linear_index_from_point(p)]
    }

    #[inline]
    pub fn voxel_by_linear_index_mut(&mut self, linear_index: usize) -> &mut V {
        let i = checked_linear_index(linear_index, self.voxels.len());
        self.block.mark_has_data();
        &mut self.voxels[i]
    }

    #[inline]
    pub fn voxel_by_voxel_index_mut(&mut self, voxel: VoxelIndex) -> &mut V {
        let i = self.block.indexer.linear_index(voxel);
        self.block.mark_has_data();
        &mut self.voxels[i]
    }

    #[inline]
    pub fn voxel_by_coordinates_mut(&mut self, p: Vec3A) -> &mut V {
        let i = self.block.linear_index_from_point(p);
        self.block.mark_has_data();
        &mut self.voxels[i]
    }
}

#[inline]
fn checked_linear_index(linear_index: usize, num_voxels: usize) -> usize {
    assert!(
        linear_index < num_voxels,
        "linear voxel index {} out of range for a block of {} voxels",
        linear_index,
        num_voxels
    );
    linear_index
}

// ████████╗███████╗███████╗████████╗
// ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝
//    ██║   █████╗  ███████╗   ██║
//    ██║   ██╔══╝  ╚════██║   ██║
//    ██║   ███████╗███████║   ██║
//    ╚═╝   ╚══════╝╚══════╝   ╚═╝
