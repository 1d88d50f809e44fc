use ndshape::{RuntimeShape, Shape};
use strata_core::glam::{IVec3, Vec3A};

/// Integer coordinates of a block in a [`Layer`](crate::Layer).
pub type BlockIndex = IVec3;
/// Coordinates of a voxel relative to the minimum corner of its block, in `[0, voxels_per_side)`.
pub type VoxelIndex = IVec3;
/// Coordinates of a voxel relative to the world origin.
pub type GlobalVoxelIndex = IVec3;

/// Nudges points that sit exactly on a grid plane (up to float error) onto the upper cell.
pub const COORDINATE_EPSILON: f32 = 1e-6;

#[inline]
fn grid_index_from_point(p: Vec3A, grid_size_inv: f32) -> IVec3 {
    (p * grid_size_inv + Vec3A::splat(COORDINATE_EPSILON))
        .floor()
        .as_ivec3()
}

/// The pure coordinate math shared by every layer with the same voxel size and block shape.
///
/// World points map to blocks by `floor(p / block_size)` and to voxels within a block by
/// `floor((p - block_origin) / voxel_size)`, clamped into the block. Voxels within a block are linearized in x-major order.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BlockIndexer {
    voxel_size: f32,
    voxel_size_inv: f32,
    voxels_per_side: u32,
    block_size: f32,
    block_size_inv: f32,
}

impl BlockIndexer {
    /// # Panics
    ///
    /// If `voxel_size` is not a positive finite number or `voxels_per_side` is zero.
    pub fn new(voxel_size: f32, voxels_per_side: u32) -> Self {
        assert!(
            voxel_size.is_finite() && voxel_size > 0.0,
            "voxel size must be positive, got {}",
            voxel_size
        );
        assert!(voxels_per_side > 0, "blocks need at least one voxel per side");
        let block_size = voxel_size * voxels_per_side as f32;
        Self {
            voxel_size,
            voxel_size_inv: 1.0 / voxel_size,
            voxels_per_side,
            block_size,
            block_size_inv: 1.0 / block_size,
        }
    }

    #[inline]
    pub fn voxel_size(&self) -> f32 {
        self.voxel_size
    }

    #[inline]
    pub fn voxels_per_side(&self) -> u32 {
        self.voxels_per_side
    }

    #[inline]
    pub fn block_size(&self) -> f32 {
        self.block_size
    }

    #[inline]
    pub fn num_voxels_per_block(&self) -> usize {
        (self.voxels_per_side as usize).pow(3)
    }

    pub fn block_shape(&self) -> RuntimeShape<u32, 3> {
        RuntimeShape::<u32, 3>::new([self.voxels_per_side; 3])
    }

    #[inline]
    pub fn block_index_from_point(&self, p: Vec3A) -> BlockIndex {
        grid_index_from_point(p, self.block_size_inv)
    }

    #[inline]
    pub fn block_origin(&self, index: BlockIndex) -> Vec3A {
        index.as_vec3a() * self.block_size
    }

    /// The voxel of the block at `block_origin` that contains `p`. Points outside of the block are clamped onto its
    /// boundary voxels.
    #[inline]
    pub fn voxel_index_from_point(&self, block_origin: Vec3A, p: Vec3A) -> VoxelIndex {
        let max = self.voxels_per_side as i32 - 1;
        grid_index_from_point(p - block_origin, self.voxel_size_inv).clamp(IVec3::ZERO, IVec3::splat(max))
    }

    /// Splits a global voxel index into the index of its block and its index within that block.
    pub fn split_global_voxel_index(&self, global: GlobalVoxelIndex) -> (BlockIndex, VoxelIndex) {
        let side = self.voxels_per_side as i32;
        let [x, y, z] = global.to_array();
        (
            IVec3::new(x.div_euclid(side), y.div_euclid(side), z.div_euclid(side)),
            IVec3::new(x.rem_euclid(side), y.rem_euclid(side), z.rem_euclid(side)),
        )
    }

    pub fn global_voxel_index(&self, block: BlockIndex, voxel: VoxelIndex) -> GlobalVoxelIndex {
        block * self.voxels_per_side as i32 + voxel
    }

    #[inline]
    pub fn voxel_center(&self, global: GlobalVoxelIndex) -> Vec3A {
        (global.as_vec3a() + Vec3A::splat(0.5)) * self.voxel_size
    }

    /// # Panics
    ///
    /// If `voxel` is not inside of the block.
    #[inline]
    pub fn linear_index(&self, voxel: VoxelIndex) -> usize {
        let side = self.voxels_per_side as i32;
        assert!(
            voxel.cmpge(IVec3::ZERO).all() && voxel.cmplt(IVec3::splat(side)).all(),
            "voxel index {} is outside of a block with {} voxels per side",
            voxel,
            side
        );
        self.block_shape().linearize(voxel.as_uvec3().to_array()) as usize
    }

    #[inline]
    pub fn voxel_index_from_linear(&self, linear_index: usize) -> VoxelIndex {
        let [x, y, z] = self.block_shape().delinearize(linear_index as u32);
        IVec3::new(x as i32, y as i32, z as i32)
    }
}

// ████████╗███████╗███████╗████████╗
// ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝
//    ██║   █████╗  ███████╗   ██║
//    ██║   ██╔══╝  ╚════██║   ██║
//    ██║   ███████╗███████║   ██║
//    ╚═╝   ╚══════╝╚══════╝   ╚═╝
