use crate::block::Block;
use crate::config::LayerConfig;
use crate::coordinates::{BlockIndex, BlockIndexer};
use crate::error::MapError;
use crate::voxel::Voxel;

use parking_lot::RwLock;
use std::sync::Arc;
use strata_core::glam::{IVec3, Vec3A};
use strata_core::ilattice::prelude::Extent;
use strata_core::{SmallKeyHashMap, SmallKeyHashSet};

/// A sparse, unbounded grid of [`Block`]s of one voxel type, keyed by [`BlockIndex`].
///
/// Blocks are allocated lazily and live as long as the layer (or any outstanding `Arc` handle). All methods take `&self`:
/// the block map is guarded by one `RwLock` that is only held for writing while inserting a missing block, and each block
/// guards its own voxels. This makes it fine for many threads to allocate and fuse into the same layer at once.
pub struct Layer<V> {
    indexer: BlockIndexer,
    map: RwLock<BlockMap<V>>,
}

struct BlockMap<V> {
    blocks: SmallKeyHashMap<BlockIndex, Arc<Block<V>>>,
    /// Inclusive `(min, max)` over the indices of all allocated blocks.
    index_bounds: Option<(IVec3, IVec3)>,
}

impl<V> Default for BlockMap<V> {
    fn default() -> Self {
        Self {
            blocks: SmallKeyHashMap::default(),
            index_bounds: None,
        }
    }
}

impl<V: Voxel> Layer<V> {
    /// # Panics
    ///
    /// If `voxel_size` is not positive or `voxels_per_side` is zero. Use [`Layer::from_config`] for unchecked input.
    pub fn new(voxel_size: f32, voxels_per_side: u32) -> Self {
        Self::with_indexer(BlockIndexer::new(voxel_size, voxels_per_side))
    }

    pub fn from_config(config: &LayerConfig) -> Result<Self, MapError> {
        config.validate()?;
        Ok(Self::new(config.voxel_size, config.voxels_per_side))
    }

    pub fn with_indexer(indexer: BlockIndexer) -> Self {
        Self {
            indexer,
            map: RwLock::new(BlockMap::default()),
        }
    }

    #[inline]
    pub fn indexer(&self) -> &BlockIndexer {
        &self.indexer
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

    /// Returns the block at `index`, inserting an empty one if it doesn't exist yet. Concurrent callers asking for the same
    /// missing index all get the same block.
    pub fn allocate_block_by_index(&self, index: BlockIndex) -> Arc<Block<V>> {
        if let Some(block) = self.map.read().blocks.get(&index) {
            return block.clone();
        }

        let mut map = self.map.write();
        let BlockMap {
            blocks,
            index_bounds,
        } = &mut *map;
        // Another writer may have inserted the block while we waited for the lock; the entry API covers that case.
        let indexer = self.indexer;
        blocks
            .entry(index)
            .or_insert_with(|| {
                *index_bounds = Some(match *index_bounds {
                    Some((min, max)) => (min.min(index), max.max(index)),
                    None => (index, index),
                });
                Arc::new(Block::new(indexer, indexer.block_origin(index)))
            })
            .clone()
    }

    pub fn allocate_block_by_point(&self, p: Vec3A) -> Arc<Block<V>> {
        self.allocate_block_by_index(self.indexer.block_index_from_point(p))
    }

    /// Read-only lookup.
    pub fn get_block_by_index(&self, index: BlockIndex) -> Result<Arc<Block<V>>, MapError> {
        self.block_by_index(index)
            .ok_or(MapError::BlockNotFound { index })
    }

    pub fn block_by_index(&self, index: BlockIndex) -> Option<Arc<Block<V>>> {
        self.map.read().blocks.get(&index).cloned()
    }

    pub fn block_by_point(&self, p: Vec3A) -> Option<Arc<Block<V>>> {
        self.block_by_index(self.indexer.block_index_from_point(p))
    }

    pub fn contains_block(&self, index: BlockIndex) -> bool {
        self.map.read().blocks.contains_key(&index)
    }

    /// Copy of the voxel containing `p`, or `None` if its block is not allocated.
    pub fn voxel_by_point(&self, p: Vec3A) -> Option<V> {
        self.block_by_point(p).map(|block| block.voxel_at_point(p))
    }

    pub fn num_allocated_blocks(&self) -> usize {
        self.map.read().blocks.len()
    }

    pub fn all_allocated_block_indices(&self) -> SmallKeyHashSet<BlockIndex> {
        self.map.read().blocks.keys().copied().collect()
    }

    /// Indices of the blocks that have had any voxel written.
    pub fn blocks_with_data(&self) -> Vec<BlockIndex> {
        self.map
            .read()
            .blocks
            .iter()
            .filter(|(_, block)| block.has_data())
            .map(|(index, _)| *index)
            .collect()
    }

    /// A snapshot of the block handles. Blocks allocated after this call are not included, but the voxels of included
    /// blocks may still change.
    pub fn blocks(&self) -> Vec<(BlockIndex, Arc<Block<V>>)> {
        self.map
            .read()
            .blocks
            .iter()
            .map(|(index, block)| (*index, block.clone()))
            .collect()
    }

    /// The world-space box covering every allocated block, or `None` for an empty layer.
    pub fn allocated_aabb(&self) -> Option<Extent<Vec3A>> {
        let (min, max) = self.map.read().index_bounds?;
        Some(Extent::from_min_and_lub(
            self.indexer.block_origin(min),
            self.indexer.block_origin(max + IVec3::ONE),
        ))
    }

    /// Sum of [`Block::memory_size`] over all allocated blocks.
    pub fn memory_size(&self) -> usize {
        self.map
            .read()
            .blocks
            .values()
            .map(|block| block.memory_size())
            .sum()
    }

    /// An independent copy of the whole layer.
    pub fn deep_clone(&self) -> Self {
        let map = self.map.read();
        Self {
            indexer: self.indexer,
            map: RwLock::new(BlockMap {
                blocks: map
                    .blocks
                    .iter()
                    .map(|(index, block)| (*index, Arc::new(block.deep_clone())))
                    .collect(),
                index_bounds: map.index_bounds,
            }),
        }
    }
}

// ████████╗███████╗███████╗████████╗
// ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝
//    ██║   █████╗  ███████╗   ██║
//    ██║   ██╔══╝  ╚════██║   ██║
//    ██║   ███████╗███████║   ██║
//    ╚═╝   ╚══════╝╚══════╝   ╚═╝
