//! Deterministic layers for comparison and round-trip tests.

use crate::color::Color;
use crate::coordinates::BlockIndex;
use crate::layer::Layer;
use crate::voxel::{EsdfVoxel, OccupancyVoxel, TsdfVoxel, Voxel};

use strata_core::glam::IVec3;

/// Voxel kinds that [`set_up_test_layer`] knows how to fill.
pub trait TestLayerFill: Voxel {
    /// Writes a value derived only from the block index.
    fn fill_test_voxel(&mut self, block: BlockIndex);
}

fn channel(value: i32) -> u8 {
    value.rem_euclid(255) as u8
}

impl TestLayerFill for TsdfVoxel {
    fn fill_test_voxel(&mut self, block: BlockIndex) {
        let [x, y, z] = block.to_array();
        self.distance = (x * y) as f32 * 0.66 + z as f32;
        self.weight = (y * z) as f32 * 0.33 + x as f32;
        self.color = Color::new(channel(x), channel(y), channel(z), channel(x + y));
    }
}

impl TestLayerFill for EsdfVoxel {
    fn fill_test_voxel(&mut self, block: BlockIndex) {
        let [x, y, z] = block.to_array();
        self.distance = (x * y) as f32 * 0.66 + z as f32;
        self.parent = IVec3::new(x % 255, y % 255, z % 255);
        self.observed = true;
        self.in_queue = true;
        self.fixed = true;
    }
}

impl TestLayerFill for OccupancyVoxel {
    fn fill_test_voxel(&mut self, block: BlockIndex) {
        let [x, y, z] = block.to_array();
        self.probability_log = (x * y) as f32 * 0.66 + z as f32;
        self.observed = true;
    }
}

/// Allocates every block with indices in `[-diameter / 2, diameter / 2]^3` and fills one voxel per block.
///
/// The voxel at linear index `(x * z + y) mod voxels_per_side` of block `(x, y, z)` gets a value derived from the block
/// index, so two layers set up with the same arguments compare equal.
pub fn set_up_test_layer<V: TestLayerFill>(diameter: u32, layer: &Layer<V>) {
    let half = (diameter / 2) as i32;
    let side = layer.voxels_per_side() as i32;
    for z in -half..=half {
        for y in -half..=half {
            for x in -half..=half {
                let block = layer.allocate_block_by_index(IVec3::new(x, y, z));
                let linear_index = (x * z + y).rem_euclid(side) as usize;
                block
                    .write()
                    .voxel_by_linear_index_mut(linear_index)
                    .fill_test_voxel(IVec3::new(x, y, z));
            }
        }
    }

    log::info!(
        "set up a test {} layer of {} blocks ({:.3} MB)",
        V::KIND,
        layer.num_allocated_blocks(),
        layer.memory_size() as f64 * 1e-6
    );
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::compare::{compare_layers, is_same_layer, LayerMismatch, DEFAULT_TOLERANCE};

    #[test]
    fn test_layers_are_reproducible() {
        let a = Layer::<TsdfVoxel>::new(0.1, 8);
        let b = Layer::<TsdfVoxel>::new(0.1, 8);
        set_up_test_layer(4, &a);
        set_up_test_layer(4, &b);

        assert_eq!(a.num_allocated_blocks(), 125);
        assert_eq!(a.blocks_with_data().len(), 125);
        assert!(is_same_layer(&a, &b));
    }

    #[test]
    fn esdf_and_occupancy_layers_differ_from_empty_ones() {
        let esdf = Layer::<EsdfVoxel>::new(0.2, 4);
        set_up_test_layer(2, &esdf);
        let empty = Layer::<EsdfVoxel>::new(0.2, 4);
        for (index, _) in esdf.blocks() {
            empty.allocate_block_by_index(index);
        }
        assert!(matches!(
            compare_layers(&esdf, &empty, DEFAULT_TOLERANCE),
            Err(LayerMismatch::Voxel { .. })
        ));

        let occupancy = Layer::<OccupancyVoxel>::new(0.2, 4);
        set_up_test_layer(0, &occupancy);
        assert_eq!(occupancy.num_allocated_blocks(), 1);
        assert!(occupancy.get_block_by_index(IVec3::ZERO).unwrap().voxel_at_linear_index(0).observed);
    }
}
