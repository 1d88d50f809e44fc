//! End-to-end fusion of color measurements onto a surface described by a TSDF layer.

use strata_map::strata_core::glam::{IVec3, Vec3A};
use strata_map::{
    is_same_layer, surface_along_ray, Color, ColorVoxel, IntegratorConfig, Layer, RayFusionIntegrator, TsdfVoxel,
};

const VOXEL_SIZE: f32 = 0.1;
const ORIGIN: Vec3A = Vec3A::new(-0.6, 0.45, 0.45);
const MAX_DISTANCE: f32 = 2.0;

/// One block at the origin with a surface between voxels `(3, 4, 4)` and `(4, 4, 4)`. Nothing else is observed.
fn surface_pair() -> Layer<TsdfVoxel> {
    let layer = Layer::new(VOXEL_SIZE, 8);
    let block = layer.allocate_block_by_index(IVec3::ZERO);
    let mut voxels = block.write();
    *voxels.voxel_by_voxel_index_mut(IVec3::new(3, 4, 4)) = TsdfVoxel {
        distance: 0.05,
        weight: 1.0,
        ..Default::default()
    };
    *voxels.voxel_by_voxel_index_mut(IVec3::new(4, 4, 4)) = TsdfVoxel {
        distance: -0.05,
        weight: 1.0,
        ..Default::default()
    };
    drop(voxels);
    layer
}

fn config() -> IntegratorConfig {
    IntegratorConfig {
        max_distance: MAX_DISTANCE,
        ..Default::default()
    }
}

#[test]
fn crossing_lies_between_the_voxel_centers() {
    let tsdf = surface_pair();
    let hit = surface_along_ray(&tsdf, ORIGIN, Vec3A::X, MAX_DISTANCE).unwrap();

    assert!(hit.point.x > 0.35 && hit.point.x < 0.45, "{:?}", hit);
    assert!((hit.point.y - 0.45).abs() < 1e-6);
    assert!((hit.point.z - 0.45).abs() < 1e-6);
    assert!(hit.distance_along_ray > 0.95 && hit.distance_along_ray < 1.05);
}

#[test]
fn fused_color_is_propagated_to_unobserved_neighbors_only() {
    let tsdf = surface_pair();
    let colors = Layer::<ColorVoxel>::new(VOXEL_SIZE, 8);
    let hit = surface_along_ray(&tsdf, ORIGIN, Vec3A::X, MAX_DISTANCE).unwrap().point;

    // This neighbor was already observed, so propagation must leave it alone.
    let observed_neighbor = hit + Vec3A::X * (2.0 * VOXEL_SIZE);
    let observed = ColorVoxel {
        color: Color::BLUE,
        weight: 5.0,
    };
    *colors
        .allocate_block_by_point(observed_neighbor)
        .write()
        .voxel_by_coordinates_mut(observed_neighbor) = observed;

    let integrator = RayFusionIntegrator::new(config(), &tsdf, &colors).unwrap();
    let stats = integrator.integrate_batch(ORIGIN, &[Vec3A::X], &[Color::RED]).unwrap();
    assert_eq!(stats.surface_hits, 1);
    assert_eq!(stats.voxels_seeded, 3);

    let fresh = ColorVoxel {
        color: Color::RED,
        weight: 1.0,
    };
    assert_eq!(colors.voxel_by_point(hit).unwrap(), fresh);
    for offset in [-2.0, -1.0, 1.0] {
        let p = hit + Vec3A::X * (offset * VOXEL_SIZE);
        assert_eq!(colors.voxel_by_point(p).unwrap(), fresh, "offset {}", offset);
    }
    assert_eq!(colors.voxel_by_point(observed_neighbor).unwrap(), observed);

    // The distance layer is only read.
    assert!(is_same_layer(&tsdf, &surface_pair()));
}

#[test]
fn ray_that_misses_mutates_nothing() {
    let tsdf = surface_pair();
    let colors = Layer::<ColorVoxel>::new(VOXEL_SIZE, 8);
    colors.allocate_block_by_index(IVec3::new(-1, 0, 0));
    let before = colors.deep_clone();

    let integrator = RayFusionIntegrator::new(config(), &tsdf, &colors).unwrap();
    let stats = integrator
        .integrate_batch(ORIGIN, &[-Vec3A::X, Vec3A::Z], &[Color::RED, Color::GREEN])
        .unwrap();

    assert_eq!(stats.misses, 2);
    assert!(is_same_layer(&colors, &before));
    assert!(colors.blocks_with_data().is_empty());
}

#[test]
fn concurrent_batches_share_one_target() {
    let tsdf = surface_pair();
    let colors = Layer::<ColorVoxel>::new(VOXEL_SIZE, 8);
    let integrator = RayFusionIntegrator::new(config(), &tsdf, &colors).unwrap();
    let integrator = &integrator;

    let bearings = vec![Vec3A::X; 25];
    let measurements = vec![Color::RED; 25];
    crossbeam::scope(|scope| {
        for _ in 0..4 {
            let (bearings, measurements) = (&bearings, &measurements);
            scope.spawn(move |_| {
                integrator
                    .integrate_batch(ORIGIN, bearings, measurements)
                    .unwrap()
            });
        }
    })
    .unwrap();

    let hit = surface_along_ray(&tsdf, ORIGIN, Vec3A::X, MAX_DISTANCE).unwrap().point;
    let surface = colors.voxel_by_point(hit).unwrap();
    assert_eq!(surface.color, Color::RED);
    assert_eq!(surface.weight, 100.0);

    // Each neighbor is seeded exactly once, whichever thread gets there first.
    let neighbor = colors.voxel_by_point(hit - Vec3A::X * VOXEL_SIZE).unwrap();
    assert_eq!(
        neighbor,
        ColorVoxel {
            color: Color::RED,
            weight: 1.0
        }
    );
}
