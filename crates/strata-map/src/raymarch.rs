use crate::block::Block;
use crate::config::RayMarchConfig;
use crate::coordinates::{BlockIndex, BlockIndexer};
use crate::layer::Layer;
use crate::voxel::{DistanceVoxel, Voxel};

use std::sync::Arc;
use strata_core::geometry::Ray;
use strata_core::glam::Vec3A;
use strata_core::ilattice::prelude::Extent;

/// Read access to a distance field, which is all a [`RayMarcher`] needs.
pub trait BlockSource<V> {
    fn indexer(&self) -> &BlockIndexer;

    fn block_by_index(&self, index: BlockIndex) -> Option<Arc<Block<V>>>;

    /// Box covering all blocks; rays that never enter it can't hit anything.
    fn allocated_aabb(&self) -> Option<Extent<Vec3A>>;
}

impl<V: Voxel> BlockSource<V> for Layer<V> {
    fn indexer(&self) -> &BlockIndexer {
        Layer::indexer(self)
    }

    fn block_by_index(&self, index: BlockIndex) -> Option<Arc<Block<V>>> {
        Layer::block_by_index(self, index)
    }

    fn allocated_aabb(&self) -> Option<Extent<Vec3A>> {
        Layer::allocated_aabb(self)
    }
}

/// Where a ray first crosses from positive to negative distance.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SurfaceHit {
    pub point: Vec3A,
    pub distance_along_ray: f32,
}

/// An observed distance sample along the ray.
#[derive(Clone, Copy, Debug)]
struct Sample {
    /// Ray time of the sample point.
    t: f32,
    /// Ray time of the projection of the sampled voxel's center.
    t_center: f32,
    distance: f32,
}

/// Walks rays through a distance field in steps of at most one voxel.
///
/// Sample times are `i * step` for integer `i`, so the result only depends on the ray, the configuration and the voxels
/// along the ray.
#[derive(Clone, Copy, Debug, Default)]
pub struct RayMarcher {
    config: RayMarchConfig,
}

impl RayMarcher {
    pub fn new(config: RayMarchConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RayMarchConfig {
        &self.config
    }

    /// Finds the first surface crossing within `max_distance` of `origin` along `bearing` (which need not be normalized).
    ///
    /// Unallocated blocks and unobserved voxels are skipped. A crossing is reported between two successive observed samples
    /// that go from positive to negative distance, linearly interpolated between their voxel centers; an observed sample
    /// within `zero_crossing_epsilon` of zero is a hit by itself. Returns `None` if there is no such crossing.
    ///
    /// Only the front side of a surface counts: a ray that starts behind a surface and walks out of it (negative to
    /// positive) is not a hit.
    pub fn surface_along_ray<V, S>(
        &self,
        source: &S,
        origin: Vec3A,
        bearing: Vec3A,
        max_distance: f32,
    ) -> Option<SurfaceHit>
    where
        V: DistanceVoxel,
        S: BlockSource<V> + ?Sized,
    {
        if !(max_distance > 0.0) {
            return None;
        }
        let ray = Ray::from_bearing(origin, bearing)?;
        let [t_enter, t_exit] = ray.cast_at_extent(source.allocated_aabb()?)?;
        let t_end = t_exit.min(max_distance);
        let t_begin = t_enter.max(0.0);
        if t_begin > t_end {
            return None;
        }

        let indexer = source.indexer();
        let step = indexer.voxel_size() * self.config.clamped_step_fraction();
        let first_step = (t_begin / step).floor() as u64;
        let last_step = (t_end / step).floor() as u64;

        let mut cached_block: Option<(BlockIndex, Option<Arc<Block<V>>>)> = None;
        let mut previous: Option<Sample> = None;
        for i in first_step..=last_step {
            let t = i as f32 * step;
            let p = ray.position_at(t);

            let block_index = indexer.block_index_from_point(p);
            let block = match &cached_block {
                Some((cached_index, block)) if *cached_index == block_index => block.clone(),
                _ => {
                    let block = source.block_by_index(block_index);
                    cached_block = Some((block_index, block.clone()));
                    block
                }
            };
            let block = match block {
                Some(b) => b,
                // Treat unallocated space as unobserved.
                None => continue,
            };

            let (voxel_index, voxel) = {
                let voxels = block.read();
                let voxel_index = block.voxel_index_from_point(p);
                (voxel_index, *voxels.voxel_by_voxel_index(voxel_index))
            };
            if !voxel.is_observed() {
                continue;
            }

            let distance = voxel.distance();
            if distance.abs() <= self.config.zero_crossing_epsilon {
                return Some(hit_at(&ray, t));
            }

            let sample = Sample {
                t,
                t_center: (block.voxel_center(voxel_index) - ray.start).dot(ray.velocity()),
                distance,
            };
            if let Some(prev) = previous {
                if prev.distance > 0.0 && distance < 0.0 {
                    let t_hit = interpolate_crossing(prev, sample).clamp(0.0, max_distance);
                    return Some(hit_at(&ray, t_hit));
                }
            }
            previous = Some(sample);
        }

        None
    }
}

fn hit_at(ray: &Ray, t: f32) -> SurfaceHit {
    SurfaceHit {
        point: ray.position_at(t),
        distance_along_ray: t,
    }
}

/// Linear zero crossing of the distances at the two voxel centers. Falls back to the sample times when the centers don't
/// advance along the ray.
fn interpolate_crossing(prev: Sample, next: Sample) -> f32 {
    let fraction = prev.distance / (prev.distance - next.distance);
    let (t0, t1) = if next.t_center > prev.t_center {
        (prev.t_center, next.t_center)
    } else {
        (prev.t, next.t)
    };
    t0 + fraction * (t1 - t0)
}

/// [`RayMarcher::surface_along_ray`] with the default configuration.
pub fn surface_along_ray<V, S>(source: &S, origin: Vec3A, bearing: Vec3A, max_distance: f32) -> Option<SurfaceHit>
where
    V: DistanceVoxel,
    S: BlockSource<V> + ?Sized,
{
    RayMarcher::default().surface_along_ray(source, origin, bearing, max_distance)
}

// ████████╗███████╗███████╗████████╗
// ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝
//    ██║   █████╗  ███████╗   ██║
//    ██║   ██╔══╝  ╚════██║   ██║
//    ██║   ███████╗███████║   ██║
//    ╚═╝   ╚══════╝╚══════╝   ╚═╝
