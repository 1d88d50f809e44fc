use crate::config::IntegratorConfig;
use crate::error::IntegrationError;
use crate::layer::Layer;
use crate::raymarch::{RayMarcher, SurfaceHit};
use crate::voxel::{DistanceVoxel, FusionVoxel};

use rayon::prelude::*;
use std::sync::atomic::{AtomicBool, Ordering};
use strata_core::glam::Vec3A;
use strata_core::work_timer::WorkTimer;

/// Counters for one fused batch.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct BatchStats {
    /// Rays that were processed (less than the batch size if the batch was cancelled).
    pub rays: usize,
    pub surface_hits: usize,
    pub misses: usize,
    /// Unobserved voxels that received a raw measurement by propagation.
    pub voxels_seeded: usize,
    pub cancelled: bool,
}

impl BatchStats {
    fn record(mut self, outcome: RayOutcome) -> Self {
        self.rays += 1;
        match outcome {
            RayOutcome::Miss => self.misses += 1,
            RayOutcome::Hit { voxels_seeded } => {
                self.surface_hits += 1;
                self.voxels_seeded += voxels_seeded;
            }
        }
        self
    }

    fn merge(self, other: Self) -> Self {
        Self {
            rays: self.rays + other.rays,
            surface_hits: self.surface_hits + other.surface_hits,
            misses: self.misses + other.misses,
            voxels_seeded: self.voxels_seeded + other.voxels_seeded,
            cancelled: self.cancelled || other.cancelled,
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum RayOutcome {
    /// No surface within the search distance; nothing was written.
    Miss,
    Hit { voxels_seeded: usize },
}

/// Fuses per-ray measurements (colors, intensities, ...) into a target layer at the surface points found by marching the
/// rays through a distance layer.
///
/// The distance layer is only ever read. Each touched target voxel is updated under its block's write lock, so batches
/// can be fused from many threads at once and an abandoned batch leaves the target layer consistent.
pub struct RayFusionIntegrator<'a, D, V> {
    config: IntegratorConfig,
    marcher: RayMarcher,
    distance_layer: &'a Layer<D>,
    target_layer: &'a Layer<V>,
}

impl<'a, D, V> RayFusionIntegrator<'a, D, V>
where
    D: DistanceVoxel,
    V: FusionVoxel,
{
    pub fn new(
        config: IntegratorConfig,
        distance_layer: &'a Layer<D>,
        target_layer: &'a Layer<V>,
    ) -> Result<Self, IntegrationError> {
        config.validate()?;
        Ok(Self {
            config,
            marcher: RayMarcher::new(config.ray_march),
            distance_layer,
            target_layer,
        })
    }

    pub fn config(&self) -> &IntegratorConfig {
        &self.config
    }

    /// Fuses one measurement per bearing vector. All rays share `origin`.
    ///
    /// Fails without touching either layer if the slices have different lengths. Rays that don't hit a surface are skipped.
    pub fn integrate_batch(
        &self,
        origin: Vec3A,
        bearings: &[Vec3A],
        measurements: &[V::Measurement],
    ) -> Result<BatchStats, IntegrationError> {
        self.integrate_batch_inner(origin, bearings, measurements, None)
    }

    /// Like [`Self::integrate_batch`], but stops before the next ray once `cancel` is set. Rays fused before that point stay
    /// fused.
    pub fn integrate_batch_cancellable(
        &self,
        origin: Vec3A,
        bearings: &[Vec3A],
        measurements: &[V::Measurement],
        cancel: &AtomicBool,
    ) -> Result<BatchStats, IntegrationError> {
        self.integrate_batch_inner(origin, bearings, measurements, Some(cancel))
    }

    fn integrate_batch_inner(
        &self,
        origin: Vec3A,
        bearings: &[Vec3A],
        measurements: &[V::Measurement],
        cancel: Option<&AtomicBool>,
    ) -> Result<BatchStats, IntegrationError> {
        check_batch(bearings, measurements)?;

        let mut timer = WorkTimer::start("ray_fusion/integrate");
        let mut stats = BatchStats::default();
        for (&bearing, &measurement) in bearings.iter().zip(measurements.iter()) {
            if cancel.map_or(false, |c| c.load(Ordering::Relaxed)) {
                log::debug!("ray fusion batch cancelled after {} of {} rays", stats.rays, bearings.len());
                stats.cancelled = true;
                break;
            }
            stats = stats.record(self.integrate_ray(origin, bearing, measurement));
        }
        timer.complete_items(stats.rays as u32);
        self.finish_batch(timer, stats);

        Ok(stats)
    }

    /// Fuses the rays of one batch on the rayon thread pool.
    ///
    /// Rays that land in the same voxel are blended in an unspecified order, so weighted averages may differ from the
    /// sequential result by float rounding.
    pub fn integrate_batch_parallel(
        &self,
        origin: Vec3A,
        bearings: &[Vec3A],
        measurements: &[V::Measurement],
    ) -> Result<BatchStats, IntegrationError> {
        check_batch(bearings, measurements)?;

        let mut timer = WorkTimer::start("ray_fusion/integrate_parallel");
        let stats = bearings
            .par_iter()
            .zip(measurements.par_iter())
            .fold(BatchStats::default, |stats, (&bearing, &measurement)| {
                stats.record(self.integrate_ray(origin, bearing, measurement))
            })
            .reduce(BatchStats::default, BatchStats::merge);
        timer.complete_items(stats.rays as u32);
        self.finish_batch(timer, stats);

        Ok(stats)
    }

    /// Fuses a single ray's measurement: blends it into the surface voxel, then seeds unobserved voxels along the ray within
    /// the propagation radius.
    pub fn integrate_ray(&self, origin: Vec3A, bearing: Vec3A, measurement: V::Measurement) -> RayOutcome {
        let hit = match self.marcher.surface_along_ray(
            self.distance_layer,
            origin,
            bearing,
            self.config.max_distance,
        ) {
            Some(hit) => hit,
            None => {
                log::trace!("no surface along ray {} from {}", bearing, origin);
                return RayOutcome::Miss;
            }
        };
        // A hit implies the bearing could be normalized.
        let direction = bearing.normalize_or_zero();

        self.fuse_surface_voxel(hit, measurement);
        let voxels_seeded = self.propagate_along_ray(hit, direction, measurement);

        RayOutcome::Hit { voxels_seeded }
    }

    fn fuse_surface_voxel(&self, hit: SurfaceHit, measurement: V::Measurement) {
        let block = self.target_layer.allocate_block_by_point(hit.point);
        let mut voxels = block.write();
        voxels.voxel_by_coordinates_mut(hit.point).fuse(
            measurement,
            self.config.measurement_weight,
            self.config.max_weight,
        );
    }

    fn propagate_along_ray(&self, hit: SurfaceHit, direction: Vec3A, measurement: V::Measurement) -> usize {
        let radius = self.config.propagation_voxel_radius as i64;
        let voxel_size = self.target_layer.voxel_size();

        let mut voxels_seeded = 0;
        for offset in -radius..=radius {
            let p = hit.point + direction * (offset as f32 * voxel_size);
            let block = self.target_layer.allocate_block_by_point(p);
            let mut voxels = block.write();
            if voxels.voxel_by_coordinates(p).weight() < self.config.unobserved_weight_threshold {
                voxels
                    .voxel_by_coordinates_mut(p)
                    .seed(measurement, self.config.max_weight);
                voxels_seeded += 1;
            }
        }
        voxels_seeded
    }

    fn finish_batch(&self, timer: WorkTimer, stats: BatchStats) {
        timer.finish();
        log::debug!("fused {} batch into {} blocks: {:?}", V::KIND, self.target_layer.num_allocated_blocks(), stats);
    }
}

fn check_batch<B, M>(bearings: &[B], measurements: &[M]) -> Result<(), IntegrationError> {
    if bearings.len() != measurements.len() {
        return Err(IntegrationError::MismatchedBatch {
            bearings: bearings.len(),
            measurements: measurements.len(),
        });
    }
    Ok(())
}

// ████████╗███████╗███████╗████████╗
// ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝
//    ██║   █████╗  ███████╗   ██║
//    ██║   ██╔══╝  ╚════██║   ██║
//    ██║   ███████╗███████║   ██║
//    ╚═╝   ╚══════╝╚══════╝   ╚═╝

#[cfg(test)]
mod test {
    use super::*;
    use crate::voxel::{IntensityVoxel, TsdfVoxel};
    use strata_core::approx::assert_relative_eq;
    use strata_core::glam::IVec3;

    /// A wall at `x = 1.0` spanning the block at the origin of a layer with 0.25 m voxels and 8 voxels per side.
    fn wall_layer() -> Layer<TsdfVoxel> {
        let layer = Layer::<TsdfVoxel>::new(0.25, 8);
        let block = layer.allocate_block_by_index(IVec3::ZERO);
        let mut voxels = block.write();
        for i in 0..block.num_voxels() {
            let center = block.voxel_center(layer.indexer().voxel_index_from_linear(i));
            let voxel = voxels.voxel_by_linear_index_mut(i);
            voxel.distance = 1.0 - center.x;
            voxel.weight = 1.0;
        }
        drop(voxels);
        layer
    }

    const ORIGIN: Vec3A = Vec3A::new(-1.0, 1.1, 1.1);

    #[test]
    fn mismatched_batch_is_rejected_without_mutation() {
        let distance = wall_layer();
        let target = Layer::<IntensityVoxel>::new(0.25, 8);
        let integrator = RayFusionIntegrator::new(IntegratorConfig::default(), &distance, &target).unwrap();

        let result = integrator.integrate_batch(ORIGIN, &[Vec3A::X, Vec3A::X], &[1.0]);
        assert_eq!(
            result,
            Err(IntegrationError::MismatchedBatch {
                bearings: 2,
                measurements: 1
            })
        );
        assert_eq!(target.num_allocated_blocks(), 0);
    }

    #[test]
    fn invalid_config_is_rejected() {
        let distance = wall_layer();
        let target = Layer::<IntensityVoxel>::new(0.25, 8);
        let config = IntegratorConfig {
            max_weight: 0.0,
            ..Default::default()
        };
        assert!(RayFusionIntegrator::new(config, &distance, &target).is_err());
    }

    #[test]
    fn miss_leaves_target_untouched() {
        let distance = wall_layer();
        let target = Layer::<IntensityVoxel>::new(0.25, 8);
        let integrator = RayFusionIntegrator::new(IntegratorConfig::default(), &distance, &target).unwrap();

        let stats = integrator
            .integrate_batch(ORIGIN, &[-Vec3A::X, Vec3A::Y, Vec3A::ZERO], &[1.0, 2.0, 3.0])
            .unwrap();

        assert_eq!(stats.misses, 3);
        assert_eq!(stats.surface_hits, 0);
        assert_eq!(target.num_allocated_blocks(), 0);
    }

    #[test]
    fn hit_fuses_and_seeds_along_ray() {
        let distance = wall_layer();
        let target = Layer::<IntensityVoxel>::new(0.25, 8);
        let integrator = RayFusionIntegrator::new(IntegratorConfig::default(), &distance, &target).unwrap();

        let stats = integrator.integrate_batch(ORIGIN, &[Vec3A::X], &[7.0]).unwrap();
        assert_eq!(stats.surface_hits, 1);
        // The surface voxel already has weight when propagation runs, so only the 4 neighbors are seeded.
        assert_eq!(stats.voxels_seeded, 4);

        let hit = surface_hit(&distance, Vec3A::X);
        assert_eq!(
            target.voxel_by_point(hit).unwrap(),
            IntensityVoxel { intensity: 7.0, weight: 1.0 }
        );
        for offset in [-2.0, -1.0, 1.0, 2.0] {
            let p = hit + Vec3A::X * (offset * 0.25);
            assert_eq!(
                target.voxel_by_point(p).unwrap(),
                IntensityVoxel { intensity: 7.0, weight: 1.0 },
                "offset {}",
                offset
            );
        }
    }

    #[test]
    fn repeated_fusion_blends_and_does_not_reseed() {
        let distance = wall_layer();
        let target = Layer::<IntensityVoxel>::new(0.25, 8);
        let integrator = RayFusionIntegrator::new(IntegratorConfig::default(), &distance, &target).unwrap();

        integrator.integrate_batch(ORIGIN, &[Vec3A::X], &[2.0]).unwrap();
        let stats = integrator.integrate_batch(ORIGIN, &[Vec3A::X], &[4.0]).unwrap();
        assert_eq!(stats.voxels_seeded, 0);

        let hit = surface_hit(&distance, Vec3A::X);
        let surface_voxel = target.voxel_by_point(hit).unwrap();
        assert_relative_eq!(surface_voxel.intensity, 3.0);
        assert_relative_eq!(surface_voxel.weight, 2.0);

        // Seeded neighbors keep their first value.
        let neighbor = target.voxel_by_point(hit + Vec3A::X * 0.25).unwrap();
        assert_eq!(neighbor, IntensityVoxel { intensity: 2.0, weight: 1.0 });
    }

    #[test]
    fn weight_saturates_at_max_weight() {
        let distance = wall_layer();
        let target = Layer::<IntensityVoxel>::new(0.25, 8);
        let config = IntegratorConfig {
            max_weight: 3.0,
            ..Default::default()
        };
        let integrator = RayFusionIntegrator::new(config, &distance, &target).unwrap();

        let hit = surface_hit(&distance, Vec3A::X);
        let mut last_weight = 0.0;
        for _ in 0..6 {
            integrator.integrate_batch(ORIGIN, &[Vec3A::X], &[1.0]).unwrap();
            let weight = target.voxel_by_point(hit).unwrap().weight;
            assert!(weight >= last_weight);
            assert!(weight <= 3.0);
            last_weight = weight;
        }
        assert_eq!(last_weight, 3.0);
    }

    #[test]
    fn cancelled_batch_stops_early() {
        let distance = wall_layer();
        let target = Layer::<IntensityVoxel>::new(0.25, 8);
        let integrator = RayFusionIntegrator::new(IntegratorConfig::default(), &distance, &target).unwrap();

        let cancel = AtomicBool::new(true);
        let stats = integrator
            .integrate_batch_cancellable(ORIGIN, &[Vec3A::X; 4], &[1.0; 4], &cancel)
            .unwrap();
        assert!(stats.cancelled);
        assert_eq!(stats.rays, 0);
        assert_eq!(target.num_allocated_blocks(), 0);
    }

    #[test]
    fn parallel_batch_matches_sequential_counts() {
        let distance = wall_layer();
        let bearings: Vec<Vec3A> = (0..64)
            .map(|i| {
                let angle = (i as f32 / 64.0 - 0.5) * 0.6;
                Vec3A::new(1.0, angle.sin(), angle.cos() * 0.1)
            })
            .collect();
        let measurements = vec![5.0f32; bearings.len()];

        let sequential = Layer::<IntensityVoxel>::new(0.25, 8);
        let stats_sequential = RayFusionIntegrator::new(IntegratorConfig::default(), &distance, &sequential)
            .unwrap()
            .integrate_batch(ORIGIN, &bearings, &measurements)
            .unwrap();

        let parallel = Layer::<IntensityVoxel>::new(0.25, 8);
        let stats_parallel = RayFusionIntegrator::new(IntegratorConfig::default(), &distance, &parallel)
            .unwrap()
            .integrate_batch_parallel(ORIGIN, &bearings, &measurements)
            .unwrap();

        assert_eq!(stats_parallel.rays, 64);
        assert_eq!(stats_parallel.surface_hits, stats_sequential.surface_hits);
        assert_eq!(stats_parallel.misses, stats_sequential.misses);
        assert_eq!(
            parallel.all_allocated_block_indices(),
            sequential.all_allocated_block_indices()
        );
        // Every measurement is identical, so blending order can't change any voxel value.
        for (index, block) in sequential.blocks() {
            let other = parallel.get_block_by_index(index).unwrap();
            for i in 0..block.num_voxels() {
                assert_eq!(
                    block.voxel_at_linear_index(i).intensity,
                    other.voxel_at_linear_index(i).intensity
                );
            }
        }
    }

    fn surface_hit(distance: &Layer<TsdfVoxel>, bearing: Vec3A) -> Vec3A {
        RayMarcher::default()
            .surface_along_ray(distance, ORIGIN, bearing, IntegratorConfig::default().max_distance)
            .unwrap()
            .point
    }
}
