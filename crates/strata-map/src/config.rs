use crate::error::{IntegrationError, MapError};

use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Serialize)]
#[serde(default)]
pub struct LayerConfig {
    /// Edge length of one voxel in meters.
    pub voxel_size: f32,
    pub voxels_per_side: u32,
}

impl Default for LayerConfig {
    fn default() -> Self {
        Self {
            voxel_size: 0.2,
            voxels_per_side: 16,
        }
    }
}

impl LayerConfig {
    pub fn validate(&self) -> Result<(), MapError> {
        if !(self.voxel_size.is_finite() && self.voxel_size > 0.0) {
            return Err(MapError::InvalidLayerConfig(format!(
                "voxel_size must be positive, got {}",
                self.voxel_size
            )));
        }
        if self.voxels_per_side == 0 {
            return Err(MapError::InvalidLayerConfig(
                "voxels_per_side must be at least 1".to_owned(),
            ));
        }
        Ok(())
    }
}

#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Serialize)]
#[serde(default)]
pub struct RayMarchConfig {
    /// Sampling step as a fraction of the voxel size. Values outside of `(0, 1]` are clamped, so the march never skips a
    /// voxel.
    pub step_fraction: f32,
    /// Observed samples with `|distance|` at or below this are reported as a surface on their own.
    pub zero_crossing_epsilon: f32,
}

impl Default for RayMarchConfig {
    fn default() -> Self {
        Self {
            step_fraction: 0.5,
            zero_crossing_epsilon: 1e-4,
        }
    }
}

impl RayMarchConfig {
    pub(crate) const MIN_STEP_FRACTION: f32 = 0.01;

    pub fn clamped_step_fraction(&self) -> f32 {
        if self.step_fraction.is_nan() {
            return 1.0;
        }
        self.step_fraction.clamp(Self::MIN_STEP_FRACTION, 1.0)
    }
}

#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Serialize)]
#[serde(default)]
pub struct IntegratorConfig {
    /// How far along each ray to search for a surface.
    pub max_distance: f32,
    /// Accumulated voxel weights saturate here.
    pub max_weight: f32,
    /// The weight of one fused measurement.
    pub measurement_weight: f32,
    /// How many voxel steps to walk in each direction along the ray when seeding unobserved voxels.
    pub propagation_voxel_radius: u32,
    /// Voxels with less weight than this count as unobserved and may be seeded.
    pub unobserved_weight_threshold: f32,
    pub ray_march: RayMarchConfig,
}

impl Default for IntegratorConfig {
    fn default() -> Self {
        Self {
            max_distance: 15.0,
            max_weight: 100.0,
            measurement_weight: 1.0,
            propagation_voxel_radius: 2,
            unobserved_weight_threshold: 1e-6,
            ray_march: RayMarchConfig::default(),
        }
    }
}

impl IntegratorConfig {
    pub fn validate(&self) -> Result<(), IntegrationError> {
        let positive = |name: &str, value: f32| {
            if value.is_finite() && value > 0.0 {
                Ok(())
            } else {
                Err(IntegrationError::InvalidConfig(format!(
                    "{} must be positive, got {}",
                    name, value
                )))
            }
        };
        positive("max_distance", self.max_distance)?;
        positive("max_weight", self.max_weight)?;
        positive("measurement_weight", self.measurement_weight)?;
        if !(self.unobserved_weight_threshold >= 0.0) {
            return Err(IntegrationError::InvalidConfig(format!(
                "unobserved_weight_threshold must not be negative, got {}",
                self.unobserved_weight_threshold
            )));
        }
        Ok(())
    }
}
