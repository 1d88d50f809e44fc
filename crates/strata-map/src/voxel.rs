use crate::color::Color;

use serde::{Deserialize, Serialize};
use std::mem;
use strata_core::approx::AbsDiffEq;
use strata_core::glam::IVec3;
use strata_core::static_assertions::const_assert_eq;

/// Weights below this are treated as "never observed" by distance queries.
pub const MIN_OBSERVED_WEIGHT: f32 = 1e-6;

/// The capabilities shared by every kind of voxel that can live in a [`Layer`](crate::Layer).
///
/// `Default` must be the never-observed state, since that is what new blocks are filled with.
pub trait Voxel: Copy + Default + Send + Sync + 'static {
    /// Short name of the voxel kind, used in logs.
    const KIND: &'static str;

    /// Floating point fields are compared within `tolerance`; discrete fields must match exactly.
    fn approx_eq(&self, other: &Self, tolerance: f32) -> bool;
}

/// A voxel that stores a signed distance to the nearest surface.
pub trait DistanceVoxel: Voxel {
    fn distance(&self) -> f32;

    fn is_observed(&self) -> bool;
}

/// A voxel that accumulates weighted measurements.
pub trait FusionVoxel: Voxel {
    type Measurement: Copy + Send + Sync;

    fn weight(&self) -> f32;

    /// Blends `measurement` into the current value in proportion to the weights, then accumulates the weight up to
    /// `max_weight`.
    fn fuse(&mut self, measurement: Self::Measurement, measurement_weight: f32, max_weight: f32);

    /// Overwrites the value with the raw `measurement` and adds a unit of weight (capped at `max_weight`).
    fn seed(&mut self, measurement: Self::Measurement, max_weight: f32);
}

fn accumulate_weight(old_weight: f32, measurement_weight: f32, max_weight: f32) -> f32 {
    (old_weight + measurement_weight).min(max_weight)
}

fn floats_eq(a: f32, b: f32, tolerance: f32) -> bool {
    a.abs_diff_eq(&b, tolerance)
}

/// Truncated signed distance with an optional color.
#[derive(Clone, Copy, Debug, Default, Deserialize, PartialEq, Serialize)]
pub struct TsdfVoxel {
    pub distance: f32,
    pub weight: f32,
    pub color: Color,
}

const_assert_eq!(mem::size_of::<Color>(), 4);
const_assert_eq!(mem::size_of::<TsdfVoxel>(), 12);

impl Voxel for TsdfVoxel {
    const KIND: &'static str = "tsdf";

    fn approx_eq(&self, other: &Self, tolerance: f32) -> bool {
        floats_eq(self.distance, other.distance, tolerance)
            && floats_eq(self.weight, other.weight, tolerance)
            && self.color == other.color
    }
}

impl DistanceVoxel for TsdfVoxel {
    #[inline]
    fn distance(&self) -> f32 {
        self.distance
    }

    #[inline]
    fn is_observed(&self) -> bool {
        self.weight >= MIN_OBSERVED_WEIGHT
    }
}

/// Euclidean signed distance, as produced by distance-field expansion.
#[derive(Clone, Copy, Debug, Default, Deserialize, PartialEq, Serialize)]
pub struct EsdfVoxel {
    pub distance: f32,
    pub observed: bool,
    /// Set while the voxel waits in the expansion queue.
    pub in_queue: bool,
    /// Set for voxels whose distance was copied from a TSDF and must not be relaxed.
    pub fixed: bool,
    /// Relative voxel offset to the neighbor that produced `distance`. Just a coordinate; resolve it against the owning
    /// layer when needed.
    #[serde(with = "ivec3_as_array")]
    pub parent: IVec3,
}

mod ivec3_as_array {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use strata_core::glam::IVec3;

    pub fn serialize<S: Serializer>(v: &IVec3, serializer: S) -> Result<S::Ok, S::Error> {
        v.to_array().serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<IVec3, D::Error> {
        <[i32; 3]>::deserialize(deserializer).map(IVec3::from_array)
    }
}

impl Voxel for EsdfVoxel {
    const KIND: &'static str = "esdf";

    fn approx_eq(&self, other: &Self, tolerance: f32) -> bool {
        floats_eq(self.distance, other.distance, tolerance)
            && self.observed == other.observed
            && self.in_queue == other.in_queue
            && self.fixed == other.fixed
            && self.parent == other.parent
    }
}

impl DistanceVoxel for EsdfVoxel {
    #[inline]
    fn distance(&self) -> f32 {
        self.distance
    }

    #[inline]
    fn is_observed(&self) -> bool {
        self.observed
    }
}

#[derive(Clone, Copy, Debug, Default, Deserialize, PartialEq, Serialize)]
pub struct OccupancyVoxel {
    pub probability_log: f32,
    pub observed: bool,
}

impl Voxel for OccupancyVoxel {
    const KIND: &'static str = "occupancy";

    fn approx_eq(&self, other: &Self, tolerance: f32) -> bool {
        floats_eq(self.probability_log, other.probability_log, tolerance) && self.observed == other.observed
    }
}

#[derive(Clone, Copy, Debug, Default, Deserialize, PartialEq, Serialize)]
pub struct ColorVoxel {
    pub color: Color,
    pub weight: f32,
}

const_assert_eq!(mem::size_of::<ColorVoxel>(), 8);

impl Voxel for ColorVoxel {
    const KIND: &'static str = "color";

    fn approx_eq(&self, other: &Self, tolerance: f32) -> bool {
        self.color == other.color && floats_eq(self.weight, other.weight, tolerance)
    }
}

impl FusionVoxel for ColorVoxel {
    type Measurement = Color;

    #[inline]
    fn weight(&self) -> f32 {
        self.weight
    }

    fn fuse(&mut self, measurement: Color, measurement_weight: f32, max_weight: f32) {
        self.color = Color::blend_two_colors(self.color, self.weight, measurement, measurement_weight);
        self.weight = accumulate_weight(self.weight, measurement_weight, max_weight);
    }

    fn seed(&mut self, measurement: Color, max_weight: f32) {
        self.color = measurement;
        self.weight = accumulate_weight(self.weight, 1.0, max_weight);
    }
}

/// A scalar measurement such as thermal or reflectance intensity.
#[derive(Clone, Copy, Debug, Default, Deserialize, PartialEq, Serialize)]
pub struct IntensityVoxel {
    pub intensity: f32,
    pub weight: f32,
}

const_assert_eq!(mem::size_of::<IntensityVoxel>(), 8);

impl Voxel for IntensityVoxel {
    const KIND: &'static str = "intensity";

    fn approx_eq(&self, other: &Self, tolerance: f32) -> bool {
        floats_eq(self.intensity, other.intensity, tolerance) && floats_eq(self.weight, other.weight, tolerance)
    }
}

impl FusionVoxel for IntensityVoxel {
    type Measurement = f32;

    #[inline]
    fn weight(&self) -> f32 {
        self.weight
    }

    fn fuse(&mut self, measurement: f32, measurement_weight: f32, max_weight: f32) {
        let total_weight = self.weight + measurement_weight;
        self.intensity = if total_weight > 0.0 {
            (self.intensity * self.weight + measurement * measurement_weight) / total_weight
        } else {
            measurement
        };
        self.weight = accumulate_weight(self.weight, measurement_weight, max_weight);
    }

    fn seed(&mut self, measurement: f32, max_weight: f32) {
        self.intensity = measurement;
        self.weight = accumulate_weight(self.weight, 1.0, max_weight);
    }
}

// ████████╗███████╗███████╗████████╗
// ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝
//    ██║   █████╗  ███████╗   ██║
//    ██║   ██╔══╝  ╚════██║   ██║
//    ██║   ███████╗███████║   ██║
//    ╚═╝   ╚══════╝╚══════╝   ╚═╝
