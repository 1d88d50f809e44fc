use crate::glam::Vec3A;
use crate::ilattice::prelude::Extent;

#[derive(Clone, Copy, Debug)]
pub struct Ray {
    pub start: Vec3A,
    velocity: Vec3A,
    inverse_velocity: Vec3A,
}

impl Ray {
    pub fn new(start: Vec3A, velocity: Vec3A) -> Self {
        Self {
            start,
            velocity,
            inverse_velocity: 1.0 / velocity,
        }
    }

    /// A ray with unit velocity, so that ray time equals distance travelled. Returns `None` for a degenerate (zero or
    /// non-finite) bearing.
    pub fn from_bearing(start: Vec3A, bearing: Vec3A) -> Option<Self> {
        let direction = bearing.try_normalize()?;
        Some(Self::new(start, direction))
    }

    pub fn velocity(&self) -> Vec3A {
        self.velocity
    }

    pub fn inverse_velocity(&self) -> Vec3A {
        self.inverse_velocity
    }

    pub fn position_at(&self, t: f32) -> Vec3A {
        self.start + t * self.velocity
    }

    /// If the ray intersects `extent`, returns `[t_enter, t_exit]`. `t_enter` is negative when the ray starts inside of the
    /// extent.
    ///
    /// Slab method. An axis the ray doesn't move along places no limit on `t`, but only when `start` lies within that
    /// axis's slab (boundary planes included); otherwise the ray can never reach the extent.
    pub fn cast_at_extent(&self, extent: Extent<Vec3A>) -> Option<[f32; 2]> {
        let lub = extent.least_upper_bound();

        let stationary = self.velocity.cmpeq(Vec3A::ZERO);
        let in_slab = self.start.cmpge(extent.minimum) & self.start.cmple(lub);
        if (stationary & !in_slab).any() {
            return None;
        }

        // 0 * inf on a stationary axis is NaN; those lanes are overwritten below.
        let t_to_min = (extent.minimum - self.start) * self.inverse_velocity;
        let t_to_lub = (lub - self.start) * self.inverse_velocity;

        let t_near = Vec3A::select(stationary, Vec3A::splat(f32::NEG_INFINITY), t_to_min.min(t_to_lub));
        let t_far = Vec3A::select(stationary, Vec3A::splat(f32::INFINITY), t_to_min.max(t_to_lub));

        let t_enter = t_near.max_element();
        let t_exit = t_far.min_element();

        (t_exit >= t_enter.max(0.0)).then(|| [t_enter, t_exit])
    }
}

// ████████╗███████╗███████╗████████╗
// ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝
//    ██║   █████╗  ███████╗   ██║
//    ██║   ██╔══╝  ╚════██║   ██║
//    ██║   ███████╗███████║   ██║
//    ╚═╝   ╚══════╝╚══════╝   ╚═╝
