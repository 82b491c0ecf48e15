use crate::Vec3;

/// A ray with origin, direction, and the time at which it was cast.
///
/// `direction` is not required to be normalized. `time` lies in `[0, 1)` for
/// camera rays and drives motion blur of moving primitives.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Ray {
    pub origin: Vec3,
    pub direction: Vec3,
    pub time: f32,
}

impl Ray {
    #[inline]
    pub fn new(origin: Vec3, direction: Vec3, time: f32) -> Self {
        Self {
            origin,
            direction,
            time,
        }
    }

    #[inline]
    pub fn origin(&self) -> Vec3 {
        self.origin
    }

    #[inline]
    pub fn direction(&self) -> Vec3 {
        self.direction
    }

    #[inline]
    pub fn time(&self) -> f32 {
        self.time
    }

    /// Point along the ray: `origin + t * direction`.
    #[inline]
    pub fn at(&self, t: f32) -> Vec3 {
        self.origin + t * self.direction
    }
}

impl Default for Ray {
    fn default() -> Self {
        Self::new(Vec3::ZERO, Vec3::Z, 0.0)
    }
}
