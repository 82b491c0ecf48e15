//! Sphere primitive, static or moving linearly over the shutter interval.

use crate::{
    hittable::{HitRecord, Hittable},
    Material, Ray,
};
use rand::RngCore;
use std::f32::consts::PI;
use std::sync::Arc;
use strata_math::{Aabb, Interval, Vec3};

/// A sphere primitive.
///
/// The center is stored as a ray from the start position to the end
/// position; evaluating it at the incoming ray's time gives the center at
/// the instant of the cast.
pub struct Sphere {
    center: Ray,
    radius: f32,
    material: Arc<dyn Material>,
    bbox: Aabb,
}

impl Sphere {
    /// Create a stationary sphere. Negative radii are clamped to zero.
    pub fn new(center: Vec3, radius: f32, material: Arc<dyn Material>) -> Self {
        let radius = radius.max(0.0);
        let rvec = Vec3::splat(radius);

        Self {
            center: Ray::new(center, Vec3::ZERO, 0.0),
            radius,
            material,
            bbox: Aabb::from_points(center - rvec, center + rvec),
        }
    }

    /// Create a sphere moving from `start` at time 0 to `end` at time 1.
    pub fn moving(start: Vec3, end: Vec3, radius: f32, material: Arc<dyn Material>) -> Self {
        let radius = radius.max(0.0);
        let rvec = Vec3::splat(radius);
        let box0 = Aabb::from_points(start - rvec, start + rvec);
        let box1 = Aabb::from_points(end - rvec, end + rvec);

        Self {
            center: Ray::new(start, end - start, 0.0),
            radius,
            material,
            bbox: Aabb::surrounding(&box0, &box1),
        }
    }

    pub fn radius(&self) -> f32 {
        self.radius
    }

    /// Center at the given time.
    pub fn center_at(&self, time: f32) -> Vec3 {
        self.center.at(time)
    }

    /// Spherical coordinates of a point on the unit sphere.
    ///
    /// `u` is the angle around Y from -X, `v` the angle from -Y, both mapped
    /// to `[0, 1]`.
    fn sphere_uv(p: Vec3) -> (f32, f32) {
        let theta = (-p.y).clamp(-1.0, 1.0).acos();
        let phi = (-p.z).atan2(p.x) + PI;

        (phi / (2.0 * PI), theta / PI)
    }
}

impl Hittable for Sphere {
    fn hit<'a>(
        &'a self,
        ray: &Ray,
        ray_t: Interval,
        _rng: &mut dyn RngCore,
    ) -> Option<HitRecord<'a>> {
        let current_center = self.center.at(ray.time());
        let oc = current_center - ray.origin();
        let a = ray.direction().length_squared();
        let h = ray.direction().dot(oc);
        let c = oc.length_squared() - self.radius * self.radius;

        let discriminant = h * h - a * c;
        if discriminant < 0.0 {
            return None;
        }

        let sqrtd = discriminant.sqrt();

        // Nearest root strictly inside the search interval
        let mut root = (h - sqrtd) / a;
        if !ray_t.surrounds(root) {
            root = (h + sqrtd) / a;
            if !ray_t.surrounds(root) {
                return None;
            }
        }

        let p = ray.at(root);
        let outward_normal = (p - current_center) / self.radius;
        let (u, v) = Self::sphere_uv(outward_normal);

        Some(HitRecord::new(ray, root, p, outward_normal, self.material.as_ref()).with_uv(u, v))
    }

    fn bounding_box(&self) -> Aabb {
        self.bbox
    }
}
