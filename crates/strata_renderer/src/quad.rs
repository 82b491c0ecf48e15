//! Planar parallelogram primitive and axis-aligned box builder.

use crate::{
    hittable::{HitRecord, Hittable, HittableList},
    Material, Ray,
};
use rand::RngCore;
use std::sync::Arc;
use strata_math::{Aabb, Interval, Vec3};

/// Rays whose direction is this close to parallel with the plane miss.
const PARALLEL_EPSILON: f32 = 1e-8;

/// A parallelogram spanned by corner `q` and edges `u`, `v`.
///
/// Interior points are `q + alpha * u + beta * v` with `alpha, beta` in
/// `[0, 1]`; these are reported as the hit's `(u, v)` coordinates.
pub struct Quad {
    q: Vec3,
    u: Vec3,
    v: Vec3,
    /// `n / (n . n)`, projects a planar offset onto the edge basis
    w: Vec3,
    normal: Vec3,
    d: f32,
    material: Arc<dyn Material>,
    bbox: Aabb,
}

impl Quad {
    pub fn new(q: Vec3, u: Vec3, v: Vec3, material: Arc<dyn Material>) -> Self {
        let n = u.cross(v);
        let normal = n.normalize_or_zero();
        let d = normal.dot(q);
        let w = n / n.dot(n);

        let diagonal1 = Aabb::from_points(q, q + u + v);
        let diagonal2 = Aabb::from_points(q + u, q + v);

        Self {
            q,
            u,
            v,
            w,
            normal,
            d,
            material,
            bbox: Aabb::surrounding(&diagonal1, &diagonal2),
        }
    }

    pub fn normal(&self) -> Vec3 {
        self.normal
    }
}

impl Hittable for Quad {
    fn hit<'a>(
        &'a self,
        ray: &Ray,
        ray_t: Interval,
        _rng: &mut dyn RngCore,
    ) -> Option<HitRecord<'a>> {
        let denom = self.normal.dot(ray.direction());

        // Also rejects degenerate quads, whose normal is zero
        if denom.abs() < PARALLEL_EPSILON {
            return None;
        }

        let t = (self.d - self.normal.dot(ray.origin())) / denom;
        if !ray_t.contains(t) {
            return None;
        }

        let intersection = ray.at(t);
        let planar_hitpt = intersection - self.q;
        let alpha = self.w.dot(planar_hitpt.cross(self.v));
        let beta = self.w.dot(self.u.cross(planar_hitpt));

        let unit = Interval::new(0.0, 1.0);
        if !unit.contains(alpha) || !unit.contains(beta) {
            return None;
        }

        Some(
            HitRecord::new(ray, t, intersection, self.normal, self.material.as_ref())
                .with_uv(alpha, beta),
        )
    }

    fn bounding_box(&self) -> Aabb {
        self.bbox
    }
}

/// The six outward-facing sides of the box with opposite corners `a` and `b`.
pub fn make_box(a: Vec3, b: Vec3, material: Arc<dyn Material>) -> HittableList {
    let min = a.min(b);
    let max = a.max(b);

    let dx = Vec3::new(max.x - min.x, 0.0, 0.0);
    let dy = Vec3::new(0.0, max.y - min.y, 0.0);
    let dz = Vec3::new(0.0, 0.0, max.z - min.z);

    let sides = [
        (Vec3::new(min.x, min.y, max.z), dx, dy),  // front
        (Vec3::new(max.x, min.y, max.z), -dz, dy), // right
        (Vec3::new(max.x, min.y, min.z), -dx, dy), // back
        (Vec3::new(min.x, min.y, min.z), dz, dy),  // left
        (Vec3::new(min.x, max.y, max.z), dx, -dz), // top
        (Vec3::new(min.x, min.y, min.z), dx, dz),  // bottom
    ];

    sides
        .into_iter()
        .map(|(q, u, v)| Arc::new(Quad::new(q, u, v, material.clone())) as Arc<dyn Hittable>)
        .collect()
}
