//! Hittable trait and HitRecord for ray-object intersection.

use crate::{BvhNode, Material, Ray};
use rand::RngCore;
use std::sync::Arc;
use strata_math::{Aabb, Interval, Vec3};

/// Record of a ray-object intersection.
///
/// Only produced by a successful [`Hittable::hit`]; a miss is `None`.
#[derive(Clone, Copy)]
pub struct HitRecord<'a> {
    /// Point of intersection
    pub p: Vec3,
    /// Surface normal, always facing against the incoming ray
    pub normal: Vec3,
    /// Material to shade the intersection with
    pub material: &'a dyn Material,
    /// Surface parametric coordinates
    pub u: f32,
    pub v: f32,
    /// Ray parameter of the intersection
    pub t: f32,
    /// Whether the ray hit the outward-facing side of the surface
    pub front_face: bool,
}

impl<'a> HitRecord<'a> {
    /// Build a record, orienting `outward_normal` against the ray.
    ///
    /// `outward_normal` is expected to be unit length.
    pub fn new(
        ray: &Ray,
        t: f32,
        p: Vec3,
        outward_normal: Vec3,
        material: &'a dyn Material,
    ) -> Self {
        let front_face = ray.direction().dot(outward_normal) < 0.0;
        let normal = if front_face {
            outward_normal
        } else {
            -outward_normal
        };

        Self {
            p,
            normal,
            material,
            u: 0.0,
            v: 0.0,
            t,
            front_face,
        }
    }

    /// Attach surface coordinates.
    pub fn with_uv(mut self, u: f32, v: f32) -> Self {
        self.u = u;
        self.v = v;
        self
    }
}

/// Trait for objects that can be hit by rays.
///
/// `rng` feeds stochastic entities such as participating media; surfaces
/// ignore it.
pub trait Hittable: Send + Sync {
    /// Nearest intersection with `ray` whose parameter lies inside `ray_t`.
    fn hit<'a>(
        &'a self,
        ray: &Ray,
        ray_t: Interval,
        rng: &mut dyn RngCore,
    ) -> Option<HitRecord<'a>>;

    /// Axis-aligned box enclosing the object for all ray times.
    fn bounding_box(&self) -> Aabb;

    /// Concrete node type, for walking hierarchies in tests.
    #[cfg(test)]
    fn as_bvh_node(&self) -> Option<&BvhNode> {
        None
    }
}

/// An unordered collection of hittables searched linearly.
#[derive(Clone)]
pub struct HittableList {
    objects: Vec<Arc<dyn Hittable>>,
    bbox: Aabb,
}

impl HittableList {
    pub fn new() -> Self {
        Self {
            objects: Vec::new(),
            bbox: Aabb::EMPTY,
        }
    }

    pub fn add(&mut self, object: Arc<dyn Hittable>) {
        self.bbox = Aabb::surrounding(&self.bbox, &object.bounding_box());
        self.objects.push(object);
    }

    pub fn clear(&mut self) {
        self.objects.clear();
        self.bbox = Aabb::EMPTY;
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    pub fn objects(&self) -> &[Arc<dyn Hittable>] {
        &self.objects
    }

    /// Build a bounding volume hierarchy over the members.
    ///
    /// # Panics
    ///
    /// Panics if the list is empty.
    pub fn into_bvh(self) -> BvhNode {
        BvhNode::new(self.objects)
    }
}

impl Default for HittableList {
    fn default() -> Self {
        Self::new()
    }
}

impl FromIterator<Arc<dyn Hittable>> for HittableList {
    fn from_iter<I: IntoIterator<Item = Arc<dyn Hittable>>>(iter: I) -> Self {
        let mut list = HittableList::new();
        for object in iter {
            list.add(object);
        }
        list
    }
}

impl Hittable for HittableList {
    fn hit<'a>(
        &'a self,
        ray: &Ray,
        ray_t: Interval,
        rng: &mut dyn RngCore,
    ) -> Option<HitRecord<'a>> {
        let mut closest: Option<HitRecord<'a>> = None;

        for object in &self.objects {
            let max = closest.map_or(ray_t.max, |rec| rec.t);
            if let Some(rec) = object.hit(ray, Interval::new(ray_t.min, max), rng) {
                closest = Some(rec);
            }
        }

        closest
    }

    fn bounding_box(&self) -> Aabb {
        self.bbox
    }
}
