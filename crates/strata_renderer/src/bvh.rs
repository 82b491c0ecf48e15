//! Bounding Volume Hierarchy (BVH) acceleration structure.
//!
//! A binary tree whose nodes are themselves hittable, so subtrees, lists
//! and primitives compose freely. Splits are chosen with the surface area
//! heuristic over objects sorted along the longest axis of their union box.

use crate::{HitRecord, Hittable, Ray};
use rand::RngCore;
use std::sync::Arc;
use std::time::Instant;
use strata_math::{Aabb, Interval};

/// Relative cost of visiting a node versus intersecting one primitive.
const TRAVERSAL_COST: f32 = 0.125;
const INTERSECT_COST: f32 = 1.0;

/// BVH node with exactly two children.
///
/// A single-object span stores the same object in both slots. The cached
/// box is the union of the children's boxes and never changes after build.
pub struct BvhNode {
    left: Arc<dyn Hittable>,
    right: Arc<dyn Hittable>,
    bbox: Aabb,
}

impl BvhNode {
    /// Build a BVH over `objects`.
    ///
    /// # Panics
    ///
    /// Panics if `objects` is empty.
    pub fn new(mut objects: Vec<Arc<dyn Hittable>>) -> Self {
        assert!(!objects.is_empty(), "cannot build a BVH over zero objects");

        let start = Instant::now();
        let root = Self::build(&mut objects);
        log::info!(
            "Built BVH over {} primitives in {:?}",
            objects.len(),
            start.elapsed()
        );
        root
    }

    /// Recursive construction over a non-empty span, reordered in place.
    fn build(objects: &mut [Arc<dyn Hittable>]) -> Self {
        let (left, right): (Arc<dyn Hittable>, Arc<dyn Hittable>) = match objects.len() {
            1 => (objects[0].clone(), objects[0].clone()),
            2 => (objects[0].clone(), objects[1].clone()),
            _ => {
                let bounds = objects.iter().fold(Aabb::EMPTY, |acc, obj| {
                    Aabb::surrounding(&acc, &obj.bounding_box())
                });
                let axis = bounds.longest_axis();

                objects.sort_by(|a, b| {
                    let a_min = a.bounding_box().axis_interval(axis).min;
                    let b_min = b.bounding_box().axis_interval(axis).min;
                    a_min.total_cmp(&b_min)
                });

                let mid = sah_split(objects);
                let (lower, upper) = objects.split_at_mut(mid);
                (Arc::new(Self::build(lower)), Arc::new(Self::build(upper)))
            }
        };

        let bbox = Aabb::surrounding(&left.bounding_box(), &right.bounding_box());
        Self { left, right, bbox }
    }

    pub fn left(&self) -> &Arc<dyn Hittable> {
        &self.left
    }

    pub fn right(&self) -> &Arc<dyn Hittable> {
        &self.right
    }
}

/// Index in `1..n` splitting a sorted span with the lowest SAH cost.
///
/// `prefix[i]` bounds `objects[..i]` and `suffix[i]` bounds `objects[i..]`,
/// both accumulated from their own end of the span. Equal costs resolve to
/// the index nearest the middle, so identical or nested boxes still yield a
/// tree of logarithmic depth.
fn sah_split(objects: &[Arc<dyn Hittable>]) -> usize {
    let n = objects.len();
    let boxes: Vec<Aabb> = objects.iter().map(|obj| obj.bounding_box()).collect();

    let mut prefix = vec![Aabb::EMPTY; n + 1];
    for i in 0..n {
        prefix[i + 1] = Aabb::surrounding(&prefix[i], &boxes[i]);
    }

    let mut suffix = vec![Aabb::EMPTY; n + 1];
    for i in (0..n).rev() {
        suffix[i] = Aabb::surrounding(&suffix[i + 1], &boxes[i]);
    }

    let total_area = prefix[n].surface_area();
    if !total_area.is_finite() || total_area <= 0.0 {
        return n / 2;
    }

    let mid = n / 2;
    (1..n)
        .map(|i| {
            let left = prefix[i].surface_area() / total_area * INTERSECT_COST * i as f32;
            let right = suffix[i].surface_area() / total_area * INTERSECT_COST * (n - i) as f32;
            (i, TRAVERSAL_COST + left + right)
        })
        .min_by(|a, b| {
            a.1.total_cmp(&b.1)
                .then_with(|| a.0.abs_diff(mid).cmp(&b.0.abs_diff(mid)))
        })
        .map_or(mid, |(i, _)| i)
}

impl Hittable for BvhNode {
    fn hit<'a>(
        &'a self,
        ray: &Ray,
        ray_t: Interval,
        rng: &mut dyn RngCore,
    ) -> Option<HitRecord<'a>> {
        if !self.bbox.hit(ray, ray_t) {
            return None;
        }

        let hit_left = self.left.hit(ray, ray_t, rng);

        // Only search the right subtree for hits closer than the left one
        let right_max = hit_left.map_or(ray_t.max, |rec| rec.t);
        let hit_right = self.right.hit(ray, Interval::new(ray_t.min, right_max), rng);

        hit_right.or(hit_left)
    }

    fn bounding_box(&self) -> Aabb {
        self.bbox
    }

    #[cfg(test)]
    fn as_bvh_node(&self) -> Option<&BvhNode> {
        Some(self)
    }
}
