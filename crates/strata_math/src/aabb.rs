use crate::{Interval, Ray, Vec3};

/// Boxes thinner than this along an axis are padded on construction so the
/// slab test never rejects a tangent ray on a flat primitive.
const MIN_THICKNESS: f32 = 0.0001;

/// Axis-aligned bounding box: the product of three intervals.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Aabb {
    pub x: Interval,
    pub y: Interval,
    pub z: Interval,
}

impl Aabb {
    pub const EMPTY: Aabb = Aabb {
        x: Interval::EMPTY,
        y: Interval::EMPTY,
        z: Interval::EMPTY,
    };

    pub const UNIVERSE: Aabb = Aabb {
        x: Interval::UNIVERSE,
        y: Interval::UNIVERSE,
        z: Interval::UNIVERSE,
    };

    /// Create a box from three intervals, padding degenerate axes.
    pub fn new(x: Interval, y: Interval, z: Interval) -> Self {
        let mut aabb = Self { x, y, z };
        aabb.pad_to_minimums();
        aabb
    }

    /// Create a box from two opposite corners given in any order.
    pub fn from_points(a: Vec3, b: Vec3) -> Self {
        Self::new(
            Interval::new(a.x.min(b.x), a.x.max(b.x)),
            Interval::new(a.y.min(b.y), a.y.max(b.y)),
            Interval::new(a.z.min(b.z), a.z.max(b.z)),
        )
    }

    /// Union of two boxes (componentwise interval union).
    pub fn surrounding(box0: &Aabb, box1: &Aabb) -> Self {
        Self {
            x: Interval::surrounding(&box0.x, &box1.x),
            y: Interval::surrounding(&box0.y, &box1.y),
            z: Interval::surrounding(&box0.z, &box1.z),
        }
    }

    /// Interval for an axis (0=X, 1=Y, 2=Z).
    pub fn axis_interval(&self, n: usize) -> Interval {
        match n {
            0 => self.x,
            1 => self.y,
            _ => self.z,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.x.is_empty() || self.y.is_empty() || self.z.is_empty()
    }

    /// Slab test returning the narrowed parameter interval on a hit.
    ///
    /// A zero direction component yields an infinite slab parameter; taking
    /// `min`/`max` of the pair handles both signs, and NaN from `0 * inf`
    /// (origin exactly on a slab plane) is discarded by `f32::min`/`f32::max`.
    pub fn hit_interval(&self, r: &Ray, mut ray_t: Interval) -> Option<Interval> {
        let origin = r.origin.to_array();
        let direction = r.direction.to_array();

        for axis in 0..3 {
            let slab = self.axis_interval(axis);
            let adinv = 1.0 / direction[axis];

            let t0 = (slab.min - origin[axis]) * adinv;
            let t1 = (slab.max - origin[axis]) * adinv;

            ray_t.min = ray_t.min.max(t0.min(t1));
            ray_t.max = ray_t.max.min(t0.max(t1));

            if ray_t.max <= ray_t.min {
                return None;
            }
        }

        Some(ray_t)
    }

    /// Test if a ray intersects this box within the given interval.
    pub fn hit(&self, r: &Ray, ray_t: Interval) -> bool {
        self.hit_interval(r, ray_t).is_some()
    }

    /// Index (0=X, 1=Y, 2=Z) of the axis with the longest extent.
    pub fn longest_axis(&self) -> usize {
        let x_size = self.x.size();
        let y_size = self.y.size();
        let z_size = self.z.size();

        if x_size > y_size {
            if x_size > z_size {
                0
            } else {
                2
            }
        } else if y_size > z_size {
            1
        } else {
            2
        }
    }

    /// Total area of the six faces; zero for an empty box.
    pub fn surface_area(&self) -> f32 {
        if self.is_empty() {
            return 0.0;
        }
        let (dx, dy, dz) = (self.x.size(), self.y.size(), self.z.size());
        2.0 * (dx * dy + dx * dz + dy * dz)
    }

    pub fn centroid(&self) -> Vec3 {
        Vec3::new(
            (self.x.min + self.x.max) * 0.5,
            (self.y.min + self.y.max) * 0.5,
            (self.z.min + self.z.max) * 0.5,
        )
    }

    fn pad_to_minimums(&mut self) {
        if self.x.size() < MIN_THICKNESS {
            self.x = self.x.expand(MIN_THICKNESS);
        }
        if self.y.size() < MIN_THICKNESS {
            self.y = self.y.expand(MIN_THICKNESS);
        }
        if self.z.size() < MIN_THICKNESS {
            self.z = self.z.expand(MIN_THICKNESS);
        }
    }
}

impl Default for Aabb {
    fn default() -> Self {
        Self::EMPTY
    }
}
