//! Homogeneous participating medium (fog, smoke) bounded by another hittable.

use crate::hittable::{HitRecord, Hittable};
use crate::material::{Color, Isotropic};
use crate::sampling::gen_f32;
use crate::Ray;
use rand::RngCore;
use std::sync::Arc;
use strata_math::{Aabb, Interval, Vec3};

/// Offset past the entry point when searching for the boundary exit.
const EXIT_SEARCH_OFFSET: f32 = 0.0001;

/// A volume of constant density filling a closed boundary.
///
/// A ray crossing the boundary scatters at a free-path distance drawn from an
/// exponential distribution; if that distance exceeds the path length inside
/// the boundary, the ray passes through untouched.
pub struct ConstantMedium {
    boundary: Arc<dyn Hittable>,
    neg_inv_density: f32,
    phase_function: Isotropic,
}

impl ConstantMedium {
    /// Negative densities are clamped to zero, which never scatters.
    pub fn new(boundary: Arc<dyn Hittable>, density: f32, albedo: Color) -> Self {
        let density = density.max(0.0);

        Self {
            boundary,
            neg_inv_density: -1.0 / density,
            phase_function: Isotropic::new(albedo),
        }
    }
}

impl Hittable for ConstantMedium {
    fn hit<'a>(
        &'a self,
        ray: &Ray,
        ray_t: Interval,
        rng: &mut dyn RngCore,
    ) -> Option<HitRecord<'a>> {
        let entry = self.boundary.hit(ray, Interval::UNIVERSE, rng)?.t;
        let exit = self
            .boundary
            .hit(ray, Interval::new(entry + EXIT_SEARCH_OFFSET, f32::INFINITY), rng)?
            .t;

        let mut t_enter = entry.max(ray_t.min);
        let t_exit = exit.min(ray_t.max);
        if t_enter >= t_exit {
            return None;
        }
        if t_enter < 0.0 {
            t_enter = 0.0;
        }

        let ray_length = ray.direction().length();
        let distance_inside = (t_exit - t_enter) * ray_length;
        let hit_distance = self.neg_inv_density * gen_f32(rng).ln();

        if hit_distance > distance_inside {
            return None;
        }

        let t = t_enter + hit_distance / ray_length;
        let mut rec = HitRecord::new(ray, t, ray.at(t), Vec3::X, &self.phase_function);

        // Isotropic scattering ignores orientation
        rec.normal = Vec3::X;
        rec.front_face = true;
        Some(rec)
    }

    fn bounding_box(&self) -> Aabb {
        self.boundary.bounding_box()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::material::Lambertian;
    use crate::Sphere;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn unit_ball() -> Arc<dyn Hittable> {
        Arc::new(Sphere::new(Vec3::ZERO, 1.0, Arc::new(Lambertian::new(Color::ONE))))
    }

    fn forward() -> Interval {
        Interval::new(0.001, f32::INFINITY)
    }

    #[test]
    fn test_dense_medium_scatters_inside_boundary() {
        let fog = ConstantMedium::new(unit_ball(), 1000.0, Color::splat(0.5));
        let ray = Ray::new(Vec3::new(0.0, 0.0, -5.0), Vec3::Z, 0.0);
        let mut rng = StdRng::seed_from_u64(3);

        for _ in 0..100 {
            let rec = fog.hit(&ray, forward(), &mut rng).expect("dense fog always scatters");
            assert!(rec.t >= 4.0 && rec.t <= 6.0, "t = {}", rec.t);
            assert!(rec.front_face);
        }
    }

    #[test]
    fn test_zero_density_never_scatters() {
        let fog = ConstantMedium::new(unit_ball(), 0.0, Color::splat(0.5));
        let ray = Ray::new(Vec3::new(0.0, 0.0, -5.0), Vec3::Z, 0.0);
        let mut rng = StdRng::seed_from_u64(3);

        for _ in 0..100 {
            assert!(fog.hit(&ray, forward(), &mut rng).is_none());
        }
    }

    #[test]
    fn test_ray_missing_boundary() {
        let fog = ConstantMedium::new(unit_ball(), 1000.0, Color::ONE);
        let ray = Ray::new(Vec3::new(5.0, 0.0, -5.0), Vec3::Z, 0.0);
        let mut rng = StdRng::seed_from_u64(3);
        assert!(fog.hit(&ray, forward(), &mut rng).is_none());
    }

    #[test]
    fn test_search_interval_before_boundary() {
        let fog = ConstantMedium::new(unit_ball(), 1000.0, Color::ONE);
        let ray = Ray::new(Vec3::new(0.0, 0.0, -5.0), Vec3::Z, 0.0);
        let mut rng = StdRng::seed_from_u64(3);
        assert!(fog.hit(&ray, Interval::new(0.001, 3.0), &mut rng).is_none());
    }

    #[test]
    fn test_ray_starting_inside_medium() {
        let fog = ConstantMedium::new(unit_ball(), 1000.0, Color::ONE);
        let ray = Ray::new(Vec3::ZERO, Vec3::Z, 0.0);
        let mut rng = StdRng::seed_from_u64(4);

        let rec = fog.hit(&ray, forward(), &mut rng).expect("scatters before exit");
        assert!(rec.t > 0.0 && rec.t <= 1.0);
    }

    #[test]
    fn test_thin_medium_sometimes_passes_through() {
        let fog = ConstantMedium::new(unit_ball(), 0.05, Color::ONE);
        let ray = Ray::new(Vec3::new(0.0, 0.0, -5.0), Vec3::Z, 0.0);
        let mut rng = StdRng::seed_from_u64(5);

        let hits = (0..1000)
            .filter(|_| fog.hit(&ray, forward(), &mut rng).is_some())
            .count();
        // P(scatter) = 1 - exp(-0.05 * 2) ~ 0.095
        assert!(hits > 40 && hits < 180, "hits = {}", hits);
    }

    #[test]
    fn test_bbox_matches_boundary() {
        let boundary = unit_ball();
        let fog = ConstantMedium::new(boundary.clone(), 1.0, Color::ONE);
        assert_eq!(fog.bounding_box(), boundary.bounding_box());
    }
}
