//! Camera for stratified ray generation.

use crate::sampling::{gen_f32, random_in_unit_disk};
use crate::settings::RenderSettings;
use crate::Ray;
use rand::RngCore;
use strata_math::Vec3;

/// Thin-lens camera derived from [`RenderSettings`].
#[derive(Debug, Clone)]
pub struct Camera {
    pub image_width: u32,
    pub image_height: u32,

    center: Vec3,
    pixel00_loc: Vec3,
    pixel_delta_u: Vec3,
    pixel_delta_v: Vec3,
    u: Vec3,
    v: Vec3,
    w: Vec3,
    defocus_angle: f32,
    defocus_disk_u: Vec3,
    defocus_disk_v: Vec3,

    /// Strata per pixel edge, `floor(sqrt(spp))`
    sqrt_spp: u32,
    recip_sqrt_spp: f32,
}

impl Camera {
    pub fn new(settings: &RenderSettings) -> Self {
        let image_width = settings.image_width.max(1);
        let image_height = settings.image_height();

        let sqrt_spp = ((settings.samples_per_pixel as f32).sqrt() as u32).max(1);
        let center = settings.look_from;

        // Viewport dimensions at the focus plane
        let theta = settings.vfov.to_radians();
        let h = (theta / 2.0).tan();
        let viewport_height = 2.0 * h * settings.focus_dist;
        let viewport_width = viewport_height * (image_width as f32 / image_height as f32);

        // Orthonormal camera basis
        let w = (settings.look_from - settings.look_at).normalize();
        let u = settings.vup.cross(w).normalize();
        let v = w.cross(u);

        let viewport_u = viewport_width * u;
        let viewport_v = -viewport_height * v;

        let pixel_delta_u = viewport_u / image_width as f32;
        let pixel_delta_v = viewport_v / image_height as f32;

        let viewport_upper_left =
            center - settings.focus_dist * w - viewport_u / 2.0 - viewport_v / 2.0;
        let pixel00_loc = viewport_upper_left + 0.5 * (pixel_delta_u + pixel_delta_v);

        let defocus_radius =
            settings.focus_dist * (settings.defocus_angle / 2.0).to_radians().tan();

        Self {
            image_width,
            image_height,
            center,
            pixel00_loc,
            pixel_delta_u,
            pixel_delta_v,
            u,
            v,
            w,
            defocus_angle: settings.defocus_angle,
            defocus_disk_u: u * defocus_radius,
            defocus_disk_v: v * defocus_radius,
            sqrt_spp,
            recip_sqrt_spp: 1.0 / sqrt_spp as f32,
        }
    }

    /// Strata per pixel edge.
    pub fn sqrt_spp(&self) -> u32 {
        self.sqrt_spp
    }

    /// Samples actually traced per pixel, `sqrt_spp^2`.
    pub fn samples_per_pixel(&self) -> u32 {
        self.sqrt_spp * self.sqrt_spp
    }

    /// Camera basis `(u, v, w)`: right, up, and backward.
    pub fn basis(&self) -> (Vec3, Vec3, Vec3) {
        (self.u, self.v, self.w)
    }

    /// Ray through pixel `(i, j)` jittered inside stratum `(s_i, s_j)`.
    ///
    /// The origin is sampled on the defocus disk when the defocus angle is
    /// positive; the time is uniform in `[0, 1)`.
    pub fn get_ray(&self, i: u32, j: u32, s_i: u32, s_j: u32, rng: &mut dyn RngCore) -> Ray {
        let offset = self.sample_square_stratified(s_i, s_j, rng);

        let pixel_sample = self.pixel00_loc
            + (i as f32 + offset.x) * self.pixel_delta_u
            + (j as f32 + offset.y) * self.pixel_delta_v;

        let ray_origin = if self.defocus_angle <= 0.0 {
            self.center
        } else {
            self.defocus_disk_sample(rng)
        };

        let ray_time = gen_f32(rng);
        Ray::new(ray_origin, pixel_sample - ray_origin, ray_time)
    }

    /// Offset in `[-0.5, 0.5)^2` inside sub-cell `(s_i, s_j)` of the pixel.
    fn sample_square_stratified(&self, s_i: u32, s_j: u32, rng: &mut dyn RngCore) -> Vec3 {
        let px = (s_i as f32 + gen_f32(rng)) * self.recip_sqrt_spp - 0.5;
        let py = (s_j as f32 + gen_f32(rng)) * self.recip_sqrt_spp - 0.5;
        Vec3::new(px, py, 0.0)
    }

    fn defocus_disk_sample(&self, rng: &mut dyn RngCore) -> Vec3 {
        let p = random_in_unit_disk(rng);
        self.center + p.x * self.defocus_disk_u + p.y * self.defocus_disk_v
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn settings() -> RenderSettings {
        RenderSettings::new()
            .with_resolution(100, 1.0)
            .with_position(Vec3::ZERO, Vec3::new(0.0, 0.0, -1.0), Vec3::Y)
            .with_lens(90.0, 0.0, 1.0)
    }

    #[test]
    fn test_basis() {
        let camera = Camera::new(&settings());
        let (u, v, w) = camera.basis();
        assert!((u - Vec3::X).length() < 1e-5);
        assert!((v - Vec3::Y).length() < 1e-5);
        assert!((w - Vec3::Z).length() < 1e-5);
    }

    #[test]
    fn test_stratum_count() {
        let camera = Camera::new(&settings().with_quality(10, 5));
        assert_eq!(camera.sqrt_spp(), 3);
        assert_eq!(camera.samples_per_pixel(), 9);

        let single = Camera::new(&settings().with_quality(1, 5));
        assert_eq!(single.samples_per_pixel(), 1);
    }

    #[test]
    fn test_center_ray_points_forward() {
        let camera = Camera::new(&settings());
        let mut rng = StdRng::seed_from_u64(42);

        let ray = camera.get_ray(50, 50, 0, 0, &mut rng);
        assert_eq!(ray.origin(), Vec3::ZERO);
        assert!(ray.direction().z < 0.0);
        assert!(ray.direction().x.abs() < 0.02);
        assert!((0.0..1.0).contains(&ray.time()));
    }

    #[test]
    fn test_stratified_samples_stay_in_their_cell() {
        let camera = Camera::new(&settings().with_quality(16, 5));
        let mut rng = StdRng::seed_from_u64(3);
        let (_, _, w) = camera.basis();

        // Pixel (0, 0) spans x in [-1, -0.98] at the focus plane z = -1
        for s_j in 0..4 {
            for s_i in 0..4 {
                let ray = camera.get_ray(0, 0, s_i, s_j, &mut rng);
                let hit = ray.at(1.0 / -ray.direction().dot(w));
                let cell_x = (hit.x + 1.0) / 0.02 * 4.0;
                let cell_y = (1.0 - hit.y) / 0.02 * 4.0;
                assert!(cell_x >= s_i as f32 - 1e-3 && cell_x <= (s_i + 1) as f32 + 1e-3);
                assert!(cell_y >= s_j as f32 - 1e-3 && cell_y <= (s_j + 1) as f32 + 1e-3);
            }
        }
    }

    #[test]
    fn test_defocus_moves_origin_on_lens() {
        let camera = Camera::new(&settings().with_lens(90.0, 10.0, 5.0));
        let mut rng = StdRng::seed_from_u64(9);
        let radius = 5.0 * 5.0_f32.to_radians().tan();

        let mut moved = false;
        for _ in 0..32 {
            let ray = camera.get_ray(50, 50, 0, 0, &mut rng);
            assert!(ray.origin().length() <= radius + 1e-5);
            assert!(ray.origin().z.abs() < 1e-6);
            moved |= ray.origin() != Vec3::ZERO;
        }
        assert!(moved);
    }
}
