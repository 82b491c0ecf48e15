//! Material trait for surface and volume scattering.

use crate::sampling::{gen_f32, random_unit_vector};
use crate::{hittable::HitRecord, Ray};
use rand::RngCore;
use strata_math::Vec3;

/// Color type alias (linear RGB, typically 0-1)
pub type Color = Vec3;

/// Outcome of a scattering event.
#[derive(Debug, Clone, Copy)]
pub struct ScatterResult {
    /// Per-channel throughput of the scattered path
    pub attenuation: Color,
    /// Continuation ray
    pub scattered: Ray,
}

/// Trait for materials that describe how light interacts with a hit point.
pub trait Material: Send + Sync {
    /// Scatter an incoming ray, or `None` if it is absorbed.
    fn scatter(
        &self,
        ray_in: &Ray,
        rec: &HitRecord,
        rng: &mut dyn RngCore,
    ) -> Option<ScatterResult>;

    /// Light emitted at the given surface coordinates and point.
    ///
    /// Most materials return black.
    fn emitted(&self, _u: f32, _v: f32, _p: Vec3) -> Color {
        Color::ZERO
    }
}

/// Lambertian (diffuse) material.
#[derive(Debug, Clone)]
pub struct Lambertian {
    albedo: Color,
}

impl Lambertian {
    pub fn new(albedo: Color) -> Self {
        Self { albedo }
    }
}

impl Material for Lambertian {
    fn scatter(
        &self,
        ray_in: &Ray,
        rec: &HitRecord,
        rng: &mut dyn RngCore,
    ) -> Option<ScatterResult> {
        let mut scatter_direction = rec.normal + random_unit_vector(rng);

        // Catch degenerate scatter direction
        if scatter_direction.length_squared() < 1e-8 {
            scatter_direction = rec.normal;
        }

        Some(ScatterResult {
            attenuation: self.albedo,
            scattered: Ray::new(rec.p, scatter_direction, ray_in.time()),
        })
    }
}

/// Metal (specular) material.
#[derive(Debug, Clone)]
pub struct Metal {
    albedo: Color,
    fuzz: f32,
}

impl Metal {
    /// `fuzz` is clamped to `[0, 1]`; 0 is a perfect mirror.
    pub fn new(albedo: Color, fuzz: f32) -> Self {
        Self {
            albedo,
            fuzz: fuzz.clamp(0.0, 1.0),
        }
    }
}

impl Material for Metal {
    fn scatter(
        &self,
        ray_in: &Ray,
        rec: &HitRecord,
        rng: &mut dyn RngCore,
    ) -> Option<ScatterResult> {
        let reflected = reflect(ray_in.direction(), rec.normal).normalize();
        let direction = if self.fuzz > 0.0 {
            reflected + self.fuzz * random_unit_vector(rng)
        } else {
            reflected
        };

        // Fuzzed reflections below the surface are absorbed
        (direction.dot(rec.normal) > 0.0).then(|| ScatterResult {
            attenuation: self.albedo,
            scattered: Ray::new(rec.p, direction, ray_in.time()),
        })
    }
}

/// Dielectric (glass) material.
#[derive(Debug, Clone)]
pub struct Dielectric {
    /// Index of refraction relative to the enclosing medium
    ior: f32,
}

impl Dielectric {
    /// `ior`: 1.0 = air, 1.5 = glass, 2.4 = diamond
    pub fn new(ior: f32) -> Self {
        Self { ior }
    }

    /// Schlick's approximation for reflectance
    fn reflectance(cosine: f32, ior: f32) -> f32 {
        let r0 = ((1.0 - ior) / (1.0 + ior)).powi(2);
        r0 + (1.0 - r0) * (1.0 - cosine).powi(5)
    }
}

impl Material for Dielectric {
    fn scatter(
        &self,
        ray_in: &Ray,
        rec: &HitRecord,
        rng: &mut dyn RngCore,
    ) -> Option<ScatterResult> {
        let ri = if rec.front_face { 1.0 / self.ior } else { self.ior };

        let unit_direction = ray_in.direction().normalize();
        let cos_theta = (-unit_direction).dot(rec.normal).min(1.0);
        let sin_theta = (1.0 - cos_theta * cos_theta).sqrt();

        let cannot_refract = ri * sin_theta > 1.0;
        let direction = if cannot_refract || Self::reflectance(cos_theta, ri) > gen_f32(rng) {
            reflect(unit_direction, rec.normal)
        } else {
            refract(unit_direction, rec.normal, ri)
        };

        Some(ScatterResult {
            attenuation: Color::ONE,
            scattered: Ray::new(rec.p, direction, ray_in.time()),
        })
    }
}

/// Diffuse light emitter. Never scatters.
#[derive(Debug, Clone)]
pub struct DiffuseLight {
    emit: Color,
}

impl DiffuseLight {
    pub fn new(emit: Color) -> Self {
        Self { emit }
    }
}

impl Material for DiffuseLight {
    fn scatter(&self, _: &Ray, _: &HitRecord, _: &mut dyn RngCore) -> Option<ScatterResult> {
        None
    }

    fn emitted(&self, _u: f32, _v: f32, _p: Vec3) -> Color {
        self.emit
    }
}

/// Isotropic phase function for participating media.
///
/// Scatters uniformly over the sphere regardless of the record's normal.
#[derive(Debug, Clone)]
pub struct Isotropic {
    albedo: Color,
}

impl Isotropic {
    pub fn new(albedo: Color) -> Self {
        Self { albedo }
    }
}

impl Material for Isotropic {
    fn scatter(
        &self,
        ray_in: &Ray,
        rec: &HitRecord,
        rng: &mut dyn RngCore,
    ) -> Option<ScatterResult> {
        Some(ScatterResult {
            attenuation: self.albedo,
            scattered: Ray::new(rec.p, random_unit_vector(rng), ray_in.time()),
        })
    }
}

#[inline]
fn reflect(v: Vec3, n: Vec3) -> Vec3 {
    v - 2.0 * v.dot(n) * n
}

#[inline]
fn refract(uv: Vec3, n: Vec3, etai_over_etat: f32) -> Vec3 {
    let cos_theta = (-uv).dot(n).min(1.0);
    let r_out_perp = etai_over_etat * (uv + cos_theta * n);
    let r_out_parallel = -(1.0 - r_out_perp.length_squared()).abs().sqrt() * n;
    r_out_perp + r_out_parallel
}
