//! Random sampling helpers.
//!
//! Every helper draws from an explicit generator; callers own their RNG.

use rand::{Rng, RngCore};
use strata_math::Vec3;

/// Uniform sample in `[0, 1)`.
#[inline]
pub fn gen_f32(rng: &mut dyn RngCore) -> f32 {
    rng.gen::<f32>()
}

/// Uniform sample in `[min, max)`.
#[inline]
pub fn gen_range_f32(rng: &mut dyn RngCore, min: f32, max: f32) -> f32 {
    min + (max - min) * gen_f32(rng)
}

/// Uniformly distributed direction on the unit sphere (rejection sampled).
pub fn random_unit_vector(rng: &mut dyn RngCore) -> Vec3 {
    loop {
        let v = Vec3::new(
            gen_range_f32(rng, -1.0, 1.0),
            gen_range_f32(rng, -1.0, 1.0),
            gen_range_f32(rng, -1.0, 1.0),
        );
        let len_sq = v.length_squared();
        if len_sq > 1e-12 && len_sq <= 1.0 {
            return v / len_sq.sqrt();
        }
    }
}

/// Uniform point in the unit disk on the z = 0 plane.
pub fn random_in_unit_disk(rng: &mut dyn RngCore) -> Vec3 {
    loop {
        let p = Vec3::new(gen_range_f32(rng, -1.0, 1.0), gen_range_f32(rng, -1.0, 1.0), 0.0);
        if p.length_squared() < 1.0 {
            return p;
        }
    }
}
