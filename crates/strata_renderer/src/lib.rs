//! Strata - tile-parallel CPU path tracer.
//!
//! Scenes are built from [`Hittable`] primitives (spheres, quads, boxes and
//! constant-density volumes), optionally organized in a [`BvhNode`], and
//! rendered tile by tile on a lazily grown [`WorkerPool`].

mod bvh;
mod camera;
mod constant_medium;
mod error;
mod hittable;
mod material;
mod pool;
mod quad;
mod renderer;
mod sampling;
mod settings;
mod sphere;
mod tile;

pub use bvh::BvhNode;
pub use camera::Camera;
pub use constant_medium::ConstantMedium;
pub use error::{PoolError, RenderError};
pub use hittable::{HitRecord, Hittable, HittableList};
pub use material::{
    Color, Dielectric, DiffuseLight, Isotropic, Lambertian, Material, Metal, ScatterResult,
};
pub use pool::{TaskHandle, WorkerPool};
pub use quad::{make_box, Quad};
pub use renderer::{
    ray_color, render, render_pixel, render_serial, render_with_stats, trace_path, ImageBuffer,
    RenderStats,
};
pub use sampling::{gen_f32, gen_range_f32, random_in_unit_disk, random_unit_vector};
pub use settings::{Background, Integrator, RenderSettings, DEFAULT_TILE_SIZE};
pub use sphere::Sphere;
pub use tile::{generate_tiles, render_tile, Tile, TileResult};

/// Re-export Vec3 and common math types from strata_math
pub use strata_math::{Aabb, Interval, Ray, Vec3};
