//! Render configuration.

use crate::error::RenderError;
use crate::{Color, Ray};
use strata_math::Vec3;

/// Default tile edge length in pixels.
pub const DEFAULT_TILE_SIZE: u32 = 16;

/// Light-transport loop used per camera sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Integrator {
    /// Throughput accumulator, constant stack depth
    #[default]
    Iterative,
    /// Direct recursion on the remaining depth
    Recursive,
}

/// Radiance returned by rays that leave the scene.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Background {
    Solid(Color),
    /// Vertical white-to-sky-blue blend
    Gradient,
}

impl Background {
    pub fn color(&self, ray: &Ray) -> Color {
        match self {
            Background::Solid(color) => *color,
            Background::Gradient => {
                let unit_direction = ray.direction().normalize();
                let a = 0.5 * (unit_direction.y + 1.0);
                (1.0 - a) * Color::ONE + a * Color::new(0.5, 0.7, 1.0)
            }
        }
    }
}

impl Default for Background {
    fn default() -> Self {
        Background::Solid(Color::ZERO)
    }
}

/// Everything a render needs besides the scene.
#[derive(Debug, Clone)]
pub struct RenderSettings {
    /// Image width over height
    pub aspect_ratio: f32,
    pub image_width: u32,
    /// Requested samples per pixel; `floor(sqrt(spp))^2` are actually traced
    pub samples_per_pixel: u32,
    /// Maximum number of scattering events per path
    pub max_depth: u32,
    /// Vertical field of view in degrees
    pub vfov: f32,
    pub look_from: Vec3,
    pub look_at: Vec3,
    pub vup: Vec3,
    /// Variation angle of rays through each pixel, in degrees
    pub defocus_angle: f32,
    /// Distance from the camera to the plane of perfect focus
    pub focus_dist: f32,
    pub background: Background,
    /// Tile edge length in pixels
    pub tile_size: u32,
    /// Maximum worker threads; 0 uses the hardware parallelism
    pub workers: usize,
    /// Base seed for the per-tile generators
    pub seed: u64,
    pub integrator: Integrator,
    /// Probabilistically terminate low-throughput paths (iterative only)
    pub russian_roulette: bool,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            aspect_ratio: 1.0,
            image_width: 100,
            samples_per_pixel: 10,
            max_depth: 10,
            vfov: 90.0,
            look_from: Vec3::ZERO,
            look_at: Vec3::new(0.0, 0.0, -1.0),
            vup: Vec3::Y,
            defocus_angle: 0.0,
            focus_dist: 10.0,
            background: Background::default(),
            tile_size: DEFAULT_TILE_SIZE,
            workers: 0,
            seed: 0,
            integrator: Integrator::default(),
            russian_roulette: false,
        }
    }
}

impl RenderSettings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Image width and aspect ratio; the height is derived.
    pub fn with_resolution(mut self, image_width: u32, aspect_ratio: f32) -> Self {
        self.image_width = image_width;
        self.aspect_ratio = aspect_ratio;
        self
    }

    pub fn with_quality(mut self, samples_per_pixel: u32, max_depth: u32) -> Self {
        self.samples_per_pixel = samples_per_pixel;
        self.max_depth = max_depth;
        self
    }

    pub fn with_position(mut self, look_from: Vec3, look_at: Vec3, vup: Vec3) -> Self {
        self.look_from = look_from;
        self.look_at = look_at;
        self.vup = vup;
        self
    }

    pub fn with_lens(mut self, vfov: f32, defocus_angle: f32, focus_dist: f32) -> Self {
        self.vfov = vfov;
        self.defocus_angle = defocus_angle;
        self.focus_dist = focus_dist;
        self
    }

    pub fn with_background(mut self, background: Background) -> Self {
        self.background = background;
        self
    }

    pub fn with_tiles(mut self, tile_size: u32, workers: usize) -> Self {
        self.tile_size = tile_size;
        self.workers = workers;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_integrator(mut self, integrator: Integrator, russian_roulette: bool) -> Self {
        self.integrator = integrator;
        self.russian_roulette = russian_roulette;
        self
    }

    /// `max(1, floor(image_width / aspect_ratio))`.
    pub fn image_height(&self) -> u32 {
        ((self.image_width as f32 / self.aspect_ratio) as u32).max(1)
    }

    /// Reject settings that cannot produce an image.
    pub fn validate(&self) -> Result<(), RenderError> {
        let invalid = |message: &str| Err(RenderError::InvalidSettings(message.to_string()));

        if self.image_width == 0 {
            return invalid("image_width must be at least 1");
        }
        if !(self.aspect_ratio.is_finite() && self.aspect_ratio > 0.0) {
            return invalid("aspect_ratio must be finite and positive");
        }
        if self.samples_per_pixel == 0 {
            return invalid("samples_per_pixel must be at least 1");
        }
        if self.tile_size == 0 {
            return invalid("tile_size must be at least 1");
        }
        if !(self.vfov > 0.0 && self.vfov < 180.0) {
            return invalid("vfov must lie strictly between 0 and 180 degrees");
        }
        if !(self.focus_dist.is_finite() && self.focus_dist > 0.0) {
            return invalid("focus_dist must be finite and positive");
        }
        if self.defocus_angle < 0.0 {
            return invalid("defocus_angle must not be negative");
        }

        let view = self.look_from - self.look_at;
        if view.length_squared() == 0.0 {
            return invalid("look_from and look_at must differ");
        }
        if self.vup.cross(view).length_squared() == 0.0 {
            return invalid("vup must not be parallel to the view direction");
        }

        Ok(())
    }
}
