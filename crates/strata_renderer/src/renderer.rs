//! Core path tracing renderer.
//!
//! Implements Monte Carlo path tracing with:
//! - Recursive and iterative integrators over a depth budget
//! - Stratified anti-aliasing, defocus blur and motion blur via the camera
//! - Tile-parallel rendering on a [`WorkerPool`]

use crate::error::RenderError;
use crate::pool::WorkerPool;
use crate::sampling::gen_f32;
use crate::settings::{Integrator, RenderSettings};
use crate::tile::{generate_tiles, render_tile, TileResult};
use crate::{Camera, Color, Hittable, Ray};
use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};
use std::sync::Arc;
use std::time::{Duration, Instant};
use strata_math::Interval;

/// Closest ray parameter accepted for secondary hits, avoids self-intersection.
const T_MIN: f32 = 0.001;

/// Bounces after which Russian roulette may terminate a path.
const ROULETTE_MIN_BOUNCES: u32 = 3;

/// Compute the color seen by a ray, recursing once per scatter event.
///
/// Returns black once `depth` reaches zero and the background for a ray
/// that meets nothing.
pub fn ray_color(
    ray: &Ray,
    world: &dyn Hittable,
    depth: u32,
    settings: &RenderSettings,
    rng: &mut dyn RngCore,
) -> Color {
    if depth == 0 {
        return Color::ZERO;
    }

    let Some(rec) = world.hit(ray, Interval::new(T_MIN, f32::INFINITY), rng) else {
        return settings.background.color(ray);
    };

    let emission = rec.material.emitted(rec.u, rec.v, rec.p);

    match rec.material.scatter(ray, &rec, rng) {
        Some(result) => {
            let scattered_color = ray_color(&result.scattered, world, depth - 1, settings, rng);
            emission + result.attenuation * scattered_color
        }
        None => emission,
    }
}

/// Iterative form of [`ray_color`] with a throughput accumulator.
///
/// Draws from `rng` in the same order as the recursive form, so both agree
/// for the same random stream. With `settings.russian_roulette` set, paths
/// past a few bounces survive with probability equal to their largest
/// throughput component and are reweighted to stay unbiased.
pub fn trace_path(
    ray: &Ray,
    world: &dyn Hittable,
    max_depth: u32,
    settings: &RenderSettings,
    rng: &mut dyn RngCore,
) -> Color {
    let mut radiance = Color::ZERO;
    let mut throughput = Color::ONE;
    let mut ray = *ray;

    for bounce in 0..max_depth {
        let Some(rec) = world.hit(&ray, Interval::new(T_MIN, f32::INFINITY), rng) else {
            return radiance + throughput * settings.background.color(&ray);
        };

        radiance += throughput * rec.material.emitted(rec.u, rec.v, rec.p);

        let Some(result) = rec.material.scatter(&ray, &rec, rng) else {
            return radiance;
        };
        throughput *= result.attenuation;
        ray = result.scattered;

        if settings.russian_roulette && bounce + 1 >= ROULETTE_MIN_BOUNCES {
            let survival = throughput.max_element().min(1.0);
            if survival <= 0.0 || gen_f32(rng) >= survival {
                return radiance;
            }
            throughput /= survival;
        }
    }

    radiance
}

/// Render a single pixel with stratified multi-sampling.
pub fn render_pixel(
    camera: &Camera,
    world: &dyn Hittable,
    x: u32,
    y: u32,
    settings: &RenderSettings,
    rng: &mut dyn RngCore,
) -> Color {
    let sqrt_spp = camera.sqrt_spp();
    let mut pixel_color = Color::ZERO;

    for s_j in 0..sqrt_spp {
        for s_i in 0..sqrt_spp {
            let ray = camera.get_ray(x, y, s_i, s_j, rng);
            pixel_color += match settings.integrator {
                Integrator::Iterative => trace_path(&ray, world, settings.max_depth, settings, rng),
                Integrator::Recursive => ray_color(&ray, world, settings.max_depth, settings, rng),
            };
        }
    }

    pixel_color / camera.samples_per_pixel() as f32
}

/// Row-major linear color buffer produced by a render.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageBuffer {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<Color>,
}

impl ImageBuffer {
    /// Create a new image buffer filled with black.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            pixels: vec![Color::ZERO; width as usize * height as usize],
        }
    }

    fn index(&self, x: u32, y: u32) -> usize {
        y as usize * self.width as usize + x as usize
    }

    /// Get the pixel at (x, y).
    pub fn get(&self, x: u32, y: u32) -> Color {
        self.pixels[self.index(x, y)]
    }

    /// Set the pixel at (x, y).
    pub fn set(&mut self, x: u32, y: u32, color: Color) {
        let index = self.index(x, y);
        self.pixels[index] = color;
    }

    /// Copy a rendered tile into its rectangle of the image.
    pub fn write_tile(&mut self, result: &TileResult) {
        let tile = &result.tile;
        let row_len = tile.width as usize;

        for (row, colors) in result.pixels.chunks_exact(row_len).enumerate() {
            let start = self.index(tile.x, tile.y + row as u32);
            self.pixels[start..start + row_len].copy_from_slice(colors);
        }
    }
}

/// Counters accumulated over one render.
#[derive(Debug, Clone, Default)]
pub struct RenderStats {
    pub tiles: usize,
    pub pixels: u64,
    pub samples: u64,
    /// Time spent inside tile tasks, summed over all workers
    pub task_time: Duration,
    pub wall_time: Duration,
}

impl RenderStats {
    fn record(&mut self, result: &TileResult) {
        self.tiles += 1;
        self.pixels += result.pixels.len() as u64;
        self.samples += result.samples;
        self.task_time += result.elapsed;
    }

    /// Camera samples per second of wall time.
    pub fn samples_per_second(&self) -> f64 {
        let secs = self.wall_time.as_secs_f64();
        if secs > 0.0 {
            self.samples as f64 / secs
        } else {
            0.0
        }
    }

    pub fn log_summary(&self) {
        log::info!(
            "Rendered {} tiles, {} pixels, {} samples in {:.2?} \
             ({:.2?} task time, {:.0} samples/s)",
            self.tiles,
            self.pixels,
            self.samples,
            self.wall_time,
            self.task_time,
            self.samples_per_second()
        );
    }
}

/// Render the scene on a worker pool, one task per tile.
pub fn render(
    world: Arc<dyn Hittable>,
    settings: &RenderSettings,
) -> Result<ImageBuffer, RenderError> {
    render_with_stats(world, settings).map(|(image, _)| image)
}

/// [`render`], also returning the statistics it logs.
pub fn render_with_stats(
    world: Arc<dyn Hittable>,
    settings: &RenderSettings,
) -> Result<(ImageBuffer, RenderStats), RenderError> {
    settings.validate()?;
    let start = Instant::now();

    let camera = Arc::new(Camera::new(settings));
    let shared_settings = Arc::new(settings.clone());
    let tiles = generate_tiles(camera.image_width, camera.image_height, settings.tile_size);
    let pool = WorkerPool::new(settings.workers);

    log::info!(
        "Rendering {}x{} at {} spp in {} tiles on up to {} workers",
        camera.image_width,
        camera.image_height,
        camera.samples_per_pixel(),
        tiles.len(),
        pool.max_workers()
    );

    let mut handles = Vec::with_capacity(tiles.len());
    for tile in &tiles {
        let tile = *tile;
        let camera = Arc::clone(&camera);
        let world = Arc::clone(&world);
        let settings = Arc::clone(&shared_settings);

        let handle = pool.submit(move || {
            let mut rng = StdRng::seed_from_u64(tile.seed(settings.seed));
            render_tile(&tile, &camera, world.as_ref(), &settings, &mut rng)
        })?;
        handles.push((tile.index, handle));
    }

    let mut image = ImageBuffer::new(camera.image_width, camera.image_height);
    let mut stats = RenderStats::default();
    let total = handles.len();

    for (index, handle) in handles {
        let result = handle
            .wait()
            .map_err(|source| RenderError::Tile { tile: index, source })?;
        image.write_tile(&result);
        stats.record(&result);
        log::debug!(
            "Tile {}/{} done in {:.2?} ({} remaining)",
            stats.tiles,
            total,
            result.elapsed,
            total - stats.tiles
        );
    }

    pool.shutdown();
    stats.wall_time = start.elapsed();
    stats.log_summary();

    Ok((image, stats))
}

/// Render every tile on the calling thread.
///
/// Uses the same tiles and per-tile seeds as [`render`], so both produce the
/// same image.
pub fn render_serial(
    world: &dyn Hittable,
    settings: &RenderSettings,
) -> Result<ImageBuffer, RenderError> {
    settings.validate()?;

    let camera = Camera::new(settings);
    let mut image = ImageBuffer::new(camera.image_width, camera.image_height);

    for tile in generate_tiles(camera.image_width, camera.image_height, settings.tile_size) {
        let mut rng = StdRng::seed_from_u64(tile.seed(settings.seed));
        let result = render_tile(&tile, &camera, world, settings, &mut rng);
        image.write_tile(&result);
    }

    Ok(image)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hittable::HitRecord;
    use crate::material::{Material, ScatterResult};
    use crate::settings::Background;
    use crate::tile::Tile;
    use crate::{HittableList, Lambertian, Sphere, Vec3};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use strata_math::Aabb;

    /// Scatters every ray straight on with unit attenuation and counts calls.
    struct CountingMaterial {
        scatters: AtomicUsize,
    }

    impl Material for CountingMaterial {
        fn scatter(
            &self,
            ray_in: &Ray,
            rec: &HitRecord,
            _: &mut dyn RngCore,
        ) -> Option<ScatterResult> {
            self.scatters.fetch_add(1, Ordering::SeqCst);
            Some(ScatterResult {
                attenuation: Color::ONE,
                scattered: Ray::new(rec.p, ray_in.direction(), ray_in.time()),
            })
        }
    }

    /// Every ray hits at t = 1.
    struct Fog {
        material: CountingMaterial,
    }

    impl Hittable for Fog {
        fn hit<'a>(&'a self, ray: &Ray, _: Interval, _: &mut dyn RngCore) -> Option<HitRecord<'a>> {
            let normal = -ray.direction().normalize();
            Some(HitRecord::new(ray, 1.0, ray.at(1.0), normal, &self.material))
        }

        fn bounding_box(&self) -> Aabb {
            Aabb::UNIVERSE
        }
    }

    fn fog() -> Fog {
        Fog {
            material: CountingMaterial {
                scatters: AtomicUsize::new(0),
            },
        }
    }

    fn scene() -> HittableList {
        let mut world = HittableList::new();
        world.add(Arc::new(Sphere::new(
            Vec3::new(0.0, 0.0, -1.0),
            0.5,
            Arc::new(Lambertian::new(Color::new(0.7, 0.3, 0.3))),
        )));
        world.add(Arc::new(Sphere::new(
            Vec3::new(0.0, -100.5, -1.0),
            100.0,
            Arc::new(Lambertian::new(Color::splat(0.5))),
        )));
        world
    }

    fn small_settings() -> RenderSettings {
        RenderSettings::new()
            .with_resolution(24, 1.5)
            .with_quality(4, 6)
            .with_background(Background::Gradient)
            .with_tiles(5, 3)
            .with_seed(7)
    }

    #[test]
    fn test_miss_returns_background() {
        let world = HittableList::new();
        let background = Color::new(0.2, 0.4, 0.6);
        let settings = RenderSettings::new().with_background(Background::Solid(background));
        let ray = Ray::new(Vec3::ZERO, Vec3::new(0.3, 0.1, -1.0), 0.0);
        let mut rng = StdRng::seed_from_u64(1);

        assert_eq!(ray_color(&ray, &world, 10, &settings, &mut rng), background);
        assert_eq!(trace_path(&ray, &world, 10, &settings, &mut rng), background);
    }

    #[test]
    fn test_depth_zero_is_black() {
        let settings = RenderSettings::new().with_background(Background::Solid(Color::ONE));
        let ray = Ray::new(Vec3::ZERO, Vec3::Z, 0.0);
        let mut rng = StdRng::seed_from_u64(1);

        assert_eq!(ray_color(&ray, &HittableList::new(), 0, &settings, &mut rng), Color::ZERO);
        assert_eq!(trace_path(&ray, &HittableList::new(), 0, &settings, &mut rng), Color::ZERO);
    }

    #[test]
    fn test_scatter_count_bounded_by_max_depth() {
        let settings = RenderSettings::new().with_background(Background::Solid(Color::ONE));
        let ray = Ray::new(Vec3::ZERO, Vec3::Z, 0.0);
        let mut rng = StdRng::seed_from_u64(1);

        for max_depth in [1, 5, 50] {
            let world = fog();
            let color = ray_color(&ray, &world, max_depth, &settings, &mut rng);
            assert_eq!(world.material.scatters.load(Ordering::SeqCst), max_depth as usize);
            assert_eq!(color, Color::ZERO);

            let world = fog();
            let color = trace_path(&ray, &world, max_depth, &settings, &mut rng);
            assert_eq!(world.material.scatters.load(Ordering::SeqCst), max_depth as usize);
            assert_eq!(color, Color::ZERO);
        }
    }

    #[test]
    fn test_recursive_matches_iterative() {
        let world = scene();
        let settings = small_settings();
        let camera = Camera::new(&settings);

        for (x, y) in [(12, 8), (3, 14), (20, 2)] {
            let mut rng_a = StdRng::seed_from_u64(99);
            let mut rng_b = StdRng::seed_from_u64(99);
            let ray = camera.get_ray(x, y, 0, 0, &mut rng_a);
            let _ = camera.get_ray(x, y, 0, 0, &mut rng_b);

            let recursive = ray_color(&ray, &world, 6, &settings, &mut rng_a);
            let iterative = trace_path(&ray, &world, 6, &settings, &mut rng_b);
            assert!(
                (recursive - iterative).length() < 1e-5,
                "{:?} != {:?}",
                recursive,
                iterative
            );
        }
    }

    #[test]
    fn test_roulette_stays_finite() {
        let world = scene();
        let settings = small_settings().with_integrator(Integrator::Iterative, true);
        let ray = Ray::new(Vec3::ZERO, Vec3::new(0.0, -0.2, -1.0), 0.0);
        let mut rng = StdRng::seed_from_u64(5);

        for _ in 0..200 {
            let color = trace_path(&ray, &world, 50, &settings, &mut rng);
            assert!(color.is_finite());
            assert!(color.min_element() >= 0.0);
        }
    }

    #[test]
    fn test_write_tile() {
        let mut image = ImageBuffer::new(4, 3);
        let result = TileResult {
            tile: Tile::new(2, 1, 2, 2, 0),
            pixels: vec![Color::X, Color::Y, Color::Z, Color::ONE],
            samples: 4,
            elapsed: Duration::ZERO,
        };
        image.write_tile(&result);

        assert_eq!(image.get(2, 1), Color::X);
        assert_eq!(image.get(3, 1), Color::Y);
        assert_eq!(image.get(2, 2), Color::Z);
        assert_eq!(image.get(3, 2), Color::ONE);
        assert_eq!(image.get(1, 1), Color::ZERO);
        assert_eq!(image.get(0, 0), Color::ZERO);
    }

    #[test]
    fn test_parallel_render_matches_serial() {
        let world: Arc<dyn Hittable> = Arc::new(scene().into_bvh());
        let settings = small_settings();

        let (parallel, stats) = render_with_stats(Arc::clone(&world), &settings).unwrap();
        let serial = render_serial(world.as_ref(), &settings).unwrap();

        assert_eq!(parallel.width, 24);
        assert_eq!(parallel.height, 16);
        assert_eq!(parallel, serial);

        assert_eq!(stats.pixels, 24 * 16);
        assert_eq!(stats.samples, 24 * 16 * 4);
        assert_eq!(stats.tiles, generate_tiles(24, 16, 5).len());

        // Same seed, same image
        assert_eq!(render(world, &settings).unwrap(), parallel);
    }

    #[test]
    fn test_render_hits_sphere() {
        let world: Arc<dyn Hittable> = Arc::new(scene());
        let settings = small_settings().with_background(Background::Solid(Color::ONE));
        let image = render(world, &settings).unwrap();

        // Center pixel sees the red sphere, top row sees the sky
        let center = image.get(12, 8);
        assert!(center.x > center.z);
        assert!(center.x < 1.0);
        assert_eq!(image.get(12, 0), Color::ONE);
    }

    #[test]
    fn test_render_rejects_invalid_settings() {
        let world: Arc<dyn Hittable> = Arc::new(scene());
        let settings = small_settings().with_tiles(0, 1);
        assert!(matches!(render(world, &settings), Err(RenderError::InvalidSettings(_))));
    }
}
