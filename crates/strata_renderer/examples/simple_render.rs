//! Simple path tracer example.
//!
//! Renders one of two demo scenes and saves it as a PNG:
//!
//! ```text
//! cargo run --release --example simple_render -- [bouncing|cornell] [output.png]
//! ```

use anyhow::{bail, Context, Result};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Arc;
use std::time::Instant;
use strata_renderer::{
    make_box, render_with_stats, Background, Color, ConstantMedium, Dielectric, DiffuseLight,
    Hittable, HittableList, ImageBuffer, Lambertian, Material, Metal, Quad, RenderSettings, Sphere,
    Vec3,
};

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let mut args = std::env::args().skip(1);
    let scene = args.next().unwrap_or_else(|| "bouncing".to_string());
    let output = args.next().unwrap_or_else(|| format!("{}.png", scene));

    let start = Instant::now();
    let (world, settings) = match scene.as_str() {
        "bouncing" => bouncing_spheres(),
        "cornell" => cornell_smoke(),
        other => bail!("unknown scene '{}', expected 'bouncing' or 'cornell'", other),
    };
    log::info!("Scene '{}' built in {:?}", scene, start.elapsed());

    let (frame, stats) = render_with_stats(world, &settings).context("render failed")?;
    log::info!(
        "Rendered {}x{} in {:.2?}",
        frame.width,
        frame.height,
        stats.wall_time
    );

    save_png(&frame, &output)?;
    log::info!("Saved to {}", output);
    Ok(())
}

/// Random small spheres bouncing during the shutter interval.
fn bouncing_spheres() -> (Arc<dyn Hittable>, RenderSettings) {
    let mut rng = StdRng::seed_from_u64(2024);
    let mut world = HittableList::new();

    // Ground
    world.add(Arc::new(Sphere::new(
        Vec3::new(0.0, -1000.0, 0.0),
        1000.0,
        Arc::new(Lambertian::new(Color::splat(0.5))),
    )));

    for a in -11..11 {
        for b in -11..11 {
            let center = Vec3::new(
                a as f32 + 0.9 * rng.gen::<f32>(),
                0.2,
                b as f32 + 0.9 * rng.gen::<f32>(),
            );

            if (center - Vec3::new(4.0, 0.2, 0.0)).length() <= 0.9 {
                continue;
            }

            let choose_mat: f32 = rng.gen();
            if choose_mat < 0.8 {
                let albedo = random_color(&mut rng) * random_color(&mut rng);
                let end = center + Vec3::new(0.0, rng.gen_range(0.0..0.5), 0.0);
                world.add(Arc::new(Sphere::moving(
                    center,
                    end,
                    0.2,
                    Arc::new(Lambertian::new(albedo)),
                )));
            } else if choose_mat < 0.95 {
                let albedo = Color::splat(0.5) + 0.5 * random_color(&mut rng);
                let fuzz = rng.gen_range(0.0..0.5);
                world.add(Arc::new(Sphere::new(center, 0.2, Arc::new(Metal::new(albedo, fuzz)))));
            } else {
                world.add(Arc::new(Sphere::new(center, 0.2, Arc::new(Dielectric::new(1.5)))));
            }
        }
    }

    // Three main spheres
    world.add(Arc::new(Sphere::new(
        Vec3::new(0.0, 1.0, 0.0),
        1.0,
        Arc::new(Dielectric::new(1.5)),
    )));
    world.add(Arc::new(Sphere::new(
        Vec3::new(-4.0, 1.0, 0.0),
        1.0,
        Arc::new(Lambertian::new(Color::new(0.4, 0.2, 0.1))),
    )));
    world.add(Arc::new(Sphere::new(
        Vec3::new(4.0, 1.0, 0.0),
        1.0,
        Arc::new(Metal::new(Color::new(0.7, 0.6, 0.5), 0.0)),
    )));

    log::info!("Created {} objects", world.len());

    let settings = RenderSettings::new()
        .with_resolution(400, 16.0 / 9.0)
        .with_quality(100, 50)
        .with_position(Vec3::new(13.0, 2.0, 3.0), Vec3::ZERO, Vec3::Y)
        .with_lens(20.0, 0.6, 10.0)
        .with_background(Background::Gradient);

    (Arc::new(world.into_bvh()), settings)
}

/// Cornell box lit from the ceiling, holding two boxes of smoke.
fn cornell_smoke() -> (Arc<dyn Hittable>, RenderSettings) {
    let red: Arc<dyn Material> = Arc::new(Lambertian::new(Color::new(0.65, 0.05, 0.05)));
    let white: Arc<dyn Material> = Arc::new(Lambertian::new(Color::splat(0.73)));
    let green: Arc<dyn Material> = Arc::new(Lambertian::new(Color::new(0.12, 0.45, 0.15)));
    let light: Arc<dyn Material> = Arc::new(DiffuseLight::new(Color::splat(7.0)));

    let mut world = HittableList::new();
    let x = Vec3::new(555.0, 0.0, 0.0);
    let y = Vec3::new(0.0, 555.0, 0.0);
    let z = Vec3::new(0.0, 0.0, 555.0);
    let walls = [
        (x, y, z, &green),
        (Vec3::ZERO, y, z, &red),
        (
            Vec3::new(113.0, 554.0, 127.0),
            Vec3::new(330.0, 0.0, 0.0),
            Vec3::new(0.0, 0.0, 305.0),
            &light,
        ),
        (y, x, z, &white),
        (Vec3::ZERO, x, z, &white),
        (z, x, y, &white),
    ];
    for (q, u, v, material) in walls {
        world.add(Arc::new(Quad::new(q, u, v, Arc::clone(material))));
    }

    let tall = make_box(
        Vec3::new(265.0, 0.0, 295.0),
        Vec3::new(430.0, 330.0, 460.0),
        white.clone(),
    );
    let short = make_box(
        Vec3::new(130.0, 0.0, 65.0),
        Vec3::new(295.0, 165.0, 230.0),
        white,
    );

    world.add(Arc::new(ConstantMedium::new(Arc::new(tall), 0.01, Color::ZERO)));
    world.add(Arc::new(ConstantMedium::new(Arc::new(short), 0.01, Color::ONE)));

    let settings = RenderSettings::new()
        .with_resolution(400, 1.0)
        .with_quality(200, 50)
        .with_position(
            Vec3::new(278.0, 278.0, -800.0),
            Vec3::new(278.0, 278.0, 0.0),
            Vec3::Y,
        )
        .with_lens(40.0, 0.0, 10.0)
        .with_background(Background::Solid(Color::ZERO));

    (Arc::new(world.into_bvh()), settings)
}

fn random_color(rng: &mut StdRng) -> Color {
    Color::new(rng.gen(), rng.gen(), rng.gen())
}

/// Apply gamma correction (gamma = 2.0).
fn linear_to_gamma(linear: f32) -> f32 {
    if linear > 0.0 {
        linear.sqrt()
    } else {
        0.0
    }
}

fn to_byte(linear: f32) -> u8 {
    (256.0 * linear_to_gamma(linear).clamp(0.0, 0.999)) as u8
}

fn save_png(frame: &ImageBuffer, path: &str) -> Result<()> {
    let mut bytes = Vec::with_capacity(frame.pixels.len() * 3);
    for color in &frame.pixels {
        bytes.extend_from_slice(&[to_byte(color.x), to_byte(color.y), to_byte(color.z)]);
    }

    image::save_buffer(path, &bytes, frame.width, frame.height, image::ColorType::Rgb8)
        .with_context(|| format!("failed to write {}", path))
}
