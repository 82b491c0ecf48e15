//! Tile partitioning of the framebuffer.
//!
//! The image is cut into non-overlapping rectangles that are rendered as
//! independent tasks. Tiles on the right and bottom edges may be smaller
//! than the nominal edge length.

use crate::renderer::render_pixel;
use crate::settings::RenderSettings;
use crate::{Camera, Color, Hittable};
use rand::RngCore;
use std::time::{Duration, Instant};

/// A rectangular region of the image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tile {
    /// Left column of the tile
    pub x: u32,
    /// Top row of the tile
    pub y: u32,
    pub width: u32,
    pub height: u32,
    /// Position of this tile in the render order
    pub index: usize,
}

impl Tile {
    pub fn new(x: u32, y: u32, width: u32, height: u32, index: usize) -> Self {
        Self {
            x,
            y,
            width,
            height,
            index,
        }
    }

    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }

    /// Seed for this tile's generator, derived from the base seed and the
    /// tile's position so a tile renders identically in isolation.
    pub fn seed(&self, base: u64) -> u64 {
        let position = (u64::from(self.y) << 32) | u64::from(self.x);
        base ^ position.wrapping_mul(0x9E37_79B9_7F4A_7C15)
    }
}

/// Partition a `width x height` image into tiles of at most `tile_size`
/// pixels per edge, ordered from the image center outward.
///
/// A `tile_size` of zero is treated as one.
pub fn generate_tiles(width: u32, height: u32, tile_size: u32) -> Vec<Tile> {
    let tile_size = tile_size.max(1);
    let mut tiles = Vec::new();

    for y in (0..height).step_by(tile_size as usize) {
        for x in (0..width).step_by(tile_size as usize) {
            let tw = tile_size.min(width - x);
            let th = tile_size.min(height - y);
            tiles.push(Tile::new(x, y, tw, th, tiles.len()));
        }
    }

    sort_center_out(&mut tiles, width, height);
    for (i, tile) in tiles.iter_mut().enumerate() {
        tile.index = i;
    }

    tiles
}

/// Order tiles by distance of their center from the image center, so the
/// middle of the frame finishes first.
fn sort_center_out(tiles: &mut [Tile], width: u32, height: u32) {
    let center_x = width as f32 / 2.0;
    let center_y = height as f32 / 2.0;

    let distance = |tile: &Tile| {
        let tx = tile.x as f32 + tile.width as f32 / 2.0;
        let ty = tile.y as f32 + tile.height as f32 / 2.0;
        (tx - center_x).powi(2) + (ty - center_y).powi(2)
    };

    // Stable, so equidistant tiles keep row-major order
    tiles.sort_by(|a, b| distance(a).total_cmp(&distance(b)));
}

/// Pixels of one rendered tile.
#[derive(Debug, Clone)]
pub struct TileResult {
    pub tile: Tile,
    /// Colors in row-major order within the tile
    pub pixels: Vec<Color>,
    /// Camera samples traced for this tile
    pub samples: u64,
    /// Time spent rendering this tile
    pub elapsed: Duration,
}

/// Render every pixel of `tile`.
pub fn render_tile(
    tile: &Tile,
    camera: &Camera,
    world: &dyn Hittable,
    settings: &RenderSettings,
    rng: &mut dyn RngCore,
) -> TileResult {
    let start = Instant::now();
    let mut pixels = Vec::with_capacity(tile.pixel_count());

    for local_y in 0..tile.height {
        for local_x in 0..tile.width {
            let (x, y) = (tile.x + local_x, tile.y + local_y);
            pixels.push(render_pixel(camera, world, x, y, settings, rng));
        }
    }

    TileResult {
        tile: *tile,
        samples: pixels.len() as u64 * u64::from(camera.samples_per_pixel()),
        pixels,
        elapsed: start.elapsed(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Every pixel is covered by exactly one tile.
    fn assert_exact_cover(width: u32, height: u32, tile_size: u32) {
        let tiles = generate_tiles(width, height, tile_size);
        let mut coverage = vec![0u8; width as usize * height as usize];

        for tile in &tiles {
            assert!(tile.width >= 1 && tile.width <= tile_size);
            assert!(tile.height >= 1 && tile.height <= tile_size);
            assert!(tile.x + tile.width <= width);
            assert!(tile.y + tile.height <= height);

            for y in tile.y..tile.y + tile.height {
                for x in tile.x..tile.x + tile.width {
                    coverage[(y * width + x) as usize] += 1;
                }
            }
        }

        assert!(
            coverage.iter().all(|&c| c == 1),
            "{}x{} with tile {} is not an exact cover",
            width,
            height,
            tile_size
        );
    }

    #[test]
    fn test_tiles_cover_image_exactly() {
        for &(width, height) in &[(1, 1), (7, 3), (16, 16), (37, 23), (64, 5)] {
            for tile_size in 1..=width.max(height) {
                assert_exact_cover(width, height, tile_size);
            }
        }
    }

    #[test]
    fn test_exact_fit() {
        let tiles = generate_tiles(128, 128, 64);
        assert_eq!(tiles.len(), 4);
        let total: usize = tiles.iter().map(Tile::pixel_count).sum();
        assert_eq!(total, 128 * 128);
    }

    #[test]
    fn test_partial_edge_tiles() {
        let tiles = generate_tiles(100, 70, 64);
        assert_eq!(tiles.len(), 4);
        assert!(tiles.iter().any(|t| t.width == 36 && t.height == 6));
    }

    #[test]
    fn test_center_tile_first() {
        let tiles = generate_tiles(192, 192, 64);
        assert_eq!(tiles.len(), 9);
        assert_eq!((tiles[0].x, tiles[0].y), (64, 64));
        assert!(tiles.iter().enumerate().all(|(i, t)| t.index == i));
    }

    #[test]
    fn test_zero_tile_size_treated_as_one() {
        assert_eq!(generate_tiles(3, 2, 0).len(), 6);
    }

    #[test]
    fn test_tile_seeds_differ() {
        let tiles = generate_tiles(64, 64, 8);
        let mut seeds: Vec<u64> = tiles.iter().map(|t| t.seed(42)).collect();
        seeds.sort_unstable();
        seeds.dedup();
        assert_eq!(seeds.len(), tiles.len());
    }
}
