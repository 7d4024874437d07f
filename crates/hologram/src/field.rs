//! Samples a colour image and a depth mask into the immutable particle field.

use std::path::Path;

use glam::Vec3;
use image::{GrayImage, ImageError, RgbImage};

use crate::error::AssetLoadError;
use crate::particle::{Category, Particle};
use crate::{Z_BACK, Z_FRONT};

/// Knobs for [`build_field`].
#[derive(Debug, Clone, PartialEq)]
pub struct FieldParams {
    /// Approximate number of particles to sample.
    pub target_count: usize,
    /// World-space extent of the larger image dimension.
    pub world_span: f32,
}

impl Default for FieldParams {
    fn default() -> Self {
        Self {
            target_count: 30_000,
            world_span: 400.0,
        }
    }
}

/// Particles sampled from one image pair, sorted far-to-near.
#[derive(Debug, Clone, Default)]
pub struct ParticleField {
    particles: Vec<Particle>,
    centroid: Vec3,
    source_size: (u32, u32),
    stride: u32,
}

impl ParticleField {
    /// A field with nothing to render.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Loads the image pair, degrading to an empty field on failure.
    pub fn load_or_empty(color: &Path, depth: &Path, params: &FieldParams) -> Self {
        match load_field(color, depth, params) {
            Ok(field) => field,
            Err(err) => {
                tracing::warn!(error = %err, "failed to build particle field; rendering an empty frame");
                Self::empty()
            }
        }
    }

    pub fn particles(&self) -> &[Particle] {
        &self.particles
    }

    pub fn particles_mut(&mut self) -> &mut [Particle] {
        &mut self.particles
    }

    pub fn len(&self) -> usize {
        self.particles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.particles.is_empty()
    }

    /// Mean of the initial positions; a rough focus point, not the orbital pivot.
    pub fn centroid(&self) -> Vec3 {
        self.centroid
    }

    pub fn source_size(&self) -> (u32, u32) {
        self.source_size
    }

    pub fn stride(&self) -> u32 {
        self.stride
    }

    /// Number of particles per [`Category`], indexed by category.
    pub fn category_histogram(&self) -> [usize; 4] {
        let mut counts = [0usize; 4];
        for particle in &self.particles {
            counts[particle.category().index() as usize] += 1;
        }
        counts
    }

    /// Smallest and largest original Z, if any particles exist.
    pub fn depth_bounds(&self) -> Option<(f32, f32)> {
        // Sorted ascending by Z at build time.
        let first = self.particles.first()?.original_position.z;
        let last = self.particles.last()?.original_position.z;
        Some((first, last))
    }
}

/// Pixel stride that brings `pixel_count` close to `target_count` samples.
pub fn sampling_stride(pixel_count: u64, target_count: usize) -> u32 {
    if target_count == 0 {
        return 1;
    }
    let ratio = pixel_count as f64 / target_count as f64;
    (ratio.sqrt().floor() as u32).max(1)
}

/// Decodes both images from disk and builds the field.
pub fn load_field(
    color_path: &Path,
    depth_path: &Path,
    params: &FieldParams,
) -> Result<ParticleField, AssetLoadError> {
    let color = open_image(color_path)?.to_rgb8();
    let depth = open_image(depth_path)?.to_luma8();
    tracing::debug!(
        color = %color_path.display(),
        depth = %depth_path.display(),
        width = color.width(),
        height = color.height(),
        "decoded source images"
    );
    build_field(&color, &depth, params)
}

fn open_image(path: &Path) -> Result<image::DynamicImage, AssetLoadError> {
    image::open(path).map_err(|err| match err {
        ImageError::IoError(source) => AssetLoadError::Io {
            path: path.to_path_buf(),
            source,
        },
        other => AssetLoadError::Decode {
            path: path.to_path_buf(),
            source: other,
        },
    })
}

/// Samples every `stride`-th pixel of the pair into particles.
///
/// X/Y are centred on the origin with the larger image dimension spanning
/// `params.world_span`; Z maps mask intensity onto `[Z_BACK, Z_FRONT]` so the
/// brightest mask pixels sit nearest the camera on +Z.
pub fn build_field(
    color: &RgbImage,
    depth: &GrayImage,
    params: &FieldParams,
) -> Result<ParticleField, AssetLoadError> {
    if color.dimensions() != depth.dimensions() {
        return Err(AssetLoadError::DimensionMismatch {
            color_width: color.width(),
            color_height: color.height(),
            depth_width: depth.width(),
            depth_height: depth.height(),
        });
    }
    let (width, height) = color.dimensions();
    if width == 0 || height == 0 {
        return Err(AssetLoadError::Empty);
    }

    let stride = sampling_stride(u64::from(width) * u64::from(height), params.target_count);
    let scale = params.world_span / width.max(height) as f32;
    let half_w = width as f32 * 0.5;
    let half_h = height as f32 * 0.5;

    let mut particles = Vec::with_capacity(
        (width.div_ceil(stride) as usize) * (height.div_ceil(stride) as usize),
    );
    for y in (0..height).step_by(stride as usize) {
        for x in (0..width).step_by(stride as usize) {
            let [r, g, b] = color.get_pixel(x, y).0;
            let mask = f32::from(depth.get_pixel(x, y).0[0]) / 255.0;

            let position = Vec3::new(
                (x as f32 + 0.5 - half_w) * scale,
                (half_h - (y as f32 + 0.5)) * scale,
                Z_BACK + mask * (Z_FRONT - Z_BACK),
            );
            let rgb = Vec3::new(f32::from(r), f32::from(g), f32::from(b));
            let brightness = (rgb.x + rgb.y + rgb.z) / (3.0 * 255.0);
            particles.push(Particle::new(
                position,
                rgb,
                mask,
                Category::from_brightness(brightness),
            ));
        }
    }

    let centroid = if particles.is_empty() {
        Vec3::ZERO
    } else {
        particles
            .iter()
            .fold(Vec3::ZERO, |acc, p| acc + p.original_position)
            / particles.len() as f32
    };

    // Back-to-front for a camera on +Z; the depth test alone handles occlusion.
    particles.sort_by(|a, b| a.original_position.z.total_cmp(&b.original_position.z));

    tracing::debug!(
        particles = particles.len(),
        stride,
        width,
        height,
        centroid = ?centroid,
        "built particle field"
    );

    Ok(ParticleField {
        particles,
        centroid,
        source_size: (width, height),
        stride,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Luma, Rgb};

    fn solid_pair(width: u32, height: u32, rgb: [u8; 3], mask: u8) -> (RgbImage, GrayImage) {
        (
            RgbImage::from_pixel(width, height, Rgb(rgb)),
            GrayImage::from_pixel(width, height, Luma([mask])),
        )
    }

    #[test]
    fn stride_targets_requested_budget() {
        assert_eq!(sampling_stride(16, 16), 1);
        assert_eq!(sampling_stride(16, 30_000), 1);
        assert_eq!(sampling_stride(1920 * 1080, 30_000), 8);
        assert_eq!(sampling_stride(100, 0), 1);
    }

    #[test]
    fn rejects_mismatched_dimensions() {
        let color = RgbImage::new(4, 4);
        let depth = GrayImage::new(4, 3);
        let err = build_field(&color, &depth, &FieldParams::default()).unwrap_err();
        assert!(matches!(err, AssetLoadError::DimensionMismatch { .. }));
    }

    #[test]
    fn rejects_empty_images() {
        let err = build_field(&RgbImage::new(0, 0), &GrayImage::new(0, 0), &FieldParams::default())
            .unwrap_err();
        assert!(matches!(err, AssetLoadError::Empty));
    }

    #[test]
    fn larger_dimension_spans_world_span() {
        let (color, depth) = solid_pair(8, 4, [255, 255, 255], 0);
        let field = build_field(&color, &depth, &FieldParams::default()).unwrap();
        let xs: Vec<f32> = field.particles().iter().map(|p| p.position.x).collect();
        let min = xs.iter().cloned().fold(f32::MAX, f32::min);
        let max = xs.iter().cloned().fold(f32::MIN, f32::max);
        // Pixel centres: the outermost samples sit half a pixel inside the span.
        assert!((max - min - 350.0).abs() < 1e-3);
        assert!((min + max).abs() < 1e-3);
    }

    #[test]
    fn mask_intensity_maps_onto_depth_range() {
        let (color, depth) = solid_pair(2, 2, [0, 0, 0], 255);
        let field = build_field(&color, &depth, &FieldParams::default()).unwrap();
        assert!(field.particles().iter().all(|p| (p.position.z - Z_FRONT).abs() < 1e-4));
        assert!(field.particles().iter().all(|p| (p.size - 1.0).abs() < 1e-6));

        let (color, depth) = solid_pair(2, 2, [0, 0, 0], 0);
        let field = build_field(&color, &depth, &FieldParams::default()).unwrap();
        assert!(field.particles().iter().all(|p| (p.position.z - Z_BACK).abs() < 1e-4));
    }

    #[test]
    fn particles_are_sorted_far_to_near() {
        let color = RgbImage::from_pixel(3, 3, Rgb([200, 10, 10]));
        let depth = GrayImage::from_fn(3, 3, |x, y| Luma([((x * 3 + y) * 28) as u8]));
        let field = build_field(&color, &depth, &FieldParams::default()).unwrap();
        let zs: Vec<f32> = field.particles().iter().map(|p| p.position.z).collect();
        assert!(zs.windows(2).all(|w| w[0] <= w[1]));
        let (lo, hi) = field.depth_bounds().unwrap();
        assert_eq!(lo, zs[0]);
        assert_eq!(hi, zs[zs.len() - 1]);
    }

    #[test]
    fn centroid_of_symmetric_field_is_on_axis() {
        let (color, depth) = solid_pair(4, 4, [10, 10, 10], 128);
        let field = build_field(&color, &depth, &FieldParams::default()).unwrap();
        let centroid = field.centroid();
        assert!(centroid.x.abs() < 1e-4);
        assert!(centroid.y.abs() < 1e-4);
        assert!(centroid.z > Z_BACK && centroid.z < Z_FRONT);
    }

    #[test]
    fn missing_file_degrades_to_empty_field() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.png");
        let err = load_field(&missing, &missing, &FieldParams::default()).unwrap_err();
        assert!(matches!(err, AssetLoadError::Io { .. }));

        let field = ParticleField::load_or_empty(&missing, &missing, &FieldParams::default());
        assert!(field.is_empty());
        assert_eq!(field.depth_bounds(), None);
    }
}
