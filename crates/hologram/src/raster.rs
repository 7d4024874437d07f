//! Software implementation of the point-sprite render pass.
//!
//! This is the reference for `renderer/src/gpu/shaders/particles.wgsl`: the
//! same size, fade and dissolve rules, drawn as discs with a `Less` depth test
//! and straight-alpha source-over blending.

use glam::{Vec2, Vec3};
use image::{Rgba, RgbaImage};

use crate::camera::CameraMatrices;
use crate::controls::{Controls, FrameUniforms};
use crate::motion::position_hash;
use crate::particle::Particle;

/// Pixel size of a particle with `size == 0` before scaling.
pub const BASE_SIZE_MIN: f32 = 8.0;
/// Pixel size of a particle with `size == 1` before scaling.
pub const BASE_SIZE_MAX: f32 = 40.0;
/// Size multiplier per category, darkest first.
pub const CATEGORY_SCALE: [f32; 4] = [0.6, 0.8, 1.0, 1.25];
/// Numerator of the inverse-depth falloff.
pub const DEPTH_FALLOFF: f32 = 400.0;
pub const MIN_VIEW_DEPTH: f32 = 1.0;
pub const MIN_POINT_SIZE: f32 = 1.0;
pub const MAX_POINT_SIZE: f32 = 200.0;
/// Fragments below this alpha are discarded.
pub const ALPHA_DISCARD: f32 = 0.01;

/// Final sprite diameter in pixels.
pub fn point_size(particle: &Particle, view_depth: f32, size_multiplier: f32) -> f32 {
    let base = BASE_SIZE_MIN + particle.size * (BASE_SIZE_MAX - BASE_SIZE_MIN);
    let category = CATEGORY_SCALE[particle.category().index() as usize];
    let falloff = DEPTH_FALLOFF / view_depth.max(MIN_VIEW_DEPTH);
    (base * category * falloff * size_multiplier).clamp(MIN_POINT_SIZE, MAX_POINT_SIZE)
}

fn smoothstep(edge0: f32, edge1: f32, x: f32) -> f32 {
    if edge1 <= edge0 {
        return if x < edge0 { 0.0 } else { 1.0 };
    }
    let t = ((x - edge0) / (edge1 - edge0)).clamp(0.0, 1.0);
    t * t * (3.0 - 2.0 * t)
}

/// Multiplier from the background-hide slider; 1 means untouched.
pub fn background_fade(normalized_depth: f32, background_hide: f32) -> f32 {
    if background_hide <= 0.0 {
        return 1.0;
    }
    1.0 - smoothstep(1.0 - background_hide, 1.0, normalized_depth)
}

/// 0 when the dissolve threshold hides this particle, otherwise 1.
pub fn dissolve_visibility(original: Vec3, dissolve: f32) -> f32 {
    if position_hash(original) < dissolve {
        0.0
    } else {
        1.0
    }
}

/// Opacity after base opacity, background fade and dissolve, in that order.
pub fn particle_opacity(particle: &Particle, controls: &Controls) -> f32 {
    if !particle.is_finite() {
        return 0.0;
    }
    particle.opacity
        * background_fade(particle.normalized_depth, controls.background_hide)
        * dissolve_visibility(particle.original_position, controls.dissolve)
}

/// A particle resolved to screen space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sprite {
    /// Centre in pixels, origin top-left.
    pub center: Vec2,
    /// Normalised device depth in `[0, 1]`.
    pub depth: f32,
    pub size: f32,
    pub color: Vec3,
    pub alpha: f32,
}

/// Why a particle produced no sprite.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Culled {
    /// Non-finite geometry; rendered as zero size and zero opacity.
    Degenerate,
    /// Behind the camera or outside the depth range.
    Clipped,
    /// Faded, dissolved, or otherwise below the alpha threshold.
    Transparent,
}

/// Projects a particle and applies the sizing and visibility rules.
pub fn project_particle(
    particle: &Particle,
    matrices: &CameraMatrices,
    controls: &Controls,
    viewport: (u32, u32),
) -> Result<Sprite, Culled> {
    if !particle.is_finite() || !matrices.is_finite() {
        return Err(Culled::Degenerate);
    }
    let clip = matrices.project(particle.position);
    if !clip.is_finite() {
        return Err(Culled::Degenerate);
    }
    if clip.w <= 0.0 {
        return Err(Culled::Clipped);
    }
    let ndc = clip.truncate() / clip.w;
    if !(0.0..=1.0).contains(&ndc.z) {
        return Err(Culled::Clipped);
    }

    let size = point_size(
        particle,
        matrices.view_depth(particle.position),
        controls.size_multiplier,
    );
    if !size.is_finite() {
        return Err(Culled::Degenerate);
    }
    let alpha = particle_opacity(particle, controls);
    if alpha < ALPHA_DISCARD {
        return Err(Culled::Transparent);
    }

    let (width, height) = viewport;
    Ok(Sprite {
        center: Vec2::new(
            (ndc.x * 0.5 + 0.5) * width as f32,
            (0.5 - ndc.y * 0.5) * height as f32,
        ),
        depth: ndc.z,
        size,
        color: particle.color / 255.0,
        alpha,
    })
}

/// Counters from one [`render_particles`] call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RenderStats {
    pub drawn: usize,
    pub clipped: usize,
    pub transparent: usize,
    pub degenerate: usize,
}

/// CPU colour + depth target.
#[derive(Debug, Clone)]
pub struct SoftwareTarget {
    width: u32,
    height: u32,
    color: Vec<[f32; 4]>,
    depth: Vec<f32>,
    clear_color: [f32; 4],
}

impl SoftwareTarget {
    pub fn new(width: u32, height: u32) -> Self {
        let len = width as usize * height as usize;
        let clear_color = [0.0, 0.0, 0.0, 1.0];
        Self {
            width,
            height,
            color: vec![clear_color; len],
            depth: vec![1.0; len],
            clear_color,
        }
    }

    pub fn with_clear_color(mut self, clear_color: [f32; 4]) -> Self {
        self.clear_color = clear_color;
        self.clear();
        self
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn clear(&mut self) {
        self.color.fill(self.clear_color);
        self.depth.fill(1.0);
    }

    pub fn pixel(&self, x: u32, y: u32) -> [f32; 4] {
        self.color[(y * self.width + x) as usize]
    }

    pub fn depth_at(&self, x: u32, y: u32) -> f32 {
        self.depth[(y * self.width + x) as usize]
    }

    /// Pixels whose depth was written since the last clear.
    pub fn covered_pixels(&self) -> usize {
        self.depth.iter().filter(|&&d| d < 1.0).count()
    }

    /// Draws a disc inscribed in the sprite's square.
    pub fn draw_sprite(&mut self, sprite: &Sprite) {
        let radius = sprite.size * 0.5;
        let x0 = (sprite.center.x - radius).floor().max(0.0) as u32;
        let y0 = (sprite.center.y - radius).floor().max(0.0) as u32;
        let x1 = ((sprite.center.x + radius).ceil().max(0.0) as u32).min(self.width);
        let y1 = ((sprite.center.y + radius).ceil().max(0.0) as u32).min(self.height);
        let radius_sq = radius * radius;

        for y in y0..y1 {
            for x in x0..x1 {
                let offset = Vec2::new(x as f32 + 0.5, y as f32 + 0.5) - sprite.center;
                if offset.length_squared() > radius_sq {
                    continue;
                }
                let index = (y * self.width + x) as usize;
                if sprite.depth >= self.depth[index] {
                    continue;
                }
                self.depth[index] = sprite.depth;
                let dst = self.color[index];
                let a = sprite.alpha;
                self.color[index] = [
                    sprite.color.x * a + dst[0] * (1.0 - a),
                    sprite.color.y * a + dst[1] * (1.0 - a),
                    sprite.color.z * a + dst[2] * (1.0 - a),
                    a + dst[3] * (1.0 - a),
                ];
            }
        }
    }

    pub fn to_image(&self) -> RgbaImage {
        RgbaImage::from_fn(self.width, self.height, |x, y| {
            let [r, g, b, a] = self.pixel(x, y);
            Rgba([to_u8(r), to_u8(g), to_u8(b), to_u8(a)])
        })
    }
}

fn to_u8(channel: f32) -> u8 {
    (channel.clamp(0.0, 1.0) * 255.0).round() as u8
}

/// Draws every visible particle into `target` in slice order.
pub fn render_particles(
    particles: &[Particle],
    matrices: &CameraMatrices,
    frame: &FrameUniforms,
    target: &mut SoftwareTarget,
) -> RenderStats {
    let viewport = target.size();
    let mut stats = RenderStats::default();
    for particle in particles {
        match project_particle(particle, matrices, &frame.controls, viewport) {
            Ok(sprite) => {
                target.draw_sprite(&sprite);
                stats.drawn += 1;
            }
            Err(Culled::Clipped) => stats.clipped += 1,
            Err(Culled::Transparent) => stats.transparent += 1,
            Err(Culled::Degenerate) => stats.degenerate += 1,
        }
    }
    stats
}
