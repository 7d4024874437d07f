use bytemuck::{Pod, Zeroable};
use glam::Vec3;

/// Brightness bucket of a particle. Only affects the rendered sprite size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Category {
    Dark = 0,
    Dim = 1,
    Bright = 2,
    Highlight = 3,
}

impl Category {
    /// Quantises an average brightness in `[0, 1]` with thresholds at 0.2/0.5/0.8.
    pub fn from_brightness(brightness: f32) -> Self {
        if brightness < 0.2 {
            Category::Dark
        } else if brightness < 0.5 {
            Category::Dim
        } else if brightness < 0.8 {
            Category::Bright
        } else {
            Category::Highlight
        }
    }

    pub fn from_index(index: u32) -> Self {
        match index {
            0 => Category::Dark,
            1 => Category::Dim,
            2 => Category::Bright,
            _ => Category::Highlight,
        }
    }

    pub fn index(self) -> u32 {
        self as u32
    }
}

/// One point sprite sampled from a source pixel.
///
/// The struct crosses the host/device boundary unchanged: it is uploaded as a
/// WGSL storage buffer of `Particle` where every `vec3<f32>` is followed by a
/// scalar that fills its 16-byte slot.
///
/// | offset | field               | WGSL        |
/// |--------|---------------------|-------------|
/// | 0      | `position`          | `vec3<f32>` |
/// | 12     | `size`              | `f32`       |
/// | 16     | `original_position` | `vec3<f32>` |
/// | 28     | `opacity`           | `f32`       |
/// | 32     | `color`             | `vec3<f32>` |
/// | 44     | `normalized_depth`  | `f32`       |
/// | 48     | `velocity`          | `vec3<f32>` |
/// | 60     | `category`          | `u32`       |
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct Particle {
    pub position: Vec3,
    pub size: f32,
    /// Written once by the field builder; all motion derives from it.
    pub original_position: Vec3,
    pub opacity: f32,
    /// Channel values in `[0, 255]`.
    pub color: Vec3,
    pub normalized_depth: f32,
    pub velocity: Vec3,
    pub category: u32,
}

impl Particle {
    pub fn new(position: Vec3, color: Vec3, size: f32, category: Category) -> Self {
        Self {
            position,
            size: size.clamp(0.0, 1.0),
            original_position: position,
            opacity: 1.0,
            color,
            normalized_depth: 0.0,
            velocity: Vec3::ZERO,
            category: category.index(),
        }
    }

    pub fn category(&self) -> Category {
        Category::from_index(self.category)
    }

    /// True when the current position can be projected safely.
    pub fn is_finite(&self) -> bool {
        self.position.is_finite() && self.normalized_depth.is_finite()
    }
}
