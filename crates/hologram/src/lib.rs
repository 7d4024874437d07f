//! Core pipeline for the holoscope particle hologram.
//!
//! A colour image and a matching depth mask are sampled once into an immutable
//! particle field. Every frame then runs a straight compute-then-render pass:
//!
//! ```text
//!   color.png + depth.png
//!          │ field::build_field (once)
//!          ▼
//!   ParticleField ──▶ Hologram::tick ──▶ motion::update_particles (rayon)
//!                          │                        │
//!                          │ camera_matrices        ▼
//!                          └──────────────▶ raster::render_particles / GPU pass
//! ```
//!
//! Nothing here touches the GPU. The `renderer` crate uploads the same
//! [`Particle`] layout to a storage buffer and runs the WGSL mirror of
//! [`motion::apply_motion`] as a compute pass; the software rasterizer in
//! [`raster`] is the reference implementation of the render pass.

pub mod camera;
pub mod controls;
mod error;
pub mod field;
pub mod frame;
pub mod motion;
pub mod particle;
pub mod raster;

pub use camera::{camera_matrices, CameraMatrices, CameraRig};
pub use controls::{ControlKind, Controls, FrameClock, FrameUniforms, SharedControls};
pub use error::AssetLoadError;
pub use field::{build_field, load_field, FieldParams, ParticleField};
pub use frame::{FrameState, Hologram};
pub use motion::{apply_motion, position_hash, update_particles, MotionOutput};
pub use particle::{Category, Particle};
pub use raster::{render_particles, SoftwareTarget};

/// Z of the farthest sampled particle (mask intensity 0).
pub const Z_BACK: f32 = 20.0;
/// Z of the nearest sampled particle (mask intensity 255).
pub const Z_FRONT: f32 = 80.0;
