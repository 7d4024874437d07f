//! wgpu side of the hologram.
//!
//! - `context` owns the instance, device and (for the preview) the window
//!   surface, and reconfigures the swapchain on resize.
//! - `pipeline` builds the motion compute pipeline and the instanced
//!   point-sprite render pipeline from the WGSL under `shaders/`.
//! - `uniforms` packs a [`hologram::FrameState`] into the 192-byte block both
//!   passes read.
//! - `state` uploads the particle field once and encodes compute then render
//!   into a single command buffer per frame, either presenting to the surface
//!   or reading the frame back for export.

mod context;
mod pipeline;
mod state;
mod uniforms;

pub(crate) use state::GpuState;
