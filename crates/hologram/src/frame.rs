//! Frame sequencing for the CPU path.

use crate::camera::{camera_matrices, CameraMatrices, CameraRig};
use crate::controls::{Controls, FrameClock, FrameUniforms};
use crate::field::ParticleField;
use crate::motion::update_particles;
use crate::raster::{render_particles, RenderStats, SoftwareTarget};

/// What one [`Hologram::tick`] produced.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameState {
    pub uniforms: FrameUniforms,
    pub matrices: CameraMatrices,
    /// Particles reset by the runaway clamp this frame.
    pub recovered: usize,
}

/// Owns the particle field, camera rig and clock for one viewer.
#[derive(Debug, Clone)]
pub struct Hologram {
    field: ParticleField,
    rig: CameraRig,
    clock: FrameClock,
}

impl Hologram {
    pub fn new(field: ParticleField, rig: CameraRig) -> Self {
        Self {
            field,
            rig,
            clock: FrameClock::new(),
        }
    }

    pub fn field(&self) -> &ParticleField {
        &self.field
    }

    pub fn rig(&self) -> &CameraRig {
        &self.rig
    }

    pub fn clock(&self) -> &FrameClock {
        &self.clock
    }

    /// Advances time and rebuilds the camera without touching the particles.
    ///
    /// The GPU path calls this and runs the motion kernel as a compute pass.
    pub fn prepare(&mut self, dt: f32, controls: Controls, aspect: f32) -> FrameState {
        self.clock.advance(dt, controls.rotation_speed);
        FrameState {
            uniforms: self.clock.uniforms(controls),
            matrices: camera_matrices(&self.rig, aspect, controls.zoom),
            recovered: 0,
        }
    }

    /// Advances time, rebuilds the camera, then runs the motion kernel.
    ///
    /// `controls` must be a single snapshot taken at the start of the frame.
    pub fn tick(&mut self, dt: f32, controls: Controls, aspect: f32) -> FrameState {
        let mut state = self.prepare(dt, controls, aspect);
        state.recovered = update_particles(self.field.particles_mut(), &state.uniforms);
        if state.recovered > 0 {
            tracing::trace!(recovered = state.recovered, "runaway particles reset");
        }
        state
    }

    /// Ticks once and draws the result into `target`.
    pub fn render_software(
        &mut self,
        dt: f32,
        controls: Controls,
        target: &mut SoftwareTarget,
    ) -> (FrameState, RenderStats) {
        let (width, height) = target.size();
        let aspect = width as f32 / height.max(1) as f32;
        let state = self.tick(dt, controls, aspect);
        target.clear();
        let stats = render_particles(
            self.field.particles(),
            &state.matrices,
            &state.uniforms,
            target,
        );
        (state, stats)
    }
}
