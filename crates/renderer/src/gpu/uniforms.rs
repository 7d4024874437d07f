use bytemuck::{Pod, Zeroable};
use hologram::motion::ORBITAL_CENTER;
use hologram::FrameState;

/// Uniform block shared by the motion kernel and the point-sprite pass.
///
/// Field order matches `FrameUniforms` in `shaders/common.wgsl`; `vec3` slots
/// are paired with a trailing scalar so nothing relies on implicit padding.
#[repr(C, align(16))]
#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) struct GpuFrameUniforms {
    pub view: [[f32; 4]; 4],
    pub proj: [[f32; 4]; 4],
    pub orbital_center: [f32; 3],
    pub rotation: f32,
    pub viewport: [f32; 2],
    pub time: f32,
    pub particle_count: u32,
    pub size_multiplier: f32,
    pub depth_scale: f32,
    pub background_hide: f32,
    pub dissolve: f32,
    pub wobble: f32,
    pub padding: [f32; 3],
}

unsafe impl Zeroable for GpuFrameUniforms {}
unsafe impl Pod for GpuFrameUniforms {}

impl GpuFrameUniforms {
    pub fn new(state: &FrameState, viewport: (u32, u32), particle_count: u32) -> Self {
        let controls = state.uniforms.controls;
        Self {
            view: state.matrices.view.to_cols_array_2d(),
            proj: state.matrices.proj.to_cols_array_2d(),
            orbital_center: ORBITAL_CENTER.to_array(),
            rotation: state.uniforms.rotation,
            viewport: [viewport.0.max(1) as f32, viewport.1.max(1) as f32],
            time: state.uniforms.elapsed,
            particle_count,
            size_multiplier: controls.size_multiplier,
            depth_scale: controls.depth_scale,
            background_hide: controls.background_hide,
            dissolve: controls.dissolve,
            wobble: controls.wobble,
            padding: [0.0; 3],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hologram::{camera_matrices, CameraRig, Controls, FrameUniforms};
    use std::mem::{offset_of, size_of};

    #[test]
    fn layout_matches_wgsl_struct() {
        assert_eq!(size_of::<GpuFrameUniforms>(), 192);
        assert_eq!(offset_of!(GpuFrameUniforms, proj), 64);
        assert_eq!(offset_of!(GpuFrameUniforms, orbital_center), 128);
        assert_eq!(offset_of!(GpuFrameUniforms, rotation), 140);
        assert_eq!(offset_of!(GpuFrameUniforms, viewport), 144);
        assert_eq!(offset_of!(GpuFrameUniforms, time), 152);
        assert_eq!(offset_of!(GpuFrameUniforms, particle_count), 156);
        assert_eq!(offset_of!(GpuFrameUniforms, size_multiplier), 160);
        assert_eq!(offset_of!(GpuFrameUniforms, wobble), 176);
    }

    #[test]
    fn copies_frame_state_and_guards_zero_viewport() {
        let controls = Controls {
            dissolve: 0.25,
            ..Controls::default()
        };
        let state = FrameState {
            uniforms: FrameUniforms::new(3.0, 1.5, controls),
            matrices: camera_matrices(&CameraRig::default(), 2.0, 1.0),
            recovered: 0,
        };
        let uniforms = GpuFrameUniforms::new(&state, (0, 720), 42);
        assert_eq!(uniforms.viewport, [1.0, 720.0]);
        assert_eq!(uniforms.particle_count, 42);
        assert_eq!(uniforms.time, 3.0);
        assert_eq!(uniforms.rotation, 1.5);
        assert_eq!(uniforms.dissolve, 0.25);
        assert_eq!(uniforms.orbital_center, [0.0, 0.0, 50.0]);
        assert_eq!(bytemuck::bytes_of(&uniforms).len(), 192);
    }
}
