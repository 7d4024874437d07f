use std::borrow::Cow;
use std::num::NonZeroU64;

use crate::types::ResourceInitError;

use super::uniforms::GpuFrameUniforms;

const MOTION_SHADER: &str = concat!(
    include_str!("shaders/common.wgsl"),
    include_str!("shaders/motion.wgsl")
);
const PARTICLE_SHADER: &str = concat!(
    include_str!("shaders/common.wgsl"),
    include_str!("shaders/particles.wgsl")
);

pub(crate) const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;
/// Must match `@workgroup_size` in `motion.wgsl`.
pub(crate) const WORKGROUP_SIZE: u32 = 64;
/// Two triangles per particle quad.
pub(crate) const VERTICES_PER_PARTICLE: u32 = 6;

/// Layouts and pipelines for the compute and point-sprite passes.
///
/// Both passes bind the frame uniforms at 0 and the particle buffer at 1; the
/// compute side sees the buffer read-write, the vertex stage read-only.
pub(crate) struct ParticlePipelines {
    pub compute_layout: wgpu::BindGroupLayout,
    pub render_layout: wgpu::BindGroupLayout,
    pub motion: wgpu::ComputePipeline,
    pub sprites: wgpu::RenderPipeline,
}

fn uniform_entry(visibility: wgpu::ShaderStages) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding: 0,
        visibility,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Uniform,
            has_dynamic_offset: false,
            min_binding_size: NonZeroU64::new(std::mem::size_of::<GpuFrameUniforms>() as u64),
        },
        count: None,
    }
}

fn particle_entry(visibility: wgpu::ShaderStages, read_only: bool) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding: 1,
        visibility,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Storage { read_only },
            has_dynamic_offset: false,
            min_binding_size: NonZeroU64::new(std::mem::size_of::<hologram::Particle>() as u64),
        },
        count: None,
    }
}

fn create_module(
    device: &wgpu::Device,
    label: &str,
    source: &'static str,
) -> Result<wgpu::ShaderModule, ResourceInitError> {
    device.push_error_scope(wgpu::ErrorFilter::Validation);
    let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some(label),
        source: wgpu::ShaderSource::Wgsl(Cow::Borrowed(source)),
    });
    match pollster::block_on(device.pop_error_scope()) {
        Some(err) => Err(ResourceInitError::Shader(format!("{label}: {err}"))),
        None => Ok(module),
    }
}

impl ParticlePipelines {
    pub fn new(
        device: &wgpu::Device,
        color_format: wgpu::TextureFormat,
    ) -> Result<Self, ResourceInitError> {
        let compute_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("motion layout"),
            entries: &[
                uniform_entry(wgpu::ShaderStages::COMPUTE),
                particle_entry(wgpu::ShaderStages::COMPUTE, false),
            ],
        });
        let render_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("sprite layout"),
            entries: &[
                uniform_entry(wgpu::ShaderStages::VERTEX_FRAGMENT),
                particle_entry(wgpu::ShaderStages::VERTEX, true),
            ],
        });

        let motion_module = create_module(device, "motion shader", MOTION_SHADER)?;
        let sprite_module = create_module(device, "particle shader", PARTICLE_SHADER)?;

        let motion_pipeline_layout =
            device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some("motion pipeline layout"),
                bind_group_layouts: &[&compute_layout],
                push_constant_ranges: &[],
            });
        let motion = device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
            label: Some("motion pipeline"),
            layout: Some(&motion_pipeline_layout),
            module: &motion_module,
            entry_point: Some("cs_main"),
            compilation_options: wgpu::PipelineCompilationOptions::default(),
            cache: None,
        });

        let sprite_pipeline_layout =
            device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some("sprite pipeline layout"),
                bind_group_layouts: &[&render_layout],
                push_constant_ranges: &[],
            });
        let sprites = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("sprite pipeline"),
            layout: Some(&sprite_pipeline_layout),
            vertex: wgpu::VertexState {
                module: &sprite_module,
                entry_point: Some("vs_main"),
                buffers: &[],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            },
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                strip_index_format: None,
                front_face: wgpu::FrontFace::Ccw,
                cull_mode: None,
                polygon_mode: wgpu::PolygonMode::Fill,
                unclipped_depth: false,
                conservative: false,
            },
            depth_stencil: Some(wgpu::DepthStencilState {
                format: DEPTH_FORMAT,
                depth_write_enabled: true,
                depth_compare: wgpu::CompareFunction::Less,
                stencil: wgpu::StencilState::default(),
                bias: wgpu::DepthBiasState::default(),
            }),
            multisample: wgpu::MultisampleState {
                count: 1,
                mask: !0,
                alpha_to_coverage_enabled: false,
            },
            fragment: Some(wgpu::FragmentState {
                module: &sprite_module,
                entry_point: Some("fs_main"),
                targets: &[Some(wgpu::ColorTargetState {
                    format: color_format,
                    blend: Some(wgpu::BlendState::ALPHA_BLENDING),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            }),
            multiview: None,
            cache: None,
        });

        Ok(Self {
            compute_layout,
            render_layout,
            motion,
            sprites,
        })
    }
}

/// Workgroups needed to cover `count` particles.
pub(crate) fn workgroup_count(count: u32) -> u32 {
    count.div_ceil(WORKGROUP_SIZE)
}

/// Checks that `count` particles fit one storage binding and one dispatch.
pub(crate) fn check_particle_limits(
    count: usize,
    limits: &wgpu::Limits,
) -> Result<u32, ResourceInitError> {
    let too_many = |detail: String| {
        ResourceInitError::Device(format!(
            "{count} particles exceed this GPU's limits ({detail}); lower --particles"
        ))
    };
    let count32 = u32::try_from(count).map_err(|_| too_many("count does not fit in u32".into()))?;

    let bytes = count as u64 * std::mem::size_of::<hologram::Particle>() as u64;
    let max_binding = u64::from(limits.max_storage_buffer_binding_size);
    if bytes > max_binding || bytes > limits.max_buffer_size {
        return Err(too_many(format!(
            "{bytes} byte buffer, max binding {max_binding}, max buffer {}",
            limits.max_buffer_size
        )));
    }

    let groups = workgroup_count(count32);
    if groups > limits.max_compute_workgroups_per_dimension {
        return Err(too_many(format!(
            "{groups} workgroups, max {}",
            limits.max_compute_workgroups_per_dimension
        )));
    }
    Ok(count32)
}
