use std::time::{Duration, Instant};

use bytemuck::Zeroable;
use image::RgbaImage;
use raw_window_handle::{HasDisplayHandle, HasWindowHandle};
use thiserror::Error;
use tracing::debug;
use wgpu::util::DeviceExt;
use winit::dpi::PhysicalSize;

use hologram::{FrameState, Particle};

use crate::types::{AdapterProfile, ResourceInitError};

use super::context::GpuContext;
use super::pipeline::{
    check_particle_limits, workgroup_count, ParticlePipelines, DEPTH_FORMAT, VERTICES_PER_PARTICLE,
};
use super::uniforms::GpuFrameUniforms;

/// wgpu requires texture-to-buffer copies to use rows padded to this.
const COPY_ROW_ALIGNMENT: u32 = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;

#[derive(Debug, Error)]
pub(crate) enum ReadbackError {
    #[error("renderer has no offscreen target")]
    NoTarget,
    #[error("failed to wait for the GPU: {0}")]
    Poll(String),
    #[error("failed to map readback buffer: {0}")]
    Map(String),
    #[error("readback produced {got} bytes for a {width}x{height} frame")]
    Size { got: usize, width: u32, height: u32 },
}

struct DepthTarget {
    _texture: wgpu::Texture,
    view: wgpu::TextureView,
}

impl DepthTarget {
    fn new(device: &wgpu::Device, size: PhysicalSize<u32>) -> Self {
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("depth target"),
            size: extent(size),
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: DEPTH_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        Self {
            _texture: texture,
            view,
        }
    }
}

struct OffscreenTarget {
    texture: wgpu::Texture,
    view: wgpu::TextureView,
    readback: wgpu::Buffer,
    padded_bytes_per_row: u32,
}

impl OffscreenTarget {
    fn new(device: &wgpu::Device, format: wgpu::TextureFormat, size: PhysicalSize<u32>) -> Self {
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("offscreen color target"),
            size: extent(size),
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        let padded_bytes_per_row = padded_row_bytes(size.width);
        let readback = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("readback buffer"),
            size: u64::from(padded_bytes_per_row) * u64::from(size.height),
            usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
            mapped_at_creation: false,
        });
        Self {
            texture,
            view,
            readback,
            padded_bytes_per_row,
        }
    }
}

fn extent(size: PhysicalSize<u32>) -> wgpu::Extent3d {
    wgpu::Extent3d {
        width: size.width.max(1),
        height: size.height.max(1),
        depth_or_array_layers: 1,
    }
}

/// RGBA8 row length rounded up to the copy alignment.
pub(crate) fn padded_row_bytes(width: u32) -> u32 {
    let unpadded = width.max(1) * 4;
    unpadded.div_ceil(COPY_ROW_ALIGNMENT) * COPY_ROW_ALIGNMENT
}

/// Drops the per-row padding a readback buffer carries.
pub(crate) fn unpad_rows(data: &[u8], width: u32, height: u32, padded_bytes_per_row: u32) -> Vec<u8> {
    let row_bytes = (width * 4) as usize;
    let stride = padded_bytes_per_row as usize;
    let mut pixels = Vec::with_capacity(row_bytes * height as usize);
    for row in data.chunks(stride).take(height as usize) {
        pixels.extend_from_slice(&row[..row_bytes.min(row.len())]);
    }
    pixels
}

/// Owns the particle buffers and runs the compute-then-render sequence.
pub(crate) struct GpuState {
    context: GpuContext,
    pipelines: ParticlePipelines,
    uniform_buffer: wgpu::Buffer,
    _particle_buffer: wgpu::Buffer,
    compute_bind_group: wgpu::BindGroup,
    render_bind_group: wgpu::BindGroup,
    particle_count: u32,
    depth: DepthTarget,
    offscreen: Option<OffscreenTarget>,
    frames_since_last_update: u32,
    last_fps_update: Instant,
    frames_per_second: f32,
}

impl GpuState {
    pub(crate) fn for_window<T>(
        target: &T,
        size: PhysicalSize<u32>,
        particles: &[Particle],
    ) -> Result<Self, ResourceInitError>
    where
        T: HasDisplayHandle + HasWindowHandle,
    {
        let context = GpuContext::for_window(target, size)?;
        Self::from_context(context, particles)
    }

    pub(crate) fn headless(
        size: PhysicalSize<u32>,
        particles: &[Particle],
    ) -> Result<Self, ResourceInitError> {
        let context = GpuContext::headless(size)?;
        let mut state = Self::from_context(context, particles)?;
        state.offscreen = Some(OffscreenTarget::new(
            &state.context.device,
            state.context.color_format,
            state.context.size,
        ));
        Ok(state)
    }

    fn from_context(context: GpuContext, particles: &[Particle]) -> Result<Self, ResourceInitError> {
        let device = &context.device;
        let pipelines = ParticlePipelines::new(device, context.color_format)?;

        let particle_count = check_particle_limits(particles.len(), &device.limits())?;

        // A zero-sized storage binding is invalid; an empty field still gets
        // one zeroed slot and simply dispatches and draws nothing.
        let placeholder = [Particle::zeroed()];
        let contents: &[Particle] = if particles.is_empty() {
            &placeholder
        } else {
            particles
        };
        let particle_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("particle buffer"),
            contents: bytemuck::cast_slice(contents),
            usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_DST,
        });
        let uniform_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("frame uniforms"),
            size: std::mem::size_of::<GpuFrameUniforms>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let compute_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("motion bind group"),
            layout: &pipelines.compute_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: uniform_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: particle_buffer.as_entire_binding(),
                },
            ],
        });
        let render_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("sprite bind group"),
            layout: &pipelines.render_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: uniform_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: particle_buffer.as_entire_binding(),
                },
            ],
        });

        let depth = DepthTarget::new(device, context.size);
        debug!(particle_count, "uploaded particle field");

        Ok(Self {
            context,
            pipelines,
            uniform_buffer,
            _particle_buffer: particle_buffer,
            compute_bind_group,
            render_bind_group,
            particle_count,
            depth,
            offscreen: None,
            frames_since_last_update: 0,
            last_fps_update: Instant::now(),
            frames_per_second: 0.0,
        })
    }

    pub(crate) fn adapter_profile(&self) -> &AdapterProfile {
        &self.context.adapter_profile
    }

    pub(crate) fn size(&self) -> PhysicalSize<u32> {
        self.context.size
    }

    pub(crate) fn aspect(&self) -> f32 {
        self.context.size.width.max(1) as f32 / self.context.size.height.max(1) as f32
    }

    pub(crate) fn resize(&mut self, new_size: PhysicalSize<u32>) {
        if new_size.width == 0 || new_size.height == 0 {
            return;
        }
        self.context.resize(new_size);
        self.depth = DepthTarget::new(&self.context.device, new_size);
        if self.offscreen.is_some() {
            self.offscreen = Some(OffscreenTarget::new(
                &self.context.device,
                self.context.color_format,
                new_size,
            ));
        }
    }

    /// Runs motion then sprites into the window surface and presents.
    pub(crate) fn render(&mut self, state: &FrameState) -> Result<(), wgpu::SurfaceError> {
        let Some(binding) = self.context.surface.as_ref() else {
            return Err(wgpu::SurfaceError::Lost);
        };
        let frame = binding.surface.get_current_texture()?;
        let view = frame
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());
        let encoder = self.encode_frame(&view, state);
        self.context.queue.submit(std::iter::once(encoder.finish()));
        frame.present();
        self.record_frame();
        Ok(())
    }

    /// Renders into the offscreen target and reads the pixels back.
    pub(crate) fn render_to_image(&mut self, state: &FrameState) -> Result<RgbaImage, ReadbackError> {
        let Some(target) = self.offscreen.as_ref() else {
            return Err(ReadbackError::NoTarget);
        };
        let size = self.context.size;
        let mut encoder = self.encode_frame(&target.view, state);
        encoder.copy_texture_to_buffer(
            wgpu::TexelCopyTextureInfo {
                texture: &target.texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::TexelCopyBufferInfo {
                buffer: &target.readback,
                layout: wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(target.padded_bytes_per_row),
                    rows_per_image: Some(size.height),
                },
            },
            extent(size),
        );
        self.context.queue.submit(std::iter::once(encoder.finish()));

        let slice = target.readback.slice(..);
        let (tx, rx) = crossbeam_channel::bounded(1);
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = tx.send(result);
        });
        self.context
            .device
            .poll(wgpu::PollType::Wait)
            .map_err(|err| ReadbackError::Poll(err.to_string()))?;
        rx.recv()
            .map_err(|err| ReadbackError::Map(err.to_string()))?
            .map_err(|err| ReadbackError::Map(err.to_string()))?;

        let pixels = {
            let data = slice.get_mapped_range();
            unpad_rows(&data, size.width, size.height, target.padded_bytes_per_row)
        };
        target.readback.unmap();
        self.record_frame();

        let got = pixels.len();
        RgbaImage::from_raw(size.width, size.height, pixels).ok_or(ReadbackError::Size {
            got,
            width: size.width,
            height: size.height,
        })
    }

    /// Compute and render share one encoder, so the sprite pass never sees a
    /// half-updated particle buffer.
    fn encode_frame(&self, view: &wgpu::TextureView, state: &FrameState) -> wgpu::CommandEncoder {
        let (width, height) = (self.context.size.width, self.context.size.height);
        let uniforms = GpuFrameUniforms::new(state, (width, height), self.particle_count);
        self.context
            .queue
            .write_buffer(&self.uniform_buffer, 0, bytemuck::bytes_of(&uniforms));

        let mut encoder =
            self.context
                .device
                .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                    label: Some("frame encoder"),
                });

        if self.particle_count > 0 {
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("motion pass"),
                timestamp_writes: None,
            });
            pass.set_pipeline(&self.pipelines.motion);
            pass.set_bind_group(0, &self.compute_bind_group, &[]);
            pass.dispatch_workgroups(workgroup_count(self.particle_count), 1, 1);
        }

        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("sprite pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view,
                    depth_slice: None,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &self.depth.view,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                occlusion_query_set: None,
                timestamp_writes: None,
            });
            if self.particle_count > 0 {
                pass.set_pipeline(&self.pipelines.sprites);
                pass.set_bind_group(0, &self.render_bind_group, &[]);
                pass.draw(0..VERTICES_PER_PARTICLE, 0..self.particle_count);
            }
        }

        encoder
    }

    fn record_frame(&mut self) {
        let now = Instant::now();
        self.frames_since_last_update += 1;
        let elapsed = now.saturating_duration_since(self.last_fps_update);
        if elapsed >= Duration::from_secs(1) {
            self.frames_per_second = self.frames_since_last_update as f32 / elapsed.as_secs_f32();
            self.frames_since_last_update = 0;
            self.last_fps_update = now;
            debug!(
                fps = self.frames_per_second.round(),
                particles = self.particle_count,
                "render stats"
            );
        }
    }
}
