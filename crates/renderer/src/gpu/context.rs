use raw_window_handle::{HasDisplayHandle, HasWindowHandle};
use winit::dpi::PhysicalSize;

use crate::types::{AdapterProfile, ResourceInitError};

/// Format used for offscreen export targets.
pub(crate) const HEADLESS_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;

pub(crate) struct SurfaceBinding {
    pub surface: wgpu::Surface<'static>,
    pub config: wgpu::SurfaceConfiguration,
}

/// Device, queue and (for the preview) the window surface.
pub(crate) struct GpuContext {
    _instance: wgpu::Instance,
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
    pub surface: Option<SurfaceBinding>,
    pub color_format: wgpu::TextureFormat,
    pub size: PhysicalSize<u32>,
    pub adapter_profile: AdapterProfile,
}

fn create_instance() -> wgpu::Instance {
    wgpu::Instance::new(&wgpu::InstanceDescriptor {
        backends: wgpu::Backends::all(),
        flags: wgpu::InstanceFlags::default(),
        memory_budget_thresholds: wgpu::MemoryBudgetThresholds::default(),
        backend_options: wgpu::BackendOptions::default(),
    })
}

fn request_device(
    instance: &wgpu::Instance,
    compatible_surface: Option<&wgpu::Surface<'static>>,
    size: PhysicalSize<u32>,
) -> Result<(wgpu::Adapter, wgpu::Device, wgpu::Queue, AdapterProfile), ResourceInitError> {
    let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
        power_preference: wgpu::PowerPreference::HighPerformance,
        compatible_surface,
        force_fallback_adapter: false,
    }))
    .map_err(|err| ResourceInitError::Adapter(err.to_string()))?;

    let adapter_profile = AdapterProfile::from_wgpu(&adapter.get_info());
    tracing::debug!(
        name = %adapter_profile.name,
        backend = ?adapter_profile.backend,
        device_type = ?adapter_profile.device_type,
        is_software = adapter_profile.is_software(),
        "selected GPU adapter"
    );

    let limits = adapter.limits();
    let max_dimension = limits.max_texture_dimension_2d;
    if size.width > max_dimension || size.height > max_dimension {
        return Err(ResourceInitError::Device(format!(
            "GPU max texture dimension is {max_dimension}, requested target is {}x{}",
            size.width, size.height
        )));
    }

    let (device, queue) = pollster::block_on(adapter.request_device(&wgpu::DeviceDescriptor {
        label: Some("holoscope device"),
        required_features: wgpu::Features::empty(),
        required_limits: limits,
        memory_hints: wgpu::MemoryHints::Performance,
        trace: wgpu::Trace::default(),
    }))
    .map_err(|err| ResourceInitError::Device(err.to_string()))?;

    Ok((adapter, device, queue, adapter_profile))
}

impl GpuContext {
    /// Binds to a window. `target` must outlive the returned context.
    pub(crate) fn for_window<T>(
        target: &T,
        initial_size: PhysicalSize<u32>,
    ) -> Result<Self, ResourceInitError>
    where
        T: HasDisplayHandle + HasWindowHandle,
    {
        let instance = create_instance();

        let window_handle = target
            .window_handle()
            .map_err(|err| ResourceInitError::Surface(format!("window handle: {err}")))?;
        let display_handle = target
            .display_handle()
            .map_err(|err| ResourceInitError::Surface(format!("display handle: {err}")))?;

        let surface = unsafe {
            instance.create_surface_unsafe(wgpu::SurfaceTargetUnsafe::RawHandle {
                raw_display_handle: display_handle.as_raw(),
                raw_window_handle: window_handle.as_raw(),
            })
        }
        .map_err(|err| ResourceInitError::Surface(err.to_string()))?;

        let size = PhysicalSize::new(initial_size.width.max(1), initial_size.height.max(1));
        let (adapter, device, queue, adapter_profile) =
            request_device(&instance, Some(&surface), size)?;

        let caps = surface.get_capabilities(&adapter);
        // Colours are written as-is, so prefer a non-sRGB swapchain.
        let format = caps
            .formats
            .iter()
            .copied()
            .find(|format| !format.is_srgb())
            .or_else(|| caps.formats.first().copied())
            .ok_or_else(|| ResourceInitError::Surface("surface reports no formats".into()))?;
        if format.is_srgb() {
            tracing::warn!(?format, "no non-sRGB surface format available");
        }

        let present_mode = if caps.present_modes.contains(&wgpu::PresentMode::Fifo) {
            wgpu::PresentMode::Fifo
        } else {
            caps.present_modes
                .first()
                .copied()
                .unwrap_or(wgpu::PresentMode::Fifo)
        };
        let alpha_mode = caps
            .alpha_modes
            .first()
            .copied()
            .unwrap_or(wgpu::CompositeAlphaMode::Auto);
        tracing::debug!(?format, ?present_mode, "configuring surface");

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format,
            width: size.width,
            height: size.height,
            present_mode,
            alpha_mode,
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &config);

        Ok(Self {
            _instance: instance,
            device,
            queue,
            surface: Some(SurfaceBinding { surface, config }),
            color_format: format,
            size,
            adapter_profile,
        })
    }

    /// A device with no surface; frames go to an offscreen texture.
    pub(crate) fn headless(size: PhysicalSize<u32>) -> Result<Self, ResourceInitError> {
        let instance = create_instance();
        let size = PhysicalSize::new(size.width.max(1), size.height.max(1));
        let (_adapter, device, queue, adapter_profile) = request_device(&instance, None, size)?;
        Ok(Self {
            _instance: instance,
            device,
            queue,
            surface: None,
            color_format: HEADLESS_FORMAT,
            size,
            adapter_profile,
        })
    }

    pub(crate) fn resize(&mut self, new_size: PhysicalSize<u32>) {
        if new_size.width == 0 || new_size.height == 0 {
            return;
        }
        self.size = new_size;
        if let Some(binding) = self.surface.as_mut() {
            binding.config.width = new_size.width;
            binding.config.height = new_size.height;
            binding.surface.configure(&self.device, &binding.config);
        }
    }
}
