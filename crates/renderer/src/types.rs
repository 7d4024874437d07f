use std::path::PathBuf;

use thiserror::Error;

use hologram::{CameraRig, Controls, FieldParams};
use sequencer::SequencePlayer;

use crate::runtime::RenderPolicy;

/// Fatal failures while creating GPU resources. Raised before the frame loop
/// starts; nothing is retried.
#[derive(Debug, Error)]
pub enum ResourceInitError {
    #[error("no suitable GPU adapter: {0}")]
    Adapter(String),
    #[error("failed to create GPU device: {0}")]
    Device(String),
    #[error("failed to create rendering surface: {0}")]
    Surface(String),
    #[error("shader module rejected: {0}")]
    Shader(String),
}

/// Which rasterizer produces the pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RenderBackend {
    /// wgpu compute + point-sprite passes.
    #[default]
    Gpu,
    /// The CPU reference rasterizer; export only.
    Software,
}

/// Where the particle field comes from.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldSource {
    pub color: PathBuf,
    pub depth: PathBuf,
    pub params: FieldParams,
}

/// Immutable configuration passed to the renderer at start-up.
///
/// Mirrors the resolved CLI flags and config file: which assets to sample,
/// how large the target is, which controls to start from and how frames are
/// paced.
#[derive(Debug, Clone)]
pub struct RendererConfig {
    /// Window or export size in physical pixels.
    pub surface_size: (u32, u32),
    /// Preview window title.
    pub title: String,
    /// Missing means an empty field: the loop still runs and draws black.
    pub field: Option<FieldSource>,
    pub camera: CameraRig,
    /// Slider values the session starts from (and `Backspace` returns to).
    pub initial_controls: Controls,
    /// Sequence played over the live sliders, if any.
    pub sequence: Option<SequencePlayer>,
    /// High-level render behaviour requested by the caller.
    pub policy: RenderPolicy,
    pub backend: RenderBackend,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            surface_size: (1280, 720),
            title: "holoscope".to_string(),
            field: None,
            camera: CameraRig::default(),
            initial_controls: Controls::default(),
            sequence: None,
            policy: RenderPolicy::default(),
            backend: RenderBackend::default(),
        }
    }
}

/// What we learned about the adapter wgpu handed us.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdapterProfile {
    pub name: String,
    pub backend: wgpu::Backend,
    pub device_type: wgpu::DeviceType,
}

impl AdapterProfile {
    pub fn from_wgpu(info: &wgpu::AdapterInfo) -> Self {
        Self {
            name: info.name.clone(),
            backend: info.backend,
            device_type: info.device_type,
        }
    }

    /// llvmpipe, lavapipe, WARP and friends.
    pub fn is_software(&self) -> bool {
        if self.device_type == wgpu::DeviceType::Cpu {
            return true;
        }
        let name = self.name.to_ascii_lowercase();
        ["llvmpipe", "lavapipe", "softpipe", "swiftshader", "microsoft basic render"]
            .iter()
            .any(|needle| name.contains(needle))
    }
}
