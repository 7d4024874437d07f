//! GPU renderer, preview window and frame export for holoscope.
//!
//! `Renderer::run` builds the particle field once, then hands it to one of
//! two loops:
//!
//! - the preview window (`window`), which runs the motion compute pass and
//!   the point-sprite pass against the swapchain every frame and feeds
//!   keyboard nudges into the shared sliders;
//! - the exporter (`export`), which steps a fixed-rate clock and writes
//!   numbered PNGs through a writer thread, rendering either on a headless
//!   GPU target or with the software rasterizer from `hologram::raster`.
//!
//! Both loops take exactly one control snapshot per frame from a
//! [`ControlFeed`]; input contexts only ever write to the shared sliders.

mod controls;
mod export;
mod gpu;
mod runtime;
mod types;
mod window;

use std::sync::Arc;

use anyhow::{bail, Result};
use tracing::{info, warn};

use hologram::{Hologram, ParticleField, SharedControls};

pub use controls::{binding_for_key, ControlFeed};
pub use export::{frame_file_name, ExportSummary};
pub use runtime::{
    time_source_for_policy, BoxedTimeSource, FixedStepTimeSource, FixedTimeSource,
    FrameScheduler, RenderPolicy, RenderPolicyDriver, SystemTimeSource, TimeSample, TimeSource,
};
pub use types::{AdapterProfile, FieldSource, RenderBackend, RendererConfig, ResourceInitError};

/// Entry point used by the binary.
pub struct Renderer {
    config: RendererConfig,
    controls: Arc<SharedControls>,
}

impl Renderer {
    pub fn new(config: RendererConfig) -> Self {
        let controls = Arc::new(SharedControls::new(config.initial_controls));
        Self { config, controls }
    }

    /// Slider holder that other input contexts (e.g. a stdin reader) write to.
    pub fn controls(&self) -> Arc<SharedControls> {
        Arc::clone(&self.controls)
    }

    pub fn config(&self) -> &RendererConfig {
        &self.config
    }

    /// Runs until the window closes or the export finishes.
    pub fn run(&mut self) -> Result<()> {
        let config = &self.config;
        if config.backend == RenderBackend::Software
            && !matches!(config.policy, RenderPolicy::Export { .. })
        {
            bail!("the software rasterizer can only render exports; pass --export");
        }

        let hologram = Hologram::new(load_field(config), config.camera);
        let feed = ControlFeed::new(
            self.controls(),
            config.initial_controls,
            config.sequence.clone(),
        );

        match &config.policy {
            RenderPolicy::Export { .. } => {
                let summary = export::run_export(config, hologram, feed)?;
                info!(
                    frames = summary.frames,
                    dir = %summary.dir.display(),
                    "frames written"
                );
                Ok(())
            }
            RenderPolicy::Animate { .. } | RenderPolicy::Still { .. } => {
                window::run_window(config, hologram, feed)
            }
        }
    }
}

fn load_field(config: &RendererConfig) -> ParticleField {
    match &config.field {
        Some(source) => {
            let field = ParticleField::load_or_empty(&source.color, &source.depth, &source.params);
            info!(
                particles = field.len(),
                stride = field.stride(),
                color = %source.color.display(),
                "particle field ready"
            );
            field
        }
        None => {
            warn!("no colour/depth assets configured; rendering an empty field");
            ParticleField::empty()
        }
    }
}
