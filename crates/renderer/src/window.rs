use std::sync::Arc;
use std::time::Instant;

use anyhow::{anyhow, Result};
use tracing::{error, info, warn};
use winit::dpi::PhysicalSize;
use winit::event::{ElementState, Event, KeyEvent, WindowEvent};
use winit::event_loop::{ControlFlow, EventLoop, EventLoopWindowTarget};
use winit::keyboard::{Key, NamedKey};
use winit::window::{Window, WindowBuilder};

use hologram::Hologram;

use crate::controls::{binding_for_key, ControlFeed};
use crate::gpu::GpuState;
use crate::runtime::{RenderPolicy, RenderPolicyDriver};
use crate::types::RendererConfig;

const SOFTWARE_FPS_CAP: f32 = 15.0;

/// Everything the preview loop owns. `gpu` is declared first so the surface
/// is dropped before the window it was created from.
struct WindowState {
    gpu: GpuState,
    window: Arc<Window>,
    hologram: Hologram,
    feed: ControlFeed,
    driver: RenderPolicyDriver,
}

impl WindowState {
    fn render_frame(&mut self) -> Result<(), wgpu::SurfaceError> {
        let (sample, dt) = self.driver.sample();
        let controls = self.feed.snapshot(sample.seconds);
        let state = self.hologram.prepare(dt, controls, self.gpu.aspect());
        self.gpu.render(&state)?;
        self.driver.mark_rendered(Instant::now());
        Ok(())
    }

    fn handle_key(&mut self, event: &KeyEvent, elwt: &EventLoopWindowTarget<()>) {
        if event.state != ElementState::Pressed {
            return;
        }
        match &event.logical_key {
            Key::Named(NamedKey::Escape) => elwt.exit(),
            Key::Named(NamedKey::Backspace) if !event.repeat => self.feed.reset(),
            Key::Character(value) => {
                if let Some((kind, steps)) = binding_for_key(value.as_str()) {
                    self.feed.nudge(kind, steps);
                }
            }
            _ => {}
        }
    }
}

/// Opens the preview window and runs the frame loop until it closes.
pub(crate) fn run_window(config: &RendererConfig, hologram: Hologram, feed: ControlFeed) -> Result<()> {
    let event_loop = EventLoop::new().map_err(|err| anyhow!("failed to create event loop: {err}"))?;

    let (width, height) = config.surface_size;
    let window = WindowBuilder::new()
        .with_title(config.title.as_str())
        .with_inner_size(PhysicalSize::new(width.max(1), height.max(1)))
        .build(&event_loop)
        .map_err(|err| anyhow!("failed to create preview window: {err}"))?;
    let window = Arc::new(window);

    let gpu = GpuState::for_window(
        window.as_ref(),
        window.inner_size(),
        hologram.field().particles(),
    )?;

    let mut driver = RenderPolicyDriver::new(&config.policy)?;
    let profile = gpu.adapter_profile().clone();
    if profile.is_software() && config.policy == (RenderPolicy::Animate { target_fps: None }) {
        warn!(
            adapter = %profile.name,
            backend = ?profile.backend,
            cap = SOFTWARE_FPS_CAP,
            "software rasterizer detected; capping preview (override with --fps)"
        );
        driver.cap(SOFTWARE_FPS_CAP);
    }
    info!(
        adapter = %profile.name,
        particles = hologram.field().len(),
        "preview window ready"
    );

    let mut state = WindowState {
        gpu,
        window,
        hologram,
        feed,
        driver,
    };
    state.window.request_redraw();

    let run_result = event_loop.run(move |event, elwt| match event {
        Event::WindowEvent { window_id, event } if window_id == state.window.id() => match event {
            WindowEvent::CloseRequested | WindowEvent::Destroyed => elwt.exit(),
            WindowEvent::KeyboardInput { event, .. } => state.handle_key(&event, elwt),
            WindowEvent::Resized(new_size) => state.gpu.resize(new_size),
            WindowEvent::RedrawRequested => match state.render_frame() {
                Ok(()) => {}
                Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                    let size = state.gpu.size();
                    state.gpu.resize(size);
                }
                Err(wgpu::SurfaceError::OutOfMemory) => {
                    error!("surface out of memory; closing preview");
                    elwt.exit();
                }
                Err(wgpu::SurfaceError::Timeout) => {
                    warn!("surface timeout; retrying next frame");
                }
                Err(other) => {
                    warn!("surface error: {other:?}; retrying next frame");
                }
            },
            _ => {}
        },
        Event::AboutToWait => {
            let now = Instant::now();
            if state.driver.ready_for_frame(now) {
                state.window.request_redraw();
                elwt.set_control_flow(ControlFlow::Wait);
            } else if let Some(deadline) = state.driver.next_deadline() {
                tracing::trace!(
                    deadline_ms = deadline.saturating_duration_since(now).as_millis(),
                    "scheduler: waiting until next frame"
                );
                elwt.set_control_flow(ControlFlow::WaitUntil(deadline));
            } else {
                elwt.set_control_flow(ControlFlow::Wait);
            }
        }
        _ => {}
    });

    run_result.map_err(|err| anyhow!("window event loop error: {err}"))
}
