use std::io::{self, BufRead};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;

use anyhow::{bail, Context, Result};
use hologram::controls::parse_assignment;
use hologram::motion::ORBITAL_CENTER;
use hologram::{CameraRig, ControlKind, Controls, FieldParams, SharedControls};
use renderer::{FieldSource, RenderBackend, RenderPolicy, Renderer, RendererConfig};
use sequencer::{SequenceLibrary, SequencePlayer};
use tracing_subscriber::EnvFilter;

use crate::cli::{AssetArgs, RunArgs};
use crate::config::{load_config, LoadedConfig};

const DEFAULT_EXPORT_FPS: f32 = 30.0;

pub fn initialise_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

pub fn run(config_path: Option<&Path>, args: RunArgs) -> Result<()> {
    let loaded = load_config(config_path)?;
    let config = renderer_config(&loaded, &args)?;
    tracing::info!(
        size = ?config.surface_size,
        policy = ?config.policy,
        sequence = config.sequence.as_ref().map(|p| p.sequence().name.as_str()),
        "starting holoscope"
    );

    let mut renderer = Renderer::new(config);
    if args.stdin_controls {
        spawn_stdin_reader(renderer.controls(), renderer.config().initial_controls)?;
    }
    renderer.run()
}

/// Picks the colour/depth pair: CLI flags first, then `[assets]`.
///
/// Returns `Ok(None)` when neither is configured; naming only one is an error.
pub fn resolve_assets(
    loaded: &LoadedConfig,
    assets: &AssetArgs,
) -> Result<Option<(PathBuf, PathBuf)>> {
    let from_config = |path: &Option<PathBuf>| path.as_deref().map(|p| loaded.resolve(p));
    let color = assets
        .color
        .clone()
        .or_else(|| from_config(&loaded.config.assets.color));
    let depth = assets
        .depth
        .clone()
        .or_else(|| from_config(&loaded.config.assets.depth));
    match (color, depth) {
        (Some(color), Some(depth)) => Ok(Some((color, depth))),
        (None, None) => Ok(None),
        (Some(_), None) => bail!("a colour image was given without a depth mask (--depth)"),
        (None, Some(_)) => bail!("a depth mask was given without a colour image (--color)"),
    }
}

pub fn field_params(loaded: &LoadedConfig, assets: &AssetArgs) -> Result<FieldParams> {
    let mut params = loaded.config.field.params();
    if let Some(count) = assets.particles {
        if count == 0 {
            bail!("--particles must be greater than zero");
        }
        params.target_count = count;
    }
    Ok(params)
}

fn renderer_config(loaded: &LoadedConfig, args: &RunArgs) -> Result<RendererConfig> {
    let config = &loaded.config;

    let field = resolve_assets(loaded, &args.assets)?
        .map(|(color, depth)| -> Result<FieldSource> {
            Ok(FieldSource {
                color,
                depth,
                params: field_params(loaded, &args.assets)?,
            })
        })
        .transpose()?;

    let surface_size = match args.size {
        Some(size) => size,
        None => config
            .window
            .dimensions()?
            .unwrap_or(RendererConfig::default().surface_size),
    };

    let camera = CameraRig::looking_at(
        ORBITAL_CENTER,
        config.camera.distance,
        config.camera.fov_y_degrees,
    );

    let initial_controls = apply_overrides(config.initial_controls(), &args.set);
    let sequence = select_sequence(loaded, args)?;
    let policy = render_policy(loaded, args)?;

    Ok(RendererConfig {
        surface_size,
        field,
        camera,
        initial_controls,
        sequence,
        policy,
        backend: if args.software {
            RenderBackend::Software
        } else {
            RenderBackend::Gpu
        },
        ..RendererConfig::default()
    })
}

fn apply_overrides(mut controls: Controls, overrides: &[(ControlKind, f32)]) -> Controls {
    for &(kind, value) in overrides {
        let clamped = kind.clamp(value);
        if clamped != value {
            tracing::warn!(control = %kind, value, clamped, "control override clamped");
        }
        controls.set(kind, clamped);
    }
    controls
}

fn select_sequence(loaded: &LoadedConfig, args: &RunArgs) -> Result<Option<SequencePlayer>> {
    if args.no_sequence {
        return Ok(None);
    }
    let name = match args.sequence.as_deref() {
        Some(name) => name,
        None => match loaded.config.default_sequence() {
            Some(name) => name,
            None => return Ok(None),
        },
    };
    let library = SequenceLibrary::new(&loaded.config);
    let player = library
        .player(name)
        .with_context(|| format!("cannot play sequence '{name}'"))?;
    Ok(Some(player))
}

fn render_policy(loaded: &LoadedConfig, args: &RunArgs) -> Result<RenderPolicy> {
    if let Some(fps) = args.fps {
        if !(fps.is_finite() && fps > 0.0) {
            bail!("--fps must be a positive number, got {fps}");
        }
    }
    if let Some(dir) = &args.export {
        if args.frames == 0 {
            bail!("--frames must be at least 1");
        }
        return Ok(RenderPolicy::Export {
            dir: dir.clone(),
            frames: args.frames,
            fps: args.fps.unwrap_or(DEFAULT_EXPORT_FPS),
        });
    }
    if let Some(time) = args.still {
        return Ok(RenderPolicy::Still { time });
    }
    Ok(RenderPolicy::Animate {
        target_fps: args.fps.or_else(|| loaded.config.window.fps_cap()),
    })
}

/// What one stdin line did to the sliders.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ControlLine {
    Ignored,
    Reset,
    Set(ControlKind, f32),
}

/// Applies a `name=value`, `reset` or blank/`#` line to the shared sliders.
pub fn apply_control_line(
    line: &str,
    shared: &SharedControls,
    initial: Controls,
) -> Result<ControlLine, String> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return Ok(ControlLine::Ignored);
    }
    if line.eq_ignore_ascii_case("reset") {
        shared.store(initial);
        return Ok(ControlLine::Reset);
    }
    let (kind, value) = parse_assignment(line)?;
    Ok(ControlLine::Set(kind, shared.set(kind, value)))
}

fn spawn_stdin_reader(shared: Arc<SharedControls>, initial: Controls) -> Result<()> {
    thread::Builder::new()
        .name("holoscope-stdin".into())
        .spawn(move || {
            for line in io::stdin().lock().lines() {
                let Ok(line) = line else { break };
                match apply_control_line(&line, &shared, initial) {
                    Ok(ControlLine::Set(kind, value)) => {
                        tracing::debug!(control = %kind, value, "control set from stdin")
                    }
                    Ok(ControlLine::Reset) => tracing::debug!("controls reset from stdin"),
                    Ok(ControlLine::Ignored) => {}
                    Err(err) => tracing::warn!("ignoring stdin line: {err}"),
                }
            }
            tracing::debug!("stdin closed; control reader exiting");
        })
        .context("failed to spawn stdin control reader")?;
    Ok(())
}
