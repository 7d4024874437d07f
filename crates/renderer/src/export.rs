use std::fs;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{anyhow, Context, Result};
use crossbeam_channel::bounded;
use image::RgbaImage;
use tracing::{debug, info};
use winit::dpi::PhysicalSize;

use hologram::{Controls, Hologram, SoftwareTarget};

use crate::controls::ControlFeed;
use crate::gpu::GpuState;
use crate::runtime::{RenderPolicy, RenderPolicyDriver};
use crate::types::{RenderBackend, RendererConfig};

/// Frames rendered ahead of the PNG writer before the loop blocks.
const WRITER_QUEUE_DEPTH: usize = 4;

/// What an export run produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportSummary {
    pub dir: PathBuf,
    pub frames: u32,
}

/// `frame_00000.png`, `frame_00001.png`, ...
pub fn frame_file_name(index: u64) -> String {
    format!("frame_{index:05}.png")
}

enum FrameSource {
    Gpu(Box<GpuState>),
    Software(SoftwareTarget),
}

impl FrameSource {
    fn new(config: &RendererConfig, hologram: &Hologram) -> Result<Self> {
        let (width, height) = config.surface_size;
        match config.backend {
            RenderBackend::Gpu => {
                let gpu = GpuState::headless(
                    PhysicalSize::new(width, height),
                    hologram.field().particles(),
                )?;
                info!(adapter = %gpu.adapter_profile().name, "exporting on the GPU");
                Ok(Self::Gpu(Box::new(gpu)))
            }
            RenderBackend::Software => {
                info!("exporting with the software rasterizer");
                Ok(Self::Software(SoftwareTarget::new(width.max(1), height.max(1))))
            }
        }
    }

    fn render(&mut self, hologram: &mut Hologram, dt: f32, controls: Controls) -> Result<RgbaImage> {
        match self {
            FrameSource::Gpu(gpu) => {
                let state = hologram.prepare(dt, controls, gpu.aspect());
                gpu.render_to_image(&state)
                    .context("failed to read back GPU frame")
            }
            FrameSource::Software(target) => {
                let (_, stats) = hologram.render_software(dt, controls, target);
                tracing::trace!(?stats, "software frame");
                Ok(target.to_image())
            }
        }
    }
}

/// Renders `frames` fixed-step frames and writes them as PNGs under `dir`.
///
/// Encoding happens on a writer thread fed through a bounded channel, so the
/// render loop stays at most a few frames ahead of the disk.
pub(crate) fn run_export(
    config: &RendererConfig,
    mut hologram: Hologram,
    mut feed: ControlFeed,
) -> Result<ExportSummary> {
    let RenderPolicy::Export { dir, frames, .. } = &config.policy else {
        return Err(anyhow!("export requested without an export policy"));
    };
    let (dir, frames) = (dir.clone(), *frames);
    fs::create_dir_all(&dir)
        .with_context(|| format!("failed to create export directory {}", dir.display()))?;

    let mut driver = RenderPolicyDriver::new(&config.policy)?;
    let mut source = FrameSource::new(config, &hologram)?;

    let (tx, rx) = bounded::<(u64, RgbaImage)>(WRITER_QUEUE_DEPTH);
    let writer_dir = dir.clone();
    let writer = thread::Builder::new()
        .name("holoscope-png-writer".into())
        .spawn(move || -> Result<u32> {
            let mut written = 0;
            for (index, image) in rx {
                write_frame(&writer_dir, index, &image)?;
                written += 1;
            }
            Ok(written)
        })
        .context("failed to spawn PNG writer thread")?;

    let mut render_error = None;
    let mut last_report = Instant::now();
    for _ in 0..frames {
        let (sample, dt) = driver.sample();
        let controls = feed.snapshot(sample.seconds);
        match source.render(&mut hologram, dt, controls) {
            Ok(image) => {
                if tx.send((sample.frame_index, image)).is_err() {
                    // Writer hung up; its own error is reported on join.
                    break;
                }
            }
            Err(err) => {
                render_error = Some(err);
                break;
            }
        }
        if last_report.elapsed() >= Duration::from_secs(1) {
            debug!(frame = sample.frame_index, total = frames, "export progress");
            last_report = Instant::now();
        }
    }
    drop(tx);

    let written = writer
        .join()
        .map_err(|_| anyhow!("PNG writer thread panicked"))??;
    if let Some(err) = render_error {
        return Err(err);
    }

    info!(frames = written, dir = %dir.display(), "export finished");
    Ok(ExportSummary {
        dir,
        frames: written,
    })
}

fn write_frame(dir: &Path, index: u64, image: &RgbaImage) -> Result<()> {
    let path = dir.join(frame_file_name(index));
    image
        .save(&path)
        .with_context(|| format!("failed to write {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use hologram::{build_field, CameraRig, FieldParams, ParticleField, SharedControls};
    use image::{GrayImage, Luma, Rgb, RgbImage};

    fn software_config(dir: PathBuf, frames: u32) -> RendererConfig {
        RendererConfig {
            surface_size: (64, 48),
            policy: RenderPolicy::Export {
                dir,
                frames,
                fps: 30.0,
            },
            backend: RenderBackend::Software,
            ..RendererConfig::default()
        }
    }

    fn feed() -> ControlFeed {
        ControlFeed::new(
            Arc::new(SharedControls::default()),
            Controls::default(),
            None,
        )
    }

    #[test]
    fn frame_names_are_zero_padded() {
        assert_eq!(frame_file_name(0), "frame_00000.png");
        assert_eq!(frame_file_name(42), "frame_00042.png");
    }

    #[test]
    fn software_export_writes_numbered_pngs() {
        let tmp = tempfile::tempdir().unwrap();
        let out = tmp.path().join("frames");
        let color = RgbImage::from_pixel(8, 8, Rgb([200, 160, 90]));
        let depth = GrayImage::from_fn(8, 8, |x, _| Luma([(x * 30) as u8]));
        let field = build_field(&color, &depth, &FieldParams::default()).unwrap();
        let hologram = Hologram::new(field, CameraRig::default());

        let summary = run_export(&software_config(out.clone(), 3), hologram, feed()).unwrap();
        assert_eq!(summary.frames, 3);
        for index in 0..3 {
            let frame = image::open(out.join(frame_file_name(index))).unwrap();
            assert_eq!((frame.width(), frame.height()), (64, 48));
        }
        assert!(!out.join(frame_file_name(3)).exists());
    }

    #[test]
    fn empty_field_exports_black_frames() {
        let tmp = tempfile::tempdir().unwrap();
        let hologram = Hologram::new(ParticleField::empty(), CameraRig::default());
        let summary =
            run_export(&software_config(tmp.path().to_path_buf(), 1), hologram, feed()).unwrap();
        assert_eq!(summary.frames, 1);
        let frame = image::open(tmp.path().join(frame_file_name(0)))
            .unwrap()
            .to_rgba8();
        assert!(frame.pixels().all(|p| p.0 == [0, 0, 0, 255]));
    }

    #[test]
    fn rejects_non_export_policy() {
        let config = RendererConfig {
            backend: RenderBackend::Software,
            ..RendererConfig::default()
        };
        let hologram = Hologram::new(ParticleField::empty(), CameraRig::default());
        assert!(run_export(&config, hologram, feed()).is_err());
    }
}
