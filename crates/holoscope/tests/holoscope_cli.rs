use std::fs;
use std::path::Path;
use std::process::Command;

use image::{GrayImage, Luma, Rgb, RgbImage};
use tempfile::TempDir;

fn holoscope(config_dir: &Path) -> Command {
    let mut command = Command::new(env!("CARGO_BIN_EXE_holoscope"));
    command
        .env("HOLOSCOPE_CONFIG_DIR", config_dir)
        .env("RUST_LOG", "warn");
    command
}

fn write_assets(dir: &Path) -> (String, String) {
    let color = RgbImage::from_fn(4, 4, |x, y| Rgb([(x * 60) as u8, (y * 60) as u8, 128]));
    let depth = GrayImage::from_fn(4, 4, |x, _| Luma([(x * 80) as u8]));
    let color_path = dir.join("color.png");
    let depth_path = dir.join("depth.png");
    color.save(&color_path).unwrap();
    depth.save(&depth_path).unwrap();
    (
        color_path.to_string_lossy().into_owned(),
        depth_path.to_string_lossy().into_owned(),
    )
}

#[test]
fn inspect_reports_field_as_json() {
    let root = TempDir::new().unwrap();
    let (color, depth) = write_assets(root.path());

    let output = holoscope(root.path())
        .args([
            "inspect",
            "--color",
            color.as_str(),
            "--depth",
            depth.as_str(),
            "--json",
        ])
        .output()
        .expect("failed to run holoscope inspect");
    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["particles"], 16);
    assert_eq!(report["stride"], 1);
    assert_eq!(report["source_width"], 4);
}

#[test]
fn inspect_fails_on_missing_asset() {
    let root = TempDir::new().unwrap();
    let missing = root
        .path()
        .join("nope.png")
        .to_string_lossy()
        .into_owned();

    let status = holoscope(root.path())
        .args(["inspect", "--color", missing.as_str(), "--depth", missing.as_str()])
        .status()
        .expect("failed to run holoscope inspect");
    assert!(!status.success());
}

#[test]
fn config_init_then_check() {
    let root = TempDir::new().unwrap();

    let status = holoscope(root.path())
        .args(["config", "init"])
        .status()
        .expect("failed to run holoscope config init");
    assert!(status.success());
    assert!(root.path().join("holoscope.toml").exists());

    let again = holoscope(root.path())
        .args(["config", "init"])
        .status()
        .expect("failed to rerun holoscope config init");
    assert!(!again.success());

    let output = holoscope(root.path())
        .args(["config", "check"])
        .output()
        .expect("failed to run holoscope config check");
    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).contains("intro"));
}

#[test]
fn config_check_rejects_invalid_file() {
    let root = TempDir::new().unwrap();
    let path = root.path().join("broken.toml");
    fs::write(&path, "version = 1\n[controls]\nzoom = 40.0\n").unwrap();

    let output = holoscope(root.path())
        .args(["--config", path.to_str().unwrap(), "config", "check"])
        .output()
        .expect("failed to run holoscope config check");
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("zoom"));
}

#[test]
fn software_export_writes_frames() {
    let root = TempDir::new().unwrap();
    let (color, depth) = write_assets(root.path());
    let out = root.path().join("frames");
    let out_arg = out.to_string_lossy().into_owned();

    let output = holoscope(root.path())
        .args([
            "run",
            "--color",
            color.as_str(),
            "--depth",
            depth.as_str(),
            "--size",
            "32x24",
            "--export",
            out_arg.as_str(),
            "--frames",
            "2",
            "--software",
            "--set",
            "wobble=0.3",
        ])
        .output()
        .expect("failed to run holoscope export");
    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    for name in ["frame_00000.png", "frame_00001.png"] {
        let frame = image::open(out.join(name)).unwrap();
        assert_eq!((frame.width(), frame.height()), (32, 24));
    }
    assert!(!out.join("frame_00002.png").exists());
}

#[test]
fn software_preview_is_rejected() {
    let root = TempDir::new().unwrap();
    let status = holoscope(root.path())
        .args(["run", "--software"])
        .status()
        .expect("failed to run holoscope");
    assert!(!status.success());
}
