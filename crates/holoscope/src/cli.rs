use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use hologram::controls::parse_assignment;
use hologram::ControlKind;
use holoconfig::parse_size;

#[derive(Parser, Debug)]
#[command(
    name = "holoscope",
    author,
    version,
    about = "Turns an image and a depth mask into an orbiting particle hologram"
)]
pub struct Cli {
    /// Config file to load instead of `$HOLOSCOPE_CONFIG_DIR/holoscope.toml`.
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Open the preview window, or export frames with `--export`.
    Run(RunArgs),
    /// Build the particle field and print statistics about it.
    Inspect(InspectArgs),
    /// Create, locate or validate the config file.
    Config(ConfigCommand),
}

/// Asset selection shared by `run` and `inspect`.
#[derive(Args, Debug, Clone, Default)]
pub struct AssetArgs {
    /// Colour image to sample.
    #[arg(long, value_name = "PATH")]
    pub color: Option<PathBuf>,

    /// Greyscale depth mask; white is near, black is far.
    #[arg(long, value_name = "PATH")]
    pub depth: Option<PathBuf>,

    /// Approximate particle count to sample.
    #[arg(long, value_name = "N")]
    pub particles: Option<usize>,
}

#[derive(Args, Debug, Clone, Default)]
pub struct RunArgs {
    #[command(flatten)]
    pub assets: AssetArgs,

    /// Window or export resolution (e.g. `1280x720`).
    #[arg(long, value_name = "WIDTHxHEIGHT", value_parser = parse_size)]
    pub size: Option<(u32, u32)>,

    /// Preview frame cap, or the fixed step rate when exporting.
    #[arg(long, value_name = "FPS")]
    pub fps: Option<f32>,

    /// Override a control, e.g. `--set wobble=0.4`. Repeatable.
    #[arg(long = "set", value_name = "NAME=VALUE", value_parser = parse_assignment)]
    pub set: Vec<(ControlKind, f32)>,

    /// Sequence to play over the live controls.
    #[arg(long, value_name = "NAME", conflicts_with = "no_sequence")]
    pub sequence: Option<String>,

    /// Ignore `defaults.sequence` from the config.
    #[arg(long)]
    pub no_sequence: bool,

    /// Freeze the clock at this many seconds.
    #[arg(long, value_name = "SECONDS", conflicts_with = "export")]
    pub still: Option<f32>,

    /// Write `frame_00000.png` onward into this directory instead of opening a window.
    #[arg(long, value_name = "DIR")]
    pub export: Option<PathBuf>,

    /// Number of frames to export.
    #[arg(long, value_name = "N", default_value_t = 120, requires = "export")]
    pub frames: u32,

    /// Use the CPU rasterizer (export only).
    #[arg(long, requires = "export")]
    pub software: bool,

    /// Read `name=value` control lines from stdin while running.
    #[arg(long)]
    pub stdin_controls: bool,
}

#[derive(Args, Debug, Clone, Default)]
pub struct InspectArgs {
    #[command(flatten)]
    pub assets: AssetArgs,

    /// Print the report as JSON.
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct ConfigCommand {
    #[command(subcommand)]
    pub action: ConfigAction,
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Print where the config file is looked up.
    Path,
    /// Write a commented template config.
    Init {
        /// Overwrite an existing file.
        #[arg(long)]
        force: bool,
    },
    /// Parse and validate the config, then summarise it.
    Check,
}

pub fn parse() -> Cli {
    Cli::parse()
}
