use std::path::PathBuf;

/// Failure to turn the source image pair into a particle field.
///
/// Raised once at start-up. Callers are expected to fall back to an empty
/// field rather than abort; see [`crate::ParticleField::load_or_empty`].
#[derive(Debug, thiserror::Error)]
pub enum AssetLoadError {
    #[error("failed to read image at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to decode image at {path}: {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
    #[error("color image is {color_width}x{color_height} but depth image is {depth_width}x{depth_height}")]
    DimensionMismatch {
        color_width: u32,
        color_height: u32,
        depth_width: u32,
        depth_height: u32,
    },
    #[error("source images have no pixels")]
    Empty,
}
