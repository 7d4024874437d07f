use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use holoconfig::{HoloConfig, TEMPLATE};
use sequencer::SequenceLibrary;

use crate::cli::ConfigAction;
use crate::paths::AppPaths;

/// A parsed config plus where it came from.
#[derive(Debug, Clone, Default)]
pub struct LoadedConfig {
    pub config: HoloConfig,
    /// File the config was read from; `None` when built-in defaults are used.
    pub source: Option<PathBuf>,
}

impl LoadedConfig {
    /// Resolves a path from the config file against the file's directory.
    pub fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            return path.to_path_buf();
        }
        match self.source.as_deref().and_then(Path::parent) {
            Some(dir) => dir.join(path),
            None => path.to_path_buf(),
        }
    }
}

/// Loads `explicit` if given (it must exist), otherwise the default config
/// file when present, otherwise built-in defaults.
pub fn load_config(explicit: Option<&Path>) -> Result<LoadedConfig> {
    let path = match explicit {
        Some(path) => {
            if !path.is_file() {
                bail!("config file {} does not exist", path.display());
            }
            path.to_path_buf()
        }
        None => {
            let default = AppPaths::discover()?.config_file();
            if !default.is_file() {
                tracing::debug!(path = %default.display(), "no config file; using defaults");
                return Ok(LoadedConfig::default());
            }
            default
        }
    };
    read_config(&path)
}

fn read_config(path: &Path) -> Result<LoadedConfig> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("failed to read config {}", path.display()))?;
    let config = HoloConfig::from_toml_str(&text)
        .with_context(|| format!("in {}", path.display()))?;
    tracing::debug!(path = %path.display(), sequences = config.sequences.len(), "loaded config");
    Ok(LoadedConfig {
        config,
        source: Some(path.to_path_buf()),
    })
}

fn target_path(explicit: Option<&Path>) -> Result<PathBuf> {
    match explicit {
        Some(path) => Ok(path.to_path_buf()),
        None => Ok(AppPaths::discover()?.config_file()),
    }
}

pub fn handle_config_command(explicit: Option<&Path>, action: ConfigAction) -> Result<()> {
    match action {
        ConfigAction::Path => {
            println!("{}", target_path(explicit)?.display());
            Ok(())
        }
        ConfigAction::Init { force } => {
            let path = target_path(explicit)?;
            write_template(&path, force)?;
            println!("Wrote {}", path.display());
            Ok(())
        }
        ConfigAction::Check => {
            let path = target_path(explicit)?;
            let loaded = read_config(&path)?;
            print_summary(&loaded);
            Ok(())
        }
    }
}

fn write_template(path: &Path, force: bool) -> Result<()> {
    if path.exists() && !force {
        bail!(
            "{} already exists; pass --force to overwrite it",
            path.display()
        );
    }
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    fs::write(path, TEMPLATE).with_context(|| format!("failed to write {}", path.display()))
}

fn print_summary(loaded: &LoadedConfig) {
    let config = &loaded.config;
    if let Some(source) = &loaded.source {
        println!("{}: ok", source.display());
    }
    let asset = |path: &Option<PathBuf>| match path {
        Some(path) => loaded.resolve(path).display().to_string(),
        None => "(unset)".to_string(),
    };
    println!("  color:      {}", asset(&config.assets.color));
    println!("  depth:      {}", asset(&config.assets.depth));
    println!(
        "  field:      ~{} particles across {} units",
        config.field.target_particles, config.field.world_span
    );

    let library = SequenceLibrary::new(config);
    let names: Vec<&str> = library.names().collect();
    if names.is_empty() {
        println!("  sequences:  (none)");
    } else {
        println!("  sequences:  {}", names.join(", "));
    }
    if let Some(default) = config.default_sequence() {
        println!("  default:    {default}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn template_round_trips_through_check() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("holoscope.toml");
        write_template(&path, false).unwrap();

        let loaded = read_config(&path).unwrap();
        assert!(loaded.config.sequences.contains_key("intro"));
        assert_eq!(loaded.source.as_deref(), Some(path.as_path()));
    }

    #[test]
    fn init_refuses_to_clobber_without_force() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("holoscope.toml");
        fs::write(&path, "version = 1\n").unwrap();

        assert!(write_template(&path, false).is_err());
        assert_eq!(fs::read_to_string(&path).unwrap(), "version = 1\n");

        write_template(&path, true).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), TEMPLATE);
    }

    #[test]
    fn explicit_config_must_exist() {
        let dir = TempDir::new().unwrap();
        let err = load_config(Some(&dir.path().join("missing.toml"))).unwrap_err();
        assert!(err.to_string().contains("does not exist"));
    }

    #[test]
    fn invalid_config_reports_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bad.toml");
        fs::write(&path, "version = 2\n").unwrap();
        let err = load_config(Some(&path)).unwrap_err();
        assert!(format!("{err:#}").contains("unsupported config version"));
    }

    #[test]
    fn relative_paths_resolve_against_config_dir() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("holoscope.toml");
        fs::write(&path, "version = 1\n").unwrap();
        let loaded = load_config(Some(&path)).unwrap();

        assert_eq!(
            loaded.resolve(Path::new("art/subject.png")),
            dir.path().join("art/subject.png")
        );
        let absolute = dir.path().join("abs.png");
        assert_eq!(loaded.resolve(&absolute), absolute);
        assert_eq!(
            LoadedConfig::default().resolve(Path::new("x.png")),
            PathBuf::from("x.png")
        );
    }
}
