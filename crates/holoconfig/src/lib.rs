use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use hologram::{ControlKind, Controls, FieldParams};
use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};

/// Default file name inside the config directory.
pub const CONFIG_FILE_NAME: &str = "holoscope.toml";

/// Commented starting point written by `holoscope config init`.
pub const TEMPLATE: &str = r#"# holoscope configuration
version = 1

[assets]
# color = "subject.png"
# depth = "subject_mask.png"

[field]
target_particles = 30000
world_span = 400.0

[camera]
fov_y_degrees = 45.0
distance = 400.0

[controls]
rotation_speed = 0.5
wobble = 0.0

[window]
size = "1280x720"
fps = 60

# [defaults]
# sequence = "intro"

[sequences.intro]
loop = false

[[sequences.intro.phases]]
name = "approach"
duration = "3s"
curve = "smoothstep"
zoom = 1.6
rotation_speed = 1.5

[[sequences.intro.phases]]
name = "settle"
duration = "2s"
curve = "ease-in-out"
zoom = 1.0
wobble = 0.3
"#;

/// Longest accepted sequence phase.
pub const MAX_PHASE_DURATION: Duration = Duration::from_secs(24 * 60 * 60);

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Easing applied across a sequence phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Curve {
    #[default]
    Linear,
    Smoothstep,
    EaseInOut,
}

impl Curve {
    /// Maps linear progress in `[0, 1]` onto the eased value.
    pub fn sample(self, t: f32) -> f32 {
        let clamped = t.clamp(0.0, 1.0);
        match self {
            Curve::Linear => clamped,
            Curve::Smoothstep => clamped * clamped * (3.0 - 2.0 * clamped),
            Curve::EaseInOut => {
                if clamped < 0.5 {
                    2.0 * clamped * clamped
                } else {
                    -1.0 + (4.0 - 2.0 * clamped) * clamped
                }
            }
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct HoloConfig {
    pub version: u32,
    #[serde(default)]
    pub assets: Assets,
    #[serde(default)]
    pub field: FieldSection,
    #[serde(default)]
    pub camera: CameraSection,
    #[serde(default)]
    pub controls: ControlOverrides,
    #[serde(default)]
    pub window: WindowSection,
    #[serde(default)]
    pub defaults: Defaults,
    #[serde(default)]
    pub sequences: BTreeMap<String, SequenceConfig>,
}

impl Default for HoloConfig {
    fn default() -> Self {
        Self {
            version: 1,
            assets: Assets::default(),
            field: FieldSection::default(),
            camera: CameraSection::default(),
            controls: ControlOverrides::default(),
            window: WindowSection::default(),
            defaults: Defaults::default(),
            sequences: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Assets {
    pub color: Option<PathBuf>,
    pub depth: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FieldSection {
    #[serde(default = "default_target_particles")]
    pub target_particles: usize,
    #[serde(default = "default_world_span")]
    pub world_span: f32,
}

impl Default for FieldSection {
    fn default() -> Self {
        Self {
            target_particles: default_target_particles(),
            world_span: default_world_span(),
        }
    }
}

impl FieldSection {
    pub fn params(&self) -> FieldParams {
        FieldParams {
            target_count: self.target_particles,
            world_span: self.world_span,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CameraSection {
    #[serde(default = "default_fov")]
    pub fov_y_degrees: f32,
    /// Eye distance from the orbital centre along +Z.
    #[serde(default = "default_distance")]
    pub distance: f32,
}

impl Default for CameraSection {
    fn default() -> Self {
        Self {
            fov_y_degrees: default_fov(),
            distance: default_distance(),
        }
    }
}

/// Optional value per slider; used for `[controls]` and phase targets.
#[derive(Debug, Clone, Copy, Default, PartialEq, Deserialize, Serialize)]
pub struct ControlOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rotation_speed: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size_multiplier: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub zoom: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub depth_scale: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub background_hide: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dissolve: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wobble: Option<f32>,
}

impl ControlOverrides {
    pub fn get(&self, kind: ControlKind) -> Option<f32> {
        match kind {
            ControlKind::RotationSpeed => self.rotation_speed,
            ControlKind::SizeMultiplier => self.size_multiplier,
            ControlKind::Zoom => self.zoom,
            ControlKind::DepthScale => self.depth_scale,
            ControlKind::BackgroundHide => self.background_hide,
            ControlKind::Dissolve => self.dissolve,
            ControlKind::Wobble => self.wobble,
        }
    }

    pub fn set(&mut self, kind: ControlKind, value: f32) {
        let slot = match kind {
            ControlKind::RotationSpeed => &mut self.rotation_speed,
            ControlKind::SizeMultiplier => &mut self.size_multiplier,
            ControlKind::Zoom => &mut self.zoom,
            ControlKind::DepthScale => &mut self.depth_scale,
            ControlKind::BackgroundHide => &mut self.background_hide,
            ControlKind::Dissolve => &mut self.dissolve,
            ControlKind::Wobble => &mut self.wobble,
        };
        *slot = Some(value);
    }

    /// The `(kind, value)` pairs that are set, in [`ControlKind::ALL`] order.
    pub fn entries(&self) -> impl Iterator<Item = (ControlKind, f32)> + '_ {
        ControlKind::ALL
            .into_iter()
            .filter_map(|kind| self.get(kind).map(|value| (kind, value)))
    }

    pub fn apply_to(&self, mut controls: Controls) -> Controls {
        for (kind, value) in self.entries() {
            controls.set(kind, value);
        }
        controls
    }

    pub fn is_empty(&self) -> bool {
        self.entries().next().is_none()
    }

    fn validate(&self, context: &str) -> Result<(), ConfigError> {
        for (kind, value) in self.entries() {
            let (min, max) = kind.range();
            if !value.is_finite() || value < min || value > max {
                return Err(ConfigError::Invalid(format!(
                    "{context}.{kind} = {value} is outside {min}..={max}"
                )));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct WindowSection {
    /// `WIDTHxHEIGHT`, e.g. `1280x720`.
    pub size: Option<String>,
    /// Frame cap; 0 or unset means follow the display.
    pub fps: Option<f32>,
}

impl WindowSection {
    pub fn dimensions(&self) -> Result<Option<(u32, u32)>, ConfigError> {
        self.size
            .as_deref()
            .map(|raw| {
                parse_size(raw).map_err(|err| ConfigError::Invalid(format!("window.size: {err}")))
            })
            .transpose()
    }

    pub fn fps_cap(&self) -> Option<f32> {
        self.fps.filter(|fps| *fps > 0.0)
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Defaults {
    /// Sequence to play when the CLI does not name one.
    pub sequence: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct SequenceConfig {
    #[serde(default, rename = "loop")]
    pub looping: bool,
    #[serde(default)]
    pub phases: Vec<PhaseConfig>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PhaseConfig {
    pub name: String,
    #[serde(deserialize_with = "deserialize_duration", serialize_with = "serialize_duration")]
    pub duration: Duration,
    #[serde(default)]
    pub curve: Curve,
    #[serde(flatten)]
    pub targets: ControlOverrides,
}

fn default_target_particles() -> usize {
    FieldParams::default().target_count
}

fn default_world_span() -> f32 {
    FieldParams::default().world_span
}

fn default_fov() -> f32 {
    45.0
}

fn default_distance() -> f32 {
    400.0
}

/// Parses `WIDTHxHEIGHT` with non-zero dimensions.
pub fn parse_size(input: &str) -> Result<(u32, u32), String> {
    let trimmed = input.trim();
    let (width, height) = trimmed
        .split_once(['x', 'X', '×'])
        .ok_or_else(|| format!("expected WxH format, e.g. 1280x720, got '{trimmed}'"))?;
    let width: u32 = width
        .trim()
        .parse()
        .map_err(|_| format!("invalid width in '{trimmed}'"))?;
    let height: u32 = height
        .trim()
        .parse()
        .map_err(|_| format!("invalid height in '{trimmed}'"))?;
    if width == 0 || height == 0 {
        return Err("dimensions must be greater than zero".to_string());
    }
    Ok((width, height))
}

fn serialize_duration<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    serializer.serialize_str(&humantime::format_duration(*duration).to_string())
}

fn deserialize_duration<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    struct Visitor;
    impl<'de> de::Visitor<'de> for Visitor {
        type Value = Duration;

        fn expecting(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
            formatter.write_str("a duration as number of seconds or human-readable string")
        }

        fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            humantime::parse_duration(v)
                .map_err(|err| E::custom(format!("invalid duration '{v}': {err}")))
        }

        fn visit_u64<E>(self, v: u64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(Duration::from_secs(v))
        }

        fn visit_i64<E>(self, v: i64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            if v < 0 {
                return Err(E::custom("duration must be non-negative"));
            }
            Ok(Duration::from_secs(v as u64))
        }

        fn visit_f64<E>(self, v: f64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            if !v.is_finite() || v.is_sign_negative() {
                return Err(E::custom("duration must be non-negative"));
            }
            Duration::try_from_secs_f64(v)
                .map_err(|err| E::custom(format!("invalid duration {v}: {err}")))
        }
    }

    deserializer.deserialize_any(Visitor)
}

impl HoloConfig {
    pub fn from_toml_str(input: &str) -> Result<Self, ConfigError> {
        let raw: HoloConfig = toml::from_str(input)?;
        raw.validate()?;
        Ok(raw)
    }

    pub fn sequence(&self, name: &str) -> Option<&SequenceConfig> {
        self.sequences.get(name)
    }

    pub fn default_sequence(&self) -> Option<&str> {
        self.defaults.sequence.as_deref()
    }

    /// Built-in defaults with `[controls]` applied.
    pub fn initial_controls(&self) -> Controls {
        self.controls.apply_to(Controls::default())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.version != 1 {
            return Err(ConfigError::Invalid(format!(
                "unsupported config version {}; expected 1",
                self.version
            )));
        }

        if self.field.target_particles == 0 {
            return Err(ConfigError::Invalid(
                "field.target_particles must be greater than zero".into(),
            ));
        }
        if !(self.field.world_span.is_finite() && self.field.world_span > 0.0) {
            return Err(ConfigError::Invalid(
                "field.world_span must be a positive number".into(),
            ));
        }

        let fov = self.camera.fov_y_degrees;
        if !(fov.is_finite() && fov > 0.0 && fov < 180.0) {
            return Err(ConfigError::Invalid(format!(
                "camera.fov_y_degrees must be between 0 and 180, got {fov}"
            )));
        }
        if !(self.camera.distance.is_finite() && self.camera.distance > 0.0) {
            return Err(ConfigError::Invalid(
                "camera.distance must be a positive number".into(),
            ));
        }

        self.controls.validate("controls")?;

        self.window.dimensions()?;
        if let Some(fps) = self.window.fps {
            if !fps.is_finite() || fps < 0.0 {
                return Err(ConfigError::Invalid("window.fps must be >= 0".into()));
            }
        }

        for (name, sequence) in &self.sequences {
            if sequence.phases.is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "sequence '{name}' must contain at least one phase"
                )));
            }
            for phase in &sequence.phases {
                if phase.duration.is_zero() {
                    return Err(ConfigError::Invalid(format!(
                        "sequence '{name}' phase '{}' duration must be > 0",
                        phase.name
                    )));
                }
                if phase.duration > MAX_PHASE_DURATION {
                    return Err(ConfigError::Invalid(format!(
                        "sequence '{name}' phase '{}' duration must be at most {}",
                        phase.name,
                        humantime::format_duration(MAX_PHASE_DURATION)
                    )));
                }
                phase
                    .targets
                    .validate(&format!("sequences.{name}.{}", phase.name))?;
            }
        }

        if let Some(default_sequence) = &self.defaults.sequence {
            if !self.sequences.contains_key(default_sequence) {
                return Err(ConfigError::Invalid(format!(
                    "defaults.sequence references unknown sequence '{default_sequence}'"
                )));
            }
        }

        Ok(())
    }
}
