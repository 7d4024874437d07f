//! Slider state shared between input handling and the frame loop.
//!
//! Input contexts (window keyboard handler, stdin reader) write into a
//! [`SharedControls`]; the frame loop takes one [`Controls`] snapshot at the
//! start of each frame and never writes back.

use std::f32::consts::TAU;
use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU32, Ordering};

/// The seven user-facing sliders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ControlKind {
    RotationSpeed,
    SizeMultiplier,
    Zoom,
    DepthScale,
    BackgroundHide,
    Dissolve,
    Wobble,
}

impl ControlKind {
    pub const ALL: [ControlKind; 7] = [
        ControlKind::RotationSpeed,
        ControlKind::SizeMultiplier,
        ControlKind::Zoom,
        ControlKind::DepthScale,
        ControlKind::BackgroundHide,
        ControlKind::Dissolve,
        ControlKind::Wobble,
    ];

    /// Inclusive range every write is clamped to.
    pub fn range(self) -> (f32, f32) {
        match self {
            ControlKind::RotationSpeed => (0.0, 3.0),
            ControlKind::SizeMultiplier => (0.0, 2.0),
            ControlKind::Zoom => (0.1, 2.0),
            ControlKind::DepthScale => (-5.0, 5.0),
            ControlKind::BackgroundHide => (0.0, 1.0),
            ControlKind::Dissolve => (0.0, 1.0),
            ControlKind::Wobble => (0.0, 1.0),
        }
    }

    pub fn default_value(self) -> f32 {
        match self {
            ControlKind::RotationSpeed => 0.5,
            ControlKind::SizeMultiplier => 1.0,
            ControlKind::Zoom => 1.0,
            ControlKind::DepthScale => 1.0,
            ControlKind::BackgroundHide => 0.0,
            ControlKind::Dissolve => 0.0,
            ControlKind::Wobble => 0.0,
        }
    }

    /// Increment used by keyboard nudges: a twentieth of the range.
    pub fn step(self) -> f32 {
        let (min, max) = self.range();
        (max - min) / 20.0
    }

    pub fn clamp(self, value: f32) -> f32 {
        let (min, max) = self.range();
        if value.is_nan() {
            return self.default_value();
        }
        value.clamp(min, max)
    }

    pub fn name(self) -> &'static str {
        match self {
            ControlKind::RotationSpeed => "rotation_speed",
            ControlKind::SizeMultiplier => "size_multiplier",
            ControlKind::Zoom => "zoom",
            ControlKind::DepthScale => "depth_scale",
            ControlKind::BackgroundHide => "background_hide",
            ControlKind::Dissolve => "dissolve",
            ControlKind::Wobble => "wobble",
        }
    }

    fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for ControlKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ControlKind {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_ascii_lowercase().replace('-', "_");
        match normalized.as_str() {
            "rotation_speed" | "rotation" | "speed" => Ok(ControlKind::RotationSpeed),
            "size_multiplier" | "size" => Ok(ControlKind::SizeMultiplier),
            "zoom" => Ok(ControlKind::Zoom),
            "depth_scale" | "depth" => Ok(ControlKind::DepthScale),
            "background_hide" | "bg_hide" | "background" => Ok(ControlKind::BackgroundHide),
            "dissolve" => Ok(ControlKind::Dissolve),
            "wobble" => Ok(ControlKind::Wobble),
            other => Err(format!("unknown control '{other}'")),
        }
    }
}

/// Parses `name=value` assignments such as `wobble=0.4`.
pub fn parse_assignment(input: &str) -> Result<(ControlKind, f32), String> {
    let (name, value) = input
        .split_once('=')
        .ok_or_else(|| format!("expected NAME=VALUE, got '{}'", input.trim()))?;
    let kind = name.parse::<ControlKind>()?;
    let value = value
        .trim()
        .parse::<f32>()
        .map_err(|_| format!("invalid value for {kind}: '{}'", value.trim()))?;
    if !value.is_finite() {
        return Err(format!("value for {kind} must be finite"));
    }
    Ok((kind, value))
}

/// One frame's snapshot of the sliders.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Controls {
    pub rotation_speed: f32,
    pub size_multiplier: f32,
    pub zoom: f32,
    pub depth_scale: f32,
    pub background_hide: f32,
    pub dissolve: f32,
    pub wobble: f32,
}

impl Default for Controls {
    fn default() -> Self {
        let mut controls = Self {
            rotation_speed: 0.0,
            size_multiplier: 0.0,
            zoom: 0.0,
            depth_scale: 0.0,
            background_hide: 0.0,
            dissolve: 0.0,
            wobble: 0.0,
        };
        for kind in ControlKind::ALL {
            controls.set(kind, kind.default_value());
        }
        controls
    }
}

impl Controls {
    pub fn get(&self, kind: ControlKind) -> f32 {
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

    /// Writes a clamped value.
    pub fn set(&mut self, kind: ControlKind, value: f32) {
        let value = kind.clamp(value);
        match kind {
            ControlKind::RotationSpeed => self.rotation_speed = value,
            ControlKind::SizeMultiplier => self.size_multiplier = value,
            ControlKind::Zoom => self.zoom = value,
            ControlKind::DepthScale => self.depth_scale = value,
            ControlKind::BackgroundHide => self.background_hide = value,
            ControlKind::Dissolve => self.dissolve = value,
            ControlKind::Wobble => self.wobble = value,
        }
    }

    pub fn with(mut self, kind: ControlKind, value: f32) -> Self {
        self.set(kind, value);
        self
    }
}

/// Lock-free holder the input side writes into.
///
/// Each slider is an `AtomicU32` holding `f32` bits, so a reader never sees a
/// torn value. Writes are clamped before they are stored.
#[derive(Debug)]
pub struct SharedControls {
    slots: [AtomicU32; 7],
}

impl SharedControls {
    pub fn new(initial: Controls) -> Self {
        let shared = Self {
            slots: std::array::from_fn(|_| AtomicU32::new(0)),
        };
        shared.store(initial);
        shared
    }

    pub fn set(&self, kind: ControlKind, value: f32) -> f32 {
        let clamped = kind.clamp(value);
        self.slots[kind.index()].store(clamped.to_bits(), Ordering::Relaxed);
        clamped
    }

    pub fn get(&self, kind: ControlKind) -> f32 {
        f32::from_bits(self.slots[kind.index()].load(Ordering::Relaxed))
    }

    /// Moves a slider by `steps` keyboard increments and returns the new value.
    ///
    /// Only the input context calls this, so the load/store pair does not race
    /// with the frame loop, which only reads.
    pub fn nudge(&self, kind: ControlKind, steps: f32) -> f32 {
        self.set(kind, self.get(kind) + kind.step() * steps)
    }

    pub fn store(&self, controls: Controls) {
        for kind in ControlKind::ALL {
            self.set(kind, controls.get(kind));
        }
    }

    pub fn reset(&self) {
        self.store(Controls::default());
    }

    pub fn snapshot(&self) -> Controls {
        let mut controls = Controls::default();
        for kind in ControlKind::ALL {
            controls.set(kind, self.get(kind));
        }
        controls
    }
}

impl Default for SharedControls {
    fn default() -> Self {
        Self::new(Controls::default())
    }
}

/// Monotonic elapsed time plus the wrapped global rotation angle.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct FrameClock {
    elapsed: f32,
    rotation: f32,
}

impl FrameClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Advances by `dt` seconds; negative or non-finite deltas are ignored.
    pub fn advance(&mut self, dt: f32, rotation_speed: f32) {
        if !dt.is_finite() || dt <= 0.0 {
            return;
        }
        self.elapsed += dt;
        self.rotation = wrap_angle(self.rotation + rotation_speed * dt);
    }

    pub fn elapsed(&self) -> f32 {
        self.elapsed
    }

    pub fn rotation(&self) -> f32 {
        self.rotation
    }

    pub fn uniforms(&self, controls: Controls) -> FrameUniforms {
        FrameUniforms {
            elapsed: self.elapsed,
            rotation: self.rotation,
            controls,
        }
    }
}

/// Wraps an angle into `[0, 2π)`.
pub fn wrap_angle(angle: f32) -> f32 {
    let wrapped = angle.rem_euclid(TAU);
    if wrapped >= TAU {
        0.0
    } else {
        wrapped
    }
}

/// Everything the motion kernel and render pass read for one frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameUniforms {
    pub elapsed: f32,
    pub rotation: f32,
    pub controls: Controls,
}

impl FrameUniforms {
    pub fn new(elapsed: f32, rotation: f32, controls: Controls) -> Self {
        Self {
            elapsed,
            rotation,
            controls,
        }
    }
}

impl Default for FrameUniforms {
    fn default() -> Self {
        Self::new(0.0, 0.0, Controls::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn writes_are_clamped_to_documented_ranges() {
        let mut controls = Controls::default();
        controls.set(ControlKind::Zoom, 10.0);
        controls.set(ControlKind::DepthScale, -9.0);
        controls.set(ControlKind::Wobble, f32::NAN);
        assert_eq!(controls.zoom, 2.0);
        assert_eq!(controls.depth_scale, -5.0);
        assert_eq!(controls.wobble, ControlKind::Wobble.default_value());
    }

    #[test]
    fn parses_assignments() {
        assert_eq!(
            parse_assignment("wobble=0.4").unwrap(),
            (ControlKind::Wobble, 0.4)
        );
        assert_eq!(
            parse_assignment(" bg-hide = 1 ").unwrap(),
            (ControlKind::BackgroundHide, 1.0)
        );
        assert!(parse_assignment("wobble").is_err());
        assert!(parse_assignment("spin=1").is_err());
        assert!(parse_assignment("zoom=abc").is_err());
        assert!(parse_assignment("zoom=inf").is_err());
    }

    #[test]
    fn shared_controls_snapshot_reflects_concurrent_writes() {
        let shared = Arc::new(SharedControls::default());
        let writer = {
            let shared = Arc::clone(&shared);
            thread::spawn(move || {
                shared.set(ControlKind::Dissolve, 0.25);
                shared.set(ControlKind::Zoom, 0.0);
            })
        };
        writer.join().unwrap();
        let snapshot = shared.snapshot();
        assert_eq!(snapshot.dissolve, 0.25);
        assert_eq!(snapshot.zoom, 0.1);
    }

    #[test]
    fn nudge_moves_by_one_twentieth_of_range() {
        let shared = SharedControls::default();
        let value = shared.nudge(ControlKind::Wobble, 1.0);
        assert!((value - 0.05).abs() < 1e-6);
        let value = shared.nudge(ControlKind::Wobble, -5.0);
        assert_eq!(value, 0.0);
        shared.reset();
        assert_eq!(shared.snapshot(), Controls::default());
    }

    #[test]
    fn clock_wraps_rotation_at_tau() {
        let mut clock = FrameClock::new();
        clock.advance(1.0, 4.0);
        clock.advance(1.0, 4.0);
        assert!((clock.elapsed() - 2.0).abs() < 1e-6);
        assert!((clock.rotation() - (8.0 - TAU)).abs() < 1e-5);

        clock.advance(-1.0, 4.0);
        clock.advance(f32::NAN, 4.0);
        assert!((clock.elapsed() - 2.0).abs() < 1e-6);
    }
}
