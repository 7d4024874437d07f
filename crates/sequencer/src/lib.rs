//! Plays named control sequences: phase N eases every control it targets from
//! where phase N-1 left it to the phase target, then hands over to phase N+1.

use std::collections::BTreeMap;
use std::time::Duration;

use hologram::{ControlKind, Controls};
use holoconfig::{Curve, HoloConfig, SequenceConfig};

#[derive(Debug, thiserror::Error)]
pub enum SequenceError {
    #[error("sequence '{0}' not found")]
    UnknownSequence(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Phase {
    pub name: String,
    pub duration: Duration,
    pub curve: Curve,
    pub targets: Vec<(ControlKind, f32)>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Sequence {
    pub name: String,
    pub looping: bool,
    pub phases: Vec<Phase>,
}

impl Sequence {
    pub fn from_config(name: &str, src: &SequenceConfig) -> Self {
        let phases = src
            .phases
            .iter()
            .map(|phase| Phase {
                name: phase.name.clone(),
                duration: phase.duration,
                curve: phase.curve,
                targets: phase
                    .targets
                    .entries()
                    .map(|(kind, value)| (kind, kind.clamp(value)))
                    .collect(),
            })
            .collect();
        Self {
            name: name.to_string(),
            looping: src.looping,
            phases,
        }
    }

    pub fn total_duration(&self) -> Duration {
        self.phases
            .iter()
            .fold(Duration::ZERO, |total, phase| total.saturating_add(phase.duration))
    }
}

/// Where in a sequence a timestamp falls.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PhasePosition {
    pub index: usize,
    /// Linear progress through the phase in `[0, 1]`.
    pub progress: f32,
}

/// All sequences declared in a config.
#[derive(Debug, Clone, Default)]
pub struct SequenceLibrary {
    sequences: BTreeMap<String, Sequence>,
}

impl SequenceLibrary {
    pub fn new(config: &HoloConfig) -> Self {
        let sequences = config
            .sequences
            .iter()
            .map(|(name, src)| (name.clone(), Sequence::from_config(name, src)))
            .collect();
        Self { sequences }
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.sequences.keys().map(String::as_str)
    }

    pub fn player(&self, name: &str) -> Result<SequencePlayer, SequenceError> {
        let sequence = self
            .sequences
            .get(name)
            .ok_or_else(|| SequenceError::UnknownSequence(name.to_string()))?
            .clone();
        Ok(SequencePlayer::new(sequence))
    }
}

/// Stateless evaluator for one sequence; `elapsed` is seconds since start.
#[derive(Debug, Clone)]
pub struct SequencePlayer {
    sequence: Sequence,
    total: f32,
}

impl SequencePlayer {
    pub fn new(sequence: Sequence) -> Self {
        let total = sequence.total_duration().as_secs_f32();
        Self { sequence, total }
    }

    pub fn sequence(&self) -> &Sequence {
        &self.sequence
    }

    /// True once a non-looping sequence has played its last phase.
    pub fn is_finished(&self, elapsed: f32) -> bool {
        !self.sequence.looping && elapsed >= self.total
    }

    fn local_time(&self, elapsed: f32) -> f32 {
        let elapsed = if elapsed.is_finite() { elapsed.max(0.0) } else { 0.0 };
        if self.sequence.looping && self.total > 0.0 {
            elapsed.rem_euclid(self.total)
        } else {
            elapsed
        }
    }

    /// Active phase, or `None` once a non-looping sequence has finished.
    pub fn phase_at(&self, elapsed: f32) -> Option<PhasePosition> {
        if self.total <= 0.0 || self.is_finished(elapsed) {
            return None;
        }
        let mut remaining = self.local_time(elapsed);
        for (index, phase) in self.sequence.phases.iter().enumerate() {
            let length = phase.duration.as_secs_f32();
            if remaining < length {
                return Some(PhasePosition {
                    index,
                    progress: remaining / length,
                });
            }
            remaining -= length;
        }
        // Float residue at the loop seam.
        self.sequence.phases.len().checked_sub(1).map(|index| PhasePosition {
            index,
            progress: 1.0,
        })
    }

    /// Layers the sequence over `live`; untargeted controls pass through.
    pub fn apply(&self, elapsed: f32, live: Controls) -> Controls {
        if self.total <= 0.0 {
            return live;
        }
        let position = self.phase_at(elapsed).unwrap_or(PhasePosition {
            index: self.sequence.phases.len(),
            progress: 0.0,
        });

        let mut controls = live;
        for phase in &self.sequence.phases[..position.index] {
            for &(kind, target) in &phase.targets {
                controls.set(kind, target);
            }
        }
        if let Some(phase) = self.sequence.phases.get(position.index) {
            let t = phase.curve.sample(position.progress);
            for &(kind, target) in &phase.targets {
                let start = controls.get(kind);
                controls.set(kind, start + (target - start) * t);
            }
        }
        controls
    }
}

/// Tracks phase changes so the frame loop can log them once.
#[derive(Debug, Clone)]
pub struct SequenceCursor {
    player: SequencePlayer,
    last_phase: Option<usize>,
    announced_end: bool,
}

impl SequenceCursor {
    pub fn new(player: SequencePlayer) -> Self {
        Self {
            player,
            last_phase: None,
            announced_end: false,
        }
    }

    pub fn player(&self) -> &SequencePlayer {
        &self.player
    }

    pub fn apply(&mut self, elapsed: f32, live: Controls) -> Controls {
        let phase = self.player.phase_at(elapsed).map(|position| position.index);
        if phase != self.last_phase {
            match phase {
                Some(index) => {
                    let name = &self.player.sequence.phases[index].name;
                    tracing::info!(
                        sequence = %self.player.sequence.name,
                        phase = %name,
                        index,
                        "sequence phase started"
                    );
                }
                None if !self.announced_end => {
                    tracing::info!(sequence = %self.player.sequence.name, "sequence finished");
                    self.announced_end = true;
                }
                None => {}
            }
            self.last_phase = phase;
        }
        self.player.apply(elapsed, live)
    }
}
