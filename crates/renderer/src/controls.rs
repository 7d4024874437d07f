use std::sync::Arc;

use hologram::{ControlKind, Controls, SharedControls};
use sequencer::{SequenceCursor, SequencePlayer};

/// Produces the one-per-frame control snapshot.
///
/// Live sliders come from [`SharedControls`] (keyboard, stdin); an optional
/// sequence is layered on top at the frame's sample time.
#[derive(Debug)]
pub struct ControlFeed {
    shared: Arc<SharedControls>,
    defaults: Controls,
    cursor: Option<SequenceCursor>,
}

impl ControlFeed {
    pub fn new(
        shared: Arc<SharedControls>,
        defaults: Controls,
        sequence: Option<SequencePlayer>,
    ) -> Self {
        Self {
            shared,
            defaults,
            cursor: sequence.map(SequenceCursor::new),
        }
    }

    pub fn shared(&self) -> &Arc<SharedControls> {
        &self.shared
    }

    pub fn snapshot(&mut self, seconds: f32) -> Controls {
        let live = self.shared.snapshot();
        match self.cursor.as_mut() {
            Some(cursor) => cursor.apply(seconds, live),
            None => live,
        }
    }

    pub fn nudge(&self, kind: ControlKind, steps: f32) -> f32 {
        let value = self.shared.nudge(kind, steps);
        tracing::debug!(control = %kind, value, "control nudged");
        value
    }

    /// Back to the values the session started with.
    pub fn reset(&self) {
        self.shared.store(self.defaults);
        tracing::debug!("controls reset");
    }
}

/// Keyboard binding for the preview window: the number row raises a slider,
/// the letter below it lowers it.
pub fn binding_for_key(key: &str) -> Option<(ControlKind, f32)> {
    let mut chars = key.chars();
    let ch = chars.next()?.to_ascii_lowercase();
    if chars.next().is_some() {
        return None;
    }
    const RAISE: [char; 7] = ['1', '2', '3', '4', '5', '6', '7'];
    const LOWER: [char; 7] = ['q', 'w', 'e', 'r', 't', 'y', 'u'];
    if let Some(index) = RAISE.iter().position(|&c| c == ch) {
        return Some((ControlKind::ALL[index], 1.0));
    }
    LOWER
        .iter()
        .position(|&c| c == ch)
        .map(|index| (ControlKind::ALL[index], -1.0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use holoconfig::HoloConfig;
    use sequencer::SequenceLibrary;

    #[test]
    fn number_row_raises_letters_lower() {
        assert_eq!(binding_for_key("1"), Some((ControlKind::RotationSpeed, 1.0)));
        assert_eq!(binding_for_key("Q"), Some((ControlKind::RotationSpeed, -1.0)));
        assert_eq!(binding_for_key("7"), Some((ControlKind::Wobble, 1.0)));
        assert_eq!(binding_for_key("u"), Some((ControlKind::Wobble, -1.0)));
        assert_eq!(binding_for_key("3"), Some((ControlKind::Zoom, 1.0)));
        assert_eq!(binding_for_key("x"), None);
        assert_eq!(binding_for_key("12"), None);
    }

    #[test]
    fn reset_restores_session_defaults() {
        let defaults = Controls::default().with(ControlKind::Wobble, 0.3);
        let feed = ControlFeed::new(Arc::new(SharedControls::new(defaults)), defaults, None);
        feed.nudge(ControlKind::Wobble, 4.0);
        assert!(feed.shared().get(ControlKind::Wobble) > 0.3);
        feed.reset();
        assert!((feed.shared().get(ControlKind::Wobble) - 0.3).abs() < 1e-6);
    }

    #[test]
    fn sequence_overrides_live_values() {
        let config = HoloConfig::from_toml_str(
            r#"
version = 1

[sequences.hold]
loop = false

[[sequences.hold.phases]]
name = "only"
duration = "2s"
curve = "linear"
dissolve = 1.0
"#,
        )
        .unwrap();
        let player = SequenceLibrary::new(&config).player("hold").unwrap();
        let shared = Arc::new(SharedControls::default());
        let mut feed = ControlFeed::new(shared, Controls::default(), Some(player));
        assert!((feed.snapshot(1.0).dissolve - 0.5).abs() < 1e-5);
        assert!((feed.snapshot(5.0).dissolve - 1.0).abs() < 1e-6);
    }
}
