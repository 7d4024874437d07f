use std::path::PathBuf;
use std::time::{Duration, Instant};

use anyhow::{bail, Result};

/// High-level behaviour requested by the caller.
///
/// The render policy decides whether frames animate continuously against the
/// wall clock, are evaluated once at a fixed timestamp, or are stepped at a
/// fixed rate and written to disk.
#[derive(Debug, Clone, PartialEq)]
pub enum RenderPolicy {
    /// Run the preview loop continuously, optionally clamping the frame rate.
    Animate {
        /// Optional requested frames-per-second cap.
        target_fps: Option<f32>,
    },
    /// Render a single still frame at `time` seconds.
    Still { time: f32 },
    /// Render `frames` frames at a fixed `fps` step and write them under `dir`.
    Export {
        dir: PathBuf,
        frames: u32,
        fps: f32,
    },
}

impl Default for RenderPolicy {
    fn default() -> Self {
        Self::Animate { target_fps: None }
    }
}

impl RenderPolicy {
    fn frame_cap(&self) -> Option<f32> {
        match self {
            RenderPolicy::Animate { target_fps } => *target_fps,
            RenderPolicy::Still { .. } | RenderPolicy::Export { .. } => None,
        }
    }
}

/// Snapshot of the time state handed to the frame loop.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimeSample {
    /// Elapsed wall-clock or simulated time in seconds.
    pub seconds: f32,
    /// Monotonic frame counter for the running session.
    pub frame_index: u64,
}

impl TimeSample {
    pub fn new(seconds: f32, frame_index: u64) -> Self {
        Self {
            seconds,
            frame_index,
        }
    }
}

/// Abstraction over where time values originate from.
pub trait TimeSource: Send {
    /// Resets the source to its initial state.
    fn reset(&mut self);
    /// Produces a time sample for the next frame.
    fn sample(&mut self) -> TimeSample;
}

/// Time source backed by the system monotonic clock.
#[derive(Debug, Clone, Copy)]
pub struct SystemTimeSource {
    origin: Instant,
    frame: u64,
}

impl SystemTimeSource {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Default for SystemTimeSource {
    fn default() -> Self {
        Self {
            origin: Instant::now(),
            frame: 0,
        }
    }
}

impl TimeSource for SystemTimeSource {
    fn reset(&mut self) {
        self.origin = Instant::now();
        self.frame = 0;
    }

    fn sample(&mut self) -> TimeSample {
        let elapsed = self.origin.elapsed();
        let sample = TimeSample::new(elapsed.as_secs_f32(), self.frame);
        self.frame = self.frame.saturating_add(1);
        sample
    }
}

/// Advances by exactly `1 / fps` per sample, independent of wall time.
#[derive(Debug, Clone, Copy)]
pub struct FixedStepTimeSource {
    fps: f32,
    frame: u64,
}

impl FixedStepTimeSource {
    pub fn new(fps: f32) -> Self {
        Self { fps, frame: 0 }
    }
}

impl TimeSource for FixedStepTimeSource {
    fn reset(&mut self) {
        self.frame = 0;
    }

    fn sample(&mut self) -> TimeSample {
        // Computed from the index so long exports do not accumulate error.
        let sample = TimeSample::new(self.frame as f32 / self.fps, self.frame);
        self.frame = self.frame.saturating_add(1);
        sample
    }
}

/// Time source that always reports a fixed timestamp.
#[derive(Debug, Clone, Copy)]
pub struct FixedTimeSource {
    time: f32,
}

impl FixedTimeSource {
    pub fn new(time: f32) -> Self {
        Self { time }
    }

    pub fn time(&self) -> f32 {
        self.time
    }
}

impl TimeSource for FixedTimeSource {
    fn reset(&mut self) {}

    fn sample(&mut self) -> TimeSample {
        TimeSample::new(self.time, 0)
    }
}

/// Convenient alias for owning time sources behind trait objects.
pub type BoxedTimeSource = Box<dyn TimeSource + Send>;

/// Builds a time source suited to the requested render policy.
pub fn time_source_for_policy(policy: &RenderPolicy) -> Result<BoxedTimeSource> {
    match policy {
        RenderPolicy::Animate { .. } => Ok(Box::new(SystemTimeSource::new())),
        RenderPolicy::Still { time } => {
            if !time.is_finite() || *time < 0.0 {
                bail!("still time must be a non-negative number of seconds, got {time}");
            }
            Ok(Box::new(FixedTimeSource::new(*time)))
        }
        RenderPolicy::Export { fps, .. } => {
            if !fps.is_finite() || *fps <= 0.0 {
                bail!("export fps must be positive, got {fps}");
            }
            Ok(Box::new(FixedStepTimeSource::new(*fps)))
        }
    }
}

/// Enforces an optional frame-rate cap for the preview loop.
#[derive(Debug, Clone)]
pub struct FrameScheduler {
    interval: Option<Duration>,
    last_frame: Option<Instant>,
}

impl FrameScheduler {
    pub fn new(policy: &RenderPolicy) -> Self {
        Self::with_cap(policy.frame_cap())
    }

    pub fn with_cap(target_fps: Option<f32>) -> Self {
        let interval = target_fps
            .filter(|fps| fps.is_finite() && *fps > 0.0)
            .map(|fps| Duration::from_secs_f32(1.0 / fps));
        Self {
            interval,
            last_frame: None,
        }
    }

    pub fn interval(&self) -> Option<Duration> {
        self.interval
    }

    pub fn ready_for_frame(&self, now: Instant) -> bool {
        match (self.interval, self.last_frame) {
            (Some(interval), Some(last)) => now.saturating_duration_since(last) >= interval,
            _ => true,
        }
    }

    pub fn mark_rendered(&mut self, now: Instant) {
        self.last_frame = Some(now);
    }

    /// When the next frame becomes due; `None` means "as soon as possible".
    pub fn next_deadline(&self) -> Option<Instant> {
        match (self.interval, self.last_frame) {
            (Some(interval), Some(last)) => Some(last + interval),
            _ => None,
        }
    }

    pub fn reset(&mut self) {
        self.last_frame = None;
    }
}

/// Pairs a scheduler with the time source for one policy.
pub struct RenderPolicyDriver {
    scheduler: FrameScheduler,
    time_source: BoxedTimeSource,
    last_seconds: Option<f32>,
}

impl RenderPolicyDriver {
    pub fn new(policy: &RenderPolicy) -> Result<Self> {
        Ok(Self {
            scheduler: FrameScheduler::new(policy),
            time_source: time_source_for_policy(policy)?,
            last_seconds: None,
        })
    }

    /// Samples the time source and returns it with the delta since the
    /// previous sample. The first sample of a session has a delta equal to its
    /// own timestamp, so a still at `t` lands at `t`.
    pub fn sample(&mut self) -> (TimeSample, f32) {
        let sample = self.time_source.sample();
        let previous = self.last_seconds.replace(sample.seconds).unwrap_or(0.0);
        (sample, (sample.seconds - previous).max(0.0))
    }

    pub fn mark_rendered(&mut self, now: Instant) {
        self.scheduler.mark_rendered(now);
    }

    pub fn ready_for_frame(&self, now: Instant) -> bool {
        self.scheduler.ready_for_frame(now)
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.scheduler.next_deadline()
    }

    pub fn cap(&mut self, target_fps: f32) {
        self.scheduler = FrameScheduler::with_cap(Some(target_fps));
    }

    pub fn reset(&mut self) {
        self.time_source.reset();
        self.scheduler.reset();
        self.last_seconds = None;
    }
}
