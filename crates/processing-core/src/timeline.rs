//! Timeline accounting for concatenation.
//!
//! Given normalized clip durations and the transition policy, works out
//! where every clip lands on the final timeline, the offsets the `xfade`
//! chain needs, and how long the result must be. After the tool runs, the
//! probed duration is checked against the plan.

use reelcut_common::error::{ReelcutError, ReelcutResult};
use reelcut_common::timing::{DriftMeasurement, FrameClock};
use reelcut_project_model::request::{TransitionKind, TransitionSpec};

use crate::voice_activity::TimeRange;

/// Placement of every clip on the final timeline.
#[derive(Debug, Clone, PartialEq)]
pub struct TimelinePlan {
    kind: TransitionKind,
    durations: Vec<f64>,
    /// Effective overlap between clip `i` and `i + 1`.
    transitions: Vec<f64>,
    /// Start of each clip on the final timeline.
    starts: Vec<f64>,
    clock: FrameClock,
}

impl TimelinePlan {
    /// Overlaps are clamped to half the shorter neighbour, then floored to
    /// whole frames so the tool never has to round a transition up.
    pub fn build(durations: &[f64], transition: &TransitionSpec, fps: u32) -> Self {
        let clock = FrameClock::new(fps);
        let durations: Vec<f64> = durations.iter().map(|d| d.max(0.0)).collect();
        let transitions: Vec<f64> = durations
            .windows(2)
            .map(|pair| clock.floor_to_frame(transition.clamped_between(pair[0], pair[1])))
            .collect();

        let mut starts = Vec::with_capacity(durations.len());
        let mut cursor = 0.0;
        for (idx, duration) in durations.iter().enumerate() {
            starts.push(cursor);
            cursor += duration - transitions.get(idx).copied().unwrap_or(0.0);
        }

        let plan = Self {
            kind: transition.kind,
            durations,
            transitions,
            starts,
            clock,
        };
        tracing::debug!(
            clips = plan.len(),
            kind = ?plan.kind,
            overlap_secs = plan.total_overlap_secs(),
            expected_secs = plan.expected_duration_secs(),
            "Planned timeline"
        );
        plan
    }

    pub fn len(&self) -> usize {
        self.durations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.durations.is_empty()
    }

    /// One clip passes through untouched.
    pub fn is_passthrough(&self) -> bool {
        self.durations.len() == 1
    }

    pub fn kind(&self) -> TransitionKind {
        self.kind
    }

    pub fn durations(&self) -> &[f64] {
        &self.durations
    }

    pub fn transitions(&self) -> &[f64] {
        &self.transitions
    }

    pub fn clip_starts(&self) -> &[f64] {
        &self.starts
    }

    /// Window of clip `idx` on the final timeline.
    pub fn clip_window(&self, idx: usize) -> Option<TimeRange> {
        let start = *self.starts.get(idx)?;
        Some(TimeRange::new(start, start + self.durations[idx]))
    }

    /// `offset` of each `xfade` in a left-to-right chain, measured on the
    /// accumulated output (equal to the next clip's start).
    pub fn xfade_offsets(&self) -> Vec<f64> {
        self.starts.iter().skip(1).copied().collect()
    }

    pub fn total_overlap_secs(&self) -> f64 {
        self.transitions.iter().sum()
    }

    /// Sum of durations minus every overlap.
    pub fn expected_duration_secs(&self) -> f64 {
        self.durations.iter().sum::<f64>() - self.total_overlap_secs()
    }

    pub fn tolerance_secs(&self) -> f64 {
        self.clock.frame_interval_secs()
    }

    /// Fail with `TimelineDrift` when `measured_secs` is off by more than a frame.
    pub fn verify(&self, measured_secs: f64) -> ReelcutResult<()> {
        check_drift(self.expected_duration_secs(), measured_secs, self.clock)
    }
}

/// Compare a measured duration with the expected one at one-frame tolerance.
pub fn check_drift(expected_secs: f64, measured_secs: f64, clock: FrameClock) -> ReelcutResult<()> {
    let drift = DriftMeasurement::new(expected_secs, measured_secs);
    if drift.exceeds_one_frame(clock) {
        return Err(ReelcutError::TimelineDrift {
            expected_secs,
            actual_secs: measured_secs,
            tolerance_secs: clock.frame_interval_secs(),
        });
    }
    tracing::debug!(
        expected_secs,
        measured_secs,
        drift_ms = drift.drift_ms(),
        "Timeline within tolerance"
    );
    Ok(())
}
