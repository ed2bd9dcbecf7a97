//! Frame timing and timeline drift utilities.
//!
//! Every duration check in the engine is expressed in terms of the target
//! frame interval: two durations are "equal" when they differ by at most
//! one frame.

/// Converts between seconds and frame counts at a fixed frame rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameClock {
    fps: u32,
}

impl FrameClock {
    /// Create a clock for the given frame rate. A zero rate is treated as 1.
    pub fn new(fps: u32) -> Self {
        Self { fps: fps.max(1) }
    }

    pub fn fps(&self) -> u32 {
        self.fps
    }

    /// Duration of one frame in seconds.
    pub fn frame_interval_secs(&self) -> f64 {
        1.0 / self.fps as f64
    }

    /// Whole frames that fit in a duration.
    pub fn whole_frames(&self, secs: f64) -> u64 {
        // Absorb float error so 0.3 s at 30 fps is 9 frames, not 8.
        (secs.max(0.0) * self.fps as f64 + 1e-6).floor() as u64
    }

    pub fn frames_to_secs(&self, frames: u64) -> f64 {
        frames as f64 / self.fps as f64
    }

    /// Longest whole-frame duration that does not exceed `secs`.
    pub fn floor_to_frame(&self, secs: f64) -> f64 {
        self.frames_to_secs(self.whole_frames(secs))
    }
}

/// Drift between an expected and a measured duration.
#[derive(Debug, Clone, Copy)]
pub struct DriftMeasurement {
    /// Duration the plan predicted (seconds).
    pub expected_secs: f64,
    /// Duration actually measured (seconds).
    pub measured_secs: f64,
}

impl DriftMeasurement {
    pub fn new(expected_secs: f64, measured_secs: f64) -> Self {
        Self {
            expected_secs,
            measured_secs,
        }
    }

    /// Drift in seconds (positive = measured is longer).
    pub fn drift_secs(&self) -> f64 {
        self.measured_secs - self.expected_secs
    }

    /// Drift in milliseconds.
    pub fn drift_ms(&self) -> f64 {
        self.drift_secs() * 1000.0
    }

    /// Whether drift exceeds an acceptable threshold.
    pub fn exceeds_secs(&self, tolerance_secs: f64) -> bool {
        // Probed durations are printed with microsecond precision.
        self.drift_secs().abs() > tolerance_secs + 1e-6
    }

    /// Whether the measurement is off by more than one frame at `clock`.
    pub fn exceeds_one_frame(&self, clock: FrameClock) -> bool {
        self.exceeds_secs(clock.frame_interval_secs())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_interval() {
        let clock = FrameClock::new(30);
        assert!((clock.frame_interval_secs() - 0.033_333).abs() < 1e-5);
        assert_eq!(FrameClock::new(0).fps(), 1);
    }

    #[test]
    fn test_secs_frames_conversion() {
        let clock = FrameClock::new(30);
        assert_eq!(clock.whole_frames(1.5), 45);
        assert_eq!(clock.whole_frames(0.3), 9);
        assert_eq!(clock.whole_frames(1.06), 31);
        assert_eq!(clock.whole_frames(-2.0), 0);
        assert!((clock.frames_to_secs(45) - 1.5).abs() < 1e-9);
        assert!((clock.floor_to_frame(0.525) - 0.5).abs() < 1e-9);
        assert!((clock.floor_to_frame(1.0) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_drift_measurement() {
        let drift = DriftMeasurement::new(15.0, 15.02);
        assert!((drift.drift_ms() - 20.0).abs() < 1e-6);
        assert!(!drift.exceeds_one_frame(FrameClock::new(30)));
        assert!(drift.exceeds_one_frame(FrameClock::new(60)));
        assert!(DriftMeasurement::new(10.0, 9.0).exceeds_secs(0.5));
    }

    #[test]
    fn test_exact_one_frame_is_tolerated() {
        let clock = FrameClock::new(30);
        let drift = DriftMeasurement::new(9.0, 9.0 + clock.frame_interval_secs());
        assert!(!drift.exceeds_one_frame(clock));
    }
}
