//! Energy-based voice activity detection.
//!
//! The voice track is split into short frames; a frame is speech when its
//! RMS level is above the silence threshold. Speech frames are grouped into
//! windows, short pauses are bridged, and short blips are discarded.

use reelcut_common::config::DuckingConfig;
use serde::{Deserialize, Serialize};

/// Level reported for digital silence.
const FLOOR_DB: f64 = -120.0;

/// A half-open time interval `[start, end)` in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimeRange {
    pub start_secs: f64,
    pub end_secs: f64,
}

impl TimeRange {
    pub fn new(start_secs: f64, end_secs: f64) -> Self {
        Self {
            start_secs,
            end_secs,
        }
    }

    pub fn duration_secs(&self) -> f64 {
        (self.end_secs - self.start_secs).max(0.0)
    }

    pub fn contains(&self, t: f64) -> bool {
        t >= self.start_secs && t < self.end_secs
    }
}

/// Detector parameters.
#[derive(Debug, Clone)]
pub struct VadConfig {
    /// Analysis frame length.
    pub frame_secs: f64,

    /// RMS level (dBFS) a frame must exceed to count as speech.
    pub threshold_db: f64,

    /// Pauses shorter than this are bridged.
    pub min_silence_secs: f64,

    /// Windows shorter than this (after bridging) are discarded.
    pub min_speech_secs: f64,
}

impl Default for VadConfig {
    fn default() -> Self {
        Self::from(&DuckingConfig::default())
    }
}

impl From<&DuckingConfig> for VadConfig {
    fn from(config: &DuckingConfig) -> Self {
        Self {
            frame_secs: 0.02,
            threshold_db: config.silence_threshold_db,
            min_silence_secs: config.min_silence_secs,
            min_speech_secs: config.min_speech_secs,
        }
    }
}

/// Finds speech windows in mono PCM.
pub struct VoiceActivityDetector {
    config: VadConfig,
}

impl VoiceActivityDetector {
    pub fn new(config: VadConfig) -> Self {
        Self { config }
    }

    fn frame_len(&self, sample_rate: u32) -> usize {
        ((sample_rate as f64 * self.config.frame_secs).round() as usize).max(1)
    }

    /// RMS level of each analysis frame in dBFS.
    pub fn frame_levels_db(&self, samples: &[f32], sample_rate: u32) -> Vec<f64> {
        samples
            .chunks(self.frame_len(sample_rate))
            .map(|frame| {
                let energy: f64 = frame.iter().map(|&s| (s as f64) * (s as f64)).sum();
                let rms = (energy / frame.len() as f64).sqrt();
                if rms > 0.0 {
                    (20.0 * rms.log10()).max(FLOOR_DB)
                } else {
                    FLOOR_DB
                }
            })
            .collect()
    }

    /// Speech windows, sorted and non-overlapping.
    pub fn detect(&self, samples: &[f32], sample_rate: u32) -> Vec<TimeRange> {
        if samples.is_empty() || sample_rate == 0 {
            return Vec::new();
        }

        let frame_len = self.frame_len(sample_rate);
        let total_secs = samples.len() as f64 / sample_rate as f64;
        let frame_time = |idx: usize| ((idx * frame_len) as f64 / sample_rate as f64).min(total_secs);

        let levels = self.frame_levels_db(samples, sample_rate);
        let mut raw = Vec::new();
        let mut run_start: Option<usize> = None;
        for (idx, level) in levels.iter().enumerate() {
            let active = *level > self.config.threshold_db;
            match (active, run_start) {
                (true, None) => run_start = Some(idx),
                (false, Some(start)) => {
                    raw.push(TimeRange::new(frame_time(start), frame_time(idx)));
                    run_start = None;
                }
                _ => {}
            }
        }
        if let Some(start) = run_start {
            raw.push(TimeRange::new(frame_time(start), total_secs));
        }

        let merged = merge_close(raw, self.config.min_silence_secs);
        let windows: Vec<TimeRange> = merged
            .into_iter()
            .filter(|w| w.duration_secs() >= self.config.min_speech_secs)
            .collect();

        tracing::debug!(
            frames = levels.len(),
            windows = windows.len(),
            speech_secs = windows.iter().map(TimeRange::duration_secs).sum::<f64>(),
            "Voice activity detected"
        );
        windows
    }
}

/// Merge sorted ranges whose gap is smaller than `max_gap_secs`.
pub fn merge_close(ranges: Vec<TimeRange>, max_gap_secs: f64) -> Vec<TimeRange> {
    let mut merged: Vec<TimeRange> = Vec::with_capacity(ranges.len());
    for range in ranges {
        match merged.last_mut() {
            Some(last) if range.start_secs - last.end_secs < max_gap_secs => {
                last.end_secs = last.end_secs.max(range.end_secs);
            }
            _ => merged.push(range),
        }
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;

    const RATE: u32 = 8_000;

    /// Silence with a 440 Hz tone at -6 dBFS over each `(start, end)` span.
    fn synth(total_secs: f64, tones: &[(f64, f64)]) -> Vec<f32> {
        let n = (total_secs * RATE as f64) as usize;
        (0..n)
            .map(|i| {
                let t = i as f64 / RATE as f64;
                if tones.iter().any(|&(s, e)| t >= s && t < e) {
                    (0.5 * (2.0 * std::f64::consts::PI * 440.0 * t).sin()) as f32
                } else {
                    0.0
                }
            })
            .collect()
    }

    #[test]
    fn test_silence_has_no_windows() {
        let detector = VoiceActivityDetector::new(VadConfig::default());
        assert!(detector.detect(&synth(3.0, &[]), RATE).is_empty());
        assert!(detector.detect(&[], RATE).is_empty());
    }

    #[test]
    fn test_single_tone_window() {
        let detector = VoiceActivityDetector::new(VadConfig::default());
        let windows = detector.detect(&synth(8.0, &[(1.0, 6.0)]), RATE);
        assert_eq!(windows.len(), 1);
        assert!((windows[0].start_secs - 1.0).abs() <= 0.02);
        assert!((windows[0].end_secs - 6.0).abs() <= 0.02);
    }

    #[test]
    fn test_short_pause_is_bridged() {
        let detector = VoiceActivityDetector::new(VadConfig::default());
        let windows = detector.detect(&synth(4.0, &[(0.5, 1.5), (1.6, 2.5)]), RATE);
        assert_eq!(windows.len(), 1);
    }

    #[test]
    fn test_long_pause_splits_and_blips_are_dropped() {
        let detector = VoiceActivityDetector::new(VadConfig::default());
        let windows = detector.detect(
            &synth(6.0, &[(0.5, 1.5), (2.5, 3.5), (5.0, 5.04)]),
            RATE,
        );
        assert_eq!(windows.len(), 2);
    }

    #[test]
    fn test_levels_of_known_signal() {
        let detector = VoiceActivityDetector::new(VadConfig::default());
        let levels = detector.frame_levels_db(&vec![0.5f32; 160], RATE);
        assert_eq!(levels.len(), 1);
        assert!((levels[0] - 20.0 * 0.5f64.log10()).abs() < 1e-6);
    }

    #[test]
    fn test_detection_is_deterministic() {
        let detector = VoiceActivityDetector::new(VadConfig::default());
        let samples = synth(5.0, &[(0.3, 2.0), (3.0, 4.2)]);
        assert_eq!(detector.detect(&samples, RATE), detector.detect(&samples, RATE));
    }
}
