use reelcut_common::config::DuckingConfig;
use reelcut_common::error::ReelcutError;
use reelcut_processing_core::ducking::DuckingEnvelope;
use reelcut_processing_core::geometry::GeometryTransform;
use reelcut_processing_core::timeline::TimelinePlan;
use reelcut_processing_core::voice_activity::{VadConfig, VoiceActivityDetector};
use reelcut_project_model::media::FrameSize;
use reelcut_project_model::request::TransitionSpec;

const RATE: u32 = 16_000;

/// Eight seconds of mono PCM with speech-like noise between 1 s and 6 s.
fn voice_track() -> Vec<f32> {
    let mut state: u32 = 0x1234_5678;
    (0..8 * RATE as usize)
        .map(|i| {
            let t = i as f64 / RATE as f64;
            state ^= state << 13;
            state ^= state >> 17;
            state ^= state << 5;
            if (1.0..6.0).contains(&t) {
                (state as f32 / u32::MAX as f32 - 0.5) * 0.6
            } else {
                0.0
            }
        })
        .collect()
}

#[test]
fn ducking_follows_voice_between_one_and_six_seconds() {
    let config = DuckingConfig::default();
    let detector = VoiceActivityDetector::new(VadConfig::from(&config));
    let windows = detector.detect(&voice_track(), RATE);
    assert_eq!(windows.len(), 1);

    let env = DuckingEnvelope::from_windows(&windows, 0.5, &config);
    for t in [0.1, 0.5, 6.5, 7.5] {
        assert!((env.gain_at(t) - 0.5).abs() < 1e-9, "t={t}");
    }
    for t in [1.2, 3.0, 5.8] {
        assert!(env.gain_at(t) < 0.5 * 0.31, "t={t}");
    }

    // Same PCM in, identical expression out.
    let again = DuckingEnvelope::from_windows(&detector.detect(&voice_track(), RATE), 0.5, &config);
    assert_eq!(env.to_volume_expr(), again.to_volume_expr());
}

#[test]
fn silent_voice_leaves_music_untouched() {
    let config = DuckingConfig::default();
    let detector = VoiceActivityDetector::new(VadConfig::from(&config));
    let windows = detector.detect(&vec![0.0; 4 * RATE as usize], RATE);
    let env = DuckingEnvelope::from_windows(&windows, 0.7, &config);
    assert!(env.is_flat());
    assert_eq!(env.to_volume_expr(), "0.700000");
}

#[test]
fn one_second_fade_between_two_five_second_clips() {
    let plan = TimelinePlan::build(&[5.0, 5.0], &TransitionSpec::fade(1.0), 30);
    assert!((plan.expected_duration_secs() - 9.0).abs() < 1e-9);
    assert!(plan.verify(10.0).is_err());
    assert!(plan.verify(9.0).is_ok());
}

#[test]
fn tiny_source_is_rejected_for_vertical_hd() {
    let err = GeometryTransform::compute(FrameSize::new(320, 180), FrameSize::VERTICAL_HD, 30)
        .unwrap_err();
    assert!(matches!(err, ReelcutError::UnsupportedGeometry { .. }));
}

#[test]
fn three_landscape_clips_fill_the_vertical_frame() {
    for _ in 0..3 {
        let t = GeometryTransform::compute(FrameSize::new(1920, 1080), FrameSize::VERTICAL_HD, 30)
            .unwrap();
        assert_eq!(t.target, FrameSize::new(1080, 1920));
        assert!(t.crop_x + t.target.width <= t.scaled.width);
    }
    let plan = TimelinePlan::build(&[5.0, 5.0, 5.0], &TransitionSpec::none(), 30);
    assert!(plan.verify(15.0 + 1.0 / 30.0).is_ok());
}
