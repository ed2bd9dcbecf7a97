use proptest::prelude::*;

use reelcut_common::config::DuckingConfig;
use reelcut_processing_core::ducking::DuckingEnvelope;
use reelcut_processing_core::subtitle_layout::SubtitleLayout;
use reelcut_processing_core::timeline::TimelinePlan;
use reelcut_processing_core::voice_activity::TimeRange;
use reelcut_project_model::media::FrameSize;
use reelcut_project_model::request::{SafeTextMargins, TransitionSpec};
use reelcut_project_model::subtitle::SubtitleCue;

fn cue_text() -> impl Strategy<Value = String> {
    prop::collection::vec("[a-zA-Z]{1,18}", 1..60).prop_map(|words| words.join(" "))
}

proptest! {
    #[test]
    fn concatenation_without_transitions_is_associative(
        a in 0.5f64..30.0,
        b in 0.5f64..30.0,
        c in 0.5f64..30.0,
    ) {
        let none = TransitionSpec::none();
        let all = TimelinePlan::build(&[a, b, c], &none, 30);
        let head = TimelinePlan::build(&[a, b], &none, 30);
        let stepwise = TimelinePlan::build(&[head.expected_duration_secs(), c], &none, 30);
        prop_assert!((all.expected_duration_secs() - stepwise.expected_duration_secs()).abs() < 1e-9);
    }

    #[test]
    fn transitions_never_exceed_half_a_neighbour(
        durations in prop::collection::vec(0.2f64..20.0, 1..12),
        requested in 0.0f64..5.0,
    ) {
        let plan = TimelinePlan::build(&durations, &TransitionSpec::crossfade(requested), 30);
        for (idx, overlap) in plan.transitions().iter().enumerate() {
            prop_assert!(*overlap <= durations[idx].min(durations[idx + 1]) / 2.0 + 1e-12);
        }
        let expected = durations.iter().sum::<f64>() - plan.transitions().iter().sum::<f64>();
        prop_assert!((plan.expected_duration_secs() - expected).abs() < 1e-9);
        prop_assert!(plan.clip_starts().windows(2).all(|s| s[1] >= s[0]));
    }

    #[test]
    fn placed_text_stays_inside_safe_zone(
        text in cue_text(),
        top in 0.0f64..0.4,
        bottom in 0.0f64..0.4,
        side in 0.0f64..0.3,
    ) {
        let margins = SafeTextMargins { top, bottom, left: side, right: side };
        let layout = SubtitleLayout::new(FrameSize::VERTICAL_HD, &margins, 0.032);
        let safe = layout.safe_rect();
        if let Some(placed) = layout.layout_cue(&SubtitleCue::new(0.0, 2.0, text)) {
            for line in &placed.lines {
                prop_assert!(safe.contains_rect(&line.region), "{:?} escapes {:?}", line.region, safe);
            }
        }
    }

    #[test]
    fn music_is_quieter_inside_voice_windows(
        start in 0.0f64..20.0,
        len in 0.2f64..10.0,
        volume in 0.05f64..1.0,
    ) {
        let config = DuckingConfig::default();
        let window = TimeRange::new(start, start + len);
        let env = DuckingEnvelope::from_windows(&[window], volume, &config);
        let inside = env.gain_at(start + len / 2.0);
        let outside = env.gain_at(start + len + config.taper_secs + 1.0);
        prop_assert!(inside < outside);
        prop_assert_eq!(env.to_volume_expr(), DuckingEnvelope::from_windows(&[window], volume, &config).to_volume_expr());
    }
}
