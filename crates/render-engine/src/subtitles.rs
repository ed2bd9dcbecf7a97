//! Subtitle rendering.
//!
//! Decides between no subtitles, burned-in text and a soft stream, then
//! applies burn-in clip by clip. Each clip only receives the part of the
//! overlay that falls inside its window on the final timeline, shifted to
//! clip-local time.

use std::path::{Path, PathBuf};

use reelcut_common::config::SubtitleStyle;
use reelcut_common::error::{ReelcutError, ReelcutResult};
use reelcut_processing_core::subtitle_layout::{PlacedCue, SubtitleLayout, TextMetrics};
use reelcut_processing_core::timeline::TimelinePlan;
use reelcut_project_model::media::{FrameSize, Rect};
use reelcut_project_model::request::SafeTextMargins;
use reelcut_project_model::subtitle::SubtitleTrack;

use crate::executor::{BurnTextRequest, MediaExecutor, ToolProgress};
use crate::graph::DrawText;
use crate::model_error;
use crate::workspace::JobWorkspace;

/// Timed, placed text for burn-in.
#[derive(Debug, Clone, PartialEq)]
pub struct OverlayPlan {
    cues: Vec<PlacedCue>,
    metrics: TextMetrics,
    safe: Rect,
}

impl OverlayPlan {
    pub fn new(cues: Vec<PlacedCue>, metrics: TextMetrics, safe: Rect) -> Self {
        Self { cues, metrics, safe }
    }

    pub fn cues(&self) -> &[PlacedCue] {
        &self.cues
    }

    pub fn metrics(&self) -> TextMetrics {
        self.metrics
    }

    /// Region every rendered line is kept inside.
    pub fn safe_rect(&self) -> Rect {
        self.safe
    }

    pub fn is_empty(&self) -> bool {
        self.cues.is_empty()
    }

    /// The part of the plan visible in `[start, end)`, re-timed so `start` is zero.
    pub fn window(&self, start_secs: f64, end_secs: f64) -> OverlayPlan {
        let cues = self
            .cues
            .iter()
            .filter(|cue| cue.end_secs > start_secs && cue.start_secs < end_secs)
            .map(|cue| PlacedCue {
                start_secs: cue.start_secs.max(start_secs) - start_secs,
                end_secs: cue.end_secs.min(end_secs) - start_secs,
                ..cue.clone()
            })
            .collect();
        OverlayPlan {
            cues,
            metrics: self.metrics,
            safe: self.safe,
        }
    }
}

/// Cues muxed as a separate stream, text untouched.
#[derive(Debug, Clone, PartialEq)]
pub struct SoftSubtitleTrack {
    pub track: SubtitleTrack,
}

impl SoftSubtitleTrack {
    pub fn write_srt(&self, path: &Path) -> ReelcutResult<()> {
        std::fs::write(path, self.track.to_srt())?;
        Ok(())
    }
}

/// Outcome of the subtitle decision.
#[derive(Debug, Clone, PartialEq)]
pub enum SubtitleRendering {
    /// Nothing to show; clips pass through.
    Identity,
    BurnIn(OverlayPlan),
    Soft(SoftSubtitleTrack),
}

/// Clips after the subtitle stage.
#[derive(Debug, Clone)]
pub struct SubtitledClips {
    pub clips: Vec<PathBuf>,
    /// SRT to mux as a soft stream.
    pub soft_track: Option<PathBuf>,
}

pub struct SubtitleRenderer {
    style: SubtitleStyle,
    crf: u8,
}

impl SubtitleRenderer {
    /// `crf` is the quality of re-encoded clips.
    pub fn new(style: SubtitleStyle, crf: u8) -> Self {
        Self { style, crf }
    }

    /// Load the subtitle source and decide how it will be shown.
    pub fn render(
        &self,
        source: Option<&Path>,
        burn_in: bool,
        margins: &SafeTextMargins,
        frame: FrameSize,
    ) -> ReelcutResult<SubtitleRendering> {
        let Some(path) = source else {
            return Ok(SubtitleRendering::Identity);
        };
        if !path.is_file() {
            return Err(ReelcutError::SubtitleSourceNotFound {
                path: path.to_path_buf(),
            });
        }

        let track = SubtitleTrack::load(path).map_err(model_error)?;
        if track.is_empty() {
            tracing::info!(path = %path.display(), "Subtitle track is empty, passing clips through");
            return Ok(SubtitleRendering::Identity);
        }

        if burn_in {
            let layout = SubtitleLayout::new(frame, margins, self.style.font_size_ratio);
            let cues = layout.layout_track(&track);
            if cues.is_empty() {
                return Ok(SubtitleRendering::Identity);
            }
            tracing::info!(cues = cues.len(), "Prepared burn-in overlay");
            return Ok(SubtitleRendering::BurnIn(OverlayPlan::new(
                cues,
                layout.metrics(),
                layout.safe_rect(),
            )));
        }

        let total = track.len();
        let cues: Vec<_> = track
            .cues
            .into_iter()
            .enumerate()
            .filter(|(index, cue)| {
                if !cue.is_well_formed() {
                    tracing::warn!(index, "Dropping subtitle cue that ends before it starts");
                }
                cue.is_well_formed()
            })
            .map(|(_, cue)| cue)
            .collect();
        tracing::info!(cues = cues.len(), dropped = total - cues.len(), "Prepared soft subtitles");
        if cues.is_empty() {
            return Ok(SubtitleRendering::Identity);
        }
        Ok(SubtitleRendering::Soft(SoftSubtitleTrack {
            track: SubtitleTrack::new(cues),
        }))
    }

    /// `drawtext` nodes for one clip's overlay. Line text goes to files in `dir`.
    pub fn draw_texts(
        &self,
        overlay: &OverlayPlan,
        dir: &Path,
        clip_index: usize,
    ) -> ReelcutResult<Vec<DrawText>> {
        let metrics = overlay.metrics();
        let safe = overlay.safe_rect();
        let mut texts = Vec::new();
        for (cue_index, cue) in overlay.cues().iter().enumerate() {
            for (line_index, line) in cue.lines.iter().enumerate() {
                let text_file =
                    dir.join(format!("clip{clip_index:03}-cue{cue_index:04}-line{line_index}.txt"));
                std::fs::write(&text_file, &line.text)?;
                texts.push(DrawText {
                    text_file,
                    font_file: self.style.font_file.clone(),
                    font_size: metrics.font_size as u32,
                    font_color: self.style.font_color.clone(),
                    border_color: self.style.border_color.clone(),
                    border_width: self.style.border_width,
                    // The width is an estimate; the renderer clamps the
                    // measured line back inside the safe edges.
                    center_x: line.region.x + line.region.width / 2.0,
                    min_x: safe.x,
                    max_x: safe.right(),
                    y: line.region.y + (line.region.height - metrics.font_size) / 2.0,
                    start_secs: cue.start_secs,
                    end_secs: cue.end_secs,
                });
            }
        }
        Ok(texts)
    }

    /// Apply a rendering decision to normalized clips.
    pub async fn apply(
        &self,
        rendering: &SubtitleRendering,
        clips: &[PathBuf],
        timeline: &TimelinePlan,
        executor: &dyn MediaExecutor,
        workspace: &JobWorkspace,
        progress: ToolProgress<'_>,
    ) -> ReelcutResult<SubtitledClips> {
        match rendering {
            SubtitleRendering::Identity => Ok(SubtitledClips {
                clips: clips.to_vec(),
                soft_track: None,
            }),
            SubtitleRendering::Soft(track) => {
                let path = workspace.file("subtitles.srt");
                track.write_srt(&path)?;
                Ok(SubtitledClips {
                    clips: clips.to_vec(),
                    soft_track: Some(path),
                })
            }
            SubtitleRendering::BurnIn(overlay) => {
                let dir = workspace.stage_dir("subtitles")?;
                let count = clips.len().max(1) as f64;
                let mut burned = Vec::with_capacity(clips.len());
                for (idx, clip) in clips.iter().enumerate() {
                    let Some(window) = timeline.clip_window(idx) else {
                        burned.push(clip.clone());
                        continue;
                    };
                    let local = overlay.window(window.start_secs, window.end_secs);
                    if local.is_empty() {
                        burned.push(clip.clone());
                        continue;
                    }

                    let texts = self.draw_texts(&local, &dir, idx)?;
                    let output = dir.join(format!("clip-{idx:03}.mp4"));
                    tracing::debug!(clip = idx, cues = local.cues().len(), lines = texts.len(), "Burning subtitles");
                    let report = |fraction: f64| progress((idx as f64 + fraction) / count);
                    executor
                        .burn_text(
                            &BurnTextRequest {
                                input: clip.clone(),
                                output: output.clone(),
                                texts,
                                crf: self.crf,
                                duration_secs: window.duration_secs(),
                            },
                            &report,
                        )
                        .await?;
                    burned.push(output);
                }
                Ok(SubtitledClips {
                    clips: burned,
                    soft_track: None,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reelcut_processing_core::subtitle_layout::PlacedLine;

    fn placed(start: f64, end: f64) -> PlacedCue {
        PlacedCue {
            start_secs: start,
            end_secs: end,
            lines: vec![PlacedLine {
                text: "hello".into(),
                region: Rect::new(100.0, 1400.0, 200.0, 80.0),
            }],
            truncated: false,
        }
    }

    fn metrics() -> TextMetrics {
        TextMetrics::for_frame(FrameSize::VERTICAL_HD, 0.032)
    }

    fn safe() -> Rect {
        SafeTextMargins::default().safe_rect(FrameSize::VERTICAL_HD)
    }

    #[test]
    fn test_window_slices_and_shifts() {
        let plan = OverlayPlan::new(
            vec![placed(1.0, 2.0), placed(4.5, 5.5), placed(7.0, 8.0)],
            metrics(),
            safe(),
        );
        let second = plan.window(5.0, 10.0);
        assert_eq!(second.cues().len(), 2);
        assert_eq!(second.cues()[0].start_secs, 0.0);
        assert_eq!(second.cues()[0].end_secs, 0.5);
        assert_eq!(second.cues()[1].start_secs, 2.0);
        assert_eq!(second.cues()[1].end_secs, 3.0);
        assert!(plan.window(2.0, 4.5).is_empty());
    }

    #[test]
    fn test_missing_source_is_reported() {
        let renderer = SubtitleRenderer::new(SubtitleStyle::default(), 16);
        let err = renderer
            .render(
                Some(Path::new("/definitely/not/here.srt")),
                true,
                &SafeTextMargins::default(),
                FrameSize::VERTICAL_HD,
            )
            .unwrap_err();
        assert!(matches!(err, ReelcutError::SubtitleSourceNotFound { .. }));
    }

    #[test]
    fn test_no_source_or_empty_track_is_identity() {
        let renderer = SubtitleRenderer::new(SubtitleStyle::default(), 16);
        let margins = SafeTextMargins::default();
        assert_eq!(
            renderer.render(None, true, &margins, FrameSize::VERTICAL_HD).unwrap(),
            SubtitleRendering::Identity
        );

        let dir = tempfile::tempdir().unwrap();
        let empty = dir.path().join("empty.srt");
        std::fs::write(&empty, "").unwrap();
        assert_eq!(
            renderer
                .render(Some(&empty), true, &margins, FrameSize::VERTICAL_HD)
                .unwrap(),
            SubtitleRendering::Identity
        );
    }

    #[test]
    fn test_burn_in_drops_inverted_cues() {
        let dir = tempfile::tempdir().unwrap();
        let srt = dir.path().join("subs.srt");
        std::fs::write(
            &srt,
            "1\n00:00:01,000 --> 00:00:02,000\nOne\n\n2\n00:00:05,000 --> 00:00:04,000\nBad\n\n3\n00:00:06,000 --> 00:00:07,000\nThree\n",
        )
        .unwrap();
        let renderer = SubtitleRenderer::new(SubtitleStyle::default(), 16);
        let rendering = renderer
            .render(Some(&srt), true, &SafeTextMargins::default(), FrameSize::VERTICAL_HD)
            .unwrap();
        let SubtitleRendering::BurnIn(plan) = rendering else {
            panic!("expected burn-in");
        };
        assert_eq!(plan.cues().len(), 2);
    }

    #[test]
    fn test_soft_keeps_text_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let srt = dir.path().join("subs.srt");
        std::fs::write(&srt, "1\n00:00:01,000 --> 00:00:02,000\n<i>Styled</i> text\n").unwrap();
        let renderer = SubtitleRenderer::new(SubtitleStyle::default(), 16);
        let rendering = renderer
            .render(Some(&srt), false, &SafeTextMargins::default(), FrameSize::VERTICAL_HD)
            .unwrap();
        let SubtitleRendering::Soft(soft) = rendering else {
            panic!("expected soft subtitles");
        };
        assert_eq!(soft.track.cues[0].text, "<i>Styled</i> text");
    }

    #[test]
    fn test_draw_texts_writes_line_files() {
        let dir = tempfile::tempdir().unwrap();
        let renderer = SubtitleRenderer::new(SubtitleStyle::default(), 16);
        let plan = OverlayPlan::new(vec![placed(0.5, 1.5)], metrics(), safe());
        let texts = renderer.draw_texts(&plan, dir.path(), 2).unwrap();
        assert_eq!(texts.len(), 1);
        assert_eq!(std::fs::read_to_string(&texts[0].text_file).unwrap(), "hello");
        assert_eq!(texts[0].center_x, 200.0);
        assert_eq!(texts[0].start_secs, 0.5);
    }

    #[test]
    fn test_draw_texts_clamp_to_safe_edges() {
        let dir = tempfile::tempdir().unwrap();
        let srt = dir.path().join("shout.srt");
        std::fs::write(&srt, "1\n00:00:00,000 --> 00:00:02,000\nWOW WHAT A MOMENT WE\n").unwrap();
        let renderer = SubtitleRenderer::new(SubtitleStyle::default(), 16);
        let SubtitleRendering::BurnIn(plan) = renderer
            .render(Some(&srt), true, &SafeTextMargins::default(), FrameSize::VERTICAL_HD)
            .unwrap()
        else {
            panic!("expected burn-in");
        };
        let safe = plan.safe_rect();
        let texts = renderer.draw_texts(&plan, dir.path(), 0).unwrap();
        assert!(texts.len() > 1, "caps line should wrap");
        for text in &texts {
            assert_eq!(text.min_x, safe.x);
            assert_eq!(text.max_x, safe.right());
            let node = crate::graph::Filter::DrawText(text.clone()).to_string();
            assert!(node.contains(&format!(
                "x='max({:.1},min({:.1}-text_w,",
                safe.x,
                safe.right()
            )));
        }
    }
}
