//! Segment concatenation with drift checking.

use std::path::PathBuf;

use reelcut_common::error::ReelcutResult;
use reelcut_processing_core::timeline::TimelinePlan;

use crate::executor::{ConcatRequest, MediaExecutor, ToolProgress};
use crate::workspace::JobWorkspace;

/// The joined video timeline.
#[derive(Debug, Clone)]
pub struct AssembledTimeline {
    pub path: PathBuf,
    /// Probed duration of `path`.
    pub duration_secs: f64,
}

pub struct SegmentConcatenator {
    crf: u8,
}

impl SegmentConcatenator {
    pub fn new(crf: u8) -> Self {
        Self { crf }
    }

    /// Join `clips` as planned and verify the result is within one frame of
    /// the expected duration. A single clip is returned as is.
    pub async fn concatenate(
        &self,
        clips: &[PathBuf],
        plan: &TimelinePlan,
        executor: &dyn MediaExecutor,
        workspace: &JobWorkspace,
        progress: ToolProgress<'_>,
    ) -> ReelcutResult<AssembledTimeline> {
        if let [single] = clips {
            tracing::debug!(clip = %single.display(), "Single clip, skipping concatenation");
            return Ok(AssembledTimeline {
                path: single.clone(),
                duration_secs: plan.expected_duration_secs(),
            });
        }

        let output = workspace.file("timeline.mp4");
        tracing::info!(
            clips = clips.len(),
            transition = ?plan.kind(),
            expected_secs = plan.expected_duration_secs(),
            "Concatenating clips"
        );
        executor
            .concatenate(
                &ConcatRequest {
                    inputs: clips.to_vec(),
                    output: output.clone(),
                    plan: plan.clone(),
                    crf: self.crf,
                },
                progress,
            )
            .await?;

        let probed = executor.probe(&output).await?;
        plan.verify(probed.duration_secs)?;

        Ok(AssembledTimeline {
            path: output,
            duration_secs: probed.duration_secs,
        })
    }
}
