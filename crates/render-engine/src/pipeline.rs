//! Job orchestration.
//!
//! A job moves through a fixed sequence of states, one stage per
//! transition:
//!
//! ```text
//! Initialized ─Geometry─▶ GeometryNormalized ─Subtitles─▶ SubtitlesApplied
//!   ─AudioMix─▶ AudioMixed ─Concatenate─▶ Concatenated ─Encode─▶ Encoded ─▶ Completed
//! ```
//!
//! `Failed` is reachable from every non-terminal state. Each stage runs
//! under the configured timeout and races the job's cancellation token.
//! Whatever the outcome, the job workspace is removed before `produce`
//! returns.

use std::fmt;
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;

use reelcut_common::config::EngineConfig;
use reelcut_common::error::{ReelcutError, ReelcutResult};
use reelcut_processing_core::geometry::GeometryTransform;
use reelcut_processing_core::timeline::TimelinePlan;
use reelcut_project_model::media::Segment;
use reelcut_project_model::output::FinalVideo;
use reelcut_project_model::request::PostProductionConfig;

use crate::audio::{AudioMixer, MixedAudio};
use crate::concat::{AssembledTimeline, SegmentConcatenator};
use crate::encode::{EncodeInputs, FinalEncoder};
use crate::executor::{MediaExecutor, ScaleCropRequest};
use crate::ffmpeg::FfmpegExecutor;
use crate::model_error;
use crate::subtitles::{SubtitleRenderer, SubtitledClips};
use crate::workspace::JobWorkspace;

/// Where a job is in the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub enum PipelineState {
    Initialized,
    GeometryNormalized,
    SubtitlesApplied,
    AudioMixed,
    Concatenated,
    Encoded,
    Completed,
    Failed,
}

impl PipelineState {
    /// The only state a successful step may lead to.
    pub fn next(self) -> Option<Self> {
        match self {
            Self::Initialized => Some(Self::GeometryNormalized),
            Self::GeometryNormalized => Some(Self::SubtitlesApplied),
            Self::SubtitlesApplied => Some(Self::AudioMixed),
            Self::AudioMixed => Some(Self::Concatenated),
            Self::Concatenated => Some(Self::Encoded),
            Self::Encoded => Some(Self::Completed),
            Self::Completed | Self::Failed => None,
        }
    }

    /// Move to `to` if that is a legal transition.
    pub fn advance(self, to: Self) -> Option<Self> {
        if self.is_terminal() {
            return None;
        }
        if to == Self::Failed || self.next() == Some(to) {
            Some(to)
        } else {
            None
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// Stage that runs to leave this state.
    pub fn stage(self) -> Option<Stage> {
        match self {
            Self::Initialized => Some(Stage::Geometry),
            Self::GeometryNormalized => Some(Stage::Subtitles),
            Self::SubtitlesApplied => Some(Stage::AudioMix),
            Self::AudioMixed => Some(Stage::Concatenate),
            Self::Concatenated => Some(Stage::Encode),
            Self::Encoded | Self::Completed | Self::Failed => None,
        }
    }
}

/// Unit of work a failure is attributed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub enum Stage {
    /// Validation, input checks and segment probing.
    Prepare,
    Geometry,
    Subtitles,
    AudioMix,
    Concatenate,
    Encode,
}

impl Stage {
    pub const ALL: [Stage; 6] = [
        Stage::Prepare,
        Stage::Geometry,
        Stage::Subtitles,
        Stage::AudioMix,
        Stage::Concatenate,
        Stage::Encode,
    ];

    /// Share of the whole job's progress bar.
    fn weight(self) -> f64 {
        match self {
            Stage::Prepare => 0.02,
            Stage::Geometry => 0.30,
            Stage::Subtitles => 0.15,
            Stage::AudioMix => 0.10,
            Stage::Concatenate => 0.18,
            Stage::Encode => 0.25,
        }
    }

    /// Overall progress when this stage is `fraction` done.
    fn overall(self, fraction: f64) -> f64 {
        let done: f64 = Stage::ALL
            .iter()
            .take_while(|s| **s != self)
            .map(|s| s.weight())
            .sum();
        (done + self.weight() * fraction.clamp(0.0, 1.0)).min(1.0)
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Prepare => "prepare",
            Stage::Geometry => "geometry",
            Stage::Subtitles => "subtitles",
            Stage::AudioMix => "audio mix",
            Stage::Concatenate => "concatenate",
            Stage::Encode => "encode",
        };
        f.write_str(name)
    }
}

/// A failed job: the stage it failed in and the original error.
#[derive(Debug, thiserror::Error)]
#[error("{stage} stage failed: {source}")]
pub struct JobError {
    pub stage: Stage,
    #[source]
    pub source: ReelcutError,
}

impl JobError {
    pub fn new(stage: Stage, source: ReelcutError) -> Self {
        Self { stage, source }
    }
}

/// Progress report for a running job.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize)]
pub struct JobProgress {
    pub state: PipelineState,
    /// Stage running (or just finished).
    pub stage: Stage,
    /// Progress within `stage` [0.0, 1.0].
    pub stage_progress: f64,
    /// Progress of the whole job [0.0, 1.0].
    pub overall: f64,
}

/// Progress callback for a job.
pub type ProgressCallback = Arc<dyn Fn(JobProgress) + Send + Sync>;

/// Geometry stage artifact.
#[derive(Debug, Clone)]
struct NormalizedClips {
    clips: Vec<PathBuf>,
    plan: TimelinePlan,
}

/// Runs post-production jobs.
pub struct PostProductionOrchestrator {
    executor: Arc<dyn MediaExecutor>,
    config: EngineConfig,
    stage_timeout: Duration,
    progress: Option<ProgressCallback>,
}

impl PostProductionOrchestrator {
    pub fn new(executor: Arc<dyn MediaExecutor>, config: EngineConfig) -> Self {
        let stage_timeout = Duration::from_secs(config.stage_timeout_secs);
        Self {
            executor,
            config,
            stage_timeout,
            progress: None,
        }
    }

    /// Orchestrator backed by the configured `ffmpeg`/`ffprobe`.
    pub fn with_ffmpeg(config: EngineConfig) -> Self {
        let executor = Arc::new(FfmpegExecutor::new(&config.tools));
        Self::new(executor, config)
    }

    pub fn on_progress(mut self, callback: ProgressCallback) -> Self {
        self.progress = Some(callback);
        self
    }

    /// Override the per-stage timeout from the config.
    pub fn with_stage_timeout(mut self, timeout: Duration) -> Self {
        self.stage_timeout = timeout;
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Run one job to completion.
    ///
    /// On success the verified video sits at `job.output_path`. On failure
    /// nothing is left there and the error names the failing stage.
    pub async fn produce(
        &self,
        job: &PostProductionConfig,
        cancel: CancellationToken,
    ) -> Result<FinalVideo, JobError> {
        let started = Instant::now();
        tracing::info!(
            segments = job.segments.len(),
            output = %job.output_path.display(),
            burn_in = job.burn_in_subtitles,
            transition = ?job.transition.kind,
            executor = self.executor.name(),
            "Starting post-production job"
        );

        let output_existed = job.output_path.exists();
        let workspace = JobWorkspace::create(&self.config.workspace_root())
            .map_err(|e| JobError::new(Stage::Prepare, e))?;
        let job_id = workspace.id();

        let mut state = PipelineState::Initialized;
        let result = self.run(job, &workspace, &cancel, &mut state).await;
        if result.is_err() {
            self.fail(&mut state);
        }

        if let Err(e) = workspace.close() {
            tracing::warn!(%job_id, error = %e, "Failed to remove job workspace");
        }

        match result {
            Ok(video) => {
                tracing::info!(
                    %job_id,
                    output = %video.path.display(),
                    duration_secs = video.duration_secs,
                    elapsed_secs = started.elapsed().as_secs_f64(),
                    "Post-production job completed"
                );
                Ok(video)
            }
            Err(err) => {
                if !output_existed && job.output_path.exists() {
                    if let Err(e) = std::fs::remove_file(&job.output_path) {
                        tracing::warn!(
                            path = %job.output_path.display(),
                            error = %e,
                            "Failed to remove partial output"
                        );
                    }
                }
                self.report(state, err.stage, 0.0);
                tracing::error!(
                    %job_id,
                    state = ?state,
                    stage = %err.stage,
                    kind = err.source.kind(),
                    error = %err.source,
                    "Post-production job failed"
                );
                Err(err)
            }
        }
    }

    async fn run(
        &self,
        job: &PostProductionConfig,
        workspace: &JobWorkspace,
        cancel: &CancellationToken,
        state: &mut PipelineState,
    ) -> Result<FinalVideo, JobError> {
        let executor = self.executor.as_ref();
        let encoding = &self.config.encoding;
        self.report(*state, Stage::Prepare, 0.0);
        if cancel.is_cancelled() {
            return Err(JobError::new(Stage::Prepare, ReelcutError::Cancelled));
        }

        job.validate()
            .map_err(|e| JobError::new(Stage::Prepare, model_error(e)))?;
        check_inputs(job)?;
        let segments = self
            .run_stage(Stage::Prepare, cancel, self.probe_segments(job))
            .await?;
        self.report(*state, Stage::Prepare, 1.0);

        let normalized = self
            .run_stage(
                Stage::Geometry,
                cancel,
                self.normalize(job, &segments, workspace),
            )
            .await?;
        self.enter(state, PipelineState::GeometryNormalized, Stage::Geometry)?;

        let current = *state;
        let renderer = SubtitleRenderer::new(self.config.subtitles.clone(), encoding.intermediate_crf);
        let subtitled: SubtitledClips = self
            .run_stage(Stage::Subtitles, cancel, async {
                let rendering = renderer.render(
                    job.subtitles.as_deref(),
                    job.burn_in_subtitles,
                    &job.margins,
                    job.frame_size,
                )?;
                let progress = |f: f64| self.report(current, Stage::Subtitles, f);
                renderer
                    .apply(
                        &rendering,
                        &normalized.clips,
                        &normalized.plan,
                        executor,
                        workspace,
                        &progress,
                    )
                    .await
            })
            .await?;
        self.enter(state, PipelineState::SubtitlesApplied, Stage::Subtitles)?;

        let current = *state;
        let duration_secs = normalized.plan.expected_duration_secs();
        let mixer = AudioMixer::new(self.config.ducking.clone(), encoding.audio_sample_rate);
        let mixed: MixedAudio = self
            .run_stage(Stage::AudioMix, cancel, async {
                let progress = |f: f64| self.report(current, Stage::AudioMix, f);
                mixer
                    .mix(&job.audio, duration_secs, executor, workspace, &progress)
                    .await
            })
            .await?;
        self.enter(state, PipelineState::AudioMixed, Stage::AudioMix)?;

        let current = *state;
        let concatenator = SegmentConcatenator::new(encoding.intermediate_crf);
        let assembled: AssembledTimeline = self
            .run_stage(Stage::Concatenate, cancel, async {
                let progress = |f: f64| self.report(current, Stage::Concatenate, f);
                concatenator
                    .concatenate(
                        &subtitled.clips,
                        &normalized.plan,
                        executor,
                        workspace,
                        &progress,
                    )
                    .await
            })
            .await?;
        self.enter(state, PipelineState::Concatenated, Stage::Concatenate)?;

        let current = *state;
        let encoder = FinalEncoder::new(encoding.clone());
        let video = self
            .run_stage(Stage::Encode, cancel, async {
                let progress = |f: f64| self.report(current, Stage::Encode, f);
                let inputs = EncodeInputs {
                    video: &assembled.path,
                    audio: &mixed.path,
                    soft_subtitles: subtitled.soft_track.as_deref(),
                    expected_duration_secs: duration_secs,
                };
                encoder.encode(job, inputs, executor, &progress).await
            })
            .await?;
        self.enter(state, PipelineState::Encoded, Stage::Encode)?;
        // The verified file is at the output path.
        self.enter(state, PipelineState::Completed, Stage::Encode)?;

        Ok(video)
    }

    async fn probe_segments(&self, job: &PostProductionConfig) -> ReelcutResult<Vec<Segment>> {
        let mut segments = Vec::with_capacity(job.segments.len());
        for path in &job.segments {
            let info = self.executor.probe(path).await?;
            let segment = info.as_segment().ok_or_else(|| {
                ReelcutError::probe(format!("{} has no video stream", path.display()))
            })?;
            tracing::debug!(
                path = %path.display(),
                size = %segment.frame_size,
                duration_secs = segment.duration_secs,
                fps = segment.fps,
                "Probed segment"
            );
            segments.push(segment);
        }
        Ok(segments)
    }

    /// Scale and crop every segment to the target frame.
    async fn normalize(
        &self,
        job: &PostProductionConfig,
        segments: &[Segment],
        workspace: &JobWorkspace,
    ) -> ReelcutResult<NormalizedClips> {
        // Reject bad geometry before any clip is encoded.
        let transforms = segments
            .iter()
            .map(|s| GeometryTransform::compute(s.frame_size, job.frame_size, job.fps))
            .collect::<ReelcutResult<Vec<_>>>()?;

        let dir = workspace.stage_dir("geometry")?;
        let count = segments.len().max(1) as f64;
        let mut clips = Vec::with_capacity(segments.len());
        let mut durations = Vec::with_capacity(segments.len());
        for (idx, (segment, transform)) in segments.iter().zip(transforms).enumerate() {
            let output = dir.join(format!("clip-{idx:03}.mp4"));
            tracing::debug!(
                clip = idx,
                source = %segment.frame_size,
                scaled = %transform.scaled,
                crop_x = transform.crop_x,
                crop_y = transform.crop_y,
                overscan = transform.overscan_ratio(),
                passthrough = transform.is_identity(),
                "Normalizing segment"
            );
            let report =
                |f: f64| self.report(PipelineState::Initialized, Stage::Geometry, (idx as f64 + f) / count);
            self.executor
                .scale_crop(
                    &ScaleCropRequest {
                        input: segment.path.clone(),
                        output: output.clone(),
                        transform,
                        crf: self.config.encoding.intermediate_crf,
                        duration_secs: segment.duration_secs,
                    },
                    &report,
                )
                .await?;
            let probed = self.executor.probe(&output).await?;
            durations.push(probed.duration_secs);
            clips.push(output);
        }

        let plan = TimelinePlan::build(&durations, &job.transition, job.fps);
        Ok(NormalizedClips { clips, plan })
    }

    /// Run one stage under the timeout, racing cancellation.
    async fn run_stage<T, F>(
        &self,
        stage: Stage,
        cancel: &CancellationToken,
        work: F,
    ) -> Result<T, JobError>
    where
        F: Future<Output = ReelcutResult<T>>,
    {
        if cancel.is_cancelled() {
            return Err(JobError::new(stage, ReelcutError::Cancelled));
        }
        let started = Instant::now();
        tracing::info!(%stage, "Stage started");

        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(ReelcutError::Cancelled),
            result = tokio::time::timeout(self.stage_timeout, work) => match result {
                Ok(result) => result,
                Err(_) => Err(ReelcutError::Timeout {
                    after_secs: self.stage_timeout.as_secs(),
                }),
            },
        };

        match outcome {
            Ok(value) => {
                tracing::info!(
                    %stage,
                    elapsed_secs = started.elapsed().as_secs_f64(),
                    "Stage finished"
                );
                Ok(value)
            }
            Err(source) => Err(JobError::new(stage, source)),
        }
    }

    /// Move to `to` after `stage` succeeded.
    fn enter(
        &self,
        state: &mut PipelineState,
        to: PipelineState,
        stage: Stage,
    ) -> Result<(), JobError> {
        let Some(next) = state.advance(to) else {
            tracing::error!(from = ?*state, to = ?to, %stage, "Illegal pipeline transition");
            return Err(JobError::new(
                stage,
                ReelcutError::IllegalTransition {
                    from: format!("{:?}", *state),
                    to: format!("{to:?}"),
                },
            ));
        };
        tracing::debug!(from = ?*state, to = ?next, "Pipeline state changed");
        *state = next;
        self.report(next, stage, 1.0);
        Ok(())
    }

    /// Record a failure. Terminal states stay as they are.
    fn fail(&self, state: &mut PipelineState) {
        match state.advance(PipelineState::Failed) {
            Some(failed) => {
                tracing::debug!(from = ?*state, "Pipeline state changed to Failed");
                *state = failed;
            }
            None => tracing::warn!(state = ?*state, "Failure reported after the job ended"),
        }
    }

    fn report(&self, state: PipelineState, stage: Stage, stage_progress: f64) {
        if let Some(cb) = &self.progress {
            let stage_progress = stage_progress.clamp(0.0, 1.0);
            let overall = if state == PipelineState::Completed {
                1.0
            } else {
                stage.overall(stage_progress)
            };
            cb(JobProgress {
                state,
                stage,
                stage_progress,
                overall,
            });
        }
    }
}

/// Check every input path before any tool runs. A missing file is
/// attributed to the stage that would have consumed it.
pub fn check_inputs(job: &PostProductionConfig) -> Result<(), JobError> {
    for path in &job.segments {
        if !path.is_file() {
            return Err(JobError::new(
                Stage::Geometry,
                ReelcutError::SegmentNotFound { path: path.clone() },
            ));
        }
    }
    if let Some(path) = &job.subtitles {
        if !path.is_file() {
            return Err(JobError::new(
                Stage::Subtitles,
                ReelcutError::SubtitleSourceNotFound { path: path.clone() },
            ));
        }
    }
    AudioMixer::check_sources(&job.audio).map_err(|e| JobError::new(Stage::AudioMix, e))
}
