//! Run a post-production job.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use reelcut_common::config::EngineConfig;
use reelcut_project_model::request::PostProductionConfig;
use reelcut_render_engine::{JobProgress, PostProductionOrchestrator};

pub async fn run(
    config: EngineConfig,
    job_path: PathBuf,
    output: Option<PathBuf>,
    json: bool,
) -> anyhow::Result<()> {
    let mut job = PostProductionConfig::load(&job_path)
        .map_err(|e| anyhow::anyhow!("Failed to load job: {e}"))?;
    if let Some(output) = output {
        job.output_path = output;
    }

    // With --json only the result goes to stdout.
    let status = StatusStream::for_output(json);
    for line in describe_job(&job, &job_path) {
        status.line(&line);
    }

    let cancel = CancellationToken::new();
    let ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted, cancelling job");
            ctrl_c.cancel();
        }
    });

    let progress_cb = Arc::new(move |p: JobProgress| status.progress(&progress_line(&p)));

    let orchestrator = PostProductionOrchestrator::with_ffmpeg(config).on_progress(progress_cb);
    match orchestrator.produce(&job, cancel).await {
        Ok(video) => {
            status.line("");
            if json {
                println!("{}", serde_json::to_string_pretty(&video)?);
            } else {
                println!("Done: {}", video.path.display());
                println!(
                    "  {} @ {:.2}fps, {:.2}s, {} bytes",
                    video.frame_size, video.fps, video.duration_secs, video.file_size_bytes
                );
                println!(
                    "  Codecs: {} / {}{}",
                    video.video_codec,
                    video.audio_codec,
                    if video.has_soft_subtitles { " + mov_text" } else { "" }
                );
            }
            Ok(())
        }
        Err(e) => {
            status.line("");
            Err(anyhow::anyhow!(e))
        }
    }
}

/// Where human-readable status text goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StatusStream {
    Stdout,
    Stderr,
}

impl StatusStream {
    fn for_output(json: bool) -> Self {
        if json {
            Self::Stderr
        } else {
            Self::Stdout
        }
    }

    fn line(self, text: &str) {
        match self {
            Self::Stdout => println!("{text}"),
            Self::Stderr => eprintln!("{text}"),
        }
    }

    /// Overwrite the current line.
    fn progress(self, text: &str) {
        let _ = match self {
            Self::Stdout => {
                let mut out = std::io::stdout().lock();
                write!(out, "\r{text}").and_then(|_| out.flush())
            }
            Self::Stderr => {
                let mut err = std::io::stderr().lock();
                write!(err, "\r{text}").and_then(|_| err.flush())
            }
        };
    }
}

fn describe_job(job: &PostProductionConfig, job_path: &Path) -> Vec<String> {
    let mut lines = vec![
        format!("Producing: {}", job_path.display()),
        format!("  Segments: {}", job.segments.len()),
        format!(
            "  Target: {} @ {}fps, {} kbps",
            job.frame_size, job.fps, job.video_bitrate_kbps
        ),
        format!(
            "  Transition: {:?} ({:.2}s)",
            job.transition.kind, job.transition.duration_secs
        ),
    ];
    if let Some(subs) = &job.subtitles {
        let mode = if job.burn_in_subtitles { "burn-in" } else { "soft" };
        lines.push(format!("  Subtitles: {} ({mode})", subs.display()));
    }
    if let Some(music) = &job.audio.music_path {
        lines.push(format!(
            "  Music: {} (volume {:.2}, ducking {})",
            music.display(),
            job.audio.music_volume,
            if job.audio.ducking { "on" } else { "off" }
        ));
    }
    lines.push(format!("  Output: {}", job.output_path.display()));
    lines
}

fn progress_line(p: &JobProgress) -> String {
    format!(
        "  Progress: {:5.1}% ({} {:3.0}%)        ",
        p.overall * 100.0,
        p.stage,
        p.stage_progress * 100.0,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use reelcut_project_model::request::AudioMixSpec;
    use reelcut_render_engine::{PipelineState, Stage};

    #[test]
    fn test_json_mode_keeps_status_off_stdout() {
        assert_eq!(StatusStream::for_output(true), StatusStream::Stderr);
        assert_eq!(StatusStream::for_output(false), StatusStream::Stdout);
    }

    #[test]
    fn test_status_text() {
        let job = PostProductionConfig::new(
            vec![PathBuf::from("a.mp4"), PathBuf::from("b.mp4")],
            PathBuf::from("out/final.mp4"),
            AudioMixSpec::voice_only("voice.wav"),
        );
        let lines = describe_job(&job, Path::new("job.json"));
        assert_eq!(lines[0], "Producing: job.json");
        assert_eq!(lines[1], "  Segments: 2");
        assert_eq!(lines.last().unwrap(), "  Output: out/final.mp4");

        let line = progress_line(&JobProgress {
            state: PipelineState::AudioMixed,
            stage: Stage::Concatenate,
            stage_progress: 0.5,
            overall: 0.66,
        });
        assert!(line.starts_with("  Progress:  66.0% (concatenate  50%)"));
    }
}
