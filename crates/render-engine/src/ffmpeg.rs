//! ffmpeg / ffprobe implementation of [`MediaExecutor`].

use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use serde::Deserialize;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::process::Command;

use reelcut_common::config::ToolPaths;
use reelcut_common::error::{ReelcutError, ReelcutResult};
use reelcut_project_model::media::FrameSize;

use crate::executor::{
    AudioStreamInfo, BurnTextRequest, ConcatRequest, EncodeRequest, MediaExecutor, MediaInfo,
    MixAudioRequest, ScaleCropRequest, ToolProgress, VideoStreamInfo,
};
use crate::graph::{concat_graph, geometry_chain, mix_graph, overlay_chain};

/// Trailing stderr lines kept in error diagnostics.
const DIAGNOSTIC_LINES: usize = 40;

/// Intermediate clips favour speed; quality comes from the low CRF.
const INTERMEDIATE_PRESET: &str = "veryfast";

/// Runs operations through the ffmpeg command-line tools.
#[derive(Debug, Clone)]
pub struct FfmpegExecutor {
    ffmpeg: PathBuf,
    ffprobe: PathBuf,
}

/// Availability of one external tool.
#[derive(Debug, Clone)]
pub struct ToolCheck {
    pub name: &'static str,
    pub path: PathBuf,
    /// First line of `-version`, `None` when the tool could not run.
    pub version: Option<String>,
}

impl FfmpegExecutor {
    pub fn new(tools: &ToolPaths) -> Self {
        Self {
            ffmpeg: tools.ffmpeg.clone(),
            ffprobe: tools.ffprobe.clone(),
        }
    }

    /// Run `-version` on both tools.
    pub async fn check_tools(&self) -> Vec<ToolCheck> {
        let mut checks = Vec::with_capacity(2);
        for (name, path) in [("ffmpeg", &self.ffmpeg), ("ffprobe", &self.ffprobe)] {
            let version = match Command::new(path)
                .arg("-version")
                .stdin(Stdio::null())
                .kill_on_drop(true)
                .output()
                .await
            {
                Ok(output) if output.status.success() => String::from_utf8_lossy(&output.stdout)
                    .lines()
                    .next()
                    .map(|line| line.trim().to_string()),
                Ok(_) | Err(_) => None,
            };
            checks.push(ToolCheck {
                name,
                path: path.clone(),
                version,
            });
        }
        checks
    }

    /// Run ffmpeg with `-progress pipe:1`, forwarding progress while the
    /// process runs. A non-zero exit is an `Encode` error carrying stderr.
    async fn run_ffmpeg(
        &self,
        args: Vec<String>,
        expected_secs: f64,
        progress: ToolProgress<'_>,
    ) -> ReelcutResult<()> {
        tracing::debug!(args = ?args, "Running ffmpeg");
        let mut cmd = Command::new(&self.ffmpeg);
        cmd.args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let start = std::time::Instant::now();
        let mut child = cmd
            .spawn()
            .map_err(|e| ReelcutError::encode("ffmpeg", "not started", e.to_string()))?;

        tracing::debug!(
            pid = child.id(),
            args_len = args.len(),
            expected_secs,
            "ffmpeg process started"
        );

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| ReelcutError::encode("ffmpeg", "not started", "stdout not captured"))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| ReelcutError::encode("ffmpeg", "not started", "stderr not captured"))?;

        // Drain stderr concurrently to avoid ffmpeg blocking on a full stderr pipe.
        let stderr_task = tokio::spawn(async move {
            let mut reader = BufReader::new(stderr);
            let mut output = String::new();
            match reader.read_to_string(&mut output).await {
                Ok(_) => output,
                Err(err) => format!("<failed to read ffmpeg stderr: {err}>"),
            }
        });

        let mut lines = BufReader::new(stdout).lines();
        let mut state = ProgressState::default();
        let mut last_progress_secs = 0.0f64;
        let mut last_progress_wall = std::time::Instant::now();
        while let Some(line) = lines.next_line().await? {
            let Some((key, value)) = line.trim().split_once('=') else {
                continue;
            };
            state.update(key, value);
            if key != "progress" {
                continue;
            }
            progress(state.fraction(expected_secs));
            if state.out_time_secs > last_progress_secs + 0.001 {
                last_progress_secs = state.out_time_secs;
                last_progress_wall = std::time::Instant::now();
            } else if last_progress_wall.elapsed().as_secs() >= 10 {
                tracing::warn!(
                    out_time_secs = state.out_time_secs,
                    elapsed_secs = start.elapsed().as_secs_f64(),
                    "No ffmpeg progress advancement for 10s"
                );
                last_progress_wall = std::time::Instant::now();
            }
        }

        let status = child.wait().await?;
        let stderr_output = stderr_task
            .await
            .unwrap_or_else(|_| "<failed to join stderr reader>".to_string());

        if !status.success() {
            return Err(ReelcutError::encode(
                "ffmpeg",
                status.to_string(),
                diagnostic_tail(&stderr_output),
            ));
        }

        tracing::debug!(
            elapsed_secs = start.elapsed().as_secs_f64(),
            "ffmpeg finished"
        );
        Ok(())
    }
}

#[async_trait]
impl MediaExecutor for FfmpegExecutor {
    fn name(&self) -> &str {
        "ffmpeg"
    }

    async fn probe(&self, path: &Path) -> ReelcutResult<MediaInfo> {
        let output = Command::new(&self.ffprobe)
            .args([
                "-v",
                "error",
                "-print_format",
                "json",
                "-show_format",
                "-show_streams",
            ])
            .arg(path)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| ReelcutError::encode("ffprobe", "not started", e.to_string()))?;

        if !output.status.success() {
            return Err(ReelcutError::encode(
                "ffprobe",
                output.status.to_string(),
                diagnostic_tail(&String::from_utf8_lossy(&output.stderr)),
            ));
        }

        let parsed: FfprobeOutput = serde_json::from_slice(&output.stdout).map_err(|e| {
            ReelcutError::probe(format!("unreadable ffprobe output for {}: {e}", path.display()))
        })?;
        media_info_from_probe(path, parsed)
    }

    async fn decode_mono_pcm(&self, path: &Path, sample_rate: u32) -> ReelcutResult<Vec<f32>> {
        let args = decode_pcm_args(path, sample_rate);
        tracing::debug!(args = ?args, "Decoding voice for analysis");
        let output = Command::new(&self.ffmpeg)
            .args(&args)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| ReelcutError::encode("ffmpeg", "not started", e.to_string()))?;

        if !output.status.success() {
            return Err(ReelcutError::encode(
                "ffmpeg",
                output.status.to_string(),
                diagnostic_tail(&String::from_utf8_lossy(&output.stderr)),
            ));
        }

        Ok(output
            .stdout
            .chunks_exact(4)
            .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
            .collect())
    }

    async fn scale_crop(
        &self,
        request: &ScaleCropRequest,
        progress: ToolProgress<'_>,
    ) -> ReelcutResult<()> {
        self.run_ffmpeg(scale_crop_args(request), request.duration_secs, progress)
            .await
    }

    async fn burn_text(
        &self,
        request: &BurnTextRequest,
        progress: ToolProgress<'_>,
    ) -> ReelcutResult<()> {
        self.run_ffmpeg(burn_text_args(request), request.duration_secs, progress)
            .await
    }

    async fn mix_audio(
        &self,
        request: &MixAudioRequest,
        progress: ToolProgress<'_>,
    ) -> ReelcutResult<()> {
        self.run_ffmpeg(mix_audio_args(request), request.duration_secs, progress)
            .await
    }

    async fn concatenate(
        &self,
        request: &ConcatRequest,
        progress: ToolProgress<'_>,
    ) -> ReelcutResult<()> {
        self.run_ffmpeg(
            concat_args(request),
            request.plan.expected_duration_secs(),
            progress,
        )
        .await
    }

    async fn encode(
        &self,
        request: &EncodeRequest,
        progress: ToolProgress<'_>,
    ) -> ReelcutResult<()> {
        self.run_ffmpeg(encode_args(request), request.duration_secs, progress)
            .await
    }
}

fn base_args() -> Vec<String> {
    ["-hide_banner", "-nostdin", "-y", "-v", "error"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn progress_args() -> [String; 3] {
    ["-progress".into(), "pipe:1".into(), "-nostats".into()]
}

fn path_arg(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

fn intermediate_video_args(crf: u8) -> Vec<String> {
    vec![
        "-c:v".into(),
        "libx264".into(),
        "-preset".into(),
        INTERMEDIATE_PRESET.into(),
        "-crf".into(),
        crf.to_string(),
        "-pix_fmt".into(),
        "yuv420p".into(),
        "-an".into(),
    ]
}

pub(crate) fn decode_pcm_args(input: &Path, sample_rate: u32) -> Vec<String> {
    let mut args = base_args();
    args.extend([
        "-i".into(),
        path_arg(input),
        "-vn".into(),
        "-ac".into(),
        "1".into(),
        "-ar".into(),
        sample_rate.to_string(),
        "-f".into(),
        "f32le".into(),
        "pipe:1".into(),
    ]);
    args
}

pub(crate) fn scale_crop_args(request: &ScaleCropRequest) -> Vec<String> {
    let mut args = base_args();
    args.extend(["-i".into(), path_arg(&request.input)]);
    args.extend([
        "-vf".into(),
        geometry_chain(&request.transform).to_string(),
    ]);
    args.extend(intermediate_video_args(request.crf));
    args.extend(progress_args());
    args.push(path_arg(&request.output));
    args
}

pub(crate) fn burn_text_args(request: &BurnTextRequest) -> Vec<String> {
    let mut args = base_args();
    args.extend(["-i".into(), path_arg(&request.input)]);
    args.extend(["-vf".into(), overlay_chain(&request.texts).to_string()]);
    args.extend(intermediate_video_args(request.crf));
    args.extend(progress_args());
    args.push(path_arg(&request.output));
    args
}

pub(crate) fn mix_audio_args(request: &MixAudioRequest) -> Vec<String> {
    let mut args = base_args();
    args.extend(["-i".into(), path_arg(&request.voice)]);
    if let Some(music) = &request.music {
        args.extend([
            "-stream_loop".into(),
            "-1".into(),
            "-i".into(),
            path_arg(&music.path),
        ]);
    }
    let graph = mix_graph(
        request.duration_secs,
        request.sample_rate,
        request.music.as_ref().map(|m| m.volume_expr.as_str()),
    );
    args.extend([
        "-filter_complex".into(),
        graph.to_string(),
        "-map".into(),
        "[aout]".into(),
        "-c:a".into(),
        "pcm_s16le".into(),
        "-ar".into(),
        request.sample_rate.to_string(),
        "-ac".into(),
        "2".into(),
    ]);
    args.extend(progress_args());
    args.push(path_arg(&request.output));
    args
}

pub(crate) fn concat_args(request: &ConcatRequest) -> Vec<String> {
    let mut args = base_args();
    for input in &request.inputs {
        args.extend(["-i".into(), path_arg(input)]);
    }
    args.extend([
        "-filter_complex".into(),
        concat_graph(&request.plan).to_string(),
        "-map".into(),
        "[vout]".into(),
    ]);
    args.extend(intermediate_video_args(request.crf));
    args.extend(progress_args());
    args.push(path_arg(&request.output));
    args
}

pub(crate) fn encode_args(request: &EncodeRequest) -> Vec<String> {
    let video_bitrate = request.video_bitrate_kbps.max(1);
    let mut args = base_args();
    args.extend(["-i".into(), path_arg(&request.video)]);
    args.extend(["-i".into(), path_arg(&request.audio)]);
    if let Some(subs) = &request.soft_subtitles {
        args.extend(["-i".into(), path_arg(subs)]);
    }
    args.extend([
        "-map".into(),
        "0:v:0".into(),
        "-map".into(),
        "1:a:0".into(),
    ]);
    if request.soft_subtitles.is_some() {
        args.extend(["-map".into(), "2:s:0".into()]);
    }
    args.extend([
        "-vf".into(),
        format!(
            "scale={w}:{h}:flags=lanczos,fps={fps}:round=near,setsar=1,format=yuv420p",
            w = request.frame_size.width,
            h = request.frame_size.height,
            fps = request.fps,
        ),
        "-c:v".into(),
        "libx264".into(),
        "-preset".into(),
        request.preset.clone(),
        "-profile:v".into(),
        "high".into(),
        "-pix_fmt".into(),
        "yuv420p".into(),
        "-crf".into(),
        request.crf.to_string(),
        "-maxrate".into(),
        format!("{video_bitrate}k"),
        "-bufsize".into(),
        format!("{}k", video_bitrate * 2),
        "-r".into(),
        request.fps.to_string(),
        "-c:a".into(),
        "aac".into(),
        "-b:a".into(),
        format!("{}k", request.audio_bitrate_kbps.max(64)),
        "-ar".into(),
        request.audio_sample_rate.to_string(),
    ]);
    if request.soft_subtitles.is_some() {
        args.extend(["-c:s".into(), "mov_text".into()]);
    }
    args.extend([
        "-t".into(),
        format!("{:.3}", request.duration_secs),
        "-movflags".into(),
        "+faststart".into(),
        "-f".into(),
        "mp4".into(),
    ]);
    args.extend(progress_args());
    args.push(path_arg(&request.output));
    args
}

/// Last lines of a tool's stderr.
fn diagnostic_tail(stderr: &str) -> String {
    let lines: Vec<&str> = stderr.trim().lines().collect();
    let skip = lines.len().saturating_sub(DIAGNOSTIC_LINES);
    lines[skip..].join("\n")
}

#[derive(Debug, Default)]
struct ProgressState {
    out_time_secs: f64,
    complete: bool,
}

impl ProgressState {
    fn update(&mut self, key: &str, value: &str) {
        match key {
            // ffmpeg reports microseconds under both names.
            "out_time_ms" | "out_time_us" => {
                if let Ok(us) = value.parse::<f64>() {
                    self.out_time_secs = us / 1_000_000.0;
                }
            }
            "progress" => {
                self.complete = value == "end";
            }
            _ => {}
        }
    }

    fn fraction(&self, expected_secs: f64) -> f64 {
        if self.complete {
            1.0
        } else if expected_secs <= 0.0 {
            0.0
        } else {
            (self.out_time_secs / expected_secs).clamp(0.0, 1.0)
        }
    }
}

// ---------------------------------------------------------------------------
// ffprobe JSON output
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct FfprobeOutput {
    #[serde(default)]
    streams: Vec<FfprobeStream>,
    format: Option<FfprobeFormat>,
}

#[derive(Debug, Deserialize)]
struct FfprobeStream {
    codec_name: Option<String>,
    codec_type: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    /// e.g. "30/1" or "24000/1001"
    r_frame_rate: Option<String>,
    avg_frame_rate: Option<String>,
    channels: Option<u32>,
    sample_rate: Option<String>,
    duration: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FfprobeFormat {
    duration: Option<String>,
    size: Option<String>,
    format_name: Option<String>,
}

fn media_info_from_probe(path: &Path, probe: FfprobeOutput) -> ReelcutResult<MediaInfo> {
    let stream_of = |kind: &str| {
        probe
            .streams
            .iter()
            .find(|s| s.codec_type.as_deref() == Some(kind))
    };

    let video = stream_of("video").and_then(|s| {
        let frame_size = FrameSize::new(s.width?, s.height?);
        let fps = s
            .r_frame_rate
            .as_deref()
            .and_then(parse_fraction)
            .or_else(|| s.avg_frame_rate.as_deref().and_then(parse_fraction))?;
        Some(VideoStreamInfo {
            frame_size,
            fps,
            codec: s.codec_name.clone(),
        })
    });

    let audio = stream_of("audio").map(|s| AudioStreamInfo {
        sample_rate: s
            .sample_rate
            .as_deref()
            .and_then(|v| v.parse().ok())
            .unwrap_or(0),
        channels: s.channels.unwrap_or(0),
        codec: s.codec_name.clone(),
    });

    let duration_secs = probe
        .format
        .as_ref()
        .and_then(|f| f.duration.as_deref())
        .and_then(|d| d.parse::<f64>().ok())
        .or_else(|| {
            probe
                .streams
                .iter()
                .filter_map(|s| s.duration.as_deref()?.parse::<f64>().ok())
                .reduce(f64::max)
        })
        .ok_or_else(|| ReelcutError::probe(format!("no duration reported for {}", path.display())))?;

    Ok(MediaInfo {
        path: path.to_path_buf(),
        duration_secs,
        container: probe.format.as_ref().and_then(|f| f.format_name.clone()),
        size_bytes: probe
            .format
            .as_ref()
            .and_then(|f| f.size.as_deref())
            .and_then(|s| s.parse().ok()),
        video,
        audio,
        subtitle_streams: probe
            .streams
            .iter()
            .filter(|s| s.codec_type.as_deref() == Some("subtitle"))
            .count(),
    })
}

/// Parse a rational like "30000/1001" or a plain number.
fn parse_fraction(raw: &str) -> Option<f64> {
    match raw.split_once('/') {
        Some((num, den)) => {
            let num: f64 = num.trim().parse().ok()?;
            let den: f64 = den.trim().parse().ok()?;
            (den != 0.0 && num > 0.0).then(|| num / den)
        }
        None => raw.trim().parse().ok().filter(|v: &f64| *v > 0.0),
    }
}
