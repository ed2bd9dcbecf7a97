//! Show what the media tools report for a file.

use std::path::PathBuf;

use reelcut_common::config::EngineConfig;
use reelcut_render_engine::{FfmpegExecutor, MediaExecutor};

pub async fn run(config: EngineConfig, path: PathBuf, json: bool) -> anyhow::Result<()> {
    let executor = FfmpegExecutor::new(&config.tools);
    let info = executor
        .probe(&path)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to probe {}: {e}", path.display()))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&info)?);
        return Ok(());
    }

    println!("File: {}", info.path.display());
    if let Some(container) = &info.container {
        println!("  Container: {container}");
    }
    println!("  Duration: {:.3}s", info.duration_secs);
    if let Some(size) = info.size_bytes {
        println!("  Size: {size} bytes");
    }
    match &info.video {
        Some(v) => println!(
            "  Video: {} @ {:.3}fps ({})",
            v.frame_size,
            v.fps,
            v.codec.as_deref().unwrap_or("unknown")
        ),
        None => println!("  Video: none"),
    }
    match &info.audio {
        Some(a) => println!(
            "  Audio: {} Hz, {} ch ({})",
            a.sample_rate,
            a.channels,
            a.codec.as_deref().unwrap_or("unknown")
        ),
        None => println!("  Audio: none"),
    }
    if info.subtitle_streams > 0 {
        println!("  Subtitle streams: {}", info.subtitle_streams);
    }

    Ok(())
}
