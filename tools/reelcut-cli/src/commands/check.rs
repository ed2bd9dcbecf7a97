//! Check that the media tools are usable.

use std::path::Path;

use reelcut_common::config::EngineConfig;
use reelcut_render_engine::FfmpegExecutor;

pub async fn run(config: EngineConfig) -> anyhow::Result<()> {
    println!("Reelcut System Check");
    println!("{}", "=".repeat(50));

    let executor = FfmpegExecutor::new(&config.tools);
    let checks = executor.check_tools().await;
    for check in &checks {
        match &check.version {
            Some(version) => println!("[OK] {}: {version}", check.name),
            None => println!(
                "[FAIL] {}: could not run {}",
                check.name,
                check.path.display()
            ),
        }
    }

    let workspace_root = config.workspace_root();
    let writable = workspace_is_writable(&workspace_root);
    if writable {
        println!("[OK] Workspace root: {}", workspace_root.display());
    } else {
        println!("[FAIL] Workspace root not writable: {}", workspace_root.display());
    }

    match &config.subtitles.font_file {
        Some(font) if font.is_file() => println!("[OK] Subtitle font: {}", font.display()),
        Some(font) => println!("[WARN] Subtitle font missing: {}", font.display()),
        None => println!("[OK] Subtitle font: fontconfig default"),
    }

    println!();
    if writable && checks.iter().all(|c| c.version.is_some()) {
        println!("All required tools are available. Reelcut is ready.");
        Ok(())
    } else {
        println!("Some required tools are missing. Set their paths in the config file.");
        Err(anyhow::anyhow!("System check failed"))
    }
}

/// A file can be created (and is removed again) under `root`.
fn workspace_is_writable(root: &Path) -> bool {
    root.is_dir() && tempfile::tempfile_in(root).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_workspace_writability() {
        let dir = tempfile::tempdir().unwrap();
        assert!(workspace_is_writable(dir.path()));
        assert!(std::fs::read_dir(dir.path()).unwrap().next().is_none());
        assert!(!workspace_is_writable(&dir.path().join("missing")));
    }
}
