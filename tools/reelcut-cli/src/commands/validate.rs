//! Validate a job file.

use std::path::PathBuf;

use reelcut_project_model::request::PostProductionConfig;
use reelcut_render_engine::pipeline::check_inputs;

pub fn run(path: PathBuf) -> anyhow::Result<()> {
    println!("Validating job: {}", path.display());

    let job = match PostProductionConfig::load(&path) {
        Ok(job) => job,
        Err(e) => {
            println!("  [FAIL] {e}");
            return Err(anyhow::anyhow!("Job file is invalid"));
        }
    };

    if let Err(e) = job.validate() {
        println!("  [FAIL] {e}");
        return Err(anyhow::anyhow!("Job file is invalid"));
    }
    println!("  [OK] Job structure");

    match check_inputs(&job) {
        Ok(()) => println!("  [OK] All {} input files exist", input_count(&job)),
        Err(e) => {
            println!("  [FAIL] {e}");
            return Err(anyhow::anyhow!("Job inputs are missing"));
        }
    }

    println!("Job is valid.");
    Ok(())
}

fn input_count(job: &PostProductionConfig) -> usize {
    job.segments.len()
        + 1
        + usize::from(job.subtitles.is_some())
        + usize::from(job.audio.music_path.is_some())
}
