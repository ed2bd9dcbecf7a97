//! Job-scoped scratch directory.
//!
//! One `JobWorkspace` per job, created before the first stage and owned by
//! the orchestrator. Everything a stage writes lives under it. Dropping the
//! workspace removes the directory; `close` does the same but reports
//! failures so they can be logged.

use std::path::{Path, PathBuf};

use tempfile::TempDir;
use uuid::Uuid;

use reelcut_common::error::ReelcutResult;

#[derive(Debug)]
pub struct JobWorkspace {
    id: Uuid,
    dir: TempDir,
}

impl JobWorkspace {
    /// Create a uniquely named workspace under `root`.
    pub fn create(root: &Path) -> ReelcutResult<Self> {
        std::fs::create_dir_all(root)?;
        let id = Uuid::new_v4();
        let dir = tempfile::Builder::new()
            .prefix(&format!("reelcut-job-{id}-"))
            .tempdir_in(root)?;
        tracing::debug!(job_id = %id, path = %dir.path().display(), "Created job workspace");
        Ok(Self { id, dir })
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Path of a file directly under the workspace.
    pub fn file(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    /// Sub-directory for one stage's artifacts (created on demand).
    pub fn stage_dir(&self, name: &str) -> ReelcutResult<PathBuf> {
        let path = self.dir.path().join(name);
        std::fs::create_dir_all(&path)?;
        Ok(path)
    }

    /// Delete the workspace and everything in it.
    pub fn close(self) -> std::io::Result<()> {
        let path = self.dir.path().to_path_buf();
        self.dir.close()?;
        tracing::debug!(job_id = %self.id, path = %path.display(), "Removed job workspace");
        Ok(())
    }
}
