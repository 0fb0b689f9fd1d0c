//! Scratch space for plan execution.
//!
//! A [`Workspace`] hands out fresh, never-reused paths for transient
//! artifacts and copies the final artifact out to its persisted location.
//! Paths inside the scratch directory are never written twice, so earlier
//! artifacts stay valid for later references.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

use tempfile::TempDir;

/// Where the scratch directory lives and who removes it.
#[derive(Debug)]
enum Scratch {
    /// Private temp dir, removed with the workspace.
    Owned(TempDir),
    /// Caller-provided directory; only the files we create are removed.
    Borrowed(PathBuf),
}

/// Scratch workspace for one plan execution.
///
/// # Example
///
/// ```no_run
/// use cf_av::Workspace;
///
/// let workspace = Workspace::new().unwrap();
/// let step = workspace.transient_path("trim", "mp4");
/// // ... run a tool writing to `step` ...
/// workspace.finalize(&step, std::path::Path::new("/out/final.mp4")).unwrap();
/// ```
#[derive(Debug)]
pub struct Workspace {
    scratch: Scratch,
    counter: AtomicUsize,
}

impl Workspace {
    /// Create a workspace backed by a private temporary directory.
    pub fn new() -> cf_core::Result<Self> {
        let temp_dir = tempfile::Builder::new()
            .prefix("cutforge-")
            .tempdir()
            .map_err(|e| cf_core::Error::Tool {
                tool: "workspace".to_string(),
                message: format!("failed to create temp dir: {e}"),
            })?;

        Ok(Self {
            scratch: Scratch::Owned(temp_dir),
            counter: AtomicUsize::new(0),
        })
    }

    /// Create a workspace inside a caller-chosen directory.
    ///
    /// The directory is created if missing and is left in place afterwards.
    /// Concurrent runs must be given distinct directories.
    pub fn in_dir(dir: &Path) -> cf_core::Result<Self> {
        std::fs::create_dir_all(dir).map_err(|e| cf_core::Error::Tool {
            tool: "workspace".to_string(),
            message: format!("failed to create scratch dir {}: {e}", dir.display()),
        })?;

        Ok(Self {
            scratch: Scratch::Borrowed(dir.to_path_buf()),
            counter: AtomicUsize::new(0),
        })
    }

    /// Path to the scratch directory.
    pub fn dir(&self) -> &Path {
        match &self.scratch {
            Scratch::Owned(temp) => temp.path(),
            Scratch::Borrowed(dir) => dir,
        }
    }

    /// A fresh path for a transient artifact: `<prefix>_<seq>_<uid>.<ext>`.
    ///
    /// The path does not exist yet and is never handed out again.
    pub fn transient_path(&self, prefix: &str, ext: &str) -> PathBuf {
        let seq = self.counter.fetch_add(1, Ordering::Relaxed);
        let uid = uuid::Uuid::new_v4().simple().to_string();
        self.dir()
            .join(format!("{prefix}_{seq:03}_{}.{ext}", &uid[..8]))
    }

    /// Remove a transient file. A file that is already gone is not an error.
    pub fn discard(&self, path: &Path) -> std::io::Result<()> {
        match std::fs::remove_file(path) {
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            other => other,
        }
    }

    /// Copy the final artifact to its persisted location.
    ///
    /// Parent directories of `dest` are created as needed. Returns `dest`.
    ///
    /// # Errors
    ///
    /// Returns an error if `artifact` does not exist or the copy fails.
    pub fn finalize(&self, artifact: &Path, dest: &Path) -> cf_core::Result<PathBuf> {
        if !artifact.exists() {
            return Err(cf_core::Error::Tool {
                tool: "workspace".to_string(),
                message: format!("final artifact does not exist: {}", artifact.display()),
            });
        }

        if artifact == dest {
            return Ok(dest.to_path_buf());
        }

        if let Some(parent) = dest.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        std::fs::copy(artifact, dest).map_err(|e| cf_core::Error::Tool {
            tool: "workspace".to_string(),
            message: format!("failed to copy output to {}: {e}", dest.display()),
        })?;

        Ok(dest.to_path_buf())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn transient_paths_are_unique_and_inside() {
        let ws = Workspace::new().unwrap();
        let a = ws.transient_path("trim", "mp4");
        let b = ws.transient_path("trim", "mp4");
        assert_ne!(a, b);
        assert!(a.starts_with(ws.dir()));
        assert_eq!(a.extension().unwrap(), "mp4");
        assert!(a.file_name().unwrap().to_string_lossy().starts_with("trim_000_"));
    }

    #[test]
    fn owned_scratch_is_removed_on_drop() {
        let ws = Workspace::new().unwrap();
        let dir = ws.dir().to_path_buf();
        assert!(dir.exists());
        drop(ws);
        assert!(!dir.exists());
    }

    #[test]
    fn borrowed_scratch_survives_drop() {
        let parent = tempfile::tempdir().unwrap();
        let dir = parent.path().join("scratch");
        let ws = Workspace::in_dir(&dir).unwrap();
        drop(ws);
        assert!(dir.exists());
    }

    #[test]
    fn discard_ignores_missing_files() {
        let ws = Workspace::new().unwrap();
        let p = ws.transient_path("x", "bin");
        fs::write(&p, b"data").unwrap();
        ws.discard(&p).unwrap();
        assert!(!p.exists());
        ws.discard(&p).unwrap();
    }

    #[test]
    fn finalize_copies_artifact() {
        let ws = Workspace::new().unwrap();
        let out_dir = tempfile::tempdir().unwrap();
        let step = ws.transient_path("step", "mp4");
        fs::write(&step, b"processed").unwrap();

        let dest = out_dir.path().join("nested/final.mp4");
        let final_path = ws.finalize(&step, &dest).unwrap();
        assert_eq!(final_path, dest);
        assert_eq!(fs::read_to_string(&dest).unwrap(), "processed");
        // The transient copy is untouched; removing it is the caller's job.
        assert!(step.exists());
    }

    #[test]
    fn finalize_fails_when_artifact_missing() {
        let ws = Workspace::new().unwrap();
        let missing = ws.transient_path("never", "mp4");
        let result = ws.finalize(&missing, Path::new("/tmp/never-written.mp4"));
        assert!(result.is_err());
    }
}
