//! Per-task working directory with guaranteed cleanup.

use std::path::{Path, PathBuf};

use tracing::warn;

/// Working directory for a single task, named by its command id.
///
/// The directory is removed when the guard drops, so every exit path —
/// success, error, timeout, panic — cleans up.
pub struct JobWorkspace {
    path: PathBuf,
}

impl JobWorkspace {
    pub fn create(root: &Path, command_id: &str) -> std::io::Result<Self> {
        let path = root.join(command_id);
        std::fs::create_dir_all(&path)?;
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for JobWorkspace {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_dir_all(&self.path) {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!("failed to remove workspace {}: {e}", self.path.display());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn removed_on_drop() {
        let root = tempfile::tempdir().unwrap();
        let path = {
            let ws = JobWorkspace::create(root.path(), "cmd-1").unwrap();
            std::fs::write(ws.path().join("in_1.mp4"), b"data").unwrap();
            assert!(ws.path().is_dir());
            ws.path().to_path_buf()
        };
        assert!(!path.exists());
    }

    #[test]
    fn removed_even_when_a_panic_unwinds() {
        let root = tempfile::tempdir().unwrap();
        let path = root.path().join("cmd-2");
        let root_path = root.path().to_path_buf();

        let result = std::panic::catch_unwind(move || {
            let ws = JobWorkspace::create(&root_path, "cmd-2").unwrap();
            std::fs::write(ws.path().join("partial.mp4"), b"x").unwrap();
            panic!("simulated task panic");
        });

        assert!(result.is_err());
        assert!(!path.exists());
    }

    #[test]
    fn nested_content_is_removed() {
        let root = tempfile::tempdir().unwrap();
        let ws = JobWorkspace::create(root.path(), "cmd-3").unwrap();
        std::fs::create_dir_all(ws.path().join("sub/dir")).unwrap();
        std::fs::write(ws.path().join("sub/dir/out.gif"), b"gif").unwrap();
        let path = ws.path().to_path_buf();
        drop(ws);
        assert!(!path.exists());
    }
}
