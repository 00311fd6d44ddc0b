// Optional upload of each session's photo by an operator-provided script.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;
use tracing::{info, warn};

pub struct CloudSync {
    script: PathBuf,
}

impl CloudSync {
    pub fn new(script: impl Into<PathBuf>) -> Self {
        CloudSync {
            script: script.into(),
        }
    }

    /// Run `sh <script> <photo>` and move on; the upload is never awaited.
    pub fn start(&self, photo: &Path) {
        info!("Sync {:?} with {:?}", photo, self.script);
        let spawned = Command::new("sh")
            .arg(&self.script)
            .arg(photo)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn();

        if let Err(e) = spawned {
            warn!("Failed to start sync script {:?}: {}", self.script, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_sync_script_receives_photo_path() {
        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("sync.sh");
        let marker = dir.path().join("synced");
        std::fs::write(
            &script,
            format!("echo \"$1\" > {}\n", marker.display()),
        )
        .unwrap();

        CloudSync::new(&script).start(Path::new("photos/20240101-000000.jpg"));

        for _ in 0..100 {
            if let Ok(content) = std::fs::read_to_string(&marker) {
                if !content.is_empty() {
                    assert_eq!(content.trim(), "photos/20240101-000000.jpg");
                    return;
                }
            }
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        }
        panic!("sync script never ran");
    }

    #[tokio::test]
    async fn test_missing_shell_script_does_not_panic() {
        CloudSync::new("/nonexistent/sync.sh").start(Path::new("photo.jpg"));
    }
}
