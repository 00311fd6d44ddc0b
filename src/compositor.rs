// Composite images built by ImageMagick's `montage`.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::{Child, Command};
use tracing::{debug, info, warn};

use crate::errors::ComposeError;

/// How frames are tiled into one image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Layout {
    pub tile: &'static str,
    pub geometry: &'static str,
    /// Each frame appears this many times in a row.
    pub repeat: usize,
}

impl Layout {
    /// Two identical strips side by side, cut in half after printing.
    pub const PRINT_STRIP: Layout = Layout {
        tile: "2x4",
        geometry: "+8+4",
        repeat: 2,
    };

    /// All four frames once, for the review screen.
    pub const REVIEW_GRID: Layout = Layout {
        tile: "2x2",
        geometry: "+2+2",
        repeat: 1,
    };
}

#[derive(Debug, Clone)]
pub struct MontageJob {
    pub frames: Vec<PathBuf>,
    pub layout: Layout,
    pub output: PathBuf,
}

impl MontageJob {
    pub fn new(frames: &[PathBuf], layout: Layout, output: impl Into<PathBuf>) -> Self {
        MontageJob {
            frames: frames.to_vec(),
            layout,
            output: output.into(),
        }
    }

    /// Arguments after the program name, in `montage` order.
    pub fn args(&self) -> Vec<String> {
        let mut args: Vec<String> = self
            .frames
            .iter()
            .flat_map(|frame| std::iter::repeat(frame.display().to_string()).take(self.layout.repeat))
            .collect();
        args.extend([
            "-tile".to_string(),
            self.layout.tile.to_string(),
            "-geometry".to_string(),
            self.layout.geometry.to_string(),
        ]);
        args.push(self.output.display().to_string());
        args
    }
}

/// A composite that may still be in the works.
///
/// The output file is only valid once `wait` returns.
#[derive(Debug)]
pub struct PendingComposite {
    output: PathBuf,
    process: Option<(String, Child)>,
}

impl PendingComposite {
    /// A composite whose file is already complete.
    pub fn ready(output: impl Into<PathBuf>) -> Self {
        PendingComposite {
            output: output.into(),
            process: None,
        }
    }

    /// A composite being written by `child`, a run of `program`.
    pub fn running(program: impl Into<String>, child: Child, output: impl Into<PathBuf>) -> Self {
        PendingComposite {
            output: output.into(),
            process: Some((program.into(), child)),
        }
    }

    pub fn output(&self) -> &Path {
        &self.output
    }

    /// Wait for the compositor to exit. A failing exit status is only
    /// logged; the caller gets the output path either way.
    pub async fn wait(self) -> Result<PathBuf, ComposeError> {
        if let Some((program, mut child)) = self.process {
            let status = child
                .wait()
                .await
                .map_err(|source| ComposeError::Wait {
                    program: program.clone(),
                    source,
                })?;
            if status.success() {
                debug!("{} finished: {:?}", program, self.output);
            } else {
                warn!(
                    "{} exited with {} while writing {:?}",
                    program, status, self.output
                );
            }
        }
        Ok(self.output)
    }
}

#[async_trait]
pub trait Compositor: Send + Sync {
    /// Launch a composite without waiting for it.
    fn start(&self, job: &MontageJob) -> Result<PendingComposite, ComposeError>;

    /// Build a composite and wait until the file is written.
    async fn compose(&self, job: &MontageJob) -> Result<PathBuf, ComposeError> {
        self.start(job)?.wait().await
    }
}

pub struct MontageCompositor {
    program: String,
}

impl MontageCompositor {
    pub fn new(program: impl Into<String>) -> Self {
        MontageCompositor {
            program: program.into(),
        }
    }
}

impl Default for MontageCompositor {
    fn default() -> Self {
        Self::new("montage")
    }
}

#[async_trait]
impl Compositor for MontageCompositor {
    fn start(&self, job: &MontageJob) -> Result<PendingComposite, ComposeError> {
        if job.frames.is_empty() {
            return Err(ComposeError::NoFrames);
        }

        let args = job.args();
        info!("Starting {} -> {:?}", self.program, job.output);
        debug!("{} {}", self.program, args.join(" "));

        let child = Command::new(&self.program)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|source| ComposeError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        Ok(PendingComposite::running(self.program.clone(), child, job.output.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frames() -> Vec<PathBuf> {
        (1..=4).map(|i| PathBuf::from(format!("{}.jpg", i))).collect()
    }

    #[test]
    fn test_print_strip_args() {
        let job = MontageJob::new(&frames(), Layout::PRINT_STRIP, "toprint/a.jpg");
        assert_eq!(
            job.args(),
            vec![
                "1.jpg", "1.jpg", "2.jpg", "2.jpg", "3.jpg", "3.jpg", "4.jpg", "4.jpg", "-tile",
                "2x4", "-geometry", "+8+4", "toprint/a.jpg"
            ]
        );
    }

    #[test]
    fn test_review_grid_args() {
        let job = MontageJob::new(&frames(), Layout::REVIEW_GRID, "photos/a.jpg");
        assert_eq!(
            job.args(),
            vec![
                "1.jpg", "2.jpg", "3.jpg", "4.jpg", "-tile", "2x2", "-geometry", "+2+2",
                "photos/a.jpg"
            ]
        );
    }

    #[test]
    fn test_empty_job_is_rejected() {
        let job = MontageJob::new(&[], Layout::REVIEW_GRID, "out.jpg");
        assert!(matches!(
            MontageCompositor::default().start(&job),
            Err(ComposeError::NoFrames)
        ));
    }

    #[tokio::test]
    async fn test_missing_program_fails_to_spawn() {
        let job = MontageJob::new(&frames(), Layout::REVIEW_GRID, "out.jpg");
        let compositor = MontageCompositor::new("definitely-not-montage-binary");
        assert!(matches!(
            compositor.start(&job),
            Err(ComposeError::Spawn { .. })
        ));
    }

    #[tokio::test]
    async fn test_failed_exit_still_yields_output() {
        // `false` ignores its arguments and exits non-zero.
        let job = MontageJob::new(&frames(), Layout::PRINT_STRIP, "toprint/x.jpg");
        let compositor = MontageCompositor::new("false");
        let output = compositor.compose(&job).await.unwrap();
        assert_eq!(output, PathBuf::from("toprint/x.jpg"));
    }

    #[tokio::test]
    async fn test_wait_blocks_until_exit() {
        // `cp` stands in for montage: it writes the last argument.
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("1.jpg");
        std::fs::write(&source, b"frame").unwrap();
        let output = dir.path().join("out.jpg");

        let job = MontageJob {
            frames: vec![source],
            layout: Layout {
                tile: "1x1",
                geometry: "+0+0",
                repeat: 1,
            },
            output: output.clone(),
        };
        let child = Command::new("cp")
            .arg(&job.frames[0])
            .arg(&job.output)
            .spawn()
            .unwrap();
        let pending = PendingComposite::running("cp", child, output.clone());

        assert_eq!(pending.wait().await.unwrap(), output);
        assert_eq!(std::fs::read(&output).unwrap(), b"frame");
    }

    #[tokio::test]
    async fn test_ready_composite() {
        let pending = PendingComposite::ready("photos/b.jpg");
        assert_eq!(pending.output(), Path::new("photos/b.jpg"));
        assert_eq!(pending.wait().await.unwrap(), PathBuf::from("photos/b.jpg"));
    }
}
