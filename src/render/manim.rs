use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::Context;

use crate::render::process::{check_path_argument, Invocation};
use crate::render::{BackendKind, RenderBackend, RenderError, RenderJob};
use crate::script::{generate_scene_script, SCENE_CLASS};

/// Low quality keeps renders fast; preview (`-p`) is left off because nothing
/// on a server can open a player window.
const QUALITY_FLAG: &str = "-ql";

pub struct ManimBackend {
    program: PathBuf,
}

impl ManimBackend {
    pub fn new(program: &Path) -> Self {
        Self {
            program: program.to_path_buf(),
        }
    }
}

impl RenderBackend for ManimBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Manim
    }

    fn render(&self, job: &RenderJob<'_>) -> Result<(), RenderError> {
        let script = match job.request.script_override() {
            Some(custom) => custom.to_owned(),
            None => generate_scene_script(&job.request.config),
        };

        // Removed on drop, on every exit path; a failed unlink is ignored.
        let mut script_file = tempfile::Builder::new()
            .prefix("promptanim-scene-")
            .suffix(".py")
            .tempfile()
            .context("failed to create temporary scene script")?;
        script_file
            .write_all(script.as_bytes())
            .and_then(|()| script_file.flush())
            .context("failed to write temporary scene script")?;

        check_path_argument(script_file.path())?;
        check_path_argument(job.output_dir)?;

        let output = Invocation::new(&self.program, job.timeout)
            .arg(script_file.path())
            .arg(SCENE_CLASS)
            .arg(QUALITY_FLAG)
            .arg("--media_dir")
            .arg(job.output_dir)
            .run_checked("manim")?;

        tracing::debug!(
            render_id = job.render_id,
            elapsed_ms = output.elapsed.as_millis(),
            stdout_bytes = output.stdout.len(),
            "manim exited"
        );
        Ok(())
    }
}
