pub mod manim;
pub mod placeholder;
pub mod process;

use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use anyhow::Context;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::animation::RenderRequest;
use crate::render::manim::ManimBackend;
use crate::render::placeholder::PlaceholderBackend;
use crate::sandbox::MediaSandbox;

pub const STATIC_URL_PREFIX: &str = "/static";

#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("{renderer} render failed with status {status}: {stderr}")]
    Invocation {
        renderer: String,
        status: String,
        stderr: String,
    },

    #[error("failed to launch renderer `{program}`: {reason}")]
    Spawn { program: String, reason: String },

    #[error("render timed out after {timeout:?}")]
    Timeout { timeout: Duration },

    #[error("renderer exited successfully but no video file was generated in {}", .dir.display())]
    MissingOutput { dir: PathBuf },

    #[error("raw script overrides are disabled on this server")]
    ScriptOverrideRejected,

    #[error("render output escaped the media root: {0}")]
    Sandbox(String),

    #[error("invalid path argument: {0}")]
    InvalidPath(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    /// Generates a Manim scene and renders it with the Manim CLI.
    #[default]
    Manim,
    /// Skips Manim and asks ffmpeg for a flat placeholder clip.
    Placeholder,
}

impl BackendKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Manim => "manim",
            Self::Placeholder => "placeholder",
        }
    }
}

/// Where a single render writes and what it is allowed to run.
#[derive(Debug, Clone)]
pub struct RenderJob<'a> {
    pub request: &'a RenderRequest,
    pub render_id: &'a str,
    pub output_dir: &'a Path,
    pub timeout: Duration,
}

pub trait RenderBackend: Send + Sync {
    fn kind(&self) -> BackendKind;

    /// Runs the renderer to completion. The orchestrator looks for the video
    /// afterwards, so success here only means the process exited cleanly.
    fn render(&self, job: &RenderJob<'_>) -> Result<(), RenderError>;
}

#[derive(Debug, Clone, Serialize)]
pub struct RenderOutcome {
    pub render_id: String,
    pub video_path: PathBuf,
    pub video_url: String,
    pub backend: BackendKind,
    pub elapsed_ms: u128,
}

#[derive(Debug, Clone)]
pub struct OrchestratorSettings {
    pub media_root: PathBuf,
    pub backend: BackendKind,
    pub manim_program: PathBuf,
    pub ffmpeg_program: Option<PathBuf>,
    pub timeout: Duration,
    pub allow_script_override: bool,
}

pub struct RenderOrchestrator {
    sandbox: MediaSandbox,
    backend: Box<dyn RenderBackend>,
    timeout: Duration,
    allow_script_override: bool,
}

impl RenderOrchestrator {
    pub fn new(settings: &OrchestratorSettings) -> anyhow::Result<Self> {
        let backend = select_backend(settings)?;
        Self::with_backend(
            &settings.media_root,
            backend,
            settings.timeout,
            settings.allow_script_override,
        )
    }

    pub fn with_backend(
        media_root: &Path,
        backend: Box<dyn RenderBackend>,
        timeout: Duration,
        allow_script_override: bool,
    ) -> anyhow::Result<Self> {
        let sandbox = MediaSandbox::new(media_root)?;
        Ok(Self {
            sandbox,
            backend,
            timeout,
            allow_script_override,
        })
    }

    pub fn media_root(&self) -> &Path {
        self.sandbox.root()
    }

    pub fn backend_kind(&self) -> BackendKind {
        self.backend.kind()
    }

    /// Renders one request into `<media_root>/<render_id>/`. The output
    /// directory is left in place whatever the outcome.
    pub fn render(&self, request: &RenderRequest) -> Result<RenderOutcome, RenderError> {
        if request.script_override().is_some() {
            if !self.allow_script_override {
                return Err(RenderError::ScriptOverrideRejected);
            }
            tracing::warn!(
                bytes = request.script_override.as_ref().map_or(0, String::len),
                "executing caller-supplied scene script"
            );
        }

        let render_id = Uuid::new_v4().to_string();
        let output_dir = self.sandbox.root().join(&render_id);
        fs::create_dir_all(&output_dir).with_context(|| {
            format!("failed to create render directory {}", output_dir.display())
        })?;

        let started = Instant::now();
        let backend = self.backend.kind();
        tracing::info!(
            render_id = %render_id,
            backend = backend.as_str(),
            config = %request.config.summary(),
            duration = request.config.duration,
            "render started"
        );

        let job = RenderJob {
            request,
            render_id: &render_id,
            output_dir: &output_dir,
            timeout: self.timeout,
        };
        self.backend.render(&job)?;

        let video = find_first_video(&output_dir)?
            .ok_or_else(|| RenderError::MissingOutput {
                dir: output_dir.clone(),
            })?;
        let video_path = self
            .sandbox
            .resolve(&video)
            .map_err(|error| RenderError::Sandbox(format!("{error:#}")))?;
        let video_url = self
            .sandbox
            .public_url(STATIC_URL_PREFIX, &video_path)
            .map_err(|error| RenderError::Sandbox(format!("{error:#}")))?;
        let elapsed_ms = started.elapsed().as_millis();

        tracing::info!(render_id = %render_id, %video_url, elapsed_ms, "render finished");
        Ok(RenderOutcome {
            render_id,
            video_path,
            video_url,
            backend,
            elapsed_ms,
        })
    }
}

fn select_backend(settings: &OrchestratorSettings) -> anyhow::Result<Box<dyn RenderBackend>> {
    match settings.backend {
        BackendKind::Manim => Ok(Box::new(ManimBackend::new(&settings.manim_program))),
        BackendKind::Placeholder => {
            let ffmpeg = match &settings.ffmpeg_program {
                Some(path) => path.clone(),
                None => placeholder::resolve_ffmpeg()?,
            };
            Ok(Box::new(PlaceholderBackend::new(ffmpeg)))
        }
    }
}

/// First `*.mp4` below `dir`, in sorted path order so repeated scans agree.
pub fn find_first_video(dir: &Path) -> std::io::Result<Option<PathBuf>> {
    let mut entries = fs::read_dir(dir)?
        .map(|entry| entry.map(|entry| entry.path()))
        .collect::<std::io::Result<Vec<_>>>()?;
    entries.sort();

    for path in &entries {
        if path.is_file() && has_mp4_extension(path) {
            return Ok(Some(path.clone()));
        }
    }
    for path in entries {
        // Symlinked directories are skipped so a renderer can't send the scan in circles.
        let is_real_dir = fs::symlink_metadata(&path)
            .map(|meta| meta.is_dir())
            .unwrap_or(false);
        if is_real_dir {
            if let Some(found) = find_first_video(&path)? {
                return Ok(Some(found));
            }
        }
    }
    Ok(None)
}

fn has_mp4_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.eq_ignore_ascii_case("mp4"))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tempfile::tempdir;

    struct FakeBackend {
        write_video: bool,
        calls: Arc<AtomicUsize>,
    }

    impl RenderBackend for FakeBackend {
        fn kind(&self) -> BackendKind {
            BackendKind::Placeholder
        }

        fn render(&self, job: &RenderJob<'_>) -> Result<(), RenderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.write_video {
                let nested = job.output_dir.join("videos").join("480p15");
                fs::create_dir_all(&nested)?;
                fs::write(nested.join("AnimationScene.mp4"), b"mp4")?;
            }
            Ok(())
        }
    }

    fn orchestrator(root: &Path, write_video: bool, allow_override: bool) -> (RenderOrchestrator, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let backend = FakeBackend {
            write_video,
            calls: Arc::clone(&calls),
        };
        let orchestrator = RenderOrchestrator::with_backend(
            root,
            Box::new(backend),
            Duration::from_secs(5),
            allow_override,
        )
        .expect("orchestrator should build");
        (orchestrator, calls)
    }

    #[test]
    fn successful_render_publishes_static_url() {
        let dir = tempdir().unwrap();
        let (orchestrator, _) = orchestrator(dir.path(), true, false);

        let outcome = orchestrator.render(&RenderRequest::default()).unwrap();
        assert_eq!(
            outcome.video_url,
            format!("/static/{}/videos/480p15/AnimationScene.mp4", outcome.render_id)
        );
        assert!(outcome.video_path.is_file());
    }

    #[test]
    fn clean_exit_without_video_is_missing_output() {
        let dir = tempdir().unwrap();
        let (orchestrator, _) = orchestrator(dir.path(), false, false);

        let error = orchestrator.render(&RenderRequest::default()).unwrap_err();
        assert!(matches!(error, RenderError::MissingOutput { .. }));
        // output directories survive failures
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn script_override_is_rejected_unless_allowed() {
        let dir = tempdir().unwrap();
        let mut request = RenderRequest::default();
        request.script_override = Some("print('hi')".to_owned());

        let (locked, calls) = orchestrator(dir.path(), true, false);
        assert!(matches!(
            locked.render(&request),
            Err(RenderError::ScriptOverrideRejected)
        ));
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        let (open, calls) = orchestrator(dir.path(), true, true);
        assert!(open.render(&request).is_ok());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[cfg(unix)]
    #[test]
    fn video_symlinked_outside_media_root_is_a_sandbox_error() {
        struct EscapingBackend {
            target: PathBuf,
        }

        impl RenderBackend for EscapingBackend {
            fn kind(&self) -> BackendKind {
                BackendKind::Manim
            }

            fn render(&self, job: &RenderJob<'_>) -> Result<(), RenderError> {
                std::os::unix::fs::symlink(&self.target, job.output_dir.join("AnimationScene.mp4"))?;
                Ok(())
            }
        }

        let parent = tempdir().unwrap();
        let outside = parent.path().join("secret.mp4");
        fs::write(&outside, b"not yours").unwrap();
        let root = parent.path().join("media");

        let orchestrator = RenderOrchestrator::with_backend(
            &root,
            Box::new(EscapingBackend { target: outside }),
            Duration::from_secs(5),
            false,
        )
        .unwrap();
        let error = orchestrator.render(&RenderRequest::default()).unwrap_err();
        match error {
            RenderError::Sandbox(message) => assert!(message.contains("path traversal violation")),
            other => panic!("expected sandbox error, got {other:?}"),
        }
    }

    #[test]
    fn video_search_prefers_sorted_order() {
        let dir = tempdir().unwrap();
        fs::create_dir_all(dir.path().join("b")).unwrap();
        fs::create_dir_all(dir.path().join("a")).unwrap();
        fs::write(dir.path().join("b").join("x.mp4"), b"").unwrap();
        fs::write(dir.path().join("a").join("y.MP4"), b"").unwrap();
        fs::write(dir.path().join("notes.txt"), b"").unwrap();

        let found = find_first_video(dir.path()).unwrap().unwrap();
        assert_eq!(found, dir.path().join("a").join("y.MP4"));
    }
}
