use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use uuid::Uuid;

use crate::animation::AnimationConfig;
use crate::render::process::{check_path_argument, Invocation};
use crate::render::{BackendKind, RenderBackend, RenderError, RenderJob};

pub const FFMPEG_ENV: &str = "PROMPTANIM_FFMPEG";
pub const PLACEHOLDER_TIMEOUT: Duration = Duration::from_secs(30);
pub const PLACEHOLDER_FILE_NAME: &str = "placeholder.mp4";
const FRAME_SIZE: &str = "640x480";

/// Renders a flat colored clip with ffmpeg instead of running Manim.
pub struct PlaceholderBackend {
    ffmpeg: PathBuf,
}

impl PlaceholderBackend {
    pub fn new(ffmpeg: PathBuf) -> Self {
        Self { ffmpeg }
    }
}

impl RenderBackend for PlaceholderBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Placeholder
    }

    fn render(&self, job: &RenderJob<'_>) -> Result<(), RenderError> {
        if job.request.script_override().is_some() {
            tracing::warn!(
                render_id = job.render_id,
                "placeholder backend ignores the scene script override"
            );
        }
        let output_path = job.output_dir.join(PLACEHOLDER_FILE_NAME);
        // The placeholder encode has its own, shorter ceiling.
        let timeout = job.timeout.min(PLACEHOLDER_TIMEOUT);
        render_placeholder(&self.ffmpeg, &job.request.config, &output_path, timeout)
    }
}

/// `PROMPTANIM_FFMPEG` wins; otherwise the sidecar binary when that feature is
/// on, else whatever `ffmpeg` resolves to on PATH.
pub fn resolve_ffmpeg() -> Result<PathBuf> {
    if let Some(path) = std::env::var_os(FFMPEG_ENV).filter(|value| !value.is_empty()) {
        return Ok(PathBuf::from(path));
    }
    resolve_default_ffmpeg()
}

#[cfg(feature = "sidecar_ffmpeg")]
fn resolve_default_ffmpeg() -> Result<PathBuf> {
    let path = ffmpeg_sidecar::paths::ffmpeg_path();
    if !path.exists() {
        ffmpeg_sidecar::download::auto_download()
            .context("failed to auto-download ffmpeg sidecar binary")?;
    }
    Ok(path)
}

#[cfg(not(feature = "sidecar_ffmpeg"))]
fn resolve_default_ffmpeg() -> Result<PathBuf> {
    Ok(PathBuf::from("ffmpeg"))
}

pub fn placeholder_args(config: &AnimationConfig, output_path: &Path) -> Vec<OsString> {
    let duration = config.duration;
    let mut args = [
        "-hide_banner".to_owned(),
        "-loglevel".to_owned(),
        "error".to_owned(),
        "-f".to_owned(),
        "lavfi".to_owned(),
        "-i".to_owned(),
        format!("color={}:size={FRAME_SIZE}:duration={duration}", config.color),
        "-f".to_owned(),
        "lavfi".to_owned(),
        "-i".to_owned(),
        format!("color=black:size={FRAME_SIZE}:duration={duration}"),
        "-filter_complex".to_owned(),
        "[0:v][1:v]blend=all_mode=screen".to_owned(),
        "-y".to_owned(),
    ]
    .into_iter()
    .map(OsString::from)
    .collect::<Vec<_>>();
    args.push(output_path.as_os_str().to_owned());
    args
}

pub fn render_placeholder(
    ffmpeg: &Path,
    config: &AnimationConfig,
    output_path: &Path,
    timeout: Duration,
) -> Result<(), RenderError> {
    check_path_argument(output_path)?;

    let mut invocation = Invocation::new(ffmpeg, timeout);
    for arg in placeholder_args(config, output_path) {
        invocation = invocation.arg(arg);
    }
    invocation.run_checked("ffmpeg")?;

    if !output_path.is_file() {
        return Err(RenderError::MissingOutput {
            dir: output_path
                .parent()
                .map_or_else(|| PathBuf::from("."), Path::to_path_buf),
        });
    }
    Ok(())
}

/// Standalone flow: writes `<output_dir>/<uuid>.mp4` and returns its path.
pub fn write_placeholder_video(
    ffmpeg: &Path,
    config: &AnimationConfig,
    output_dir: &Path,
) -> Result<PathBuf> {
    fs::create_dir_all(output_dir)
        .with_context(|| format!("failed to create output directory {}", output_dir.display()))?;
    let output_path = output_dir.join(format!("{}.mp4", Uuid::new_v4()));
    render_placeholder(ffmpeg, config, &output_path, PLACEHOLDER_TIMEOUT)?;
    Ok(output_path)
}
