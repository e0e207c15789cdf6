use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};

/// Keeps every published video inside the media root, even when a renderer
/// leaves symlinks behind in its output directory.
#[derive(Debug, Clone)]
pub struct MediaSandbox {
    root: PathBuf,
}

impl MediaSandbox {
    /// Creates the media root if needed, then canonicalizes it.
    pub fn new<P: AsRef<Path>>(root: P) -> Result<Self> {
        let root = root.as_ref();
        fs::create_dir_all(root)
            .with_context(|| format!("failed to create media root {}", root.display()))?;
        let root = fs::canonicalize(root)
            .with_context(|| format!("failed to canonicalize media root: {}", root.display()))?;
        Ok(Self { root })
    }

    /// Resolves `target` (relative to the root, or absolute) and rejects
    /// anything that lands outside the root once symlinks are followed.
    pub fn resolve<P: AsRef<Path>>(&self, target: P) -> Result<PathBuf> {
        let combined = self.root.join(target.as_ref());
        let canonical = fs::canonicalize(&combined).with_context(|| {
            format!(
                "failed to resolve or canonicalize path: {}",
                combined.display()
            )
        })?;

        if !canonical.starts_with(&self.root) {
            bail!(
                "path traversal violation: blocked access to {}",
                canonical.display()
            );
        }
        Ok(canonical)
    }

    /// Public URL for a file under the root, always with forward slashes.
    pub fn public_url(&self, prefix: &str, resolved: &Path) -> Result<String> {
        let relative = resolved.strip_prefix(&self.root).with_context(|| {
            format!("{} is not under the media root", resolved.display())
        })?;
        let segments = relative
            .components()
            .map(|component| component.as_os_str().to_string_lossy().into_owned())
            .collect::<Vec<_>>();
        Ok(format!("{}/{}", prefix.trim_end_matches('/'), segments.join("/")))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}
