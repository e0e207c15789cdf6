use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use serde::Deserialize;

use crate::render::{BackendKind, OrchestratorSettings};

pub const DEFAULT_SERVER_TIMEOUT_SECONDS: u64 = 60;
pub const DEFAULT_CLI_TIMEOUT_SECONDS: u64 = 120;

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub media_dir: PathBuf,
    pub backend: BackendKind,
    pub manim_program: PathBuf,
    pub ffmpeg_program: Option<PathBuf>,
    pub timeout_seconds: u64,
    pub allow_script_override: bool,
    pub history_capacity: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_owned(),
            port: 8000,
            media_dir: PathBuf::from("media"),
            backend: BackendKind::Manim,
            manim_program: PathBuf::from("manim"),
            ffmpeg_program: None,
            timeout_seconds: DEFAULT_SERVER_TIMEOUT_SECONDS,
            allow_script_override: false,
            history_capacity: 20,
        }
    }
}

impl ServerConfig {
    pub fn validate(&self) -> Result<()> {
        if self.host.trim().is_empty() {
            bail!("host cannot be empty");
        }
        if self.timeout_seconds == 0 {
            bail!("timeout_seconds must be > 0");
        }
        if self.media_dir.as_os_str().is_empty() {
            bail!("media_dir cannot be empty");
        }
        if self.manim_program.as_os_str().is_empty() {
            bail!("manim_program cannot be empty");
        }
        if self.history_capacity == 0 {
            bail!("history_capacity must be > 0");
        }
        Ok(())
    }

    pub fn bind_address(&self) -> (String, u16) {
        (self.host.clone(), self.port)
    }

    pub fn orchestrator_settings(&self) -> OrchestratorSettings {
        OrchestratorSettings {
            media_root: self.media_dir.clone(),
            backend: self.backend,
            manim_program: self.manim_program.clone(),
            ffmpeg_program: self.ffmpeg_program.clone(),
            timeout: Duration::from_secs(self.timeout_seconds),
            allow_script_override: self.allow_script_override,
        }
    }
}

pub fn load_config(path: &Path) -> Result<ServerConfig> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("failed to read config {}", path.display()))?;
    let config: ServerConfig = serde_yaml::from_str(&contents).map_err(|error| {
        let location = error
            .location()
            .map(|location| format!("line {}, column {}", location.line(), location.column()))
            .unwrap_or_else(|| "unknown location".to_owned());
        anyhow!(
            "failed to parse yaml in {} at {}: {}",
            path.display(),
            location,
            error
        )
    })?;
    config.validate()?;
    Ok(config)
}
