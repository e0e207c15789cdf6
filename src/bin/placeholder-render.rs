use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::error::ErrorKind;
use clap::Parser;

use promptanim::animation::AnimationConfig;
use promptanim::render::placeholder::{resolve_ffmpeg, write_placeholder_video};
use promptanim::telemetry::{self, LogFormat, LogLevel};

#[derive(Debug, Parser)]
#[command(name = "placeholder-render")]
#[command(about = "Render a flat colored placeholder clip from a JSON animation config")]
struct Cli {
    /// JSON config, e.g. '{"shape":"square","color":"red","animation_type":"grow","duration":3}'
    config_json: String,
    #[arg(long, env = "PROMPTANIM_PLACEHOLDER_DIR", default_value = "media/videos")]
    output_dir: PathBuf,
}

fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(error) if matches!(error.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => {
            let _ = error.print();
            return ExitCode::SUCCESS;
        }
        Err(error) => {
            let _ = error.print();
            return ExitCode::FAILURE;
        }
    };
    telemetry::init(LogLevel::Warn, LogFormat::Compact);

    match run(&cli) {
        Ok(path) => {
            println!("{}", path.display());
            ExitCode::SUCCESS
        }
        Err(error) => {
            eprintln!("placeholder render failed: {error:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> Result<PathBuf> {
    let config: AnimationConfig =
        serde_json::from_str(&cli.config_json).context("invalid JSON config")?;
    let ffmpeg = resolve_ffmpeg()?;
    write_placeholder_video(&ffmpeg, &config, &cli.output_dir)
}
