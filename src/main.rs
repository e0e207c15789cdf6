use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};

use promptanim::animation::RenderRequest;
use promptanim::config::{load_config, ServerConfig, DEFAULT_CLI_TIMEOUT_SECONDS};
use promptanim::error_codes::{find_coded_error, CodedError};
use promptanim::prompt_parser::{parse_prompt_request, ParsedPrompt};
use promptanim::render::{BackendKind, OrchestratorSettings, RenderOrchestrator};
use promptanim::server;
use promptanim::telemetry::{self, LogFormat, LogLevel};

#[derive(Debug, Parser)]
#[command(name = "promptanim")]
#[command(version = env!("PROMPTANIM_LONG_VERSION"))]
#[command(about = "Turn a one-line shape animation prompt into a rendered video")]
struct Cli {
    /// Log level (RUST_LOG overrides)
    #[arg(long, global = true, value_enum, default_value_t = LogLevel::Info)]
    log_level: LogLevel,

    /// Log format
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Compact)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Run the HTTP API.
    Serve(ServeArgs),
    /// Show the configuration a prompt parses to.
    Parse {
        prompt: String,
        #[arg(long)]
        json: bool,
    },
    /// Print the Manim scene generated for a prompt.
    Script { prompt: String },
    /// Parse a prompt and render it once, printing the video path.
    Render(RenderArgs),
}

#[derive(Debug, Args)]
struct ServeArgs {
    /// YAML file with server settings; flags below override it.
    #[arg(long, env = "PROMPTANIM_CONFIG")]
    config: Option<PathBuf>,
    #[arg(long, env = "PROMPTANIM_HOST")]
    host: Option<String>,
    #[arg(long, env = "PROMPTANIM_PORT")]
    port: Option<u16>,
    #[arg(long, env = "PROMPTANIM_MEDIA_DIR")]
    media_dir: Option<PathBuf>,
    #[arg(long, value_enum, env = "PROMPTANIM_BACKEND")]
    backend: Option<BackendKind>,
    #[arg(long, env = "PROMPTANIM_MANIM")]
    manim_program: Option<PathBuf>,
    #[arg(long, env = "PROMPTANIM_FFMPEG")]
    ffmpeg_program: Option<PathBuf>,
    #[arg(long, env = "PROMPTANIM_TIMEOUT_SECONDS")]
    timeout_seconds: Option<u64>,
    /// Let callers send raw scene scripts. They run unsandboxed.
    #[arg(long, default_value_t = false)]
    allow_script_override: bool,
}

#[derive(Debug, Args)]
struct RenderArgs {
    prompt: String,
    #[arg(long, default_value = "media")]
    media_dir: PathBuf,
    #[arg(long, value_enum, default_value_t = BackendKind::Manim)]
    backend: BackendKind,
    #[arg(long, env = "PROMPTANIM_MANIM", default_value = "manim")]
    manim_program: PathBuf,
    #[arg(long, env = "PROMPTANIM_FFMPEG")]
    ffmpeg_program: Option<PathBuf>,
    #[arg(long, default_value_t = DEFAULT_CLI_TIMEOUT_SECONDS)]
    timeout_seconds: u64,
    #[arg(long)]
    json: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    telemetry::init(cli.log_level, cli.log_format);

    let json_errors = matches!(
        cli.command,
        Commands::Parse { json: true, .. } | Commands::Render(RenderArgs { json: true, .. })
    );

    let result = match cli.command {
        Commands::Serve(args) => run_serve(args),
        Commands::Parse { prompt, json } => run_parse(&prompt, json),
        Commands::Script { prompt } => run_script(&prompt),
        Commands::Render(args) => run_render(args),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            match find_coded_error(&error).filter(|_| json_errors) {
                Some(coded) => match serde_json::to_string_pretty(&coded.envelope()) {
                    Ok(body) => println!("{body}"),
                    Err(_) => eprintln!("error: {error:#}"),
                },
                None => eprintln!("error: {error:#}"),
            }
            ExitCode::FAILURE
        }
    }
}

fn run_serve(args: ServeArgs) -> Result<()> {
    let mut config = match &args.config {
        Some(path) => load_config(path)?,
        None => ServerConfig::default(),
    };
    if let Some(host) = args.host {
        config.host = host;
    }
    if let Some(port) = args.port {
        config.port = port;
    }
    if let Some(media_dir) = args.media_dir {
        config.media_dir = media_dir;
    }
    if let Some(backend) = args.backend {
        config.backend = backend;
    }
    if let Some(program) = args.manim_program {
        config.manim_program = program;
    }
    if let Some(program) = args.ffmpeg_program {
        config.ffmpeg_program = Some(program);
    }
    if let Some(timeout) = args.timeout_seconds {
        config.timeout_seconds = timeout;
    }
    config.allow_script_override |= args.allow_script_override;

    actix_web::rt::System::new().block_on(server::run(config))
}

fn parse_or_usage(prompt: &str) -> Result<ParsedPrompt> {
    parse_prompt_request(prompt)
        .map_err(|error| CodedError::usage("invalid_prompt", format!("{error:#}")).into())
}

fn run_parse(prompt: &str, json: bool) -> Result<()> {
    let parsed = parse_or_usage(prompt)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&parsed)?);
        return Ok(());
    }

    let config = parsed.config;
    println!("shape:     {}", config.shape);
    println!("color:     {}", config.color);
    println!("animation: {}", config.animation);
    println!("duration:  {}s", config.duration);
    Ok(())
}

fn run_script(prompt: &str) -> Result<()> {
    let parsed = parse_or_usage(prompt)?;
    print!("{}", parsed.script);
    Ok(())
}

fn run_render(args: RenderArgs) -> Result<()> {
    let parsed = parse_or_usage(&args.prompt)?;
    let settings = OrchestratorSettings {
        media_root: args.media_dir,
        backend: args.backend,
        manim_program: args.manim_program,
        ffmpeg_program: args.ffmpeg_program,
        timeout: Duration::from_secs(args.timeout_seconds),
        allow_script_override: false,
    };
    let orchestrator =
        RenderOrchestrator::new(&settings).context("failed to set up render orchestrator")?;

    let outcome = orchestrator
        .render(&RenderRequest::from_config(parsed.config))
        .map_err(|error| anyhow::Error::new(CodedError::from(error)))?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
    } else {
        println!("{}", outcome.video_path.display());
    }
    Ok(())
}
