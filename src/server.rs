use actix_cors::Cors;
use actix_files::Files;
use actix_web::{web, HttpResponse, HttpServer};
use anyhow::{Context, Result};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::animation::RenderRequest;
use crate::config::ServerConfig;
use crate::error_codes::CodedError;
use crate::history::{RenderHistory, RenderRecord, DEFAULT_RECENT_LIMIT};
use crate::prompt_parser::parse_prompt_request;
use crate::render::{RenderOrchestrator, STATIC_URL_PREFIX};

pub struct AppState {
    pub orchestrator: RenderOrchestrator,
    pub history: RenderHistory,
}

impl AppState {
    pub fn new(orchestrator: RenderOrchestrator, history_capacity: usize) -> Self {
        Self {
            orchestrator,
            history: RenderHistory::new(history_capacity),
        }
    }

    pub fn from_config(config: &ServerConfig) -> Result<Self> {
        let orchestrator = RenderOrchestrator::new(&config.orchestrator_settings())
            .context("failed to set up render orchestrator")?;
        Ok(Self::new(orchestrator, config.history_capacity))
    }
}

#[derive(Debug, Deserialize)]
pub struct PromptBody {
    pub prompt: String,
}

#[derive(Debug, Serialize)]
pub struct RenderResponse {
    pub success: bool,
    pub video_url: String,
    pub render_id: String,
}

#[derive(Debug, Deserialize)]
pub struct RecentQuery {
    pub limit: Option<usize>,
}

/// Registers every route plus static serving of the media root.
pub fn configure(
    state: web::Data<AppState>,
) -> impl Fn(&mut web::ServiceConfig) + Clone + Send + 'static {
    move |cfg: &mut web::ServiceConfig| {
        let media_root = state.orchestrator.media_root().to_path_buf();
        cfg.app_data(state.clone())
            .app_data(json_config())
            .service(
                web::scope("")
                    .wrap(cors())
                    .route("/parse-prompt", web::post().to(parse_prompt))
                    .route("/render", web::post().to(render))
                    .route("/health", web::get().to(health))
                    .route("/animations/recent", web::get().to(recent_animations))
                    .service(Files::new(STATIC_URL_PREFIX, media_root)),
            );
    }
}

/// Any origin, method and header; preflight requests are answered here.
fn cors() -> Cors {
    Cors::default()
        .allow_any_origin()
        .send_wildcard()
        .allow_any_method()
        .allow_any_header()
        .max_age(3600)
}

fn json_config() -> web::JsonConfig {
    web::JsonConfig::default().error_handler(|error, _request| {
        tracing::warn!(%error, "rejected malformed request body");
        CodedError::usage("malformed_body", error.to_string()).into()
    })
}

async fn parse_prompt(body: web::Json<PromptBody>) -> Result<HttpResponse, CodedError> {
    let parsed = parse_prompt_request(&body.prompt)
        .map_err(|error| CodedError::usage("invalid_prompt", format!("{error:#}")))?;
    tracing::info!(config = %parsed.config.summary(), duration = parsed.config.duration, "prompt parsed");
    Ok(HttpResponse::Ok().json(parsed))
}

async fn render(
    state: web::Data<AppState>,
    body: web::Json<RenderRequest>,
) -> Result<HttpResponse, CodedError> {
    let request = body.into_inner();
    request
        .validate()
        .map_err(|error| CodedError::usage("invalid_config", format!("{error:#}")))?;

    let worker_state = state.clone();
    let worker_request = request.clone();
    let outcome = web::block(move || worker_state.orchestrator.render(&worker_request))
        .await
        .map_err(|error| CodedError::internal("render_worker", error.to_string()))?
        .map_err(|error| {
            tracing::error!(%error, "render failed");
            CodedError::from(error)
        })?;

    state.history.record(RenderRecord {
        render_id: outcome.render_id.clone(),
        prompt_summary: request.config.summary(),
        config: request.config,
        video_url: outcome.video_url.clone(),
        created_at: Utc::now(),
    });

    Ok(HttpResponse::Ok().json(RenderResponse {
        success: true,
        video_url: outcome.video_url,
        render_id: outcome.render_id,
    }))
}

async fn health() -> HttpResponse {
    HttpResponse::Ok().json(json!({ "status": "healthy" }))
}

async fn recent_animations(
    state: web::Data<AppState>,
    query: web::Query<RecentQuery>,
) -> HttpResponse {
    let limit = query.limit.unwrap_or(DEFAULT_RECENT_LIMIT);
    HttpResponse::Ok().json(state.history.recent(limit))
}

pub async fn run(config: ServerConfig) -> Result<()> {
    config.validate()?;
    let state = web::Data::new(AppState::from_config(&config)?);
    let (host, port) = config.bind_address();

    tracing::info!(
        %host,
        port,
        media_root = %state.orchestrator.media_root().display(),
        backend = state.orchestrator.backend_kind().as_str(),
        timeout_secs = config.timeout_seconds,
        script_override = config.allow_script_override,
        "starting promptanim server"
    );
    if config.allow_script_override {
        tracing::warn!("raw scene script overrides are enabled; callers can run arbitrary Python");
    }

    let routes = configure(state);
    HttpServer::new(move || actix_web::App::new().configure(routes.clone()))
        .bind((host.as_str(), port))
        .with_context(|| format!("failed to bind {host}:{port}"))?
        .run()
        .await
        .context("http server stopped with an error")
}
