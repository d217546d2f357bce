use std::sync::Arc;

use anyhow::Context;
use axum::extract::DefaultBodyLimit;
use axum::http::HeaderValue;
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

mod config;
mod routes;

use config::AppConfig;
use invex_extract::{ExtractorEngine, LlmConfig, LlmExtractor};
use invex_ocr::ScanPipeline;
use routes::{AppState, MAX_UPLOAD_BYTES};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = AppConfig::from_env();
    tracing::info!("loaded config: {config:?}");

    let engine = build_engine(&config);
    tracing::info!("structured extractor: {}", engine.name());

    let ocr = invex_ocr::default_backend(&config.tesseract_lang)
        .map(|backend| Arc::new(ScanPipeline::new(backend)));
    if ocr.is_none() {
        tracing::warn!("no OCR backend built in; image inputs will be rejected");
    }

    let state = Arc::new(AppState { engine, ocr });

    let cors = match &config.cors_origin {
        Some(origin) => CorsLayer::new()
            .allow_origin(origin.parse::<HeaderValue>().context("invalid CORS_ORIGIN")?)
            .allow_methods(Any)
            .allow_headers(Any),
        None => CorsLayer::permissive(),
    };

    let app = routes::router(state)
        .layer(TraceLayer::new_for_http())
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(MAX_UPLOAD_BYTES))
        .layer(cors);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    tracing::info!("listening on {addr}");
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("could not bind {addr}"))?;
    axum::serve(listener, app).await?;
    Ok(())
}

/// Prefer the LLM extractor when it can do anything (an API key is set, or
/// dry-run is on); otherwise the rule-based path.
fn build_engine(config: &AppConfig) -> ExtractorEngine {
    if !config.llm.dry_run && config.llm.api_key.is_none() {
        return ExtractorEngine::Rules;
    }
    let llm_config = LlmConfig {
        api_key: config.llm.api_key.clone().unwrap_or_default(),
        model: config.llm.model.clone(),
        base_url: config.llm.base_url.clone(),
        dry_run: config.llm.dry_run,
    };
    match LlmExtractor::new(llm_config) {
        Ok(llm) => ExtractorEngine::Llm(llm),
        Err(e) => {
            tracing::warn!("could not build LLM extractor, using rules: {e}");
            ExtractorEngine::Rules
        }
    }
}
