//! # Yatube Web Server
//!
//! Server-rendered blog: feeds, groups, profiles, comments and follows.

use actix_web::{App, HttpServer, web};
use std::sync::Arc;
use tracing_actix_web::TracingLogger;

use yatube_core::ports::RateLimiter;

mod config;
mod handlers;
mod middleware;
mod observability;
mod state;
mod telemetry;
mod templates;
mod views;

use config::AppConfig;
use observability::RequestIdMiddleware;
use state::AppState;
use telemetry::TelemetryConfig;

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    telemetry::init_telemetry(&TelemetryConfig::from_env());

    // Template errors surface at startup rather than on first request
    templates::init()?;

    let config = AppConfig::from_env();

    tracing::info!(
        "Starting Yatube web server on {}:{}",
        config.host,
        config.port
    );

    tokio::fs::create_dir_all(&config.site.media_root).await?;

    let state = AppState::new(&config).await?;
    let limiter = build_rate_limiter(&config);
    let max_upload_bytes = config.site.max_upload_bytes;

    HttpServer::new(move || {
        let limiter = limiter.clone();
        App::new()
            .wrap(RequestIdMiddleware)
            .wrap(TracingLogger::default())
            .app_data(web::Data::new(state.clone()))
            .app_data(web::PayloadConfig::new(max_upload_bytes))
            .configure(move |cfg| handlers::configure_routes(cfg, limiter))
    })
    .bind((config.host.as_str(), config.port))?
    .run()
    .await?;

    Ok(())
}

#[cfg(feature = "rate-limit")]
fn build_rate_limiter(config: &AppConfig) -> Option<Arc<dyn RateLimiter>> {
    match yatube_infra::InMemoryRateLimiter::new(config.rate_limit.clone()) {
        Ok(limiter) => Some(Arc::new(limiter)),
        Err(e) => {
            tracing::warn!(error = %e, "Rate limiting disabled");
            None
        }
    }
}

#[cfg(not(feature = "rate-limit"))]
fn build_rate_limiter(_config: &AppConfig) -> Option<Arc<dyn RateLimiter>> {
    None
}
