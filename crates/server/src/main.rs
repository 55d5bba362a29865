//! Interview agent server binary

use std::path::PathBuf;

use anyhow::Context;
use metrics_exporter_prometheus::PrometheusBuilder;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use interview_config::load_settings;
use interview_server::{create_router, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config_path = std::env::var("INTERVIEW_CONFIG").ok().map(PathBuf::from);
    let settings = load_settings(config_path.as_deref()).context("failed to load settings")?;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(settings.observability.log_filter.clone()));
    if settings.observability.json_logs {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }

    let metrics = if settings.observability.metrics_enabled {
        Some(
            PrometheusBuilder::new()
                .install_recorder()
                .context("failed to install metrics recorder")?,
        )
    } else {
        None
    };

    let addr = format!("{}:{}", settings.server.host, settings.server.port);
    let state = AppState::new(settings, metrics);
    let router = create_router(state);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    tracing::info!(addr = %addr, "Interview agent listening");

    axum::serve(listener, router).await.context("server error")?;

    Ok(())
}
