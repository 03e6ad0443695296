use std::sync::Arc;

use taste_api::{
    config::Config,
    routes::create_router,
    services::{
        pipeline::TastePipeline,
        providers::{emby::EmbyServer, gemini::GeminiNarrator, qloo::QlooInsights},
    },
    state::AppState,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "taste_api=info,tower_http=info".into()),
        )
        .init();

    // Missing credentials abort startup; every failure past this point
    // degrades to an empty answer instead.
    let config = Config::from_env()?;

    let media = EmbyServer::new(
        config.media_server_url.clone(),
        config.media_api_key.clone(),
        config.content_kind,
    )?;
    let taste = QlooInsights::new(config.taste_api_key.clone(), config.taste_api_url.clone())?;
    let narrator = GeminiNarrator::new(
        config.gemini_api_key.clone(),
        config.gemini_api_url.clone(),
        config.gemini_model.clone(),
    )?;

    let pipeline = TastePipeline::new(
        Arc::new(media),
        Arc::new(taste),
        Arc::new(narrator),
        &config,
    );
    let state = AppState::new(pipeline);
    let app = create_router(state);

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(addr = %addr, "taste-api listening");
    axum::serve(listener, app).await?;

    Ok(())
}
