use anyhow::Result;
use tracing_subscriber::EnvFilter;

mod api;
mod config;
mod engine;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let config = config::Config::from_env();
    tracing::info!(
        model_dir = %config.model_dir.display(),
        accept_similarity = config.accept_similarity,
        "attestd starting"
    );

    let engine = engine::spawn_engine(&config)?;
    let app = api::router(engine, config.max_upload_bytes);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    tracing::info!(addr = %config.bind_addr, "attestd listening");
    axum::serve(listener, app).await?;

    Ok(())
}
