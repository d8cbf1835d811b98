use roam_api::api::{create_router, AppState};
use roam_api::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "roam_api=info,tower_http=info".into()),
        )
        .init();

    let config = Config::from_env()?;
    // Bad engine settings must kill the process before any request is served
    let engine = config.engine().map_err(|e| anyhow::anyhow!(e))?;
    let state = AppState::in_memory(engine).map_err(|e| anyhow::anyhow!(e))?;

    let app = create_router(state).layer(tower_http::trace::TraceLayer::new_for_http());

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(%addr, "Server listening");
    axum::serve(listener, app).await?;

    Ok(())
}
