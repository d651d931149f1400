use anyhow::Result;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use oauth2_token_service::core::ReqwestHttpTransport;
use oauth2_token_service::{
    make_router, AppState, HttpSessionExchange, PostgresTokenStore, ServiceConfig,
};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = ServiceConfig::from_env()?;

    let store = Arc::new(PostgresTokenStore::connect(&config.database).await?);
    store.init_schema().await?;

    let transport = Arc::new(ReqwestHttpTransport::new());
    let exchange = Arc::new(HttpSessionExchange::new(
        config.provider.clone(),
        config.credentials.clone(),
        transport.clone(),
    ));

    let port = config.port;
    let state = AppState::new(config, transport, store, exchange);
    let app = make_router(state);

    let listener = tokio::net::TcpListener::bind(("0.0.0.0", port)).await?;
    tracing::info!(port, "token service listening");
    axum::serve(listener, app).await?;

    Ok(())
}
