use dotenvy::dotenv;
use tracing::info;

use learnhub::infra::{
    app::create_app,
    config::AppConfig,
    error::InfraError,
    setup::{init_app_state, init_tracing},
};
use std::net::SocketAddr;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    let config = AppConfig::from_env()?;
    init_tracing(config.log_file.as_deref())?;

    // Read bind address from config before moving it into the app state
    let bind_addr = config.bind_addr;

    let app_state = init_app_state(config).await?;
    let app = create_app(app_state);

    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .map_err(InfraError::TcpBind)?;

    info!("Backend listening at {}", &listener.local_addr()?);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
