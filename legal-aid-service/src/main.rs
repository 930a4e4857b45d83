use anyhow::Context;
use legal_aid_service::{
    AppConfig, AppState, LegalAssistant, PipelineDeps, build_router, telemetry::init_tracing,
};
use tokio::net::TcpListener;
use tracing::{error, info};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = AppConfig::from_env().inspect_err(|e| error!(error = %e, "Invalid configuration"))?;
    let deps = PipelineDeps::from_config(&config)
        .await
        .inspect_err(|e| error!(error = %e, "Startup failed"))?;

    let state = AppState {
        assistant: LegalAssistant::new(&deps),
    };
    let app = build_router(state, &config.allowed_origins);

    let listener = TcpListener::bind((config.bind_addr.as_str(), config.port))
        .await
        .with_context(|| format!("binding {}:{}", config.bind_addr, config.port))?;
    let addr = listener.local_addr()?;

    info!(%addr, "Legal aid service listening");
    info!("Query endpoint: POST http://{}/query", addr);

    axum::serve(listener, app).await?;
    Ok(())
}
