use care_flow::TracingSink;
use intake_service::{ServiceConfig, create_app, telemetry::init_tracing};
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;

// Session state machines assume a single cooperative event loop.
#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = ServiceConfig::from_env();
    info!(
        port = config.port,
        processing_delay_ms = config.processing_delay.as_millis() as u64,
        eta_tick_secs = config.eta_tick.as_secs(),
        seeded = config.rng_seed.is_some(),
        locale = %config.locale,
        "configuration loaded"
    );

    let app = create_app(&config, Arc::new(TracingSink))?;
    let listener = TcpListener::bind(("0.0.0.0", config.port)).await?;
    let addr = listener.local_addr()?;

    info!("Healthcare Intake Service starting on {}", addr);
    info!("API overview available at http://{}/", addr);
    info!("Health check endpoint: http://{}/health", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
