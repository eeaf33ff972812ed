#![forbid(unsafe_code)]

use std::{env, net::SocketAddr, sync::Arc};

use access_adapter::{build_router, AdapterRuntime};
use access_os::AccessWorkflowConfig;
use tracing::info;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    let bind = env::var("ACCESS_HTTP_BIND").unwrap_or_else(|_| "127.0.0.1:8080".to_string());
    let addr: SocketAddr = bind.parse()?;
    let config = AccessWorkflowConfig::from_env()?;

    let runtime = Arc::new(AdapterRuntime::from_config(&config)?);
    let sweeper = runtime.sweeper().spawn_periodic(config.sweep_interval);
    let app = build_router(runtime);

    info!(
        %addr,
        sweep_interval_secs = config.sweep_interval.as_secs(),
        interpret_endpoint = %config.interpret.endpoint(),
        cli_mode = config.cli_policy_document_mode.as_str(),
        "access_adapter_http listening"
    );
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    sweeper.abort();
    info!("access_adapter_http stopped");
    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env("ACCESS_LOG")
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(true))
        .init();
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_err() {
        std::future::pending::<()>().await;
    }
}
