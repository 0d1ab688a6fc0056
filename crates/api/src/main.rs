use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing::{error, info};

use staffgate_api::app::{self, services};
use staffgate_api::config::Config;
use staffgate_infra::reconcile::spawn_reconciler;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::parse();
    staffgate_observability::init(config.log_format());

    let services = match services::build_services(&config).await {
        Ok(s) => Arc::new(s),
        Err(e) => {
            error!(error = %e, "failed to initialise backends");
            std::process::exit(1);
        }
    };

    if let (Some(every), Ok(provisioner)) = (config.reconcile_interval(), services.provisioner()) {
        info!(every_secs = every.as_secs(), "starting reconciliation sweeps");
        spawn_reconciler(provisioner.clone(), every);
    }

    let app = app::build_app(services);

    let addr = config.socket_addr();
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;

    info!("Server running on port {}", listener.local_addr()?.port());

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("shutting down");
}
