//! Instancetype Controller
//!
//! Freezes the instance type and preference referenced by every
//! `VirtualMachine` into immutable `ControllerRevision`s and pins the
//! virtual machine to them, so later edits of the live templates never
//! change an existing virtual machine.
//!
//! It also serves `ControllerRevisionUpgrade` requests, migrating a stored
//! revision to the latest schema version.

mod backoff;
mod config;
mod controller;
mod error;
mod reconciler;
mod watcher;

use crate::config::ControllerConfig;
use crate::error::ControllerError;
use controller::Controller;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), ControllerError> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    // Must happen before the kube client builds its TLS configuration
    if rustls::crypto::ring::default_provider().install_default().is_err() {
        debug!("rustls crypto provider already installed");
    }

    info!("Starting Instancetype Controller");

    let config = ControllerConfig::from_env()?;
    info!("Configuration:");
    info!("  Namespace: {}", config.namespace.as_deref().unwrap_or("all namespaces"));
    info!("  Workers per watcher: {}", config.worker_concurrency);
    info!(
        "  Requeue backoff: {}s..{}s, {} retries",
        config.requeue_base.as_secs(),
        config.requeue_max.as_secs(),
        config.max_retries
    );

    let controller = Controller::new(config).await?;
    controller.run().await?;

    info!("Instancetype Controller stopped");
    Ok(())
}
