// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

use anyhow::Result;
use kube::Client;
use provisor::{
    cluster::KubeconfigClusterResolver, config::Config, constants::TOKIO_WORKER_THREADS,
    context::Context, controller::run_service_instance_controller, metrics::serve_metrics,
    plans::PlanResourceManager,
};
use std::sync::Arc;
use tracing::{debug, error, info};

fn main() -> Result<()> {
    // Build Tokio runtime with custom thread names
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(TOKIO_WORKER_THREADS)
        .thread_name("provisor-controller")
        .enable_all()
        .build()?;

    runtime.block_on(async_main())
}

async fn async_main() -> Result<()> {
    // Initialize logging with custom format
    // Format: timestamp file:line LEVEL message
    // Example: 2025-11-29T23:45:00.123456Z main.rs:49 INFO Starting Provisor
    //
    // Respects RUST_LOG environment variable if set, otherwise defaults to INFO level
    // Example: RUST_LOG=debug cargo run
    //
    // Respects RUST_LOG_FORMAT environment variable for output format
    // Example: RUST_LOG_FORMAT=json cargo run
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    let log_format = std::env::var("RUST_LOG_FORMAT").unwrap_or_else(|_| "text".to_string());

    match log_format.to_lowercase().as_str() {
        "json" => {
            tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_file(true)
                .with_line_number(true)
                .with_thread_names(true)
                .with_target(false)
                .json()
                .init();
        }
        _ => {
            tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_file(true)
                .with_line_number(true)
                .with_thread_names(true)
                .with_target(false)
                .with_ansi(true)
                .compact()
                .init();
        }
    }

    info!("Starting Provisor Service Instance Controller");
    debug!("Logging initialized with file and line number tracking");

    let config = Config::from_env()?;
    debug!(?config, "Configuration loaded");

    // Initialize Kubernetes client
    debug!("Initializing Kubernetes client");
    let client = Client::try_default().await?;
    debug!("Kubernetes client initialized successfully");

    // Assemble the collaborators every reconcile pass works through
    let resolver = Arc::new(KubeconfigClusterResolver::new(
        client.clone(),
        config.target_kubeconfig_secret.clone(),
    ));
    let manager = Arc::new(PlanResourceManager::new());
    let metrics_bind_address = config.metrics_bind_address.clone();
    let context = Arc::new(Context::new(client, resolver, manager, config));

    info!("Starting controller");

    // Run the controller and metrics server concurrently.
    // Neither should ever exit on its own - if one does, we log it and exit
    // the main process. Signals end the process cleanly instead.
    tokio::select! {
        result = run_service_instance_controller(context) => {
            error!("CRITICAL: ServiceInstance controller exited unexpectedly: {:?}", result);
            result?;
            anyhow::bail!("ServiceInstance controller exited unexpectedly without error")
        }
        result = serve_metrics(&metrics_bind_address) => {
            error!("CRITICAL: Metrics server exited unexpectedly: {:?}", result);
            result?;
            anyhow::bail!("Metrics server exited unexpectedly without error")
        }
        result = tokio::signal::ctrl_c() => {
            result?;
            info!("Received SIGINT (Ctrl+C), initiating graceful shutdown...");
            info!("Stopping all controllers...");
            info!("Graceful shutdown completed successfully");
            Ok(())
        }
        result = sigterm() => {
            result?;
            info!("Received SIGTERM (pod termination), initiating graceful shutdown...");
            info!("Stopping all controllers...");
            info!("Graceful shutdown completed successfully");
            Ok(())
        }
    }
}

/// Wait for SIGTERM. Never resolves on platforms without Unix signals.
async fn sigterm() -> Result<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut sigterm = signal(SignalKind::terminate())?;
        sigterm.recv().await;
        Ok(())
    }
    #[cfg(not(unix))]
    {
        std::future::pending::<()>().await;
        unreachable!()
    }
}
