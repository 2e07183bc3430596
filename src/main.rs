//! registry-proxy-sync daemon.
//!
//! Watches a service registry and keeps one reverse-proxy config file per
//! selected service, reloading the proxy after every change.
//!
//! # Architecture Overview
//!
//! ```text
//!   ┌──────────────┐  snapshot   ┌──────────────────┐  write/delete  ┌───────────────┐
//!   │   registry   │────────────▶│    reconcile     │───────────────▶│     store     │
//!   │ k8s / file   │   (poll)    │ cache + selector │                │ render + file │
//!   └──────────────┘             └────────┬─────────┘                └───────┬───────┘
//!                                         │ handle                           │ reload
//!                                ┌────────┴─────────┐                ┌───────▼───────┐
//!                                │    admin API     │                │     proxy     │
//!                                └──────────────────┘                │ validate/apply│
//!                                                                    └───────────────┘
//! ```

use clap::Parser;
use std::error::Error;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;

use registry_proxy_sync::admin::{self, AppState};
use registry_proxy_sync::config::{load_config, load_from_env, SyncConfig};
use registry_proxy_sync::lifecycle::{wait_for_signal, Shutdown};
use registry_proxy_sync::observability::{logging, metrics};
use registry_proxy_sync::proxy::CommandController;
use registry_proxy_sync::reconcile::{LabelPresent, PassReport, Reconciler, ReconcilerHandle};
use registry_proxy_sync::registry::{build_source, run_watch, sync_once};
use registry_proxy_sync::render::ArtifactRenderer;
use registry_proxy_sync::store::ArtifactStore;

#[derive(Parser)]
#[command(name = "registry-proxy-sync")]
#[command(about = "Keep reverse-proxy configuration in sync with a service registry", long_about = None)]
struct Args {
    /// TOML configuration file; defaults plus environment variables when omitted
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Load configuration and compile the template, then exit
    #[arg(long)]
    check: bool,

    /// Run a single fetch and pass, then exit
    #[arg(long)]
    once: bool,
}

/// Exit status of a `--once` run.
fn pass_outcome(report: &PassReport) -> Result<(), String> {
    if report.is_clean() {
        return Ok(());
    }
    let mut message = format!(
        "pass {} finished with {} failure(s)",
        report.id,
        report.failures.len()
    );
    if let Some(reload) = &report.reload_error {
        message.push_str(&format!("; end-of-pass reload failed: {reload}"));
    }
    Err(message)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();

    let config: SyncConfig = match &args.config {
        Some(path) => load_config(path)?,
        None => load_from_env()?,
    };

    logging::init_logging(&config.observability);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "registry-proxy-sync starting");

    let renderer = ArtifactRenderer::from_config(&config.artifacts)?;
    if args.check {
        tracing::info!("Configuration and template OK");
        return Ok(());
    }

    tracing::info!(
        dir = ?config.artifacts.dir,
        domain = %config.artifacts.domain,
        label = %config.selection.label,
        reload_mode = ?config.reconcile.reload_mode,
        replace_strategy = ?config.reconcile.replace_strategy,
        "Configuration loaded"
    );

    let controller = Arc::new(CommandController::from_config(&config.proxy));
    let store = ArtifactStore::new(&config.artifacts, renderer, controller);

    match store.artifact_names().await {
        Ok(existing) if !existing.is_empty() => {
            tracing::info!(count = existing.len(), names = ?existing, "Existing artifacts left untouched");
        }
        Ok(_) => {}
        Err(e) => tracing::warn!(dir = ?store.dir(), error = %e, "Cannot list artifact directory"),
    }

    let reconciler = Reconciler::new(
        store,
        LabelPresent::new(config.selection.label.clone()),
        config.reconcile.clone(),
    );
    let (handle, reconciler_task) = ReconcilerHandle::spawn(reconciler);

    let (source, trigger) = build_source(&config.registry)?;

    if args.once {
        let report = sync_once(source.as_ref(), &handle).await?;
        handle.shutdown().await?;
        reconciler_task.await?;
        pass_outcome(&report)?;
        tracing::info!(pass_id = %report.id, "Single pass complete");
        return Ok(());
    }

    if config.observability.metrics_enabled {
        let addr: SocketAddr = config.observability.metrics_address.parse()?;
        metrics::init_metrics(addr)?;
    }

    let shutdown = Shutdown::new();

    let admin_task = if config.admin.enabled {
        let listener = TcpListener::bind(&config.admin.bind_address).await?;
        let state = AppState::new(handle.clone(), &config.admin.api_key);
        Some(tokio::spawn(admin::serve(listener, state, shutdown.subscribe())))
    } else {
        None
    };

    let watch_task = tokio::spawn(run_watch(
        source,
        Duration::from_secs(config.registry.poll_interval_secs),
        trigger,
        handle.clone(),
        shutdown.subscribe(),
    ));

    wait_for_signal().await;
    shutdown.trigger();

    watch_task.await?;
    if let Some(task) = admin_task {
        if let Err(e) = task.await? {
            tracing::error!(error = %e, "Admin API stopped with an error");
        }
    }

    handle.shutdown().await?;
    reconciler_task.await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
