//! cfsync Daemon - mirrors a local directory into a Cloud Files container
//!
//! Startup sequence:
//! 1. Parse flags, load and validate the configuration
//! 2. Install logging, claim the PID file
//! 3. Load the exclusion file, authenticate, initialise the file watcher
//! 4. Run the startup reconciliation, then mirror events until a signal arrives
//!
//! The first SIGINT, SIGTERM or SIGQUIT starts the shutdown sequence; later
//! ones are logged and ignored. Any fatal condition makes the process exit
//! non-zero.

mod cli;
mod logging;
mod pidfile;

use std::sync::Arc;

use anyhow::{bail, Context, Result};
use cfsync_core::config::{Config, WORKER_WARN_THRESHOLD};
use cfsync_swift::client::SwiftClient;
use cfsync_swift::identity::{EndpointKind, KeystoneIdentity};
use cfsync_sync::{
    AuthSession, EngineOptions, ExclusionFilter, NotifyBackend, SyncContext, SyncEngine,
};
use clap::Parser;
use tokio::signal::unix::{signal, Signal, SignalKind};
use tracing::{error, info, warn};

use cli::Cli;
use pidfile::PidFile;

// ============================================================================
// Signal handling
// ============================================================================

async fn next_signal(stream: &mut Option<Signal>) {
    match stream {
        Some(s) => {
            if s.recv().await.is_none() {
                std::future::pending::<()>().await;
            }
        }
        None => std::future::pending::<()>().await,
    }
}

fn install(kind: SignalKind, name: &str) -> Option<Signal> {
    match signal(kind) {
        Ok(stream) => Some(stream),
        Err(e) => {
            warn!(signal = name, error = %e, "Failed to install signal handler");
            None
        }
    }
}

/// Requests shutdown on the first termination signal; ignores the rest
async fn watch_signals(ctx: Arc<SyncContext>) {
    let mut interrupt = install(SignalKind::interrupt(), "SIGINT");
    let mut terminate = install(SignalKind::terminate(), "SIGTERM");
    let mut quit = install(SignalKind::quit(), "SIGQUIT");

    loop {
        let name = tokio::select! {
            _ = next_signal(&mut interrupt) => "SIGINT",
            _ = next_signal(&mut terminate) => "SIGTERM",
            _ = next_signal(&mut quit) => "SIGQUIT",
        };
        if ctx.is_shutting_down() {
            info!(signal = name, "Already shutting down, ignoring signal");
        } else {
            info!(signal = name, "Received signal, shutting down");
            ctx.request_shutdown();
        }
    }
}

// ============================================================================
// Daemon
// ============================================================================

async fn run(config: Config) -> Result<()> {
    let filter = ExclusionFilter::from_optional_file(config.sync.exclusion_file.as_deref())
        .context("Failed to load exclusion file")?;
    if !filter.is_empty() {
        info!(patterns = filter.len(), "Loaded exclusion patterns");
    }

    let endpoint_kind = if config.auth.internal_url {
        EndpointKind::Internal
    } else {
        EndpointKind::Public
    };
    let identity = KeystoneIdentity::new(
        config.auth.endpoint.as_str(),
        config.auth.username.as_str(),
        config.auth.api_key.as_str(),
    )?
    .with_region(config.auth.region.clone())
    .with_endpoint_kind(endpoint_kind);

    let options = EngineOptions::from_config(&config);
    let session = AuthSession::establish(Arc::new(identity), options.retry)
        .await
        .context("Initial authentication failed")?;
    let store = SwiftClient::new(config.storage.container.as_str())?;

    let ctx = Arc::new(SyncContext::new(
        config.sync.root.clone(),
        filter,
        Arc::new(store),
        session,
        options,
    ));

    let (backend, events) = NotifyBackend::new().context("Failed to initialise the file watcher")?;
    let signals = tokio::spawn(watch_signals(Arc::clone(&ctx)));

    let engine = SyncEngine::new(Arc::clone(&ctx))
        .start(Arc::new(backend), events)
        .await
        .context("Startup reconciliation failed");
    let engine = match engine {
        Ok(engine) => engine,
        Err(e) => {
            signals.abort();
            return Err(e);
        }
    };

    let outcome = engine.run_until_shutdown().await;
    signals.abort();
    let report = outcome?;

    info!(
        uploaded = report.workers.uploads.succeeded,
        deleted = report.workers.deletes.succeeded,
        copied = report.workers.copies.succeeded,
        discarded = report.discarded.total(),
        "Mirroring stopped"
    );
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = cli.load_config()?;

    if cli.quit {
        let pid = pidfile::signal_running(&config.daemon.pid_file)?;
        println!("Sent SIGTERM to cfsyncd (pid {pid})");
        return Ok(());
    }

    logging::init(
        &logging::level_for(cli.verbose, &config.logging.level),
        config.logging.file.as_deref(),
    )?;
    info!("cfsync daemon starting (cfsyncd)");

    let errors = config.validate();
    if !errors.is_empty() {
        for e in &errors {
            error!(field = %e.field, message = %e.message, "Invalid configuration");
        }
        bail!("Invalid configuration ({} errors)", errors.len());
    }

    let total_workers = config.total_workers();
    if total_workers > WORKER_WARN_THRESHOLD {
        warn!(
            workers = total_workers,
            threshold = WORKER_WARN_THRESHOLD,
            "Large worker count; the storage service may throttle"
        );
    }

    let _pid_file = PidFile::acquire(&config.daemon.pid_file)?;

    let result = run(config).await;
    match &result {
        Ok(()) => info!("cfsync daemon shut down gracefully"),
        Err(e) => error!(error = %format!("{e:#}"), "cfsync daemon exiting with error"),
    }
    result
}
