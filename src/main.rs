// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
use anyhow::{Context, Result};
use kube::Client;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use preview_controller::build::DockerBuilder;
use preview_controller::config::Config;
use preview_controller::jobs::{self, IdentityLocks, JobProcessor, WorkerPool};
use preview_controller::notify::{GitHubCommenter, Notifier, SlackNotifier};
use preview_controller::preview::MappingFile;
use preview_controller::reconcilers::{Reconciler, StaleCleaner};
use preview_controller::webhook::{self, AppState};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    info!("Starting preview controller");

    // Load configuration
    let config = Arc::new(Config::from_env()?);
    let mapping = Arc::new(MappingFile::load(&config.mapping_file)?);
    info!(
        "Configuration loaded: namespace_mode={} workers={} queue_size={} build={}",
        config.preview.namespace_mode,
        config.workers,
        config.queue_size,
        config.build.is_some()
    );

    // Create Kubernetes client
    let client = Client::try_default().await?;
    info!("Connected to Kubernetes cluster");

    let reconciler = Reconciler::new(client);
    let locks = IdentityLocks::new();
    let shutdown = CancellationToken::new();

    let mut notifiers: Vec<Arc<dyn Notifier>> = Vec::new();
    if let Some(slack) = config.slack.clone() {
        notifiers.push(Arc::new(SlackNotifier::new(slack)?));
    } else {
        warn!("Slack not configured; notifications disabled");
    }
    if let Some(token) = &config.github.token {
        notifiers.push(Arc::new(GitHubCommenter::new(token, &config.github.api_url)?));
    }

    let processor = Arc::new(JobProcessor::new(
        reconciler.clone(),
        Arc::new(DockerBuilder::new(config.github.token.clone())),
        notifiers,
        locks.clone(),
        config.timeouts.clone(),
    ));
    let (queue, receiver) = jobs::channel(config.queue_size);
    let workers = WorkerPool::spawn(config.workers, receiver, processor);

    let cleaner = config.cleanup.enabled.then(|| {
        let cleaner = StaleCleaner::new(
            reconciler.clone(),
            locks.clone(),
            config.preview.namespace_mode,
            config.cleanup.clone(),
            config.timeouts.cleanup,
        );
        tokio::spawn(cleaner.run(shutdown.clone()))
    });

    tokio::spawn(wait_for_signal(shutdown.clone()));

    let listener = TcpListener::bind(&config.listen_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.listen_addr))?;
    let state = AppState {
        queue,
        config: config.clone(),
        mapping,
        shutdown: shutdown.clone(),
    };
    // Returns once shutdown fired and in-flight requests finished; the
    // queue closes with it
    webhook::serve(listener, state, shutdown.clone()).await?;

    info!("HTTP server stopped, draining workers");
    shutdown.cancel();
    workers.shutdown(config.timeouts.shutdown_grace).await;
    if let Some(cleaner) = cleaner {
        let _ = cleaner.await;
    }

    info!("Preview controller stopped");
    Ok(())
}

async fn wait_for_signal(shutdown: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for ctrl-c: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received ctrl-c, shutting down"),
        _ = terminate => info!("Received SIGTERM, shutting down"),
    }
    shutdown.cancel();
}
