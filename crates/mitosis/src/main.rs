//! mitosis: a stateless controller replicating config maps and secrets
//! across namespaces, driven entirely by annotations on the objects.

use std::collections::BTreeSet;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::get;
use axum::Router;
use clap::Parser;
use tokio::net::TcpListener;
use tokio::signal;
use tracing::info;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use mitosis_client::{ClusterCredentials, HttpCluster};
use mitosis_core::config::parse_labels;
use mitosis_core::{AnnotationKeys, ReplicatorOptions};
use mitosis_engine::{new_config_map_replicator, new_secret_replicator, ReplicatorHandle};

mod cli;

use cli::{Cli, LogFormat};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.log_format);

    let labels =
        parse_labels(&cli.create_with_labels).context("invalid --create-with-labels")?;
    let options = ReplicatorOptions {
        allow_all: cli.allow_all,
        ignore_unknown: cli.ignore_unknown,
        labels,
        keys: AnnotationKeys::new(&cli.annotations_prefix),
    };

    let credentials = match &cli.kube_config {
        Some(path) => {
            info!(path = %path.display(), "using credentials file");
            ClusterCredentials::from_file(path)?
        }
        None => {
            info!("using in-cluster configuration");
            ClusterCredentials::in_cluster()?
        }
    };
    let client =
        Arc::new(HttpCluster::connect(&credentials).context("cannot build cluster client")?);

    let mut kinds: BTreeSet<&str> = BTreeSet::new();
    for name in cli.run_replicators.split(',') {
        match name.trim().to_ascii_lowercase().as_str() {
            "" => {}
            "all" => {
                kinds.insert("configmap");
                kinds.insert("secret");
            }
            "configmap" => {
                kinds.insert("configmap");
            }
            "secret" => {
                kinds.insert("secret");
            }
            other => bail!("no replicator named \"{other}\""),
        }
    }
    if kinds.is_empty() {
        bail!("no replicators enabled");
    }

    let mut handles: Vec<ReplicatorHandle> = Vec::new();
    for kind in kinds {
        match kind {
            "configmap" => {
                let replicator =
                    new_config_map_replicator(client.clone(), options.clone(), cli.resync_period);
                handles.push(replicator.handle());
                tokio::spawn(replicator.run());
            }
            "secret" => {
                let replicator =
                    new_secret_replicator(client.clone(), options.clone(), cli.resync_period);
                handles.push(replicator.handle());
                tokio::spawn(replicator.run());
            }
            _ => unreachable!(),
        }
    }
    info!(prefix = %options.keys.prefix(), count = handles.len(), "replicators started");

    let app = Router::new().route("/healthz", get(healthz)).with_state(handles);
    let listener = TcpListener::bind(cli.status_address)
        .await
        .with_context(|| format!("cannot bind status server to {}", cli.status_address))?;
    info!(address = %cli.status_address, "liveness server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("status server error")?;

    info!("shutdown complete");
    Ok(())
}

async fn healthz(State(handles): State<Vec<ReplicatorHandle>>) -> (StatusCode, String) {
    let pending: Vec<&str> =
        handles.iter().filter(|handle| !handle.synced()).map(ReplicatorHandle::name).collect();
    if pending.is_empty() {
        (StatusCode::OK, "ok\n".to_string())
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, format!("not synced: {}\n", pending.join(", ")))
    }
}

fn init_logging(format: LogFormat) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    let fmt_layer = tracing_subscriber::fmt::layer();

    match format {
        LogFormat::Json => {
            tracing_subscriber::registry().with(filter).with(fmt_layer.json()).init();
        }
        LogFormat::Pretty => {
            tracing_subscriber::registry().with(filter).with(fmt_layer).init();
        }
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c().await.expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("received Ctrl+C, shutting down");
        }
        _ = terminate => {
            info!("received SIGTERM, shutting down");
        }
    }
}
