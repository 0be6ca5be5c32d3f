// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::sync::Arc;

use alloy::signers::local::PrivateKeySigner;
use axum_server::tls_rustls::RustlsConfig;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use confidential_reporter::{
    api::router,
    blockchain::Chain,
    config::{LogFormat, ServiceConfig, DEFAULT_LOG_FILTER},
    deployment::{deploy_gasless_system, Deployment},
    indexer::ReportIndexer,
    relay::RelaySigner,
    state::AppState,
};

fn init_tracing(format: LogFormat) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Pretty => builder.init(),
    }
}

/// Reuse the persisted deployment or deploy a fresh one.
fn load_or_deploy(chain: &Chain, config: &ServiceConfig, relay: &PrivateKeySigner) -> Deployment {
    let existing = Deployment::load(chain).expect("Failed to read deployment record");
    let mut deployment = match existing {
        Some(deployment) => {
            tracing::info!(ledger = %deployment.ledger, proxy = %deployment.proxy, "using existing deployment");
            deployment
        }
        None => {
            let deployer = config.deployer_key.load().expect("Failed to load deployer key");
            deploy_gasless_system(chain, &deployer, relay.address())
                .expect("Failed to deploy gasless reporting system")
        }
    };

    if deployment.relay_signer != relay.address() {
        tracing::warn!(
            registered = %deployment.relay_signer,
            configured = %relay.address(),
            "relay key changed, rotating proxy signer"
        );
        let admin = config.deployer_key.load().expect("Failed to load deployer key");
        deployment
            .rotate_relay_signer(chain, &admin, relay.address())
            .expect("Failed to rotate relay signer");
    }

    deployment
        .verify(chain)
        .expect("Deployment verification failed");
    deployment
}

async fn shutdown_signal(shutdown: CancellationToken) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
    }
    tracing::info!("shutdown requested");
    shutdown.cancel();
}

#[tokio::main]
async fn main() {
    let config = ServiceConfig::from_env().expect("Invalid configuration");
    init_tracing(config.log_format);

    std::fs::create_dir_all(&config.data_dir).expect("Failed to create data directory");
    let chain = Arc::new(
        Chain::open(&config.chain_db_path(), config.network.clone(), config.gas)
            .expect("Failed to open state database"),
    );
    tracing::info!(
        network = chain.network().name,
        chain_id = chain.chain_id(),
        path = %config.chain_db_path().display(),
        "state database opened"
    );

    let relay_key = config.relay_key.load().expect("Failed to load relay signer key");
    let deployment = load_or_deploy(&chain, &config, &relay_key);

    if let Some(target) = config.relay_initial_balance {
        let credited = chain
            .top_up(relay_key.address(), target)
            .expect("Failed to fund relay signer");
        tracing::info!(signer = %relay_key.address(), %credited, %target, "relay signer balance topped up");
    }

    let shutdown = CancellationToken::new();
    let indexer = ReportIndexer::new(chain.clone(), deployment.ledger)
        .with_poll_interval(config.indexer_poll_interval);
    let indexer_task = tokio::spawn(indexer.run(shutdown.clone()));

    let relay = RelaySigner::new(deployment.proxy(), Some(relay_key));
    let app = router(AppState::new(chain, deployment, relay));
    let addr = config.bind_addr;

    let handle = axum_server::Handle::new();
    tokio::spawn({
        let handle = handle.clone();
        let shutdown = shutdown.clone();
        async move {
            shutdown_signal(shutdown).await;
            handle.graceful_shutdown(Some(std::time::Duration::from_secs(10)));
        }
    });

    match &config.tls {
        Some(tls) => {
            // Install the ring crypto provider for rustls (must be done before any TLS operations)
            rustls::crypto::ring::default_provider()
                .install_default()
                .expect("Failed to install rustls crypto provider");
            let tls_config = RustlsConfig::from_pem_file(&tls.cert, &tls.key)
                .await
                .expect("Failed to load TLS certificate");

            tracing::info!(%addr, "listening on https (docs at /docs)");
            axum_server::bind_rustls(addr, tls_config)
                .handle(handle)
                .serve(app.into_make_service())
                .await
                .expect("HTTPS server failed");
        }
        None => {
            tracing::info!(%addr, "listening on http (docs at /docs)");
            axum_server::bind(addr)
                .handle(handle)
                .serve(app.into_make_service())
                .await
                .expect("HTTP server failed");
        }
    }

    shutdown.cancel();
    if let Err(e) = indexer_task.await {
        tracing::error!(error = %e, "indexer task failed");
    }
}
