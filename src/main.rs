use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::sync::watch;

use taixiu_oracle::api::{self, ApiState};
use taixiu_oracle::channel::{ChannelSnapshot, ChannelState};
use taixiu_oracle::config::Config;
use taixiu_oracle::feed::FeedClient;
use taixiu_oracle::model::Channel;
use taixiu_oracle::poller::{run_channel_poller, ChannelWorker, PollSettings};
use taixiu_oracle::predictor::EnsemblePredictor;

fn init_tracing(config: &Config) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        config
            .logging
            .level
            .parse()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"))
    });
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if config.logging.json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn build_predictor(config: &Config, channel: Channel) -> EnsemblePredictor {
    match config.predictor.seed {
        // Distinct but reproducible streams per channel.
        Some(seed) => EnsemblePredictor::with_seed(seed.wrapping_add(channel as u64)),
        None => EnsemblePredictor::new(),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = match Config::load() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load config: {:#}", e);
            eprintln!("Make sure config/default.toml exists and is valid");
            std::process::exit(1);
        }
    };

    init_tracing(&config);

    tracing::info!(
        feed_url = %config.feed.base_url,
        classic_gid = %config.feed.classic_gid,
        md5_gid = %config.feed.md5_gid,
        bind = %config.server.bind_addr(),
        "Starting taixiu-oracle"
    );

    let client = Arc::new(FeedClient::new(&config.feed)?);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let mut snapshots = Vec::with_capacity(Channel::ALL.len());
    let mut pollers = Vec::with_capacity(Channel::ALL.len());
    for channel in Channel::ALL {
        let settings = PollSettings::from_config(&config.feed, channel)?;
        let state = ChannelState::new(channel, build_predictor(&config, channel));
        let (snapshot_tx, snapshot_rx) = watch::channel(ChannelSnapshot::default());
        snapshots.push(snapshot_rx);
        pollers.push(tokio::spawn(run_channel_poller(
            client.clone(),
            ChannelWorker::new(state),
            settings,
            snapshot_tx,
            shutdown_rx.clone(),
        )));
    }

    let md5 = snapshots.pop().context("missing md5 snapshot receiver")?;
    let classic = snapshots.pop().context("missing classic snapshot receiver")?;
    let app = api::router(ApiState {
        classic,
        md5,
        source_tag: Arc::from(config.server.source_tag.as_str()),
        placeholder_tag: Arc::from(config.server.placeholder_tag()),
    });

    // Ctrl+C handler
    let ctrl_c_shutdown = shutdown_tx.clone();
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        tracing::info!("Ctrl+C received");
        let _ = ctrl_c_shutdown.send(true);
    });

    let bind = config.server.bind_addr();
    let listener = tokio::net::TcpListener::bind(&bind)
        .await
        .with_context(|| format!("failed to bind {}", bind))?;
    tracing::info!(addr = %bind, "HTTP server listening");

    let mut server_shutdown = shutdown_rx.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = server_shutdown.wait_for(|stop| *stop).await;
        })
        .await
        .context("HTTP server failed")?;

    let _ = shutdown_tx.send(true);
    for handle in pollers {
        if let Err(e) = handle.await {
            tracing::warn!(error = %e, "Poller task ended abnormally");
        }
    }

    tracing::info!("Shutdown complete");
    Ok(())
}
