use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::sync::watch;

use crate::channel::{ChannelSnapshot, ChannelState};
use crate::config::FeedConfig;
use crate::feed::types::FeedItem;
use crate::feed::{FeedClient, RoundDecoder};
use crate::model::Channel;

#[derive(Debug, Clone)]
pub struct PollSettings {
    pub gid: String,
    pub poll_interval: Duration,
    pub retry_delay: Duration,
}

impl PollSettings {
    pub fn from_config(config: &FeedConfig, channel: Channel) -> Result<Self> {
        Ok(Self {
            gid: config.gid_for(channel).to_string(),
            poll_interval: Duration::from_millis(
                config
                    .poll_interval_ms()
                    .context("feed.poll_interval is invalid")?,
            ),
            retry_delay: Duration::from_millis(
                config.retry_delay_ms().context("feed.retry_delay is invalid")?,
            ),
        })
    }
}

/// Decoder plus state for one channel; the only writer of that channel's state.
#[derive(Debug)]
pub struct ChannelWorker {
    decoder: RoundDecoder,
    state: ChannelState,
}

impl ChannelWorker {
    pub fn new(state: ChannelState) -> Self {
        Self {
            decoder: RoundDecoder::new(state.channel()),
            state,
        }
    }

    pub fn state(&self) -> &ChannelState {
        &self.state
    }

    /// Apply every new round in `items` in feed order; returns how many were applied.
    pub fn ingest(&mut self, items: &[FeedItem]) -> usize {
        self.decoder
            .decode(items)
            .into_iter()
            .filter(|event| self.state.apply(*event).is_some())
            .count()
    }
}

/// Sleep for `delay`; returns `true` if shutdown was requested meanwhile.
pub async fn sleep_or_shutdown(delay: Duration, shutdown_rx: &mut watch::Receiver<bool>) -> bool {
    if *shutdown_rx.borrow() {
        return true;
    }
    tokio::select! {
        _ = tokio::time::sleep(delay) => false,
        changed = shutdown_rx.changed() => changed.is_err() || *shutdown_rx.borrow(),
    }
}

/// Poll the feed for one channel until shutdown, publishing a snapshot after each applied batch.
pub async fn run_channel_poller(
    client: Arc<FeedClient>,
    mut worker: ChannelWorker,
    settings: PollSettings,
    snapshot_tx: watch::Sender<ChannelSnapshot>,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    let channel = worker.state().channel();
    tracing::info!(channel = %channel, gid = %settings.gid, "Poller started");

    loop {
        if *shutdown_rx.borrow() {
            break;
        }

        match client.fetch(&settings.gid).await {
            Ok(batch) => {
                let applied = worker.ingest(&batch.data);
                if applied > 0 {
                    snapshot_tx.send_replace(worker.state().snapshot());
                }
            }
            Err(e) => {
                tracing::warn!(channel = %channel, gid = %settings.gid, error = %format!("{:#}", e), "Feed fetch failed");
                if sleep_or_shutdown(settings.retry_delay, &mut shutdown_rx).await {
                    break;
                }
            }
        }

        if sleep_or_shutdown(settings.poll_interval, &mut shutdown_rx).await {
            break;
        }
    }

    tracing::info!(channel = %channel, "Poller shutting down");
}
